use std::collections::HashMap;
use std::fmt;

use http::header::{HeaderValue, AUTHORIZATION};
use opentelemetry_otlp::{SpanExporter, WithExportConfig, WithHttpConfig, WithTonicConfig};
use tonic::metadata::{Ascii, MetadataMap, MetadataValue};
use tonic::transport::ClientTlsConfig;
use tracing::{info, warn};

use crate::config::TelemetryConfig;
use crate::error::TelemetryError;

/// Wire transport used to ship spans. Fixed at compile time by the `https` feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// OTLP over a TLS-secured gRPC stream.
    Grpc,
    /// OTLP/protobuf over HTTPS request/response.
    Https,
}

impl Default for Transport {
    fn default() -> Self {
        if cfg!(feature = "https") {
            Transport::Https
        } else {
            Transport::Grpc
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Grpc => f.write_str("grpc"),
            Transport::Https => f.write_str("https"),
        }
    }
}

/// Builds the single span exporter for this process.
pub fn build(
    transport: Transport,
    config: &TelemetryConfig,
) -> Result<SpanExporter, TelemetryError> {
    let endpoint = config
        .endpoint
        .as_deref()
        .filter(|endpoint| !endpoint.trim().is_empty())
        .ok_or(TelemetryError::MissingEndpoint)?;

    if config.api_key.is_none() {
        warn!("no export credential configured; spans will be sent unauthenticated");
    }

    info!(%transport, endpoint, "building span exporter");
    match transport {
        Transport::Grpc => grpc_exporter(endpoint, config.api_key.as_deref()),
        Transport::Https => https_exporter(endpoint, config.api_key.as_deref()),
    }
}

fn grpc_exporter(endpoint: &str, api_key: Option<&str>) -> Result<SpanExporter, TelemetryError> {
    let mut metadata = MetadataMap::new();
    if let Some(key) = api_key {
        let value: MetadataValue<Ascii> =
            key.parse().map_err(|_| TelemetryError::InvalidCredential)?;
        metadata.insert("authorization", value);
    }

    SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_metadata(metadata)
        .with_tls_config(ClientTlsConfig::new().with_native_roots())
        .build()
        .map_err(|source| TelemetryError::Exporter {
            transport: Transport::Grpc,
            source: source.into(),
        })
}

fn https_exporter(endpoint: &str, api_key: Option<&str>) -> Result<SpanExporter, TelemetryError> {
    let mut headers = HashMap::new();
    if let Some(key) = api_key {
        HeaderValue::from_str(key).map_err(|_| TelemetryError::InvalidCredential)?;
        headers.insert(AUTHORIZATION.as_str().to_string(), key.to_string());
    }

    SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .with_headers(headers)
        .build()
        .map_err(|source| TelemetryError::Exporter {
            transport: Transport::Https,
            source: source.into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: Option<&str>, api_key: Option<&str>) -> TelemetryConfig {
        TelemetryConfig {
            endpoint: endpoint.map(str::to_string),
            api_key: api_key.map(str::to_string),
            ..TelemetryConfig::default()
        }
    }

    #[test_log::test]
    fn default_transport_follows_build_feature() {
        let expected = if cfg!(feature = "https") {
            Transport::Https
        } else {
            Transport::Grpc
        };
        assert_eq!(Transport::default(), expected);
    }

    #[test_log::test]
    fn missing_endpoint_is_a_construction_error() {
        for transport in [Transport::Grpc, Transport::Https] {
            let err = build(transport, &config(None, Some("key"))).err().expect("construction must fail");
            assert!(matches!(err, TelemetryError::MissingEndpoint), "{err}");
        }
    }

    #[test_log::test]
    fn blank_endpoint_counts_as_missing() {
        let err = build(Transport::Https, &config(Some("  "), None)).err().expect("construction must fail");
        assert!(matches!(err, TelemetryError::MissingEndpoint));
    }

    #[test_log::test]
    fn rejects_credential_with_line_break() {
        let cfg = config(Some("https://collector.example.com"), Some("key\r\nX-Evil: 1"));
        let err = build(Transport::Https, &cfg).err().expect("construction must fail");
        assert!(matches!(err, TelemetryError::InvalidCredential));
    }

    #[test_log::test(tokio::test)]
    async fn rejects_grpc_credential_with_line_break() {
        let cfg = config(Some("https://collector.example.com:4317"), Some("key\nbad"));
        let err = build(Transport::Grpc, &cfg).err().expect("construction must fail");
        assert!(matches!(err, TelemetryError::InvalidCredential));
    }

    #[test_log::test]
    fn rejects_credential_with_control_byte() {
        let cfg = config(Some("https://collector.example.com"), Some("key\u{7f}"));
        let err = build(Transport::Https, &cfg).err().expect("construction must fail");
        assert!(matches!(err, TelemetryError::InvalidCredential));
    }

    #[test_log::test]
    fn accepts_bearer_credential_with_space() {
        let cfg = config(Some("https://collector.example.com/v1/traces"), Some("Bearer abc.def"));
        assert!(build(Transport::Https, &cfg).is_ok());
    }

    #[test_log::test]
    fn builds_https_exporter() {
        let cfg = config(Some("https://collector.example.com/v1/traces"), Some("key"));
        assert!(build(Transport::Https, &cfg).is_ok());
    }
}
