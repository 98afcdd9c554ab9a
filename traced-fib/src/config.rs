use clap::Parser;
use validator::Validate;

/// Startup configuration, read from flags or the environment.
#[derive(Parser, Debug, Clone, Validate)]
#[command(author, version, about, long_about = None)]
pub struct TelemetryConfig {
    /// OTLP traces endpoint (e.g. https://collector.example.com:4317)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_TRACES_ENDPOINT")]
    #[validate(url)]
    pub endpoint: Option<String>,

    /// Credential sent as the authorization header on every export
    #[arg(long, env = "ASPECTO_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Name reported as `service.name` on every span
    #[arg(long, default_value = "fib")]
    #[validate(length(min = 1))]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            service_name: "fib".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn flags_override_defaults() {
        let config = TelemetryConfig::parse_from([
            "traced-fib",
            "--endpoint",
            "https://collector.example.com:4317",
            "--api-key",
            "secret",
            "--service-name",
            "fib-workshop",
        ]);
        assert_eq!(
            config.endpoint.as_deref(),
            Some("https://collector.example.com:4317")
        );
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.service_name, "fib-workshop");
        assert!(config.validate().is_ok());
    }

    #[test_log::test]
    fn rejects_malformed_endpoint() {
        let config = TelemetryConfig {
            endpoint: Some("not a url".to_string()),
            ..TelemetryConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test_log::test]
    fn rejects_empty_service_name() {
        let config = TelemetryConfig {
            service_name: String::new(),
            ..TelemetryConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
