use thiserror::Error;

use crate::exporter::Transport;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures while assembling, installing or tearing down the trace pipeline.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid telemetry configuration: {0}")]
    InvalidConfig(#[from] validator::ValidationErrors),

    #[error("no trace export endpoint configured (set OTEL_EXPORTER_OTLP_TRACES_ENDPOINT)")]
    MissingEndpoint,

    #[error("export credential is not a valid header value")]
    InvalidCredential,

    #[error("failed to build {transport} span exporter")]
    Exporter {
        transport: Transport,
        #[source]
        source: BoxError,
    },

    #[error("a trace pipeline is already installed for this process")]
    AlreadyInstalled,

    #[error("failed to install tracing subscriber")]
    Subscriber(#[source] BoxError),

    #[error("trace pipeline shutdown failed")]
    Shutdown(#[source] BoxError),
}
