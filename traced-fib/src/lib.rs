pub mod config;
pub mod error;
pub mod exporter;
pub mod lifecycle;
pub mod pipeline;
pub mod resource;
pub mod service;

use std::future::Future;

use eyre::WrapErr;
use tracing::{error, warn, Subscriber};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, Layer, Registry};

use crate::config::TelemetryConfig;
use crate::error::TelemetryError;
use crate::lifecycle::supervise;
use crate::pipeline::TracePipeline;
use crate::service::Service;

type ExportSlot = Option<Box<dyn Layer<Registry> + Send + Sync>>;

/// Handle to the span-export slot of the installed subscriber.
pub struct SubscriberHandle {
    export: reload::Handle<ExportSlot, Registry>,
}

impl SubscriberHandle {
    /// Starts exporting `tracing` spans through `pipeline`.
    pub fn attach(&self, pipeline: &TracePipeline) -> Result<(), TelemetryError> {
        let layer: Box<dyn Layer<Registry> + Send + Sync> = tracing_opentelemetry::layer()
            .with_tracer(pipeline.tracer(env!("CARGO_PKG_NAME")))
            .boxed();
        self.export
            .reload(Some(layer))
            .map_err(|err| TelemetryError::Subscriber(err.into()))
    }
}

/// Env filter and forest console output, with an empty slot for span export.
fn console_subscriber() -> (impl Subscriber + Send + Sync + 'static, SubscriberHandle) {
    // 1. OTel Layer (Background Data), empty until a pipeline exists
    let (export_layer, export) = reload::Layer::new(ExportSlot::None);

    // 2. Forest Layer (Console UI)
    let forest_layer = tracing_forest::ForestLayer::default();

    // 3. Filter Layer
    let filter_layer =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let subscriber = tracing_subscriber::registry()
        .with(export_layer)
        .with(filter_layer)
        .with(forest_layer);
    (subscriber, SubscriberHandle { export })
}

/// Installs the global `tracing` subscriber: env filter and forest console
/// output right away, span export once a pipeline is attached.
pub fn init_subscriber() -> Result<SubscriberHandle, TelemetryError> {
    let (subscriber, handle) = console_subscriber();
    subscriber
        .try_init()
        .map_err(|err| TelemetryError::Subscriber(err.into()))?;
    Ok(handle)
}

/// Resolves on the first Ctrl-C. If the listener cannot be registered the
/// future never resolves, leaving the service result as the only way out.
pub async fn interrupt_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "cannot listen for interrupts");
        std::future::pending::<()>().await;
    }
}

/// Assembles and installs the trace pipeline, then supervises the service
/// built by `make_service` until `interrupt` fires or the service stops.
///
/// Pipeline construction failures abort before the service is built.
pub async fn launch<S, F, I>(
    config: &TelemetryConfig,
    make_service: F,
    interrupt: I,
) -> eyre::Result<()>
where
    S: Service,
    F: FnOnce() -> S,
    I: Future<Output = ()>,
{
    // Console logging first, so exporter construction is visible.
    let subscriber = match init_subscriber() {
        Ok(handle) => Some(handle),
        Err(err) => {
            warn!(error = %err, "keeping existing tracing subscriber");
            None
        }
    };

    let pipeline = match TracePipeline::from_config(config) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            error!(error = %err, "failed to assemble trace pipeline");
            return Err(err).wrap_err("startup aborted");
        }
    };

    if let Some(subscriber) = &subscriber {
        if let Err(err) = subscriber.attach(&pipeline) {
            warn!(error = %err, "spans from tracing macros will not be exported");
        }
    }

    if let Err(err) = pipeline.install() {
        error!(error = %err, "failed to install trace pipeline");
        if let Err(shutdown_err) = pipeline.shutdown() {
            warn!(error = %shutdown_err, "trace pipeline teardown failed");
        }
        return Err(err).wrap_err("startup aborted");
    }

    supervise(pipeline, make_service(), interrupt)
        .await
        .into_result()
}
