//! Trace pipeline assembly and process-wide installation.

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};

use opentelemetry::global;
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::{Sampler, SdkTracer, SdkTracerProvider, SpanExporter};
use opentelemetry_sdk::Resource;
use tracing::{debug, info};
use validator::Validate;

use crate::config::TelemetryConfig;
use crate::error::TelemetryError;
use crate::exporter::{self, Transport};
use crate::lifecycle::Teardown;
use crate::resource;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Header codecs applied to every carrier: W3C trace context, then baggage.
pub fn propagation_policy() -> TextMapCompositePropagator {
    TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ])
}

/// Always-sampling, batching tracer provider bound to one exporter.
///
/// The pipeline is the explicit context object for span creation: hand out
/// tracers with [`TracePipeline::tracer`], or [`install`](TracePipeline::install)
/// it once so `opentelemetry::global` resolves to it.
pub struct TracePipeline {
    provider: SdkTracerProvider,
}

impl TracePipeline {
    pub fn new<E>(resource: Resource, exporter: E) -> Self
    where
        E: SpanExporter + 'static,
    {
        let provider = SdkTracerProvider::builder()
            .with_sampler(Sampler::AlwaysOn)
            .with_resource(resource)
            .with_batch_exporter(exporter)
            .build();
        Self { provider }
    }

    /// Validates `config`, then builds resource, exporter and pipeline in that order.
    pub fn from_config(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        config.validate()?;
        let resource = resource::build(&config.service_name);
        let exporter = exporter::build(Transport::default(), config)?;
        debug!(service = %config.service_name, "trace pipeline assembled");
        Ok(Self::new(resource, exporter))
    }

    pub fn tracer(&self, name: impl Into<Cow<'static, str>>) -> SdkTracer {
        self.provider.tracer(name)
    }

    /// Makes this pipeline and [`propagation_policy`] the process-wide defaults.
    ///
    /// Only the first call in a process succeeds; later calls return
    /// [`TelemetryError::AlreadyInstalled`] and leave the installed pipeline in place.
    pub fn install(&self) -> Result<(), TelemetryError> {
        if INSTALLED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TelemetryError::AlreadyInstalled);
        }
        global::set_tracer_provider(self.provider.clone());
        global::set_text_map_propagator(propagation_policy());
        info!("trace pipeline installed");
        Ok(())
    }

    /// Exports whatever the batch processor is holding without shutting down.
    pub fn force_flush(&self) -> Result<(), TelemetryError> {
        self.provider
            .force_flush()
            .map_err(|source| TelemetryError::Shutdown(source.into()))
    }

    /// Flushes buffered spans and releases the exporter.
    pub fn shutdown(self) -> Result<(), TelemetryError> {
        self.provider
            .shutdown()
            .map_err(|source| TelemetryError::Shutdown(source.into()))
    }
}

impl Teardown for TracePipeline {
    fn teardown(self) -> eyre::Result<()> {
        Ok(self.shutdown()?)
    }
}
