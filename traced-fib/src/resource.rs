use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;

/// Identity of this process as seen by the tracing backend.
pub fn build(service_name: &str) -> Resource {
    Resource::builder()
        .with_service_name(service_name.to_string())
        .with_attributes([KeyValue::new("service.version", env!("CARGO_PKG_VERSION"))])
        .build()
}
