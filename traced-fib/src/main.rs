use clap::Parser;
use eyre::{Result, WrapErr};
use tokio::io::BufReader;
use traced_fib::config::TelemetryConfig;
use traced_fib::service::FibService;
use traced_fib::{interrupt_signal, launch};

fn main() -> Result<()> {
    let config = TelemetryConfig::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("failed to start async runtime")?;

    let result = runtime.block_on(launch(
        &config,
        || FibService::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout()),
        interrupt_signal(),
    ));

    // A pending stdin read must not hold the process open after teardown.
    runtime.shutdown_background();
    result
}
