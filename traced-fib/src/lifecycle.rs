//! Single-shot supervisor: run one service under an installed trace pipeline
//! until the operator interrupts or the service stops, then tear down once.

use std::future::Future;

use eyre::eyre;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::service::Service;

/// Flush-and-release step run when the lifecycle ends.
///
/// Consuming `self` makes a second invocation impossible.
pub trait Teardown {
    fn teardown(self) -> eyre::Result<()>;
}

/// How a supervised run ended.
#[derive(Debug)]
pub enum LifecycleOutcome {
    /// The operator asked the process to stop.
    Interrupted,
    /// The service returned on its own without an error.
    ServiceStopped,
    /// The service returned an error or died without reporting.
    ServiceFailed(eyre::Report),
}

impl LifecycleOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, LifecycleOutcome::ServiceFailed(_))
    }

    /// Maps the outcome onto the process exit path.
    pub fn into_result(self) -> eyre::Result<()> {
        match self {
            LifecycleOutcome::Interrupted | LifecycleOutcome::ServiceStopped => Ok(()),
            LifecycleOutcome::ServiceFailed(err) => Err(err.wrap_err("service failed")),
        }
    }
}

/// Holds the registered teardown and runs it on release or drop, whichever
/// comes first.
struct TeardownGuard<T: Teardown> {
    inner: Option<T>,
}

impl<T: Teardown> TeardownGuard<T> {
    fn new(teardown: T) -> Self {
        Self {
            inner: Some(teardown),
        }
    }

    fn release(&mut self) {
        let Some(teardown) = self.inner.take() else {
            return;
        };
        debug!(phase = "shutting_down", "flushing trace pipeline");
        // Best effort: a failed flush loses spans but must not hold up exit.
        if let Err(err) = teardown.teardown() {
            warn!(error = ?err, "trace pipeline teardown failed; buffered spans may be lost");
        }
    }
}

impl<T: Teardown> Drop for TeardownGuard<T> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Teardown blocks on the exporter's background thread. On a multi-thread
/// runtime the worker hands its other tasks off first; a current-thread
/// runtime is only safe with exporters that need no runtime I/O to flush.
fn release_off_runtime<T: Teardown>(guard: &mut TeardownGuard<T>) {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(|| guard.release()),
        _ => guard.release(),
    }
}

/// Runs `service` until `interrupt` resolves or the service returns.
///
/// `teardown` runs exactly once before this returns, on every branch. The
/// service is not cancelled on interrupt; its task is left to die with the
/// process.
///
/// Must run inside a tokio runtime. Use a multi-thread runtime when the
/// teardown flushes over the network (the gRPC exporter does).
pub async fn supervise<T, S, I>(teardown: T, service: S, interrupt: I) -> LifecycleOutcome
where
    T: Teardown,
    S: Service,
    I: Future<Output = ()>,
{
    debug!(phase = "starting", "teardown registered");
    let mut guard = TeardownGuard::new(teardown);

    let (result_tx, result_rx) = oneshot::channel();
    tokio::spawn(async move {
        // The receiver is gone once the controller has picked the interrupt.
        let _ = result_tx.send(service.serve().await);
    });
    debug!(phase = "running", "service launched");

    let outcome = tokio::select! {
        () = interrupt => {
            info!("goodbye");
            LifecycleOutcome::Interrupted
        }
        result = result_rx => match result {
            Ok(Ok(())) => {
                info!("service returned without error");
                LifecycleOutcome::ServiceStopped
            }
            Ok(Err(err)) => {
                error!(error = ?err, "service failed");
                LifecycleOutcome::ServiceFailed(err)
            }
            Err(_) => {
                let err = eyre!("service task ended without reporting a result");
                error!(error = ?err, "service failed");
                LifecycleOutcome::ServiceFailed(err)
            }
        },
    };

    release_off_runtime(&mut guard);
    debug!(phase = "exited", success = outcome.is_success(), "lifecycle finished");
    outcome
}
