//! The supervised service contract and the demo Fibonacci service.

use std::future::Future;

use eyre::{Result, WrapErr};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, instrument, warn};

/// A long-running unit of work the lifecycle controller runs exactly once.
///
/// `serve` resolves only when the service stops on its own or fails.
pub trait Service: Send + 'static {
    fn serve(self) -> impl Future<Output = Result<()>> + Send;
}

/// Largest index whose Fibonacci number fits in a `u64`.
pub const MAX_FIBONACCI: u32 = 93;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported fibonacci number {0}: too large")]
pub struct FibonacciOverflow(pub u32);

#[instrument]
pub fn fibonacci(n: u32) -> Result<u64, FibonacciOverflow> {
    if n > MAX_FIBONACCI {
        return Err(FibonacciOverflow(n));
    }
    if n == 0 {
        return Ok(0);
    }
    let (mut previous, mut current) = (0u64, 1u64);
    for _ in 1..n {
        (previous, current) = (current, previous + current);
    }
    Ok(current)
}

const PROMPT: &[u8] = b"What Fibonacci number would you like to know: ";

/// Answers Fibonacci queries read line by line from `input`.
pub struct FibService<R, W> {
    input: R,
    output: W,
}

impl<R, W> FibService<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R, W> Service for FibService<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn serve(self) -> Result<()> {
        let FibService { input, mut output } = self;
        let mut lines = input.lines();
        loop {
            output.write_all(PROMPT).await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await.wrap_err("failed to read request")? else {
                info!("input closed, stopping");
                return Ok(());
            };
            answer(&mut output, line.trim()).await?;
        }
    }
}

#[instrument(skip(output))]
async fn answer<W>(output: &mut W, request: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let n: u32 = request
        .parse()
        .wrap_err_with(|| format!("invalid fibonacci request {request:?}"))?;
    let reply = match fibonacci(n) {
        Ok(value) => format!("Fibonacci({n}) = {value}\n"),
        Err(err) => {
            warn!(error = %err, "request rejected");
            format!("Fibonacci({n}): {err}\n")
        }
    };
    output.write_all(reply.as_bytes()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[test_log::test]
    fn known_values() {
        assert_eq!(fibonacci(0), Ok(0));
        assert_eq!(fibonacci(1), Ok(1));
        assert_eq!(fibonacci(2), Ok(1));
        assert_eq!(fibonacci(10), Ok(55));
        assert_eq!(fibonacci(MAX_FIBONACCI), Ok(12_200_160_415_121_876_738));
    }

    #[test_log::test]
    fn rejects_overflowing_index() {
        assert_eq!(fibonacci(MAX_FIBONACCI + 1), Err(FibonacciOverflow(94)));
    }

    async fn run(input: &'static [u8]) -> (Result<()>, String) {
        let (writer, mut reader) = tokio::io::duplex(4096);
        let result = FibService::new(BufReader::new(input), writer).serve().await;
        let mut transcript = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut reader, &mut transcript)
            .await
            .expect("read transcript");
        (result, transcript)
    }

    #[test_log::test(tokio::test)]
    async fn answers_until_input_closes() {
        let (result, transcript) = run(b"5\n 10 \n").await;
        assert!(result.is_ok());
        assert!(transcript.contains("Fibonacci(5) = 5\n"));
        assert!(transcript.contains("Fibonacci(10) = 55\n"));
        assert_eq!(transcript.matches("What Fibonacci number").count(), 3);
    }

    #[test_log::test(tokio::test)]
    async fn garbage_input_fails_the_service() {
        let (result, _) = run(b"seven\n").await;
        let err = result.expect_err("non-numeric input must fail");
        assert!(format!("{err:?}").contains("seven"));
    }

    #[test_log::test(tokio::test)]
    async fn overflow_is_reported_and_serving_continues() {
        let (result, transcript) = run(b"94\n3\n").await;
        assert!(result.is_ok());
        assert!(transcript.contains("Fibonacci(94): unsupported fibonacci number 94: too large\n"));
        assert!(transcript.contains("Fibonacci(3) = 2\n"));
    }
}
