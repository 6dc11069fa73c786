use std::future::Future;
use std::time::Instant;

/// Runs `future`, logging when `label` starts and how long it took.
pub async fn timed<F: Future>(label: &str, future: F) -> F::Output {
    tracing::info!("{label} started");
    let started = Instant::now();
    let output = future.await;
    tracing::info!(
        elapsed_secs = started.elapsed().as_secs_f64(),
        "{label} finished in {:.2?}",
        started.elapsed()
    );
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_the_output() {
        assert_eq!(timed("answer", async { 42 }).await, 42);
    }
}
