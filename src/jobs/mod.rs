//! Background housekeeping
//!
//! Periodically sweeps stale nonces and idle rate-limiter buckets. Timing
//! is best-effort; correctness never depends on a sweep having run.

use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::auth::AuthService;
use crate::middleware::RateLimiter;

const BUCKET_IDLE_AFTER: Duration = Duration::from_secs(600);

/// Start the repeating housekeeping job
///
/// The returned scheduler must be kept alive for the job to keep running.
pub async fn start_housekeeping(
    auth_service: Arc<AuthService>,
    rate_limiter: RateLimiter,
    every: Duration,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_repeated_async(every, move |_id, _scheduler| {
        let auth_service = auth_service.clone();
        let rate_limiter = rate_limiter.clone();
        Box::pin(async move {
            run_housekeeping(&auth_service, &rate_limiter).await;
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    tracing::info!(interval_secs = every.as_secs(), "Housekeeping job scheduled");

    Ok(scheduler)
}

/// One housekeeping pass
pub async fn run_housekeeping(auth_service: &AuthService, rate_limiter: &RateLimiter) {
    match auth_service.sweep().await {
        Ok(removed) => tracing::debug!(removed, "Nonce sweep finished"),
        // next pass retries
        Err(e) => tracing::error!(error = %e, "Nonce sweep failed"),
    }

    let pruned = rate_limiter.prune(BUCKET_IDLE_AFTER).await;
    if pruned > 0 {
        tracing::debug!(pruned, "Pruned idle rate-limit buckets");
    }
}
