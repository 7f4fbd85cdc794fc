//! Bounded fixed-interval polling.

use std::{fmt::Display, future::Future, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Worst-case wall time before giving up.
    pub fn ceiling(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("gave up after {attempts} attempts")]
pub struct PollTimeout {
    pub attempts: u32,
}

/// Call `probe` until it yields `Some`, sleeping `policy.interval` after every
/// attempt that yields `None` or fails. Probe errors are logged and count
/// against the attempt budget; they never abort the loop on their own.
pub async fn poll_until<T, E, F, Fut>(policy: &PollPolicy, mut probe: F) -> Result<T, PollTimeout>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: Display,
{
    let mut attempts: u32 = 0;

    while attempts < policy.max_attempts {
        match probe(attempts).await {
            Ok(Some(v)) => return Ok(v),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, attempt = attempts + 1, "poll attempt failed");
            }
        }

        attempts += 1;
        tokio::time::sleep(policy.interval).await;
    }

    Err(PollTimeout { attempts })
}
