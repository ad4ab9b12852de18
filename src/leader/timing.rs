//! Leadership timing parameters.

use rand::Rng;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on retry jitter, as a multiple of the retry period.
pub const JITTER_FACTOR: f64 = 1.2;

pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(90);
pub const DEFAULT_RENEW_DEADLINE: Duration = Duration::from_secs(60);
pub const DEFAULT_RETRY_PERIOD: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimingError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("lease duration ({lease:?}) must be greater than renew deadline ({renew:?})")]
    LeaseNotAboveRenew { lease: Duration, renew: Duration },

    #[error("renew deadline ({renew:?}) must be greater than 1.2 x retry period ({retry:?})")]
    RenewNotAboveRetry { renew: Duration, retry: Duration },
}

/// Lease duration, renew deadline and retry period.
///
/// Only constructible in a valid state: `lease > renew > 1.2 * retry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderTiming {
    lease_duration: Duration,
    renew_deadline: Duration,
    retry_period: Duration,
}

impl LeaderTiming {
    pub fn new(
        lease_duration: Duration,
        renew_deadline: Duration,
        retry_period: Duration,
    ) -> Result<Self, TimingError> {
        if lease_duration.is_zero() {
            return Err(TimingError::Zero("lease duration"));
        }
        if renew_deadline.is_zero() {
            return Err(TimingError::Zero("renew deadline"));
        }
        if retry_period.is_zero() {
            return Err(TimingError::Zero("retry period"));
        }
        if lease_duration <= renew_deadline {
            return Err(TimingError::LeaseNotAboveRenew {
                lease: lease_duration,
                renew: renew_deadline,
            });
        }
        if renew_deadline <= retry_period.mul_f64(JITTER_FACTOR) {
            return Err(TimingError::RenewNotAboveRetry {
                renew: renew_deadline,
                retry: retry_period,
            });
        }

        Ok(Self {
            lease_duration,
            renew_deadline,
            retry_period,
        })
    }

    pub fn from_secs(lease: u64, renew: u64, retry: u64) -> Result<Self, TimingError> {
        Self::new(
            Duration::from_secs(lease),
            Duration::from_secs(renew),
            Duration::from_secs(retry),
        )
    }

    pub fn lease_duration(&self) -> Duration {
        self.lease_duration
    }

    pub fn renew_deadline(&self) -> Duration {
        self.renew_deadline
    }

    pub fn retry_period(&self) -> Duration {
        self.retry_period
    }

    /// Retry period stretched by a random amount up to the jitter factor,
    /// so candidates that started together drift apart.
    pub fn jittered_retry(&self) -> Duration {
        let extra = rand::thread_rng().gen_range(0.0..(JITTER_FACTOR - 1.0));
        self.retry_period.mul_f64(1.0 + extra)
    }
}

impl Default for LeaderTiming {
    fn default() -> Self {
        Self {
            lease_duration: DEFAULT_LEASE_DURATION,
            renew_deadline: DEFAULT_RENEW_DEADLINE,
            retry_period: DEFAULT_RETRY_PERIOD,
        }
    }
}
