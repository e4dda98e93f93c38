//! Rate limiting logic: sliding window evaluation and admission policy.

mod clock;
mod key;
mod limiter;
mod policy;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{Dimension, RateKey};
pub use limiter::{SlidingWindowLimiter, DEFAULT_STORE_TIMEOUT};
pub use policy::{AdmissionOutcome, AdmissionPolicy};
pub use window::{Decision, LimiterConfig};
