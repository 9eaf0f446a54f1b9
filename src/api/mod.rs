//! Thin read-only report API over the partitioned store.

pub mod health;
pub mod latency;
pub mod routes;

pub use health::HealthState;
pub use latency::LatencyStats;
pub use routes::{router, ApiState};
