pub mod calendar;
pub mod client;
pub mod rate_limit;
pub mod transport;
pub mod types;

pub use client::{Function, UpstreamClient};
pub use rate_limit::RateLimiter;
pub use transport::{HttpTransport, Transport};
