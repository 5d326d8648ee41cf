pub mod remote_client;
pub mod retry_policy;

pub use remote_client::{ClientSettings, RemoteClient};
pub use retry_policy::{RateLimitInfo, RetryPolicy};
