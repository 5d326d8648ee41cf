pub mod api;
pub mod http_client;
pub mod models;

pub use api::PlatformApi;
pub use http_client::{ClientSettings, RemoteClient, RetryPolicy};
pub use models::{
    CompletionRegistration, DataValue, DataValueSet, Dataset, ImportSummary, OrgUnit,
};

#[cfg(test)]
pub use api::MockPlatformApi;
