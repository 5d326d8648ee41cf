pub mod instance_profile;
pub mod store;

pub use instance_profile::InstanceProfile;
pub use store::ProfileStore;
