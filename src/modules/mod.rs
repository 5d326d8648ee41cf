pub mod completeness;
pub mod profile;
pub mod remote;
pub mod tasks;
pub mod transfer;
