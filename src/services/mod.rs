pub mod blob_store;
pub mod record_store;
pub mod upload_coordinator;
pub mod worker;
