pub mod document_store;
pub mod memory_client;
pub mod object_client;
pub mod s3_client;
