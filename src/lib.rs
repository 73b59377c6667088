//! A document store layered on an object-storage key namespace.
//!
//! Documents live at `{collection}/{id}/data.json` inside one bucket, with
//! media attachments as sibling objects. See [`DocumentStore`] for the
//! operations and [`ObjectClient`] for the storage capabilities required.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use config::{StorageOverrides, StorageSettings};
pub use errors::{StoreError, StoreResult};
pub use models::{
    document::Document,
    media::MediaFile,
    object::{Listing, ObjectEntry},
};
pub use services::{
    document_store::{DATA_FILE, DocumentStore, InitPolicy},
    memory_client::MemoryClient,
    object_client::ObjectClient,
    s3_client::S3Client,
};

/// Router exposing `store` over HTTP.
pub fn create_router(store: DocumentStore) -> axum::Router {
    routes::routes::routes().with_state(store)
}
