//! Defines routes for document and media operations.
//!
//! ## Structure
//! - **Collection-level endpoints**
//!   - `GET    /documents` — list document ids
//!   - `POST   /documents` — upload a document (id generated when absent)
//!
//! - **Document-level endpoints**
//!   - `GET    /documents/{id}`       — read document
//!   - `PUT    /documents/{id}`       — overwrite document
//!   - `DELETE /documents/{id}`       — delete document and media
//!   - `GET    /documents/{id}/url`   — presigned read URL
//!
//! - **Media endpoints**
//!   - `GET    /documents/{id}/media`        — list attachments
//!   - `POST   /documents/{id}/media`        — multipart upload
//!   - `DELETE /documents/{id}/media`        — delete named attachments
//!   - `GET    /documents/{id}/media/{name}` — download one attachment

use crate::{
    handlers::{
        document_handlers::{
            create_document, delete_document, delete_media, get_document, get_document_url,
            get_media, list_documents, list_media, put_document, upload_media,
        },
        health_handlers::{healthz, readyz},
    },
    services::document_store::DocumentStore,
};
use axum::{Router, routing::get};

/// Build and return the router for all document routes.
///
/// The router carries shared state (`DocumentStore`) to all handlers.
pub fn routes() -> Router<DocumentStore> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Collection-level routes
        .route("/documents", get(list_documents).post(create_document))
        // Document-level routes
        .route(
            "/documents/{id}",
            get(get_document).put(put_document).delete(delete_document),
        )
        .route("/documents/{id}/url", get(get_document_url))
        // Media routes
        .route(
            "/documents/{id}/media",
            get(list_media).post(upload_media).delete(delete_media),
        )
        .route("/documents/{id}/media/{name}", get(get_media))
}
