//! HTTP handlers for documents and their media.
//! Each handler is a thin translation onto one `DocumentStore` operation.

use crate::{
    errors::AppError,
    models::{document::Document, media::{MediaFile, content_type_for}, object::ObjectEntry},
    services::document_store::DocumentStore,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UrlResponse {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentIds {
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MediaList {
    pub media: Vec<ObjectEntry>,
}

/// Body of `DELETE /documents/{id}/media`.
#[derive(Debug, Deserialize)]
pub struct DeleteMediaReq {
    pub names: Vec<String>,
}

fn document_from_body(body: Value) -> Result<Document, AppError> {
    Document::from_value(body).ok_or_else(|| {
        AppError::bad_request("document must be a JSON object whose `id`, if present, is a string")
    })
}

/// `GET /documents`
pub async fn list_documents(
    State(store): State<DocumentStore>,
) -> Result<Json<DocumentIds>, AppError> {
    let ids = store.list_document_ids().await?;
    Ok(Json(DocumentIds { ids }))
}

/// `POST /documents` — store a document, generating an id when it has none.
pub async fn create_document(
    State(store): State<DocumentStore>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let doc = document_from_body(body)?;
    let id = store.upload_document(doc).await?;
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

/// `PUT /documents/{id}` — overwrite; the path id wins over any id in the body.
pub async fn put_document(
    State(store): State<DocumentStore>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<IdResponse>, AppError> {
    let doc = document_from_body(body)?.with_id(id);
    let id = store.upload_document(doc).await?;
    Ok(Json(IdResponse { id }))
}

/// `GET /documents/{id}`
pub async fn get_document(
    State(store): State<DocumentStore>,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    Ok(Json(store.get_document(&id).await?))
}

/// `DELETE /documents/{id}` — removes the body and all media.
pub async fn delete_document(
    State(store): State<DocumentStore>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    store.delete_document(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /documents/{id}/url`
pub async fn get_document_url(
    State(store): State<DocumentStore>,
    Path(id): Path<String>,
) -> Result<Json<UrlResponse>, AppError> {
    let url = store.get_document_url(&id).await?;
    Ok(Json(UrlResponse { url }))
}

/// `GET /documents/{id}/media`
pub async fn list_media(
    State(store): State<DocumentStore>,
    Path(id): Path<String>,
) -> Result<Json<MediaList>, AppError> {
    let media = store.get_document_media(&id).await?;
    Ok(Json(MediaList { media }))
}

/// `POST /documents/{id}/media` — multipart upload; each file part becomes
/// one attachment named after its filename.
pub async fn upload_media(
    State(store): State<DocumentStore>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<StatusCode, AppError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::new(err.status(), err.body_text()))?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|err| AppError::new(err.status(), err.body_text()))?;
        files.push(MediaFile::new(name, data));
    }
    if files.is_empty() {
        return Err(AppError::bad_request("no file parts in multipart body"));
    }

    store.upload_document_media(&id, files).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /documents/{id}/media/{name}`
pub async fn get_media(
    State(store): State<DocumentStore>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let data = store.get_document_media_file(&id, &name).await?;
    let content_type = content_type_for(&name);

    let mut response = Response::new(Body::from(data));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    Ok(response)
}

/// `DELETE /documents/{id}/media`
pub async fn delete_media(
    State(store): State<DocumentStore>,
    Path(id): Path<String>,
    Json(req): Json<DeleteMediaReq>,
) -> Result<StatusCode, AppError> {
    store.delete_document_media(&id, &req.names).await?;
    Ok(StatusCode::NO_CONTENT)
}
