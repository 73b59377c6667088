use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use doc_store::{DocumentStore, InitPolicy, MemoryClient, create_router};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

async fn app() -> Router {
    let store = DocumentStore::initialize(
        Arc::new(MemoryClient::new()),
        "b1",
        "c1",
        InitPolicy::AutoCreate,
    )
    .await
    .unwrap();
    create_router(store)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, value)
}

#[tokio::test]
async fn health_and_readiness() {
    let app = app().await;
    let (status, body) = send(&app, Method::GET, "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, Method::GET, "/readyz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["collection"], "c1");
    assert_eq!(body["checks"]["storage"]["ok"], true);
}

#[tokio::test]
async fn document_lifecycle_over_http() {
    let app = app().await;

    let (status, body) = send(&app, Method::POST, "/documents", Some(json!({"title": "A"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::GET, &format!("/documents/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"title": "A", "id": id}));

    let (_, body) = send(&app, Method::GET, "/documents", None).await;
    assert_eq!(body["ids"], json!([id]));

    let (status, body) = send(&app, Method::GET, &format!("/documents/{}/url", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].as_str().unwrap().contains("data.json"));

    let (status, _) = send(&app, Method::DELETE, &format!("/documents/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, Method::DELETE, &format!("/documents/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);

    let (_, body) = send(&app, Method::GET, "/documents", None).await;
    assert_eq!(body["ids"], json!([]));
}

#[tokio::test]
async fn put_uses_the_path_id_and_overwrites() {
    let app = app().await;
    send(
        &app,
        Method::PUT,
        "/documents/fixed",
        Some(json!({"value": 1, "old": true})),
    )
    .await;
    let (status, body) = send(
        &app,
        Method::PUT,
        "/documents/fixed",
        Some(json!({"id": "ignored", "value": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "fixed");

    let (_, body) = send(&app, Method::GET, "/documents/fixed", None).await;
    assert_eq!(body, json!({"id": "fixed", "value": 2}));
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let app = app().await;
    let (status, _) = send(&app, Method::POST, "/documents", Some(json!([1, 2, 3]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/documents/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn media_upload_list_download_and_delete() {
    let app = app().await;
    send(&app, Method::PUT, "/documents/doc1", Some(json!({"t": 1}))).await;

    let boundary = "XBOUNDARYX";
    let multipart = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"hello.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         hello world\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"pic.png\"\r\n\
         Content-Type: image/png\r\n\r\n\
         PNG\r\n\
         --{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri("/documents/doc1/media")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(multipart))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (_, body) = send(&app, Method::GET, "/documents/doc1/media", None).await;
    let mut names: Vec<String> = body["media"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["hello.txt", "pic.png"]);

    let request = Request::builder()
        .uri("/documents/doc1/media/hello.txt")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"hello world");

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/documents/doc1/media",
        Some(json!({"names": ["hello.txt", "nope.bin"]})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, Method::GET, "/documents/doc1/media", None).await;
    assert_eq!(body["media"].as_array().unwrap().len(), 1);
    assert_eq!(body["media"][0]["name"], "pic.png");
}
