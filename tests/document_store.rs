use async_trait::async_trait;
use bytes::Bytes;
use doc_store::{
    Document, DocumentStore, InitPolicy, MediaFile, MemoryClient, ObjectClient, StoreError,
    StoreResult, services::object_client::ListObjectsOutput,
};
use serde::Deserialize;
use serde_json::json;
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

async fn open(client: &MemoryClient) -> DocumentStore {
    DocumentStore::initialize(Arc::new(client.clone()), "b1", "c1", InitPolicy::AutoCreate)
        .await
        .unwrap()
}

fn doc(value: serde_json::Value) -> Document {
    Document::from_value(value).unwrap()
}

#[tokio::test]
async fn crud_scenario() -> StoreResult<()> {
    let client = MemoryClient::new();
    let store = open(&client).await;

    let u1 = store.upload_document(doc(json!({"title": "A"}))).await?;
    assert!(!u1.is_empty());

    let fetched = store.get_document(&u1).await?;
    assert_eq!(fetched.into_value(), json!({"title": "A", "id": u1}));
    assert_eq!(store.list_document_ids().await?, vec![u1.clone()]);

    store.delete_document(&u1).await?;
    assert!(store.list_document_ids().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn uploading_with_an_existing_id_overwrites() -> StoreResult<()> {
    let store = open(&MemoryClient::new()).await;

    store
        .upload_document(doc(json!({"id": "fixed", "value": 1, "extra": true})))
        .await?;
    let id = store
        .upload_document(doc(json!({"id": "fixed", "value": 2})))
        .await?;
    assert_eq!(id, "fixed");

    let fetched = store.get_document("fixed").await?;
    assert_eq!(fetched.into_value(), json!({"id": "fixed", "value": 2}));

    // same content twice reads back the same
    store
        .upload_document(doc(json!({"id": "fixed", "value": 2})))
        .await?;
    assert_eq!(
        store.get_document("fixed").await?.into_value(),
        json!({"id": "fixed", "value": 2})
    );
    Ok(())
}

#[tokio::test]
async fn generated_ids_are_fresh() -> StoreResult<()> {
    let store = open(&MemoryClient::new()).await;
    let a = store.upload_document(doc(json!({"n": 1}))).await?;
    let b = store.upload_document(doc(json!({"n": 1}))).await?;
    let c = store.upload_document(doc(json!({"id": "", "n": 1}))).await?;
    assert_ne!(a, b);
    assert_ne!(b, c);
    assert_eq!(store.list_document_ids().await?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn nested_values_round_trip() -> StoreResult<()> {
    let store = open(&MemoryClient::new()).await;
    let value = json!({
        "title": "Report",
        "tags": ["a", "b"],
        "meta": {"pages": 12, "draft": false, "ratio": 0.5, "owner": null}
    });
    let id = store.upload_document(doc(value.clone())).await?;

    let mut expected = value;
    expected["id"] = json!(id);
    assert_eq!(store.get_document(&id).await?.into_value(), expected);
    Ok(())
}

#[tokio::test]
async fn documents_can_be_read_into_typed_structs() -> StoreResult<()> {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Note {
        id: String,
        title: String,
    }

    let store = open(&MemoryClient::new()).await;
    let id = store.upload_document(doc(json!({"title": "typed"}))).await?;
    let note: Note = store.get_document_as(&id).await?;
    assert_eq!(
        note,
        Note {
            id,
            title: "typed".into()
        }
    );
    Ok(())
}

#[tokio::test]
async fn document_ids_are_distinct_regardless_of_object_count() -> StoreResult<()> {
    let store = open(&MemoryClient::new()).await;
    let id = store
        .upload_document_with_media(
            doc(json!({"id": "many"})),
            vec![
                MediaFile::new("a.png", "a"),
                MediaFile::new("b.png", "b"),
                MediaFile::new("c.txt", "c"),
            ],
        )
        .await?;
    store.upload_document(doc(json!({"id": "one"}))).await?;

    assert_eq!(id, "many");
    assert_eq!(store.list_document_ids().await?, vec!["many", "one"]);
    Ok(())
}

#[tokio::test]
async fn media_listing_excludes_the_document_body() -> StoreResult<()> {
    let client = MemoryClient::new();
    let store = open(&client).await;
    let id = store
        .upload_document_with_media(
            doc(json!({"title": "with media"})),
            vec![MediaFile::new("cover.png", "png"), MediaFile::new("raw", "bin")],
        )
        .await?;

    let mut names: Vec<_> = store
        .get_document_media(&id)
        .await?
        .into_iter()
        .map(|entry| {
            assert!(entry.last_modified.is_some());
            entry.name
        })
        .collect();
    names.sort();
    assert_eq!(names, vec!["cover.png", "raw"]);

    let cover = client
        .object_info("b1", &format!("c1/{}/cover.png", id))
        .await
        .unwrap();
    assert_eq!(cover.content_type.as_deref(), Some("image/png"));
    let body = client
        .object_info("b1", &format!("c1/{}/data.json", id))
        .await
        .unwrap();
    assert_eq!(body.content_type.as_deref(), Some("application/json"));

    assert_eq!(
        store.get_document_media_file(&id, "raw").await?,
        Bytes::from_static(b"bin")
    );
    Ok(())
}

#[tokio::test]
async fn deleting_a_document_removes_every_object() -> StoreResult<()> {
    let client = MemoryClient::new();
    let store = open(&client).await;
    store
        .upload_document_with_media(
            doc(json!({"id": "gone"})),
            vec![MediaFile::new("a.png", "a"), MediaFile::new("b.png", "b")],
        )
        .await?;
    store.upload_document(doc(json!({"id": "kept"}))).await?;

    store.delete_document("gone").await?;

    assert_eq!(store.list_document_ids().await?, vec!["kept"]);
    assert_eq!(
        client.keys("b1").await,
        vec!["c1/", "c1/kept/data.json"]
    );
    Ok(())
}

#[tokio::test]
async fn deleting_a_document_spanning_several_listing_pages() -> StoreResult<()> {
    let client = MemoryClient::new();
    let store = open(&client).await;
    let files = (0..1205)
        .map(|i| MediaFile::new(format!("m{:04}.bin", i), "x"))
        .collect();
    store
        .upload_document_with_media(doc(json!({"id": "big"})), files)
        .await?;
    assert_eq!(client.keys("b1").await.len(), 1207);

    store.delete_document("big").await?;

    assert!(store.list_document_ids().await?.is_empty());
    assert_eq!(client.keys("b1").await, vec!["c1/"]);
    Ok(())
}

#[tokio::test]
async fn invalid_media_names_reject_the_whole_upload() {
    for bad in ["a/b.png", "..", "data.json"] {
        let client = MemoryClient::new();
        let store = open(&client).await;
        let err = store
            .upload_document_with_media(
                doc(json!({"id": "d1"})),
                vec![MediaFile::new("ok.png", "1"), MediaFile::new(bad, "2")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey { kind: "media name", .. }));
        assert_eq!(client.keys("b1").await, vec!["c1/"]);
        assert!(store.list_document_ids().await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn deleting_a_missing_document_is_not_found() {
    let store = open(&MemoryClient::new()).await;
    let err = store.delete_document("ghost").await.unwrap_err();
    assert!(matches!(err, StoreError::DocumentNotFound { ref id, .. } if id == "ghost"));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn reading_a_missing_document_is_not_found() {
    let store = open(&MemoryClient::new()).await;
    assert!(matches!(
        store.get_document("ghost").await,
        Err(StoreError::DocumentNotFound { .. })
    ));
}

#[tokio::test]
async fn unparsable_bodies_are_parse_errors() {
    let client = MemoryClient::new();
    let store = open(&client).await;
    client
        .put_object("b1", "c1/bad/data.json", Bytes::from_static(b"{not json"), None)
        .await
        .unwrap();
    client
        .put_object("b1", "c1/list/data.json", Bytes::from_static(b"[1,2]"), None)
        .await
        .unwrap();

    assert!(matches!(
        store.get_document("bad").await,
        Err(StoreError::Parse { ref key, .. }) if key == "c1/bad/data.json"
    ));
    assert!(matches!(
        store.get_document("list").await,
        Err(StoreError::Parse { .. })
    ));
}

#[tokio::test]
async fn deleting_media_ignores_missing_names() -> StoreResult<()> {
    let client = MemoryClient::new();
    let store = open(&client).await;
    store
        .upload_document_with_media(
            doc(json!({"id": "d"})),
            vec![MediaFile::new("a.png", "a"), MediaFile::new("b.png", "b")],
        )
        .await?;

    store
        .delete_document_media("d", &["a.png".to_string(), "missing.gif".to_string()])
        .await?;
    store.delete_document_media("d", &[]).await?;

    let names: Vec<_> = store
        .get_document_media("d")
        .await?
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["b.png"]);
    assert!(store.get_document("d").await.is_ok());

    assert!(matches!(
        store.delete_document_media("d", &["data.json".to_string()]).await,
        Err(StoreError::InvalidKey { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn ids_with_path_separators_are_rejected() {
    let store = open(&MemoryClient::new()).await;
    assert!(matches!(
        store.upload_document(doc(json!({"id": "a/b"}))).await,
        Err(StoreError::InvalidKey { .. })
    ));
    assert!(matches!(
        store.get_document("..").await,
        Err(StoreError::InvalidKey { .. })
    ));
}

#[tokio::test]
async fn signed_urls_point_at_the_document_body() -> StoreResult<()> {
    let store = open(&MemoryClient::new())
        .await
        .with_url_expiry(Duration::from_secs(60));
    let id = store.upload_document(doc(json!({"x": 1}))).await?;
    let url = store.get_document_url(&id).await?;
    assert!(url.starts_with(&format!("memory://b1/c1/{}/data.json?", id)));
    assert!(url.contains("X-Amz-Expires=60"));
    Ok(())
}

#[tokio::test]
async fn strict_initialization_requires_bucket_and_collection() {
    let client = MemoryClient::new();
    let strict = |client: &MemoryClient| {
        DocumentStore::initialize(Arc::new(client.clone()), "b1", "c1", InitPolicy::Strict)
    };

    assert!(matches!(
        strict(&client).await,
        Err(StoreError::BucketNotFound(ref b)) if b == "b1"
    ));

    client.create_bucket("b1").await.unwrap();
    assert!(matches!(
        strict(&client).await,
        Err(StoreError::CollectionNotFound { .. })
    ));

    // a collection is also discovered through its children
    client
        .put_object("b1", "c1/u1/data.json", Bytes::from_static(b"{}"), None)
        .await
        .unwrap();
    let store = strict(&client).await.unwrap();
    assert_eq!(store.bucket(), "b1");
    assert_eq!(store.collection(), "c1");
    assert!(!client.keys("b1").await.contains(&"c1/".to_string()));
}

#[tokio::test]
async fn auto_create_initialization_is_idempotent() {
    let client = MemoryClient::new();
    open(&client).await;
    open(&client).await;
    assert_eq!(client.list_buckets().await.unwrap(), vec!["b1"]);
    assert_eq!(client.keys("b1").await, vec!["c1/"]);
}

#[tokio::test]
async fn empty_names_fail_before_any_storage_call() {
    let client = MemoryClient::new();
    for (bucket, collection) in [("", "c1"), ("b1", ""), ("b1", "  ")] {
        let result = DocumentStore::initialize(
            Arc::new(client.clone()),
            bucket,
            collection,
            InitPolicy::AutoCreate,
        )
        .await;
        assert!(matches!(result, Err(StoreError::Precondition(_))));
    }
    assert!(client.list_buckets().await.unwrap().is_empty());
}

/// Delegates to a `MemoryClient` but refuses writes whose key ends in `.fail`.
struct FlakyClient {
    inner: MemoryClient,
    puts: AtomicUsize,
}

#[async_trait]
impl ObjectClient for FlakyClient {
    async fn list_buckets(&self) -> StoreResult<Vec<String>> {
        self.inner.list_buckets().await
    }

    async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.inner.create_bucket(bucket).await
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        delimiter: Option<&str>,
    ) -> StoreResult<ListObjectsOutput> {
        self.inner.list_objects(bucket, prefix, delimiter).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        self.inner.get_object(bucket, key).await
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> StoreResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if key.ends_with(".fail") {
            return Err(StoreError::storage("put_object", "simulated outage"));
        }
        self.inner.put_object(bucket, key, body, content_type).await
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> StoreResult<()> {
        self.inner.delete_objects(bucket, keys).await
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StoreResult<String> {
        self.inner.presign_get(bucket, key, expires_in).await
    }
}

#[tokio::test]
async fn media_failures_do_not_roll_back_other_writes() {
    let memory = MemoryClient::new();
    let flaky = Arc::new(FlakyClient {
        inner: memory.clone(),
        puts: AtomicUsize::new(0),
    });
    let store = DocumentStore::initialize(flaky.clone(), "b1", "c1", InitPolicy::AutoCreate)
        .await
        .unwrap();
    let before = flaky.puts.load(Ordering::SeqCst);

    let err = store
        .upload_document_with_media(
            doc(json!({"id": "partial"})),
            vec![
                MediaFile::new("ok-1.png", "1"),
                MediaFile::new("broken.fail", "x"),
                MediaFile::new("ok-2.png", "2"),
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Storage { operation: "put_object", .. }));

    // document + all three media writes were issued
    assert_eq!(flaky.puts.load(Ordering::SeqCst) - before, 4);
    assert!(store.get_document("partial").await.is_ok());
    let mut names: Vec<_> = store
        .get_document_media("partial")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["ok-1.png", "ok-2.png"]);
}
