use super::*;
use httpmock::prelude::*;
use reqwest::Client;
use reqwest_middleware::ClientBuilder;
use serde_json::json;

fn storage_for(server: &MockServer) -> FileStorage {
    let client = ClientBuilder::new(Client::new()).build();
    FileStorage::new_with_client(client, server.url(""))
}

#[tokio::test]
async fn test_fetch_metadata_reads_size() {
    let server = MockServer::start();
    let storage = storage_for(&server);

    let mock = server.mock(|when, then| {
        when.method(GET).path("/b/test-bucket/o/b1.pdf");
        then.status(200).json_body(json!({
            "name": "b1.pdf",
            "bucket": "test-bucket",
            "size": "2048"
        }));
    });

    let metadata = storage
        .fetch_metadata("gs://test-bucket/b1.pdf")
        .await
        .unwrap();
    assert_eq!(metadata, BlobMetadata { size_bytes: 2048 });
    mock.assert();
}

#[tokio::test]
async fn test_fetch_metadata_without_size_is_an_error() {
    let server = MockServer::start();
    let storage = storage_for(&server);

    server.mock(|when, then| {
        when.method(GET).path("/b/test-bucket/o/b1.pdf");
        then.status(200).json_body(json!({"name": "b1.pdf"}));
    });

    let err = storage
        .fetch_metadata("gs://test-bucket/b1.pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::ApiError(_)));
}

#[tokio::test]
async fn test_fetch_bytes_sends_range_header() {
    let server = MockServer::start();
    let storage = storage_for(&server);

    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/b/test-bucket/o/b1.pdf")
            .query_param("alt", "media")
            .header("range", "bytes=0-9");
        then.status(206).body("0123456789");
    });

    let bytes = storage
        .fetch_bytes("gs://test-bucket/b1.pdf", 10)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"0123456789");
    mock.assert();
}

#[tokio::test]
async fn test_fetch_bytes_truncates_oversized_response() {
    let server = MockServer::start();
    let storage = storage_for(&server);

    // A server that ignores the range request and returns everything.
    server.mock(|when, then| {
        when.method(GET).path("/b/test-bucket/o/b1.pdf");
        then.status(200).body("0123456789abcdef");
    });

    let bytes = storage
        .fetch_bytes("gs://test-bucket/b1.pdf", 4)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"0123");
}

#[tokio::test]
async fn test_delete_blob() {
    let server = MockServer::start();
    let storage = storage_for(&server);

    let mock = server.mock(|when, then| {
        when.method(DELETE).path("/b/test-bucket/o/b1.pdf");
        then.status(204);
    });

    storage.delete_blob("gs://test-bucket/b1.pdf").await.unwrap();
    mock.assert();
}

#[tokio::test]
async fn test_delete_blob_surfaces_api_error() {
    let server = MockServer::start();
    let storage = storage_for(&server);

    server.mock(|when, then| {
        when.method(DELETE).path("/b/test-bucket/o/b1.pdf");
        then.status(403).json_body(json!({
            "error": {"code": 403, "message": "forbidden"}
        }));
    });

    let err = storage
        .delete_blob("gs://test-bucket/b1.pdf")
        .await
        .unwrap_err();
    match err {
        StorageError::ApiError(msg) => assert_eq!(msg, "forbidden (code: 403)"),
        other => panic!("expected ApiError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_locator_fails_without_a_request() {
    let server = MockServer::start();
    let storage = storage_for(&server);

    let err = storage.fetch_metadata("not-a-locator").await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidLocator(_)));
}

#[tokio::test]
async fn test_download_url_locator_addresses_encoded_object() {
    let server = MockServer::start();
    let storage = storage_for(&server);

    // Object names containing slashes are re-encoded on the wire.
    let mock = server.mock(|when, then| {
        when.method(GET).path("/b/test-bucket/o/Books%2F100");
        then.status(200).json_body(json!({"size": "500"}));
    });

    let metadata = storage
        .fetch_metadata("https://firebasestorage.googleapis.com/v0/b/test-bucket/o/Books%2F100?alt=media&token=t")
        .await
        .unwrap();
    assert_eq!(metadata.size_bytes, 500);
    mock.assert();
}
