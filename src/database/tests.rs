use super::*;
use futures::StreamExt;
use httpmock::prelude::*;
use reqwest::Client;
use reqwest_middleware::ClientBuilder;
use serde_json::json;

fn database_for(server: &MockServer) -> RealtimeDatabase {
    let client = ClientBuilder::new(Client::new()).build();
    RealtimeDatabase::new_with_client(client, server.url(""))
}

#[tokio::test]
async fn test_read_once_returns_value() {
    let server = MockServer::start();
    let db = database_for(&server);

    let mock = server.mock(|when, then| {
        when.method(GET).path("/Books/b1.json");
        then.status(200).json_body(json!({
            "id": "b1",
            "title": "Rust in Action",
            "viewsCount": 3
        }));
    });

    let value = db.read_once("Books/b1").await.unwrap().unwrap();
    assert_eq!(value["title"], "Rust in Action");
    assert_eq!(value["viewsCount"], 3);
    mock.assert();
}

#[tokio::test]
async fn test_read_once_empty_location_is_none() {
    let server = MockServer::start();
    let db = database_for(&server);

    server.mock(|when, then| {
        when.method(GET).path("/Books/missing.json");
        then.status(200).body("null");
    });

    assert!(db.read_once("Books/missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_read_once_surfaces_api_error() {
    let server = MockServer::start();
    let db = database_for(&server);

    server.mock(|when, then| {
        when.method(GET).path("/Books.json");
        then.status(401).json_body(json!({"error": "Permission denied"}));
    });

    let err = db.read_once("Books").await.unwrap_err();
    match err {
        DatabaseError::ApiError(msg) => assert_eq!(msg, "Permission denied"),
        other => panic!("expected ApiError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_write_puts_value() {
    let server = MockServer::start();
    let db = database_for(&server);

    let mock = server.mock(|when, then| {
        when.method(PUT)
            .path("/Categories/100.json")
            .header("content-type", "application/json")
            .body_includes("Computer Science");
        then.status(200).json_body(json!({"category": "Computer Science"}));
    });

    db.write("Categories/100", &json!({"category": "Computer Science"}))
        .await
        .unwrap();
    mock.assert();
}

#[tokio::test]
async fn test_update_patches_fields() {
    let server = MockServer::start();
    let db = database_for(&server);

    let mock = server.mock(|when, then| {
        when.method(PATCH)
            .path("/Books/b1.json")
            .body_includes("viewsCount");
        then.status(200).json_body(json!({"viewsCount": 4}));
    });

    let mut fields = Map::new();
    fields.insert("viewsCount".to_string(), Value::from(4));
    db.update("Books/b1", &fields).await.unwrap();
    mock.assert();
}

#[tokio::test]
async fn test_delete_removes_location() {
    let server = MockServer::start();
    let db = database_for(&server);

    let mock = server.mock(|when, then| {
        when.method(DELETE).path("/Books/b1.json");
        then.status(200).body("null");
    });

    db.delete("Books/b1").await.unwrap();
    mock.assert();
}

#[tokio::test]
async fn test_subscribe_emits_full_snapshots_per_change() {
    let server = MockServer::start();
    let db = database_for(&server);

    let body = concat!(
        "event: put\n",
        "data: {\"path\":\"/\",\"data\":{\"b1\":{\"id\":\"b1\",\"title\":\"Rust in Action\"}}}\n",
        "\n",
        "event: keep-alive\n",
        "data: null\n",
        "\n",
        "event: patch\n",
        "data: {\"path\":\"/\",\"data\":{\"b2\":{\"id\":\"b2\",\"title\":\"The Go Book\"}}}\n",
        "\n",
    );

    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/Books.json")
            .header("accept", "text/event-stream");
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(body);
    });

    let mut snapshots = db.subscribe("Books").await.unwrap();

    let first = snapshots.next().await.unwrap().unwrap();
    assert_eq!(
        first,
        json!({"b1": {"id": "b1", "title": "Rust in Action"}})
    );

    // keep-alive is swallowed; the next item is the patched state with
    // both children present.
    let second = snapshots.next().await.unwrap().unwrap();
    assert_eq!(second["b1"]["title"], "Rust in Action");
    assert_eq!(second["b2"]["title"], "The Go Book");

    assert!(snapshots.next().await.is_none());
    mock.assert();
}

#[tokio::test]
async fn test_subscribe_cancel_event_is_an_error() {
    let server = MockServer::start();
    let db = database_for(&server);

    let body = concat!(
        "event: put\n",
        "data: {\"path\":\"/\",\"data\":null}\n",
        "\n",
        "event: cancel\n",
        "data: null\n",
        "\n",
    );

    server.mock(|when, then| {
        when.method(GET).path("/Books.json");
        then.status(200).body(body);
    });

    let mut snapshots = db.subscribe("Books").await.unwrap();
    assert!(snapshots.next().await.unwrap().is_ok());
    assert!(snapshots.next().await.unwrap().is_err());
    // The stream terminates after a terminal error.
    assert!(snapshots.next().await.is_none());
}
