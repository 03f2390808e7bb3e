//! Requests over TCP.

use digitool_core::{ErrorKind, Store};
use digitool_server::{Client, Server, ServerConfig, ServerError};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), ServerError>>,
}

async fn start(config: ServerConfig) -> Running {
    let store = Arc::new(Store::open_in_memory());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown, signal) = oneshot::channel::<()>();

    let server = Server::new(store, config);
    let handle = tokio::spawn(server.serve(listener, async {
        let _ = signal.await;
    }));
    Running {
        addr,
        shutdown,
        handle,
    }
}

fn document(value: Value) -> digitool_core::Fields {
    value.as_object().unwrap().clone()
}

#[tokio::test]
async fn alice_and_bob_over_tcp() {
    let server = start(ServerConfig::default()).await;
    let mut client = Client::connect(server.addr).await.unwrap();

    client
        .insert("test", "users", document(json!({"name": "Alice", "age": 30})))
        .await
        .unwrap();
    client
        .insert("test", "users", document(json!({"name": "Bob", "age": 25})))
        .await
        .unwrap();
    assert!(client.create_index("test", "users", "age").await.unwrap());

    let found = client
        .find("test", "users", json!({"age": 30}))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["name"], json!("Alice"));

    let updated = client
        .update(
            "test",
            "users",
            json!({"name": "Alice"}),
            json!({"$set": {"age": 31}}),
        )
        .await
        .unwrap();
    assert_eq!(updated, 1);
    let deleted = client
        .delete("test", "users", json!({"name": "Bob"}))
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    assert_eq!(client.list_databases().await.unwrap(), ["test"]);
    assert_eq!(client.list_collections("test").await.unwrap(), ["users"]);
    assert_eq!(
        client.list_indices("test", "users").await.unwrap(),
        ["age"]
    );

    server.shutdown.send(()).unwrap();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn malformed_frames_keep_the_connection_open() {
    let server = start(ServerConfig::default()).await;
    let mut client = Client::connect(server.addr).await.unwrap();

    let frames: [&[u8]; 3] = [b"{not json", br#"{"operation": "explode"}"#, b"[1, 2]"];
    for frame in frames {
        let response = client.call_raw(frame).await.unwrap();
        assert!(!response.success);
        assert_eq!(response.kind, Some(ErrorKind::Validation));
    }

    let response = client
        .call_raw(br#"{"operation": "list_databases"}"#)
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(response.data, Some(json!([])));
}

#[tokio::test]
async fn legacy_field_names_are_accepted() {
    let server = start(ServerConfig::default()).await;
    let mut client = Client::connect(server.addr).await.unwrap();

    let response = client
        .call_raw(br#"{"operation": "create_collection", "db_name": "shop", "collection_name": "items"}"#)
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(client.list_collections("shop").await.unwrap(), ["items"]);
}

#[tokio::test]
async fn oversized_frames_are_rejected() {
    let server = start(ServerConfig::default().with_max_request_bytes(64)).await;
    let mut client = Client::connect(server.addr).await.unwrap();

    let big = format!(
        r#"{{"operation": "insert", "database": "a", "collection": "b", "document": {{"x": "{}"}}}}"#,
        "y".repeat(128)
    );
    let response = client.call_raw(big.as_bytes()).await.unwrap();
    assert!(!response.success);
    assert_eq!(response.kind, Some(ErrorKind::Validation));

    assert!(client.list_databases().await.unwrap().is_empty());
}

#[tokio::test]
async fn errors_carry_their_kind() {
    let server = start(ServerConfig::default()).await;
    let mut client = Client::connect(server.addr).await.unwrap();

    let err = client
        .create_index("shop", "missing", "age")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServerError::Remote {
            kind: Some(ErrorKind::NotFound),
            ..
        }
    ));
    assert!(err.is_client_error());

    let err = client.create_database("bad name").await.unwrap_err();
    assert!(matches!(
        err,
        ServerError::Remote {
            kind: Some(ErrorKind::Validation),
            ..
        }
    ));

    // Missing targets read as empty.
    assert!(client
        .find("shop", "missing", json!({}))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        client
            .delete("shop", "missing", json!({}))
            .await
            .unwrap(),
        0
    );
    assert!(client.list_databases().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_clients() {
    let server = start(ServerConfig::default()).await;

    let tasks: Vec<_> = (0..8)
        .map(|worker| {
            let addr = server.addr;
            tokio::spawn(async move {
                let mut client = Client::connect(addr).await.unwrap();
                for n in 0..10 {
                    client
                        .insert("load", "items", document(json!({"worker": worker, "n": n})))
                        .await
                        .unwrap();
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let mut client = Client::connect(server.addr).await.unwrap();
    let all = client.find("load", "items", json!({})).await.unwrap();
    assert_eq!(all.len(), 80);
}

#[tokio::test]
async fn connection_limit_queues_extra_clients() {
    let server = start(ServerConfig::default().with_max_connections(1)).await;

    let mut first = Client::connect(server.addr).await.unwrap();
    first.list_databases().await.unwrap();

    let addr = server.addr;
    let second = tokio::spawn(async move {
        let mut client = Client::connect(addr).await.unwrap();
        client.list_databases().await.unwrap()
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!second.is_finished());

    drop(first);
    let names = tokio::time::timeout(Duration::from_secs(5), second)
        .await
        .unwrap()
        .unwrap();
    assert!(names.is_empty());
}

#[tokio::test]
async fn shutdown_stops_accepting() {
    let server = start(ServerConfig::default()).await;
    server.shutdown.send(()).unwrap();
    server.handle.await.unwrap().unwrap();

    assert!(Client::connect(server.addr).await.is_err());
}

#[tokio::test]
async fn open_serves_a_data_directory() {
    let temp = tempfile::tempdir().unwrap();
    let config = ServerConfig::default()
        .with_data_dir(temp.path())
        .with_sync_writes(false);
    let server = Server::open(config.clone()).unwrap();
    assert!(matches!(
        Server::open(config),
        Err(ServerError::Core(digitool_core::CoreError::DataDirLocked))
    ));

    server
        .store()
        .database("shop")
        .unwrap()
        .collection("users")
        .unwrap();
    assert!(temp.path().join("shop").join("users.json").is_file());
}
