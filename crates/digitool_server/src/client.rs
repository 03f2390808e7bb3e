//! TCP client.

use crate::error::{ServerError, ServerResult};
use crate::frame::{read_frame, write_frame, Frame};
use digitool_core::{DocumentId, Fields, Request, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

/// Largest response the client accepts.
const MAX_RESPONSE_BYTES: usize = 256 * 1024 * 1024;

/// A connection to a DigitoolDB server.
///
/// Requests are answered in order, one response per request.
#[derive(Debug)]
pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    buf: Vec<u8>,
}

impl Client {
    /// Connects to a server.
    pub async fn connect(addr: impl ToSocketAddrs) -> ServerResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read),
            writer,
            buf: Vec::new(),
        })
    }

    /// Sends a request and waits for its response.
    pub async fn call(&mut self, request: &Request) -> ServerResult<Response> {
        write_frame(&mut self.writer, request).await?;
        self.read_response().await
    }

    /// Sends raw frame bytes and waits for the response.
    ///
    /// A newline is appended. Useful for sending hand-written JSON.
    pub async fn call_raw(&mut self, frame: &[u8]) -> ServerResult<Response> {
        use tokio::io::AsyncWriteExt;

        self.writer.write_all(frame).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        self.read_response().await
    }

    async fn read_response(&mut self) -> ServerResult<Response> {
        match read_frame(&mut self.reader, MAX_RESPONSE_BYTES, &mut self.buf).await? {
            Frame::Line => serde_json::from_slice(&self.buf)
                .map_err(|e| ServerError::Protocol(format!("malformed response: {e}"))),
            Frame::TooLarge(size) => Err(ServerError::Protocol(format!(
                "response of {size} bytes is too large"
            ))),
            Frame::Eof => Err(ServerError::Protocol("connection closed by server".into())),
        }
    }

    /// Sends a request and returns its payload, failing on error responses.
    pub async fn request(&mut self, request: &Request) -> ServerResult<Option<Value>> {
        let response = self.call(request).await?;
        if response.success {
            Ok(response.data)
        } else {
            Err(ServerError::Remote {
                kind: response.kind,
                message: response.error.unwrap_or_default(),
            })
        }
    }

    async fn request_as<T: DeserializeOwned>(&mut self, request: &Request) -> ServerResult<T> {
        let data = self.request(request).await?.unwrap_or(Value::Null);
        serde_json::from_value(data)
            .map_err(|e| ServerError::Protocol(format!("unexpected payload: {e}")))
    }

    async fn count(&mut self, request: &Request, key: &str) -> ServerResult<usize> {
        let data = self.request(request).await?.unwrap_or(Value::Null);
        data.get(key)
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .ok_or_else(|| ServerError::Protocol(format!("missing {key} in reply")))
    }

    /// Lists database names.
    pub async fn list_databases(&mut self) -> ServerResult<Vec<String>> {
        self.request_as(&Request::ListDatabases).await
    }

    /// Creates a database.
    pub async fn create_database(&mut self, database: &str) -> ServerResult<()> {
        self.request(&Request::CreateDatabase {
            database: database.to_string(),
        })
        .await
        .map(drop)
    }

    /// Drops a database.
    pub async fn drop_database(&mut self, database: &str) -> ServerResult<()> {
        self.request(&Request::DropDatabase {
            database: database.to_string(),
        })
        .await
        .map(drop)
    }

    /// Lists the collections of a database.
    pub async fn list_collections(&mut self, database: &str) -> ServerResult<Vec<String>> {
        self.request_as(&Request::ListCollections {
            database: database.to_string(),
        })
        .await
    }

    /// Creates a collection.
    pub async fn create_collection(&mut self, database: &str, collection: &str) -> ServerResult<()> {
        self.request(&Request::CreateCollection {
            database: database.to_string(),
            collection: collection.to_string(),
        })
        .await
        .map(drop)
    }

    /// Drops a collection. Returns whether it existed.
    pub async fn drop_collection(&mut self, database: &str, collection: &str) -> ServerResult<bool> {
        self.request_as(&Request::DropCollection {
            database: database.to_string(),
            collection: collection.to_string(),
        })
        .await
    }

    /// Inserts a document and returns its id.
    pub async fn insert(
        &mut self,
        database: &str,
        collection: &str,
        document: Fields,
    ) -> ServerResult<DocumentId> {
        #[derive(serde::Deserialize)]
        struct Inserted {
            #[serde(rename = "_id")]
            id: DocumentId,
        }

        let inserted: Inserted = self
            .request_as(&Request::Insert {
                database: database.to_string(),
                collection: collection.to_string(),
                document,
            })
            .await?;
        Ok(inserted.id)
    }

    /// Finds documents matching `query`.
    pub async fn find(
        &mut self,
        database: &str,
        collection: &str,
        query: Value,
    ) -> ServerResult<Vec<Fields>> {
        self.request_as(&Request::Find {
            database: database.to_string(),
            collection: collection.to_string(),
            query,
        })
        .await
    }

    /// Updates documents matching `query`. Returns how many matched.
    pub async fn update(
        &mut self,
        database: &str,
        collection: &str,
        query: Value,
        update: Value,
    ) -> ServerResult<usize> {
        let request = Request::Update {
            database: database.to_string(),
            collection: collection.to_string(),
            query,
            update,
        };
        self.count(&request, "updated_count").await
    }

    /// Deletes documents matching `query`. Returns how many were removed.
    pub async fn delete(
        &mut self,
        database: &str,
        collection: &str,
        query: Value,
    ) -> ServerResult<usize> {
        let request = Request::Delete {
            database: database.to_string(),
            collection: collection.to_string(),
            query,
        };
        self.count(&request, "deleted_count").await
    }

    /// Creates an index. Returns true if it did not exist.
    pub async fn create_index(
        &mut self,
        database: &str,
        collection: &str,
        field: &str,
    ) -> ServerResult<bool> {
        self.request_as(&Request::CreateIndex {
            database: database.to_string(),
            collection: collection.to_string(),
            field: field.to_string(),
        })
        .await
    }

    /// Drops an index. Returns whether it existed.
    pub async fn drop_index(
        &mut self,
        database: &str,
        collection: &str,
        field: &str,
    ) -> ServerResult<bool> {
        self.request_as(&Request::DropIndex {
            database: database.to_string(),
            collection: collection.to_string(),
            field: field.to_string(),
        })
        .await
    }

    /// Lists indexed fields.
    pub async fn list_indices(
        &mut self,
        database: &str,
        collection: &str,
    ) -> ServerResult<Vec<String>> {
        self.request_as(&Request::ListIndices {
            database: database.to_string(),
            collection: collection.to_string(),
        })
        .await
    }
}
