//! Typed request model and dispatcher.
//!
//! Requests and responses are JSON objects. A request names its operation
//! in an `operation` field:
//!
//! ```json
//! {"operation": "find", "database": "shop", "collection": "users", "query": {"age": 30}}
//! ```
//!
//! and is answered by
//!
//! ```json
//! {"success": true, "data": [...]}
//! {"success": false, "error": "...", "kind": "validation"}
//! ```

use crate::collection::Collection;
use crate::database::Database;
use crate::document::{Document, DocumentId, Fields};
use crate::error::{CoreError, CoreResult, ErrorKind};
use crate::naming::validate_collection_name;
use crate::query::{Filter, Update};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// One client request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Request {
    /// Lists database names.
    ListDatabases,
    /// Creates a database.
    CreateDatabase {
        /// Database name.
        #[serde(alias = "db_name")]
        database: String,
    },
    /// Drops a database and everything in it.
    DropDatabase {
        /// Database name.
        #[serde(alias = "db_name")]
        database: String,
    },
    /// Lists the collections of a database.
    ListCollections {
        /// Database name.
        #[serde(alias = "db_name")]
        database: String,
    },
    /// Creates a collection, and its database if needed.
    CreateCollection {
        /// Database name.
        #[serde(alias = "db_name")]
        database: String,
        /// Collection name.
        #[serde(alias = "collection_name")]
        collection: String,
    },
    /// Drops a collection.
    DropCollection {
        /// Database name.
        #[serde(alias = "db_name")]
        database: String,
        /// Collection name.
        #[serde(alias = "collection_name")]
        collection: String,
    },
    /// Inserts one document.
    Insert {
        /// Database name.
        #[serde(alias = "db_name")]
        database: String,
        /// Collection name.
        #[serde(alias = "collection_name")]
        collection: String,
        /// The document.
        document: Fields,
    },
    /// Finds documents.
    Find {
        /// Database name.
        #[serde(alias = "db_name")]
        database: String,
        /// Collection name.
        #[serde(alias = "collection_name")]
        collection: String,
        /// Query document; absent means everything.
        #[serde(default)]
        query: Value,
    },
    /// Updates matching documents.
    Update {
        /// Database name.
        #[serde(alias = "db_name")]
        database: String,
        /// Collection name.
        #[serde(alias = "collection_name")]
        collection: String,
        /// Query document.
        query: Value,
        /// Update document.
        update: Value,
    },
    /// Deletes matching documents.
    Delete {
        /// Database name.
        #[serde(alias = "db_name")]
        database: String,
        /// Collection name.
        #[serde(alias = "collection_name")]
        collection: String,
        /// Query document.
        query: Value,
    },
    /// Creates an index on a field.
    CreateIndex {
        /// Database name.
        #[serde(alias = "db_name")]
        database: String,
        /// Collection name.
        #[serde(alias = "collection_name")]
        collection: String,
        /// Field to index.
        field: String,
    },
    /// Drops the index on a field.
    DropIndex {
        /// Database name.
        #[serde(alias = "db_name")]
        database: String,
        /// Collection name.
        #[serde(alias = "collection_name")]
        collection: String,
        /// Indexed field.
        field: String,
    },
    /// Lists indexed fields.
    ListIndices {
        /// Database name.
        #[serde(alias = "db_name")]
        database: String,
        /// Collection name.
        #[serde(alias = "collection_name")]
        collection: String,
    },
}

impl Request {
    /// Decodes a request from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRequest`] for malformed JSON, unknown
    /// operations or missing fields.
    pub fn from_slice(bytes: &[u8]) -> CoreResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| CoreError::invalid_request(e.to_string()))
    }

    /// Returns the wire name of the operation.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Request::ListDatabases => "list_databases",
            Request::CreateDatabase { .. } => "create_database",
            Request::DropDatabase { .. } => "drop_database",
            Request::ListCollections { .. } => "list_collections",
            Request::CreateCollection { .. } => "create_collection",
            Request::DropCollection { .. } => "drop_collection",
            Request::Insert { .. } => "insert",
            Request::Find { .. } => "find",
            Request::Update { .. } => "update",
            Request::Delete { .. } => "delete",
            Request::CreateIndex { .. } => "create_index",
            Request::DropIndex { .. } => "drop_index",
            Request::ListIndices { .. } => "list_indices",
        }
    }
}

/// Typed result of a successful request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// No payload.
    Done,
    /// A sorted list of names.
    Names(Vec<String>),
    /// Whether something was created or removed.
    Flag(bool),
    /// Id of an inserted document.
    Inserted(DocumentId),
    /// Matching documents in storage order.
    Documents(Vec<Document>),
    /// Number of updated documents.
    Updated(usize),
    /// Number of deleted documents.
    Deleted(usize),
}

impl Reply {
    /// Converts the reply to its wire payload, if any.
    #[must_use]
    pub fn into_data(self) -> Option<Value> {
        match self {
            Reply::Done => None,
            Reply::Names(names) => Some(json!(names)),
            Reply::Flag(flag) => Some(Value::Bool(flag)),
            Reply::Inserted(id) => Some(json!({ "_id": id })),
            Reply::Documents(documents) => Some(Value::Array(
                documents.into_iter().map(Value::from).collect(),
            )),
            Reply::Updated(count) => Some(json!({ "updated_count": count })),
            Reply::Deleted(count) => Some(json!({ "deleted_count": count })),
        }
    }
}

/// Wire form of a reply or error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Whether the request succeeded.
    pub success: bool,
    /// Payload of a successful request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error message of a failed request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error class of a failed request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl Response {
    /// A successful response.
    #[must_use]
    pub fn ok(data: Option<Value>) -> Self {
        Self {
            success: true,
            data,
            error: None,
            kind: None,
        }
    }

    /// A failed response.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            kind: Some(kind),
        }
    }
}

impl From<Reply> for Response {
    fn from(reply: Reply) -> Self {
        Response::ok(reply.into_data())
    }
}

impl From<&CoreError> for Response {
    fn from(err: &CoreError) -> Self {
        Response::error(err.kind(), err.to_string())
    }
}

impl From<CoreResult<Reply>> for Response {
    fn from(result: CoreResult<Reply>) -> Self {
        match result {
            Ok(reply) => reply.into(),
            Err(err) => (&err).into(),
        }
    }
}

impl Store {
    /// Executes one request.
    ///
    /// `find`, `update` and `delete` on a missing database or collection
    /// return empty results without creating anything; `insert` and
    /// `create_collection` create on demand; index operations require the
    /// collection to exist.
    pub fn execute(&self, request: Request) -> CoreResult<Reply> {
        debug!(operation = request.operation(), "executing request");
        match request {
            Request::ListDatabases => self.list_databases().map(Reply::Names),
            Request::CreateDatabase { database } => {
                self.create_database(&database)?;
                Ok(Reply::Done)
            }
            Request::DropDatabase { database } => {
                self.drop_database(&database)?;
                Ok(Reply::Done)
            }
            Request::ListCollections { database } => self
                .require_database(&database)?
                .list_collections()
                .map(Reply::Names),
            Request::CreateCollection {
                database,
                collection,
            } => {
                validate_collection_name(&collection)?;
                self.database(&database)?.create_collection(&collection)?;
                Ok(Reply::Done)
            }
            Request::DropCollection {
                database,
                collection,
            } => self
                .require_database(&database)?
                .drop_collection(&collection)
                .map(Reply::Flag),
            Request::Insert {
                database,
                collection,
                document,
            } => {
                validate_collection_name(&collection)?;
                Document::validate_new(&document)?;
                self.database(&database)?
                    .collection(&collection)?
                    .insert(document)
                    .map(Reply::Inserted)
            }
            Request::Find {
                database,
                collection,
                query,
            } => {
                Filter::parse(&query)?;
                match self.existing_collection(&database, &collection)? {
                    Some(coll) => coll.find(&query).map(Reply::Documents),
                    None => Ok(Reply::Documents(Vec::new())),
                }
            }
            Request::Update {
                database,
                collection,
                query,
                update,
            } => {
                Filter::parse(&query)?;
                Update::parse(&update)?;
                match self.existing_collection(&database, &collection)? {
                    Some(coll) => coll.update(&query, &update).map(Reply::Updated),
                    None => Ok(Reply::Updated(0)),
                }
            }
            Request::Delete {
                database,
                collection,
                query,
            } => {
                Filter::parse(&query)?;
                match self.existing_collection(&database, &collection)? {
                    Some(coll) => coll.delete(&query).map(Reply::Deleted),
                    None => Ok(Reply::Deleted(0)),
                }
            }
            Request::CreateIndex {
                database,
                collection,
                field,
            } => self
                .require_collection(&database, &collection)?
                .create_index(&field)
                .map(Reply::Flag),
            Request::DropIndex {
                database,
                collection,
                field,
            } => self
                .require_collection(&database, &collection)?
                .drop_index(&field)
                .map(Reply::Flag),
            Request::ListIndices {
                database,
                collection,
            } => self
                .require_collection(&database, &collection)?
                .list_indices()
                .map(|fields| Reply::Names(fields.into_iter().collect())),
        }
    }

    /// Executes a request and converts the outcome to its wire form.
    pub fn handle(&self, request: Request) -> Response {
        self.execute(request).into()
    }

    fn require_database(&self, database: &str) -> CoreResult<Arc<Database>> {
        self.get_database(database)?
            .ok_or_else(|| CoreError::DatabaseNotFound {
                name: database.to_string(),
            })
    }

    fn existing_collection(
        &self,
        database: &str,
        collection: &str,
    ) -> CoreResult<Option<Arc<Collection>>> {
        match self.get_database(database)? {
            Some(db) => db.get_collection(collection),
            None => {
                validate_collection_name(collection)?;
                Ok(None)
            }
        }
    }

    fn require_collection(&self, database: &str, collection: &str) -> CoreResult<Arc<Collection>> {
        self.require_database(database)?
            .get_collection(collection)?
            .ok_or_else(|| CoreError::CollectionNotFound {
                database: database.to_string(),
                name: collection.to_string(),
            })
    }
}
