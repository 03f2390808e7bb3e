//! Client command implementation.

use clap::Subcommand;
use digitool_core::{Fields, Request};
use digitool_server::Client;
use serde_json::Value;

/// One request, mirroring the wire operations.
#[derive(Debug, Subcommand)]
pub enum ClientOp {
    /// List databases
    ListDatabases,
    /// Create a database
    CreateDatabase {
        /// Database name
        database: String,
    },
    /// Drop a database
    DropDatabase {
        /// Database name
        database: String,
    },
    /// List the collections of a database
    ListCollections {
        /// Database name
        database: String,
    },
    /// Create a collection
    CreateCollection {
        /// Database name
        database: String,
        /// Collection name
        collection: String,
    },
    /// Drop a collection
    DropCollection {
        /// Database name
        database: String,
        /// Collection name
        collection: String,
    },
    /// Insert a JSON document
    Insert {
        /// Database name
        database: String,
        /// Collection name
        collection: String,
        /// Document as a JSON object
        document: String,
    },
    /// Find documents
    Find {
        /// Database name
        database: String,
        /// Collection name
        collection: String,
        /// Query as a JSON object; everything when omitted
        query: Option<String>,
    },
    /// Update matching documents
    Update {
        /// Database name
        database: String,
        /// Collection name
        collection: String,
        /// Query as a JSON object
        query: String,
        /// Update as a JSON object
        update: String,
    },
    /// Delete matching documents
    Delete {
        /// Database name
        database: String,
        /// Collection name
        collection: String,
        /// Query as a JSON object
        query: String,
    },
    /// Create an index
    CreateIndex {
        /// Database name
        database: String,
        /// Collection name
        collection: String,
        /// Field to index
        field: String,
    },
    /// Drop an index
    DropIndex {
        /// Database name
        database: String,
        /// Collection name
        collection: String,
        /// Indexed field
        field: String,
    },
    /// List indexed fields
    ListIndices {
        /// Database name
        database: String,
        /// Collection name
        collection: String,
    },
}

fn parse_json(what: &str, text: &str) -> Result<Value, Box<dyn std::error::Error>> {
    serde_json::from_str(text).map_err(|e| format!("invalid {what} JSON: {e}").into())
}

fn parse_document(text: &str) -> Result<Fields, Box<dyn std::error::Error>> {
    match parse_json("document", text)? {
        Value::Object(fields) => Ok(fields),
        _ => Err("document must be a JSON object".into()),
    }
}

impl ClientOp {
    /// Builds the request. JSON arguments are parsed here; their content is
    /// validated by the server.
    pub fn into_request(self) -> Result<Request, Box<dyn std::error::Error>> {
        let request = match self {
            ClientOp::ListDatabases => Request::ListDatabases,
            ClientOp::CreateDatabase { database } => Request::CreateDatabase { database },
            ClientOp::DropDatabase { database } => Request::DropDatabase { database },
            ClientOp::ListCollections { database } => Request::ListCollections { database },
            ClientOp::CreateCollection {
                database,
                collection,
            } => Request::CreateCollection {
                database,
                collection,
            },
            ClientOp::DropCollection {
                database,
                collection,
            } => Request::DropCollection {
                database,
                collection,
            },
            ClientOp::Insert {
                database,
                collection,
                document,
            } => Request::Insert {
                database,
                collection,
                document: parse_document(&document)?,
            },
            ClientOp::Find {
                database,
                collection,
                query,
            } => Request::Find {
                database,
                collection,
                query: match query {
                    Some(query) => parse_json("query", &query)?,
                    None => Value::Null,
                },
            },
            ClientOp::Update {
                database,
                collection,
                query,
                update,
            } => Request::Update {
                database,
                collection,
                query: parse_json("query", &query)?,
                update: parse_json("update", &update)?,
            },
            ClientOp::Delete {
                database,
                collection,
                query,
            } => Request::Delete {
                database,
                collection,
                query: parse_json("query", &query)?,
            },
            ClientOp::CreateIndex {
                database,
                collection,
                field,
            } => Request::CreateIndex {
                database,
                collection,
                field,
            },
            ClientOp::DropIndex {
                database,
                collection,
                field,
            } => Request::DropIndex {
                database,
                collection,
                field,
            },
            ClientOp::ListIndices {
                database,
                collection,
            } => Request::ListIndices {
                database,
                collection,
            },
        };
        Ok(request)
    }
}

/// Sends one request and prints the payload as JSON.
pub fn run(host: &str, port: u16, op: ClientOp) -> Result<(), Box<dyn std::error::Error>> {
    let request = op.into_request()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let response = runtime.block_on(async {
        let mut client = Client::connect((host, port)).await?;
        client.call(&request).await
    })?;

    if !response.success {
        let kind = response
            .kind
            .map(|kind| format!("{kind:?}"))
            .unwrap_or_else(|| "unknown".to_string());
        let message = response.error.unwrap_or_default();
        return Err(format!("{kind} error: {message}").into());
    }

    match response.data {
        Some(data) => println!("{}", serde_json::to_string_pretty(&data)?),
        None => println!("ok"),
    }
    Ok(())
}
