//! Inspect command implementation.

use clap::ValueEnum;
use digitool_core::{Config, IndexStats, Store};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Output format of `digi inspect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Data directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Data directory path.
    pub path: String,
    /// Total size of all artifacts in bytes.
    pub total_size: u64,
    /// Per-database details.
    pub databases: Vec<DatabaseReport>,
}

/// Details of one database.
#[derive(Debug, Serialize)]
pub struct DatabaseReport {
    /// Database name.
    pub name: String,
    /// Per-collection details.
    pub collections: Vec<CollectionReport>,
}

/// Details of one collection.
#[derive(Debug, Serialize)]
pub struct CollectionReport {
    /// Collection name.
    pub name: String,
    /// Number of documents, absent if the collection could not be opened.
    pub documents: Option<usize>,
    /// Index counters.
    pub indexes: Vec<IndexStats>,
    /// Indexes rebuilt while opening, with the reason.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recovered: Vec<String>,
    /// Why the collection could not be opened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open_with_config(path, Config::default().create_if_missing(false))?;
    let result = inspect(&store, path)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_text_output(&result),
    }
    Ok(())
}

/// Collects the report for an open store.
pub fn inspect(store: &Store, path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let mut databases = Vec::new();
    for name in store.list_databases()? {
        let database = store.database(&name)?;
        let mut collections = Vec::new();
        for collection in database.list_collections()? {
            let report = match database.get_collection(&collection) {
                Ok(Some(handle)) => {
                    let stats = handle.stats()?;
                    CollectionReport {
                        name: collection,
                        documents: Some(stats.documents),
                        indexes: stats.indexes,
                        recovered: handle
                            .recovered_indexes()?
                            .into_iter()
                            .map(|r| format!("{}: {}", r.field, r.reason))
                            .collect(),
                        error: None,
                    }
                }
                Ok(None) => continue,
                Err(err) => CollectionReport {
                    name: collection,
                    documents: None,
                    indexes: Vec::new(),
                    recovered: Vec::new(),
                    error: Some(err.to_string()),
                },
            };
            collections.push(report);
        }
        databases.push(DatabaseReport { name, collections });
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        total_size: directory_size(path)?,
        databases,
    })
}

fn directory_size(path: &Path) -> std::io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        total += if meta.is_dir() {
            directory_size(&entry.path())?
        } else {
            meta.len()
        };
    }
    Ok(total)
}

fn print_text_output(result: &InspectResult) {
    println!("DigitoolDB Data Directory");
    println!("=========================");
    println!();
    println!("Path: {}", result.path);
    println!("Size: {}", format_size(result.total_size));

    for database in &result.databases {
        println!();
        println!("Database {}:", database.name);
        if database.collections.is_empty() {
            println!("  (no collections)");
        }
        for collection in &database.collections {
            match (&collection.error, collection.documents) {
                (Some(err), _) => println!("  {}: unreadable ({err})", collection.name),
                (None, Some(documents)) => {
                    println!("  {}: {documents} documents", collection.name)
                }
                (None, None) => println!("  {}", collection.name),
            }
            for index in &collection.indexes {
                println!(
                    "    index {}: {} keys, {} entries",
                    index.field, index.keys, index.entries
                );
            }
            for recovered in &collection.recovered {
                println!("    rebuilt {recovered}");
            }
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reports_collections_and_indexes() {
        let temp = tempfile::tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();
        let users = store.database("shop").unwrap().collection("users").unwrap();
        for age in [1, 2, 2] {
            users
                .insert(json!({ "age": age }).as_object().unwrap().clone())
                .unwrap();
        }
        users.create_index("age").unwrap();
        store.database("empty").unwrap();

        let result = inspect(&store, temp.path()).unwrap();
        assert!(result.total_size > 0);
        assert_eq!(result.databases.len(), 2);
        assert!(result.databases[0].collections.is_empty());

        let report = &result.databases[1].collections[0];
        assert_eq!(report.name, "users");
        assert_eq!(report.documents, Some(3));
        assert_eq!(report.indexes[0].keys, 2);
        assert!(report.recovered.is_empty());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["databases"][1]["collections"][0]["indexes"][0]["field"], "age");
    }

    #[test]
    fn unreadable_collections_are_reported() {
        let temp = tempfile::tempdir().unwrap();
        {
            let store = Store::open(temp.path()).unwrap();
            store.database("shop").unwrap().collection("users").unwrap();
        }
        fs::write(temp.path().join("shop").join("users.json"), b"{oops").unwrap();

        let store = Store::open(temp.path()).unwrap();
        let result = inspect(&store, temp.path()).unwrap();
        let report = &result.databases[0].collections[0];
        assert!(report.documents.is_none());
        assert!(report.error.is_some());
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(12), "12 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
