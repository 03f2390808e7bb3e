//! Verify command implementation.

use digitool_core::{Config, Store};
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of collections checked.
    pub collections_checked: usize,
    /// Number of indexes rebuilt from documents.
    pub indexes_rebuilt: usize,
    /// Indexes whose persisted state was stale, missing or corrupt.
    pub repaired: Vec<String>,
    /// Collections whose documents could not be read.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying data directory at {}", path.display());
    println!();

    let store = Store::open_with_config(path, Config::default().create_if_missing(false))?;
    let result = verify(&store)?;

    println!("Collections checked: {}", result.collections_checked);
    println!("Indexes rebuilt:     {}", result.indexes_rebuilt);
    for repaired in &result.repaired {
        println!("  repaired {repaired}");
    }
    for error in &result.errors {
        println!("  ERROR {error}");
    }

    println!();
    if result.is_ok() {
        println!("✓ Verification passed");
        Ok(())
    } else {
        println!("✗ Verification failed");
        Err("Verification failed".into())
    }
}

/// Rebuilds every index of every collection.
///
/// Opening a collection already repairs indexes whose persisted state does
/// not match its documents; those are reported as repaired.
pub fn verify(store: &Store) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::default();

    for name in store.list_databases()? {
        let database = store.database(&name)?;
        for collection in database.list_collections()? {
            result.collections_checked += 1;
            let handle = match database.get_collection(&collection) {
                Ok(Some(handle)) => handle,
                Ok(None) => continue,
                Err(err) => {
                    result.errors.push(format!("{name}.{collection}: {err}"));
                    continue;
                }
            };

            for recovered in handle.recovered_indexes()? {
                result.repaired.push(format!(
                    "{name}.{collection}.{}: {}",
                    recovered.field, recovered.reason
                ));
            }
            handle.rebuild_indexes()?;
            result.indexes_rebuilt += handle.list_indices()?.len();
        }
    }

    Ok(result)
}
