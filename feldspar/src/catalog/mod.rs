//! Catalog metadata consumed by the optimizer.
//!
//! The optimizer only reads the catalog. Descriptors are handed out as `Arc`s and shared by
//! every operator referencing the table.
mod column;
pub use column::*;
mod table;
pub use table::*;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{OptError, OptResult};

pub trait Catalog: Send + Sync {
    fn table(&self, name: &str) -> OptResult<Arc<TableDescriptor>>;

    fn table_by_id(&self, id: TableId) -> OptResult<Arc<TableDescriptor>>;
}

/// Catalog kept in memory, used by tests and embedders without a host database.
#[derive(Default)]
pub struct MemoryCatalog {
    tables: RwLock<HashMap<String, Arc<TableDescriptor>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table, returning the descriptor previously registered under that name.
    pub fn register_table(&self, table: TableDescriptor) -> Option<Arc<TableDescriptor>> {
        self.tables
            .write()
            .insert(table.name().to_string(), Arc::new(table))
    }
}

impl Catalog for MemoryCatalog {
    fn table(&self, name: &str) -> OptResult<Arc<TableDescriptor>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| OptError::TableNotFound(name.to_string()).into())
    }

    fn table_by_id(&self, id: TableId) -> OptResult<Arc<TableDescriptor>> {
        self.tables
            .read()
            .values()
            .find(|t| t.id() == id)
            .cloned()
            .ok_or_else(|| OptError::TableNotFound(format!("{:?}", id)).into())
    }
}
