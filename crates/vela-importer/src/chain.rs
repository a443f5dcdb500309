//! Importer chain
//!
//! The single registration point the host runtime consults for module
//! resolution. Importers are tried in registration order; a `find` miss
//! falls through to the next importer, and `execute` routes to the first
//! importer that claims the name. Holding the chain in one explicit value
//! (rather than process globals) keeps registration and lookup in the
//! host's hands.

use std::sync::Arc;

use crate::error::ImportError;
use crate::host::Host;
use crate::importer::{EmbeddedImporter, FoundModule};

/// An ordered set of embedded importers sharing one host runtime type.
pub struct ImportChain<H: Host> {
    importers: Vec<Arc<EmbeddedImporter<H>>>,
}

impl<H: Host> ImportChain<H> {
    pub fn new() -> Self {
        Self {
            importers: Vec::new(),
        }
    }

    /// Append an importer; earlier registrations win lookups.
    pub fn register(&mut self, importer: Arc<EmbeddedImporter<H>>) {
        self.importers.push(importer);
    }

    pub fn len(&self) -> usize {
        self.importers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.importers.is_empty()
    }

    /// Find a module in the first importer that answers.
    pub fn find(&self, name: &str) -> Option<FoundModule<'_>> {
        self.importers.iter().find_map(|imp| imp.find(name))
    }

    /// Execute a module via the first importer that claims the name.
    pub fn execute(&self, name: &str) -> Result<Arc<H::Module>, ImportError> {
        for importer in &self.importers {
            if importer.find(name).is_some() {
                return importer.execute(name);
            }
        }
        Err(ImportError::UnknownModule(name.to_string()))
    }

    /// Read package data from the first importer that has it.
    pub fn read_data(&self, name: &str) -> Result<Option<Vec<u8>>, ImportError> {
        for importer in &self.importers {
            if let Some(data) = importer.read_data(name)? {
                return Ok(Some(data));
            }
        }
        Ok(None)
    }
}

impl<H: Host> Default for ImportChain<H> {
    fn default() -> Self {
        Self::new()
    }
}
