//! Host runtime seam
//!
//! The importer owns resolution, caching, and payload materialization; the
//! host runtime owns compilation and the actual execution of module code.
//! [`Host`] is the boundary between them. The importer never parses source
//! text itself.

use std::sync::Arc;

use thiserror::Error;

use crate::error::ImportError;

/// A failure reported by the host runtime.
#[derive(Debug, Error)]
pub enum HostError {
    /// Payload bytes do not decode as the kind claims (bad bytecode image,
    /// undecodable source).
    #[error("corrupt payload: {0}")]
    Corrupt(String),

    /// The module's own top-level code raised.
    #[error(transparent)]
    Failed(Box<dyn std::error::Error + Send + Sync>),
}

/// Re-entry point handed to the host during module evaluation.
///
/// Top-level module code triggers further imports while it runs; the host
/// routes those back through this context so circular imports resolve
/// against the same module cache.
pub trait ImportContext<M>: Sync {
    /// Resolve and execute another module by dotted name.
    fn import(&self, name: &str) -> Result<Arc<M>, ImportError>;

    /// Read a package data payload. `Ok(None)` when the name is not indexed.
    fn read_data(&self, name: &str) -> Result<Option<Vec<u8>>, ImportError>;
}

/// The host runtime's side of the import machinery.
pub trait Host: Send + Sync {
    /// The host's module object. Created before execution starts and handed
    /// to waiters even while top-level code is still running, so circular
    /// imports observe the partially initialized module.
    type Module: Send + Sync + 'static;

    /// Create a fresh, empty module namespace.
    fn new_module(&self, name: &str, is_package: bool) -> Self::Module;

    /// Compile source text to bytecode.
    fn compile(&self, name: &str, source: &[u8]) -> Result<Vec<u8>, HostError>;

    /// Run bytecode against a module namespace.
    fn evaluate(
        &self,
        ctx: &dyn ImportContext<Self::Module>,
        module: &Self::Module,
        bytecode: &[u8],
    ) -> Result<(), HostError>;
}
