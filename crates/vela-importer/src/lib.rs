//! Embedded import machinery
//!
//! Resolves module-load requests against a packed resource index instead of
//! a filesystem search path:
//!
//! - **importer**: the [`EmbeddedImporter`], find/execute over a loaded index
//! - **cache**: the module cache with at-most-once execution per name
//! - **host**: the trait seam to the runtime's compiler and evaluator
//! - **native**: dynamic loading of extension module libraries
//! - **chain**: the registration point combining several importers
//!
//! The index itself (collection, format, encoding) lives in
//! `vela-resources`; this crate consumes it at process startup.

pub mod cache;
pub mod chain;
pub mod error;
pub mod host;
pub mod importer;
pub mod native;

pub use chain::ImportChain;
pub use error::ImportError;
pub use host::{Host, HostError, ImportContext};
pub use importer::{exe_relative_base, EmbeddedImporter, FoundModule, PayloadSource};
pub use native::{Library, NativeLoadError, ENTRY_SYMBOL};
