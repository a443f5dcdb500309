//! Packed resource collection and index format
//!
//! Everything a self-contained Vela distribution needs to carry its
//! importable resources inside (or next to) the host binary:
//!
//! - **policy**: storage placement policy fixed at collector construction
//! - **resource**: the resource model (kinds, origins, payloads)
//! - **collector**: accumulates scanned resources, finalizes to an index
//! - **index**: the immutable, ordered resource index
//! - **format**: the versioned binary blob encoding of an index
//! - **codec**: length-prefixed little-endian encoding primitives
//!
//! The expected pipeline: a directory scanner yields [`RawResource`]
//! descriptors, a [`ResourceCollector`] accumulates them under a [`Policy`],
//! [`ResourceCollector::finalize`] produces a [`ResourceIndex`] plus file
//! installs, and [`ResourceIndex::encode`] emits the blob shipped with the
//! binary.

pub mod codec;
pub mod collector;
pub mod format;
pub mod index;
pub mod policy;
pub mod resource;

pub use codec::DecodeError;
pub use collector::{
    CollectorConfig, CollectorError, FileInstall, FinalizedCollection, OnDuplicate,
    ResourceCollector, DEFAULT_RUNTIME_TAG,
};
pub use format::{DecodeOptions, FormatError, FORMAT_VERSION, MAGIC};
pub use index::ResourceIndex;
pub use policy::{ConfigurationError, Policy, ALL_POLICIES};
pub use resource::{Origin, Payload, RawResource, Resource, ResourceKind};
