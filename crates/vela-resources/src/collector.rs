//! Resource collector
//!
//! Accumulates scanned resources under a storage policy and finalizes them
//! into an immutable [`ResourceIndex`] plus the list of files a packaging
//! harness must install next to the host binary.
//!
//! The collector is single-writer: all `add_*` calls and the terminal
//! [`ResourceCollector::finalize`] happen from one logical thread of
//! control. Finalization consumes the accumulated state, so it can succeed
//! at most once.

use std::collections::HashMap;

use thiserror::Error;

use crate::index::ResourceIndex;
use crate::policy::{ConfigurationError, Policy};
use crate::resource::{Origin, RawResource, Resource, ResourceKind};

/// Runtime tag written into index headers when the config does not set one.
pub const DEFAULT_RUNTIME_TAG: &str = concat!("vela-", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while collecting resources.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Collector was constructed without a policy
    #[error("collector construction requires a storage policy")]
    MissingPolicy,

    /// Invalid configuration value
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A resource with the same name and kind was already added
    #[error("duplicate resource: {kind} {name:?} already collected")]
    Duplicate { name: String, kind: ResourceKind },

    /// The kind cannot be stored under the requested origin
    #[error("{kind} resources cannot be loaded from memory")]
    UnsupportedKind { kind: ResourceKind },

    /// The policy forbids the requested origin
    #[error("storage policy {policy} forbids {origin} resources")]
    PolicyViolation { policy: Policy, origin: Origin },

    /// The collector was already finalized
    #[error("collector is finalized; no further mutation is possible")]
    Finalized,
}

/// What to do when an added resource collides on `(name, kind)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OnDuplicate {
    /// Fail the second add and keep the first entry intact.
    #[default]
    Reject,
    /// Replace the payload in place, keeping the original insertion slot.
    Replace,
}

/// Collector construction parameters.
///
/// `policy` is deliberately an `Option` with no default: constructing a
/// collector without choosing a placement policy is a configuration error,
/// not a silent fallback.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub policy: Option<Policy>,
    pub on_duplicate: OnDuplicate,
    pub runtime_tag: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            policy: None,
            on_duplicate: OnDuplicate::Reject,
            runtime_tag: DEFAULT_RUNTIME_TAG.to_string(),
        }
    }
}

impl CollectorConfig {
    /// A config with the given policy and defaults for everything else.
    pub fn new(policy: Policy) -> Self {
        Self {
            policy: Some(policy),
            ..Self::default()
        }
    }

    pub fn on_duplicate(mut self, on_duplicate: OnDuplicate) -> Self {
        self.on_duplicate = on_duplicate;
        self
    }

    pub fn runtime_tag(mut self, tag: impl Into<String>) -> Self {
        self.runtime_tag = tag.into();
        self
    }
}

/// One file the packaging harness must write relative to the host binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInstall {
    /// Install path relative to the binary's directory, `/`-separated.
    pub path: String,
    /// File contents.
    pub data: Vec<u8>,
    /// Whether the installed file needs the executable bit.
    pub executable: bool,
}

/// Result of finalizing a collector.
#[derive(Debug)]
pub struct FinalizedCollection {
    /// The immutable index, in insertion order.
    pub index: ResourceIndex,
    /// Files to materialize for every filesystem-relative entry.
    pub installs: Vec<FileInstall>,
}

#[derive(Debug)]
struct Slot {
    resource: Resource,
    /// Payload bytes staged for installation; `None` for in-memory entries.
    staged: Option<Vec<u8>>,
}

/// Accumulates resources under a storage policy.
#[derive(Debug)]
pub struct ResourceCollector {
    policy: Policy,
    on_duplicate: OnDuplicate,
    runtime_tag: String,
    slots: Vec<Slot>,
    by_key: HashMap<(String, ResourceKind), usize>,
    finalized: bool,
}

impl ResourceCollector {
    /// Construct a collector from a config.
    ///
    /// Fails with [`CollectorError::MissingPolicy`] when the config carries
    /// no policy.
    pub fn new(config: CollectorConfig) -> Result<Self, CollectorError> {
        let policy = config.policy.ok_or(CollectorError::MissingPolicy)?;
        Ok(Self {
            policy,
            on_duplicate: config.on_duplicate,
            runtime_tag: config.runtime_tag,
            slots: Vec::new(),
            by_key: HashMap::new(),
            finalized: false,
        })
    }

    /// The policy supplied at construction.
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Number of collected resources.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Add a resource whose payload is embedded in the index.
    ///
    /// Extension modules are rejected: a native library has to exist as a
    /// real file before the dynamic linker can open it.
    pub fn add_in_memory(&mut self, raw: RawResource) -> Result<(), CollectorError> {
        self.check_mutable()?;
        if raw.kind() == ResourceKind::ExtensionModule {
            return Err(CollectorError::UnsupportedKind { kind: raw.kind() });
        }
        self.check_policy(Origin::InMemory)?;

        let (kind, name, is_package, data) = raw.into_parts();
        let resource = Resource::in_memory(kind, name, is_package, data);
        self.insert(Slot {
            resource,
            staged: None,
        })
    }

    /// Add a resource installed as a file relative to the host binary.
    ///
    /// The install path is derived from `prefix`, the dotted name, the kind
    /// suffix, and the package flag; the payload bytes are staged and
    /// returned from [`finalize`](Self::finalize) as a [`FileInstall`].
    pub fn add_filesystem_relative(
        &mut self,
        prefix: &str,
        raw: RawResource,
    ) -> Result<(), CollectorError> {
        self.check_mutable()?;
        self.check_policy(Origin::FilesystemRelative)?;

        let (kind, name, is_package, data) = raw.into_parts();
        let path = install_path(prefix, kind, &name, is_package);
        let resource = Resource::filesystem_relative(kind, name, is_package, path);
        self.insert(Slot {
            resource,
            staged: Some(data),
        })
    }

    /// Consume the accumulated state into an immutable snapshot.
    ///
    /// Not idempotent: the internal state moves into the returned value, so
    /// a second call fails with [`CollectorError::Finalized`].
    pub fn finalize(&mut self) -> Result<FinalizedCollection, CollectorError> {
        self.check_mutable()?;
        self.finalized = true;

        let slots = std::mem::take(&mut self.slots);
        self.by_key.clear();

        let mut entries = Vec::with_capacity(slots.len());
        let mut installs = Vec::new();
        for slot in slots {
            if let (Some(path), Some(data)) = (slot.resource.relative_path(), slot.staged) {
                installs.push(FileInstall {
                    path: path.to_string(),
                    data,
                    executable: slot.resource.kind() == ResourceKind::ExtensionModule,
                });
            }
            entries.push(slot.resource);
        }

        Ok(FinalizedCollection {
            index: ResourceIndex::new(self.runtime_tag.clone(), entries),
            installs,
        })
    }

    fn check_mutable(&self) -> Result<(), CollectorError> {
        if self.finalized {
            Err(CollectorError::Finalized)
        } else {
            Ok(())
        }
    }

    fn check_policy(&self, origin: Origin) -> Result<(), CollectorError> {
        if self.policy.allows(origin) {
            Ok(())
        } else {
            Err(CollectorError::PolicyViolation {
                policy: self.policy,
                origin,
            })
        }
    }

    fn insert(&mut self, slot: Slot) -> Result<(), CollectorError> {
        let key = (
            slot.resource.name().to_string(),
            slot.resource.kind(),
        );
        match self.by_key.get(&key) {
            Some(&existing) => match self.on_duplicate {
                OnDuplicate::Reject => Err(CollectorError::Duplicate {
                    name: key.0,
                    kind: key.1,
                }),
                OnDuplicate::Replace => {
                    self.slots[existing] = slot;
                    Ok(())
                }
            },
            None => {
                self.by_key.insert(key, self.slots.len());
                self.slots.push(slot);
                Ok(())
            }
        }
    }
}

/// Derive the install path for a filesystem-relative resource.
///
/// For modules, dots become path separators; package modules install as the
/// package directory's `lib` entry, mirroring the source tree layout the
/// runtime compiles from, and extension modules take the platform's shared
/// library suffix. Package data names are `<package>/<relative file path>`
/// (the file part keeps its literal name, extension included), so only the
/// package part is dot-split.
fn install_path(prefix: &str, kind: ResourceKind, name: &str, is_package: bool) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if !prefix.is_empty() {
        parts.push(prefix);
    }

    if kind == ResourceKind::PackageData {
        match name.split_once('/') {
            Some((package, file)) => {
                parts.extend(package.split('.'));
                parts.extend(file.split('/'));
                parts.join("/")
            }
            None => {
                parts.push(name);
                parts.join("/")
            }
        }
    } else {
        let mut segments: Vec<&str> = name.split('.').collect();
        let file = if is_package {
            stem_with_suffix("lib", kind)
        } else {
            let leaf = segments.pop().unwrap_or(name);
            stem_with_suffix(leaf, kind)
        };
        parts.extend(segments);
        parts.push(&file);
        parts.join("/")
    }
}

fn stem_with_suffix(stem: &str, kind: ResourceKind) -> String {
    match kind {
        ResourceKind::SourceModule => format!("{stem}.vela"),
        ResourceKind::BytecodeModule => format!("{stem}.velab"),
        ResourceKind::ExtensionModule => {
            format!("{stem}.{}", std::env::consts::DLL_EXTENSION)
        }
        ResourceKind::PackageData => stem.to_string(),
    }
}
