//! Embedded importer
//!
//! Resolves module-load requests against a packed [`ResourceIndex`] instead
//! of a filesystem search path:
//!
//! 1. the host bootstrap locates the index blob shipped with the binary
//! 2. [`EmbeddedImporter::load`] decodes it and readies the resolver
//! 3. `find` answers name lookups (a miss is `None`, not an error, so a
//!    chained importer can be tried next)
//! 4. `execute` materializes the payload and runs it through the host,
//!    with the module cache guaranteeing at-most-once execution per name

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use vela_resources::{DecodeOptions, Origin, Payload, Resource, ResourceIndex, ResourceKind};

use crate::cache::{Claim, ModuleCache};
use crate::error::ImportError;
use crate::host::{Host, HostError, ImportContext};
use crate::native::Library;

/// A successful index lookup: everything needed to load one module.
#[derive(Debug)]
pub struct FoundModule<'a> {
    name: &'a str,
    kind: ResourceKind,
    is_package: bool,
    source: PayloadSource<'a>,
}

/// Where a found module's bytes will come from.
#[derive(Debug)]
pub enum PayloadSource<'a> {
    /// Payload embedded in the index.
    InMemory(&'a [u8]),
    /// Payload installed on disk, path already resolved against the base
    /// directory. Reading is deferred to execution time.
    Installed(PathBuf),
}

impl<'a> FoundModule<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn is_package(&self) -> bool {
        self.is_package
    }

    pub fn source(&self) -> &PayloadSource<'a> {
        &self.source
    }

    pub fn origin(&self) -> Origin {
        match self.source {
            PayloadSource::InMemory(_) => Origin::InMemory,
            PayloadSource::Installed(_) => Origin::FilesystemRelative,
        }
    }
}

/// The directory filesystem-relative resources resolve against by default:
/// the running binary's install directory.
pub fn exe_relative_base() -> std::io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    Ok(exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Resolves and executes modules from a loaded resource index.
///
/// The index is immutable; the module cache is the only mutable state and
/// is internally synchronized, so a shared reference is all callers need.
pub struct EmbeddedImporter<H: Host> {
    index: ResourceIndex,
    host: H,
    base_dir: PathBuf,
    cache: ModuleCache<H::Module>,
    /// Native library handles, kept alive for the process lifetime.
    libraries: Mutex<Vec<Library>>,
}

impl<H: Host> EmbeddedImporter<H> {
    /// Ready an importer over an already-decoded index.
    pub fn from_index(index: ResourceIndex, host: H, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            index,
            host,
            base_dir: base_dir.into(),
            cache: ModuleCache::new(),
            libraries: Mutex::new(Vec::new()),
        }
    }

    /// Decode an index blob and ready an importer over it.
    pub fn load(
        blob: &[u8],
        host: H,
        base_dir: impl Into<PathBuf>,
    ) -> Result<Self, ImportError> {
        Self::load_with(blob, DecodeOptions::default(), host, base_dir)
    }

    /// Decode with explicit options (forward-compatibility skipping).
    pub fn load_with(
        blob: &[u8],
        options: DecodeOptions,
        host: H,
        base_dir: impl Into<PathBuf>,
    ) -> Result<Self, ImportError> {
        let index = ResourceIndex::decode_with(blob, options)?;
        Ok(Self::from_index(index, host, base_dir))
    }

    pub fn index(&self) -> &ResourceIndex {
        &self.index
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Look up an importable module by dotted name.
    ///
    /// Returns `None` when the index has no entry for the name; callers
    /// chaining several importers treat that as "try the next one".
    pub fn find(&self, name: &str) -> Option<FoundModule<'_>> {
        let entry = self.index.find(name)?;
        Some(FoundModule {
            name: entry.name(),
            kind: entry.kind(),
            is_package: entry.is_package(),
            source: match entry.payload() {
                Payload::Inline(data) => PayloadSource::InMemory(data),
                Payload::RelativePath(rel) => {
                    PayloadSource::Installed(self.base_dir.join(rel))
                }
            },
        })
    }

    /// Resolve and execute a module, running its top-level code at most
    /// once per process.
    ///
    /// Concurrent calls for the same name block until the first finishes
    /// and then observe the same module object. A re-entrant call from the
    /// module's own top-level code receives the partially initialized
    /// module. A failed execution leaves no cache entry behind.
    pub fn execute(&self, name: &str) -> Result<Arc<H::Module>, ImportError> {
        let entry = self
            .index
            .find(name)
            .ok_or_else(|| ImportError::UnknownModule(name.to_string()))?;

        match self
            .cache
            .claim(name, || self.host.new_module(name, entry.is_package()))
        {
            Claim::Ready(module) => Ok(module),
            Claim::Run(module) => match self.run_entry(entry, &module) {
                Ok(()) => {
                    self.cache.complete(name);
                    Ok(module)
                }
                Err(err) => {
                    self.cache.fail(name);
                    Err(err)
                }
            },
        }
    }

    /// Read a package data payload by name. `Ok(None)` when not indexed.
    pub fn read_data(&self, name: &str) -> Result<Option<Vec<u8>>, ImportError> {
        let entry = match self.index.get(name, ResourceKind::PackageData) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        self.materialize(entry).map(|data| Some(data.into_owned()))
    }

    /// Run one entry's payload through the host. Called with the cache slot
    /// claimed; the caller settles the slot afterwards.
    fn run_entry(&self, entry: &Resource, module: &H::Module) -> Result<(), ImportError> {
        let name = entry.name();
        match entry.kind() {
            ResourceKind::SourceModule => {
                let source = self.materialize(entry)?;
                let bytecode = self
                    .host
                    .compile(name, &source)
                    .map_err(|e| host_failure(name, e))?;
                self.host
                    .evaluate(self, module, &bytecode)
                    .map_err(|e| host_failure(name, e))
            }
            ResourceKind::BytecodeModule => {
                let bytecode = self.materialize(entry)?;
                self.host
                    .evaluate(self, module, &bytecode)
                    .map_err(|e| host_failure(name, e))
            }
            ResourceKind::ExtensionModule => self.run_extension(entry),
            // find() never yields package data; execute() on such a name
            // reports it as missing before we get here.
            ResourceKind::PackageData => Err(ImportError::UnsupportedPayload {
                name: name.to_string(),
                kind: entry.kind(),
            }),
        }
    }

    fn run_extension(&self, entry: &Resource) -> Result<(), ImportError> {
        let name = entry.name();
        let rel = entry
            .relative_path()
            .ok_or_else(|| ImportError::UnsupportedPayload {
                name: name.to_string(),
                kind: entry.kind(),
            })?;
        let path = self.base_dir.join(rel);

        // Same single-retry rule as payload reads; probing up front keeps
        // "file is gone" distinct from "linker rejected the file".
        if let Err(err) = fs::metadata(&path).or_else(|_| fs::metadata(&path)) {
            return Err(ImportError::NotFound {
                name: name.to_string(),
                path,
                source: err,
            });
        }

        let library = Library::open(&path)
            .map_err(|e| host_failure(name, HostError::Failed(Box::new(e))))?;
        library
            .initialize_module()
            .map_err(|e| host_failure(name, HostError::Failed(Box::new(e))))?;

        self.libraries.lock().push(library);
        Ok(())
    }

    /// Produce the payload bytes for an entry, reading installed files with
    /// a single retry on transient failure.
    fn materialize<'a>(&self, entry: &'a Resource) -> Result<Cow<'a, [u8]>, ImportError> {
        match entry.payload() {
            Payload::Inline(data) => Ok(Cow::Borrowed(data.as_slice())),
            Payload::RelativePath(rel) => {
                let path = self.base_dir.join(rel);
                match fs::read(&path).or_else(|_| fs::read(&path)) {
                    Ok(data) => Ok(Cow::Owned(data)),
                    Err(err) => Err(ImportError::NotFound {
                        name: entry.name().to_string(),
                        path,
                        source: err,
                    }),
                }
            }
        }
    }
}

impl<H: Host> ImportContext<H::Module> for EmbeddedImporter<H> {
    fn import(&self, name: &str) -> Result<Arc<H::Module>, ImportError> {
        self.execute(name)
    }

    fn read_data(&self, name: &str) -> Result<Option<Vec<u8>>, ImportError> {
        EmbeddedImporter::read_data(self, name)
    }
}

fn host_failure(name: &str, err: HostError) -> ImportError {
    match err {
        HostError::Corrupt(detail) => ImportError::CorruptPayload {
            name: name.to_string(),
            detail,
        },
        HostError::Failed(source) => ImportError::Execution {
            name: name.to_string(),
            source,
        },
    }
}
