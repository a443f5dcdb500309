//! Resource model
//!
//! [`RawResource`] is the descriptor shape produced by a filesystem scanner:
//! a dotted name, a kind, a package flag, and the raw payload bytes. The
//! collector turns it into a [`Resource`], the immutable indexed form whose
//! payload is either embedded or a path relative to the host binary.

use std::fmt;

/// What an importable or loadable unit is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Source text, compiled by the host at import time.
    SourceModule,
    /// Pre-compiled bytecode, executed directly.
    BytecodeModule,
    /// Native shared library with a module init entry point.
    ExtensionModule,
    /// Non-code file shipped alongside a package.
    PackageData,
}

impl ResourceKind {
    /// Wire tag for the index format.
    pub fn to_u8(self) -> u8 {
        match self {
            ResourceKind::SourceModule => 0,
            ResourceKind::BytecodeModule => 1,
            ResourceKind::ExtensionModule => 2,
            ResourceKind::PackageData => 3,
        }
    }

    /// Decode a wire tag. Returns `None` for tags this version does not know.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ResourceKind::SourceModule),
            1 => Some(ResourceKind::BytecodeModule),
            2 => Some(ResourceKind::ExtensionModule),
            3 => Some(ResourceKind::PackageData),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::SourceModule => "source module",
            ResourceKind::BytecodeModule => "bytecode module",
            ResourceKind::ExtensionModule => "extension module",
            ResourceKind::PackageData => "package data",
        };
        f.write_str(s)
    }
}

/// Where a resource's bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Payload embedded in the index blob.
    InMemory,
    /// Payload is a file next to the host binary, referenced by relative path.
    FilesystemRelative,
}

impl Origin {
    /// Wire tag for the index format.
    pub fn to_u8(self) -> u8 {
        match self {
            Origin::InMemory => 0,
            Origin::FilesystemRelative => 1,
        }
    }

    /// Decode a wire tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Origin::InMemory),
            1 => Some(Origin::FilesystemRelative),
            _ => None,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Origin::InMemory => "in-memory",
            Origin::FilesystemRelative => "filesystem-relative",
        };
        f.write_str(s)
    }
}

/// A resource descriptor before a storage placement has been chosen.
///
/// This is what a directory scanner yields and what the collector's `add_*`
/// calls accept. The payload always holds the actual bytes; the collector
/// decides whether they are embedded or staged for installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResource {
    kind: ResourceKind,
    name: String,
    is_package: bool,
    data: Vec<u8>,
}

impl RawResource {
    /// A source module with the given dotted name.
    pub fn source(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: ResourceKind::SourceModule,
            name: name.into(),
            is_package: false,
            data: data.into(),
        }
    }

    /// A pre-compiled bytecode module.
    pub fn bytecode(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: ResourceKind::BytecodeModule,
            name: name.into(),
            is_package: false,
            data: data.into(),
        }
    }

    /// A native extension module (shared library image).
    pub fn extension(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: ResourceKind::ExtensionModule,
            name: name.into(),
            is_package: false,
            data: data.into(),
        }
    }

    /// A non-code data file belonging to a package.
    ///
    /// Named `<package dotted path>/<relative file path>`; the file part
    /// keeps its literal name, extension included.
    pub fn package_data(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: ResourceKind::PackageData,
            name: name.into(),
            is_package: false,
            data: data.into(),
        }
    }

    /// Mark this resource as a package (directory with an init marker).
    pub fn into_package(mut self) -> Self {
        self.is_package = true;
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_package(&self) -> bool {
        self.is_package
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn into_parts(self) -> (ResourceKind, String, bool, Vec<u8>) {
        (self.kind, self.name, self.is_package, self.data)
    }
}

/// A resource payload, tagged by storage placement.
///
/// The origin is derived from the variant, so an in-memory resource with a
/// path reference (or the reverse) cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Bytes embedded in the index blob.
    Inline(Vec<u8>),
    /// Path relative to the host binary's install directory.
    RelativePath(String),
}

/// One entry of a resource index: an immutable, placement-resolved resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    kind: ResourceKind,
    name: String,
    is_package: bool,
    payload: Payload,
}

impl Resource {
    /// An entry whose payload is embedded in the index.
    pub fn in_memory(
        kind: ResourceKind,
        name: impl Into<String>,
        is_package: bool,
        data: Vec<u8>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            is_package,
            payload: Payload::Inline(data),
        }
    }

    /// An entry whose payload is a file referenced relative to the binary.
    pub fn filesystem_relative(
        kind: ResourceKind,
        name: impl Into<String>,
        is_package: bool,
        path: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            is_package,
            payload: Payload::RelativePath(path.into()),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_package(&self) -> bool {
        self.is_package
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The storage placement, derived from the payload variant.
    pub fn origin(&self) -> Origin {
        match self.payload {
            Payload::Inline(_) => Origin::InMemory,
            Payload::RelativePath(_) => Origin::FilesystemRelative,
        }
    }

    /// Embedded bytes, if this entry is in-memory.
    pub fn inline_data(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Inline(data) => Some(data),
            Payload::RelativePath(_) => None,
        }
    }

    /// The relative path reference, if this entry is filesystem-relative.
    pub fn relative_path(&self) -> Option<&str> {
        match &self.payload {
            Payload::Inline(_) => None,
            Payload::RelativePath(path) => Some(path),
        }
    }
}
