//! Immutable resource index
//!
//! The ordered snapshot produced by [`crate::collector::ResourceCollector::finalize`]
//! and consumed by an embedded importer. Entry order is the collector's
//! insertion order and survives encode/decode, so identical inputs produce
//! byte-identical blobs.

use std::collections::HashMap;

use crate::format::FORMAT_VERSION;
use crate::resource::{Resource, ResourceKind};

/// An ordered, immutable collection of placement-resolved resources.
///
/// Safe for unrestricted concurrent read access; there is no interior
/// mutability.
#[derive(Debug)]
pub struct ResourceIndex {
    format_version: u8,
    runtime_tag: String,
    entries: Vec<Resource>,
    by_key: HashMap<(String, ResourceKind), usize>,
}

impl ResourceIndex {
    /// Build an index over the given entries, preserving their order.
    ///
    /// Entries are expected to be unique per `(name, kind)`; if they are
    /// not, lookups resolve to the first occurrence.
    pub fn new(runtime_tag: impl Into<String>, entries: Vec<Resource>) -> Self {
        Self::with_version(FORMAT_VERSION, runtime_tag, entries)
    }

    pub(crate) fn with_version(
        format_version: u8,
        runtime_tag: impl Into<String>,
        entries: Vec<Resource>,
    ) -> Self {
        let mut by_key = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            by_key
                .entry((entry.name().to_string(), entry.kind()))
                .or_insert(i);
        }
        Self {
            format_version,
            runtime_tag: runtime_tag.into(),
            entries,
            by_key,
        }
    }

    /// Format version recorded in the header.
    pub fn format_version(&self) -> u8 {
        self.format_version
    }

    /// Target runtime tag recorded in the header.
    pub fn runtime_tag(&self) -> &str {
        &self.runtime_tag
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, in insertion order.
    pub fn entries(&self) -> &[Resource] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.entries.iter()
    }

    /// Look up an entry by exact `(name, kind)` key.
    pub fn get(&self, name: &str, kind: ResourceKind) -> Option<&Resource> {
        self.by_key
            .get(&(name.to_string(), kind))
            .map(|&i| &self.entries[i])
    }

    /// Find the best importable entry for a dotted name.
    ///
    /// A compiled artifact outranks the source it came from: extension
    /// modules win over bytecode, bytecode over source. Package data never
    /// answers a module lookup.
    pub fn find(&self, name: &str) -> Option<&Resource> {
        for kind in [
            ResourceKind::ExtensionModule,
            ResourceKind::BytecodeModule,
            ResourceKind::SourceModule,
        ] {
            if let Some(entry) = self.get(name, kind) {
                return Some(entry);
            }
        }
        None
    }

    pub fn contains(&self, name: &str, kind: ResourceKind) -> bool {
        self.get(name, kind).is_some()
    }
}

impl PartialEq for ResourceIndex {
    fn eq(&self, other: &Self) -> bool {
        self.format_version == other.format_version
            && self.runtime_tag == other.runtime_tag
            && self.entries == other.entries
    }
}

impl Eq for ResourceIndex {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Origin;

    fn sample() -> ResourceIndex {
        ResourceIndex::new(
            "vela-0.2",
            vec![
                Resource::in_memory(ResourceKind::SourceModule, "app", true, b"".to_vec()),
                Resource::in_memory(
                    ResourceKind::SourceModule,
                    "app.main",
                    false,
                    b"let x = 1\n".to_vec(),
                ),
                Resource::in_memory(
                    ResourceKind::BytecodeModule,
                    "app.main",
                    false,
                    vec![0xDE, 0xAD],
                ),
                Resource::filesystem_relative(
                    ResourceKind::ExtensionModule,
                    "app.native",
                    false,
                    "lib/app/native.so",
                ),
                Resource::in_memory(
                    ResourceKind::PackageData,
                    "app/config.json",
                    false,
                    b"{}".to_vec(),
                ),
            ],
        )
    }

    #[test]
    fn test_get_by_name_and_kind() {
        let index = sample();
        let entry = index.get("app.main", ResourceKind::SourceModule).unwrap();
        assert_eq!(entry.inline_data(), Some(&b"let x = 1\n"[..]));
        assert!(index.get("app.main", ResourceKind::ExtensionModule).is_none());
        assert!(index.get("missing", ResourceKind::SourceModule).is_none());
    }

    #[test]
    fn test_find_prefers_compiled_artifacts() {
        let index = sample();
        // Both source and bytecode exist for app.main; bytecode wins.
        let entry = index.find("app.main").unwrap();
        assert_eq!(entry.kind(), ResourceKind::BytecodeModule);

        let entry = index.find("app.native").unwrap();
        assert_eq!(entry.kind(), ResourceKind::ExtensionModule);
        assert_eq!(entry.origin(), Origin::FilesystemRelative);
    }

    #[test]
    fn test_find_ignores_package_data() {
        let index = sample();
        assert!(index.find("app/config.json").is_none());
        assert!(index.contains("app/config.json", ResourceKind::PackageData));
    }

    #[test]
    fn test_entry_order_preserved() {
        let index = sample();
        let names: Vec<&str> = index.iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            ["app", "app.main", "app.main", "app.native", "app/config.json"]
        );
        assert_eq!(index.len(), 5);
        assert!(!index.is_empty());
    }
}
