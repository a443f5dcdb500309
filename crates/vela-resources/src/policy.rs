//! Storage placement policy
//!
//! A collector is constructed with exactly one [`Policy`] that decides where
//! resource payloads end up: embedded in the index blob, or written next to
//! the host binary and referenced by relative path. The `*-only` policies
//! additionally reject adds under the opposite placement.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::resource::Origin;

/// Errors for invalid collector configuration values.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Policy name does not match any known policy
    #[error("unknown storage policy {0:?}")]
    UnknownPolicy(String),
}

/// Default storage placement for collected resources.
///
/// Fixed at collector construction and read back verbatim via
/// [`crate::collector::ResourceCollector::policy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    /// All payloads embedded in the index; filesystem-relative adds fail.
    InMemoryOnly,
    /// All payloads installed next to the binary; in-memory adds fail.
    FilesystemRelativeOnly,
    /// Embed by default, filesystem-relative adds still allowed.
    PreferInMemory,
    /// Install by default, in-memory adds still allowed.
    PreferFilesystemRelative,
}

/// All policies, in wire-name order.
pub const ALL_POLICIES: [Policy; 4] = [
    Policy::InMemoryOnly,
    Policy::FilesystemRelativeOnly,
    Policy::PreferInMemory,
    Policy::PreferFilesystemRelative,
];

impl Policy {
    /// The hyphenated wire name, as accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::InMemoryOnly => "in-memory-only",
            Policy::FilesystemRelativeOnly => "filesystem-relative-only",
            Policy::PreferInMemory => "prefer-in-memory",
            Policy::PreferFilesystemRelative => "prefer-filesystem-relative",
        }
    }

    /// The origin assigned to resources added without an explicit override.
    pub fn default_origin(&self) -> Origin {
        match self {
            Policy::InMemoryOnly | Policy::PreferInMemory => Origin::InMemory,
            Policy::FilesystemRelativeOnly | Policy::PreferFilesystemRelative => {
                Origin::FilesystemRelative
            }
        }
    }

    /// Whether a resource may be stored under the given origin.
    pub fn allows(&self, origin: Origin) -> bool {
        match self {
            Policy::InMemoryOnly => origin == Origin::InMemory,
            Policy::FilesystemRelativeOnly => origin == Origin::FilesystemRelative,
            Policy::PreferInMemory | Policy::PreferFilesystemRelative => true,
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-memory-only" => Ok(Policy::InMemoryOnly),
            "filesystem-relative-only" => Ok(Policy::FilesystemRelativeOnly),
            "prefer-in-memory" => Ok(Policy::PreferInMemory),
            "prefer-filesystem-relative" => Ok(Policy::PreferFilesystemRelative),
            other => Err(ConfigurationError::UnknownPolicy(other.to_string())),
        }
    }
}
