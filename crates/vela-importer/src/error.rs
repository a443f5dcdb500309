//! Import error types.

use std::path::PathBuf;

use thiserror::Error;
use vela_resources::{FormatError, ResourceKind};

/// Errors that can occur while resolving or executing an embedded module.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The index blob or an entry in it could not be decoded
    #[error(transparent)]
    Decode(#[from] FormatError),

    /// A payload's bytes do not decode as the kind they claim to be
    #[error("corrupt payload for module {name:?}: {detail}")]
    CorruptPayload { name: String, detail: String },

    /// No resource for the requested module exists in the index
    #[error("no resource for module {0:?}")]
    UnknownModule(String),

    /// A filesystem-relative payload is missing at load time
    #[error("resource for module {name:?} not found at {}", .path.display())]
    NotFound {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Entry kind and storage placement cannot be executed together
    #[error("cannot load {kind} for module {name:?} from this payload")]
    UnsupportedPayload { name: String, kind: ResourceKind },

    /// The module's own initialization code failed
    #[error("execution of module {name:?} failed")]
    Execution {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
