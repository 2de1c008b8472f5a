use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::{NodeType, RelationType};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Invalid type hint: {0:?}")]
    InvalidTypeHint(String),

    #[error("Unresolved entity: {0}")]
    UnresolvedEntity(String),

    #[error("Unknown relation: {0:?}")]
    UnknownRelation(String),

    #[error("Schema violation: ({source_type}, {relation}, {target_type}) is not a legal edge")]
    SchemaViolation {
        source_type: NodeType,
        relation: RelationType,
        target_type: NodeType,
    },

    #[error("Self-referential relationship not allowed")]
    SelfReference,

    #[error("Unrecoverable input in document {document_id}: {reason}")]
    UnrecoverableInput { document_id: String, reason: String },

    #[error("Corrupt schema registry: {0}")]
    CorruptSchema(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Model reply error: {0}")]
    Response(#[from] crate::ingest::ResponseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownType(_) | Self::InvalidTypeHint(_) => ErrorKind::InvalidTypeHint,
            Self::UnresolvedEntity(_) => ErrorKind::UnresolvedEntity,
            Self::UnknownRelation(_) => ErrorKind::UnknownRelation,
            Self::SchemaViolation { .. } | Self::SelfReference => ErrorKind::SchemaViolation,
            Self::UnrecoverableInput { .. } | Self::Response(_) => ErrorKind::UnrecoverableInput,
            Self::CorruptSchema(_) => ErrorKind::CorruptSchema,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::Serialization(_) | Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether the run can continue past this error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CorruptSchema(_) | Self::InvalidConfig(_) | Self::Io(_)
        )
    }
}

/// Stable, serializable code for an [`Error`], used in the extraction report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidTypeHint,
    UnresolvedEntity,
    UnknownRelation,
    SchemaViolation,
    UnrecoverableInput,
    CorruptSchema,
    InvalidConfig,
    Io,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidTypeHint => "InvalidTypeHint",
            Self::UnresolvedEntity => "UnresolvedEntity",
            Self::UnknownRelation => "UnknownRelation",
            Self::SchemaViolation => "SchemaViolation",
            Self::UnrecoverableInput => "UnrecoverableInput",
            Self::CorruptSchema => "CorruptSchema",
            Self::InvalidConfig => "InvalidConfig",
            Self::Io => "Io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
