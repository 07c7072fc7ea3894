//! The single error type surfaced by this crate.
//!
//! Every fallible operation in the reconciliation core returns
//! [`InvalidMessage`]. There is deliberately only one error type: the core
//! fails closed at the first inconsistency and callers are expected to
//! refuse the entire message on any variant, so a large match with many
//! arms buys nothing (see spec.md §7).

use thiserror::Error;

/// Which directive status a `directive_unmatched` failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Duplicated,
    Deleted,
    Modified,
}

impl std::fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DirectiveKind::Duplicated => "DUPLICATED",
            DirectiveKind::Deleted => "DELETED",
            DirectiveKind::Modified => "MODIFIED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidMessage {
    #[error("secured header mismatch: no envelope record matches inner header {name:?}")]
    SecuredHeaderMismatch { name: String },

    #[error("directive {status} unmatched: no envelope record for header {name:?}")]
    DirectiveUnmatched {
        status: DirectiveKind,
        name: String,
    },

    #[error("unknown canonicalization algorithm: {value}")]
    UnknownAlgorithm { value: i64 },

    #[error("unknown directive status: {value}")]
    UnknownFieldStatus { value: i64 },

    #[error("header missing: {name:?} has no trusted record")]
    HeaderMissing { name: String },

    #[error("header duplicated: {name:?} has {count} trusted records, expected exactly one")]
    HeaderDuplicated { name: String, count: usize },

    #[error("invalid address in field {field:?}")]
    InvalidAddress { field: String },
}

pub type Result<T> = std::result::Result<T, InvalidMessage>;
