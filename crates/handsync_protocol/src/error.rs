//! Error types for schema-driven item decoding.

use crate::kind::ItemKind;
use crate::param::FieldTag;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while mapping parameter values onto item records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The value list does not line up with the parameter format.
    #[error("parameter format has {formats} entries but {values} values were received")]
    LengthMismatch {
        /// Entries in the format.
        formats: usize,
        /// Values received.
        values: usize,
    },

    /// The parameter format for a category was requested twice.
    #[error("parameter format for {kind} already obtained")]
    AlreadyObtained {
        /// Category whose format is cached.
        kind: ItemKind,
    },

    /// No parameter format is cached for the category.
    #[error("parameter format for {kind} has not been obtained")]
    FormatMissing {
        /// Category that was asked for.
        kind: ItemKind,
    },

    /// A fixed-width value had the wrong size.
    #[error("field {tag}: expected {expected} bytes, got {actual}")]
    FieldWidth {
        /// Field tag.
        tag: FieldTag,
        /// Width required by the parameter type.
        expected: usize,
        /// Width received.
        actual: usize,
    },

    /// An owned field value could not be allocated.
    #[error("allocation of {len} bytes for field {field} failed")]
    AllocationFailed {
        /// Field tag.
        field: FieldTag,
        /// Requested size.
        len: usize,
    },
}
