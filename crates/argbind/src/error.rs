use thiserror::Error;

use crate::decl::DeclId;
use crate::group::GroupKind;

/// Why a key's raw value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidValueReason {
    /// The token could not be converted to the declared type.
    #[error("expected {expected} ({message})")]
    Conversion {
        expected: &'static str,
        message: String,
    },
    /// Conversion succeeded but a validator refused the value.
    #[error("{message}")]
    Validation { message: String },
}

/// Everything that can go wrong while routing and binding argv.
///
/// The engine reports the first error it meets and stops; rendering and exit
/// codes are up to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unrecognized option: {0}")]
    UnrecognizedOption(String),

    #[error("expected a value after {key}")]
    ExpectedValueAfterKey { key: String },

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidKeyValue {
        decl: DeclId,
        key: String,
        value: String,
        reason: InvalidValueReason,
    },

    #[error("{key} cannot be used multiple times")]
    DuplicateKey { decl: DeclId, key: String },

    #[error("must pass {} of the following: {}", .kind.quantifier(), .members.join(" "))]
    OptionGroupMisuse {
        kind: GroupKind,
        /// Index of the group within its signature's groups.
        group: usize,
        member_ids: Vec<DeclId>,
        members: Vec<String>,
        present: usize,
    },

    #[error("missing required argument: <{name}>")]
    MissingParameter { decl: DeclId, name: String },

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),

    #[error("command not found: {name}")]
    CommandNotFound { name: String },

    #[error("no command given for {group}")]
    NoCommand { group: String },

    #[error("invalid declaration: {0}")]
    InvalidDeclaration(String),
}

impl ParseError {
    /// Whether the error is caused by the user's input rather than by how the
    /// commands were declared.
    pub fn is_usage_error(&self) -> bool {
        !matches!(self, Self::InvalidDeclaration(_))
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
