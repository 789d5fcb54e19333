//! Error types for schema construction, codec, upgrades, and tree access.

use thiserror::Error;

/// Errors raised while building or validating a schema.
///
/// All of these are fatal at startup: a schema that fails to build is a
/// programming error in the format definition, not a property of any file.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// A SIZE path forms a cycle or points at a field that serializes later.
    #[error("size path '{path}' of field '{field}' does not resolve to an earlier field")]
    UnresolvableSizePath { field: String, path: String },

    /// A SIZE path targets a field that is not an integer leaf.
    #[error("size path '{path}' of field '{field}' must target an integer field")]
    SizePathNotInteger { field: String, path: String },

    /// Child sizes plus padding do not equal the declared struct size.
    #[error("struct '{name}' declares {declared} bytes but children cover {covered}")]
    SizeMismatch {
        name: String,
        declared: usize,
        covered: usize,
    },

    /// A bit-range child does not fit in the backing integer.
    #[error("bit field '{name}' ends at bit {end} which overflows a {width}-bit backing integer")]
    BitRangeOverflow { name: String, end: u32, width: u32 },

    /// Two children of one composite share a name.
    #[error("duplicate field name '{name}' in '{parent}'")]
    DuplicateName { parent: String, name: String },

    /// A kind was given an attribute it cannot carry.
    #[error("field '{name}': {reason}")]
    InvalidAttribute { name: String, reason: String },
}

/// Errors raised while parsing bytes against a schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The buffer ended before the field's declared extent.
    #[error("short buffer reading '{field}': needed {needed} bytes, {remaining} remaining")]
    ShortBuffer {
        field: String,
        needed: usize,
        remaining: usize,
    },

    /// A string field held malformed UTF-8.
    #[error("invalid UTF-8 in string field '{field}'")]
    Encoding { field: String },

    /// A value fell outside the field's MIN/MAX bounds under strict parsing.
    #[error("value {value} of '{field}' is outside [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Declared composite size disagrees with the bytes its children consumed.
    #[error("'{field}' declares {declared} bytes but children consumed {consumed}")]
    SizeMismatch {
        field: String,
        declared: usize,
        consumed: usize,
    },

    /// The file's magic or version integer is not one the pipeline knows.
    #[error("unrecognized format: magic {magic:?}, version {version}")]
    UnknownVersion { magic: [u8; 4], version: u32 },

    /// A SIZE path did not resolve to a readable integer at parse time.
    /// Unreachable for schemas that passed build validation unless the
    /// referenced count field itself failed to parse cleanly.
    #[error("size path '{path}' of '{field}' did not resolve to an integer")]
    BadSizePath { field: String, path: String },
}

/// Errors raised while serializing a node tree back to bytes.
#[derive(Error, Debug)]
pub enum SerializeError {
    /// A value violates its MIN/MAX bounds under strict enforcement.
    #[error("value of '{field}' violates its declared bounds: {detail}")]
    ConstraintViolated { field: String, detail: String },

    /// The destination could not be written.
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    /// Post-save verification read back different bytes.
    #[error("integrity test failed for '{path}': saved bytes do not round-trip")]
    IntegrityFailed { path: String },
}

/// Errors raised by the version upgrade pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpgradeError {
    /// A source field has no destination and is not listed as droppable.
    #[error("field '{0}' has no mapping in the target version")]
    FieldLost(String),

    /// No upgrade chain reaches the requested version.
    #[error("no upgrade path from version {0}")]
    UnsupportedVersion(u32),
}

/// Errors raised by path lookups into a node tree.
///
/// These indicate programmer errors; the binding layer logs and ignores
/// them, everything else propagates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    #[error("no node at path '{0}'")]
    NotFound(String),

    #[error("node at '{path}' is {got}, expected {expected}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        got: &'static str,
    },

    /// The path string itself could not be parsed.
    #[error("malformed path '{0}'")]
    Malformed(String),
}

/// Errors raised by the entry-field expression evaluator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("unexpected character '{0}' in expression")]
    UnexpectedChar(char),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{name}' takes {expected} arguments, got {got}")]
    BadArity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("expected {expected}, found '{found}'")]
    UnexpectedToken { expected: &'static str, found: String },
}

/// Umbrella error for document-level operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error(transparent)]
    Upgrade(#[from] UpgradeError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
