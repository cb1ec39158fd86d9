//! Error types.
//!
//! Lookups, edits, injections and constructions each have their own error
//! enum. Everything that reaches a caller of [`Instrumentor`] is wrapped into a
//! single [`InstrumentError`] that carries the target class and the loading
//! context it was requested for.
//!
//! [`Instrumentor`]: crate::Instrumentor

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::classfile::ClassFileError;

/// A class name could not be resolved to a class file.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("{name} class not found in {pool}")]
    NotFound { name: String, pool: String },

    #[error("{name} could not be read from {location}: {source}")]
    Unreadable {
        name: String,
        location: String,
        #[source]
        source: ClassPathError,
    },

    #[error("{name} at {location} is not a valid class file: {source}")]
    Malformed {
        name: String,
        location: String,
        #[source]
        source: ClassFileError,
    },

    #[error("{location} was expected to hold {name} but declares {found}")]
    WrongName { name: String, location: String, found: String },
}

impl ResolutionError {
    pub(crate) fn not_found(name: &str, pool: &str) -> Self {
        ResolutionError::NotFound { name: name.to_string(), pool: pool.to_string() }
    }

    /// Returns `true` when no registered location contains the class.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolutionError::NotFound { .. })
    }

    /// The class name the lookup was for.
    pub fn class_name(&self) -> &str {
        match self {
            ResolutionError::NotFound { name, .. }
            | ResolutionError::Unreadable { name, .. }
            | ResolutionError::Malformed { name, .. }
            | ResolutionError::WrongName { name, .. } => name,
        }
    }
}

/// A class path entry could not be registered or read.
///
/// Registration failures are only ever logged; they never abort building a
/// pool or discovering a loader's class path.
#[derive(Debug, thiserror::Error)]
pub enum ClassPathError {
    #[error("class path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("bad archive {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("host class path failure: {0}")]
    Host(String),
}

/// A class file edit or an injection was refused.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("{name} class file is malformed: {source}")]
    Malformed {
        name: String,
        #[source]
        source: ClassFileError,
    },

    #[error("edited class file declares {found}, expected {expected}")]
    NameMismatch { expected: String, found: String },

    #[error("{name} is frozen, it has already been defined")]
    Frozen { name: String },

    #[error("{name} class define fail. cause: {reason}")]
    Rejected { name: String, reason: String },

    #[error("{name} could not be loaded. cause: {reason}")]
    LoadFailed { name: String, reason: String },
}

/// A hook object could not be constructed from its live class.
#[derive(Debug, thiserror::Error)]
pub enum ConstructionError {
    #[error("invalid parameter type: {type_name}")]
    InvalidType { type_name: String },

    #[error("no constructor {signature}")]
    NoSuchConstructor { signature: String },

    #[error("constructor threw {message}")]
    Threw { message: String },

    #[error("instance does not implement {interface}")]
    NotAHook { interface: String },

    #[error("params[{index}] is null")]
    NullArgument { index: usize },

    #[error("constructor takes {expected} arguments, {found} supplied")]
    ArityMismatch { expected: usize, found: usize },

    #[error("params[{index}] cannot be passed as {expected}")]
    ArgumentMismatch { index: usize, expected: String },

    #[error("host failure: {0}")]
    Host(String),
}

/// What went wrong, without the request context.
#[derive(Debug, thiserror::Error)]
pub enum InstrumentErrorKind {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Construction(#[from] ConstructionError),
}

/// The single error type returned to instrumentation call sites.
#[derive(Debug)]
pub struct InstrumentError {
    target: String,
    context: Option<String>,
    kind: InstrumentErrorKind,
}

impl InstrumentError {
    pub fn new(target: impl Into<String>, kind: impl Into<InstrumentErrorKind>) -> Self {
        InstrumentError { target: target.into(), context: None, kind: kind.into() }
    }

    pub fn in_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The class the failed request was for.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Label of the loading context, when the request had one.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn kind(&self) -> &InstrumentErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> InstrumentErrorKind {
        self.kind
    }

    pub fn is_not_found(&self) -> bool {
        matches!(&self.kind, InstrumentErrorKind::Resolution(e) if e.is_not_found())
    }
}

impl fmt::Display for InstrumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "instrument {} in {} failed: {}", self.target, context, self.kind),
            None => write!(f, "instrument {} failed: {}", self.target, self.kind),
        }
    }
}

impl std::error::Error for InstrumentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            InstrumentErrorKind::Resolution(e) => Some(e),
            InstrumentErrorKind::Definition(e) => Some(e),
            InstrumentErrorKind::Construction(e) => Some(e),
        }
    }
}
