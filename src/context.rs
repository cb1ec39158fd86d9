//! The host side of injection.
//!
//! A [`LoadingContext`] is a namespace of live classes owned by the host
//! runtime, typically one `ClassLoader`. The engine never defines or loads a
//! class by any other means than the methods of this trait. See
//! [`crate::jvm::JvmLoadingContext`] for the JNI-backed implementation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::descriptor::ConstructorSignature;
use crate::error::ConstructionError;

/// Stable identity of a loading context for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

impl ContextId {
    /// The JVM bootstrap loader, represented by a null `ClassLoader`.
    pub const BOOTSTRAP: ContextId = ContextId(0);

    pub const fn new(raw: u64) -> Self {
        ContextId(raw)
    }

    /// A fresh, never-before-issued identity.
    pub fn allocate() -> Self {
        ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == ContextId::BOOTSTRAP {
            write!(f, "cl:bootstrap")
        } else {
            write!(f, "cl:{}", self.0)
        }
    }
}

/// Why the host refused to define or load a class.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefineError {
    /// The context already holds a class of that name. Callers treat this as
    /// a lost race and load the existing class.
    #[error("duplicate class definition")]
    AlreadyDefined,

    #[error("{0}")]
    Rejected(String),

    #[error("class not found: {0}")]
    NotFound(String),
}

pub trait LoadingContext {
    /// A live class handle.
    type Class;
    /// A constructor argument.
    type Value;
    /// A constructed hook object.
    type Hook;
    /// Protection domain passed along with each definition.
    type Security;

    fn id(&self) -> ContextId;

    /// Human-readable identity for log events and errors.
    fn label(&self) -> String {
        self.id().to_string()
    }

    /// Defines `name` (binary form) from `bytecode`.
    fn define(&self, name: &str, bytecode: &[u8], security: &Self::Security) -> Result<Self::Class, DefineError>;

    /// Looks up an already live class through the context's normal lookup.
    fn load(&self, name: &str) -> Result<Self::Class, DefineError>;

    /// Class path locations the context searches, when it can enumerate
    /// them.
    fn resource_locations(&self) -> Option<Vec<String>> {
        None
    }

    /// Binary name of the runtime class of `value`.
    fn runtime_type_name(&self, value: &Self::Value) -> Result<String, ConstructionError>;

    /// Runs the constructor `signature` of `class`. `args` has exactly
    /// `signature.arity()` entries; `None` is a null reference.
    fn instantiate(
        &self,
        class: &Self::Class,
        signature: &ConstructorSignature,
        args: &[Option<Self::Value>],
    ) -> Result<Self::Hook, ConstructionError>;
}
