//! Common imports for agents that inject classes.
//!
//! Covers the engine, the JVM context types and the std types the usual
//! bootstrap code needs alongside them.

pub use std::sync::{Arc, OnceLock};

pub use crate::config::EngineConfig;
pub use crate::error::InstrumentError;
pub use crate::hook::Construction;
pub use crate::instrumentor::Instrumentor;
pub use crate::jni_wrapper::{JniEnv, LocalRef};
pub use crate::jvm::{JvmLoadingContext, JvmSystemClassPath, ProtectionDomain};
pub use crate::sys::jni;
