//! # jvmti-classpool
//!
//! Class pools and class injection for JVM agents written in Rust.
//!
//! An agent that instruments application classes usually has to load its own
//! helper classes (interceptors) into the application's class loaders. This
//! crate provides the pieces for that:
//!
//! - a two-level [`ClassPool`] hierarchy that resolves class files from
//!   directories, jars and `dir/*` jar directories
//! - editable [`TypeDescriptor`]s that freeze once defined
//! - class path discovery from a loader's own URLs
//! - injection of a class with all of its nested classes, innermost first
//! - a per-loader [`DefinitionGuard`] so each class is defined at most once
//! - hook construction through a chosen constructor
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use jvmti_classpool::prelude::*;
//!
//! static ENGINE: OnceLock<Instrumentor> = OnceLock::new();
//!
//! // Agent_OnLoad
//! let config = EngineConfig::from_agent_options(options);
//! let system = unsafe { JvmSystemClassPath::new(vm) };
//! ENGINE.get_or_init(|| Instrumentor::new(config, Some(Arc::new(system))));
//!
//! // ClassFileLoadHook
//! let env = unsafe { JniEnv::from_raw(jni) };
//! let engine = ENGINE.get().expect("engine initialized in Agent_OnLoad");
//! let context = unsafe { engine.jvm_context(&env, loader) };
//! match engine.create_hook(&context, &ProtectionDomain(domain), "com.example.TraceInterceptor") {
//!     Ok(hook) => { /* hand the hook to the instrumented class */ }
//!     Err(e) => tracing::warn!(error = %e, "interceptor unavailable"),
//! }
//! ```
//!
//! ## Layering
//!
//! | Layer | Modules |
//! |-------|---------|
//! | Class files | [`classfile`], [`descriptor`] |
//! | Resolution | [`classpath`], [`pool`], [`discovery`] |
//! | Definition | [`context`], [`guard`], [`injector`], [`hook`] |
//! | Engine | [`instrumentor`], [`config`], [`error`] |
//! | JVM | [`jvm`], [`jni_wrapper`], [`sys`] |
//!
//! Everything above the JVM layer is generic over [`LoadingContext`] and runs
//! without a JVM, which is how the test suite drives it.
//!
//! ## Logging
//!
//! Events are emitted through `tracing`. The agent decides where they go by
//! installing a subscriber; without one they are discarded.

pub mod sys;

pub mod classfile;
pub mod classpath;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod guard;
pub mod hook;
pub mod injector;
pub mod instrumentor;
pub mod jni_wrapper;
pub mod jvm;
pub mod pool;
pub mod prelude;

pub use crate::sys::jni;

pub use crate::classfile::{ClassFileError, ClassHeader};
pub use crate::classpath::{open_class_path, ClassPath, DirClassPath, JarClassPath, JarDirClassPath, MemoryClassPath};
pub use crate::config::EngineConfig;
pub use crate::context::{ContextId, DefineError, LoadingContext};
pub use crate::descriptor::ConstructorSignature;
pub use crate::error::{
    ClassPathError, ConstructionError, DefinitionError, InstrumentError, InstrumentErrorKind, ResolutionError,
};
pub use crate::guard::{Claim, DefinitionGuard, DefinitionTicket};
pub use crate::hook::Construction;
pub use crate::instrumentor::Instrumentor;
pub use crate::jvm::{JvmLoadingContext, JvmSystemClassPath, ProtectionDomain};
pub use crate::pool::{ClassPool, PoolHierarchy, TypeDescriptor};
