//! The engine consumed by agent bootstrap and per-class call sites.

use std::sync::Arc;

use tracing::info;

use crate::classpath::ClassPath;
use crate::config::EngineConfig;
use crate::context::LoadingContext;
use crate::discovery::ensure_discoverable;
use crate::error::{DefinitionError, InstrumentError};
use crate::guard::{Claim, DefinitionGuard};
use crate::hook::{construct, Construction};
use crate::injector::inject;
use crate::jni_wrapper::JniEnv;
use crate::jvm::JvmLoadingContext;
use crate::pool::{ClassPool, PoolHierarchy, TypeDescriptor};
use crate::sys::jni;

/// Resolves, defines and instantiates classes on behalf of an agent.
///
/// One instance lives for the whole process and is shared by every thread
/// that instruments classes.
///
/// ```rust,ignore
/// let engine = Instrumentor::new(EngineConfig::from_agent_options(options), Some(system_path));
///
/// // inside ClassFileLoadHook, with `loader` and `domain` from the event
/// let jni = unsafe { JniEnv::from_raw(jni_ptr) };
/// let context = unsafe { engine.jvm_context(&jni, loader) };
/// let hook = engine.create_hook(&context, &ProtectionDomain(domain), "com.example.TraceInterceptor")?;
/// ```
#[derive(Debug)]
pub struct Instrumentor {
    config: EngineConfig,
    pools: PoolHierarchy,
    guard: Arc<DefinitionGuard>,
}

impl Instrumentor {
    /// Builds both pools from `config`, sharing the process-wide guard.
    pub fn new(config: EngineConfig, system: Option<Arc<dyn ClassPath>>) -> Self {
        Self::with_guard(config, system, DefinitionGuard::global())
    }

    pub fn with_guard(config: EngineConfig, system: Option<Arc<dyn ClassPath>>, guard: Arc<DefinitionGuard>) -> Self {
        let pools = PoolHierarchy::from_config(&config, system);
        Instrumentor { config, pools, guard }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The child pool, where application classes are resolved.
    pub fn class_pool(&self) -> &Arc<ClassPool> {
        self.pools.child()
    }

    /// The root pool, holding the agent's own classes.
    pub fn root_pool(&self) -> &Arc<ClassPool> {
        self.pools.root()
    }

    pub fn pools(&self) -> &PoolHierarchy {
        &self.pools
    }

    pub fn guard(&self) -> &Arc<DefinitionGuard> {
        &self.guard
    }

    /// A loading context for `loader` that enforces the configured hook
    /// interface.
    ///
    /// # Safety
    ///
    /// Same contract as [`JvmLoadingContext::new`].
    pub unsafe fn jvm_context<'e>(&self, env: &'e JniEnv, loader: jni::jobject) -> JvmLoadingContext<'e> {
        JvmLoadingContext::new(env, loader).with_hook_interface(self.config.hook_interface.clone())
    }

    /// Descriptor of `name` for editing before it is defined.
    pub fn get_type_descriptor(&self, name: &str) -> Result<Arc<TypeDescriptor>, InstrumentError> {
        self.pools.resolve(name).map_err(|e| InstrumentError::new(name, e))
    }

    /// Makes `name` findable in the child pool using the locations of
    /// `context`. Returns the number of locations added.
    pub fn check_library<C>(&self, context: &C, name: &str) -> usize
    where
        C: LoadingContext + ?Sized,
    {
        ensure_discoverable(context, self.pools.child(), name)
    }

    /// Same as [`check_library`](Self::check_library) for the root pool.
    /// Bootstrap calls this once with the agent's own loader.
    pub fn check_agent_library<C>(&self, context: &C, name: &str) -> usize
    where
        C: LoadingContext + ?Sized,
    {
        ensure_discoverable(context, self.pools.root(), name)
    }

    /// Defines `name` and its nested classes into `context`, or loads it if
    /// this engine already defined it there.
    pub fn define_into<C>(&self, context: &C, name: &str, security: &C::Security) -> Result<C::Class, InstrumentError>
    where
        C: LoadingContext + ?Sized,
    {
        info!(class = name, context = %context.label(), "defineClass");
        match self.guard.exists_or_claim(context.id(), name) {
            Claim::Exists => context.load(name).map_err(|e| {
                InstrumentError::new(name, DefinitionError::LoadFailed { name: name.to_string(), reason: e.to_string() })
                    .in_context(context.label())
            }),
            Claim::Acquired(ticket) => {
                ensure_discoverable(context, self.pools.child(), name);
                let descriptor = self
                    .pools
                    .resolve(name)
                    .map_err(|e| InstrumentError::new(name, e).in_context(context.label()))?;
                let class = inject(self.pools.child(), &descriptor, context, security)?;
                ticket.commit();
                Ok(class)
            }
        }
    }

    /// Defines `name` into `context` and constructs it with its no-argument
    /// constructor.
    pub fn create_hook<C>(&self, context: &C, security: &C::Security, name: &str) -> Result<C::Hook, InstrumentError>
    where
        C: LoadingContext + ?Sized,
    {
        self.create_hook_with(context, security, name, Construction::Default)
    }

    /// Defines `name` into `context` and constructs it as `construction`
    /// says.
    pub fn create_hook_with<C>(
        &self,
        context: &C,
        security: &C::Security,
        name: &str,
        construction: Construction<C::Value>,
    ) -> Result<C::Hook, InstrumentError>
    where
        C: LoadingContext + ?Sized,
    {
        let class = self.define_into(context, name, security)?;
        construct(context, &class, name, construction)
            .map_err(|e| InstrumentError::new(name, e).in_context(context.label()))
    }
}
