//! JNI-backed loading context and system class path.
//!
//! A [`JvmLoadingContext`] wraps one `java.lang.ClassLoader` (or the bootstrap
//! loader when null) for the duration of a native callback. Loader identity
//! is kept across callbacks in a registry of weak global references, so the
//! same loader always maps to the same [`ContextId`].

use std::fmt;
use std::ptr;
use std::sync::OnceLock;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::classpath::ClassPath;
use crate::context::{ContextId, DefineError, LoadingContext};
use crate::descriptor::{resource_path, to_internal_name, ConstructorSignature};
use crate::error::{ClassPathError, ConstructionError};
use crate::jni_wrapper::{JniEnv, LocalRef};
use crate::sys::jni;

const CLASS_LOADER: &str = "java/lang/ClassLoader";
const DEFINE_CLASS_SIG: &str = "(Ljava/lang/String;[BIILjava/security/ProtectionDomain;)Ljava/lang/Class;";
const LOAD_CLASS_SIG: &str = "(Ljava/lang/String;)Ljava/lang/Class;";
const TO_STRING_SIG: &str = "()Ljava/lang/String;";
const URL_FRAME_CAPACITY: jni::jint = 8;
const READ_CHUNK: jni::jsize = 8 * 1024;

/// The `java.security.ProtectionDomain` handed to `defineClass`. Null means
/// the loader's default domain.
#[derive(Debug, Clone, Copy)]
pub struct ProtectionDomain(pub jni::jobject);

impl ProtectionDomain {
    pub fn none() -> Self {
        ProtectionDomain(ptr::null_mut())
    }
}

// =============================================================================
// Loader identity
// =============================================================================

/// Weak global loader references, kept as addresses so the table is `Send`.
fn loader_registry() -> &'static Mutex<Vec<(usize, ContextId)>> {
    static LOADERS: OnceLock<Mutex<Vec<(usize, ContextId)>>> = OnceLock::new();
    LOADERS.get_or_init(|| Mutex::new(Vec::new()))
}

fn loader_id(env: &JniEnv, loader: jni::jobject) -> ContextId {
    if loader.is_null() {
        return ContextId::BOOTSTRAP;
    }
    let mut known = loader_registry().lock();
    if let Some((_, id)) = known.iter().find(|(weak, _)| env.is_same_object(*weak as jni::jobject, loader)) {
        return *id;
    }

    // A weak reference that compares equal to null belongs to a collected
    // loader. Its id is never reissued.
    known.retain(|(weak, _)| {
        let weak = *weak as jni::jweak;
        let collected = env.is_same_object(weak, ptr::null_mut());
        if collected {
            env.delete_weak_global_ref(weak);
        }
        !collected
    });

    let id = ContextId::allocate();
    known.push((env.new_weak_global_ref(loader) as usize, id));
    debug!(context = %id, "registered class loader");
    id
}

// =============================================================================
// Shared JNI helpers
// =============================================================================

/// `Throwable.toString()` of the pending exception, clearing it.
fn pending_exception(env: &JniEnv) -> Option<(LocalRef<'_>, String)> {
    let exc = env.take_exception()?;
    let text = describe_object(env, exc.get()).unwrap_or_else(|| "unknown exception".to_string());
    Some((exc, text))
}

fn describe_object(env: &JniEnv, obj: jni::jobject) -> Option<String> {
    let cls = LocalRef::new(env, env.get_object_class(obj));
    let method = env.get_method_id(cls.get(), "toString", TO_STRING_SIG)?;
    let text = LocalRef::new(env, env.call_object_method(obj, method, &[]));
    if env.exception_check() {
        env.exception_clear();
        return None;
    }
    env.get_string_utf(text.get())
}

fn find_class<'e>(env: &'e JniEnv, internal_name: &str) -> Result<LocalRef<'e>, String> {
    match env.find_class(internal_name) {
        Some(cls) => Ok(LocalRef::new(env, cls)),
        None => Err(pending_exception(env)
            .map(|(_, text)| text)
            .unwrap_or_else(|| format!("class {internal_name} not found"))),
    }
}

fn method<'e>(env: &'e JniEnv, cls: &LocalRef<'e>, name: &str, sig: &str) -> Result<jni::jmethodID, String> {
    env.get_method_id(cls.get(), name, sig).ok_or_else(|| {
        pending_exception(env)
            .map(|(_, text)| text)
            .unwrap_or_else(|| format!("no method {name}{sig}"))
    })
}

fn object_result<'e>(env: &'e JniEnv, obj: jni::jobject) -> Result<LocalRef<'e>, String> {
    let obj = LocalRef::new(env, obj);
    if let Some((_, text)) = pending_exception(env) {
        return Err(text);
    }
    Ok(obj)
}

fn string_value(env: &JniEnv, obj: jni::jobject, method_name: &str) -> Option<String> {
    let cls = LocalRef::new(env, env.get_object_class(obj));
    let method = env.get_method_id(cls.get(), method_name, TO_STRING_SIG)?;
    let text = object_result(env, env.call_object_method(obj, method, &[])).ok()?;
    env.get_string_utf(text.get())
}

/// `urls[index].getFile()`. Every local reference it creates is released
/// before it returns.
fn url_file(env: &JniEnv, urls: jni::jobjectArray, index: jni::jsize) -> Result<Option<String>, String> {
    let url = object_result(env, env.get_object_array_element(urls, index))?;
    if url.is_null() {
        return Ok(None);
    }
    Ok(string_value(env, url.get(), "getFile"))
}

// =============================================================================
// JvmLoadingContext
// =============================================================================

/// A class loader seen from a native callback.
pub struct JvmLoadingContext<'e> {
    env: &'e JniEnv,
    loader: jni::jobject,
    id: ContextId,
    hook_interface: Option<String>,
}

impl<'e> JvmLoadingContext<'e> {
    /// # Safety
    ///
    /// `loader` must be null or a live reference valid in `env` for the
    /// lifetime of the context.
    pub unsafe fn new(env: &'e JniEnv, loader: jni::jobject) -> Self {
        let id = loader_id(env, loader);
        JvmLoadingContext { env, loader, id, hook_interface: None }
    }

    /// Requires every constructed hook to implement `interface` (binary
    /// name).
    pub fn with_hook_interface(mut self, interface: Option<String>) -> Self {
        self.hook_interface = interface;
        self
    }

    pub fn loader(&self) -> jni::jobject {
        self.loader
    }

    pub fn is_bootstrap(&self) -> bool {
        self.loader.is_null()
    }

    fn define_failure(&self, name: &str) -> DefineError {
        let Some((exc, text)) = pending_exception(self.env) else {
            return DefineError::Rejected(format!("{name} was not defined"));
        };
        let duplicate = match self.env.find_class("java/lang/LinkageError") {
            Some(linkage) => {
                let linkage = LocalRef::new(self.env, linkage);
                self.env.is_instance_of(exc.get(), linkage.get()) && text.contains("duplicate")
            }
            None => {
                self.env.exception_clear();
                false
            }
        };
        if duplicate { DefineError::AlreadyDefined } else { DefineError::Rejected(text) }
    }

    fn define_with_loader(&self, name: &str, bytecode: &[u8], security: &ProtectionDomain) -> Result<LocalRef<'e>, DefineError> {
        let env = self.env;
        let loader_class = find_class(env, CLASS_LOADER).map_err(DefineError::Rejected)?;
        let define = method(env, &loader_class, "defineClass", DEFINE_CLASS_SIG).map_err(DefineError::Rejected)?;

        let rejected = || DefineError::Rejected(format!("cannot pass {name} to the VM"));
        let len = jni::jint::try_from(bytecode.len()).map_err(|_| rejected())?;
        let jname = LocalRef::new(env, env.new_string_utf(name).ok_or_else(rejected)?);
        let bytes = LocalRef::new(env, env.byte_array_from(bytecode).ok_or_else(rejected)?);
        let args = [
            jni::jvalue { l: jname.get() },
            jni::jvalue { l: bytes.get() },
            jni::jvalue { i: 0 },
            jni::jvalue { i: len },
            jni::jvalue { l: security.0 },
        ];

        let class = LocalRef::new(env, env.call_object_method(self.loader, define, &args));
        if env.exception_check() || class.is_null() {
            return Err(self.define_failure(name));
        }
        Ok(class)
    }

    fn load_with_loader(&self, name: &str) -> Result<LocalRef<'e>, String> {
        let env = self.env;
        let loader_class = find_class(env, CLASS_LOADER)?;
        let load = method(env, &loader_class, "loadClass", LOAD_CLASS_SIG)?;
        let jname = LocalRef::new(env, env.new_string_utf(name).ok_or_else(|| format!("cannot pass {name} to the VM"))?);
        let class = object_result(env, env.call_object_method(self.loader, load, &[jni::jvalue { l: jname.get() }]))?;
        if class.is_null() {
            return Err(format!("loadClass({name}) returned null"));
        }
        Ok(class)
    }

    fn url_class_path(&self) -> Result<Vec<String>, String> {
        let env = self.env;
        let url_loader = find_class(env, "java/net/URLClassLoader")?;
        if !env.is_instance_of(self.loader, url_loader.get()) {
            return Err("not a URLClassLoader".to_string());
        }
        let get_urls = method(env, &url_loader, "getURLs", "()[Ljava/net/URL;")?;
        let urls = object_result(env, env.call_object_method(self.loader, get_urls, &[]))?;
        if urls.is_null() {
            return Ok(Vec::new());
        }

        let mut locations = Vec::new();
        for index in 0..env.get_array_length(urls.get()) {
            // each URL and its file string stay in a frame of their own
            env.push_local_frame(URL_FRAME_CAPACITY).map_err(|code| format!("PushLocalFrame failed: {code}"))?;
            let file = url_file(env, urls.get(), index);
            env.pop_local_frame(ptr::null_mut());
            if let Some(file) = file? {
                locations.push(file);
            }
        }
        Ok(locations)
    }

    /// Unboxes `value` for a primitive parameter `descriptor`, or passes it
    /// through as a reference.
    fn argument(&self, index: usize, descriptor: &str, value: Option<jni::jobject>) -> Result<jni::jvalue, ConstructionError> {
        let env = self.env;
        let unboxer = match descriptor {
            "Z" => Some(("booleanValue", "()Z")),
            "B" => Some(("byteValue", "()B")),
            "C" => Some(("charValue", "()C")),
            "S" => Some(("shortValue", "()S")),
            "I" => Some(("intValue", "()I")),
            "J" => Some(("longValue", "()J")),
            "F" => Some(("floatValue", "()F")),
            "D" => Some(("doubleValue", "()D")),
            _ => None,
        };
        let obj = value.unwrap_or(ptr::null_mut());
        let Some((name, sig)) = unboxer else {
            return Ok(jni::jvalue { l: obj });
        };
        if obj.is_null() {
            return Err(ConstructionError::NullArgument { index });
        }

        let cls = LocalRef::new(env, env.get_object_class(obj));
        let mismatch = || ConstructionError::ArgumentMismatch { index, expected: descriptor.to_string() };
        let Some(getter) = env.get_method_id(cls.get(), name, sig) else {
            env.exception_clear();
            return Err(mismatch());
        };
        let value = match descriptor {
            "Z" => jni::jvalue { z: env.call_boolean_method(obj, getter, &[]) as jni::jboolean },
            "B" => jni::jvalue { b: env.call_byte_method(obj, getter, &[]) },
            "C" => jni::jvalue { c: env.call_char_method(obj, getter, &[]) },
            "S" => jni::jvalue { s: env.call_short_method(obj, getter, &[]) },
            "I" => jni::jvalue { i: env.call_int_method(obj, getter, &[]) },
            "J" => jni::jvalue { j: env.call_long_method(obj, getter, &[]) },
            "F" => jni::jvalue { f: env.call_float_method(obj, getter, &[]) },
            _ => jni::jvalue { d: env.call_double_method(obj, getter, &[]) },
        };
        if env.exception_check() {
            env.exception_clear();
            return Err(mismatch());
        }
        Ok(value)
    }
}

impl fmt::Debug for JvmLoadingContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JvmLoadingContext")
            .field("id", &self.id)
            .field("loader", &self.loader)
            .field("hook_interface", &self.hook_interface)
            .finish()
    }
}

impl<'e> LoadingContext for JvmLoadingContext<'e> {
    type Class = LocalRef<'e>;
    type Value = jni::jobject;
    type Hook = LocalRef<'e>;
    type Security = ProtectionDomain;

    fn id(&self) -> ContextId {
        self.id
    }

    fn define(&self, name: &str, bytecode: &[u8], security: &ProtectionDomain) -> Result<LocalRef<'e>, DefineError> {
        if !self.loader.is_null() {
            return self.define_with_loader(name, bytecode, security);
        }
        match self.env.define_class(&to_internal_name(name), ptr::null_mut(), bytecode) {
            Some(class) => Ok(LocalRef::new(self.env, class)),
            None => Err(self.define_failure(name)),
        }
    }

    fn load(&self, name: &str) -> Result<LocalRef<'e>, DefineError> {
        if !self.loader.is_null() {
            return self.load_with_loader(name).map_err(DefineError::NotFound);
        }
        find_class(self.env, &to_internal_name(name)).map_err(DefineError::NotFound)
    }

    fn resource_locations(&self) -> Option<Vec<String>> {
        if self.loader.is_null() {
            return None;
        }
        match self.url_class_path() {
            Ok(locations) => Some(locations),
            Err(reason) => {
                debug!(context = %self.id, reason = %reason, "class path not enumerable");
                None
            }
        }
    }

    fn runtime_type_name(&self, value: &jni::jobject) -> Result<String, ConstructionError> {
        if value.is_null() {
            return Err(ConstructionError::Host("null has no runtime class".to_string()));
        }
        let cls = LocalRef::new(self.env, self.env.get_object_class(*value));
        string_value(self.env, cls.get(), "getName")
            .ok_or_else(|| ConstructionError::Host("Class.getName failed".to_string()))
    }

    fn instantiate(
        &self,
        class: &LocalRef<'e>,
        signature: &ConstructorSignature,
        args: &[Option<jni::jobject>],
    ) -> Result<LocalRef<'e>, ConstructionError> {
        let env = self.env;
        let Some(constructor) = env.get_method_id(class.get(), "<init>", signature.descriptor()) else {
            env.exception_clear();
            return Err(ConstructionError::NoSuchConstructor { signature: signature.descriptor().to_string() });
        };

        let values = signature
            .parameters()
            .iter()
            .zip(args)
            .enumerate()
            .map(|(index, (descriptor, arg))| self.argument(index, descriptor, *arg))
            .collect::<Result<Vec<_>, _>>()?;

        let hook = env.new_object(class.get(), constructor, &values).map(|obj| LocalRef::new(env, obj));
        if let Some((_, text)) = pending_exception(env) {
            return Err(ConstructionError::Threw { message: text });
        }
        let hook = hook.ok_or_else(|| ConstructionError::Host("NewObject returned null".to_string()))?;

        if let Some(interface) = &self.hook_interface {
            let iface = find_class(env, &to_internal_name(interface)).map_err(ConstructionError::Host)?;
            if !env.is_instance_of(hook.get(), iface.get()) {
                return Err(ConstructionError::NotAHook { interface: interface.clone() });
            }
        }
        Ok(hook)
    }
}

// =============================================================================
// JvmSystemClassPath
// =============================================================================

/// The system class loader's resources as a class path.
///
/// Every lookup attaches to the calling thread's environment through the
/// `JavaVM`; threads not attached to the VM see an empty class path.
pub struct JvmSystemClassPath {
    vm: *mut jni::JavaVM,
}

// SAFETY: a JavaVM pointer is valid on every thread; each call obtains the
// calling thread's own environment.
unsafe impl Send for JvmSystemClassPath {}
unsafe impl Sync for JvmSystemClassPath {}

impl JvmSystemClassPath {
    /// # Safety
    ///
    /// `vm` must stay valid for the lifetime of this value.
    pub unsafe fn new(vm: *mut jni::JavaVM) -> Self {
        JvmSystemClassPath { vm }
    }

    fn env(&self) -> Option<JniEnv> {
        unsafe { JniEnv::from_vm(self.vm) }
    }

    fn system_resource<'e>(env: &'e JniEnv, method_name: &str, sig: &str, resource: &str) -> Result<LocalRef<'e>, String> {
        let loader_class = find_class(env, CLASS_LOADER)?;
        let getter = env
            .get_static_method_id(loader_class.get(), method_name, sig)
            .ok_or_else(|| format!("no method ClassLoader.{method_name}"))?;
        let jname = LocalRef::new(env, env.new_string_utf(resource).ok_or_else(|| format!("cannot pass {resource} to the VM"))?);
        object_result(env, env.call_static_object_method(loader_class.get(), getter, &[jni::jvalue { l: jname.get() }]))
    }
}

impl fmt::Debug for JvmSystemClassPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JvmSystemClassPath").field("vm", &self.vm).finish()
    }
}

impl ClassPath for JvmSystemClassPath {
    fn find(&self, class_name: &str) -> Option<String> {
        let env = self.env()?;
        let resource = resource_path(class_name);
        let location = match Self::system_resource(&env, "getSystemResource", "(Ljava/lang/String;)Ljava/net/URL;", &resource) {
            Ok(url) if !url.is_null() => describe_object(&env, url.get()),
            Ok(_) => None,
            Err(reason) => {
                warn!(class = class_name, reason = %reason, "system class path lookup failed");
                None
            }
        };
        location
    }

    fn open(&self, class_name: &str) -> Result<Option<Vec<u8>>, ClassPathError> {
        let env = self.env().ok_or_else(|| ClassPathError::Host("thread not attached to the VM".to_string()))?;
        let resource = resource_path(class_name);
        let stream = Self::system_resource(
            &env,
            "getSystemResourceAsStream",
            "(Ljava/lang/String;)Ljava/io/InputStream;",
            &resource,
        )
        .map_err(ClassPathError::Host)?;
        if stream.is_null() {
            return Ok(None);
        }

        let stream_class = find_class(&env, "java/io/InputStream").map_err(ClassPathError::Host)?;
        let read = method(&env, &stream_class, "read", "([B)I").map_err(ClassPathError::Host)?;
        let close = method(&env, &stream_class, "close", "()V").ok();
        let bytes = read_stream(&env, stream.get(), read);
        if let Some(close) = close {
            env.call_void_method(stream.get(), close, &[]);
            env.exception_clear();
        }
        let bytes = bytes.map_err(ClassPathError::Host)?;
        Ok(Some(bytes))
    }
}

/// Drains `stream` through `InputStream.read(byte[])`, available on every
/// supported JDK.
fn read_stream(env: &JniEnv, stream: jni::jobject, read: jni::jmethodID) -> Result<Vec<u8>, String> {
    let chunk = match env.new_byte_array(READ_CHUNK) {
        Some(array) => LocalRef::new(env, array),
        None => {
            return Err(pending_exception(env)
                .map(|(_, text)| text)
                .unwrap_or_else(|| "cannot allocate read buffer".to_string()))
        }
    };
    let mut buf = vec![0u8; READ_CHUNK as usize];
    let mut bytes = Vec::new();
    loop {
        let count = env.call_int_method(stream, read, &[jni::jvalue { l: chunk.get() }]);
        if let Some((_, text)) = pending_exception(env) {
            return Err(text);
        }
        if count < 0 {
            return Ok(bytes);
        }
        let count = (count as usize).min(buf.len());
        env.get_byte_array_region(chunk.get(), &mut buf[..count]);
        bytes.extend_from_slice(&buf[..count]);
    }
}
