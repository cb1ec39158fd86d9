//! Thin wrapper around the JNI environment.
//!
//! Covers what the JVM loading context needs: class definition and lookup,
//! method invocation by `jvalue` arrays, strings, byte arrays and reference
//! management. Every method follows the same pattern of reading the function
//! table through the environment pointer and calling the entry.
//!
//! ```rust,ignore
//! let env = unsafe { JniEnv::from_raw(jni) };
//! let loader_class = env.find_class("java/lang/ClassLoader").map(|c| LocalRef::new(&env, c));
//! if env.exception_check() {
//!     env.exception_clear();
//! }
//! ```

use std::ffi::{CStr, CString};
use std::ptr;

use crate::sys::jni;

/// A JNI environment pointer for the current thread.
///
/// A `JniEnv` is tied to the thread it was obtained on and is neither `Send`
/// nor `Sync`.
pub struct JniEnv {
    env: *mut jni::JNIEnv,
}

impl JniEnv {
    /// # Safety
    ///
    /// `env` must be a valid JNI environment of the calling thread.
    pub unsafe fn from_raw(env: *mut jni::JNIEnv) -> Self {
        JniEnv { env }
    }

    /// Attaches to the environment of the current thread through `vm`.
    ///
    /// Returns `None` when the thread is not attached to the VM.
    ///
    /// # Safety
    ///
    /// `vm` must be a valid `JavaVM` pointer.
    pub unsafe fn from_vm(vm: *mut jni::JavaVM) -> Option<Self> {
        let mut env: *mut std::ffi::c_void = ptr::null_mut();
        let vtable = *vm;
        let result = ((*vtable).GetEnv)(vm, &mut env, jni::JNI_VERSION_1_8);
        if result != jni::JNI_OK || env.is_null() {
            None
        } else {
            Some(JniEnv { env: env as *mut jni::JNIEnv })
        }
    }

    pub fn raw(&self) -> *mut jni::JNIEnv {
        self.env
    }

    // =========================================================================
    // Classes
    // =========================================================================

    /// Finds a class by internal name (`java/lang/String`).
    pub fn find_class(&self, name: &str) -> Option<jni::jclass> {
        let c_name = CString::new(name).ok()?;
        unsafe {
            let vtable = *self.env;
            let cls = ((*vtable).FindClass)(self.env, c_name.as_ptr());
            if cls.is_null() { None } else { Some(cls) }
        }
    }

    /// Defines a class in `loader` (null for the bootstrap loader) from raw
    /// class file bytes. `name` is the internal name.
    pub fn define_class(&self, name: &str, loader: jni::jobject, bytecode: &[u8]) -> Option<jni::jclass> {
        let c_name = CString::new(name).ok()?;
        let len = jni::jsize::try_from(bytecode.len()).ok()?;
        unsafe {
            let vtable = *self.env;
            let cls = ((*vtable).DefineClass)(self.env, c_name.as_ptr(), loader, bytecode.as_ptr().cast(), len);
            if cls.is_null() { None } else { Some(cls) }
        }
    }

    pub fn get_object_class(&self, obj: jni::jobject) -> jni::jclass {
        unsafe {
            let vtable = *self.env;
            ((*vtable).GetObjectClass)(self.env, obj)
        }
    }

    pub fn is_instance_of(&self, obj: jni::jobject, cls: jni::jclass) -> bool {
        unsafe {
            let vtable = *self.env;
            ((*vtable).IsInstanceOf)(self.env, obj, cls) != 0
        }
    }

    pub fn is_same_object(&self, ref1: jni::jobject, ref2: jni::jobject) -> bool {
        unsafe {
            let vtable = *self.env;
            ((*vtable).IsSameObject)(self.env, ref1, ref2) != 0
        }
    }

    // =========================================================================
    // Exceptions
    // =========================================================================

    pub fn exception_check(&self) -> bool {
        unsafe {
            let vtable = *self.env;
            ((*vtable).ExceptionCheck)(self.env) != 0
        }
    }

    pub fn exception_clear(&self) {
        unsafe {
            let vtable = *self.env;
            ((*vtable).ExceptionClear)(self.env);
        }
    }

    pub fn exception_occurred(&self) -> Option<jni::jthrowable> {
        unsafe {
            let vtable = *self.env;
            let exc = ((*vtable).ExceptionOccurred)(self.env);
            if exc.is_null() { None } else { Some(exc) }
        }
    }

    /// Takes the pending exception, leaving none pending.
    pub fn take_exception(&self) -> Option<LocalRef<'_>> {
        let exc = self.exception_occurred()?;
        self.exception_clear();
        Some(LocalRef::new(self, exc))
    }

    // =========================================================================
    // Strings
    // =========================================================================

    pub fn new_string_utf(&self, s: &str) -> Option<jni::jstring> {
        let c_str = CString::new(s).ok()?;
        unsafe {
            let vtable = *self.env;
            let jstr = ((*vtable).NewStringUTF)(self.env, c_str.as_ptr());
            if jstr.is_null() { None } else { Some(jstr) }
        }
    }

    /// Returns `None` if the string is null or not valid UTF-8.
    pub fn get_string_utf(&self, s: jni::jstring) -> Option<String> {
        if s.is_null() {
            return None;
        }
        unsafe {
            let vtable = *self.env;
            let chars = ((*vtable).GetStringUTFChars)(self.env, s, ptr::null_mut());
            if chars.is_null() {
                return None;
            }
            let result = CStr::from_ptr(chars).to_str().ok().map(|s| s.to_string());
            ((*vtable).ReleaseStringUTFChars)(self.env, s, chars);
            result
        }
    }

    // =========================================================================
    // Methods
    // =========================================================================

    pub fn get_method_id(&self, cls: jni::jclass, name: &str, sig: &str) -> Option<jni::jmethodID> {
        let c_name = CString::new(name).ok()?;
        let c_sig = CString::new(sig).ok()?;
        unsafe {
            let vtable = *self.env;
            let mid = ((*vtable).GetMethodID)(self.env, cls, c_name.as_ptr(), c_sig.as_ptr());
            if mid.is_null() { None } else { Some(mid) }
        }
    }

    pub fn get_static_method_id(&self, cls: jni::jclass, name: &str, sig: &str) -> Option<jni::jmethodID> {
        let c_name = CString::new(name).ok()?;
        let c_sig = CString::new(sig).ok()?;
        unsafe {
            let vtable = *self.env;
            let mid = ((*vtable).GetStaticMethodID)(self.env, cls, c_name.as_ptr(), c_sig.as_ptr());
            if mid.is_null() { None } else { Some(mid) }
        }
    }

    /// Runs constructor `method_id` of `cls`.
    pub fn new_object(&self, cls: jni::jclass, method_id: jni::jmethodID, args: &[jni::jvalue]) -> Option<jni::jobject> {
        unsafe {
            let vtable = *self.env;
            let obj = ((*vtable).NewObjectA)(self.env, cls, method_id, args.as_ptr());
            if obj.is_null() { None } else { Some(obj) }
        }
    }

    pub fn call_void_method(&self, obj: jni::jobject, method_id: jni::jmethodID, args: &[jni::jvalue]) {
        unsafe {
            let vtable = *self.env;
            ((*vtable).CallVoidMethodA)(self.env, obj, method_id, args.as_ptr());
        }
    }

    pub fn call_object_method(&self, obj: jni::jobject, method_id: jni::jmethodID, args: &[jni::jvalue]) -> jni::jobject {
        unsafe {
            let vtable = *self.env;
            ((*vtable).CallObjectMethodA)(self.env, obj, method_id, args.as_ptr())
        }
    }

    pub fn call_static_object_method(&self, cls: jni::jclass, method_id: jni::jmethodID, args: &[jni::jvalue]) -> jni::jobject {
        unsafe {
            let vtable = *self.env;
            ((*vtable).CallStaticObjectMethodA)(self.env, cls, method_id, args.as_ptr())
        }
    }

    pub fn call_boolean_method(&self, obj: jni::jobject, method_id: jni::jmethodID, args: &[jni::jvalue]) -> bool {
        unsafe {
            let vtable = *self.env;
            ((*vtable).CallBooleanMethodA)(self.env, obj, method_id, args.as_ptr()) != 0
        }
    }

    pub fn call_byte_method(&self, obj: jni::jobject, method_id: jni::jmethodID, args: &[jni::jvalue]) -> jni::jbyte {
        unsafe {
            let vtable = *self.env;
            ((*vtable).CallByteMethodA)(self.env, obj, method_id, args.as_ptr())
        }
    }

    pub fn call_char_method(&self, obj: jni::jobject, method_id: jni::jmethodID, args: &[jni::jvalue]) -> jni::jchar {
        unsafe {
            let vtable = *self.env;
            ((*vtable).CallCharMethodA)(self.env, obj, method_id, args.as_ptr())
        }
    }

    pub fn call_short_method(&self, obj: jni::jobject, method_id: jni::jmethodID, args: &[jni::jvalue]) -> jni::jshort {
        unsafe {
            let vtable = *self.env;
            ((*vtable).CallShortMethodA)(self.env, obj, method_id, args.as_ptr())
        }
    }

    pub fn call_int_method(&self, obj: jni::jobject, method_id: jni::jmethodID, args: &[jni::jvalue]) -> jni::jint {
        unsafe {
            let vtable = *self.env;
            ((*vtable).CallIntMethodA)(self.env, obj, method_id, args.as_ptr())
        }
    }

    pub fn call_long_method(&self, obj: jni::jobject, method_id: jni::jmethodID, args: &[jni::jvalue]) -> jni::jlong {
        unsafe {
            let vtable = *self.env;
            ((*vtable).CallLongMethodA)(self.env, obj, method_id, args.as_ptr())
        }
    }

    pub fn call_float_method(&self, obj: jni::jobject, method_id: jni::jmethodID, args: &[jni::jvalue]) -> jni::jfloat {
        unsafe {
            let vtable = *self.env;
            ((*vtable).CallFloatMethodA)(self.env, obj, method_id, args.as_ptr())
        }
    }

    pub fn call_double_method(&self, obj: jni::jobject, method_id: jni::jmethodID, args: &[jni::jvalue]) -> jni::jdouble {
        unsafe {
            let vtable = *self.env;
            ((*vtable).CallDoubleMethodA)(self.env, obj, method_id, args.as_ptr())
        }
    }

    // =========================================================================
    // References
    // =========================================================================

    pub fn delete_local_ref(&self, obj: jni::jobject) {
        unsafe {
            let vtable = *self.env;
            ((*vtable).DeleteLocalRef)(self.env, obj);
        }
    }

    pub fn new_weak_global_ref(&self, obj: jni::jobject) -> jni::jweak {
        unsafe {
            let vtable = *self.env;
            ((*vtable).NewWeakGlobalRef)(self.env, obj)
        }
    }

    pub fn delete_weak_global_ref(&self, obj: jni::jweak) {
        unsafe {
            let vtable = *self.env;
            ((*vtable).DeleteWeakGlobalRef)(self.env, obj);
        }
    }

    pub fn push_local_frame(&self, capacity: jni::jint) -> Result<(), jni::jint> {
        unsafe {
            let vtable = *self.env;
            let result = ((*vtable).PushLocalFrame)(self.env, capacity);
            if result == 0 { Ok(()) } else { Err(result) }
        }
    }

    /// Pops the current frame, returning `result` as a reference in the
    /// previous one.
    pub fn pop_local_frame(&self, result: jni::jobject) -> jni::jobject {
        unsafe {
            let vtable = *self.env;
            ((*vtable).PopLocalFrame)(self.env, result)
        }
    }

    // =========================================================================
    // Arrays
    // =========================================================================

    pub fn get_array_length(&self, array: jni::jarray) -> jni::jsize {
        unsafe {
            let vtable = *self.env;
            ((*vtable).GetArrayLength)(self.env, array)
        }
    }

    pub fn get_object_array_element(&self, array: jni::jobjectArray, index: jni::jsize) -> jni::jobject {
        unsafe {
            let vtable = *self.env;
            ((*vtable).GetObjectArrayElement)(self.env, array, index)
        }
    }

    pub fn new_byte_array(&self, length: jni::jsize) -> Option<jni::jbyteArray> {
        unsafe {
            let vtable = *self.env;
            let arr = ((*vtable).NewByteArray)(self.env, length);
            if arr.is_null() { None } else { Some(arr) }
        }
    }

    /// Copies `buf` into a new `byte[]`.
    pub fn byte_array_from(&self, buf: &[u8]) -> Option<jni::jbyteArray> {
        let len = jni::jsize::try_from(buf.len()).ok()?;
        let array = self.new_byte_array(len)?;
        unsafe {
            let vtable = *self.env;
            ((*vtable).SetByteArrayRegion)(self.env, array, 0, len, buf.as_ptr().cast());
        }
        Some(array)
    }

    /// Copies the first `buf.len()` elements of `array` into `buf`.
    pub fn get_byte_array_region(&self, array: jni::jbyteArray, buf: &mut [u8]) {
        unsafe {
            let vtable = *self.env;
            ((*vtable).GetByteArrayRegion)(self.env, array, 0, buf.len() as jni::jsize, buf.as_mut_ptr().cast());
        }
    }
}

// =========================================================================
// Reference guards
// =========================================================================

/// A local reference deleted when dropped.
pub struct LocalRef<'a> {
    env: &'a JniEnv,
    obj: jni::jobject,
}

impl<'a> LocalRef<'a> {
    pub fn new(env: &'a JniEnv, obj: jni::jobject) -> Self {
        LocalRef { env, obj }
    }

    pub fn get(&self) -> jni::jobject {
        self.obj
    }

    pub fn is_null(&self) -> bool {
        self.obj.is_null()
    }
}

impl Drop for LocalRef<'_> {
    fn drop(&mut self) {
        if !self.obj.is_null() {
            self.env.delete_local_ref(self.obj);
        }
    }
}

impl std::fmt::Debug for LocalRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LocalRef").field(&self.obj).finish()
    }
}
