// Raw JNI bindings used for class definition and hook construction.
//
// Only the prefix of the function table up to ExceptionCheck (index 228) is
// declared. Slots this crate never calls are reserved as opaque pointers so
// that every named entry keeps its JDK index. JDK 9+ only appends entries
// after that point, so the prefix layout is stable from JDK 8 onward.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

use std::ffi::c_void;
use std::os::raw::c_char;

// =============================================================================
// Primitive Types
// =============================================================================

pub type jint = i32;
pub type jlong = i64;
pub type jbyte = i8;
pub type jboolean = u8;
pub type jchar = u16;
pub type jshort = i16;
pub type jfloat = f32;
pub type jdouble = f64;
pub type jsize = jint;

// =============================================================================
// Reference Types
// =============================================================================

pub type jobject = *mut c_void;
pub type jclass = jobject;
pub type jstring = jobject;
pub type jarray = jobject;
pub type jthrowable = jobject;
pub type jweak = jobject;
pub type jobjectArray = jarray;
pub type jbyteArray = jarray;

pub type jmethodID = *mut c_void;

#[repr(C)]
#[derive(Copy, Clone)]
pub union jvalue {
    pub z: jboolean,
    pub b: jbyte,
    pub c: jchar,
    pub s: jshort,
    pub i: jint,
    pub j: jlong,
    pub f: jfloat,
    pub d: jdouble,
    pub l: jobject,
}

// =============================================================================
// Constants
// =============================================================================

pub const JNI_OK: jint = 0;
pub const JNI_ERR: jint = -1;
pub const JNI_EDETACHED: jint = -2;
pub const JNI_EVERSION: jint = -3;

pub const JNI_TRUE: jboolean = 1;
pub const JNI_FALSE: jboolean = 0;

pub const JNI_VERSION_1_8: jint = 0x00010008;

/// An unused function table slot.
type Reserved = *mut c_void;

/// `Call<Type>MethodA` for a primitive return type.
type CallMethodA<R> = unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject, method: jmethodID, args: *const jvalue) -> R;

// =============================================================================
// JNINativeInterface_ (prefix)
// =============================================================================

#[repr(C)]
pub struct JNINativeInterface_ {
    // 0-3
    pub reserved0: Reserved,
    pub reserved1: Reserved,
    pub reserved2: Reserved,
    pub reserved3: Reserved,

    // 4
    pub GetVersion: unsafe extern "system" fn(env: *mut JNIEnv) -> jint,

    // 5-6
    pub DefineClass: unsafe extern "system" fn(
        env: *mut JNIEnv,
        name: *const c_char,
        loader: jobject,
        buf: *const jbyte,
        len: jsize,
    ) -> jclass,
    pub FindClass: unsafe extern "system" fn(env: *mut JNIEnv, name: *const c_char) -> jclass,

    // 7-14: reflection, GetSuperclass, IsAssignableFrom, Throw, ThrowNew
    _reserved_7: [Reserved; 8],

    // 15-17
    pub ExceptionOccurred: unsafe extern "system" fn(env: *mut JNIEnv) -> jthrowable,
    pub ExceptionDescribe: unsafe extern "system" fn(env: *mut JNIEnv),
    pub ExceptionClear: unsafe extern "system" fn(env: *mut JNIEnv),

    // 18: FatalError
    _reserved_18: Reserved,

    // 19-25
    pub PushLocalFrame: unsafe extern "system" fn(env: *mut JNIEnv, capacity: jint) -> jint,
    pub PopLocalFrame: unsafe extern "system" fn(env: *mut JNIEnv, result: jobject) -> jobject,
    pub NewGlobalRef: unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject) -> jobject,
    pub DeleteGlobalRef: unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject),
    pub DeleteLocalRef: unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject),
    pub IsSameObject: unsafe extern "system" fn(env: *mut JNIEnv, obj1: jobject, obj2: jobject) -> jboolean,
    pub NewLocalRef: unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject) -> jobject,

    // 26-29: EnsureLocalCapacity, AllocObject, NewObject, NewObjectV
    _reserved_26: [Reserved; 4],

    // 30-33
    pub NewObjectA: unsafe extern "system" fn(
        env: *mut JNIEnv,
        clazz: jclass,
        method: jmethodID,
        args: *const jvalue,
    ) -> jobject,
    pub GetObjectClass: unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject) -> jclass,
    pub IsInstanceOf: unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject, clazz: jclass) -> jboolean,
    pub GetMethodID: unsafe extern "system" fn(
        env: *mut JNIEnv,
        clazz: jclass,
        name: *const c_char,
        sig: *const c_char,
    ) -> jmethodID,

    // 34-60: Call<Type>Method, only the A variants are declared
    _reserved_34: [Reserved; 2],
    pub CallObjectMethodA: CallMethodA<jobject>,
    _reserved_37: [Reserved; 2],
    pub CallBooleanMethodA: CallMethodA<jboolean>,
    _reserved_40: [Reserved; 2],
    pub CallByteMethodA: CallMethodA<jbyte>,
    _reserved_43: [Reserved; 2],
    pub CallCharMethodA: CallMethodA<jchar>,
    _reserved_46: [Reserved; 2],
    pub CallShortMethodA: CallMethodA<jshort>,
    _reserved_49: [Reserved; 2],
    pub CallIntMethodA: CallMethodA<jint>,
    _reserved_52: [Reserved; 2],
    pub CallLongMethodA: CallMethodA<jlong>,
    _reserved_55: [Reserved; 2],
    pub CallFloatMethodA: CallMethodA<jfloat>,
    _reserved_58: [Reserved; 2],
    pub CallDoubleMethodA: CallMethodA<jdouble>,

    // 61-63
    _reserved_61: [Reserved; 2],
    pub CallVoidMethodA: CallMethodA<()>,
    // 64-93: CallNonvirtual*
    _reserved_64: [Reserved; 30],
    // 94-112: instance field access
    _reserved_94: [Reserved; 19],

    // 113-116
    pub GetStaticMethodID: unsafe extern "system" fn(
        env: *mut JNIEnv,
        clazz: jclass,
        name: *const c_char,
        sig: *const c_char,
    ) -> jmethodID,
    _reserved_114: [Reserved; 2],
    pub CallStaticObjectMethodA: unsafe extern "system" fn(
        env: *mut JNIEnv,
        clazz: jclass,
        method: jmethodID,
        args: *const jvalue,
    ) -> jobject,

    // 117-166: other static calls, static fields, UTF-16 strings
    _reserved_117: [Reserved; 50],

    // 167-171
    pub NewStringUTF: unsafe extern "system" fn(env: *mut JNIEnv, utf: *const c_char) -> jstring,
    pub GetStringUTFLength: unsafe extern "system" fn(env: *mut JNIEnv, str: jstring) -> jsize,
    pub GetStringUTFChars:
        unsafe extern "system" fn(env: *mut JNIEnv, str: jstring, isCopy: *mut jboolean) -> *const c_char,
    pub ReleaseStringUTFChars: unsafe extern "system" fn(env: *mut JNIEnv, str: jstring, chars: *const c_char),
    pub GetArrayLength: unsafe extern "system" fn(env: *mut JNIEnv, array: jarray) -> jsize,

    // 172: NewObjectArray
    _reserved_172: Reserved,
    // 173
    pub GetObjectArrayElement:
        unsafe extern "system" fn(env: *mut JNIEnv, array: jobjectArray, index: jsize) -> jobject,
    // 174-175: SetObjectArrayElement, NewBooleanArray
    _reserved_174: [Reserved; 2],
    // 176
    pub NewByteArray: unsafe extern "system" fn(env: *mut JNIEnv, len: jsize) -> jbyteArray,

    // 177-199: other array constructors, element pinning, GetBooleanArrayRegion
    _reserved_177: [Reserved; 23],
    // 200
    pub GetByteArrayRegion: unsafe extern "system" fn(
        env: *mut JNIEnv,
        array: jbyteArray,
        start: jsize,
        len: jsize,
        buf: *mut jbyte,
    ),
    // 201-207
    _reserved_201: [Reserved; 7],
    // 208
    pub SetByteArrayRegion: unsafe extern "system" fn(
        env: *mut JNIEnv,
        array: jbyteArray,
        start: jsize,
        len: jsize,
        buf: *const jbyte,
    ),

    // 209-225: other regions, natives, monitors, GetJavaVM, critical sections
    _reserved_209: [Reserved; 17],

    // 226-228
    pub NewWeakGlobalRef: unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject) -> jweak,
    pub DeleteWeakGlobalRef: unsafe extern "system" fn(env: *mut JNIEnv, obj: jweak),
    pub ExceptionCheck: unsafe extern "system" fn(env: *mut JNIEnv) -> jboolean,
}

/// In C, `JNIEnv` is the pointer to the function table.
pub type JNIEnv = *const JNINativeInterface_;

// =============================================================================
// JNIInvokeInterface_
// =============================================================================

#[repr(C)]
pub struct JNIInvokeInterface_ {
    pub reserved0: Reserved,
    pub reserved1: Reserved,
    pub reserved2: Reserved,

    pub DestroyJavaVM: unsafe extern "system" fn(vm: *mut JavaVM) -> jint,
    pub AttachCurrentThread:
        unsafe extern "system" fn(vm: *mut JavaVM, penv: *mut *mut c_void, args: *mut c_void) -> jint,
    pub DetachCurrentThread: unsafe extern "system" fn(vm: *mut JavaVM) -> jint,
    pub GetEnv: unsafe extern "system" fn(vm: *mut JavaVM, penv: *mut *mut c_void, version: jint) -> jint,
    pub AttachCurrentThreadAsDaemon:
        unsafe extern "system" fn(vm: *mut JavaVM, penv: *mut *mut c_void, args: *mut c_void) -> jint,
}

pub type JavaVM = *const JNIInvokeInterface_;
