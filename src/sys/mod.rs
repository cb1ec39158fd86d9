//! Raw FFI bindings.

pub mod jni;
