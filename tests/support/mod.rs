#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use jvmti_classpool::classfile::ClassHeader;
use jvmti_classpool::classpath::MemoryClassPath;
use jvmti_classpool::context::{ContextId, DefineError, LoadingContext};
use jvmti_classpool::descriptor::{to_binary_name, to_internal_name, ConstructorSignature};
use jvmti_classpool::error::ConstructionError;
use parking_lot::Mutex;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .try_init();
}

// =============================================================================
// Class file builder
// =============================================================================

pub struct CpBuilder {
    entries: Vec<Vec<u8>>,
    next_index: u16,
}

impl CpBuilder {
    pub fn new() -> Self {
        Self { entries: Vec::new(), next_index: 1 }
    }

    fn push(&mut self, entry: Vec<u8>, slots: u16) -> u16 {
        let index = self.next_index;
        self.entries.push(entry);
        self.next_index += slots;
        index
    }

    pub fn utf8(&mut self, s: &str) -> u16 {
        let mut entry = Vec::new();
        entry.push(1);
        entry.extend_from_slice(&(s.len() as u16).to_be_bytes());
        entry.extend_from_slice(s.as_bytes());
        self.push(entry, 1)
    }

    pub fn class(&mut self, internal_name: &str) -> u16 {
        let name_index = self.utf8(internal_name);
        let mut entry = Vec::new();
        entry.push(7);
        entry.extend_from_slice(&name_index.to_be_bytes());
        self.push(entry, 1)
    }

    pub fn long(&mut self, value: i64) -> u16 {
        let mut entry = Vec::new();
        entry.push(5);
        entry.extend_from_slice(&value.to_be_bytes());
        self.push(entry, 2)
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        let mut entry = Vec::new();
        entry.push(3);
        entry.extend_from_slice(&value.to_be_bytes());
        self.push(entry, 1)
    }

    pub fn count(&self) -> u16 {
        self.next_index
    }
}

pub fn u2(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn u4(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn push_attr(out: &mut Vec<u8>, name_index: u16, info: &[u8]) {
    u2(out, name_index);
    u4(out, info.len() as u32);
    out.extend_from_slice(info);
}

struct InnerRow {
    inner: String,
    outer: Option<String>,
    simple_name: Option<String>,
    flags: u16,
}

/// Builds minimal class files: a name, constructors and `InnerClasses` rows.
/// Names are given in binary form.
pub struct ClassBuilder {
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    constructors: Vec<String>,
    inner: Vec<InnerRow>,
    with_constants: bool,
}

impl ClassBuilder {
    pub fn new(binary_name: &str) -> Self {
        ClassBuilder {
            name: to_internal_name(binary_name),
            super_name: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            constructors: Vec::new(),
            inner: Vec::new(),
            with_constants: false,
        }
    }

    pub fn no_super(mut self) -> Self {
        self.super_name = None;
        self
    }

    pub fn interface(mut self, binary_name: &str) -> Self {
        self.interfaces.push(to_internal_name(binary_name));
        self
    }

    pub fn constructor(mut self, descriptor: &str) -> Self {
        self.constructors.push(descriptor.to_string());
        self
    }

    pub fn default_constructor(self) -> Self {
        self.constructor("()V")
    }

    /// Adds an `InnerClasses` row declaring `inner` as a member of this
    /// class.
    pub fn member(mut self, inner: &str) -> Self {
        let simple = inner.rsplit('$').next().map(str::to_string);
        self.inner.push(InnerRow {
            inner: to_internal_name(inner),
            outer: Some(self.name.clone()),
            simple_name: simple,
            flags: 0x0009,
        });
        self
    }

    /// Adds a row for an anonymous class (no outer class, no simple name).
    pub fn anonymous(mut self, inner: &str) -> Self {
        self.inner.push(InnerRow { inner: to_internal_name(inner), outer: None, simple_name: None, flags: 0 });
        self
    }

    /// Adds the row javac writes into a nested class describing itself.
    pub fn enclosed_by(mut self, outer: &str) -> Self {
        let simple = self.name.rsplit('$').next().map(str::to_string);
        self.inner.push(InnerRow {
            inner: self.name.clone(),
            outer: Some(to_internal_name(outer)),
            simple_name: simple,
            flags: 0x0009,
        });
        self
    }

    /// Adds a row for a class nested somewhere else, as javac does for every
    /// member class referenced from the constant pool.
    pub fn references(mut self, inner: &str, outer: &str) -> Self {
        self.inner.push(InnerRow {
            inner: to_internal_name(inner),
            outer: Some(to_internal_name(outer)),
            simple_name: inner.rsplit('$').next().map(str::to_string),
            flags: 0x0001,
        });
        self
    }

    /// Puts a long and an int into the constant pool ahead of everything
    /// else.
    pub fn with_constants(mut self) -> Self {
        self.with_constants = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut cp = CpBuilder::new();
        if self.with_constants {
            cp.long(0x0102_0304_0506_0708);
            cp.integer(42);
        }
        let this_class = cp.class(&self.name);
        let super_class = self.super_name.as_deref().map(|s| cp.class(s)).unwrap_or(0);
        let interfaces: Vec<u16> = self.interfaces.iter().map(|i| cp.class(i)).collect();

        let utf_init = cp.utf8("<init>");
        let ctor_descs: Vec<u16> = self.constructors.iter().map(|d| cp.utf8(d)).collect();

        let mut inner_info = Vec::new();
        let utf_inner_classes = if self.inner.is_empty() { 0 } else { cp.utf8("InnerClasses") };
        if !self.inner.is_empty() {
            u2(&mut inner_info, self.inner.len() as u16);
            for row in &self.inner {
                let inner = cp.class(&row.inner);
                let outer = row.outer.as_deref().map(|o| cp.class(o)).unwrap_or(0);
                let simple = row.simple_name.as_deref().map(|s| cp.utf8(s)).unwrap_or(0);
                u2(&mut inner_info, inner);
                u2(&mut inner_info, outer);
                u2(&mut inner_info, simple);
                u2(&mut inner_info, row.flags);
            }
        }

        let mut bytes = Vec::new();
        u4(&mut bytes, 0xCAFEBABE);
        u2(&mut bytes, 0);
        u2(&mut bytes, 52);
        u2(&mut bytes, cp.count());
        for entry in &cp.entries {
            bytes.extend_from_slice(entry);
        }

        u2(&mut bytes, 0x0021);
        u2(&mut bytes, this_class);
        u2(&mut bytes, super_class);

        u2(&mut bytes, interfaces.len() as u16);
        for i in interfaces {
            u2(&mut bytes, i);
        }

        // fields
        u2(&mut bytes, 0);

        u2(&mut bytes, ctor_descs.len() as u16);
        for desc in ctor_descs {
            u2(&mut bytes, 0x0001);
            u2(&mut bytes, utf_init);
            u2(&mut bytes, desc);
            u2(&mut bytes, 0);
        }

        if self.inner.is_empty() {
            u2(&mut bytes, 0);
        } else {
            u2(&mut bytes, 1);
            push_attr(&mut bytes, utf_inner_classes, &inner_info);
        }
        bytes
    }
}

/// `com.example.Foo` with a no-argument constructor and a `(String, int)`
/// one, nesting `Foo$Bar`, which nests `Foo$Bar$Baz`.
pub fn foo_family(path: &MemoryClassPath) {
    path.insert(
        "com.example.Foo",
        ClassBuilder::new("com.example.Foo")
            .default_constructor()
            .constructor("(Ljava/lang/String;I)V")
            .member("com.example.Foo$Bar")
            .build(),
    );
    path.insert(
        "com.example.Foo$Bar",
        ClassBuilder::new("com.example.Foo$Bar")
            .default_constructor()
            .enclosed_by("com.example.Foo")
            .member("com.example.Foo$Bar$Baz")
            .build(),
    );
    path.insert(
        "com.example.Foo$Bar$Baz",
        ClassBuilder::new("com.example.Foo$Bar$Baz")
            .default_constructor()
            .enclosed_by("com.example.Foo$Bar")
            .build(),
    );
}

// =============================================================================
// In-memory loading context
// =============================================================================

#[derive(Debug)]
pub struct FakeClass {
    pub name: String,
    pub constructors: Vec<String>,
    pub interfaces: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FakeValue {
    pub type_name: String,
    pub text: String,
}

impl FakeValue {
    pub fn new(type_name: &str, text: &str) -> Self {
        FakeValue { type_name: type_name.to_string(), text: text.to_string() }
    }
}

#[derive(Debug, Clone)]
pub struct FakeHook {
    pub class: Arc<FakeClass>,
    pub constructor: String,
    pub args: Vec<Option<FakeValue>>,
    pub serial: usize,
}

/// A class loader simulated in memory.
///
/// Like a JVM it refuses a second definition of a name. It additionally
/// refuses a class whose nested classes are not live yet, so tests observe
/// definition order through success or failure.
#[derive(Debug)]
pub struct FakeContext {
    id: ContextId,
    classes: Mutex<HashMap<String, Arc<FakeClass>>>,
    /// Names in the order `define` accepted them.
    defined: Mutex<Vec<String>>,
    define_calls: Mutex<usize>,
    instances: Mutex<usize>,
    reject: HashSet<String>,
    locations: Option<Vec<String>>,
    define_delay: Option<Duration>,
    hook_interface: Option<String>,
}

impl FakeContext {
    pub fn new() -> Self {
        FakeContext {
            id: ContextId::allocate(),
            classes: Mutex::new(HashMap::new()),
            defined: Mutex::new(Vec::new()),
            define_calls: Mutex::new(0),
            instances: Mutex::new(0),
            reject: HashSet::new(),
            locations: None,
            define_delay: None,
            hook_interface: None,
        }
    }

    pub fn rejecting(mut self, name: &str) -> Self {
        self.reject.insert(name.to_string());
        self
    }

    pub fn with_locations<S: Into<String>>(mut self, locations: impl IntoIterator<Item = S>) -> Self {
        self.locations = Some(locations.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_define_delay(mut self, delay: Duration) -> Self {
        self.define_delay = Some(delay);
        self
    }

    pub fn with_hook_interface(mut self, interface: &str) -> Self {
        self.hook_interface = Some(interface.to_string());
        self
    }

    /// Makes `name` live without going through `define`, as if the loader
    /// had found it by itself.
    pub fn preload(&self, bytecode: &[u8]) {
        let header = ClassHeader::parse(bytecode).expect("valid class file");
        let class = fake_class(&header);
        self.classes.lock().insert(class.name.clone(), Arc::new(class));
    }

    pub fn defined(&self) -> Vec<String> {
        self.defined.lock().clone()
    }

    pub fn define_calls(&self) -> usize {
        *self.define_calls.lock()
    }

    pub fn is_live(&self, name: &str) -> bool {
        self.classes.lock().contains_key(name)
    }
}

fn fake_class(header: &ClassHeader) -> FakeClass {
    FakeClass {
        name: to_binary_name(&header.this_class),
        constructors: header.constructors().map(str::to_string).collect(),
        interfaces: header.interfaces.iter().map(|i| to_binary_name(i)).collect(),
    }
}

impl LoadingContext for FakeContext {
    type Class = Arc<FakeClass>;
    type Value = FakeValue;
    type Hook = FakeHook;
    type Security = ();

    fn id(&self) -> ContextId {
        self.id
    }

    fn define(&self, name: &str, bytecode: &[u8], _security: &()) -> Result<Arc<FakeClass>, DefineError> {
        *self.define_calls.lock() += 1;
        if let Some(delay) = self.define_delay {
            thread::sleep(delay);
        }
        if self.reject.contains(name) {
            return Err(DefineError::Rejected(format!("java.lang.ClassFormatError: {name}")));
        }
        let header = ClassHeader::parse(bytecode).map_err(|e| DefineError::Rejected(e.to_string()))?;

        let mut classes = self.classes.lock();
        if classes.contains_key(name) {
            return Err(DefineError::AlreadyDefined);
        }
        for nested in header.nested_classes() {
            let nested = to_binary_name(&nested);
            if !classes.contains_key(&nested) {
                return Err(DefineError::Rejected(format!("java.lang.NoClassDefFoundError: {nested}")));
            }
        }
        let class = Arc::new(fake_class(&header));
        classes.insert(name.to_string(), Arc::clone(&class));
        self.defined.lock().push(name.to_string());
        Ok(class)
    }

    fn load(&self, name: &str) -> Result<Arc<FakeClass>, DefineError> {
        self.classes
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| DefineError::NotFound(name.to_string()))
    }

    fn resource_locations(&self) -> Option<Vec<String>> {
        self.locations.clone()
    }

    fn runtime_type_name(&self, value: &FakeValue) -> Result<String, ConstructionError> {
        Ok(value.type_name.clone())
    }

    fn instantiate(
        &self,
        class: &Arc<FakeClass>,
        signature: &ConstructorSignature,
        args: &[Option<FakeValue>],
    ) -> Result<FakeHook, ConstructionError> {
        if !class.constructors.iter().any(|c| c == signature.descriptor()) {
            return Err(ConstructionError::NoSuchConstructor { signature: signature.descriptor().to_string() });
        }
        if let Some(interface) = &self.hook_interface {
            if !class.interfaces.contains(interface) {
                return Err(ConstructionError::NotAHook { interface: interface.clone() });
            }
        }
        let mut instances = self.instances.lock();
        *instances += 1;
        Ok(FakeHook {
            class: Arc::clone(class),
            constructor: signature.descriptor().to_string(),
            args: args.to_vec(),
            serial: *instances,
        })
    }
}
