mod support;

use std::fs;
use std::sync::Arc;

use jvmti_classpool::classpath::{ClassPath, MemoryClassPath};
use jvmti_classpool::error::{ClassPathError, DefinitionError, ResolutionError};
use jvmti_classpool::pool::{ClassPool, PoolHierarchy};
use support::ClassBuilder;

fn memory(name: &str, classes: &[(&str, Vec<u8>)]) -> Arc<MemoryClassPath> {
    let path = MemoryClassPath::new(name);
    for (class, bytes) in classes {
        path.insert(*class, bytes.clone());
    }
    Arc::new(path)
}

fn with_ctor(name: &str, descriptor: &str) -> Vec<u8> {
    ClassBuilder::new(name).constructor(descriptor).build()
}

#[test]
fn resolution_is_cached_per_pool() {
    support::init_tracing();
    let pool = ClassPool::new("pool");
    pool.append_class_path(memory("m", &[("com.example.Foo", with_ctor("com.example.Foo", "()V"))]));

    assert!(!pool.cached("com.example.Foo"));
    let first = pool.get("com.example.Foo").unwrap();
    let second = pool.get("com.example.Foo").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(pool.cached("com.example.Foo"));

    assert_eq!(first.name(), "com.example.Foo");
    assert_eq!(first.pool_name(), "pool");
    assert_eq!(first.location(), "memory:m/com/example/Foo.class");
    assert!(!first.is_frozen());
    assert!(!first.is_modified());
}

#[test]
fn unresolvable_names_report_not_found() {
    let pool = ClassPool::new("childClassPool");
    let err = pool.get("com.example.Missing").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.class_name(), "com.example.Missing");
    assert_eq!(err.to_string(), "com.example.Missing class not found in childClassPool");
}

#[test]
fn child_first_pool_prefers_its_own_entries() {
    let root = Arc::new(ClassPool::new("root"));
    root.append_class_path(memory("r", &[("com.example.Foo", with_ctor("com.example.Foo", "()V"))]));
    let child = ClassPool::with_parent("child", &root, true);
    child.append_class_path(memory("c", &[("com.example.Foo", with_ctor("com.example.Foo", "(I)V"))]));

    let from_child = child.get("com.example.Foo").unwrap();
    assert_eq!(from_child.pool_name(), "child");
    assert_eq!(from_child.header().constructors().collect::<Vec<_>>(), vec!["(I)V"]);

    let from_root = root.get("com.example.Foo").unwrap();
    assert_eq!(from_root.pool_name(), "root");
    assert!(!Arc::ptr_eq(&from_child, &from_root));
}

#[test]
fn parent_first_pool_prefers_the_parent() {
    let root = Arc::new(ClassPool::new("root"));
    root.append_class_path(memory("r", &[("com.example.Foo", with_ctor("com.example.Foo", "()V"))]));
    let child = ClassPool::with_parent("child", &root, false);
    child.append_class_path(memory("c", &[("com.example.Foo", with_ctor("com.example.Foo", "(I)V"))]));

    assert!(!child.is_child_first());
    assert_eq!(child.get("com.example.Foo").unwrap().pool_name(), "root");
}

#[test]
fn misses_fall_back_to_the_parent() {
    let root = Arc::new(ClassPool::new("root"));
    root.append_class_path(memory("r", &[("com.example.Agent", with_ctor("com.example.Agent", "()V"))]));
    let child = ClassPool::with_parent("child", &root, true);

    assert_eq!(child.parent().unwrap().name(), "root");
    assert_eq!(child.get("com.example.Agent").unwrap().pool_name(), "root");
    // find only looks at the pool's own entries
    assert_eq!(child.find("com.example.Agent"), None);
    assert!(root.find("com.example.Agent").is_some());
}

#[test]
fn parent_is_not_kept_alive_by_the_child() {
    let root = Arc::new(ClassPool::new("root"));
    let child = ClassPool::with_parent("child", &root, true);
    drop(root);
    assert!(child.parent().is_none());
    assert!(child.get("anything.At.All").unwrap_err().is_not_found());
}

#[test]
fn entry_declaring_another_class_is_rejected() {
    let pool = ClassPool::new("pool");
    pool.append_class_path(memory("m", &[("com.example.A", ClassBuilder::new("com.example.B").build())]));
    match pool.get("com.example.A") {
        Err(ResolutionError::WrongName { name, found, .. }) => {
            assert_eq!(name, "com.example.A");
            assert_eq!(found, "com.example.B");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!pool.cached("com.example.A"));
}

#[test]
fn malformed_entry_is_reported_with_its_location() {
    let pool = ClassPool::new("pool");
    pool.append_class_path(memory("m", &[("com.example.A", b"\xCA\xFE".to_vec())]));
    match pool.get("com.example.A") {
        Err(ResolutionError::Malformed { location, .. }) => assert_eq!(location, "memory:m/com/example/A.class"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn earlier_entries_shadow_later_ones() {
    let pool = ClassPool::new("pool");
    pool.append_class_path(memory("first", &[("x.A", with_ctor("x.A", "()V"))]));
    pool.append_class_path(memory("second", &[("x.A", with_ctor("x.A", "(J)V"))]));
    assert_eq!(pool.path_count(), 2);
    assert!(pool.get("x.A").unwrap().location().starts_with("memory:first/"));
}

#[test]
fn insert_path_goes_in_front() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("x")).unwrap();
    fs::write(dir.path().join("x/A.class"), with_ctor("x.A", "(J)V")).unwrap();

    let pool = ClassPool::new("pool");
    pool.append_class_path(memory("m", &[("x.A", with_ctor("x.A", "()V"))]));
    pool.insert_path(dir.path().to_str().unwrap()).unwrap();
    assert!(pool.get("x.A").unwrap().location().starts_with("file:"));

    assert!(pool.append_path("/definitely/not/here.jar").is_err());
    assert_eq!(pool.path_count(), 2);
}

#[test]
fn descriptors_accept_edits_until_frozen() {
    let pool = ClassPool::new("pool");
    pool.append_class_path(memory("m", &[("x.A", with_ctor("x.A", "()V"))]));
    let descriptor = pool.get("x.A").unwrap();

    let edited = with_ctor("x.A", "(Ljava/lang/String;)V");
    descriptor.replace_bytecode(edited.clone()).unwrap();
    assert!(descriptor.is_modified());
    assert_eq!(&*descriptor.bytecode(), edited.as_slice());
    // the pool hands out the same edited descriptor
    assert!(pool.get("x.A").unwrap().is_modified());

    match descriptor.replace_bytecode(ClassBuilder::new("x.B").build()) {
        Err(DefinitionError::NameMismatch { expected, found }) => {
            assert_eq!(expected, "x.A");
            assert_eq!(found, "x.B");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(descriptor.replace_bytecode(vec![1, 2, 3]), Err(DefinitionError::Malformed { .. })));
}

#[test]
fn hierarchy_registers_system_path_in_both_pools() {
    support::init_tracing();
    let system: Arc<dyn ClassPath> = memory("system", &[("java.lang.Foo", with_ctor("java.lang.Foo", "()V"))]);
    let dir = tempfile::tempdir().unwrap();
    let extra = vec![dir.path().to_str().unwrap().to_string(), "/no/such/lib/*".to_string()];

    let pools = PoolHierarchy::new("rootClassPool", "childClassPool", Some(system), &extra);
    assert_eq!(pools.root().name(), "rootClassPool");
    assert_eq!(pools.child().name(), "childClassPool");
    // system + the directory; the missing jar directory is skipped
    assert_eq!(pools.root().path_count(), 2);
    assert_eq!(pools.child().path_count(), 1);
    assert!(pools.child().is_child_first());

    assert_eq!(pools.resolve("java.lang.Foo").unwrap().pool_name(), "childClassPool");
    assert!(pools.resolve("java.lang.Bar").unwrap_err().is_not_found());
}

/// Lists every class but fails to read any of them.
#[derive(Debug)]
struct BrokenReader;

impl ClassPath for BrokenReader {
    fn find(&self, class_name: &str) -> Option<String> {
        Some(format!("broken:{class_name}"))
    }

    fn open(&self, _class_name: &str) -> Result<Option<Vec<u8>>, ClassPathError> {
        Err(ClassPathError::Host("stream closed".to_string()))
    }
}

#[test]
fn unreadable_entry_falls_through_to_later_entries() {
    let pool = ClassPool::new("pool");
    pool.append_class_path(Arc::new(BrokenReader));
    pool.append_class_path(memory("m", &[("com.example.Foo", with_ctor("com.example.Foo", "()V"))]));

    let foo = pool.get("com.example.Foo").unwrap();
    assert_eq!(foo.location(), "memory:m/com/example/Foo.class");

    match pool.get("com.example.Missing") {
        Err(ResolutionError::Unreadable { name, location, .. }) => {
            assert_eq!(name, "com.example.Missing");
            assert_eq!(location, "broken:com.example.Missing");
        }
        other => panic!("unexpected {other:?}"),
    }
}
