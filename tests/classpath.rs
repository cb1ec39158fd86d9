mod support;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use jvmti_classpool::classpath::{open_class_path, ClassPath, DirClassPath, JarClassPath, JarDirClassPath, MemoryClassPath};
use jvmti_classpool::error::ClassPathError;
use support::ClassBuilder;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

fn write_jar(path: &Path, classes: &[&str]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    zip.start_file("META-INF/MANIFEST.MF", FileOptions::default()).unwrap();
    zip.write_all(b"Manifest-Version: 1.0\n").unwrap();
    for name in classes {
        zip.start_file(format!("{}.class", name.replace('.', "/")), FileOptions::default()).unwrap();
        zip.write_all(&ClassBuilder::new(name).build()).unwrap();
    }
    zip.finish().unwrap();
}

#[test]
fn directory_entries() {
    let dir = tempfile::tempdir().unwrap();
    let package = dir.path().join("com/example");
    fs::create_dir_all(&package).unwrap();
    let bytes = ClassBuilder::new("com.example.Foo").build();
    fs::write(package.join("Foo.class"), &bytes).unwrap();

    let path = DirClassPath::open(dir.path()).unwrap();
    let location = path.find("com.example.Foo").unwrap();
    assert!(location.starts_with("file:"));
    assert!(location.ends_with("Foo.class"));
    assert_eq!(path.open("com.example.Foo").unwrap(), Some(bytes));

    assert_eq!(path.find("com.example.Missing"), None);
    assert_eq!(path.open("com.example.Missing").unwrap(), None);
}

#[test]
fn missing_directory_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    assert!(matches!(DirClassPath::open(&missing), Err(ClassPathError::NotFound(p)) if p == missing));
}

#[test]
fn jar_entries() {
    let dir = tempfile::tempdir().unwrap();
    let jar = dir.path().join("lib.jar");
    write_jar(&jar, &["com.example.A", "com.example.B$Inner"]);

    let path = JarClassPath::open(&jar).unwrap();
    assert_eq!(path.class_count(), 2);
    let location = path.find("com.example.B$Inner").unwrap();
    assert!(location.starts_with("jar:file:"));
    assert!(location.ends_with("!/com/example/B$Inner.class"));

    let bytes = path.open("com.example.A").unwrap().unwrap();
    assert_eq!(bytes, ClassBuilder::new("com.example.A").build());
    assert_eq!(path.open("com.example.C").unwrap(), None);
}

#[test]
fn declared_entry_size_is_not_trusted() {
    let dir = tempfile::tempdir().unwrap();
    let jar = dir.path().join("lying.jar");
    let class = ClassBuilder::new("com.example.A").build();
    let mut zip = ZipWriter::new(File::create(&jar).unwrap());
    zip.start_file("com/example/A.class", FileOptions::default().compression_method(CompressionMethod::Stored))
        .unwrap();
    zip.write_all(&class).unwrap();
    zip.finish().unwrap();

    // claim an uncompressed size of almost 4 GiB in both headers
    let mut raw = fs::read(&jar).unwrap();
    let huge = 0xFFFF_FFF0_u32.to_le_bytes();
    let local = find_signature(&raw, 0x0403_4b50);
    raw[local + 22..local + 26].copy_from_slice(&huge);
    let central = find_signature(&raw, 0x0201_4b50);
    raw[central + 24..central + 28].copy_from_slice(&huge);
    fs::write(&jar, raw).unwrap();

    let path = JarClassPath::open(&jar).unwrap();
    assert_eq!(path.open("com.example.A").unwrap(), Some(class));
}

fn find_signature(raw: &[u8], signature: u32) -> usize {
    let needle = signature.to_le_bytes();
    raw.windows(4).position(|w| w == needle).unwrap()
}

#[test]
fn file_that_is_not_an_archive() {
    let dir = tempfile::tempdir().unwrap();
    let jar = dir.path().join("broken.jar");
    fs::write(&jar, b"not a zip").unwrap();
    assert!(matches!(JarClassPath::open(&jar), Err(ClassPathError::Archive { .. })));
}

#[test]
fn jar_directory_searches_archives_in_name_order_and_skips_broken_ones() {
    let dir = tempfile::tempdir().unwrap();
    write_jar(&dir.path().join("b.jar"), &["com.example.Shared", "com.example.OnlyB"]);
    write_jar(&dir.path().join("a.jar"), &["com.example.Shared"]);
    fs::write(dir.path().join("c.jar"), b"garbage").unwrap();
    fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let path = JarDirClassPath::open(dir.path()).unwrap();
    assert_eq!(path.jar_count(), 2);
    assert!(path.find("com.example.Shared").unwrap().contains("a.jar!/"));
    assert!(path.find("com.example.OnlyB").unwrap().contains("b.jar!/"));
    assert!(path.open("com.example.OnlyB").unwrap().is_some());
    assert_eq!(path.find("com.example.Nowhere"), None);
}

#[test]
fn open_class_path_picks_the_entry_kind() {
    let dir = tempfile::tempdir().unwrap();
    let jar = dir.path().join("one.JAR");
    write_jar(&jar, &["x.Y"]);

    let wildcard = format!("{}/*", dir.path().display());
    assert!(open_class_path(&wildcard).unwrap().find("x.Y").is_some());
    assert!(open_class_path(jar.to_str().unwrap()).unwrap().find("x.Y").is_some());
    assert!(open_class_path(dir.path().to_str().unwrap()).unwrap().find("x.Y").is_none());

    let missing = dir.path().join("missing.jar");
    assert!(matches!(open_class_path(missing.to_str().unwrap()), Err(ClassPathError::NotFound(_))));
    let missing_dir = format!("{}/nothing/*", dir.path().display());
    assert!(matches!(open_class_path(&missing_dir), Err(ClassPathError::NotFound(_))));
}

#[test]
fn memory_entries() {
    let path = MemoryClassPath::new("embedded");
    assert!(path.is_empty());
    path.insert("com.example.Foo", ClassBuilder::new("com.example.Foo").build());
    assert_eq!(path.len(), 1);
    assert_eq!(path.find("com.example.Foo").as_deref(), Some("memory:embedded/com/example/Foo.class"));
    assert!(path.open("com.example.Foo").unwrap().is_some());

    assert!(path.remove("com.example.Foo"));
    assert!(!path.remove("com.example.Foo"));
    assert_eq!(path.open("com.example.Foo").unwrap(), None);
}
