//! Class path entries.
//!
//! A [`ClassPath`] is one search location of a pool. It answers two
//! questions about a binary class name: "is it here?" ([`ClassPath::find`],
//! which never reads the class) and "give me its bytes"
//! ([`ClassPath::open`]).
//!
//! [`open_class_path`] turns a path string into the right entry kind:
//!
//! - `dir/*` or `dir\*` - every `.jar`/`.zip` in `dir`
//! - `*.jar`, `*.zip` - one archive
//! - anything else - a directory laid out by package

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use zip::ZipArchive;

use crate::descriptor::resource_path;
use crate::error::ClassPathError;

const MAX_PREALLOCATED_ENTRY: u64 = 1 << 20;

pub trait ClassPath: Send + Sync + fmt::Debug {
    /// Location of `class_name` as a URL-like string, if this entry has it.
    fn find(&self, class_name: &str) -> Option<String>;

    /// Bytes of `class_name`, `Ok(None)` if this entry does not have it.
    fn open(&self, class_name: &str) -> Result<Option<Vec<u8>>, ClassPathError>;
}

/// Opens `path` as a directory, archive, or directory of archives.
pub fn open_class_path(path: &str) -> Result<Arc<dyn ClassPath>, ClassPathError> {
    if let Some(dir) = path.strip_suffix("/*").or_else(|| path.strip_suffix("\\*")) {
        return Ok(Arc::new(JarDirClassPath::open(dir)?));
    }
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".jar") || lower.ends_with(".zip") {
        return Ok(Arc::new(JarClassPath::open(path)?));
    }
    Ok(Arc::new(DirClassPath::open(path)?))
}

/// A directory laid out by package: `com.example.Foo` lives at
/// `<root>/com/example/Foo.class`.
#[derive(Debug)]
pub struct DirClassPath {
    root: PathBuf,
}

impl DirClassPath {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ClassPathError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ClassPathError::NotFound(root.to_path_buf()));
        }
        Ok(DirClassPath { root: root.to_path_buf() })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_for(&self, class_name: &str) -> PathBuf {
        self.root.join(resource_path(class_name))
    }
}

impl ClassPath for DirClassPath {
    fn find(&self, class_name: &str) -> Option<String> {
        let file = self.file_for(class_name);
        if file.is_file() {
            Some(format!("file:{}", file.display()))
        } else {
            None
        }
    }

    fn open(&self, class_name: &str) -> Result<Option<Vec<u8>>, ClassPathError> {
        let file = self.file_for(class_name);
        if !file.is_file() {
            return Ok(None);
        }
        fs::read(&file)
            .map(Some)
            .map_err(|source| ClassPathError::Io { path: file, source })
    }
}

/// A jar or zip archive. Entry names are indexed when the archive is opened,
/// so [`ClassPath::find`] never touches the file.
pub struct JarClassPath {
    path: PathBuf,
    entries: HashSet<String>,
    archive: Mutex<ZipArchive<File>>,
}

impl JarClassPath {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ClassPathError> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(ClassPathError::NotFound(path));
        }
        let file = File::open(&path).map_err(|source| ClassPathError::Io { path: path.clone(), source })?;
        let archive =
            ZipArchive::new(file).map_err(|source| ClassPathError::Archive { path: path.clone(), source })?;
        let entries = archive
            .file_names()
            .filter(|name| name.ends_with(".class"))
            .map(str::to_string)
            .collect();
        Ok(JarClassPath { path, entries, archive: Mutex::new(archive) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn class_count(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Debug for JarClassPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JarClassPath")
            .field("path", &self.path)
            .field("classes", &self.entries.len())
            .finish()
    }
}

impl ClassPath for JarClassPath {
    fn find(&self, class_name: &str) -> Option<String> {
        let entry = resource_path(class_name);
        if self.entries.contains(&entry) {
            Some(format!("jar:file:{}!/{}", self.path.display(), entry))
        } else {
            None
        }
    }

    fn open(&self, class_name: &str) -> Result<Option<Vec<u8>>, ClassPathError> {
        let entry = resource_path(class_name);
        if !self.entries.contains(&entry) {
            return Ok(None);
        }
        let mut archive = self.archive.lock();
        let mut file = archive
            .by_name(&entry)
            .map_err(|source| ClassPathError::Archive { path: self.path.clone(), source })?;
        // the declared size comes from the archive and is only a hint
        let mut bytes = Vec::with_capacity(file.size().min(MAX_PREALLOCATED_ENTRY) as usize);
        file.read_to_end(&mut bytes)
            .map_err(|source| ClassPathError::Io { path: self.path.clone(), source })?;
        Ok(Some(bytes))
    }
}

/// Every archive directly inside a directory, searched in file name order.
#[derive(Debug)]
pub struct JarDirClassPath {
    dir: PathBuf,
    jars: Vec<JarClassPath>,
}

impl JarDirClassPath {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, ClassPathError> {
        let dir = dir.as_ref().to_path_buf();
        let listing = fs::read_dir(&dir).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => ClassPathError::NotFound(dir.clone()),
            _ => ClassPathError::Io { path: dir.clone(), source },
        })?;

        let mut archives: Vec<PathBuf> = listing
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("jar") || e.eq_ignore_ascii_case("zip"))
                    .unwrap_or(false)
            })
            .collect();
        archives.sort();

        let mut jars = Vec::with_capacity(archives.len());
        for archive in archives {
            match JarClassPath::open(&archive) {
                Ok(jar) => jars.push(jar),
                Err(e) => tracing::warn!(path = %archive.display(), error = %e, "skipping unreadable archive"),
            }
        }
        Ok(JarDirClassPath { dir, jars })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn jar_count(&self) -> usize {
        self.jars.len()
    }
}

impl ClassPath for JarDirClassPath {
    fn find(&self, class_name: &str) -> Option<String> {
        self.jars.iter().find_map(|jar| jar.find(class_name))
    }

    fn open(&self, class_name: &str) -> Result<Option<Vec<u8>>, ClassPathError> {
        for jar in &self.jars {
            if let Some(bytes) = jar.open(class_name)? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }
}

/// Class files held in memory, keyed by binary name.
///
/// Useful for classes generated at runtime and for agents that ship their own
/// classes embedded in the native library.
#[derive(Debug)]
pub struct MemoryClassPath {
    name: String,
    classes: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl MemoryClassPath {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryClassPath { name: name.into(), classes: RwLock::new(HashMap::new()) }
    }

    pub fn insert(&self, class_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.classes.write().insert(class_name.into(), bytes.into());
    }

    pub fn remove(&self, class_name: &str) -> bool {
        self.classes.write().remove(class_name).is_some()
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }
}

impl ClassPath for MemoryClassPath {
    fn find(&self, class_name: &str) -> Option<String> {
        if self.classes.read().contains_key(class_name) {
            Some(format!("memory:{}/{}", self.name, resource_path(class_name)))
        } else {
            None
        }
    }

    fn open(&self, class_name: &str) -> Result<Option<Vec<u8>>, ClassPathError> {
        Ok(self.classes.read().get(class_name).map(|bytes| bytes.to_vec()))
    }
}
