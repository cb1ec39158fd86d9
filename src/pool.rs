//! Class pools.
//!
//! A [`ClassPool`] is an ordered search path of [`ClassPath`] entries plus a
//! cache of the [`TypeDescriptor`]s it has handed out. Pools form a tree:
//! a pool may hold a non-owning reference to a parent and delegate misses to
//! it. The agent uses two of them, wrapped in a [`PoolHierarchy`]:
//!
//! ```text
//! root pool   system class path + agent paths      (no parent)
//!     ^
//!     | delegates misses
//! child pool  system class path + discovered paths  (child-first)
//! ```
//!
//! Application classes discovered from class loaders land in the child pool,
//! the agent's own classes in the root pool, so one agent can instrument
//! several applications without their classes colliding with its own.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::classfile::ClassHeader;
use crate::classpath::{open_class_path, ClassPath};
use crate::config::EngineConfig;
use crate::descriptor::{to_binary_name, to_internal_name};
use crate::error::{ClassPathError, DefinitionError, ResolutionError};

/// An editable class definition, shared by everyone who resolves the same
/// name through the same pool.
///
/// Edits replace the whole class file and are rejected once the class has
/// been defined into a loading context.
pub struct TypeDescriptor {
    name: String,
    pool: String,
    location: String,
    state: RwLock<DescriptorState>,
}

struct DescriptorState {
    bytecode: Arc<[u8]>,
    header: ClassHeader,
    frozen: bool,
    modified: bool,
}

impl TypeDescriptor {
    /// Parses `bytecode` as the class file of `name` (binary form).
    pub fn parse(
        name: &str,
        pool: &str,
        location: impl Into<String>,
        bytecode: Vec<u8>,
    ) -> Result<Self, DefinitionError> {
        let header = parse_checked(name, &bytecode)?;
        Ok(TypeDescriptor {
            name: name.to_string(),
            pool: pool.to_string(),
            location: location.into(),
            state: RwLock::new(DescriptorState {
                bytecode: bytecode.into(),
                header,
                frozen: false,
                modified: false,
            }),
        })
    }

    /// Binary name, e.g. `com.example.Foo$Bar`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the pool that produced this descriptor.
    pub fn pool_name(&self) -> &str {
        &self.pool
    }

    /// Where the class file was read from.
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn bytecode(&self) -> Arc<[u8]> {
        Arc::clone(&self.state.read().bytecode)
    }

    pub fn header(&self) -> ClassHeader {
        self.state.read().header.clone()
    }

    /// Binary names of the classes this class encloses.
    pub fn nested_class_names(&self) -> Vec<String> {
        self.state.read().header.nested_classes().iter().map(|n| to_binary_name(n)).collect()
    }

    pub fn is_frozen(&self) -> bool {
        self.state.read().frozen
    }

    pub fn is_modified(&self) -> bool {
        self.state.read().modified
    }

    /// Installs an edited class file.
    ///
    /// The new bytes must parse and must still declare this class.
    pub fn replace_bytecode(&self, bytecode: Vec<u8>) -> Result<(), DefinitionError> {
        let header = parse_checked(&self.name, &bytecode)?;
        let mut state = self.state.write();
        if state.frozen {
            return Err(DefinitionError::Frozen { name: self.name.clone() });
        }
        state.bytecode = bytecode.into();
        state.header = header;
        state.modified = true;
        Ok(())
    }

    pub(crate) fn freeze(&self) {
        self.state.write().frozen = true;
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("pool", &self.pool)
            .field("location", &self.location)
            .field("len", &state.bytecode.len())
            .field("frozen", &state.frozen)
            .field("modified", &state.modified)
            .finish()
    }
}

fn parse_checked(name: &str, bytecode: &[u8]) -> Result<ClassHeader, DefinitionError> {
    let header = ClassHeader::parse(bytecode)
        .map_err(|source| DefinitionError::Malformed { name: name.to_string(), source })?;
    if header.this_class != to_internal_name(name) {
        return Err(DefinitionError::NameMismatch {
            expected: name.to_string(),
            found: to_binary_name(&header.this_class),
        });
    }
    Ok(header)
}

struct PoolState {
    paths: Vec<Arc<dyn ClassPath>>,
    cache: HashMap<String, Arc<TypeDescriptor>>,
}

/// A named, lazily filled class pool.
pub struct ClassPool {
    name: String,
    parent: Option<Weak<ClassPool>>,
    child_first: bool,
    state: RwLock<PoolState>,
}

impl ClassPool {
    /// A pool without a parent.
    pub fn new(name: impl Into<String>) -> Self {
        ClassPool {
            name: name.into(),
            parent: None,
            child_first: false,
            state: RwLock::new(PoolState { paths: Vec::new(), cache: HashMap::new() }),
        }
    }

    /// A pool delegating misses to `parent`. With `child_first` set, the
    /// pool's own entries win over the parent's.
    pub fn with_parent(name: impl Into<String>, parent: &Arc<ClassPool>, child_first: bool) -> Self {
        ClassPool { parent: Some(Arc::downgrade(parent)), child_first, ..ClassPool::new(name) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<Arc<ClassPool>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_child_first(&self) -> bool {
        self.child_first
    }

    /// Opens `path` and appends it to the search path.
    pub fn append_path(&self, path: &str) -> Result<(), ClassPathError> {
        let entry = open_class_path(path)?;
        self.append_class_path(entry);
        Ok(())
    }

    /// Opens `path` and puts it in front of every other entry.
    pub fn insert_path(&self, path: &str) -> Result<(), ClassPathError> {
        let entry = open_class_path(path)?;
        self.state.write().paths.insert(0, entry);
        Ok(())
    }

    pub fn append_class_path(&self, entry: Arc<dyn ClassPath>) {
        self.state.write().paths.push(entry);
    }

    pub fn path_count(&self) -> usize {
        self.state.read().paths.len()
    }

    /// Whether `name` has already been resolved through this pool.
    pub fn cached(&self, name: &str) -> bool {
        self.state.read().cache.contains_key(name)
    }

    /// Location of `name` in this pool's own search path.
    ///
    /// Never reads the class file and never asks the parent.
    pub fn find(&self, name: &str) -> Option<String> {
        let state = self.state.read();
        state.paths.iter().find_map(|p| p.find(name))
    }

    /// Resolves `name` (binary form) to its descriptor.
    pub fn get(&self, name: &str) -> Result<Arc<TypeDescriptor>, ResolutionError> {
        self.lookup(name)?.ok_or_else(|| ResolutionError::not_found(name, &self.name))
    }

    fn lookup(&self, name: &str) -> Result<Option<Arc<TypeDescriptor>>, ResolutionError> {
        let parent = self.parent();
        if !self.child_first {
            if let Some(parent) = &parent {
                if let Some(found) = parent.lookup(name)? {
                    return Ok(Some(found));
                }
            }
        }
        if let Some(found) = self.lookup_local(name)? {
            return Ok(Some(found));
        }
        match &parent {
            Some(parent) if self.child_first => {
                debug!(pool = %self.name, parent = %parent.name, class = name, "delegating to parent pool");
                parent.lookup(name)
            }
            _ => Ok(None),
        }
    }

    fn lookup_local(&self, name: &str) -> Result<Option<Arc<TypeDescriptor>>, ResolutionError> {
        let paths = {
            let state = self.state.read();
            if let Some(cached) = state.cache.get(name) {
                debug!(pool = %self.name, class = name, "cache hit");
                return Ok(Some(Arc::clone(cached)));
            }
            state.paths.clone()
        };

        // An entry that lists the class but cannot read it gives way to later
        // entries; its error is reported only if none of them has the class.
        let mut unreadable = None;
        for path in &paths {
            let Some(location) = path.find(name) else { continue };
            let bytes = match path.open(name) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(source) => {
                    warn!(pool = %self.name, class = name, location = %location, error = %source, "class file unreadable");
                    unreadable.get_or_insert(ResolutionError::Unreadable { name: name.to_string(), location, source });
                    continue;
                }
            };
            let descriptor =
                TypeDescriptor::parse(name, &self.name, location.clone(), bytes).map_err(|e| match e {
                    DefinitionError::NameMismatch { found, .. } => {
                        ResolutionError::WrongName { name: name.to_string(), location: location.clone(), found }
                    }
                    DefinitionError::Malformed { source, .. } => {
                        ResolutionError::Malformed { name: name.to_string(), location: location.clone(), source }
                    }
                    other => ResolutionError::Unreadable {
                        name: name.to_string(),
                        location: location.clone(),
                        source: ClassPathError::Host(other.to_string()),
                    },
                })?;

            let mut state = self.state.write();
            let entry = state.cache.entry(name.to_string()).or_insert_with(|| Arc::new(descriptor));
            debug!(pool = %self.name, class = name, location = %location, "class resolved");
            return Ok(Some(Arc::clone(entry)));
        }
        match unreadable {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for ClassPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("ClassPool")
            .field("name", &self.name)
            .field("child_first", &self.child_first)
            .field("paths", &state.paths.len())
            .field("cached", &state.cache.len())
            .finish()
    }
}

/// The root and child pools of one agent.
#[derive(Debug)]
pub struct PoolHierarchy {
    root: Arc<ClassPool>,
    child: Arc<ClassPool>,
}

impl PoolHierarchy {
    /// Builds both pools. `system` is registered in each of them; every
    /// entry of `extra_paths` goes to the root pool, and one that cannot be
    /// opened is logged and skipped.
    pub fn new<S: AsRef<str>>(
        root_name: &str,
        child_name: &str,
        system: Option<Arc<dyn ClassPath>>,
        extra_paths: &[S],
    ) -> Self {
        let root = ClassPool::new(root_name);
        if let Some(system) = &system {
            root.append_class_path(Arc::clone(system));
        }
        for path in extra_paths {
            append_or_warn(&root, path.as_ref());
        }
        let root = Arc::new(root);

        let child = ClassPool::with_parent(child_name, &root, true);
        if let Some(system) = system {
            child.append_class_path(system);
        }

        PoolHierarchy { root, child: Arc::new(child) }
    }

    pub fn from_config(config: &EngineConfig, system: Option<Arc<dyn ClassPath>>) -> Self {
        Self::new(&config.root_pool_name, &config.child_pool_name, system, &config.extra_paths)
    }

    pub fn root(&self) -> &Arc<ClassPool> {
        &self.root
    }

    pub fn child(&self) -> &Arc<ClassPool> {
        &self.child
    }

    /// Child-first resolution, falling back to the root pool.
    pub fn resolve(&self, name: &str) -> Result<Arc<TypeDescriptor>, ResolutionError> {
        self.child.get(name)
    }
}

pub(crate) fn append_or_warn(pool: &ClassPool, path: &str) -> bool {
    match pool.append_path(path) {
        Ok(()) => {
            info!(pool = %pool.name(), path, "class path registered");
            true
        }
        Err(e) => {
            warn!(pool = %pool.name(), path, error = %e, "appendClassPath fail. lib not found");
            false
        }
    }
}
