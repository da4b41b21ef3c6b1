use std::{
    collections::HashMap,
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use parse::{parser::Parser, pool::ConstantClass};
use tracing::{debug, info, trace, warn};

use crate::{
    class::Class,
    error::{LoadError, LoadResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    /// How many supertypes deep linking may recurse before giving up.
    pub max_link_depth: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            max_link_depth: 256,
        }
    }
}

/// Where a name is in its lifecycle. Names that are absent from the loader,
/// including those whose definition or linking failed, have no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassState {
    Defining,
    Defined,
    Linking,
    Linked,
}

#[derive(Debug)]
struct CacheEntry {
    state: ClassState,
    class: Option<Arc<Class>>,
}

/// Finds classfiles on a search path, defines them, and links their
/// supertypes. Each name is defined at most once per loader.
#[derive(Debug, Default)]
pub struct ClassLoader {
    class_path: Vec<PathBuf>,
    classes: HashMap<String, CacheEntry>,
    options: LoaderOptions,
}

fn normalize(name: &str) -> String {
    name.replace('.', "/")
}

impl ClassLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: LoaderOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn with_class_path<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        let mut loader = Self::new();
        for path in paths {
            loader.add_path(path);
        }

        loader
    }

    /// Build a loader from a platform path list, as found in `CLASSPATH`.
    pub fn from_class_path_str(paths: &str) -> Self {
        Self::with_class_path(env::split_paths(paths))
    }

    pub fn add_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.class_path.push(path.into());
        self
    }

    pub fn class_path(&self) -> &[PathBuf] {
        &self.class_path
    }

    pub fn options(&self) -> LoaderOptions {
        self.options
    }

    pub fn state_of(&self, name: &str) -> Option<ClassState> {
        self.classes.get(&normalize(name)).map(|entry| entry.state)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        matches!(
            self.state_of(name),
            Some(ClassState::Defined | ClassState::Linking | ClassState::Linked)
        )
    }

    pub fn classes(&self) -> impl Iterator<Item = (&str, &Arc<Class>)> {
        self.classes
            .iter()
            .filter_map(|(name, entry)| Some((name.as_str(), entry.class.as_ref()?)))
    }

    fn cached(&self, key: &str) -> LoadResult<Option<Arc<Class>>> {
        match self.classes.get(key) {
            Some(CacheEntry {
                state: ClassState::Defining,
                ..
            }) => Err(LoadError::ReentrantDefinition(key.to_string())),
            Some(entry) => Ok(entry.class.clone()),
            None => Ok(None),
        }
    }

    /// Locate and define `name`, without linking it.
    ///
    /// Returns `Ok(None)` when no search-path root has a file for the name.
    /// When files were found but none of them could be defined, the first
    /// failure is returned.
    pub fn find_class(&mut self, name: &str) -> LoadResult<Option<Arc<Class>>> {
        let key = normalize(name);
        let file_name = format!("{}.class", key);

        if let Some(class) = self.cached(&key)? {
            debug!("Fast path: {} ({})", key, file_name);
            return Ok(Some(class));
        }

        debug!("Slow path: {} ({})", key, file_name);

        let candidates: Vec<PathBuf> = self
            .class_path
            .iter()
            .map(|root| root.join(&file_name))
            .collect();

        let mut first_failure = None;
        for path in candidates {
            let bytes = match read_class_file(&path) {
                Some(bytes) => bytes,
                None => continue,
            };

            match self.define(&key, bytes) {
                Ok(class) => {
                    info!("defined {} from {}", key, path.display());
                    return Ok(Some(class));
                }
                Err(err) => {
                    warn!("could not define {} from {}: {}", key, path.display(), err);
                    first_failure.get_or_insert(err);
                }
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => {
                debug!("{} not found on the class path", key);
                Ok(None)
            }
        }
    }

    /// Define `name` from an in-memory classfile. A name that is already
    /// defined returns the existing class; `bytes` is not decoded.
    pub fn define_class(
        &mut self,
        name: &str,
        bytes: impl Into<Vec<u8>>,
    ) -> LoadResult<Arc<Class>> {
        let key = normalize(name);

        if let Some(class) = self.cached(&key)? {
            debug!("Fast path: {} (in memory)", key);
            return Ok(class);
        }

        self.define(&key, bytes.into())
    }

    fn define(&mut self, key: &str, bytes: Vec<u8>) -> LoadResult<Arc<Class>> {
        self.classes.insert(
            key.to_string(),
            CacheEntry {
                state: ClassState::Defining,
                class: None,
            },
        );

        let result = Parser::from_bytes(bytes)
            .parse()
            .map_err(|source| LoadError::Parse {
                class: key.to_string(),
                source,
            })
            .and_then(|class_file| {
                if class_file.name.as_ref() == key {
                    Ok(class_file)
                } else {
                    Err(LoadError::NameMismatch {
                        requested: key.to_string(),
                        found: class_file.name.to_string(),
                    })
                }
            });

        match result {
            Ok(class_file) => {
                let class = Arc::new(Class::new(class_file));
                self.classes.insert(
                    key.to_string(),
                    CacheEntry {
                        state: ClassState::Defined,
                        class: Some(Arc::clone(&class)),
                    },
                );

                Ok(class)
            }
            Err(err) => {
                self.evict(key);
                Err(err)
            }
        }
    }

    /// Find, define and link `name`.
    pub fn load_class(&mut self, name: &str) -> LoadResult<Option<Arc<Class>>> {
        match self.find_class(name)? {
            Some(class) => {
                self.link_class(&class)?;
                Ok(Some(class))
            }
            None => Ok(None),
        }
    }

    /// Resolve the superclass and interfaces of `class`, loading them as needed.
    ///
    /// Linking a class that is already linked, or is currently being linked
    /// further up the call stack, succeeds immediately. On failure the class
    /// is evicted and may be requested again. Classes this call managed to
    /// link before the failure go back to `Defined`, since they may point at
    /// the evicted class.
    pub fn link_class(&mut self, class: &Arc<Class>) -> LoadResult<()> {
        let mut linked = vec![];
        let result = self.link_at_depth(class, 0, &mut linked);

        if result.is_err() {
            for class in linked {
                self.unlink(&class);
            }
        }

        result
    }

    fn link_at_depth(
        &mut self,
        class: &Arc<Class>,
        depth: usize,
        linked: &mut Vec<Arc<Class>>,
    ) -> LoadResult<()> {
        let key = class.name().to_string();

        match self.classes.get(&key) {
            Some(entry) if entry.class.as_ref().map_or(false, |c| Arc::ptr_eq(c, class)) => {
                match entry.state {
                    ClassState::Linking | ClassState::Linked => return Ok(()),
                    ClassState::Defined => {}
                    ClassState::Defining => return Err(LoadError::ReentrantDefinition(key)),
                }
            }
            _ => return Err(LoadError::NotLoaded(key)),
        }

        if depth > self.options.max_link_depth {
            self.evict(&key);
            return Err(LoadError::LinkageCycleTooDeep {
                class: key,
                depth: self.options.max_link_depth,
            });
        }

        trace!("linking {} at depth {}", key, depth);
        self.set_state(&key, ClassState::Linking);

        match self.link_supertypes(class, depth, linked) {
            Ok(()) => {
                self.set_state(&key, ClassState::Linked);
                linked.push(Arc::clone(class));
                debug!("linked {}", key);
                Ok(())
            }
            Err(err) => {
                self.evict(&key);
                Err(err)
            }
        }
    }

    fn link_supertypes(
        &mut self,
        class: &Arc<Class>,
        depth: usize,
        linked: &mut Vec<Arc<Class>>,
    ) -> LoadResult<()> {
        let interface_names = class
            .class_file()
            .interface_names()
            .map_err(|source| LoadError::Parse {
                class: class.name().to_string(),
                source,
            })?;

        let mut interfaces = Vec::with_capacity(interface_names.len());
        for name in interface_names.iter() {
            interfaces.push(self.resolve_supertype(class, name, depth, linked)?);
        }

        let super_class = match class.super_name() {
            Some(name) => Some(self.resolve_supertype(class, name, depth, linked)?),
            None => None,
        };

        class.set_supertypes(super_class.as_ref(), &interfaces);
        Ok(())
    }

    fn resolve_supertype(
        &mut self,
        class: &Arc<Class>,
        name: &str,
        depth: usize,
        linked: &mut Vec<Arc<Class>>,
    ) -> LoadResult<Arc<Class>> {
        let supertype = self
            .find_class(name)?
            .ok_or_else(|| LoadError::MissingSupertype {
                class: class.name().to_string(),
                supertype: name.to_string(),
            })?;

        self.link_at_depth(&supertype, depth + 1, linked)?;
        Ok(supertype)
    }

    /// Resolve the `Class` constant at `index` in the pool of `class` to a
    /// loaded and linked class, remembering the result on `class`.
    pub fn resolve_class_constant(
        &mut self,
        class: &Arc<Class>,
        index: u16,
    ) -> LoadResult<Option<Arc<Class>>> {
        if let Some(resolved) = class.resolved_constant(index) {
            return Ok(Some(resolved));
        }

        let name = class
            .constant_pool()
            .get::<ConstantClass>(index)
            .map(|constant| Arc::clone(&constant.name))
            .ok_or_else(|| LoadError::DanglingConstantReference {
                class: class.name().to_string(),
                index,
            })?;

        let resolved = match self.load_class(&name)? {
            Some(resolved) => resolved,
            None => return Ok(None),
        };

        class.set_resolved_constant(index, &resolved);
        Ok(Some(resolved))
    }

    fn set_state(&mut self, key: &str, state: ClassState) {
        if let Some(entry) = self.classes.get_mut(key) {
            entry.state = state;
        }
    }

    fn unlink(&mut self, class: &Arc<Class>) {
        class.set_supertypes(None, &[]);

        if let Some(entry) = self.classes.get_mut(class.name()) {
            if entry.class.as_ref().map_or(false, |c| Arc::ptr_eq(c, class)) {
                entry.state = ClassState::Defined;
                debug!("unlinked {}", class.name());
            }
        }
    }

    fn evict(&mut self, key: &str) {
        if self.classes.remove(key).is_some() {
            debug!("evicted {}", key);
        }
    }
}

fn read_class_file(path: &Path) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            trace!("no classfile at {}", path.display());
            None
        }
        Err(err) => {
            warn!("could not read {}: {}", path.display(), err);
            None
        }
    }
}
