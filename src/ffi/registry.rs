//! Library Registry
//!
//! Process-wide, exactly-once loading of native libraries. Each library name
//! owns a `OnceCell`; concurrent first loads block on the same cell and every
//! caller observes the same outcome, including a failed load.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use super::loader::{LibraryLoader, NativeLibrary};

/// Error type for binding operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// The name handed to the loader is not a bare library name
    #[error("invalid library name '{name}': {reason}")]
    InvalidLibraryName { name: String, reason: String },

    /// The library could not be found or could not be loaded
    #[error("cannot link library '{library}': {reason}")]
    Link { library: String, reason: String },

    /// A native function was used before its library was loaded
    #[error("library '{0}' is not loaded")]
    NotLoaded(String),

    /// The library is loaded but does not export the function
    #[error("unsatisfied link for {function} in '{library}' (tried {})", .tried.join(", "))]
    UnsatisfiedLink {
        function: String,
        library: String,
        tried: Vec<String>,
    },

    /// The export exists but its advertised descriptor differs
    #[error("signature mismatch for {function}: declared {declared}, library exports {exported}")]
    SignatureMismatch {
        function: String,
        declared: String,
        exported: String,
    },

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("invalid ABI manifest: {0}")]
    Manifest(String),

    /// A native call produced a value the binding cannot accept
    #[error("native call {function} returned {reason}")]
    BadReturn { function: String, reason: String },
}

type LoadCell = Arc<OnceCell<Result<Arc<NativeLibrary>, BindError>>>;

/// Registry of loaded libraries
pub struct Registry {
    loader: RwLock<LibraryLoader>,
    libraries: Mutex<HashMap<String, LoadCell>>,
}

lazy_static::lazy_static! {
    static ref GLOBAL: Registry = Registry::new();
}

impl Registry {
    /// Registry using the default search paths
    pub fn new() -> Self {
        Self::with_loader(LibraryLoader::new())
    }

    pub fn with_loader(loader: LibraryLoader) -> Self {
        Self {
            loader: RwLock::new(loader),
            libraries: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide registry
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Add a search path for libraries that are not loaded yet
    pub fn add_search_path(&self, path: impl AsRef<Path>) {
        self.loader.write().add_search_path(path);
    }

    /// Load a library by bare name, at most once per registry
    pub fn load_library(&self, name: &str) -> Result<Arc<NativeLibrary>, BindError> {
        self.init_once(name, |loader| loader.load(name))
    }

    /// Load a library from an explicit path or soname, at most once per path
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<Arc<NativeLibrary>, BindError> {
        let path = path.as_ref();
        self.init_once(&path.display().to_string(), |loader| loader.load_path(path))
    }

    fn init_once(
        &self,
        key: &str,
        load: impl FnOnce(&LibraryLoader) -> Result<NativeLibrary, BindError>,
    ) -> Result<Arc<NativeLibrary>, BindError> {
        // The map lock only covers fetching the cell; the load runs outside it so
        // different libraries can load in parallel.
        let cell = Arc::clone(self.libraries.lock().entry(key.to_string()).or_default());

        cell.get_or_init(|| {
            log::info!("loading native library '{}'", key);
            let loader = self.loader.read();
            let result = load(&loader).map(Arc::new);
            if let Err(e) = &result {
                log::error!("{}", e);
            }
            result
        })
        .clone()
    }

    /// The library registered under `name`, if it loaded successfully
    pub fn get(&self, name: &str) -> Option<Arc<NativeLibrary>> {
        self.require(name).ok()
    }

    /// The library registered under `name`. Fails with `NotLoaded` before any
    /// load was attempted, or with the original error if the load failed.
    pub fn require(&self, name: &str) -> Result<Arc<NativeLibrary>, BindError> {
        let cell = self.libraries.lock().get(name).cloned();
        match cell.as_deref().and_then(OnceCell::get) {
            Some(result) => result.clone(),
            None => Err(BindError::NotLoaded(name.to_string())),
        }
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names of successfully loaded libraries, sorted
    pub fn loaded_libraries(&self) -> Vec<String> {
        let libraries = self.libraries.lock();
        let mut names: Vec<String> = libraries
            .iter()
            .filter(|(_, cell)| matches!(cell.get(), Some(Ok(_))))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Load a library into the process-wide registry
pub fn load_library(name: &str) -> Result<Arc<NativeLibrary>, BindError> {
    Registry::global().load_library(name)
}
