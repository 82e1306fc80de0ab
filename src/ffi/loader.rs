//! Dynamic Library Loader
//!
//! Safe wrapper around libloading for loading shared libraries by bare name.

use std::ffi::{c_char, CStr, OsStr};
use std::path::{Path, PathBuf};

use libloading::Library;

use super::manifest::{AbiManifest, MANIFEST_SYMBOL};
use super::types::NativeDecl;
use super::BindError;
use crate::android::AndroidTarget;

/// Extra search directories, separated like `PATH`
pub const LIBRARY_PATH_ENV: &str = "RUSTJNI_LIBRARY_PATH";

type ManifestFn = unsafe extern "C" fn() -> *const c_char;

/// A loaded native library
pub struct NativeLibrary {
    /// Name the library was registered under
    name: String,
    /// What was handed to the dynamic linker
    path: PathBuf,
    /// The loaded library handle
    library: Library,
    /// ABI manifest, when the library exports one
    manifest: Option<AbiManifest>,
}

impl NativeLibrary {
    /// Load a library from the given path (or soname) and read its manifest
    pub fn load(name: &str, path: impl AsRef<Path>) -> Result<Self, BindError> {
        let path = path.as_ref().to_path_buf();

        // Safety: loading runs the library's initializers. We trust whatever the
        // caller asked us to load, the same way System.loadLibrary does.
        let library = unsafe {
            Library::new(path.as_os_str()).map_err(|e| BindError::Link {
                library: name.to_string(),
                reason: e.to_string(),
            })?
        };

        let manifest = read_manifest(name, &library)?;
        match &manifest {
            Some(m) => log::debug!(
                "loaded '{}' from {} ({} manifest exports)",
                name,
                path.display(),
                m.exports.len()
            ),
            None => log::debug!("loaded '{}' from {}", name, path.display()),
        }

        Ok(Self {
            name: name.to_string(),
            path,
            library,
            manifest,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> Option<&AbiManifest> {
        self.manifest.as_ref()
    }

    /// Whether the library exports `symbol`
    pub fn has_symbol(&self, symbol: &str) -> bool {
        let Ok(c_name) = symbol_bytes(symbol) else {
            return false;
        };
        // Safety: the symbol is only looked up, never called or dereferenced.
        unsafe { self.library.get::<*const ()>(&c_name).is_ok() }
    }

    /// Find the exported symbol for a declaration and check it against the
    /// manifest. Returns the symbol that matched.
    pub fn resolve_symbol(&self, decl: &NativeDecl) -> Result<String, BindError> {
        let candidates = decl.symbols();
        let symbol = candidates
            .iter()
            .find(|s| self.has_symbol(s))
            .cloned()
            .ok_or_else(|| BindError::UnsatisfiedLink {
                function: decl.to_string(),
                library: self.name.clone(),
                tried: candidates.clone(),
            })?;

        if let Some(manifest) = &self.manifest {
            manifest.check(decl, &symbol)?;
        }
        Ok(symbol)
    }

    /// Look up a symbol as a value of type `F`
    ///
    /// # Safety
    ///
    /// `F` must be the exact type of the exported item (for functions, a
    /// function pointer with the matching ABI, parameters and return type).
    /// The returned value must not outlive this library.
    pub unsafe fn symbol<F: Copy>(&self, symbol: &str) -> Result<F, BindError> {
        let c_name = symbol_bytes(symbol)?;
        let sym = self
            .library
            .get::<F>(&c_name)
            .map_err(|e| BindError::UnsatisfiedLink {
                function: symbol.to_string(),
                library: self.name.clone(),
                tried: vec![format!("{} ({})", symbol, e)],
            })?;
        Ok(*sym)
    }

    /// Resolve a declaration to a function pointer of type `F`
    ///
    /// # Safety
    ///
    /// Same contract as [`NativeLibrary::symbol`]: `F` must agree with the
    /// declaration's signature and calling convention.
    pub unsafe fn bind<F: Copy>(&self, decl: &NativeDecl) -> Result<F, BindError> {
        let symbol = self.resolve_symbol(decl)?;
        log::trace!("bound {} -> {}", decl, symbol);
        self.symbol::<F>(&symbol)
    }
}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("manifest", &self.manifest.is_some())
            .finish()
    }
}

fn symbol_bytes(symbol: &str) -> Result<Vec<u8>, BindError> {
    if symbol.is_empty() || symbol.contains('\0') {
        return Err(BindError::InvalidSymbol(format!(
            "invalid symbol name: {:?}",
            symbol
        )));
    }
    let mut bytes = Vec::with_capacity(symbol.len() + 1);
    bytes.extend_from_slice(symbol.as_bytes());
    bytes.push(0);
    Ok(bytes)
}

fn read_manifest(name: &str, library: &Library) -> Result<Option<AbiManifest>, BindError> {
    let mut c_name = MANIFEST_SYMBOL.as_bytes().to_vec();
    c_name.push(0);

    // Safety: by convention the manifest symbol is `extern "C" fn() -> *const c_char`
    // returning a static NUL-terminated string.
    let json = unsafe {
        let Ok(manifest_fn) = library.get::<ManifestFn>(&c_name) else {
            return Ok(None);
        };
        let ptr = manifest_fn();
        if ptr.is_null() {
            return Err(BindError::Manifest(format!(
                "'{}' returned a null manifest",
                name
            )));
        }
        CStr::from_ptr(ptr)
            .to_str()
            .map_err(|e| BindError::Manifest(format!("'{}' manifest is not UTF-8: {}", name, e)))?
            .to_string()
    };

    let manifest = AbiManifest::from_json(&json)?;
    manifest.validate()?;
    Ok(Some(manifest))
}

/// Library loader with search paths
#[derive(Debug, Clone)]
pub struct LibraryLoader {
    /// Search paths for libraries, in priority order
    search_paths: Vec<PathBuf>,
}

impl LibraryLoader {
    /// Create a loader with the platform's default search paths
    pub fn new() -> Self {
        Self {
            search_paths: default_search_paths(),
        }
    }

    /// Create a loader that only consults the dynamic linker
    pub fn empty() -> Self {
        Self {
            search_paths: Vec::new(),
        }
    }

    /// Add a search path; paths added later are searched first
    pub fn add_search_path(&mut self, path: impl AsRef<Path>) {
        self.search_paths.insert(0, path.as_ref().to_path_buf());
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Find a library by bare name in the search paths
    pub fn find_library(&self, name: &str) -> Option<PathBuf> {
        let lib_name = library_filename(name);
        self.search_paths
            .iter()
            .map(|dir| dir.join(&lib_name))
            .find(|candidate| candidate.is_file())
    }

    /// Load a library by bare name. Falls back to the platform dynamic linker's
    /// own search when no search path has it.
    pub fn load(&self, name: &str) -> Result<NativeLibrary, BindError> {
        validate_library_name(name)?;

        let path = match self.find_library(name) {
            Some(path) => path,
            None => {
                log::debug!(
                    "'{}' not in {} search paths, deferring to the dynamic linker",
                    name,
                    self.search_paths.len()
                );
                PathBuf::from(library_filename(name))
            }
        };

        NativeLibrary::load(name, &path).map_err(|e| match e {
            BindError::Link { library, reason } => BindError::Link {
                library,
                reason: format!("{} (looked for {})", reason, path.display()),
            },
            other => other,
        })
    }

    /// Load a library from an explicit path or soname, registered under that string
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<NativeLibrary, BindError> {
        let path = path.as_ref();
        NativeLibrary::load(&path.display().to_string(), path)
    }
}

impl Default for LibraryLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// A bare name has no directory part and no platform suffix
pub fn validate_library_name(name: &str) -> Result<(), BindError> {
    let invalid = |why: &str| BindError::InvalidLibraryName {
        name: name.to_string(),
        reason: why.to_string(),
    };

    if name.trim().is_empty() {
        return Err(invalid("empty name"));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(invalid("expected a bare name, not a path"));
    }
    let ext = Path::new(name).extension().and_then(OsStr::to_str);
    if matches!(ext, Some("so" | "dylib" | "dll")) {
        return Err(invalid("expected a bare name without a file extension"));
    }
    Ok(())
}

/// Get the default library search paths for this platform
fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(extra) = std::env::var_os(LIBRARY_PATH_ENV) {
        paths.extend(std::env::split_paths(&extra));
    }

    // Current directory
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(target) = AndroidTarget::current() {
            paths.push(cwd.join("jniLibs").join(target.abi()));
        }
        paths.push(cwd);
    }

    // Next to the running executable
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        paths.push(dir);
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        if let Some(ld_path) = std::env::var_os("LD_LIBRARY_PATH") {
            paths.extend(std::env::split_paths(&ld_path));
        }
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/local/lib"));
        paths.push(PathBuf::from("/usr/lib"));
        paths.push(PathBuf::from("/usr/lib64"));
        paths.push(PathBuf::from("/lib"));
        paths.push(PathBuf::from("/lib64"));
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(dyld_path) = std::env::var_os("DYLD_LIBRARY_PATH") {
            paths.extend(std::env::split_paths(&dyld_path));
        }
        paths.push(PathBuf::from("/usr/local/lib"));
        paths.push(PathBuf::from("/opt/homebrew/lib"));
        paths.push(PathBuf::from("/usr/lib"));
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(path) = std::env::var_os("PATH") {
            paths.extend(std::env::split_paths(&path));
        }
    }

    paths
}

/// Construct the platform-specific library filename for a bare name
pub fn library_filename(name: &str) -> String {
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        format!("lib{}.dylib", name)
    }

    #[cfg(target_os = "windows")]
    {
        format!("{}.dll", name)
    }

    #[cfg(not(any(target_os = "macos", target_os = "ios", target_os = "windows")))]
    {
        format!("lib{}.so", name)
    }
}
