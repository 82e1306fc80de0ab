//! RustJNI Project Configuration
//!
//! Handles parsing and management of rustjni.toml configuration files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::android::{self, AndroidTarget, Toolchain};
use crate::ffi::{BindError, MethodSignature, NativeDecl};

/// File name searched for by [`RustJniConfig::find_and_load`]
pub const CONFIG_FILE: &str = "rustjni.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid method '{method}': {source}")]
    Method {
        method: String,
        #[source]
        source: BindError,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration structure matching rustjni.toml.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RustJniConfig {
    /// Native library to load
    #[serde(default)]
    pub library: LibraryConfig,

    /// Host class and its native declarations
    #[serde(default)]
    pub jni: JniConfig,

    /// Android packaging targets
    #[serde(default)]
    pub android: AndroidConfig,

    /// Logging
    #[serde(default)]
    pub log: LogConfig,
}

impl RustJniConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: RustJniConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the current directory or parents.
    pub fn load_from_cwd() -> ConfigResult<Self> {
        let cwd = std::env::current_dir().map_err(ConfigError::Io)?;
        Self::find_and_load(&cwd)
    }

    /// Find and load configuration by searching up from the given directory.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return Self::load(&config_path);
            }
            if !dir.pop() {
                // Reached root without finding config
                return Ok(Self::default());
            }
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check names and descriptors without loading anything.
    pub fn validate(&self) -> ConfigResult<()> {
        crate::ffi::validate_library_name(&self.library.name)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.jni.host.trim().is_empty() && !self.jni.methods.is_empty() {
            return Err(ConfigError::Invalid(
                "[jni] methods need a host class".to_string(),
            ));
        }
        for key in self.android.linkers.keys() {
            key.parse::<AndroidTarget>()
                .map_err(|e| ConfigError::Invalid(format!("[android.linkers] {}", e)))?;
        }
        self.declarations().map(|_| ())
    }

    /// Native declarations of the host class.
    pub fn declarations(&self) -> ConfigResult<Vec<NativeDecl>> {
        self.jni
            .methods
            .iter()
            .map(|m| {
                MethodSignature::parse(&m.descriptor)
                    .map(|sig| NativeDecl::jni(&self.jni.host, &m.name, sig))
                    .map_err(|source| ConfigError::Method {
                        method: m.name.clone(),
                        source,
                    })
            })
            .collect()
    }
}

/// Native library settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Bare library name, as passed to System.loadLibrary
    #[serde(default = "default_library_name")]
    pub name: String,

    /// Extra directories searched before the platform defaults
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,

    /// Zero-argument C export returning a string, called by `rustjni run`
    /// after binding. Unset means `run` only loads and binds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_symbol: Option<String>,
}

fn default_library_name() -> String {
    "rustjni_hello".to_string()
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            name: default_library_name(),
            search_paths: Vec::new(),
            startup_symbol: None,
        }
    }
}

/// JNI host class settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JniConfig {
    /// Dotted binary name of the class declaring the natives
    #[serde(default = "default_host")]
    pub host: String,

    /// Declared native methods
    #[serde(default = "default_methods")]
    pub methods: Vec<MethodConfig>,
}

fn default_host() -> String {
    "com.devfigas.rustjni.sample.MainActivity".to_string()
}

fn default_methods() -> Vec<MethodConfig> {
    vec![MethodConfig {
        name: "sayHello".to_string(),
        descriptor: "()Ljava/lang/String;".to_string(),
    }]
}

impl Default for JniConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            methods: default_methods(),
        }
    }
}

/// One native method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodConfig {
    pub name: String,

    /// JVM method descriptor, e.g. `(I)Ljava/lang/String;`
    pub descriptor: String,
}

/// Android packaging and cross-linking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AndroidConfig {
    /// Targets to package, as triples or ABI names
    #[serde(default = "default_targets")]
    pub targets: Vec<AndroidTarget>,

    /// Root of the `jniLibs` tree
    #[serde(default = "default_jni_libs")]
    pub jni_libs: PathBuf,

    /// NDK root; ANDROID_NDK_HOME or ANDROID_NDK_ROOT when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ndk: Option<PathBuf>,

    /// Prebuilt toolchain directory name, e.g. `linux-x86_64`; detected when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prebuilt: Option<String>,

    /// API level baked into the default clang wrapper names
    #[serde(default = "default_api_level")]
    pub api_level: u32,

    /// Archiver, relative to the toolchain bin directory unless absolute
    #[serde(default = "default_ar")]
    pub ar: String,

    /// Linker overrides keyed by triple or ABI
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub linkers: BTreeMap<String, String>,
}

fn default_targets() -> Vec<AndroidTarget> {
    AndroidTarget::ALL.to_vec()
}

fn default_jni_libs() -> PathBuf {
    PathBuf::from("app/src/main/jniLibs")
}

fn default_api_level() -> u32 {
    android::DEFAULT_API_LEVEL
}

fn default_ar() -> String {
    android::default_ar().to_string()
}

impl Default for AndroidConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            jni_libs: default_jni_libs(),
            ndk: None,
            prebuilt: None,
            api_level: default_api_level(),
            ar: default_ar(),
            linkers: BTreeMap::new(),
        }
    }
}

impl AndroidConfig {
    /// Configured NDK root, else the usual environment variables
    pub fn ndk_dir(&self) -> Option<PathBuf> {
        self.ndk.clone().or_else(|| {
            ["ANDROID_NDK_HOME", "ANDROID_NDK_ROOT"]
                .iter()
                .find_map(|var| std::env::var_os(var))
                .map(PathBuf::from)
        })
    }

    /// Toolchain of every configured target, overrides applied
    pub fn toolchains(&self) -> Vec<Toolchain> {
        self.targets
            .iter()
            .map(|target| {
                let linker = self
                    .linkers
                    .iter()
                    .find(|(key, _)| key.parse::<AndroidTarget>().ok() == Some(*target))
                    .map(|(_, linker)| linker.clone())
                    .unwrap_or_else(|| android::default_linker(*target, self.api_level));
                Toolchain {
                    target: *target,
                    ar: self.ar.clone(),
                    linker,
                }
            })
            .collect()
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}
