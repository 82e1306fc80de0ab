//! Android targets
//!
//! Rust target triples for Android and the ABI directory names the platform
//! uses for bundled native libraries (`jniLibs/<abi>/lib<name>.so`), plus
//! the two build-side chores around them: copying release builds into the
//! `jniLibs` tree and pointing cargo at the NDK linkers.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Markers around the generated part of `.cargo/config.toml`
pub const CARGO_BLOCK_OPEN: &str = "#<RustJNI>";
pub const CARGO_BLOCK_CLOSE: &str = "#</RustJNI>";

/// Oldest API level with 64-bit ABIs
pub const DEFAULT_API_LEVEL: u32 = 21;

#[derive(Debug, Error)]
pub enum AndroidError {
    #[error("no release build for {target}: {} not found", .path.display())]
    MissingBuild { target: AndroidTarget, path: PathBuf },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Android NDK not found; set [android] ndk or ANDROID_NDK_HOME")]
    NoNdk,

    #[error("NDK toolchain directory {} does not exist", .0.display())]
    MissingToolchain(PathBuf),

    #[error("no prebuilt NDK toolchain for this host; set [android] prebuilt")]
    UnknownHost,

    #[error("cannot render cargo config: {0}")]
    Render(#[from] toml::ser::Error),
}

/// An Android CPU architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AndroidTarget {
    Armv7,
    Aarch64,
    I686,
    X86_64,
}

impl AndroidTarget {
    pub const ALL: [AndroidTarget; 4] = [
        AndroidTarget::Armv7,
        AndroidTarget::Aarch64,
        AndroidTarget::I686,
        AndroidTarget::X86_64,
    ];

    /// Rust target triple
    pub fn triple(&self) -> &'static str {
        match self {
            AndroidTarget::Armv7 => "armv7-linux-androideabi",
            AndroidTarget::Aarch64 => "aarch64-linux-android",
            AndroidTarget::I686 => "i686-linux-android",
            AndroidTarget::X86_64 => "x86_64-linux-android",
        }
    }

    /// Android ABI name, also the `jniLibs` subdirectory
    pub fn abi(&self) -> &'static str {
        match self {
            AndroidTarget::Armv7 => "armeabi-v7a",
            AndroidTarget::Aarch64 => "arm64-v8a",
            AndroidTarget::I686 => "x86",
            AndroidTarget::X86_64 => "x86_64",
        }
    }

    pub fn from_triple(triple: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.triple() == triple)
    }

    pub fn from_abi(abi: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.abi() == abi)
    }

    /// The target this process runs on, when it runs on Android
    pub fn current() -> Option<Self> {
        if !cfg!(target_os = "android") {
            return None;
        }
        if cfg!(target_arch = "aarch64") {
            Some(AndroidTarget::Aarch64)
        } else if cfg!(target_arch = "arm") {
            Some(AndroidTarget::Armv7)
        } else if cfg!(target_arch = "x86_64") {
            Some(AndroidTarget::X86_64)
        } else if cfg!(target_arch = "x86") {
            Some(AndroidTarget::I686)
        } else {
            None
        }
    }

    /// `<root>/<abi>/lib<name>.so`
    pub fn library_path(&self, jni_libs: &Path, name: &str) -> PathBuf {
        jni_libs.join(self.abi()).join(format!("lib{}.so", name))
    }

    /// Where cargo leaves a release build of `name` for this target
    pub fn cargo_output(&self, target_dir: &Path, name: &str) -> PathBuf {
        target_dir
            .join(self.triple())
            .join("release")
            .join(format!("lib{}.so", name))
    }
}

/// Copy `target/<triple>/release/lib<name>.so` into `<jni_libs>/<abi>/` for
/// every target. Nothing is copied unless every build is present.
pub fn package_libraries(
    targets: &[AndroidTarget],
    target_dir: &Path,
    jni_libs: &Path,
    name: &str,
) -> Result<Vec<PathBuf>, AndroidError> {
    let mut copies = Vec::with_capacity(targets.len());
    for target in targets {
        let source = target.cargo_output(target_dir, name);
        if !source.is_file() {
            return Err(AndroidError::MissingBuild {
                target: *target,
                path: source,
            });
        }
        copies.push((source, target.library_path(jni_libs, name)));
    }

    let mut packaged = Vec::with_capacity(copies.len());
    for (source, dest) in copies {
        if let Some(dir) = dest.parent() {
            fs::create_dir_all(dir).map_err(|e| AndroidError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }
        fs::copy(&source, &dest).map_err(|e| AndroidError::Io {
            path: dest.clone(),
            source: e,
        })?;
        log::debug!("copied {} -> {}", source.display(), dest.display());
        packaged.push(dest);
    }
    Ok(packaged)
}

/// Archiver and linker cargo should use for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub target: AndroidTarget,
    pub ar: String,
    pub linker: String,
}

/// NDK clang wrapper for `target` at `api_level`, e.g. `aarch64-linux-android21-clang`
pub fn default_linker(target: AndroidTarget, api_level: u32) -> String {
    let prefix = match target {
        AndroidTarget::Armv7 => "armv7a-linux-androideabi",
        other => other.triple(),
    };
    let ext = if cfg!(windows) { ".cmd" } else { "" };
    format!("{}{}-clang{}", prefix, api_level, ext)
}

pub fn default_ar() -> &'static str {
    if cfg!(windows) {
        "llvm-ar.exe"
    } else {
        "llvm-ar"
    }
}

/// Name of the NDK's prebuilt toolchain directory for the machine we run on
pub fn prebuilt_host() -> Option<&'static str> {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("linux", "x86_64") => Some("linux-x86_64"),
        ("linux", "aarch64") => Some("linux-arm64"),
        ("windows", "x86_64") => Some("windows-x86_64"),
        ("windows", "aarch64") => Some("windows-arm64"),
        // The NDK ships one macOS toolchain, universal since r23
        ("macos", _) => Some("darwin-x86_64"),
        _ => None,
    }
}

/// `<ndk>/toolchains/llvm/prebuilt/<host>/bin`
pub fn toolchain_bin(ndk: &Path, host: &str) -> PathBuf {
    ndk.join("toolchains")
        .join("llvm")
        .join("prebuilt")
        .join(host)
        .join("bin")
}

#[derive(Serialize)]
struct CargoTargets {
    target: BTreeMap<&'static str, TargetTools>,
}

#[derive(Serialize)]
struct TargetTools {
    ar: String,
    linker: String,
}

/// The marked `[target.<triple>]` block for `.cargo/config.toml`. Relative
/// tool names are resolved against `bin`.
pub fn cargo_config(bin: &Path, toolchains: &[Toolchain]) -> Result<String, AndroidError> {
    let tool = |name: &str| bin.join(name).to_string_lossy().into_owned();
    let targets = CargoTargets {
        target: toolchains
            .iter()
            .map(|t| {
                let tools = TargetTools {
                    ar: tool(&t.ar),
                    linker: tool(&t.linker),
                };
                (t.target.triple(), tools)
            })
            .collect(),
    };

    let mut out = format!("{}\n#auto-generated code\n", CARGO_BLOCK_OPEN);
    out.push_str(&toml::to_string(&targets)?);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(CARGO_BLOCK_CLOSE);
    out.push('\n');
    Ok(out)
}

/// Swap the generated block of an existing cargo config for `block`, or
/// append it when there is none yet
pub fn merge_cargo_config(existing: &str, block: &str) -> String {
    if let Some(merged) =
        crate::codegen::replace_block(existing, CARGO_BLOCK_OPEN, CARGO_BLOCK_CLOSE, block)
    {
        return merged;
    }
    let mut out = existing.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(block);
    out
}

impl fmt::Display for AndroidTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.triple())
    }
}

impl FromStr for AndroidTarget {
    type Err = String;

    /// Accepts a triple or an ABI name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_triple(s)
            .or_else(|| Self::from_abi(s))
            .ok_or_else(|| format!("unknown Android target '{}'", s))
    }
}

impl TryFrom<String> for AndroidTarget {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AndroidTarget> for String {
    fn from(target: AndroidTarget) -> Self {
        target.triple().to_string()
    }
}
