//! RustJNI - native bindings for JVM hosts
//!
//! Main CLI entry point: symbol mangling, library checks, stub and declaration
//! generation, Android packaging, and a `run` command that performs the host's
//! startup binding.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rustjni::android::{self, AndroidError, AndroidTarget};
use rustjni::codegen;
use rustjni::config::RustJniConfig;
use rustjni::ffi::{
    self, check_bindings, mangle, BindError, BorrowedStrFn, MethodSignature, NativeDecl,
    NativeFn, NativeLibrary, Registry,
};
use rustjni::jvm::{self, SourceLanguage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rustjni")]
#[command(version)]
#[command(about = "Native binding loader and JNI symbol tooling", long_about = None)]
struct Cli {
    /// Config file (default: rustjni.toml in this or a parent directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the configured library and every declared method without calling them
    Check {
        /// Library name or path (default: [library] name)
        #[arg(long)]
        lib: Option<String>,
    },

    /// Call a zero-argument C export returning a string
    Call {
        /// Library name or path
        lib: String,

        /// Exported symbol
        symbol: String,
    },

    /// Write the NDK linker and archiver of each target into .cargo/config.toml
    CargoConfig {
        /// Config file to create or update
        #[arg(short, long, default_value = ".cargo/config.toml")]
        output: PathBuf,
    },

    /// Print host-side declarations for the configured methods
    Declare {
        /// Emit Java instead of Kotlin
        #[arg(long)]
        java: bool,

        /// Splice them into this .kt or .java file instead of printing
        #[arg(long, value_name = "FILE")]
        write: Option<PathBuf>,
    },

    /// Decode a Java_ symbol
    Demangle {
        symbol: String,
    },

    /// Copy release builds of every target into the jniLibs tree
    Package {
        /// Cargo target directory
        #[arg(long, default_value = "target")]
        target_dir: PathBuf,
    },

    /// Load the library and bind its natives, as the host does at startup
    Run,

    /// Generate Rust JNI stubs for the natives declared in a Kotlin or Java file
    Stub {
        /// Host class source (.kt or .java)
        source: PathBuf,

        /// Only emit stubs for methods this library does not export
        #[arg(long)]
        lib: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the exported symbol names for a method
    Symbol {
        /// Dotted class name, e.g. com.example.MainActivity
        class: String,

        /// Method name
        method: String,

        /// Method descriptor, enables the long (overloaded) form
        #[arg(long)]
        descriptor: Option<String>,
    },

    /// List Android targets and where the library goes for each
    Targets,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RustJniConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => RustJniConfig::load_from_cwd().context("Failed to load rustjni.toml")?,
    };
    rustjni::logging::init(&config.log.level);

    let registry = Registry::global();
    for path in &config.library.search_paths {
        registry.add_search_path(path);
    }

    match cli.command {
        Commands::Check { lib } => cmd_check(registry, &config, lib.as_deref()),
        Commands::Call { lib, symbol } => cmd_call(registry, &lib, &symbol),
        Commands::CargoConfig { output } => cmd_cargo_config(&config, &output),
        Commands::Declare { java, write } => cmd_declare(&config, java, write.as_deref()),
        Commands::Demangle { symbol } => cmd_demangle(&symbol),
        Commands::Package { target_dir } => cmd_package(&config, &target_dir),
        Commands::Run => cmd_run(registry, &config),
        Commands::Stub {
            source,
            lib,
            output,
        } => cmd_stub(registry, &source, lib.as_deref(), output.as_deref()),
        Commands::Symbol {
            class,
            method,
            descriptor,
        } => cmd_symbol(&class, &method, descriptor.as_deref()),
        Commands::Targets => cmd_targets(&config),
    }
}

/// Paths and sonames go to the dynamic linker as-is, bare names are searched
fn open_library(registry: &Registry, lib: &str) -> Result<Arc<NativeLibrary>> {
    let looks_like_path = lib.contains(['/', '\\']) || Path::new(lib).is_file();
    let library = if looks_like_path {
        registry.load_path(lib)?
    } else {
        registry.load_library(lib)?
    };
    Ok(library)
}

fn cmd_check(registry: &Registry, config: &RustJniConfig, lib: Option<&str>) -> Result<()> {
    let lib = lib.unwrap_or(&config.library.name);
    let library = open_library(registry, lib)?;
    println!("Loaded {} ({})", library.name(), library.path().display());

    match library.manifest() {
        Some(manifest) => println!(
            "ABI manifest: {} {} ({} exports)",
            manifest.library,
            manifest.version,
            manifest.exports.len()
        ),
        None => println!("ABI manifest: none, descriptors cannot be verified"),
    }

    let decls = config.declarations()?;
    let mut failures = 0;
    for check in check_bindings(&library, &decls) {
        match check.result {
            Ok(symbol) => println!("  ok    {} -> {}", check.decl, symbol),
            Err(e) => {
                failures += 1;
                println!("  FAIL  {}: {}", check.decl, e);
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} declarations failed to bind", failures, decls.len());
    }
    println!("{} declarations bound", decls.len());
    Ok(())
}

fn cmd_call(registry: &Registry, lib: &str, symbol: &str) -> Result<()> {
    let library = open_library(registry, lib)?;
    let decl = NativeDecl::c(symbol, MethodSignature::parse("()Ljava/lang/String;")?);
    // Safety: the command's contract is a zero-argument C function returning a
    // static string; the manifest, if any, is checked against that descriptor.
    let f: NativeFn<BorrowedStrFn> = unsafe { NativeFn::new(library.name(), decl) };
    println!("{}", f.call_str(registry)?);
    Ok(())
}

fn cmd_cargo_config(config: &RustJniConfig, output: &Path) -> Result<()> {
    let ndk = config.android.ndk_dir().ok_or(AndroidError::NoNdk)?;
    let host = config
        .android
        .prebuilt
        .as_deref()
        .or_else(|| android::prebuilt_host())
        .ok_or(AndroidError::UnknownHost)?;
    let bin = android::toolchain_bin(&ndk, host);
    if !bin.is_dir() {
        return Err(AndroidError::MissingToolchain(bin).into());
    }

    let block = android::cargo_config(&bin, &config.android.toolchains())?;
    let existing = if output.exists() {
        fs::read_to_string(output)
            .with_context(|| format!("Failed to read {}", output.display()))?
    } else {
        String::new()
    };
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    fs::write(output, android::merge_cargo_config(&existing, &block))
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Wrote {} targets to {} (toolchain {})",
        config.android.targets.len(),
        output.display(),
        bin.display()
    );
    Ok(())
}

fn cmd_declare(config: &RustJniConfig, java: bool, write: Option<&Path>) -> Result<()> {
    let decls = config.declarations()?;
    let Some(path) = write else {
        let language = if java {
            SourceLanguage::Java
        } else {
            SourceLanguage::Kotlin
        };
        print!(
            "{}",
            codegen::host_declarations(&config.library.name, &decls, language)
        );
        return Ok(());
    };

    let language = SourceLanguage::from_path(path)
        .with_context(|| format!("{} is not a .kt or .java file", path.display()))?;
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let class = config
        .jni
        .host
        .rsplit(['.', '$'])
        .next()
        .unwrap_or(&config.jni.host);
    let updated =
        codegen::splice_host_declarations(&content, class, &config.library.name, &decls, language)
            .with_context(|| format!("No class {} in {}", class, path.display()))?;
    fs::write(path, updated).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Declared {} natives in {}", decls.len(), path.display());
    Ok(())
}

fn cmd_demangle(symbol: &str) -> Result<()> {
    let demangled = mangle::demangle(symbol)?;
    println!("class:  {}", demangled.class);
    println!("method: {}", demangled.method);
    if let Some(args) = demangled.args {
        println!("args:   ({})", args);
    }
    Ok(())
}

/// The host lifecycle: load first, bind, then make the first native call.
/// Every failure is fatal and surfaces as the process exit status.
fn cmd_run(registry: &Registry, config: &RustJniConfig) -> Result<()> {
    let library = registry
        .load_library(&config.library.name)
        .context("Native library failed to load")?;

    let decls = config.declarations()?;
    for check in check_bindings(&library, &decls) {
        if let Err(e) = check.result {
            return Err(e).with_context(|| format!("Cannot bind {}", check.decl));
        }
    }
    log::info!("{} natives bound from {}", decls.len(), library.name());

    let Some(symbol) = &config.library.startup_symbol else {
        println!("Bound {} natives", decls.len());
        return Ok(());
    };
    let decl = NativeDecl::c(symbol.as_str(), MethodSignature::parse("()Ljava/lang/String;")?);
    // Safety: startup_symbol is documented as a zero-argument C export returning
    // a static string.
    let startup: NativeFn<BorrowedStrFn> = unsafe { NativeFn::new(library.name(), decl) };
    let greeting = startup
        .call_str(registry)
        .context("Startup call failed")?;
    println!("{}", greeting);
    Ok(())
}

fn cmd_package(config: &RustJniConfig, target_dir: &Path) -> Result<()> {
    let packaged = android::package_libraries(
        &config.android.targets,
        target_dir,
        &config.android.jni_libs,
        &config.library.name,
    )?;
    for path in &packaged {
        println!("{}", path.display());
    }
    log::info!("packaged {} libraries", packaged.len());
    Ok(())
}

fn cmd_stub(
    registry: &Registry,
    source: &Path,
    lib: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let language = SourceLanguage::from_path(source)
        .with_context(|| format!("{} is not a .kt or .java file", source.display()))?;
    let content = fs::read_to_string(source).context("Failed to read source file")?;
    let host = jvm::parse_host_source(&content, language)
        .with_context(|| format!("Failed to parse {}", source.display()))?;

    let mut decls = host.methods;
    if let Some(lib) = lib {
        let library = open_library(registry, lib)?;
        let mut missing = Vec::new();
        for decl in decls {
            match library.resolve_symbol(&decl) {
                Ok(_) => {}
                Err(BindError::UnsatisfiedLink { .. }) => missing.push(decl),
                Err(e) => return Err(e).with_context(|| format!("Cannot check {}", decl)),
            }
        }
        decls = missing;
    }

    if decls.is_empty() {
        eprintln!("Nothing to generate for {}", host.class);
        return Ok(());
    }

    let stubs = codegen::rust_stubs(&decls);
    match output {
        Some(path) => {
            fs::write(path, &stubs).context("Failed to write output")?;
            println!("Wrote {} stubs to {}", decls.len(), path.display());
        }
        None => print!("{}", stubs),
    }
    Ok(())
}

fn cmd_symbol(class: &str, method: &str, descriptor: Option<&str>) -> Result<()> {
    println!("{}", mangle::short_symbol(class, method));
    if let Some(descriptor) = descriptor {
        let signature = MethodSignature::parse(descriptor)?;
        println!("{}", mangle::long_symbol(class, method, &signature));
    }
    Ok(())
}

fn cmd_targets(config: &RustJniConfig) -> Result<()> {
    let name = &config.library.name;
    let target_dir = Path::new("target");
    println!("{:<26} {:<12} {:<52} {}", "TARGET", "ABI", "BUILD", "PACKAGE");
    for target in &config.android.targets {
        println!(
            "{:<26} {:<12} {:<52} {}",
            target.triple(),
            target.abi(),
            target.cargo_output(target_dir, name).display(),
            target.library_path(&config.android.jni_libs, name).display()
        );
    }
    if let Some(current) = AndroidTarget::current() {
        println!("running on {}", current);
    }
    println!("host file name: {}", ffi::library_filename(name));
    Ok(())
}
