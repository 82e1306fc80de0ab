//! RustJNI - native bindings for JVM hosts
//!
//! Loads Rust `cdylib`s the way `System.loadLibrary` does and binds declared
//! native functions to the symbols they export.
//!
//! # Features
//!
//! - **Exactly-once loading**: a process-wide registry loads each library once,
//!   even under concurrent first use
//! - **JNI naming**: `Java_<class>_<method>` mangling, long overloaded names and
//!   demangling
//! - **Typed contract**: method descriptors, an ABI manifest exported by the
//!   library, and checks that fail before a mismatched call is made
//! - **Tooling**: Kotlin/Java declaration scanning, Rust stub generation and
//!   Android ABI layout
//!
//! # Example
//!
//! ```rust,ignore
//! use rustjni::ffi::{BorrowedStrFn, MethodSignature, NativeDecl, NativeFn, Registry};
//!
//! let registry = Registry::global();
//! registry.load_library("rustjni_hello")?;
//!
//! let sig = MethodSignature::parse("()Ljava/lang/String;")?;
//! let hello: NativeFn<BorrowedStrFn> =
//!     unsafe { NativeFn::new("rustjni_hello", NativeDecl::c("rustjni_hello", sig)) };
//! println!("{}", hello.call_str(registry)?);
//! ```

#![warn(clippy::all)]

pub mod android;
pub mod codegen;
pub mod config;
pub mod ffi;
pub mod jvm;
pub mod logging;

pub use config::{ConfigError, RustJniConfig};
pub use ffi::{BindError, NativeDecl, NativeFn, NativeLibrary, Registry};
