//! Native Binding Loader
//!
//! Loads native libraries by bare name and binds declared functions to the
//! symbols they export.
//!
//! # Architecture
//!
//! ```text
//! Host startup
//!       │
//!       ▼
//! Registry::load_library("rustjni_hello")   exactly once per process
//!       │
//!       ▼
//! LibraryLoader (search paths, then the dynamic linker)
//!       │
//!       ▼
//! NativeLibrary (+ ABI manifest, if exported)
//!       │
//!       ▼
//! NativeFn::get()  →  Java_<class>_<method> / long form / C name
//! ```
//!
//! # Example
//!
//! ```ignore
//! use rustjni::ffi::{BorrowedStrFn, MethodSignature, NativeDecl, NativeFn, Registry};
//!
//! let registry = Registry::global();
//! registry.load_library("rustjni_hello")?;
//!
//! let decl = NativeDecl::c("rustjni_hello", MethodSignature::parse("()Ljava/lang/String;")?);
//! let hello: NativeFn<BorrowedStrFn> = unsafe { NativeFn::new("rustjni_hello", decl) };
//! assert_eq!(hello.call_str(registry)?, "Hello from Rust");
//! ```

mod binding;
mod loader;
pub mod mangle;
mod manifest;
mod registry;
mod types;

pub use binding::{check_bindings, BindingCheck, BorrowedStrFn, NativeFn};
pub use loader::{
    library_filename, validate_library_name, LibraryLoader, NativeLibrary, LIBRARY_PATH_ENV,
};
pub use manifest::{AbiExport, AbiManifest, MANIFEST_SYMBOL};
pub use registry::{load_library, BindError, Registry};
pub use types::{JniType, MethodSignature, NativeDecl, SymbolConvention};

#[cfg(test)]
mod tests;
