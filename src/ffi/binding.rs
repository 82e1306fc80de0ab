//! Typed native function handles
//!
//! A [`NativeFn`] is the Rust side of a `native`/`external` declaration: it
//! names a library and a [`NativeDecl`], resolves the symbol on first use and
//! caches the pointer together with the library that keeps it mapped.

use std::ffi::{c_char, CStr};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::loader::NativeLibrary;
use super::registry::Registry;
use super::types::NativeDecl;
use super::BindError;

/// Zero-argument C function returning a borrowed, NUL-terminated string
pub type BorrowedStrFn = unsafe extern "C" fn() -> *const c_char;

/// A declared native function of Rust type `F`
pub struct NativeFn<F> {
    library: String,
    decl: NativeDecl,
    resolved: OnceCell<(Arc<NativeLibrary>, F)>,
}

impl<F: Copy> NativeFn<F> {
    /// Declare a function living in `library`.
    ///
    /// # Safety
    ///
    /// `F` must be a function pointer type matching `decl`'s signature and the
    /// calling convention of the export.
    pub unsafe fn new(library: impl Into<String>, decl: NativeDecl) -> Self {
        Self {
            library: library.into(),
            decl,
            resolved: OnceCell::new(),
        }
    }

    pub fn library(&self) -> &str {
        &self.library
    }

    pub fn decl(&self) -> &NativeDecl {
        &self.decl
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Resolve against the process-wide registry
    pub fn get(&self) -> Result<F, BindError> {
        self.get_in(Registry::global())
    }

    /// Resolve against `registry`. The library must already be loaded there.
    ///
    /// The pointer is cached for the library handle it came from; a different
    /// registry holding its own handle gets a fresh, uncached lookup.
    pub fn get_in(&self, registry: &Registry) -> Result<F, BindError> {
        let library = registry.require(&self.library)?;
        if let Some((cached, f)) = self.resolved.get() {
            if Arc::ptr_eq(cached, &library) {
                return Ok(*f);
            }
            // Safety: `new` made the caller vouch for `F`.
            return unsafe { library.bind::<F>(&self.decl) };
        }
        // Safety: as above.
        let f = unsafe { library.bind::<F>(&self.decl)? };
        let (_, f) = self.resolved.get_or_init(|| (library, f));
        Ok(*f)
    }
}

impl NativeFn<BorrowedStrFn> {
    /// Call the function and copy the returned string
    pub fn call_str(&self, registry: &Registry) -> Result<String, BindError> {
        let f = self.get_in(registry)?;
        // Safety: the type alias fixes the ABI; the pointer is only read until the
        // first NUL and copied before returning.
        unsafe {
            let ptr = f();
            if ptr.is_null() {
                return Err(BindError::BadReturn {
                    function: self.decl.qualified_name(),
                    reason: "a null pointer".to_string(),
                });
            }
            CStr::from_ptr(ptr)
                .to_str()
                .map(str::to_string)
                .map_err(|e| BindError::BadReturn {
                    function: self.decl.qualified_name(),
                    reason: format!("invalid UTF-8 ({})", e),
                })
        }
    }
}

impl<F> std::fmt::Debug for NativeFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFn")
            .field("library", &self.library)
            .field("decl", &self.decl.to_string())
            .field("resolved", &self.resolved.get().is_some())
            .finish()
    }
}

/// Resolution report for one declaration
#[derive(Debug, Clone)]
pub struct BindingCheck {
    pub decl: NativeDecl,
    /// The symbol it resolved to, or why it did not
    pub result: Result<String, BindError>,
}

/// Resolve every declaration without calling anything
pub fn check_bindings(library: &NativeLibrary, decls: &[NativeDecl]) -> Vec<BindingCheck> {
    decls
        .iter()
        .map(|decl| BindingCheck {
            decl: decl.clone(),
            result: library.resolve_symbol(decl),
        })
        .collect()
}
