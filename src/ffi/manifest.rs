//! ABI Manifest
//!
//! A native library may export `rustjni_abi_manifest`, a zero-argument C
//! function returning a static NUL-terminated JSON document that lists its
//! exports and their descriptors. The loader reads it once at load time and
//! checks every declaration against it before handing out a function pointer.

use serde::{Deserialize, Serialize};

use super::types::{MethodSignature, NativeDecl};
use super::BindError;

/// Symbol the loader looks up after a successful load
pub const MANIFEST_SYMBOL: &str = "rustjni_abi_manifest";

/// Exports advertised by a native library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiManifest {
    /// Bare library name
    pub library: String,

    /// Library version
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub exports: Vec<AbiExport>,
}

/// One exported function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiExport {
    /// Exact exported symbol
    pub symbol: String,

    /// Method descriptor of the implementation
    pub descriptor: String,

    /// Dotted owner class, JNI exports only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl AbiManifest {
    pub fn new(library: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            version: version.into(),
            exports: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, BindError> {
        serde_json::from_str(json).map_err(|e| BindError::Manifest(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, BindError> {
        serde_json::to_string_pretty(self).map_err(|e| BindError::Manifest(e.to_string()))
    }

    /// Advertise the export for `decl` under the symbol it resolves to first
    pub fn add_decl(&mut self, decl: &NativeDecl) {
        let symbol = decl.symbols().into_iter().next().unwrap_or_default();
        self.exports.push(AbiExport {
            symbol,
            descriptor: decl.signature.descriptor(),
            class: decl.class.clone(),
            method: decl.class.as_ref().map(|_| decl.name.clone()),
        });
    }

    pub fn export(&self, symbol: &str) -> Option<&AbiExport> {
        self.exports.iter().find(|e| e.symbol == symbol)
    }

    /// Check the declaration resolved through `symbol` against the advertised
    /// descriptor. Symbols the manifest does not list are accepted.
    pub fn check(&self, decl: &NativeDecl, symbol: &str) -> Result<(), BindError> {
        let Some(export) = self.export(symbol) else {
            return Ok(());
        };
        let exported = MethodSignature::parse(&export.descriptor).map_err(|e| {
            BindError::Manifest(format!("export '{}' in '{}': {}", symbol, self.library, e))
        })?;
        if exported != decl.signature {
            return Err(BindError::SignatureMismatch {
                function: decl.qualified_name(),
                declared: decl.signature.descriptor(),
                exported: export.descriptor.clone(),
            });
        }
        Ok(())
    }

    /// Every descriptor in the manifest must parse
    pub fn validate(&self) -> Result<(), BindError> {
        for export in &self.exports {
            MethodSignature::parse(&export.descriptor).map_err(|e| {
                BindError::Manifest(format!("export '{}': {}", export.symbol, e))
            })?;
        }
        Ok(())
    }
}
