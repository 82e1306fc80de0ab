//! rustjni sample library
//!
//! Loaded by the host as `rustjni_hello`. Exports:
//!
//! - `Java_com_devfigas_rustjni_sample_MainActivity_sayHello`, the JNI entry
//!   point behind `external fun sayHello(): String`
//! - `rustjni_hello`, the same greeting over the C ABI for hosts without a JVM
//! - `rustjni_abi_manifest`, the export list the loader checks declarations against
//! - `JNI_OnLoad`, which registers `sayHello` explicitly when a JVM loads us

use std::ffi::c_char;

mod jni_bridge;
mod logging;

pub use jni_bridge::Java_com_devfigas_rustjni_sample_MainActivity_sayHello;

macro_rules! greeting {
    () => {
        "Hello from Rust"
    };
}

macro_rules! say_hello_descriptor {
    () => {
        "()Ljava/lang/String;"
    };
}

/// What every entry point returns
pub const GREETING: &str = greeting!();

/// Slashed binary name of the host class
pub const HOST_CLASS: &str = "com/devfigas/rustjni/sample/MainActivity";

pub const SAY_HELLO: &str = "sayHello";

pub const SAY_HELLO_DESCRIPTOR: &str = say_hello_descriptor!();

const GREETING_NUL: &str = concat!(greeting!(), "\0");

const MANIFEST_JSON: &str = concat!(
    r#"{"library":"rustjni_hello","version":""#,
    env!("CARGO_PKG_VERSION"),
    r#"","exports":["#,
    r#"{"symbol":"Java_com_devfigas_rustjni_sample_MainActivity_sayHello","descriptor":""#,
    say_hello_descriptor!(),
    r#"","class":"com.devfigas.rustjni.sample.MainActivity","method":"sayHello"},"#,
    r#"{"symbol":"rustjni_hello","descriptor":""#,
    say_hello_descriptor!(),
    r#""}]}"#,
    "\0"
);

/// C-ABI twin of `sayHello`. The string is static; callers must not free it.
#[no_mangle]
pub extern "C" fn rustjni_hello() -> *const c_char {
    GREETING_NUL.as_ptr().cast()
}

/// Static JSON describing this library's exports
#[no_mangle]
pub extern "C" fn rustjni_abi_manifest() -> *const c_char {
    MANIFEST_JSON.as_ptr().cast()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustjni::ffi::{mangle, AbiManifest, NativeDecl, MANIFEST_SYMBOL};
    use std::ffi::CStr;

    fn read(ptr: *const c_char) -> String {
        unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string()
    }

    #[test]
    fn test_hello_over_c_abi() {
        assert_eq!(read(rustjni_hello()), "Hello from Rust");
        assert_eq!(read(rustjni_hello()), read(rustjni_hello()));
    }

    #[test]
    fn test_manifest_matches_exports() {
        assert_eq!(MANIFEST_SYMBOL, "rustjni_abi_manifest");

        let manifest = AbiManifest::from_json(&read(rustjni_abi_manifest())).unwrap();
        assert_eq!(manifest.library, "rustjni_hello");
        assert_eq!(manifest.version, env!("CARGO_PKG_VERSION"));
        manifest.validate().unwrap();

        let decl = NativeDecl::parse_jni(HOST_CLASS, SAY_HELLO, SAY_HELLO_DESCRIPTOR).unwrap();
        let symbol = mangle::short_symbol(&HOST_CLASS.replace('/', "."), SAY_HELLO);
        assert_eq!(symbol, "Java_com_devfigas_rustjni_sample_MainActivity_sayHello");
        assert!(manifest.export(&symbol).is_some());
        manifest.check(&decl, &symbol).unwrap();

        let export = manifest.export("rustjni_hello").unwrap();
        assert_eq!(export.descriptor, SAY_HELLO_DESCRIPTOR);
        assert_eq!(export.class, None);
    }
}
