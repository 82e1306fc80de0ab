//! FFI Module Tests

use super::mangle::{demangle, long_symbol, mangle, short_symbol};
use super::*;
use std::sync::Arc;
use std::thread;

#[test]
fn test_descriptor_parsing() {
    assert_eq!(JniType::parse_descriptor("I").unwrap(), JniType::Int);
    assert_eq!(JniType::parse_descriptor("Z").unwrap(), JniType::Boolean);
    assert_eq!(
        JniType::parse_descriptor("Ljava/lang/String;").unwrap(),
        JniType::string()
    );
    assert_eq!(
        JniType::parse_descriptor("[[J").unwrap(),
        JniType::array_of(JniType::array_of(JniType::Long))
    );
    assert!(JniType::parse_descriptor("Q").is_err());
    assert!(JniType::parse_descriptor("Ljava/lang/String").is_err());
    assert!(JniType::parse_descriptor("II").is_err());
}

#[test]
fn test_method_signature() {
    let sig = MethodSignature::parse("(ILjava/lang/String;[B)Z").unwrap();
    assert_eq!(
        sig.params,
        vec![JniType::Int, JniType::string(), JniType::array_of(JniType::Byte)]
    );
    assert_eq!(sig.ret, JniType::Boolean);
    assert_eq!(sig.descriptor(), "(ILjava/lang/String;[B)Z");
    assert_eq!(sig.args_descriptor(), "ILjava/lang/String;[B");
    assert_eq!(sig.to_string(), sig.descriptor());
}

#[test]
fn test_method_signature_validation() {
    assert!(MethodSignature::parse("()V").is_ok());
    assert!(MethodSignature::parse("V").is_err());
    assert!(MethodSignature::parse("(I").is_err());
    assert!(MethodSignature::parse("()").is_err());
    // void is only a return type
    assert!(MethodSignature::parse("(V)V").is_err());
    assert!(matches!(
        MethodSignature::parse("(I)Ix"),
        Err(BindError::InvalidDescriptor(_))
    ));
}

#[test]
fn test_host_type_names() {
    assert_eq!(JniType::from_kotlin("String"), Some(JniType::string()));
    assert_eq!(JniType::from_kotlin("Int"), Some(JniType::Int));
    assert_eq!(
        JniType::from_kotlin("Int?"),
        Some(JniType::class("java.lang.Integer"))
    );
    assert_eq!(
        JniType::from_kotlin("IntArray"),
        Some(JniType::array_of(JniType::Int))
    );
    assert_eq!(
        JniType::from_kotlin("Array<String>"),
        Some(JniType::array_of(JniType::string()))
    );
    assert_eq!(JniType::from_java("long"), Some(JniType::Long));
    assert_eq!(
        JniType::from_java("byte[]"),
        Some(JniType::array_of(JniType::Byte))
    );
    assert_eq!(JniType::from_java("java.lang.String"), Some(JniType::string()));
    assert_eq!(JniType::Int.rust_type(), "jint");
    assert_eq!(JniType::string().rust_type(), "jstring");
    assert_eq!(JniType::string().kotlin_name(), "String");
}

#[test]
fn test_mangle_escapes() {
    assert_eq!(mangle("sayHello"), "sayHello");
    assert_eq!(mangle("my_rust_function"), "my_1rust_1function");
    assert_eq!(mangle("com.example.Outer$Inner"), "com_example_Outer_00024Inner");
    assert_eq!(mangle("java/lang/String;"), "java_lang_String_2");
    assert_eq!(mangle("[I"), "_3I");
    assert_eq!(mangle("caf\u{e9}"), "caf_000e9");
}

#[test]
fn test_short_and_long_symbols() {
    assert_eq!(
        short_symbol("com.devfigas.rustjni.sample.MainActivity", "sayHello"),
        "Java_com_devfigas_rustjni_sample_MainActivity_sayHello"
    );
    assert_eq!(
        short_symbol("com.example.Example", "my_rust_function"),
        "Java_com_example_Example_my_1rust_1function"
    );

    let sig = MethodSignature::parse("(II)I").unwrap();
    assert_eq!(
        long_symbol("com.example.Example", "add", &sig),
        "Java_com_example_Example_add__II"
    );
    let sig = MethodSignature::parse("(Ljava/lang/String;[I)V").unwrap();
    assert_eq!(
        long_symbol("com.example.Example", "f", &sig),
        "Java_com_example_Example_f__Ljava_lang_String_2_3I"
    );
}

#[test]
fn test_demangle() {
    let d = demangle("Java_com_devfigas_rustjni_sample_MainActivity_sayHello").unwrap();
    assert_eq!(d.class, "com.devfigas.rustjni.sample.MainActivity");
    assert_eq!(d.method, "sayHello");
    assert_eq!(d.args, None);

    let d = demangle("Java_com_example_Example_f__Ljava_lang_String_2_3I").unwrap();
    assert_eq!(d.method, "f");
    assert_eq!(d.args.as_deref(), Some("Ljava/lang/String;[I"));

    // `__1` is an escaped underscore after the separator, not an args marker
    let d = demangle("Java_com_example_A__1private").unwrap();
    assert_eq!(d.class, "com.example.A");
    assert_eq!(d.method, "_private");
    assert_eq!(d.args, None);

    let d = demangle("Java_com_example_Outer_00024Inner_run").unwrap();
    assert_eq!(d.class, "com.example.Outer$Inner");
}

#[test]
fn test_demangle_rejects() {
    assert!(matches!(
        demangle("rustjni_hello"),
        Err(BindError::InvalidSymbol(_))
    ));
    assert!(demangle("Java_onlyMethod").is_err());
    assert!(demangle("Java_a_b_0zz").is_err());
}

#[test]
fn test_demangle_round_trip() {
    let cases = [
        ("com.example.Example", "my_rust_function"),
        ("com.example.Outer$Inner", "run"),
        ("Top", "_x"),
    ];
    for (class, method) in cases {
        let d = demangle(&short_symbol(class, method)).unwrap();
        assert_eq!((d.class.as_str(), d.method.as_str()), (class, method));
    }
}

#[test]
fn test_decl_symbols() {
    let decl = NativeDecl::parse_jni("com.example.Calc", "add", "(II)I").unwrap();
    assert_eq!(
        decl.symbols(),
        vec![
            "Java_com_example_Calc_add".to_string(),
            "Java_com_example_Calc_add__II".to_string()
        ]
    );
    assert_eq!(decl.qualified_name(), "com.example.Calc.add");
    assert_eq!(decl.to_string(), "com.example.Calc.add(II)I");

    let c = NativeDecl::c("rustjni_hello", MethodSignature::parse("()Ljava/lang/String;").unwrap());
    assert_eq!(c.symbols(), vec!["rustjni_hello".to_string()]);
    assert_eq!(c.convention, SymbolConvention::C);
}

#[test]
fn test_manifest_check() {
    let say_hello = NativeDecl::parse_jni(
        "com.devfigas.rustjni.sample.MainActivity",
        "sayHello",
        "()Ljava/lang/String;",
    )
    .unwrap();
    let mut manifest = AbiManifest::new("rustjni_hello", "0.1.0");
    manifest.add_decl(&say_hello);
    let symbol = say_hello.symbols()[0].clone();

    assert!(manifest.check(&say_hello, &symbol).is_ok());
    assert!(manifest.check(&say_hello, "unlisted_symbol").is_ok());

    let wrong = NativeDecl::parse_jni(
        "com.devfigas.rustjni.sample.MainActivity",
        "sayHello",
        "(I)Ljava/lang/String;",
    )
    .unwrap();
    match manifest.check(&wrong, &symbol) {
        Err(BindError::SignatureMismatch {
            declared, exported, ..
        }) => {
            assert_eq!(declared, "(I)Ljava/lang/String;");
            assert_eq!(exported, "()Ljava/lang/String;");
        }
        other => panic!("expected a signature mismatch, got {:?}", other),
    }
}

#[test]
fn test_manifest_json() {
    let json = r#"{
        "library": "rustjni_hello",
        "exports": [
            { "symbol": "rustjni_hello", "descriptor": "()Ljava/lang/String;" }
        ]
    }"#;
    let manifest = AbiManifest::from_json(json).unwrap();
    assert_eq!(manifest.library, "rustjni_hello");
    assert_eq!(manifest.exports.len(), 1);
    assert!(manifest.export("rustjni_hello").is_some());
    assert!(manifest.validate().is_ok());

    let reparsed = AbiManifest::from_json(&manifest.to_json().unwrap()).unwrap();
    assert_eq!(reparsed, manifest);

    assert!(matches!(
        AbiManifest::from_json("{ not json"),
        Err(BindError::Manifest(_))
    ));
    let bad = r#"{ "library": "x", "exports": [ { "symbol": "f", "descriptor": "(" } ] }"#;
    assert!(AbiManifest::from_json(bad).unwrap().validate().is_err());
}

#[test]
fn test_library_name_validation() {
    assert!(validate_library_name("my_rust_lib").is_ok());
    assert!(validate_library_name("c").is_ok());
    for bad in ["", "  ", "lib/foo", "C:\\foo", "libfoo.so", "foo.dylib", "foo.dll"] {
        assert!(
            matches!(
                validate_library_name(bad),
                Err(BindError::InvalidLibraryName { .. })
            ),
            "{:?} should be rejected",
            bad
        );
    }
}

#[test]
#[cfg(target_os = "linux")]
fn test_library_filename() {
    assert_eq!(library_filename("my_rust_lib"), "libmy_rust_lib.so");
}

#[test]
fn test_registry_creation() {
    let registry = Registry::with_loader(LibraryLoader::empty());
    assert!(registry.loaded_libraries().is_empty());
    assert!(!registry.is_loaded("my_rust_lib"));
    assert_eq!(
        registry.require("my_rust_lib").unwrap_err(),
        BindError::NotLoaded("my_rust_lib".to_string())
    );
}

#[test]
fn test_invalid_name_never_reaches_linker() {
    let registry = Registry::with_loader(LibraryLoader::empty());
    let err = registry.load_library("libfoo.so").unwrap_err();
    assert!(matches!(err, BindError::InvalidLibraryName { .. }));
}

#[test]
fn test_missing_library_is_link_error() {
    let registry = Registry::with_loader(LibraryLoader::empty());
    let err = registry
        .load_library("rustjni_definitely_missing")
        .unwrap_err();
    assert!(matches!(err, BindError::Link { ref library, .. } if library == "rustjni_definitely_missing"));

    // The failure is remembered, not retried
    assert_eq!(registry.require("rustjni_definitely_missing").unwrap_err(), err);
    assert_eq!(registry.load_library("rustjni_definitely_missing").unwrap_err(), err);
    assert!(registry.loaded_libraries().is_empty());
}

#[test]
fn test_concurrent_failed_loads_agree() {
    let registry = Arc::new(Registry::with_loader(LibraryLoader::empty()));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.load_library("rustjni_missing_concurrent"))
        })
        .collect();

    let errors: Vec<BindError> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap_err())
        .collect();
    assert!(errors.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_unloaded_native_fn() {
    let registry = Registry::with_loader(LibraryLoader::empty());
    let decl = NativeDecl::c("rustjni_hello", MethodSignature::parse("()Ljava/lang/String;").unwrap());
    let hello: NativeFn<BorrowedStrFn> = unsafe { NativeFn::new("rustjni_hello", decl) };
    assert_eq!(
        hello.call_str(&registry).unwrap_err(),
        BindError::NotLoaded("rustjni_hello".to_string())
    );
    assert!(!hello.is_resolved());
}

#[test]
fn test_search_path_order() {
    let mut loader = LibraryLoader::empty();
    loader.add_search_path("/first");
    loader.add_search_path("/second");
    assert_eq!(loader.search_paths()[0], std::path::PathBuf::from("/second"));
    assert_eq!(loader.find_library("rustjni_nowhere"), None);
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
mod libc {
    use super::*;

    type GetPidFn = unsafe extern "C" fn() -> i32;

    fn getpid_decl() -> NativeDecl {
        NativeDecl::c("getpid", MethodSignature::parse("()I").unwrap())
    }

    #[test]
    fn test_libc_loading() {
        let registry = Registry::with_loader(LibraryLoader::empty());
        let library = registry.load_path("libc.so.6").unwrap();
        assert!(library.has_symbol("getpid"));
        assert!(library.manifest().is_none());
        assert_eq!(registry.loaded_libraries(), vec!["libc.so.6".to_string()]);

        let getpid: NativeFn<GetPidFn> = unsafe { NativeFn::new("libc.so.6", getpid_decl()) };
        let f = getpid.get_in(&registry).unwrap();
        assert!(getpid.is_resolved());
        let pid = unsafe { f() };
        assert_eq!(pid as u32, std::process::id());
    }

    #[test]
    fn test_missing_symbol_fails_at_bind() {
        let registry = Registry::with_loader(LibraryLoader::empty());
        // Loading succeeds; the missing export only shows up when binding
        let library = registry.load_path("libc.so.6").unwrap();
        let decl = NativeDecl::parse_jni("com.example.Calc", "add", "(II)I").unwrap();

        match library.resolve_symbol(&decl) {
            Err(BindError::UnsatisfiedLink { tried, .. }) => assert_eq!(tried.len(), 2),
            other => panic!("expected an unsatisfied link, got {:?}", other),
        }

        let checks = check_bindings(&library, &[getpid_decl(), decl]);
        assert_eq!(checks[0].result.as_deref(), Ok("getpid"));
        assert!(checks[1].result.is_err());
    }

    #[test]
    fn test_native_fn_checks_each_registry() {
        let first = Registry::with_loader(LibraryLoader::empty());
        let second = Registry::with_loader(LibraryLoader::empty());
        first.load_path("libc.so.6").unwrap();

        let getpid: NativeFn<GetPidFn> = unsafe { NativeFn::new("libc.so.6", getpid_decl()) };
        assert!(getpid.get_in(&first).is_ok());
        assert!(getpid.is_resolved());

        // Resolved once, but the second registry never loaded the library
        assert_eq!(
            getpid.get_in(&second).unwrap_err(),
            BindError::NotLoaded("libc.so.6".to_string())
        );

        second.load_path("libc.so.6").unwrap();
        let f = getpid.get_in(&second).unwrap();
        assert_eq!(unsafe { f() } as u32, std::process::id());
    }

    #[test]
    fn test_concurrent_loads_share_one_library() {
        let registry = Arc::new(Registry::with_loader(LibraryLoader::empty()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.load_path("libc.so.6").unwrap())
            })
            .collect();

        let libs: Vec<Arc<NativeLibrary>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(libs.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.loaded_libraries().len(), 1);
    }
}
