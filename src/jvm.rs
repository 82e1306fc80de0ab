//! Host source scanning
//!
//! Pulls native method declarations and `System.loadLibrary` calls out of
//! Kotlin and Java sources, so the Rust side can be checked or stubbed
//! against what the host actually declares.

use std::path::Path;

use regex::Regex;
use thiserror::Error;

use crate::ffi::{JniType, MethodSignature, NativeDecl};

lazy_static::lazy_static! {
    static ref PACKAGE: Regex = Regex::new(r"(?m)^\s*package\s+([\w.]+)").unwrap();
    static ref CLASS: Regex =
        Regex::new(r"\b(?:class|object)\s+([A-Za-z_]\w*)").unwrap();
    static ref LOAD_LIBRARY: Regex =
        Regex::new(r#"System\.loadLibrary\(\s*"([^"]+)"\s*\)"#).unwrap();
    static ref KOTLIN_EXTERNAL: Regex = Regex::new(
        r"\bexternal\s+fun\s+([A-Za-z_]\w*)\s*\(([^)]*)\)\s*(?::\s*([\w.<>?]+))?"
    ).unwrap();
    static ref JAVA_NATIVE: Regex = Regex::new(
        r"\bnative\s+(?:static\s+|final\s+|synchronized\s+)*([\w.<>\[\]]+)\s+([A-Za-z_]\w*)\s*\(([^)]*)\)\s*;"
    ).unwrap();
}

/// Source language of a host class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    Kotlin,
    Java,
}

impl SourceLanguage {
    /// `.kt` or `.java`
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "kt" => Some(SourceLanguage::Kotlin),
            "java" => Some(SourceLanguage::Java),
            _ => None,
        }
    }

    fn map_type(&self, name: &str) -> Option<JniType> {
        match self {
            SourceLanguage::Kotlin => JniType::from_kotlin(name),
            SourceLanguage::Java => JniType::from_java(name),
        }
    }
}

/// Errors while scanning a host source
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no class declaration found")]
    MissingClass,

    #[error("method '{method}': unsupported type '{ty}'")]
    UnsupportedType { method: String, ty: String },

    #[error("method '{method}': malformed parameter '{param}'")]
    MalformedParam { method: String, param: String },
}

/// What a host class declares about its native side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSource {
    pub language: SourceLanguage,
    /// Dotted binary name of the first class in the file
    pub class: String,
    /// Libraries passed to System.loadLibrary, in order
    pub libraries: Vec<String>,
    pub methods: Vec<NativeDecl>,
}

/// Scan `content` for native declarations
pub fn parse_host_source(content: &str, language: SourceLanguage) -> Result<HostSource, ParseError> {
    let content = strip_comments(content);

    let simple_name = CLASS
        .captures(&content)
        .map(|c| c[1].to_string())
        .ok_or(ParseError::MissingClass)?;
    let class = match PACKAGE.captures(&content) {
        Some(c) => format!("{}.{}", &c[1], simple_name),
        None => simple_name,
    };

    let libraries = LOAD_LIBRARY
        .captures_iter(&content)
        .map(|c| c[1].to_string())
        .collect();

    let mut methods = Vec::new();
    match language {
        SourceLanguage::Kotlin => {
            for c in KOTLIN_EXTERNAL.captures_iter(&content) {
                let name = &c[1];
                let params = parse_params(name, &c[2], language)?;
                let ret = match c.get(3) {
                    Some(ty) => resolve(name, ty.as_str(), language)?,
                    None => JniType::Void,
                };
                methods.push(NativeDecl::jni(&class, name, MethodSignature::new(params, ret)));
            }
        }
        SourceLanguage::Java => {
            for c in JAVA_NATIVE.captures_iter(&content) {
                let name = &c[2];
                let ret = resolve(name, &c[1], language)?;
                let params = parse_params(name, &c[3], language)?;
                methods.push(NativeDecl::jni(&class, name, MethodSignature::new(params, ret)));
            }
        }
    }

    log::debug!(
        "{}: {} native methods, libraries {:?}",
        class,
        methods.len(),
        libraries
    );

    Ok(HostSource {
        language,
        class,
        libraries,
        methods,
    })
}

fn resolve(method: &str, ty: &str, language: SourceLanguage) -> Result<JniType, ParseError> {
    language
        .map_type(ty)
        .ok_or_else(|| ParseError::UnsupportedType {
            method: method.to_string(),
            ty: ty.to_string(),
        })
}

fn parse_params(method: &str, params: &str, language: SourceLanguage) -> Result<Vec<JniType>, ParseError> {
    let malformed = |param: &str| ParseError::MalformedParam {
        method: method.to_string(),
        param: param.to_string(),
    };

    params
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|param| match language {
            // `[vararg] name: Type = default`
            SourceLanguage::Kotlin => {
                let (name, ty) = param.split_once(':').ok_or_else(|| malformed(param))?;
                let ty = resolve(method, ty.split('=').next().unwrap_or(ty).trim(), language)?;
                if name.split_whitespace().any(|m| m == "vararg") {
                    Ok(JniType::array_of(ty))
                } else {
                    Ok(ty)
                }
            }
            // `final Type name`, `Type... name`
            SourceLanguage::Java => {
                let spaced = param.replace("...", "... ");
                let tokens: Vec<&str> = spaced
                    .split_whitespace()
                    .filter(|t| *t != "final")
                    .collect();
                match tokens.as_slice() {
                    [ty, _name] => resolve(method, ty, language),
                    [ty, "...", _name] => resolve(method, &format!("{}...", ty), language),
                    _ => Err(malformed(param)),
                }
            }
        })
        .collect()
}

/// Drop `//` and `/* */` comments so commented-out declarations are ignored
fn strip_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    // Open string or char literal
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(open) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else if c == open {
                quote = None;
            }
            continue;
        }
        match (c, chars.peek()) {
            ('"' | '\'', _) => {
                quote = Some(c);
                out.push(c);
            }
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    if skipped == '\n' {
                        out.push('\n');
                    }
                    prev = skipped;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const KOTLIN_ACTIVITY: &str = r#"
package com.devfigas.rustjni.sample

import android.os.Bundle
import androidx.appcompat.app.AppCompatActivity

class MainActivity : AppCompatActivity() {

    private external fun sayHello(): String

    // external fun commentedOut(): Int

    external fun add(a: Int, b: Int = 2): Int

    external fun reset()

    init { System.loadLibrary("my_rust_lib") }

    override fun onCreate(savedInstanceState: Bundle?) {
        super.onCreate(savedInstanceState)
    }
}
"#;

    const JAVA_ACTIVITY: &str = r#"
package com.devfigas.rustjni.sample;

public class MainActivity extends AppCompatActivity {

    private static native String sayHello();

    public native int sum(final int a, int[] rest);

    static { System.loadLibrary("my_rust_lib"); }
}
"#;

    #[test]
    fn test_parse_kotlin_externals() {
        let source = parse_host_source(KOTLIN_ACTIVITY, SourceLanguage::Kotlin).unwrap();
        assert_eq!(source.class, "com.devfigas.rustjni.sample.MainActivity");
        assert_eq!(source.libraries, vec!["my_rust_lib"]);

        let names: Vec<&str> = source.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["sayHello", "add", "reset"]);
        assert_eq!(source.methods[0].signature.descriptor(), "()Ljava/lang/String;");
        assert_eq!(source.methods[1].signature.descriptor(), "(II)I");
        assert_eq!(source.methods[2].signature.descriptor(), "()V");
    }

    #[test]
    fn test_parse_java_natives() {
        let source = parse_host_source(JAVA_ACTIVITY, SourceLanguage::Java).unwrap();
        assert_eq!(source.class, "com.devfigas.rustjni.sample.MainActivity");
        assert_eq!(source.libraries, vec!["my_rust_lib"]);
        assert_eq!(source.methods.len(), 2);
        assert_eq!(source.methods[1].signature.descriptor(), "(I[I)I");
        assert_eq!(
            source.methods[0].symbols()[0],
            "Java_com_devfigas_rustjni_sample_MainActivity_sayHello"
        );
    }

    #[test]
    fn test_char_literals_do_not_open_strings() {
        let src = r#"
class Quotes {
    private val quote = '"'
    private val backslash = '\\'
    // external fun commentedOut(): Int
    external fun afterQuote(): Int /* "unterminated */
    private val apostrophe = "it's"
    external fun last(): Boolean
}
"#;
        let source = parse_host_source(src, SourceLanguage::Kotlin).unwrap();
        let names: Vec<&str> = source.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["afterQuote", "last"]);
    }

    #[test]
    fn test_varargs_become_arrays() {
        let java = "class V { native int sum(int... values); native void log(String fmt, Object ...args); }";
        let source = parse_host_source(java, SourceLanguage::Java).unwrap();
        assert_eq!(source.methods[0].signature.descriptor(), "([I)I");
        assert_eq!(
            source.methods[1].signature.descriptor(),
            "(Ljava/lang/String;[Ljava/lang/Object;)V"
        );

        let kotlin = "class V { external fun sum(vararg values: Int): Int\n external fun join(vararg parts: String): String }";
        let source = parse_host_source(kotlin, SourceLanguage::Kotlin).unwrap();
        assert_eq!(source.methods[0].signature.descriptor(), "([I)I");
        assert_eq!(
            source.methods[1].signature.descriptor(),
            "([Ljava/lang/String;)Ljava/lang/String;"
        );
    }

    #[test]
    fn test_unsupported_type() {
        let src = "class A { external fun f(b: Bundle): Int }";
        let err = parse_host_source(src, SourceLanguage::Kotlin).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedType { .. }));
    }

    #[test]
    fn test_missing_class() {
        let err = parse_host_source("fun main() {}", SourceLanguage::Kotlin).unwrap_err();
        assert!(matches!(err, ParseError::MissingClass));
    }

    #[test]
    fn test_language_from_path() {
        assert_eq!(
            SourceLanguage::from_path(Path::new("MainActivity.kt")),
            Some(SourceLanguage::Kotlin)
        );
        assert_eq!(
            SourceLanguage::from_path(Path::new("MainActivity.java")),
            Some(SourceLanguage::Java)
        );
        assert_eq!(SourceLanguage::from_path(Path::new("lib.rs")), None);
    }
}
