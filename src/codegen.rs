//! Code generation for both sides of the boundary
//!
//! - Rust: `extern "system"` JNI entry points with the exact mangled names
//! - Host: Kotlin or Java `native` declarations plus the one-time
//!   `System.loadLibrary` initializer, optionally spliced into the host class
//!   between `//<RustJNI>` markers

use std::collections::BTreeSet;
use std::fmt::Write;

use regex::Regex;

use crate::ffi::{JniType, NativeDecl, SymbolConvention};
use crate::jvm::{ParseError, SourceLanguage};

pub const HOST_BLOCK_OPEN: &str = "//<RustJNI>";
pub const HOST_BLOCK_CLOSE: &str = "//</RustJNI>";

/// A Rust file body with the imports every stub needs
pub fn rust_stubs(decls: &[NativeDecl]) -> String {
    let mut sys_types = BTreeSet::new();
    for decl in decls {
        for ty in decl.signature.params.iter().chain([&decl.signature.ret]) {
            if *ty != JniType::Void {
                sys_types.insert(ty.rust_type());
            }
        }
    }

    let mut out = String::new();
    out.push_str("use jni::objects::JObject;\nuse jni::JNIEnv;\n");
    if !sys_types.is_empty() {
        let list: Vec<&str> = sys_types.into_iter().collect();
        let _ = writeln!(out, "use jni::sys::{{{}}};", list.join(", "));
    }
    for decl in decls {
        out.push('\n');
        out.push_str(&rust_stub(decl));
    }
    out
}

/// One JNI entry point. C-convention declarations get a plain `extern "C"` fn.
pub fn rust_stub(decl: &NativeDecl) -> String {
    let symbol = decl.symbols().into_iter().next().unwrap_or_default();
    let ret = &decl.signature.ret;

    let mut params = Vec::new();
    if decl.convention == SymbolConvention::Jni {
        let env = if ret.is_reference() { "env" } else { "_env" };
        params.push(format!("{}: JNIEnv<'local>", env));
        params.push("_this: JObject<'local>".to_string());
    }
    for (i, ty) in decl.signature.params.iter().enumerate() {
        params.push(format!("_arg{}: {}", i, ty.rust_type()));
    }

    let abi = match decl.convention {
        SymbolConvention::Jni => "system",
        SymbolConvention::C => "C",
    };
    let generics = if decl.convention == SymbolConvention::Jni {
        "<'local>"
    } else {
        ""
    };
    let ret_decl = if *ret == JniType::Void {
        String::new()
    } else {
        format!(" -> {}", ret.rust_type())
    };

    let mut out = String::new();
    let _ = writeln!(out, "/// {}", decl);
    out.push_str("#[no_mangle]\n");
    let _ = writeln!(out, "pub extern \"{}\" fn {}{}(", abi, symbol, generics);
    for param in &params {
        let _ = writeln!(out, "    {},", param);
    }
    let _ = writeln!(out, "){} {{", ret_decl);
    let _ = writeln!(out, "    log::debug!(\"{} called\");", decl.qualified_name());
    if let Some(body) = default_body(decl) {
        let _ = writeln!(out, "    {}", body);
    }
    out.push_str("}\n");
    out
}

fn default_body(decl: &NativeDecl) -> Option<String> {
    let ret = &decl.signature.ret;
    let body = match ret {
        JniType::Void => return None,
        JniType::Boolean => "jni::sys::JNI_FALSE".to_string(),
        JniType::Float | JniType::Double => "0.0".to_string(),
        JniType::Object(_) if ret.is_string() && decl.convention == SymbolConvention::Jni => {
            format!(
                "env.new_string(\"Rust Method: {}\").map(|s| s.into_raw()).unwrap_or(std::ptr::null_mut())",
                decl.name
            )
        }
        JniType::Object(_) | JniType::Array(_) => "std::ptr::null_mut()".to_string(),
        _ => "0".to_string(),
    };
    Some(body)
}

/// Host-side declarations plus the load initializer, ready to paste into the class body
pub fn host_declarations(library: &str, decls: &[NativeDecl], language: SourceLanguage) -> String {
    let mut out = String::new();
    for decl in decls {
        let sig = &decl.signature;
        match language {
            SourceLanguage::Kotlin => {
                let params: Vec<String> = sig
                    .params
                    .iter()
                    .enumerate()
                    .map(|(i, ty)| format!("arg{}: {}", i, ty.kotlin_name()))
                    .collect();
                let _ = write!(out, "private external fun {}({})", decl.name, params.join(", "));
                if sig.ret != JniType::Void {
                    let _ = write!(out, ": {}", sig.ret.kotlin_name());
                }
                out.push('\n');
            }
            SourceLanguage::Java => {
                let params: Vec<String> = sig
                    .params
                    .iter()
                    .enumerate()
                    .map(|(i, ty)| format!("{} arg{}", ty.java_name(), i))
                    .collect();
                let _ = writeln!(
                    out,
                    "private static native {} {}({});",
                    sig.ret.java_name(),
                    decl.name,
                    params.join(", ")
                );
            }
        }
    }
    out.push('\n');
    match language {
        SourceLanguage::Kotlin => {
            let _ = writeln!(
                out,
                "companion object {{\n    init {{ System.loadLibrary(\"{}\") }}\n}}",
                library
            );
        }
        SourceLanguage::Java => {
            let _ = writeln!(out, "static {{ System.loadLibrary(\"{}\"); }}", library);
        }
    }
    out
}

/// [`host_declarations`] between the block markers, every line prefixed with `indent`
pub fn host_block(library: &str, decls: &[NativeDecl], language: SourceLanguage, indent: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}{}", indent, HOST_BLOCK_OPEN);
    let _ = writeln!(out, "{}// auto-generated code", indent);
    for line in host_declarations(library, decls, language).lines() {
        if line.is_empty() {
            out.push('\n');
        } else {
            let _ = writeln!(out, "{}{}", indent, line);
        }
    }
    let _ = writeln!(out, "{}{}", indent, HOST_BLOCK_CLOSE);
    out
}

/// Write the declarations into the body of `class` (simple name) in a host
/// source. An earlier generated block is replaced in place; otherwise the
/// block goes right after the class's opening brace.
pub fn splice_host_declarations(
    content: &str,
    class: &str,
    library: &str,
    decls: &[NativeDecl],
    language: SourceLanguage,
) -> Result<String, ParseError> {
    let opening = Regex::new(&format!(
        r"(?m)^([ \t]*)(?:[\w@.()]+[ \t]+)*(?:class|object)[ \t]+{}\b[^{{]*\{{",
        regex::escape(class)
    ))
    .map_err(|_| ParseError::MissingClass)?;
    let caps = opening.captures(content).ok_or(ParseError::MissingClass)?;
    let indent = format!("{}    ", &caps[1]);
    let block = host_block(library, decls, language, &indent);

    if let Some(updated) = replace_block(content, HOST_BLOCK_OPEN, HOST_BLOCK_CLOSE, &block) {
        return Ok(updated);
    }
    let end = caps.get(0).map_or(0, |m| m.end());
    let rest = content[end..].trim_start_matches(['\r', '\n']);
    Ok(format!("{}\n{}\n{}", &content[..end], block, rest))
}

/// Replace the whole lines spanning `open`..`close` with `block`. `None`
/// when the content has no such block.
pub fn replace_block(content: &str, open: &str, close: &str, block: &str) -> Option<String> {
    let start = content.find(open)?;
    let end = start + content[start..].find(close)? + close.len();

    let line_start = content[..start].rfind('\n').map_or(0, |i| i + 1);
    let line_start = if content[line_start..start].trim().is_empty() {
        line_start
    } else {
        start
    };
    let line_end = content[end..]
        .find('\n')
        .map_or(content.len(), |i| end + i + 1);

    Some(format!(
        "{}{}{}",
        &content[..line_start],
        block,
        &content[line_end..]
    ))
}
