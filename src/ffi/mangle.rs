//! JNI Symbol Mangling
//!
//! Encodes class and method names into the exported symbol names the JVM
//! looks up, and decodes them back.
//!
//! ```text
//! com.example.Example.my_rust_function
//!   -> Java_com_example_Example_my_1rust_1function
//! com.example.Example.add(II)I   (overloaded)
//!   -> Java_com_example_Example_add__II
//! ```

use super::types::MethodSignature;
use super::BindError;

const PREFIX: &str = "Java_";

/// Escape one name component. `/` and `.` become package separators.
pub fn mangle(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    mangle_into(component, &mut out);
    out
}

fn mangle_into(component: &str, out: &mut String) {
    for unit in component.encode_utf16() {
        match unit {
            0x2E | 0x2F => out.push('_'), // '.' '/'
            0x5F => out.push_str("_1"),   // '_'
            0x3B => out.push_str("_2"),   // ';'
            0x5B => out.push_str("_3"),   // '['
            u if u < 0x80 && (u as u8).is_ascii_alphanumeric() => out.push(u as u8 as char),
            u => out.push_str(&format!("_0{:04x}", u)),
        }
    }
}

/// `Java_<class>_<method>`
pub fn short_symbol(class: &str, method: &str) -> String {
    let mut out = String::from(PREFIX);
    mangle_into(class, &mut out);
    out.push('_');
    mangle_into(method, &mut out);
    out
}

/// `Java_<class>_<method>__<args>`, the form used for overloaded natives
pub fn long_symbol(class: &str, method: &str, signature: &MethodSignature) -> String {
    let mut out = short_symbol(class, method);
    out.push_str("__");
    mangle_into(&signature.args_descriptor(), &mut out);
    out
}

/// A decoded `Java_` symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemangledSymbol {
    /// Dotted binary class name
    pub class: String,
    pub method: String,
    /// Argument descriptor of a long symbol
    pub args: Option<String>,
}

/// Decode a JNI symbol back into class, method and optional argument descriptor
pub fn demangle(symbol: &str) -> Result<DemangledSymbol, BindError> {
    let body = symbol
        .strip_prefix(PREFIX)
        .ok_or_else(|| BindError::InvalidSymbol(format!("'{}' has no Java_ prefix", symbol)))?;

    let (name_part, args_part) = match args_separator(body) {
        Some(idx) => (&body[..idx], Some(&body[idx + 2..])),
        None => (body, None),
    };

    let mut segments = decode(name_part, symbol)?
        .split('/')
        .map(str::to_string)
        .collect::<Vec<_>>();
    let method = segments.pop().unwrap_or_default();
    if segments.is_empty() || method.is_empty() || segments.iter().any(String::is_empty) {
        return Err(BindError::InvalidSymbol(format!(
            "'{}' does not name a class and a method",
            symbol
        )));
    }

    let args = args_part.map(|args| decode(args, symbol)).transpose()?;

    Ok(DemangledSymbol {
        class: segments.join("."),
        method,
        args,
    })
}

/// Position of the `__` that starts the argument part of a long symbol.
/// `__1x` is a separator followed by an escape, not the argument marker.
fn args_separator(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'_' {
            match bytes[i + 1] {
                b'_' if !matches!(bytes.get(i + 2), Some(b'0'..=b'3')) => return Some(i),
                b'0' => i += 6,
                b'1'..=b'3' => i += 2,
                _ => i += 1,
            }
        } else {
            i += 1;
        }
    }
    None
}

/// Undo the escaping; plain `_` decodes to `/`
fn decode(mangled: &str, symbol: &str) -> Result<String, BindError> {
    let invalid = || BindError::InvalidSymbol(format!("bad escape in '{}'", symbol));

    let bytes = mangled.as_bytes();
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b != b'_' {
            if !b.is_ascii_alphanumeric() {
                return Err(invalid());
            }
            units.push(b as u16);
            i += 1;
            continue;
        }
        match bytes.get(i + 1) {
            Some(b'1') => {
                units.push(b'_' as u16);
                i += 2;
            }
            Some(b'2') => {
                units.push(b';' as u16);
                i += 2;
            }
            Some(b'3') => {
                units.push(b'[' as u16);
                i += 2;
            }
            Some(b'0') => {
                let hex = mangled.get(i + 2..i + 6).ok_or_else(invalid)?;
                let unit = u16::from_str_radix(hex, 16).map_err(|_| invalid())?;
                units.push(unit);
                i += 6;
            }
            _ => {
                units.push(b'/' as u16);
                i += 1;
            }
        }
    }
    String::from_utf16(&units).map_err(|_| invalid())
}
