//! JNI Type System
//!
//! Types, method descriptors and native declarations shared by the host and
//! the native library. Descriptors use the JVM grammar (`(I)Ljava/lang/String;`)
//! for both JNI exports and plain C exports.

use std::fmt;

use super::mangle;
use super::BindError;

const STRING_CLASS: &str = "java/lang/String";
const OBJECT_CLASS: &str = "java/lang/Object";

/// A value type that can cross the native boundary
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JniType {
    /// No value (return position only)
    Void,
    /// `Z`
    Boolean,
    /// `B`
    Byte,
    /// `C`, a UTF-16 code unit
    Char,
    /// `S`
    Short,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `F`
    Float,
    /// `D`
    Double,
    /// Reference type, holding the binary class name with `/` separators
    Object(String),
    /// Array of the element type
    Array(Box<JniType>),
}

impl JniType {
    /// `java.lang.String`
    pub fn string() -> Self {
        JniType::Object(STRING_CLASS.to_string())
    }

    /// `java.lang.Object`
    pub fn object() -> Self {
        JniType::Object(OBJECT_CLASS.to_string())
    }

    /// Reference type from a dotted or slashed class name
    pub fn class(name: &str) -> Self {
        JniType::Object(name.replace('.', "/"))
    }

    pub fn array_of(element: JniType) -> Self {
        JniType::Array(Box::new(element))
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, JniType::Object(_) | JniType::Array(_) | JniType::Void)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, JniType::Object(_) | JniType::Array(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, JniType::Object(class) if class == STRING_CLASS)
    }

    /// Append the descriptor of this type to `out`
    pub fn write_descriptor(&self, out: &mut String) {
        match self {
            JniType::Void => out.push('V'),
            JniType::Boolean => out.push('Z'),
            JniType::Byte => out.push('B'),
            JniType::Char => out.push('C'),
            JniType::Short => out.push('S'),
            JniType::Int => out.push('I'),
            JniType::Long => out.push('J'),
            JniType::Float => out.push('F'),
            JniType::Double => out.push('D'),
            JniType::Object(class) => {
                out.push('L');
                out.push_str(class);
                out.push(';');
            }
            JniType::Array(element) => {
                out.push('[');
                element.write_descriptor(out);
            }
        }
    }

    /// Field descriptor of this type
    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        self.write_descriptor(&mut out);
        out
    }

    /// Parse a complete field descriptor such as `[I` or `Ljava/lang/String;`
    pub fn parse_descriptor(descriptor: &str) -> Result<Self, BindError> {
        let (ty, used) = parse_type(descriptor.as_bytes(), 0, descriptor)?;
        if used != descriptor.len() {
            return Err(BindError::InvalidDescriptor(format!(
                "trailing characters in '{}'",
                descriptor
            )));
        }
        Ok(ty)
    }

    /// Map a Kotlin source type name (`Int`, `String?`, `IntArray`, `Array<String>`)
    pub fn from_kotlin(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Some(inner) = name.strip_suffix('?') {
            let ty = Self::from_kotlin(inner)?;
            return Some(ty.boxed());
        }
        if let Some(inner) = name
            .strip_prefix("Array<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return Some(Self::array_of(Self::from_kotlin(inner)?.boxed()));
        }
        let ty = match name {
            "Unit" => JniType::Void,
            "Boolean" => JniType::Boolean,
            "Byte" => JniType::Byte,
            "Char" => JniType::Char,
            "Short" => JniType::Short,
            "Int" => JniType::Int,
            "Long" => JniType::Long,
            "Float" => JniType::Float,
            "Double" => JniType::Double,
            "String" => JniType::string(),
            "Any" => JniType::object(),
            "BooleanArray" => Self::array_of(JniType::Boolean),
            "ByteArray" => Self::array_of(JniType::Byte),
            "CharArray" => Self::array_of(JniType::Char),
            "ShortArray" => Self::array_of(JniType::Short),
            "IntArray" => Self::array_of(JniType::Int),
            "LongArray" => Self::array_of(JniType::Long),
            "FloatArray" => Self::array_of(JniType::Float),
            "DoubleArray" => Self::array_of(JniType::Double),
            qualified if qualified.contains('.') => Self::class(qualified),
            _ => return None,
        };
        Some(ty)
    }

    /// Map a Java source type name (`int`, `String`, `byte[]`, `int...`, `java.util.List`)
    pub fn from_java(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Some(inner) = name.strip_suffix("[]").or_else(|| name.strip_suffix("...")) {
            return Some(Self::array_of(Self::from_java(inner)?));
        }
        let ty = match name {
            "void" => JniType::Void,
            "boolean" => JniType::Boolean,
            "byte" => JniType::Byte,
            "char" => JniType::Char,
            "short" => JniType::Short,
            "int" => JniType::Int,
            "long" => JniType::Long,
            "float" => JniType::Float,
            "double" => JniType::Double,
            "String" => JniType::string(),
            "Object" => JniType::object(),
            "Boolean" | "Byte" | "Character" | "Short" | "Integer" | "Long" | "Float"
            | "Double" => JniType::Object(format!("java/lang/{}", name)),
            qualified if qualified.contains('.') => Self::class(qualified),
            _ => return None,
        };
        Some(ty)
    }

    /// Boxed counterpart of a primitive; reference types are returned unchanged
    pub fn boxed(self) -> Self {
        let class = match self {
            JniType::Boolean => "java/lang/Boolean",
            JniType::Byte => "java/lang/Byte",
            JniType::Char => "java/lang/Character",
            JniType::Short => "java/lang/Short",
            JniType::Int => "java/lang/Integer",
            JniType::Long => "java/lang/Long",
            JniType::Float => "java/lang/Float",
            JniType::Double => "java/lang/Double",
            other => return other,
        };
        JniType::Object(class.to_string())
    }

    /// `jni::sys` type name used for this type in an `extern "system"` fn
    pub fn rust_type(&self) -> &'static str {
        match self {
            JniType::Void => "()",
            JniType::Boolean => "jboolean",
            JniType::Byte => "jbyte",
            JniType::Char => "jchar",
            JniType::Short => "jshort",
            JniType::Int => "jint",
            JniType::Long => "jlong",
            JniType::Float => "jfloat",
            JniType::Double => "jdouble",
            JniType::Object(_) if self.is_string() => "jstring",
            JniType::Object(class) if class == "java/lang/Class" => "jclass",
            JniType::Object(_) => "jobject",
            JniType::Array(element) => match element.as_ref() {
                JniType::Boolean => "jbooleanArray",
                JniType::Byte => "jbyteArray",
                JniType::Char => "jcharArray",
                JniType::Short => "jshortArray",
                JniType::Int => "jintArray",
                JniType::Long => "jlongArray",
                JniType::Float => "jfloatArray",
                JniType::Double => "jdoubleArray",
                _ => "jobjectArray",
            },
        }
    }

    /// Kotlin spelling, used when generating host declarations
    pub fn kotlin_name(&self) -> String {
        match self {
            JniType::Void => "Unit".to_string(),
            JniType::Boolean => "Boolean".to_string(),
            JniType::Byte => "Byte".to_string(),
            JniType::Char => "Char".to_string(),
            JniType::Short => "Short".to_string(),
            JniType::Int => "Int".to_string(),
            JniType::Long => "Long".to_string(),
            JniType::Float => "Float".to_string(),
            JniType::Double => "Double".to_string(),
            JniType::Object(class) if class == STRING_CLASS => "String".to_string(),
            JniType::Object(class) if class == OBJECT_CLASS => "Any".to_string(),
            JniType::Object(class) => class.replace('/', "."),
            JniType::Array(element) if element.is_primitive() => {
                format!("{}Array", element.kotlin_name())
            }
            JniType::Array(element) => format!("Array<{}>", element.kotlin_name()),
        }
    }

    /// Java spelling, used when generating host declarations
    pub fn java_name(&self) -> String {
        match self {
            JniType::Void => "void".to_string(),
            JniType::Boolean => "boolean".to_string(),
            JniType::Byte => "byte".to_string(),
            JniType::Char => "char".to_string(),
            JniType::Short => "short".to_string(),
            JniType::Int => "int".to_string(),
            JniType::Long => "long".to_string(),
            JniType::Float => "float".to_string(),
            JniType::Double => "double".to_string(),
            JniType::Object(class) => match class.strip_prefix("java/lang/") {
                Some(simple) if !simple.contains('/') => simple.to_string(),
                _ => class.replace('/', "."),
            },
            JniType::Array(element) => format!("{}[]", element.java_name()),
        }
    }
}

impl fmt::Display for JniType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor())
    }
}

fn parse_type(bytes: &[u8], pos: usize, whole: &str) -> Result<(JniType, usize), BindError> {
    let invalid = |why: &str| BindError::InvalidDescriptor(format!("{} in '{}'", why, whole));

    let tag = *bytes.get(pos).ok_or_else(|| invalid("unexpected end"))?;
    let ty = match tag {
        b'V' => JniType::Void,
        b'Z' => JniType::Boolean,
        b'B' => JniType::Byte,
        b'C' => JniType::Char,
        b'S' => JniType::Short,
        b'I' => JniType::Int,
        b'J' => JniType::Long,
        b'F' => JniType::Float,
        b'D' => JniType::Double,
        b'L' => {
            let start = pos + 1;
            let len = bytes[start..]
                .iter()
                .position(|&b| b == b';')
                .ok_or_else(|| invalid("unterminated class name"))?;
            if len == 0 {
                return Err(invalid("empty class name"));
            }
            let class = &whole[start..start + len];
            return Ok((JniType::Object(class.to_string()), start + len + 1));
        }
        b'[' => {
            let (element, next) = parse_type(bytes, pos + 1, whole)?;
            if element == JniType::Void {
                return Err(invalid("array of void"));
            }
            return Ok((JniType::array_of(element), next));
        }
        other => return Err(invalid(&format!("unknown type tag '{}'", other as char))),
    };
    Ok((ty, pos + 1))
}

/// Parameter and return types of a native method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub params: Vec<JniType>,
    pub ret: JniType,
}

impl MethodSignature {
    pub fn new(params: Vec<JniType>, ret: JniType) -> Self {
        Self { params, ret }
    }

    /// Full method descriptor, e.g. `(ILjava/lang/String;)V`
    pub fn descriptor(&self) -> String {
        let mut out = String::from("(");
        out.push_str(&self.args_descriptor());
        out.push(')');
        self.ret.write_descriptor(&mut out);
        out
    }

    /// The part between the parentheses; this is what overloaded JNI names encode
    pub fn args_descriptor(&self) -> String {
        let mut out = String::new();
        for param in &self.params {
            param.write_descriptor(&mut out);
        }
        out
    }

    /// Parse a method descriptor
    pub fn parse(descriptor: &str) -> Result<Self, BindError> {
        let bytes = descriptor.as_bytes();
        if bytes.first() != Some(&b'(') {
            return Err(BindError::InvalidDescriptor(format!(
                "method descriptor must start with '(': '{}'",
                descriptor
            )));
        }

        let mut pos = 1;
        let mut params = Vec::new();
        loop {
            match bytes.get(pos) {
                Some(b')') => break,
                Some(_) => {
                    let (param, next) = parse_type(bytes, pos, descriptor)?;
                    if param == JniType::Void {
                        return Err(BindError::InvalidDescriptor(format!(
                            "void parameter in '{}'",
                            descriptor
                        )));
                    }
                    params.push(param);
                    pos = next;
                }
                None => {
                    return Err(BindError::InvalidDescriptor(format!(
                        "missing ')' in '{}'",
                        descriptor
                    )))
                }
            }
        }

        let (ret, used) = parse_type(bytes, pos + 1, descriptor)?;
        if used != bytes.len() {
            return Err(BindError::InvalidDescriptor(format!(
                "trailing characters in '{}'",
                descriptor
            )));
        }
        Ok(Self { params, ret })
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor())
    }
}

/// How a declaration's name maps to an exported symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolConvention {
    /// `Java_<class>_<method>` with JNI escaping, long form on fallback
    Jni,
    /// The name is the symbol
    C,
}

/// A native function declaration: a contract whose body lives in a library
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeDecl {
    /// Owning class as a dotted binary name (`com.example.Outer$Inner`), JNI only
    pub class: Option<String>,
    /// Method or symbol name
    pub name: String,
    pub signature: MethodSignature,
    pub convention: SymbolConvention,
}

impl NativeDecl {
    /// JNI method declared on `class`
    pub fn jni(class: impl Into<String>, name: impl Into<String>, signature: MethodSignature) -> Self {
        Self {
            class: Some(class.into().replace('/', ".")),
            name: name.into(),
            signature,
            convention: SymbolConvention::Jni,
        }
    }

    /// JNI method from a descriptor string
    pub fn parse_jni(class: &str, name: &str, descriptor: &str) -> Result<Self, BindError> {
        Ok(Self::jni(class, name, MethodSignature::parse(descriptor)?))
    }

    /// Plain C export, looked up by its exact name
    pub fn c(name: impl Into<String>, signature: MethodSignature) -> Self {
        Self {
            class: None,
            name: name.into(),
            signature,
            convention: SymbolConvention::C,
        }
    }

    /// Candidate symbols in lookup order
    pub fn symbols(&self) -> Vec<String> {
        match (self.convention, &self.class) {
            (SymbolConvention::Jni, Some(class)) => vec![
                mangle::short_symbol(class, &self.name),
                mangle::long_symbol(class, &self.name, &self.signature),
            ],
            _ => vec![self.name.clone()],
        }
    }

    /// `com.example.Main.sayHello` for JNI, the bare name otherwise
    pub fn qualified_name(&self) -> String {
        match &self.class {
            Some(class) => format!("{}.{}", class, self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for NativeDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.qualified_name(), self.signature)
    }
}
