//! Class name and descriptor conversions.
//!
//! Three spellings of a class name meet in this crate:
//!
//! | Form | Example | Used by |
//! |------|---------|---------|
//! | binary | `com.example.Foo$Bar` | callers, `ClassLoader.loadClass` |
//! | internal | `com/example/Foo$Bar` | class files, JNI `FindClass` |
//! | resource | `com/example/Foo$Bar.class` | class path entries |

use crate::error::ConstructionError;

/// `com.example.Foo` -> `com/example/Foo`
pub fn to_internal_name(binary_name: &str) -> String {
    binary_name.replace('.', "/")
}

/// `com/example/Foo` -> `com.example.Foo`
pub fn to_binary_name(internal_name: &str) -> String {
    internal_name.replace('/', ".")
}

/// `com.example.Foo` -> `com/example/Foo.class`
pub fn resource_path(binary_name: &str) -> String {
    let mut path = to_internal_name(binary_name);
    path.push_str(".class");
    path
}

fn primitive_descriptor(name: &str) -> Option<char> {
    Some(match name {
        "boolean" => 'Z',
        "byte" => 'B',
        "char" => 'C',
        "short" => 'S',
        "int" => 'I',
        "long" => 'J',
        "float" => 'F',
        "double" => 'D',
        _ => return None,
    })
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_valid_class_name(name: &str) -> bool {
    !name.is_empty() && name.split('.').all(|part| !part.is_empty() && part.chars().all(is_identifier_part))
}

/// Converts a Java type name into a JVM field descriptor.
///
/// Accepts primitive names (`int`), class names (`java.lang.String`), source
/// array syntax (`java.lang.String[]`, `int[][]`) and the `Class.getName()`
/// form of arrays (`[Ljava.lang.String;`, `[I`).
pub fn field_descriptor(type_name: &str) -> Result<String, ConstructionError> {
    let invalid = || ConstructionError::InvalidType { type_name: type_name.to_string() };
    let trimmed = type_name.trim();

    if trimmed.starts_with('[') {
        let element = trimmed.trim_start_matches('[');
        let valid = match element.chars().next() {
            Some('L') => element.ends_with(';') && is_valid_class_name(&element[1..element.len() - 1]),
            Some(c) => element.len() == 1 && "ZBCSIJFD".contains(c),
            None => false,
        };
        return if valid { Ok(trimmed.replace('.', "/")) } else { Err(invalid()) };
    }

    let mut base = trimmed;
    let mut dims = 0;
    while let Some(stripped) = base.strip_suffix("[]") {
        base = stripped.trim_end();
        dims += 1;
    }

    let mut descriptor = "[".repeat(dims);
    match primitive_descriptor(base) {
        Some(c) => descriptor.push(c),
        None if is_valid_class_name(base) => {
            descriptor.push('L');
            descriptor.push_str(&to_internal_name(base));
            descriptor.push(';');
        }
        None => return Err(invalid()),
    }
    Ok(descriptor)
}

/// A constructor picked by its parameter types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorSignature {
    parameters: Vec<String>,
    descriptor: String,
}

impl ConstructorSignature {
    /// The no-argument constructor, `()V`.
    pub fn no_args() -> Self {
        ConstructorSignature { parameters: Vec::new(), descriptor: "()V".to_string() }
    }

    pub fn from_type_names<S: AsRef<str>>(type_names: &[S]) -> Result<Self, ConstructionError> {
        let parameters = type_names
            .iter()
            .map(|t| field_descriptor(t.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let descriptor = format!("({})V", parameters.concat());
        Ok(ConstructorSignature { parameters, descriptor })
    }

    /// Method descriptor, e.g. `(Ljava/lang/String;I)V`.
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Field descriptors of the parameters, in order.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

impl Default for ConstructorSignature {
    fn default() -> Self {
        Self::no_args()
    }
}
