//! Class file header reader.
//!
//! Pools never need a full class model: they have to know which class a file
//! declares, which classes it nests and which constructors it offers. This
//! module scans a `.class` file for exactly that. The constant pool is read in
//! full (entry sizes vary by tag), fields and methods keep only their names and
//! descriptors, and every attribute except `InnerClasses` and `NestHost` is
//! skipped by length.

use std::fmt;

const MAGIC: u32 = 0xCAFEBABE;

/// What a pool learns from a class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHeader {
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,
    /// Internal name, e.g. `com/example/Foo$Bar`.
    pub this_class: String,
    /// `None` only for `java/lang/Object` and module-info.
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub methods: Vec<MemberRef>,
    pub inner_classes: Vec<InnerClassEntry>,
    pub nest_host: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
}

/// One row of the `InnerClasses` attribute, with indices already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClassEntry {
    pub inner_class: String,
    /// `None` for local and anonymous classes.
    pub outer_class: Option<String>,
    /// `None` for anonymous classes.
    pub inner_name: Option<String>,
    pub access_flags: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassFileError {
    UnexpectedEof,
    InvalidMagic(u32),
    InvalidConstantPoolIndex(u16),
    InvalidConstantPoolTag(u8),
    InvalidAttribute(String),
    InvalidModifiedUtf8(u16),
}

impl fmt::Display for ClassFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassFileError::UnexpectedEof => write!(f, "unexpected end of file"),
            ClassFileError::InvalidMagic(m) => write!(f, "invalid magic: {m:#x}"),
            ClassFileError::InvalidConstantPoolIndex(i) => write!(f, "invalid constant pool index: {i}"),
            ClassFileError::InvalidConstantPoolTag(t) => write!(f, "invalid constant pool tag: {t}"),
            ClassFileError::InvalidAttribute(name) => write!(f, "invalid attribute: {name}"),
            ClassFileError::InvalidModifiedUtf8(i) => write!(f, "invalid modified UTF-8 in constant {i}"),
        }
    }
}

impl std::error::Error for ClassFileError {}

/// The constant pool entries a header scan resolves. Everything else is kept
/// as a placeholder so indices stay aligned.
#[derive(Debug, Clone)]
enum CpEntry {
    Utf8(String),
    Class { name_index: u16 },
    Other,
}

struct ConstantPool {
    entries: Vec<Option<CpEntry>>,
}

impl ConstantPool {
    fn utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.entries.get(index as usize) {
            Some(Some(CpEntry::Utf8(s))) => Ok(s.as_str()),
            _ => Err(ClassFileError::InvalidConstantPoolIndex(index)),
        }
    }

    fn class_name(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.entries.get(index as usize) {
            Some(Some(CpEntry::Class { name_index })) => self.utf8(*name_index),
            _ => Err(ClassFileError::InvalidConstantPoolIndex(index)),
        }
    }

    /// Index 0 means "absent" in several class file structures.
    fn optional_class_name(&self, index: u16) -> Result<Option<String>, ClassFileError> {
        if index == 0 {
            return Ok(None);
        }
        self.class_name(index).map(|s| Some(s.to_string()))
    }

    fn optional_utf8(&self, index: u16) -> Result<Option<String>, ClassFileError> {
        if index == 0 {
            return Ok(None);
        }
        self.utf8(index).map(|s| Some(s.to_string()))
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ClassFileError> {
        if self.remaining() < len {
            return Err(ClassFileError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<(), ClassFileError> {
        self.read_bytes(len).map(|_| ())
    }

    fn read_u1(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u2(&mut self) -> Result<u16, ClassFileError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u4(&mut self) -> Result<u32, ClassFileError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

impl ClassHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, ClassFileError> {
        let mut r = Reader::new(bytes);
        let magic = r.read_u4()?;
        if magic != MAGIC {
            return Err(ClassFileError::InvalidMagic(magic));
        }
        let minor_version = r.read_u2()?;
        let major_version = r.read_u2()?;
        let cp = parse_constant_pool(&mut r)?;

        let access_flags = r.read_u2()?;
        let this_class = cp.class_name(r.read_u2()?)?.to_string();
        let super_class = cp.optional_class_name(r.read_u2()?)?;

        let interfaces_count = r.read_u2()?;
        let mut interfaces = Vec::with_capacity(interfaces_count as usize);
        for _ in 0..interfaces_count {
            interfaces.push(cp.class_name(r.read_u2()?)?.to_string());
        }

        let fields_count = r.read_u2()?;
        for _ in 0..fields_count {
            parse_member(&mut r, &cp)?;
        }

        let methods_count = r.read_u2()?;
        let mut methods = Vec::with_capacity(methods_count as usize);
        for _ in 0..methods_count {
            methods.push(parse_member(&mut r, &cp)?);
        }

        let mut inner_classes = Vec::new();
        let mut nest_host = None;
        let attributes_count = r.read_u2()?;
        for _ in 0..attributes_count {
            let name_index = r.read_u2()?;
            let length = r.read_u4()? as usize;
            let name = cp.utf8(name_index)?;
            let mut sub = Reader::new(r.read_bytes(length)?);
            match name {
                "InnerClasses" => {
                    let num = sub.read_u2()?;
                    for _ in 0..num {
                        let inner = sub.read_u2()?;
                        let outer = sub.read_u2()?;
                        let inner_name = sub.read_u2()?;
                        let flags = sub.read_u2()?;
                        inner_classes.push(InnerClassEntry {
                            inner_class: cp.class_name(inner)?.to_string(),
                            outer_class: cp.optional_class_name(outer)?,
                            inner_name: cp.optional_utf8(inner_name)?,
                            access_flags: flags,
                        });
                    }
                }
                "NestHost" => {
                    nest_host = Some(cp.class_name(sub.read_u2()?)?.to_string());
                }
                _ => continue,
            }
            if sub.remaining() != 0 {
                return Err(ClassFileError::InvalidAttribute(name.to_string()));
            }
        }

        Ok(ClassHeader {
            minor_version,
            major_version,
            access_flags,
            this_class,
            super_class,
            interfaces,
            methods,
            inner_classes,
            nest_host,
        })
    }

    /// Internal names of the classes this class encloses, in declaration
    /// order.
    ///
    /// A row counts when its outer class is this class, or when it has no
    /// outer class (local or anonymous) and its binary name sits under this
    /// class's `$` prefix. Rows for enclosing classes and for unrelated
    /// member classes referenced from the constant pool are ignored.
    pub fn nested_classes(&self) -> Vec<String> {
        let prefix = format!("{}$", self.this_class);
        let mut nested: Vec<String> = Vec::new();
        for entry in &self.inner_classes {
            if entry.inner_class == self.this_class {
                continue;
            }
            let declared_here = match &entry.outer_class {
                Some(outer) => *outer == self.this_class,
                None => entry.inner_class.starts_with(&prefix),
            };
            if declared_here && !nested.contains(&entry.inner_class) {
                nested.push(entry.inner_class.clone());
            }
        }
        nested
    }

    /// Descriptors of every `<init>` method.
    pub fn constructors(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().filter(|m| m.name == "<init>").map(|m| m.descriptor.as_str())
    }
}

/// Decodes a `CONSTANT_Utf8` payload. Class files write NUL as `C0 80` and
/// supplementary characters as two 3-byte surrogates; plain UTF-8 is accepted
/// as is.
fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(text.to_string());
    }
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let continuation = |k: usize| bytes.get(i + k).copied().filter(|c| c & 0xC0 == 0x80).map(u16::from);
        match b {
            0x01..=0x7F => {
                units.push(u16::from(b));
                i += 1;
            }
            0xC0..=0xDF => {
                units.push((u16::from(b & 0x1F) << 6) | (continuation(1)? & 0x3F));
                i += 2;
            }
            0xE0..=0xEF => {
                units.push((u16::from(b & 0x0F) << 12) | ((continuation(1)? & 0x3F) << 6) | (continuation(2)? & 0x3F));
                i += 3;
            }
            _ => return None,
        }
    }
    // unpaired surrogates have no `String` form
    String::from_utf16(&units).ok()
}

fn parse_constant_pool(r: &mut Reader) -> Result<ConstantPool, ClassFileError> {
    let count = r.read_u2()? as usize;
    let mut entries: Vec<Option<CpEntry>> = Vec::with_capacity(count);
    entries.push(None); // index 0 is unused

    let mut i = 1;
    while i < count {
        let tag = r.read_u1()?;
        let entry = match tag {
            1 => {
                let len = r.read_u2()? as usize;
                let bytes = r.read_bytes(len)?;
                let text = decode_modified_utf8(bytes).ok_or(ClassFileError::InvalidModifiedUtf8(i as u16))?;
                CpEntry::Utf8(text)
            }
            7 => CpEntry::Class { name_index: r.read_u2()? },
            // Long and Double take two slots.
            5 | 6 => {
                r.skip(8)?;
                entries.push(Some(CpEntry::Other));
                entries.push(None);
                i += 2;
                continue;
            }
            3 | 4 | 9 | 10 | 11 | 12 | 17 | 18 => {
                r.skip(4)?;
                CpEntry::Other
            }
            15 => {
                r.skip(3)?;
                CpEntry::Other
            }
            8 | 16 | 19 | 20 => {
                r.skip(2)?;
                CpEntry::Other
            }
            _ => return Err(ClassFileError::InvalidConstantPoolTag(tag)),
        };
        entries.push(Some(entry));
        i += 1;
    }

    Ok(ConstantPool { entries })
}

fn parse_member(r: &mut Reader, cp: &ConstantPool) -> Result<MemberRef, ClassFileError> {
    let access_flags = r.read_u2()?;
    let name = cp.utf8(r.read_u2()?)?.to_string();
    let descriptor = cp.utf8(r.read_u2()?)?.to_string();
    let attributes_count = r.read_u2()?;
    for _ in 0..attributes_count {
        r.skip(2)?;
        let length = r.read_u4()? as usize;
        r.skip(length)?;
    }
    Ok(MemberRef { access_flags, name, descriptor })
}
