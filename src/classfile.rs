//! Class file reading.
//!
//! Two entry points share one reader: [`parse_header`] stops after the
//! interface table and is what indexing uses, [`parse_class`] continues past
//! fields and methods to pick up the `InnerClasses` and `SourceFile`
//! attributes for callers that need declared nested-class modifiers.
//!
//! Referenced names are returned as written in the constant pool, translated
//! from internal form (`a/b/C`) to qualified form (`a.b.C`). Nothing here
//! looks them up anywhere.

use thiserror::Error;

const MAGIC: u32 = 0xCAFE_BABE;

/// Internal name of the universal root type.
pub const ROOT_INTERNAL_NAME: &str = "java/lang/Object";

/// Set on `module-info.class`, which describes a module rather than a type.
pub const ACC_MODULE: u16 = 0x8000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassFileError {
    #[error("unexpected end of class file")]
    UnexpectedEof,
    #[error("invalid class file magic {found:#010x}")]
    InvalidMagic { found: u32 },
    #[error("unsupported constant pool tag {tag}")]
    UnsupportedConstant { tag: u8 },
    #[error("invalid constant pool index {index}")]
    InvalidConstantIndex { index: u16 },
    #[error("malformed modified UTF-8 in constant pool entry {index}")]
    InvalidUtf8 { index: u16 },
}

/// Everything the fixed part of a class file says about the class itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHeader {
    pub major_version: u16,
    pub minor_version: u16,
    pub access_flags: u16,
    pub name: String,
    pub superclass_name: Option<String>,
    pub interface_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClassEntry {
    pub inner_name: String,
    pub outer_name: Option<String>,
    pub simple_name: Option<String>,
    pub access_flags: u16,
}

/// A class file read to the end: the header plus the class-level attributes
/// that carry metadata the header does not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassBody {
    pub header: ClassHeader,
    pub field_count: u16,
    pub method_count: u16,
    pub inner_classes: Vec<InnerClassEntry>,
    pub source_file: Option<String>,
}

impl ClassBody {
    /// The `InnerClasses` entry describing this class, present iff it is nested.
    pub fn own_inner_entry(&self) -> Option<&InnerClassEntry> {
        self.inner_classes
            .iter()
            .find(|e| e.inner_name == self.header.name)
    }
}

pub fn parse_header(bytes: &[u8]) -> Result<ClassHeader, ClassFileError> {
    let mut reader = ClassReader::new(bytes);
    let (header, _) = read_header(&mut reader)?;
    Ok(header)
}

pub fn parse_class(bytes: &[u8]) -> Result<ClassBody, ClassFileError> {
    let mut reader = ClassReader::new(bytes);
    let (header, pool) = read_header(&mut reader)?;

    let field_count = reader.read_u2()?;
    for _ in 0..field_count {
        skip_member(&mut reader)?;
    }
    let method_count = reader.read_u2()?;
    for _ in 0..method_count {
        skip_member(&mut reader)?;
    }

    let mut inner_classes = Vec::new();
    let mut source_file = None;
    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let body = reader.read_slice(length)?;
        match pool.utf8(name_index)? {
            "InnerClasses" => {
                let mut sub = ClassReader::new(body);
                let count = sub.read_u2()?;
                for _ in 0..count {
                    let inner_index = sub.read_u2()?;
                    let outer_index = sub.read_u2()?;
                    let simple_index = sub.read_u2()?;
                    let access_flags = sub.read_u2()?;
                    inner_classes.push(InnerClassEntry {
                        inner_name: internal_to_qualified(pool.class_name(inner_index)?),
                        outer_name: pool
                            .optional_class_name(outer_index)?
                            .map(internal_to_qualified),
                        simple_name: match simple_index {
                            0 => None,
                            i => Some(pool.utf8(i)?.to_string()),
                        },
                        access_flags,
                    });
                }
            }
            "SourceFile" => {
                let mut sub = ClassReader::new(body);
                source_file = Some(pool.utf8(sub.read_u2()?)?.to_string());
            }
            _ => {}
        }
    }

    Ok(ClassBody {
        header,
        field_count,
        method_count,
        inner_classes,
        source_file,
    })
}

pub fn internal_to_qualified(internal: &str) -> String {
    internal.replace('/', ".")
}

fn read_header(reader: &mut ClassReader<'_>) -> Result<(ClassHeader, ConstantPool), ClassFileError> {
    reader.expect_magic()?;
    let minor_version = reader.read_u2()?;
    let major_version = reader.read_u2()?;
    let pool = ConstantPool::parse(reader)?;

    let access_flags = reader.read_u2()?;
    let this_class = reader.read_u2()?;
    let super_class = reader.read_u2()?;

    let interfaces_count = reader.read_u2()?;
    let mut interface_names = Vec::with_capacity(interfaces_count as usize);
    for _ in 0..interfaces_count {
        let index = reader.read_u2()?;
        interface_names.push(internal_to_qualified(pool.class_name(index)?));
    }

    let superclass_name = pool
        .optional_class_name(super_class)?
        .filter(|name| *name != ROOT_INTERNAL_NAME)
        .map(internal_to_qualified);

    Ok((
        ClassHeader {
            major_version,
            minor_version,
            access_flags,
            name: internal_to_qualified(pool.class_name(this_class)?),
            superclass_name,
            interface_names,
        },
        pool,
    ))
}

fn skip_member(reader: &mut ClassReader<'_>) -> Result<(), ClassFileError> {
    reader.skip(6)?; // access_flags, name_index, descriptor_index
    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        reader.skip(2)?;
        let length = reader.read_u4()? as usize;
        reader.skip(length)?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
enum Constant {
    Utf8(String),
    Class { name_index: u16 },
    Other,
    Unusable,
}

struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    fn parse(reader: &mut ClassReader<'_>) -> Result<Self, ClassFileError> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable);

        let mut index = 1;
        while index < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                1 => {
                    let length = reader.read_u2()? as usize;
                    let bytes = reader.read_slice(length)?;
                    let value = cesu8::from_java_cesu8(bytes).map_err(|_| ClassFileError::InvalidUtf8 {
                        index: index as u16,
                    })?;
                    Constant::Utf8(value.into_owned())
                }
                7 => Constant::Class {
                    name_index: reader.read_u2()?,
                },
                // Long and Double occupy two slots.
                5 | 6 => {
                    reader.skip(8)?;
                    entries.push(Constant::Other);
                    index += 1;
                    Constant::Unusable
                }
                3 | 4 | 9 | 10 | 11 | 12 | 17 | 18 => {
                    reader.skip(4)?;
                    Constant::Other
                }
                15 => {
                    reader.skip(3)?;
                    Constant::Other
                }
                8 | 16 | 19 | 20 => {
                    reader.skip(2)?;
                    Constant::Other
                }
                other => return Err(ClassFileError::UnsupportedConstant { tag: other }),
            };
            entries.push(entry);
            index += 1;
        }

        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Result<&Constant, ClassFileError> {
        self.entries
            .get(index as usize)
            .ok_or(ClassFileError::InvalidConstantIndex { index })
    }

    fn utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value.as_str()),
            _ => Err(ClassFileError::InvalidConstantIndex { index }),
        }
    }

    fn class_name(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            _ => Err(ClassFileError::InvalidConstantIndex { index }),
        }
    }

    /// Index 0 means "none" wherever a class reference is optional.
    fn optional_class_name(&self, index: u16) -> Result<Option<&str>, ClassFileError> {
        if index == 0 {
            return Ok(None);
        }
        self.class_name(index).map(Some)
    }
}

struct ClassReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ClassReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn expect_magic(&mut self) -> Result<(), ClassFileError> {
        let found = self.read_u4()?;
        if found != MAGIC {
            return Err(ClassFileError::InvalidMagic { found });
        }
        Ok(())
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], ClassFileError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(ClassFileError::UnexpectedEof)?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<(), ClassFileError> {
        self.read_slice(len).map(|_| ())
    }

    fn read_u1(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.read_slice(1)?[0])
    }

    fn read_u2(&mut self) -> Result<u16, ClassFileError> {
        let b = self.read_slice(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u4(&mut self) -> Result<u32, ClassFileError> {
        let b = self.read_slice(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}
