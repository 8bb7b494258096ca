//! Cursor-based classfile parsing.
//!
//! The [`Parser`] is a bounds-checked big-endian cursor over a single class
//! payload; [`ClassFile::parse`](crate::classfile::ClassFile::parse) drives it
//! through the fixed classfile layout. Attribute payloads are kept as raw bytes
//! and only decoded by the typed views in
//! [`attributes`](crate::classfile::attributes) when a pass needs to look
//! inside them.

use crate::{
    classfile::{
        pool::{ConstantPool, CpEntry},
        AttributeInfo, ClassFile, MemberInfo,
    },
    Error, Result,
};

/// Classfile magic number, `0xCAFEBABE`.
pub(crate) const MAGIC: u32 = 0xCAFE_BABE;

/// A bounds-checked big-endian cursor over a classfile payload.
///
/// All read operations validate data availability before touching the buffer,
/// so truncated or corrupted payloads surface as [`Error::OutOfBounds`] rather
/// than panics.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`Parser`] over a byte slice.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Current cursor position.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        let byte = *self.data.get(self.position).ok_or(Error::OutOfBounds)?;
        self.position += 1;
        Ok(byte)
    }

    /// Reads a big-endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a big-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a big-endian `u64`.
    pub fn read_u64(&mut self) -> Result<u64> {
        let high = u64::from(self.read_u32()?);
        let low = u64::from(self.read_u32()?);
        Ok((high << 32) | low)
    }

    /// Reads `length` raw bytes.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(length)
            .ok_or(Error::OutOfBounds)?;
        let slice = self.data.get(self.position..end).ok_or(Error::OutOfBounds)?;
        self.position = end;
        Ok(slice)
    }
}

pub(crate) fn parse_class(data: &[u8]) -> Result<ClassFile> {
    let mut parser = Parser::new(data);
    if parser.read_u32()? != MAGIC {
        return Err(Error::NotAClass);
    }
    let minor_version = parser.read_u16()?;
    let major_version = parser.read_u16()?;
    let pool = parse_pool(&mut parser)?;
    let access_flags = parser.read_u16()?;
    let this_class = parser.read_u16()?;
    let super_class = parser.read_u16()?;

    let interface_count = parser.read_u16()?;
    let mut interfaces = Vec::with_capacity(interface_count as usize);
    for _ in 0..interface_count {
        interfaces.push(parser.read_u16()?);
    }

    let fields = parse_members(&mut parser)?;
    let methods = parse_members(&mut parser)?;
    let attributes = parse_attributes(&mut parser)?;

    if parser.has_more_data() {
        return Err(malformed_error!(
            "Trailing data after class structure at offset {}",
            parser.position()
        ));
    }

    Ok(ClassFile {
        minor_version,
        major_version,
        pool,
        access_flags,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        attributes,
    })
}

fn parse_pool(parser: &mut Parser) -> Result<ConstantPool> {
    let count = parser.read_u16()?;
    if count == 0 {
        return Err(malformed_error!("Constant pool count of zero"));
    }
    let mut entries = Vec::with_capacity(count as usize);
    entries.push(CpEntry::Unusable);
    while entries.len() < count as usize {
        let tag = parser.read_u8()?;
        let entry = match tag {
            1 => {
                let length = parser.read_u16()?;
                CpEntry::Utf8(parser.read_bytes(length as usize)?.to_vec())
            }
            3 => CpEntry::Integer(parser.read_u32()?),
            4 => CpEntry::Float(parser.read_u32()?),
            5 => CpEntry::Long(parser.read_u64()?),
            6 => CpEntry::Double(parser.read_u64()?),
            7 => CpEntry::Class {
                name_index: parser.read_u16()?,
            },
            8 => CpEntry::String {
                string_index: parser.read_u16()?,
            },
            9 => CpEntry::Fieldref {
                class_index: parser.read_u16()?,
                name_and_type_index: parser.read_u16()?,
            },
            10 => CpEntry::Methodref {
                class_index: parser.read_u16()?,
                name_and_type_index: parser.read_u16()?,
            },
            11 => CpEntry::InterfaceMethodref {
                class_index: parser.read_u16()?,
                name_and_type_index: parser.read_u16()?,
            },
            12 => CpEntry::NameAndType {
                name_index: parser.read_u16()?,
                descriptor_index: parser.read_u16()?,
            },
            15 => CpEntry::MethodHandle {
                reference_kind: parser.read_u8()?,
                reference_index: parser.read_u16()?,
            },
            16 => CpEntry::MethodType {
                descriptor_index: parser.read_u16()?,
            },
            17 => CpEntry::Dynamic {
                bootstrap_method_attr_index: parser.read_u16()?,
                name_and_type_index: parser.read_u16()?,
            },
            18 => CpEntry::InvokeDynamic {
                bootstrap_method_attr_index: parser.read_u16()?,
                name_and_type_index: parser.read_u16()?,
            },
            19 => CpEntry::Module {
                name_index: parser.read_u16()?,
            },
            20 => CpEntry::Package {
                name_index: parser.read_u16()?,
            },
            _ => {
                return Err(malformed_error!(
                    "Unknown constant pool tag {} at slot {}",
                    tag,
                    entries.len()
                ))
            }
        };
        let width = entry.slot_width();
        entries.push(entry);
        if width == 2 {
            entries.push(CpEntry::Unusable);
        }
    }
    if entries.len() != count as usize {
        // A Long/Double in the final slot pushed the phantom past the count.
        return Err(malformed_error!(
            "Constant pool slot overrun: {} entries, count {}",
            entries.len(),
            count
        ));
    }
    Ok(ConstantPool::new(entries))
}

fn parse_members(parser: &mut Parser) -> Result<Vec<MemberInfo>> {
    let count = parser.read_u16()?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let access_flags = parser.read_u16()?;
        let name_index = parser.read_u16()?;
        let descriptor_index = parser.read_u16()?;
        let attributes = parse_attributes(parser)?;
        members.push(MemberInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        });
    }
    Ok(members)
}

pub(crate) fn parse_attributes(parser: &mut Parser) -> Result<Vec<AttributeInfo>> {
    let count = parser.read_u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_index = parser.read_u16()?;
        let length = parser.read_u32()?;
        let info = parser.read_bytes(length as usize)?.to_vec();
        attributes.push(AttributeInfo { name_index, info });
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_reads_big_endian() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_u16().unwrap(), 0x0102);
        assert_eq!(parser.read_u16().unwrap(), 0x0304);
        assert!(parser.has_more_data());
        assert_eq!(parser.read_u8().unwrap(), 0x05);
        assert!(!parser.has_more_data());
        assert!(matches!(parser.read_u8(), Err(Error::OutOfBounds)));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let data = [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x00];
        assert!(matches!(parse_class(&data), Err(Error::NotAClass)));
    }
}
