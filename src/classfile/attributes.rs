//! Typed views over the attribute payloads the rewriting passes care about.
//!
//! Only three attributes ever need decoding: `Code` (to scan instruction
//! bodies and to reach the local-variable tables nested inside it),
//! `InnerClasses` (to repair simple inner names after renaming) and
//! `LocalVariableTable`/`LocalVariableTypeTable` (to rewrite descriptors and
//! variable names). Everything else is carried as opaque bytes.

use crate::{
    classfile::{
        parser::{parse_attributes, Parser},
        writer::write_attributes,
        AttributeInfo, ConstantPool,
    },
    Result,
};

/// Attribute name of the `Code` attribute.
pub const CODE: &str = "Code";
/// Attribute name of the `InnerClasses` attribute.
pub const INNER_CLASSES: &str = "InnerClasses";
/// Attribute name of the `LocalVariableTable` attribute.
pub const LOCAL_VARIABLE_TABLE: &str = "LocalVariableTable";
/// Attribute name of the `LocalVariableTypeTable` attribute.
pub const LOCAL_VARIABLE_TYPE_TABLE: &str = "LocalVariableTypeTable";
/// Attribute name of the `Signature` attribute.
pub const SIGNATURE: &str = "Signature";

/// Decoded form of a `Code` attribute.
///
/// The instruction bytes themselves are never rewritten (see the constant pool
/// discipline in [`crate::classfile::pool`]); the decoded form exists so the
/// synthetic-member heuristics can scan them and so the nested local-variable
/// tables can be rewritten and the attribute re-serialized.
#[derive(Debug, Clone)]
pub struct CodeAttribute {
    /// Operand stack depth limit.
    pub max_stack: u16,
    /// Local variable slot count.
    pub max_locals: u16,
    /// Raw instruction bytes.
    pub code: Vec<u8>,
    /// Exception handler table.
    pub exception_table: Vec<ExceptionHandler>,
    /// Attributes nested inside the `Code` attribute.
    pub attributes: Vec<AttributeInfo>,
}

/// One exception handler range in a `Code` attribute.
#[derive(Debug, Clone)]
pub struct ExceptionHandler {
    /// Start of the protected range.
    pub start_pc: u16,
    /// End of the protected range, exclusive.
    pub end_pc: u16,
    /// Handler entry point.
    pub handler_pc: u16,
    /// Pool index of the caught class, 0 for catch-all.
    pub catch_type: u16,
}

impl CodeAttribute {
    /// Decodes a `Code` attribute payload.
    pub fn parse(info: &[u8]) -> Result<Self> {
        let mut parser = Parser::new(info);
        let max_stack = parser.read_u16()?;
        let max_locals = parser.read_u16()?;
        let code_length = parser.read_u32()?;
        let code = parser.read_bytes(code_length as usize)?.to_vec();
        let handler_count = parser.read_u16()?;
        let mut exception_table = Vec::with_capacity(handler_count as usize);
        for _ in 0..handler_count {
            exception_table.push(ExceptionHandler {
                start_pc: parser.read_u16()?,
                end_pc: parser.read_u16()?,
                handler_pc: parser.read_u16()?,
                catch_type: parser.read_u16()?,
            });
        }
        let attributes = parse_attributes(&mut parser)?;
        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    /// Re-serializes the attribute payload.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.code.len() + 64);
        out.extend_from_slice(&self.max_stack.to_be_bytes());
        out.extend_from_slice(&self.max_locals.to_be_bytes());
        out.extend_from_slice(&(self.code.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.code);
        out.extend_from_slice(&(self.exception_table.len() as u16).to_be_bytes());
        for handler in &self.exception_table {
            out.extend_from_slice(&handler.start_pc.to_be_bytes());
            out.extend_from_slice(&handler.end_pc.to_be_bytes());
            out.extend_from_slice(&handler.handler_pc.to_be_bytes());
            out.extend_from_slice(&handler.catch_type.to_be_bytes());
        }
        write_attributes(&mut out, &self.attributes);
        out
    }
}

/// Decoded form of an `InnerClasses` attribute.
#[derive(Debug, Clone)]
pub struct InnerClassesAttribute {
    /// The nesting records.
    pub entries: Vec<InnerClassEntry>,
}

/// One record of an `InnerClasses` attribute.
#[derive(Debug, Clone)]
pub struct InnerClassEntry {
    /// Pool index of the nested class.
    pub inner_class_info_index: u16,
    /// Pool index of the enclosing class, 0 when not a member class.
    pub outer_class_info_index: u16,
    /// Pool index of the simple source name `Utf8`, 0 for anonymous classes.
    pub inner_name_index: u16,
    /// Access flags of the nested class as declared in source.
    pub inner_class_access_flags: u16,
}

impl InnerClassesAttribute {
    /// Decodes an `InnerClasses` attribute payload.
    pub fn parse(info: &[u8]) -> Result<Self> {
        let mut parser = Parser::new(info);
        let count = parser.read_u16()?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push(InnerClassEntry {
                inner_class_info_index: parser.read_u16()?,
                outer_class_info_index: parser.read_u16()?,
                inner_name_index: parser.read_u16()?,
                inner_class_access_flags: parser.read_u16()?,
            });
        }
        Ok(InnerClassesAttribute { entries })
    }

    /// Re-serializes the attribute payload.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.entries.len() * 8);
        out.extend_from_slice(&(self.entries.len() as u16).to_be_bytes());
        for entry in &self.entries {
            out.extend_from_slice(&entry.inner_class_info_index.to_be_bytes());
            out.extend_from_slice(&entry.outer_class_info_index.to_be_bytes());
            out.extend_from_slice(&entry.inner_name_index.to_be_bytes());
            out.extend_from_slice(&entry.inner_class_access_flags.to_be_bytes());
        }
        out
    }
}

/// Decoded form of a `LocalVariableTable` or `LocalVariableTypeTable`
/// attribute. The two share a layout; for the type table the
/// `descriptor_index` slot holds a generic signature instead.
#[derive(Debug, Clone)]
pub struct LocalVariableTable {
    /// The variable records.
    pub entries: Vec<LocalVariableEntry>,
}

/// One record of a local-variable table.
#[derive(Debug, Clone)]
pub struct LocalVariableEntry {
    /// Start of the variable's live range.
    pub start_pc: u16,
    /// Length of the live range.
    pub length: u16,
    /// Pool index of the variable name `Utf8`.
    pub name_index: u16,
    /// Pool index of the descriptor (or signature) `Utf8`.
    pub descriptor_index: u16,
    /// Local variable slot.
    pub index: u16,
}

impl LocalVariableTable {
    /// Decodes a local-variable table payload.
    pub fn parse(info: &[u8]) -> Result<Self> {
        let mut parser = Parser::new(info);
        let count = parser.read_u16()?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push(LocalVariableEntry {
                start_pc: parser.read_u16()?,
                length: parser.read_u16()?,
                name_index: parser.read_u16()?,
                descriptor_index: parser.read_u16()?,
                index: parser.read_u16()?,
            });
        }
        Ok(LocalVariableTable { entries })
    }

    /// Re-serializes the attribute payload.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.entries.len() * 10);
        out.extend_from_slice(&(self.entries.len() as u16).to_be_bytes());
        for entry in &self.entries {
            out.extend_from_slice(&entry.start_pc.to_be_bytes());
            out.extend_from_slice(&entry.length.to_be_bytes());
            out.extend_from_slice(&entry.name_index.to_be_bytes());
            out.extend_from_slice(&entry.descriptor_index.to_be_bytes());
            out.extend_from_slice(&entry.index.to_be_bytes());
        }
        out
    }
}

/// Reads the `Utf8` index stored in a `Signature` attribute payload.
pub fn signature_index(info: &[u8]) -> Result<u16> {
    Parser::new(info).read_u16()
}

/// Finds the first attribute with the given name in a list.
pub fn find<'a>(
    attributes: &'a [AttributeInfo],
    pool: &ConstantPool,
    name: &str,
) -> Result<Option<&'a AttributeInfo>> {
    for attribute in attributes {
        if attribute.name(pool)? == name {
            return Ok(Some(attribute));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_attribute_round_trip() {
        let code = CodeAttribute {
            max_stack: 2,
            max_locals: 3,
            code: vec![0x2a, 0xb1],
            exception_table: vec![ExceptionHandler {
                start_pc: 0,
                end_pc: 1,
                handler_pc: 1,
                catch_type: 0,
            }],
            attributes: Vec::new(),
        };
        let bytes = code.to_bytes();
        let reparsed = CodeAttribute::parse(&bytes).unwrap();
        assert_eq!(reparsed.max_stack, 2);
        assert_eq!(reparsed.max_locals, 3);
        assert_eq!(reparsed.code, vec![0x2a, 0xb1]);
        assert_eq!(reparsed.exception_table.len(), 1);
        assert_eq!(reparsed.to_bytes(), bytes);
    }

    #[test]
    fn inner_classes_round_trip() {
        let attribute = InnerClassesAttribute {
            entries: vec![InnerClassEntry {
                inner_class_info_index: 5,
                outer_class_info_index: 3,
                inner_name_index: 7,
                inner_class_access_flags: 0x0001,
            }],
        };
        let bytes = attribute.to_bytes();
        let reparsed = InnerClassesAttribute::parse(&bytes).unwrap();
        assert_eq!(reparsed.entries.len(), 1);
        assert_eq!(reparsed.entries[0].inner_name_index, 7);
        assert_eq!(reparsed.to_bytes(), bytes);
    }
}
