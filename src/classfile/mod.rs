//! Structural classfile model.
//!
//! A [`ClassFile`] is the parsed form of one class payload: version, constant
//! pool, access flags, member tables and attributes. The model is deliberately
//! shallow — attribute payloads stay as raw bytes until a rewriting pass needs
//! to look inside them through the typed views in [`attributes`] — so that
//! everything the passes do not understand round-trips byte-for-byte.
//!
//! Rewriting is pure: the passes in [`crate::rewrite`] take a `&ClassFile` and
//! produce a new one, never mutating during traversal. The append-only constant
//! pool discipline (see [`pool`]) guarantees the bytecode inside `Code`
//! attributes stays valid without being touched.

pub mod access;
pub mod attributes;
pub mod code;
pub mod descriptor;
pub mod parser;
pub mod pool;
mod writer;

pub use access::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};
pub use parser::Parser;
pub use pool::{ConstantPool, CpEntry};

use crate::Result;

/// Name of the static initializer method.
pub const CLINIT_NAME: &str = "<clinit>";
/// Descriptor of the static initializer method.
pub const CLINIT_DESCRIPTOR: &str = "()V";

/// A parsed classfile.
#[derive(Debug, Clone)]
pub struct ClassFile {
    /// Minor format version.
    pub minor_version: u16,
    /// Major format version.
    pub major_version: u16,
    /// The constant pool.
    pub pool: ConstantPool,
    /// Raw class access flag word, see [`ClassAccessFlags`].
    pub access_flags: u16,
    /// Pool index of this class's `Class` entry.
    pub this_class: u16,
    /// Pool index of the superclass `Class` entry, 0 for `java/lang/Object`.
    pub super_class: u16,
    /// Pool indices of the directly implemented interfaces.
    pub interfaces: Vec<u16>,
    /// Declared fields.
    pub fields: Vec<MemberInfo>,
    /// Declared methods.
    pub methods: Vec<MemberInfo>,
    /// Class-level attributes.
    pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    /// Parses a class payload into its structural form.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotAClass`] when the magic number is missing and
    /// [`crate::Error::Malformed`]/[`crate::Error::OutOfBounds`] for structural
    /// damage.
    pub fn parse(data: &[u8]) -> Result<Self> {
        parser::parse_class(data)
    }

    /// Serializes the structural form back into a class payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        writer::write_class(self)
    }

    /// The internal (slash-separated) binary name of this class.
    pub fn this_class_name(&self) -> Result<&str> {
        self.pool.class_name(self.this_class)
    }

    /// The internal name of the direct superclass, `None` for `java/lang/Object`.
    pub fn super_class_name(&self) -> Result<Option<&str>> {
        if self.super_class == 0 {
            return Ok(None);
        }
        Ok(Some(self.pool.class_name(self.super_class)?))
    }

    /// The internal names of the directly implemented interfaces.
    pub fn interface_names(&self) -> Result<Vec<&str>> {
        self.interfaces
            .iter()
            .map(|&index| self.pool.class_name(index))
            .collect()
    }

    /// Class access flags in typed form.
    #[must_use]
    pub fn flags(&self) -> ClassAccessFlags {
        ClassAccessFlags::from_bits_retain(self.access_flags)
    }

    /// Finds a declared method by name and descriptor.
    pub fn find_method(&self, name: &str, descriptor: &str) -> Result<Option<&MemberInfo>> {
        Self::find_member(&self.methods, &self.pool, name, descriptor)
    }

    /// Finds a declared field by name and descriptor.
    pub fn find_field(&self, name: &str, descriptor: &str) -> Result<Option<&MemberInfo>> {
        Self::find_member(&self.fields, &self.pool, name, descriptor)
    }

    fn find_member<'a>(
        members: &'a [MemberInfo],
        pool: &ConstantPool,
        name: &str,
        descriptor: &str,
    ) -> Result<Option<&'a MemberInfo>> {
        for member in members {
            if pool.utf8(member.name_index)? == name
                && pool.utf8(member.descriptor_index)? == descriptor
            {
                return Ok(Some(member));
            }
        }
        Ok(None)
    }
}

/// A declared field or method.
#[derive(Debug, Clone)]
pub struct MemberInfo {
    /// Raw access flag word; interpret through [`FieldAccessFlags`] or
    /// [`MethodAccessFlags`] depending on the owning table.
    pub access_flags: u16,
    /// Pool index of the member name `Utf8`.
    pub name_index: u16,
    /// Pool index of the descriptor `Utf8`.
    pub descriptor_index: u16,
    /// Member-level attributes.
    pub attributes: Vec<AttributeInfo>,
}

impl MemberInfo {
    /// The member's name.
    pub fn name<'a>(&self, pool: &'a ConstantPool) -> Result<&'a str> {
        pool.utf8(self.name_index)
    }

    /// The member's descriptor.
    pub fn descriptor<'a>(&self, pool: &'a ConstantPool) -> Result<&'a str> {
        pool.utf8(self.descriptor_index)
    }

    /// Finds the first attribute with the given name.
    pub fn attribute<'a>(
        &'a self,
        pool: &ConstantPool,
        name: &str,
    ) -> Result<Option<&'a AttributeInfo>> {
        for attribute in &self.attributes {
            if pool.utf8(attribute.name_index)? == name {
                return Ok(Some(attribute));
            }
        }
        Ok(None)
    }
}

/// An attribute with its payload kept as raw bytes.
#[derive(Debug, Clone)]
pub struct AttributeInfo {
    /// Pool index of the attribute name `Utf8`.
    pub name_index: u16,
    /// Raw attribute payload.
    pub info: Vec<u8>,
}

impl AttributeInfo {
    /// The attribute's name.
    pub fn name<'a>(&self, pool: &'a ConstantPool) -> Result<&'a str> {
        pool.utf8(self.name_index)
    }
}
