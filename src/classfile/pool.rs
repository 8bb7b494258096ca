//! Constant pool model with an append-only rewriting discipline.
//!
//! The pool is the only part of a classfile that symbol rewriting ever touches:
//! bytecode references `Fieldref`/`Methodref`/`Class` slots by index, so as long
//! as existing slots keep their indices, instruction bytes never need patching.
//! Rewrites therefore never mutate an existing `Utf8` or `NameAndType` entry
//! (either may be shared between unrelated roles, e.g. a string literal equal to
//! a class name); instead a new entry is appended and the referencing slot is
//! redirected to it. Appended entries are interned by content so repeated
//! rewrites of the same name do not grow the pool.

use std::collections::HashMap;

use crate::{Error, Result};

/// A single constant pool entry.
///
/// Numeric entries keep their raw big-endian payload bits so that parsing and
/// re-serialization round-trip exactly.
#[derive(Debug, Clone, PartialEq)]
pub enum CpEntry {
    /// Slot 0, and the phantom slot following each `Long`/`Double` entry.
    Unusable,
    /// Modified UTF-8 string data, kept as raw bytes. Names and descriptors are
    /// plain ASCII in practice, but string literals may use the full encoding,
    /// so the payload is not forced through `String`.
    Utf8(Vec<u8>),
    /// `CONSTANT_Integer`, raw payload bits.
    Integer(u32),
    /// `CONSTANT_Float`, raw payload bits.
    Float(u32),
    /// `CONSTANT_Long`, raw payload bits. Occupies two slots.
    Long(u64),
    /// `CONSTANT_Double`, raw payload bits. Occupies two slots.
    Double(u64),
    /// `CONSTANT_Class` referencing a `Utf8` holding the internal name.
    Class {
        /// Pool index of the `Utf8` name.
        name_index: u16,
    },
    /// `CONSTANT_String` referencing a `Utf8` literal. Never rewritten.
    String {
        /// Pool index of the `Utf8` literal.
        string_index: u16,
    },
    /// `CONSTANT_Fieldref`.
    Fieldref {
        /// Pool index of the owning `Class` entry.
        class_index: u16,
        /// Pool index of the `NameAndType` entry.
        name_and_type_index: u16,
    },
    /// `CONSTANT_Methodref`.
    Methodref {
        /// Pool index of the owning `Class` entry.
        class_index: u16,
        /// Pool index of the `NameAndType` entry.
        name_and_type_index: u16,
    },
    /// `CONSTANT_InterfaceMethodref`.
    InterfaceMethodref {
        /// Pool index of the owning `Class` entry.
        class_index: u16,
        /// Pool index of the `NameAndType` entry.
        name_and_type_index: u16,
    },
    /// `CONSTANT_NameAndType`.
    NameAndType {
        /// Pool index of the member name `Utf8`.
        name_index: u16,
        /// Pool index of the descriptor `Utf8`.
        descriptor_index: u16,
    },
    /// `CONSTANT_MethodHandle`.
    MethodHandle {
        /// Kind of the referenced member access.
        reference_kind: u8,
        /// Pool index of the referenced member entry.
        reference_index: u16,
    },
    /// `CONSTANT_MethodType`.
    MethodType {
        /// Pool index of the descriptor `Utf8`.
        descriptor_index: u16,
    },
    /// `CONSTANT_Dynamic`.
    Dynamic {
        /// Index into the `BootstrapMethods` attribute.
        bootstrap_method_attr_index: u16,
        /// Pool index of the `NameAndType` entry.
        name_and_type_index: u16,
    },
    /// `CONSTANT_InvokeDynamic`.
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute.
        bootstrap_method_attr_index: u16,
        /// Pool index of the `NameAndType` entry.
        name_and_type_index: u16,
    },
    /// `CONSTANT_Module`.
    Module {
        /// Pool index of the module name `Utf8`.
        name_index: u16,
    },
    /// `CONSTANT_Package`.
    Package {
        /// Pool index of the package name `Utf8`.
        name_index: u16,
    },
}

impl CpEntry {
    /// Number of pool slots this entry occupies (2 for `Long`/`Double`).
    #[must_use]
    pub fn slot_width(&self) -> u16 {
        match self {
            CpEntry::Long(_) | CpEntry::Double(_) => 2,
            _ => 1,
        }
    }
}

/// The constant pool of a single classfile.
///
/// Slot 0 is always [`CpEntry::Unusable`], matching the format's 1-based
/// indexing. Lookup of names and descriptors goes through the typed accessors,
/// which validate both the index and the entry kind.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<CpEntry>,
    /// Content interning for appended `Utf8` entries. Populated lazily from the
    /// parsed entries on first append so that unrewritten classes pay nothing.
    utf8_lookup: Option<HashMap<Vec<u8>, u16>>,
    nat_lookup: Option<HashMap<(u16, u16), u16>>,
}

impl ConstantPool {
    /// Builds a pool from parsed entries. `entries[0]` must be the unusable slot.
    #[must_use]
    pub fn new(entries: Vec<CpEntry>) -> Self {
        ConstantPool {
            entries,
            utf8_lookup: None,
            nat_lookup: None,
        }
    }

    /// Total slot count, including slot 0 and `Long`/`Double` phantom slots.
    /// This is the value written to the `constant_pool_count` field.
    #[must_use]
    pub fn len(&self) -> u16 {
        self.entries.len() as u16
    }

    /// True if the pool holds no usable entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Returns the entry at `index`.
    pub fn get(&self, index: u16) -> Result<&CpEntry> {
        self.entries
            .get(index as usize)
            .ok_or_else(|| malformed_error!("Constant pool index {} out of range", index))
    }

    /// Iterates all slots with their indices, including unusable ones.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &CpEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i as u16, e))
    }

    /// Returns the UTF-8 payload at `index` as a string slice.
    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            CpEntry::Utf8(bytes) => std::str::from_utf8(bytes)
                .map_err(|_| malformed_error!("Utf8 entry {} is not valid UTF-8", index)),
            other => Err(malformed_error!(
                "Expected Utf8 entry at index {}, found {:?}",
                index,
                other
            )),
        }
    }

    /// Returns the internal name referenced by the `Class` entry at `index`.
    pub fn class_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            CpEntry::Class { name_index } => self.utf8(*name_index),
            other => Err(malformed_error!(
                "Expected Class entry at index {}, found {:?}",
                index,
                other
            )),
        }
    }

    /// Returns `(name, descriptor)` for the `NameAndType` entry at `index`.
    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            CpEntry::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            other => Err(malformed_error!(
                "Expected NameAndType entry at index {}, found {:?}",
                index,
                other
            )),
        }
    }

    /// Returns `(owner, name, descriptor)` for a `Fieldref`, `Methodref` or
    /// `InterfaceMethodref` entry at `index`.
    pub fn member_ref(&self, index: u16) -> Result<(&str, &str, &str)> {
        let (class_index, nat_index) = match self.get(index)? {
            CpEntry::Fieldref {
                class_index,
                name_and_type_index,
            }
            | CpEntry::Methodref {
                class_index,
                name_and_type_index,
            }
            | CpEntry::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => (*class_index, *name_and_type_index),
            other => Err(malformed_error!(
                "Expected member reference entry at index {}, found {:?}",
                index,
                other
            ))?,
        };
        let owner = self.class_name(class_index)?;
        let (name, descriptor) = self.name_and_type(nat_index)?;
        Ok((owner, name, descriptor))
    }

    /// Appends (or re-uses) a `Utf8` entry for `value`, returning its index.
    pub fn add_utf8(&mut self, value: &str) -> Result<u16> {
        if self.utf8_lookup.is_none() {
            let mut lookup = HashMap::new();
            for (index, entry) in self.entries.iter().enumerate() {
                if let CpEntry::Utf8(bytes) = entry {
                    lookup.entry(bytes.clone()).or_insert(index as u16);
                }
            }
            self.utf8_lookup = Some(lookup);
        }
        if let Some(&index) = self.utf8_lookup.as_ref().unwrap().get(value.as_bytes()) {
            return Ok(index);
        }
        let index = self.push(CpEntry::Utf8(value.as_bytes().to_vec()))?;
        self.utf8_lookup
            .as_mut()
            .unwrap()
            .insert(value.as_bytes().to_vec(), index);
        Ok(index)
    }

    /// Appends (or re-uses) a `NameAndType` entry, returning its index.
    pub fn add_name_and_type(&mut self, name_index: u16, descriptor_index: u16) -> Result<u16> {
        if self.nat_lookup.is_none() {
            let mut lookup = HashMap::new();
            for (index, entry) in self.entries.iter().enumerate() {
                if let CpEntry::NameAndType {
                    name_index,
                    descriptor_index,
                } = entry
                {
                    lookup
                        .entry((*name_index, *descriptor_index))
                        .or_insert(index as u16);
                }
            }
            self.nat_lookup = Some(lookup);
        }
        if let Some(&index) = self
            .nat_lookup
            .as_ref()
            .unwrap()
            .get(&(name_index, descriptor_index))
        {
            return Ok(index);
        }
        let index = self.push(CpEntry::NameAndType {
            name_index,
            descriptor_index,
        })?;
        self.nat_lookup
            .as_mut()
            .unwrap()
            .insert((name_index, descriptor_index), index);
        Ok(index)
    }

    /// Replaces the entry at `index`. Only used by the rewriting passes to
    /// redirect reference slots (`Class`, member refs, `MethodType`); `Utf8`
    /// and `NameAndType` entries are never overwritten, see the module docs.
    pub fn replace(&mut self, index: u16, entry: CpEntry) -> Result<()> {
        let slot = self
            .entries
            .get_mut(index as usize)
            .ok_or_else(|| malformed_error!("Constant pool index {} out of range", index))?;
        *slot = entry;
        Ok(())
    }

    fn push(&mut self, entry: CpEntry) -> Result<u16> {
        // The format addresses the pool with 16-bit indices; Long/Double are
        // never appended here so each push consumes exactly one slot.
        if self.entries.len() >= u16::MAX as usize {
            return Err(Error::PoolLimit);
        }
        let index = self.entries.len() as u16;
        self.entries.push(entry);
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_pool() -> ConstantPool {
        ConstantPool::new(vec![
            CpEntry::Unusable,
            CpEntry::Utf8(b"aa".to_vec()),
            CpEntry::Class { name_index: 1 },
            CpEntry::Utf8(b"someField".to_vec()),
            CpEntry::Utf8(b"I".to_vec()),
            CpEntry::NameAndType {
                name_index: 3,
                descriptor_index: 4,
            },
            CpEntry::Fieldref {
                class_index: 2,
                name_and_type_index: 5,
            },
        ])
    }

    #[test]
    fn typed_accessors() {
        let pool = small_pool();
        assert_eq!(pool.utf8(1).unwrap(), "aa");
        assert_eq!(pool.class_name(2).unwrap(), "aa");
        assert_eq!(pool.name_and_type(5).unwrap(), ("someField", "I"));
        assert_eq!(pool.member_ref(6).unwrap(), ("aa", "someField", "I"));
    }

    #[test]
    fn accessor_kind_mismatch_is_malformed() {
        let pool = small_pool();
        assert!(pool.utf8(2).is_err());
        assert!(pool.class_name(1).is_err());
        assert!(pool.member_ref(5).is_err());
    }

    #[test]
    fn add_utf8_interns_existing_and_new_content() {
        let mut pool = small_pool();
        // Existing content resolves to the parsed slot, no growth.
        assert_eq!(pool.add_utf8("aa").unwrap(), 1);
        assert_eq!(pool.len(), 7);
        // New content is appended once and then re-used.
        let index = pool.add_utf8("Test").unwrap();
        assert_eq!(index, 7);
        assert_eq!(pool.add_utf8("Test").unwrap(), index);
        assert_eq!(pool.len(), 8);
    }

    #[test]
    fn add_name_and_type_interns() {
        let mut pool = small_pool();
        assert_eq!(pool.add_name_and_type(3, 4).unwrap(), 5);
        let fresh = pool.add_name_and_type(1, 4).unwrap();
        assert_eq!(fresh, 7);
        assert_eq!(pool.add_name_and_type(1, 4).unwrap(), fresh);
    }
}
