//! Serialization of the structural model back to class payload bytes.

use crate::{
    classfile::{
        parser::MAGIC,
        pool::{ConstantPool, CpEntry},
        AttributeInfo, ClassFile, MemberInfo,
    },
    Result,
};

pub(crate) fn write_class(class: &ClassFile) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(4096);
    out.extend_from_slice(&MAGIC.to_be_bytes());
    out.extend_from_slice(&class.minor_version.to_be_bytes());
    out.extend_from_slice(&class.major_version.to_be_bytes());
    write_pool(&mut out, &class.pool);
    out.extend_from_slice(&class.access_flags.to_be_bytes());
    out.extend_from_slice(&class.this_class.to_be_bytes());
    out.extend_from_slice(&class.super_class.to_be_bytes());
    out.extend_from_slice(&(class.interfaces.len() as u16).to_be_bytes());
    for interface in &class.interfaces {
        out.extend_from_slice(&interface.to_be_bytes());
    }
    write_members(&mut out, &class.fields);
    write_members(&mut out, &class.methods);
    write_attributes(&mut out, &class.attributes);
    Ok(out)
}

fn write_pool(out: &mut Vec<u8>, pool: &ConstantPool) {
    out.extend_from_slice(&pool.len().to_be_bytes());
    for (index, entry) in pool.iter() {
        match entry {
            // Slot 0 and Long/Double phantom slots have no on-disk form.
            CpEntry::Unusable => {
                debug_assert!(index == 0 || matches!(
                    pool.get(index - 1),
                    Ok(CpEntry::Long(_) | CpEntry::Double(_))
                ));
            }
            CpEntry::Utf8(bytes) => {
                out.push(1);
                out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            CpEntry::Integer(bits) => {
                out.push(3);
                out.extend_from_slice(&bits.to_be_bytes());
            }
            CpEntry::Float(bits) => {
                out.push(4);
                out.extend_from_slice(&bits.to_be_bytes());
            }
            CpEntry::Long(bits) => {
                out.push(5);
                out.extend_from_slice(&bits.to_be_bytes());
            }
            CpEntry::Double(bits) => {
                out.push(6);
                out.extend_from_slice(&bits.to_be_bytes());
            }
            CpEntry::Class { name_index } => {
                out.push(7);
                out.extend_from_slice(&name_index.to_be_bytes());
            }
            CpEntry::String { string_index } => {
                out.push(8);
                out.extend_from_slice(&string_index.to_be_bytes());
            }
            CpEntry::Fieldref {
                class_index,
                name_and_type_index,
            } => {
                out.push(9);
                out.extend_from_slice(&class_index.to_be_bytes());
                out.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            CpEntry::Methodref {
                class_index,
                name_and_type_index,
            } => {
                out.push(10);
                out.extend_from_slice(&class_index.to_be_bytes());
                out.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            CpEntry::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => {
                out.push(11);
                out.extend_from_slice(&class_index.to_be_bytes());
                out.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            CpEntry::NameAndType {
                name_index,
                descriptor_index,
            } => {
                out.push(12);
                out.extend_from_slice(&name_index.to_be_bytes());
                out.extend_from_slice(&descriptor_index.to_be_bytes());
            }
            CpEntry::MethodHandle {
                reference_kind,
                reference_index,
            } => {
                out.push(15);
                out.push(*reference_kind);
                out.extend_from_slice(&reference_index.to_be_bytes());
            }
            CpEntry::MethodType { descriptor_index } => {
                out.push(16);
                out.extend_from_slice(&descriptor_index.to_be_bytes());
            }
            CpEntry::Dynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => {
                out.push(17);
                out.extend_from_slice(&bootstrap_method_attr_index.to_be_bytes());
                out.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            CpEntry::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => {
                out.push(18);
                out.extend_from_slice(&bootstrap_method_attr_index.to_be_bytes());
                out.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            CpEntry::Module { name_index } => {
                out.push(19);
                out.extend_from_slice(&name_index.to_be_bytes());
            }
            CpEntry::Package { name_index } => {
                out.push(20);
                out.extend_from_slice(&name_index.to_be_bytes());
            }
        }
    }
}

fn write_members(out: &mut Vec<u8>, members: &[MemberInfo]) {
    out.extend_from_slice(&(members.len() as u16).to_be_bytes());
    for member in members {
        out.extend_from_slice(&member.access_flags.to_be_bytes());
        out.extend_from_slice(&member.name_index.to_be_bytes());
        out.extend_from_slice(&member.descriptor_index.to_be_bytes());
        write_attributes(out, &member.attributes);
    }
}

pub(crate) fn write_attributes(out: &mut Vec<u8>, attributes: &[AttributeInfo]) {
    out.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
    for attribute in attributes {
        out.extend_from_slice(&attribute.name_index.to_be_bytes());
        out.extend_from_slice(&(attribute.info.len() as u32).to_be_bytes());
        out.extend_from_slice(&attribute.info);
    }
}

#[cfg(test)]
mod tests {
    use crate::classfile::ClassFile;
    use crate::test::build::minimal_class;

    #[test]
    fn parse_write_round_trip_is_stable() {
        let bytes = minimal_class("aa", Some("java/lang/Object"));
        let class = ClassFile::parse(&bytes).unwrap();
        let rewritten = class.to_bytes().unwrap();
        assert_eq!(bytes, rewritten);
    }
}
