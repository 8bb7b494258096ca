//! Class-name rewriting (the first pass).
//!
//! Renames every embedded class name a classfile can carry: `Class` pool
//! entries (plain and array-descriptor forms), descriptors inside
//! `NameAndType` and `MethodType` entries, declared member descriptors,
//! generic `Signature` attributes at every level, descriptors in the
//! local-variable tables nested in `Code`, and the simple-name column of
//! `InnerClasses` records. Member names are untouched here; that is the
//! second pass's job.
//!
//! All rewrites follow the pool discipline from [`crate::classfile::pool`]:
//! existing `Utf8`/`NameAndType` entries are never edited, replacements are
//! appended and the referencing slots redirected.

use std::collections::HashMap;

use crate::{
    classfile::{
        attributes::{self, CodeAttribute, InnerClassesAttribute, LocalVariableTable},
        descriptor, AttributeInfo, ClassFile, ConstantPool, CpEntry, MemberInfo,
    },
    mappings::SymbolTable,
    Result,
};

/// Applies the class-name mapping to one parsed class, returning the
/// rewritten form. The input is consumed; untouched attributes round-trip
/// byte-for-byte.
pub fn rewrite(mut class: ClassFile, table: &SymbolTable) -> Result<ClassFile> {
    let mapper = |name: &str| table.map_class(name);

    rewrite_class_entries(&mut class.pool, &mapper)?;
    rewrite_name_and_types(&mut class.pool, &mapper)?;
    rewrite_method_types(&mut class.pool, &mapper)?;

    let ClassFile {
        pool,
        fields,
        methods,
        attributes,
        ..
    } = &mut class;
    for field in fields.iter_mut() {
        rewrite_member(pool, field, false, &mapper)?;
    }
    for method in methods.iter_mut() {
        rewrite_member(pool, method, true, &mapper)?;
    }
    for attribute in attributes.iter_mut() {
        match attribute.name(pool)?.to_string().as_str() {
            attributes::SIGNATURE => rewrite_signature(pool, attribute, &mapper)?,
            attributes::INNER_CLASSES => rewrite_inner_classes(pool, attribute)?,
            _ => {}
        }
    }
    Ok(class)
}

/// Redirects every `Class` entry whose name (or embedded array-descriptor
/// name) maps.
fn rewrite_class_entries<M: descriptor::ClassNameMapper>(
    pool: &mut ConstantPool,
    mapper: &M,
) -> Result<()> {
    let mut renames = Vec::new();
    for (index, entry) in pool.iter() {
        if let CpEntry::Class { name_index } = entry {
            let name = pool.utf8(*name_index)?;
            // new/anewarray/checkcast operands store array types as
            // descriptors inside the Class entry.
            let mapped = if name.starts_with('[') {
                descriptor::map_descriptor(name, mapper)?
            } else {
                mapper.map_class(name)
            };
            if let Some(new_name) = mapped {
                renames.push((index, new_name));
            }
        }
    }
    for (index, new_name) in renames {
        let name_index = pool.add_utf8(&new_name)?;
        pool.replace(index, CpEntry::Class { name_index })?;
    }
    Ok(())
}

/// Appends replacement `NameAndType` entries for mapped descriptors and
/// redirects the member-reference and dynamic slots pointing at them.
fn rewrite_name_and_types<M: descriptor::ClassNameMapper>(
    pool: &mut ConstantPool,
    mapper: &M,
) -> Result<()> {
    let mut pending = Vec::new();
    for (index, entry) in pool.iter() {
        if let CpEntry::NameAndType {
            name_index,
            descriptor_index,
        } = entry
        {
            let current = pool.utf8(*descriptor_index)?;
            if let Some(new_descriptor) = descriptor::map_descriptor(current, mapper)? {
                pending.push((index, *name_index, new_descriptor));
            }
        }
    }
    let mut moves: HashMap<u16, u16> = HashMap::new();
    for (index, name_index, new_descriptor) in pending {
        let descriptor_index = pool.add_utf8(&new_descriptor)?;
        let replacement = pool.add_name_and_type(name_index, descriptor_index)?;
        moves.insert(index, replacement);
    }
    if moves.is_empty() {
        return Ok(());
    }
    let mut redirects = Vec::new();
    for (index, entry) in pool.iter() {
        let updated = match entry {
            CpEntry::Fieldref {
                class_index,
                name_and_type_index,
            } => moves.get(name_and_type_index).map(|&n| CpEntry::Fieldref {
                class_index: *class_index,
                name_and_type_index: n,
            }),
            CpEntry::Methodref {
                class_index,
                name_and_type_index,
            } => moves.get(name_and_type_index).map(|&n| CpEntry::Methodref {
                class_index: *class_index,
                name_and_type_index: n,
            }),
            CpEntry::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => moves
                .get(name_and_type_index)
                .map(|&n| CpEntry::InterfaceMethodref {
                    class_index: *class_index,
                    name_and_type_index: n,
                }),
            CpEntry::Dynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => moves.get(name_and_type_index).map(|&n| CpEntry::Dynamic {
                bootstrap_method_attr_index: *bootstrap_method_attr_index,
                name_and_type_index: n,
            }),
            CpEntry::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => moves
                .get(name_and_type_index)
                .map(|&n| CpEntry::InvokeDynamic {
                    bootstrap_method_attr_index: *bootstrap_method_attr_index,
                    name_and_type_index: n,
                }),
            _ => None,
        };
        if let Some(updated) = updated {
            redirects.push((index, updated));
        }
    }
    for (index, entry) in redirects {
        pool.replace(index, entry)?;
    }
    Ok(())
}

fn rewrite_method_types<M: descriptor::ClassNameMapper>(
    pool: &mut ConstantPool,
    mapper: &M,
) -> Result<()> {
    let mut pending = Vec::new();
    for (index, entry) in pool.iter() {
        if let CpEntry::MethodType { descriptor_index } = entry {
            let current = pool.utf8(*descriptor_index)?;
            if let Some(new_descriptor) = descriptor::map_descriptor(current, mapper)? {
                pending.push((index, new_descriptor));
            }
        }
    }
    for (index, new_descriptor) in pending {
        let descriptor_index = pool.add_utf8(&new_descriptor)?;
        pool.replace(index, CpEntry::MethodType { descriptor_index })?;
    }
    Ok(())
}

fn rewrite_member<M: descriptor::ClassNameMapper>(
    pool: &mut ConstantPool,
    member: &mut MemberInfo,
    is_method: bool,
    mapper: &M,
) -> Result<()> {
    let current = pool.utf8(member.descriptor_index)?.to_string();
    if let Some(new_descriptor) = descriptor::map_descriptor(&current, mapper)? {
        member.descriptor_index = pool.add_utf8(&new_descriptor)?;
    }
    for attribute in member.attributes.iter_mut() {
        match attribute.name(pool)?.to_string().as_str() {
            attributes::SIGNATURE => rewrite_signature(pool, attribute, mapper)?,
            attributes::CODE if is_method => rewrite_code(pool, attribute, mapper)?,
            _ => {}
        }
    }
    Ok(())
}

fn rewrite_signature<M: descriptor::ClassNameMapper>(
    pool: &mut ConstantPool,
    attribute: &mut AttributeInfo,
    mapper: &M,
) -> Result<()> {
    let index = attributes::signature_index(&attribute.info)?;
    let current = pool.utf8(index)?.to_string();
    if let Some(new_signature) = descriptor::map_signature(&current, mapper)? {
        let new_index = pool.add_utf8(&new_signature)?;
        attribute.info = new_index.to_be_bytes().to_vec();
    }
    Ok(())
}

/// Rewrites the descriptor and signature columns of the local-variable
/// tables nested in a `Code` attribute. The instruction bytes pass through
/// untouched.
fn rewrite_code<M: descriptor::ClassNameMapper>(
    pool: &mut ConstantPool,
    attribute: &mut AttributeInfo,
    mapper: &M,
) -> Result<()> {
    let mut body = CodeAttribute::parse(&attribute.info)?;
    let mut changed = false;
    for nested in body.attributes.iter_mut() {
        let name = nested.name(pool)?.to_string();
        let is_type_table = name == attributes::LOCAL_VARIABLE_TYPE_TABLE;
        if name != attributes::LOCAL_VARIABLE_TABLE && !is_type_table {
            continue;
        }
        let mut variables = LocalVariableTable::parse(&nested.info)?;
        let mut table_changed = false;
        for entry in variables.entries.iter_mut() {
            let current = pool.utf8(entry.descriptor_index)?.to_string();
            let mapped = if is_type_table {
                descriptor::map_signature(&current, mapper)?
            } else {
                descriptor::map_descriptor(&current, mapper)?
            };
            if let Some(new_value) = mapped {
                entry.descriptor_index = pool.add_utf8(&new_value)?;
                table_changed = true;
            }
        }
        if table_changed {
            nested.info = variables.to_bytes();
            changed = true;
        }
    }
    if changed {
        attribute.info = body.to_bytes();
    }
    Ok(())
}

/// Recomputes the simple-name column of `InnerClasses` records from the
/// (already rewritten) full names, so source-level views agree with the new
/// binary names. Anonymous records (index 0) stay anonymous, and a full name
/// without a nesting separator keeps whatever simple name it carried.
fn rewrite_inner_classes(pool: &mut ConstantPool, attribute: &mut AttributeInfo) -> Result<()> {
    let mut inner = InnerClassesAttribute::parse(&attribute.info)?;
    let mut changed = false;
    for entry in inner.entries.iter_mut() {
        if entry.inner_name_index == 0 {
            continue;
        }
        let full_name = pool.class_name(entry.inner_class_info_index)?;
        let Some((_, simple)) = full_name.rsplit_once('$') else {
            continue;
        };
        let simple = simple.to_string();
        if pool.utf8(entry.inner_name_index)? != simple {
            entry.inner_name_index = pool.add_utf8(&simple)?;
            changed = true;
        }
    }
    if changed {
        attribute.info = inner.to_bytes();
    }
    Ok(())
}
