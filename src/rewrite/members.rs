//! Member-name rewriting (the second pass).
//!
//! Runs after class renaming, on classes whose type names are already in
//! their final form. Field and method declarations are renamed through the
//! resolver, member references in the pool are redirected to freshly
//! appended `NameAndType` entries (a shared entry may resolve differently
//! per owner, so the original is never edited in place), missing `BRIDGE`
//! flags found by bridge recovery are restored, and placeholder names in the
//! local-variable tables are replaced with type-derived ones.

use std::collections::HashMap;

use log::debug;

use crate::{
    classfile::{
        attributes::{self, CodeAttribute, LocalVariableTable},
        ClassFile, CpEntry, MethodAccessFlags,
    },
    resolve::MemberResolver,
    rewrite::locals,
    Result,
};

enum RefKind {
    Field,
    Method,
    InterfaceMethod,
}

/// Applies member renaming to one parsed class, returning the rewritten form.
pub fn rewrite(mut class: ClassFile, resolver: &MemberResolver<'_>) -> Result<ClassFile> {
    let owner = class.this_class_name()?.to_string();

    // Resolve every declaration before mutating anything: bridge recovery
    // records flag repairs as a side effect, and all of them must be known
    // before the method table is emitted.
    let mut field_names = Vec::with_capacity(class.fields.len());
    for field in &class.fields {
        let name = field.name(&class.pool)?.to_string();
        let descriptor = field.descriptor(&class.pool)?.to_string();
        let resolved = resolver.resolve_field_name(&owner, &name, &descriptor)?;
        field_names.push((name, resolved));
    }
    let mut method_names = Vec::with_capacity(class.methods.len());
    for method in &class.methods {
        let name = method.name(&class.pool)?.to_string();
        let descriptor = method.descriptor(&class.pool)?.to_string();
        let resolved = resolver.resolve_method_name(&owner, &name, &descriptor)?;
        method_names.push((name, descriptor, resolved));
    }

    for (position, (name, resolved)) in field_names.iter().enumerate() {
        if let Some(new_name) = resolved {
            class.fields[position].name_index = class.pool.add_utf8(new_name)?;
            debug!("Deobfuscated field {owner}.{name} to {new_name}");
        }
    }
    for (position, (name, descriptor, resolved)) in method_names.iter().enumerate() {
        if let Some(new_name) = resolved {
            class.methods[position].name_index = class.pool.add_utf8(new_name)?;
            debug!("Deobfuscated method {owner}.{name}{descriptor} to {new_name}");
        }
        if resolver.needs_bridge_flag(&owner, name, descriptor) {
            class.methods[position].access_flags |= MethodAccessFlags::BRIDGE.bits();
            debug!("Restored bridge flag on {owner}.{name}{descriptor}");
        }
    }

    rewrite_references(&mut class, resolver)?;
    rewrite_locals(&mut class)?;
    Ok(class)
}

/// Redirects member-reference slots whose resolved name differs from the one
/// in their `NameAndType`.
fn rewrite_references(class: &mut ClassFile, resolver: &MemberResolver<'_>) -> Result<()> {
    let mut references = Vec::new();
    for (index, entry) in class.pool.iter() {
        let (kind, class_index, nat_index) = match entry {
            CpEntry::Fieldref {
                class_index,
                name_and_type_index,
            } => (RefKind::Field, *class_index, *name_and_type_index),
            CpEntry::Methodref {
                class_index,
                name_and_type_index,
            } => (RefKind::Method, *class_index, *name_and_type_index),
            CpEntry::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => (RefKind::InterfaceMethod, *class_index, *name_and_type_index),
            _ => continue,
        };
        let ref_owner = class.pool.class_name(class_index)?.to_string();
        let (ref_name, ref_descriptor) = {
            let (name, descriptor) = class.pool.name_and_type(nat_index)?;
            (name.to_string(), descriptor.to_string())
        };
        references.push((index, kind, class_index, nat_index, ref_owner, ref_name, ref_descriptor));
    }
    for (index, kind, class_index, nat_index, ref_owner, ref_name, ref_descriptor) in references {
        let resolved = match kind {
            RefKind::Field => resolver.resolve_field_name(&ref_owner, &ref_name, &ref_descriptor)?,
            RefKind::Method | RefKind::InterfaceMethod => {
                resolver.resolve_method_name(&ref_owner, &ref_name, &ref_descriptor)?
            }
        };
        let Some(new_name) = resolved else { continue };
        if new_name == ref_name {
            continue;
        }
        let descriptor_index = match class.pool.get(nat_index)? {
            CpEntry::NameAndType {
                descriptor_index, ..
            } => *descriptor_index,
            _ => continue,
        };
        let name_index = class.pool.add_utf8(&new_name)?;
        let name_and_type_index = class.pool.add_name_and_type(name_index, descriptor_index)?;
        let replacement = match kind {
            RefKind::Field => CpEntry::Fieldref {
                class_index,
                name_and_type_index,
            },
            RefKind::Method => CpEntry::Methodref {
                class_index,
                name_and_type_index,
            },
            RefKind::InterfaceMethod => CpEntry::InterfaceMethodref {
                class_index,
                name_and_type_index,
            },
        };
        class.pool.replace(index, replacement)?;
        debug!("Deobfuscated reference {ref_owner}.{ref_name} to {new_name}");
    }
    Ok(())
}

/// Replaces placeholder variable names in every method's local-variable
/// tables. The type table shares its records with the plain table by
/// `(start_pc, slot)`, so renames are carried across.
fn rewrite_locals(class: &mut ClassFile) -> Result<()> {
    let ClassFile { pool, methods, .. } = class;
    for method in methods.iter_mut() {
        let mut code_attribute = None;
        for attribute in method.attributes.iter_mut() {
            if attribute.name(pool)? == attributes::CODE {
                code_attribute = Some(attribute);
                break;
            }
        }
        let Some(attribute) = code_attribute else {
            continue;
        };
        let mut body = CodeAttribute::parse(&attribute.info)?;
        let mut counts: HashMap<String, u32> = HashMap::new();
        let mut renames: HashMap<(u16, u16), u16> = HashMap::new();
        let mut changed = false;
        for nested in body.attributes.iter_mut() {
            if nested.name(pool)? != attributes::LOCAL_VARIABLE_TABLE {
                continue;
            }
            let mut variables = LocalVariableTable::parse(&nested.info)?;
            let mut table_changed = false;
            for entry in variables.entries.iter_mut() {
                let name = pool.utf8(entry.name_index)?.to_string();
                let descriptor = pool.utf8(entry.descriptor_index)?.to_string();
                if let Some(new_name) = locals::variable_name(&name, &descriptor, &mut counts)? {
                    let name_index = pool.add_utf8(&new_name)?;
                    entry.name_index = name_index;
                    renames.insert((entry.start_pc, entry.index), name_index);
                    table_changed = true;
                    debug!("Deobfuscated local variable {new_name}!");
                }
            }
            if table_changed {
                nested.info = variables.to_bytes();
                changed = true;
            }
        }
        if !renames.is_empty() {
            for nested in body.attributes.iter_mut() {
                if nested.name(pool)? != attributes::LOCAL_VARIABLE_TYPE_TABLE {
                    continue;
                }
                let mut variables = LocalVariableTable::parse(&nested.info)?;
                let mut table_changed = false;
                for entry in variables.entries.iter_mut() {
                    if let Some(&name_index) = renames.get(&(entry.start_pc, entry.index)) {
                        entry.name_index = name_index;
                        table_changed = true;
                    }
                }
                if table_changed {
                    nested.info = variables.to_bytes();
                    changed = true;
                }
            }
        }
        if changed {
            attribute.info = body.to_bytes();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        archive::{JarReader, JarWriter},
        classfile::{
            attributes::{LocalVariableEntry, LocalVariableTable},
            AttributeInfo,
        },
        graph::ClassGraph,
        mappings::{MappingOptions, SymbolTable},
        test::build::ClassBuilder,
    };
    use tempfile::NamedTempFile;

    const NS: &str = "net/minecraft/server/";

    fn empty_jar() -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        JarWriter::create(file.path()).unwrap().finish().unwrap();
        file
    }

    fn table(member_lines: &str) -> SymbolTable {
        SymbolTable::from_readers(
            "".as_bytes(),
            member_lines.as_bytes(),
            &MappingOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn declarations_and_self_references_are_renamed() {
        let owner = format!("{NS}Test");
        let mut builder = ClassBuilder::new(&owner, Some("java/lang/Object"));
        builder.add_field(0x0002, "someField", "I");
        let self_ref = builder.field_ref(&owner, "someField", "I");
        let class = ClassFile::parse(&builder.bytes()).unwrap();
        let table = table("Test someField newField\n");
        let jar = empty_jar();
        let reader = JarReader::open(jar.path()).unwrap();
        let graph = ClassGraph::new(&reader);
        let resolver = MemberResolver::new(&table, &graph);
        let rewritten = rewrite(class, &resolver).unwrap();
        assert_eq!(
            rewritten.fields[0].name(&rewritten.pool).unwrap(),
            "newField"
        );
        assert_eq!(
            rewritten.pool.member_ref(self_ref).unwrap(),
            (owner.as_str(), "newField", "I")
        );
    }

    #[test]
    fn shared_name_and_type_stays_valid_for_other_owners() {
        let mapped_owner = format!("{NS}Test");
        let other_owner = format!("{NS}Other");
        let host = format!("{NS}Host");
        let mut builder = ClassBuilder::new(&host, Some("java/lang/Object"));
        let mapped_ref = builder.field_ref(&mapped_owner, "someField", "I");
        let other_ref = builder.field_ref(&other_owner, "someField", "I");
        let class = ClassFile::parse(&builder.bytes()).unwrap();
        let table = table("Test someField newField\n");
        let jar = empty_jar();
        let reader = JarReader::open(jar.path()).unwrap();
        let graph = ClassGraph::new(&reader);
        let resolver = MemberResolver::new(&table, &graph);
        let rewritten = rewrite(class, &resolver).unwrap();
        // Both references shared one NameAndType; only the mapped owner's
        // slot moves to a new entry.
        assert_eq!(
            rewritten.pool.member_ref(mapped_ref).unwrap(),
            (mapped_owner.as_str(), "newField", "I")
        );
        assert_eq!(
            rewritten.pool.member_ref(other_ref).unwrap(),
            (other_owner.as_str(), "someField", "I")
        );
    }

    #[test]
    fn placeholder_locals_are_renamed_from_types() {
        let owner = format!("{NS}Test");
        let mut builder = ClassBuilder::new(&owner, Some("java/lang/Object"));
        let snowman = builder.utf8(locals::PLACEHOLDER);
        let int_descriptor = builder.utf8("I");
        let variables = LocalVariableTable {
            entries: vec![
                LocalVariableEntry {
                    start_pc: 0,
                    length: 1,
                    name_index: snowman,
                    descriptor_index: int_descriptor,
                    index: 0,
                },
                LocalVariableEntry {
                    start_pc: 0,
                    length: 1,
                    name_index: snowman,
                    descriptor_index: int_descriptor,
                    index: 1,
                },
            ],
        };
        let table_name = builder.utf8(attributes::LOCAL_VARIABLE_TABLE);
        let body = CodeAttribute {
            max_stack: 1,
            max_locals: 2,
            code: vec![0xb1],
            exception_table: Vec::new(),
            attributes: vec![AttributeInfo {
                name_index: table_name,
                info: variables.to_bytes(),
            }],
        };
        let code_name = builder.utf8(attributes::CODE);
        builder.add_method_raw(
            0x0001,
            "run",
            "()V",
            vec![AttributeInfo {
                name_index: code_name,
                info: body.to_bytes(),
            }],
        );
        let class = ClassFile::parse(&builder.bytes()).unwrap();
        let table = table("");
        let jar = empty_jar();
        let reader = JarReader::open(jar.path()).unwrap();
        let graph = ClassGraph::new(&reader);
        let resolver = MemberResolver::new(&table, &graph);
        let rewritten = rewrite(class, &resolver).unwrap();
        let code = rewritten.methods[0]
            .attribute(&rewritten.pool, attributes::CODE)
            .unwrap()
            .unwrap();
        let body = CodeAttribute::parse(&code.info).unwrap();
        let variables = LocalVariableTable::parse(&body.attributes[0].info).unwrap();
        assert_eq!(
            rewritten.pool.utf8(variables.entries[0].name_index).unwrap(),
            "i"
        );
        assert_eq!(
            rewritten.pool.utf8(variables.entries[1].name_index).unwrap(),
            "i2"
        );
    }
}
