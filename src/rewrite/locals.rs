//! Local-variable name synthesis.
//!
//! The obfuscator replaces every debug-table variable name with the snowman
//! glyph. A readable replacement is derived from the variable's type: the
//! decapitalized simple class name for objects, a pluralized form for arrays
//! and single letters for primitives, with alternatives for names that would
//! collide with source-language keywords. Duplicate names within one method
//! get a numeric suffix from the second occurrence on.

use std::collections::HashMap;

use crate::{Error, Result};

/// The placeholder the obfuscator writes into local-variable tables.
pub const PLACEHOLDER: &str = "\u{2603}";

/// Derives a replacement name for one local-variable record.
///
/// Names other than the placeholder are left alone (`None`). `counts` carries
/// per-method duplicate numbering and must live for exactly one method.
pub fn variable_name(
    old_name: &str,
    descriptor: &str,
    counts: &mut HashMap<String, u32>,
) -> Result<Option<String>> {
    if old_name != PLACEHOLDER {
        return Ok(None);
    }
    let mut name = type_name(descriptor)?;
    let count = counts.entry(name.clone()).or_insert(0);
    *count += 1;
    if *count != 1 {
        name.push_str(&count.to_string());
    }
    Ok(Some(name))
}

fn type_name(descriptor: &str) -> Result<String> {
    let element = descriptor.trim_start_matches('[');
    let dimensions = descriptor.len() - element.len();
    if dimensions == 0 {
        return match element.strip_prefix('L').and_then(|s| s.strip_suffix(';')) {
            Some(class_name) => Ok(object_name(class_name)),
            None => primitive_letter(element)
                .map(str::to_string)
                .ok_or_else(|| Error::InvalidDescriptor(descriptor.to_string())),
        };
    }
    // Arrays pluralize their element name, whatever its kind.
    let base = match element.strip_prefix('L').and_then(|s| s.strip_suffix(';')) {
        Some(class_name) => object_name(class_name),
        None => primitive_source_name(element)
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidDescriptor(descriptor.to_string()))?,
    };
    let plural = pluralize(base);
    Ok(reserved_alternative(&plural)
        .map(str::to_string)
        .unwrap_or(plural))
}

fn object_name(internal_name: &str) -> String {
    let dotted = internal_name.replace('/', ".");
    if let Some(explicit) = explicit_name(&dotted) {
        return explicit.to_string();
    }
    let simple = dotted.rsplit('.').next().unwrap_or(&dotted);
    if dotted.contains("Abstract") {
        let stripped = simple.replace("Abstract", "");
        if !stripped.is_empty() {
            // Special-cased shapes skip the keyword check.
            return decapitalize(&stripped);
        }
    }
    let name = decapitalize(simple);
    reserved_alternative(&name)
        .map(str::to_string)
        .unwrap_or(name)
}

fn pluralize(mut name: String) -> String {
    if name.ends_with('s') {
        name.push_str("es");
    } else {
        name.push('s');
    }
    name
}

fn decapitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Well-known types with an idiomatic variable name.
fn explicit_name(dotted_name: &str) -> Option<&'static str> {
    match dotted_name {
        "net.minecraft.server.CompoundNBTTag" => Some("compound"),
        _ => None,
    }
}

fn primitive_letter(descriptor: &str) -> Option<&'static str> {
    match descriptor {
        "Z" => Some("bool"),
        "B" => Some("b"),
        "C" => Some("c"),
        "D" => Some("d"),
        "F" => Some("f"),
        "I" => Some("i"),
        "J" => Some("l"),
        "S" => Some("s"),
        _ => None,
    }
}

fn primitive_source_name(descriptor: &str) -> Option<&'static str> {
    match descriptor {
        "Z" => Some("boolean"),
        "B" => Some("byte"),
        "C" => Some("char"),
        "D" => Some("double"),
        "F" => Some("float"),
        "I" => Some("int"),
        "J" => Some("long"),
        "S" => Some("short"),
        _ => None,
    }
}

fn reserved_alternative(name: &str) -> Option<&'static str> {
    match name {
        "abstract" => Some("abstr"),
        "assert" => Some("ass"),
        "boolean" => Some("bool"),
        "break" => Some("br"),
        "byte" => Some("b"),
        "case" => Some("c"),
        "catch" => Some("caught"),
        "char" => Some("c"),
        "class" => Some("clazz"),
        "const" => Some("constant"),
        "continue" => Some("cont"),
        "default" => Some("def"),
        "do" => Some("d"),
        "double" => Some("d"),
        "else" => Some("e"),
        "enum" => Some("enumeration"),
        "extends" => Some("ext"),
        "false" => Some("f"),
        "final" => Some("fin"),
        "finally" => Some("fin"),
        "float" => Some("f"),
        "goto" => Some("go"),
        "for" => Some("f"),
        "if" => Some("i"),
        "implements" => Some("impl"),
        "import" => Some("imp"),
        "instanceof" => Some("instance"),
        "int" => Some("i"),
        "interface" => Some("inter"),
        "long" => Some("l"),
        "native" => Some("nat"),
        "new" => Some("n"),
        "null" => Some("nu"),
        "package" => Some("pkg"),
        "private" => Some("pr"),
        "protected" => Some("prot"),
        "public" => Some("pub"),
        "return" => Some("ret"),
        "short" => Some("s"),
        "static" => Some("stat"),
        "strictfp" => Some("strictFloat"),
        "true" => Some("t"),
        _ => None,
    }
}
