//! The externally supplied symbol table.
//!
//! Two line-oriented mapping feeds are ingested once at startup: class
//! mappings (`oldName newName [hash]`) and member mappings (`owner field
//! newName` / `owner method descriptor newName`). The resulting
//! [`SymbolTable`] is immutable for the remainder of the run and read-only to
//! every other component.
//!
//! Class-name lookup also recovers names that are not literal table keys:
//! anonymous and local nested types carry compiler-assigned numeric suffixes
//! (`aa$1`, `aa$1$2`) which are preserved verbatim on top of the outer class's
//! mapping. See [`SymbolTable::map_class`].

use std::{
    collections::{HashMap, HashSet},
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

use log::warn;

use crate::{classfile::descriptor, Result};

/// Ingestion options for the mapping feeds.
///
/// Passed explicitly rather than read from process-wide state so the table can
/// be constructed independently in tests.
#[derive(Debug, Clone)]
pub struct MappingOptions {
    /// Root namespace prefix enforced on every mapped class name and member
    /// owner, with trailing separator (`net/minecraft/server/`).
    pub root_namespace: String,
    /// When set, class mapping lines must carry a third content-hash column.
    pub check_hashes: bool,
}

impl Default for MappingOptions {
    fn default() -> Self {
        MappingOptions {
            root_namespace: "net/minecraft/server/".to_string(),
            check_hashes: false,
        }
    }
}

/// The class-name and member-name mapping for one remapping run.
///
/// Keys are in original (obfuscated) name form; class mapping values are
/// always qualified with the root namespace prefix. Field and method mappings
/// occupy separate namespaces and are keyed independently.
#[derive(Debug)]
pub struct SymbolTable {
    root_namespace: String,
    classes: HashMap<String, String>,
    classes_inverse: HashMap<String, String>,
    class_values: HashSet<String>,
    fields: HashMap<(String, String), String>,
    methods: HashMap<(String, String, String), String>,
    hashes: HashMap<String, String>,
    hashes_inverse: HashMap<String, String>,
}

impl SymbolTable {
    /// Loads the table from the two mapping files.
    pub fn from_files(
        class_mappings: &Path,
        member_mappings: &Path,
        options: &MappingOptions,
    ) -> Result<Self> {
        Self::from_readers(
            File::open(class_mappings)?,
            File::open(member_mappings)?,
            options,
        )
    }

    /// Loads the table from two readers; the file-based constructor and the
    /// tests both funnel through here.
    pub fn from_readers<C: Read, M: Read>(
        class_mappings: C,
        member_mappings: M,
        options: &MappingOptions,
    ) -> Result<Self> {
        let mut table = SymbolTable {
            root_namespace: options.root_namespace.clone(),
            classes: HashMap::new(),
            classes_inverse: HashMap::new(),
            class_values: HashSet::new(),
            fields: HashMap::new(),
            methods: HashMap::new(),
            hashes: HashMap::new(),
            hashes_inverse: HashMap::new(),
        };
        table.read_class_mappings(BufReader::new(class_mappings), options)?;
        table.read_member_mappings(BufReader::new(member_mappings))?;
        Ok(table)
    }

    fn read_class_mappings<R: BufRead>(
        &mut self,
        reader: R,
        options: &MappingOptions,
    ) -> Result<()> {
        let expected_fields = if options.check_hashes { 3 } else { 2 };
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != expected_fields {
                warn!("Malformed class mapping at ln {}!", number + 1);
                continue;
            }
            let new_name = self.qualify(fields[1]);
            if options.check_hashes {
                self.hashes.insert(fields[0].to_string(), fields[2].to_string());
                self.hashes_inverse
                    .insert(fields[2].to_string(), fields[0].to_string());
            }
            self.class_values.insert(new_name.clone());
            self.classes_inverse
                .insert(new_name.clone(), fields[0].to_string());
            self.classes.insert(fields[0].to_string(), new_name);
        }
        Ok(())
    }

    fn read_member_mappings<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.len() {
                3 => {
                    let owner = self.qualify(fields[0]);
                    self.fields
                        .insert((owner, fields[1].to_string()), fields[2].to_string());
                }
                4 => {
                    let owner = self.qualify(fields[0]);
                    match self.qualify_descriptor(fields[2]) {
                        Ok(descriptor) => {
                            self.methods.insert(
                                (owner, fields[1].to_string(), descriptor),
                                fields[3].to_string(),
                            );
                        }
                        Err(_) => {
                            warn!("Malformed member mapping at ln {}!", number + 1);
                        }
                    }
                }
                _ => {
                    warn!("Malformed member mapping at ln {}!", number + 1);
                }
            }
        }
        Ok(())
    }

    /// Prefixes `name` with the root namespace unless already qualified.
    #[must_use]
    pub fn qualify(&self, name: &str) -> String {
        if name.starts_with(&self.root_namespace) {
            name.to_string()
        } else {
            format!("{}{}", self.root_namespace, name)
        }
    }

    /// The root namespace prefix this table was built with.
    #[must_use]
    pub fn root_namespace(&self) -> &str {
        &self.root_namespace
    }

    /// The member mapping files omit the root namespace prefix on object types
    /// that are locally defined, so descriptors have to be re-qualified against
    /// the already-loaded class mapping before they become lookup keys.
    fn qualify_descriptor(&self, descriptor: &str) -> Result<String> {
        let mut out = String::with_capacity(descriptor.len());
        out.push('(');
        for parameter in descriptor::parameter_types(descriptor)? {
            out.push_str(&self.qualify_type(parameter));
        }
        out.push(')');
        out.push_str(&self.qualify_type(descriptor::return_type(descriptor)?));
        Ok(out)
    }

    fn qualify_type(&self, type_descriptor: &str) -> String {
        // Only bare object types are candidates; arrays and qualified names
        // pass through untouched, matching the mapping feed's conventions.
        if let Some(name) = type_descriptor.strip_prefix('L').and_then(|s| s.strip_suffix(';')) {
            if !name.contains('/') {
                let qualified = format!("{}{}", self.root_namespace, name);
                if self.class_values.contains(&qualified) {
                    return format!("L{};", qualified);
                }
            }
        }
        type_descriptor.to_string()
    }

    /// Maps a class name, recovering anonymous/local numeric suffixes.
    ///
    /// Exact table hit first. Otherwise the name is split at each nesting
    /// separator from left to right; at the first split point where the
    /// remainder is a pure numeric suffix chain (`$1`, `$1$2`, ...), the prefix
    /// is looked up and the suffix re-attached verbatim. Returns `None` for
    /// unmapped names.
    #[must_use]
    pub fn map_class(&self, old_name: &str) -> Option<String> {
        Self::map_with_suffix_recovery(&self.classes, old_name)
    }

    /// The inverse of [`map_class`](Self::map_class): recovers the original
    /// obfuscated name of a class that was already renamed, including the
    /// numeric-suffix convention. Returns `None` when `new_name` is not a
    /// mapping value.
    #[must_use]
    pub fn unmap_class(&self, new_name: &str) -> Option<String> {
        Self::map_with_suffix_recovery(&self.classes_inverse, new_name)
    }

    fn map_with_suffix_recovery(table: &HashMap<String, String>, name: &str) -> Option<String> {
        if let Some(mapped) = table.get(name) {
            return Some(mapped.clone());
        }
        let mut split_points = name.match_indices('$').map(|(index, _)| index);
        split_points.find_map(|index| {
            let (prefix, suffix) = name.split_at(index);
            if is_numeric_suffix_chain(suffix) {
                // The first qualifying split point decides; an unmapped prefix
                // here means the whole name is unmapped.
                Some(table.get(prefix).map(|mapped| format!("{mapped}{suffix}")))
            } else {
                None
            }
        })?
    }

    /// Looks up a field mapping under its exact `(owner, name)` key.
    #[must_use]
    pub fn field_name(&self, owner: &str, name: &str) -> Option<&str> {
        self.fields
            .get(&(owner.to_string(), name.to_string()))
            .map(String::as_str)
    }

    /// Looks up a method mapping under its exact `(owner, name, descriptor)` key.
    #[must_use]
    pub fn method_name(&self, owner: &str, name: &str, descriptor: &str) -> Option<&str> {
        self.methods
            .get(&(owner.to_string(), name.to_string(), descriptor.to_string()))
            .map(String::as_str)
    }

    /// Iterates the class mapping as `(old, new)` pairs.
    pub fn class_mappings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.classes
            .iter()
            .map(|(old, new)| (old.as_str(), new.as_str()))
    }

    /// The recorded content hash for an original class name, when hash
    /// checking is enabled and the feed carried one.
    #[must_use]
    pub fn hash(&self, old_name: &str) -> Option<&str> {
        self.hashes.get(old_name).map(String::as_str)
    }

    /// Reverse hash lookup, the surface the hash-based mapping regeneration
    /// consumes.
    #[must_use]
    pub fn class_for_hash(&self, hash: &str) -> Option<&str> {
        self.hashes_inverse.get(hash).map(String::as_str)
    }

    /// Number of class mappings.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Number of member mappings (fields plus methods).
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.fields.len() + self.methods.len()
    }
}

/// True when `suffix` is one or more `$`-joined purely numeric segments,
/// starting with `$` — the compiler's anonymous/local class numbering.
fn is_numeric_suffix_chain(suffix: &str) -> bool {
    let Some(stripped) = suffix.strip_prefix('$') else {
        return false;
    };
    !stripped.is_empty()
        && stripped
            .split('$')
            .all(|segment| !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(class_lines: &str, member_lines: &str) -> SymbolTable {
        SymbolTable::from_readers(
            class_lines.as_bytes(),
            member_lines.as_bytes(),
            &MappingOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn numeric_suffix_chain_detection() {
        assert!(is_numeric_suffix_chain("$1"));
        assert!(is_numeric_suffix_chain("$1$2"));
        assert!(is_numeric_suffix_chain("$9999"));
        assert!(!is_numeric_suffix_chain("$a"));
        assert!(!is_numeric_suffix_chain("$1$a"));
        assert!(!is_numeric_suffix_chain("$"));
        assert!(!is_numeric_suffix_chain("1"));
        assert!(!is_numeric_suffix_chain(""));
    }

    #[test]
    fn class_values_are_qualified_on_ingestion() {
        let table = table("aa Test\nbb net/minecraft/server/Other\n", "");
        assert_eq!(
            table.map_class("aa").unwrap(),
            "net/minecraft/server/Test"
        );
        assert_eq!(
            table.map_class("bb").unwrap(),
            "net/minecraft/server/Other"
        );
    }

    #[test]
    fn anonymous_suffix_recovery() {
        let table = table("aa Test\naa$a Test$InnerClass\n", "");
        let map = |name: &str| table.map_class(name);
        assert_eq!(map("aa").unwrap(), "net/minecraft/server/Test");
        assert_eq!(map("aa$a").unwrap(), "net/minecraft/server/Test$InnerClass");
        assert_eq!(map("aa$b"), None);
        assert_eq!(map("aa$a$b"), None);
        assert_eq!(map("aa$1").unwrap(), "net/minecraft/server/Test$1");
        assert_eq!(
            map("aa$a$1").unwrap(),
            "net/minecraft/server/Test$InnerClass$1"
        );
        assert_eq!(map("aa$1$0").unwrap(), "net/minecraft/server/Test$1$0");
        assert_eq!(map("aa$99").unwrap(), "net/minecraft/server/Test$99");
        assert_eq!(
            map("aa$a$0$1").unwrap(),
            "net/minecraft/server/Test$InnerClass$0$1"
        );
        assert_eq!(
            map("aa$a$9999").unwrap(),
            "net/minecraft/server/Test$InnerClass$9999"
        );
    }

    #[test]
    fn inverse_recovers_original_names() {
        let table = table("aa Test\naa$a Test$InnerClass\n", "");
        assert_eq!(
            table.unmap_class("net/minecraft/server/Test").unwrap(),
            "aa"
        );
        assert_eq!(
            table.unmap_class("net/minecraft/server/Test$1").unwrap(),
            "aa$1"
        );
        assert_eq!(
            table
                .unmap_class("net/minecraft/server/Test$InnerClass$2$3")
                .unwrap(),
            "aa$a$2$3"
        );
        assert_eq!(table.unmap_class("net/minecraft/server/Unknown"), None);
    }

    #[test]
    fn malformed_class_lines_are_skipped() {
        let table = table("# comment\n\naa Test extra\nbb Other\n", "");
        assert_eq!(table.map_class("aa"), None);
        assert!(table.map_class("bb").is_some());
    }

    #[test]
    fn member_keys_are_qualified() {
        // Method descriptors in the feed are written against mapped type
        // names, minus the root prefix when the type is locally defined.
        let table = table(
            "aa Test\n",
            "aa someField newField\naa a (LTest;)V doSomething\n",
        );
        assert_eq!(
            table
                .field_name("net/minecraft/server/aa", "someField")
                .unwrap(),
            "newField"
        );
        // Bare descriptor types that are mapping values get the prefix.
        assert_eq!(
            table
                .method_name(
                    "net/minecraft/server/aa",
                    "a",
                    "(Lnet/minecraft/server/Test;)V"
                )
                .unwrap(),
            "doSomething"
        );
    }

    #[test]
    fn bad_member_descriptor_is_skipped() {
        let table = table("aa Test\n", "aa a (Q)V doSomething\naa b ()V run\n");
        assert_eq!(table.method_name("net/minecraft/server/aa", "b", "()V"), Some("run"));
        assert_eq!(table.member_count(), 1);
    }

    #[test]
    fn hash_columns_require_check_hashes() {
        let options = MappingOptions {
            check_hashes: true,
            ..MappingOptions::default()
        };
        let table = SymbolTable::from_readers(
            "aa Test d41d8cd98f00b204e9800998ecf8427e\nbb Other\n".as_bytes(),
            "".as_bytes(),
            &options,
        )
        .unwrap();
        assert_eq!(table.hash("aa").unwrap(), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            table.class_for_hash("d41d8cd98f00b204e9800998ecf8427e").unwrap(),
            "aa"
        );
        // Two-field line is malformed in hash mode.
        assert_eq!(table.map_class("bb"), None);
    }
}
