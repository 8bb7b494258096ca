//! Hierarchy-aware class lookup.
//!
//! Member resolution walks superclass and interface chains, repeatedly
//! touching the same handful of base classes. [`ClassGraph`] fronts the input
//! archive with a bounded concurrent cache of parsed classes so those walks
//! stay cheap without ever holding the whole archive decoded in memory.

use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    archive::JarReader,
    classfile::{ClassFile, MemberInfo},
    Result,
};

/// Default cache bound, in parsed classes.
pub const DEFAULT_CACHE_LIMIT: usize = 4096;

/// A parsed class plus the pre-extracted facts hierarchy walks ask for.
pub struct ClassEntry {
    /// Internal binary name.
    pub name: String,
    /// The parsed model.
    pub class: ClassFile,
    /// Direct superclass name, `None` for `java/lang/Object` (or a module).
    pub super_name: Option<String>,
    /// Directly implemented interface names.
    pub interface_names: Vec<String>,
}

impl ClassEntry {
    fn from_bytes(name: &str, data: &[u8]) -> Result<Self> {
        let class = ClassFile::parse(data)?;
        let super_name = class.super_class_name()?.map(str::to_string);
        let interface_names = class
            .interface_names()?
            .into_iter()
            .map(str::to_string)
            .collect();
        Ok(ClassEntry {
            name: name.to_string(),
            class,
            super_name,
            interface_names,
        })
    }

    /// Builds an entry straight from a payload, naming it after its own
    /// `this_class`. Fixture classes in tests are not always archive-backed.
    #[cfg(test)]
    pub(crate) fn from_test_bytes(data: &[u8]) -> Result<Self> {
        let name = ClassFile::parse(data)?.this_class_name()?.to_string();
        Self::from_bytes(&name, data)
    }

    /// Finds a declared field by name and descriptor.
    pub fn field(&self, name: &str, descriptor: &str) -> Result<Option<&MemberInfo>> {
        self.class.find_field(name, descriptor)
    }

    /// Finds a declared method by name and descriptor.
    pub fn method(&self, name: &str, descriptor: &str) -> Result<Option<&MemberInfo>> {
        self.class.find_method(name, descriptor)
    }
}

/// Bounded cache of parsed classes over an input archive.
///
/// Lookups return `Ok(None)` when the archive simply does not contain the
/// class (library types reached during a hierarchy walk); a present entry
/// that fails to parse is an error. On overflow the cache is cleared
/// wholesale rather than evicted piecemeal; entries are re-fetchable and
/// outstanding `Arc` clones keep in-flight walks valid.
pub struct ClassGraph<'a> {
    reader: &'a JarReader,
    cache: DashMap<String, Arc<ClassEntry>>,
    limit: usize,
}

impl<'a> ClassGraph<'a> {
    /// Creates a graph over `reader` with the default cache bound.
    #[must_use]
    pub fn new(reader: &'a JarReader) -> Self {
        Self::with_limit(reader, DEFAULT_CACHE_LIMIT)
    }

    /// Creates a graph over `reader` with an explicit cache bound.
    #[must_use]
    pub fn with_limit(reader: &'a JarReader, limit: usize) -> Self {
        ClassGraph {
            reader,
            cache: DashMap::new(),
            limit: limit.max(1),
        }
    }

    /// True when the archive contains a class entry for this name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.reader.has_class(name)
    }

    /// Resolves a class by internal name, parsing and caching on first use.
    /// `Ok(None)` means the archive does not contain the class.
    pub fn resolve(&self, name: &str) -> Result<Option<Arc<ClassEntry>>> {
        if let Some(entry) = self.cache.get(name) {
            return Ok(Some(Arc::clone(entry.value())));
        }
        let Some(data) = self.reader.read_class(name)? else {
            return Ok(None);
        };
        let entry = Arc::new(ClassEntry::from_bytes(name, &data)?);
        if self.cache.len() >= self.limit {
            self.cache.clear();
        }
        self.cache.insert(name.to_string(), Arc::clone(&entry));
        Ok(Some(entry))
    }

    /// Number of classes currently cached.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}
