//! Member-name resolution.
//!
//! Given a member reference as it appears in bytecode, [`MemberResolver`]
//! decides what the member should be called in the output. Resolution layers
//! four sources, in order: the exact mapping table, the declaring ancestor
//! found by walking the class hierarchy, the synthetic-member recovery
//! heuristics in [`synthetic`], and finally the original name unchanged
//! (signalled by `Ok(None)` so callers can tell "keep" from "rename").

pub mod synthetic;

use std::collections::HashSet;

use crate::{
    classfile::{FieldAccessFlags, MethodAccessFlags},
    graph::ClassGraph,
    mappings::SymbolTable,
    Result,
};

use synthetic::{BridgeAnalyzer, SwitchMapAnalyzer};

/// Identity of one field or method. For fields the descriptor still
/// participates so hierarchy walks and heuristic caches stay precise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberKey {
    /// Internal name of the owning class.
    pub owner: String,
    /// Member name.
    pub name: String,
    /// Member descriptor.
    pub descriptor: String,
}

impl MemberKey {
    /// Builds a key from borrowed parts.
    #[must_use]
    pub fn new(owner: &str, name: &str, descriptor: &str) -> Self {
        MemberKey {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

/// Resolves member names against the mapping table, the class hierarchy and
/// the synthetic-member heuristics.
///
/// The resolver is constructed once per run; the analyzer caches inside it
/// are keyed by owner and member so repeated references resolve from memory.
pub struct MemberResolver<'a> {
    table: &'a SymbolTable,
    graph: &'a ClassGraph<'a>,
    bridges: BridgeAnalyzer,
    switch_maps: SwitchMapAnalyzer,
}

impl<'a> MemberResolver<'a> {
    /// Creates a resolver over a loaded table and class graph.
    #[must_use]
    pub fn new(table: &'a SymbolTable, graph: &'a ClassGraph<'a>) -> Self {
        MemberResolver {
            table,
            graph,
            bridges: BridgeAnalyzer::new(),
            switch_maps: SwitchMapAnalyzer::new(),
        }
    }

    /// Resolves the output name of a field reference. `Ok(None)` means the
    /// original name stands.
    pub fn resolve_field_name(
        &self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<Option<String>> {
        self.resolve_field_inner(owner, name, descriptor, &mut HashSet::new())
    }

    /// Resolves the output name of a method reference. `Ok(None)` means the
    /// original name stands.
    pub fn resolve_method_name(
        &self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<Option<String>> {
        self.resolve_method_inner(owner, name, descriptor, &mut HashSet::new())
    }

    /// True when bridge recovery determined this method is a bridge that the
    /// obfuscator stripped the `BRIDGE` flag from.
    #[must_use]
    pub fn needs_bridge_flag(&self, owner: &str, name: &str, descriptor: &str) -> bool {
        self.bridges.needs_bridge_flag(owner, name, descriptor)
    }

    /// Exact table lookup under both owner-name spaces.
    ///
    /// Member feeds are authored against the names the classes carry after
    /// class renaming, but some feeds key by the original obfuscated owner
    /// instead; the original-space key is preferred, the encountered name is
    /// the fallback.
    fn lookup_field(&self, owner: &str, name: &str) -> Option<String> {
        if let Some(original) = self.table.unmap_class(owner) {
            let key = self.table.qualify(&original);
            if let Some(mapped) = self.table.field_name(&key, name) {
                return Some(mapped.to_string());
            }
        }
        self.table.field_name(owner, name).map(str::to_string)
    }

    fn lookup_method(&self, owner: &str, name: &str, descriptor: &str) -> Option<String> {
        if let Some(original) = self.table.unmap_class(owner) {
            let key = self.table.qualify(&original);
            if let Some(mapped) = self.table.method_name(&key, name, descriptor) {
                return Some(mapped.to_string());
            }
        }
        self.table
            .method_name(owner, name, descriptor)
            .map(str::to_string)
    }

    fn resolve_field_inner(
        &self,
        owner: &str,
        name: &str,
        descriptor: &str,
        seen: &mut HashSet<String>,
    ) -> Result<Option<String>> {
        if !seen.insert(owner.to_string()) {
            return Ok(None);
        }
        if let Some(mapped) = self.lookup_field(owner, name) {
            return Ok(Some(mapped));
        }
        if let Some(declarer) =
            self.field_declarer(owner, name, descriptor, true, &mut HashSet::new())?
        {
            // Resolve at the ancestor that actually declares the field; the
            // heuristics below then run against that class, not this one.
            return self.resolve_field_inner(&declarer, name, descriptor, seen);
        }
        if owner.starts_with(self.table.root_namespace()) {
            if let Some(entry) = self.graph.resolve(owner)? {
                if let Some(recovered) = self.switch_maps.recover(&entry, name, descriptor)? {
                    return Ok(Some(recovered));
                }
            }
        }
        Ok(None)
    }

    fn resolve_method_inner(
        &self,
        owner: &str,
        name: &str,
        descriptor: &str,
        seen: &mut HashSet<String>,
    ) -> Result<Option<String>> {
        if !seen.insert(owner.to_string()) {
            return Ok(None);
        }
        if let Some(mapped) = self.lookup_method(owner, name, descriptor) {
            return Ok(Some(mapped));
        }
        if let Some(declarer) =
            self.method_declarer(owner, name, descriptor, true, &mut HashSet::new())?
        {
            return self.resolve_method_inner(&declarer, name, descriptor, seen);
        }
        if owner.starts_with(self.table.root_namespace()) {
            if let Some(entry) = self.graph.resolve(owner)? {
                if let Some(recovered) = self.bridges.recover(&entry, name, descriptor)? {
                    return Ok(Some(recovered));
                }
            }
        }
        Ok(None)
    }

    /// Walks the hierarchy for the nearest ancestor declaring `name`/
    /// `descriptor` as a field. With `skip_first` the starting class's own
    /// declaration is passed over, so the walk answers "who did this class
    /// inherit it from". A private declaration ends its branch: private
    /// members are never inherited, so a match behind one is coincidental.
    fn field_declarer(
        &self,
        owner: &str,
        name: &str,
        descriptor: &str,
        skip_first: bool,
        visited: &mut HashSet<String>,
    ) -> Result<Option<String>> {
        if !visited.insert(owner.to_string()) {
            return Ok(None);
        }
        let Some(entry) = self.graph.resolve(owner)? else {
            return Ok(None);
        };
        if let Some(field) = entry.field(name, descriptor)? {
            if FieldAccessFlags::from_bits_retain(field.access_flags)
                .contains(FieldAccessFlags::PRIVATE)
            {
                return Ok(None);
            }
            if !skip_first {
                return Ok(Some(entry.name.clone()));
            }
        }
        if let Some(super_name) = &entry.super_name {
            if let Some(found) =
                self.field_declarer(super_name, name, descriptor, false, visited)?
            {
                return Ok(Some(found));
            }
        }
        for interface in &entry.interface_names {
            if let Some(found) = self.field_declarer(interface, name, descriptor, false, visited)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn method_declarer(
        &self,
        owner: &str,
        name: &str,
        descriptor: &str,
        skip_first: bool,
        visited: &mut HashSet<String>,
    ) -> Result<Option<String>> {
        if !visited.insert(owner.to_string()) {
            return Ok(None);
        }
        let Some(entry) = self.graph.resolve(owner)? else {
            return Ok(None);
        };
        if let Some(method) = entry.method(name, descriptor)? {
            if MethodAccessFlags::from_bits_retain(method.access_flags)
                .contains(MethodAccessFlags::PRIVATE)
            {
                return Ok(None);
            }
            if !skip_first {
                return Ok(Some(entry.name.clone()));
            }
        }
        if let Some(super_name) = &entry.super_name {
            if let Some(found) =
                self.method_declarer(super_name, name, descriptor, false, visited)?
            {
                return Ok(Some(found));
            }
        }
        for interface in &entry.interface_names {
            if let Some(found) =
                self.method_declarer(interface, name, descriptor, false, visited)?
            {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}
