//! Recovery of names the obfuscator destroyed on compiler-generated members.
//!
//! Two shapes are recovered. Bridge methods: the compiler emits a synthetic
//! delegate when a generic method is overridden with a narrower type, and the
//! obfuscator renames the delegation target while leaving the bridge's
//! source-visible name alone, so the bridge's own name is the target's real
//! name. Enum switch maps: `switch` over an enum compiles to a synthetic
//! holder class with one `int[]` dispatch field per enum, whose conventional
//! `$SwitchMap$<enum>` name the obfuscator replaces; the field's initializer
//! names the enum, so the conventional name can be rebuilt from it.
//!
//! Both analyzers memoize per member and per class; a whole remapping pass
//! funnels every reference through them.

use dashmap::{DashMap, DashSet};

use crate::{
    classfile::{
        attributes::{self, CodeAttribute},
        code::{self, opcodes},
        ClassAccessFlags, FieldAccessFlags, MethodAccessFlags, CLINIT_DESCRIPTOR, CLINIT_NAME,
    },
    graph::ClassEntry,
    Error, Result,
};

use super::MemberKey;

/// Conventional name prefix of enum switch-map dispatch fields.
pub const SWITCH_MAP_PREFIX: &str = "$SwitchMap$";
/// Descriptor every switch-map dispatch field carries.
pub const SWITCH_MAP_DESCRIPTOR: &str = "[I";

/// Recovers the source names of renamed bridge-method targets.
pub struct BridgeAnalyzer {
    /// Memoized recovery results per target, negatives included.
    cache: DashMap<MemberKey, Option<String>>,
    /// Synthetic invokers found without the `BRIDGE` flag; the member pass
    /// re-adds the flag so decompilers hide them again.
    add_bridge_flags: DashSet<MemberKey>,
}

impl BridgeAnalyzer {
    /// Creates an analyzer with empty caches.
    #[must_use]
    pub fn new() -> Self {
        BridgeAnalyzer {
            cache: DashMap::new(),
            add_bridge_flags: DashSet::new(),
        }
    }

    /// Looks for a bridge method in `entry` that delegates to
    /// `name`/`descriptor`, returning the bridge's name when found.
    pub fn recover(
        &self,
        entry: &ClassEntry,
        name: &str,
        descriptor: &str,
    ) -> Result<Option<String>> {
        let key = MemberKey::new(&entry.name, name, descriptor);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }
        let result = self.recover_uncached(entry, name, descriptor)?;
        self.cache.insert(key, result.clone());
        Ok(result)
    }

    /// True when `recover` found this method to be a flag-stripped bridge.
    #[must_use]
    pub fn needs_bridge_flag(&self, owner: &str, name: &str, descriptor: &str) -> bool {
        self.add_bridge_flags
            .contains(&MemberKey::new(owner, name, descriptor))
    }

    fn recover_uncached(
        &self,
        entry: &ClassEntry,
        name: &str,
        descriptor: &str,
    ) -> Result<Option<String>> {
        // The target has to be declared here; a reference to an inherited
        // method cannot have a bridge in this class.
        if entry.method(name, descriptor)?.is_none() {
            return Ok(None);
        }
        let pool = &entry.class.pool;
        for method in &entry.class.methods {
            let flags = MethodAccessFlags::from_bits_retain(method.access_flags);
            if !flags.intersects(MethodAccessFlags::SYNTHETIC | MethodAccessFlags::BRIDGE) {
                continue;
            }
            let Some(code_attribute) = method.attribute(pool, attributes::CODE)? else {
                continue;
            };
            let body = CodeAttribute::parse(&code_attribute.info)?;
            for instruction in code::scan(&body.code)? {
                if !instruction.is_member_invoke() {
                    continue;
                }
                let index = instruction.pool_index(&body.code)?;
                let (ref_owner, ref_name, ref_descriptor) = pool.member_ref(index)?;
                if ref_owner != entry.name || ref_name != name || ref_descriptor != descriptor {
                    continue;
                }
                let invoker_name = method.name(pool)?;
                if invoker_name == name {
                    continue;
                }
                if flags.contains(MethodAccessFlags::SYNTHETIC)
                    && !flags.contains(MethodAccessFlags::BRIDGE)
                {
                    self.add_bridge_flags.insert(MemberKey::new(
                        &entry.name,
                        invoker_name,
                        method.descriptor(pool)?,
                    ));
                }
                return Ok(Some(invoker_name.to_string()));
            }
        }
        Ok(None)
    }
}

impl Default for BridgeAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Recovers the conventional names of enum switch-map dispatch fields.
pub struct SwitchMapAnalyzer {
    /// Memoized host precondition per class.
    hosts: DashMap<String, bool>,
}

impl SwitchMapAnalyzer {
    /// Creates an analyzer with an empty host cache.
    #[must_use]
    pub fn new() -> Self {
        SwitchMapAnalyzer {
            hosts: DashMap::new(),
        }
    }

    /// Rebuilds the `$SwitchMap$<enum>` name for a renamed dispatch field.
    ///
    /// Returns `Ok(None)` when `entry` is not a switch-map host or the field
    /// is not a dispatch array. Once the host precondition holds, a dispatch
    /// field whose initializer does not match the compiler's fixed shape is a
    /// fatal [`Error::InstructionShape`]: continuing would emit wrong names.
    pub fn recover(
        &self,
        entry: &ClassEntry,
        name: &str,
        descriptor: &str,
    ) -> Result<Option<String>> {
        if !self.is_host(entry)? {
            return Ok(None);
        }
        let Some(field) = entry.field(name, descriptor)? else {
            return Ok(None);
        };
        if descriptor != SWITCH_MAP_DESCRIPTOR
            || !FieldAccessFlags::from_bits_retain(field.access_flags).is_synthetic_constant()
        {
            return Ok(None);
        }
        let Some(initializer) = entry.method(CLINIT_NAME, CLINIT_DESCRIPTOR)? else {
            return Ok(None);
        };
        let pool = &entry.class.pool;
        let Some(code_attribute) = initializer.attribute(pool, attributes::CODE)? else {
            return Ok(None);
        };
        let body = CodeAttribute::parse(&code_attribute.info)?;
        let instructions = code::scan(&body.code)?;
        for (position, instruction) in instructions.iter().enumerate() {
            if instruction.opcode != opcodes::PUTSTATIC {
                continue;
            }
            let index = instruction.pool_index(&body.code)?;
            let (ref_owner, ref_name, ref_descriptor) = pool.member_ref(index)?;
            if ref_owner != entry.name || ref_name != name || ref_descriptor != descriptor {
                continue;
            }
            // The dispatch array is always initialized as
            //   invokestatic <Enum>.values(); arraylength; newarray int;
            //   putstatic <field>
            // so the enum is named three instructions back.
            let values_call = position.checked_sub(3).map(|p| &instructions[p]).ok_or_else(|| {
                Error::InstructionShape(format!(
                    "putstatic to {}.{} has no initializer sequence before it",
                    entry.name, name
                ))
            })?;
            if values_call.opcode != opcodes::INVOKESTATIC {
                return Err(Error::InstructionShape(format!(
                    "expected invokestatic before switch-map store, found opcode 0x{:02x}",
                    values_call.opcode
                )));
            }
            let callee_index = values_call.pool_index(&body.code)?;
            let (enum_owner, callee_name, _) = pool.member_ref(callee_index)?;
            if callee_name != "values" {
                return Err(Error::InstructionShape(format!(
                    "expected a values() call before switch-map store, found {}",
                    callee_name
                )));
            }
            return Ok(Some(format!(
                "{SWITCH_MAP_PREFIX}{}",
                enum_owner.replace('/', "$")
            )));
        }
        Ok(None)
    }

    /// The host precondition: a synthetic class with a static initializer and
    /// at least one dispatch-shaped `int[]` field still carrying an
    /// obfuscated name.
    fn is_host(&self, entry: &ClassEntry) -> Result<bool> {
        if let Some(cached) = self.hosts.get(&entry.name) {
            return Ok(*cached);
        }
        let result = Self::check_host(entry)?;
        self.hosts.insert(entry.name.clone(), result);
        Ok(result)
    }

    fn check_host(entry: &ClassEntry) -> Result<bool> {
        if !entry.class.flags().contains(ClassAccessFlags::SYNTHETIC) {
            return Ok(false);
        }
        if entry.method(CLINIT_NAME, CLINIT_DESCRIPTOR)?.is_none() {
            return Ok(false);
        }
        let pool = &entry.class.pool;
        for field in &entry.class.fields {
            if field.name(pool)?.starts_with(SWITCH_MAP_PREFIX) {
                continue;
            }
            if field.descriptor(pool)? == SWITCH_MAP_DESCRIPTOR
                && FieldAccessFlags::from_bits_retain(field.access_flags).is_synthetic_constant()
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Default for SwitchMapAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
