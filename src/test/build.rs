//! In-memory classfile construction for tests.
//!
//! Fixture classes are assembled through the same structural model the
//! rewriting passes consume, then serialized with the production writer, so
//! every fixture is by construction a payload the parser accepts.

use crate::classfile::{
    attributes::{self, CodeAttribute},
    AttributeInfo, ClassFile, ConstantPool, CpEntry, MemberInfo,
};

/// Incrementally assembles a classfile for tests.
pub(crate) struct ClassBuilder {
    entries: Vec<CpEntry>,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<MemberInfo>,
    methods: Vec<MemberInfo>,
    attributes: Vec<AttributeInfo>,
}

impl ClassBuilder {
    /// Starts a public class with the given internal name and superclass.
    pub fn new(name: &str, super_name: Option<&str>) -> Self {
        let mut builder = ClassBuilder {
            entries: vec![CpEntry::Unusable],
            access_flags: 0x0021, // public super
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        };
        builder.this_class = builder.class(name);
        if let Some(super_name) = super_name {
            builder.super_class = builder.class(super_name);
        }
        builder
    }

    /// Overrides the class access flag word.
    pub fn set_class_flags(&mut self, flags: u16) {
        self.access_flags = flags;
    }

    /// Adds a directly implemented interface.
    pub fn add_interface(&mut self, name: &str) {
        let index = self.class(name);
        self.interfaces.push(index);
    }

    /// Adds a field with no attributes.
    pub fn add_field(&mut self, flags: u16, name: &str, descriptor: &str) {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.fields.push(MemberInfo {
            access_flags: flags,
            name_index,
            descriptor_index,
            attributes: Vec::new(),
        });
    }

    /// Adds a method whose body is the given instruction bytes, wrapped in a
    /// `Code` attribute with generous frame limits.
    pub fn add_method(&mut self, flags: u16, name: &str, descriptor: &str, code: &[u8]) {
        let body = CodeAttribute {
            max_stack: 8,
            max_locals: 8,
            code: code.to_vec(),
            exception_table: Vec::new(),
            attributes: Vec::new(),
        };
        let info = body.to_bytes();
        let attribute_name = self.utf8(attributes::CODE);
        self.add_method_raw(
            flags,
            name,
            descriptor,
            vec![AttributeInfo {
                name_index: attribute_name,
                info,
            }],
        );
    }

    /// Adds a bodyless method (abstract or native).
    pub fn add_method_abstract(&mut self, flags: u16, name: &str, descriptor: &str) {
        self.add_method_raw(flags, name, descriptor, Vec::new());
    }

    /// Adds a method with caller-supplied attributes.
    pub fn add_method_raw(
        &mut self,
        flags: u16,
        name: &str,
        descriptor: &str,
        attributes: Vec<AttributeInfo>,
    ) {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.methods.push(MemberInfo {
            access_flags: flags,
            name_index,
            descriptor_index,
            attributes,
        });
    }

    /// Adds a class-level attribute with a raw payload.
    pub fn add_class_attribute(&mut self, name: &str, info: Vec<u8>) {
        let name_index = self.utf8(name);
        self.attributes.push(AttributeInfo { name_index, info });
    }

    /// Interns a `Utf8` entry and returns its index.
    pub fn utf8(&mut self, value: &str) -> u16 {
        for (index, entry) in self.entries.iter().enumerate() {
            if matches!(entry, CpEntry::Utf8(bytes) if bytes == value.as_bytes()) {
                return index as u16;
            }
        }
        self.push(CpEntry::Utf8(value.as_bytes().to_vec()))
    }

    /// Interns a `Class` entry and returns its index.
    pub fn class(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        for (index, entry) in self.entries.iter().enumerate() {
            if matches!(entry, CpEntry::Class { name_index: n } if *n == name_index) {
                return index as u16;
            }
        }
        self.push(CpEntry::Class { name_index })
    }

    /// Interns a `String` entry over the given literal.
    pub fn add_string(&mut self, value: &str) -> u16 {
        let string_index = self.utf8(value);
        self.push(CpEntry::String { string_index })
    }

    /// Interns a `Fieldref` and returns its index.
    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(owner);
        let name_and_type_index = self.nat(name, descriptor);
        self.push(CpEntry::Fieldref {
            class_index,
            name_and_type_index,
        })
    }

    /// Interns a `Methodref` and returns its index.
    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(owner);
        let name_and_type_index = self.nat(name, descriptor);
        self.push(CpEntry::Methodref {
            class_index,
            name_and_type_index,
        })
    }

    fn nat(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        for (index, entry) in self.entries.iter().enumerate() {
            if matches!(
                entry,
                CpEntry::NameAndType { name_index: n, descriptor_index: d }
                    if *n == name_index && *d == descriptor_index
            ) {
                return index as u16;
            }
        }
        self.push(CpEntry::NameAndType {
            name_index,
            descriptor_index,
        })
    }

    fn push(&mut self, entry: CpEntry) -> u16 {
        let index = self.entries.len() as u16;
        self.entries.push(entry);
        index
    }

    /// Assembles the structural model.
    pub fn build(&self) -> ClassFile {
        ClassFile {
            minor_version: 0,
            major_version: 52,
            pool: ConstantPool::new(self.entries.clone()),
            access_flags: self.access_flags,
            this_class: self.this_class,
            super_class: self.super_class,
            interfaces: self.interfaces.clone(),
            fields: self.fields.clone(),
            methods: self.methods.clone(),
            attributes: self.attributes.clone(),
        }
    }

    /// Serializes the fixture to a class payload.
    pub fn bytes(&self) -> Vec<u8> {
        self.build().to_bytes().expect("fixture serialization")
    }
}

/// The smallest useful fixture: an empty public class.
pub(crate) fn minimal_class(name: &str, super_name: Option<&str>) -> Vec<u8> {
    ClassBuilder::new(name, super_name).bytes()
}
