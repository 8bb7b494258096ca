//! Access flag words for classes, fields and methods.
//!
//! Flag words are carried verbatim as `u16` in the structural model so unknown
//! bits round-trip untouched; these types exist for inspection and for the one
//! flag the member pass is allowed to add (`BRIDGE`).

use bitflags::bitflags;

bitflags! {
    /// Access and property flags of a class.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClassAccessFlags: u16 {
        /// Declared public.
        const PUBLIC = 0x0001;
        /// Declared final.
        const FINAL = 0x0010;
        /// Treat superclass methods specially on invokespecial.
        const SUPER = 0x0020;
        /// Is an interface.
        const INTERFACE = 0x0200;
        /// Declared abstract.
        const ABSTRACT = 0x0400;
        /// Not present in the source code; generated by the compiler.
        const SYNTHETIC = 0x1000;
        /// Declared as an annotation interface.
        const ANNOTATION = 0x2000;
        /// Declared as an enum class.
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// Access and property flags of a field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldAccessFlags: u16 {
        /// Declared public.
        const PUBLIC = 0x0001;
        /// Declared private; never inherited.
        const PRIVATE = 0x0002;
        /// Declared protected.
        const PROTECTED = 0x0004;
        /// Declared static.
        const STATIC = 0x0008;
        /// Declared final.
        const FINAL = 0x0010;
        /// Declared volatile.
        const VOLATILE = 0x0040;
        /// Declared transient.
        const TRANSIENT = 0x0080;
        /// Not present in the source code; generated by the compiler.
        const SYNTHETIC = 0x1000;
        /// Declared as an enum constant.
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// Access and property flags of a method.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodAccessFlags: u16 {
        /// Declared public.
        const PUBLIC = 0x0001;
        /// Declared private; never inherited.
        const PRIVATE = 0x0002;
        /// Declared protected.
        const PROTECTED = 0x0004;
        /// Declared static.
        const STATIC = 0x0008;
        /// Declared final.
        const FINAL = 0x0010;
        /// Declared synchronized.
        const SYNCHRONIZED = 0x0020;
        /// Compiler-generated bridge method. Shares the bit value with the
        /// field `VOLATILE` flag, so it is only meaningful on methods.
        const BRIDGE = 0x0040;
        /// Declared with a variable number of arguments.
        const VARARGS = 0x0080;
        /// Declared native.
        const NATIVE = 0x0100;
        /// Declared abstract.
        const ABSTRACT = 0x0400;
        /// Declared strictfp.
        const STRICT = 0x0800;
        /// Not present in the source code; generated by the compiler.
        const SYNTHETIC = 0x1000;
    }
}

impl FieldAccessFlags {
    /// True when the flag word marks a compiler-generated static final field,
    /// the shape shared by all enum switch-map dispatch arrays.
    #[must_use]
    pub fn is_synthetic_constant(self) -> bool {
        self.contains(FieldAccessFlags::STATIC | FieldAccessFlags::FINAL | FieldAccessFlags::SYNTHETIC)
    }
}
