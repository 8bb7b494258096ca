//! Descriptor and generic-signature handling.
//!
//! Descriptors use the binary format's compact encoding: single-letter
//! primitive codes, `[` for each array dimension, `L<internal-name>;` for
//! object types and `(<params>)<return>` for methods. Class renaming has to
//! reach into every one of these, so this module provides a tokenizer plus
//! substitution functions that apply a class-name mapper to each embedded
//! object type while leaving everything else untouched.

use crate::{Error, Result};

/// A mapper from an old internal class name to its replacement, `None` when
/// the name is unmapped.
pub trait ClassNameMapper {
    /// Maps one internal name.
    fn map_class(&self, name: &str) -> Option<String>;
}

impl<F> ClassNameMapper for F
where
    F: Fn(&str) -> Option<String>,
{
    fn map_class(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// Splits a field/type descriptor into its parts, returning the consumed
/// length. Used both by the substitution below and by mapping-file ingestion.
fn type_length(descriptor: &str, start: usize) -> Result<usize> {
    let bytes = descriptor.as_bytes();
    let mut position = start;
    while bytes.get(position) == Some(&b'[') {
        position += 1;
    }
    match bytes.get(position) {
        Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b'V') => {
            Ok(position + 1 - start)
        }
        Some(b'L') => {
            let end = descriptor[position..]
                .find(';')
                .ok_or_else(|| Error::InvalidDescriptor(descriptor.to_string()))?;
            Ok(position + end + 1 - start)
        }
        _ => Err(Error::InvalidDescriptor(descriptor.to_string())),
    }
}

/// Returns the parameter type descriptors of a method descriptor as slices.
pub fn parameter_types(descriptor: &str) -> Result<Vec<&str>> {
    if !descriptor.starts_with('(') {
        return Err(Error::InvalidDescriptor(descriptor.to_string()));
    }
    let close = descriptor
        .find(')')
        .ok_or_else(|| Error::InvalidDescriptor(descriptor.to_string()))?;
    let params = &descriptor[1..close];
    let mut types = Vec::new();
    let mut position = 0;
    while position < params.len() {
        let length = type_length(params, position)?;
        types.push(&params[position..position + length]);
        position += length;
    }
    Ok(types)
}

/// Returns the return type descriptor of a method descriptor as a slice.
pub fn return_type(descriptor: &str) -> Result<&str> {
    let close = descriptor
        .find(')')
        .ok_or_else(|| Error::InvalidDescriptor(descriptor.to_string()))?;
    let ret = &descriptor[close + 1..];
    let length = type_length(ret, 0)?;
    if length != ret.len() {
        return Err(Error::InvalidDescriptor(descriptor.to_string()));
    }
    Ok(ret)
}

/// For an object or object-array type descriptor, the embedded internal name.
#[must_use]
pub fn object_name(type_descriptor: &str) -> Option<&str> {
    let stripped = type_descriptor.trim_start_matches('[');
    stripped.strip_prefix('L')?.strip_suffix(';')
}

/// Applies `mapper` to the object type inside a single type descriptor.
/// Returns `None` when nothing changed.
pub fn map_type<M: ClassNameMapper>(type_descriptor: &str, mapper: &M) -> Option<String> {
    let name = object_name(type_descriptor)?;
    let mapped = mapper.map_class(name)?;
    let dimensions = type_descriptor.len() - name.len() - 2;
    let mut out = String::with_capacity(dimensions + mapped.len() + 2);
    out.push_str(&type_descriptor[..dimensions]);
    out.push('L');
    out.push_str(&mapped);
    out.push(';');
    Some(out)
}

/// Applies `mapper` to every object type in a field or method descriptor.
/// Returns `None` when nothing changed.
pub fn map_descriptor<M: ClassNameMapper>(descriptor: &str, mapper: &M) -> Result<Option<String>> {
    let mut out = String::with_capacity(descriptor.len());
    let mut changed = false;
    let mut position = 0;
    let bytes = descriptor.as_bytes();
    while position < bytes.len() {
        match bytes[position] {
            b'(' | b')' => {
                out.push(bytes[position] as char);
                position += 1;
            }
            _ => {
                let length = type_length(descriptor, position)?;
                let part = &descriptor[position..position + length];
                match map_type(part, mapper) {
                    Some(mapped) => {
                        out.push_str(&mapped);
                        changed = true;
                    }
                    None => out.push_str(part),
                }
                position += length;
            }
        }
    }
    Ok(if changed { Some(out) } else { None })
}

/// Applies `mapper` to every class name in a generic `Signature` attribute
/// string (class, field or method form). Returns `None` when nothing changed.
///
/// This is a small recursive-descent pass over the signature grammar; it maps
/// the leading name of each class type signature and leaves `.`-separated
/// inner suffixes alone, matching how nested names are rewritten through the
/// `InnerClasses` records instead.
pub fn map_signature<M: ClassNameMapper>(signature: &str, mapper: &M) -> Result<Option<String>> {
    let mut rewriter = SignatureRewriter {
        input: signature.as_bytes(),
        source: signature,
        position: 0,
        out: String::with_capacity(signature.len()),
        changed: false,
        mapper,
    };
    if rewriter.peek() == Some(b'<') {
        rewriter.formal_parameters()?;
    }
    if rewriter.peek() == Some(b'(') {
        rewriter.take(); // '('
        while rewriter.peek() != Some(b')') {
            rewriter.type_signature()?;
        }
        rewriter.take(); // ')'
        rewriter.type_signature()?;
        while rewriter.peek() == Some(b'^') {
            rewriter.take();
            rewriter.type_signature()?;
        }
    } else {
        // Class signature: superclass followed by interfaces. A bare field
        // signature is a single reference type and falls out of the same loop.
        while rewriter.position < rewriter.input.len() {
            rewriter.type_signature()?;
        }
    }
    if rewriter.position != rewriter.input.len() {
        return Err(Error::InvalidDescriptor(signature.to_string()));
    }
    Ok(if rewriter.changed {
        Some(rewriter.out)
    } else {
        None
    })
}

struct SignatureRewriter<'a, M> {
    input: &'a [u8],
    source: &'a str,
    position: usize,
    out: String,
    changed: bool,
    mapper: &'a M,
}

impl<M: ClassNameMapper> SignatureRewriter<'_, M> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    fn take(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.out.push(byte as char);
        self.position += 1;
        Some(byte)
    }

    /// Copies identifier bytes up to (not including) a stop byte. Identifiers
    /// may contain arbitrary UTF-8, so the copy is slice-based.
    fn copy_until(&mut self, stops: &[u8]) -> Result<()> {
        let start = self.position;
        while let Some(byte) = self.peek() {
            if stops.contains(&byte) {
                self.out.push_str(&self.source[start..self.position]);
                return Ok(());
            }
            self.position += 1;
        }
        Err(Error::InvalidDescriptor(self.source.to_string()))
    }

    fn formal_parameters(&mut self) -> Result<()> {
        self.take(); // '<'
        while self.peek() != Some(b'>') {
            self.copy_until(&[b':'])?; // identifier
            self.take(); // ':'
            // Class bound may be absent; interface bounds follow with ':'.
            if !matches!(self.peek(), Some(b':') | Some(b'>')) {
                self.type_signature()?;
            }
            while self.peek() == Some(b':') {
                self.take();
                self.type_signature()?;
            }
        }
        self.take(); // '>'
        Ok(())
    }

    fn type_signature(&mut self) -> Result<()> {
        match self.peek() {
            Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b'V' | b'*') => {
                self.take();
                Ok(())
            }
            Some(b'[') | Some(b'+') | Some(b'-') => {
                self.take();
                self.type_signature()
            }
            Some(b'T') => {
                self.take();
                self.copy_until(&[b';'])?;
                self.take();
                Ok(())
            }
            Some(b'L') => self.class_type_signature(),
            _ => Err(Error::InvalidDescriptor(self.source.to_string())),
        }
    }

    fn class_type_signature(&mut self) -> Result<()> {
        self.out.push('L');
        self.position += 1;
        let start = self.position;
        while !matches!(self.peek(), Some(b';') | Some(b'<') | Some(b'.') | None) {
            self.position += 1;
        }
        let name = &self.source[start..self.position];
        match self.mapper.map_class(name) {
            Some(mapped) => {
                self.out.push_str(&mapped);
                self.changed = true;
            }
            None => self.out.push_str(name),
        }
        loop {
            match self.peek() {
                Some(b'<') => {
                    self.take();
                    while self.peek() != Some(b'>') {
                        self.type_signature()?;
                    }
                    self.take();
                }
                Some(b'.') => {
                    // Inner-class suffix: copy the simple name verbatim.
                    self.take();
                    let start = self.position;
                    while !matches!(self.peek(), Some(b';') | Some(b'<') | Some(b'.') | None) {
                        self.position += 1;
                    }
                    self.out.push_str(&self.source[start..self.position]);
                }
                Some(b';') => {
                    self.take();
                    return Ok(());
                }
                _ => return Err(Error::InvalidDescriptor(self.source.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_mapper<'a>(old: &'a str, new: &'a str) -> impl ClassNameMapper + 'a {
        move |name: &str| {
            if name == old {
                Some(new.to_string())
            } else {
                None
            }
        }
    }

    #[test]
    fn parameter_and_return_types() {
        let params = parameter_types("(I[Laa;J)Laa;").unwrap();
        assert_eq!(params, vec!["I", "[Laa;", "J"]);
        assert_eq!(return_type("(I[Laa;J)Laa;").unwrap(), "Laa;");
        assert_eq!(return_type("()V").unwrap(), "V");
    }

    #[test]
    fn invalid_descriptor_is_rejected() {
        assert!(parameter_types("I)V").is_err());
        assert!(parameter_types("(Q)V").is_err());
        assert!(return_type("(I)Laa").is_err());
    }

    #[test]
    fn maps_object_and_array_types() {
        let mapper = simple_mapper("aa", "net/minecraft/server/Test");
        assert_eq!(
            map_type("Laa;", &mapper).unwrap(),
            "Lnet/minecraft/server/Test;"
        );
        assert_eq!(
            map_type("[[Laa;", &mapper).unwrap(),
            "[[Lnet/minecraft/server/Test;"
        );
        assert!(map_type("I", &mapper).is_none());
        assert!(map_type("Lbb;", &mapper).is_none());
    }

    #[test]
    fn maps_method_descriptors() {
        let mapper = simple_mapper("aa", "Test");
        assert_eq!(
            map_descriptor("(ILaa;[Laa;)Laa;", &mapper).unwrap().unwrap(),
            "(ILTest;[LTest;)LTest;"
        );
        assert!(map_descriptor("(I)V", &mapper).unwrap().is_none());
    }

    #[test]
    fn maps_generic_signatures() {
        let mapper = simple_mapper("aa", "Test");
        assert_eq!(
            map_signature("Ljava/util/List<Laa;>;", &mapper)
                .unwrap()
                .unwrap(),
            "Ljava/util/List<LTest;>;"
        );
        assert_eq!(
            map_signature("<E:Laa;>(TE;)Laa;", &mapper).unwrap().unwrap(),
            "<E:LTest;>(TE;)LTest;"
        );
        assert!(map_signature("Ljava/lang/Object;", &mapper)
            .unwrap()
            .is_none());
    }
}
