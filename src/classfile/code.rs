//! Linear bytecode scanning.
//!
//! The synthetic-member heuristics never interpret bytecode; they only need to
//! walk a method body instruction by instruction and pull the constant pool
//! index out of member-access opcodes. [`scan`] decodes a `Code` body into a
//! flat instruction list using the fixed opcode length table (switches and
//! `wide` are the only variable-length forms).

use crate::{Error, Result};

/// Opcode constants the analyzers match on.
pub mod opcodes {
    /// `getstatic`
    pub const GETSTATIC: u8 = 0xb2;
    /// `putstatic`
    pub const PUTSTATIC: u8 = 0xb3;
    /// `getfield`
    pub const GETFIELD: u8 = 0xb4;
    /// `putfield`
    pub const PUTFIELD: u8 = 0xb5;
    /// `invokevirtual`
    pub const INVOKEVIRTUAL: u8 = 0xb6;
    /// `invokespecial`
    pub const INVOKESPECIAL: u8 = 0xb7;
    /// `invokestatic`
    pub const INVOKESTATIC: u8 = 0xb8;
    /// `invokeinterface`
    pub const INVOKEINTERFACE: u8 = 0xb9;
    /// `invokedynamic`
    pub const INVOKEDYNAMIC: u8 = 0xba;
    /// `tableswitch`
    pub const TABLESWITCH: u8 = 0xaa;
    /// `lookupswitch`
    pub const LOOKUPSWITCH: u8 = 0xab;
    /// `wide`
    pub const WIDE: u8 = 0xc4;
    /// `goto_w`
    pub const GOTO_W: u8 = 0xc8;
    /// `jsr_w`
    pub const JSR_W: u8 = 0xc9;
}

/// One decoded instruction: its offset, opcode and full encoded length.
#[derive(Debug, Clone, Copy)]
pub struct Instruction {
    /// Byte offset within the method body.
    pub offset: usize,
    /// The opcode byte.
    pub opcode: u8,
    /// Total encoded length including the opcode byte.
    pub length: usize,
}

impl Instruction {
    /// True for the four `invoke*` opcodes that carry a member reference
    /// (`invokedynamic` carries a call-site reference instead).
    #[must_use]
    pub fn is_member_invoke(&self) -> bool {
        (opcodes::INVOKEVIRTUAL..=opcodes::INVOKEINTERFACE).contains(&self.opcode)
    }

    /// The constant pool index operand of a member-access or `new`-family
    /// instruction (the big-endian `u16` directly after the opcode).
    pub fn pool_index(&self, code: &[u8]) -> Result<u16> {
        let bytes = code
            .get(self.offset + 1..self.offset + 3)
            .ok_or(Error::OutOfBounds)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }
}

/// Decodes a full method body into a flat instruction list.
pub fn scan(code: &[u8]) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    let mut offset = 0;
    while offset < code.len() {
        let opcode = code[offset];
        let length = instruction_length(code, offset)?;
        if offset + length > code.len() {
            return Err(Error::OutOfBounds);
        }
        instructions.push(Instruction {
            offset,
            opcode,
            length,
        });
        offset += length;
    }
    Ok(instructions)
}

fn instruction_length(code: &[u8], offset: usize) -> Result<usize> {
    let opcode = code[offset];
    let length = match opcode {
        0x00..=0x0f => 1,
        0x10 => 2,           // bipush
        0x11 => 3,           // sipush
        0x12 => 2,           // ldc
        0x13 | 0x14 => 3,    // ldc_w, ldc2_w
        0x15..=0x19 => 2,    // *load with index
        0x1a..=0x35 => 1,    // *load_<n>, *aload
        0x36..=0x3a => 2,    // *store with index
        0x3b..=0x83 => 1,    // *store_<n>, *astore, stack ops, arithmetic
        0x84 => 3,           // iinc
        0x85..=0x98 => 1,    // conversions, comparisons
        0x99..=0xa8 => 3,    // branches, goto, jsr
        0xa9 => 2,           // ret
        opcodes::TABLESWITCH => tableswitch_length(code, offset)?,
        opcodes::LOOKUPSWITCH => lookupswitch_length(code, offset)?,
        0xac..=0xb1 => 1,    // returns
        opcodes::GETSTATIC..=opcodes::INVOKESTATIC => 3,
        opcodes::INVOKEINTERFACE | opcodes::INVOKEDYNAMIC => 5,
        0xbb => 3,           // new
        0xbc => 2,           // newarray
        0xbd => 3,           // anewarray
        0xbe | 0xbf => 1,    // arraylength, athrow
        0xc0 | 0xc1 => 3,    // checkcast, instanceof
        0xc2 | 0xc3 => 1,    // monitorenter, monitorexit
        opcodes::WIDE => wide_length(code, offset)?,
        0xc5 => 4,           // multianewarray
        0xc6 | 0xc7 => 3,    // ifnull, ifnonnull
        opcodes::GOTO_W | opcodes::JSR_W => 5,
        _ => {
            return Err(malformed_error!(
                "Unsupported opcode 0x{:02x} at offset {}",
                opcode,
                offset
            ))
        }
    };
    Ok(length)
}

fn switch_padding(offset: usize) -> usize {
    (4 - ((offset + 1) % 4)) % 4
}

fn read_i32(code: &[u8], offset: usize) -> Result<i32> {
    let bytes = code.get(offset..offset + 4).ok_or(Error::OutOfBounds)?;
    Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn tableswitch_length(code: &[u8], offset: usize) -> Result<usize> {
    let padding = switch_padding(offset);
    let base = offset + 1 + padding;
    let low = read_i32(code, base + 4)?;
    let high = read_i32(code, base + 8)?;
    let count = high
        .checked_sub(low)
        .and_then(|v| v.checked_add(1))
        .filter(|v| *v >= 0)
        .ok_or_else(|| malformed_error!("Invalid tableswitch range {}..{}", low, high))?;
    Ok(1 + padding + 12 + (count as usize) * 4)
}

fn lookupswitch_length(code: &[u8], offset: usize) -> Result<usize> {
    let padding = switch_padding(offset);
    let base = offset + 1 + padding;
    let npairs = read_i32(code, base + 4)?;
    if npairs < 0 {
        return Err(malformed_error!("Invalid lookupswitch pair count {}", npairs));
    }
    Ok(1 + padding + 8 + (npairs as usize) * 8)
}

fn wide_length(code: &[u8], offset: usize) -> Result<usize> {
    let modified = *code.get(offset + 1).ok_or(Error::OutOfBounds)?;
    // wide iinc carries two u16 operands, every other wide form one.
    if modified == 0x84 {
        Ok(6)
    } else {
        Ok(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_fixed_width_instructions() {
        // iconst_0, putstatic #6, return
        let code = [0x03, 0xb3, 0x00, 0x06, 0xb1];
        let instructions = scan(&code).unwrap();
        assert_eq!(instructions.len(), 3);
        assert_eq!(instructions[1].opcode, opcodes::PUTSTATIC);
        assert_eq!(instructions[1].pool_index(&code).unwrap(), 6);
        assert_eq!(instructions[2].offset, 4);
    }

    #[test]
    fn tableswitch_padding_depends_on_offset() {
        // nop; tableswitch at offset 1 -> pad 2; default, low=0, high=1, two offsets
        let mut code = vec![0x00, opcodes::TABLESWITCH, 0x00, 0x00];
        code.extend_from_slice(&0i32.to_be_bytes()); // default
        code.extend_from_slice(&0i32.to_be_bytes()); // low
        code.extend_from_slice(&1i32.to_be_bytes()); // high
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        code.push(0xb1); // return
        let instructions = scan(&code).unwrap();
        assert_eq!(instructions.len(), 3);
        assert_eq!(instructions[1].length, 1 + 2 + 12 + 8);
        assert_eq!(instructions[2].opcode, 0xb1);
    }

    #[test]
    fn wide_iinc_is_six_bytes() {
        let code = [opcodes::WIDE, 0x84, 0x00, 0x01, 0x00, 0x02, 0xb1];
        let instructions = scan(&code).unwrap();
        assert_eq!(instructions[0].length, 6);
        assert_eq!(instructions[1].opcode, 0xb1);
    }

    #[test]
    fn unknown_opcode_is_malformed() {
        assert!(scan(&[0xcb]).is_err());
    }
}
