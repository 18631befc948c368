/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! The 32-bit encoded instruction word and the pure bit-packing that moves
//! a `(Opcode, rd, rs1, rs2, imm)` tuple into and out of it.
//!
//! Field layout, MSB to LSB: `opcode[31:26] rd[25:21] rs1[20:16] rs2[15:11]
//! imm[10:0]`. `imm` is two's-complement, sign bit at bit 10.
//!
//! `SETCLR` is the one opcode whose operand does not fit the 11-bit `imm`
//! field (it carries a 24-bit RGB color): for that opcode alone, the 26
//! bits below the opcode tag are read back as a single unsigned value
//! instead of the usual rd/rs1/rs2/imm split.

use crate::ast::Opcode;

const OPCODE_SHIFT: u32 = 26;
const RD_SHIFT: u32 = 21;
const RS1_SHIFT: u32 = 16;
const RS2_SHIFT: u32 = 11;

const OPCODE_MASK: u32 = 0x3F;
const REG_MASK: u32 = 0x1F;
const IMM_MASK: u32 = 0x7FF;
const WIDE_IMM_MASK: u32 = 0x03FF_FFFF;

const IMM_SIGN_BIT: i32 = 1 << 10;
const IMM_MIN: i32 = -1024;
const IMM_MAX: i32 = 1023;

/// A decoded instruction: the architectural fields a pipeline stage or the
/// single-cycle driver actually operates on. `-1` in a register field means
/// "absent, reads as zero" (for `rs1`/`rs2`) or "no writeback" (for `rd`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInst {
    pub op: Opcode,
    pub rd: i32,
    pub rs1: i32,
    pub rs2: i32,
    pub imm: i32,
    pub pc: u32,
    pub valid: bool,
}

impl DecodedInst {
    pub fn bubble(pc: u32) -> DecodedInst {
        DecodedInst {
            op: Opcode::Nop,
            rd: -1,
            rs1: -1,
            rs2: -1,
            imm: 0,
            pc,
            valid: false,
        }
    }
}

fn encode_reg(index: i32) -> u32 {
    if index < 0 { 0 } else { (index as u32) & REG_MASK }
}

/// Checks a resolved immediate fits the signed 11-bit field. Returns the
/// value unchanged (as the caller already validated it) so call sites read
/// naturally as `encode_field(check_imm_range(...)?)`.
pub fn fits_signed_11(value: i64) -> bool {
    value >= IMM_MIN as i64 && value <= IMM_MAX as i64
}

/// Packs architectural fields into a 32-bit word. `rd`/`rs1`/`rs2` of `-1`
/// encode as register 0, matching "missing register fields encode as 0".
pub fn encode(op: Opcode, rd: i32, rs1: i32, rs2: i32, imm: i32) -> u32 {
    if op == Opcode::Setclr {
        return (op.tag() << OPCODE_SHIFT) | ((imm as u32) & WIDE_IMM_MASK);
    }

    (op.tag() << OPCODE_SHIFT)
        | (encode_reg(rd) << RD_SHIFT)
        | (encode_reg(rs1) << RS1_SHIFT)
        | (encode_reg(rs2) << RS2_SHIFT)
        | ((imm as u32) & IMM_MASK)
}

/// Unpacks a 32-bit word into a [`DecodedInst`]. Never fails: an unknown
/// opcode tag decodes to `Opcode::Invalid` with `valid = false`.
pub fn decode(word: u32, pc: u32) -> DecodedInst {
    let tag = (word >> OPCODE_SHIFT) & OPCODE_MASK;
    let op = Opcode::from_tag(tag);

    if op == Opcode::Invalid {
        return DecodedInst {
            op,
            rd: -1,
            rs1: -1,
            rs2: -1,
            imm: 0,
            pc,
            valid: false,
        };
    }

    if op == Opcode::Setclr {
        let imm = (word & WIDE_IMM_MASK) as i32;
        return DecodedInst {
            op,
            rd: -1,
            rs1: -1,
            rs2: -1,
            imm,
            pc,
            valid: true,
        };
    }

    let rd = ((word >> RD_SHIFT) & REG_MASK) as i32;
    let rs1 = ((word >> RS1_SHIFT) & REG_MASK) as i32;
    let rs2 = ((word >> RS2_SHIFT) & REG_MASK) as i32;
    let raw_imm = (word & IMM_MASK) as i32;
    let imm = sign_extend_11(raw_imm);

    DecodedInst {
        op,
        rd,
        rs1,
        rs2,
        imm,
        pc,
        valid: true,
    }
}

fn sign_extend_11(raw: i32) -> i32 {
    if raw & IMM_SIGN_BIT != 0 {
        raw - (1 << 11)
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_opcode_across_the_signed_11_bit_range() {
        let opcodes = [
            Opcode::Add,
            Opcode::Addi,
            Opcode::Sub,
            Opcode::Subi,
            Opcode::Mul,
            Opcode::Div,
            Opcode::Lw,
            Opcode::Sw,
            Opcode::Beq,
            Opcode::Blt,
            Opcode::Nop,
            Opcode::Drawpix,
            Opcode::Drawstep,
            Opcode::Clearfb,
            Opcode::Moveto,
            Opcode::Lineto,
            Opcode::Sin,
            Opcode::Cos,
        ];

        for op in opcodes {
            for imm in [-1024, -1, 0, 1, 1023] {
                for (rd, rs1, rs2) in [(0, 0, 0), (31, 17, 3), (1, 0, 0)] {
                    let word = encode(op, rd, rs1, rs2, imm);
                    let decoded = decode(word, 0);
                    assert_eq!(decoded.op, op);
                    assert_eq!(decoded.imm, imm);
                    assert_eq!(decoded.rd, rd);
                    assert_eq!(decoded.rs1, rs1);
                    assert_eq!(decoded.rs2, rs2);
                    assert!(decoded.valid);
                }
            }
        }
    }

    #[test]
    fn absent_register_fields_decode_as_register_zero() {
        let word = encode(Opcode::Addi, 1, -1, -1, 5);
        let decoded = decode(word, 0);
        assert_eq!(decoded.rs1, 0);
        assert_eq!(decoded.rs2, 0);
    }

    #[test]
    fn unknown_tag_decodes_invalid() {
        let word = 0x3F << OPCODE_SHIFT;
        let decoded = decode(word, 4);
        assert_eq!(decoded.op, Opcode::Invalid);
        assert!(!decoded.valid);
        assert_eq!(decoded.pc, 4);
    }

    #[test]
    fn setclr_round_trips_a_24_bit_color() {
        let word = encode(Opcode::Setclr, 0, 0, 0, 0x00FF_0000);
        let decoded = decode(word, 0);
        assert_eq!(decoded.op, Opcode::Setclr);
        assert_eq!(decoded.imm, 0x00FF_0000);
    }
}
