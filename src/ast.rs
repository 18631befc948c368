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

//! The closed instruction set and the raw (pre-encoding) operand forms
//! produced by the parser.

/// The closed opcode set. Numeric tags must fit in the 6-bit opcode field
/// of an encoded instruction (bits 26-31), so all 20 variants sit in 0..=19.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Add = 0,
    Addi = 1,
    Sub = 2,
    Subi = 3,
    Mul = 4,
    Div = 5,
    Lw = 6,
    Sw = 7,
    Beq = 8,
    Blt = 9,
    Nop = 10,
    Drawpix = 11,
    Drawstep = 12,
    Setclr = 13,
    Clearfb = 14,
    Moveto = 15,
    Lineto = 16,
    Sin = 17,
    Cos = 18,
    Invalid = 19,
}

impl Opcode {
    /// Recover a variant from the 6-bit tag stored in an encoded word.
    /// Any tag with no matching variant decodes to `Invalid`.
    pub fn from_tag(tag: u32) -> Opcode {
        match tag {
            0 => Opcode::Add,
            1 => Opcode::Addi,
            2 => Opcode::Sub,
            3 => Opcode::Subi,
            4 => Opcode::Mul,
            5 => Opcode::Div,
            6 => Opcode::Lw,
            7 => Opcode::Sw,
            8 => Opcode::Beq,
            9 => Opcode::Blt,
            10 => Opcode::Nop,
            11 => Opcode::Drawpix,
            12 => Opcode::Drawstep,
            13 => Opcode::Setclr,
            14 => Opcode::Clearfb,
            15 => Opcode::Moveto,
            16 => Opcode::Lineto,
            17 => Opcode::Sin,
            18 => Opcode::Cos,
            _ => Opcode::Invalid,
        }
    }

    pub fn tag(self) -> u32 {
        self as u32
    }

    /// Mnemonic lookup is case-insensitive at the source level; callers
    /// upper-case the token before calling this.
    pub fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
        Some(match mnemonic {
            "ADD" => Opcode::Add,
            "ADDI" => Opcode::Addi,
            "SUB" => Opcode::Sub,
            "SUBI" => Opcode::Subi,
            "MUL" => Opcode::Mul,
            "DIV" => Opcode::Div,
            "LW" => Opcode::Lw,
            "SW" => Opcode::Sw,
            "BEQ" => Opcode::Beq,
            "BLT" => Opcode::Blt,
            "NOP" => Opcode::Nop,
            "DRAWPIX" => Opcode::Drawpix,
            "DRAWSTEP" => Opcode::Drawstep,
            "SETCLR" => Opcode::Setclr,
            "CLEARFB" => Opcode::Clearfb,
            "MOVETO" => Opcode::Moveto,
            "LINETO" => Opcode::Lineto,
            "SIN" => Opcode::Sin,
            "COS" => Opcode::Cos,
            _ => return None,
        })
    }

    /// Whether this opcode's third register-like operand is a branch offset
    /// that may be given as a label instead of a literal immediate.
    pub fn takes_branch_target(self) -> bool {
        matches!(self, Opcode::Beq | Opcode::Blt)
    }
}

/// One operand as written in source, before label resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Register(u8),
    Immediate(i32),
    Label(String),
    /// `imm(reg)` or whitespace-separated `imm reg`, used by LW/SW.
    Mem { offset: Box<Operand>, base: u8 },
}

/// A bare instruction as parsed, before the assembler resolves labels and
/// encodes it into a 32-bit word.
#[derive(Debug, Clone, PartialEq)]
pub struct RawInstruction {
    pub mnemonic: String,
    pub operands: Vec<Operand>,
}

/// One logical line of source: an optional label definition and/or an
/// instruction. A line with neither is a comment or blank line and is
/// never constructed by the parser.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssemblyLine {
    pub label: Option<String>,
    pub instruction: Option<RawInstruction>,
    pub line_number: usize,
}
