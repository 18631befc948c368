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

//! The two-pass assembler: pass 1 builds the label table, pass 2 resolves
//! operands (including PC-relative branch labels) and encodes each
//! instruction into a 32-bit word.

use crate::ast::{AssemblyLine, Opcode, Operand, RawInstruction};
use crate::encoding::{self, fits_signed_11};
use crate::error::AssemblyError;
use crate::parser;
use crate::symbol_table::SymbolTable;

/// Assembled instruction memory: the encoded word stream the drivers
/// execute, and the matching normalized text kept only for trace output
/// (see the design note against pipelining raw assembly text).
#[derive(Debug, Default)]
pub struct Program {
    pub encoded: Vec<u32>,
    pub text: Vec<String>,
    pub labels: SymbolTable,
}

impl Program {
    pub fn len(&self) -> usize {
        self.encoded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }
}

struct SourceLine {
    line_number: usize,
    parsed: AssemblyLine,
}

fn lex_source(source: &str) -> Result<Vec<SourceLine>, AssemblyError> {
    let mut lines = Vec::new();
    for (zero_based, raw) in source.lines().enumerate() {
        let line_number = zero_based + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let parsed = parser::parse_line(trimmed, line_number)?;
        lines.push(SourceLine { line_number, parsed });
    }
    Ok(lines)
}

/// Pass 1: walk the lexed lines tracking a running instruction counter.
/// A label-only line records its address without advancing the counter; a
/// line carrying an instruction (with or without a leading label) advances
/// it by exactly one.
fn build_label_table(lines: &[SourceLine]) -> Result<SymbolTable, AssemblyError> {
    let mut table = SymbolTable::new();
    let mut pc: u32 = 0;

    for line in lines {
        if let Some(label) = &line.parsed.label {
            table.define(label, pc, line.line_number)?;
        }
        if line.parsed.instruction.is_some() {
            pc += 1;
        }
    }

    Ok(table)
}

/// Pass 2: emit exactly the lines that contribute an instruction.
fn emit_instructions(lines: &[SourceLine], labels: &SymbolTable) -> Result<Program, AssemblyError> {
    let mut program = Program {
        labels: SymbolTable::new(),
        ..Default::default()
    };
    let mut pc: u32 = 0;

    for line in lines {
        let Some(instr) = &line.parsed.instruction else {
            continue;
        };

        let resolved = resolve_instruction(instr, pc, labels, line.line_number)?;
        let word = encoding::encode(resolved.op, resolved.rd, resolved.rs1, resolved.rs2, resolved.imm);
        program.encoded.push(word);
        program.text.push(render_instruction_text(instr));
        pc += 1;
    }

    Ok(program)
}

pub fn assemble_source(source: &str) -> Result<Program, AssemblyError> {
    let lines = lex_source(source)?;
    let labels = build_label_table(&lines)?;
    let mut program = emit_instructions(&lines, &labels)?;
    program.labels = labels;
    Ok(program)
}

struct Resolved {
    op: Opcode,
    rd: i32,
    rs1: i32,
    rs2: i32,
    imm: i32,
}

fn resolve_instruction(
    instr: &RawInstruction,
    pc: u32,
    labels: &SymbolTable,
    line: usize,
) -> Result<Resolved, AssemblyError> {
    let op = Opcode::from_mnemonic(&instr.mnemonic).ok_or_else(|| AssemblyError::UnknownMnemonic {
        line,
        mnemonic: instr.mnemonic.clone(),
    })?;

    match op {
        Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
            let [rd, rs1, rs2] = three_registers(instr, line)?;
            Ok(Resolved { op, rd, rs1, rs2, imm: 0 })
        }

        Opcode::Addi | Opcode::Subi => {
            let (rd, rs1) = two_registers(instr, line, 0, 1)?;
            let imm = signed_immediate(operand_at(instr, 2, line)?, &instr.mnemonic, line)?;
            Ok(Resolved { op, rd, rs1, rs2: -1, imm })
        }

        Opcode::Sin | Opcode::Cos => {
            let (rd, rs1) = two_registers(instr, line, 0, 1)?;
            Ok(Resolved { op, rd, rs1, rs2: -1, imm: 0 })
        }

        Opcode::Lw => {
            let rd = register_at(instr, 0, line)?;
            let (offset, base) = memory_form(instr, line)?;
            let imm = signed_immediate(&offset, &instr.mnemonic, line)?;
            Ok(Resolved { op, rd, rs1: base, rs2: -1, imm })
        }

        Opcode::Sw => {
            let rs2 = register_at(instr, 0, line)?;
            let (offset, base) = memory_form(instr, line)?;
            let imm = signed_immediate(&offset, &instr.mnemonic, line)?;
            Ok(Resolved { op, rd: -1, rs1: base, rs2, imm })
        }

        Opcode::Beq | Opcode::Blt => {
            let (rs1, rs2) = two_registers(instr, line, 0, 1)?;
            let target = operand_at(instr, 2, line)?;
            let imm = branch_offset(target, pc, labels, &instr.mnemonic, line)?;
            Ok(Resolved { op, rd: -1, rs1, rs2, imm })
        }

        Opcode::Drawpix | Opcode::Drawstep | Opcode::Moveto | Opcode::Lineto => {
            let (rs1, rs2) = two_registers(instr, line, 0, 1)?;
            Ok(Resolved { op, rd: -1, rs1, rs2, imm: 0 })
        }

        Opcode::Setclr => {
            let imm = wide_immediate(operand_at(instr, 0, line)?, &instr.mnemonic, line)?;
            Ok(Resolved { op, rd: -1, rs1: -1, rs2: -1, imm })
        }

        Opcode::Clearfb | Opcode::Nop => {
            expect_operand_count(instr, 0, line)?;
            Ok(Resolved { op, rd: -1, rs1: -1, rs2: -1, imm: 0 })
        }

        Opcode::Invalid => unreachable!("from_mnemonic never yields Invalid"),
    }
}

fn operand_at<'a>(instr: &'a RawInstruction, index: usize, line: usize) -> Result<&'a Operand, AssemblyError> {
    instr.operands.get(index).ok_or_else(|| AssemblyError::MalformedOperands {
        line,
        mnemonic: instr.mnemonic.clone(),
        reason: format!("expected at least {} operand(s)", index + 1),
    })
}

fn expect_operand_count(instr: &RawInstruction, count: usize, line: usize) -> Result<(), AssemblyError> {
    if instr.operands.len() != count {
        return Err(AssemblyError::MalformedOperands {
            line,
            mnemonic: instr.mnemonic.clone(),
            reason: format!("expected {} operand(s), found {}", count, instr.operands.len()),
        });
    }
    Ok(())
}

fn register_at(instr: &RawInstruction, index: usize, line: usize) -> Result<i32, AssemblyError> {
    match operand_at(instr, index, line)? {
        Operand::Register(r) => Ok(*r as i32),
        other => Err(AssemblyError::MalformedOperands {
            line,
            mnemonic: instr.mnemonic.clone(),
            reason: format!("expected a register operand, found {other:?}"),
        }),
    }
}

fn two_registers(
    instr: &RawInstruction,
    line: usize,
    a: usize,
    b: usize,
) -> Result<(i32, i32), AssemblyError> {
    expect_operand_count(instr, b + 1, line)?;
    Ok((register_at(instr, a, line)?, register_at(instr, b, line)?))
}

fn three_registers(instr: &RawInstruction, line: usize) -> Result<[i32; 3], AssemblyError> {
    expect_operand_count(instr, 3, line)?;
    Ok([
        register_at(instr, 0, line)?,
        register_at(instr, 1, line)?,
        register_at(instr, 2, line)?,
    ])
}

/// Accepts either `rd, imm(rs1)` (two operands, the second a `Mem`) or
/// `rd, imm, rs1` (three operands, a plain immediate followed by a plain
/// register).
fn memory_form(instr: &RawInstruction, line: usize) -> Result<(Operand, i32), AssemblyError> {
    match instr.operands.len() {
        2 => match &instr.operands[1] {
            Operand::Mem { offset, base } => Ok((offset.as_ref().clone(), *base as i32)),
            other => Err(AssemblyError::MalformedOperands {
                line,
                mnemonic: instr.mnemonic.clone(),
                reason: format!("expected 'imm(reg)', found {other:?}"),
            }),
        },
        3 => {
            let offset = instr.operands[1].clone();
            let base = register_at(instr, 2, line)?;
            Ok((offset, base))
        }
        n => Err(AssemblyError::MalformedOperands {
            line,
            mnemonic: instr.mnemonic.clone(),
            reason: format!("expected 2 or 3 operands, found {n}"),
        }),
    }
}

fn signed_immediate(operand: &Operand, mnemonic: &str, line: usize) -> Result<i32, AssemblyError> {
    match operand {
        Operand::Immediate(value) => {
            if !fits_signed_11(*value as i64) {
                return Err(AssemblyError::ImmediateOutOfRange {
                    line,
                    value: *value as i64,
                });
            }
            Ok(*value)
        }
        other => Err(AssemblyError::MalformedOperands {
            line,
            mnemonic: mnemonic.to_string(),
            reason: format!("expected a numeric immediate, found {other:?}"),
        }),
    }
}

fn wide_immediate(operand: &Operand, mnemonic: &str, line: usize) -> Result<i32, AssemblyError> {
    match operand {
        Operand::Immediate(value) => Ok(*value),
        other => Err(AssemblyError::MalformedOperands {
            line,
            mnemonic: mnemonic.to_string(),
            reason: format!("expected a numeric immediate, found {other:?}"),
        }),
    }
}

fn branch_offset(
    target: &Operand,
    pc: u32,
    labels: &SymbolTable,
    mnemonic: &str,
    line: usize,
) -> Result<i32, AssemblyError> {
    let offset = match target {
        Operand::Immediate(value) => *value as i64,
        Operand::Label(name) => labels.resolve(name, line)? as i64 - pc as i64,
        other => {
            return Err(AssemblyError::MalformedOperands {
                line,
                mnemonic: mnemonic.to_string(),
                reason: format!("expected an immediate or label, found {other:?}"),
            });
        }
    };

    if !fits_signed_11(offset) {
        return Err(AssemblyError::ImmediateOutOfRange { line, value: offset });
    }

    Ok(offset as i32)
}

fn render_instruction_text(instr: &RawInstruction) -> String {
    if instr.operands.is_empty() {
        return instr.mnemonic.clone();
    }
    let operands: Vec<String> = instr.operands.iter().map(render_operand).collect();
    format!("{} {}", instr.mnemonic, operands.join(", "))
}

fn render_operand(operand: &Operand) -> String {
    match operand {
        Operand::Register(r) => format!("x{r}"),
        Operand::Immediate(v) => v.to_string(),
        Operand::Label(name) => name.clone(),
        Operand::Mem { offset, base } => format!("{}(x{})", render_operand(offset), base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_scenario_one_straight_line_arithmetic() {
        let program = assemble_source("ADDI x1,x0,5\nADDI x2,x0,7\nADD x3,x1,x2\n").unwrap();
        assert_eq!(program.len(), 3);
        let last = encoding::decode(program.encoded[2], 2);
        assert_eq!(last.op, Opcode::Add);
        assert_eq!(last.rd, 3);
        assert_eq!(last.rs1, 1);
        assert_eq!(last.rs2, 2);
    }

    #[test]
    fn resolves_forward_branch_label_to_a_pc_relative_offset() {
        let source = "ADDI x1,x0,1\nADDI x2,x0,1\nBEQ x1,x2,done\nADDI x3,x0,99\ndone: ADDI x4,x0,42\n";
        let program = assemble_source(source).unwrap();
        let branch = encoding::decode(program.encoded[2], 2);
        assert_eq!(branch.op, Opcode::Beq);
        assert_eq!(branch.imm, 2);
    }

    #[test]
    fn resolves_backward_branch_label_for_a_loop() {
        let source = "ADDI x1,x0,0\nL: ADDI x1,x1,1\nADDI x2,x0,5\nBEQ x1,x2,2\nBEQ x0,x0,-3\n";
        let program = assemble_source(source).unwrap();
        assert_eq!(program.len(), 5);
    }

    #[test]
    fn label_only_line_does_not_consume_an_address() {
        let source = "L:\nADDI x1,x0,1\n";
        let program = assemble_source(source).unwrap();
        assert_eq!(program.labels.resolve("L", 1).unwrap(), 0);
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn unknown_label_is_a_fatal_error() {
        let err = assemble_source("BEQ x0,x0,nowhere\n").unwrap_err();
        assert!(matches!(err, AssemblyError::UnknownLabel { .. }));
    }

    #[test]
    fn memory_form_with_parens_and_without_agree() {
        let a = assemble_source("LW x1,4(x2)\n").unwrap();
        let b = assemble_source("LW x1,4 x2\n").unwrap();
        assert_eq!(a.encoded, b.encoded);
    }

    #[test]
    fn setclr_accepts_a_24_bit_color_beyond_the_11_bit_field() {
        let program = assemble_source("SETCLR 0xFF0000\n").unwrap();
        let decoded = encoding::decode(program.encoded[0], 0);
        assert_eq!(decoded.op, Opcode::Setclr);
        assert_eq!(decoded.imm, 0x00FF_0000);
    }

    #[test]
    fn out_of_range_immediate_is_rejected() {
        let err = assemble_source("ADDI x1,x0,5000\n").unwrap_err();
        assert!(matches!(err, AssemblyError::ImmediateOutOfRange { .. }));
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let program = assemble_source("# a comment\n\nNOP\n   # trailing\nNOP\n").unwrap();
        assert_eq!(program.len(), 2);
    }
}
