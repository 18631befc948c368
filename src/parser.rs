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

//! Turns one trimmed, comment-free, non-blank source line into an
//! [`AssemblyLine`]. Tokens are whitespace- or comma-separated; mnemonics
//! and register letters are case-insensitive.

use crate::ast::{AssemblyLine, Operand, RawInstruction};
use crate::error::AssemblyError;
use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct LineParser;

pub fn parse_line(trimmed: &str, line_number: usize) -> Result<AssemblyLine, AssemblyError> {
    let mut pairs = LineParser::parse(Rule::line, trimmed).map_err(|e| AssemblyError::SyntaxError {
        line: line_number,
        reason: e.to_string(),
    })?;

    let line_pair = pairs.next().expect("line rule always produces a pair");
    let mut result = AssemblyLine {
        line_number,
        ..Default::default()
    };

    for inner in line_pair.into_inner() {
        match inner.as_rule() {
            Rule::label => {
                let text = inner.as_str();
                result.label = Some(text[..text.len() - 1].to_string());
            }
            Rule::instruction => {
                result.instruction = Some(build_instruction(inner, line_number)?);
            }
            Rule::EOI => {}
            _ => unreachable!("unexpected top-level rule {:?}", inner.as_rule()),
        }
    }

    Ok(result)
}

fn build_instruction(pair: Pair<Rule>, line_number: usize) -> Result<RawInstruction, AssemblyError> {
    let mut inner = pair.into_inner();
    let mnemonic = inner
        .next()
        .expect("instruction always starts with a mnemonic")
        .as_str()
        .to_uppercase();

    let mut operands = Vec::new();
    for operand_pair in inner {
        operands.push(build_operand(operand_pair, line_number)?);
    }

    Ok(RawInstruction { mnemonic, operands })
}

fn build_operand(pair: Pair<Rule>, line_number: usize) -> Result<Operand, AssemblyError> {
    debug_assert_eq!(pair.as_rule(), Rule::operand);
    let inner = pair
        .into_inner()
        .next()
        .expect("operand always wraps exactly one alternative");

    match inner.as_rule() {
        Rule::mem_operand => {
            let mut parts = inner.into_inner();
            let offset_pair = parts.next().expect("mem_operand has an offset");
            let register_pair = parts.next().expect("mem_operand has a base register");
            let offset = build_scalar(offset_pair, line_number)?;
            let base = parse_register(register_pair.as_str(), line_number)?;
            Ok(Operand::Mem {
                offset: Box::new(offset),
                base,
            })
        }
        Rule::register => Ok(Operand::Register(parse_register(inner.as_str(), line_number)?)),
        Rule::number => Ok(Operand::Immediate(narrow_immediate(
            parse_number(inner.as_str(), line_number)?,
            line_number,
        )?)),
        Rule::ident => Ok(Operand::Label(inner.as_str().to_string())),
        other => unreachable!("unexpected operand alternative {:?}", other),
    }
}

fn build_scalar(pair: Pair<Rule>, line_number: usize) -> Result<Operand, AssemblyError> {
    match pair.as_rule() {
        Rule::number => Ok(Operand::Immediate(narrow_immediate(
            parse_number(pair.as_str(), line_number)?,
            line_number,
        )?)),
        Rule::ident => Ok(Operand::Label(pair.as_str().to_string())),
        other => unreachable!("unexpected offset alternative {:?}", other),
    }
}

/// Narrows a parsed literal to `i32`, the width `Operand::Immediate` stores.
/// The tighter signed-11-bit check happens later once the assembler knows
/// which field (immediate vs. branch offset) the value actually fills.
fn narrow_immediate(value: i64, line_number: usize) -> Result<i32, AssemblyError> {
    i32::try_from(value).map_err(|_| AssemblyError::ImmediateOutOfRange { line: line_number, value })
}

fn parse_register(token: &str, line_number: usize) -> Result<u8, AssemblyError> {
    let digits = &token[1..];
    let index: u32 = digits.parse().map_err(|_| AssemblyError::BadRegister {
        line: line_number,
        token: token.to_string(),
    })?;
    if index >= 32 {
        return Err(AssemblyError::BadRegister {
            line: line_number,
            token: token.to_string(),
        });
    }
    Ok(index as u8)
}

/// Parses a decimal or `0x`-prefixed hex literal, with an optional leading
/// `-`. Returned as `i64` so callers can range-check against the field
/// width the target opcode actually needs before narrowing.
pub fn parse_number(token: &str, line_number: usize) -> Result<i64, AssemblyError> {
    let (negative, rest) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    let magnitude = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else {
        rest.parse::<i64>()
    }
    .map_err(|_| AssemblyError::SyntaxError {
        line: line_number,
        reason: format!("invalid numeric literal '{token}'"),
    })?;

    Ok(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_instruction() {
        let line = parse_line("ADDI x1, x0, 5", 1).unwrap();
        assert_eq!(line.label, None);
        let instr = line.instruction.unwrap();
        assert_eq!(instr.mnemonic, "ADDI");
        assert_eq!(
            instr.operands,
            vec![
                Operand::Register(1),
                Operand::Register(0),
                Operand::Immediate(5)
            ]
        );
    }

    #[test]
    fn parses_label_only_line() {
        let line = parse_line("LOOP:", 2).unwrap();
        assert_eq!(line.label.as_deref(), Some("LOOP"));
        assert!(line.instruction.is_none());
    }

    #[test]
    fn parses_mixed_label_and_instruction() {
        let line = parse_line("LOOP: ADDI x1, x1, 1", 3).unwrap();
        assert_eq!(line.label.as_deref(), Some("LOOP"));
        assert!(line.instruction.is_some());
    }

    #[test]
    fn parses_mem_operand_with_parens() {
        let line = parse_line("LW x2, 0(x0)", 4).unwrap();
        let instr = line.instruction.unwrap();
        assert_eq!(
            instr.operands,
            vec![
                Operand::Register(2),
                Operand::Mem {
                    offset: Box::new(Operand::Immediate(0)),
                    base: 0
                }
            ]
        );
    }

    #[test]
    fn parses_mem_operand_whitespace_form() {
        let line = parse_line("LW x2, 0 x0", 4).unwrap();
        let instr = line.instruction.unwrap();
        assert_eq!(
            instr.operands,
            vec![
                Operand::Register(2),
                Operand::Immediate(0),
                Operand::Register(0)
            ]
        );
    }

    #[test]
    fn parses_branch_with_label_target() {
        let line = parse_line("BEQ x1, x2, done", 5).unwrap();
        let instr = line.instruction.unwrap();
        assert_eq!(
            instr.operands,
            vec![
                Operand::Register(1),
                Operand::Register(2),
                Operand::Label("done".to_string())
            ]
        );
    }

    #[test]
    fn parses_hex_immediate() {
        let line = parse_line("SETCLR 0xFF0000", 6).unwrap();
        let instr = line.instruction.unwrap();
        assert_eq!(instr.operands, vec![Operand::Immediate(0x00FF_0000)]);
    }

    #[test]
    fn case_insensitive_mnemonic_and_register() {
        let line = parse_line("addi X1, R0, 5", 7).unwrap();
        let instr = line.instruction.unwrap();
        assert_eq!(instr.mnemonic, "ADDI");
        assert_eq!(instr.operands[0], Operand::Register(1));
    }

    #[test]
    fn rejects_garbage_line() {
        assert!(parse_line("!!!not valid!!!", 8).is_err());
    }
}
