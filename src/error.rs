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

//! Fatal assembly-time errors and non-fatal runtime warnings.
//!
//! Assembly errors abort the pipeline before a single instruction runs;
//! runtime warnings are collected by a driver and never stop execution —
//! a simulator must always run to completion to be useful for debugging.

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum AssemblyError {
    #[error("Syntax error on line {line}: {reason}")]
    SyntaxError { line: usize, reason: String },

    #[error("line {line}: duplicate label '{name}'")]
    DuplicateLabel { line: usize, name: String },

    #[error("line {line}: reference to unknown label '{name}'")]
    UnknownLabel { line: usize, name: String },

    #[error("line {line}: unknown mnemonic '{mnemonic}'")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("line {line}: malformed operands for '{mnemonic}': {reason}")]
    MalformedOperands {
        line: usize,
        mnemonic: String,
        reason: String,
    },

    #[error("line {line}: register operand out of range: '{token}'")]
    BadRegister { line: usize, token: String },

    #[error("line {line}: immediate {value} does not fit in the signed 11-bit field")]
    ImmediateOutOfRange { line: usize, value: i64 },
}

/// A class of runtime violation drivers must tolerate rather than abort on:
/// log, skip the offending effect, and keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeWarning {
    DecodeInvalidOpcode { pc: u32 },
    MemoryOutOfRange { pc: u32, addr: i64, is_write: bool },
    DivisionByZero { pc: u32 },
    CycleCapExceeded { cycle: u64 },
}

impl std::fmt::Display for RuntimeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeWarning::DecodeInvalidOpcode { pc } => {
                write!(f, "pc={pc}: invalid opcode decoded, executed as NOP")
            }
            RuntimeWarning::MemoryOutOfRange { pc, addr, is_write } => {
                let verb = if *is_write { "write" } else { "read" };
                write!(f, "pc={pc}: data memory {verb} out of range at address {addr}, effect skipped")
            }
            RuntimeWarning::DivisionByZero { pc } => {
                write!(f, "pc={pc}: division by zero, result forced to 0")
            }
            RuntimeWarning::CycleCapExceeded { cycle } => {
                write!(f, "cycle cap exceeded at cycle {cycle}, halting with partial result")
            }
        }
    }
}
