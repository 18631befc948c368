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

//! The single-cycle reference driver: fetch, decode, execute, and update
//! state one instruction at a time. This is the semantic oracle the
//! pipelined driver is validated against, never the other way around.

use crate::assembler::Program;
use crate::ast::Opcode;
use crate::encoding::{self, DecodedInst};
use crate::error::RuntimeWarning;
use crate::executor::{self, ExecResult};
use crate::framebuffer::Framebuffer;
use crate::memory::DataMemory;
use crate::registers::RegisterFile;
use crate::trace::{CycleSnapshot, StageSnapshot, TraceRecorder};

pub const CYCLE_CAP: u64 = 1_000_000;

/// The final architectural state a driver produces, plus whatever the run
/// accumulated along the way. Both drivers return this shape so the CLI's
/// `--compare` mode can diff them directly.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub registers: RegisterFile,
    pub memory: DataMemory,
    pub framebuffer: Framebuffer,
    pub warnings: Vec<RuntimeWarning>,
    pub cycles: u64,
    pub retired: u64,
}

pub fn run(program: &Program, cycle_limit: u64) -> (RunResult, TraceRecorder) {
    let mut registers = RegisterFile::new();
    let mut memory = DataMemory::new();
    let mut framebuffer = Framebuffer::new();
    let mut warnings = Vec::new();
    let mut trace = TraceRecorder::new();

    let mut pc: u32 = 0;
    let mut cycle: u64 = 0;
    let mut retired: u64 = 0;

    while (pc as usize) < program.len() && cycle < cycle_limit {
        let word = program.encoded[pc as usize];
        let decoded = encoding::decode(word, pc);

        if !decoded.valid {
            warnings.push(RuntimeWarning::DecodeInvalidOpcode { pc });
            trace.push(single_cycle_snapshot(cycle, &decoded, &registers, None));
            pc += 1;
            cycle += 1;
            retired += 1;
            continue;
        }

        let rs1_val = registers.read(decoded.rs1);
        let rs2_val = registers.read(decoded.rs2);
        let result = executor::execute(decoded.op, rs1_val, rs2_val, decoded.imm, pc);

        let write_data = apply_effects(&result, decoded.op, rs1_val, rs2_val, decoded.imm, pc, &mut memory, &mut framebuffer, &mut warnings);

        if decoded.rd > 0 {
            registers.write(decoded.rd, write_data);
        }

        trace.push(single_cycle_snapshot(cycle, &decoded, &registers, Some(write_data)));

        pc = result.next_pc;
        cycle += 1;
        retired += 1;
    }

    if cycle >= cycle_limit {
        warnings.push(RuntimeWarning::CycleCapExceeded { cycle });
    }

    (
        RunResult {
            registers,
            memory,
            framebuffer,
            warnings,
            cycles: cycle,
            retired,
        },
        trace,
    )
}

/// Applies the memory or graphics side effect an [`ExecResult`] names, and
/// returns the value that should be written back (the loaded word for
/// `LW`, the ALU result otherwise).
#[allow(clippy::too_many_arguments)]
fn apply_effects(
    result: &ExecResult,
    op: Opcode,
    rs1_val: i32,
    rs2_val: i32,
    imm: i32,
    pc: u32,
    memory: &mut DataMemory,
    framebuffer: &mut Framebuffer,
    warnings: &mut Vec<RuntimeWarning>,
) -> i32 {
    if let Some(warning) = &result.warning {
        warnings.push(warning.clone());
    }

    if let Some(addr) = result.mem_read_addr {
        match memory.read(addr) {
            Some(value) => value,
            None => {
                warnings.push(RuntimeWarning::MemoryOutOfRange {
                    pc,
                    addr: addr as i64,
                    is_write: false,
                });
                0
            }
        }
    } else if let Some(addr) = result.mem_write_addr {
        if !memory.write(addr, result.mem_write_value) {
            warnings.push(RuntimeWarning::MemoryOutOfRange {
                pc,
                addr: addr as i64,
                is_write: true,
            });
        }
        result.alu_result
    } else if result.is_graphics_op {
        executor::apply_graphics_effect(framebuffer, op, rs1_val, rs2_val, imm);
        result.alu_result
    } else {
        result.alu_result
    }
}

fn single_cycle_snapshot(
    cycle: u64,
    decoded: &DecodedInst,
    registers: &RegisterFile,
    write_data: Option<i32>,
) -> CycleSnapshot {
    let stage = StageSnapshot {
        valid: decoded.valid,
        pc: decoded.pc,
        text: format!("{:?}", decoded.op),
        alu_result: write_data.unwrap_or(0),
    };
    CycleSnapshot {
        cycle,
        stages: [
            stage.clone(),
            stage.clone(),
            stage.clone(),
            stage.clone(),
            stage.clone(),
            stage,
        ],
        registers: registers.snapshot(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble_source;

    fn run_source(source: &str) -> RunResult {
        let program = assemble_source(source).unwrap();
        run(&program, CYCLE_CAP).0
    }

    #[test]
    fn scenario_1_straight_line_arithmetic() {
        let result = run_source("ADDI x1,x0,5\nADDI x2,x0,7\nADD x3,x1,x2\n");
        assert_eq!(result.registers.read(1), 5);
        assert_eq!(result.registers.read(2), 7);
        assert_eq!(result.registers.read(3), 12);
    }

    #[test]
    fn scenario_2_store_then_load() {
        let result = run_source("ADDI x1,x0,3\nSW x1,0(x0)\nLW x2,0(x0)\n");
        assert_eq!(result.registers.read(1), 3);
        assert_eq!(result.registers.read(2), 3);
        assert_eq!(result.memory.read(0), Some(3));
    }

    #[test]
    fn scenario_3_taken_branch_skips_one_instruction() {
        let result = run_source(
            "ADDI x1,x0,1\nADDI x2,x0,1\nBEQ x1,x2,2\nADDI x3,x0,99\nADDI x4,x0,42\n",
        );
        assert_eq!(result.registers.read(1), 1);
        assert_eq!(result.registers.read(2), 1);
        assert_eq!(result.registers.read(3), 0);
        assert_eq!(result.registers.read(4), 42);
    }

    #[test]
    fn scenario_4_setclr_then_drawpix() {
        let result = run_source("SETCLR 0xFF0000\nADDI x1,x0,10\nADDI x2,x0,10\nDRAWPIX x1,x2\n");
        assert_eq!(result.framebuffer.pixel(10, 10), 0xFFFF_0000);
        assert_eq!(result.framebuffer.pixel(0, 0), 0);
    }

    #[test]
    fn scenario_6_loop_terminates() {
        let result = run_source(
            "ADDI x1,x0,0\nL: ADDI x1,x1,1\nADDI x2,x0,5\nBEQ x1,x2,2\nBEQ x0,x0,-3\n",
        );
        assert_eq!(result.registers.read(1), 5);
        assert!(result.cycles < CYCLE_CAP);
    }

    #[test]
    fn register_zero_survives_every_cycle() {
        let result = run_source("ADDI x0,x0,99\nADD x1,x0,x0\n");
        assert_eq!(result.registers.read(0), 0);
    }

    #[test]
    fn division_by_zero_warns_and_continues() {
        let result = run_source("ADDI x1,x0,10\nDIV x2,x1,x0\nADDI x3,x0,1\n");
        assert_eq!(result.registers.read(2), 0);
        assert_eq!(result.registers.read(3), 1);
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, RuntimeWarning::DivisionByZero { .. })));
    }
}
