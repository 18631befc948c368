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

//! The six-stage pipelined driver: IF, ID, EX, IO, MEM, WB, with EX-stage
//! forwarding, a load-use stall, and branch flushing. Its final register
//! file, data memory, and framebuffer must match [`crate::single_cycle`]
//! exactly on every program; that equivalence is the whole point of this
//! module existing.
//!
//! Stages run in reverse order within a cycle (WB, MEM, IO, EX, ID, IF) so
//! a value computed later in program order is visible to an earlier stage
//! reading it in the *same* cycle — this is what makes same-cycle register
//! write-then-read and EX-stage forwarding from IO/MEM and MEM/WB work
//! without an extra pipeline bubble.

use crate::assembler::Program;
use crate::ast::Opcode;
use crate::encoding;
use crate::error::RuntimeWarning;
use crate::executor;
use crate::framebuffer::Framebuffer;
use crate::memory::DataMemory;
use crate::registers::RegisterFile;
use crate::single_cycle::RunResult;
use crate::trace::{CycleSnapshot, StageSnapshot, TraceRecorder};

const IDLE_DRAIN_CYCLES: u32 = 6;

/// Which source fed an EX-stage operand: the register file read in ID, or
/// a value bypassed from a later, still-in-flight instruction. Kept as
/// data so the forwarding priority is a table to test, not an if/else
/// chain to audit by eye.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forward {
    FromRegFile,
    FromIoMem,
    FromMemWb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IfId {
    word: u32,
    pc: u32,
    valid: bool,
}

impl IfId {
    fn bubble(pc: u32) -> IfId {
        IfId { word: 0, pc, valid: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IdEx {
    op: Opcode,
    rs1_val: i32,
    rs2_val: i32,
    rs1_idx: i32,
    rs2_idx: i32,
    rd: i32,
    imm: i32,
    pc: u32,
    valid: bool,
}

impl IdEx {
    fn bubble(pc: u32) -> IdEx {
        IdEx {
            op: Opcode::Nop,
            rs1_val: 0,
            rs2_val: 0,
            rs1_idx: -1,
            rs2_idx: -1,
            rd: -1,
            imm: 0,
            pc,
            valid: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ExIo {
    op: Opcode,
    alu_result: i32,
    rs1_val: i32,
    rs2_val: i32,
    rd: i32,
    imm: i32,
    pc: u32,
    branch_taken: bool,
    target_pc: u32,
    valid: bool,
}

impl ExIo {
    fn bubble(pc: u32) -> ExIo {
        ExIo {
            op: Opcode::Nop,
            alu_result: 0,
            rs1_val: 0,
            rs2_val: 0,
            rd: -1,
            imm: 0,
            pc,
            branch_taken: false,
            target_pc: pc,
            valid: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IoMem {
    op: Opcode,
    alu_result: i32,
    rs2_val: i32,
    rd: i32,
    pc: u32,
    valid: bool,
}

impl IoMem {
    fn bubble(pc: u32) -> IoMem {
        IoMem {
            op: Opcode::Nop,
            alu_result: 0,
            rs2_val: 0,
            rd: -1,
            pc,
            valid: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MemWb {
    write_data: i32,
    rd: i32,
    is_memory: bool,
    pc: u32,
    valid: bool,
}

impl MemWb {
    fn bubble(pc: u32) -> MemWb {
        MemWb {
            write_data: 0,
            rd: -1,
            is_memory: false,
            pc,
            valid: false,
        }
    }
}

pub fn run(program: &Program, cycle_limit: u64) -> (RunResult, TraceRecorder) {
    let mut registers = RegisterFile::new();
    let mut memory = DataMemory::new();
    let mut framebuffer = Framebuffer::new();
    let mut warnings = Vec::new();
    let mut trace = TraceRecorder::new();

    let mut pc: u32 = 0;
    let mut if_id = IfId::bubble(0);
    let mut id_ex = IdEx::bubble(0);
    let mut ex_io = ExIo::bubble(0);
    let mut io_mem = IoMem::bubble(0);
    let mut mem_wb = MemWb::bubble(0);

    let mut cycle: u64 = 0;
    let mut retired: u64 = 0;
    let mut idle_cycles: u32 = 0;

    while cycle < cycle_limit {
        // WB
        let retiring = mem_wb;
        if retiring.valid {
            if retiring.rd > 0 {
                registers.write(retiring.rd, retiring.write_data);
            }
            retired += 1;
        }

        // MEM
        let new_mem_wb = mem_stage(&io_mem, &mut memory, &mut warnings);

        // IO
        let new_io_mem = io_stage(&ex_io, &mut framebuffer);

        // EX
        let new_ex_io = ex_stage(&id_ex, &new_io_mem, &new_mem_wb, &mut warnings);

        // ID (hazard checked against the id_ex this cycle's EX just consumed)
        let (mut new_id_ex, stalled) = id_stage(&if_id, &id_ex, &registers, &mut warnings);

        // IF
        let mut new_if_id = if stalled {
            if_id
        } else if (pc as usize) < program.len() {
            let word = program.encoded[pc as usize];
            let fetched_pc = pc;
            pc += 1;
            IfId { word, pc: fetched_pc, valid: true }
        } else {
            IfId::bubble(pc)
        };

        if new_ex_io.valid && new_ex_io.branch_taken {
            pc = new_ex_io.target_pc;
            new_if_id = IfId::bubble(pc);
            new_id_ex = IdEx::bubble(pc);
        }

        trace.push(cycle_snapshot(cycle, &new_if_id, &new_id_ex, &new_ex_io, &new_io_mem, &new_mem_wb, &retiring, &registers));

        if_id = new_if_id;
        id_ex = new_id_ex;
        ex_io = new_ex_io;
        io_mem = new_io_mem;
        mem_wb = new_mem_wb;

        cycle += 1;

        if if_id.valid {
            idle_cycles = 0;
        } else {
            idle_cycles += 1;
        }

        let drained = !if_id.valid && !id_ex.valid && !ex_io.valid && !io_mem.valid && !mem_wb.valid;
        if idle_cycles >= IDLE_DRAIN_CYCLES && drained {
            break;
        }
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

fn id_stage(if_id: &IfId, id_ex: &IdEx, registers: &RegisterFile, warnings: &mut Vec<RuntimeWarning>) -> (IdEx, bool) {
    if !if_id.valid {
        return (IdEx::bubble(if_id.pc), false);
    }

    let decoded = encoding::decode(if_id.word, if_id.pc);
    if !decoded.valid {
        warnings.push(RuntimeWarning::DecodeInvalidOpcode { pc: if_id.pc });
    }

    let load_use_hazard = id_ex.valid
        && id_ex.op == Opcode::Lw
        && id_ex.rd > 0
        && (id_ex.rd == decoded.rs1 || id_ex.rd == decoded.rs2);

    if load_use_hazard {
        return (IdEx::bubble(if_id.pc), true);
    }

    let entry = IdEx {
        op: decoded.op,
        rs1_val: registers.read(decoded.rs1),
        rs2_val: registers.read(decoded.rs2),
        rs1_idx: decoded.rs1,
        rs2_idx: decoded.rs2,
        rd: decoded.rd,
        imm: decoded.imm,
        pc: decoded.pc,
        valid: true,
    };
    (entry, false)
}

fn forward(idx: i32, value_from_id: i32, io_mem: &IoMem, mem_wb: &MemWb) -> (i32, Forward) {
    if idx > 0 && io_mem.valid && io_mem.rd == idx {
        (io_mem.alu_result, Forward::FromIoMem)
    } else if idx > 0 && mem_wb.valid && mem_wb.rd == idx {
        (mem_wb.write_data, Forward::FromMemWb)
    } else {
        (value_from_id, Forward::FromRegFile)
    }
}

fn ex_stage(id_ex: &IdEx, io_mem: &IoMem, mem_wb: &MemWb, warnings: &mut Vec<RuntimeWarning>) -> ExIo {
    if !id_ex.valid {
        return ExIo::bubble(id_ex.pc);
    }

    let (rs1_val, _) = forward(id_ex.rs1_idx, id_ex.rs1_val, io_mem, mem_wb);
    let (rs2_val, _) = forward(id_ex.rs2_idx, id_ex.rs2_val, io_mem, mem_wb);

    let result = executor::execute(id_ex.op, rs1_val, rs2_val, id_ex.imm, id_ex.pc);
    if let Some(warning) = result.warning {
        warnings.push(warning);
    }

    ExIo {
        op: id_ex.op,
        alu_result: result.alu_result,
        rs1_val,
        rs2_val,
        rd: id_ex.rd,
        imm: id_ex.imm,
        pc: id_ex.pc,
        branch_taken: result.branch_taken,
        target_pc: result.next_pc,
        valid: true,
    }
}

fn io_stage(ex_io: &ExIo, framebuffer: &mut Framebuffer) -> IoMem {
    if !ex_io.valid {
        return IoMem::bubble(ex_io.pc);
    }

    if matches!(
        ex_io.op,
        Opcode::Drawpix | Opcode::Drawstep | Opcode::Moveto | Opcode::Lineto | Opcode::Setclr | Opcode::Clearfb
    ) {
        executor::apply_graphics_effect(framebuffer, ex_io.op, ex_io.rs1_val, ex_io.rs2_val, ex_io.imm);
    }

    IoMem {
        op: ex_io.op,
        alu_result: ex_io.alu_result,
        rs2_val: ex_io.rs2_val,
        rd: ex_io.rd,
        pc: ex_io.pc,
        valid: true,
    }
}

fn mem_stage(io_mem: &IoMem, memory: &mut DataMemory, warnings: &mut Vec<RuntimeWarning>) -> MemWb {
    if !io_mem.valid {
        return MemWb::bubble(io_mem.pc);
    }

    let (write_data, is_memory) = match io_mem.op {
        Opcode::Lw => {
            let value = memory.read(io_mem.alu_result).unwrap_or_else(|| {
                warnings.push(RuntimeWarning::MemoryOutOfRange {
                    pc: io_mem.pc,
                    addr: io_mem.alu_result as i64,
                    is_write: false,
                });
                0
            });
            (value, true)
        }
        Opcode::Sw => {
            if !memory.write(io_mem.alu_result, io_mem.rs2_val) {
                warnings.push(RuntimeWarning::MemoryOutOfRange {
                    pc: io_mem.pc,
                    addr: io_mem.alu_result as i64,
                    is_write: true,
                });
            }
            (io_mem.alu_result, true)
        }
        _ => (io_mem.alu_result, false),
    };

    MemWb {
        write_data,
        rd: io_mem.rd,
        is_memory,
        pc: io_mem.pc,
        valid: true,
    }
}

#[allow(clippy::too_many_arguments)]
fn cycle_snapshot(
    cycle: u64,
    if_id: &IfId,
    id_ex: &IdEx,
    ex_io: &ExIo,
    io_mem: &IoMem,
    mem_wb: &MemWb,
    retiring: &MemWb,
    registers: &RegisterFile,
) -> CycleSnapshot {
    CycleSnapshot {
        cycle,
        stages: [
            StageSnapshot { valid: if_id.valid, pc: if_id.pc, text: format!("word={:#010x}", if_id.word), alu_result: 0 },
            StageSnapshot { valid: id_ex.valid, pc: id_ex.pc, text: format!("{:?}", id_ex.op), alu_result: 0 },
            StageSnapshot { valid: ex_io.valid, pc: ex_io.pc, text: format!("{:?}", ex_io.op), alu_result: ex_io.alu_result },
            StageSnapshot { valid: io_mem.valid, pc: io_mem.pc, text: format!("{:?}", io_mem.op), alu_result: io_mem.alu_result },
            StageSnapshot { valid: mem_wb.valid, pc: mem_wb.pc, text: format!("is_memory={}", mem_wb.is_memory), alu_result: mem_wb.write_data },
            StageSnapshot { valid: retiring.valid, pc: retiring.pc, text: format!("rd={}", retiring.rd), alu_result: retiring.write_data },
        ],
        registers: registers.snapshot(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble_source;
    use crate::single_cycle;
    use crate::single_cycle::CYCLE_CAP;

    fn run_pipelined(source: &str) -> RunResult {
        let program = assemble_source(source).unwrap();
        run(&program, CYCLE_CAP).0
    }

    fn matches_single_cycle(source: &str) {
        let program = assemble_source(source).unwrap();
        let (single, _) = single_cycle::run(&program, CYCLE_CAP);
        let (pipelined, _) = run(&program, CYCLE_CAP);
        assert_eq!(single.registers, pipelined.registers);
        assert_eq!(single.memory, pipelined.memory);
        assert_eq!(single.framebuffer, pipelined.framebuffer);
    }

    #[test]
    fn matches_single_cycle_for_straight_line_code() {
        matches_single_cycle("ADDI x1,x0,5\nADDI x2,x0,7\nADD x3,x1,x2\n");
    }

    #[test]
    fn matches_single_cycle_for_store_then_load() {
        matches_single_cycle("ADDI x1,x0,3\nSW x1,0(x0)\nLW x2,0(x0)\n");
    }

    #[test]
    fn matches_single_cycle_for_branch() {
        matches_single_cycle("ADDI x1,x0,1\nADDI x2,x0,1\nBEQ x1,x2,2\nADDI x3,x0,99\nADDI x4,x0,42\n");
    }

    #[test]
    fn matches_single_cycle_for_graphics() {
        matches_single_cycle("SETCLR 0xFF0000\nADDI x1,x0,10\nADDI x2,x0,10\nDRAWPIX x1,x2\n");
    }

    #[test]
    fn matches_single_cycle_for_loop() {
        matches_single_cycle("ADDI x1,x0,0\nL: ADDI x1,x1,1\nADDI x2,x0,5\nBEQ x1,x2,2\nBEQ x0,x0,-3\n");
    }

    #[test]
    fn load_use_hazard_forwards_correctly() {
        let result = run_pipelined("ADDI x1,x0,9\nSW x1,0(x0)\nLW x1,0(x0)\nADD x2,x1,x1\n");
        assert_eq!(result.registers.read(2), 18);
    }

    #[test]
    fn every_instruction_retires_exactly_once() {
        let program = assemble_source("ADDI x1,x0,1\nADDI x2,x0,2\nADD x3,x1,x2\n").unwrap();
        let (result, _) = run(&program, CYCLE_CAP);
        assert_eq!(result.retired, program.len() as u64);
    }

    #[test]
    fn register_zero_never_changes() {
        let result = run_pipelined("ADDI x0,x0,55\nADD x1,x0,x0\n");
        assert_eq!(result.registers.read(0), 0);
    }
}
