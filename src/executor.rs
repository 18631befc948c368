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

//! The pure ISA semantics shared by both drivers. [`execute`] never touches
//! data memory or the framebuffer directly — it computes the architectural
//! effect (ALU result, branch target, memory address) and hands the actual
//! memory access and graphics mutation back to the caller, which is the
//! only place those resources are discipline-checked to be touched from.

use crate::ast::Opcode;
use crate::error::RuntimeWarning;
use crate::framebuffer::Framebuffer;

/// The architectural effect of one instruction. `alu_result` doubles as the
/// write-back value for every non-load opcode; loads write back whatever
/// the caller reads from data memory at `mem_read_addr` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    pub alu_result: i32,
    pub next_pc: u32,
    pub mem_read_addr: Option<i32>,
    pub mem_write_addr: Option<i32>,
    pub mem_write_value: i32,
    pub is_memory_op: bool,
    pub is_branch: bool,
    pub branch_taken: bool,
    pub is_graphics_op: bool,
    pub warning: Option<RuntimeWarning>,
}

impl ExecResult {
    fn scalar(alu_result: i32, pc: u32) -> ExecResult {
        ExecResult {
            alu_result,
            next_pc: pc + 1,
            mem_read_addr: None,
            mem_write_addr: None,
            mem_write_value: 0,
            is_memory_op: false,
            is_branch: false,
            branch_taken: false,
            is_graphics_op: false,
            warning: None,
        }
    }
}

/// Runs one instruction's semantics. `rs1_val`/`rs2_val` are the already
/// resolved (register-file or forwarded) operand values; `imm` is the
/// sign-extended immediate. Register 0's write-back guard (`rd > 0`) and
/// the actual data-memory/framebuffer access are the caller's job.
pub fn execute(op: Opcode, rs1_val: i32, rs2_val: i32, imm: i32, pc: u32) -> ExecResult {
    match op {
        Opcode::Add => ExecResult::scalar(rs1_val.wrapping_add(rs2_val), pc),
        Opcode::Addi => ExecResult::scalar(rs1_val.wrapping_add(imm), pc),
        Opcode::Sub => ExecResult::scalar(rs1_val.wrapping_sub(rs2_val), pc),
        Opcode::Subi => ExecResult::scalar(rs1_val.wrapping_sub(imm), pc),
        Opcode::Mul => ExecResult::scalar(rs1_val.wrapping_mul(rs2_val), pc),
        Opcode::Div => {
            if rs2_val == 0 {
                let mut result = ExecResult::scalar(0, pc);
                result.warning = Some(RuntimeWarning::DivisionByZero { pc });
                result
            } else {
                ExecResult::scalar(rs1_val.wrapping_div(rs2_val), pc)
            }
        }
        Opcode::Lw => {
            let addr = rs1_val.wrapping_add(imm);
            ExecResult {
                mem_read_addr: Some(addr),
                is_memory_op: true,
                ..ExecResult::scalar(addr, pc)
            }
        }
        Opcode::Sw => {
            let addr = rs1_val.wrapping_add(imm);
            ExecResult {
                mem_write_addr: Some(addr),
                mem_write_value: rs2_val,
                is_memory_op: true,
                ..ExecResult::scalar(addr, pc)
            }
        }
        Opcode::Beq => branch(rs1_val == rs2_val, imm, pc),
        Opcode::Blt => branch(rs1_val < rs2_val, imm, pc),
        Opcode::Drawpix | Opcode::Drawstep | Opcode::Moveto | Opcode::Lineto => ExecResult {
            is_graphics_op: true,
            ..ExecResult::scalar(0, pc)
        },
        Opcode::Setclr | Opcode::Clearfb => ExecResult {
            is_graphics_op: true,
            ..ExecResult::scalar(0, pc)
        },
        Opcode::Sin => ExecResult::scalar(trig_lookup(rs1_val, f64::sin), pc),
        Opcode::Cos => ExecResult::scalar(trig_lookup(rs1_val, f64::cos), pc),
        Opcode::Nop | Opcode::Invalid => ExecResult::scalar(0, pc),
    }
}

fn branch(taken: bool, imm: i32, pc: u32) -> ExecResult {
    let next_pc = if taken {
        (pc as i64 + imm as i64) as u32
    } else {
        pc + 1
    };
    ExecResult {
        next_pc,
        is_branch: true,
        branch_taken: taken,
        ..ExecResult::scalar(0, pc)
    }
}

fn trig_lookup(degrees: i32, f: fn(f64) -> f64) -> i32 {
    let radians = degrees as f64 * std::f64::consts::PI / 180.0;
    (f(radians) * 100.0).round() as i32
}

/// Applies a graphics opcode's framebuffer mutation. Kept separate from
/// [`execute`] so only the caller that is allowed to touch the framebuffer
/// (the IO stage in the pipelined model, the executor call site in the
/// single-cycle driver) ever does.
pub fn apply_graphics_effect(fb: &mut Framebuffer, op: Opcode, rs1_val: i32, rs2_val: i32, imm: i32) {
    match op {
        Opcode::Drawpix => fb.draw_pixel(rs1_val, rs2_val),
        Opcode::Drawstep => fb.draw_step(rs1_val, rs2_val),
        Opcode::Moveto => fb.move_to(rs1_val, rs2_val),
        Opcode::Lineto => fb.line_to(rs1_val, rs2_val),
        Opcode::Setclr => fb.set_color(imm),
        Opcode::Clearfb => fb.clear(),
        _ => {}
    }
}
