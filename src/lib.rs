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

//! A cycle-accurate simulator for a small RISC-style instruction set with
//! a framebuffer co-processor: an assembler, a pure ISA executor, a
//! single-cycle reference driver, and a six-stage pipelined driver that is
//! provably equivalent to the reference on final architectural state.

pub mod assembler;
pub mod ast;
pub mod encoding;
pub mod error;
pub mod executor;
pub mod file_reader;
pub mod framebuffer;
pub mod memory;
pub mod parser;
pub mod pipeline;
pub mod registers;
pub mod single_cycle;
pub mod symbol_table;
pub mod trace;

use anyhow::{Context, Result};

use crate::file_reader::FileReader;
use crate::single_cycle::RunResult;
use crate::trace::TraceRecorder;

/// Which driver(s) a run should exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverMode {
    SingleOnly,
    PipelinedOnly,
    Compare,
}

/// The outcome of a run: the result(s) the requested driver mode produced,
/// plus the trace from whichever driver is considered primary (the
/// pipelined one when both ran, since that's the one worth inspecting).
#[derive(Debug)]
pub struct SimulationOutcome {
    pub single: Option<RunResult>,
    pub pipelined: Option<RunResult>,
    pub trace: TraceRecorder,
}

/// Reads and assembles a source file through the given [`FileReader`], then
/// runs it under the requested driver mode(s).
pub fn simulate(reader: &dyn FileReader, path: &std::path::Path, mode: DriverMode, cycle_limit: u64) -> Result<SimulationOutcome> {
    let source = reader
        .read_to_string(path)
        .with_context(|| format!("failed to read source file '{}'", path.display()))?;

    let program = assembler::assemble_source(&source).with_context(|| "failed to assemble source")?;

    Ok(match mode {
        DriverMode::SingleOnly => {
            let (result, trace) = single_cycle::run(&program, cycle_limit);
            SimulationOutcome { single: Some(result), pipelined: None, trace }
        }
        DriverMode::PipelinedOnly => {
            let (result, trace) = pipeline::run(&program, cycle_limit);
            SimulationOutcome { single: None, pipelined: Some(result), trace }
        }
        DriverMode::Compare => {
            let (single, _) = single_cycle::run(&program, cycle_limit);
            let (pipelined, trace) = pipeline::run(&program, cycle_limit);
            SimulationOutcome { single: Some(single), pipelined: Some(pipelined), trace }
        }
    })
}

/// Reports whether two run results agree on every architecturally
/// observable field: registers, data memory, and framebuffer pixels.
/// Cycle counts and retirement counts are expected to differ and are not
/// part of the comparison.
pub fn results_agree(a: &RunResult, b: &RunResult) -> bool {
    a.registers == b.registers && a.memory == b.memory && a.framebuffer == b.framebuffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_reader::MockFileReader;
    use std::path::Path;

    #[test]
    fn compare_mode_runs_both_drivers_and_they_agree() {
        let mut reader = MockFileReader::default();
        reader.add_file("program.instr", "ADDI x1,x0,5\nADDI x2,x0,7\nADD x3,x1,x2\n");

        let outcome = simulate(&reader, Path::new("program.instr"), DriverMode::Compare, 1_000).unwrap();
        let single = outcome.single.unwrap();
        let pipelined = outcome.pipelined.unwrap();
        assert!(results_agree(&single, &pipelined));
        assert_eq!(single.registers.read(3), 12);
    }

    #[test]
    fn missing_file_is_a_reported_error() {
        let reader = MockFileReader::default();
        let err = simulate(&reader, Path::new("missing.instr"), DriverMode::SingleOnly, 1_000).unwrap_err();
        assert!(err.to_string().contains("failed to read source file"));
    }

    #[test]
    fn assembly_error_surfaces_through_context() {
        let mut reader = MockFileReader::default();
        reader.add_file("bad.instr", "BEQ x0,x0,nowhere\n");
        let err = simulate(&reader, Path::new("bad.instr"), DriverMode::SingleOnly, 1_000).unwrap_err();
        assert!(err.to_string().contains("failed to assemble source"));
    }
}
