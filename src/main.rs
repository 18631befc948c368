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

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cyclevm::file_reader::AsmFileReader;
use cyclevm::single_cycle::CYCLE_CAP;
use cyclevm::{results_agree, simulate, DriverMode};

#[derive(Parser)]
#[clap(version = "0.1.0", author = "Connor Nolan")]
struct Opts {
    /// Assembly source path.
    #[clap(default_value = "program.instr")]
    source: PathBuf,

    /// Run only the single-cycle reference.
    #[clap(short, long)]
    single: bool,

    /// Run only the pipelined model.
    #[clap(short, long)]
    pipelined: bool,

    /// Run both and report any divergence. Implied when no mode flag is given.
    #[clap(short, long)]
    compare: bool,

    /// Framebuffer PPM output path.
    #[clap(short, long, default_value = "framebuffer.ppm")]
    output: PathBuf,

    /// Cycle trace output path.
    #[clap(short, long, default_value = "trace.txt")]
    trace: PathBuf,

    /// Also emit the trace as JSON.
    #[clap(long)]
    trace_json: Option<PathBuf>,

    /// Print an ASCII-art preview of the framebuffer.
    #[clap(long)]
    ascii_fb: bool,

    /// Override the runaway-program cycle cap.
    #[clap(long)]
    cycle_limit: Option<u64>,
}

impl Opts {
    fn mode(&self) -> DriverMode {
        match (self.single, self.pipelined, self.compare) {
            (true, false, false) => DriverMode::SingleOnly,
            (false, true, false) => DriverMode::PipelinedOnly,
            _ => DriverMode::Compare,
        }
    }
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    let reader = AsmFileReader;
    let cycle_limit = opts.cycle_limit.unwrap_or(CYCLE_CAP);

    let outcome = simulate(&reader, &opts.source, opts.mode(), cycle_limit)?;

    let primary = match (&outcome.single, &outcome.pipelined) {
        (_, Some(pipelined)) => pipelined,
        (Some(single), None) => single,
        (None, None) => unreachable!("simulate always returns at least one result"),
    };

    if let (Some(single), Some(pipelined)) = (&outcome.single, &outcome.pipelined) {
        if results_agree(single, pipelined) {
            println!("single-cycle and pipelined results agree");
        } else {
            println!("DIVERGENCE: single-cycle and pipelined results differ");
        }
        for warning in &single.warnings {
            eprintln!("single-cycle warning: {warning}");
        }
        for warning in &pipelined.warnings {
            eprintln!("pipelined warning: {warning}");
        }
    } else {
        for warning in &primary.warnings {
            eprintln!("warning: {warning}");
        }
    }

    primary
        .framebuffer
        .dump_ppm(&opts.output)
        .with_context(|| format!("failed to write framebuffer to '{}'", opts.output.display()))?;
    println!("framebuffer written to {}", opts.output.display());

    if opts.ascii_fb {
        print!("{}", primary.framebuffer.render_ascii());
    }

    std::fs::write(&opts.trace, outcome.trace.render_text())
        .with_context(|| format!("failed to write trace to '{}'", opts.trace.display()))?;

    if let Some(json_path) = &opts.trace_json {
        let json = outcome.trace.to_json().context("failed to serialize trace as JSON")?;
        std::fs::write(json_path, json).with_context(|| format!("failed to write JSON trace to '{}'", json_path.display()))?;
    }

    Ok(())
}
