//! FileCheck-style test validation for MIR files.
//!
//! A test file carries `; RUN:` lines naming the packetizer options and
//! `; CHECK:` lines matched in order against the printed result, similar to
//! LLVM's FileCheck tool.

use super::{parse_functions, print_functions};
use crate::core::PacketizerSession;
use crate::dsp::DspTarget;
use crate::packetizer::{Packetizer, PacketizerConfig};
use bumpalo::Bump;
use std::collections::VecDeque;

/// A CHECK directive extracted from a MIR file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckDirective {
    /// CHECK: pattern - Match exact pattern
    Check(String),
    /// CHECK-LABEL: pattern - Label for a section
    CheckLabel(String),
    /// CHECK-NEXT: pattern - Match on the next line
    CheckNext(String),
    /// CHECK-NOT: pattern - Must not appear before the next match
    CheckNot(String),
    /// CHECK-EMPTY - Match empty line
    CheckEmpty,
    /// COM: comment - Comment, ignored
    Comment(String),
}

/// A RUN directive specifying how to execute the test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirective {
    pub command: String,
    pub args: Vec<String>,
}

/// Test specification extracted from a MIR file
#[derive(Debug)]
pub struct TestSpec {
    pub run_directives: Vec<RunDirective>,
    pub check_directives: Vec<CheckDirective>,
    pub mir_content: String,
}

impl TestSpec {
    /// Parse a MIR file to extract test specifications
    pub fn parse(content: &str) -> Result<Self, String> {
        let mut run_directives = Vec::new();
        let mut check_directives = Vec::new();
        let mut mir_lines = Vec::new();

        for line in content.lines() {
            let trimmed = line.trim();

            if let Some(run_cmd) = trimmed.strip_prefix("; RUN:") {
                let parts: Vec<&str> = run_cmd.split_whitespace().collect();
                if let Some((command, args)) = parts.split_first() {
                    run_directives.push(RunDirective {
                        command: command.to_string(),
                        args: args.iter().map(|s| s.to_string()).collect(),
                    });
                }
            } else if let Some(pattern) = trimmed.strip_prefix("; CHECK-LABEL:") {
                check_directives.push(CheckDirective::CheckLabel(pattern.trim().to_string()));
            } else if let Some(pattern) = trimmed.strip_prefix("; CHECK-NEXT:") {
                check_directives.push(CheckDirective::CheckNext(pattern.trim().to_string()));
            } else if let Some(pattern) = trimmed.strip_prefix("; CHECK-NOT:") {
                check_directives.push(CheckDirective::CheckNot(pattern.trim().to_string()));
            } else if trimmed.starts_with("; CHECK-EMPTY") {
                check_directives.push(CheckDirective::CheckEmpty);
            } else if let Some(pattern) = trimmed.strip_prefix("; CHECK:") {
                check_directives.push(CheckDirective::Check(pattern.trim().to_string()));
            } else if let Some(comment) = trimmed.strip_prefix("; COM:") {
                check_directives.push(CheckDirective::Comment(comment.trim().to_string()));
            } else {
                mir_lines.push(line);
            }
        }

        if run_directives.is_empty() {
            return Err("no RUN directive".to_string());
        }

        Ok(TestSpec {
            run_directives,
            check_directives,
            mir_content: mir_lines.join("\n"),
        })
    }
}

/// Test runner that packetizes MIR tests
pub struct TestRunner {
    verbose: bool,
}

impl TestRunner {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Run a MIR test and validate output
    pub fn run_test(&self, spec: &TestSpec) -> Result<(), String> {
        for run_dir in &spec.run_directives {
            let output = self.execute_command(&spec.mir_content, run_dir)?;
            if self.verbose {
                println!("{output}");
            }
            self.validate_output(&output, &spec.check_directives)?;
        }
        Ok(())
    }

    /// Packetize `mir` with the options of `run_dir` and return the printed result
    pub fn execute_command(&self, mir: &str, run_dir: &RunDirective) -> Result<String, String> {
        let mut config = PacketizerConfig::default();
        let mut single_store = false;
        let mut print_stats = false;
        let mut passes = 1;

        for arg in &run_dir.args {
            match arg.as_str() {
                "--disable-packetizer" => config.disable_packetizer = true,
                "--no-packetize-volatiles" => config.packetize_volatiles = false,
                "--gen-all-insn-classes" => config.gen_all_insn_classes = true,
                "--disable-vecdbl-nv-stores" => config.disable_vec_dbl_nv_stores = true,
                "--schedule-inline-asm" => config.schedule_inline_asm = true,
                "--single-store" => single_store = true,
                "--stats" => print_stats = true,
                "--twice" => passes = 2,
                "%s" => {}
                other => return Err(format!("unknown RUN option '{other}'")),
            }
        }

        let target = if single_store {
            DspTarget::single_store()
        } else {
            DspTarget::new()
        };
        let mut functions = parse_functions(&target, mir).map_err(|e| e.to_string())?;

        let arena = Bump::new();
        let session = PacketizerSession::new(&arena);
        let packetizer = Packetizer::new(&target, config, &session);
        for _ in 0..passes {
            for mf in &mut functions {
                packetizer.run_on_function(mf).map_err(|e| e.to_string())?;
            }
        }

        let mut output = print_functions(&target, &functions);
        if print_stats {
            output.push_str(&session.stats().to_string());
        }
        Ok(output)
    }

    /// Validate output against CHECK directives
    pub fn validate_output(
        &self,
        output: &str,
        directives: &[CheckDirective],
    ) -> Result<(), String> {
        let output_lines: VecDeque<_> = output.lines().collect();
        let mut line_idx = 0;
        let mut pending_not: Vec<&str> = Vec::new();

        for directive in directives {
            match directive {
                CheckDirective::Comment(_) => continue,

                CheckDirective::CheckNot(pattern) => pending_not.push(pattern),

                CheckDirective::Check(pattern) | CheckDirective::CheckLabel(pattern) => {
                    let found = output_lines
                        .iter()
                        .skip(line_idx)
                        .position(|line| line.contains(pattern.as_str()));

                    match found {
                        Some(idx) => {
                            let skipped = output_lines.iter().skip(line_idx).take(idx);
                            check_not(&pending_not, skipped)?;
                            pending_not.clear();
                            line_idx += idx + 1;
                            if self.verbose {
                                println!("CHECK: '{}' found at line {}", pattern, line_idx - 1);
                            }
                        }
                        None => {
                            return Err(format!(
                                "CHECK: pattern '{}' not found in output",
                                pattern
                            ));
                        }
                    }
                }

                CheckDirective::CheckNext(pattern) => {
                    if line_idx >= output_lines.len() {
                        return Err(format!("CHECK-NEXT: no more lines, expected '{}'", pattern));
                    }

                    let line = output_lines[line_idx];
                    if !line.contains(pattern.as_str()) {
                        return Err(format!(
                            "CHECK-NEXT: expected '{}' but got '{}'",
                            pattern, line
                        ));
                    }

                    if self.verbose {
                        println!("CHECK-NEXT: '{}' matches at line {}", pattern, line_idx);
                    }
                    line_idx += 1;
                }

                CheckDirective::CheckEmpty => {
                    if line_idx >= output_lines.len() {
                        continue; // End of output counts as empty
                    }

                    let line = output_lines[line_idx];
                    if !line.trim().is_empty() {
                        return Err(format!(
                            "CHECK-EMPTY: expected empty line but got '{}'",
                            line
                        ));
                    }
                    line_idx += 1;
                }
            }
        }

        check_not(&pending_not, output_lines.iter().skip(line_idx))
    }
}

fn check_not<'a>(
    patterns: &[&str],
    mut lines: impl Iterator<Item = &'a &'a str>,
) -> Result<(), String> {
    if patterns.is_empty() {
        return Ok(());
    }
    match lines.find_map(|line| patterns.iter().find(|p| line.contains(**p))) {
        Some(pattern) => Err(format!("CHECK-NOT: pattern '{}' found in output", pattern)),
        None => Ok(()),
    }
}
