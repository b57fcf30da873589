//! Textual machine IR (MIR) for tests and the command-line front end.
//!
//! The format is line based and target-aware: opcode and register names are
//! resolved through the target, and each parsed instruction gets the
//! implicit operands its descriptor declares.
//!
//! # MIR Format
//!
//! ```text
//! ; Comments start with semicolon
//! func example frame=16 {
//! bb entry:
//!     r1 = add r2, r3
//!     store r29, #8, r1 :: mem(r29+8,4)
//!     {
//!         p0 = cmp_eq r1, r4
//!         jump_t p0, @exit
//!     }
//! }
//! ```
//!
//! Definitions sit left of `=`, uses right of the opcode. Immediates are
//! written `#n` and symbols `@name`. Register modifiers go in angle brackets:
//! `<dead>`, `<kill>`, `<imp-def>`, `<imp-use>`. Braces inside a block
//! delimit a bundle.

pub mod check;
pub mod parser;

pub use check::{CheckDirective, RunDirective, TestRunner, TestSpec};
pub use parser::parse_functions;

use crate::core::{BlockItem, MachineFunction, MachineInstr, MachineOperand, MemBase, MemRef};
use crate::core::OperandKind;
use crate::target::TargetInfo;
use std::fmt;

/// Printable view of a function.
pub struct FunctionDisplay<'a, T: TargetInfo + ?Sized> {
    target: &'a T,
    mf: &'a MachineFunction,
}

/// Print `mf` in MIR syntax.
pub fn display<'a, T: TargetInfo + ?Sized>(
    target: &'a T,
    mf: &'a MachineFunction,
) -> FunctionDisplay<'a, T> {
    FunctionDisplay { target, mf }
}

/// Print several functions separated by blank lines.
pub fn print_functions<T: TargetInfo + ?Sized>(target: &T, functions: &[MachineFunction]) -> String {
    functions
        .iter()
        .map(|mf| display(target, mf).to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// An implicit operand that the parser would not add back on its own.
fn is_extra_implicit<T: TargetInfo + ?Sized>(
    target: &T,
    mi: &MachineInstr,
    mo: &MachineOperand,
) -> bool {
    let Some(reg) = mo.reg() else {
        return true;
    };
    let desc = target.desc(mi.opcode);
    let declared = if mo.is_def {
        desc.implicit_defs
    } else {
        desc.implicit_uses
    };
    !declared.contains(&reg) || mo.dead || mo.kill
}

fn write_operand<T: TargetInfo + ?Sized>(
    f: &mut fmt::Formatter<'_>,
    target: &T,
    mo: &MachineOperand,
) -> fmt::Result {
    match &mo.kind {
        OperandKind::Reg(reg) => write!(f, "{}", target.reg_name(*reg))?,
        OperandKind::Imm(value) => write!(f, "#{value}")?,
        OperandKind::Symbol(name) => write!(f, "@{name}")?,
    }
    let mut mods = Vec::new();
    if mo.implicit {
        mods.push(if mo.is_def { "imp-def" } else { "imp-use" });
    }
    if mo.dead {
        mods.push("dead");
    }
    if mo.kill {
        mods.push("kill");
    }
    if !mods.is_empty() {
        write!(f, "<{}>", mods.join(","))?;
    }
    Ok(())
}

fn write_mem<T: TargetInfo + ?Sized>(
    f: &mut fmt::Formatter<'_>,
    target: &T,
    mem: &MemRef,
) -> fmt::Result {
    match &mem.base {
        MemBase::Reg(reg) => write!(f, "mem({}", target.reg_name(*reg))?,
        MemBase::Symbol(name) => write!(f, "mem(@{name}")?,
        MemBase::Unknown => write!(f, "mem(?")?,
    }
    if mem.offset >= 0 {
        write!(f, "+{}", mem.offset)?;
    } else {
        write!(f, "{}", mem.offset)?;
    }
    write!(f, ",{}", mem.size)?;
    if mem.volatile {
        write!(f, ",volatile")?;
    }
    write!(f, ")")
}

fn write_instr<T: TargetInfo + ?Sized>(
    f: &mut fmt::Formatter<'_>,
    target: &T,
    mi: &MachineInstr,
    indent: usize,
) -> fmt::Result {
    write!(f, "{:indent$}", "")?;
    let defs: Vec<_> = mi
        .explicit_operands()
        .filter(|mo| mo.is_reg_def())
        .collect();
    let uses: Vec<_> = mi
        .operands
        .iter()
        .filter(|mo| {
            if mo.implicit {
                is_extra_implicit(target, mi, mo)
            } else {
                !mo.is_reg_def()
            }
        })
        .collect();

    for (k, mo) in defs.iter().enumerate() {
        if k > 0 {
            write!(f, ", ")?;
        }
        write_operand(f, target, mo)?;
    }
    if !defs.is_empty() {
        write!(f, " = ")?;
    }
    write!(f, "{}", target.name(mi))?;
    for (k, mo) in uses.iter().enumerate() {
        write!(f, "{}", if k == 0 { " " } else { ", " })?;
        write_operand(f, target, mo)?;
    }
    if !mi.mem_refs.is_empty() {
        write!(f, " ::")?;
        for mem in &mi.mem_refs {
            write!(f, " ")?;
            write_mem(f, target, mem)?;
        }
    }
    writeln!(f)
}

impl<T: TargetInfo + ?Sized> fmt::Display for FunctionDisplay<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "func {} frame={} {{", self.mf.name, self.mf.frame_size)?;
        for block in &self.mf.blocks {
            writeln!(f, "bb {}:", block.name)?;
            for item in &block.items {
                match item {
                    BlockItem::Instr(mi) => write_instr(f, self.target, mi, 4)?,
                    BlockItem::Bundle(instrs) => {
                        writeln!(f, "    {{")?;
                        for mi in instrs {
                            write_instr(f, self.target, mi, 8)?;
                        }
                        writeln!(f, "    }}")?;
                    }
                }
            }
        }
        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::DspTarget;

    #[test]
    fn test_print_parse_print() {
        let target = DspTarget::new();
        let text = "\
func f frame=16 {
bb entry:
    r1 = add r2, r3<kill>
    {
        r4 = tfr r1
        store_new r29, #-8, r4 :: mem(r29-8,4)
    }
    call @g
    r0, r8 = load_pi r8, #4 :: mem(r8+0,4,volatile)
    r5 = add r6, r7, usr<imp-def,dead>
}
";
        let functions = parse_functions(&target, text).unwrap();
        let printed = print_functions(&target, &functions);
        assert_eq!(printed, text);
    }
}
