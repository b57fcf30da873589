//! Packetizer front end.
//!
//! Reads textual machine IR from a file (or stdin when the path is `-` or
//! missing), packetizes every function for the reference DSP target and
//! prints the result.

use bumpalo::Bump;
use clap::Parser;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use vliw_packetizer::core::PacketizerSession;
use vliw_packetizer::dsp::DspTarget;
use vliw_packetizer::packetizer::{Packetizer, PacketizerConfig};
use vliw_packetizer::test_mir::{parse_functions, print_functions};

#[derive(Parser, Debug)]
#[command(name = "packetize", version, about = "Bundle machine IR into VLIW packets")]
struct Args {
    /// Skip packetization and print the input unchanged
    #[arg(long)]
    disable_packetizer: bool,

    /// Keep volatile memory accesses in separate packets
    #[arg(long)]
    no_packetize_volatiles: bool,

    /// Seed the entry block with one instruction of every opcode
    #[arg(long)]
    gen_all_insn_classes: bool,

    /// Never promote stores of vector pair values to new-value stores
    #[arg(long = "disable-vecdbl-nv-stores")]
    disable_vec_dbl_nv_stores: bool,

    /// Let inline assembly join packets
    #[arg(long)]
    schedule_inline_asm: bool,

    /// Model a target with a single store slot
    #[arg(long)]
    single_store: bool,

    /// Print packetizer statistics after the output
    #[arg(long)]
    stats: bool,

    /// Input file, `-` for stdin
    input: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> PacketizerConfig {
        PacketizerConfig {
            disable_packetizer: self.disable_packetizer,
            packetize_volatiles: !self.no_packetize_volatiles,
            gen_all_insn_classes: self.gen_all_insn_classes,
            disable_vec_dbl_nv_stores: self.disable_vec_dbl_nv_stores,
            schedule_inline_asm: self.schedule_inline_asm,
        }
    }

    fn read_input(&self) -> io::Result<String> {
        match &self.input {
            Some(path) if path.as_os_str() != "-" => fs::read_to_string(path),
            _ => {
                let mut buffer = String::new();
                io::stdin().read_to_string(&mut buffer)?;
                Ok(buffer)
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let text = args.read_input()?;
    let target = if args.single_store {
        DspTarget::single_store()
    } else {
        DspTarget::new()
    };

    let mut functions = match parse_functions(&target, &text) {
        Ok(functions) => functions,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let arena = Bump::new();
    let session = PacketizerSession::new(&arena);
    let packetizer = Packetizer::new(&target, args.config(), &session);
    for mf in &mut functions {
        packetizer.run_on_function(mf)?;
    }

    print!("{}", print_functions(&target, &functions));
    if args.stats {
        eprint!("{}", session.stats());
    }
    Ok(())
}
