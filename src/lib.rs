//! VLIW instruction packetizer.
//!
//! Groups the instructions of each scheduling region into issue packets
//! (bundles) that respect functional-unit capacity, register and memory
//! dependences, and the architectural rules of the target. Dependences that
//! would otherwise forbid bundling are removed where possible by promoting
//! the consumer to a new-value, dot-new predicated or dot-cur form, and every
//! rewrite is undone if the candidate is finally refused.
//!
//! # Primary Usage
//!
//! ```ignore
//! use bumpalo::Bump;
//! use vliw_packetizer::core::PacketizerSession;
//! use vliw_packetizer::dsp::DspTarget;
//! use vliw_packetizer::packetizer::{Packetizer, PacketizerConfig};
//! use vliw_packetizer::test_mir::{parse_functions, print_functions};
//!
//! let target = DspTarget::new();
//! let mut functions = parse_functions(&target, source)?;
//!
//! let arena = Bump::new();
//! let session = PacketizerSession::new(&arena);
//! let packetizer = Packetizer::new(&target, PacketizerConfig::default(), &session);
//! for mf in &mut functions {
//!     packetizer.run_on_function(mf)?;
//! }
//! println!("{}", print_functions(&target, &functions));
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Registers, machine instructions, functions, session and errors
//! - [`target`] - Target capability traits and the slot resource tracker
//! - [`dsp`] - The reference four-slot DSP target
//! - [`packetizer`] - Region driver, dependency classifier and promotion engine
//! - [`test_mir`] - Textual machine IR and the FileCheck-style test runner

pub mod core;
pub mod dsp;
pub mod packetizer;
pub mod target;
pub mod test_mir;

pub use core::{
    BlockItem, MachineBasicBlock, MachineFunction, MachineInstr, MachineOperand,
    PacketizeResult, PacketizerError, PacketizerSession, PacketizerStats, Reg,
};
pub use dsp::DspTarget;
pub use packetizer::{Packetizer, PacketizerConfig};
pub use target::{RegisterInfo, TargetInfo};
