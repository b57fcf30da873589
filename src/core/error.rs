// Error types for the packetizer, built on thiserror. Most packetizer decisions are plain
// booleans: an unmodeled or ambiguous dependency simply blocks. PacketizerError is reserved
// for broken upstream contracts (reserving a slot the tracker reported busy, a predicated
// instruction without a predicate register, an offset rewrite on an instruction without an
// offset) and for failures of the textual machine IR front end used by tests and the CLI.

//! Error types for the packetizer.

use thiserror::Error;

/// Main error type for packetization.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketizerError {
    #[error("Resources not available for opcode {opcode}")]
    ResourcesUnavailable { opcode: u16 },

    #[error("Predicate register not found in predicated instruction {opcode}")]
    MissingPredicateRegister { opcode: &'static str },

    #[error("Instruction {opcode} has no frame offset operand")]
    MissingFrameOffset { opcode: &'static str },

    #[error("Dependence graph has {units} units for a region of {instrs} instructions")]
    GraphMismatch { units: usize, instrs: usize },

    #[error("Post-increment operand not found in {opcode}")]
    MissingPostIncrement { opcode: &'static str },

    #[error("Unknown opcode: {name}")]
    UnknownOpcode { name: String },

    #[error("Unknown register: {name}")]
    UnknownRegister { name: String },

    #[error("Parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// Result type alias for packetizer operations.
pub type PacketizeResult<T> = Result<T, PacketizerError>;
