//! Packetizer configuration toggles.

/// Options controlling the packetizer pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketizerConfig {
    /// Skip the pass entirely.
    pub disable_packetizer: bool,
    /// Allow volatile (ordered) memory references to share a packet.
    pub packetize_volatiles: bool,
    /// Insert one instance of every opcode at the start of the entry block.
    pub gen_all_insn_classes: bool,
    /// Never use a vector-pair producer as the source of a dot-new promotion.
    pub disable_vec_dbl_nv_stores: bool,
    /// Schedule inline assembly like an ordinary instruction instead of
    /// treating it as solo.
    pub schedule_inline_asm: bool,
}

impl Default for PacketizerConfig {
    fn default() -> Self {
        Self {
            disable_packetizer: false,
            packetize_volatiles: true,
            gen_all_insn_classes: false,
            disable_vec_dbl_nv_stores: false,
            schedule_inline_asm: false,
        }
    }
}
