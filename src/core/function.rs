//! Functions, basic blocks and bundles.

use super::instr::MachineInstr;

/// One entry of a basic block: a plain instruction or a finalized bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockItem {
    Instr(MachineInstr),
    Bundle(Vec<MachineInstr>),
}

impl BlockItem {
    /// Instructions of this item in program order.
    pub fn instrs(&self) -> &[MachineInstr] {
        match self {
            BlockItem::Instr(mi) => std::slice::from_ref(mi),
            BlockItem::Bundle(instrs) => instrs,
        }
    }

    pub fn is_bundle(&self) -> bool {
        matches!(self, BlockItem::Bundle(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineBasicBlock {
    pub name: String,
    pub items: Vec<BlockItem>,
}

impl MachineBasicBlock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, mi: MachineInstr) {
        self.items.push(BlockItem::Instr(mi));
    }

    /// Iterate every instruction, looking through bundles.
    pub fn instrs(&self) -> impl Iterator<Item = &MachineInstr> {
        self.items.iter().flat_map(BlockItem::instrs)
    }

    pub fn bundles(&self) -> impl Iterator<Item = &[MachineInstr]> {
        self.items.iter().filter_map(|item| match item {
            BlockItem::Bundle(instrs) => Some(instrs.as_slice()),
            BlockItem::Instr(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineFunction {
    pub name: String,
    /// Size of the local stack frame allocated by the prologue.
    pub frame_size: u32,
    pub blocks: Vec<MachineBasicBlock>,
}

impl MachineFunction {
    pub fn new(name: impl Into<String>, frame_size: u32) -> Self {
        Self {
            name: name.into(),
            frame_size,
            blocks: Vec::new(),
        }
    }

    pub fn instr_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instrs().count()).sum()
    }

    pub fn bundle_count(&self) -> usize {
        self.blocks.iter().map(|b| b.bundles().count()).sum()
    }
}
