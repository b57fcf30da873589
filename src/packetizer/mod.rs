// This module drives VLIW packetization of a machine function. The driver deletes KILL
// pseudos, optionally seeds the entry block with one instance of every opcode, and then walks
// each basic block. Existing bundles are left untouched and split the block into runs of plain
// instructions; each run is cut into scheduling regions at boundary instructions (a region
// runs up to and including the next boundary, and boundaries that start a run are left alone).
// For every region the driver builds a dependence graph in the session arena and hands the
// instructions to a PacketBuilder, which groups them greedily into packets. After all blocks
// are done the post-pass moves debug values and inline assembly out of bundles.
//
// The PacketBuilder is the only stateful piece. Its impl is spread over three files: builder.rs
// holds the region loop and placement, classify.rs the dependency classifier, and promote.rs
// the promotion engine with its rollback journal (context.rs).

//! VLIW packetizer pass.
//!
//! # Usage
//!
//! ```ignore
//! use bumpalo::Bump;
//! use vliw_packetizer::core::PacketizerSession;
//! use vliw_packetizer::dsp::DspTarget;
//! use vliw_packetizer::packetizer::{Packetizer, PacketizerConfig};
//!
//! let arena = Bump::new();
//! let session = PacketizerSession::new(&arena);
//! let target = DspTarget::new();
//! let packetizer = Packetizer::new(&target, PacketizerConfig::default(), &session);
//! packetizer.run_on_function(&mut function)?;
//! ```

pub mod builder;
pub mod classify;
pub mod cleanup;
pub mod config;
pub mod context;
pub mod depgraph;
pub mod promote;

pub use builder::PacketBuilder;
pub use classify::{predicate_register, predicate_sense, PredicateSense};
pub use cleanup::unpacketize_solo_instrs;
pub use config::PacketizerConfig;
pub use context::{Change, PacketContext, PromotionRecord, Rewrite};
pub use depgraph::{analyze, Dep, DepGraphBuilder, DepKind, DependenceGraph};

use crate::core::{
    BlockItem, MachineFunction, MachineInstr, PacketizeResult, PacketizerError,
    PacketizerSession,
};
use crate::target::TargetInfo;

/// The packetizer pass, bound to one target and session.
pub struct Packetizer<'p, 'arena, T: TargetInfo + ?Sized> {
    target: &'p T,
    config: PacketizerConfig,
    session: &'p PacketizerSession<'arena>,
}

impl<'p, 'arena, T: TargetInfo + ?Sized> Packetizer<'p, 'arena, T> {
    pub fn new(
        target: &'p T,
        config: PacketizerConfig,
        session: &'p PacketizerSession<'arena>,
    ) -> Self {
        Self {
            target,
            config,
            session,
        }
    }

    pub fn config(&self) -> &PacketizerConfig {
        &self.config
    }

    /// Region boundary under the current configuration.
    pub fn is_scheduling_boundary(&self, mi: &MachineInstr) -> bool {
        self.target.is_scheduling_boundary(mi)
            || (self.target.is_inline_asm(mi) && !self.config.schedule_inline_asm)
    }

    /// Packetize every block of `mf`. Returns false when the pass is disabled.
    pub fn run_on_function(&self, mf: &mut MachineFunction) -> PacketizeResult<bool> {
        if self.config.disable_packetizer {
            log::debug!("packetizer disabled, skipping {}", mf.name);
            return Ok(false);
        }
        log::info!("packetizing function {}", mf.name);
        self.session.set_current_function(&mf.name);
        self.session.record_function();

        // Work on a copy so an error leaves the function as it was.
        let mut work = mf.clone();
        if let Err(e) = self.packetize_function(&mut work) {
            log::warn!("packetizing {} failed, function left unchanged: {e}", mf.name);
            return Err(e);
        }
        *mf = work;
        Ok(true)
    }

    fn packetize_function(&self, mf: &mut MachineFunction) -> PacketizeResult<()> {
        if self.config.gen_all_insn_classes {
            if let Some(entry) = mf.blocks.first_mut() {
                let all = self.target.all_insn_timing_classes();
                log::debug!("seeding {} with {} timing classes", entry.name, all.len());
                entry
                    .items
                    .splice(0..0, all.into_iter().map(BlockItem::Instr));
            }
        }

        self.remove_kills(mf);

        let frame_size = mf.frame_size;
        for block in &mut mf.blocks {
            log::debug!("block {}: {} items", block.name, block.items.len());
            let items = std::mem::take(&mut block.items);
            let mut out = Vec::with_capacity(items.len());
            let mut run = Vec::new();
            for item in items {
                match item {
                    BlockItem::Instr(mi) => run.push(mi),
                    bundle @ BlockItem::Bundle(_) => {
                        out.extend(self.packetize_run(std::mem::take(&mut run), frame_size)?);
                        out.push(bundle);
                    }
                }
            }
            out.extend(self.packetize_run(run, frame_size)?);
            block.items = out;
        }

        unpacketize_solo_instrs(self.target, self.session, mf);
        Ok(())
    }

    fn remove_kills(&self, mf: &mut MachineFunction) {
        for block in &mut mf.blocks {
            block.items.retain(|item| match item {
                BlockItem::Instr(mi) if self.target.is_kill(mi) => {
                    self.session.record_kill_removed();
                    false
                }
                _ => true,
            });
        }
    }

    /// Split a run of plain instructions into regions and packetize each.
    fn packetize_run(
        &self,
        instrs: Vec<MachineInstr>,
        frame_size: u32,
    ) -> PacketizeResult<Vec<BlockItem>> {
        let n = instrs.len();
        let boundary: Vec<bool> = instrs
            .iter()
            .map(|mi| self.is_scheduling_boundary(mi))
            .collect();
        let mut out = Vec::with_capacity(n);
        let mut pending = instrs.into_iter();
        let mut begin = 0;
        while begin < n {
            let mut region_begin = begin;
            while region_begin < n && boundary[region_begin] {
                region_begin += 1;
            }
            let mut region_end = region_begin;
            while region_end < n && !boundary[region_end] {
                region_end += 1;
            }
            if region_end < n {
                region_end += 1;
            }

            out.extend(
                pending
                    .by_ref()
                    .take(region_begin - begin)
                    .map(BlockItem::Instr),
            );
            if region_begin < region_end {
                let region: Vec<_> = pending.by_ref().take(region_end - region_begin).collect();
                out.extend(self.packetize_region(region, frame_size)?);
            }
            begin = region_end;
        }
        Ok(out)
    }

    /// Packetize one region with the reference dependence analysis.
    pub fn packetize_region(
        &self,
        instrs: Vec<MachineInstr>,
        frame_size: u32,
    ) -> PacketizeResult<Vec<BlockItem>> {
        let graph = analyze(self.target, &instrs, self.session.arena());
        self.packetize_region_with_graph(instrs, &graph, frame_size)
    }

    /// Packetize one region against a caller-supplied dependence graph.
    pub fn packetize_region_with_graph(
        &self,
        instrs: Vec<MachineInstr>,
        graph: &DependenceGraph<'_>,
        frame_size: u32,
    ) -> PacketizeResult<Vec<BlockItem>> {
        if graph.len() != instrs.len() {
            return Err(PacketizerError::GraphMismatch {
                units: graph.len(),
                instrs: instrs.len(),
            });
        }
        log::trace!("region of {} instructions", instrs.len());
        self.session.record_region(instrs.len());
        PacketBuilder::new(
            self.target,
            &self.config,
            self.session,
            graph,
            frame_size,
            instrs,
        )
        .run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_utils::test::TestContext;
    use crate::core::{MachineBasicBlock, MachineOperand, Reg};
    use crate::dsp::opcodes::*;
    use crate::dsp::registers::*;
    use crate::dsp::DspTarget;

    fn alu(def: Reg, a: Reg, b: Reg) -> MachineInstr {
        MachineInstr::with_operands(
            ADD,
            vec![
                MachineOperand::def(def),
                MachineOperand::use_reg(a),
                MachineOperand::use_reg(b),
            ],
        )
    }

    fn jump() -> MachineInstr {
        MachineInstr::with_operands(JUMP, vec![MachineOperand::symbol("exit")])
    }

    fn function(instrs: Vec<MachineInstr>) -> MachineFunction {
        let mut mf = MachineFunction::new("f", 16);
        let mut bb = MachineBasicBlock::new("entry");
        for mi in instrs {
            bb.push(mi);
        }
        mf.blocks.push(bb);
        mf
    }

    #[test]
    fn test_disabled_pass_is_noop() {
        let ctx = TestContext::new();
        let session = ctx.create_session();
        let target = DspTarget::new();
        let config = PacketizerConfig {
            disable_packetizer: true,
            ..PacketizerConfig::default()
        };
        let mut mf = function(vec![alu(r(1), r(2), r(3)), alu(r(4), r(5), r(6))]);
        let before = mf.clone();
        let changed = Packetizer::new(&target, config, &session)
            .run_on_function(&mut mf)
            .unwrap();
        assert!(!changed);
        assert_eq!(mf, before);
    }

    #[test]
    fn test_region_ends_at_branch() {
        let ctx = TestContext::new();
        let session = ctx.create_session();
        let target = DspTarget::new();
        let mut mf = function(vec![
            alu(r(1), r(2), r(3)),
            jump(),
            alu(r(4), r(5), r(6)),
            alu(r(7), r(8), r(9)),
        ]);
        Packetizer::new(&target, PacketizerConfig::default(), &session)
            .run_on_function(&mut mf)
            .unwrap();
        let shape: Vec<_> = mf.blocks[0]
            .items
            .iter()
            .map(|item| item.instrs().len())
            .collect();
        assert_eq!(shape, vec![2, 2]);
        assert_eq!(session.stats().regions, 2);
    }

    #[test]
    fn test_kills_removed_and_bundles_kept() {
        let ctx = TestContext::new();
        let session = ctx.create_session();
        let target = DspTarget::new();
        let mut mf = function(vec![
            MachineInstr::with_operands(KILL, vec![MachineOperand::use_reg(r(1))]),
            alu(r(1), r(2), r(3)),
        ]);
        let kept = BlockItem::Bundle(vec![alu(r(1), r(2), r(3)), alu(r(1), r(2), r(3))]);
        mf.blocks[0].items.push(kept.clone());
        mf.blocks[0].push(alu(r(4), r(5), r(6)));

        Packetizer::new(&target, PacketizerConfig::default(), &session)
            .run_on_function(&mut mf)
            .unwrap();
        let items = &mf.blocks[0].items;
        assert_eq!(items.len(), 3);
        assert_eq!(items[1], kept);
        assert_eq!(session.stats().kills_removed, 1);
    }

    #[test]
    fn test_leading_boundaries_left_alone() {
        let ctx = TestContext::new();
        let session = ctx.create_session();
        let target = DspTarget::new();
        let packetizer = Packetizer::new(&target, PacketizerConfig::default(), &session);
        let items = packetizer
            .packetize_run(
                vec![MachineInstr::new(EH_LABEL), alu(r(1), r(2), r(3)), jump()],
                0,
            )
            .unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[1].is_bundle());
        assert_eq!(session.stats().regions, 1);
    }

    #[test]
    fn test_timing_classes_seeded() {
        let ctx = TestContext::new();
        let session = ctx.create_session();
        let target = DspTarget::new();
        let config = PacketizerConfig {
            gen_all_insn_classes: true,
            ..PacketizerConfig::default()
        };
        let mut mf = function(vec![]);
        Packetizer::new(&target, config, &session)
            .run_on_function(&mut mf)
            .unwrap();
        assert_eq!(
            mf.instr_count(),
            target.all_insn_timing_classes().len()
        );
    }

    #[test]
    fn test_graph_size_checked() {
        let ctx = TestContext::new();
        let session = ctx.create_session();
        let target = DspTarget::new();
        let graph = DepGraphBuilder::new(1).build(session.arena());
        let err = Packetizer::new(&target, PacketizerConfig::default(), &session)
            .packetize_region_with_graph(
                vec![alu(r(1), r(2), r(3)), alu(r(4), r(5), r(6))],
                &graph,
                0,
            )
            .unwrap_err();
        assert_eq!(err, PacketizerError::GraphMismatch { units: 1, instrs: 2 });
    }
}
