// Packet builder for one scheduling region. Instructions are visited in program order. Solo
// instructions close the open packet and stay outside any bundle; debug values and instructions
// without functional units are stepped over. An instruction that would wait on a result of the
// previous packet closes the open packet instead of stalling it. Every other instruction first
// asks the resource
// tracker for a slot, then is checked against each member of the open packet through the
// dependency classifier, which may promote it on the way. A conflict that cannot be pruned
// closes the packet, and the instruction starts the next one. Placing an instruction reserves
// its slot, plus a constant-extender slot when its immediate needs one, and glues a following
// new-value jump into the same packet when the classifier asked for it.
//
// Packets are recorded as ranges of region positions; a range becomes a bundle only when it
// holds at least two instructions.

//! Packet builder.

use super::context::PacketContext;
use super::depgraph::DependenceGraph;
use super::PacketizerConfig;
use crate::core::{
    BlockItem, MachineInstr, MachineOperand, PacketizeResult, PacketizerSession, RegClass,
};
use crate::target::{ResourceTracker, TargetInfo};
use std::ops::Range;

/// Packetizes one region. Consumed by [`PacketBuilder::run`].
pub struct PacketBuilder<'r, 'arena, T: TargetInfo + ?Sized> {
    pub(super) target: &'r T,
    pub(super) config: &'r PacketizerConfig,
    pub(super) session: &'r PacketizerSession<'arena>,
    pub(super) graph: &'r DependenceGraph<'arena>,
    /// Local frame size, for rebasing stores on the caller's stack pointer.
    pub(super) frame_size: i64,
    pub(super) instrs: Vec<MachineInstr>,
    pub(super) tracker: Box<dyn ResourceTracker + 'r>,
    pub(super) ctx: PacketContext,
    packets: Vec<Range<usize>>,
}

impl<'r, 'arena, T: TargetInfo + ?Sized> PacketBuilder<'r, 'arena, T> {
    pub fn new(
        target: &'r T,
        config: &'r PacketizerConfig,
        session: &'r PacketizerSession<'arena>,
        graph: &'r DependenceGraph<'arena>,
        frame_size: u32,
        instrs: Vec<MachineInstr>,
    ) -> Self {
        Self {
            target,
            config,
            session,
            graph,
            frame_size: i64::from(frame_size),
            instrs,
            tracker: target.resource_tracker(),
            ctx: PacketContext::new(),
            packets: Vec::new(),
        }
    }

    pub(super) fn describe(&self, idx: usize) -> String {
        format!("#{idx} {}", self.target.name(&self.instrs[idx]))
    }

    /// Packetize the whole region and return it as block items.
    pub fn run(mut self) -> PacketizeResult<Vec<BlockItem>> {
        let n = self.instrs.len();
        let mut idx = 0;
        while idx < n {
            self.ctx.begin_candidate();
            let mi = &self.instrs[idx];

            if self.is_solo_instruction(mi) {
                log::trace!("{} issues alone", self.describe(idx));
                self.end_packet(idx);
                self.ctx.old_members = vec![idx];
                idx += 1;
                continue;
            }
            if self.ignore_pseudo_instruction(mi) {
                idx += 1;
                continue;
            }

            if !self.ctx.is_empty() && self.produces_stall(idx) {
                log::trace!("{} would stall behind the previous packet", self.describe(idx));
                self.session.record_stall_avoided();
                self.end_packet(idx);
            }

            if self.tracker.can_reserve(self.instrs[idx].opcode) {
                let members = self.ctx.members.clone();
                for j in members {
                    if !self.is_legal_to_packetize_together(idx, j)?
                        && !self.is_legal_to_prune_dependencies(idx, j)
                    {
                        // Rewrites made against earlier members do not
                        // carry over into the next packet.
                        self.rollback_candidate();
                        self.end_packet(idx);
                        break;
                    }
                }
            } else {
                log::trace!("no slot left for {}", self.describe(idx));
                self.end_packet(idx);
            }

            idx = self.add_to_packet(idx)? + 1;
        }
        self.end_packet(n);
        Ok(self.into_items())
    }

    /// Close the open packet before position `at`.
    pub(super) fn end_packet(&mut self, at: usize) {
        if let Some(first) = self.ctx.first() {
            let len = self.ctx.len();
            log::debug!(
                "packet [{first}..{at}) closed with {len} instruction{}",
                if len == 1 { "" } else { "s" }
            );
            if len > 1 {
                self.packets.push(first..at);
            }
            self.session.record_packet(len);
        }
        self.ctx.clear();
        self.tracker.reset();
    }

    fn reserve_const_ext(&mut self) -> PacketizeResult<bool> {
        let ext = self.target.const_ext_opcode();
        if !self.tracker.can_reserve(ext) {
            return Ok(false);
        }
        self.tracker.reserve(ext)?;
        Ok(true)
    }

    /// Reserve `idx` and, when needed, its extender. False leaves the
    /// tracker in an unspecified state; the caller closes the packet.
    fn try_reserve_with_ext(&mut self, idx: usize) -> PacketizeResult<bool> {
        let opcode = self.instrs[idx].opcode;
        if !self.tracker.can_reserve(opcode) {
            return Ok(false);
        }
        self.tracker.reserve(opcode)?;
        if self.target.needs_const_extender(&self.instrs[idx]) {
            return self.reserve_const_ext();
        }
        Ok(true)
    }

    /// Reserve `idx` and its extender in a fresh packet.
    fn reserve_with_ext(&mut self, idx: usize) -> PacketizeResult<()> {
        self.tracker.reserve(self.instrs[idx].opcode)?;
        if self.target.needs_const_extender(&self.instrs[idx]) {
            self.tracker.reserve(self.target.const_ext_opcode())?;
        }
        Ok(())
    }

    /// Make `idx` a member of the open packet. Its resources are reserved.
    fn place(&mut self, idx: usize) {
        if self.target.needs_const_extender(&self.instrs[idx]) {
            self.session.record_const_extender();
        }
        self.ctx.members.push(idx);
    }

    /// Place candidate `idx`. Returns the last position consumed, which is
    /// the glued new-value jump when there is one.
    fn add_to_packet(&mut self, idx: usize) -> PacketizeResult<usize> {
        let t = self.target;

        if t.is_implicit_def(&self.instrs[idx]) {
            self.widen_implicit_def(idx);
            self.ctx.record.commit();
            return Ok(idx);
        }

        // A promoted form can need a slot the packet no longer has.
        if !self.tracker.can_reserve(self.instrs[idx].opcode) {
            self.rollback_candidate();
            self.end_packet(idx);
        }

        let nvj = idx + 1;
        if self.ctx.record.glue_to_nvj && nvj < self.instrs.len() {
            let fits = self.try_reserve_with_ext(idx)? && self.try_reserve_with_ext(nvj)?;
            if !fits {
                log::trace!("new-value jump does not fit, starting a new packet");
                self.rollback_candidate();
                self.end_packet(idx);
                let pair_fits =
                    self.try_reserve_with_ext(idx)? && self.try_reserve_with_ext(nvj)?;
                if !pair_fits {
                    log::debug!(
                        "{} and its new-value jump cannot share a packet",
                        self.describe(idx)
                    );
                    self.tracker.reset();
                    self.reserve_with_ext(idx)?;
                    self.ctx.record.commit();
                    self.place(idx);
                    return Ok(idx);
                }
            }
            self.ctx.record.commit();
            self.place(idx);
            self.place(nvj);
            self.session.record_nvj_glue();
            return Ok(nvj);
        }

        self.tracker.reserve(self.instrs[idx].opcode)?;
        if t.needs_const_extender(&self.instrs[idx]) && !self.reserve_const_ext()? {
            log::trace!("no slot for the extender of {}", self.describe(idx));
            self.end_packet(idx);
            self.rollback_candidate();
            self.reserve_with_ext(idx)?;
        }
        self.ctx.record.commit();
        self.place(idx);
        Ok(idx)
    }

    /// An implicit definition of a scalar also defines its register pair.
    fn widen_implicit_def(&mut self, idx: usize) {
        let t = self.target;
        let mi = &self.instrs[idx];
        let Some(reg) = mi.operand_reg(0) else {
            return;
        };
        if t.reg_class(reg) != Some(RegClass::Int) {
            return;
        }
        let Some(pair) = t.super_register(reg) else {
            return;
        };
        let present = mi
            .operands
            .iter()
            .any(|mo| mo.is_reg_def() && mo.implicit && mo.reg() == Some(pair));
        if !present {
            self.instrs[idx].add_operand(MachineOperand::implicit_def(pair));
        }
    }

    fn into_items(self) -> Vec<BlockItem> {
        let mut items = Vec::with_capacity(self.instrs.len());
        let mut pending = self.instrs.into_iter();
        let mut pos = 0;
        for range in &self.packets {
            while pos < range.start {
                if let Some(mi) = pending.next() {
                    items.push(BlockItem::Instr(mi));
                }
                pos += 1;
            }
            let bundle: Vec<_> = pending.by_ref().take(range.len()).collect();
            items.push(BlockItem::Bundle(bundle));
            pos = range.end;
        }
        items.extend(pending.map(BlockItem::Instr));
        items
    }

    #[cfg(test)]
    pub(super) fn place_for_test(&mut self, idx: usize) {
        self.tracker
            .reserve(self.instrs[idx].opcode)
            .expect("member must fit");
        self.ctx.members.push(idx);
    }
}
