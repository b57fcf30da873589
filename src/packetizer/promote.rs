// Promotion engine. A data edge from a packet member to the candidate can be removed by
// rewriting one of the two instructions so that it reads the value inside the packet: the
// candidate becomes a dot-new predicated instruction or a new-value store, or a vector load
// producer becomes a dot-cur load. A store to the stack right after allocframe can instead be
// rebased on the caller's stack pointer. Every rewrite goes through the candidate's
// PromotionRecord so that abandoning the candidate restores the instructions exactly.

//! Promotion engine.

use super::builder::PacketBuilder;
use super::classify::{predicate_register, predicate_sense};
use crate::core::{
    MachineInstr, PacketizeResult, PacketizerError, PromotionKind, Reg, RegClass,
};
use crate::target::TargetInfo;

/// Index of the explicit operand holding the stored value.
fn store_value_operand(mi: &MachineInstr) -> Option<usize> {
    mi.explicit_operands().count().checked_sub(1)
}

/// The base register a post-increment access reads and writes back.
fn post_increment_reg<T: TargetInfo + ?Sized>(
    target: &T,
    mi: &MachineInstr,
) -> PacketizeResult<Reg> {
    mi.explicit_operands()
        .filter(|mo| mo.is_reg_use())
        .filter_map(|mo| mo.reg())
        .find(|&reg| mi.defines_register(reg))
        .ok_or(PacketizerError::MissingPostIncrement {
            opcode: target.name(mi),
        })
}

/// The producer defines `reg` only as a side effect.
fn is_implicit_dependency(producer: &MachineInstr, reg: Reg) -> bool {
    producer
        .operands
        .iter()
        .any(|mo| mo.is_reg_def() && mo.implicit && mo.reg() == Some(reg))
}

impl<T: TargetInfo + ?Sized> PacketBuilder<'_, '_, T> {
    /// Whether the vector load `j` can become a dot-cur load feeding `i`.
    pub(super) fn can_promote_to_dot_cur(&self, j: usize, i: usize, reg: Reg) -> bool {
        let t = self.target;
        let (producer, consumer) = (&self.instrs[j], &self.instrs[i]);
        if !t.is_vector(producer) || !t.is_vector(consumer) {
            return false;
        }
        if !t.may_be_cur_load(producer) || t.is_inline_asm(producer) {
            return false;
        }
        let Some(dest) = producer.operand_reg(0) else {
            return false;
        };
        if !consumer.operands.iter().any(|mo| mo.reg() == Some(dest)) {
            return false;
        }
        // The value is only forwarded to one reader.
        !self
            .ctx
            .members
            .iter()
            .any(|&m| self.instrs[m].reads_register(reg, t))
    }

    pub(super) fn promote_to_dot_cur(&mut self, j: usize) -> bool {
        let Some(opcode) = self.target.dot_cur_op(&self.instrs[j]) else {
            return false;
        };
        log::trace!("promoting {} to dot-cur", self.describe(j));
        self.ctx.record.set_opcode(&mut self.instrs, j, opcode);
        self.session.record_promotion(PromotionKind::DotCur);
        true
    }

    fn is_newifiable(&self, mi: &MachineInstr, class: RegClass) -> bool {
        let t = self.target;
        if class == RegClass::Pred && t.is_vector(mi) && t.may_store(mi) {
            return false;
        }
        t.is_cond_inst(mi) || t.is_return(mi) || t.may_be_new_store(mi)
    }

    /// Whether candidate `i` can read `reg` from member `j` in the same packet.
    pub(super) fn can_promote_to_dot_new(
        &self,
        i: usize,
        j: usize,
        reg: Reg,
        class: RegClass,
    ) -> PacketizeResult<bool> {
        let t = self.target;
        let (mi, producer) = (&self.instrs[i], &self.instrs[j]);

        if t.is_dot_new_inst(mi) && !t.may_be_new_store(mi) {
            return Ok(false);
        }
        if !self.is_newifiable(mi, class) {
            return Ok(false);
        }
        if t.is_inline_asm(producer) || t.is_implicit_def(producer) {
            return Ok(false);
        }
        if is_implicit_dependency(producer, reg) {
            return Ok(false);
        }
        if self.config.disable_vec_dbl_nv_stores
            && t.def_reg_class(producer) == Some(RegClass::VectorDouble)
        {
            return Ok(false);
        }

        if class == RegClass::Pred && (t.is_cond_inst(mi) || t.is_return(mi)) {
            return Ok(t.pred_can_be_used_as_dot_new(producer, reg)
                && t.dot_new_pred_op(mi).is_some());
        }
        if class != RegClass::Pred && !t.may_be_new_store(mi) {
            return Ok(false);
        }

        // The new-value form may issue in fewer slots.
        let Some(new_opcode) = t.dot_new_op(mi) else {
            return Ok(false);
        };
        if !self.tracker.can_reserve(new_opcode) {
            return Ok(false);
        }

        self.can_promote_to_new_value_store(i, j, reg)
    }

    /// New-value store legality of store `i` fed by member `j` through `reg`.
    pub(super) fn can_promote_to_new_value_store(
        &self,
        i: usize,
        j: usize,
        reg: Reg,
    ) -> PacketizeResult<bool> {
        let t = self.target;
        let (mi, producer) = (&self.instrs[i], &self.instrs[j]);
        if !t.may_be_new_store(mi) {
            return Ok(false);
        }

        let Some(value_idx) = store_value_operand(mi) else {
            return Ok(false);
        };
        let value = &mi.operands[value_idx];
        if value.is_reg() && value.reg() != Some(reg) {
            return Ok(false);
        }

        if t.def_reg_class(producer) == Some(RegClass::DoubleInt) {
            return Ok(false);
        }

        if self.ctx.members.iter().any(|&m| t.may_store(&self.instrs[m])) {
            return Ok(false);
        }

        if t.is_post_increment(mi) && post_increment_reg(t, mi)? == reg {
            return Ok(false);
        }
        if t.is_post_increment(producer)
            && t.may_load(producer)
            && post_increment_reg(t, producer)? == reg
        {
            return Ok(false);
        }
        if t.is_abs_set(producer) && producer.operand_reg(1) == Some(reg) {
            return Ok(false);
        }

        // Predicated producer: the store must be predicated the same way.
        if t.is_predicated(producer) {
            if !t.is_predicated(mi) {
                return Ok(false);
            }
            let producer_pred = predicate_register(t, producer)?;
            let store_pred = predicate_register(t, mi)?;
            if producer_pred != store_pred
                || t.is_dot_new_inst(producer) != t.is_dot_new_inst(mi)
                || predicate_sense(t, producer) != predicate_sense(t, mi)
            {
                return Ok(false);
            }
        }

        // Members after the producer must leave the store's registers alone.
        let after = self
            .ctx
            .members
            .iter()
            .skip_while(|&&m| m != j)
            .skip(1);
        for &m in after {
            let member = &self.instrs[m];
            let clobbers = mi
                .operands
                .iter()
                .filter_map(|mo| mo.reg())
                .any(|r| member.modifies_register(r, t));
            if clobbers {
                return Ok(false);
            }
        }

        // The new value can only feed the value operand.
        if !t.is_post_increment(mi)
            && mi.operands[..value_idx]
                .iter()
                .any(|mo| mo.reg() == Some(reg))
        {
            return Ok(false);
        }

        if producer.operands.iter().any(|mo| {
            mo.is_reg_def()
                && mo.implicit
                && mo
                    .reg()
                    .is_some_and(|r| r == reg || t.is_super_register(reg, r))
        }) {
            return Ok(false);
        }

        Ok(!mi
            .operands
            .iter()
            .any(|mo| mo.is_reg_use() && mo.implicit && mo.reg() == Some(reg)))
    }

    pub(super) fn promote_to_dot_new(&mut self, i: usize, class: RegClass) -> bool {
        let t = self.target;
        let mi = &self.instrs[i];
        let (opcode, kind) = if class == RegClass::Pred {
            (t.dot_new_pred_op(mi), PromotionKind::DotNewPredicate)
        } else {
            (t.dot_new_op(mi), PromotionKind::NewValueStore)
        };
        let Some(opcode) = opcode else {
            return false;
        };
        log::trace!("promoting {} to {}", self.describe(i), t.desc(opcode).name);
        self.ctx.record.set_opcode(&mut self.instrs, i, opcode);
        self.session.record_promotion(kind);
        true
    }

    /// Rebase a stack store placed with allocframe on the caller's stack
    /// pointer. Returns false when the rebased offset does not encode.
    pub(super) fn use_callers_sp(&mut self, i: usize) -> PacketizeResult<bool> {
        let t = self.target;
        let mi = &self.instrs[i];
        let missing = || PacketizerError::MissingFrameOffset { opcode: t.name(mi) };
        let range = t.desc(mi.opcode).offset.ok_or_else(missing)?;
        let offset = mi
            .operand(range.operand)
            .and_then(|mo| mo.imm_value())
            .ok_or_else(missing)?;

        let rebased = self
            .frame_size
            .checked_add(t.frame_linkage_size())
            .and_then(|adjust| offset.checked_sub(adjust));
        let Some(rebased) = rebased.filter(|&off| t.is_valid_offset(mi.opcode, off)) else {
            return Ok(false);
        };
        log::trace!("rebasing {} offset {offset} -> {rebased}", self.describe(i));
        self.ctx
            .record
            .set_imm(&mut self.instrs, i, range.operand, rebased);
        self.session.record_promotion(PromotionKind::AllocframeStore);
        Ok(true)
    }

    /// Undo every rewrite made for the current candidate.
    pub(super) fn rollback_candidate(&mut self) {
        let undone = self.ctx.record.rollback(&mut self.instrs);
        if undone > 0 {
            log::trace!("rolled back {undone} rewrites");
            self.session.record_rollback(undone);
        }
    }

    /// Called when candidate `i` cannot join member `j`: returns true when
    /// the conflict is one the packet can ignore.
    pub(super) fn is_legal_to_prune_dependencies(&mut self, i: usize, j: usize) -> bool {
        if self.cannot_coexist(&self.instrs[i], &self.instrs[j]) {
            return false;
        }
        if !self.ctx.record.dependence {
            return true;
        }
        self.rollback_candidate();
        false
    }
}
