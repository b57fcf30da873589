//! Dependency classifier.
//!
//! Dependency classification between a candidate instruction and one member of the current
//! packet. The checks run in a fixed precedence: pairs that can never coexist, dead-definition
//! collisions the graph does not show, control hazards, store-class exclusivity, new-value jump
//! glue, and finally the walk over the graph edges from the member to the candidate. The walk
//! discharges edges one by one (ABI-irrelevant edges into calls, data edges removed by a
//! promotion, complementary predicates, harmless order and anti edges) and stops at the first
//! edge it cannot discharge. Anything not explicitly discharged blocks.

use super::builder::PacketBuilder;
use super::depgraph::{Dep, DepKind};
use crate::core::{MachineInstr, PacketizeResult, PacketizerError, Reg, RegBitSet, RegClass};
use crate::target::TargetInfo;

/// Predicate sense of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateSense {
    True,
    False,
    Unknown,
}

pub fn predicate_sense<T: TargetInfo + ?Sized>(target: &T, mi: &MachineInstr) -> PredicateSense {
    if !target.is_predicated(mi) {
        PredicateSense::Unknown
    } else if target.is_predicated_true(mi) {
        PredicateSense::True
    } else {
        PredicateSense::False
    }
}

/// The predicate register of a predicated instruction: its first predicate use.
pub fn predicate_register<T: TargetInfo + ?Sized>(
    target: &T,
    mi: &MachineInstr,
) -> PacketizeResult<Reg> {
    mi.operands
        .iter()
        .filter(|mo| mo.is_reg_use())
        .filter_map(|mo| mo.reg())
        .find(|&reg| target.is_pred_reg(reg))
        .ok_or(PacketizerError::MissingPredicateRegister {
            opcode: target.name(mi),
        })
}

/// `consumer` reads the register `producer` writes through operand 0.
fn is_dependent(producer: &MachineInstr, consumer: &MachineInstr) -> bool {
    let Some(dest) = producer
        .operand(0)
        .filter(|mo| mo.is_reg_def())
        .and_then(|mo| mo.reg())
    else {
        return false;
    };
    consumer
        .operands
        .iter()
        .any(|mo| mo.is_reg_use() && mo.reg() == Some(dest))
}

fn is_reg_dependence(kind: DepKind) -> bool {
    matches!(kind, DepKind::Data | DepKind::Anti | DepKind::Output)
}

impl<T: TargetInfo + ?Sized> PacketBuilder<'_, '_, T> {
    /// Instructions that always issue alone.
    pub(super) fn is_solo_instruction(&self, mi: &MachineInstr) -> bool {
        let t = self.target;
        t.is_eh_label(mi)
            || t.is_cfi(mi)
            || (t.is_inline_asm(mi) && !self.config.schedule_inline_asm)
            || t.is_sched_barrier(mi)
            || t.is_solo(mi)
    }

    /// Instructions the packet loop steps over without placing them.
    pub(super) fn ignore_pseudo_instruction(&self, mi: &MachineInstr) -> bool {
        let t = self.target;
        if t.is_debug_value(mi) {
            return true;
        }
        if t.is_cfi(mi) || t.is_inline_asm(mi) || t.is_implicit_def(mi) {
            return false;
        }
        !t.has_functional_units(mi)
    }

    /// Adding `i` to the open packet would stall the packet on a result of
    /// the previous one. Closing the packet first gives that result an
    /// extra cycle.
    pub(super) fn produces_stall(&self, i: usize) -> bool {
        let t = self.target;
        let mi = &self.instrs[i];
        let mut previous = self.ctx.old_members.iter().map(|&j| &self.instrs[j]);

        if t.is_vector(mi) {
            return previous.any(|pj| {
                t.is_vector(pj) && is_dependent(pj, mi) && !t.is_usable_next_packet(pj, mi)
            });
        }

        // A scalar defined in this packet may still be read as dot-new.
        if self.ctx.members.iter().any(|&j| {
            let pj = &self.instrs[j];
            !t.is_vector(pj) && is_dependent(pj, mi)
        }) {
            return false;
        }
        previous.any(|pj| {
            !t.is_vector(pj) && is_dependent(pj, mi) && !t.is_usable_next_packet(pj, mi)
        })
    }

    fn cannot_coexist_asymm(&self, mi: &MachineInstr, mj: &MachineInstr) -> bool {
        let t = self.target;
        if t.requires_exclusive_addressing(mi, mj) {
            return true;
        }
        if self.is_solo_instruction(mi) {
            return true;
        }
        // The asm could not be moved out of a bundle holding control flow,
        // and two asm blocks would lose their relative order.
        if t.is_inline_asm(mi) {
            return t.is_inline_asm(mj)
                || t.is_branch(mj)
                || t.is_barrier(mj)
                || t.is_call(mj)
                || t.is_terminator(mj);
        }
        false
    }

    /// Pairs that never share a packet, whatever the dependences.
    pub fn cannot_coexist(&self, mi: &MachineInstr, mj: &MachineInstr) -> bool {
        self.cannot_coexist_asymm(mi, mj) || self.cannot_coexist_asymm(mj, mi)
    }

    /// Both instructions write the same register as a dead result.
    pub fn has_dead_dependence(&self, mi: &MachineInstr, mj: &MachineInstr) -> bool {
        let t = self.target;
        if t.is_call(mi) || t.is_call(mj) {
            return false;
        }
        if t.is_predicated(mi) || t.is_predicated(mj) {
            return false;
        }

        let mut dead_defs = RegBitSet::new();
        for mo in mi.operands.iter().filter(|mo| mo.is_reg_def() && mo.dead) {
            if let Some(reg) = mo.reg() {
                dead_defs.set(reg);
            }
        }
        mj.operands
            .iter()
            .filter(|mo| mo.is_reg_def() && mo.dead)
            .filter_map(|mo| mo.reg())
            .any(|reg| !t.is_ignorable_dead_def(reg) && dead_defs.contains(reg))
    }

    fn modifies_callee_saved_reg(&self, mi: &MachineInstr) -> bool {
        self.target
            .callee_saved_regs()
            .iter()
            .any(|&reg| mi.modifies_register(reg, self.target))
    }

    fn is_bad_for_loop_n(&self, mi: &MachineInstr) -> bool {
        let t = self.target;
        t.is_call(mi)
            || t.is_dealloc_ret(mi)
            || t.is_new_value_jump(mi)
            || (t.is_predicated_new(mi) && t.is_jump_r(mi))
    }

    pub fn has_control_dependence(&self, mi: &MachineInstr, mj: &MachineInstr) -> bool {
        let t = self.target;
        if (t.is_save_callee_saved_regs_call(mi) && self.modifies_callee_saved_reg(mj))
            || (t.is_save_callee_saved_regs_call(mj) && self.modifies_callee_saved_reg(mi))
        {
            return true;
        }

        if t.is_control_flow(mi) && t.is_control_flow(mj) {
            return true;
        }

        // A loop setup packet cannot hold a call, a dealloc_return, a
        // new-value jump or a speculative indirect jump.
        if (t.is_loop_n(mi) && self.is_bad_for_loop_n(mj))
            || (t.is_loop_n(mj) && self.is_bad_for_loop_n(mi))
        {
            return true;
        }

        t.is_dealloc_ret(mi) && (t.is_branch(mj) || t.is_call(mj) || t.is_barrier(mj))
    }

    /// Store-slot restrictions: system instructions, new-value stores,
    /// memops and dealloc_return all need slot 0 alone.
    pub fn has_store_dependence(&self, mi: &MachineInstr, mj: &MachineInstr) -> bool {
        let t = self.target;
        let (sys_i, sys_j) = (t.is_system(mi), t.is_system(mj));
        let (store_i, store_j) = (t.may_store(mi), t.may_store(mj));
        if (sys_i && store_j) || (sys_j && store_i) {
            return true;
        }

        if store_i && store_j {
            if !t.allows_dual_stores()
                || t.is_new_value_store(mi)
                || t.is_new_value_store(mj)
                || t.is_mem_op(mi)
                || t.is_mem_op(mj)
            {
                return true;
            }
        } else {
            let mop_st_i = t.is_mem_op(mi) || store_i;
            let mop_st_j = t.is_mem_op(mj) || store_j;
            if mop_st_i && mop_st_j {
                return true;
            }
        }

        (store_j && t.is_dealloc_ret(mi)) || (store_i && t.is_dealloc_ret(mj))
    }

    /// Whether a register edge into a call or return still matters.
    fn is_call_dependent(&self, mi: &MachineInstr, kind: DepKind, reg: Option<Reg>) -> bool {
        let t = self.target;
        let Some(reg) = reg else {
            return false;
        };
        if reg == t.return_address_register() {
            return true;
        }
        if t.is_dealloc_ret(mi) && (reg == t.frame_register() || reg == t.stack_register()) {
            return true;
        }
        if t.is_pred_reg(reg) {
            return true;
        }
        // Operand 0 of an indirect call is the target address.
        t.is_indirect_call(mi)
            && kind == DepKind::Data
            && mi
                .operand(0)
                .is_some_and(|mo| mo.is_reg_use() && mo.reg() == Some(reg))
    }

    /// If the instruction after `i` is a new-value jump reading the result
    /// of `i`, check that both can join the packet together and mark them
    /// glued.
    fn check_new_value_jump_glue(&mut self, i: usize) -> bool {
        let t = self.target;
        let Some(nvj) = self.instrs.get(i + 1) else {
            return true;
        };
        if !t.is_new_value_jump(nvj) {
            return true;
        }
        let Some(def) = self.instrs[i]
            .operand(0)
            .filter(|mo| mo.is_reg_def())
            .and_then(|mo| mo.reg())
        else {
            return true;
        };

        let compared = |k: usize| nvj.operand(k).and_then(|mo| mo.reg());
        let other_reg = if compared(0) == Some(def) {
            compared(1)
        } else if compared(1) == Some(def) {
            compared(0)
        } else {
            return true;
        };

        for &m in &self.ctx.members {
            let pm = &self.instrs[m];
            // No dual jumps with a new-value jump.
            if t.is_call(pm) || t.is_frame_alloc(pm) || t.may_store(pm) || t.is_loop_n(pm) {
                self.ctx.record.dependence = true;
                break;
            }
            if other_reg.is_some_and(|reg| pm.modifies_register(reg, t)) {
                self.ctx.record.dependence = true;
                break;
            }
        }

        if self.ctx.record.dependence {
            return false;
        }
        self.ctx.record.glue_to_nvj = true;
        true
    }

    /// Whether candidate `i` may join member `j`. May promote `i` (or `j`
    /// to dot-cur) and rebase a frame store; such rewrites are journaled.
    pub(super) fn is_legal_to_packetize_together(
        &mut self,
        i: usize,
        j: usize,
    ) -> PacketizeResult<bool> {
        let t = self.target;

        if self.cannot_coexist(&self.instrs[i], &self.instrs[j]) {
            log::trace!("{} cannot coexist with {}", self.describe(i), self.describe(j));
            return Ok(false);
        }

        let (mi, mj) = (&self.instrs[i], &self.instrs[j]);
        if self.has_dead_dependence(mi, mj)
            || self.has_control_dependence(mi, mj)
            || self.has_store_dependence(mi, mj)
        {
            log::trace!("{} conflicts with {}", self.describe(i), self.describe(j));
            self.ctx.record.dependence = true;
            return Ok(false);
        }

        if !self.check_new_value_jump_glue(i) {
            log::trace!("new-value jump after {} cannot be glued", self.describe(i));
            return Ok(false);
        }

        if !self.graph.is_succ(j, i) {
            return Ok(true);
        }

        let deps: Vec<Dep> = self.graph.edges_between(j, i).copied().collect();
        for dep in deps {
            if self.ctx.record.found_sequential {
                break;
            }
            if !self.discharge_edge(i, j, dep)? {
                log::trace!(
                    "{:?} edge {} -> {} on {:?} blocks",
                    dep.kind,
                    j,
                    i,
                    dep.reg.map(|r| t.reg_name(r))
                );
                self.ctx.record.found_sequential = true;
            }
        }

        if self.ctx.record.found_sequential || self.ctx.record.dependence {
            self.ctx.record.dependence = true;
            return Ok(false);
        }
        Ok(true)
    }

    /// Returns false when `dep` (from member `j` to candidate `i`) cannot be
    /// discharged.
    fn discharge_edge(&mut self, i: usize, j: usize, dep: Dep) -> PacketizeResult<bool> {
        let t = self.target;
        let kind = dep.kind;
        let data_reg = if kind == DepKind::Data { dep.reg } else { None };
        let data_class = data_reg.and_then(|reg| t.reg_class(reg));

        {
            let mi = &self.instrs[i];
            // Calls and returns only care about ABI registers and predicates.
            if t.is_call(mi) || t.is_return(mi) || t.is_tail_call(mi) {
                if !is_reg_dependence(kind) || !self.is_call_dependent(mi, kind, dep.reg) {
                    return Ok(true);
                }
            }
        }

        if let Some(reg) = data_reg {
            if self.can_promote_to_dot_cur(j, i, reg) && self.promote_to_dot_cur(j) {
                return Ok(true);
            }
        }

        if kind == DepKind::Data
            && t.is_dot_cur_inst(&self.instrs[j])
            && t.is_vector(&self.instrs[i])
        {
            return Ok(true);
        }

        if let (Some(reg), Some(class)) = (data_reg, data_class) {
            if self.can_promote_to_dot_new(i, j, reg, class)? && self.promote_to_dot_new(i, class) {
                self.ctx.record.promoted_to_dot_new = true;
                return Ok(true);
            }
        }
        if kind == DepKind::Data && t.is_new_value_jump(&self.instrs[i]) {
            return Ok(true);
        }

        if t.is_predicated(&self.instrs[i])
            && t.is_predicated(&self.instrs[j])
            && self.are_predicates_complements(i, j)
        {
            // Discharge once per producer: the graph omits transitive edges
            // (p ? r0 = ..; !p ? r0 = ..; p ? r0 = ..) so a second discharge
            // could place the first and third writes together.
            if self.ctx.ignore_deps.contains(&j) {
                self.ctx.record.dependence = true;
                return Ok(false);
            }
            self.ctx.ignore_deps.push(i);
            return Ok(true);
        }

        let (mi, mj) = (&self.instrs[i], &self.instrs[j]);

        if t.is_direct_jump(mi) && !t.is_branch(mj) && !t.is_call(mj) && kind == DepKind::Order {
            return Ok(true);
        }

        if t.is_conditional_branch(mi) && kind != DepKind::Data && kind != DepKind::Output {
            return Ok(true);
        }

        if kind == DepKind::Output {
            // Writes to different halves of a pair do not conflict.
            return Ok(match dep.reg {
                Some(reg) => !mi.defines_register(reg) && !mj.defines_register(reg),
                None => false,
            });
        }

        if kind == DepKind::Order {
            return Ok(self.order_dependence_allows(mi, mj, dep));
        }

        if kind == DepKind::Data
            && dep.reg == Some(t.stack_register())
            && t.is_frame_alloc(mj)
            && t.is_frame_store(mi)
            && mi.operand_reg(0) == Some(t.stack_register())
        {
            if self.ctx.record.glue_allocframe_store {
                return Ok(true);
            }
            let glued = self.use_callers_sp(i)?;
            self.ctx.record.glue_allocframe_store = glued;
            if glued {
                return Ok(true);
            }
        }

        let (mi, mj) = (&self.instrs[i], &self.instrs[j]);
        if kind == DepKind::Anti && t.is_call(mj) {
            // The call would observe the write.
            let clobbers = t.desc(mj.opcode).implicit_defs;
            if clobbers.iter().any(|&reg| mi.modifies_register(reg, t)) {
                return Ok(false);
            }
        }

        Ok(kind == DepKind::Anti)
    }

    /// Memory ordering between member `mj` (first) and candidate `mi`.
    fn order_dependence_allows(&self, mi: &MachineInstr, mj: &MachineInstr, dep: Dep) -> bool {
        let t = self.target;
        if !self.config.packetize_volatiles
            && (t.has_ordered_memory_ref(mi) || t.has_ordered_memory_ref(mj))
        {
            return false;
        }
        let (load_j, store_j) = (t.may_load(mj), t.may_store(mj));
        let (load_i, store_i) = (t.may_load(mi), t.may_store(mi));
        if store_j {
            // A load never follows a store in the same packet.
            if load_i {
                return false;
            }
            if store_i && (!t.allows_dual_stores() || dep.must_alias) {
                return false;
            }
            true
        } else {
            load_j && (load_i || store_i)
        }
    }

    /// Predicated on the same register with opposite sense, and the
    /// candidate's predicate cannot turn into a dot-new read of a packet
    /// member that is itself anti-dependent on that predicate.
    pub(super) fn are_predicates_complements(&self, i: usize, j: usize) -> bool {
        let t = self.target;
        let (mi, mj) = (&self.instrs[i], &self.instrs[j]);
        let sense_i = predicate_sense(t, mi);
        let sense_j = predicate_sense(t, mj);
        if sense_i == PredicateSense::Unknown || sense_j == PredicateSense::Unknown {
            return false;
        }

        for &m in &self.ctx.members {
            for dep in self.graph.edges_between(m, i) {
                if dep.kind != DepKind::Data {
                    continue;
                }
                let Some(reg) = dep.reg else { continue };
                if t.is_pred_reg(reg) && self.restricting_dep_exist_in_packet(m, reg) {
                    return false;
                }
            }
        }

        // Without a predicate operand there is nothing to prove.
        let (Ok(reg_i), Ok(reg_j)) = (predicate_register(t, mi), predicate_register(t, mj)) else {
            return false;
        };
        reg_i == reg_j
            && t.reg_class(reg_i) == Some(RegClass::Pred)
            && sense_i != sense_j
            && t.is_dot_new_inst(mi) == t.is_dot_new_inst(mj)
    }

    /// Some predicated packet member has an anti edge on `reg` into the
    /// predicate producer `producer`.
    fn restricting_dep_exist_in_packet(&self, producer: usize, reg: Reg) -> bool {
        self.ctx
            .members
            .iter()
            .filter(|&&m| self.target.is_predicated(&self.instrs[m]))
            .any(|&m| {
                self.graph
                    .edges_between(m, producer)
                    .any(|dep| dep.kind == DepKind::Anti && dep.reg == Some(reg))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MachineOperand, MemBase, MemRef, PacketizerSession};
    use crate::dsp::opcodes::*;
    use crate::dsp::registers::*;
    use crate::dsp::DspTarget;
    use crate::packetizer::depgraph::DepGraphBuilder;
    use crate::packetizer::PacketizerConfig;
    use bumpalo::Bump;

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

    fn dead_alu(def: Reg, a: Reg) -> MachineInstr {
        MachineInstr::with_operands(
            ADD,
            vec![
                MachineOperand::def(def).dead(),
                MachineOperand::use_reg(a),
                MachineOperand::use_reg(a),
            ],
        )
    }

    fn store(base: Reg, offset: i64, value: Reg) -> MachineInstr {
        MachineInstr::with_operands(
            STORE,
            vec![
                MachineOperand::use_reg(base),
                MachineOperand::imm(offset),
                MachineOperand::use_reg(value),
            ],
        )
        .with_mem(MemRef::new(MemBase::Reg(base), offset, 4))
    }

    fn call() -> MachineInstr {
        let mut mi = MachineInstr::with_operands(CALL, vec![MachineOperand::symbol("f")]);
        for &reg in CALL_CLOBBERS.iter() {
            mi.add_operand(MachineOperand::implicit_def(reg));
        }
        mi.add_operand(MachineOperand::implicit_use(SP));
        mi
    }

    fn tfr_pred(op: crate::core::Opcode, def: Reg, pred: Reg, src: Reg) -> MachineInstr {
        MachineInstr::with_operands(
            op,
            vec![
                MachineOperand::def(def),
                MachineOperand::use_reg(pred),
                MachineOperand::use_reg(src),
            ],
        )
    }

    /// Check candidate `i` against member `j` with `j` already placed.
    fn legal(
        target: &DspTarget,
        config: &PacketizerConfig,
        instrs: Vec<MachineInstr>,
        edges: impl FnOnce(&mut DepGraphBuilder),
        i: usize,
        j: usize,
    ) -> (bool, Vec<MachineInstr>) {
        let arena = Bump::new();
        let session = PacketizerSession::new(&arena);
        let mut builder = DepGraphBuilder::new(instrs.len());
        edges(&mut builder);
        let graph = builder.build(&arena);
        let mut pb = PacketBuilder::new(target, config, &session, &graph, 0, instrs);
        pb.place_for_test(j);
        pb.ctx.begin_candidate();
        let ok = pb.is_legal_to_packetize_together(i, j).unwrap();
        (ok, pb.instrs)
    }

    #[test]
    fn test_dead_definition_collision_blocks_without_edges() {
        let target = DspTarget::new();
        let config = PacketizerConfig::default();
        let instrs = vec![dead_alu(r(1), r(2)), dead_alu(r(1), r(3))];
        let (ok, _) = legal(&target, &config, instrs, |_| {}, 1, 0);
        assert!(!ok);
    }

    #[test]
    fn test_dead_status_register_writes_coexist() {
        let target = DspTarget::new();
        let config = PacketizerConfig::default();
        let mut a = alu(r(1), r(2), r(3));
        a.add_operand(MachineOperand::implicit_def(USR).dead());
        let mut b = alu(r(4), r(5), r(6));
        b.add_operand(MachineOperand::implicit_def(USR).dead());
        let (ok, _) = legal(&target, &config, vec![a, b], |_| {}, 1, 0);
        assert!(ok);
    }

    #[test]
    fn test_anti_dependence_into_call() {
        let target = DspTarget::new();
        let config = PacketizerConfig::default();

        // Writes a register the call clobbers.
        let instrs = vec![call(), alu(r(0), r(20), r(21))];
        let (ok, _) = legal(&target, &config, instrs, |b| {
            b.anti(0, 1, r(0));
        }, 1, 0);
        assert!(!ok);

        // Writes a register the call only reads.
        let instrs = vec![call(), alu(SP, SP, r(21))];
        let (ok, _) = legal(&target, &config, instrs, |b| {
            b.anti(0, 1, SP);
        }, 1, 0);
        assert!(ok);
    }

    #[test]
    fn test_call_ignores_non_abi_edges() {
        let target = DspTarget::new();
        let config = PacketizerConfig::default();
        let instrs = vec![alu(r(1), r(2), r(3)), call()];
        let (ok, _) = legal(&target, &config, instrs.clone(), |b| {
            b.output(0, 1, r(1));
        }, 1, 0);
        assert!(ok);

        let (ok, _) = legal(&target, &config, instrs, |b| {
            b.output(0, 1, LR);
        }, 1, 0);
        assert!(!ok);
    }

    #[test]
    fn test_order_rules() {
        let target = DspTarget::new();
        let config = PacketizerConfig::default();
        let load = MachineInstr::with_operands(
            LOAD,
            vec![
                MachineOperand::def(r(5)),
                MachineOperand::use_reg(r(9)),
                MachineOperand::imm(0),
            ],
        );

        // store then load
        let (ok, _) = legal(
            &target,
            &config,
            vec![store(r(8), 0, r(1)), load.clone()],
            |b| {
                b.order(0, 1, false);
            },
            1,
            0,
        );
        assert!(!ok);

        // load then store
        let (ok, _) = legal(
            &target,
            &config,
            vec![load, store(r(8), 0, r(1))],
            |b| {
                b.order(0, 1, false);
            },
            1,
            0,
        );
        assert!(ok);
    }

    #[test]
    fn test_volatile_refs_block_when_disabled() {
        let target = DspTarget::new();
        let config = PacketizerConfig {
            packetize_volatiles: false,
            ..PacketizerConfig::default()
        };
        let a = store(r(8), 0, r(1));
        let mut b = store(r(9), 0, r(2));
        b.mem_refs[0] = b.mem_refs[0].clone().volatile();
        let (ok, _) = legal(&target, &config, vec![a, b], |b| {
            b.order(0, 1, false);
        }, 1, 0);
        assert!(!ok);
    }

    #[test]
    fn test_output_on_pair_is_superfluous() {
        let target = DspTarget::new();
        let config = PacketizerConfig::default();
        let instrs = vec![alu(r(0), r(4), r(5)), alu(r(1), r(6), r(7))];
        let (ok, _) = legal(&target, &config, instrs.clone(), |b| {
            b.output(0, 1, d(0));
        }, 1, 0);
        assert!(ok);

        let (ok, _) = legal(&target, &config, instrs, |b| {
            b.output(0, 1, r(1));
        }, 1, 0);
        assert!(!ok);
    }

    #[test]
    fn test_control_flow_pairs() {
        let target = DspTarget::new();
        let config = PacketizerConfig::default();
        let jump = MachineInstr::with_operands(JUMP, vec![MachineOperand::symbol("bb1")]);
        let (ok, _) = legal(&target, &config, vec![call(), jump.clone()], |_| {}, 1, 0);
        assert!(!ok);

        let loop0 = MachineInstr::with_operands(
            LOOP0,
            vec![MachineOperand::symbol("bb2"), MachineOperand::imm(8)],
        );
        let dealloc = MachineInstr::new(DEALLOC_RETURN);
        let (ok, _) = legal(&target, &config, vec![loop0, dealloc], |_| {}, 1, 0);
        assert!(!ok);
    }

    #[test]
    fn test_single_store_target_blocks_second_store() {
        let config = PacketizerConfig::default();
        let instrs = vec![store(r(8), 0, r(1)), store(r(9), 0, r(2))];
        let (ok, _) = legal(&DspTarget::new(), &config, instrs.clone(), |_| {}, 1, 0);
        assert!(ok);
        let (ok, _) = legal(&DspTarget::single_store(), &config, instrs, |_| {}, 1, 0);
        assert!(!ok);
    }

    #[test]
    fn test_complement_predicates_discharge() {
        let target = DspTarget::new();
        let config = PacketizerConfig::default();
        let instrs = vec![
            tfr_pred(TFR_F, r(25), p(0), r(24)),
            tfr_pred(TFR_T, r(25), p(0), r(26)),
        ];
        let (ok, _) = legal(&target, &config, instrs, |b| {
            b.output(0, 1, r(25));
        }, 1, 0);
        assert!(ok);
    }

    #[test]
    fn test_inline_asm_never_joins_branches() {
        let target = DspTarget::new();
        let config = PacketizerConfig {
            schedule_inline_asm: true,
            ..PacketizerConfig::default()
        };
        let asm = MachineInstr::new(INLINE_ASM);
        let jump = MachineInstr::with_operands(JUMP, vec![MachineOperand::symbol("bb1")]);
        let (ok, _) = legal(&target, &config, vec![asm, jump], |_| {}, 1, 0);
        assert!(!ok);
    }
}
