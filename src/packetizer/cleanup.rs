//! Post-pass over finalized bundles.
//!
//! Debug values and inline assembly never need a bundle slot, so they are
//! moved out once every packet is closed. Bundles left with a single
//! instruction are unwrapped.

use crate::core::{BlockItem, MachineFunction, MachineInstr, PacketizerSession};
use crate::target::TargetInfo;

/// The asm writes a register that another bundled instruction reads.
fn has_write_to_read_dep<T: TargetInfo + ?Sized>(
    target: &T,
    asm: usize,
    bundle: &[MachineInstr],
) -> bool {
    bundle[asm].def_regs().any(|def| {
        bundle
            .iter()
            .enumerate()
            .any(|(k, mi)| k != asm && mi.reads_register(def, target))
    })
}

fn split_bundle<T: TargetInfo + ?Sized>(
    target: &T,
    session: &PacketizerSession<'_>,
    bundle: Vec<MachineInstr>,
    out: &mut Vec<BlockItem>,
) {
    let mut before = Vec::new();
    let mut after = Vec::new();
    let moves: Vec<Option<bool>> = (0..bundle.len())
        .map(|k| {
            let mi = &bundle[k];
            if target.is_debug_value(mi) {
                Some(false)
            } else if target.is_inline_asm(mi) {
                Some(has_write_to_read_dep(target, k, &bundle))
            } else {
                None
            }
        })
        .collect();

    let mut kept = Vec::with_capacity(bundle.len());
    for (mi, dest) in bundle.into_iter().zip(moves) {
        match dest {
            Some(false) => before.push(mi),
            Some(true) => after.push(mi),
            None => {
                kept.push(mi);
                continue;
            }
        }
        session.record_extracted();
    }
    if !before.is_empty() || !after.is_empty() {
        log::debug!(
            "moved {} instruction(s) before and {} after a bundle",
            before.len(),
            after.len()
        );
    }

    out.extend(before.into_iter().map(BlockItem::Instr));
    match kept.len() {
        0 => {}
        1 => {
            session.record_unwrapped();
            out.extend(kept.into_iter().map(BlockItem::Instr));
        }
        _ => out.push(BlockItem::Bundle(kept)),
    }
    out.extend(after.into_iter().map(BlockItem::Instr));
}

/// Extract pseudo instructions from bundles and unwrap degenerate bundles.
pub fn unpacketize_solo_instrs<T: TargetInfo + ?Sized>(
    target: &T,
    session: &PacketizerSession<'_>,
    mf: &mut MachineFunction,
) {
    for block in &mut mf.blocks {
        let items = std::mem::take(&mut block.items);
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                BlockItem::Bundle(bundle) => split_bundle(target, session, bundle, &mut out),
                instr => out.push(instr),
            }
        }
        block.items = out;
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

    fn function(items: Vec<BlockItem>) -> MachineFunction {
        let mut mf = MachineFunction::new("f", 0);
        let mut bb = MachineBasicBlock::new("entry");
        bb.items = items;
        mf.blocks.push(bb);
        mf
    }

    #[test]
    fn test_debug_value_moves_before_bundle() {
        let ctx = TestContext::new();
        let session = ctx.create_session();
        let target = DspTarget::new();
        let dbg = MachineInstr::with_operands(DBG_VALUE, vec![MachineOperand::use_reg(r(1))]);
        let mut mf = function(vec![BlockItem::Bundle(vec![
            alu(r(1), r(2), r(3)),
            dbg.clone(),
            alu(r(4), r(5), r(6)),
        ])]);
        unpacketize_solo_instrs(&target, &session, &mut mf);

        let items = &mf.blocks[0].items;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], BlockItem::Instr(dbg));
        assert_eq!(items[1].instrs().len(), 2);
        assert_eq!(session.stats().extracted_from_bundles, 1);
    }

    #[test]
    fn test_inline_asm_placement() {
        let ctx = TestContext::new();
        let session = ctx.create_session();
        let target = DspTarget::new();
        let asm_writes_r7 =
            MachineInstr::with_operands(INLINE_ASM, vec![MachineOperand::def(r(7))]);
        let asm_plain = MachineInstr::with_operands(INLINE_ASM, vec![MachineOperand::def(r(9))]);
        let mut mf = function(vec![BlockItem::Bundle(vec![
            asm_writes_r7.clone(),
            asm_plain.clone(),
            alu(r(1), r(7), r(3)),
            alu(r(4), r(5), r(6)),
        ])]);
        unpacketize_solo_instrs(&target, &session, &mut mf);

        let items = &mf.blocks[0].items;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], BlockItem::Instr(asm_plain));
        assert!(items[1].is_bundle());
        assert_eq!(items[2], BlockItem::Instr(asm_writes_r7));
    }

    #[test]
    fn test_single_instruction_bundle_unwrapped() {
        let ctx = TestContext::new();
        let session = ctx.create_session();
        let target = DspTarget::new();
        let dbg = MachineInstr::new(DBG_VALUE);
        let add = alu(r(1), r(2), r(3));
        let mut mf = function(vec![BlockItem::Bundle(vec![add.clone(), dbg.clone()])]);
        unpacketize_solo_instrs(&target, &session, &mut mf);

        assert_eq!(
            mf.blocks[0].items,
            vec![BlockItem::Instr(dbg), BlockItem::Instr(add)]
        );
        assert_eq!(session.stats().bundles_unwrapped, 1);
    }
}
