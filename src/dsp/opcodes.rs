//! Opcode table of the reference DSP.
//!
//! Operand layout follows the textual form: definitions first, then uses
//! in source order. Stores end with the stored value; post-increment forms
//! define the updated base before reading it.

use super::registers::{CALL_CLOBBERS, FP, LC0, LR, SA0, SP};
use crate::core::{Opcode, Reg, RegClass};
use crate::target::{DescFlags as F, ImmRange, InstrDesc};

macro_rules! opcodes {
    ($($name:ident = $num:expr, $text:expr;)*) => {
        $(pub const $name: Opcode = Opcode($num);)*

        /// Mnemonic of every opcode, indexed by opcode number.
        pub const NAMES: &[&str] = &[$($text),*];
    };
}

opcodes! {
    ADD = 0, "add";
    ADDI = 1, "addi";
    TFR = 2, "tfr";
    TFRI = 3, "tfri";
    COMBINE = 4, "combine";
    CMP_EQ = 5, "cmp_eq";
    CMP_EQI = 6, "cmp_eqi";
    TFR_RP = 7, "tfr_rp";
    TFR_T = 8, "tfr_t";
    TFR_F = 9, "tfr_f";
    TFR_TNEW = 10, "tfr_tnew";
    TFR_FNEW = 11, "tfr_fnew";
    NOP = 12, "nop";
    EXT = 13, "ext";
    JUMP = 14, "jump";
    JUMP_T = 15, "jump_t";
    JUMP_F = 16, "jump_f";
    JUMP_TNEW = 17, "jump_tnew";
    JUMP_FNEW = 18, "jump_fnew";
    JUMPR = 19, "jumpr";
    JUMPR_T = 20, "jumpr_t";
    JUMPR_TNEW = 21, "jumpr_tnew";
    CALL = 22, "call";
    CALLR = 23, "callr";
    TAILCALL = 24, "tailcall";
    CALL_SAVE_CSR = 25, "call_save_csr";
    DEALLOC_RETURN = 26, "dealloc_return";
    ALLOCFRAME = 27, "allocframe";
    LOOP0 = 28, "loop0";
    NVJ_CMPEQ = 29, "nvj_cmpeq";
    BARRIER = 30, "barrier";
    DCFETCH = 31, "dcfetch";
    TRAP = 32, "trap";
    LOAD = 33, "load";
    LOAD_PI = 34, "load_pi";
    LOAD_AP = 35, "load_ap";
    STORE = 36, "store";
    STORED = 37, "stored";
    STORE_NEW = 38, "store_new";
    STORE_PI = 39, "store_pi";
    STORE_PI_NEW = 40, "store_pi_new";
    STORE_RR = 41, "store_rr";
    STORE_RR_NEW = 42, "store_rr_new";
    STORE_T = 43, "store_t";
    STORE_F = 44, "store_f";
    STORE_TNEW = 45, "store_tnew";
    STORE_FNEW = 46, "store_fnew";
    STORE_T_NV = 47, "store_t_nv";
    STORE_F_NV = 48, "store_f_nv";
    STORE_TNEW_NV = 49, "store_tnew_nv";
    STORE_FNEW_NV = 50, "store_fnew_nv";
    MEMOP_ADD = 51, "memop_add";
    VLOAD = 52, "vload";
    VLOAD_CUR = 53, "vload_cur";
    VSTORE = 54, "vstore";
    VSTORE_NEW = 55, "vstore_new";
    VADD = 56, "vadd";
    VCOMBINE = 57, "vcombine";
    VGATHER = 58, "vgather";
    CALL_NORETURN = 59, "call_noreturn";
    INLINE_ASM = 60, "inline_asm";
    DBG_VALUE = 61, "dbg_value";
    IMPLICIT_DEF = 62, "implicit_def";
    KILL = 63, "kill";
    CFI = 64, "cfi";
    EH_LABEL = 65, "eh_label";
}

pub const NUM_OPCODES: u16 = NAMES.len() as u16;

const ANY: u8 = 0b1111;
const LDST: u8 = 0b0011;
const SLOT0: u8 = 0b0001;
const SLOT2: u8 = 0b0100;
const SLOT3: u8 = 0b1000;
const HIGH: u8 = 0b1100;

const FRAME_DEFS: [Reg; 2] = [SP, FP];
const FRAME_USES: [Reg; 3] = [SP, FP, LR];
const RETURN_DEFS: [Reg; 3] = [SP, FP, LR];
const LOOP_DEFS: [Reg; 2] = [LC0, SA0];
const CSR_SPILL_DEFS: [Reg; 4] = [Reg(14), Reg(15), Reg(28), LR];
const STACK_USE: [Reg; 1] = [SP];
const FRAME_USE: [Reg; 1] = [FP];

const WORD_OFFSET: ImmRange = ImmRange::signed(1, 11, 4);
const DOUBLE_OFFSET: ImmRange = ImmRange::signed(1, 11, 8);
const PRED_STORE_OFFSET: ImmRange = ImmRange::new(2, 0, 252, 4);

/// Descriptor of opcode `op`; opcodes outside the table are solo.
pub fn describe(op: Opcode) -> InstrDesc {
    let name = NAMES.get(op.0 as usize).copied().unwrap_or("<unknown>");
    let desc = |flags: F, slots: u8| InstrDesc::new(name, flags, slots);
    let predicated_false = F::PREDICATED | F::PRED_FALSE;
    let predicated_new = F::PREDICATED | F::PRED_NEW;
    let store = F::MAY_STORE;
    let new_store = F::MAY_STORE | F::NEW_VALUE;

    match op {
        ADD | TFR => desc(F::NONE, ANY).def_class(RegClass::Int),
        ADDI => desc(F::NONE, ANY)
            .def_class(RegClass::Int)
            .ext_imm(ImmRange::signed(2, 16, 1)),
        TFRI => desc(F::NONE, ANY)
            .def_class(RegClass::Int)
            .ext_imm(ImmRange::signed(1, 16, 1)),
        COMBINE => desc(F::NONE, ANY).def_class(RegClass::DoubleInt),
        CMP_EQ | TFR_RP => desc(F::NONE, ANY).def_class(RegClass::Pred),
        CMP_EQI => desc(F::NONE, ANY)
            .def_class(RegClass::Pred)
            .ext_imm(ImmRange::signed(2, 10, 1)),
        TFR_T => desc(F::PREDICATED, ANY)
            .def_class(RegClass::Int)
            .dot_new_pred(TFR_TNEW),
        TFR_F => desc(predicated_false, ANY)
            .def_class(RegClass::Int)
            .dot_new_pred(TFR_FNEW),
        TFR_TNEW => desc(predicated_new, ANY).def_class(RegClass::Int),
        TFR_FNEW => desc(predicated_new | F::PRED_FALSE, ANY).def_class(RegClass::Int),
        NOP => desc(F::SOLO, ANY),
        EXT => desc(F::NONE, ANY),

        JUMP => desc(F::BRANCH | F::TERMINATOR | F::BARRIER | F::DIRECT_JUMP, HIGH),
        JUMP_T => desc(F::BRANCH | F::COND_BRANCH | F::TERMINATOR | F::PREDICATED, HIGH)
            .dot_new_pred(JUMP_TNEW),
        JUMP_F => desc(F::BRANCH | F::COND_BRANCH | F::TERMINATOR | predicated_false, HIGH)
            .dot_new_pred(JUMP_FNEW),
        JUMP_TNEW => desc(F::BRANCH | F::COND_BRANCH | F::TERMINATOR | predicated_new, HIGH),
        JUMP_FNEW => desc(
            F::BRANCH | F::COND_BRANCH | F::TERMINATOR | predicated_new | F::PRED_FALSE,
            HIGH,
        ),
        JUMPR => desc(
            F::RETURN | F::BRANCH | F::TERMINATOR | F::BARRIER | F::JUMP_R,
            SLOT2,
        ),
        JUMPR_T => desc(
            F::RETURN | F::BRANCH | F::COND_BRANCH | F::TERMINATOR | F::JUMP_R | F::PREDICATED,
            SLOT2,
        )
        .dot_new_pred(JUMPR_TNEW),
        JUMPR_TNEW => desc(
            F::RETURN | F::BRANCH | F::COND_BRANCH | F::TERMINATOR | F::JUMP_R | predicated_new,
            SLOT2,
        ),
        CALL => desc(F::CALL, HIGH).implicit(&CALL_CLOBBERS, &STACK_USE),
        CALLR => desc(F::CALL | F::INDIRECT_CALL, HIGH).implicit(&CALL_CLOBBERS, &STACK_USE),
        CALL_NORETURN => {
            desc(F::CALL | F::NO_RETURN, HIGH).implicit(&CALL_CLOBBERS, &STACK_USE)
        }
        TAILCALL => desc(
            F::CALL | F::RETURN | F::TAIL_CALL | F::TERMINATOR | F::BARRIER,
            HIGH,
        )
        .implicit(&[], &STACK_USE),
        CALL_SAVE_CSR => desc(F::CALL | F::CSR_CALL, HIGH).implicit(&CSR_SPILL_DEFS, &STACK_USE),
        DEALLOC_RETURN => desc(
            F::RETURN | F::TERMINATOR | F::BARRIER | F::DEALLOC_RET | F::MAY_LOAD,
            SLOT0,
        )
        .implicit(&RETURN_DEFS, &FRAME_USE),
        ALLOCFRAME => desc(F::FRAME_ALLOC | store, SLOT0).implicit(&FRAME_DEFS, &FRAME_USES),
        LOOP0 => desc(F::LOOP_N, SLOT3).implicit(&LOOP_DEFS, &[]),
        NVJ_CMPEQ => desc(
            F::NEW_VALUE | F::NEW_VALUE_JUMP | F::BRANCH | F::COND_BRANCH | F::TERMINATOR,
            SLOT0,
        ),
        BARRIER => desc(F::SYSTEM | F::SCHED_BARRIER, SLOT0),
        DCFETCH => desc(F::SYSTEM, SLOT0),
        TRAP => desc(F::SOLO, SLOT2),

        LOAD => desc(F::MAY_LOAD, LDST)
            .def_class(RegClass::Int)
            .ext_imm(ImmRange::signed(2, 11, 4)),
        LOAD_PI => desc(F::MAY_LOAD | F::POST_INC, LDST).def_class(RegClass::Int),
        LOAD_AP => desc(F::MAY_LOAD | F::ABS_SET | F::EXTENDED, LDST).def_class(RegClass::Int),
        STORE => desc(store | F::FRAME_STORE, LDST)
            .offset(WORD_OFFSET)
            .ext_imm(WORD_OFFSET)
            .dot_new(STORE_NEW),
        STORED => desc(store | F::FRAME_STORE, LDST)
            .offset(DOUBLE_OFFSET)
            .ext_imm(DOUBLE_OFFSET),
        STORE_NEW => desc(new_store, SLOT0)
            .offset(WORD_OFFSET)
            .ext_imm(WORD_OFFSET),
        STORE_PI => desc(store | F::POST_INC, LDST).dot_new(STORE_PI_NEW),
        STORE_PI_NEW => desc(new_store | F::POST_INC, SLOT0),
        STORE_RR => desc(store, LDST).dot_new(STORE_RR_NEW),
        STORE_RR_NEW => desc(new_store, SLOT0),
        STORE_T => desc(store | F::PREDICATED, LDST)
            .ext_imm(PRED_STORE_OFFSET)
            .dot_new(STORE_T_NV)
            .dot_new_pred(STORE_TNEW),
        STORE_F => desc(store | predicated_false, LDST)
            .ext_imm(PRED_STORE_OFFSET)
            .dot_new(STORE_F_NV)
            .dot_new_pred(STORE_FNEW),
        STORE_TNEW => desc(store | predicated_new, LDST)
            .ext_imm(PRED_STORE_OFFSET)
            .dot_new(STORE_TNEW_NV),
        STORE_FNEW => desc(store | predicated_new | F::PRED_FALSE, LDST)
            .ext_imm(PRED_STORE_OFFSET)
            .dot_new(STORE_FNEW_NV),
        STORE_T_NV => desc(new_store | F::PREDICATED, SLOT0)
            .ext_imm(PRED_STORE_OFFSET)
            .dot_new_pred(STORE_TNEW_NV),
        STORE_F_NV => desc(new_store | predicated_false, SLOT0)
            .ext_imm(PRED_STORE_OFFSET)
            .dot_new_pred(STORE_FNEW_NV),
        STORE_TNEW_NV => desc(new_store | predicated_new, SLOT0).ext_imm(PRED_STORE_OFFSET),
        STORE_FNEW_NV => {
            desc(new_store | predicated_new | F::PRED_FALSE, SLOT0).ext_imm(PRED_STORE_OFFSET)
        }
        MEMOP_ADD => desc(F::MEMOP | F::MAY_LOAD | store, SLOT0),

        VLOAD => desc(F::VECTOR | F::MAY_LOAD | F::CUR_LOADABLE, LDST)
            .def_class(RegClass::Vector)
            .dot_cur(VLOAD_CUR),
        VLOAD_CUR => desc(F::VECTOR | F::MAY_LOAD | F::DOT_CUR, LDST).def_class(RegClass::Vector),
        VSTORE => desc(F::VECTOR | store, SLOT0).dot_new(VSTORE_NEW),
        VSTORE_NEW => desc(F::VECTOR | new_store, SLOT0),
        VADD => desc(F::VECTOR, HIGH).def_class(RegClass::Vector),
        VCOMBINE => desc(F::VECTOR, HIGH).def_class(RegClass::VectorDouble),
        VGATHER => desc(F::VECTOR | F::MAY_LOAD | F::EXCL_ADDR, LDST).def_class(RegClass::Vector),

        INLINE_ASM => desc(F::INLINE_ASM, 0),
        DBG_VALUE => desc(F::DEBUG_VALUE, 0),
        IMPLICIT_DEF => desc(F::IMPLICIT_DEF, 0),
        KILL => desc(F::KILL, 0),
        CFI => desc(F::CFI, 0),
        EH_LABEL => desc(F::EH_LABEL, 0),
        _ => desc(F::SOLO, ANY),
    }
}
