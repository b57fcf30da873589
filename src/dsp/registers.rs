//! Register file of the reference DSP.
//!
//! | names      | numbers  | class        |
//! |------------|----------|--------------|
//! | `r0..r31`  | 0..=31   | Int          |
//! | `d0..d15`  | 32..=47  | DoubleInt    |
//! | `p0..p3`   | 48..=51  | Pred         |
//! | `v0..v31`  | 64..=95  | Vector       |
//! | `w0..w15`  | 96..=111 | VectorDouble |
//! | `usr`, `lc0`, `sa0` | 112..=114 | Control |
//!
//! `dK` is the pair `r(2K+1):r(2K)` and `wK` the pair `v(2K+1):v(2K)`.

use crate::core::{Reg, RegClass};

const DOUBLE_BASE: u16 = 32;
const PRED_BASE: u16 = 48;
const VEC_BASE: u16 = 64;
const VEC_DOUBLE_BASE: u16 = 96;

pub const fn r(n: u16) -> Reg {
    Reg(n)
}

pub const fn d(n: u16) -> Reg {
    Reg(DOUBLE_BASE + n)
}

pub const fn p(n: u16) -> Reg {
    Reg(PRED_BASE + n)
}

pub const fn v(n: u16) -> Reg {
    Reg(VEC_BASE + n)
}

pub const fn w(n: u16) -> Reg {
    Reg(VEC_DOUBLE_BASE + n)
}

pub const SP: Reg = r(29);
pub const FP: Reg = r(30);
pub const LR: Reg = r(31);
/// User status register; only its sticky overflow bit is ever written dead.
pub const USR: Reg = Reg(112);
pub const LC0: Reg = Reg(113);
pub const SA0: Reg = Reg(114);

pub const CALLEE_SAVED: [Reg; 12] = [
    r(16),
    r(17),
    r(18),
    r(19),
    r(20),
    r(21),
    r(22),
    r(23),
    r(24),
    r(25),
    r(26),
    r(27),
];

/// Registers clobbered by an ordinary call.
pub const CALL_CLOBBERS: [Reg; 21] = [
    r(0),
    r(1),
    r(2),
    r(3),
    r(4),
    r(5),
    r(6),
    r(7),
    r(8),
    r(9),
    r(10),
    r(11),
    r(12),
    r(13),
    r(14),
    r(15),
    LR,
    p(0),
    p(1),
    p(2),
    p(3),
];

pub fn class_of(reg: Reg) -> Option<RegClass> {
    match reg.0 {
        0..=31 => Some(RegClass::Int),
        32..=47 => Some(RegClass::DoubleInt),
        48..=51 => Some(RegClass::Pred),
        64..=95 => Some(RegClass::Vector),
        96..=111 => Some(RegClass::VectorDouble),
        112..=114 => Some(RegClass::Control),
        _ => None,
    }
}

/// Half-open range of leaf units a register covers.
fn units(reg: Reg) -> (u16, u16) {
    match class_of(reg) {
        Some(RegClass::DoubleInt) => {
            let lo = (reg.0 - DOUBLE_BASE) * 2;
            (lo, lo + 2)
        }
        Some(RegClass::VectorDouble) => {
            let lo = VEC_BASE + (reg.0 - VEC_DOUBLE_BASE) * 2;
            (lo, lo + 2)
        }
        _ => (reg.0, reg.0 + 1),
    }
}

pub fn overlap(a: Reg, b: Reg) -> bool {
    let (a_lo, a_hi) = units(a);
    let (b_lo, b_hi) = units(b);
    a_lo < b_hi && b_lo < a_hi
}

pub fn is_super(reg: Reg, sup: Reg) -> bool {
    if reg == sup {
        return false;
    }
    let (lo, hi) = units(reg);
    let (sup_lo, sup_hi) = units(sup);
    sup_lo <= lo && hi <= sup_hi
}

pub fn super_of(reg: Reg) -> Option<Reg> {
    match class_of(reg)? {
        RegClass::Int => Some(d(reg.0 / 2)),
        RegClass::Vector => Some(w((reg.0 - VEC_BASE) / 2)),
        _ => None,
    }
}

pub fn name_of(reg: Reg) -> String {
    match class_of(reg) {
        Some(RegClass::Int) => format!("r{}", reg.0),
        Some(RegClass::DoubleInt) => format!("d{}", reg.0 - DOUBLE_BASE),
        Some(RegClass::Pred) => format!("p{}", reg.0 - PRED_BASE),
        Some(RegClass::Vector) => format!("v{}", reg.0 - VEC_BASE),
        Some(RegClass::VectorDouble) => format!("w{}", reg.0 - VEC_DOUBLE_BASE),
        Some(RegClass::Control) => match reg {
            USR => "usr".to_string(),
            LC0 => "lc0".to_string(),
            _ => "sa0".to_string(),
        },
        None => reg.to_string(),
    }
}

pub fn parse_name(name: &str) -> Option<Reg> {
    match name {
        "sp" => return Some(SP),
        "fp" => return Some(FP),
        "lr" => return Some(LR),
        "usr" => return Some(USR),
        "lc0" => return Some(LC0),
        "sa0" => return Some(SA0),
        _ => {}
    }
    let mut chars = name.chars();
    let prefix = chars.next()?;
    let n: u16 = chars.as_str().parse().ok()?;
    if n >= 32 {
        return None;
    }
    let (reg, limit) = match prefix {
        'r' => (r(n), 32),
        'd' => (d(n), 16),
        'p' => (p(n), 4),
        'v' => (v(n), 32),
        'w' => (w(n), 16),
        _ => return None,
    };
    (n < limit).then_some(reg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_aliasing() {
        assert!(overlap(d(1), r(2)));
        assert!(overlap(d(1), r(3)));
        assert!(!overlap(d(1), r(4)));
        assert!(overlap(w(0), v(1)));
        assert!(!overlap(v(1), r(1)));
        assert!(is_super(r(3), d(1)));
        assert!(!is_super(d(1), d(1)));
        assert_eq!(super_of(r(5)), Some(d(2)));
        assert_eq!(super_of(p(0)), None);
    }

    #[test]
    fn test_names_round_trip() {
        for reg in [r(0), r(31), d(15), p(3), v(7), w(2), USR, LC0] {
            assert_eq!(parse_name(&name_of(reg)), Some(reg));
        }
        assert_eq!(parse_name("sp"), Some(SP));
        assert_eq!(parse_name("p4"), None);
        assert_eq!(parse_name("x1"), None);
        assert_eq!(parse_name("r"), None);
    }
}
