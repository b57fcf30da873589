//! Physical registers and register sets.
//!
//! Registers are plain target numbers. What a number means (its class, its
//! aliases, its printed name) is answered by the target's
//! [`RegisterInfo`](crate::target::RegisterInfo); this module only provides
//! the value type and a compact bit set over it.

use std::fmt;

/// Maximum number of 64-bit words in a [`RegBitSet`].
pub const MAX_REG_WORDS: usize = 4;

/// Upper bound (exclusive) on register numbers a [`RegBitSet`] can hold.
pub const MAX_REGS: u16 = (MAX_REG_WORDS * 64) as u16;

/// A physical register number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(pub u16);

impl Reg {
    fn word(self) -> usize {
        (self.0 / 64) as usize
    }

    fn bit(self) -> u64 {
        1u64 << (self.0 % 64)
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$reg{}", self.0)
    }
}

/// Register classes the packetizer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegClass {
    /// 32-bit scalar registers.
    Int,
    /// 64-bit scalar register pairs.
    DoubleInt,
    /// Predicate registers.
    Pred,
    /// Vector registers.
    Vector,
    /// Vector register pairs.
    VectorDouble,
    /// Control and status registers.
    Control,
}

/// Bit set for efficiently tracking register sets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegBitSet {
    words: [u64; MAX_REG_WORDS],
}

impl RegBitSet {
    /// Create empty register set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if register is set.
    pub fn contains(&self, reg: Reg) -> bool {
        if reg.0 >= MAX_REGS {
            return false;
        }
        (self.words[reg.word()] & reg.bit()) != 0
    }

    /// Set a register.
    pub fn set(&mut self, reg: Reg) {
        if reg.0 < MAX_REGS {
            self.words[reg.word()] |= reg.bit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regbitset_operations() {
        let mut set = RegBitSet::new();
        let reg = Reg(70);

        assert!(!set.contains(reg));
        set.set(reg);
        assert!(set.contains(reg));
        assert!(!set.contains(Reg(6)));
        assert!(!set.contains(Reg(134)));
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let mut set = RegBitSet::new();
        set.set(Reg(MAX_REGS));
        assert_eq!(set, RegBitSet::new());
        assert!(!set.contains(Reg(MAX_REGS + 3)));
    }
}
