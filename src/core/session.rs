// This module provides arena-based session management for the packetizer using the bumpalo
// crate. PacketizerSession owns a reference to the arena that backs every per-region
// dependence graph, so graphs can hand out plain slices without lifetime juggling beyond the
// single 'arena parameter. The session also records packetization statistics: regions
// visited, packets and bundles formed, promotions to new-value / dot-cur forms, rollbacks of
// abandoned promotions, allocframe and new-value-jump glue, constant extenders, and post-pass
// extractions. PacketizerStats renders as a small report for the packetize binary.

//! Arena-based packetizer session management.
//!
//! All dependence graphs built while packetizing a function live in the
//! session arena and share its lifetime.

use bumpalo::Bump;
use std::cell::RefCell;
use std::fmt;

/// Arena-based packetizer session.
pub struct PacketizerSession<'arena> {
    /// Arena allocator for dependence graphs.
    arena: &'arena Bump,

    /// Statistics for debugging and tuning.
    stats: RefCell<PacketizerStats>,

    /// Function currently being packetized.
    current_function: RefCell<Option<String>>,
}

impl<'arena> PacketizerSession<'arena> {
    /// Create a new session with the given arena.
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            stats: RefCell::new(PacketizerStats::default()),
            current_function: RefCell::new(None),
        }
    }

    /// Get access to the arena allocator.
    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Allocate a slice in the session arena.
    pub fn alloc_slice<T: Clone>(&self, slice: &[T]) -> &'arena [T] {
        self.arena.alloc_slice_clone(slice)
    }

    pub fn set_current_function(&self, name: &str) {
        *self.current_function.borrow_mut() = Some(name.to_string());
    }

    pub fn current_function(&self) -> Option<String> {
        self.current_function.borrow().clone()
    }

    /// Record a packetized function.
    pub fn record_function(&self) {
        self.stats.borrow_mut().functions += 1;
    }

    /// Record a scheduling region handed to the packet builder.
    pub fn record_region(&self, instrs: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.regions += 1;
        stats.instructions_seen += instrs;
    }

    /// Record a closed packet with `members` instructions.
    pub fn record_packet(&self, members: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.packets += 1;
        if members > 1 {
            stats.bundles += 1;
            stats.instructions_bundled += members;
        }
        if stats.largest_packet < members {
            stats.largest_packet = members;
        }
    }

    pub fn record_promotion(&self, kind: PromotionKind) {
        let mut stats = self.stats.borrow_mut();
        match kind {
            PromotionKind::DotNewPredicate => stats.dot_new_predicates += 1,
            PromotionKind::NewValueStore => stats.new_value_stores += 1,
            PromotionKind::DotCur => stats.dot_cur_loads += 1,
            PromotionKind::AllocframeStore => stats.allocframe_glues += 1,
        }
    }

    /// Record rewrites undone because their packet was abandoned.
    pub fn record_rollback(&self, rewrites: usize) {
        if rewrites > 0 {
            let mut stats = self.stats.borrow_mut();
            stats.rollbacks += 1;
            stats.rewrites_undone += rewrites;
        }
    }

    pub fn record_nvj_glue(&self) {
        self.stats.borrow_mut().new_value_jump_glues += 1;
    }

    pub fn record_stall_avoided(&self) {
        self.stats.borrow_mut().stalls_avoided += 1;
    }

    pub fn record_const_extender(&self) {
        self.stats.borrow_mut().const_extenders += 1;
    }

    pub fn record_kill_removed(&self) {
        self.stats.borrow_mut().kills_removed += 1;
    }

    pub fn record_extracted(&self) {
        self.stats.borrow_mut().extracted_from_bundles += 1;
    }

    pub fn record_unwrapped(&self) {
        self.stats.borrow_mut().bundles_unwrapped += 1;
    }

    /// Get packetization statistics.
    pub fn stats(&self) -> PacketizerStats {
        self.stats.borrow().clone()
    }
}

/// Speculative rewrites tracked in the statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionKind {
    DotNewPredicate,
    NewValueStore,
    DotCur,
    AllocframeStore,
}

/// Packetizer session statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PacketizerStats {
    pub functions: usize,
    pub regions: usize,
    pub instructions_seen: usize,
    /// Packets closed, including single-instruction ones.
    pub packets: usize,
    /// Packets that became bundles.
    pub bundles: usize,
    pub instructions_bundled: usize,
    pub largest_packet: usize,
    pub dot_new_predicates: usize,
    pub new_value_stores: usize,
    pub dot_cur_loads: usize,
    pub allocframe_glues: usize,
    pub new_value_jump_glues: usize,
    pub const_extenders: usize,
    /// Packets closed early so a consumer does not stall behind the previous packet.
    pub stalls_avoided: usize,
    pub rollbacks: usize,
    pub rewrites_undone: usize,
    pub kills_removed: usize,
    pub extracted_from_bundles: usize,
    pub bundles_unwrapped: usize,
}

impl fmt::Display for PacketizerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Packetizer Statistics:")?;
        writeln!(f, "  Functions: {}", self.functions)?;
        writeln!(f, "  Scheduling regions: {}", self.regions)?;
        writeln!(f, "  Instructions seen: {}", self.instructions_seen)?;
        writeln!(f, "  Packets closed: {}", self.packets)?;
        writeln!(
            f,
            "  Bundles formed: {} ({} instructions, largest {})",
            self.bundles, self.instructions_bundled, self.largest_packet
        )?;
        writeln!(f, "  Dot-new predicates: {}", self.dot_new_predicates)?;
        writeln!(f, "  New-value stores: {}", self.new_value_stores)?;
        writeln!(f, "  Dot-cur loads: {}", self.dot_cur_loads)?;
        writeln!(f, "  Allocframe glues: {}", self.allocframe_glues)?;
        writeln!(f, "  New-value jump glues: {}", self.new_value_jump_glues)?;
        writeln!(f, "  Constant extenders: {}", self.const_extenders)?;
        writeln!(f, "  Stalls avoided: {}", self.stalls_avoided)?;
        writeln!(
            f,
            "  Rollbacks: {} ({} rewrites undone)",
            self.rollbacks, self.rewrites_undone
        )?;
        writeln!(f, "  KILLs removed: {}", self.kills_removed)?;
        writeln!(
            f,
            "  Post-pass: {} extracted, {} unwrapped",
            self.extracted_from_bundles, self.bundles_unwrapped
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let arena = Bump::new();
        let session = PacketizerSession::new(&arena);

        let stats = session.stats();
        assert_eq!(stats.packets, 0);
        assert_eq!(stats.bundles, 0);
        assert!(session.current_function().is_none());
    }

    #[test]
    fn test_arena_allocation() {
        let arena = Bump::new();
        let session = PacketizerSession::new(&arena);

        let slice = session.alloc_slice(&[1, 2, 3, 4]);
        assert_eq!(slice, &[1, 2, 3, 4]);
    }

    #[test]
    fn test_packet_statistics() {
        let arena = Bump::new();
        let session = PacketizerSession::new(&arena);

        session.record_packet(1);
        session.record_packet(3);
        session.record_packet(2);
        session.record_promotion(PromotionKind::NewValueStore);
        session.record_rollback(0);
        session.record_rollback(2);

        let stats = session.stats();
        assert_eq!(stats.packets, 3);
        assert_eq!(stats.bundles, 2);
        assert_eq!(stats.instructions_bundled, 5);
        assert_eq!(stats.largest_packet, 3);
        assert_eq!(stats.new_value_stores, 1);
        assert_eq!(stats.rollbacks, 1);
        assert_eq!(stats.rewrites_undone, 2);
    }

    #[test]
    fn test_statistics_display() {
        let arena = Bump::new();
        let session = PacketizerSession::new(&arena);
        session.record_packet(4);

        let output = format!("{}", session.stats());
        assert!(output.contains("Packets closed: 1"));
        assert!(output.contains("Bundles formed: 1 (4 instructions, largest 4)"));
    }
}
