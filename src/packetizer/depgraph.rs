// Dependence graph over one scheduling region. Units are region positions; every edge runs
// from an earlier unit to a later one and carries its kind (data, anti, output, order), the
// register responsible for register dependences, and for order edges whether the two memory
// accesses provably touch the same location. Graphs are frozen into the session arena once
// built and are read-only while the region is packetized; promotions rewrite instructions but
// never the graph.
//
// Graphs come from two places. DepGraphBuilder takes hand-written edges, which is how callers
// with their own dependence analysis (and the tests) feed the packetizer. analyze() is the
// reference builder used by the pass driver: register edges with each backward scan stopping
// at the nearest exact redefinition, order edges between memory accesses classified by base,
// offset and size, and order edges around instructions with unmodeled side effects.

//! Region dependence graphs.

use crate::core::{MachineInstr, MemBase, MemRef, Reg};
use crate::target::TargetInfo;
use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use hashbrown::HashSet;

/// Kind of a dependence edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepKind {
    /// Read after write.
    Data,
    /// Write after read.
    Anti,
    /// Write after write.
    Output,
    /// Memory or side-effect ordering.
    Order,
}

/// One edge as seen from one of its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dep {
    pub kind: DepKind,
    pub reg: Option<Reg>,
    /// The unit at the other end.
    pub unit: usize,
    /// Order edge between accesses to the same location.
    pub must_alias: bool,
}

/// Frozen dependence graph of a region.
#[derive(Debug, Clone, Copy)]
pub struct DependenceGraph<'arena> {
    succs: &'arena [&'arena [Dep]],
    preds: &'arena [&'arena [Dep]],
}

impl<'arena> DependenceGraph<'arena> {
    pub fn len(&self) -> usize {
        self.succs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.succs.is_empty()
    }

    /// Edges leaving `unit`.
    pub fn succs(&self, unit: usize) -> &'arena [Dep] {
        self.succs.get(unit).copied().unwrap_or(&[])
    }

    /// Edges entering `unit`.
    pub fn preds(&self, unit: usize) -> &'arena [Dep] {
        self.preds.get(unit).copied().unwrap_or(&[])
    }

    /// Whether some edge runs from `from` to `to`.
    pub fn is_succ(&self, from: usize, to: usize) -> bool {
        self.succs(from).iter().any(|dep| dep.unit == to)
    }

    /// Edges from `from` to `to`, in insertion order.
    pub fn edges_between(&self, from: usize, to: usize) -> impl Iterator<Item = &'arena Dep> {
        self.succs(from).iter().filter(move |dep| dep.unit == to)
    }

    pub fn edge_count(&self) -> usize {
        self.succs.iter().map(|s| s.len()).sum()
    }
}

/// Collects edges and freezes them into an arena graph.
#[derive(Debug, Clone, Default)]
pub struct DepGraphBuilder {
    units: usize,
    edges: Vec<(usize, usize, DepKind, Option<Reg>, bool)>,
    seen: HashSet<(usize, usize, DepKind, Option<Reg>)>,
}

impl DepGraphBuilder {
    pub fn new(units: usize) -> Self {
        Self {
            units,
            ..Self::default()
        }
    }

    /// Add an edge. Backward edges, self edges and duplicates are dropped.
    pub fn edge(&mut self, from: usize, to: usize, kind: DepKind, reg: Option<Reg>) -> &mut Self {
        self.push(from, to, kind, reg, false)
    }

    pub fn data(&mut self, from: usize, to: usize, reg: Reg) -> &mut Self {
        self.edge(from, to, DepKind::Data, Some(reg))
    }

    pub fn anti(&mut self, from: usize, to: usize, reg: Reg) -> &mut Self {
        self.edge(from, to, DepKind::Anti, Some(reg))
    }

    pub fn output(&mut self, from: usize, to: usize, reg: Reg) -> &mut Self {
        self.edge(from, to, DepKind::Output, Some(reg))
    }

    pub fn order(&mut self, from: usize, to: usize, must_alias: bool) -> &mut Self {
        self.push(from, to, DepKind::Order, None, must_alias)
    }

    fn push(
        &mut self,
        from: usize,
        to: usize,
        kind: DepKind,
        reg: Option<Reg>,
        must_alias: bool,
    ) -> &mut Self {
        if from >= to || to >= self.units {
            log::warn!("dropping malformed dependence edge {from} -> {to}");
            return self;
        }
        if self.seen.insert((from, to, kind, reg)) {
            self.edges.push((from, to, kind, reg, must_alias));
        }
        self
    }

    pub fn build<'a>(&self, arena: &'a Bump) -> DependenceGraph<'a> {
        let mut succs: Vec<BumpVec<'a, Dep>> =
            (0..self.units).map(|_| BumpVec::new_in(arena)).collect();
        let mut preds: Vec<BumpVec<'a, Dep>> =
            (0..self.units).map(|_| BumpVec::new_in(arena)).collect();
        for &(from, to, kind, reg, must_alias) in &self.edges {
            succs[from].push(Dep {
                kind,
                reg,
                unit: to,
                must_alias,
            });
            preds[to].push(Dep {
                kind,
                reg,
                unit: from,
                must_alias,
            });
        }
        let freeze = |lists: Vec<BumpVec<'a, Dep>>| -> &'a [&'a [Dep]] {
            BumpVec::from_iter_in(lists.into_iter().map(BumpVec::into_bump_slice), arena)
                .into_bump_slice()
        };
        DependenceGraph {
            succs: freeze(succs),
            preds: freeze(preds),
        }
    }
}

/// How two memory references relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Alias {
    No,
    May,
    Must,
}

fn touches_memory<T: TargetInfo + ?Sized>(target: &T, mi: &MachineInstr) -> bool {
    target.may_load(mi) || target.may_store(mi)
}

fn has_side_effects<T: TargetInfo + ?Sized>(target: &T, mi: &MachineInstr) -> bool {
    target.is_call(mi)
        || target.is_system(mi)
        || target.is_sched_barrier(mi)
        || target.is_inline_asm(mi)
}

/// Relation between references `a` (earlier, in unit `from`) and `b`.
fn alias_refs<T: TargetInfo + ?Sized>(
    target: &T,
    instrs: &[MachineInstr],
    from: usize,
    to: usize,
    a: &MemRef,
    b: &MemRef,
) -> Alias {
    let same_base = match (&a.base, &b.base) {
        (MemBase::Reg(ra), MemBase::Reg(rb)) if ra == rb => {
            // The base must hold the same value at both accesses.
            let redefined = instrs[from..to]
                .iter()
                .any(|mi| mi.modifies_register(*ra, target));
            if redefined {
                return Alias::May;
            }
            true
        }
        (MemBase::Symbol(sa), MemBase::Symbol(sb)) => {
            if sa != sb {
                return Alias::No;
            }
            true
        }
        _ => false,
    };
    if !same_base {
        return Alias::May;
    }
    let a_end = a.offset + i64::from(a.size);
    let b_end = b.offset + i64::from(b.size);
    if a.offset < b_end && b.offset < a_end {
        Alias::Must
    } else {
        Alias::No
    }
}

fn alias_instrs<T: TargetInfo + ?Sized>(
    target: &T,
    instrs: &[MachineInstr],
    from: usize,
    to: usize,
) -> Alias {
    let (a, b) = (&instrs[from], &instrs[to]);
    if a.mem_refs.is_empty() || b.mem_refs.is_empty() {
        return Alias::May;
    }
    let mut result = Alias::No;
    for ra in &a.mem_refs {
        for rb in &b.mem_refs {
            result = result.max(alias_refs(target, instrs, from, to, ra, rb));
        }
    }
    result
}

/// Reference dependence analysis of a region.
pub fn analyze<'a, T: TargetInfo + ?Sized>(
    target: &T,
    instrs: &[MachineInstr],
    arena: &'a Bump,
) -> DependenceGraph<'a> {
    let mut builder = DepGraphBuilder::new(instrs.len());

    for (to, mi) in instrs.iter().enumerate() {
        if target.is_debug_value(mi) {
            continue;
        }

        for use_reg in mi.use_regs() {
            for from in (0..to).rev() {
                let prev = &instrs[from];
                if target.is_debug_value(prev) {
                    continue;
                }
                if prev.modifies_register(use_reg, target) {
                    builder.data(from, to, use_reg);
                }
                if prev.defines_register(use_reg) {
                    break;
                }
            }
        }

        for def in mi.operands.iter().filter(|mo| mo.is_reg_def()) {
            let Some(def_reg) = def.reg() else { continue };
            for from in (0..to).rev() {
                let prev = &instrs[from];
                if target.is_debug_value(prev) {
                    continue;
                }
                if let Some(read) = prev.use_regs().find(|&r| target.regs_overlap(r, def_reg)) {
                    builder.anti(from, to, read);
                }
                // Dead definitions get no output edges between each other.
                let written = prev.operands.iter().find(|mo| {
                    mo.is_reg_def()
                        && mo.reg().is_some_and(|r| target.regs_overlap(r, def_reg))
                        && !(mo.dead && def.dead)
                });
                if let Some(reg) = written.and_then(|mo| mo.reg()) {
                    builder.output(from, to, reg);
                }
                if prev.defines_register(def_reg) {
                    break;
                }
            }
        }

        let mem = touches_memory(target, mi);
        let side = has_side_effects(target, mi);
        if !mem && !side {
            continue;
        }
        for from in 0..to {
            let prev = &instrs[from];
            let prev_mem = touches_memory(target, prev);
            let prev_side = has_side_effects(target, prev);
            if (side && (prev_mem || prev_side)) || (prev_side && mem) {
                builder.order(from, to, false);
                continue;
            }
            if !(mem && prev_mem) {
                continue;
            }
            let both_volatile = prev.has_volatile_ref() && mi.has_volatile_ref();
            let any_store = target.may_store(prev) || target.may_store(mi);
            if !any_store && !both_volatile {
                continue;
            }
            match alias_instrs(target, instrs, from, to) {
                Alias::No if !both_volatile => {}
                alias => {
                    builder.order(from, to, alias == Alias::Must);
                }
            }
        }
    }

    let graph = builder.build(arena);
    log::trace!(
        "dependence graph: {} units, {} edges",
        graph.len(),
        graph.edge_count()
    );
    graph
}
