//! End-to-end packetizer tests.
//!
//! Programs are written in the textual MIR and run through the public pass
//! interface; the tests that need exact control over the dependence edges
//! hand a prebuilt graph to `packetize_region_with_graph`.

use bumpalo::Bump;
use vliw_packetizer::core::{
    BlockItem, MachineFunction, MachineInstr, PacketizerError, PacketizerSession,
};
use vliw_packetizer::dsp::opcodes::{STORE, STORE_NEW};
use vliw_packetizer::dsp::registers::{r, SP};
use vliw_packetizer::dsp::DspTarget;
use vliw_packetizer::packetizer::{DepGraphBuilder, Packetizer, PacketizerConfig};
use vliw_packetizer::test_mir::{parse_functions, print_functions};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn parse(target: &DspTarget, text: &str) -> Vec<MachineFunction> {
    parse_functions(target, text).unwrap()
}

/// Instructions of a single-block body.
fn region(target: &DspTarget, body: &str) -> Vec<MachineInstr> {
    let text = format!("func t {{\nbb entry:\n{body}\n}}\n");
    let mut functions = parse(target, &text);
    functions
        .remove(0)
        .blocks
        .remove(0)
        .items
        .into_iter()
        .flat_map(|item| match item {
            BlockItem::Instr(mi) => vec![mi],
            BlockItem::Bundle(instrs) => instrs,
        })
        .collect()
}

fn shape(items: &[BlockItem]) -> Vec<usize> {
    items.iter().map(|item| item.instrs().len()).collect()
}

fn packetize(target: &DspTarget, text: &str) -> (Vec<MachineFunction>, String) {
    let mut functions = parse(target, text);
    let arena = Bump::new();
    let session = PacketizerSession::new(&arena);
    let packetizer = Packetizer::new(target, PacketizerConfig::default(), &session);
    for mf in &mut functions {
        assert!(packetizer.run_on_function(mf).unwrap());
    }
    let printed = print_functions(target, &functions);
    (functions, printed)
}

const PROGRAM: &str = "\
func main frame=32 {
bb entry:
    allocframe #32
    store r29, #16, r1 :: mem(r29+16,4)
    kill r9
    r1 = add r10, r11
    dbg_value r1
    r2 = add r12, r13
    r3 = add r14, r15
    r4 = add r1, r2
    store r8, #0, r4 :: mem(r8+0,4)
    p0 = cmp_eq r1, r2
    r5 = tfr_t p0, r6
    r7 = add r5, r3
    r6 = add r12, r13
    nvj_cmpeq r6, r4, @exit
bb exit:
    store r8, #8192, r1 :: mem(r8+8192,4)
    jumpr r31
}
";

#[test]
fn test_three_independent_then_dependent() {
    init_logging();
    let target = DspTarget::new();
    let (functions, _) = packetize(
        &target,
        "func f {\nbb entry:\n    r1 = add r10, r11\n    r2 = add r12, r13\n    r3 = add r14, r15\n    r4 = add r1, r2\n}\n",
    );
    let items = &functions[0].blocks[0].items;
    assert_eq!(shape(items), vec![3, 1]);
    assert!(items[0].is_bundle());
}

#[test]
fn test_second_run_changes_nothing() {
    init_logging();
    let target = DspTarget::new();
    let (_, first) = packetize(&target, PROGRAM);
    assert!(first.contains("    {\n"));

    let (_, second) = packetize(&target, &first);
    assert_eq!(second, first);
}

#[test]
fn test_rerun_in_place_is_stable() {
    init_logging();
    let target = DspTarget::new();
    let mut functions = parse(&target, PROGRAM);
    let arena = Bump::new();
    let session = PacketizerSession::new(&arena);
    let packetizer = Packetizer::new(&target, PacketizerConfig::default(), &session);

    packetizer.run_on_function(&mut functions[0]).unwrap();
    let once = functions.clone();
    let bundles = session.stats().bundles;
    assert_eq!(functions[0].bundle_count(), bundles);

    packetizer.run_on_function(&mut functions[0]).unwrap();
    assert_eq!(functions, once);
    assert_eq!(session.stats().bundles, bundles);
}

#[test]
fn test_dual_stores_and_explicit_order_edge() {
    init_logging();
    let target = DspTarget::new();
    let arena = Bump::new();
    let session = PacketizerSession::new(&arena);
    let packetizer = Packetizer::new(&target, PacketizerConfig::default(), &session);
    let stores = region(
        &target,
        "    store r29, #0, r1 :: mem(r29+0,4)\n    store r29, #4, r2 :: mem(r29+4,4)",
    );

    let unordered = DepGraphBuilder::new(2).build(&arena);
    let items = packetizer
        .packetize_region_with_graph(stores.clone(), &unordered, 0)
        .unwrap();
    assert_eq!(shape(&items), vec![2]);

    let mut builder = DepGraphBuilder::new(2);
    builder.order(0, 1, true);
    let aliasing = builder.build(&arena);
    let items = packetizer
        .packetize_region_with_graph(stores, &aliasing, 0)
        .unwrap();
    assert_eq!(shape(&items), vec![1, 1]);
}

#[test]
fn test_dead_definitions_block_without_edges() {
    init_logging();
    let target = DspTarget::new();
    let arena = Bump::new();
    let session = PacketizerSession::new(&arena);
    let packetizer = Packetizer::new(&target, PacketizerConfig::default(), &session);
    let no_edges = DepGraphBuilder::new(2).build(&arena);

    let colliding = region(&target, "    r1<dead> = add r2, r3\n    r1<dead> = add r4, r5");
    let items = packetizer
        .packetize_region_with_graph(colliding, &no_edges, 0)
        .unwrap();
    assert_eq!(shape(&items), vec![1, 1]);

    let distinct = region(&target, "    r1<dead> = add r2, r3\n    r6<dead> = add r4, r5");
    let items = packetizer
        .packetize_region_with_graph(distinct, &no_edges, 0)
        .unwrap();
    assert_eq!(shape(&items), vec![2]);
}

#[test]
fn test_anti_dependence_into_call() {
    init_logging();
    let target = DspTarget::new();
    let arena = Bump::new();
    let session = PacketizerSession::new(&arena);
    let packetizer = Packetizer::new(&target, PacketizerConfig::default(), &session);

    let clobbered = region(&target, "    call @g\n    r0 = add r20, r21");
    let mut builder = DepGraphBuilder::new(2);
    builder.anti(0, 1, r(0));
    let items = packetizer
        .packetize_region_with_graph(clobbered, &builder.build(&arena), 0)
        .unwrap();
    assert_eq!(shape(&items), vec![1, 1]);

    let read_only = region(&target, "    call @g\n    r29 = add r29, r21");
    let mut builder = DepGraphBuilder::new(2);
    builder.anti(0, 1, SP);
    let items = packetizer
        .packetize_region_with_graph(read_only, &builder.build(&arena), 0)
        .unwrap();
    assert_eq!(shape(&items), vec![2]);
}

#[test]
fn test_failed_extender_restores_store() {
    init_logging();
    let target = DspTarget::new();
    let body = "    r1 = add r10, r11\n    r2 = add r12, r13\n    r3 = add r14, r15\n    store r8, #8192, r1 :: mem(r8+8192,4)";
    let original = region(&target, body);

    let arena = Bump::new();
    let session = PacketizerSession::new(&arena);
    let packetizer = Packetizer::new(&target, PacketizerConfig::default(), &session);
    let items = packetizer
        .packetize_region(original.clone(), 0)
        .unwrap();

    assert_eq!(shape(&items), vec![3, 1]);
    let store = &items[1].instrs()[0];
    assert_eq!(store.opcode, STORE);
    assert_ne!(store.opcode, STORE_NEW);
    assert_eq!(store, &original[3]);

    let stats = session.stats();
    assert_eq!(stats.rollbacks, 1);
    assert_eq!(stats.const_extenders, 1);
}

#[test]
fn test_allocframe_store_rebased() {
    init_logging();
    let target = DspTarget::new();
    let (functions, _) = packetize(
        &target,
        "func f frame=32 {\nbb entry:\n    allocframe #32\n    store r29, #16, r1 :: mem(r29+16,4)\n}\n",
    );
    let items = &functions[0].blocks[0].items;
    assert_eq!(shape(items), vec![2]);
    assert_eq!(items[0].instrs()[1].operands[1].imm_value(), Some(-24));
}

#[test]
fn test_abandoned_allocframe_pair_keeps_offset() {
    init_logging();
    let target = DspTarget::new();
    let arena = Bump::new();
    let session = PacketizerSession::new(&arena);
    let packetizer = Packetizer::new(&target, PacketizerConfig::default(), &session);
    let instrs = region(
        &target,
        "    allocframe #32\n    store r29, #16, r1 :: mem(r29+16,4)",
    );

    // The rebase succeeds on the stack pointer edge, then r1 forbids the pair.
    let mut builder = DepGraphBuilder::new(2);
    builder.data(0, 1, SP).data(0, 1, r(1));
    let items = packetizer
        .packetize_region_with_graph(instrs, &builder.build(&arena), 32)
        .unwrap();

    assert_eq!(shape(&items), vec![1, 1]);
    assert_eq!(items[1].instrs()[0].operands[1].imm_value(), Some(16));
    assert_eq!(session.stats().rewrites_undone, 1);
}

#[test]
fn test_failed_function_is_left_untouched() {
    init_logging();
    let target = DspTarget::new();
    // The second block promotes a predicated store against a predicated
    // producer that names no predicate register.
    let mut functions = parse(
        &target,
        "func f {\nbb entry:\n    kill r9\n    r1 = add r10, r11\n    r2 = add r12, r13\n\
         bb next:\n    r1 = tfr_t r6, r7\n    store_t p0, r8, #0, r1\n}\n",
    );
    let original = functions.clone();
    let arena = Bump::new();
    let session = PacketizerSession::new(&arena);
    let packetizer = Packetizer::new(&target, PacketizerConfig::default(), &session);

    let err = packetizer.run_on_function(&mut functions[0]).unwrap_err();
    assert!(matches!(err, PacketizerError::MissingPredicateRegister { .. }));
    assert_eq!(functions, original);
}

#[test]
fn test_parse_errors_are_reported() {
    let target = DspTarget::new();
    assert!(parse_functions(&target, "func f {\nbb entry:\n    r1 = frobnicate r2\n}\n").is_err());
    assert!(parse_functions(&target, "func f {\nbb entry:\n    r1 = add q7, r2\n}\n").is_err());
}
