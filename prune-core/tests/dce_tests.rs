//! End-to-end tests for the dead code elimination pass.
//!
//! Modules are built from WAT text and every rewritten output is checked
//! against the validator, so a miscounted operand length or a bad index
//! rewrite shows up as an invalid module rather than a silent corruption.

use prune_core::{eliminate_dead_code, parse, reach, DceError, Report, SECTION_CUSTOM};

fn build(wat_text: &str) -> Vec<u8> {
    wat::parse_str(wat_text).expect("failed to build test module")
}

fn run(bytes: &[u8]) -> (Vec<u8>, Report) {
    eliminate_dead_code(bytes).expect("pass failed")
}

fn assert_valid(bytes: &[u8]) {
    wasmparser::validate(bytes).expect("output is not a valid module");
}

#[test]
fn nothing_removed_returns_input_bytes() {
    let bytes = build(
        r#"
        (module
            (func (export "a") (call 1))
            (func (export "b"))
        )
        "#,
    );
    let (out, report) = run(&bytes);
    assert_eq!(report.removed_defined_functions, 0);
    assert_eq!(report.kept_defined_functions, 2);
    assert_eq!(out, bytes);
    assert_eq!(report.original_size_bytes, report.optimized_size_bytes);
}

#[test]
fn removes_single_dead_function() {
    // main is exported and calls a no-op; a second no-op is unreferenced.
    let bytes = build(
        r#"
        (module
            (func $main (export "main") (call $noop))
            (func $noop)
            (func $dead)
        )
        "#,
    );
    let (out, report) = run(&bytes);
    assert_eq!(report.total_defined_functions, 3);
    assert_eq!(report.kept_defined_functions, 2);
    assert_eq!(report.removed_defined_functions, 1);
    assert!(report.optimized_size_bytes < report.original_size_bytes);
    assert_valid(&out);

    let module = parse::parse(&out).unwrap();
    assert_eq!(module.bodies.len(), 2);
    // main's call operand targets the no-op at its compacted index 1
    assert_eq!(module.bodies[0], vec![0x00, 0x10, 0x01, 0x0b]);
}

#[test]
fn rewrites_call_operand_across_removed_gap() {
    // the dead function sits at index 0, so both survivors shift down
    let bytes = build(
        r#"
        (module
            (func $dead)
            (func $main (export "main") (call $callee))
            (func $callee)
        )
        "#,
    );
    let (out, report) = run(&bytes);
    assert_eq!(report.removed_defined_functions, 1);
    assert_valid(&out);

    let module = parse::parse(&out).unwrap();
    assert_eq!(module.exports[0].index, 0);
    assert_eq!(module.bodies[0], vec![0x00, 0x10, 0x01, 0x0b]);
}

#[test]
fn multi_hop_call_chain_survives() {
    let bytes = build(
        r#"
        (module
            (func $main (export "main") (call $mid))
            (func $mid (call $leaf))
            (func $leaf)
            (func $dead)
        )
        "#,
    );
    let (out, report) = run(&bytes);
    assert_eq!(report.kept_defined_functions, 3);
    assert_eq!(report.removed_defined_functions, 1);
    assert_valid(&out);

    // re-running reachability on the output keeps everything
    let module = parse::parse(&out).unwrap();
    let keep = reach::analyze(&module).unwrap();
    assert_eq!(keep, vec![true, true, true]);
}

#[test]
fn imported_functions_are_preserved_and_not_renumbered() {
    let bytes = build(
        r#"
        (module
            (import "env" "log" (func $log (param i32)))
            (func $main (export "main") (call $log (i32.const 1)))
            (func $dead)
        )
        "#,
    );
    let (out, report) = run(&bytes);
    assert_eq!(report.total_defined_functions, 2);
    assert_eq!(report.removed_defined_functions, 1);
    assert_valid(&out);

    let module = parse::parse(&out).unwrap();
    assert_eq!(module.imported_func_count, 1);
    assert_eq!(module.imports.len(), 1);
    // the call still targets import index 0
    assert_eq!(module.bodies[0], vec![0x00, 0x41, 0x01, 0x10, 0x00, 0x0b]);
}

#[test]
fn start_only_function_survives_with_rewritten_index() {
    let bytes = build(
        r#"
        (module
            (func $dead)
            (func $init (call $helper))
            (func $helper)
            (start $init)
        )
        "#,
    );
    let (out, report) = run(&bytes);
    assert_eq!(report.removed_defined_functions, 1);
    assert_valid(&out);

    let module = parse::parse(&out).unwrap();
    assert_eq!(module.start, Some(0));
    assert_eq!(module.bodies.len(), 2);
}

#[test]
fn element_only_function_survives() {
    let bytes = build(
        r#"
        (module
            (table 1 funcref)
            (func $dead)
            (func $in_table)
            (elem (i32.const 0) $in_table)
        )
        "#,
    );
    let (out, report) = run(&bytes);
    assert_eq!(report.removed_defined_functions, 1);
    assert_valid(&out);

    let module = parse::parse(&out).unwrap();
    assert_eq!(module.bodies.len(), 1);
    match &module.elements[0].items {
        prune_core::ElemItems::Functions(funcs) => assert_eq!(funcs, &vec![0]),
        other => panic!("expected function indices, got {other:?}"),
    }
}

#[test]
fn expression_element_items_are_rewritten() {
    let bytes = build(
        r#"
        (module
            (table 1 funcref)
            (func $dead)
            (func $referenced)
            (elem (i32.const 0) funcref (ref.func $referenced))
        )
        "#,
    );
    let (out, report) = run(&bytes);
    assert_eq!(report.removed_defined_functions, 1);
    assert_valid(&out);

    let module = parse::parse(&out).unwrap();
    match &module.elements[0].items {
        prune_core::ElemItems::Expressions(exprs) => {
            // ref.func 0, end
            assert_eq!(exprs, &vec![vec![0xd2, 0x00, 0x0b]]);
        }
        other => panic!("expected expressions, got {other:?}"),
    }
}

#[test]
fn passive_element_segment_is_a_root() {
    let bytes = build(
        r#"
        (module
            (table 1 funcref)
            (func $dead)
            (func $passive_ref)
            (func $main (export "main")
                (table.init 0 (i32.const 0) (i32.const 0) (i32.const 1)))
            (elem func $passive_ref)
        )
        "#,
    );
    let (out, report) = run(&bytes);
    assert_eq!(report.removed_defined_functions, 1);
    assert_valid(&out);
}

#[test]
fn declared_ref_func_survives() {
    let bytes = build(
        r#"
        (module
            (func $dead)
            (func $taken)
            (func $main (export "main") (result funcref)
                (ref.func $taken))
            (elem declare func $taken)
        )
        "#,
    );
    let (out, report) = run(&bytes);
    assert_eq!(report.removed_defined_functions, 1);
    assert_valid(&out);

    let module = parse::parse(&out).unwrap();
    // ref.func operand compacted from 1 to 0
    assert_eq!(module.bodies[1], vec![0x00, 0xd2, 0x00, 0x0b]);
}

#[test]
fn indirect_call_targets_survive() {
    let bytes = build(
        r#"
        (module
            (table 1 funcref)
            (func $dead)
            (func $target (result i32) (i32.const 7))
            (func $main (export "main") (result i32)
                (call_indirect (result i32) (i32.const 0)))
            (elem (i32.const 0) $target)
        )
        "#,
    );
    let (out, report) = run(&bytes);
    assert_eq!(report.kept_defined_functions, 2);
    assert_eq!(report.removed_defined_functions, 1);
    assert_valid(&out);
}

#[test]
fn custom_sections_pass_through_unchanged() {
    let bytes = build(
        r#"
        (module
            (@custom "metadata" "build-id-1234")
            (func $main (export "main"))
            (func $dead)
        )
        "#,
    );
    let input_customs: Vec<_> = parse::parse(&bytes)
        .unwrap()
        .sections
        .into_iter()
        .filter(|s| s.id == SECTION_CUSTOM)
        .collect();
    assert!(!input_customs.is_empty());

    let (out, report) = run(&bytes);
    assert_eq!(report.removed_defined_functions, 1);
    assert_valid(&out);

    let output_customs: Vec<_> = parse::parse(&out)
        .unwrap()
        .sections
        .into_iter()
        .filter(|s| s.id == SECTION_CUSTOM)
        .collect();
    assert_eq!(input_customs, output_customs);
}

#[test]
fn exports_reindex_around_removed_gap() {
    let bytes = build(
        r#"
        (module
            (func $first (export "first"))
            (func $dead)
            (func $second (export "second"))
        )
        "#,
    );
    let (out, report) = run(&bytes);
    assert_eq!(report.removed_defined_functions, 1);
    assert_valid(&out);

    let module = parse::parse(&out).unwrap();
    assert_eq!(module.exports.len(), 2);
    assert_eq!(module.exports[0].name, b"first".to_vec());
    assert_eq!(module.exports[0].index, 0);
    assert_eq!(module.exports[1].name, b"second".to_vec());
    assert_eq!(module.exports[1].index, 1);
}

#[test]
fn pass_is_idempotent() {
    let bytes = build(
        r#"
        (module
            (func $main (export "main") (call $kept))
            (func $kept)
            (func $dead_a)
            (func $dead_b (call $dead_a))
        )
        "#,
    );
    let (first, report) = run(&bytes);
    assert_eq!(report.removed_defined_functions, 2);

    let (second, report) = run(&first);
    assert_eq!(report.removed_defined_functions, 0);
    assert_eq!(second, first);
}

#[test]
fn all_dead_functions_are_removed() {
    let bytes = build(
        r#"
        (module
            (func $a (call $b))
            (func $b)
        )
        "#,
    );
    let (out, report) = run(&bytes);
    assert_eq!(report.removed_defined_functions, 2);
    assert_eq!(report.kept_defined_functions, 0);
    assert_valid(&out);
    assert_eq!(parse::parse(&out).unwrap().bodies.len(), 0);
}

#[test]
fn empty_module_is_untouched() {
    let bytes = build("(module)");
    let (out, report) = run(&bytes);
    assert_eq!(report.total_defined_functions, 0);
    assert_eq!(report.removed_defined_functions, 0);
    assert_eq!(out, bytes);
}

#[test]
fn invalid_header_is_rejected() {
    assert!(matches!(
        eliminate_dead_code(b"hello world!"),
        Err(DceError::MalformedHeader(_))
    ));
}

#[test]
fn vector_instructions_are_an_explicit_failure() {
    let bytes = build(
        r#"
        (module
            (func (export "main")
                (drop (v128.const i64x2 0 0)))
        )
        "#,
    );
    match eliminate_dead_code(&bytes) {
        Err(DceError::UnsupportedOpcode { opcode: 0xfd, .. }) => {}
        other => panic!("expected UnsupportedOpcode for 0xfd, got {other:?}"),
    }
}

#[test]
fn parse_assemble_round_trip_with_imports() {
    let bytes = build(
        r#"
        (module
            (import "env" "log" (func (param i32)))
            (import "env" "mem" (memory 1))
            (import "env" "tbl" (table 1 funcref))
            (func (export "main") (call 0 (i32.const 1)))
        )
        "#,
    );
    let module = parse::parse(&bytes).unwrap();
    assert_eq!(prune_core::encode::assemble(&module), bytes);
}
