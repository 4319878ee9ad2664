//! Reachability analysis: root collection and breadth-first search over
//! the call graph.
//!
//! Roots are every function-kind export, the start function, and every
//! function referenced by an element segment (offset expressions and
//! element lists alike, across all eight encodings). BFS expands through
//! call/ref edges discovered by walking each defined function's body
//! exactly once. Imported functions are leaves: visited as targets, never
//! expanded, never removed.

use std::collections::{HashSet, VecDeque};

use crate::error::DceError;
use crate::walk;
use crate::{ElemItems, Module, KIND_FUNC};

/// Collects the root set: combined function indices that must never be
/// removed because they are observably referenced from outside the call
/// graph. Any root outside the combined index space is an error.
pub fn roots(module: &Module) -> Result<HashSet<u32>, DceError> {
    let total = module.total_func_count();
    let mut set = HashSet::new();

    for export in &module.exports {
        if export.kind == KIND_FUNC {
            add_root(&mut set, export.index, total, "export")?;
        }
    }

    if let Some(start) = module.start {
        add_root(&mut set, start, total, "start section")?;
    }

    for segment in &module.elements {
        if let Some(offset) = &segment.offset {
            for index in expr_func_refs(offset)? {
                add_root(&mut set, index, total, "element segment offset")?;
            }
        }
        match &segment.items {
            ElemItems::Functions(funcs) => {
                for &index in funcs {
                    add_root(&mut set, index, total, "element segment")?;
                }
            }
            ElemItems::Expressions(exprs) => {
                for expr in exprs {
                    for index in expr_func_refs(expr)? {
                        add_root(&mut set, index, total, "element segment")?;
                    }
                }
            }
        }
    }

    Ok(set)
}

/// Computes the keep flag for every defined function: breadth-first search
/// seeded by [`roots`], expanding through edges collected by walking each
/// body once. The result is pure set reachability, independent of
/// visitation order.
pub fn analyze(module: &Module) -> Result<Vec<bool>, DceError> {
    let total = module.total_func_count() as usize;
    let imported = module.imported_func_count;

    let mut edges: Vec<Vec<u32>> = Vec::with_capacity(module.bodies.len());
    for body in &module.bodies {
        let mut targets = Vec::new();
        walk::walk_body(body, &mut |index| {
            targets.push(index);
            Ok(index)
        })?;
        edges.push(targets);
    }

    let root_set = roots(module)?;
    let mut reachable = vec![false; total];
    let mut worklist = VecDeque::new();
    for &root in &root_set {
        if !reachable[root as usize] {
            reachable[root as usize] = true;
            worklist.push_back(root);
        }
    }

    while let Some(index) = worklist.pop_front() {
        if index < imported {
            continue;
        }
        let local = (index - imported) as usize;
        for &callee in &edges[local] {
            // Out-of-range call targets are left to the rewriter's remap
            // check, which fails loudly if the referencing body survives.
            if (callee as usize) < total && !reachable[callee as usize] {
                reachable[callee as usize] = true;
                worklist.push_back(callee);
            }
        }
    }

    Ok((0..module.bodies.len())
        .map(|i| reachable[imported as usize + i])
        .collect())
}

fn add_root(
    set: &mut HashSet<u32>,
    index: u32,
    total: u32,
    what: &str,
) -> Result<(), DceError> {
    if index >= total {
        return Err(DceError::CountMismatch(format!(
            "{what} references function index {index} outside the function index space ({total})"
        )));
    }
    set.insert(index);
    Ok(())
}

/// Function indices referenced by a constant expression (`ref.func`).
fn expr_func_refs(expr: &[u8]) -> Result<Vec<u32>, DceError> {
    let mut refs = Vec::new();
    walk::walk_const_expr(expr, 0, &mut |index| {
        refs.push(index);
        Ok(index)
    })?;
    Ok(refs)
}
