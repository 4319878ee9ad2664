//! Rewriter: drops dead functions and substitutes every function-index
//! operand through the remap table.
//!
//! The per-function type list and code body list are filtered in lockstep,
//! surviving bodies are re-walked with the remap as the visitor, and the
//! export, start, and element sections are rewritten with the same walker.
//! The affected entries in the raw section list are patched in place;
//! everything else is left untouched for byte-exact reassembly.

use crate::encode;
use crate::error::DceError;
use crate::parse::find_section;
use crate::remap::RemapTable;
use crate::walk;
use crate::{
    ElemItems, Module, KIND_FUNC, SECTION_CODE, SECTION_ELEMENT, SECTION_EXPORT,
    SECTION_FUNCTION, SECTION_START,
};

/// Rewrites `module` in place using `table`. Assumes at least one function
/// is being removed; the no-removal case short-circuits before this.
pub fn rewrite(module: &mut Module, table: &RemapTable) -> Result<(), DceError> {
    let mut func_types = Vec::with_capacity(module.func_types.len());
    let mut bodies = Vec::with_capacity(module.bodies.len());
    for (local, (type_index, body)) in module
        .func_types
        .iter()
        .zip(module.bodies.iter())
        .enumerate()
    {
        if !table.is_kept_local(local) {
            continue;
        }
        let rewritten = walk::walk_body(body, &mut |index| table.lookup(index))?;
        func_types.push(*type_index);
        bodies.push(rewritten);
    }
    module.func_types = func_types;
    module.bodies = bodies;

    for export in &mut module.exports {
        if export.kind == KIND_FUNC {
            export.index = table.lookup(export.index)?;
        }
    }

    if let Some(start) = module.start {
        module.start = Some(table.lookup(start)?);
    }

    for segment in &mut module.elements {
        if let Some(offset) = &segment.offset {
            let (rewritten, _) =
                walk::walk_const_expr(offset, 0, &mut |index| table.lookup(index))?;
            segment.offset = Some(rewritten);
        }
        match &mut segment.items {
            ElemItems::Functions(funcs) => {
                for index in funcs.iter_mut() {
                    *index = table.lookup(*index)?;
                }
            }
            ElemItems::Expressions(exprs) => {
                for expr in exprs.iter_mut() {
                    let (rewritten, _) =
                        walk::walk_const_expr(expr, 0, &mut |index| table.lookup(index))?;
                    *expr = rewritten;
                }
            }
        }
    }

    let function_payload = encode::function_section(&module.func_types);
    let code_payload = encode::code_section(&module.bodies);
    let export_payload = encode::export_section(&module.exports);
    let start_payload = module.start.map(encode::start_section);
    let element_payload = encode::element_section(&module.elements);

    patch_section(module, SECTION_FUNCTION, function_payload);
    patch_section(module, SECTION_CODE, code_payload);
    patch_section(module, SECTION_EXPORT, export_payload);
    if let Some(payload) = start_payload {
        patch_section(module, SECTION_START, payload);
    }
    patch_section(module, SECTION_ELEMENT, element_payload);

    Ok(())
}

fn patch_section(module: &mut Module, id: u8, payload: Vec<u8>) {
    if let Some(index) = find_section(module, id) {
        module.sections[index].payload = payload;
    }
}
