//! Assembler: re-emits the section-framed binary.
//!
//! `assemble` writes the header followed by every section in its original
//! relative order, straight from the raw section list. The section
//! encoders below produce replacement payloads for the sections the
//! rewriter changes; everything else keeps its original bytes, so an
//! unmodified module round-trips exactly.

use crate::leb;
use crate::{ElemItems, ElemSegment, Export, Module};

/// Emits the complete module: magic, version, and every section in order.
pub fn assemble(module: &Module) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        8 + module
            .sections
            .iter()
            .map(|s| s.payload.len() + 6)
            .sum::<usize>(),
    );
    out.extend_from_slice(&[0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00]);
    for section in &module.sections {
        out.push(section.id);
        leb::write_u32(&mut out, section.payload.len() as u32);
        out.extend_from_slice(&section.payload);
    }
    out
}

/// Encodes a function section payload from per-function type indices.
pub fn function_section(func_types: &[u32]) -> Vec<u8> {
    let mut out = Vec::new();
    leb::write_u32(&mut out, func_types.len() as u32);
    for &type_index in func_types {
        leb::write_u32(&mut out, type_index);
    }
    out
}

/// Encodes a code section payload from raw body bytes.
pub fn code_section(bodies: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    leb::write_u32(&mut out, bodies.len() as u32);
    for body in bodies {
        leb::write_u32(&mut out, body.len() as u32);
        out.extend_from_slice(body);
    }
    out
}

/// Encodes an export section payload.
pub fn export_section(exports: &[Export]) -> Vec<u8> {
    let mut out = Vec::new();
    leb::write_u32(&mut out, exports.len() as u32);
    for export in exports {
        leb::write_u32(&mut out, export.name.len() as u32);
        out.extend_from_slice(&export.name);
        out.push(export.kind);
        leb::write_u32(&mut out, export.index);
    }
    out
}

/// Encodes a start section payload.
pub fn start_section(index: u32) -> Vec<u8> {
    leb::u32_bytes(index)
}

/// Encodes an element section payload, reproducing each segment's original
/// encoding form via its flags discriminant.
pub fn element_section(segments: &[ElemSegment]) -> Vec<u8> {
    let mut out = Vec::new();
    leb::write_u32(&mut out, segments.len() as u32);
    for segment in segments {
        leb::write_u32(&mut out, segment.flags);
        if let Some(table_index) = segment.table_index {
            leb::write_u32(&mut out, table_index);
        }
        if let Some(offset) = &segment.offset {
            out.extend_from_slice(offset);
        }
        if let Some(kind_or_type) = segment.kind_or_type {
            out.push(kind_or_type);
        }
        match &segment.items {
            ElemItems::Functions(funcs) => {
                leb::write_u32(&mut out, funcs.len() as u32);
                for &index in funcs {
                    leb::write_u32(&mut out, index);
                }
            }
            ElemItems::Expressions(exprs) => {
                leb::write_u32(&mut out, exprs.len() as u32);
                for expr in exprs {
                    out.extend_from_slice(expr);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use crate::{SECTION_ELEMENT, SECTION_EXPORT, SECTION_FUNCTION};

    #[test]
    fn assemble_reproduces_input() {
        let bytes = wat::parse_str(
            r#"
            (module
                (import "env" "log" (func (param i32)))
                (memory 1)
                (table 1 funcref)
                (global i32 (i32.const 7))
                (func $f (export "f") (call 0 (i32.const 1)))
                (elem (i32.const 0) $f)
                (data (i32.const 0) "hi")
            )
            "#,
        )
        .unwrap();
        let module = parse::parse(&bytes).unwrap();
        assert_eq!(assemble(&module), bytes);
    }

    #[test]
    fn section_encoders_match_original_payloads() {
        let bytes = wat::parse_str(
            r#"
            (module
                (table 1 funcref)
                (func $f (export "f"))
                (func $g (export "g"))
                (elem (i32.const 0) $f)
            )
            "#,
        )
        .unwrap();
        let module = parse::parse(&bytes).unwrap();
        for (id, payload) in [
            (SECTION_FUNCTION, function_section(&module.func_types)),
            (SECTION_EXPORT, export_section(&module.exports)),
            (SECTION_ELEMENT, element_section(&module.elements)),
        ] {
            let original = &module.sections[module
                .sections
                .iter()
                .position(|s| s.id == id)
                .unwrap()]
            .payload;
            assert_eq!(&payload, original, "section id {id}");
        }
    }

    #[test]
    fn empty_code_and_function_sections() {
        assert_eq!(function_section(&[]), vec![0x00]);
        assert_eq!(code_section(&[]), vec![0x00]);
    }
}
