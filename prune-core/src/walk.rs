//! Instruction walker: the single primitive that knows the exact operand
//! byte length of every supported opcode.
//!
//! Both reachability analysis and rewriting drive the same cursor loop and
//! only differ in the visitor they pass, so the two phases cannot disagree
//! about instruction boundaries. The visitor is invoked for every
//! function-index operand (`call`, `return_call`, `ref.func`) and its
//! return value is re-encoded in place of the operand; every other operand
//! is copied from the input verbatim, preserving its original encoding.
//!
//! Vector (0xFD) and atomic (0xFE) prefixed instructions are rejected:
//! guessing an operand length would silently corrupt every following byte.

use crate::error::DceError;
use crate::leb;

/// How the walk terminates.
enum Stop {
    /// Walk to the end of the slice (code bodies).
    EndOfSlice,
    /// Stop after the `end` opcode at depth zero (constant expressions).
    AfterEnd,
}

/// Walks a complete code body: local declarations (copied verbatim)
/// followed by the instruction stream to the end of the slice. Returns the
/// rewritten body bytes.
pub fn walk_body<F>(body: &[u8], visit: &mut F) -> Result<Vec<u8>, DceError>
where
    F: FnMut(u32) -> Result<u32, DceError>,
{
    let mut out = Vec::with_capacity(body.len());
    let mut pos = 0;

    let (decl_count, n) = leb::read_u32(body, pos)?;
    out.extend_from_slice(&body[pos..pos + n]);
    pos += n;
    for _ in 0..decl_count {
        let (_, n) = leb::read_u32(body, pos)?;
        out.extend_from_slice(&body[pos..pos + n]);
        pos += n;
        let val_type = *body.get(pos).ok_or(DceError::SectionOutOfBounds {
            context: "local declaration",
        })?;
        out.push(val_type);
        pos += 1;
    }

    walk_instrs(body, pos, Stop::EndOfSlice, &mut out, visit)?;
    Ok(out)
}

/// Walks a constant expression starting at `pos`, up to and including its
/// terminating `end`. Returns the rewritten expression bytes and the
/// position just past it.
pub fn walk_const_expr<F>(
    data: &[u8],
    pos: usize,
    visit: &mut F,
) -> Result<(Vec<u8>, usize), DceError>
where
    F: FnMut(u32) -> Result<u32, DceError>,
{
    let mut out = Vec::new();
    let end = walk_instrs(data, pos, Stop::AfterEnd, &mut out, visit)?;
    Ok((out, end))
}

/// Returns the position just past the constant expression starting at
/// `pos`. Used by the parser to slice expressions out of section payloads
/// without re-encoding them.
pub fn const_expr_end(data: &[u8], pos: usize) -> Result<usize, DceError> {
    let mut scratch = Vec::new();
    walk_instrs(data, pos, Stop::AfterEnd, &mut scratch, &mut |index| {
        Ok(index)
    })
}

fn walk_instrs<F>(
    data: &[u8],
    mut pos: usize,
    stop: Stop,
    out: &mut Vec<u8>,
    visit: &mut F,
) -> Result<usize, DceError>
where
    F: FnMut(u32) -> Result<u32, DceError>,
{
    let mut depth = 0u32;
    while pos < data.len() {
        let op_offset = pos;
        let opcode = data[pos];
        pos += 1;
        out.push(opcode);

        match opcode {
            // block, loop, if: block type immediate
            0x02 | 0x03 | 0x04 => {
                depth += 1;
                let n = block_type_len(data, pos)?;
                out.extend_from_slice(&data[pos..pos + n]);
                pos += n;
            }
            // end
            0x0b => {
                if depth == 0 {
                    if let Stop::AfterEnd = stop {
                        return Ok(pos);
                    }
                } else {
                    depth -= 1;
                }
            }
            // br, br_if, local.*, global.*, table.get/set, memory.size/grow:
            // one index immediate
            0x0c | 0x0d | 0x20..=0x26 | 0x3f | 0x40 => {
                let (_, n) = leb::read_u32(data, pos)?;
                out.extend_from_slice(&data[pos..pos + n]);
                pos += n;
            }
            // br_table: target vector plus default
            0x0e => {
                let start = pos;
                let (count, n) = leb::read_u32(data, pos)?;
                pos += n;
                for _ in 0..=count {
                    let (_, n) = leb::read_u32(data, pos)?;
                    pos += n;
                }
                out.extend_from_slice(&data[start..pos]);
            }
            // call, return_call, ref.func: function-index operand, the only
            // opcodes that report an edge and may be substituted
            0x10 | 0x12 | 0xd2 => {
                let (index, n) = leb::read_u32(data, pos)?;
                pos += n;
                let new_index = visit(index)?;
                leb::write_u32(out, new_index);
            }
            // call_indirect, return_call_indirect: type index + table index
            0x11 | 0x13 => {
                let start = pos;
                let (_, n) = leb::read_u32(data, pos)?;
                pos += n;
                let (_, n) = leb::read_u32(data, pos)?;
                pos += n;
                out.extend_from_slice(&data[start..pos]);
            }
            // select with explicit result types
            0x1c => {
                let start = pos;
                let (count, n) = leb::read_u32(data, pos)?;
                pos += n;
                pos = pos
                    .checked_add(count as usize)
                    .filter(|end| *end <= data.len())
                    .ok_or(DceError::SectionOutOfBounds {
                        context: "select type vector",
                    })?;
                out.extend_from_slice(&data[start..pos]);
            }
            // memory loads and stores: memarg (alignment + offset)
            0x28..=0x3e => {
                let start = pos;
                let (_, n) = leb::read_u32(data, pos)?;
                pos += n;
                let (_, n) = leb::read_u32(data, pos)?;
                pos += n;
                out.extend_from_slice(&data[start..pos]);
            }
            // i32.const
            0x41 => {
                let (_, n) = leb::read_s32(data, pos)?;
                out.extend_from_slice(&data[pos..pos + n]);
                pos += n;
            }
            // i64.const
            0x42 => {
                let (_, n) = leb::read_s64(data, pos)?;
                out.extend_from_slice(&data[pos..pos + n]);
                pos += n;
            }
            // f32.const: raw 4 bytes
            0x43 => {
                let operand =
                    data.get(pos..pos + 4)
                        .ok_or(DceError::SectionOutOfBounds {
                            context: "f32.const operand",
                        })?;
                out.extend_from_slice(operand);
                pos += 4;
            }
            // f64.const: raw 8 bytes
            0x44 => {
                let operand =
                    data.get(pos..pos + 8)
                        .ok_or(DceError::SectionOutOfBounds {
                            context: "f64.const operand",
                        })?;
                out.extend_from_slice(operand);
                pos += 8;
            }
            // ref.null: heap type byte
            0xd0 => {
                let heap_type = *data.get(pos).ok_or(DceError::SectionOutOfBounds {
                    context: "ref.null operand",
                })?;
                out.push(heap_type);
                pos += 1;
            }
            // bulk memory family: each sub-opcode has its own immediates
            0xfc => {
                let start = pos;
                let (sub, n) = leb::read_u32(data, pos)?;
                pos += n;
                match sub {
                    // saturating truncations: no immediates
                    0..=7 => {}
                    // memory.init, memory.copy, table.init, table.copy
                    8 | 10 | 12 | 14 => {
                        let (_, n) = leb::read_u32(data, pos)?;
                        pos += n;
                        let (_, n) = leb::read_u32(data, pos)?;
                        pos += n;
                    }
                    // data.drop, memory.fill, elem.drop, table.grow/size/fill
                    9 | 11 | 13 | 15 | 16 | 17 => {
                        let (_, n) = leb::read_u32(data, pos)?;
                        pos += n;
                    }
                    _ => {
                        return Err(DceError::UnsupportedOpcode {
                            opcode: 0xfc,
                            offset: op_offset,
                        })
                    }
                }
                out.extend_from_slice(&data[start..pos]);
            }
            // vector and atomic prefixes: refuse rather than guess
            0xfd | 0xfe => {
                return Err(DceError::UnsupportedOpcode {
                    opcode,
                    offset: op_offset,
                })
            }
            // no immediates: control, parametric, ref.is_null, and the
            // numeric block 0x45..=0xc4
            0x00 | 0x01 | 0x05 | 0x0f | 0x1a | 0x1b | 0x1d | 0x1e | 0x1f | 0xd1
            | 0x45..=0xc4 => {}
            _ => {
                return Err(DceError::UnsupportedOpcode {
                    opcode,
                    offset: op_offset,
                })
            }
        }
    }

    match stop {
        Stop::EndOfSlice => Ok(pos),
        Stop::AfterEnd => Err(DceError::SectionOutOfBounds {
            context: "constant expression",
        }),
    }
}

/// Byte length of a block type immediate: either a single shorthand byte
/// or a signed 33-bit type index.
fn block_type_len(data: &[u8], pos: usize) -> Result<usize, DceError> {
    let byte = *data.get(pos).ok_or(DceError::SectionOutOfBounds {
        context: "block type",
    })?;
    match byte {
        0x40 | 0x7f | 0x7e | 0x7d | 0x7c | 0x7b | 0x70 | 0x6f => Ok(1),
        _ => {
            let (_, n) = leb::read_s33(data, pos)?;
            Ok(n)
        }
    }
}
