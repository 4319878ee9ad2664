//! Binary reader: decodes the section-framed format into a [`Module`].
//!
//! Recognized sections are parsed structurally and also retained raw in
//! `Module::sections`; everything else, including every custom section, is
//! retained raw only, so reassembly preserves exact placement and content.

use crate::error::DceError;
use crate::leb;
use crate::walk;
use crate::{
    ElemItems, ElemSegment, Export, Import, Module, RawSection, TableType, KIND_FUNC,
    SECTION_CODE, SECTION_ELEMENT, SECTION_EXPORT, SECTION_FUNCTION, SECTION_IMPORT,
    SECTION_MEMORY, SECTION_START, SECTION_TABLE, SECTION_TYPE,
};

const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];
const WASM_VERSION: u32 = 1;

/// Parses a complete binary module. All payload bytes are copied; the
/// input buffer may be freed or reused as soon as this returns.
pub fn parse(input: &[u8]) -> Result<Module, DceError> {
    if input.len() < 8 {
        return Err(DceError::MalformedHeader("input shorter than header"));
    }
    if input[0..4] != WASM_MAGIC {
        return Err(DceError::MalformedHeader("bad magic bytes"));
    }
    let version = u32::from_le_bytes([input[4], input[5], input[6], input[7]]);
    if version != WASM_VERSION {
        return Err(DceError::MalformedHeader("unsupported version"));
    }

    let mut module = Module::default();
    let mut pos = 8;
    while pos < input.len() {
        let id = input[pos];
        pos += 1;
        let (size, n) = leb::read_u32(input, pos)?;
        pos += n;
        let end = pos
            .checked_add(size as usize)
            .filter(|end| *end <= input.len())
            .ok_or(DceError::SectionOutOfBounds {
                context: "section payload",
            })?;
        let payload = input[pos..end].to_vec();
        pos = end;

        match id {
            SECTION_TYPE => module.types = parse_type_section(&payload)?,
            SECTION_IMPORT => {
                let (imports, func_count) = parse_import_section(&payload)?;
                module.imports = imports;
                module.imported_func_count = func_count;
            }
            SECTION_FUNCTION => module.func_types = parse_function_section(&payload)?,
            SECTION_TABLE => module.tables = parse_table_section(&payload)?,
            SECTION_MEMORY => module.memories = parse_memory_section(&payload)?,
            SECTION_EXPORT => module.exports = parse_export_section(&payload)?,
            SECTION_START => module.start = Some(parse_start_section(&payload)?),
            SECTION_ELEMENT => module.elements = parse_element_section(&payload)?,
            SECTION_CODE => module.bodies = parse_code_section(&payload)?,
            // custom, global, data, unknown: passthrough only
            _ => {}
        }
        module.sections.push(RawSection { id, payload });
    }

    if module.func_types.len() != module.bodies.len() {
        return Err(DceError::CountMismatch(format!(
            "function section declares {} functions but code section has {} bodies",
            module.func_types.len(),
            module.bodies.len()
        )));
    }
    Ok(module)
}

fn parse_type_section(data: &[u8]) -> Result<Vec<Vec<u8>>, DceError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let (count, n) = leb::read_u32(data, 0)?;
    let mut pos = n;
    let mut types = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let start = pos;
        let form = read_byte(data, pos, "type entry")?;
        pos += 1;
        if form != 0x60 {
            return Err(DceError::MalformedSection(format!(
                "unsupported type form 0x{form:02x}"
            )));
        }
        pos = skip_val_type_vec(data, pos)?;
        pos = skip_val_type_vec(data, pos)?;
        types.push(data[start..pos].to_vec());
    }
    check_consumed(data, pos, "type")?;
    Ok(types)
}

fn skip_val_type_vec(data: &[u8], pos: usize) -> Result<usize, DceError> {
    let (count, n) = leb::read_u32(data, pos)?;
    pos.checked_add(n)
        .and_then(|p| p.checked_add(count as usize))
        .filter(|end| *end <= data.len())
        .ok_or(DceError::SectionOutOfBounds {
            context: "type entry",
        })
}

fn parse_import_section(data: &[u8]) -> Result<(Vec<Import>, u32), DceError> {
    if data.is_empty() {
        return Ok((Vec::new(), 0));
    }
    let (count, n) = leb::read_u32(data, 0)?;
    let mut pos = n;
    let mut imports = Vec::with_capacity(count as usize);
    let mut func_count = 0u32;
    for _ in 0..count {
        let (module_name, next) = read_name(data, pos)?;
        pos = next;
        let (field_name, next) = read_name(data, pos)?;
        pos = next;
        let kind = read_byte(data, pos, "import entry")?;
        pos += 1;
        match kind {
            // function: type index
            KIND_FUNC => {
                let (_, n) = leb::read_u32(data, pos)?;
                pos += n;
                func_count += 1;
            }
            // table: element type + limits
            0x01 => {
                pos += 1;
                pos = skip_limits(data, pos)?;
            }
            // memory: limits
            0x02 => {
                pos = skip_limits(data, pos)?;
            }
            // global: value type + mutability
            0x03 => {
                read_byte(data, pos + 1, "global import")?;
                pos += 2;
            }
            // tag: attribute + type index
            0x04 => {
                read_byte(data, pos, "tag import")?;
                pos += 1;
                let (_, n) = leb::read_u32(data, pos)?;
                pos += n;
            }
            _ => {
                return Err(DceError::MalformedSection(format!(
                    "unsupported import kind {kind}"
                )))
            }
        }
        imports.push(Import {
            module: String::from_utf8_lossy(module_name).into_owned(),
            name: String::from_utf8_lossy(field_name).into_owned(),
            kind,
        });
    }
    check_consumed(data, pos, "import")?;
    Ok((imports, func_count))
}

fn parse_function_section(data: &[u8]) -> Result<Vec<u32>, DceError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let (count, n) = leb::read_u32(data, 0)?;
    let mut pos = n;
    let mut func_types = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (type_index, n) = leb::read_u32(data, pos)?;
        pos += n;
        func_types.push(type_index);
    }
    check_consumed(data, pos, "function")?;
    Ok(func_types)
}

fn parse_table_section(data: &[u8]) -> Result<Vec<TableType>, DceError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let (count, n) = leb::read_u32(data, 0)?;
    let mut pos = n;
    let mut tables = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let elem_type = read_byte(data, pos, "table entry")?;
        pos += 1;
        let start = pos;
        pos = skip_limits(data, pos)?;
        tables.push(TableType {
            elem_type,
            limits: data[start..pos].to_vec(),
        });
    }
    check_consumed(data, pos, "table")?;
    Ok(tables)
}

fn parse_memory_section(data: &[u8]) -> Result<Vec<Vec<u8>>, DceError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let (count, n) = leb::read_u32(data, 0)?;
    let mut pos = n;
    let mut memories = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let start = pos;
        pos = skip_limits(data, pos)?;
        memories.push(data[start..pos].to_vec());
    }
    check_consumed(data, pos, "memory")?;
    Ok(memories)
}

fn parse_export_section(data: &[u8]) -> Result<Vec<Export>, DceError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let (count, n) = leb::read_u32(data, 0)?;
    let mut pos = n;
    let mut exports = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (name, next) = read_name(data, pos)?;
        pos = next;
        let kind = read_byte(data, pos, "export entry")?;
        pos += 1;
        let (index, n) = leb::read_u32(data, pos)?;
        pos += n;
        exports.push(Export {
            name: name.to_vec(),
            kind,
            index,
        });
    }
    check_consumed(data, pos, "export")?;
    Ok(exports)
}

fn parse_start_section(data: &[u8]) -> Result<u32, DceError> {
    let (index, n) = leb::read_u32(data, 0)?;
    check_consumed(data, n, "start")?;
    Ok(index)
}

fn parse_element_section(data: &[u8]) -> Result<Vec<ElemSegment>, DceError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let (count, n) = leb::read_u32(data, 0)?;
    let mut pos = n;
    let mut segments = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (flags, n) = leb::read_u32(data, pos)?;
        pos += n;

        let mut segment = ElemSegment {
            flags,
            table_index: None,
            offset: None,
            kind_or_type: None,
            items: ElemItems::Functions(Vec::new()),
        };
        match flags {
            // active, implicit table 0, function indices
            0 => {
                let (offset, next) = read_const_expr(data, pos)?;
                pos = next;
                segment.offset = Some(offset);
                let (funcs, next) = read_func_index_vec(data, pos)?;
                pos = next;
                segment.items = ElemItems::Functions(funcs);
            }
            // passive or declarative, element kind + function indices
            1 | 3 => {
                segment.kind_or_type = Some(read_byte(data, pos, "element kind")?);
                pos += 1;
                let (funcs, next) = read_func_index_vec(data, pos)?;
                pos = next;
                segment.items = ElemItems::Functions(funcs);
            }
            // active, explicit table index, element kind + function indices
            2 => {
                let (table_index, n) = leb::read_u32(data, pos)?;
                pos += n;
                segment.table_index = Some(table_index);
                let (offset, next) = read_const_expr(data, pos)?;
                pos = next;
                segment.offset = Some(offset);
                segment.kind_or_type = Some(read_byte(data, pos, "element kind")?);
                pos += 1;
                let (funcs, next) = read_func_index_vec(data, pos)?;
                pos = next;
                segment.items = ElemItems::Functions(funcs);
            }
            // active, implicit table 0, initializer expressions
            4 => {
                let (offset, next) = read_const_expr(data, pos)?;
                pos = next;
                segment.offset = Some(offset);
                let (exprs, next) = read_expr_vec(data, pos)?;
                pos = next;
                segment.items = ElemItems::Expressions(exprs);
            }
            // passive or declarative, reference type + initializer expressions
            5 | 7 => {
                segment.kind_or_type = Some(read_byte(data, pos, "element reference type")?);
                pos += 1;
                let (exprs, next) = read_expr_vec(data, pos)?;
                pos = next;
                segment.items = ElemItems::Expressions(exprs);
            }
            // active, explicit table index, reference type + initializer expressions
            6 => {
                let (table_index, n) = leb::read_u32(data, pos)?;
                pos += n;
                segment.table_index = Some(table_index);
                let (offset, next) = read_const_expr(data, pos)?;
                pos = next;
                segment.offset = Some(offset);
                segment.kind_or_type = Some(read_byte(data, pos, "element reference type")?);
                pos += 1;
                let (exprs, next) = read_expr_vec(data, pos)?;
                pos = next;
                segment.items = ElemItems::Expressions(exprs);
            }
            _ => return Err(DceError::UnsupportedElementForm { flags }),
        }
        segments.push(segment);
    }
    check_consumed(data, pos, "element")?;
    Ok(segments)
}

fn parse_code_section(data: &[u8]) -> Result<Vec<Vec<u8>>, DceError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let (count, n) = leb::read_u32(data, 0)?;
    let mut pos = n;
    let mut bodies = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (size, n) = leb::read_u32(data, pos)?;
        pos += n;
        let end = pos
            .checked_add(size as usize)
            .filter(|end| *end <= data.len())
            .ok_or(DceError::SectionOutOfBounds {
                context: "code body",
            })?;
        bodies.push(data[pos..end].to_vec());
        pos = end;
    }
    check_consumed(data, pos, "code")?;
    Ok(bodies)
}

/// Slices a constant expression (through its `end`) without re-encoding.
fn read_const_expr(data: &[u8], pos: usize) -> Result<(Vec<u8>, usize), DceError> {
    let end = walk::const_expr_end(data, pos)?;
    Ok((data[pos..end].to_vec(), end))
}

fn read_func_index_vec(data: &[u8], pos: usize) -> Result<(Vec<u32>, usize), DceError> {
    let (count, n) = leb::read_u32(data, pos)?;
    let mut pos = pos + n;
    let mut indices = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (index, n) = leb::read_u32(data, pos)?;
        pos += n;
        indices.push(index);
    }
    Ok((indices, pos))
}

fn read_expr_vec(data: &[u8], pos: usize) -> Result<(Vec<Vec<u8>>, usize), DceError> {
    let (count, n) = leb::read_u32(data, pos)?;
    let mut pos = pos + n;
    let mut exprs = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (expr, next) = read_const_expr(data, pos)?;
        pos = next;
        exprs.push(expr);
    }
    Ok((exprs, pos))
}

fn read_name(data: &[u8], pos: usize) -> Result<(&[u8], usize), DceError> {
    let (len, n) = leb::read_u32(data, pos)?;
    let start = pos + n;
    let end = start
        .checked_add(len as usize)
        .filter(|end| *end <= data.len())
        .ok_or(DceError::SectionOutOfBounds { context: "name" })?;
    Ok((&data[start..end], end))
}

fn read_byte(data: &[u8], pos: usize, context: &'static str) -> Result<u8, DceError> {
    data.get(pos)
        .copied()
        .ok_or(DceError::SectionOutOfBounds { context })
}

fn skip_limits(data: &[u8], pos: usize) -> Result<usize, DceError> {
    let (flags, n) = leb::read_u32(data, pos)?;
    let mut pos = pos + n;
    let (_, n) = leb::read_u32(data, pos)?;
    pos += n;
    if flags & 0x01 != 0 {
        let (_, n) = leb::read_u32(data, pos)?;
        pos += n;
    }
    Ok(pos)
}

fn check_consumed(data: &[u8], pos: usize, section: &str) -> Result<(), DceError> {
    if pos != data.len() {
        return Err(DceError::MalformedSection(format!(
            "{section} section has trailing bytes"
        )));
    }
    Ok(())
}

/// Helper for other modules and tests that need to locate a section's
/// position in the raw section list.
pub(crate) fn find_section(module: &Module, id: u8) -> Option<usize> {
    module.sections.iter().position(|s| s.id == id)
}
