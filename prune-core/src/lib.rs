//! Dead code elimination for compiled WebAssembly modules.
//!
//! The pass parses a binary module, computes which functions are reachable
//! from the module's roots (exports, the start function, element segment
//! references), drops every unreachable defined function, compacts the
//! function index space, and re-emits the module. Imported functions are
//! never removed or renumbered.
//!
//! The whole engine is a single-shot pipeline:
//!
//! ```text
//! bytes -> parse -> analyze -> remap -> rewrite -> assemble -> bytes + report
//! ```
//!
//! Analysis and rewriting share one instruction-walking primitive (see
//! [`walk`]), so the two phases cannot disagree about instruction
//! boundaries. Any structural error aborts the pass; callers fall back to
//! the original bytes. Modules using vector (SIMD) or atomic instructions
//! are rejected rather than decoded on a guess.

#![warn(missing_docs)]

use log::debug;

pub mod encode;
pub mod error;
pub mod leb;
pub mod parse;
pub mod reach;
pub mod remap;
pub mod rewrite;
pub mod walk;

pub use error::DceError;
pub use remap::RemapTable;

/// Custom section id.
pub const SECTION_CUSTOM: u8 = 0;
/// Type section id.
pub const SECTION_TYPE: u8 = 1;
/// Import section id.
pub const SECTION_IMPORT: u8 = 2;
/// Function section id.
pub const SECTION_FUNCTION: u8 = 3;
/// Table section id.
pub const SECTION_TABLE: u8 = 4;
/// Memory section id.
pub const SECTION_MEMORY: u8 = 5;
/// Global section id.
pub const SECTION_GLOBAL: u8 = 6;
/// Export section id.
pub const SECTION_EXPORT: u8 = 7;
/// Start section id.
pub const SECTION_START: u8 = 8;
/// Element section id.
pub const SECTION_ELEMENT: u8 = 9;
/// Code section id.
pub const SECTION_CODE: u8 = 10;
/// Data section id.
pub const SECTION_DATA: u8 = 11;

/// Export and import kind tag for functions.
pub const KIND_FUNC: u8 = 0;

/// A section as encountered in the input: id plus an owned copy of its
/// payload bytes. The ordered list of these is the source of truth for
/// reassembly, so custom and other passthrough sections keep their exact
/// placement and contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSection {
    /// Section id byte.
    pub id: u8,
    /// Payload bytes, excluding the id and size prefix.
    pub payload: Vec<u8>,
}

/// An import entry. Only function-kind imports participate in the index
/// space the pass cares about; the rest are tracked for bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Module name, lossily decoded.
    pub module: String,
    /// Field name, lossily decoded.
    pub name: String,
    /// Import kind tag (0 function, 1 table, 2 memory, 3 global, 4 tag).
    pub kind: u8,
}

/// An export entry. The name is kept as raw bytes so a rewritten export
/// section reproduces it exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    /// Export name bytes.
    pub name: Vec<u8>,
    /// Export kind tag (0 function, 1 table, 2 memory, 3 global).
    pub kind: u8,
    /// Index into the kind's index space.
    pub index: u32,
}

/// Table declaration: element type byte plus raw limits bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableType {
    /// Reference type byte (0x70 funcref, 0x6f externref).
    pub elem_type: u8,
    /// Raw limits encoding.
    pub limits: Vec<u8>,
}

/// The items carried by an element segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElemItems {
    /// Bare function-index vector (encodings 0..=3).
    Functions(Vec<u32>),
    /// Reference-typed initializer expressions, each stored as raw
    /// constant-expression bytes including the terminating `end`
    /// (encodings 4..=7).
    Expressions(Vec<Vec<u8>>),
}

/// An element segment in one of the eight binary encodings, keyed by its
/// flags discriminant so reassembly reproduces the original form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElemSegment {
    /// Flags discriminant, 0..=7.
    pub flags: u32,
    /// Explicit table index (encodings 2 and 6).
    pub table_index: Option<u32>,
    /// Offset constant expression for active segments (encodings 0, 2, 4,
    /// 6), raw bytes including the terminating `end`.
    pub offset: Option<Vec<u8>>,
    /// Element kind byte (encodings 1..=3) or reference type byte
    /// (encodings 5..=7).
    pub kind_or_type: Option<u8>,
    /// The segment's function references.
    pub items: ElemItems,
}

/// An in-memory module: every section in original order plus structured
/// views of the sections the pass interprets. Constructed once per
/// invocation and discarded after producing output bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Module {
    /// Every section as encountered, in order, with owned payload copies.
    pub sections: Vec<RawSection>,
    /// Raw bytes of each function type entry.
    pub types: Vec<Vec<u8>>,
    /// All import entries.
    pub imports: Vec<Import>,
    /// Number of function-kind imports. Imported functions occupy combined
    /// indices `[0, imported_func_count)`.
    pub imported_func_count: u32,
    /// Type index for each defined function, in definition order.
    pub func_types: Vec<u32>,
    /// Table declarations.
    pub tables: Vec<TableType>,
    /// Memory declarations, raw limits bytes each.
    pub memories: Vec<Vec<u8>>,
    /// Export entries.
    pub exports: Vec<Export>,
    /// Start function index, if present.
    pub start: Option<u32>,
    /// Element segments.
    pub elements: Vec<ElemSegment>,
    /// Code body bytes for each defined function (local declarations,
    /// instructions, and terminating `end`), in definition order.
    pub bodies: Vec<Vec<u8>>,
}

impl Module {
    /// Total size of the combined function index space.
    pub fn total_func_count(&self) -> u32 {
        self.imported_func_count + self.bodies.len() as u32
    }
}

/// Summary of a dead code elimination run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Report {
    /// Defined (non-imported) functions in the input.
    pub total_defined_functions: usize,
    /// Defined functions surviving the pass.
    pub kept_defined_functions: usize,
    /// Defined functions removed.
    pub removed_defined_functions: usize,
    /// Input size in bytes.
    pub original_size_bytes: usize,
    /// Output size in bytes. Equals the input size when nothing was
    /// removed.
    pub optimized_size_bytes: usize,
}

/// Removes unreachable defined functions from a binary module.
///
/// Returns the rewritten module bytes and a [`Report`]. When no function
/// is removable the input bytes are returned unchanged. The pass is a
/// pure function of its input: it owns all intermediate state and never
/// aliases the caller's buffer.
pub fn eliminate_dead_code(input: &[u8]) -> Result<(Vec<u8>, Report), DceError> {
    let mut module = parse::parse(input)?;
    debug!(
        "parsed module: {} sections, {} imports ({} functions), {} defined functions",
        module.sections.len(),
        module.imports.len(),
        module.imported_func_count,
        module.bodies.len()
    );

    let keep = reach::analyze(&module)?;
    let total = module.bodies.len();
    let kept = keep.iter().filter(|k| **k).count();
    debug!("reachability: {kept} of {total} defined functions reachable");

    if kept == total {
        return Ok((
            input.to_vec(),
            Report {
                total_defined_functions: total,
                kept_defined_functions: kept,
                removed_defined_functions: 0,
                original_size_bytes: input.len(),
                optimized_size_bytes: input.len(),
            },
        ));
    }

    let table = RemapTable::build(module.imported_func_count, &keep);
    rewrite::rewrite(&mut module, &table)?;
    let output = encode::assemble(&module);
    debug!(
        "rewrote module: removed {} functions, {} -> {} bytes",
        total - kept,
        input.len(),
        output.len()
    );

    let report = Report {
        total_defined_functions: total,
        kept_defined_functions: kept,
        removed_defined_functions: total - kept,
        original_size_bytes: input.len(),
        optimized_size_bytes: output.len(),
    };
    Ok((output, report))
}
