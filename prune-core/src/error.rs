//! Error taxonomy for the dead code elimination pass.

use thiserror::Error;

/// Errors produced while parsing, analyzing, or rewriting a module.
///
/// Every variant is terminal for the invocation: the pass never emits a
/// partially rewritten module. Callers should treat the input as
/// not-yet-optimizable and fall back to the original bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DceError {
    /// Missing or wrong magic bytes, or an unsupported version field.
    #[error("invalid module header: {0}")]
    MalformedHeader(&'static str),

    /// A read would extend past the end of the input or section payload.
    #[error("{context} extends past end of input")]
    SectionOutOfBounds {
        /// What was being read when the bounds check failed.
        context: &'static str,
    },

    /// A LEB128 varint used more bytes than its type allows.
    #[error("varint overflows its encoding at offset {offset}")]
    VarintOverflow {
        /// Byte offset of the varint within the slice being decoded.
        offset: usize,
    },

    /// Function/code section length mismatch, or a function index outside
    /// the combined index space (or pointing at a removed function).
    #[error("{0}")]
    CountMismatch(String),

    /// An opcode the walker has no operand-length entry for. Vector (0xFD)
    /// and atomic (0xFE) prefixes are rejected here rather than guessed.
    #[error("unsupported opcode 0x{opcode:02x} at offset {offset}")]
    UnsupportedOpcode {
        /// The opcode byte (or prefix byte for multi-byte families).
        opcode: u8,
        /// Byte offset of the opcode within the slice being walked.
        offset: usize,
    },

    /// An element segment with a flags value outside the eight known forms.
    #[error("unsupported element segment encoding {flags}")]
    UnsupportedElementForm {
        /// The flags discriminant as read from the segment.
        flags: u32,
    },

    /// An in-bounds but structurally invalid encoding: unknown import kind,
    /// non-function type form, trailing bytes after a section's last entry.
    #[error("malformed section: {0}")]
    MalformedSection(String),
}
