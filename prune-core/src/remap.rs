//! Index remapping for the compacted function index space.

use crate::error::DceError;

/// Maps old combined function indices to their post-removal values.
///
/// Imported indices map to themselves. Kept local indices compact into the
/// contiguous range starting at the import count, preserving their original
/// relative order. Looking up a removed or out-of-space index is a defined
/// failure: every root is kept by construction, so a failing lookup means
/// the module references a function the analyzer decided to drop, and
/// aborting is preferable to emitting a corrupt module.
#[derive(Debug, Clone)]
pub struct RemapTable {
    imported: u32,
    new_index: Vec<Option<u32>>,
}

impl RemapTable {
    /// Builds the table from the import count and the per-local keep flags.
    pub fn build(imported_func_count: u32, keep: &[bool]) -> Self {
        let mut next = imported_func_count;
        let new_index = keep
            .iter()
            .map(|kept| {
                if *kept {
                    let index = next;
                    next += 1;
                    Some(index)
                } else {
                    None
                }
            })
            .collect();
        RemapTable {
            imported: imported_func_count,
            new_index,
        }
    }

    /// New combined index for `old`, or an error if `old` was removed or
    /// lies outside the combined index space.
    pub fn lookup(&self, old: u32) -> Result<u32, DceError> {
        if old < self.imported {
            return Ok(old);
        }
        let local = (old - self.imported) as usize;
        match self.new_index.get(local) {
            Some(Some(new)) => Ok(*new),
            Some(None) => Err(DceError::CountMismatch(format!(
                "function index {old} refers to a removed function"
            ))),
            None => Err(DceError::CountMismatch(format!(
                "function index {old} outside the function index space"
            ))),
        }
    }

    /// Whether the local function at `local` survives the pass.
    pub fn is_kept_local(&self, local: usize) -> bool {
        matches!(self.new_index.get(local), Some(Some(_)))
    }
}
