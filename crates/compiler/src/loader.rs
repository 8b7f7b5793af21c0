//! The loader
//!
//! Resolves a starting CID into the base address of a runtime cell array.
//! Loaded buffers live in an arena of boxed slices (addresses are stable
//! while the loader is alive); a CID-to-index memo cache guarantees each
//! blob links once, so shared references (and the diamond dependencies
//! content addressing creates) resolve to a single instance.

use crate::error::CompileError;
use crate::store::Store;
use std::collections::HashMap;
use tracing::debug;
use weft_core::cells::{Cell, EXIT};
use weft_core::prims::DISPATCH_TABLE_SIZE;
use weft_core::{BlobKind, BlobTag, Cid, TagReader};

/// One linked blob: its cells (or raw data, 8-byte padded) and the
/// original byte length for DATA blobs.
struct LoadedBlob {
    cells: Box<[u64]>,
    byte_len: usize,
}

pub struct Loader<'a> {
    store: &'a Store,
    dispatch: [u64; DISPATCH_TABLE_SIZE],
    cache: HashMap<Cid, usize>,
    arena: Vec<LoadedBlob>,
}

impl<'a> Loader<'a> {
    pub fn new(store: &'a Store, dispatch: [u64; DISPATCH_TABLE_SIZE]) -> Self {
        Loader {
            store,
            dispatch,
            cache: HashMap::new(),
            arena: Vec::new(),
        }
    }

    /// Base address of a linked arena entry.
    pub fn addr(&self, index: usize) -> u64 {
        self.arena[index].cells.as_ptr() as u64
    }

    /// Number of blobs linked so far.
    pub fn linked_count(&self) -> usize {
        self.arena.len()
    }

    /// Link a blob (and, transitively, everything it references) into the
    /// arena. Returns the arena index; cached on repeat visits.
    pub fn link_cid(&mut self, cid: &Cid) -> Result<usize, CompileError> {
        if let Some(&index) = self.cache.get(cid) {
            return Ok(index);
        }

        let record = self
            .store
            .load_blob(cid)
            .ok_or_else(|| CompileError::link(format!("missing blob {cid}")))?;
        let kind = record.blob_kind().ok_or_else(|| {
            CompileError::link(format!("blob {cid} has unrecognized kind {}", record.kind))
        })?;

        let blob = match kind {
            BlobKind::Word | BlobKind::Quotation => {
                let bytes = record.bytes.clone();
                let cells = self.link_code(&bytes)?;
                LoadedBlob {
                    byte_len: cells.len() * 8,
                    cells,
                }
            }
            BlobKind::Data => data_blob(&record.bytes),
            BlobKind::Primitive => {
                return Err(CompileError::link(format!(
                    "blob {cid} is a primitive; primitives are referenced by ID, not CID"
                )));
            }
        };

        let index = self.arena.len();
        self.arena.push(blob);
        self.cache.insert(*cid, index);
        debug!(%cid, index, %kind, "blob linked");
        Ok(index)
    }

    /// Scan a tag stream into an executable cell array ending in EXIT.
    fn link_code(&mut self, bytes: &[u8]) -> Result<Box<[u64]>, CompileError> {
        let mut out: Vec<u64> = Vec::new();
        let mut reader = TagReader::new(bytes);
        loop {
            let tag = reader
                .next()
                .map_err(|e| CompileError::link(e.to_string()))?;
            let Some(tag) = tag else { break };
            match tag {
                BlobTag::Prim(id) => {
                    let addr = self
                        .dispatch
                        .get(id as usize)
                        .copied()
                        .filter(|&addr| addr != 0)
                        .ok_or_else(|| {
                            CompileError::link(format!("unknown primitive ID {id}"))
                        })?;
                    out.push(Cell::Xt(addr).encode());
                }
                BlobTag::InlineLit(value) => {
                    if !Cell::fits_lit(value) {
                        return Err(CompileError::link(format!(
                            "inline literal {value} exceeds the 62-bit cell range"
                        )));
                    }
                    out.push(Cell::Lit(value).encode());
                }
                BlobTag::Ref { kind, cid } => {
                    let target_kind = BlobKind::from_u16(kind).ok_or_else(|| {
                        CompileError::link(format!("unrecognized target kind {kind}"))
                    })?;
                    let index = self.link_cid(&cid)?;
                    let addr = self.addr(index);
                    match target_kind {
                        // calls
                        BlobKind::Word | BlobKind::Primitive => {
                            out.push(Cell::Xt(addr).encode());
                        }
                        // push the address for a later `execute`
                        BlobKind::Quotation => {
                            out.push(Cell::Lit(addr as i64).encode());
                        }
                        // plain 8-byte literals inline; larger images
                        // (strings, arrays) push their address
                        BlobKind::Data => {
                            let target = &self.arena[index];
                            if target.byte_len == 8 {
                                let value = target.cells[0] as i64;
                                if !Cell::fits_lit(value) {
                                    return Err(CompileError::link(format!(
                                        "stored literal {value} exceeds the 62-bit cell range"
                                    )));
                                }
                                out.push(Cell::Lit(value).encode());
                            } else {
                                out.push(Cell::Lit(addr as i64).encode());
                            }
                        }
                    }
                }
            }
        }
        out.push(EXIT);
        Ok(out.into_boxed_slice())
    }
}

/// Copy raw data bytes into an 8-byte-aligned buffer, zero padded.
fn data_blob(bytes: &[u8]) -> LoadedBlob {
    let words = bytes.len().div_ceil(8);
    let mut cells = vec![0u64; words.max(1)];
    // view the u64 buffer as bytes for the copy
    let dst = cells.as_mut_ptr() as *mut u8;
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
    }
    LoadedBlob {
        cells: cells.into_boxed_slice(),
        byte_len: bytes.len(),
    }
}
