//! The content-addressed blob store
//!
//! Three logical tables keyed by binary CIDs: `blobs`, `type_signatures`,
//! and `words`. Inserts are idempotent (rewriting identical bytes never
//! creates a new entry) and a looked-up blob returns byte-identical
//! content. The on-disk transport is a bincode image of the whole store,
//! written atomically (temp file + rename); an in-memory store (no path)
//! serves tests and one-shot runs.

use crate::error::CompileError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use weft_core::{BlobKind, Cid};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobRecord {
    /// Raw blob kind code; see [`BlobKind`].
    pub kind: u8,
    pub sig_cid: Option<Cid>,
    pub bytes: Vec<u8>,
}

impl BlobRecord {
    pub fn blob_kind(&self) -> Option<BlobKind> {
        BlobKind::from_u16(self.kind as u16)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeSigRecord {
    pub inputs: String,
    pub outputs: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordRecord {
    pub namespace: String,
    pub def_cid: Cid,
    pub type_sig: String,
    pub is_primitive: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    blobs: HashMap<Cid, BlobRecord>,
    type_signatures: HashMap<Cid, TypeSigRecord>,
    words: HashMap<String, WordRecord>,
}

pub struct Store {
    path: Option<PathBuf>,
    data: StoreData,
}

impl Store {
    /// Open a store backed by `path`, loading the existing image if any.
    pub fn open(path: &Path) -> Result<Store, CompileError> {
        let data = if path.exists() {
            let bytes = std::fs::read(path)?;
            bincode::deserialize(&bytes).map_err(|e| {
                CompileError::io(format!("corrupt store image '{}': {e}", path.display()))
            })?
        } else {
            StoreData::default()
        };
        Ok(Store {
            path: Some(path.to_path_buf()),
            data,
        })
    }

    /// A store with no backing file.
    pub fn in_memory() -> Store {
        Store {
            path: None,
            data: StoreData::default(),
        }
    }

    /// Persist the store image. A no-op for in-memory stores. The image
    /// is written to a sibling temp file and renamed over the target so a
    /// torn write cannot corrupt an existing store.
    pub fn save(&self) -> Result<(), CompileError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = bincode::serialize(&self.data)
            .map_err(|e| CompileError::io(format!("cannot serialize store image: {e}")))?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        debug!(path = %path.display(), blobs = self.data.blobs.len(), "store saved");
        Ok(())
    }

    /// Intern a typed signature; CID = SHA-256(`inputs || "|" || outputs`).
    pub fn store_type_sig(&mut self, inputs: &str, outputs: &str) -> Cid {
        let mut keyed = Vec::with_capacity(inputs.len() + outputs.len() + 1);
        keyed.extend_from_slice(inputs.as_bytes());
        keyed.push(b'|');
        keyed.extend_from_slice(outputs.as_bytes());
        let cid = Cid::digest(&keyed);
        self.data.type_signatures.entry(cid).or_insert_with(|| TypeSigRecord {
            inputs: inputs.to_string(),
            outputs: outputs.to_string(),
        });
        cid
    }

    pub fn load_type_sig(&self, cid: &Cid) -> Option<&TypeSigRecord> {
        self.data.type_signatures.get(cid)
    }

    /// Insert a blob; CID = SHA-256 of its bytes. Duplicate inserts are
    /// no-ops. Referenced signatures must already be interned (write
    /// ordering is bottom-up over the dependency DAG).
    pub fn store_blob(
        &mut self,
        kind: BlobKind,
        sig_cid: Option<Cid>,
        bytes: Vec<u8>,
    ) -> Result<Cid, CompileError> {
        if let Some(sig) = &sig_cid
            && !self.data.type_signatures.contains_key(sig)
        {
            return Err(CompileError::io(format!(
                "blob references unknown signature {sig}"
            )));
        }
        let cid = Cid::digest(&bytes);
        self.data.blobs.entry(cid).or_insert_with(|| {
            debug!(%cid, %kind, len = bytes.len(), "blob stored");
            BlobRecord {
                kind: kind.to_u16() as u8,
                sig_cid,
                bytes,
            }
        });
        Ok(cid)
    }

    /// Shortcut for an 8-byte little-endian DATA blob under `-> type`.
    pub fn store_literal(&mut self, value: i64, ty: &str) -> Result<Cid, CompileError> {
        let sig_cid = self.store_type_sig("", ty);
        self.store_blob(BlobKind::Data, Some(sig_cid), value.to_le_bytes().to_vec())
    }

    pub fn load_blob(&self, cid: &Cid) -> Option<&BlobRecord> {
        self.data.blobs.get(cid)
    }

    pub fn get_blob_kind(&self, cid: &Cid) -> Option<BlobKind> {
        self.data.blobs.get(cid).and_then(|r| r.blob_kind())
    }

    /// Record a named word pointing at its definition blob.
    pub fn store_word(
        &mut self,
        name: &str,
        namespace: &str,
        def_cid: Cid,
        type_sig: &str,
        is_primitive: bool,
    ) {
        self.data.words.insert(
            name.to_string(),
            WordRecord {
                namespace: namespace.to_string(),
                def_cid,
                type_sig: type_sig.to_string(),
                is_primitive,
            },
        );
    }

    pub fn lookup_word(&self, name: &str) -> Option<&WordRecord> {
        self.data.words.get(name)
    }

    pub fn words(&self) -> impl Iterator<Item = (&String, &WordRecord)> {
        self.data.words.iter()
    }

    pub fn blob_count(&self) -> usize {
        self.data.blobs.len()
    }
}
