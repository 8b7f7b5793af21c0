//! Blob tag streams
//!
//! A blob of kind WORD or QUOTATION is a variable-length stream of 16-bit
//! little-endian tags. Bit 0 distinguishes the two tag shapes:
//!
//! ```text
//! tag bit 0 = 0: primitive; upper 15 bits = primitive ID.
//!                ID 0 (PRIM_LIT) is the inline-literal marker: the next
//!                8 bytes are a little-endian i64.
//! tag bit 0 = 1: CID reference; upper 15 bits = the referenced blob's
//!                kind; the next 32 bytes are the binary CID.
//! ```
//!
//! Every element decodes to exactly one runtime cell, so branch offsets
//! counted in cells agree between the legacy cell buffer and this stream.

use crate::cid::Cid;
use crate::prims::PRIM_LIT;

/// Blob kind identifiers, stable in the persisted store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobKind {
    /// Assembly primitive (never stored by CID; referenced by small ID).
    Primitive,
    /// User-defined word: a tag stream linked as a call target.
    Word,
    /// Quotation: a tag stream linked as a push-address target.
    Quotation,
    /// Literal data: raw serialized bytes.
    Data,
}

impl BlobKind {
    pub fn to_u16(self) -> u16 {
        match self {
            BlobKind::Primitive => 0,
            BlobKind::Word => 1,
            BlobKind::Quotation => 2,
            BlobKind::Data => 3,
        }
    }

    pub fn from_u16(raw: u16) -> Option<BlobKind> {
        match raw {
            0 => Some(BlobKind::Primitive),
            1 => Some(BlobKind::Word),
            2 => Some(BlobKind::Quotation),
            3 => Some(BlobKind::Data),
            _ => None,
        }
    }
}

impl std::fmt::Display for BlobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BlobKind::Primitive => "primitive",
            BlobKind::Word => "word",
            BlobKind::Quotation => "quotation",
            BlobKind::Data => "data",
        };
        write!(f, "{name}")
    }
}

/// Append-only tag stream writer.
#[derive(Debug, Clone, Default)]
pub struct BlobBuffer {
    bytes: Vec<u8>,
}

impl BlobBuffer {
    pub fn new() -> Self {
        BlobBuffer { bytes: Vec::new() }
    }

    fn push_tag(&mut self, tag: u16) {
        self.bytes.extend_from_slice(&tag.to_le_bytes());
    }

    /// Append a primitive reference. `id` must not be `PRIM_LIT`; inline
    /// literals go through [`BlobBuffer::push_inline_lit`].
    pub fn push_prim(&mut self, id: u16) {
        debug_assert_ne!(id, PRIM_LIT, "PRIM_LIT requires an 8-byte payload");
        debug_assert!(id < 0x8000);
        self.push_tag(id << 1);
    }

    /// Append an inline i64 literal (the reserved PRIM_LIT marker).
    pub fn push_inline_lit(&mut self, value: i64) {
        self.push_tag(PRIM_LIT << 1);
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a CID reference carrying the target blob's kind.
    pub fn push_cid_ref(&mut self, kind: BlobKind, cid: &Cid) {
        self.push_tag((kind.to_u16() << 1) | 1);
        self.bytes.extend_from_slice(cid.as_bytes());
    }

    /// Splice another stream onto the end of this one.
    pub fn extend_from(&mut self, other: &BlobBuffer) {
        self.bytes.extend_from_slice(&other.bytes);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One decoded tag-stream element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobTag {
    /// Primitive reference by stable ID.
    Prim(u16),
    /// Inline i64 literal (PRIM_LIT payload).
    InlineLit(i64),
    /// Reference to another blob. `kind` is the raw kind field from the
    /// tag; the loader validates it against [`BlobKind`].
    Ref { kind: u16, cid: Cid },
}

/// Tag stream decoding failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobStreamError {
    /// The stream ended inside a tag or payload.
    Truncated { offset: usize },
}

impl std::fmt::Display for BlobStreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobStreamError::Truncated { offset } => {
                write!(f, "truncated tag stream at byte offset {offset}")
            }
        }
    }
}

impl std::error::Error for BlobStreamError {}

/// Pull decoder over a tag stream.
pub struct TagReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> TagReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        TagReader { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], BlobStreamError> {
        let start = self.pos;
        let end = start
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(BlobStreamError::Truncated { offset: start })?;
        self.pos = end;
        Ok(&self.bytes[start..end])
    }

    /// Decode the next element, or `None` at a clean end of stream.
    pub fn next(&mut self) -> Result<Option<BlobTag>, BlobStreamError> {
        if self.pos == self.bytes.len() {
            return Ok(None);
        }

        let tag_bytes = self.take(2)?;
        let tag = u16::from_le_bytes([tag_bytes[0], tag_bytes[1]]);

        if tag & 1 == 0 {
            let id = tag >> 1;
            if id == PRIM_LIT {
                let payload = self.take(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(payload);
                Ok(Some(BlobTag::InlineLit(i64::from_le_bytes(raw))))
            } else {
                Ok(Some(BlobTag::Prim(id)))
            }
        } else {
            let kind = tag >> 1;
            let payload = self.take(32)?;
            // take() guarantees 32 bytes
            let cid = Cid::from_slice(payload).ok_or(BlobStreamError::Truncated {
                offset: self.pos,
            })?;
            Ok(Some(BlobTag::Ref { kind, cid }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(bytes: &[u8]) -> Result<Vec<BlobTag>, BlobStreamError> {
        let mut reader = TagReader::new(bytes);
        let mut out = Vec::new();
        while let Some(tag) = reader.next()? {
            out.push(tag);
        }
        Ok(out)
    }

    #[test]
    fn test_prim_roundtrip() {
        let mut buf = BlobBuffer::new();
        buf.push_prim(1);
        buf.push_prim(41);
        assert_eq!(
            read_all(buf.as_bytes()).unwrap(),
            vec![BlobTag::Prim(1), BlobTag::Prim(41)]
        );
    }

    #[test]
    fn test_inline_lit_roundtrip() {
        let mut buf = BlobBuffer::new();
        buf.push_inline_lit(-7);
        buf.push_inline_lit(i64::MAX);
        assert_eq!(
            read_all(buf.as_bytes()).unwrap(),
            vec![BlobTag::InlineLit(-7), BlobTag::InlineLit(i64::MAX)]
        );
    }

    #[test]
    fn test_cid_ref_roundtrip() {
        let cid = Cid::digest(b"payload");
        let mut buf = BlobBuffer::new();
        buf.push_cid_ref(BlobKind::Quotation, &cid);
        assert_eq!(
            read_all(buf.as_bytes()).unwrap(),
            vec![BlobTag::Ref {
                kind: BlobKind::Quotation.to_u16(),
                cid
            }]
        );
    }

    #[test]
    fn test_mixed_stream() {
        let cid = Cid::digest(b"five");
        let mut buf = BlobBuffer::new();
        buf.push_cid_ref(BlobKind::Data, &cid);
        buf.push_prim(1);
        buf.push_inline_lit(3);
        let tags = read_all(buf.as_bytes()).unwrap();
        assert_eq!(tags.len(), 3);
        assert_eq!(tags[1], BlobTag::Prim(1));
    }

    #[test]
    fn test_truncated_tag() {
        assert!(matches!(
            read_all(&[0x02]),
            Err(BlobStreamError::Truncated { .. })
        ));
    }

    #[test]
    fn test_truncated_inline_payload() {
        let mut buf = BlobBuffer::new();
        buf.push_inline_lit(99);
        let bytes = &buf.as_bytes()[..6];
        assert!(matches!(
            read_all(bytes),
            Err(BlobStreamError::Truncated { .. })
        ));
    }

    #[test]
    fn test_truncated_cid_payload() {
        let cid = Cid::digest(b"x");
        let mut buf = BlobBuffer::new();
        buf.push_cid_ref(BlobKind::Word, &cid);
        let bytes = &buf.as_bytes()[..20];
        assert!(matches!(
            read_all(bytes),
            Err(BlobStreamError::Truncated { .. })
        ));
    }

    #[test]
    fn test_kind_codes_are_stable() {
        assert_eq!(BlobKind::Primitive.to_u16(), 0);
        assert_eq!(BlobKind::Word.to_u16(), 1);
        assert_eq!(BlobKind::Quotation.to_u16(), 2);
        assert_eq!(BlobKind::Data.to_u16(), 3);
        assert_eq!(BlobKind::from_u16(4), None);
    }
}
