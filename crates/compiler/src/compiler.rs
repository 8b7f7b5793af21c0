//! One-pass compiler core
//!
//! The compiler walks the token stream once, tracking a compile-time
//! stack of `(type, slot)` entries that mirrors the runtime stack's
//! shape. Every construct is emitted twice, in step: into the legacy
//! cell buffer and into the blob tag stream (one cell per tag-stream
//! element, so branch offsets agree). Only the blob form is persisted;
//! the loader synthesizes cells from it at link time.
//!
//! Quotations are captured as raw token lists between `(` and `)` and
//! compiled when an immediate word consumes them (or materialized as
//! standalone QUOTATION blobs when a non-immediate reference needs them
//! as values). Words with polymorphic declared signatures retain their
//! token lists and are monomorphized per concrete call context through
//! the session's specialization cache.

use crate::config::CompilerConfig;
use crate::dict::{DictEntry, Dictionary};
use crate::error::CompileError;
use crate::store::Store;
use crate::tokens::{Token, TokenKind, Tokenizer};
use crate::types::{StackEntry, TypeId, TypeSig, format_types, parse_type_list};
use crate::unify::{Bindings, match_input, resolve_output};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};
use weft_core::cells::{Cell, EXIT};
use weft_core::layout::{ARRAY_ELEM_SIZE, ELEM_SIZE_OFFSET, ELEM_TYPE_OFFSET, HEADER_SIZE, PAYLOAD_OFFSET, STRING_ELEM_SIZE};
use weft_core::prims::*;
use weft_core::{BlobBuffer, BlobKind, Cid};

/// A compiled, typed code fragment: the dual cell/blob encodings plus the
/// stack shapes at its boundary. Fragments carry no EXIT.
#[derive(Debug, Clone)]
pub(crate) struct Fragment {
    pub cells: Vec<u64>,
    pub blob: BlobBuffer,
    pub inputs: Vec<StackEntry>,
    pub outputs: Vec<StackEntry>,
}

/// A deferred code value between `(` and the immediate word (or
/// materialization point) that consumes it.
#[derive(Debug, Clone)]
pub(crate) enum Quot {
    /// Captured tokens awaiting a type context.
    Literal {
        tokens: Vec<Token>,
        inputs: Vec<StackEntry>,
    },
    /// Already compiled under a concrete context.
    Typed(Fragment),
}

/// Session-scoped memo of monomorphizations, keyed by word name and the
/// concrete input-type vector.
#[derive(Default)]
pub struct SpecCache {
    map: HashMap<(String, Vec<TypeId>), Cid>,
    in_progress: HashSet<(String, Vec<TypeId>)>,
}

impl SpecCache {
    pub fn new() -> Self {
        SpecCache::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, name: &str, inputs: &[TypeId]) -> Option<Cid> {
        // borrow-friendly probe without building an owned key
        self.map
            .iter()
            .find(|((n, i), _)| n == name && i.as_slice() == inputs)
            .map(|(_, &cid)| cid)
    }
}

/// Heap-slot bookkeeping for the word under compilation.
#[derive(Debug, Clone, Copy, Default)]
struct SlotState {
    freed: bool,
    transferred: bool,
}

/// Saved compiler state around a fragment or specialization compile.
struct Frame {
    cells: Vec<u64>,
    blob: BlobBuffer,
    type_stack: Vec<StackEntry>,
    quots: Vec<Quot>,
    array_marks: Vec<usize>,
    slots: Option<Vec<SlotState>>,
    capture_depth: usize,
}

pub struct Compiler<'a> {
    dict: &'a mut Dictionary,
    store: &'a mut Store,
    cache: &'a mut SpecCache,
    dispatch: [u64; DISPATCH_TABLE_SIZE],
    config: CompilerConfig,

    type_stack: Vec<StackEntry>,
    cells: Vec<u64>,
    blob: BlobBuffer,
    quots: Vec<Quot>,
    /// Paren nesting while capturing a literal quotation; 0 = compiling.
    capture_depth: usize,
    array_marks: Vec<usize>,
    slots: Vec<SlotState>,

    current_word: Option<String>,
    last_pos: Option<(usize, usize)>,
}

impl<'a> Compiler<'a> {
    pub fn new(
        dict: &'a mut Dictionary,
        store: &'a mut Store,
        cache: &'a mut SpecCache,
        dispatch: [u64; DISPATCH_TABLE_SIZE],
        config: CompilerConfig,
    ) -> Self {
        Compiler {
            dict,
            store,
            cache,
            dispatch,
            config,
            type_stack: Vec::new(),
            cells: Vec::new(),
            blob: BlobBuffer::new(),
            quots: Vec::new(),
            capture_depth: 0,
            array_marks: Vec::new(),
            slots: Vec::new(),
            current_word: None,
            last_pos: None,
        }
    }

    /// Attach the best-known source context to an error.
    fn ctx(&self, err: CompileError) -> CompileError {
        let err = match self.last_pos {
            Some((line, column)) => err.at(line, column),
            None => err,
        };
        match &self.current_word {
            Some(word) => err.in_word(word),
            None => err,
        }
    }

    // ------------------------------------------------------------------
    // Top level
    // ------------------------------------------------------------------

    /// Compile a whole compilation unit: a sequence of `$ sig ;` type
    /// declarations and `: name ... ;` definitions.
    pub fn compile_source(&mut self, source: &str) -> Result<(), CompileError> {
        let mut tz = Tokenizer::new(source);
        while let Some(tok) = tz.next()? {
            self.last_pos = Some((tok.line, tok.column));
            match tok.kind {
                TokenKind::Colon => self.compile_definition(&mut tz)?,
                TokenKind::Dollar => self.compile_type_decl(&mut tz)?,
                _ => {
                    return Err(self.ctx(CompileError::parse(format!(
                        "top-level expressions are not supported (unexpected '{}')",
                        tok.text
                    ))));
                }
            }
        }
        Ok(())
    }

    /// `$ sig ;` - persist a typed signature.
    fn compile_type_decl(&mut self, tz: &mut Tokenizer) -> Result<(), CompileError> {
        let tokens = self.collect_until_semicolon(tz, "type declaration")?;
        let sig = TypeSig::parse_tokens(tokens.iter().map(|t| t.text.as_str()))
            .map_err(|e| self.ctx(e))?;
        let cid = self
            .store
            .store_type_sig(&sig.input_string(), &sig.output_string());
        debug!(%cid, sig = %sig, "type signature declared");
        Ok(())
    }

    fn collect_until_semicolon(
        &mut self,
        tz: &mut Tokenizer,
        what: &str,
    ) -> Result<Vec<Token>, CompileError> {
        let mut out = Vec::new();
        loop {
            match tz.next()? {
                Some(tok) if tok.kind == TokenKind::Semicolon => return Ok(out),
                Some(tok) => out.push(tok),
                None => {
                    return Err(self.ctx(CompileError::parse(format!(
                        "unexpected end of file in {what}"
                    ))));
                }
            }
        }
    }

    /// `: name [sig ;] body ;`
    fn compile_definition(&mut self, tz: &mut Tokenizer) -> Result<(), CompileError> {
        let name_tok = tz.next()?.ok_or_else(|| {
            self.ctx(CompileError::parse("expected word name after ':'"))
        })?;
        if name_tok.kind != TokenKind::Word {
            return Err(self.ctx(CompileError::parse(format!(
                "expected word name after ':', got '{}'",
                name_tok.text
            ))));
        }
        let name = name_tok.text.clone();

        let first = self.collect_until_semicolon(tz, &format!("definition '{name}'"))?;
        let has_arrow = first
            .iter()
            .any(|t| t.kind == TokenKind::Word && (t.text == "->" || t.text == "→"));

        let (declared, body) = if has_arrow {
            let sig = TypeSig::parse_tokens(first.iter().map(|t| t.text.as_str()))
                .map_err(|e| self.ctx(e).in_word(&name))?;
            let body = self.collect_until_semicolon(tz, &format!("definition '{name}'"))?;
            (Some(sig), body)
        } else {
            (None, first)
        };

        self.current_word = Some(name.clone());
        let result = self.compile_definition_body(&name, declared, body);
        self.current_word = None;
        result
    }

    fn compile_definition_body(
        &mut self,
        name: &str,
        declared: Option<TypeSig>,
        body: Vec<Token>,
    ) -> Result<(), CompileError> {
        match declared {
            Some(sig) if !sig.is_concrete() => {
                // token-only word: monomorphized per concrete call context
                debug!(word = name, sig = %sig, tokens = body.len(), "retained for specialization");
                self.dict.add(DictEntry::lazy_word(name, sig, body));
                Ok(())
            }
            Some(sig) => {
                let inputs: Vec<StackEntry> =
                    sig.inputs.iter().map(|&ty| StackEntry::plain(ty)).collect();
                let mut frag = self.compile_fragment(&body, inputs, true)?;
                frag.cells.push(EXIT);
                let out_types: Vec<TypeId> = frag.outputs.iter().map(|e| e.ty).collect();
                if out_types != sig.outputs {
                    return Err(self.ctx(CompileError::type_error(format!(
                        "definition leaves '{}' on the stack, but its signature declares '{}'",
                        format_types(&out_types),
                        format_types(&sig.outputs)
                    ))));
                }
                self.persist_word(name, &sig.inputs, &out_types, frag)
            }
            None => {
                // the original behavior: compile from an empty stack and
                // infer `-> outputs`
                let mut frag = self.compile_fragment(&body, Vec::new(), true)?;
                frag.cells.push(EXIT);
                let out_types: Vec<TypeId> = frag.outputs.iter().map(|e| e.ty).collect();
                self.persist_word(name, &[], &out_types, frag)
            }
        }
    }

    fn persist_word(
        &mut self,
        name: &str,
        in_types: &[TypeId],
        out_types: &[TypeId],
        frag: Fragment,
    ) -> Result<(), CompileError> {
        let sig = TypeSig {
            inputs: in_types.to_vec(),
            outputs: out_types.to_vec(),
        };
        let sig_cid = self
            .store
            .store_type_sig(&sig.input_string(), &sig.output_string());
        let cells = frag.cells.len();
        let cid = self
            .store
            .store_blob(BlobKind::Word, Some(sig_cid), frag.blob.into_bytes())
            .map_err(|e| self.ctx(e))?;
        self.store
            .store_word(name, "user", cid, &sig.to_string(), false);
        self.dict.add(DictEntry::word(name, cid, sig.clone()));
        info!(word = name, %cid, cells, sig = %sig, "word compiled");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Fragments and frames
    // ------------------------------------------------------------------

    fn push_frame(&mut self, inputs: Vec<StackEntry>, fresh_slots: bool) -> Frame {
        Frame {
            cells: std::mem::take(&mut self.cells),
            blob: std::mem::take(&mut self.blob),
            type_stack: std::mem::replace(&mut self.type_stack, inputs),
            quots: std::mem::take(&mut self.quots),
            array_marks: std::mem::take(&mut self.array_marks),
            slots: fresh_slots.then(|| std::mem::take(&mut self.slots)),
            capture_depth: std::mem::take(&mut self.capture_depth),
        }
    }

    fn pop_frame(&mut self, frame: Frame) -> (Vec<u64>, BlobBuffer, Vec<StackEntry>) {
        let cells = std::mem::replace(&mut self.cells, frame.cells);
        let blob = std::mem::replace(&mut self.blob, frame.blob);
        let outputs = std::mem::replace(&mut self.type_stack, frame.type_stack);
        self.quots = frame.quots;
        self.array_marks = frame.array_marks;
        if let Some(slots) = frame.slots {
            self.slots = slots;
        }
        self.capture_depth = frame.capture_depth;
        (cells, blob, outputs)
    }

    /// Compile a token list under a given input stack. With `fresh_slots`
    /// the fragment owns its own slot table (standalone code: definitions,
    /// specializations, materialized quotations) and settles it at the
    /// end; without, slots stay in the enclosing word's table (inlined
    /// code: `if`/`times` bodies).
    fn compile_fragment(
        &mut self,
        tokens: &[Token],
        inputs: Vec<StackEntry>,
        fresh_slots: bool,
    ) -> Result<Fragment, CompileError> {
        let frame = self.push_frame(inputs.clone(), fresh_slots);
        let result = (|| -> Result<(), CompileError> {
            for tok in tokens {
                self.compile_token(tok.clone())?;
            }
            if self.capture_depth > 0 {
                return Err(self.ctx(CompileError::parse("unterminated quotation")));
            }
            if !self.array_marks.is_empty() {
                return Err(self.ctx(CompileError::parse("unmatched '['")));
            }
            self.materialize_quotations()?;
            if fresh_slots {
                self.settle_slots();
            }
            Ok(())
        })();
        let (cells, blob, outputs) = self.pop_frame(frame);
        result?;
        Ok(Fragment {
            cells,
            blob,
            inputs,
            outputs,
        })
    }

    /// Warn about slots that are neither freed, transferred, nor on the
    /// final stack. Under the transfer rules this should not happen; a
    /// warning here means a value was lost without a matching `free`.
    fn settle_slots(&mut self) {
        for (id, state) in self.slots.iter().enumerate() {
            if state.freed || state.transferred {
                continue;
            }
            if !self
                .type_stack
                .iter()
                .any(|e| e.slot == Some(id as u32))
            {
                warn!(
                    slot = id,
                    word = self.current_word.as_deref().unwrap_or("?"),
                    "heap slot leaked at definition exit"
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Token dispatch
    // ------------------------------------------------------------------

    pub(crate) fn compile_token(&mut self, tok: Token) -> Result<(), CompileError> {
        self.last_pos = Some((tok.line, tok.column));

        if self.capture_depth > 0 {
            return self.capture_token(tok);
        }

        match tok.kind {
            TokenKind::Number(value) => self.compile_number(value),
            TokenKind::Str(ref s) => {
                let s = s.clone();
                self.compile_string(&s)
            }
            TokenKind::Word => self.compile_word_ref(&tok),
            TokenKind::LParen => self.open_quotation(),
            TokenKind::RParen => {
                Err(self.ctx(CompileError::parse("unmatched ')'")))
            }
            TokenKind::LBracket => self.open_array(),
            TokenKind::RBracket => self.close_array(),
            TokenKind::Colon => {
                Err(self.ctx(CompileError::parse("nested definitions are not supported")))
            }
            TokenKind::Semicolon => Err(self.ctx(CompileError::parse("unexpected ';'"))),
            TokenKind::Dollar => Err(self.ctx(CompileError::parse("unexpected '$'"))),
        }
    }

    /// Append a token to the literal quotation under capture, tracking
    /// paren nesting. The closing `)` of the outermost level ends capture;
    /// the type stack was never touched, so nothing to restore.
    fn capture_token(&mut self, tok: Token) -> Result<(), CompileError> {
        match tok.kind {
            TokenKind::LParen => {
                self.capture_depth += 1;
                self.push_captured(tok)
            }
            TokenKind::RParen => {
                self.capture_depth -= 1;
                if self.capture_depth == 0 {
                    Ok(())
                } else {
                    self.push_captured(tok)
                }
            }
            _ => self.push_captured(tok),
        }
    }

    fn push_captured(&mut self, tok: Token) -> Result<(), CompileError> {
        match self.quots.last_mut() {
            Some(Quot::Literal { tokens, .. }) => {
                tokens.push(tok);
                Ok(())
            }
            _ => Err(self.ctx(CompileError::stack(
                "no quotation under capture (compiler invariant broken)",
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Literals
    // ------------------------------------------------------------------

    /// Emit a number literal: a DATA blob reference in the stream, a
    /// `Lit` cell in the legacy buffer.
    pub(crate) fn compile_number(&mut self, value: i64) -> Result<(), CompileError> {
        if !Cell::fits_lit(value) {
            return Err(self.ctx(CompileError::lex(format!(
                "literal {value} exceeds the 62-bit cell range"
            ))));
        }
        self.cells.push(Cell::Lit(value).encode());
        let cid = self
            .store
            .store_literal(value, "i64")
            .map_err(|e| self.ctx(e))?;
        self.blob.push_cid_ref(BlobKind::Data, &cid);
        debug!(value, "literal");
        self.push_entry(StackEntry::plain(TypeId::I64))
    }

    /// Emit a string literal: the full heap image (header + NUL-terminated
    /// UTF-8) as a DATA blob. The loader owns the buffer, so the value
    /// carries no slot.
    fn compile_string(&mut self, text: &str) -> Result<(), CompileError> {
        let image = string_image(text);
        let sig_cid = self.store.store_type_sig("", "str");
        let cid = self
            .store
            .store_blob(BlobKind::Data, Some(sig_cid), image)
            .map_err(|e| self.ctx(e))?;
        // address-valued in the legacy buffer: placeholder until linked
        self.cells.push(Cell::Lit(0).encode());
        self.blob.push_cid_ref(BlobKind::Data, &cid);
        debug!(len = text.len(), %cid, "string literal");
        self.push_entry(StackEntry::plain(TypeId::Str))
    }

    // ------------------------------------------------------------------
    // Word references
    // ------------------------------------------------------------------

    fn compile_word_ref(&mut self, tok: &Token) -> Result<(), CompileError> {
        let name = tok.text.as_str();

        let Some(head) = self.dict.lookup(name) else {
            return Err(self.ctx(CompileError::type_error(format!("unknown word '{name}'"))));
        };
        if head.is_immediate {
            let handler = head.immediate.ok_or_else(|| {
                self.ctx(CompileError::type_error(format!(
                    "immediate word '{name}' has no handler"
                )))
            })?;
            return handler.compile(self);
        }

        // a plain reference turns pending quotations into values first
        self.materialize_quotations()?;

        let entry = self
            .dict
            .lookup_typed(name, &self.type_stack)
            .ok_or_else(|| {
                self.ctx(CompileError::type_error(format!(
                    "no overload of '{}' matches stack ({})",
                    name,
                    format_types(
                        &self.type_stack.iter().map(|e| e.ty).collect::<Vec<_>>()
                    )
                )))
            })?
            .clone();

        if let Some(tokens) = entry.tokens.clone() {
            return self.monomorphize(name, &entry, &tokens);
        }

        self.apply_signature(&entry.sig)
            .map_err(|e| self.ctx(e).in_word(name))?;

        if entry.is_primitive {
            let id = entry.prim_id.ok_or_else(|| {
                self.ctx(CompileError::type_error(format!(
                    "primitive '{name}' has no ID"
                )))
            })?;
            self.emit_prim(id);
        } else {
            let cid = entry.cid.ok_or_else(|| {
                self.ctx(CompileError::type_error(format!(
                    "word '{name}' has no compiled body"
                )))
            })?;
            self.cells.push(Cell::Xt(0).encode()); // patched at link time
            self.blob.push_cid_ref(BlobKind::Word, &cid);
        }
        debug!(word = name, "reference");
        Ok(())
    }

    /// Apply a signature to the compile-time stack: unify inputs, pop
    /// them, push resolved outputs. Slots on consumed entries either
    /// carry through to a same-typed output or transfer to the callee;
    /// heap-typed outputs produced from nothing get fresh slots.
    pub(crate) fn apply_signature(&mut self, sig: &TypeSig) -> Result<(), CompileError> {
        let n = sig.inputs.len();
        if self.type_stack.len() < n {
            return Err(CompileError::stack(format!(
                "needs {} input(s), stack has {}",
                n,
                self.type_stack.len()
            )));
        }
        let base = self.type_stack.len() - n;

        let mut bindings = Bindings::new();
        for (i, &expected) in sig.inputs.iter().enumerate() {
            let actual = self.type_stack[base + i].ty;
            if !match_input(expected, actual, &mut bindings) {
                return Err(CompileError::type_error(format!(
                    "input {} expects '{expected}', stack has '{actual}'",
                    i + 1
                )));
            }
        }

        let consumed = self.type_stack.split_off(base);
        let mut out_entries: Vec<StackEntry> = sig
            .outputs
            .iter()
            .map(|&t| StackEntry::plain(resolve_output(t, &bindings)))
            .collect();

        // carry each consumed slot into the first same-typed free output
        for entry in &consumed {
            let Some(slot) = entry.slot else { continue };
            let mut carried = false;
            for out in out_entries.iter_mut() {
                if out.slot.is_none() && out.ty == entry.ty {
                    out.slot = Some(slot);
                    carried = true;
                    break;
                }
            }
            if !carried && !self.slot_on_stack(slot) {
                self.mark_transferred(slot);
            }
        }

        for out in out_entries.iter_mut() {
            if out.slot.is_none() && out.ty.is_heap() {
                out.slot = Some(self.alloc_slot());
            }
        }
        for out in out_entries {
            self.push_entry(out)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Monomorphization
    // ------------------------------------------------------------------

    /// Compile a retained-token word for the concrete input types on the
    /// stack, through the specialization cache, and emit a call to the
    /// specialized blob.
    fn monomorphize(
        &mut self,
        name: &str,
        entry: &DictEntry,
        tokens: &[Token],
    ) -> Result<(), CompileError> {
        let n = entry.sig.inputs.len();
        if self.type_stack.len() < n {
            return Err(self.ctx(CompileError::stack(format!(
                "'{name}' needs {} input(s), stack has {}",
                n,
                self.type_stack.len()
            ))));
        }
        let base = self.type_stack.len() - n;
        let args: Vec<TypeId> = self.type_stack[base..].iter().map(|e| e.ty).collect();

        if args.contains(&TypeId::Unknown) {
            return Err(self.ctx(CompileError::type_error(format!(
                "cannot specialize '{name}': input types are unknown ({})",
                format_types(&args)
            ))));
        }

        // the declared signature still has to admit these inputs
        let mut bindings = Bindings::new();
        for (&expected, &actual) in entry.sig.inputs.iter().zip(&args) {
            if !match_input(expected, actual, &mut bindings) {
                return Err(self.ctx(CompileError::type_error(format!(
                    "'{name}' declared '{}' does not accept ({})",
                    entry.sig,
                    format_types(&args)
                ))));
            }
        }

        let key = (name.to_string(), args.clone());
        let (cid, out_types) = match self.cache.map.get(&key).copied() {
            Some(cid) => {
                let outs = self.specialization_outputs(name, &cid)?;
                debug!(word = name, inputs = %format_types(&args), %cid, "specialization cache hit");
                (cid, outs)
            }
            None => {
                if self.cache.map.len() >= self.config.spec_cache_capacity {
                    return Err(self.ctx(CompileError::resource(format!(
                        "specialization cache full ({} entries)",
                        self.cache.map.len()
                    ))));
                }
                if !self.cache.in_progress.insert(key.clone()) {
                    return Err(self.ctx(CompileError::type_error(format!(
                        "recursive specialization of '{name}'"
                    ))));
                }
                let inputs: Vec<StackEntry> =
                    args.iter().map(|&ty| StackEntry::plain(ty)).collect();
                let result = self.compile_fragment(tokens, inputs, true);
                self.cache.in_progress.remove(&key);
                let mut frag = result?;
                frag.cells.push(EXIT);

                let outs: Vec<TypeId> = frag.outputs.iter().map(|e| e.ty).collect();
                let sig_cid = self
                    .store
                    .store_type_sig(&format_types(&args), &format_types(&outs));
                let cid = self
                    .store
                    .store_blob(BlobKind::Word, Some(sig_cid), frag.blob.into_bytes())
                    .map_err(|e| self.ctx(e))?;
                self.cache.map.insert(key, cid);
                info!(word = name, inputs = %format_types(&args), outputs = %format_types(&outs), %cid, "specialized");
                (cid, outs)
            }
        };

        // consume the inputs; the callee owns any slots it swallowed
        let consumed = self.type_stack.split_off(base);
        for entry in &consumed {
            if let Some(slot) = entry.slot
                && !self.slot_on_stack(slot)
            {
                self.mark_transferred(slot);
            }
        }
        for ty in out_types {
            let slot = ty.is_heap().then(|| self.alloc_slot());
            self.push_entry(StackEntry { ty, slot })?;
        }

        self.cells.push(Cell::Xt(0).encode());
        self.blob.push_cid_ref(BlobKind::Word, &cid);
        Ok(())
    }

    /// Output types of a cached specialization, read back from its stored
    /// signature.
    fn specialization_outputs(
        &self,
        name: &str,
        cid: &Cid,
    ) -> Result<Vec<TypeId>, CompileError> {
        let record = self.store.load_blob(cid).ok_or_else(|| {
            CompileError::io(format!("specialization blob for '{name}' missing"))
        })?;
        let sig_cid = record.sig_cid.as_ref().ok_or_else(|| {
            CompileError::io(format!("specialization of '{name}' has no signature"))
        })?;
        let sig = self.store.load_type_sig(sig_cid).ok_or_else(|| {
            CompileError::io(format!("signature {sig_cid} missing from store"))
        })?;
        parse_type_list(&sig.outputs)
    }

    // ------------------------------------------------------------------
    // Quotations
    // ------------------------------------------------------------------

    fn open_quotation(&mut self) -> Result<(), CompileError> {
        if self.quots.len() >= self.config.max_quotation_depth {
            return Err(self.ctx(CompileError::resource(format!(
                "quotation nesting exceeds {}",
                self.config.max_quotation_depth
            ))));
        }
        self.quots.push(Quot::Literal {
            tokens: Vec::new(),
            inputs: self.type_stack.clone(),
        });
        self.capture_depth = 1;
        Ok(())
    }

    /// Turn every pending quotation into a runtime value: compile it
    /// under its captured input shape, persist it as a QUOTATION blob,
    /// and push its address type. Oldest first, so runtime push order
    /// matches source order.
    pub(crate) fn materialize_quotations(&mut self) -> Result<(), CompileError> {
        if self.quots.is_empty() {
            return Ok(());
        }
        let pending: Vec<Quot> = self.quots.drain(..).collect();
        for quot in pending {
            let frag = match quot {
                Quot::Literal { tokens, inputs } => {
                    // a standalone value: compiled with its own slot table,
                    // slot-free seed entries
                    let seed: Vec<StackEntry> = inputs
                        .iter()
                        .map(|e| StackEntry::plain(e.ty))
                        .collect();
                    let mut frag = self.compile_fragment(&tokens, seed, true)?;
                    frag.cells.push(EXIT);
                    frag
                }
                Quot::Typed(frag) => frag,
            };
            let in_types: Vec<TypeId> = frag.inputs.iter().map(|e| e.ty).collect();
            let out_types: Vec<TypeId> = frag.outputs.iter().map(|e| e.ty).collect();
            let sig_cid = self
                .store
                .store_type_sig(&format_types(&in_types), &format_types(&out_types));
            let cid = self
                .store
                .store_blob(BlobKind::Quotation, Some(sig_cid), frag.blob.into_bytes())
                .map_err(|e| self.ctx(e))?;
            self.cells.push(Cell::Lit(0).encode()); // address patched at link
            self.blob.push_cid_ref(BlobKind::Quotation, &cid);
            debug!(%cid, inputs = %format_types(&in_types), outputs = %format_types(&out_types), "quotation materialized");
            self.push_entry(StackEntry::plain(TypeId::Ptr))?;
        }
        Ok(())
    }

    /// Compile a pending quotation under `ctx` for inlining; shares the
    /// enclosing word's slot table.
    fn inline_fragment(
        &mut self,
        quot: Quot,
        ctx: &[StackEntry],
    ) -> Result<Fragment, CompileError> {
        match quot {
            Quot::Literal { tokens, .. } => {
                self.compile_fragment(&tokens, ctx.to_vec(), false)
            }
            Quot::Typed(frag) => {
                let frag_types: Vec<TypeId> = frag.inputs.iter().map(|e| e.ty).collect();
                let ctx_types: Vec<TypeId> = ctx.iter().map(|e| e.ty).collect();
                if frag_types != ctx_types {
                    return Err(self.ctx(CompileError::type_error(format!(
                        "quotation compiled for ({}) used under ({})",
                        format_types(&frag_types),
                        format_types(&ctx_types)
                    ))));
                }
                Ok(frag)
            }
        }
    }

    /// Slots produced inside a fragment whose outputs are not kept on the
    /// live stack are the runtime's to reclaim; stop tracking them.
    fn release_fragment_slots(&mut self, outputs: &[StackEntry]) {
        for entry in outputs {
            if let Some(slot) = entry.slot
                && !self.slot_on_stack(slot)
            {
                self.mark_transferred(slot);
            }
        }
    }

    // ------------------------------------------------------------------
    // Immediate words
    // ------------------------------------------------------------------

    /// `flag ( true-branch ) ( false-branch ) if`
    pub(crate) fn compile_if(&mut self) -> Result<(), CompileError> {
        let (false_q, true_q) = match (self.quots.pop(), self.quots.pop()) {
            (Some(f), Some(t)) => (f, t),
            _ => {
                return Err(self.ctx(CompileError::stack(
                    "'if' requires two quotations: ( true ) ( false )",
                )));
            }
        };

        let flag = self.pop_entry("if")?;
        if !flag_shaped(flag.ty) {
            return Err(self.ctx(CompileError::type_error(format!(
                "'if' needs a boolean flag, stack has '{}'",
                flag.ty
            ))));
        }

        let ctx = self.type_stack.clone();
        let true_frag = self.inline_fragment(true_q, &ctx)?;
        let false_frag = self.inline_fragment(false_q, &ctx)?;

        let true_out: Vec<TypeId> = true_frag.outputs.iter().map(|e| e.ty).collect();
        let false_out: Vec<TypeId> = false_frag.outputs.iter().map(|e| e.ty).collect();
        if true_out != false_out {
            return Err(self.ctx(CompileError::type_error(format!(
                "'if' branches disagree: ({}) vs ({})",
                format_types(&true_out),
                format_types(&false_out)
            ))));
        }

        // [0branch skip-true] true-body [branch skip-false] false-body
        let t_len = true_frag.cells.len() as i64;
        let f_len = false_frag.cells.len() as i64;
        let true_outputs = true_frag.outputs.clone();
        let false_outputs = false_frag.outputs.clone();
        self.emit_prim(PRIM_0BRANCH);
        self.emit_inline_lit(t_len + 2);
        self.splice(true_frag);
        self.emit_prim(PRIM_BRANCH);
        self.emit_inline_lit(f_len);
        self.splice(false_frag);

        // only one branch runs; keep the true branch's shape, release the
        // other branch's allocations from tracking
        self.type_stack = true_outputs;
        self.release_fragment_slots(&false_outputs);
        Ok(())
    }

    /// `count ( body ) times` or `( cond ) ( body ) times`
    pub(crate) fn compile_times(&mut self) -> Result<(), CompileError> {
        match self.quots.len() {
            0 => Err(self.ctx(CompileError::stack(
                "'times' requires a quotation",
            ))),
            1 => self.compile_counted_times(),
            _ => self.compile_while_times(),
        }
    }

    fn compile_counted_times(&mut self) -> Result<(), CompileError> {
        let Some(body_q) = self.quots.pop() else {
            return Err(self.ctx(CompileError::stack("'times' requires a quotation")));
        };
        let count = self.pop_entry("times")?;
        if !matches!(
            count.ty,
            TypeId::I64 | TypeId::U64 | TypeId::Any | TypeId::Unknown
        ) {
            return Err(self.ctx(CompileError::type_error(format!(
                "'times' count must be an integer, stack has '{}'",
                count.ty
            ))));
        }

        let ctx = self.type_stack.clone();
        let body = self.inline_fragment(body_q, &ctx)?;
        let b = body.cells.len() as i64;

        // count >r
        // L: r@ 0branch(exit)  r> 1 - >r  body  branch(L)
        // exit: rdrop
        self.emit_prim(PRIM_TOR);
        self.emit_prim(PRIM_RFETCH);
        self.emit_prim(PRIM_0BRANCH);
        self.emit_inline_lit(b + 6);
        self.emit_prim(PRIM_FROMR);
        self.emit_inline_lit(1);
        self.emit_prim(PRIM_SUB);
        self.emit_prim(PRIM_TOR);
        let body_outputs = body.outputs.clone();
        self.splice(body);
        self.emit_prim(PRIM_BRANCH);
        self.emit_inline_lit(-(9 + b));
        self.emit_prim(PRIM_RDROP);

        // the body's net effect does not leak into the outer shape
        self.type_stack = ctx;
        self.release_fragment_slots(&body_outputs);
        Ok(())
    }

    fn compile_while_times(&mut self) -> Result<(), CompileError> {
        let (body_q, cond_q) = match (self.quots.pop(), self.quots.pop()) {
            (Some(b), Some(c)) => (b, c),
            _ => {
                return Err(self.ctx(CompileError::stack(
                    "'times' requires ( cond ) ( body ) quotations",
                )));
            }
        };

        let ctx = self.type_stack.clone();
        let body = self.inline_fragment(body_q, &ctx)?;
        let cond = self.inline_fragment(cond_q, &body.outputs)?;

        let mut after = cond.outputs.clone();
        let flag = after.pop().ok_or_else(|| {
            self.ctx(CompileError::type_error(
                "loop condition must leave a flag on the stack",
            ))
        })?;
        if !flag_shaped(flag.ty) {
            return Err(self.ctx(CompileError::type_error(format!(
                "loop condition must leave a boolean flag, got '{}'",
                flag.ty
            ))));
        }

        // L: body cond 0branch(L)  - loops while the flag is zero
        let span = (body.cells.len() + cond.cells.len()) as i64;
        self.splice(body);
        self.splice(cond);
        self.emit_prim(PRIM_0BRANCH);
        self.emit_inline_lit(-(span + 2));

        self.type_stack = after.clone();
        self.release_fragment_slots(&after);
        Ok(())
    }

    pub(crate) fn compile_dup(&mut self) -> Result<(), CompileError> {
        let top = *self.peek_entry("dup")?;
        self.push_entry(top)?; // the copy shares the slot
        self.emit_prim(PRIM_DUP);
        Ok(())
    }

    /// `drop` of the last live reference to an owned allocation becomes a
    /// `free`; anything else is a plain runtime drop.
    pub(crate) fn compile_drop(&mut self) -> Result<(), CompileError> {
        let entry = self.pop_entry("drop")?;
        if let Some(slot) = entry.slot
            && !self.slot_on_stack(slot)
            && !self.slots[slot as usize].freed
            && !self.slots[slot as usize].transferred
        {
            self.emit_prim(PRIM_FREE);
            self.slots[slot as usize].freed = true;
            debug!(slot, "drop releases heap slot");
        } else {
            self.emit_prim(PRIM_DROP);
        }
        Ok(())
    }

    pub(crate) fn compile_swap(&mut self) -> Result<(), CompileError> {
        let len = self.type_stack.len();
        if len < 2 {
            return Err(self.ctx(CompileError::stack("'swap' needs two stack entries")));
        }
        self.type_stack.swap(len - 1, len - 2);
        self.emit_prim(PRIM_SWAP);
        Ok(())
    }

    pub(crate) fn compile_over(&mut self) -> Result<(), CompileError> {
        let len = self.type_stack.len();
        if len < 2 {
            return Err(self.ctx(CompileError::stack("'over' needs two stack entries")));
        }
        let under = self.type_stack[len - 2];
        self.push_entry(under)?;
        self.emit_prim(PRIM_OVER);
        Ok(())
    }

    pub(crate) fn compile_rot(&mut self) -> Result<(), CompileError> {
        let len = self.type_stack.len();
        if len < 3 {
            return Err(self.ctx(CompileError::stack("'rot' needs three stack entries")));
        }
        let third = self.type_stack.remove(len - 3);
        self.type_stack.push(third);
        self.emit_prim(PRIM_ROT);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Array literals
    // ------------------------------------------------------------------

    fn open_array(&mut self) -> Result<(), CompileError> {
        if self.array_marks.len() >= self.config.max_array_depth {
            return Err(self.ctx(CompileError::resource(format!(
                "array literal nesting exceeds {}",
                self.config.max_array_depth
            ))));
        }
        self.array_marks.push(self.type_stack.len());
        Ok(())
    }

    /// Lower `[ e0 .. eN-1 ]`: allocate `32 + N*8` bytes, write the
    /// header, stash the pointer on the return stack, store the elements
    /// back to front, recover the pointer.
    fn close_array(&mut self) -> Result<(), CompileError> {
        let mark = self
            .array_marks
            .pop()
            .ok_or_else(|| self.ctx(CompileError::parse("unmatched ']'")))?;
        if self.type_stack.len() < mark {
            return Err(self.ctx(CompileError::stack(
                "array literal consumed values below its opening '['",
            )));
        }
        let elems = self.type_stack.split_off(mark);
        let n = elems.len();

        if n == 0 {
            // bare header; alloc zeroes count and elem_type for us
            self.emit_inline_lit(HEADER_SIZE as i64);
            self.emit_prim(PRIM_ALLOC);
            self.emit_header_byte(ELEM_SIZE_OFFSET, ARRAY_ELEM_SIZE as i64);
        } else {
            let elem_ty = elems[0].ty;
            if let Some(bad) = elems.iter().find(|e| e.ty != elem_ty) {
                return Err(self.ctx(CompileError::type_error(format!(
                    "array elements must share one type, found '{elem_ty}' and '{}'",
                    bad.ty
                ))));
            }

            let total = HEADER_SIZE as i64 + (n as i64) * 8;
            self.emit_inline_lit(total);
            self.emit_prim(PRIM_ALLOC);
            // count
            self.emit_prim(PRIM_DUP);
            self.emit_inline_lit(n as i64);
            self.emit_prim(PRIM_SWAP);
            self.emit_prim(PRIM_STORE);
            self.emit_header_byte(ELEM_SIZE_OFFSET, ARRAY_ELEM_SIZE as i64);
            // element type tag
            self.emit_prim(PRIM_DUP);
            self.emit_inline_lit(ELEM_TYPE_OFFSET as i64);
            self.emit_prim(PRIM_ADD);
            self.emit_inline_lit(elem_ty.tag() as i64);
            self.emit_prim(PRIM_SWAP);
            self.emit_prim(PRIM_STORE);
            // pointer to the return stack, elements off the data stack
            self.emit_prim(PRIM_TOR);
            for i in (0..n).rev() {
                self.emit_prim(PRIM_RFETCH);
                self.emit_inline_lit((PAYLOAD_OFFSET + (i as u64) * 8) as i64);
                self.emit_prim(PRIM_ADD);
                self.emit_prim(PRIM_STORE);
            }
            self.emit_prim(PRIM_FROMR);

            // element values now live inside the array
            for entry in &elems {
                if let Some(slot) = entry.slot
                    && !self.slot_on_stack(slot)
                {
                    self.mark_transferred(slot);
                }
            }
        }

        let slot = self.alloc_slot();
        debug!(elements = n, slot, "array literal");
        self.push_entry(StackEntry {
            ty: TypeId::Array,
            slot: Some(slot),
        })
    }

    /// `dup <offset> + <value> swap c!` - write one header byte while the
    /// base pointer stays on the stack.
    fn emit_header_byte(&mut self, offset: u64, value: i64) {
        self.emit_prim(PRIM_DUP);
        self.emit_inline_lit(offset as i64);
        self.emit_prim(PRIM_ADD);
        self.emit_inline_lit(value);
        self.emit_prim(PRIM_SWAP);
        self.emit_prim(PRIM_CSTORE);
    }

    // ------------------------------------------------------------------
    // Emission and stack helpers
    // ------------------------------------------------------------------

    fn emit_prim(&mut self, id: u16) {
        let addr = self.dispatch[id as usize];
        self.cells.push(Cell::Xt(addr).encode());
        self.blob.push_prim(id);
    }

    fn emit_inline_lit(&mut self, value: i64) {
        self.cells.push(Cell::Lit(value).encode());
        self.blob.push_inline_lit(value);
    }

    fn splice(&mut self, frag: Fragment) {
        self.cells.extend(frag.cells);
        self.blob.extend_from(&frag.blob);
    }

    fn push_entry(&mut self, entry: StackEntry) -> Result<(), CompileError> {
        if self.type_stack.len() >= self.config.max_type_stack {
            return Err(self.ctx(CompileError::stack(format!(
                "type stack overflow (limit {})",
                self.config.max_type_stack
            ))));
        }
        self.type_stack.push(entry);
        Ok(())
    }

    fn pop_entry(&mut self, op: &str) -> Result<StackEntry, CompileError> {
        self.type_stack.pop().ok_or_else(|| {
            self.ctx(CompileError::stack(format!(
                "'{op}' on an empty stack"
            )))
        })
    }

    fn peek_entry(&self, op: &str) -> Result<&StackEntry, CompileError> {
        self.type_stack.last().ok_or_else(|| {
            self.ctx(CompileError::stack(format!(
                "'{op}' on an empty stack"
            )))
        })
    }

    fn slot_on_stack(&self, slot: u32) -> bool {
        self.type_stack.iter().any(|e| e.slot == Some(slot))
    }

    fn alloc_slot(&mut self) -> u32 {
        self.slots.push(SlotState::default());
        (self.slots.len() - 1) as u32
    }

    fn mark_transferred(&mut self, slot: u32) {
        self.slots[slot as usize].transferred = true;
    }
}

/// Types acceptable where a boolean flag is consumed.
fn flag_shaped(ty: TypeId) -> bool {
    matches!(
        ty,
        TypeId::Bool | TypeId::I64 | TypeId::Any | TypeId::Unknown
    )
}

/// Build the on-heap image of a string literal: 32-byte header plus
/// NUL-terminated UTF-8. `count` excludes the NUL.
fn string_image(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut image = Vec::with_capacity(HEADER_SIZE as usize + bytes.len() + 1);
    image.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    image.push(STRING_ELEM_SIZE);
    image.extend_from_slice(&[0u8; 7]);
    image.extend_from_slice(&0u64.to_le_bytes()); // elem_type: untyped bytes
    image.extend_from_slice(&0u64.to_le_bytes()); // reserved
    image.extend_from_slice(bytes);
    image.push(0);
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::register_primitives;
    use weft_core::TagReader;
    use weft_runtime::Engine;

    struct Fixture {
        dict: Dictionary,
        store: Store,
        cache: SpecCache,
        dispatch: [u64; DISPATCH_TABLE_SIZE],
        // keeps the primitive anchor addresses alive
        _engine: Engine,
    }

    fn fixture() -> Fixture {
        let mut dict = Dictionary::new();
        let mut engine = Engine::new();
        let dispatch = register_primitives(&mut dict, &mut engine).unwrap();
        Fixture {
            dict,
            store: Store::in_memory(),
            cache: SpecCache::new(),
            dispatch,
            _engine: engine,
        }
    }

    fn compile(fx: &mut Fixture, source: &str) -> Result<(), CompileError> {
        let mut compiler = Compiler::new(
            &mut fx.dict,
            &mut fx.store,
            &mut fx.cache,
            fx.dispatch,
            CompilerConfig::default(),
        );
        compiler.compile_source(source)
    }

    fn word_tags(fx: &Fixture, name: &str) -> Vec<weft_core::BlobTag> {
        let record = fx.store.lookup_word(name).unwrap();
        let blob = fx.store.load_blob(&record.def_cid).unwrap();
        let mut reader = TagReader::new(&blob.bytes);
        let mut tags = Vec::new();
        while let Some(tag) = reader.next().unwrap() {
            tags.push(tag);
        }
        tags
    }

    #[test]
    fn test_simple_definition_stores_word() {
        let mut fx = fixture();
        compile(&mut fx, ": five 5 ;").unwrap();

        let record = fx.store.lookup_word("five").unwrap();
        assert_eq!(record.type_sig, "-> i64");
        assert_eq!(record.namespace, "user");

        // one DATA reference, no trailing EXIT in the stream
        let tags = word_tags(&fx, "five");
        assert_eq!(tags.len(), 1);
        assert!(matches!(tags[0], weft_core::BlobTag::Ref { kind: 3, .. }));
    }

    #[test]
    fn test_word_calls_emit_cid_references() {
        let mut fx = fixture();
        compile(&mut fx, ": five 5 ; : ten 10 ; : fifteen five ten + ;").unwrap();

        let tags = word_tags(&fx, "fifteen");
        assert_eq!(tags.len(), 3);
        assert!(matches!(tags[0], weft_core::BlobTag::Ref { kind: 1, .. }));
        assert!(matches!(tags[1], weft_core::BlobTag::Ref { kind: 1, .. }));
        assert_eq!(tags[2], weft_core::BlobTag::Prim(PRIM_ADD));
    }

    #[test]
    fn test_identical_literals_share_one_blob() {
        let mut fx = fixture();
        compile(&mut fx, ": a 7 ; : b 7 ;").unwrap();
        let (ta, tb) = (word_tags(&fx, "a"), word_tags(&fx, "b"));
        assert_eq!(ta, tb);
    }

    #[test]
    fn test_true_false_are_data_literals() {
        let mut fx = fixture();
        compile(&mut fx, ": flags true false ;").unwrap();
        let tags = word_tags(&fx, "flags");
        assert_eq!(tags.len(), 2);
        let record = fx.store.lookup_word("flags").unwrap();
        assert_eq!(record.type_sig, "-> i64 i64");
    }

    #[test]
    fn test_if_emits_branch_skeleton() {
        let mut fx = fixture();
        compile(&mut fx, ": pick 1 ( 42 ) ( 99 ) if ;").unwrap();
        let tags = word_tags(&fx, "pick");
        // LIT(1) 0branch off true branch off false
        assert!(matches!(tags[0], weft_core::BlobTag::Ref { kind: 3, .. }));
        assert_eq!(tags[1], weft_core::BlobTag::Prim(PRIM_0BRANCH));
        assert_eq!(tags[2], weft_core::BlobTag::InlineLit(3));
        assert!(matches!(tags[3], weft_core::BlobTag::Ref { kind: 3, .. }));
        assert_eq!(tags[4], weft_core::BlobTag::Prim(PRIM_BRANCH));
        assert_eq!(tags[5], weft_core::BlobTag::InlineLit(1));
        assert!(matches!(tags[6], weft_core::BlobTag::Ref { kind: 3, .. }));
        assert_eq!(tags.len(), 7);
    }

    #[test]
    fn test_if_branch_type_mismatch() {
        let mut fx = fixture();
        let err = compile(&mut fx, ": bad 1 ( 42 ) ( \"x\" ) if ;").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Type);
        assert!(err.message.contains("disagree"));
    }

    #[test]
    fn test_if_without_flag_underflows() {
        let mut fx = fixture();
        let err = compile(&mut fx, ": bad ( 1 ) ( 2 ) if ;").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Stack);
    }

    #[test]
    fn test_counted_times_layout() {
        let mut fx = fixture();
        compile(&mut fx, ": sum10 0 10 ( i0 + ) times ;").unwrap();
        let tags = word_tags(&fx, "sum10");
        // LIT(0) LIT(10) >r r@ 0branch +8 r> 1 - >r i0 + branch -11 rdrop
        assert_eq!(tags[2], weft_core::BlobTag::Prim(PRIM_TOR));
        assert_eq!(tags[3], weft_core::BlobTag::Prim(PRIM_RFETCH));
        assert_eq!(tags[4], weft_core::BlobTag::Prim(PRIM_0BRANCH));
        assert_eq!(tags[5], weft_core::BlobTag::InlineLit(8));
        assert_eq!(tags[6], weft_core::BlobTag::Prim(PRIM_FROMR));
        assert_eq!(tags[7], weft_core::BlobTag::InlineLit(1));
        assert_eq!(tags[8], weft_core::BlobTag::Prim(PRIM_SUB));
        assert_eq!(tags[9], weft_core::BlobTag::Prim(PRIM_TOR));
        assert_eq!(tags[10], weft_core::BlobTag::Prim(PRIM_I0));
        assert_eq!(tags[11], weft_core::BlobTag::Prim(PRIM_ADD));
        assert_eq!(tags[12], weft_core::BlobTag::Prim(PRIM_BRANCH));
        assert_eq!(tags[13], weft_core::BlobTag::InlineLit(-11));
        assert_eq!(tags[14], weft_core::BlobTag::Prim(PRIM_RDROP));
        // outer stack keeps only the accumulator
        let record = fx.store.lookup_word("sum10").unwrap();
        assert_eq!(record.type_sig, "-> i64");
    }

    #[test]
    fn test_declared_signature_checked() {
        let mut fx = fixture();
        compile(&mut fx, ": square i64 -> i64 ; dup * ;").unwrap();
        assert_eq!(
            fx.store.lookup_word("square").unwrap().type_sig,
            "i64 -> i64"
        );

        let err = compile(&mut fx, ": bad i64 -> i64 ; dup ;").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Type);
        assert!(err.message.contains("declares"));
    }

    #[test]
    fn test_stack_underflow_is_compile_error() {
        let mut fx = fixture();
        let err = compile(&mut fx, ": bad + ;").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Stack);
        assert_eq!(err.word.as_deref(), Some("bad"));
    }

    #[test]
    fn test_unknown_word() {
        let mut fx = fixture();
        let err = compile(&mut fx, ": bad frobnicate ;").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Type);
        assert!(err.message.contains("frobnicate"));
    }

    #[test]
    fn test_type_mismatch_has_no_overload() {
        let mut fx = fixture();
        // `not` leaves bool; `+` wants integers
        let err = compile(&mut fx, ": bad true 0= 1 + ;").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Type);
    }

    #[test]
    fn test_lazy_word_specializes_once_per_input_vector() {
        let mut fx = fixture();
        compile(&mut fx, ": twin a -> a a ; dup ;").unwrap();
        assert_eq!(fx.cache.len(), 0);

        compile(&mut fx, ": u1 5 twin ;").unwrap();
        assert_eq!(fx.cache.len(), 1);
        let first = fx.cache.get("twin", &[TypeId::I64]).unwrap();

        compile(&mut fx, ": u2 9 twin ;").unwrap();
        assert_eq!(fx.cache.len(), 1, "same inputs must hit the cache");
        assert_eq!(fx.cache.get("twin", &[TypeId::I64]).unwrap(), first);

        // lazy words have no words-table row; specializations are blobs
        assert!(fx.store.lookup_word("twin").is_none());
        assert_eq!(
            fx.store.load_blob(&first).unwrap().blob_kind(),
            Some(weft_core::BlobKind::Word)
        );
    }

    #[test]
    fn test_specialization_records_outputs() {
        let mut fx = fixture();
        compile(&mut fx, ": flip a b -> b a ; swap ; : use 1 0= 2 flip ;").unwrap();
        let cid = fx.cache.get("flip", &[TypeId::Bool, TypeId::I64]).unwrap();
        let blob = fx.store.load_blob(&cid).unwrap();
        let sig = fx.store.load_type_sig(blob.sig_cid.as_ref().unwrap()).unwrap();
        assert_eq!(sig.inputs, "bool i64");
        assert_eq!(sig.outputs, "i64 bool");
        assert_eq!(fx.store.lookup_word("use").unwrap().type_sig, "-> i64 bool");
    }

    #[test]
    fn test_recursive_specialization_rejected() {
        let mut fx = fixture();
        compile(&mut fx, ": loopy a -> a ; loopy ;").unwrap();
        let err = compile(&mut fx, ": go 1 loopy ;").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Type);
        assert!(err.message.contains("recursive"));
    }

    #[test]
    fn test_array_literal_homogeneity() {
        let mut fx = fixture();
        let err = compile(&mut fx, ": bad [ 1 \"two\" ] ;").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Type);
        assert!(err.message.contains("share one type"));
    }

    #[test]
    fn test_array_literal_signature() {
        let mut fx = fixture();
        compile(&mut fx, ": pair [ 7 8 ] ;").unwrap();
        assert_eq!(fx.store.lookup_word("pair").unwrap().type_sig, "-> array");
    }

    #[test]
    fn test_drop_of_owned_array_emits_free() {
        let mut fx = fixture();
        compile(&mut fx, ": tidy [ 1 ] drop ;").unwrap();
        let tags = word_tags(&fx, "tidy");
        assert_eq!(
            *tags.last().unwrap(),
            weft_core::BlobTag::Prim(PRIM_FREE),
            "dropping the last reference to an allocation must free it"
        );
    }

    #[test]
    fn test_drop_of_shared_array_does_not_free() {
        let mut fx = fixture();
        compile(&mut fx, ": shared [ 1 ] dup drop ;").unwrap();
        let tags = word_tags(&fx, "shared");
        assert_eq!(*tags.last().unwrap(), weft_core::BlobTag::Prim(PRIM_DROP));
    }

    #[test]
    fn test_unmatched_delimiters() {
        let mut fx = fixture();
        let err = compile(&mut fx, ": a ) ;").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Parse);

        let err = compile(&mut fx, ": b ] ;").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Parse);

        let err = compile(&mut fx, ": c ( 1 ;").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Parse);
        assert!(err.message.contains("unterminated quotation"));

        let err = compile(&mut fx, ": d [ 1 ;").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Parse);
    }

    #[test]
    fn test_quotation_depth_limit() {
        let mut fx = fixture();
        let mut source = String::from(": deep ");
        for _ in 0..17 {
            source.push_str("( 1 ) ");
        }
        source.push(';');
        let err = compile(&mut fx, &source).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Resource);
    }

    #[test]
    fn test_array_depth_limit() {
        let mut fx = fixture();
        let mut source = String::from(": deep ");
        for _ in 0..17 {
            source.push_str("[ ");
        }
        let err = compile(&mut fx, &source).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Resource);
    }

    #[test]
    fn test_type_decl_persists_signature() {
        let mut fx = fixture();
        compile(&mut fx, "$ i64 i64 -> i64 ;").unwrap();
        // re-interning must find the same CID
        let cid = fx.store.store_type_sig("i64 i64", "i64");
        assert!(fx.store.load_type_sig(&cid).is_some());
    }

    #[test]
    fn test_top_level_expression_rejected() {
        let mut fx = fixture();
        let err = compile(&mut fx, "5 5 +").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Parse);
    }

    #[test]
    fn test_literal_out_of_cell_range() {
        let mut fx = fixture();
        let err = compile(&mut fx, ": big 4611686018427387904 ;").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Lex);
    }

    #[test]
    fn test_string_literal_stores_image() {
        let mut fx = fixture();
        compile(&mut fx, ": greet \"hi\" ;").unwrap();
        let tags = word_tags(&fx, "greet");
        let weft_core::BlobTag::Ref { kind: 3, cid } = tags[0] else {
            panic!("expected a DATA reference");
        };
        let blob = fx.store.load_blob(&cid).unwrap();
        // count 2, elem_size 1, payload "hi\0"
        assert_eq!(blob.bytes.len(), 32 + 3);
        assert_eq!(blob.bytes[0], 2);
        assert_eq!(blob.bytes[8], 1);
        assert_eq!(&blob.bytes[32..], b"hi\0");
        assert_eq!(fx.store.lookup_word("greet").unwrap().type_sig, "-> str");
    }

    #[test]
    fn test_quotation_materialized_for_execute() {
        let mut fx = fixture();
        compile(&mut fx, ": q ( 5 ) execute ;").unwrap();
        let tags = word_tags(&fx, "q");
        assert!(matches!(tags[0], weft_core::BlobTag::Ref { kind: 2, .. }));
        assert_eq!(tags[1], weft_core::BlobTag::Prim(PRIM_EXECUTE));
    }

    #[test]
    fn test_unicode_comparison_compiles() {
        let mut fx = fixture();
        compile(&mut fx, ": ne 1 2 ≠ ;").unwrap();
        let tags = word_tags(&fx, "ne");
        assert_eq!(tags[2], weft_core::BlobTag::Prim(PRIM_NE));
    }
}
