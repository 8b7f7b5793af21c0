//! VM glue
//!
//! Owns the engine, links words on demand, and runs them through a
//! two-cell bootstrap (`[Xt(entry), EXIT]`). The operand stack is read
//! back after execution for inspection.

use crate::dict::Dictionary;
use crate::error::CompileError;
use crate::loader::Loader;
use crate::primitives::register_primitives;
use crate::store::Store;
use tracing::debug;
use weft_core::cells::{Cell, EXIT};
use weft_core::prims::DISPATCH_TABLE_SIZE;
use weft_runtime::Engine;

pub struct Runner {
    engine: Engine,
    dispatch: [u64; DISPATCH_TABLE_SIZE],
}

impl Runner {
    /// Build an engine, register every primitive into it and into `dict`.
    pub fn new(dict: &mut Dictionary) -> Result<Runner, CompileError> {
        let mut engine = Engine::new();
        let dispatch = register_primitives(dict, &mut engine)?;
        Ok(Runner { engine, dispatch })
    }

    pub fn dispatch(&self) -> [u64; DISPATCH_TABLE_SIZE] {
        self.dispatch
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Clear the engine's stacks between runs.
    pub fn reset(&mut self) {
        self.engine.reset();
    }

    /// Link a stored word by name and execute it. Returns the operand
    /// stack, bottom first.
    pub fn execute(&mut self, store: &Store, name: &str) -> Result<Vec<i64>, CompileError> {
        let word = store.lookup_word(name).ok_or_else(|| {
            CompileError::link(format!("word '{name}' is not in the store"))
        })?;

        let mut loader = Loader::new(store, self.dispatch);
        let index = loader.link_cid(&word.def_cid)?;
        let entry = loader.addr(index);
        debug!(word = name, linked = loader.linked_count(), "executing");

        let bootstrap = [Cell::Xt(entry).encode(), EXIT];
        // SAFETY: every address in the bootstrap and the linked arrays
        // came from this runner's engine or from `loader`, which stays
        // alive until run returns.
        unsafe { self.engine.run(&bootstrap) }.map_err(|e| {
            CompileError::link(format!("execution of '{name}' failed: {e}"))
        })?;

        Ok(self.engine.stack())
    }
}
