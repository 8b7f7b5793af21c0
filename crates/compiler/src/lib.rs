//! Weft Compiler Library
//!
//! Compiles Weft source (a concatenative, stack-oriented language) into
//! content-addressed blobs in a persistent store, and links/executes
//! stored words through the runtime engine.
//!
//! The usual round trip:
//!
//! ```rust,ignore
//! use weftc::{Session, Store};
//!
//! let mut session = Session::new(Store::in_memory())?;
//! session.compile_source(": fifteen 5 10 + ;")?;
//! assert_eq!(session.execute("fifteen")?, vec![15]);
//! ```

pub mod compiler;
pub mod config;
pub mod dict;
pub mod error;
pub mod immediate;
pub mod loader;
pub mod primitives;
pub mod runner;
pub mod store;
pub mod tokens;
pub mod types;
pub mod unify;

pub use compiler::{Compiler, SpecCache};
pub use config::CompilerConfig;
pub use dict::{DictEntry, Dictionary};
pub use error::{CompileError, ErrorKind};
pub use loader::Loader;
pub use runner::Runner;
pub use store::Store;
pub use tokens::{Token, TokenKind, Tokenizer};
pub use types::{StackEntry, TypeId, TypeSig};

use std::path::Path;

/// One compiler instance's whole world: dictionary, store, engine, and
/// the session-scoped specialization cache.
pub struct Session {
    pub dict: Dictionary,
    pub store: Store,
    runner: Runner,
    spec_cache: SpecCache,
    config: CompilerConfig,
}

impl Session {
    pub fn new(store: Store) -> Result<Session, CompileError> {
        Session::with_config(store, CompilerConfig::default())
    }

    pub fn with_config(store: Store, config: CompilerConfig) -> Result<Session, CompileError> {
        let mut dict = Dictionary::new();
        let runner = Runner::new(&mut dict)?;
        Ok(Session {
            dict,
            store,
            runner,
            spec_cache: SpecCache::new(),
            config,
        })
    }

    /// Compile one source unit into the session's store and dictionary.
    pub fn compile_source(&mut self, source: &str) -> Result<(), CompileError> {
        let mut compiler = Compiler::new(
            &mut self.dict,
            &mut self.store,
            &mut self.spec_cache,
            self.runner.dispatch(),
            self.config.clone(),
        );
        compiler.compile_source(source)
    }

    /// Link a stored word and run it; returns the operand stack, bottom
    /// first.
    pub fn execute(&mut self, name: &str) -> Result<Vec<i64>, CompileError> {
        self.runner.execute(&self.store, name)
    }

    /// Clear the engine's stacks between runs.
    pub fn reset_engine(&mut self) {
        self.runner.reset();
    }

    pub fn engine(&self) -> &weft_runtime::Engine {
        self.runner.engine()
    }

    pub fn spec_cache(&self) -> &SpecCache {
        &self.spec_cache
    }

    /// Persist the store image.
    pub fn save(&self) -> Result<(), CompileError> {
        self.store.save()
    }
}

/// Compile a source file into the store at `store_path` and persist it.
pub fn compile_file(source_path: &Path, store_path: &Path) -> Result<(), CompileError> {
    let source = std::fs::read_to_string(source_path)?;
    let mut session = Session::new(Store::open(store_path)?)?;
    session.compile_source(&source)?;
    session.save()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_compile_and_execute() {
        let mut session = Session::new(Store::in_memory()).unwrap();
        session.compile_source(": answer 42 ;").unwrap();
        assert_eq!(session.execute("answer").unwrap(), vec![42]);
    }

    #[test]
    fn test_error_carries_category_and_position() {
        let mut session = Session::new(Store::in_memory()).unwrap();
        let err = session.compile_source(": bad nonsense ;").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
        assert!(err.position.is_some());
        assert_eq!(err.word.as_deref(), Some("bad"));
    }

    #[test]
    fn test_executing_unknown_word_is_link_error() {
        let mut session = Session::new(Store::in_memory()).unwrap();
        let err = session.execute("ghost").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Link);
    }
}
