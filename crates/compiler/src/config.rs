//! Compiler configuration
//!
//! Capacity limits that turn into `resource` errors when exceeded.
//! Defaults mirror the compiled-in constants of the reference
//! implementation.

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Maximum simultaneously pending / nested quotations.
    pub max_quotation_depth: usize,
    /// Maximum nesting of `[ ... ]` array literals.
    pub max_array_depth: usize,
    /// Maximum compile-time type stack depth.
    pub max_type_stack: usize,
    /// Maximum entries in the specialization cache.
    pub spec_cache_capacity: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            max_quotation_depth: 16,
            max_array_depth: 16,
            max_type_stack: 256,
            spec_cache_capacity: 1024,
        }
    }
}
