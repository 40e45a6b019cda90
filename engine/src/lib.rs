//! Token-budget-aware chunking and Map-Reduce generation.
//!
//! The engine decides whether an input fits a backend's context window
//! ([`ChunkingEngine::needs_chunking`]), splits oversized text along semantic
//! boundaries ([`splitter`]), and recombines per-chunk results through a
//! single reduce call ([`map_reduce`]).

pub mod map_reduce;
pub mod splitter;

pub use map_reduce::{CHUNK_JOIN_MARKER, ChunkingEngine, EngineError};
pub use splitter::{Chunk, split};
