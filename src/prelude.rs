//! # jarremap Prelude
//!
//! This module provides a convenient prelude for the most commonly used types
//! from the jarremap library. Import this module to get quick access to the
//! essential types for remapping an archive.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all jarremap operations
pub use crate::Error;

/// The result type used throughout jarremap
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Pipeline configuration, orchestrator and run statistics
pub use crate::pipeline::{RemapConfig, RemapSummary, Remapper};

// ================================================================================================
// Mappings
// ================================================================================================

/// Mapping-feed ingestion options and the loaded symbol table
pub use crate::mappings::{MappingOptions, SymbolTable};

// ================================================================================================
// Classfiles and Archives
// ================================================================================================

/// Parsed classfile model
pub use crate::classfile::ClassFile;

/// Archive reading and writing
pub use crate::archive::{ArchiveEntry, JarReader, JarWriter};

// ================================================================================================
// Resolution
// ================================================================================================

/// Hierarchy-aware class lookup over an archive
pub use crate::graph::ClassGraph;

/// Member-name resolution against a symbol table and class graph
pub use crate::resolve::MemberResolver;
