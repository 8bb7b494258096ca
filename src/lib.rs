// Copyright 2026 The jarremap Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # jarremap
//!
//! A symbol remapper for obfuscated JVM application archives. Given an
//! archive and two externally supplied mapping tables, `jarremap` restores
//! readable class, field, method and local-variable names while keeping the
//! binary structurally valid, byte-for-byte faithful wherever no rename
//! applies.
//!
//! ## How it works
//!
//! Remapping runs in two passes over the archive:
//!
//! 1. **Class pass** — renames classes and rewrites every place a type name
//!    is embedded: constant pool entries, member descriptors, generic
//!    signatures, local-variable tables and `InnerClasses` records. The
//!    result is staged in an intermediate archive.
//! 2. **Member pass** — re-reads the intermediate (so inheritance walks see
//!    final class names) and renames field and method declarations and
//!    references. Names missing from the table are resolved by walking the
//!    class hierarchy to the declaring ancestor, and failing that by
//!    heuristics that recover compiler-generated names: bridge-method
//!    targets and enum switch-map dispatch fields. Placeholder
//!    local-variable names are replaced with type-derived ones.
//!
//! Bytecode is never patched: rewrites only append constant pool entries and
//! redirect the referencing slots, so instruction bytes keep their meaning
//! unchanged.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use jarremap::prelude::*;
//!
//! let config = RemapConfig::new(
//!     "app-obfuscated.jar",
//!     "app-remapped.jar",
//!     "classes.txt",
//!     "members.txt",
//! );
//! let summary = Remapper::new(config)?.run()?;
//! println!("remapped {} classes", summary.class_mappings);
//! # Ok::<(), jarremap::Error>(())
//! ```
//!
//! ## Mapping feeds
//!
//! Both feeds are line-oriented text; blank lines and `#` comments are
//! skipped. Class lines are `oldName newName [hash]`, member lines are
//! `owner field newName` or `owner method descriptor newName`. New class
//! names are qualified with a root namespace prefix
//! (`net/minecraft/server/` by default) when not already qualified.

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

pub mod prelude;

/// Archive container reading and writing.
pub mod archive;

/// Parsing, modelling and re-serialization of single classfiles.
pub mod classfile;

/// Hierarchy-aware class lookup over an archive.
pub mod graph;

/// Mapping-feed ingestion and the run's symbol table.
pub mod mappings;

/// The two-pass pipeline orchestrator.
pub mod pipeline;

/// Member-name resolution, including the synthetic-member heuristics.
pub mod resolve;

/// The class and member rewriting passes.
pub mod rewrite;

/// Crate-wide result type; all fallible operations return this.
pub type Result<T> = std::result::Result<T, Error>;

pub use error::Error;
pub use mappings::{MappingOptions, SymbolTable};
pub use pipeline::{RemapConfig, RemapSummary, Remapper};
