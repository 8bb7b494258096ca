//! The two rewriting passes and their shared helpers.
//!
//! [`classes`] renames type names (pass one), [`members`] renames fields,
//! methods and local variables (pass two), and [`locals`] derives readable
//! local-variable names from types. Both passes are pure class-to-class
//! transforms; archive traversal and pass ordering live in
//! [`crate::pipeline`].

pub mod classes;
pub mod locals;
pub mod members;
