//! Shared fixtures for unit and integration tests.

pub(crate) mod build;
