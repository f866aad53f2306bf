//! Identifier types shared across the vault crates

pub mod identifiers;
