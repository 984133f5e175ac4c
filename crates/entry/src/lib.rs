//! Stave - Entry
//!
//! The record that flows through the pipeline, and the typed paths into it.
//!
//! # Overview
//!
//! Every operator in a stave pipeline passes [`Entry`] values downstream.
//! An entry carries a timestamp, a polymorphic [`Value`] record (scalar or
//! arbitrarily nested map), flat `labels` and `resource` string maps, an
//! ordered tag list, and a [`Severity`].
//!
//! [`Field`] is a selector into one of the entry's roots (`record`,
//! `labels`, `resource`) used by parsers and transformers to read, write,
//! and delete values without knowing the record's shape up front.
//!
//! # Design
//!
//! - **All-owned data**: `Entry::clone()` is a deep copy with no shared
//!   mutable state, which is what fan-out isolation relies on.
//! - **Missing is not an error**: `Field::get` on an absent path returns
//!   `None`; `Field::set` auto-creates intermediate maps.

mod field;
mod record;
mod severity;
mod value;

pub use field::{Field, FieldRoot};
pub use record::Entry;
pub use severity::Severity;
pub use value::Value;
