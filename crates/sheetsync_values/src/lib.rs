//! # SheetSync Values
//!
//! Typed cell values for SheetSync.
//!
//! This crate provides:
//! - The [`TypedValue`] enum covering every cell type a sheet can carry
//! - Cell coercion from raw strings ([`coerce`])
//! - Structural deep-equality used as the change oracle
//!   ([`structural_eq`], [`maps_equal`])
//!
//! ## Coercion rules
//!
//! A raw cell string is coerced in priority order: explicit `string(...)`
//! escape hatch, booleans, numbers that survive an exact parse/re-render
//! round trip, explicit typed constructors like `vector3(1, 2, 3)`, and
//! finally the raw string itself. Coercion is deterministic and pure.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod coerce;
mod structural;
mod value;

pub use coerce::{coerce, CoerceError, CoerceResult};
pub use structural::{maps_equal, structural_eq};
pub use value::TypedValue;
