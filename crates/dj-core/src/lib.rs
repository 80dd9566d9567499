//! Shared primitives for the DJ compiler.
//!
//! - `interner` - string interning (`Symbol`/`Interner`), used for class,
//!   field, and method names throughout the symbol table and typed IR.
//! - `types` - the DJ type-code domain (`TypeId`) described in spec §3.

mod interner;
mod types;

pub use interner::{Interner, Symbol};
pub use types::TypeId;
