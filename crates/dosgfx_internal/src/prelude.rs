//! Prelude module for `dosgfx_internal`.

#[doc(inline)]
pub use dosgfx_types::prelude::*;
