//! Prelude module for `dosgfx_types`.
//!
//! # Examples
//!
//! ```no_run
//! use dosgfx_types::prelude::*;
//!
//! let registry = Registry::new();
//! for format in registry.tileset_formats() {
//! 	println!("{}: {}", format.code(), format.friendly_name());
//! }
//! ```

#[doc(inline)]
pub use crate::error::{Error, Result};

#[doc(inline)]
pub use crate::stream::{
	BitOrder, BitReader, BitWriter, FileStream, FilteredStream, MemStream, SharedStream, Stream,
	StreamExt, SubStream, shared,
};

#[doc(inline)]
pub use crate::filter::{StreamFilter, filter_vec};

#[doc(inline)]
pub use crate::pal::{CgaVariant, PalDepth, Palette, PaletteRef, Rgba};

#[doc(inline)]
pub use crate::image::{
	ColourDepth, EgaBytePlanar, EgaLinear, EgaRowPlanar, Image, ImageCaps, Mask, MemoryImage,
	PcxImage, Pixels, PlaneLayout, PlanePurpose, Point, Rect, VgaLinear,
};

#[doc(inline)]
pub use crate::tileset::{
	Attributes, EntryRef, FatCore, FatEntry, FatHooks, Tileset, TilesetCaps,
};

#[doc(inline)]
pub use crate::registry::{Certainty, ImageFormat, Registry, TilesetFormat};

#[doc(inline)]
pub use crate::supp::{SuppData, SuppFilenames, SuppKind};

#[doc(inline)]
pub use crate::util::{default_palette_for, overlay_image};
