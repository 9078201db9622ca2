//! Core types and format support for the `dosgfx-rs` project.
//!
//! This crate reads and writes the raster graphics of DOS-era games: the
//! bit-planar EGA layouts, packed CGA pixels, linear VGA bytes and bespoke
//! container files each game invented for itself.
//!
//! # Layers
//!
//! - **Streams** ([`stream`]): random-access byte streams with
//!   insert/remove editing, sub-byte field access and filtered views.
//! - **Filters** ([`filter`]): the RLE, padding and lookup-code
//!   transformations container formats wrap around their payload.
//! - **Palettes** ([`pal`]): indexed colour maps and the standard CGA,
//!   EGA and VGA tables.
//! - **Images** ([`image`]): the canonical pixel/mask form and the codecs
//!   that convert to and from each on-disk encoding, including PCX.
//! - **Tilesets** ([`tileset`]): hierarchical containers of images over a
//!   file allocation table.
//! - **Registry** ([`registry`]): format probing and auto-detection.
//!
//! # Examples
//!
//! ```no_run
//! use dosgfx_types::registry::Registry;
//! use dosgfx_types::stream::{FileStream, shared};
//! use dosgfx_types::supp::SuppData;
//!
//! # fn main() -> Result<(), dosgfx_types::error::Error> {
//! let content = shared(FileStream::open("CC1.GFX")?);
//! let registry = Registry::new();
//! let format = {
//! 	let mut io = content.borrow_mut();
//! 	registry.detect_tileset(&mut *io)?.expect("unknown format")
//! };
//! let tileset = format.open(content, &SuppData::new())?;
//! for entry in tileset.entries() {
//! 	println!("entry {} at {:#x}", entry.borrow().index, entry.borrow().offset);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod filter;
pub mod image;
pub mod pal;
pub mod registry;
pub mod stream;
pub mod supp;
pub mod tileset;
pub mod util;

pub mod prelude;

// Re-export the most commonly used types at the crate root.
pub use error::{Error, Result};
pub use image::{ColourDepth, Image, ImageCaps, Mask, Pixels, Point, Rect};
pub use pal::{Palette, PaletteRef, Rgba};
pub use registry::{Certainty, Registry};
pub use stream::{FileStream, MemStream, SharedStream, Stream, StreamExt, shared};
pub use supp::{SuppData, SuppKind};
pub use tileset::{Attributes, EntryRef, Tileset, TilesetCaps};
