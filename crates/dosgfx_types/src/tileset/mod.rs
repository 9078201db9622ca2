//! The tileset abstraction and the container formats built on it.
//!
//! A tileset presents an ordered hierarchy of entries over a backing
//! stream.  Each entry is a folder (a nested tileset), an image, or a
//! vacant slot that exists on disk but holds no content.  Handles to
//! entries are reference-counted and stay valid while other entries are
//! inserted, removed or resized.

use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::image::{ColourDepth, Image, Point};
use crate::pal::PaletteRef;

mod ccaves;
mod ddave;
mod fat;
mod from_images;
mod harry;
mod jill;
mod pcx_grid;

pub use ccaves::{CCavesMain, CCavesMainFormat, CCavesSub, CCavesSubFormat};
pub use ddave::{DDaveCgaImage, DDaveEgaImage, DDaveFormat, DDaveTileset, DDaveVgaImage};
pub use fat::{FatCore, FatHooks, NoRecords};
pub use from_images::{FromImageList, ImageListItem, SourceImage, source_image};
pub use harry::{HarryIcoFormat, HarryIcoTileset};
pub use jill::{JillFormat, JillSub, JillTileset};
pub use pcx_grid::PcxGridFormat;

bitflags! {
	/// Which optional operations a tileset instance supports.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct TilesetCaps: u8 {
		/// All tiles share one size and `set_dimensions` may change it.
		const CHANGE_DIMENSIONS = 0x01;
		/// `palette` returns data.
		const HAS_PALETTE = 0x02;
		/// `set_palette` may be called; implies `HAS_PALETTE`.
		const SET_PALETTE = 0x04;
		/// Entries carry names.
		const HAS_NAMES = 0x08;
	}
}

bitflags! {
	/// Attributes of one tileset entry.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
	pub struct Attributes: u8 {
		/// The entry is a nested tileset.
		const FOLDER = 0x01;
		/// The slot exists on disk but holds no content.
		const VACANT = 0x02;
	}
}

/// One entry in a tileset's file allocation table.
#[derive(Debug, Clone, Default)]
pub struct FatEntry {
	/// False once the entry has been removed from its tileset.
	pub valid: bool,
	/// Position within the tileset.
	pub index: usize,
	/// Byte offset of the entry inside the container.
	pub offset: u64,
	/// Bytes the entry occupies on disk, possibly compressed.
	pub stored_size: u64,
	/// Bytes after stream filters have been applied.
	pub real_size: u64,
	/// Bytes of entry-local header preceding the content.
	pub len_header: u64,
	/// Folder/vacant markers.
	pub attr: Attributes,
	/// Format tag, e.g. `tile/ccaves`.
	pub type_tag: String,
	/// Entry name, for formats that store one.
	pub name: Option<String>,
}

/// Stable handle to a tileset entry.
pub type EntryRef = Rc<RefCell<FatEntry>>;

/// Build a fresh entry handle.
pub fn entry_ref(entry: FatEntry) -> EntryRef {
	Rc::new(RefCell::new(entry))
}

/// A container of images and nested tilesets.
///
/// Only call one method at a time from one thread; implementations seek
/// freely on a shared stream cursor.
pub trait Tileset {
	/// Which optional operations this instance supports.
	fn caps(&self) -> TilesetCaps;

	/// How many colours this tileset's images can store.
	fn colour_depth(&self) -> ColourDepth;

	/// Handles to all entries, in order.
	fn entries(&self) -> Vec<EntryRef>;

	/// Common tile dimensions, or 0x0 when tiles vary.
	fn dimensions(&self) -> Point {
		Point::new(0, 0)
	}

	/// Resize every tile in the tileset.  Image content is not preserved.
	fn set_dimensions(&mut self, new_dims: Point) -> Result<()> {
		let _ = new_dims;
		Err(Error::capability("set_dimensions on a tileset without a common tile size"))
	}

	/// Preferred number of tiles per row when laying tiles out for display,
	/// or zero for no preference.
	fn layout_width(&self) -> u32 {
		0
	}

	/// Open an image entry.
	fn open_image(&self, id: &EntryRef) -> Result<Box<dyn Image>>;

	/// Open a folder entry as a nested tileset.  The parent must outlive
	/// the child, and flushing the child does not commit the parent.
	fn open_tileset(&self, id: &EntryRef) -> Result<Box<dyn Tileset>>;

	/// Insert a new, empty entry before `before` (or at the end).
	fn insert(&mut self, before: Option<&EntryRef>, attr: Attributes) -> Result<EntryRef>;

	/// Remove an entry and its on-disk content.
	fn remove(&mut self, id: &EntryRef) -> Result<()>;

	/// Change an entry's stored and real size.
	fn resize(&mut self, id: &EntryRef, new_stored: u64, new_real: u64) -> Result<()>;

	/// The palette shared by this tileset's images, when it has one.
	fn palette(&self) -> Option<PaletteRef> {
		None
	}

	/// Replace the shared palette.
	fn set_palette(&mut self, new_palette: PaletteRef) -> Result<()> {
		let _ = new_palette;
		Err(Error::capability("set_palette on a tileset without one"))
	}

	/// Commit pending edits to the backing store.
	fn flush(&mut self) -> Result<()>;
}

/// Look up an entry's position, failing when the handle is stale.
pub(crate) fn position_of(entries: &[EntryRef], id: &EntryRef) -> Result<usize> {
	entries
		.iter()
		.position(|e| Rc::ptr_eq(e, id))
		.ok_or_else(|| Error::out_of_range("entry", id.borrow().index, entries.len()))
}
