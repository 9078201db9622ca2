//! The image abstraction and the per-format pixel codecs.
//!
//! An [`Image`] converts between a game's custom on-disk encoding and the
//! canonical in-memory form: one byte per pixel holding a palette index,
//! rows packed tightly, plus a parallel mask buffer of the same size.
//! Formats differ wildly in what they can do, so callers must consult
//! [`Image::caps`] before invoking the optional operations.

use std::rc::Rc;

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::pal::PaletteRef;

mod ega;
mod ega_byteplanar;
mod ega_linear;
mod ega_rowplanar;
mod pcx;
mod vga;

pub use ega::{PlaneCount, PlaneLayout, PlanePurpose};
pub use ega_byteplanar::EgaBytePlanar;
pub use ega_linear::EgaLinear;
pub use ega_rowplanar::EgaRowPlanar;
pub use pcx::{PCX_HEADER_LEN, PcxFormat, PcxImage};
pub use vga::VgaLinear;

/// Raw 8bpp image or mask data, one byte per pixel, stride = width.
pub type Pixels = Vec<u8>;

/// An (x, y) pair used for dimensions, hotspots and hit rectangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
	/// Horizontal component
	pub x: u32,
	/// Vertical component
	pub y: u32,
}

impl Point {
	/// Create a point.
	pub const fn new(x: u32, y: u32) -> Self {
		Self {
			x,
			y,
		}
	}

	/// Number of pixels in a buffer of these dimensions.
	pub const fn area(&self) -> usize {
		(self.x as usize) * (self.y as usize)
	}
}

/// A rectangle within a larger image, used by the synthetic tilesets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
	/// Left edge in pixels
	pub x: u32,
	/// Top edge in pixels
	pub y: u32,
	/// Width in pixels
	pub width: u32,
	/// Height in pixels
	pub height: u32,
}

/// How many colours an image format can store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColourDepth {
	/// 1bpp black and white
	Mono,
	/// 2bpp, four colours
	Cga,
	/// 4bpp, sixteen colours
	Ega,
	/// 8bpp, 256 colours
	Vga,
}

impl ColourDepth {
	/// Size of this depth's default palette.
	pub const fn palette_size(self) -> usize {
		match self {
			Self::Mono => 2,
			Self::Cga => 4,
			Self::Ega => 16,
			Self::Vga => 256,
		}
	}
}

bitflags! {
	/// Which optional operations an image instance supports.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct ImageCaps: u8 {
		/// `set_dimensions` may be called.
		const SET_DIMENSIONS = 0x01;
		/// `palette` returns data.
		const HAS_PALETTE = 0x02;
		/// `set_palette` may be called; implies `HAS_PALETTE`.
		const SET_PALETTE = 0x04;
		/// The format stores a hotspot.
		const HAS_HOTSPOT = 0x08;
		/// The format stores a hit rectangle.
		const HAS_HIT_RECT = 0x40;
	}
}

bitflags! {
	/// Per-pixel mask bits.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct Mask: u8 {
		/// 1 = transparent, 0 = opaque.
		const TRANSPARENT = 0x01;
		/// 1 = solid for hit-testing, 0 = passable.
		const TOUCH = 0x02;
	}
}

/// A single game image behind some on-disk encoding.
///
/// Only call one method at a time from one thread; implementations seek
/// freely on a shared stream cursor.
pub trait Image {
	/// Which optional operations this instance supports.
	fn caps(&self) -> ImageCaps;

	/// How many colours the format can store.
	fn colour_depth(&self) -> ColourDepth;

	/// Size of the image in pixels.
	fn dimensions(&self) -> Point;

	/// Resize the image.  Pixel content is undefined until the next
	/// [`Image::encode`].
	fn set_dimensions(&mut self, new_dims: Point) -> Result<()> {
		let _ = new_dims;
		Err(Error::capability("set_dimensions on a fixed-size image"))
	}

	/// The image hotspot, when the format stores one.
	fn hotspot(&self) -> Option<Point> {
		None
	}

	/// Move the hotspot.
	fn set_hotspot(&mut self, new_hotspot: Point) -> Result<()> {
		let _ = new_hotspot;
		Err(Error::capability("set_hotspot on an image without one"))
	}

	/// Lower-right corner of the hitmap rectangle, when the format stores one.
	fn hit_rect(&self) -> Option<Point> {
		None
	}

	/// Move the hitmap rectangle corner.
	fn set_hit_rect(&mut self, new_hit_rect: Point) -> Result<()> {
		let _ = new_hit_rect;
		Err(Error::capability("set_hit_rect on an image without one"))
	}

	/// The palette attached to this image, when it has one.
	fn palette(&self) -> Option<PaletteRef> {
		None
	}

	/// Replace the attached palette.
	fn set_palette(&mut self, new_palette: PaletteRef) -> Result<()> {
		let _ = new_palette;
		Err(Error::capability("set_palette on an image without one"))
	}

	/// Decode the on-disk content into the canonical pixel buffer.
	fn decode(&mut self) -> Result<Pixels>;

	/// Decode the transparency/hit mask.  Formats without mask data return
	/// an all-opaque buffer.
	fn decode_mask(&mut self) -> Result<Pixels>;

	/// Replace the image with new content, converting to the on-disk
	/// encoding.  When the image is resizable, set the dimensions first;
	/// both buffers must hold exactly `width * height` bytes.
	fn encode(&mut self, pixels: &[u8], mask: &[u8]) -> Result<()>;
}

/// Validate canonical buffer sizes before encoding.
pub(crate) fn check_buffer_sizes(dims: Point, pixels: &[u8], mask: &[u8]) -> Result<()> {
	let expected = dims.area();
	if pixels.len() != expected || mask.len() != expected {
		return Err(Error::format(format!(
			"pixel/mask buffers must be {}x{} = {expected} bytes (got {} and {})",
			dims.x,
			dims.y,
			pixels.len(),
			mask.len()
		)));
	}
	Ok(())
}

/// Callback invoked when a [`MemoryImage`] is given new content.
pub type OnImageChanged = Box<dyn FnMut(&[u8], &[u8]) -> Result<()>>;

/// An image held entirely in memory.
///
/// Used for synthetic tiles cut out of larger pictures and for formats that
/// decode eagerly at open time.  An optional hook observes new content so a
/// container can track pending changes.
pub struct MemoryImage {
	dims: Point,
	depth: ColourDepth,
	pixels: Pixels,
	mask: Pixels,
	hotspot: Option<Point>,
	hit_rect: Option<Point>,
	pal: Option<PaletteRef>,
	on_changed: Option<OnImageChanged>,
}

impl MemoryImage {
	/// Create an in-memory image from existing buffers.
	pub fn new(dims: Point, depth: ColourDepth, pixels: Pixels, mask: Pixels) -> Self {
		debug_assert_eq!(pixels.len(), dims.area());
		debug_assert_eq!(mask.len(), dims.area());
		Self {
			dims,
			depth,
			pixels,
			mask,
			hotspot: None,
			hit_rect: None,
			pal: None,
			on_changed: None,
		}
	}

	/// Attach a palette.
	pub fn with_palette(mut self, pal: PaletteRef) -> Self {
		self.pal = Some(pal);
		self
	}

	/// Attach a hotspot.
	pub fn with_hotspot(mut self, hotspot: Point) -> Self {
		self.hotspot = Some(hotspot);
		self
	}

	/// Attach a hit rectangle.
	pub fn with_hit_rect(mut self, hit_rect: Point) -> Self {
		self.hit_rect = Some(hit_rect);
		self
	}

	/// Attach a content-change observer.
	pub fn with_on_changed(mut self, hook: OnImageChanged) -> Self {
		self.on_changed = Some(hook);
		self
	}
}

impl Image for MemoryImage {
	fn caps(&self) -> ImageCaps {
		let mut caps = ImageCaps::SET_DIMENSIONS;
		if self.pal.is_some() {
			caps |= ImageCaps::HAS_PALETTE | ImageCaps::SET_PALETTE;
		}
		if self.hotspot.is_some() {
			caps |= ImageCaps::HAS_HOTSPOT;
		}
		if self.hit_rect.is_some() {
			caps |= ImageCaps::HAS_HIT_RECT;
		}
		caps
	}

	fn colour_depth(&self) -> ColourDepth {
		self.depth
	}

	fn dimensions(&self) -> Point {
		self.dims
	}

	fn set_dimensions(&mut self, new_dims: Point) -> Result<()> {
		self.dims = new_dims;
		self.pixels = vec![0; new_dims.area()];
		self.mask = vec![0; new_dims.area()];
		Ok(())
	}

	fn hotspot(&self) -> Option<Point> {
		self.hotspot
	}

	fn set_hotspot(&mut self, new_hotspot: Point) -> Result<()> {
		if self.hotspot.is_none() {
			return Err(Error::capability("set_hotspot on an image without one"));
		}
		self.hotspot = Some(new_hotspot);
		Ok(())
	}

	fn hit_rect(&self) -> Option<Point> {
		self.hit_rect
	}

	fn set_hit_rect(&mut self, new_hit_rect: Point) -> Result<()> {
		if self.hit_rect.is_none() {
			return Err(Error::capability("set_hit_rect on an image without one"));
		}
		self.hit_rect = Some(new_hit_rect);
		Ok(())
	}

	fn palette(&self) -> Option<PaletteRef> {
		self.pal.clone()
	}

	fn set_palette(&mut self, new_palette: PaletteRef) -> Result<()> {
		self.pal = Some(Rc::clone(&new_palette));
		Ok(())
	}

	fn decode(&mut self) -> Result<Pixels> {
		Ok(self.pixels.clone())
	}

	fn decode_mask(&mut self) -> Result<Pixels> {
		Ok(self.mask.clone())
	}

	fn encode(&mut self, pixels: &[u8], mask: &[u8]) -> Result<()> {
		check_buffer_sizes(self.dims, pixels, mask)?;
		self.pixels = pixels.to_vec();
		self.mask = mask.to_vec();
		if let Some(hook) = self.on_changed.as_mut() {
			hook(&self.pixels, &self.mask)?;
		}
		Ok(())
	}
}
