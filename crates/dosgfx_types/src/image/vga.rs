//! Linear VGA image codec: one byte per pixel, row-major, no padding.

use std::io::SeekFrom;

use super::{ColourDepth, Image, ImageCaps, Pixels, Point, check_buffer_sizes};
use crate::error::{Error, Result};
use crate::pal::PaletteRef;
use crate::stream::{SharedStream, Stream};

/// An image stored as raw mode-13h style bytes.
pub struct VgaLinear {
	content: SharedStream,
	offset: u64,
	dims: Point,
	pal: Option<PaletteRef>,
}

impl VgaLinear {
	/// Wrap an encoded image.
	pub fn new(content: SharedStream, offset: u64, dims: Point, pal: Option<PaletteRef>) -> Self {
		Self {
			content,
			offset,
			dims,
			pal,
		}
	}

	pub(crate) fn set_dims(&mut self, dims: Point) {
		self.dims = dims;
	}
}

impl Image for VgaLinear {
	fn caps(&self) -> ImageCaps {
		if self.pal.is_some() { ImageCaps::HAS_PALETTE } else { ImageCaps::empty() }
	}

	fn colour_depth(&self) -> ColourDepth {
		ColourDepth::Vga
	}

	fn dimensions(&self) -> Point {
		self.dims
	}

	fn palette(&self) -> Option<PaletteRef> {
		self.pal.clone()
	}

	fn decode(&mut self) -> Result<Pixels> {
		let len = self.dims.area();
		let mut pixels = vec![0u8; len];
		self.content.seek(SeekFrom::Start(self.offset))?;
		let n = self.content.read(&mut pixels)?;
		if n != len {
			return Err(Error::incomplete_read(len, n));
		}
		Ok(pixels)
	}

	fn decode_mask(&mut self) -> Result<Pixels> {
		// No mask data in this format; everything is opaque.
		Ok(vec![0u8; self.dims.area()])
	}

	fn encode(&mut self, pixels: &[u8], mask: &[u8]) -> Result<()> {
		check_buffer_sizes(self.dims, pixels, mask)?;
		let end = self.offset + self.dims.area() as u64;
		if self.content.size() != end {
			self.content.truncate(end)?;
		}
		self.content.seek(SeekFrom::Start(self.offset))?;
		self.content.write(pixels)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::stream::{MemStream, shared};

	#[test]
	fn test_roundtrip() {
		let pixels: Pixels = (0..=255u8).collect();
		let content = shared(MemStream::new());
		let mut img = VgaLinear::new(content, 0, Point::new(16, 16), None);
		img.encode(&pixels, &[0; 256]).unwrap();
		assert_eq!(img.decode().unwrap(), pixels);
		assert_eq!(img.decode_mask().unwrap(), vec![0u8; 256]);
	}

	#[test]
	fn test_short_content_is_incomplete_read() {
		let content = shared(MemStream::from_vec(vec![0; 100]));
		let mut img = VgaLinear::new(content, 0, Point::new(16, 16), None);
		assert!(matches!(img.decode(), Err(Error::IncompleteRead { .. })));
	}

	#[test]
	fn test_offset_respected() {
		let mut data = vec![0xEEu8; 4];
		data.extend_from_slice(&[1, 2, 3, 4]);
		let content = shared(MemStream::from_vec(data));
		let mut img = VgaLinear::new(content, 4, Point::new(2, 2), None);
		assert_eq!(img.decode().unwrap(), vec![1, 2, 3, 4]);
	}
}
