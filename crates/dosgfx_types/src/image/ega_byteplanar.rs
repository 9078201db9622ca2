//! Byte-planar EGA image codec.
//!
//! Pixels are processed in groups of eight.  For every row, for every group,
//! one byte per plane is stored in descriptor order; the most significant
//! bit of each byte is the leftmost pixel of the group.  A partial group at
//! the right edge uses only the high bits.

use std::io::SeekFrom;

use super::ega::{PlaneLayout, has_mask_plane};
use super::{ColourDepth, Image, ImageCaps, Pixels, Point, check_buffer_sizes};
use crate::error::Result;
use crate::pal::PaletteRef;
use crate::stream::{SharedStream, Stream, StreamExt};

/// An image stored as byte-interleaved EGA planes.
pub struct EgaBytePlanar {
	content: SharedStream,
	offset: u64,
	dims: Point,
	planes: PlaneLayout,
	pal: Option<PaletteRef>,
}

impl EgaBytePlanar {
	/// Wrap an encoded image.
	pub fn new(
		content: SharedStream,
		offset: u64,
		dims: Point,
		planes: PlaneLayout,
		pal: Option<PaletteRef>,
	) -> Self {
		Self {
			content,
			offset,
			dims,
			planes,
			pal,
		}
	}

	fn do_conversion(&mut self) -> Result<(Pixels, Pixels)> {
		let dims = self.dims;
		let mut pixels = vec![0u8; dims.area()];
		let mut mask = vec![0u8; dims.area()];

		self.content.seek(SeekFrom::Start(self.offset))?;
		let mut row_start = 0usize;
		for _y in 0..dims.y {
			for x in (0..dims.x).step_by(8) {
				let valid = (dims.x - x).min(8) as usize;
				for p in self.planes {
					let Some(spec) = p.spec() else { continue };
					let byte = self.content.read_u8()?;
					if spec.value == 0 {
						continue; // Blank plane: consume and ignore
					}
					let target = if spec.to_mask { &mut mask } else { &mut pixels };
					for i in 0..valid {
						let on = (byte >> (7 - i)) & 1 != 0;
						if on != spec.swap {
							target[row_start + x as usize + i] |= spec.value;
						}
					}
				}
			}
			row_start += dims.x as usize;
		}
		Ok((pixels, mask))
	}
}

impl Image for EgaBytePlanar {
	fn caps(&self) -> ImageCaps {
		if self.pal.is_some() { ImageCaps::HAS_PALETTE } else { ImageCaps::empty() }
	}

	fn colour_depth(&self) -> ColourDepth {
		ColourDepth::Ega
	}

	fn dimensions(&self) -> Point {
		self.dims
	}

	fn palette(&self) -> Option<PaletteRef> {
		self.pal.clone()
	}

	fn decode(&mut self) -> Result<Pixels> {
		Ok(self.do_conversion()?.0)
	}

	fn decode_mask(&mut self) -> Result<Pixels> {
		if !has_mask_plane(&self.planes) {
			return Ok(vec![0u8; self.dims.area()]);
		}
		Ok(self.do_conversion()?.1)
	}

	fn encode(&mut self, pixels: &[u8], mask: &[u8]) -> Result<()> {
		let dims = self.dims;
		check_buffer_sizes(dims, pixels, mask)?;

		self.content.seek(SeekFrom::Start(self.offset))?;
		let mut row_start = 0usize;
		for _y in 0..dims.y {
			for x in (0..dims.x).step_by(8) {
				let valid = (dims.x - x).min(8) as usize;
				for p in self.planes {
					let Some(spec) = p.spec() else { continue };
					let mut byte = 0u8;
					if spec.value != 0 {
						let source = if spec.to_mask { mask } else { pixels };
						for i in 0..valid {
							let on = source[row_start + x as usize + i] & spec.value != 0;
							if on != spec.swap {
								byte |= 0x80 >> i;
							}
						}
					}
					self.content.write_u8(byte)?;
				}
			}
			row_start += dims.x as usize;
		}
		let end = self.content.pos();
		if self.content.size() != end {
			self.content.truncate(end)?;
		}
		Ok(())
	}
}
