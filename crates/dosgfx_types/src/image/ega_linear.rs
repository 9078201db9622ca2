//! Bit-packed linear EGA/CGA image codec.
//!
//! All planes of one pixel sit next to each other in the bit stream: for
//! each pixel, one bit per plane in descriptor order, then the next pixel.
//! Each row starts on a byte boundary; the bit order within bytes is part
//! of the format definition.  A two-plane big-endian layout of `Green1`
//! then `Blue1` is exactly packed 2bpp CGA.

use std::io::SeekFrom;

use super::ega::{PlaneLayout, has_mask_plane};
use super::{ColourDepth, Image, ImageCaps, Pixels, Point, check_buffer_sizes};
use crate::error::Result;
use crate::pal::PaletteRef;
use crate::stream::{BitOrder, BitReader, BitWriter, SharedStream, Stream};

/// An image stored as bit-packed plane data.
pub struct EgaLinear {
	content: SharedStream,
	offset: u64,
	dims: Point,
	planes: PlaneLayout,
	order: BitOrder,
	depth: ColourDepth,
	pal: Option<PaletteRef>,
}

impl EgaLinear {
	/// Wrap an encoded image.
	pub fn new(
		content: SharedStream,
		offset: u64,
		dims: Point,
		planes: PlaneLayout,
		order: BitOrder,
		pal: Option<PaletteRef>,
	) -> Self {
		Self {
			content,
			offset,
			dims,
			planes,
			order,
			depth: ColourDepth::Ega,
			pal,
		}
	}

	/// Mark this image as CGA-depth (two planes carrying a 2bpp value).
	pub fn with_depth(mut self, depth: ColourDepth) -> Self {
		self.depth = depth;
		self
	}

	pub(crate) fn set_dims(&mut self, dims: Point) {
		self.dims = dims;
	}

	fn do_conversion(&mut self) -> Result<(Pixels, Pixels)> {
		let dims = self.dims;
		let mut pixels = vec![0u8; dims.area()];
		let mut mask = vec![0u8; dims.area()];

		self.content.seek(SeekFrom::Start(self.offset))?;
		let mut io = self.content.borrow_mut();
		let mut bits = BitReader::new(&mut *io, self.order);
		let mut idx = 0usize;
		for _y in 0..dims.y {
			for _x in 0..dims.x {
				for p in self.planes {
					if matches!(p, super::PlanePurpose::Unused) {
						break;
					}
					let bit = bits.read(1)? != 0;
					let Some(spec) = p.spec() else { break };
					if spec.value == 0 {
						continue;
					}
					if bit != spec.swap {
						let target = if spec.to_mask { &mut mask } else { &mut pixels };
						target[idx] |= spec.value;
					}
				}
				idx += 1;
			}
			// Rows always start on a byte boundary.
			bits.flush_byte();
		}
		Ok((pixels, mask))
	}
}

impl Image for EgaLinear {
	fn caps(&self) -> ImageCaps {
		if self.pal.is_some() { ImageCaps::HAS_PALETTE } else { ImageCaps::empty() }
	}

	fn colour_depth(&self) -> ColourDepth {
		self.depth
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
		let mut io = self.content.borrow_mut();
		let mut bits = BitWriter::new(&mut *io, self.order);
		let mut idx = 0usize;
		for _y in 0..dims.y {
			for _x in 0..dims.x {
				for p in self.planes {
					if matches!(p, super::PlanePurpose::Unused) {
						break;
					}
					let Some(spec) = p.spec() else { break };
					let bit = if spec.value == 0 {
						false
					} else {
						let source = if spec.to_mask { mask } else { pixels };
						(source[idx] & spec.value != 0) != spec.swap
					};
					bits.write(1, u32::from(bit))?;
				}
				idx += 1;
			}
			bits.flush_byte()?;
		}
		Ok(())
	}
}
