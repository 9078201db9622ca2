//! Row-planar EGA image codec.
//!
//! Identical bit semantics to the byte-planar codec, but each row stores a
//! full row's worth of one plane before the next plane begins: the loop
//! order is (row, plane, group) instead of (row, group, plane).

use std::io::SeekFrom;

use super::ega::{PlaneLayout, has_mask_plane};
use super::{ColourDepth, Image, ImageCaps, Pixels, Point, check_buffer_sizes};
use crate::error::Result;
use crate::pal::PaletteRef;
use crate::stream::{SharedStream, Stream, StreamExt};

/// An image stored as row-interleaved EGA planes.
pub struct EgaRowPlanar {
	content: SharedStream,
	offset: u64,
	dims: Point,
	planes: PlaneLayout,
	pal: Option<PaletteRef>,
}

impl EgaRowPlanar {
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

	pub(crate) fn set_dims(&mut self, dims: Point) {
		self.dims = dims;
	}

	fn do_conversion(&mut self) -> Result<(Pixels, Pixels)> {
		let dims = self.dims;
		let mut pixels = vec![0u8; dims.area()];
		let mut mask = vec![0u8; dims.area()];

		self.content.seek(SeekFrom::Start(self.offset))?;
		let mut row_start = 0usize;
		for _y in 0..dims.y {
			for p in self.planes {
				let Some(spec) = p.spec() else { continue };
				for x in (0..dims.x).step_by(8) {
					let valid = (dims.x - x).min(8) as usize;
					let byte = self.content.read_u8()?;
					if spec.value == 0 {
						continue;
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

impl Image for EgaRowPlanar {
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
			for p in self.planes {
				let Some(spec) = p.spec() else { continue };
				for x in (0..dims.x).step_by(8) {
					let valid = (dims.x - x).min(8) as usize;
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

#[cfg(test)]
mod tests {
	use super::*;
	use crate::image::PlanePurpose;
	use crate::stream::{MemStream, shared};

	const IRGB: PlaneLayout = [
		PlanePurpose::Intensity1,
		PlanePurpose::Red1,
		PlanePurpose::Green1,
		PlanePurpose::Blue1,
		PlanePurpose::Unused,
		PlanePurpose::Unused,
	];

	#[test]
	fn test_plane_order_within_row() {
		// 8x1, pixel 0 = 0x08 (intensity only), pixel 7 = 0x01 (blue only).
		let pixels = [0x08, 0, 0, 0, 0, 0, 0, 0x01];
		let content = shared(MemStream::new());
		let mut img = EgaRowPlanar::new(content.clone(), 0, Point::new(8, 1), IRGB, None);
		img.encode(&pixels, &[0; 8]).unwrap();

		let mut io = content.borrow_mut();
		io.seek(SeekFrom::Start(0)).unwrap();
		assert_eq!(io.read_to_end().unwrap(), vec![0x80, 0x00, 0x00, 0x01]);
	}

	#[test]
	fn test_roundtrip_16x16() {
		let pixels: Pixels = (0..256u32).map(|i| (i % 16) as u8).collect();
		let content = shared(MemStream::new());
		let mut img = EgaRowPlanar::new(content, 0, Point::new(16, 16), IRGB, None);
		img.encode(&pixels, &[0; 256]).unwrap();
		assert_eq!(img.decode().unwrap(), pixels);
		assert_eq!(img.decode_mask().unwrap(), vec![0u8; 256]);
	}

	#[test]
	fn test_differs_from_byteplanar_layout() {
		use crate::image::EgaBytePlanar;

		let pixels: Pixels = (0..32u8).map(|i| i % 16).collect();
		let rp = shared(MemStream::new());
		EgaRowPlanar::new(rp.clone(), 0, Point::new(16, 2), IRGB, None)
			.encode(&pixels, &[0; 32])
			.unwrap();
		let bp = shared(MemStream::new());
		EgaBytePlanar::new(bp.clone(), 0, Point::new(16, 2), IRGB, None)
			.encode(&pixels, &[0; 32])
			.unwrap();

		let mut a = rp.borrow_mut();
		let mut b = bp.borrow_mut();
		a.seek(SeekFrom::Start(0)).unwrap();
		b.seek(SeekFrom::Start(0)).unwrap();
		assert_ne!(a.read_to_end().unwrap(), b.read_to_end().unwrap());
	}
}
