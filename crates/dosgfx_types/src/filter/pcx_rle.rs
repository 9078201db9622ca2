//! PCX run-length encoding.
//!
//! A byte with the top two bits set carries a repeat count in its low six
//! bits, followed by the value to emit; any other byte is a literal.  Since
//! literals `>= 0xC0` would be mistaken for counts, the compressor always
//! escapes them as a count-of-one run.  Runs never cross a scanline boundary.

use super::StreamFilter;
use crate::error::Result;

/// Expands PCX RLE data.
#[derive(Debug, Default)]
pub struct PcxUnrle {
	val: u8,
	count: u32,
}

impl PcxUnrle {
	/// Create an expansion filter.
	pub fn new() -> Self {
		Self::default()
	}
}

impl StreamFilter for PcxUnrle {
	fn reset(&mut self, _len_input: u64) {
		self.count = 0;
	}

	fn transform(&mut self, out: &mut [u8], input: &[u8]) -> Result<(usize, usize)> {
		let mut r = 0;
		let mut w = 0;
		while w < out.len() && (r < input.len() || self.count > 0) {
			// Decode codes until a byte is pending or input runs dry.
			while self.count == 0 && r < input.len() {
				let b = input[r];
				if b & 0xC0 == 0xC0 {
					if input.len() - r < 2 {
						// Count byte with no value byte yet; wait for more
						// input rather than consuming half a code.
						return Ok((r, w));
					}
					self.count = u32::from(b & 0x3F);
					self.val = input[r + 1];
					r += 2;
				} else {
					self.val = b;
					self.count = 1;
					r += 1;
				}
			}

			while w < out.len() && self.count > 0 {
				out[w] = self.val;
				w += 1;
				self.count -= 1;
			}
		}
		Ok((r, w))
	}
}

/// Compresses bytes with PCX RLE.
#[derive(Debug)]
pub struct PcxRle {
	val: u8,
	count: u32,
	len_scanline: u64,
	pos_scanline: u64,
}

impl PcxRle {
	/// Create a compression filter that splits runs at multiples of
	/// `len_scanline` bytes.
	pub fn new(len_scanline: u64) -> Self {
		assert!(len_scanline > 0);
		Self {
			val: 0,
			count: 0,
			len_scanline,
			pos_scanline: 0,
		}
	}

	fn emit(&mut self, out: &mut [u8], w: &mut usize) {
		if self.count > 2 || (self.count > 0 && self.val >= 0xC0) {
			debug_assert!(self.count < 64);
			out[*w] = 0xC0 | self.count as u8;
			out[*w + 1] = self.val;
			*w += 2;
		} else if self.count == 2 {
			out[*w] = self.val;
			out[*w + 1] = self.val;
			*w += 2;
		} else if self.count == 1 {
			out[*w] = self.val;
			*w += 1;
		}
		// count == 0 means nothing is pending yet
	}
}

impl StreamFilter for PcxRle {
	fn reset(&mut self, _len_input: u64) {
		self.val = 0;
		self.count = 0;
		self.pos_scanline = 0;
	}

	fn transform(&mut self, out: &mut [u8], input: &[u8]) -> Result<(usize, usize)> {
		let mut r = 0;
		let mut w = 0;
		// The +2 keeps room for a whole RLE pair on every iteration.
		while w + 2 < out.len() && (r < input.len() || self.count > 0) {
			let eof = r >= input.len();
			let at_boundary =
				self.pos_scanline != 0 && self.pos_scanline.is_multiple_of(self.len_scanline);
			if !eof && self.count < 63 && self.count > 0 && input[r] == self.val && !at_boundary {
				r += 1;
				self.count += 1;
				self.pos_scanline += 1;
			} else {
				// Value changed, count maxed, scanline ended or input dry:
				// write out the pending run.
				self.emit(out, &mut w);
				if eof {
					self.count = 0;
				} else {
					self.val = input[r];
					r += 1;
					self.count = 1;
					self.pos_scanline += 1;
				}
			}
		}
		Ok((r, w))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::filter::filter_vec;

	fn compress(data: &[u8], scanline: u64) -> Vec<u8> {
		filter_vec(&mut PcxRle::new(scanline), data).unwrap()
	}

	fn expand(data: &[u8]) -> Vec<u8> {
		filter_vec(&mut PcxUnrle::new(), data).unwrap()
	}

	#[test]
	fn test_expand_runs_and_literals() {
		assert_eq!(expand(&[0xC8, 0x0F]), vec![0x0F; 8]);
		assert_eq!(expand(&[0x0C, 0xC6, 0x00, 0x0A]), vec![0x0C, 0, 0, 0, 0, 0, 0, 0x0A]);
	}

	#[test]
	fn test_compress_escapes_high_literals() {
		// A lone 0xC5 byte cannot be written literally.
		assert_eq!(compress(&[0xC5], 80), vec![0xC1, 0xC5]);
	}

	#[test]
	fn test_runs_never_cross_scanlines() {
		let data = vec![0x0F; 48];
		assert_eq!(compress(&data, 12), vec![0xCC, 0x0F, 0xCC, 0x0F, 0xCC, 0x0F, 0xCC, 0x0F]);
	}

	#[test]
	fn test_two_repeats_stay_literal() {
		assert_eq!(compress(&[5, 5, 9], 80), vec![5, 5, 9]);
	}

	#[test]
	fn test_roundtrip() {
		let data: Vec<u8> = (0..=255u8)
			.flat_map(|b| std::iter::repeat_n(b, usize::from(b % 7) + 1))
			.collect();
		let packed = compress(&data, data.len() as u64);
		assert_eq!(expand(&packed), data);
	}

	#[test]
	fn test_roundtrip_long_runs() {
		let data = vec![0xAB; 500];
		let packed = compress(&data, data.len() as u64);
		assert_eq!(expand(&packed), data);
	}
}
