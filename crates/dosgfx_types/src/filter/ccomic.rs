//! Captain Comic full-screen image RLE.
//!
//! The stream opens with a 16-bit little-endian plane length, then codes:
//! a byte with the top bit set repeats the following byte `n & 0x7F` times,
//! a byte with the top bit clear copies the next `n` bytes verbatim.  The
//! expanded output is four consecutive planes of the advertised length.

use super::StreamFilter;
use crate::error::{Error, Result};

/// Plane length of a stock 320x200 image.
const PLANE_LEN: u16 = 8000;

/// Largest repeat count one code can carry.
const MAX_RLE_COUNT: u32 = 0x7F;

/// Largest number of continuous escaped bytes.
const MAX_ESCAPE_LEN: usize = 0x7F;

/// Expands Captain Comic RLE data.
#[derive(Debug, Default)]
pub struct CComicUnrle {
	len_block: u64,
	repeat: u32,
	escape: u32,
	val: u8,
	have_len: bool,
}

impl CComicUnrle {
	/// Create an expansion filter.
	pub fn new() -> Self {
		Self::default()
	}
}

impl StreamFilter for CComicUnrle {
	fn reset(&mut self, _len_input: u64) {
		self.len_block = 0;
		self.repeat = 0;
		self.escape = 0;
		self.have_len = false;
	}

	fn transform(&mut self, out: &mut [u8], input: &[u8]) -> Result<(usize, usize)> {
		let mut r = 0;
		let mut w = 0;

		if !self.have_len {
			if input.is_empty() {
				return Ok((0, 0));
			}
			if input.len() < 2 {
				return Err(Error::filter("no room to read plane size"));
			}
			let len = u64::from(u16::from_le_bytes([input[0], input[1]]));
			r += 2;
			self.len_block = len * 4; // four planes follow
			self.have_len = true;
		}

		while w < out.len() && self.len_block > 0 {
			// Drain pending repeats first.
			while w < out.len() && self.repeat > 0 && self.len_block > 0 {
				out[w] = self.val;
				w += 1;
				self.repeat -= 1;
				self.len_block -= 1;
			}

			// Then any verbatim bytes.
			while r < input.len() && w < out.len() && self.escape > 0 && self.len_block > 0 {
				out[w] = input[r];
				r += 1;
				w += 1;
				self.escape -= 1;
				self.len_block -= 1;
			}

			if self.repeat > 0 || self.escape > 0 || r >= input.len() {
				break;
			}

			let code = input[r];
			if code & 0x80 != 0 {
				if input.len() - r < 2 {
					// Repeat code split across the chunk boundary.
					break;
				}
				self.repeat = u32::from(code & 0x7F);
				self.val = input[r + 1];
				r += 2;
			} else {
				self.escape = u32::from(code);
				r += 1;
			}
		}
		Ok((r, w))
	}
}

/// Compresses four planes of data with Captain Comic RLE.
#[derive(Debug)]
pub struct CComicRle {
	plane_len: u16,
	val: u8,
	count: u32,
	written_size: bool,
	col: u64,
	escape_buf: Vec<u8>,
}

impl CComicRle {
	/// Create a compression filter for the stock full-screen plane length.
	pub fn new() -> Self {
		Self::with_plane_len(PLANE_LEN)
	}

	/// Create a compression filter with an explicit plane length.
	pub fn with_plane_len(plane_len: u16) -> Self {
		Self {
			plane_len,
			val: 0,
			count: 0,
			written_size: false,
			col: 0,
			escape_buf: Vec::new(),
		}
	}

	/// Flush as much buffered escape data as fits before the next plane
	/// boundary.  Returns false when the output buffer is too full to
	/// continue this round.
	fn write_escape_buf(&mut self, out: &mut [u8], w: &mut usize) -> bool {
		while !self.escape_buf.is_empty() {
			if *w + self.escape_buf.len() + 1 > out.len() {
				return false;
			}
			let plane_len = u64::from(self.plane_len);
			let to_boundary = plane_len - (self.col % plane_len);
			let len = self.escape_buf.len().min(to_boundary as usize);
			out[*w] = len as u8;
			*w += 1;
			out[*w..*w + len].copy_from_slice(&self.escape_buf[..len]);
			*w += len;
			self.col += len as u64;
			self.escape_buf.drain(..len);
		}
		true
	}
}

impl Default for CComicRle {
	fn default() -> Self {
		Self::new()
	}
}

impl StreamFilter for CComicRle {
	fn reset(&mut self, _len_input: u64) {
		self.val = 0;
		self.count = 0;
		self.written_size = false;
		self.col = 0;
		self.escape_buf.clear();
	}

	fn transform(&mut self, out: &mut [u8], input: &[u8]) -> Result<(usize, usize)> {
		let mut r = 0;
		let mut w = 0;
		if !self.written_size {
			if out.len() < 2 {
				return Err(Error::filter("no room to write plane size"));
			}
			out[..2].copy_from_slice(&self.plane_len.to_le_bytes());
			w += 2;
			self.written_size = true;
		}

		let plane_len = u64::from(self.plane_len);
		while w + 2 < out.len()
			&& (r < input.len()
				|| (input.is_empty() && (self.count > 0 || !self.escape_buf.is_empty())))
		{
			if r < input.len() && input[r] == self.val && self.count > 0 && self.count < MAX_RLE_COUNT
			{
				self.count += 1;
				r += 1;
				continue;
			}

			// Byte changed, input dry, or the count is at maximum.
			if self.count == 2 && !self.escape_buf.is_empty() {
				// Two repeats next to escape data pack tighter as escapes.
				self.escape_buf.push(self.val);
				self.escape_buf.push(self.val);
				self.count = 0;
			} else if self.count > 1 {
				if !self.write_escape_buf(out, &mut w) {
					break;
				}
				if out.len() - w < 2 {
					break;
				}
				if (self.col % plane_len) + u64::from(self.count) > plane_len {
					// Split the run at the plane boundary.
					let first = (plane_len - (self.col % plane_len)) as u32;
					out[w] = 0x80 | first as u8;
					out[w + 1] = self.val;
					w += 2;
					self.col += u64::from(first);
					self.count -= first;
					// Keep the remainder pending; later input may extend it.
					continue;
				}
				out[w] = 0x80 | self.count as u8;
				out[w + 1] = self.val;
				w += 2;
				self.col += u64::from(self.count);
				self.count = 0;
			}

			if self.count == 1 {
				if self.escape_buf.len() >= MAX_ESCAPE_LEN {
					if !self.write_escape_buf(out, &mut w) {
						break;
					}
				}
				self.escape_buf.push(self.val);
			}

			if r < input.len() {
				self.val = input[r];
				self.count = 1;
				r += 1;
			} else {
				self.count = 0;
			}

			if input.is_empty() && !self.write_escape_buf(out, &mut w) {
				break;
			}
		}
		Ok((r, w))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::filter::filter_vec;

	fn roundtrip(plane_len: u16, data: &[u8]) {
		assert_eq!(data.len(), usize::from(plane_len) * 4);
		let packed = filter_vec(&mut CComicRle::with_plane_len(plane_len), data).unwrap();
		let expanded = filter_vec(&mut CComicUnrle::new(), &packed).unwrap();
		assert_eq!(expanded, data);
	}

	#[test]
	fn test_expand_repeat_and_escape() {
		// Plane length 4: one repeat code and one escape block.
		let packed = [0x04, 0x00, 0x88, 0xAA, 0x04, 0x01, 0x02, 0x03, 0x04, 0x84, 0x55];
		let out = filter_vec(&mut CComicUnrle::new(), &packed).unwrap();
		assert_eq!(out, vec![0xAA; 8].iter().copied().chain([1, 2, 3, 4]).chain([0x55; 4]).collect::<Vec<_>>());
	}

	#[test]
	fn test_header_announces_plane_length() {
		let data = vec![7u8; 12];
		let packed = filter_vec(&mut CComicRle::with_plane_len(3), &data).unwrap();
		assert_eq!(&packed[..2], &[0x03, 0x00]);
	}

	#[test]
	fn test_runs_split_at_plane_boundary() {
		let data = vec![0x42u8; 16];
		let packed = filter_vec(&mut CComicRle::with_plane_len(4), &data).unwrap();
		assert_eq!(packed, vec![0x04, 0x00, 0x84, 0x42, 0x84, 0x42, 0x84, 0x42, 0x84, 0x42]);
	}

	#[test]
	fn test_roundtrip_mixed_content() {
		let mut data = Vec::new();
		for i in 0..64u32 {
			data.extend(std::iter::repeat_n((i % 5) as u8, 3));
			data.push(i as u8);
		}
		data.truncate(64 * 4);
		roundtrip(64, &data);
	}

	#[test]
	fn test_roundtrip_uncompressible() {
		let data: Vec<u8> = (0..32u8).collect();
		roundtrip(8, &data);
	}
}
