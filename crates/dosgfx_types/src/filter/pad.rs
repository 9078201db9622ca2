//! Fixed-position padding insertion and removal.
//!
//! Some formats interrupt their payload with a fixed byte string at regular
//! intervals (Dangerous Dave inserts a single zero after every 64 KiB).
//! [`BlockPad`] injects the string on write, [`BlockUnpad`] strips it on read.

use super::StreamFilter;
use crate::error::{Error, Result};

/// Inserts a pad string after every `len_pad_pos` bytes of payload.
#[derive(Debug)]
pub struct BlockPad {
	pad_data: Vec<u8>,
	len_pad_pos: u64,
	len_processed: u64,
}

impl BlockPad {
	/// Create a padding filter.
	pub fn new(pad_data: Vec<u8>, len_pad_pos: u64) -> Self {
		assert!(len_pad_pos > 0);
		Self {
			pad_data,
			len_pad_pos,
			len_processed: 0,
		}
	}
}

impl StreamFilter for BlockPad {
	fn reset(&mut self, _len_input: u64) {
		self.len_processed = 0;
	}

	fn transform(&mut self, out: &mut [u8], input: &[u8]) -> Result<(usize, usize)> {
		let mut r = 0;
		let mut w = 0;

		if self.len_processed >= self.len_pad_pos {
			if self.pad_data.len() > out.len() {
				return Err(Error::filter("output buffer too small for padding data"));
			}
			out[..self.pad_data.len()].copy_from_slice(&self.pad_data);
			w += self.pad_data.len();
			self.len_processed = 0;
		}

		let until_pad = (self.len_pad_pos - self.len_processed) as usize;
		let n = input.len().min(until_pad).min(out.len() - w);
		out[w..w + n].copy_from_slice(&input[..n]);
		r += n;
		w += n;
		self.len_processed += n as u64;

		Ok((r, w))
	}
}

/// Discards `len_pad_data` bytes after every `len_pad_pos` bytes of payload.
#[derive(Debug)]
pub struct BlockUnpad {
	len_pad_data: u64,
	len_pad_pos: u64,
	len_processed: u64,
}

impl BlockUnpad {
	/// Create an unpadding filter.
	pub fn new(len_pad_data: u64, len_pad_pos: u64) -> Self {
		assert!(len_pad_pos > 0);
		Self {
			len_pad_data,
			len_pad_pos,
			len_processed: 0,
		}
	}
}

impl StreamFilter for BlockUnpad {
	fn reset(&mut self, _len_input: u64) {
		self.len_processed = 0;
	}

	fn transform(&mut self, out: &mut [u8], input: &[u8]) -> Result<(usize, usize)> {
		if input.is_empty() {
			return Ok((0, 0));
		}
		let mut r = 0;
		let mut w = 0;

		if self.len_processed >= self.len_pad_pos {
			let skip = self.len_pad_data as usize;
			if skip > input.len() {
				return Err(Error::filter("input ends inside padding data"));
			}
			r += skip;
			self.len_processed = 0;
		}

		let until_pad = (self.len_pad_pos - self.len_processed) as usize;
		let n = (input.len() - r).min(until_pad).min(out.len() - w);
		out[w..w + n].copy_from_slice(&input[r..r + n]);
		r += n;
		w += n;
		self.len_processed += n as u64;

		Ok((r, w))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::filter::filter_vec;

	#[test]
	fn test_pad_inserts_between_blocks() {
		let data = vec![1u8; 10];
		let padded = filter_vec(&mut BlockPad::new(vec![0], 4), &data).unwrap();
		assert_eq!(padded, vec![1, 1, 1, 1, 0, 1, 1, 1, 1, 0, 1, 1]);
	}

	#[test]
	fn test_unpad_strips_between_blocks() {
		let padded = vec![1, 1, 1, 1, 0, 1, 1, 1, 1, 0, 1, 1];
		let data = filter_vec(&mut BlockUnpad::new(1, 4), &padded).unwrap();
		assert_eq!(data, vec![1u8; 10]);
	}

	#[test]
	fn test_roundtrip_across_many_boundaries() {
		let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
		let padded = filter_vec(&mut BlockPad::new(b"XY".to_vec(), 333), &data).unwrap();
		let back = filter_vec(&mut BlockUnpad::new(2, 333), &padded).unwrap();
		assert_eq!(back, data);
	}

	#[test]
	fn test_roundtrip_exact_multiple() {
		let data = vec![7u8; 8];
		let padded = filter_vec(&mut BlockPad::new(vec![0], 4), &data).unwrap();
		let back = filter_vec(&mut BlockUnpad::new(1, 4), &padded).unwrap();
		assert_eq!(back, data);
	}
}
