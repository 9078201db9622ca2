//! Vinyl Goddess From Mars tileset lookup-code compression.
//!
//! A compressed tileset is a tile count, then per-tile payloads where every
//! group of four pixels is replaced by a 16-bit code, then a dictionary of
//! four-byte pixel groups the codes index into.  Tiles come in two sizes:
//! solid (0x80 compressed / 0x100 expanded) and masked, where each code is
//! preceded by a mask byte (0xC0 compressed / 0x140 expanded).

use std::collections::HashMap;

use super::StreamFilter;
use crate::error::{Error, Result};

/// Compressed length of a solid tile.
const CSOLID_LEN: u16 = 0x80;
/// Expanded length of a solid tile.
const USOLID_LEN: u16 = 0x100;
/// Compressed length of a masked tile.
const CMASKED_LEN: u16 = 0xC0;
/// Expanded length of a masked tile.
const UMASKED_LEN: u16 = 0x140;

/// Expands a Vinyl tileset body.
///
/// The dictionary sits after the last tile, so the whole input has to be
/// buffered before any output can be produced.
#[derive(Debug, Default)]
pub struct VinylExpand {
	in_data: Vec<u8>,
	out_data: Option<Vec<u8>>,
	out_pos: usize,
}

impl VinylExpand {
	/// Create an expansion filter.
	pub fn new() -> Self {
		Self::default()
	}

	fn expand(&self) -> Result<Vec<u8>> {
		let data = &self.in_data;
		let rd_u16 = |pos: usize| -> Result<u16> {
			data.get(pos..pos + 2)
				.map(|b| u16::from_le_bytes([b[0], b[1]]))
				.ok_or_else(|| Error::filter("tileset body cut short"))
		};

		let num_tiles = rd_u16(0)?;
		let mut out = Vec::new();
		out.extend_from_slice(&num_tiles.to_le_bytes());

		// First pass over the tiles to find where the dictionary starts.
		let mut offsets = Vec::with_capacity(usize::from(num_tiles));
		let mut pos = 2usize;
		for _ in 0..num_tiles {
			offsets.push(pos);
			let size = rd_u16(pos)?;
			pos += usize::from(size) + 2;
		}

		let len_dict = rd_u16(pos)?;
		let dict_start = pos + 2;
		let dict = data
			.get(dict_start..dict_start + usize::from(len_dict))
			.ok_or_else(|| Error::filter("lookup dictionary cut short"))?;

		for offset in offsets {
			let in_size = rd_u16(offset)?;
			let out_size = match in_size {
				CSOLID_LEN => USOLID_LEN,
				CMASKED_LEN => UMASKED_LEN,
				_ => {
					return Err(Error::filter(
						"unknown tile type (length is neither solid nor masked)",
					));
				}
			};
			out.extend_from_slice(&out_size.to_le_bytes());

			let mut pos = offset + 2;
			let mut i = 0;
			while i < usize::from(in_size) {
				if in_size == CMASKED_LEN {
					// Mask byte passes through unchanged.
					out.push(data[pos]);
					pos += 1;
					i += 1;
				}
				let mut code = usize::from(rd_u16(pos)?);
				pos += 2;
				i += 2;
				if code * 4 + 4 > dict.len() {
					code = 0;
				}
				out.extend_from_slice(&dict[code * 4..code * 4 + 4]);
			}
		}
		Ok(out)
	}
}

impl StreamFilter for VinylExpand {
	fn reset(&mut self, len_input: u64) {
		self.in_data = Vec::with_capacity(len_input as usize);
		self.out_data = None;
		self.out_pos = 0;
	}

	fn transform(&mut self, out: &mut [u8], input: &[u8]) -> Result<(usize, usize)> {
		if !input.is_empty() {
			// Keep buffering until the input is complete.
			self.in_data.extend_from_slice(input);
			return Ok((input.len(), 0));
		}
		if self.out_data.is_none() {
			self.out_data = Some(self.expand()?);
		}
		let data = self.out_data.as_ref().expect("expanded above");
		let n = out.len().min(data.len() - self.out_pos);
		out[..n].copy_from_slice(&data[self.out_pos..self.out_pos + n]);
		self.out_pos += n;
		Ok((0, n))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
	Count,
	Tiles,
	LookupLen,
	LookupData,
	Done,
}

/// Compresses a Vinyl tileset body.
///
/// The dictionary grows as tiles stream through; the first occurrence of a
/// four-byte pixel group claims the next free code.
#[derive(Debug)]
pub struct VinylCompress {
	phase: Phase,
	num_tiles: u16,
	codes: Vec<[u8; 4]>,
	index: HashMap<[u8; 4], u16>,
	emitted: usize,
}

impl VinylCompress {
	/// Create a compression filter.
	pub fn new() -> Self {
		Self {
			phase: Phase::Count,
			num_tiles: 0,
			codes: Vec::new(),
			index: HashMap::new(),
			emitted: 0,
		}
	}

	fn code_for(&mut self, group: [u8; 4]) -> u16 {
		if let Some(&code) = self.index.get(&group) {
			return code;
		}
		let code = self.codes.len() as u16;
		self.codes.push(group);
		self.index.insert(group, code);
		code
	}
}

impl Default for VinylCompress {
	fn default() -> Self {
		Self::new()
	}
}

impl StreamFilter for VinylCompress {
	fn reset(&mut self, _len_input: u64) {
		self.phase = Phase::Count;
		self.num_tiles = 0;
		self.codes.clear();
		self.index.clear();
		self.emitted = 0;
	}

	fn transform(&mut self, out: &mut [u8], input: &[u8]) -> Result<(usize, usize)> {
		let mut r = 0;
		let mut w = 0;

		match self.phase {
			Phase::Count => {
				if input.len() < 2 || out.len() < 2 {
					return Ok((0, 0));
				}
				out[..2].copy_from_slice(&input[..2]);
				self.num_tiles = u16::from_le_bytes([input[0], input[1]]);
				r += 2;
				w += 2;
				self.phase = if self.num_tiles == 0 { Phase::LookupLen } else { Phase::Tiles };
			}

			Phase::Tiles => loop {
				let Some(head) = input.get(r..r + 2) else { break };
				let len_tile = usize::from(u16::from_le_bytes([head[0], head[1]]));
				// Wait until the whole tile is available.
				if input.len() - r < len_tile + 2 {
					break;
				}
				if out.len() - w < len_tile + 2 {
					break;
				}
				let out_size = match len_tile as u16 {
					USOLID_LEN => CSOLID_LEN,
					UMASKED_LEN => CMASKED_LEN,
					_ => {
						return Err(Error::filter(
							"unknown tile type (length is neither solid nor masked)",
						));
					}
				};
				r += 2;
				out[w..w + 2].copy_from_slice(&out_size.to_le_bytes());
				w += 2;

				let masked = len_tile == usize::from(UMASKED_LEN);
				let mut i = 0;
				while i < len_tile {
					if masked {
						out[w] = input[r];
						r += 1;
						w += 1;
						i += 1;
					}
					let group = [input[r], input[r + 1], input[r + 2], input[r + 3]];
					let code = self.code_for(group);
					out[w..w + 2].copy_from_slice(&code.to_le_bytes());
					r += 4;
					w += 2;
					i += 4;
				}

				self.num_tiles -= 1;
				if self.num_tiles == 0 {
					self.phase = Phase::LookupLen;
					break;
				}
			},

			Phase::LookupLen => {
				if out.len() < 2 {
					return Ok((0, 0));
				}
				let len = (self.codes.len() * 4) as u16;
				out[..2].copy_from_slice(&len.to_le_bytes());
				w += 2;
				self.phase = Phase::LookupData;
			}

			Phase::LookupData => {
				while self.emitted < self.codes.len() && out.len() - w >= 4 {
					out[w..w + 4].copy_from_slice(&self.codes[self.emitted]);
					w += 4;
					self.emitted += 1;
				}
				if self.emitted == self.codes.len() {
					self.phase = Phase::Done;
				}
			}

			Phase::Done => {}
		}
		Ok((r, w))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::filter::{filter_vec, filter_vec_strict};

	fn solid_tile(groups: &[[u8; 4]]) -> Vec<u8> {
		assert_eq!(groups.len() * 4, usize::from(USOLID_LEN));
		let mut tile = USOLID_LEN.to_le_bytes().to_vec();
		for g in groups {
			tile.extend_from_slice(g);
		}
		tile
	}

	#[test]
	fn test_compress_builds_dictionary_first_seen_wins() {
		let mut body = 1u16.to_le_bytes().to_vec();
		let mut groups = vec![[1, 2, 3, 4]; 63];
		groups.push([9, 9, 9, 9]);
		body.extend(solid_tile(&groups));

		let packed = filter_vec_strict(&mut VinylCompress::new(), &body).unwrap();
		assert_eq!(&packed[..2], &[1, 0]);
		assert_eq!(&packed[2..4], &CSOLID_LEN.to_le_bytes());
		// 63 references to code 0, one to code 1.
		assert_eq!(&packed[4..6], &[0, 0]);
		assert_eq!(&packed[4 + 63 * 2..4 + 64 * 2], &[1, 0]);
		// Dictionary: 2 entries of 4 bytes.
		let dict_at = 4 + 64 * 2;
		assert_eq!(&packed[dict_at..dict_at + 2], &8u16.to_le_bytes());
		assert_eq!(&packed[dict_at + 2..dict_at + 6], &[1, 2, 3, 4]);
		assert_eq!(&packed[dict_at + 6..dict_at + 10], &[9, 9, 9, 9]);
	}

	#[test]
	fn test_roundtrip_solid_and_masked() {
		let mut body = 2u16.to_le_bytes().to_vec();

		let groups: Vec<[u8; 4]> = (0..64u8).map(|i| [i, i ^ 0x5A, i / 3, 7]).collect();
		body.extend(solid_tile(&groups));

		// Masked tile: mask byte before every four-pixel group.
		body.extend_from_slice(&UMASKED_LEN.to_le_bytes());
		for i in 0..64u8 {
			body.push(i & 1);
			body.extend_from_slice(&[i, i, 0xFF - i, 3]);
		}

		let packed = filter_vec_strict(&mut VinylCompress::new(), &body).unwrap();
		let expanded = filter_vec_strict(&mut VinylExpand::new(), &packed).unwrap();
		assert_eq!(expanded, body);
	}

	#[test]
	fn test_empty_tileset() {
		let body = 0u16.to_le_bytes().to_vec();
		let packed = filter_vec(&mut VinylCompress::new(), &body).unwrap();
		assert_eq!(packed, vec![0, 0, 0, 0]);
		let expanded = filter_vec(&mut VinylExpand::new(), &packed).unwrap();
		assert_eq!(expanded, body);
	}

	#[test]
	fn test_bad_tile_length_rejected() {
		let mut body = 1u16.to_le_bytes().to_vec();
		body.extend_from_slice(&5u16.to_le_bytes());
		body.extend_from_slice(&[0; 5]);
		assert!(filter_vec_strict(&mut VinylCompress::new(), &body).is_err());
	}
}
