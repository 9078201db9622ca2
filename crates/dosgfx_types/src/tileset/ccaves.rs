//! Crystal Caves concatenated tilesets (also used by Secret Agent).
//!
//! The top-level file is a run of sub-tilesets, each introduced by a
//! three-byte header: tile count, width in bytes, height in rows.  Tiles
//! inside a sub-tileset are byte-planar EGA images with five planes
//! (transparency plus four colour planes), all sharing the header's
//! dimensions.  Secret Agent uses the same layout but pads every
//! sub-tileset out to a fixed block size.

use std::io::SeekFrom;
use std::rc::Rc;

use super::fat::NoRecords;
use super::{Attributes, EntryRef, FatCore, FatEntry, FatHooks, Tileset, TilesetCaps};
use crate::error::{Error, Result};
use crate::image::{
	ColourDepth, EgaBytePlanar, Image, PlaneCount, PlaneLayout, PlanePurpose, Point,
};
use crate::pal::PaletteRef;
use crate::registry::{Certainty, TilesetFormat};
use crate::stream::{SharedStream, Stream, StreamExt, shared};
use crate::supp::SuppData;

/// Type tag of sub-tileset entries in the main file.
const FILETYPE_MAIN: &str = "tileset/ccaves-sub";
/// Type tag of tile entries in a sub-tileset.
const FILETYPE_SUB: &str = "tile/ccaves";

/// Safety cap against corrupted headers.
const MAX_TILESET_COUNT: usize = 1024;

/// Header length of a sub-tileset.
const SUB_HEADER_LEN: u64 = 3;

fn layout_for(num_planes: PlaneCount) -> PlaneLayout {
	[
		match num_planes {
			PlaneCount::Masked => PlanePurpose::Opaque1,
			PlaneCount::Solid => PlanePurpose::Unused,
		},
		PlanePurpose::Blue1,
		PlanePurpose::Green1,
		PlanePurpose::Red1,
		PlanePurpose::Intensity1,
		PlanePurpose::Unused,
	]
}

//
// CCavesMain
//

/// The top-level tileset-of-tilesets.
pub struct CCavesMain {
	core: FatCore,
	num_planes: PlaneCount,
	pad: u64,
}

impl CCavesMain {
	/// Parse a main tileset file.  `pad` is the trailing padding after each
	/// sub-tileset body (zero for Crystal Caves).
	pub fn new(content: SharedStream, num_planes: PlaneCount, pad: u64) -> Result<Self> {
		let tls = Self {
			core: FatCore::new(content, 0, NoRecords),
			num_planes,
			pad,
		};

		let len = tls.core.content.size();
		if len == 0 {
			return Ok(tls);
		}
		if len < SUB_HEADER_LEN {
			return Err(Error::format("file too short"));
		}

		let mut io = tls.core.content.clone();
		io.seek(SeekFrom::Start(0))?;
		let mut pos = 0u64;
		let mut index = 0usize;
		while pos < len {
			let num_tiles = io.read_u8()?;
			let width_bytes = io.read_u8()?;
			let height = io.read_u8()?;
			let stored = u64::from(width_bytes)
				* u64::from(height)
				* (num_planes as u64)
				* u64::from(num_tiles)
				+ SUB_HEADER_LEN + pad;
			if pos + stored > len {
				return Err(Error::format("sub-tileset runs past end of file"));
			}
			tls.core.push_entry(FatEntry {
				valid: true,
				index,
				offset: pos,
				stored_size: stored,
				real_size: stored,
				len_header: 0,
				attr: Attributes::FOLDER,
				type_tag: FILETYPE_MAIN.to_string(),
				name: None,
			});
			io.seek(SeekFrom::Current(stored as i64 - SUB_HEADER_LEN as i64))?;
			pos += stored;
			index += 1;
			if index > MAX_TILESET_COUNT {
				return Err(Error::format("too many tilesets or corrupted graphics file"));
			}
		}
		Ok(tls)
	}
}

impl Tileset for CCavesMain {
	fn caps(&self) -> TilesetCaps {
		TilesetCaps::empty()
	}

	fn colour_depth(&self) -> ColourDepth {
		ColourDepth::Ega
	}

	fn entries(&self) -> Vec<EntryRef> {
		self.core.entries()
	}

	fn layout_width(&self) -> u32 {
		1
	}

	fn open_image(&self, _id: &EntryRef) -> Result<Box<dyn Image>> {
		Err(Error::format("entries of a main tileset are sub-tilesets, not images"))
	}

	fn open_tileset(&self, id: &EntryRef) -> Result<Box<dyn Tileset>> {
		let window = self.core.open_entry(id, true)?;
		// Trailing padding is not tile data; tell the sub-tileset where its
		// body ends.
		let body = window.size() - self.pad;
		let sub = CCavesSub::with_body_len(shared(window), self.num_planes, None, Some(body))?;
		Ok(Box::new(sub))
	}

	fn insert(&mut self, before: Option<&EntryRef>, attr: Attributes) -> Result<EntryRef> {
		let handle = self.core.insert(
			before,
			SUB_HEADER_LEN + self.pad,
			FILETYPE_MAIN,
			attr | Attributes::FOLDER,
		)?;
		// A fresh sub-tileset starts out empty with 8x8 tiles.
		let offset = handle.borrow().offset;
		let mut io = self.core.content.clone();
		io.seek(SeekFrom::Start(offset))?;
		io.write(&[0, 1, 8])?;
		Ok(handle)
	}

	fn remove(&mut self, id: &EntryRef) -> Result<()> {
		self.core.remove(id)
	}

	fn resize(&mut self, id: &EntryRef, new_stored: u64, new_real: u64) -> Result<()> {
		// Sub-tilesets can only grow or shrink in whole tiles.
		let offset = id.borrow().offset;
		let mut io = self.core.content.clone();
		let (width_bytes, height) = if io.size() >= offset + SUB_HEADER_LEN {
			io.seek(SeekFrom::Start(offset + 1))?;
			(io.read_u8()?, io.read_u8()?)
		} else {
			(1, 8)
		};
		let tile_size = u64::from(width_bytes) * u64::from(height) * (self.num_planes as u64);
		let body = new_stored
			.checked_sub(SUB_HEADER_LEN + self.pad)
			.ok_or_else(|| Error::format("sub-tileset too small for its header"))?;
		if tile_size > 0 && !body.is_multiple_of(tile_size) {
			return Err(Error::format(
				"sub-tilesets can only be resized in units of whole tiles",
			));
		}

		self.core.resize(id, new_stored, new_real)?;

		// Rewrite the header so the tile count matches even if nothing gets
		// written to the new space.
		if tile_size > 0 {
			let count = (body / tile_size) as u8;
			io.seek(SeekFrom::Start(offset))?;
			io.write(&[count, width_bytes, height])?;
		}
		Ok(())
	}

	fn flush(&mut self) -> Result<()> {
		self.core.content.flush()
	}
}

//
// CCavesSub
//

struct SubHooks;

impl FatHooks for SubHooks {
	fn pre_insert(
		&mut self,
		io: &mut dyn Stream,
		entries: &[EntryRef],
		_new_entry: &mut FatEntry,
	) -> Result<()> {
		if entries.len() >= 255 {
			return Err(Error::format("maximum number of tiles reached"));
		}
		io.seek(SeekFrom::Start(0))?;
		io.write_u8(entries.len() as u8 + 1)
	}

	fn post_remove(&mut self, io: &mut dyn Stream, entries: &[EntryRef]) -> Result<()> {
		io.seek(SeekFrom::Start(0))?;
		io.write_u8(entries.len() as u8)
	}
}

/// A sub-tileset holding same-sized byte-planar EGA tiles.
pub struct CCavesSub {
	core: FatCore,
	dims: Point,
	len_tile: u64,
	num_planes: PlaneCount,
	pal: Option<PaletteRef>,
}

impl CCavesSub {
	/// Parse a sub-tileset from its own stream.
	pub fn new(
		content: SharedStream,
		num_planes: PlaneCount,
		pal: Option<PaletteRef>,
	) -> Result<Self> {
		Self::with_body_len(content, num_planes, pal, None)
	}

	/// Parse a sub-tileset, trusting only the first `body_len` bytes (used
	/// when the stream still carries trailing padding).
	fn with_body_len(
		content: SharedStream,
		num_planes: PlaneCount,
		pal: Option<PaletteRef>,
		body_len: Option<u64>,
	) -> Result<Self> {
		let len = body_len.unwrap_or_else(|| content.size());
		if len < SUB_HEADER_LEN {
			return Err(Error::format("file too short"));
		}

		let mut tls = Self {
			core: FatCore::new(content, SUB_HEADER_LEN, SubHooks),
			dims: Point::new(0, 0),
			len_tile: 0,
			num_planes,
			pal,
		};

		let mut io = tls.core.content.clone();
		io.seek(SeekFrom::Start(0))?;
		let num_images = io.read_u8()?;
		let width_bytes = io.read_u8()?;
		let height = io.read_u8()?;
		tls.dims = Point::new(u32::from(width_bytes) * 8, u32::from(height));
		tls.len_tile = u64::from(width_bytes) * u64::from(height) * (num_planes as u64);

		for i in 0..usize::from(num_images) {
			tls.core.push_entry(FatEntry {
				valid: true,
				index: i,
				offset: SUB_HEADER_LEN + i as u64 * tls.len_tile,
				stored_size: tls.len_tile,
				real_size: tls.len_tile,
				len_header: 0,
				attr: Attributes::empty(),
				type_tag: FILETYPE_SUB.to_string(),
				name: None,
			});
		}
		Ok(tls)
	}

	/// Size of one encoded tile in bytes.
	pub fn tile_len(&self) -> u64 {
		self.len_tile
	}
}

impl Tileset for CCavesSub {
	fn caps(&self) -> TilesetCaps {
		let mut caps = TilesetCaps::CHANGE_DIMENSIONS;
		if self.pal.is_some() {
			caps |= TilesetCaps::HAS_PALETTE;
		}
		caps
	}

	fn colour_depth(&self) -> ColourDepth {
		ColourDepth::Ega
	}

	fn entries(&self) -> Vec<EntryRef> {
		self.core.entries()
	}

	fn dimensions(&self) -> Point {
		self.dims
	}

	fn set_dimensions(&mut self, new_dims: Point) -> Result<()> {
		if !new_dims.x.is_multiple_of(8) {
			return Err(Error::format("width must be a multiple of 8"));
		}
		let width_bytes = new_dims.x / 8;
		self.dims = new_dims;
		self.len_tile =
			u64::from(width_bytes) * u64::from(new_dims.y) * (self.num_planes as u64);

		let mut io = self.core.content.clone();
		io.seek(SeekFrom::Start(1))?;
		io.write(&[width_bytes as u8, new_dims.y as u8])?;

		// Every tile changes size in place; content is not preserved.
		let entries = self.core.entries();
		for (i, e) in entries.iter().enumerate() {
			let mut e = e.borrow_mut();
			e.offset = SUB_HEADER_LEN + i as u64 * self.len_tile;
			e.stored_size = self.len_tile;
			e.real_size = self.len_tile;
		}
		io.truncate(SUB_HEADER_LEN + entries.len() as u64 * self.len_tile)
	}

	fn layout_width(&self) -> u32 {
		10
	}

	fn open_image(&self, id: &EntryRef) -> Result<Box<dyn Image>> {
		let window = self.core.open_entry(id, true)?;
		Ok(Box::new(EgaBytePlanar::new(
			shared(window),
			0,
			self.dims,
			layout_for(self.num_planes),
			self.pal.clone(),
		)))
	}

	fn open_tileset(&self, _id: &EntryRef) -> Result<Box<dyn Tileset>> {
		Err(Error::format("tiles cannot be opened as tilesets"))
	}

	fn insert(&mut self, before: Option<&EntryRef>, attr: Attributes) -> Result<EntryRef> {
		self.core.insert(before, self.len_tile, FILETYPE_SUB, attr)
	}

	fn remove(&mut self, id: &EntryRef) -> Result<()> {
		self.core.remove(id)
	}

	fn resize(&mut self, id: &EntryRef, new_stored: u64, new_real: u64) -> Result<()> {
		self.core.resize(id, new_stored, new_real)
	}

	fn palette(&self) -> Option<PaletteRef> {
		self.pal.clone()
	}

	fn set_palette(&mut self, new_palette: PaletteRef) -> Result<()> {
		self.pal = Some(Rc::clone(&new_palette));
		Ok(())
	}

	fn flush(&mut self) -> Result<()> {
		self.core.content.flush()
	}
}

//
// Format descriptors
//

/// The concatenated main tileset format, parameterised by padding for the
/// Secret Agent variants.
pub struct CCavesMainFormat {
	code: &'static str,
	name: &'static str,
	games: &'static [&'static str],
	pad: u64,
}

impl CCavesMainFormat {
	/// Crystal Caves, no padding.
	pub fn ccaves() -> Self {
		Self {
			code: "tls-ccaves-main",
			name: "Crystal Caves Concatenated Tileset",
			games: &["Crystal Caves"],
			pad: 0,
		}
	}

	/// Secret Agent 8x8 tiles, 2 KiB pad blocks.
	pub fn sagent_2k() -> Self {
		Self {
			code: "tls-sagent-2k",
			name: "Secret Agent 2K Concatenated Tileset",
			games: &["Secret Agent"],
			pad: 2048 - 3 - 2000,
		}
	}

	/// Secret Agent 16x16 tiles, 8 KiB pad blocks.
	pub fn sagent_8k() -> Self {
		Self {
			code: "tls-sagent-8k",
			name: "Secret Agent 8K Concatenated Tileset",
			games: &["Secret Agent"],
			pad: 8064 - 3 - 8000,
		}
	}
}

impl TilesetFormat for CCavesMainFormat {
	fn code(&self) -> String {
		self.code.to_string()
	}

	fn friendly_name(&self) -> String {
		self.name.to_string()
	}

	fn extensions(&self) -> Vec<&'static str> {
		vec!["gfx"]
	}

	fn games(&self) -> Vec<&'static str> {
		self.games.to_vec()
	}

	fn probe(&self, content: &mut dyn Stream) -> Result<Certainty> {
		let len = content.size();
		if len == 0 {
			return Ok(Certainty::PossiblyYes);
		}
		if len < SUB_HEADER_LEN {
			return Ok(Certainty::DefinitelyNo);
		}

		content.seek(SeekFrom::Start(0))?;
		let mut pos = 0u64;
		while pos + SUB_HEADER_LEN < len {
			let num_tiles = content.read_u8()?;
			let width_bytes = content.read_u8()?;
			let height = content.read_u8()?;
			let delta = u64::from(width_bytes)
				* u64::from(height)
				* (PlaneCount::Masked as u64)
				* u64::from(num_tiles)
				+ self.pad;
			pos += SUB_HEADER_LEN + delta;
			if pos > len {
				return Ok(Certainty::DefinitelyNo);
			}
			content.seek(SeekFrom::Current(delta as i64))?;
		}
		// There is no signature to find.
		Ok(Certainty::PossiblyYes)
	}

	fn open(&self, content: SharedStream, _supp: &SuppData) -> Result<Box<dyn Tileset>> {
		Ok(Box::new(CCavesMain::new(content, PlaneCount::Masked, self.pad)?))
	}

	fn create(&self, content: SharedStream, supp: &SuppData) -> Result<Box<dyn Tileset>> {
		content.borrow_mut().truncate(0)?;
		self.open(content, supp)
	}
}

/// A sub-tileset as a standalone format.
pub struct CCavesSubFormat;

impl TilesetFormat for CCavesSubFormat {
	fn code(&self) -> String {
		"tls-ccaves-sub".to_string()
	}

	fn friendly_name(&self) -> String {
		"Crystal Caves Tileset".to_string()
	}

	fn extensions(&self) -> Vec<&'static str> {
		vec!["gfx"]
	}

	fn games(&self) -> Vec<&'static str> {
		vec!["Crystal Caves"]
	}

	fn probe(&self, content: &mut dyn Stream) -> Result<Certainty> {
		let len = content.size();
		if len < SUB_HEADER_LEN {
			return Ok(Certainty::DefinitelyNo);
		}
		content.seek(SeekFrom::Start(0))?;
		let num_tiles = content.read_u8()?;
		let width_bytes = content.read_u8()?;
		let height = content.read_u8()?;
		let len_tile =
			u64::from(width_bytes) * u64::from(height) * (PlaneCount::Masked as u64);
		if SUB_HEADER_LEN + len_tile * u64::from(num_tiles) != len {
			return Ok(Certainty::DefinitelyNo);
		}
		Ok(Certainty::PossiblyYes)
	}

	fn open(&self, content: SharedStream, _supp: &SuppData) -> Result<Box<dyn Tileset>> {
		Ok(Box::new(CCavesSub::new(content, PlaneCount::Masked, None)?))
	}

	fn create(&self, content: SharedStream, supp: &SuppData) -> Result<Box<dyn Tileset>> {
		{
			let mut io = content.borrow_mut();
			io.truncate(0)?;
			io.seek(SeekFrom::Start(0))?;
			io.write(&[0, 0, 0])?;
		}
		self.open(content, supp)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::stream::MemStream;

	/// 8x8 masked tiles are 40 bytes each.
	fn two_sub_file() -> Vec<u8> {
		let mut data = vec![2, 1, 8];
		data.extend((0..80).map(|i| i as u8));
		data.push(1);
		data.push(1);
		data.push(8);
		data.extend((0..40).map(|i| (40 + i) as u8));
		data
	}

	#[test]
	fn test_parse_two_subs() {
		let tls =
			CCavesMain::new(shared(MemStream::from_vec(two_sub_file())), PlaneCount::Masked, 0)
				.unwrap();
		let entries = tls.entries();
		assert_eq!(entries.len(), 2);
		assert_eq!(entries[0].borrow().offset, 0);
		assert_eq!(entries[0].borrow().stored_size, 83);
		assert_eq!(entries[1].borrow().offset, 83);
		assert_eq!(entries[1].borrow().stored_size, 43);
		assert!(entries[0].borrow().attr.contains(Attributes::FOLDER));
	}

	#[test]
	fn test_sub_counts() {
		let tls =
			CCavesMain::new(shared(MemStream::from_vec(two_sub_file())), PlaneCount::Masked, 0)
				.unwrap();
		let entries = tls.entries();
		let first = tls.open_tileset(&entries[0]).unwrap();
		assert_eq!(first.entries().len(), 2);
		assert_eq!(first.dimensions(), Point::new(8, 8));
		let second = tls.open_tileset(&entries[1]).unwrap();
		assert_eq!(second.entries().len(), 1);
	}

	#[test]
	fn test_insert_into_sub_shifts_parent() {
		let content = shared(MemStream::from_vec(two_sub_file()));
		let tls = CCavesMain::new(content.clone(), PlaneCount::Masked, 0).unwrap();
		let entries = tls.entries();
		let mut first = tls.open_tileset(&entries[0]).unwrap();
		first.insert(None, Attributes::empty()).unwrap();

		// The first sub-tileset header grew to three tiles...
		let mut io = content.clone();
		io.seek(SeekFrom::Start(0)).unwrap();
		assert_eq!(io.read_u8().unwrap(), 3);
		// ...its entry grew by one 40-byte tile...
		assert_eq!(entries[0].borrow().stored_size, 123);
		// ...and the second sub-tileset moved along.
		assert_eq!(entries[1].borrow().offset, 123);
		io.seek(SeekFrom::Start(123)).unwrap();
		assert_eq!(io.read_u8().unwrap(), 1);
	}

	#[test]
	fn test_sub_refuses_256th_tile() {
		let mut data = vec![255, 1, 1];
		data.extend(vec![0u8; 255 * 5]);
		let mut sub =
			CCavesSub::new(shared(MemStream::from_vec(data)), PlaneCount::Masked, None).unwrap();
		assert!(matches!(
			sub.insert(None, Attributes::empty()),
			Err(Error::Format { .. })
		));
	}

	#[test]
	fn test_sub_set_dimensions_resizes_all_tiles() {
		let mut data = vec![2, 1, 8];
		data.extend(vec![0u8; 80]);
		let content = shared(MemStream::from_vec(data));
		let mut sub = CCavesSub::new(content.clone(), PlaneCount::Masked, None).unwrap();
		sub.set_dimensions(Point::new(16, 16)).unwrap();

		assert_eq!(sub.tile_len(), 160);
		assert_eq!(content.size(), 3 + 2 * 160);
		let entries = sub.entries();
		assert_eq!(entries[1].borrow().offset, 3 + 160);

		let mut io = content.clone();
		io.seek(SeekFrom::Start(0)).unwrap();
		assert_eq!(io.read_vec(3).unwrap(), vec![2, 2, 16]);
	}

	#[test]
	fn test_sub_width_must_be_byte_aligned() {
		let data = vec![0, 1, 8];
		let mut sub =
			CCavesSub::new(shared(MemStream::from_vec(data)), PlaneCount::Masked, None).unwrap();
		assert!(sub.set_dimensions(Point::new(12, 8)).is_err());
	}

	#[test]
	fn test_probe_rejects_overrun() {
		let fmt = CCavesMainFormat::ccaves();
		// Header promises two tiles but only one fits.
		let mut data = vec![2, 1, 8];
		data.extend(vec![0u8; 40]);
		assert_eq!(
			fmt.probe(&mut MemStream::from_vec(data)).unwrap(),
			Certainty::DefinitelyNo
		);
		assert_eq!(
			fmt.probe(&mut MemStream::from_vec(two_sub_file())).unwrap(),
			Certainty::PossiblyYes
		);
	}

	#[test]
	fn test_sagent_padding_parsed() {
		let fmt = CCavesMainFormat::sagent_2k();
		let mut data = vec![1, 1, 8];
		data.extend(vec![0u8; 40]);
		data.extend(vec![0u8; 2048 - 3 - 2000]);
		assert_eq!(
			fmt.probe(&mut MemStream::from_vec(data.clone())).unwrap(),
			Certainty::PossiblyYes
		);
		let tls = CCavesMain::new(shared(MemStream::from_vec(data)), PlaneCount::Masked, 45)
			.unwrap();
		let entries = tls.entries();
		assert_eq!(entries[0].borrow().stored_size, 40 + 3 + 45);
		let sub = tls.open_tileset(&entries[0]).unwrap();
		assert_eq!(sub.entries().len(), 1);
	}
}
