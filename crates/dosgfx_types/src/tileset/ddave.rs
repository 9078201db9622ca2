//! Dangerous Dave tileset handler.
//!
//! # File structure
//!
//! | Offset | Size | Field                          |
//! |--------|------|--------------------------------|
//! | 0      | 4    | Tile count (u32le)             |
//! | 4      | 4*n  | Tile offsets (u32le each)      |
//! | ...    |      | Tile bodies, concatenated      |
//!
//! End of file is the sentinel for the last tile's size.  The on-disk file
//! carries one extra zero byte after every 64 KiB; a pad filter strips it
//! so none of the offsets here ever see it.  The colour variant is chosen
//! by the size of the first tile: 64 bytes = CGA, 128 = EGA, 256 = VGA.
//! VGA files keep their palette in an external `vga.pal`.
//!
//! Tiles below index 53 are fixed 16x16; from 53 on, each tile opens with
//! a `width:u16le, height:u16le` header that is rewritten on encode.

use std::io::SeekFrom;
use std::rc::Rc;

use super::{Attributes, EntryRef, FatCore, FatEntry, FatHooks, Tileset, TilesetCaps};
use crate::error::{Error, Result};
use crate::filter::{BlockPad, BlockUnpad};
use crate::image::{
	ColourDepth, EgaLinear, EgaRowPlanar, Image, ImageCaps, PlaneLayout, PlanePurpose, Pixels,
	Point, VgaLinear,
};
use crate::pal::{self, CgaVariant, PalDepth, Palette, PaletteRef};
use crate::registry::{Certainty, TilesetFormat};
use crate::stream::{BitOrder, FilteredStream, SharedStream, Stream, StreamExt, shared};
use crate::supp::{SuppData, SuppFilenames, SuppKind};

/// Offset of the tile count.
const TILECOUNT_OFFSET: u64 = 0;
/// Offset where the FAT starts.
const FAT_OFFSET: u64 = 4;
/// Length of one FAT record.
const FAT_ENTRY_LEN: u64 = 4;
/// First tile in an empty tileset.
const FIRST_TILE_OFFSET: u64 = 4;
/// Safety cap against corrupted counts.
const MAX_TILES: u32 = 4096;
/// First tile that carries its own width and height.
const FIRST_TILE_WITH_DIMS: usize = 53;
/// A padding byte is inserted after every block of this size.
const PAD_BLOCK: u64 = 65536;

struct DDaveHooks;

impl FatHooks for DDaveHooks {
	fn pre_insert(
		&mut self,
		io: &mut dyn Stream,
		entries: &[EntryRef],
		new_entry: &mut FatEntry,
	) -> Result<()> {
		// Grow the FAT by one record; every tile moves along with it.
		io.insert(FAT_OFFSET + new_entry.index as u64 * FAT_ENTRY_LEN, FAT_ENTRY_LEN)?;
		new_entry.offset += FAT_ENTRY_LEN;
		for e in entries {
			e.borrow_mut().offset += FAT_ENTRY_LEN;
		}
		Ok(())
	}

	fn post_insert(
		&mut self,
		io: &mut dyn Stream,
		entries: &[EntryRef],
		_new_entry: &EntryRef,
	) -> Result<()> {
		io.seek(SeekFrom::Start(TILECOUNT_OFFSET))?;
		io.write_u32le(entries.len() as u32)
	}

	fn post_remove(&mut self, io: &mut dyn Stream, entries: &[EntryRef]) -> Result<()> {
		// Shrink the FAT now that one record is spare.
		for e in entries {
			e.borrow_mut().offset -= FAT_ENTRY_LEN;
		}
		io.remove(FAT_OFFSET + entries.len() as u64 * FAT_ENTRY_LEN, FAT_ENTRY_LEN)?;
		io.seek(SeekFrom::Start(TILECOUNT_OFFSET))?;
		io.write_u32le(entries.len() as u32)
	}

	fn update_file_offset(&mut self, io: &mut dyn Stream, entry: &FatEntry) -> Result<()> {
		io.seek(SeekFrom::Start(FAT_OFFSET + entry.index as u64 * FAT_ENTRY_LEN))?;
		io.write_u32le(entry.offset as u32)
	}
}

/// A Dangerous Dave tileset, seen through the block-unpad filter.
pub struct DDaveTileset {
	core: FatCore,
	depth: ColourDepth,
	pal: Option<PaletteRef>,
}

impl DDaveTileset {
	/// Parse a tileset from an already-unpadded stream.
	pub fn new(
		content: SharedStream,
		depth: ColourDepth,
		pal: Option<PaletteRef>,
	) -> Result<Self> {
		let tls = Self {
			core: FatCore::new(content, FIRST_TILE_OFFSET, DDaveHooks),
			depth,
			pal,
		};

		let len = tls.core.content.size();
		if len < FIRST_TILE_OFFSET {
			return Err(Error::format("file too short"));
		}

		let mut io = tls.core.content.clone();
		io.seek(SeekFrom::Start(0))?;
		let num_tiles = io.read_u32le()?;
		if num_tiles > MAX_TILES {
			return Err(Error::format("too many tiles"));
		}

		let tag_suffix = match depth {
			ColourDepth::Cga => "-cga",
			ColourDepth::Ega => "-ega",
			ColourDepth::Vga => "-vga",
			ColourDepth::Mono => "",
		};

		if num_tiles > 0 {
			let mut next_offset = u64::from(io.read_u32le()?);
			for i in 0..num_tiles as usize {
				let offset = next_offset;
				next_offset = if i + 1 == num_tiles as usize {
					len
				} else {
					u64::from(io.read_u32le()?)
				};
				if next_offset < offset || next_offset > len {
					return Err(Error::format("tile offsets are not increasing"));
				}
				tls.core.push_entry(FatEntry {
					valid: true,
					index: i,
					offset,
					stored_size: next_offset - offset,
					real_size: next_offset - offset,
					len_header: 0,
					attr: Attributes::empty(),
					type_tag: format!("tile/ddave{tag_suffix}"),
					name: None,
				});
			}
		}
		Ok(tls)
	}
}

impl Tileset for DDaveTileset {
	fn caps(&self) -> TilesetCaps {
		if self.pal.is_some() { TilesetCaps::HAS_PALETTE } else { TilesetCaps::empty() }
	}

	fn colour_depth(&self) -> ColourDepth {
		self.depth
	}

	fn entries(&self) -> Vec<EntryRef> {
		self.core.entries()
	}

	fn layout_width(&self) -> u32 {
		4
	}

	fn open_image(&self, id: &EntryRef) -> Result<Box<dyn Image>> {
		let fixed = id.borrow().index < FIRST_TILE_WITH_DIMS;
		let window = shared(self.core.open_entry(id, true)?);
		Ok(match self.depth {
			ColourDepth::Cga => Box::new(DDaveCgaImage::new(window, fixed)?),
			ColourDepth::Ega => Box::new(DDaveEgaImage::new(window, fixed)?),
			ColourDepth::Vga => {
				Box::new(DDaveVgaImage::new(window, fixed, self.pal.clone())?)
			}
			ColourDepth::Mono => {
				return Err(Error::format("no mono variant of this tileset exists"));
			}
		})
	}

	fn open_tileset(&self, _id: &EntryRef) -> Result<Box<dyn Tileset>> {
		Err(Error::format("tiles cannot be opened as tilesets"))
	}

	fn insert(&mut self, before: Option<&EntryRef>, attr: Attributes) -> Result<EntryRef> {
		let tag = self.core.entries().first().map_or_else(
			|| "tile/ddave".to_string(),
			|e| e.borrow().type_tag.clone(),
		);
		self.core.insert(before, 0, &tag, attr)
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

	fn flush(&mut self) -> Result<()> {
		self.core.content.flush()
	}
}

//
// Tile images
//

fn read_dims_header(content: &SharedStream) -> Result<Point> {
	if content.size() == 0 {
		// Freshly inserted tile, no header yet.
		return Ok(Point::new(0, 0));
	}
	let mut io = content.clone();
	io.seek(SeekFrom::Start(0))?;
	let x = u32::from(io.read_u16le()?);
	let y = u32::from(io.read_u16le()?);
	Ok(Point::new(x, y))
}

fn write_dims_header(content: &SharedStream, dims: Point) -> Result<()> {
	let mut io = content.clone();
	io.seek(SeekFrom::Start(0))?;
	io.write_u16le(dims.x as u16)?;
	io.write_u16le(dims.y as u16)
}

/// A CGA tile: packed 2bpp pixels, optionally behind a dimension header.
pub struct DDaveCgaImage {
	content: SharedStream,
	inner: EgaLinear,
	fixed: bool,
}

impl DDaveCgaImage {
	/// Open a tile; `fixed` selects the headerless 16x16 form.
	pub fn new(content: SharedStream, fixed: bool) -> Result<Self> {
		const CGA: PlaneLayout = [
			PlanePurpose::Green1,
			PlanePurpose::Blue1,
			PlanePurpose::Unused,
			PlanePurpose::Unused,
			PlanePurpose::Unused,
			PlanePurpose::Unused,
		];
		let dims = if fixed { Point::new(16, 16) } else { read_dims_header(&content)? };
		let inner = EgaLinear::new(
			content.clone(),
			if fixed { 0 } else { 4 },
			dims,
			CGA,
			BitOrder::MsbFirst,
			Some(Rc::new(pal::cga(CgaVariant::CYAN_MAGENTA_BRIGHT))),
		)
		.with_depth(ColourDepth::Cga);
		Ok(Self {
			content,
			inner,
			fixed,
		})
	}
}

impl Image for DDaveCgaImage {
	fn caps(&self) -> ImageCaps {
		self.inner.caps()
			| if self.fixed { ImageCaps::empty() } else { ImageCaps::SET_DIMENSIONS }
	}

	fn colour_depth(&self) -> ColourDepth {
		ColourDepth::Cga
	}

	fn dimensions(&self) -> Point {
		self.inner.dimensions()
	}

	fn set_dimensions(&mut self, new_dims: Point) -> Result<()> {
		if self.fixed {
			return Err(Error::capability("set_dimensions on a fixed-size tile"));
		}
		self.inner.set_dims(new_dims);
		Ok(())
	}

	fn palette(&self) -> Option<PaletteRef> {
		self.inner.palette()
	}

	fn decode(&mut self) -> Result<Pixels> {
		self.inner.decode()
	}

	fn decode_mask(&mut self) -> Result<Pixels> {
		self.inner.decode_mask()
	}

	fn encode(&mut self, pixels: &[u8], mask: &[u8]) -> Result<()> {
		if !self.fixed {
			write_dims_header(&self.content, self.inner.dimensions())?;
		}
		self.inner.encode(pixels, mask)
	}
}

/// An EGA tile: four row-planar planes.
pub struct DDaveEgaImage {
	content: SharedStream,
	inner: EgaRowPlanar,
	fixed: bool,
}

impl DDaveEgaImage {
	/// Open a tile; `fixed` selects the headerless 16x16 form.
	pub fn new(content: SharedStream, fixed: bool) -> Result<Self> {
		const IRGB: PlaneLayout = [
			PlanePurpose::Intensity1,
			PlanePurpose::Red1,
			PlanePurpose::Green1,
			PlanePurpose::Blue1,
			PlanePurpose::Unused,
			PlanePurpose::Unused,
		];
		let dims = if fixed { Point::new(16, 16) } else { read_dims_header(&content)? };
		let inner =
			EgaRowPlanar::new(content.clone(), if fixed { 0 } else { 4 }, dims, IRGB, None);
		Ok(Self {
			content,
			inner,
			fixed,
		})
	}
}

impl Image for DDaveEgaImage {
	fn caps(&self) -> ImageCaps {
		self.inner.caps()
			| if self.fixed { ImageCaps::empty() } else { ImageCaps::SET_DIMENSIONS }
	}

	fn colour_depth(&self) -> ColourDepth {
		ColourDepth::Ega
	}

	fn dimensions(&self) -> Point {
		self.inner.dimensions()
	}

	fn set_dimensions(&mut self, new_dims: Point) -> Result<()> {
		if self.fixed {
			return Err(Error::capability("set_dimensions on a fixed-size tile"));
		}
		self.inner.set_dims(new_dims);
		Ok(())
	}

	fn decode(&mut self) -> Result<Pixels> {
		self.inner.decode()
	}

	fn decode_mask(&mut self) -> Result<Pixels> {
		self.inner.decode_mask()
	}

	fn encode(&mut self, pixels: &[u8], mask: &[u8]) -> Result<()> {
		if !self.fixed {
			write_dims_header(&self.content, self.inner.dimensions())?;
		}
		self.inner.encode(pixels, mask)
	}
}

/// A VGA tile: one byte per pixel, palette supplied externally.
pub struct DDaveVgaImage {
	content: SharedStream,
	inner: VgaLinear,
	fixed: bool,
}

impl DDaveVgaImage {
	/// Open a tile; `fixed` selects the headerless 16x16 form.
	pub fn new(content: SharedStream, fixed: bool, pal: Option<PaletteRef>) -> Result<Self> {
		let dims = if fixed { Point::new(16, 16) } else { read_dims_header(&content)? };
		let inner = VgaLinear::new(content.clone(), if fixed { 0 } else { 4 }, dims, pal);
		Ok(Self {
			content,
			inner,
			fixed,
		})
	}
}

impl Image for DDaveVgaImage {
	fn caps(&self) -> ImageCaps {
		self.inner.caps()
			| if self.fixed { ImageCaps::empty() } else { ImageCaps::SET_DIMENSIONS }
	}

	fn colour_depth(&self) -> ColourDepth {
		ColourDepth::Vga
	}

	fn dimensions(&self) -> Point {
		self.inner.dimensions()
	}

	fn set_dimensions(&mut self, new_dims: Point) -> Result<()> {
		if self.fixed {
			return Err(Error::capability("set_dimensions on a fixed-size tile"));
		}
		self.inner.set_dims(new_dims);
		Ok(())
	}

	fn palette(&self) -> Option<PaletteRef> {
		self.inner.palette()
	}

	fn decode(&mut self) -> Result<Pixels> {
		self.inner.decode()
	}

	fn decode_mask(&mut self) -> Result<Pixels> {
		self.inner.decode_mask()
	}

	fn encode(&mut self, pixels: &[u8], mask: &[u8]) -> Result<()> {
		if !self.fixed {
			write_dims_header(&self.content, self.inner.dimensions())?;
		}
		self.inner.encode(pixels, mask)
	}
}

//
// Format descriptors
//

/// One of the three Dangerous Dave tileset variants.
pub struct DDaveFormat {
	depth: ColourDepth,
}

impl DDaveFormat {
	/// The CGA variant (64-byte first tile).
	pub fn cga() -> Self {
		Self {
			depth: ColourDepth::Cga,
		}
	}

	/// The EGA variant (128-byte first tile).
	pub fn ega() -> Self {
		Self {
			depth: ColourDepth::Ega,
		}
	}

	/// The VGA variant (256-byte first tile, external palette).
	pub fn vga() -> Self {
		Self {
			depth: ColourDepth::Vga,
		}
	}

	fn first_tile_size(&self) -> u64 {
		match self.depth {
			ColourDepth::Cga => 64,
			ColourDepth::Ega => 128,
			_ => 256,
		}
	}
}

impl TilesetFormat for DDaveFormat {
	fn code(&self) -> String {
		match self.depth {
			ColourDepth::Cga => "tls-ddave-cga",
			ColourDepth::Ega => "tls-ddave-ega",
			_ => "tls-ddave-vga",
		}
		.to_string()
	}

	fn friendly_name(&self) -> String {
		match self.depth {
			ColourDepth::Cga => "Dangerous Dave CGA tileset",
			ColourDepth::Ega => "Dangerous Dave EGA tileset",
			_ => "Dangerous Dave VGA tileset",
		}
		.to_string()
	}

	fn extensions(&self) -> Vec<&'static str> {
		vec!["dav"]
	}

	fn games(&self) -> Vec<&'static str> {
		vec!["Dangerous Dave"]
	}

	fn probe(&self, content: &mut dyn Stream) -> Result<Certainty> {
		let len = content.size();
		if len < FIRST_TILE_OFFSET {
			return Ok(Certainty::DefinitelyNo);
		}
		content.seek(SeekFrom::Start(0))?;
		let num_tiles = content.read_u32le()?;
		if num_tiles == 0 {
			return if len > FIRST_TILE_OFFSET {
				Ok(Certainty::DefinitelyNo)
			} else {
				Ok(Certainty::DefinitelyYes)
			};
		}

		let mut first_offset = 0u64;
		let mut second_offset = len;
		let mut last_offset = 0u64;
		for i in 0..num_tiles {
			let offset = match content.read_u32le() {
				Ok(o) => u64::from(o),
				Err(_) => return Ok(Certainty::DefinitelyNo),
			};
			if i == 0 {
				first_offset = offset;
			} else if i == 1 {
				second_offset = offset;
			}
			if offset < last_offset || offset > len {
				return Ok(Certainty::DefinitelyNo);
			}
			last_offset = offset;
		}

		if second_offset - first_offset != self.first_tile_size() {
			return Ok(Certainty::DefinitelyNo);
		}
		Ok(Certainty::DefinitelyYes)
	}

	fn open(&self, content: SharedStream, supp: &SuppData) -> Result<Box<dyn Tileset>> {
		let filtered = FilteredStream::open(
			content,
			Box::new(BlockUnpad::new(1, PAD_BLOCK)),
			Box::new(BlockPad::new(vec![0], PAD_BLOCK)),
		)?;

		let pal = match supp.get(&SuppKind::Palette) {
			Some(stream) => {
				let mut io = stream.clone();
				io.seek(SeekFrom::Start(0))?;
				Some(Rc::new(Palette::from_stream(&mut io, 256, PalDepth::SixBit)?))
			}
			None => None,
		};

		Ok(Box::new(DDaveTileset::new(shared(filtered), self.depth, pal)?))
	}

	fn create(&self, content: SharedStream, supp: &SuppData) -> Result<Box<dyn Tileset>> {
		{
			let mut io = content.borrow_mut();
			io.truncate(0)?;
			io.seek(SeekFrom::Start(0))?;
			io.write_u32le(0)?;
		}
		self.open(content, supp)
	}

	fn required_supps(&self, _filename: &str) -> SuppFilenames {
		let mut supps = SuppFilenames::new();
		if self.depth == ColourDepth::Vga {
			supps.insert(SuppKind::Palette, "vga.pal".to_string());
		}
		supps
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::stream::MemStream;

	/// A one-tile CGA file: count, one offset, 64 bytes of tile data.
	fn cga_one_tile() -> Vec<u8> {
		let mut data = 1u32.to_le_bytes().to_vec();
		data.extend_from_slice(&8u32.to_le_bytes());
		for row in 0..16u32 {
			// Border of colour 3, inner pixels colour 1.
			let bits: u32 = if row == 0 || row == 15 {
				0xFFFF_FFFF
			} else {
				0b11_01_01_01_01_01_01_01_01_01_01_01_01_01_01_11
			};
			data.extend_from_slice(&bits.to_be_bytes());
		}
		data
	}

	#[test]
	fn test_open_cga_tile() {
		let fmt = DDaveFormat::cga();
		let content = shared(MemStream::from_vec(cga_one_tile()));
		assert_eq!(
			fmt.probe(&mut *content.borrow_mut()).unwrap(),
			Certainty::DefinitelyYes
		);

		let tls = fmt.open(content, &SuppData::new()).unwrap();
		let entries = tls.entries();
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].borrow().stored_size, 64);

		let mut img = tls.open_image(&entries[0]).unwrap();
		assert_eq!(img.dimensions(), Point::new(16, 16));
		let pixels = img.decode().unwrap();
		assert_eq!(&pixels[..16], &[3u8; 16]);
		assert_eq!(pixels[16], 3);
		assert_eq!(pixels[17], 1);
		assert_eq!(pixels[31], 3);
		assert_eq!(&pixels[240..], &[3u8; 16]);
	}

	#[test]
	fn test_probe_rejects_wrong_first_tile_size() {
		let fmt = DDaveFormat::ega();
		let mut io = MemStream::from_vec(cga_one_tile());
		assert_eq!(fmt.probe(&mut io).unwrap(), Certainty::DefinitelyNo);
	}

	#[test]
	fn test_vga_dimension_header_tiles() {
		// 54 tiles: 53 fixed 256-byte tiles, then one 4x2 with a header.
		let count = 54u32;
		let mut offsets = Vec::new();
		let mut bodies = Vec::new();
		let base = 4 + count as u64 * 4;
		for i in 0..53u32 {
			offsets.push(base + u64::from(i) * 256);
			bodies.extend(std::iter::repeat_n(i as u8, 256));
		}
		offsets.push(base + 53 * 256);
		bodies.extend_from_slice(&4u16.to_le_bytes());
		bodies.extend_from_slice(&2u16.to_le_bytes());
		bodies.extend_from_slice(&[9, 8, 7, 6, 5, 4, 3, 2]);

		let mut data = count.to_le_bytes().to_vec();
		for o in &offsets {
			data.extend_from_slice(&(*o as u32).to_le_bytes());
		}
		data.extend_from_slice(&bodies);

		let fmt = DDaveFormat::vga();
		let tls = fmt.open(shared(MemStream::from_vec(data)), &SuppData::new()).unwrap();
		let entries = tls.entries();

		let mut fixed = tls.open_image(&entries[52]).unwrap();
		assert_eq!(fixed.dimensions(), Point::new(16, 16));
		assert!(!fixed.caps().contains(ImageCaps::SET_DIMENSIONS));
		assert_eq!(fixed.decode().unwrap(), vec![52u8; 256]);

		let mut sized = tls.open_image(&entries[53]).unwrap();
		assert_eq!(sized.dimensions(), Point::new(4, 2));
		assert!(sized.caps().contains(ImageCaps::SET_DIMENSIONS));
		assert_eq!(sized.decode().unwrap(), vec![9, 8, 7, 6, 5, 4, 3, 2]);

		// Grow the sized tile and make sure it reopens with new dimensions.
		sized.set_dimensions(Point::new(4, 3)).unwrap();
		sized.encode(&[1u8; 12], &[0u8; 12]).unwrap();
		drop(sized);
		assert_eq!(entries[53].borrow().stored_size, 4 + 12);

		let mut reopened = tls.open_image(&entries[53]).unwrap();
		assert_eq!(reopened.dimensions(), Point::new(4, 3));
		assert_eq!(reopened.decode().unwrap(), vec![1u8; 12]);
	}

	#[test]
	fn test_insert_updates_count_and_fat() {
		let fmt = DDaveFormat::cga();
		let content = shared(MemStream::from_vec(cga_one_tile()));
		let mut tls = fmt.open(content.clone(), &SuppData::new()).unwrap();
		let first = tls.entries()[0].clone();
		tls.insert(Some(&first), Attributes::empty()).unwrap();
		tls.flush().unwrap();

		let mut io = content.clone();
		io.seek(SeekFrom::Start(0)).unwrap();
		assert_eq!(io.read_u32le().unwrap(), 2);
		// Two FAT records now; both point at offset 12 (the new tile is
		// empty, so both tiles start at the same place).
		assert_eq!(io.read_u32le().unwrap(), 12);
		assert_eq!(io.read_u32le().unwrap(), 12);
		assert_eq!(first.borrow().offset, 12);
	}

	#[test]
	fn test_padding_stripped_on_open() {
		// A file whose body crosses the 64 KiB boundary: the on-disk bytes
		// carry one zero after the first 65536 bytes.
		let count = 2u32;
		let tile_size = 40000u32;
		let mut data = count.to_le_bytes().to_vec();
		data.extend_from_slice(&12u32.to_le_bytes());
		data.extend_from_slice(&(12 + tile_size).to_le_bytes());
		for i in 0..tile_size * 2 {
			data.push((i % 255) as u8);
		}
		// Apply the on-disk padding by hand.
		data.insert(65536, 0);

		let fmt = DDaveFormat::vga();
		let tls = fmt.open(shared(MemStream::from_vec(data)), &SuppData::new()).unwrap();
		let entries = tls.entries();
		assert_eq!(entries.len(), 2);
		assert_eq!(entries[1].borrow().stored_size, u64::from(tile_size));
	}
}
