//! Jill of the Jungle / Xargon SHA tileset handler.
//!
//! The file opens with 128 u32le offsets followed by 128 u16le lengths;
//! a slot whose offset and length are both zero is vacant.  Each
//! sub-tileset starts with a twelve-byte header (image count, rotation
//! count, CGA/EGA/VGA body lengths, colour-map depth, flags) and an
//! optional colour map that every emitted pixel is passed through.  The
//! engine keeps its palette inside the data: sub-tileset 5's first image
//! is a 64x12 block of palette register values, which is also why images
//! of exactly that size are refused on write.

use std::cell::RefCell;
use std::io::SeekFrom;
use std::rc::Rc;

use super::{Attributes, EntryRef, FatCore, FatEntry, FatHooks, Tileset, TilesetCaps};
use crate::error::{Error, Result};
use crate::image::{ColourDepth, Image, ImageCaps, Pixels, Point, check_buffer_sizes};
use crate::pal::{PalDepth, Palette, PaletteRef};
use crate::registry::{Certainty, TilesetFormat};
use crate::stream::{SharedStream, Stream, StreamExt, shared};
use crate::supp::{SuppData, SuppFilenames, SuppKind, with_extension};

/// Number of slots in the top-level table.
const NUM_TILESETS: usize = 128;
/// Start of the length table.
const LEN_TABLE_OFFSET: u64 = NUM_TILESETS as u64 * 4;
/// Header length of a sub-tileset.
const SUB_HEADER_LEN: u64 = 12;
/// Flag marking a font sub-tileset.
const FLAG_FONT: u16 = 1;
/// Which byte of a colour-map entry feeds the VGA body.
const MAP_BYTE_SHIFT: u32 = 16;
/// Component depth of the external palette file.
const PAL_DEPTH: PalDepth = PalDepth::SixBit;

const FILETYPE_JILL: &str = "tileset/jill-sub";

struct JillHooks;

impl FatHooks for JillHooks {
	fn update_file_offset(&mut self, io: &mut dyn Stream, entry: &FatEntry) -> Result<()> {
		io.seek(SeekFrom::Start(entry.index as u64 * 4))?;
		io.write_u32le(entry.offset as u32)
	}

	fn update_file_size(&mut self, io: &mut dyn Stream, entry: &FatEntry) -> Result<()> {
		io.seek(SeekFrom::Start(LEN_TABLE_OFFSET + entry.index as u64 * 2))?;
		io.write_u16le(entry.stored_size as u16)
	}
}

/// The top-level 128-slot container.
pub struct JillTileset {
	core: FatCore,
	pal: RefCell<Option<PaletteRef>>,
	loaded_pal: RefCell<bool>,
}

impl JillTileset {
	/// Parse the offset and length tables.
	pub fn new(content: SharedStream, pal: Option<PaletteRef>) -> Result<Self> {
		let loaded = pal.is_some();
		let tls = Self {
			core: FatCore::new(content, LEN_TABLE_OFFSET + NUM_TILESETS as u64 * 2, JillHooks),
			pal: RefCell::new(pal),
			loaded_pal: RefCell::new(loaded),
		};

		let mut io = tls.core.content.clone();
		for i in 0..NUM_TILESETS {
			io.seek(SeekFrom::Start(i as u64 * 4))?;
			let offset = u64::from(io.read_u32le()?);
			io.seek(SeekFrom::Start(LEN_TABLE_OFFSET + i as u64 * 2))?;
			let len = u64::from(io.read_u16le()?);

			let mut attr = Attributes::FOLDER;
			if offset == 0 && len == 0 {
				attr |= Attributes::VACANT;
			}
			tls.core.push_entry(FatEntry {
				valid: true,
				index: i,
				offset,
				stored_size: len,
				real_size: len,
				len_header: 0,
				attr,
				type_tag: FILETYPE_JILL.to_string(),
				name: None,
			});
		}
		Ok(tls)
	}

	/// Xargon keeps the palette in sub-tileset 5; fish it out on demand.
	fn load_palette(&self) {
		*self.loaded_pal.borrow_mut() = true;
		let entries = self.core.entries();
		let Some(slot) = entries.get(5) else { return };
		if slot.borrow().attr.contains(Attributes::VACANT) {
			return;
		}
		let Ok(sub) = self.open_tileset(slot) else { return };
		let sub_entries = sub.entries();
		let Some(first) = sub_entries.first() else { return };
		let Ok(img) = sub.open_image(first) else { return };
		if img.caps().contains(ImageCaps::HAS_PALETTE) {
			*self.pal.borrow_mut() = img.palette();
		}
	}
}

impl Tileset for JillTileset {
	fn caps(&self) -> TilesetCaps {
		if self.palette().is_some() { TilesetCaps::HAS_PALETTE } else { TilesetCaps::empty() }
	}

	fn colour_depth(&self) -> ColourDepth {
		ColourDepth::Vga
	}

	fn entries(&self) -> Vec<EntryRef> {
		self.core.entries()
	}

	fn layout_width(&self) -> u32 {
		1
	}

	fn open_image(&self, _id: &EntryRef) -> Result<Box<dyn Image>> {
		Err(Error::format("entries of a SHA file are sub-tilesets, not images"))
	}

	fn open_tileset(&self, id: &EntryRef) -> Result<Box<dyn Tileset>> {
		if id.borrow().attr.contains(Attributes::VACANT) {
			return Err(Error::format("cannot open a vacant slot"));
		}
		let window = shared(self.core.open_entry(id, true)?);
		Ok(Box::new(JillSub::new(window, self.palette())?))
	}

	fn insert(&mut self, _before: Option<&EntryRef>, _attr: Attributes) -> Result<EntryRef> {
		// The table is fixed at 128 slots; content goes into vacant ones.
		Err(Error::format("SHA files always hold 128 slots; reuse a vacant entry"))
	}

	fn remove(&mut self, _id: &EntryRef) -> Result<()> {
		Err(Error::format("SHA files always hold 128 slots; resize the entry to zero instead"))
	}

	fn resize(&mut self, id: &EntryRef, new_stored: u64, new_real: u64) -> Result<()> {
		{
			let mut e = id.borrow_mut();
			if e.attr.contains(Attributes::VACANT) {
				// Vacant slots have no bytes yet; give them some at the end
				// of the file before the generic resize can work.
				e.offset = self.core.content.size();
				e.attr.remove(Attributes::VACANT);
			}
		}
		self.core.resize(id, new_stored, new_real)
	}

	fn palette(&self) -> Option<PaletteRef> {
		if !*self.loaded_pal.borrow() {
			self.load_palette();
		}
		self.pal.borrow().clone()
	}

	fn flush(&mut self) -> Result<()> {
		self.core.content.flush()
	}
}

//
// JillSub
//

/// A sub-tileset of 8bpp images behind a colour map.
pub struct JillSub {
	core: FatCore,
	colour_map: Vec<u8>,
	pal: Option<PaletteRef>,
}

impl JillSub {
	/// Parse a sub-tileset header and its per-image size bytes.
	pub fn new(content: SharedStream, pal: Option<PaletteRef>) -> Result<Self> {
		let mut tls = Self {
			core: FatCore::new(content, SUB_HEADER_LEN, SubHooks),
			colour_map: Vec::new(),
			pal,
		};

		let mut io = tls.core.content.clone();
		io.seek(SeekFrom::Start(0))?;
		let num_images = io.read_u8()?;
		let _num_rots = io.read_u16le()?;
		let _len_cga = io.read_u16le()?;
		let _len_ega = io.read_u16le()?;
		let _len_vga = io.read_u16le()?;
		let bpp_colour_map = io.read_u8()?;
		let flags = io.read_u16le()?;

		let mut offset = SUB_HEADER_LEN;
		if flags & FLAG_FONT != 0 || bpp_colour_map == 8 {
			// Identity map.
			let len = 1usize << bpp_colour_map.min(8);
			tls.colour_map = (0..len).map(|i| i as u8).collect();
		} else {
			let len = 1usize << bpp_colour_map.min(8);
			tls.colour_map = Vec::with_capacity(len);
			for _ in 0..len {
				let value = io.read_u32le()?;
				tls.colour_map.push(((value >> MAP_BYTE_SHIFT) & 0xFF) as u8);
			}
			offset += len as u64 * 4;
		}

		for i in 0..usize::from(num_images) {
			io.seek(SeekFrom::Start(offset))?;
			let width = io.read_u8()?;
			let height = io.read_u8()?;
			let stored = u64::from(width) * u64::from(height) + 3;
			tls.core.push_entry(FatEntry {
				valid: true,
				index: i,
				offset,
				stored_size: stored,
				real_size: stored,
				len_header: 0,
				attr: Attributes::empty(),
				type_tag: "tile/jill".to_string(),
				name: None,
			});
			offset += stored;
		}
		Ok(tls)
	}
}

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

impl Tileset for JillSub {
	fn caps(&self) -> TilesetCaps {
		if self.pal.is_some() { TilesetCaps::HAS_PALETTE } else { TilesetCaps::empty() }
	}

	fn colour_depth(&self) -> ColourDepth {
		ColourDepth::Vga
	}

	fn entries(&self) -> Vec<EntryRef> {
		self.core.entries()
	}

	fn layout_width(&self) -> u32 {
		10
	}

	fn open_image(&self, id: &EntryRef) -> Result<Box<dyn Image>> {
		let stored = id.borrow().stored_size;
		let mut window = self.core.open_entry(id, false)?;
		window.seek(SeekFrom::Start(0))?;
		let width = u32::from(window.read_u8()?);
		let height = u32::from(window.read_u8()?);

		if stored == 64 * 12 + 3 && width == 64 && height == 12 {
			// Not pixels at all: raw palette register data.
			window.seek(SeekFrom::Start(3))?;
			let pal = Palette::from_stream(&mut window, 256, PAL_DEPTH)?;
			return Ok(Box::new(JillImage::palette_block(Rc::new(pal))));
		}

		window.seek(SeekFrom::Start(3))?;
		let num_pixels = (width * height) as usize;
		let mut pixels = vec![0u8; num_pixels];
		let got = window.read(&mut pixels)?;
		if got < num_pixels {
			log::warn!("tile data cut short ({got} of {num_pixels} bytes); padding with zero");
		}
		for p in &mut pixels {
			*p = self.colour_map.get(usize::from(*p)).copied().unwrap_or(*p);
		}

		Ok(Box::new(JillImage::new(
			Point::new(width, height),
			pixels,
			vec![0u8; num_pixels],
			self.pal.clone(),
		)))
	}

	fn open_tileset(&self, _id: &EntryRef) -> Result<Box<dyn Tileset>> {
		Err(Error::format("tiles cannot be opened as tilesets"))
	}

	fn insert(&mut self, before: Option<&EntryRef>, attr: Attributes) -> Result<EntryRef> {
		let handle = self.core.insert(before, 3, "tile/jill", attr)?;
		// A fresh tile is 0x0 until something is stored in it.
		Ok(handle)
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
// JillImage
//

/// A tile decoded eagerly into memory.
///
/// The on-disk pixel bytes have been through the colour map, which is not
/// reversible in general, so new content replaces the in-memory buffers
/// only; it does not round-trip to the backing stream.
pub struct JillImage {
	dims: Point,
	pixels: Pixels,
	mask: Pixels,
	pal: Option<PaletteRef>,
}

impl JillImage {
	fn new(dims: Point, pixels: Pixels, mask: Pixels, pal: Option<PaletteRef>) -> Self {
		Self {
			dims,
			pixels,
			mask,
			pal,
		}
	}

	/// The pseudo-image whose only content is a palette.
	fn palette_block(pal: PaletteRef) -> Self {
		Self {
			dims: Point::new(64, 12),
			pixels: vec![0; 64 * 12],
			mask: vec![0; 64 * 12],
			pal: Some(pal),
		}
	}
}

impl Image for JillImage {
	fn caps(&self) -> ImageCaps {
		let mut caps = ImageCaps::SET_DIMENSIONS;
		if self.pal.is_some() {
			caps |= ImageCaps::HAS_PALETTE;
		}
		caps
	}

	fn colour_depth(&self) -> ColourDepth {
		ColourDepth::Vga
	}

	fn dimensions(&self) -> Point {
		self.dims
	}

	fn set_dimensions(&mut self, new_dims: Point) -> Result<()> {
		if new_dims.x == 64 && new_dims.y == 12 {
			// The game loads images of exactly this size straight into the
			// VGA palette registers, so they cannot hold pixel data.
			return Err(Error::format(
				"this tileset cannot store images that are exactly 64x12 pixels",
			));
		}
		self.dims = new_dims;
		self.pixels = vec![0; new_dims.area()];
		self.mask = vec![0; new_dims.area()];
		Ok(())
	}

	fn palette(&self) -> Option<PaletteRef> {
		self.pal.clone()
	}

	fn decode(&mut self) -> Result<Pixels> {
		Ok(self.pixels.clone())
	}

	fn decode_mask(&mut self) -> Result<Pixels> {
		Ok(self.mask.clone())
	}

	fn encode(&mut self, pixels: &[u8], mask: &[u8]) -> Result<()> {
		check_buffer_sizes(self.dims, pixels, mask)?;
		self.pixels = pixels.to_vec();
		self.mask = mask.to_vec();
		Ok(())
	}
}

//
// Format descriptor
//

/// The SHA container format.
pub struct JillFormat;

impl TilesetFormat for JillFormat {
	fn code(&self) -> String {
		"tls-jill".to_string()
	}

	fn friendly_name(&self) -> String {
		"Jill of the Jungle Tileset".to_string()
	}

	fn extensions(&self) -> Vec<&'static str> {
		vec!["sha"]
	}

	fn games(&self) -> Vec<&'static str> {
		vec!["Jill of the Jungle", "Xargon"]
	}

	fn probe(&self, content: &mut dyn Stream) -> Result<Certainty> {
		let len = content.size();
		if len < LEN_TABLE_OFFSET + NUM_TILESETS as u64 * 2 {
			return Ok(Certainty::DefinitelyNo);
		}
		content.seek(SeekFrom::Start(0))?;
		for _ in 0..NUM_TILESETS {
			let offset = u64::from(content.read_u32le()?);
			if offset > len {
				return Ok(Certainty::DefinitelyNo);
			}
		}
		Ok(Certainty::DefinitelyYes)
	}

	fn open(&self, content: SharedStream, supp: &SuppData) -> Result<Box<dyn Tileset>> {
		let pal = match supp.get(&SuppKind::Palette) {
			Some(stream) => {
				let mut io = stream.clone();
				io.seek(SeekFrom::Start(0))?;
				Some(Rc::new(Palette::from_stream(&mut io, 256, PAL_DEPTH)?))
			}
			None => None,
		};
		Ok(Box::new(JillTileset::new(content, pal)?))
	}

	fn create(&self, content: SharedStream, supp: &SuppData) -> Result<Box<dyn Tileset>> {
		{
			let mut io = content.borrow_mut();
			io.truncate(0)?;
			io.seek(SeekFrom::Start(0))?;
			io.write(&vec![0u8; (LEN_TABLE_OFFSET + NUM_TILESETS as u64 * 2) as usize])?;
		}
		self.open(content, supp)
	}

	fn required_supps(&self, filename: &str) -> SuppFilenames {
		let mut supps = SuppFilenames::new();
		supps.insert(SuppKind::Palette, with_extension(filename, "pal"));
		supps
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::stream::MemStream;

	/// Build a SHA file with one populated sub-tileset in `slot`.
	fn sha_with_sub(slot: usize, sub: &[u8]) -> Vec<u8> {
		let table_len = (LEN_TABLE_OFFSET + NUM_TILESETS as u64 * 2) as usize;
		let mut data = vec![0u8; table_len];
		let offset = table_len as u32;
		data[slot * 4..slot * 4 + 4].copy_from_slice(&offset.to_le_bytes());
		let len = sub.len() as u16;
		let lenpos = LEN_TABLE_OFFSET as usize + slot * 2;
		data[lenpos..lenpos + 2].copy_from_slice(&len.to_le_bytes());
		data.extend_from_slice(sub);
		data
	}

	/// A sub-tileset: identity colour map (8bpp), two small images.
	fn simple_sub() -> Vec<u8> {
		let mut sub = Vec::new();
		sub.push(2); // images
		sub.extend_from_slice(&0u16.to_le_bytes()); // rotations
		sub.extend_from_slice(&0u16.to_le_bytes()); // cga len
		sub.extend_from_slice(&0u16.to_le_bytes()); // ega len
		sub.extend_from_slice(&0u16.to_le_bytes()); // vga len
		sub.push(8); // colour map bpp: identity
		sub.extend_from_slice(&0u16.to_le_bytes()); // flags
		// Each image: width, height, one reserved byte, then pixels.
		sub.extend_from_slice(&[2, 2, 0, 10, 20, 30, 40]);
		sub.extend_from_slice(&[3, 1, 0, 7, 8, 9]);
		sub
	}

	#[test]
	fn test_vacant_slots() {
		let data = sha_with_sub(0, &simple_sub());
		let tls = JillTileset::new(shared(MemStream::from_vec(data)), None).unwrap();
		let entries = tls.entries();
		assert_eq!(entries.len(), 128);
		assert!(!entries[0].borrow().attr.contains(Attributes::VACANT));
		assert!(entries[1].borrow().attr.contains(Attributes::VACANT));
		assert!(tls.open_tileset(&entries[1]).is_err());
	}

	#[test]
	fn test_sub_images() {
		let data = sha_with_sub(0, &simple_sub());
		let tls = JillTileset::new(shared(MemStream::from_vec(data)), None).unwrap();
		let sub = tls.open_tileset(&tls.entries()[0]).unwrap();
		let entries = sub.entries();
		assert_eq!(entries.len(), 2);

		let mut img = sub.open_image(&entries[0]).unwrap();
		assert_eq!(img.dimensions(), Point::new(2, 2));
		assert_eq!(img.decode().unwrap(), vec![10, 20, 30, 40]);

		let mut img = sub.open_image(&entries[1]).unwrap();
		assert_eq!(img.dimensions(), Point::new(3, 1));
		assert_eq!(img.decode().unwrap(), vec![7, 8, 9]);
	}

	#[test]
	fn test_colour_map_applied() {
		// 1-bit colour map sending 0 -> 5 and 1 -> 9.
		let mut sub = Vec::new();
		sub.push(1);
		sub.extend_from_slice(&0u16.to_le_bytes());
		sub.extend_from_slice(&0u16.to_le_bytes());
		sub.extend_from_slice(&0u16.to_le_bytes());
		sub.extend_from_slice(&0u16.to_le_bytes());
		sub.push(1); // bpp 1: two entries
		sub.extend_from_slice(&0u16.to_le_bytes());
		sub.extend_from_slice(&(5u32 << MAP_BYTE_SHIFT).to_le_bytes());
		sub.extend_from_slice(&(9u32 << MAP_BYTE_SHIFT).to_le_bytes());
		sub.extend_from_slice(&[2, 1, 0, 0, 1]);

		let data = sha_with_sub(0, &sub);
		let tls = JillTileset::new(shared(MemStream::from_vec(data)), None).unwrap();
		let sub = tls.open_tileset(&tls.entries()[0]).unwrap();
		let mut img = sub.open_image(&sub.entries()[0]).unwrap();
		assert_eq!(img.decode().unwrap(), vec![5, 9]);
	}

	#[test]
	fn test_palette_loaded_from_slot_five() {
		// Sub-tileset with one 64x12 "image" holding 6-bit palette data.
		let mut sub = Vec::new();
		sub.push(1);
		sub.extend_from_slice(&0u16.to_le_bytes());
		sub.extend_from_slice(&0u16.to_le_bytes());
		sub.extend_from_slice(&0u16.to_le_bytes());
		sub.extend_from_slice(&0u16.to_le_bytes());
		sub.push(8);
		sub.extend_from_slice(&0u16.to_le_bytes());
		sub.push(64);
		sub.push(12);
		sub.push(0);
		sub.extend(std::iter::repeat_n(0x20u8, 768));

		let data = sha_with_sub(5, &sub);
		let tls = JillTileset::new(shared(MemStream::from_vec(data)), None).unwrap();
		let pal = tls.palette().expect("palette should come from sub-tileset 5");
		assert_eq!(pal.len(), 256);
		assert_eq!(pal.get(0).unwrap().r, 0x20 << 2);
		assert!(tls.caps().contains(TilesetCaps::HAS_PALETTE));
	}

	#[test]
	fn test_64x12_refused_on_write() {
		let data = sha_with_sub(0, &simple_sub());
		let tls = JillTileset::new(shared(MemStream::from_vec(data)), None).unwrap();
		let sub = tls.open_tileset(&tls.entries()[0]).unwrap();
		let mut img = sub.open_image(&sub.entries()[0]).unwrap();
		assert!(matches!(
			img.set_dimensions(Point::new(64, 12)),
			Err(Error::Format { .. })
		));
		assert!(img.set_dimensions(Point::new(64, 13)).is_ok());
	}

	#[test]
	fn test_probe() {
		let fmt = JillFormat;
		let data = sha_with_sub(0, &simple_sub());
		assert_eq!(
			fmt.probe(&mut MemStream::from_vec(data)).unwrap(),
			Certainty::DefinitelyYes
		);
		assert_eq!(
			fmt.probe(&mut MemStream::from_vec(vec![0; 100])).unwrap(),
			Certainty::DefinitelyNo
		);
	}
}
