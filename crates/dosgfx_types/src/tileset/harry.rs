//! Halloween Harry / Alien Carnage .ICO tileset handler.
//!
//! The file is nothing but a run of VGA images, each preceded by a
//! `width:u16le, height:u16le` header.  There is no count and no index;
//! end of file ends the list.  The palette lives in one of the game's
//! full-screen PCX files, conventionally `pre2.pcx`.

use std::io::SeekFrom;
use std::rc::Rc;

use super::fat::NoRecords;
use super::{Attributes, DDaveVgaImage, EntryRef, FatCore, FatEntry, Tileset, TilesetCaps};
use crate::error::{Error, Result};
use crate::image::{ColourDepth, Image, PcxImage};
use crate::pal::PaletteRef;
use crate::registry::{Certainty, TilesetFormat};
use crate::stream::{SharedStream, Stream, StreamExt, shared};
use crate::supp::{SuppData, SuppFilenames, SuppKind};

/// Size of each image's header (two u16le fields).
const ICO_HEADER_LEN: u64 = 4;

/// A Halloween Harry icon file.
pub struct HarryIcoTileset {
	core: FatCore,
	pal: Option<PaletteRef>,
}

impl HarryIcoTileset {
	/// Walk the image headers to build the entry table.
	pub fn new(content: SharedStream, pal: Option<PaletteRef>) -> Result<Self> {
		let tls = Self {
			core: FatCore::new(content, 0, NoRecords),
			pal,
		};

		let len = tls.core.content.size();
		let mut io = tls.core.content.clone();
		io.seek(SeekFrom::Start(0))?;
		let mut pos = 0u64;
		let mut index = 0usize;
		while pos < len {
			let width = u64::from(io.read_u16le()?);
			let height = u64::from(io.read_u16le()?);
			let stored = width * height + ICO_HEADER_LEN;
			if pos + stored > len {
				return Err(Error::format("image runs past end of file"));
			}
			tls.core.push_entry(FatEntry {
				valid: true,
				index,
				offset: pos,
				stored_size: stored,
				real_size: stored,
				len_header: 0,
				attr: Attributes::empty(),
				type_tag: "tile/harry-ico".to_string(),
				name: None,
			});
			io.seek(SeekFrom::Current((stored - ICO_HEADER_LEN) as i64))?;
			pos += stored;
			index += 1;
		}
		Ok(tls)
	}
}

impl Tileset for HarryIcoTileset {
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
		16
	}

	fn open_image(&self, id: &EntryRef) -> Result<Box<dyn Image>> {
		let window = shared(self.core.open_entry(id, true)?);
		// Same header-then-pixels layout as a resizable Dangerous Dave tile.
		Ok(Box::new(DDaveVgaImage::new(window, false, self.pal.clone())?))
	}

	fn open_tileset(&self, _id: &EntryRef) -> Result<Box<dyn Tileset>> {
		Err(Error::format("tiles cannot be opened as tilesets"))
	}

	fn insert(&mut self, before: Option<&EntryRef>, attr: Attributes) -> Result<EntryRef> {
		// A fresh entry is just a zeroed header: a 0x0 image.
		self.core.insert(before, ICO_HEADER_LEN, "tile/harry-ico", attr)
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

/// The .ICO container format.
pub struct HarryIcoFormat;

impl HarryIcoFormat {
	fn palette_from_supp(supp: &SuppData) -> Result<Option<PaletteRef>> {
		let Some(stream) = supp.get(&SuppKind::Palette) else {
			return Ok(None);
		};
		// The palette comes out of one of the game's full-screen PCX images.
		let img = PcxImage::new(stream.clone(), 8, 1, true)?;
		Ok(img.palette())
	}
}

impl TilesetFormat for HarryIcoFormat {
	fn code(&self) -> String {
		"tls-harry-ico".to_string()
	}

	fn friendly_name(&self) -> String {
		"Halloween Harry ICO Tileset".to_string()
	}

	fn extensions(&self) -> Vec<&'static str> {
		vec!["ico"]
	}

	fn games(&self) -> Vec<&'static str> {
		vec!["Alien Carnage", "Halloween Harry"]
	}

	fn probe(&self, content: &mut dyn Stream) -> Result<Certainty> {
		let len = content.size();
		// With no header at all, an empty file could be an empty tileset.
		if len == 0 {
			return Ok(Certainty::PossiblyYes);
		}
		if len < ICO_HEADER_LEN {
			return Ok(Certainty::DefinitelyNo);
		}

		content.seek(SeekFrom::Start(0))?;
		let mut pos = 0u64;
		while pos < len {
			if len - pos < ICO_HEADER_LEN {
				return Ok(Certainty::DefinitelyNo);
			}
			let width = u64::from(content.read_u16le()?);
			let height = u64::from(content.read_u16le()?);
			let delta = width * height;
			pos += delta + ICO_HEADER_LEN;
			if pos > len {
				return Ok(Certainty::DefinitelyNo);
			}
			content.seek(SeekFrom::Current(delta as i64))?;
		}
		Ok(Certainty::DefinitelyYes)
	}

	fn open(&self, content: SharedStream, supp: &SuppData) -> Result<Box<dyn Tileset>> {
		let pal = Self::palette_from_supp(supp)?;
		Ok(Box::new(HarryIcoTileset::new(content, pal)?))
	}

	fn create(&self, content: SharedStream, supp: &SuppData) -> Result<Box<dyn Tileset>> {
		content.borrow_mut().truncate(0)?;
		self.open(content, supp)
	}

	fn required_supps(&self, _filename: &str) -> SuppFilenames {
		let mut supps = SuppFilenames::new();
		// Any of the game's UI images will do; this one is always present.
		supps.insert(SuppKind::Palette, "pre2.pcx".to_string());
		supps
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::image::Point;
	use crate::stream::MemStream;

	fn two_icon_file() -> Vec<u8> {
		let mut data = Vec::new();
		data.extend_from_slice(&2u16.to_le_bytes());
		data.extend_from_slice(&3u16.to_le_bytes());
		data.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
		data.extend_from_slice(&4u16.to_le_bytes());
		data.extend_from_slice(&1u16.to_le_bytes());
		data.extend_from_slice(&[9, 9, 9, 9]);
		data
	}

	#[test]
	fn test_parse_and_decode() {
		let tls = HarryIcoTileset::new(shared(MemStream::from_vec(two_icon_file())), None)
			.unwrap();
		let entries = tls.entries();
		assert_eq!(entries.len(), 2);
		assert_eq!(entries[0].borrow().stored_size, 10);
		assert_eq!(entries[1].borrow().offset, 10);

		let mut img = tls.open_image(&entries[0]).unwrap();
		assert_eq!(img.dimensions(), Point::new(2, 3));
		assert_eq!(img.decode().unwrap(), vec![1, 2, 3, 4, 5, 6]);

		let mut img = tls.open_image(&entries[1]).unwrap();
		assert_eq!(img.dimensions(), Point::new(4, 1));
		assert_eq!(img.decode().unwrap(), vec![9; 4]);
	}

	#[test]
	fn test_probe() {
		let fmt = HarryIcoFormat;
		assert_eq!(
			fmt.probe(&mut MemStream::from_vec(two_icon_file())).unwrap(),
			Certainty::DefinitelyYes
		);
		assert_eq!(
			fmt.probe(&mut MemStream::new()).unwrap(),
			Certainty::PossiblyYes
		);
		// Promised more pixels than the file holds.
		let mut bad = two_icon_file();
		bad.truncate(bad.len() - 2);
		assert_eq!(
			fmt.probe(&mut MemStream::from_vec(bad)).unwrap(),
			Certainty::DefinitelyNo
		);
	}

	#[test]
	fn test_tile_resize_shifts_neighbour() {
		let content = shared(MemStream::from_vec(two_icon_file()));
		let tls = HarryIcoTileset::new(content.clone(), None).unwrap();
		let entries = tls.entries();

		let mut img = tls.open_image(&entries[0]).unwrap();
		img.set_dimensions(Point::new(2, 2)).unwrap();
		img.encode(&[7; 4], &[0; 4]).unwrap();

		assert_eq!(entries[0].borrow().stored_size, 8);
		assert_eq!(entries[1].borrow().offset, 8);

		let reopened = HarryIcoTileset::new(content, None).unwrap();
		assert_eq!(reopened.entries().len(), 2);
		assert_eq!(reopened.entries()[1].borrow().stored_size, 8);
	}
}
