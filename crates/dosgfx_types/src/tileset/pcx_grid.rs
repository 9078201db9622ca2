//! Tilesets that are really one big PCX picture cut into a grid.
//!
//! Several games keep their tiles drawn side by side in an ordinary
//! 320x200 VGA screen dump; the tile size is fixed by the game, not the
//! file.  Hocus Pocus uses 16x16 tiles, Wacky Wheels 32x32.

use super::Tileset;
use super::from_images::{FromImageList, ImageListItem, source_image};
use crate::error::Result;
use crate::image::{Image, PcxFormat, PcxImage, Point, Rect};
use crate::registry::{Certainty, ImageFormat, TilesetFormat};
use crate::stream::{SharedStream, Stream};
use crate::supp::SuppData;

/// A fixed-grid PCX tileset format.
pub struct PcxGridFormat {
	code: &'static str,
	name: &'static str,
	games: &'static [&'static str],
	tile_size: Point,
}

impl PcxGridFormat {
	/// Hocus Pocus: 16x16 tiles.
	pub fn hocus() -> Self {
		Self {
			code: "tls-hocus",
			name: "Hocus Pocus Tileset",
			games: &["Hocus Pocus"],
			tile_size: Point::new(16, 16),
		}
	}

	/// Wacky Wheels: 32x32 tiles.
	pub fn wacky() -> Self {
		Self {
			code: "tls-wacky",
			name: "Wacky Wheels Tileset",
			games: &["Wacky Wheels"],
			tile_size: Point::new(32, 32),
		}
	}
}

impl TilesetFormat for PcxGridFormat {
	fn code(&self) -> String {
		self.code.to_string()
	}

	fn friendly_name(&self) -> String {
		self.name.to_string()
	}

	fn extensions(&self) -> Vec<&'static str> {
		vec!["pcx"]
	}

	fn games(&self) -> Vec<&'static str> {
		self.games.to_vec()
	}

	fn probe(&self, content: &mut dyn Stream) -> Result<Certainty> {
		// Every valid VGA PCX could be one of these; nothing in the file
		// says whether the game treats it as tiles.
		if PcxFormat::linear_vga().probe(content)? == Certainty::DefinitelyNo {
			return Ok(Certainty::DefinitelyNo);
		}
		Ok(Certainty::PossiblyYes)
	}

	fn open(&self, content: SharedStream, _supp: &SuppData) -> Result<Box<dyn Tileset>> {
		let img = PcxImage::new(content, 8, 1, true)?;
		let dims = img.dimensions();
		// Partial tiles at the edges are not addressable by the game.
		let area = Rect {
			x: 0,
			y: 0,
			width: dims.x - dims.x % self.tile_size.x,
			height: dims.y - dims.y % self.tile_size.y,
		};
		let layout_width = area.width / self.tile_size.x;
		let tileset = FromImageList::new(
			vec![ImageListItem::Grid {
				image: source_image(Box::new(img)),
				tile_size: self.tile_size,
				area,
			}],
			layout_width,
		)?;
		Ok(Box::new(tileset))
	}

	fn create(&self, content: SharedStream, supp: &SuppData) -> Result<Box<dyn Tileset>> {
		PcxFormat::linear_vga().create(content.clone(), supp)?;
		self.open(content, supp)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::stream::{MemStream, shared};

	fn screen_pcx(width: u32, height: u32) -> SharedStream {
		let content = shared(MemStream::new());
		let fmt = PcxFormat::linear_vga();
		let mut img = fmt.create(content.clone(), &SuppData::new()).unwrap();
		img.set_dimensions(Point::new(width, height)).unwrap();
		let pixels: Vec<u8> = (0..width * height).map(|i| (i % 256) as u8).collect();
		img.encode(&pixels, &vec![0u8; pixels.len()]).unwrap();
		content
	}

	#[test]
	fn test_grid_over_pcx() {
		let content = screen_pcx(64, 32);
		let fmt = PcxGridFormat::hocus();
		assert_eq!(
			fmt.probe(&mut *content.borrow_mut()).unwrap(),
			Certainty::PossiblyYes
		);

		let tls = fmt.open(content, &SuppData::new()).unwrap();
		assert_eq!(tls.entries().len(), 8);
		assert_eq!(tls.layout_width(), 4);

		let mut tile = tls.open_image(&tls.entries()[1]).unwrap();
		assert_eq!(tile.dimensions(), Point::new(16, 16));
		// Second tile starts sixteen pixels into the top row.
		assert_eq!(tile.decode().unwrap()[0], 16);
	}

	#[test]
	fn test_wacky_tile_size() {
		let content = screen_pcx(64, 64);
		let tls = PcxGridFormat::wacky().open(content, &SuppData::new()).unwrap();
		assert_eq!(tls.entries().len(), 4);
		let tile = tls.open_image(&tls.entries()[0]).unwrap();
		assert_eq!(tile.dimensions(), Point::new(32, 32));
	}

	#[test]
	fn test_partial_edge_tiles_dropped() {
		let content = screen_pcx(40, 20);
		let tls = PcxGridFormat::hocus().open(content, &SuppData::new()).unwrap();
		// Only the 32x16 region divides evenly.
		assert_eq!(tls.entries().len(), 2);
	}
}
