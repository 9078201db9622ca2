//! A read-only tileset assembled from existing images.
//!
//! Games sometimes scatter their tiles across full-screen pictures; this
//! wrapper presents "the first 25x32 region of one image plus a grid of
//! 16x16 tiles from another" as a single browsable tileset.  It never
//! writes anything back.

use std::cell::RefCell;
use std::rc::Rc;

use super::{Attributes, EntryRef, FatEntry, Tileset, TilesetCaps, entry_ref};
use crate::error::{Error, Result};
use crate::image::{ColourDepth, Image, MemoryImage, Point, Rect};
use crate::pal::PaletteRef;

/// Shared handle to a source image.
pub type SourceImage = Rc<RefCell<Box<dyn Image>>>;

/// One contribution to the synthetic tileset.
pub enum ImageListItem {
	/// The whole image becomes one tile.
	Whole(SourceImage),
	/// A rectangle of the image is cut into a uniform grid of tiles.
	Grid {
		/// Source picture.
		image: SourceImage,
		/// Size of each tile.
		tile_size: Point,
		/// Area to cut; width and height must be multiples of `tile_size`.
		area: Rect,
	},
	/// Arbitrary sub-rectangles of the image, one tile each.
	List {
		/// Source picture.
		image: SourceImage,
		/// Tile coordinates.
		coords: Vec<Rect>,
	},
}

struct TileSource {
	image: SourceImage,
	rect: Option<Rect>,
}

/// The assembled read-only tileset.
pub struct FromImageList {
	entries: Vec<EntryRef>,
	tiles: Vec<TileSource>,
	layout_width: u32,
}

impl FromImageList {
	/// Flatten `items` into a tile list.
	pub fn new(items: Vec<ImageListItem>, layout_width: u32) -> Result<Self> {
		let mut tiles = Vec::new();
		for item in items {
			match item {
				ImageListItem::Whole(image) => tiles.push(TileSource {
					image,
					rect: None,
				}),
				ImageListItem::Grid {
					image,
					tile_size,
					area,
				} => {
					if tile_size.x == 0 || tile_size.y == 0 {
						return Err(Error::format("grid tile size cannot be zero"));
					}
					if !area.width.is_multiple_of(tile_size.x)
						|| !area.height.is_multiple_of(tile_size.y)
					{
						return Err(Error::format(
							"grid area must be a whole number of tiles",
						));
					}
					for ty in 0..area.height / tile_size.y {
						for tx in 0..area.width / tile_size.x {
							tiles.push(TileSource {
								image: Rc::clone(&image),
								rect: Some(Rect {
									x: area.x + tx * tile_size.x,
									y: area.y + ty * tile_size.y,
									width: tile_size.x,
									height: tile_size.y,
								}),
							});
						}
					}
				}
				ImageListItem::List {
					image,
					coords,
				} => {
					for rect in coords {
						tiles.push(TileSource {
							image: Rc::clone(&image),
							rect: Some(rect),
						});
					}
				}
			}
		}

		let entries = tiles
			.iter()
			.enumerate()
			.map(|(i, t)| {
				let dims = match t.rect {
					Some(r) => Point::new(r.width, r.height),
					None => t.image.borrow().dimensions(),
				};
				entry_ref(FatEntry {
					valid: true,
					index: i,
					offset: 0,
					stored_size: u64::from(dims.x) * u64::from(dims.y),
					real_size: u64::from(dims.x) * u64::from(dims.y),
					len_header: 0,
					attr: Attributes::empty(),
					type_tag: "tile/from-image".to_string(),
					name: None,
				})
			})
			.collect();

		Ok(Self {
			entries,
			tiles,
			layout_width,
		})
	}

	fn read_only() -> Error {
		Error::format("this tileset is assembled from other images and cannot be modified")
	}
}

impl Tileset for FromImageList {
	fn caps(&self) -> TilesetCaps {
		TilesetCaps::empty()
	}

	fn colour_depth(&self) -> ColourDepth {
		self.tiles
			.first()
			.map_or(ColourDepth::Vga, |t| t.image.borrow().colour_depth())
	}

	fn entries(&self) -> Vec<EntryRef> {
		self.entries.clone()
	}

	fn layout_width(&self) -> u32 {
		self.layout_width
	}

	fn open_image(&self, id: &EntryRef) -> Result<Box<dyn Image>> {
		let index = id.borrow().index;
		let tile = self
			.tiles
			.get(index)
			.ok_or_else(|| Error::out_of_range("tile", index, self.tiles.len()))?;

		let mut source = tile.image.borrow_mut();
		let src_dims = source.dimensions();
		let pixels = source.decode()?;
		let mask = source.decode_mask()?;
		let depth = source.colour_depth();
		let pal = source.palette();

		let (dims, pixels, mask) = match tile.rect {
			None => (src_dims, pixels, mask),
			Some(r) => {
				if r.x + r.width > src_dims.x || r.y + r.height > src_dims.y {
					return Err(Error::format("tile rectangle outside source image"));
				}
				let mut out_pix = Vec::with_capacity((r.width * r.height) as usize);
				let mut out_mask = Vec::with_capacity((r.width * r.height) as usize);
				for y in r.y..r.y + r.height {
					let start = (y * src_dims.x + r.x) as usize;
					out_pix.extend_from_slice(&pixels[start..start + r.width as usize]);
					out_mask.extend_from_slice(&mask[start..start + r.width as usize]);
				}
				(Point::new(r.width, r.height), out_pix, out_mask)
			}
		};

		let mut img = MemoryImage::new(dims, depth, pixels, mask);
		if let Some(pal) = pal {
			img = img.with_palette(pal);
		}
		Ok(Box::new(img))
	}

	fn open_tileset(&self, _id: &EntryRef) -> Result<Box<dyn Tileset>> {
		Err(Self::read_only())
	}

	fn insert(&mut self, _before: Option<&EntryRef>, _attr: Attributes) -> Result<EntryRef> {
		Err(Self::read_only())
	}

	fn remove(&mut self, _id: &EntryRef) -> Result<()> {
		Err(Self::read_only())
	}

	fn resize(&mut self, _id: &EntryRef, _new_stored: u64, _new_real: u64) -> Result<()> {
		Err(Self::read_only())
	}

	fn palette(&self) -> Option<PaletteRef> {
		self.tiles.first().and_then(|t| t.image.borrow().palette())
	}

	fn flush(&mut self) -> Result<()> {
		Ok(())
	}
}

/// Wrap an image for use as a tile source.
pub fn source_image(img: Box<dyn Image>) -> SourceImage {
	Rc::new(RefCell::new(img))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn gradient_image(w: u32, h: u32) -> SourceImage {
		let pixels = (0..w * h).map(|i| (i % 251) as u8).collect();
		let mask = vec![0u8; (w * h) as usize];
		source_image(Box::new(MemoryImage::new(
			Point::new(w, h),
			ColourDepth::Vga,
			pixels,
			mask,
		)))
	}

	#[test]
	fn test_grid_split() {
		let src = gradient_image(32, 16);
		let tls = FromImageList::new(
			vec![ImageListItem::Grid {
				image: src,
				tile_size: Point::new(16, 16),
				area: Rect {
					x: 0,
					y: 0,
					width: 32,
					height: 16,
				},
			}],
			2,
		)
		.unwrap();

		let entries = tls.entries();
		assert_eq!(entries.len(), 2);

		let mut tile = tls.open_image(&entries[1]).unwrap();
		assert_eq!(tile.dimensions(), Point::new(16, 16));
		// Second tile starts 16 pixels in.
		assert_eq!(tile.decode().unwrap()[0], 16);
	}

	#[test]
	fn test_whole_plus_list() {
		let src = gradient_image(8, 8);
		let tls = FromImageList::new(
			vec![
				ImageListItem::Whole(Rc::clone(&src)),
				ImageListItem::List {
					image: src,
					coords: vec![Rect {
						x: 2,
						y: 2,
						width: 3,
						height: 2,
					}],
				},
			],
			4,
		)
		.unwrap();

		let entries = tls.entries();
		assert_eq!(entries.len(), 2);
		let mut whole = tls.open_image(&entries[0]).unwrap();
		assert_eq!(whole.dimensions(), Point::new(8, 8));
		let mut cut = tls.open_image(&entries[1]).unwrap();
		assert_eq!(cut.dimensions(), Point::new(3, 2));
		assert_eq!(cut.decode().unwrap(), vec![18, 19, 20, 26, 27, 28]);
	}

	#[test]
	fn test_mutation_rejected() {
		let src = gradient_image(8, 8);
		let mut tls =
			FromImageList::new(vec![ImageListItem::Whole(src)], 1).unwrap();
		let entries = tls.entries();
		assert!(tls.insert(None, Attributes::empty()).is_err());
		assert!(tls.remove(&entries[0]).is_err());
		assert!(tls.resize(&entries[0], 1, 1).is_err());
	}

	#[test]
	fn test_misaligned_grid_rejected() {
		let src = gradient_image(20, 16);
		assert!(
			FromImageList::new(
				vec![ImageListItem::Grid {
					image: src,
					tile_size: Point::new(16, 16),
					area: Rect {
						x: 0,
						y: 0,
						width: 20,
						height: 16,
					},
				}],
				1,
			)
			.is_err()
		);
	}
}
