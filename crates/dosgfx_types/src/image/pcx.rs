//! PCX image reader and writer.
//!
//! # File structure
//!
//! | Offset | Size | Field                                    |
//! |--------|------|------------------------------------------|
//! | 0x00   | 1    | Magic, 0x0A                              |
//! | 0x01   | 1    | Version (0, 2, 3 or 5)                   |
//! | 0x02   | 1    | Encoding (1 = RLE, 0 = uncompressed)     |
//! | 0x03   | 1    | Bits per plane                           |
//! | 0x04   | 8    | xmin, ymin, xmax, ymax (u16le each)      |
//! | 0x0C   | 4    | DPI                                      |
//! | 0x10   | 48   | 16-colour EGA palette (16 x 3 bytes)     |
//! | 0x40   | 1    | Reserved                                 |
//! | 0x41   | 1    | Plane count                              |
//! | 0x42   | 2    | Bytes per scanline per plane             |
//! | 0x44   | 2    | Palette flag                             |
//! | 0x46   | 4    | x/y scroll                               |
//! | 0x4A   | 54   | Reserved (zero)                          |
//!
//! The image region starts at 0x80: for each scanline, each plane
//! contributes `bytes_per_scanline` bytes, RLE-compressed when encoding is
//! 1.  Runs never span scanline boundaries.  When the version is 5 and more
//! than 16 colours are in play, the last 769 bytes of the file are 0x0C
//! followed by a 256-colour VGA palette.

use std::io::SeekFrom;
use std::rc::Rc;

use super::{ColourDepth, Image, ImageCaps, Pixels, Point, check_buffer_sizes};
use crate::error::{Error, Result};
use crate::filter::{PcxRle, PcxUnrle, filter_vec};
use crate::pal::{self, PalDepth, Palette, PaletteRef};
use crate::registry::{Certainty, ImageFormat};
use crate::stream::{BitOrder, BitWriter, MemStream, SharedStream, Stream, StreamExt};
use crate::supp::SuppData;

/// Length of the fixed PCX header.
pub const PCX_HEADER_LEN: u64 = 128;

/// Length of the optional trailing VGA palette (flag byte + 256 triples).
const VGA_PAL_LEN: u64 = 769;

/// Scanlines are padded to a multiple of this many bytes.
const PLANE_PAD: u32 = 2;

/// A PCX file of a specific plane geometry.
pub struct PcxImage {
	content: SharedStream,
	bits_per_plane: u8,
	num_planes: u8,
	use_rle: bool,
	ver: u8,
	encoding: u8,
	dims: Point,
	pal: PaletteRef,
}

impl PcxImage {
	/// Parse the header of an existing file.
	///
	/// `bits_per_plane` and `num_planes` pin the expected geometry; a file
	/// in a different PCX sub-format is rejected rather than misread.
	pub fn new(
		content: SharedStream,
		bits_per_plane: u8,
		num_planes: u8,
		use_rle: bool,
	) -> Result<Self> {
		let (ver, encoding, dims, pal) = {
			let mut io = content.borrow_mut();
			io.seek(SeekFrom::Start(1))?;
			let ver = io.read_u8()?;
			let encoding = io.read_u8()?;
			let bpp = io.read_u8()?;
			let xmin = io.read_u16le()?;
			let ymin = io.read_u16le()?;
			let xmax = io.read_u16le()?;
			let ymax = io.read_u16le()?;
			let dims = Point::new(
				u32::from(xmax.wrapping_sub(xmin)) + 1,
				u32::from(ymax.wrapping_sub(ymin)) + 1,
			);

			io.seek(SeekFrom::Start(65))?;
			let pln = io.read_u8()?;
			if bpp != bits_per_plane || pln != num_planes {
				return Err(Error::format(format!(
					"this file is PCX {bpp}b{pln}p, cannot open as PCX {bits_per_plane}b{num_planes}p"
				)));
			}

			let pal = Self::load_palette(&mut *io, ver)?;
			(ver, encoding, dims, pal)
		};

		Ok(Self {
			content,
			bits_per_plane,
			num_planes,
			use_rle,
			ver,
			encoding,
			dims,
			pal: Rc::new(pal),
		})
	}

	fn load_palette(io: &mut dyn Stream, ver: u8) -> Result<Palette> {
		if ver == 3 {
			// Version 2.8 without palette information.
			return Ok(pal::ega());
		}
		if ver >= 5 && io.size() >= VGA_PAL_LEN {
			io.seek(SeekFrom::End(-(VGA_PAL_LEN as i64)))?;
			if io.read_u8()? == 0x0C {
				return Palette::from_stream(io, 256, PalDepth::EightBit);
			}
		}
		io.seek(SeekFrom::Start(16))?;
		Palette::from_stream(io, 16, PalDepth::EightBit)
	}

	fn bytes_per_plane_scanline(&self) -> u32 {
		(self.dims.x * u32::from(self.bits_per_plane)).div_ceil(8)
	}

	/// Length of the RLE region, excluding any trailing VGA palette.
	fn image_region_len(&mut self) -> Result<u64> {
		let mut len = self.content.size().saturating_sub(PCX_HEADER_LEN);
		if self.ver >= 5 && self.content.size() >= PCX_HEADER_LEN + VGA_PAL_LEN {
			self.content.seek(SeekFrom::End(-(VGA_PAL_LEN as i64)))?;
			if self.content.borrow_mut().read_u8()? == 0x0C {
				len -= VGA_PAL_LEN;
			}
		}
		Ok(len)
	}
}

/// Pull `bits` bits MSB-first from `data` starting at `bit_pos`.  Bits past
/// the end of the buffer read as zero.
fn get_bits(data: &[u8], bit_pos: usize, bits: u32, short: &mut bool) -> u8 {
	let mut val = 0u8;
	for i in 0..bits as usize {
		let pos = bit_pos + i;
		let byte = pos / 8;
		let bit = match data.get(byte) {
			Some(b) => (b >> (7 - pos % 8)) & 1,
			None => {
				*short = true;
				0
			}
		};
		val = (val << 1) | bit;
	}
	val
}

impl Image for PcxImage {
	fn caps(&self) -> ImageCaps {
		ImageCaps::SET_DIMENSIONS | ImageCaps::HAS_PALETTE | ImageCaps::SET_PALETTE
	}

	fn colour_depth(&self) -> ColourDepth {
		let colours = 1u32 << (u32::from(self.num_planes) * u32::from(self.bits_per_plane));
		if colours > 16 {
			ColourDepth::Vga
		} else if colours > 4 {
			ColourDepth::Ega
		} else if colours > 1 {
			ColourDepth::Cga
		} else {
			ColourDepth::Mono
		}
	}

	fn dimensions(&self) -> Point {
		self.dims
	}

	fn set_dimensions(&mut self, new_dims: Point) -> Result<()> {
		self.dims = new_dims;
		Ok(())
	}

	fn palette(&self) -> Option<PaletteRef> {
		Some(Rc::clone(&self.pal))
	}

	fn set_palette(&mut self, new_palette: PaletteRef) -> Result<()> {
		self.pal = new_palette;
		Ok(())
	}

	fn decode(&mut self) -> Result<Pixels> {
		let dims = self.dims;
		let mut pixels = vec![0u8; dims.area()];

		self.content.seek(SeekFrom::Start(66))?;
		let bytes_per_scanline = u64::from(self.content.borrow_mut().read_u16le()?);

		let len_region = self.image_region_len()?;
		self.content.seek(SeekFrom::Start(PCX_HEADER_LEN))?;
		let raw = self.content.borrow_mut().read_vec(len_region as usize)?;
		let data = if self.encoding == 1 {
			filter_vec(&mut PcxUnrle::new(), &raw)?
		} else {
			raw
		};

		let plane_bytes = self.bytes_per_plane_scanline() as usize;
		let consumed = plane_bytes * usize::from(self.num_planes);
		let advance = consumed.max(bytes_per_scanline as usize);
		let bpp = u32::from(self.bits_per_plane);

		let mut short = false;
		let mut pos = 0usize;
		for y in 0..dims.y as usize {
			let line = &mut pixels[y * dims.x as usize..(y + 1) * dims.x as usize];
			for p in 0..usize::from(self.num_planes) {
				let plane_base = (pos + p * plane_bytes) * 8;
				for (x, out) in line.iter_mut().enumerate() {
					let val = get_bits(&data, plane_base + x * bpp as usize, bpp, &mut short);
					*out |= val << (p as u32 * bpp);
				}
			}
			pos += advance;
		}
		if short {
			log::warn!("PCX data ended early; returning partial image");
		}
		Ok(pixels)
	}

	fn decode_mask(&mut self) -> Result<Pixels> {
		// PCX carries no transparency data.
		Ok(vec![0u8; self.dims.area()])
	}

	fn encode(&mut self, pixels: &[u8], mask: &[u8]) -> Result<()> {
		let dims = self.dims;
		if dims.x == 0 || dims.y == 0 {
			return Err(Error::format("image dimensions must be set before encoding"));
		}
		check_buffer_sizes(dims, pixels, mask)?;

		let plane_bytes = self.bytes_per_plane_scanline();
		let bytes_per_scanline =
			(plane_bytes * u32::from(self.num_planes)).next_multiple_of(PLANE_PAD);

		// Worst case size, trimmed back once everything is written.
		let max_size =
			PCX_HEADER_LEN + u64::from(bytes_per_scanline) * u64::from(dims.y) + VGA_PAL_LEN;
		self.content.truncate(max_size)?;

		self.content.seek(SeekFrom::Start(0))?;
		{
			let mut io = self.content.borrow_mut();
			io.write_u8(0x0A)?;
			io.write_u8(self.ver)?;
			io.write_u8(if self.use_rle { self.encoding } else { 0 })?;
			io.write_u8(self.bits_per_plane)?;
			io.write_u16le(0)?; // xmin
			io.write_u16le(0)?; // ymin
			io.write_u16le(dims.x as u16 - 1)?;
			io.write_u16le(dims.y as u16 - 1)?;
			io.write_u16le(75)?; // dpi
			io.write_u16le(75)?;
			for i in 0..16u8 {
				let e = self.pal.get(i).unwrap_or(pal::Rgba::rgb(0, 0, 0));
				io.write(&[e.r, e.g, e.b])?;
			}
			io.write_u8(0)?; // reserved
			io.write_u8(self.num_planes)?;
			io.write_u16le(bytes_per_scanline as u16)?;
			io.write_u16le(1)?; // colour palette
			io.write_u16le(0)?;
			io.write_u16le(0)?;
			io.write(&[0u8; 54])?;
			debug_assert_eq!(io.pos(), PCX_HEADER_LEN);
		}

		// Build the raw image region, one byte-padded plane after another.
		let bpp = u32::from(self.bits_per_plane);
		let plane_mask = ((1u32 << bpp) - 1) as u8;
		let mut region = MemStream::new();
		for y in 0..dims.y as usize {
			let line = &pixels[y * dims.x as usize..(y + 1) * dims.x as usize];
			let line_start = region.pos();
			let mut last = 0u8;
			for p in 0..u32::from(self.num_planes) {
				let mut bits = BitWriter::new(&mut region, BitOrder::MsbFirst);
				for &px in line {
					bits.write(bpp, u32::from((px >> (p * bpp)) & plane_mask))?;
				}
				// Pad the plane to a byte boundary, borrowing bits from the
				// previous byte so an RLE run can continue across the pad.
				let fill = bits.last_byte();
				bits.flush_byte_with(fill)?;
				last = bits.last_byte();
			}
			// Pad the scanline to the advertised length with the last
			// literal, again to keep the RLE pass cheap.
			while region.pos() - line_start < u64::from(bytes_per_scanline) {
				region.write_u8(last)?;
			}
		}

		let raw = region.into_vec();
		let encoded = if self.use_rle && self.encoding == 1 {
			filter_vec(&mut PcxRle::new(u64::from(bytes_per_scanline)), &raw)?
		} else {
			raw
		};
		self.content.seek(SeekFrom::Start(PCX_HEADER_LEN))?;
		self.content.write(&encoded)?;

		// A 256-colour palette only fits in version 5 files.
		if self.ver >= 5 && self.pal.len() > 16 {
			let mut io = self.content.borrow_mut();
			io.write_u8(0x0C)?;
			for i in 0..=255u8 {
				let e = self.pal.get(i).unwrap_or(pal::Rgba::rgb(0, 0, 0));
				io.write(&[e.r, e.g, e.b])?;
			}
		}

		let end = self.content.pos();
		self.content.truncate(end)?;
		Ok(())
	}
}

/// One of the registered PCX sub-formats.
pub struct PcxFormat {
	bits_per_plane: u8,
	num_planes: u8,
	use_rle: bool,
	games: &'static [&'static str],
}

impl PcxFormat {
	/// 16-colour planar EGA (1 bit per plane, 4 planes).
	pub fn planar_ega() -> Self {
		Self {
			bits_per_plane: 1,
			num_planes: 4,
			use_rle: true,
			games: &["Word Rescue"],
		}
	}

	/// 256-colour linear VGA (8 bits per plane, 1 plane).
	pub fn linear_vga() -> Self {
		Self {
			bits_per_plane: 8,
			num_planes: 1,
			use_rle: true,
			games: &["Halloween Harry"],
		}
	}

	/// 256-colour linear VGA without RLE.
	pub fn linear_vga_norle() -> Self {
		Self {
			bits_per_plane: 8,
			num_planes: 1,
			use_rle: false,
			games: &[],
		}
	}
}

impl ImageFormat for PcxFormat {
	fn code(&self) -> String {
		let mut code = format!("img-pcx-{}b{}p", self.bits_per_plane, self.num_planes);
		if !self.use_rle {
			code.push_str("-norle");
		}
		code
	}

	fn friendly_name(&self) -> String {
		match (self.bits_per_plane, self.num_planes, self.use_rle) {
			(1, 4, _) => "PCX image (16-colour planar EGA)".to_string(),
			(8, 1, true) => "PCX image (256-colour linear VGA)".to_string(),
			(8, 1, false) => "PCX image (256-colour linear VGA; no RLE)".to_string(),
			_ => format!("PCX image ({}b{}p)", self.bits_per_plane, self.num_planes),
		}
	}

	fn extensions(&self) -> Vec<&'static str> {
		vec!["pcx"]
	}

	fn games(&self) -> Vec<&'static str> {
		self.games.to_vec()
	}

	fn probe(&self, content: &mut dyn Stream) -> Result<Certainty> {
		if content.size() < PCX_HEADER_LEN {
			return Ok(Certainty::DefinitelyNo);
		}
		content.seek(SeekFrom::Start(0))?;
		let sig = content.read_u8()?;
		let ver = content.read_u8()?;
		let _enc = content.read_u8()?; // accept files either way; RLE is a write-side choice
		let bpp = content.read_u8()?;

		if sig != 0x0A {
			return Ok(Certainty::DefinitelyNo);
		}
		if !matches!(ver, 0 | 2 | 3 | 5) {
			return Ok(Certainty::DefinitelyNo);
		}
		if bpp != self.bits_per_plane {
			return Ok(Certainty::DefinitelyNo);
		}

		content.seek(SeekFrom::Start(65))?;
		if content.read_u8()? != self.num_planes {
			return Ok(Certainty::DefinitelyNo);
		}
		Ok(Certainty::DefinitelyYes)
	}

	fn open(&self, content: SharedStream, _supp: &SuppData) -> Result<Box<dyn Image>> {
		Ok(Box::new(PcxImage::new(
			content,
			self.bits_per_plane,
			self.num_planes,
			self.use_rle,
		)?))
	}

	fn create(&self, content: SharedStream, supp: &SuppData) -> Result<Box<dyn Image>> {
		{
			let mut io = content.borrow_mut();
			io.truncate(0)?;
			io.seek(SeekFrom::Start(0))?;
			io.write_u8(0x0A)?;
			io.write_u8(0x05)?;
			io.write_u8(if self.use_rle { 1 } else { 0 })?;
			io.write_u8(self.bits_per_plane)?;
			io.write(&[0u8; 12])?; // bounds and dpi
			let default = pal::ega();
			for e in default.entries() {
				io.write(&[e.r, e.g, e.b])?;
			}
			io.write_u8(0)?; // reserved
			io.write_u8(self.num_planes)?;
			io.write_u16le(0)?; // bytes per scanline, set on first encode
			io.write_u16le(1)?; // palette flag
			io.write_u16le(0)?;
			io.write_u16le(0)?;
			io.write(&[0u8; 54])?;
		}
		self.open(content, supp)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::stream::shared;

	fn framed_8x8() -> Pixels {
		let mut pixels = vec![0u8; 64];
		for x in 0..8 {
			pixels[x] = 0x0F;
		}
		for y in 1..7 {
			pixels[y * 8] = 0x0C;
			pixels[y * 8 + 7] = 0x0A;
		}
		pixels[56] = 0x0C;
		for x in 1..7 {
			pixels[56 + x] = 0x09;
		}
		pixels[63] = 0x0E;
		pixels
	}

	/// Build a 140-byte 8bpp single-plane file holding the framed tile.
	fn framed_8x8_file() -> Vec<u8> {
		let content = shared(MemStream::new());
		let fmt = PcxFormat::linear_vga();
		let mut img = fmt.create(content.clone(), &SuppData::new()).unwrap();
		img.set_dimensions(Point::new(8, 8)).unwrap();
		img.encode(&framed_8x8(), &[0; 64]).unwrap();
		let mut io = content.borrow_mut();
		io.seek(SeekFrom::Start(0)).unwrap();
		io.read_to_end().unwrap()
	}

	#[test]
	fn test_encode_rle_content() {
		let file = framed_8x8_file();
		// Row 0 compresses to a single run, rows 1-6 to four bytes each.
		assert_eq!(&file[128..130], &[0xC8, 0x0F]);
		assert_eq!(&file[130..134], &[0x0C, 0xC6, 0x00, 0x0A]);
		assert_eq!(&file[134..138], &[0x0C, 0xC6, 0x00, 0x0A]);
		// Final row: literal 0C, six nines, literal 0E.
		assert_eq!(&file[154..], &[0x0C, 0xC6, 0x09, 0x0E]);
		assert_eq!(file.len(), 158);
	}

	#[test]
	fn test_decode_framed_tile() {
		let content = shared(MemStream::from_vec(framed_8x8_file()));
		let mut img = PcxImage::new(content, 8, 1, true).unwrap();
		assert_eq!(img.dimensions(), Point::new(8, 8));
		assert_eq!(img.decode().unwrap(), framed_8x8());
		assert_eq!(img.decode_mask().unwrap(), vec![0u8; 64]);
	}

	#[test]
	fn test_probe_checks_geometry() {
		let file = framed_8x8_file();
		let mut io = MemStream::from_vec(file);
		let vga = PcxFormat::linear_vga();
		let ega = PcxFormat::planar_ega();
		assert_eq!(vga.probe(&mut io).unwrap(), Certainty::DefinitelyYes);
		assert_eq!(ega.probe(&mut io).unwrap(), Certainty::DefinitelyNo);
		assert_eq!(
			vga.probe(&mut MemStream::from_vec(vec![0x0A; 20])).unwrap(),
			Certainty::DefinitelyNo
		);
	}

	#[test]
	fn test_wrong_geometry_refused_on_open() {
		let content = shared(MemStream::from_vec(framed_8x8_file()));
		assert!(matches!(PcxImage::new(content, 1, 4, true), Err(Error::Format { .. })));
	}

	#[test]
	fn test_scanline_runs_do_not_merge() {
		// 11 pixels wide: each 12-byte padded scanline compresses to CC 0F.
		let content = shared(MemStream::new());
		let fmt = PcxFormat::linear_vga();
		let mut img = fmt.create(content.clone(), &SuppData::new()).unwrap();
		img.set_dimensions(Point::new(11, 4)).unwrap();
		img.encode(&vec![0x0F; 44], &vec![0u8; 44]).unwrap();

		let mut io = content.borrow_mut();
		io.seek(SeekFrom::Start(128)).unwrap();
		let region = io.read_vec(8).unwrap();
		assert_eq!(region, vec![0xCC, 0x0F, 0xCC, 0x0F, 0xCC, 0x0F, 0xCC, 0x0F]);
	}

	#[test]
	fn test_roundtrip_planar_ega() {
		let content = shared(MemStream::new());
		let fmt = PcxFormat::planar_ega();
		let mut img = fmt.create(content.clone(), &SuppData::new()).unwrap();
		img.set_dimensions(Point::new(16, 4)).unwrap();
		let pixels: Pixels = (0..64u8).map(|i| i % 16).collect();
		img.encode(&pixels, &[0; 64]).unwrap();

		let mut img = PcxImage::new(content, 1, 4, true).unwrap();
		assert_eq!(img.dimensions(), Point::new(16, 4));
		assert_eq!(img.decode().unwrap(), pixels);
	}

	#[test]
	fn test_width_not_multiple_of_eight_roundtrips() {
		let content = shared(MemStream::new());
		let fmt = PcxFormat::planar_ega();
		let mut img = fmt.create(content.clone(), &SuppData::new()).unwrap();
		img.set_dimensions(Point::new(9, 3)).unwrap();
		let pixels: Pixels = (0..27u8).map(|i| (i * 5) % 16).collect();
		img.encode(&pixels, &[0; 27]).unwrap();

		let mut img = PcxImage::new(content, 1, 4, true).unwrap();
		assert_eq!(img.decode().unwrap(), pixels);
	}

	#[test]
	fn test_vga_palette_written_and_reloaded() {
		let entries: Vec<_> =
			(0..=255u8).map(|i| pal::Rgba::rgb(i, 255 - i, i ^ 0x55)).collect();
		let custom = Rc::new(Palette::from_entries(entries));

		let content = shared(MemStream::new());
		let fmt = PcxFormat::linear_vga();
		let mut img = fmt.create(content.clone(), &SuppData::new()).unwrap();
		img.set_dimensions(Point::new(4, 4)).unwrap();
		img.set_palette(Rc::clone(&custom)).unwrap();
		img.encode(&[7; 16], &[0; 16]).unwrap();

		let img = PcxImage::new(content, 8, 1, true).unwrap();
		assert_eq!(img.palette().unwrap().entries(), custom.entries());
	}

	#[test]
	fn test_norle_variant_stores_raw_bytes() {
		let content = shared(MemStream::new());
		let fmt = PcxFormat::linear_vga_norle();
		let mut img = fmt.create(content.clone(), &SuppData::new()).unwrap();
		img.set_dimensions(Point::new(4, 2)).unwrap();
		img.encode(&[9; 8], &[0; 8]).unwrap();

		let mut io = content.borrow_mut();
		io.seek(SeekFrom::Start(128)).unwrap();
		assert_eq!(io.read_vec(8).unwrap(), vec![9; 8]);
	}
}
