//! Indexed colour maps and the standard DOS display palettes.
//!
//! Palettes are immutable value objects shared by reference between a
//! container and the tiles opened from it; replacing one means building a
//! new palette and handing out the new reference.

use std::rc::Rc;

use crate::error::Result;
use crate::stream::{Stream, StreamExt};

/// A single palette entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
	/// Red component (0-255)
	pub r: u8,
	/// Green component (0-255)
	pub g: u8,
	/// Blue component (0-255)
	pub b: u8,
	/// Alpha component (0-255); 0 marks a transparent entry
	pub a: u8,
}

impl Rgba {
	/// Create an entry with explicit alpha.
	pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
		Self {
			r,
			g,
			b,
			a,
		}
	}

	/// Create a fully opaque entry.
	pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
		Self::new(r, g, b, 255)
	}
}

/// An ordered indexed colour map, at most 256 entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Palette {
	entries: Vec<Rgba>,
}

/// Shared handle to an immutable palette.
pub type PaletteRef = Rc<Palette>;

/// Component width of palette data read from a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalDepth {
	/// VGA DAC values 0-63, shifted left by two on load.
	SixBit,
	/// Full-range 0-255 values.
	EightBit,
}

impl Palette {
	/// Create an empty palette.
	pub fn new() -> Self {
		Self::default()
	}

	/// Create a palette from existing entries.
	pub fn from_entries(entries: Vec<Rgba>) -> Self {
		debug_assert!(entries.len() <= 256);
		Self {
			entries,
		}
	}

	/// Number of entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// True when the palette has no entries.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Entry at `index`, if present.
	pub fn get(&self, index: u8) -> Option<Rgba> {
		self.entries.get(usize::from(index)).copied()
	}

	/// All entries in order.
	pub fn entries(&self) -> &[Rgba] {
		&self.entries
	}

	/// Read `count` three-byte RGB triples from a stream.
	pub fn from_stream(io: &mut dyn Stream, count: usize, depth: PalDepth) -> Result<Self> {
		let mut entries = Vec::with_capacity(count);
		for _ in 0..count {
			let mut rgb = [0u8; 3];
			io.read_exact(&mut rgb)?;
			if depth == PalDepth::SixBit {
				for c in &mut rgb {
					*c = (*c & 0x3F) << 2;
				}
			}
			entries.push(Rgba::rgb(rgb[0], rgb[1], rgb[2]));
		}
		Ok(Self {
			entries,
		})
	}

	/// Write the palette as three-byte RGB triples.
	pub fn write_to(&self, io: &mut dyn Stream, depth: PalDepth) -> Result<()> {
		for e in &self.entries {
			let rgb = match depth {
				PalDepth::SixBit => [e.r >> 2, e.g >> 2, e.b >> 2],
				PalDepth::EightBit => [e.r, e.g, e.b],
			};
			io.write(&rgb)?;
		}
		Ok(())
	}
}

impl std::ops::Index<u8> for Palette {
	type Output = Rgba;

	fn index(&self, index: u8) -> &Self::Output {
		&self.entries[usize::from(index)]
	}
}

/// One of the six CGA graphics-mode palette selections, plus an overridable
/// background colour in the low nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CgaVariant(pub u8);

impl CgaVariant {
	/// Green/red/brown, low intensity.
	pub const GREEN_RED: Self = Self(0x00);
	/// Green/red/brown, high intensity.
	pub const GREEN_RED_BRIGHT: Self = Self(0x80);
	/// Cyan/magenta/grey, low intensity.
	pub const CYAN_MAGENTA: Self = Self(0x10);
	/// Cyan/magenta/grey, high intensity.
	pub const CYAN_MAGENTA_BRIGHT: Self = Self(0x90);
	/// Cyan/red/grey, low intensity.
	pub const CYAN_RED: Self = Self(0x20);
	/// Cyan/red/grey, high intensity.
	pub const CYAN_RED_BRIGHT: Self = Self(0xA0);

	/// Use `background` (a full-palette index) as colour zero.
	pub const fn with_background(self, background: u8) -> Self {
		Self((self.0 & 0xF0) | (background & 0x0F))
	}
}

/// Generate one of the four-colour CGA palettes.
pub fn cga(variant: CgaVariant) -> Palette {
	let full = full_cga();
	let bright = variant.0 & 0x80 != 0;
	let boost = if bright { 8 } else { 0 };
	let indices: [u8; 3] = match variant.0 & 0x70 {
		0x10 => [3, 5, 7], // cyan, magenta, grey
		0x20 => [3, 4, 7], // cyan, red, grey
		_ => [2, 4, 6],    // green, red, brown
	};
	let mut entries = Vec::with_capacity(4);
	entries.push(full[variant.0 & 0x0F]);
	for i in indices {
		entries.push(full[i + boost]);
	}
	Palette::from_entries(entries)
}

/// Generate the standard 16-colour palette shared by CGA text modes and the
/// default EGA setting.  Slot 6 is brown, not dark yellow.
pub fn full_cga() -> Palette {
	let mut entries = Vec::with_capacity(16);
	for i in 0..16u8 {
		let half = |bit: u8| -> u8 {
			if i & bit != 0 {
				if i & 8 != 0 { 0xFF } else { 0xAA }
			} else if i & 8 != 0 {
				0x55
			} else {
				0x00
			}
		};
		let mut e = Rgba::rgb(half(4), half(2), half(1));
		if i == 6 {
			e.g = 0x55;
		}
		entries.push(e);
	}
	Palette::from_entries(entries)
}

/// The default EGA palette is the same 16 colours as the full CGA one.
pub fn ega() -> Palette {
	full_cga()
}

/// Generate all 64 colours the EGA palette registers can select.
pub fn full_ega() -> Palette {
	let low = 0x55u8;
	let mut entries = Vec::with_capacity(64);
	for i in 0..64u8 {
		let c = |hi: u8, lo: u8| -> u8 {
			(if i & hi != 0 { !low } else { 0 }) | (if i & lo != 0 { low } else { 0 })
		};
		entries.push(Rgba::rgb(c(4, 32), c(2, 16), c(1, 8)));
	}
	Palette::from_entries(entries)
}

/// Generate the 256-colour VGA mode 13h default palette.
pub fn vga_default() -> Palette {
	let mut entries = full_cga().entries().to_vec();

	// 16 grey levels.
	const GREYS: [u8; 16] = [0, 5, 8, 11, 14, 17, 20, 24, 28, 32, 36, 40, 45, 50, 56, 63];
	for g in GREYS {
		entries.push(Rgba::rgb(g << 2, g << 2, g << 2));
	}

	// Three brightness groups, each holding three 24-hue saturation rings.
	const GROUPS: [(u8, [u8; 3]); 3] = [(63, [0, 31, 45]), (28, [0, 14, 20]), (16, [0, 8, 11])];
	for (max, mins) in GROUPS {
		for min in mins {
			let span = u32::from(max - min);
			let ramp: [u8; 5] =
				std::array::from_fn(|k| min + ((2 * span * k as u32 + 3) / 8) as u8);
			let (m, v1, v2, v3, hi) = (ramp[0], ramp[1], ramp[2], ramp[3], ramp[4]);
			let hues: [(u8, u8, u8); 24] = [
				(m, m, hi),
				(v1, m, hi),
				(v2, m, hi),
				(v3, m, hi),
				(hi, m, hi),
				(hi, m, v3),
				(hi, m, v2),
				(hi, m, v1),
				(hi, m, m),
				(hi, v1, m),
				(hi, v2, m),
				(hi, v3, m),
				(hi, hi, m),
				(v3, hi, m),
				(v2, hi, m),
				(v1, hi, m),
				(m, hi, m),
				(m, hi, v1),
				(m, hi, v2),
				(m, hi, v3),
				(m, hi, hi),
				(m, v3, hi),
				(m, v2, hi),
				(m, v1, hi),
			];
			for (r, g, b) in hues {
				entries.push(Rgba::rgb(r << 2, g << 2, b << 2));
			}
		}
	}

	// The last eight entries are black.
	entries.resize(256, Rgba::rgb(0, 0, 0));
	Palette::from_entries(entries)
}

/// Generate a black-and-white palette.
pub fn mono_default() -> Palette {
	Palette::from_entries(vec![Rgba::rgb(0, 0, 0), Rgba::rgb(255, 255, 255)])
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::stream::MemStream;

	#[test]
	fn test_full_cga_brown() {
		let pal = full_cga();
		assert_eq!(pal.len(), 16);
		assert_eq!(pal[6], Rgba::rgb(0xAA, 0x55, 0x00));
		assert_eq!(pal[15], Rgba::rgb(0xFF, 0xFF, 0xFF));
		assert_eq!(pal[1], Rgba::rgb(0x00, 0x00, 0xAA));
	}

	#[test]
	fn test_full_ega_extremes() {
		let pal = full_ega();
		assert_eq!(pal.len(), 64);
		assert_eq!(pal[0], Rgba::rgb(0, 0, 0));
		assert_eq!(pal[63], Rgba::rgb(0xFF, 0xFF, 0xFF));
		// Bit 3 is the low-intensity blue component.
		assert_eq!(pal[8], Rgba::rgb(0, 0, 0x55));
	}

	#[test]
	fn test_cga_variants() {
		let pal = cga(CgaVariant::CYAN_MAGENTA_BRIGHT);
		assert_eq!(pal.len(), 4);
		assert_eq!(pal[0], Rgba::rgb(0, 0, 0));
		assert_eq!(pal[1], Rgba::rgb(0x55, 0xFF, 0xFF));
		assert_eq!(pal[2], Rgba::rgb(0xFF, 0x55, 0xFF));
		assert_eq!(pal[3], Rgba::rgb(0xFF, 0xFF, 0xFF));

		let pal = cga(CgaVariant::GREEN_RED);
		assert_eq!(pal[1], Rgba::rgb(0x00, 0xAA, 0x00));
		assert_eq!(pal[2], Rgba::rgb(0xAA, 0x00, 0x00));
		assert_eq!(pal[3], Rgba::rgb(0xAA, 0x55, 0x00));

		let pal = cga(CgaVariant::GREEN_RED.with_background(1));
		assert_eq!(pal[0], Rgba::rgb(0x00, 0x00, 0xAA));
	}

	#[test]
	fn test_vga_default_shape() {
		let pal = vga_default();
		assert_eq!(pal.len(), 256);
		assert_eq!(pal[0], Rgba::rgb(0, 0, 0));
		// First hue ring of the bright group starts at pure blue.
		assert_eq!(pal[32], Rgba::rgb(0, 0, 63 << 2));
		assert_eq!(pal[255], Rgba::rgb(0, 0, 0));
	}

	#[test]
	fn test_stream_roundtrip_six_bit() {
		let src = Palette::from_entries(vec![
			Rgba::rgb(0xFC, 0x00, 0x54),
			Rgba::rgb(0x00, 0xA8, 0xFC),
		]);
		let mut io = MemStream::new();
		src.write_to(&mut io, PalDepth::SixBit).unwrap();
		assert_eq!(io.as_bytes(), &[0x3F, 0x00, 0x15, 0x00, 0x2A, 0x3F]);

		io.seek(std::io::SeekFrom::Start(0)).unwrap();
		let back = Palette::from_stream(&mut io, 2, PalDepth::SixBit).unwrap();
		assert_eq!(back, src);
	}

	#[test]
	fn test_mono() {
		let pal = mono_default();
		assert_eq!(pal.len(), 2);
		assert_eq!(pal[1], Rgba::rgb(255, 255, 255));
	}
}
