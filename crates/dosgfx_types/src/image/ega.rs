//! Plane layout descriptors shared by the EGA codecs.

/// What one plane of an EGA-style image contributes.
///
/// The `1` forms set their target bit where the plane bit is 1; the `0`
/// forms invert the plane first.  `Blank` occupies space on disk but
/// contributes nothing, letting a format skip a region without disturbing
/// the planes that follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanePurpose {
	/// No plane in this slot.
	#[default]
	Unused,
	/// Plane exists on disk but carries no data.
	Blank,
	/// Bits: 0=blue on, 1=blue off.
	Blue0,
	/// Bits: 1=blue on, 0=blue off.
	Blue1,
	/// Bits: 0=green on, 1=green off.
	Green0,
	/// Bits: 1=green on, 0=green off.
	Green1,
	/// Bits: 0=red on, 1=red off.
	Red0,
	/// Bits: 1=red on, 0=red off.
	Red1,
	/// Bits: 0=bright, 1=dark.
	Intensity0,
	/// Bits: 1=bright, 0=dark.
	Intensity1,
	/// Bits: 0=hit, 1=miss.
	Hit0,
	/// Bits: 1=hit, 0=miss.
	Hit1,
	/// Bits: 0=opaque, 1=transparent.
	Opaque0,
	/// Bits: 1=opaque, 0=transparent.
	Opaque1,
}

/// The order planes appear on disk; unused slots mark the end.
pub type PlaneLayout = [PlanePurpose; 6];

/// Number of planes in the two Crystal Caves style image kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneCount {
	/// Four colour planes, no mask.
	Solid = 4,
	/// A transparency plane plus four colour planes.
	Masked = 5,
}

/// Where a plane's bits land and how.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlaneSpec {
	/// Write into the mask buffer instead of the pixel buffer.
	pub to_mask: bool,
	/// Bit value OR'd into the target byte.
	pub value: u8,
	/// Invert plane bits before applying.
	pub swap: bool,
}

impl PlanePurpose {
	/// Decompose into target/value/inversion; `None` for [`Self::Unused`].
	pub(crate) fn spec(self) -> Option<PlaneSpec> {
		use super::Mask;
		let (to_mask, value, swap) = match self {
			Self::Unused => return None,
			Self::Blank => (false, 0x00, false),
			Self::Blue0 => (false, 0x01, true),
			Self::Blue1 => (false, 0x01, false),
			Self::Green0 => (false, 0x02, true),
			Self::Green1 => (false, 0x02, false),
			Self::Red0 => (false, 0x04, true),
			Self::Red1 => (false, 0x04, false),
			Self::Intensity0 => (false, 0x08, true),
			Self::Intensity1 => (false, 0x08, false),
			Self::Hit0 => (true, Mask::TOUCH.bits(), true),
			Self::Hit1 => (true, Mask::TOUCH.bits(), false),
			// Opaque planes are inverted relative to the mask bit: a set
			// plane bit means opaque, but the mask bit means transparent.
			Self::Opaque0 => (true, Mask::TRANSPARENT.bits(), false),
			Self::Opaque1 => (true, Mask::TRANSPARENT.bits(), true),
		};
		Some(PlaneSpec {
			to_mask,
			value,
			swap,
		})
	}

	/// True when this plane carries mask rather than colour data.
	pub fn is_mask_plane(self) -> bool {
		matches!(self, Self::Hit0 | Self::Hit1 | Self::Opaque0 | Self::Opaque1)
	}
}

/// True when any plane of `layout` writes into the mask.
pub(crate) fn has_mask_plane(layout: &PlaneLayout) -> bool {
	layout.iter().any(|p| p.is_mask_plane())
}
