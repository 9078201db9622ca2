//! Supplementary data streams.
//!
//! Some formats keep required data in a separate file: a VGA palette next
//! to a tileset, an external allocation table, a compression dictionary.
//! Callers resolve the filenames (conventions are format-defined, see
//! `required_supps` on the format traits) and pass the opened streams in a
//! [`SuppData`] map.

use std::collections::HashMap;

use crate::stream::SharedStream;

/// What role a supplementary stream plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuppKind {
	/// Palette data.
	Palette,
	/// Externally stored file allocation table.
	Fat,
	/// Compression dictionary.
	Dictionary,
	/// Format-specific extra content.
	Extra1,
}

/// Opened supplementary streams, keyed by role.
pub type SuppData = HashMap<SuppKind, SharedStream>;

/// Filenames a caller should open to satisfy a format's requirements.
pub type SuppFilenames = HashMap<SuppKind, String>;

/// Swap the extension of `filename` for `ext` (no directory handling).
pub fn with_extension(filename: &str, ext: &str) -> String {
	match filename.rfind('.') {
		Some(dot) => format!("{}.{ext}", &filename[..dot]),
		None => format!("{filename}.{ext}"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_with_extension() {
		assert_eq!(with_extension("tiles.sha", "pal"), "tiles.pal");
		assert_eq!(with_extension("vgadave", "pal"), "vgadave.pal");
	}
}
