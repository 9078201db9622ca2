//! Format descriptors and auto-detection.
//!
//! Every image and tileset format registers a descriptor carrying its
//! identity (a short code, a friendly name, extension and game hints) and
//! the probe/open/create entry points.  Detection probes every registered
//! type and keeps the best verdict, stopping early on a definite match.

use std::rc::Rc;

use crate::error::Result;
use crate::image::{Image, PcxFormat};
use crate::stream::{SharedStream, Stream};
use crate::supp::{SuppData, SuppFilenames};
use crate::tileset::{
	CCavesMainFormat, CCavesSubFormat, DDaveFormat, HarryIcoFormat, JillFormat, PcxGridFormat,
	Tileset,
};

/// How confident a probe is that content matches its format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Certainty {
	/// Definitely not in this format.
	DefinitelyNo,
	/// The checks were inconclusive; it could go either way.
	Unsure,
	/// Everything checked out, but the format has no signature.
	PossiblyYes,
	/// The format has a signature and it matched.
	DefinitelyYes,
}

/// A registered image format.
pub trait ImageFormat {
	/// Short identifying code, e.g. `img-pcx-8b1p`.
	fn code(&self) -> String;

	/// Human-readable format name.
	fn friendly_name(&self) -> String;

	/// Known file extensions.  Hints only; never used for detection.
	fn extensions(&self) -> Vec<&'static str>;

	/// Games known to use this format.
	fn games(&self) -> Vec<&'static str>;

	/// Check whether `content` looks like this format.
	fn probe(&self, content: &mut dyn Stream) -> Result<Certainty>;

	/// Open existing content.  Callers normally probe first, but a forced
	/// open of mismatching content is allowed to try its best.
	fn open(&self, content: SharedStream, supp: &SuppData) -> Result<Box<dyn Image>>;

	/// Write a blank file of this format into `content` and open it.
	fn create(&self, content: SharedStream, supp: &SuppData) -> Result<Box<dyn Image>>;

	/// Supplementary files the caller must open alongside `filename`.
	fn required_supps(&self, filename: &str) -> SuppFilenames {
		let _ = filename;
		SuppFilenames::new()
	}
}

/// A registered tileset format.
pub trait TilesetFormat {
	/// Short identifying code, e.g. `tls-ccaves-main`.
	fn code(&self) -> String;

	/// Human-readable format name.
	fn friendly_name(&self) -> String;

	/// Known file extensions.  Hints only; never used for detection.
	fn extensions(&self) -> Vec<&'static str>;

	/// Games known to use this format.
	fn games(&self) -> Vec<&'static str>;

	/// Check whether `content` looks like this format.
	fn probe(&self, content: &mut dyn Stream) -> Result<Certainty>;

	/// Open existing content.
	fn open(&self, content: SharedStream, supp: &SuppData) -> Result<Box<dyn Tileset>>;

	/// Write a blank file of this format into `content` and open it.
	fn create(&self, content: SharedStream, supp: &SuppData) -> Result<Box<dyn Tileset>>;

	/// Supplementary files the caller must open alongside `filename`.
	fn required_supps(&self, filename: &str) -> SuppFilenames {
		let _ = filename;
		SuppFilenames::new()
	}
}

/// The set of built-in formats.
pub struct Registry {
	images: Vec<Rc<dyn ImageFormat>>,
	tilesets: Vec<Rc<dyn TilesetFormat>>,
}

impl Registry {
	/// Build a registry holding every format this crate implements.
	pub fn new() -> Self {
		Self {
			images: vec![
				Rc::new(PcxFormat::planar_ega()),
				Rc::new(PcxFormat::linear_vga()),
				Rc::new(PcxFormat::linear_vga_norle()),
			],
			tilesets: vec![
				Rc::new(CCavesMainFormat::ccaves()),
				Rc::new(CCavesSubFormat),
				Rc::new(CCavesMainFormat::sagent_2k()),
				Rc::new(CCavesMainFormat::sagent_8k()),
				Rc::new(DDaveFormat::cga()),
				Rc::new(DDaveFormat::ega()),
				Rc::new(DDaveFormat::vga()),
				Rc::new(JillFormat),
				// Harry's probe is only a structural walk, so formats with
				// real signatures get first go.
				Rc::new(HarryIcoFormat),
				Rc::new(PcxGridFormat::hocus()),
				Rc::new(PcxGridFormat::wacky()),
			],
		}
	}

	/// All registered image formats, in registration order.
	pub fn image_formats(&self) -> &[Rc<dyn ImageFormat>] {
		&self.images
	}

	/// All registered tileset formats, in registration order.
	pub fn tileset_formats(&self) -> &[Rc<dyn TilesetFormat>] {
		&self.tilesets
	}

	/// Find an image format by its code.
	pub fn image_by_code(&self, code: &str) -> Option<Rc<dyn ImageFormat>> {
		self.images.iter().find(|f| f.code() == code).cloned()
	}

	/// Find a tileset format by its code.
	pub fn tileset_by_code(&self, code: &str) -> Option<Rc<dyn TilesetFormat>> {
		self.tilesets.iter().find(|f| f.code() == code).cloned()
	}

	/// Probe all image formats and return the best match, if any.
	///
	/// `DefinitelyYes` short-circuits; ties go to the first registered.
	pub fn detect_image(&self, content: &mut dyn Stream) -> Result<Option<Rc<dyn ImageFormat>>> {
		let mut best: Option<(Certainty, Rc<dyn ImageFormat>)> = None;
		for fmt in &self.images {
			let certainty = fmt.probe(content)?;
			if certainty == Certainty::DefinitelyYes {
				return Ok(Some(Rc::clone(fmt)));
			}
			if certainty > Certainty::DefinitelyNo
				&& best.as_ref().is_none_or(|(c, _)| certainty > *c)
			{
				best = Some((certainty, Rc::clone(fmt)));
			}
		}
		Ok(best.map(|(_, f)| f))
	}

	/// Probe all tileset formats and return the best match, if any.
	pub fn detect_tileset(
		&self,
		content: &mut dyn Stream,
	) -> Result<Option<Rc<dyn TilesetFormat>>> {
		let mut best: Option<(Certainty, Rc<dyn TilesetFormat>)> = None;
		for fmt in &self.tilesets {
			let certainty = fmt.probe(content)?;
			if certainty == Certainty::DefinitelyYes {
				return Ok(Some(Rc::clone(fmt)));
			}
			if certainty > Certainty::DefinitelyNo
				&& best.as_ref().is_none_or(|(c, _)| certainty > *c)
			{
				best = Some((certainty, Rc::clone(fmt)));
			}
		}
		Ok(best.map(|(_, f)| f))
	}
}

impl Default for Registry {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::stream::MemStream;

	#[test]
	fn test_codes_are_unique() {
		let reg = Registry::new();
		let mut codes: Vec<String> = reg
			.image_formats()
			.iter()
			.map(|f| f.code())
			.chain(reg.tileset_formats().iter().map(|f| f.code()))
			.collect();
		let total = codes.len();
		codes.sort();
		codes.dedup();
		assert_eq!(codes.len(), total);
	}

	#[test]
	fn test_lookup_by_code() {
		let reg = Registry::new();
		assert!(reg.image_by_code("img-pcx-1b4p").is_some());
		assert!(reg.tileset_by_code("tls-ddave-vga").is_some());
		assert!(reg.tileset_by_code("tls-nonexistent").is_none());
	}

	#[test]
	fn test_detect_nothing_on_garbage() {
		let reg = Registry::new();
		let mut io = MemStream::from_vec(vec![0xFF; 40]);
		assert!(reg.detect_image(&mut io).unwrap().is_none());
	}

	#[test]
	fn test_certainty_ordering() {
		assert!(Certainty::DefinitelyYes > Certainty::PossiblyYes);
		assert!(Certainty::PossiblyYes > Certainty::Unsure);
		assert!(Certainty::Unsure > Certainty::DefinitelyNo);
	}
}
