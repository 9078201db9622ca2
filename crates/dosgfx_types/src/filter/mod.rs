//! Restartable byte-level transformations.
//!
//! A filter is driven by alternating input availability and output capacity:
//! `reset` announces the total input length, then `transform` is called
//! repeatedly until the input is exhausted and no residual output remains.
//! Filters may buffer arbitrarily between calls.

use crate::error::{Error, Result};

mod ccomic;
mod pad;
mod pcx_rle;
mod vinyl;

pub use ccomic::{CComicRle, CComicUnrle};
pub use pad::{BlockPad, BlockUnpad};
pub use pcx_rle::{PcxRle, PcxUnrle};
pub use vinyl::{VinylCompress, VinylExpand};

/// A restartable transformation between two byte spaces.
pub trait StreamFilter {
	/// Prepare for a fresh run over `len_input` bytes of input.
	fn reset(&mut self, len_input: u64);

	/// Consume bytes from `input` and produce bytes into `out`, returning
	/// `(consumed, produced)`.  An empty `input` signals end of data; the
	/// filter should then drain any buffered output.  Returning `(0, 0)` on
	/// empty input means the run is complete.
	fn transform(&mut self, out: &mut [u8], input: &[u8]) -> Result<(usize, usize)>;
}

/// Run `filter` over `data` until completion.
pub fn filter_vec(filter: &mut dyn StreamFilter, data: &[u8]) -> Result<Vec<u8>> {
	filter.reset(data.len() as u64);
	let mut out = Vec::new();
	let mut chunk = [0u8; 4096];
	let mut read = 0usize;
	loop {
		let input = &data[read..];
		let (r, w) = filter.transform(&mut chunk, input)?;
		read += r;
		out.extend_from_slice(&chunk[..w]);
		if r == 0 && w == 0 {
			if read < data.len() {
				// The filter cannot make progress on what is left, typically
				// a stream cut off in the middle of a code.
				log::warn!("stream filter stalled with {} trailing bytes; returning partial content", data.len() - read);
			}
			break;
		}
	}
	Ok(out)
}

/// Like [`filter_vec`] but refuses partial results.
pub fn filter_vec_strict(filter: &mut dyn StreamFilter, data: &[u8]) -> Result<Vec<u8>> {
	filter.reset(data.len() as u64);
	let mut out = Vec::new();
	let mut chunk = [0u8; 4096];
	let mut read = 0usize;
	loop {
		let input = &data[read..];
		let (r, w) = filter.transform(&mut chunk, input)?;
		read += r;
		out.extend_from_slice(&chunk[..w]);
		if r == 0 && w == 0 {
			if read < data.len() {
				return Err(Error::filter(format!(
					"{} trailing bytes could not be processed",
					data.len() - read
				)));
			}
			break;
		}
	}
	Ok(out)
}
