//! A stream viewed through a filter pair.

use std::io::SeekFrom;

use super::{MemStream, SharedStream, Stream, StreamExt};
use crate::error::Result;
use crate::filter::{StreamFilter, filter_vec};

/// Presents a filtered view of a parent stream.
///
/// The read filter expands the parent's content into a working buffer when
/// the view is created; all edits happen in that buffer, and [`Stream::flush`]
/// runs the write filter and replaces the parent's content with the result.
/// The view owns its filters and buffer; there is no re-synchronisation if
/// the parent is modified behind its back.
pub struct FilteredStream {
	parent: SharedStream,
	buf: MemStream,
	write_filter: Box<dyn StreamFilter>,
	dirty: bool,
}

impl FilteredStream {
	/// Expand `parent` through `read_filter` and present the result.
	pub fn open(
		parent: SharedStream,
		mut read_filter: Box<dyn StreamFilter>,
		write_filter: Box<dyn StreamFilter>,
	) -> Result<Self> {
		let raw = {
			let mut p = parent.borrow_mut();
			p.seek(SeekFrom::Start(0))?;
			p.read_to_end()?
		};
		let expanded = filter_vec(read_filter.as_mut(), &raw)?;
		Ok(Self {
			parent,
			buf: MemStream::from_vec(expanded),
			write_filter,
			dirty: false,
		})
	}
}

impl Stream for FilteredStream {
	fn size(&self) -> u64 {
		self.buf.size()
	}

	fn pos(&self) -> u64 {
		self.buf.pos()
	}

	fn seek(&mut self, from: SeekFrom) -> Result<u64> {
		self.buf.seek(from)
	}

	fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
		self.buf.read(buf)
	}

	fn write(&mut self, buf: &[u8]) -> Result<()> {
		self.dirty = true;
		self.buf.write(buf)
	}

	fn truncate(&mut self, len: u64) -> Result<()> {
		self.dirty = true;
		self.buf.truncate(len)
	}

	fn insert(&mut self, pos: u64, len: u64) -> Result<()> {
		self.dirty = true;
		self.buf.insert(pos, len)
	}

	fn remove(&mut self, pos: u64, len: u64) -> Result<()> {
		self.dirty = true;
		self.buf.remove(pos, len)
	}

	fn flush(&mut self) -> Result<()> {
		if self.dirty {
			let packed = filter_vec(self.write_filter.as_mut(), self.buf.as_bytes())?;
			let mut p = self.parent.borrow_mut();
			p.truncate(packed.len() as u64)?;
			p.seek(SeekFrom::Start(0))?;
			p.write(&packed)?;
			self.dirty = false;
		}
		self.parent.borrow_mut().flush()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::filter::{BlockPad, BlockUnpad};
	use crate::stream::shared;

	#[test]
	fn test_padding_invisible_through_view() {
		let parent = shared(MemStream::from_vec(vec![1, 2, 3, 4, 0, 5, 6]));
		let mut view = FilteredStream::open(
			parent.clone(),
			Box::new(BlockUnpad::new(1, 4)),
			Box::new(BlockPad::new(vec![0], 4)),
		)
		.unwrap();
		assert_eq!(view.size(), 6);
		assert_eq!(view.read_vec(6).unwrap(), vec![1, 2, 3, 4, 5, 6]);
	}

	#[test]
	fn test_flush_reapplies_padding() {
		let parent = shared(MemStream::from_vec(vec![1, 2, 3, 4, 0, 5, 6]));
		let mut view = FilteredStream::open(
			parent.clone(),
			Box::new(BlockUnpad::new(1, 4)),
			Box::new(BlockPad::new(vec![0], 4)),
		)
		.unwrap();
		view.seek(SeekFrom::End(0)).unwrap();
		view.write(&[7, 8]).unwrap();
		view.flush().unwrap();

		let mut p = parent.borrow_mut();
		p.seek(SeekFrom::Start(0)).unwrap();
		assert_eq!(p.read_to_end().unwrap(), vec![1, 2, 3, 4, 0, 5, 6, 7, 0, 8]);
	}
}
