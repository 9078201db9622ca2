//! Windowed view over a shared parent stream.

use std::io::SeekFrom;

use super::{SharedStream, Stream, resolve_seek};
use crate::error::{Error, Result};

/// Callback invoked after a [`SubStream`] changed length.
///
/// The parent's bytes have already been shifted when this runs; the callback
/// only has to bring any bookkeeping (such as a container's allocation table)
/// in line with the new length.
pub type ResizeNotify = Box<dyn FnMut(u64) -> Result<()>>;

/// A `[offset, offset + len)` window on a parent stream.
///
/// All edits go straight through to the parent.  Growing or shrinking the
/// window requires a resize callback; without one the window is fixed and
/// writes past its end fail.
pub struct SubStream {
	parent: SharedStream,
	offset: u64,
	len: u64,
	pos: u64,
	notify: Option<ResizeNotify>,
}

impl SubStream {
	/// Create a fixed-size window.
	pub fn new(parent: SharedStream, offset: u64, len: u64) -> Self {
		Self {
			parent,
			offset,
			len,
			pos: 0,
			notify: None,
		}
	}

	/// Create a resizable window.
	pub fn with_notify(parent: SharedStream, offset: u64, len: u64, notify: ResizeNotify) -> Self {
		Self {
			parent,
			offset,
			len,
			pos: 0,
			notify: Some(notify),
		}
	}

	fn notify_resize(&mut self) -> Result<()> {
		let len = self.len;
		match self.notify.as_mut() {
			Some(f) => f(len),
			None => Err(Error::format("cannot resize a fixed stream window")),
		}
	}
}

impl Stream for SubStream {
	fn size(&self) -> u64 {
		self.len
	}

	fn pos(&self) -> u64 {
		self.pos
	}

	fn seek(&mut self, from: SeekFrom) -> Result<u64> {
		self.pos = resolve_seek(from, self.pos, self.len)?;
		Ok(self.pos)
	}

	fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
		let remaining = self.len.saturating_sub(self.pos) as usize;
		let want = buf.len().min(remaining);
		let mut parent = self.parent.borrow_mut();
		parent.seek(SeekFrom::Start(self.offset + self.pos))?;
		let n = parent.read(&mut buf[..want])?;
		self.pos += n as u64;
		Ok(n)
	}

	fn write(&mut self, buf: &[u8]) -> Result<()> {
		let end = self.pos + buf.len() as u64;
		if end > self.len {
			// Auto-grow, permitted only when the window is resizable.
			if self.notify.is_none() {
				return Err(Error::format("write past end of fixed stream window"));
			}
			self.truncate(end)?;
		}
		let mut parent = self.parent.borrow_mut();
		parent.seek(SeekFrom::Start(self.offset + self.pos))?;
		parent.write(buf)?;
		drop(parent);
		self.pos = end;
		Ok(())
	}

	fn truncate(&mut self, len: u64) -> Result<()> {
		if len == self.len {
			return Ok(());
		}
		if self.notify.is_none() {
			return Err(Error::format("cannot resize a fixed stream window"));
		}
		{
			let mut parent = self.parent.borrow_mut();
			if len > self.len {
				parent.insert(self.offset + self.len, len - self.len)?;
			} else {
				parent.remove(self.offset + len, self.len - len)?;
			}
		}
		self.len = len;
		self.pos = self.pos.min(len);
		self.notify_resize()
	}

	fn insert(&mut self, pos: u64, len: u64) -> Result<()> {
		if pos > self.len {
			return Err(Error::format("insert past end of stream window"));
		}
		if self.notify.is_none() {
			return Err(Error::format("cannot resize a fixed stream window"));
		}
		self.parent.borrow_mut().insert(self.offset + pos, len)?;
		self.len += len;
		self.notify_resize()
	}

	fn remove(&mut self, pos: u64, len: u64) -> Result<()> {
		if pos + len > self.len {
			return Err(Error::format("remove past end of stream window"));
		}
		if self.notify.is_none() {
			return Err(Error::format("cannot resize a fixed stream window"));
		}
		self.parent.borrow_mut().remove(self.offset + pos, len)?;
		self.len -= len;
		self.notify_resize()
	}

	fn flush(&mut self) -> Result<()> {
		self.parent.borrow_mut().flush()
	}
}
