//! Shared machinery for tilesets indexed by a file allocation table.
//!
//! Every FAT-backed container owns a content stream and an entry table,
//! and differs only in how the on-disk records are kept in sync.  Those
//! differences hang off the [`FatHooks`] trait; the offset arithmetic -
//! shifting entries when one grows, shrinks, appears or disappears - lives
//! here and is shared by every format.

use std::cell::RefCell;
use std::rc::Rc;

use super::{Attributes, EntryRef, FatEntry, entry_ref, position_of};
use crate::error::{Error, Result};
use crate::stream::{SharedStream, Stream, SubStream};

/// Format-specific callouts from the generic FAT logic.
///
/// Hooks receive the content stream and the entry table as arguments so
/// they can rewrite on-disk records without re-borrowing the core.
pub trait FatHooks {
	/// Called before a new entry's bytes are inserted.  May adjust the new
	/// entry (and the table, when the on-disk FAT itself grows).
	fn pre_insert(
		&mut self,
		io: &mut dyn Stream,
		entries: &[EntryRef],
		new_entry: &mut FatEntry,
	) -> Result<()> {
		let _ = (io, entries, new_entry);
		Ok(())
	}

	/// Called after a new entry is fully in place.
	fn post_insert(
		&mut self,
		io: &mut dyn Stream,
		entries: &[EntryRef],
		new_entry: &EntryRef,
	) -> Result<()> {
		let _ = (io, entries, new_entry);
		Ok(())
	}

	/// Called before an entry's bytes are removed.
	fn pre_remove(
		&mut self,
		io: &mut dyn Stream,
		entries: &[EntryRef],
		victim: &FatEntry,
	) -> Result<()> {
		let _ = (io, entries, victim);
		Ok(())
	}

	/// Called after an entry has been removed and the table reindexed.
	fn post_remove(&mut self, io: &mut dyn Stream, entries: &[EntryRef]) -> Result<()> {
		let _ = (io, entries);
		Ok(())
	}

	/// Rewrite the on-disk record of `entry`'s offset.
	fn update_file_offset(&mut self, io: &mut dyn Stream, entry: &FatEntry) -> Result<()> {
		let _ = (io, entry);
		Ok(())
	}

	/// Rewrite the on-disk record of `entry`'s size.
	fn update_file_size(&mut self, io: &mut dyn Stream, entry: &FatEntry) -> Result<()> {
		let _ = (io, entry);
		Ok(())
	}
}

/// Hooks for formats whose FAT needs no record maintenance.
pub struct NoRecords;

impl FatHooks for NoRecords {}

/// The shared state of a FAT-backed tileset.
///
/// Everything is reference-counted so streams opened for individual
/// entries can reach back into the table when they are resized.
pub struct FatCore {
	/// Backing stream for the whole container.
	pub content: SharedStream,
	entries: Rc<RefCell<Vec<EntryRef>>>,
	hooks: Rc<RefCell<dyn FatHooks>>,
	first_offset: u64,
}

impl FatCore {
	/// Take ownership of a content stream with format hooks.
	///
	/// `first_offset` is where the first entry's bytes go in an otherwise
	/// empty container (i.e. past any fixed header).
	pub fn new(content: SharedStream, first_offset: u64, hooks: impl FatHooks + 'static) -> Self {
		Self {
			content,
			entries: Rc::new(RefCell::new(Vec::new())),
			hooks: Rc::new(RefCell::new(hooks)),
			first_offset,
		}
	}

	/// Append an entry while parsing the container.
	pub fn push_entry(&self, entry: FatEntry) -> EntryRef {
		let e = entry_ref(entry);
		self.entries.borrow_mut().push(Rc::clone(&e));
		e
	}

	/// Handles to all entries, in order.
	pub fn entries(&self) -> Vec<EntryRef> {
		self.entries.borrow().clone()
	}

	/// Number of entries.
	pub fn len(&self) -> usize {
		self.entries.borrow().len()
	}

	/// True when the table is empty.
	pub fn is_empty(&self) -> bool {
		self.entries.borrow().is_empty()
	}

	/// Entry handle at `index`.
	pub fn entry_at(&self, index: usize) -> Result<EntryRef> {
		let entries = self.entries.borrow();
		entries
			.get(index)
			.cloned()
			.ok_or_else(|| Error::out_of_range("entry", index, entries.len()))
	}

	/// Rewrite every entry's on-disk offset and size records.
	fn rewrite_records(&self) -> Result<()> {
		let entries = self.entries.borrow();
		let mut io = self.content.borrow_mut();
		let mut hooks = self.hooks.borrow_mut();
		for e in entries.iter() {
			let e = e.borrow();
			hooks.update_file_offset(&mut *io, &e)?;
			hooks.update_file_size(&mut *io, &e)?;
		}
		Ok(())
	}

	/// Insert a new entry of `init_size` zero bytes before `before`.
	pub fn insert(
		&self,
		before: Option<&EntryRef>,
		init_size: u64,
		type_tag: &str,
		attr: Attributes,
	) -> Result<EntryRef> {
		let (index, offset) = {
			let entries = self.entries.borrow();
			match before {
				Some(id) => {
					let pos = position_of(&entries, id)?;
					let e = entries[pos].borrow();
					(pos, e.offset)
				}
				None => match entries.last() {
					Some(last) => {
						let last = last.borrow();
						(entries.len(), last.offset + last.len_header + last.stored_size)
					}
					None => (0, self.first_offset()),
				},
			}
		};

		let mut new_entry = FatEntry {
			valid: true,
			index,
			offset,
			stored_size: init_size,
			real_size: init_size,
			len_header: 0,
			attr,
			type_tag: type_tag.to_string(),
			name: None,
		};

		{
			let entries = self.entries.borrow();
			let mut io = self.content.borrow_mut();
			self.hooks.borrow_mut().pre_insert(&mut *io, &entries, &mut new_entry)?;
			io.insert(new_entry.offset, new_entry.len_header + new_entry.stored_size)?;
		}

		let total = new_entry.len_header + new_entry.stored_size;
		let new_offset = new_entry.offset;
		{
			let entries = self.entries.borrow();
			for e in entries.iter() {
				let mut e = e.borrow_mut();
				if e.index >= index {
					e.index += 1;
				}
				if e.offset >= new_offset {
					e.offset += total;
				}
			}
		}

		let handle = entry_ref(new_entry);
		self.entries.borrow_mut().insert(index, Rc::clone(&handle));
		self.rewrite_records()?;

		{
			let entries = self.entries.borrow();
			let mut io = self.content.borrow_mut();
			self.hooks.borrow_mut().post_insert(&mut *io, &entries, &handle)?;
		}
		Ok(handle)
	}

	/// Remove an entry and close the gap its bytes occupied.
	pub fn remove(&self, id: &EntryRef) -> Result<()> {
		let index = position_of(&self.entries.borrow(), id)?;
		let (offset, total) = {
			let e = id.borrow();
			(e.offset, e.len_header + e.stored_size)
		};

		{
			let entries = self.entries.borrow();
			let mut io = self.content.borrow_mut();
			self.hooks.borrow_mut().pre_remove(&mut *io, &entries, &id.borrow())?;
			io.remove(offset, total)?;
		}

		self.entries.borrow_mut().remove(index);
		id.borrow_mut().valid = false;

		{
			let entries = self.entries.borrow();
			for e in entries.iter() {
				let mut e = e.borrow_mut();
				if e.index > index {
					e.index -= 1;
				}
				if e.offset > offset {
					e.offset -= total;
				}
			}
		}

		{
			let entries = self.entries.borrow();
			let mut io = self.content.borrow_mut();
			self.hooks.borrow_mut().post_remove(&mut *io, &entries)?;
		}
		self.rewrite_records()
	}

	/// Change an entry's stored (and real) size, shifting its neighbours.
	pub fn resize(&self, id: &EntryRef, new_stored: u64, new_real: u64) -> Result<()> {
		position_of(&self.entries.borrow(), id)?;
		let (offset, len_header, old_stored) = {
			let e = id.borrow();
			(e.offset, e.len_header, e.stored_size)
		};

		if new_stored != old_stored {
			{
				let mut io = self.content.borrow_mut();
				if new_stored > old_stored {
					io.insert(offset + len_header + old_stored, new_stored - old_stored)?;
				} else {
					io.remove(offset + len_header + new_stored, old_stored - new_stored)?;
				}
			}
			shift_after(&self.entries.borrow(), offset, new_stored as i64 - old_stored as i64);
		}

		{
			let mut e = id.borrow_mut();
			e.stored_size = new_stored;
			e.real_size = new_real;
		}

		self.rewrite_records()
	}

	/// Open an entry's content as a stream window.
	///
	/// With `resizable`, growing or shrinking the window re-enters the
	/// table maintenance above so neighbouring entries stay consistent.
	pub fn open_entry(&self, id: &EntryRef, resizable: bool) -> Result<SubStream> {
		position_of(&self.entries.borrow(), id)?;
		let (offset, len_header, stored) = {
			let e = id.borrow();
			(e.offset, e.len_header, e.stored_size)
		};
		let start = offset + len_header;

		if !resizable {
			return Ok(SubStream::new(Rc::clone(&self.content), start, stored));
		}

		let entries = Rc::clone(&self.entries);
		let hooks = Rc::clone(&self.hooks);
		let content = Rc::clone(&self.content);
		let entry = Rc::clone(id);
		Ok(SubStream::with_notify(
			Rc::clone(&self.content),
			start,
			stored,
			Box::new(move |new_len| {
				// The window's bytes have already moved; fix the table up.
				let (delta, entry_offset) = {
					let mut e = entry.borrow_mut();
					let delta = new_len as i64 - e.stored_size as i64;
					e.stored_size = new_len;
					e.real_size = new_len;
					(delta, e.offset)
				};
				shift_after(&entries.borrow(), entry_offset, delta);
				let entries = entries.borrow();
				let mut io = content.borrow_mut();
				let mut hooks = hooks.borrow_mut();
				for e in entries.iter() {
					let e = e.borrow();
					hooks.update_file_offset(&mut *io, &e)?;
				}
				hooks.update_file_size(&mut *io, &entry.borrow())
			}),
		))
	}

	fn first_offset(&self) -> u64 {
		self.first_offset
	}
}

/// Shift the offset of every entry past `offset` by `delta`.
fn shift_after(entries: &[EntryRef], offset: u64, delta: i64) {
	for e in entries {
		let mut e = e.borrow_mut();
		if e.offset > offset {
			e.offset = e.offset.checked_add_signed(delta).expect("offset arithmetic overflow");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::stream::{MemStream, StreamExt, shared};
	use std::io::SeekFrom;

	fn core_with(entries: &[(u64, u64)]) -> FatCore {
		let total: u64 = entries.iter().map(|(_, s)| s).sum();
		let core =
			FatCore::new(shared(MemStream::from_vec(vec![0xEE; total as usize])), 0, NoRecords);
		for (i, &(offset, size)) in entries.iter().enumerate() {
			core.push_entry(FatEntry {
				valid: true,
				index: i,
				offset,
				stored_size: size,
				real_size: size,
				..FatEntry::default()
			});
		}
		core
	}

	#[test]
	fn test_resize_shifts_later_entries() {
		let core = core_with(&[(0, 10), (10, 10), (20, 10)]);
		let entries = core.entries();
		core.resize(&entries[1], 14, 14).unwrap();
		assert_eq!(entries[1].borrow().stored_size, 14);
		assert_eq!(entries[2].borrow().offset, 24);
		assert_eq!(entries[0].borrow().offset, 0);
		assert_eq!(core.content.borrow().size(), 34);
	}

	#[test]
	fn test_insert_before_shifts_offsets_and_indices() {
		let core = core_with(&[(0, 10), (10, 10)]);
		let entries = core.entries();
		let new = core.insert(Some(&entries[1]), 6, "test", Attributes::empty()).unwrap();
		assert_eq!(new.borrow().index, 1);
		assert_eq!(new.borrow().offset, 10);
		assert_eq!(entries[1].borrow().index, 2);
		assert_eq!(entries[1].borrow().offset, 16);
		assert_eq!(core.len(), 3);
	}

	#[test]
	fn test_insert_at_end_appends() {
		let core = core_with(&[(0, 10)]);
		let new = core.insert(None, 4, "test", Attributes::empty()).unwrap();
		assert_eq!(new.borrow().offset, 10);
		assert_eq!(core.content.borrow().size(), 14);
	}

	#[test]
	fn test_remove_invalidates_handle() {
		let core = core_with(&[(0, 10), (10, 10)]);
		let entries = core.entries();
		core.remove(&entries[0]).unwrap();
		assert!(!entries[0].borrow().valid);
		assert_eq!(entries[1].borrow().offset, 0);
		assert_eq!(entries[1].borrow().index, 0);
		assert!(core.remove(&entries[0]).is_err());
	}

	#[test]
	fn test_entry_stream_resize_updates_table() {
		let core = core_with(&[(0, 10), (10, 10)]);
		let entries = core.entries();
		let mut sub = core.open_entry(&entries[0], true).unwrap();
		sub.truncate(16).unwrap();
		assert_eq!(entries[0].borrow().stored_size, 16);
		assert_eq!(entries[1].borrow().offset, 16);
	}

	#[test]
	fn test_entry_stream_windows_content() {
		let core = core_with(&[(0, 4), (4, 4)]);
		{
			let mut io = core.content.borrow_mut();
			io.seek(SeekFrom::Start(0)).unwrap();
			io.write(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
		}
		let entries = core.entries();
		let mut sub = core.open_entry(&entries[1], false).unwrap();
		assert_eq!(sub.read_vec(4).unwrap(), vec![5, 6, 7, 8]);
	}

	#[test]
	fn test_sizes_sum_to_stream_size() {
		let core = core_with(&[(0, 10), (10, 10), (20, 10)]);
		let entries = core.entries();
		core.resize(&entries[0], 3, 3).unwrap();
		core.remove(&entries[1]).unwrap();
		let total: u64 = core.entries().iter().map(|e| e.borrow().stored_size).sum();
		assert_eq!(total, core.content.borrow().size());
	}
}
