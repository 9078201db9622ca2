//! Error types shared by every format in the library.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when probing, opening or manipulating graphics files.
#[derive(Debug, Error)]
pub enum Error {
	/// A format probe returned a definite mismatch and the caller did not force
	/// the open.
	#[error("content is not in the {format} format")]
	ProbeMismatch {
		/// Short code of the format that rejected the content
		format: String,
	},

	/// The backing store could not be acquired.
	#[error("cannot open backing stream: {message}")]
	Open {
		/// Reason the stream could not be acquired
		message: String,
	},

	/// Underlying read/write/truncate fault.
	#[error(transparent)]
	Io(#[from] std::io::Error),

	/// A requested region is not fully present in the stream.
	#[error("incomplete read: wanted {expected} bytes, got {actual}")]
	IncompleteRead {
		/// Number of bytes requested
		expected: usize,
		/// Number of bytes actually available
		actual: usize,
	},

	/// A stream filter rejected its input as malformed.
	#[error("stream filter error: {message}")]
	Filter {
		/// Description of the malformed input
		message: String,
	},

	/// Parsed header or metadata is inconsistent.
	#[error("format violation: {message}")]
	Format {
		/// Description of the inconsistency
		message: String,
	},

	/// A method was invoked whose capability bit is not set.
	#[error("capability violation: {message} (consult caps() before calling)")]
	Capability {
		/// The call that was rejected
		message: String,
	},

	/// An ID referenced a nonexistent entry.
	#[error("{what} {index} out of range (total: {total})")]
	OutOfRange {
		/// What kind of thing was indexed
		what: &'static str,
		/// Index that was requested
		index: usize,
		/// Number of items actually available
		total: usize,
	},
}

impl Error {
	/// Shorthand for an [`Error::IncompleteRead`].
	pub fn incomplete_read(expected: usize, actual: usize) -> Self {
		Self::IncompleteRead {
			expected,
			actual,
		}
	}

	/// Shorthand for an [`Error::Filter`].
	pub fn filter(message: impl Into<String>) -> Self {
		Self::Filter {
			message: message.into(),
		}
	}

	/// Shorthand for an [`Error::Format`].
	pub fn format(message: impl Into<String>) -> Self {
		Self::Format {
			message: message.into(),
		}
	}

	/// Shorthand for an [`Error::Capability`].
	///
	/// Capability violations are programmer errors; debug builds abort so the
	/// offending call site is obvious.
	pub fn capability(message: impl Into<String>) -> Self {
		let message = message.into();
		debug_assert!(false, "capability violation: {message}");
		Self::Capability {
			message,
		}
	}

	/// Shorthand for an [`Error::OutOfRange`].
	pub fn out_of_range(what: &'static str, index: usize, total: usize) -> Self {
		Self::OutOfRange {
			what,
			index,
			total,
		}
	}
}
