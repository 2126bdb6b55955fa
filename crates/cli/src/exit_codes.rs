//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                                        |
//! |------|----------------------------------------------------------------|
//! | 0    | Success                                                        |
//! | 1    | General error (report rendering, unexpected failures)          |
//! | 2    | Usage error (bad args, unreadable file, invalid settings)      |
//! | 3    | Rejected input (unsupported file, bad cell, missing column, duplicate ids) |
//! | 4    | Not found (batch or transaction id)                            |
//! | 5    | Storage error (database unreadable or write failed)            |
//!
//! A reconciliation that finds discrepancies still exits 0; the report is
//! the result, not an error.

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing input file, invalid settings.
pub const EXIT_USAGE: u8 = 2;

/// Uploaded content was rejected: unsupported format, unparsable cell,
/// missing column, or duplicate ids under the reject policy.
pub const EXIT_REJECTED: u8 = 3;

/// A referenced batch or transaction does not exist.
pub const EXIT_NOT_FOUND: u8 = 4;

/// The database could not be opened, read, or written.
pub const EXIT_STORAGE: u8 = 5;
