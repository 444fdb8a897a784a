// SPDX-License-Identifier: BSD-3-Clause

//! Error reporting.
//!
//! Grounded on the teacher's `error.rs`: a small, dependency-free closed
//! `enum` for the handful of failures the public API can return, plus
//! (beyond what the teacher needs) the client-installable hook that spec
//! §6/§7 call for. Colibri never raises exceptions or panics on a client
//! mistake; a violation is reported through the hook and the offending
//! call returns its documented sentinel.

use core::fmt;

/// The error type returned from the fallible entry points of this crate.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Error {
    /// A GC cycle was already running and a non-blocking operation could
    /// not proceed (`GcGuard::try_pause`, spec §5 "Suspension points").
    CollectionInProgress,
    /// The platform refused to grant more memory (spec §4.A "Failure
    /// semantics").
    OutOfMemory,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CollectionInProgress => write!(f, "a garbage collection cycle is in progress"),
            Error::OutOfMemory => write!(f, "the platform could not provide more memory"),
        }
    }
}

impl std::error::Error for Error {}

/// The result type used throughout the public API.
pub type Result<T> = core::result::Result<T, Error>;

/// Severity levels reported to an [`ErrorHook`] (spec §6 "Error hook").
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Level {
    /// Out-of-memory or an internal invariant violation; the process is
    /// not guaranteed to continue correctly afterwards.
    Fatal,
    /// An operation's precondition was violated; the operation was
    /// skipped and a sentinel was returned.
    Error,
    /// An argument was of the wrong structural kind.
    TypeCheck,
    /// An index, length or iterator was out of range.
    ValueCheck,
}

/// An opaque domain identifier: an index into a domain-specific array of
/// message templates, exactly as in spec §6 ("Domains are opaque string
/// arrays indexed by code").
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Domain {
    Gc,
    Word,
    Container,
}

/// A single reported condition.
#[derive(Clone, Copy, Debug)]
pub struct Report {
    pub level: Level,
    pub domain: Domain,
    pub code: u32,
}

/// A client-installable error-reporting hook (spec §6 "Error hook",
/// §7 "Error handling design").
///
/// The core invokes this on every GC-protect violation, type mismatch,
/// value/range error and allocation failure; it never panics or raises an
/// exception on the client's behalf. The default implementation logs
/// through the `log` facade and otherwise takes no action, so the crate
/// is usable without any embedder wiring one up.
pub trait ErrorHook: Send + Sync {
    fn report(&self, report: Report);
}

/// The hook used when no embedder-provided one has been installed.
#[derive(Default)]
pub struct LoggingErrorHook;

impl ErrorHook for LoggingErrorHook {
    fn report(&self, report: Report) {
        match report.level {
            Level::Fatal => {
                log::error!(
                    "colibri: fatal error in domain {:?}, code {}",
                    report.domain,
                    report.code
                );
            }
            Level::Error => {
                log::error!(
                    "colibri: error in domain {:?}, code {}",
                    report.domain,
                    report.code
                );
            }
            Level::TypeCheck | Level::ValueCheck => {
                log::warn!(
                    "colibri: {:?} violation in domain {:?}, code {}",
                    report.level,
                    report.domain,
                    report.code
                );
            }
        }
    }
}
