//! Error taxonomy shared by the memory map, PMM, and VMM.
//!
//! Every fallible operation in this crate returns [`Result<T>`]. There is no
//! panicking surface in normal operation; the one exception is an internal
//! bookkeeping mismatch, which is fatal and reported as [`Error::Poisoned`]
//! (see [`crate::vmm::VirtualMemoryManager`]).

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The memory-map document failed validation or parsing.
    #[error("invalid memory map: {0}")]
    InvalidMap(String),

    /// No region/frame/page contains the requested address or index.
    #[error("address or page is not mapped")]
    Unmapped,

    /// A page index is past the end of its owning structure.
    #[error("page index out of range")]
    OutOfRange,

    /// Operation targeted a virtual page that is not currently active.
    #[error("virtual page is not active")]
    NotActive,

    /// A free-list (virtual or physical) could not satisfy the request even
    /// after one local eviction attempt.
    #[error("no free pages available")]
    Exhausted,

    /// Eviction was requested but the LRU list has no candidates left.
    #[error("no eviction victims available")]
    NoVictims,

    /// The swap device failed a seek/read/write.
    #[error("swap device I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Write attempted against a read-only region (ROM).
    #[error("region is read-only")]
    ReadOnly,

    /// Operation attempted against a region type that does not support it (I/O).
    #[error("operation not implemented for this region type")]
    NotImplemented,

    /// Paging operation attempted against a locked, non-VirtualRAM page.
    #[error("operation not valid for this region")]
    WrongRegion,

    /// A page-sized buffer was expected but a different length was given.
    #[error("expected a page-sized buffer")]
    WrongSize,

    /// The caller's effective permission mask does not grant the requested mode.
    #[error("permission denied")]
    PermissionDenied,

    /// An internal invariant was violated; the VMM has poisoned itself and
    /// refuses further operations.
    #[error("virtual memory manager is poisoned after an invariant violation")]
    Poisoned,
}
