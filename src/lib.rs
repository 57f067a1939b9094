//! Core memory-management subsystem for a simulated machine: a typed,
//! validated memory map; a heterogeneous physical memory manager; and a
//! paged virtual memory manager with demand paging, LRU eviction, and a
//! page-granular swap device.
//!
//! The three layers compose as:
//! [`memmap::MemoryMap`] describes the address space →
//! [`pmm::PhysicalMemoryManager`] owns one buffer per region →
//! [`vmm::VirtualMemoryManager`] pages the unique `VirtualRAM` region over
//! it, evicting into a [`swap::SwapDevice`] under LRU pressure.
//!
//! Every fallible entry point returns [`error::Result`]; observability is
//! injected through [`events::EventSink`] rather than read from global state.

pub mod error;
pub mod events;
pub mod memmap;
pub mod page;
pub mod pmm;
pub mod swap;
pub mod vmm;

pub use error::{Error, Result};
pub use events::{EventSink, Level, NullSink, TracingSink};
pub use memmap::{MapDocument, MemoryMap, PageMode, Region, SegmentType};
pub use page::PAGE_SIZE;
pub use pmm::{PhysicalBlock, PhysicalMemoryManager};
pub use swap::{FileSwapDevice, InMemorySwap, SwapDevice};
pub use vmm::VirtualMemoryManager;
