use bitflags::bitflags;

use super::document::RawRegion;
use super::segment_type::SegmentType;
use crate::error::{Error, Result};
use crate::page::PAGE_SIZE;

bitflags! {
    /// Permission/mode bits shared between region inheritance and per-page
    /// protection nibbles (user/group/world). `System` is an ordinary bit
    /// checked the same way as the other three, not a conditional override.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageMode: u8 {
        const READ    = 0b0001;
        const WRITE   = 0b0010;
        const EXECUTE = 0b0100;
        const SYSTEM  = 0b1000;
    }
}

/// A contiguous, typed range of the address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub key: u32,
    pub tag: String,
    pub comment: String,
    /// Inclusive start address.
    pub start: u64,
    /// Inclusive end address.
    pub end: u64,
    pub permissions: PageMode,
    pub segment_type: SegmentType,
}

impl Region {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn num_pages(&self) -> u64 {
        self.len() / PAGE_SIZE
    }

    pub fn start_page(&self) -> u64 {
        self.start / PAGE_SIZE
    }
}

impl TryFrom<RawRegion> for Region {
    type Error = Error;

    fn try_from(raw: RawRegion) -> Result<Self> {
        let permissions = PageMode::from_bits(raw.permissions).ok_or_else(|| {
            Error::InvalidMap(format!(
                "region {} has unrecognised permission bits {:#x}",
                raw.key, raw.permissions
            ))
        })?;
        Ok(Region {
            key: raw.key,
            tag: raw.tag,
            comment: raw.comment,
            start: raw.start_address,
            end: raw.end_address,
            permissions,
            segment_type: raw.segment_type,
        })
    }
}
