use crate::error::{Error, Result};
use crate::memmap::{PageMode, Region, SegmentType};
use crate::page::PAGE_SIZE;

/// One physical block per memory-map region: a contiguous byte buffer (when
/// the region type has one) plus the bookkeeping needed to translate an
/// absolute page index into a slice of it.
pub struct PhysicalBlock {
    region: Region,
    buffer: Option<Vec<u8>>,
}

impl PhysicalBlock {
    pub fn new(region: &Region) -> Self {
        let buffer = region
            .segment_type
            .has_buffer()
            .then(|| vec![0u8; region.len() as usize]);
        PhysicalBlock {
            region: region.clone(),
            buffer,
        }
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn region_key(&self) -> u32 {
        self.region.key
    }

    pub fn segment_type(&self) -> SegmentType {
        self.region.segment_type
    }

    pub fn permissions(&self) -> PageMode {
        self.region.permissions
    }

    pub fn start_page(&self) -> u64 {
        self.region.start_page()
    }

    pub fn num_pages(&self) -> u64 {
        self.region.num_pages()
    }

    /// Per-type access policy for reads (§4.2).
    pub fn check_read(&self) -> Result<()> {
        match self.region.segment_type {
            SegmentType::Empty => Err(Error::Unmapped),
            SegmentType::PhysicalIO | SegmentType::IORAM | SegmentType::IOROM => {
                Err(Error::NotImplemented)
            }
            _ => Ok(()),
        }
    }

    /// Per-type access policy for writes (§4.2).
    pub fn check_write(&self) -> Result<()> {
        match self.region.segment_type {
            SegmentType::Empty => Err(Error::Unmapped),
            SegmentType::PhysicalIO | SegmentType::IORAM | SegmentType::IOROM => {
                Err(Error::NotImplemented)
            }
            SegmentType::PhysicalROM | SegmentType::KernelROM => Err(Error::ReadOnly),
            _ => Ok(()),
        }
    }

    fn offset_of(&self, page: u64) -> usize {
        ((page - self.start_page()) * PAGE_SIZE) as usize
    }

    /// A page-sized slice of this block's buffer. Panics if `page` is
    /// outside this block or the region has no buffer; callers must run
    /// `check_read`/`check_write` first, which rules both cases out for
    /// every reachable caller in this crate.
    pub fn page_bytes(&self, page: u64) -> &[u8] {
        let off = self.offset_of(page);
        &self.buffer.as_ref().expect("buffer-less region checked first")[off..off + PAGE_SIZE as usize]
    }

    pub fn page_bytes_mut(&mut self, page: u64) -> &mut [u8] {
        let off = self.offset_of(page);
        &mut self.buffer.as_mut().expect("buffer-less region checked first")[off..off + PAGE_SIZE as usize]
    }
}
