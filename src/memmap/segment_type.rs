use serde::Deserialize;

/// Type tag for a memory-map region, driving the PMM's access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum SegmentType {
    Empty,
    VirtualRAM,
    PhysicalRAM,
    PhysicalIO,
    Buffer,
    KernelRAM,
    KernelROM,
    PhysicalROM,
    IORAM,
    IOROM,
}

impl SegmentType {
    /// `true` for the types that own a read/write byte buffer (RAM, the
    /// VirtualRAM paging pool, and ROM). ROM rejects writes through the
    /// access-policy table, not through buffer absence. The I/O types
    /// (`PhysicalIO`, `IORAM`, `IOROM`) have none — access to them is
    /// `NotImplemented` regardless of buffer presence.
    pub fn has_buffer(self) -> bool {
        !matches!(
            self,
            SegmentType::Empty | SegmentType::PhysicalIO | SegmentType::IORAM | SegmentType::IOROM
        )
    }
}
