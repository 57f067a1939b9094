use serde::Deserialize;

use super::segment_type::SegmentType;

/// A single region record exactly as it appears in the memory-map document,
/// before validation. Field names match the wire format.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRegion {
    pub key: u32,
    pub tag: String,
    #[serde(default)]
    pub comment: String,
    pub start_address: u64,
    pub end_address: u64,
    pub permissions: u8,
    pub segment_type: SegmentType,
}

/// The untrusted, deserialized shape of a memory-map document: a swap file
/// path and a list of raw regions. [`crate::memmap::MemoryMap::from_document`]
/// turns this into a validated [`crate::memmap::MemoryMap`].
#[derive(Debug, Clone, Deserialize)]
pub struct MapDocument {
    pub swap_file: String,
    pub regions: Vec<RawRegion>,
}

impl MapDocument {
    /// Parses a document from a JSON string. Malformed JSON or an unknown
    /// `segment_type` surfaces as [`crate::error::Error::InvalidMap`].
    pub fn from_json(text: &str) -> crate::error::Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| crate::error::Error::InvalidMap(format!("malformed document: {e}")))
    }
}
