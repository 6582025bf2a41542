//! Size estimation used for memory accounting and tier selection.

/// Cost charged for a value whose size could not be estimated.
pub const DEFAULT_ENTRY_SIZE: u64 = 1024;

/// Values that can report their approximate in-memory cost.
///
/// Return `None` when no estimate is possible; callers then charge
/// [`DEFAULT_ENTRY_SIZE`] instead of failing.
pub trait EstimateSize {
    fn estimate_size(&self) -> Option<u64>;
}

/// Estimated size of `value`, falling back to [`DEFAULT_ENTRY_SIZE`].
pub fn estimated_size<V: EstimateSize + ?Sized>(value: &V) -> u64 {
    value.estimate_size().unwrap_or(DEFAULT_ENTRY_SIZE)
}

impl EstimateSize for String {
    fn estimate_size(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

impl EstimateSize for str {
    fn estimate_size(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

impl EstimateSize for Vec<u8> {
    fn estimate_size(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

impl EstimateSize for serde_json::Value {
    fn estimate_size(&self) -> Option<u64> {
        serde_json::to_vec(self).ok().map(|bytes| bytes.len() as u64)
    }
}
