//! Allocator configuration.

/// Configuration shared by [`HeapAllocator`](crate::HeapAllocator) and
/// [`DeviceAllocator`](crate::DeviceAllocator).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Maximum bytes one allocator may hand out over its lifetime.
    /// `None` = no budget beyond what the system allocator grants.
    pub limit_bytes: Option<usize>,
}

impl AllocatorConfig {
    /// Configuration without a budget.
    pub fn unlimited() -> Self {
        Self { limit_bytes: None }
    }

    /// Configuration with a byte budget.
    pub fn with_limit(limit_bytes: usize) -> Self {
        Self {
            limit_bytes: Some(limit_bytes),
        }
    }

    /// Bytes still available after `used` bytes, `None` if unlimited.
    pub fn available(&self, used: usize) -> Option<usize> {
        self.limit_bytes.map(|limit| limit.saturating_sub(used))
    }
}
