//! Read-only allocator statistics for reporting layers.

use serde::{Deserialize, Serialize};

/// Consistent snapshot of one allocator, taken under its lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatorStats {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub entries: usize,
    pub waiting: usize,
    pub listeners: usize,
    /// Most bytes ever reserved at once since the allocator was created.
    pub peak_used_bytes: u64,
}

impl AllocatorStats {
    pub fn to_json(&self) -> poolspace_core::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_serialize_with_field_names() {
        let stats = AllocatorStats {
            total_bytes: 1000,
            used_bytes: 800,
            free_bytes: 200,
            entries: 2,
            waiting: 1,
            listeners: 0,
            peak_used_bytes: 800,
        };
        let json = stats.to_json().unwrap();
        assert!(json.contains("\"free_bytes\": 200"));
        let back: AllocatorStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }
}
