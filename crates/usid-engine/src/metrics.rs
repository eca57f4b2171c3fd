//! Per-invocation metrics.
//!
//! [`InvocationMetrics`] is returned by [`invoke`](crate::invoke) when the
//! invocation succeeds.

/// Timing of one pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassMetrics {
    /// Operation name given to the pass.
    pub op: String,
    /// Outer extent the pass ran over.
    pub extent: usize,
    /// Wall-clock time of the launch including its status check, in
    /// microseconds.
    pub us: u64,
}

/// Timing and memory figures of one invocation.
///
/// All durations are in microseconds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvocationMetrics {
    /// Name of the backend that ran the invocation.
    pub backend: &'static str,
    /// Wall-clock time from allocator creation to release.
    pub total_us: u64,
    /// Passes in program order.
    pub passes: Vec<PassMetrics>,
    /// Number of temporaries allocated.
    pub tmp_allocations: usize,
    /// Bytes of temporaries allocated.
    pub tmp_bytes: usize,
}

impl InvocationMetrics {
    /// Sum of pass times.
    pub fn pass_us(&self) -> u64 {
        self.passes.iter().map(|p| p.us).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = InvocationMetrics::default();
        assert_eq!(m.total_us, 0);
        assert!(m.passes.is_empty());
        assert_eq!(m.tmp_allocations, 0);
        assert_eq!(m.tmp_bytes, 0);
        assert_eq!(m.pass_us(), 0);
    }

    #[test]
    fn pass_time_is_summed() {
        let m = InvocationMetrics {
            backend: "sequential",
            total_us: 100,
            passes: vec![
                PassMetrics {
                    op: "edges".to_string(),
                    extent: 12,
                    us: 30,
                },
                PassMetrics {
                    op: "vertices".to_string(),
                    extent: 8,
                    us: 45,
                },
            ],
            tmp_allocations: 1,
            tmp_bytes: 96,
        };
        assert_eq!(m.pass_us(), 75);
        assert_eq!(m.passes[1].op, "vertices");
    }
}
