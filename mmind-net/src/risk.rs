use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

/// Cloneable handle over the node's single shared risk value: the most
/// recently parsed failure probability pushed back by the analysis
/// service, or 0.0 if none has arrived since startup.
///
/// Written only from the session's inbound dispatch path, read from the
/// publish path. The two paths run on one cooperative execution context
/// today, but the value is held as f32 bits in an atomic so a reader
/// racing a writer on a threaded target still always observes a fully
/// written value.
#[derive(Debug, Clone, Default)]
pub struct RiskCell {
    inner: Arc<AtomicU32>,
}

impl RiskCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditional overwrite; no range validation is performed here,
    /// out-of-range probabilities pass through as produced upstream
    pub fn set(&self, value: f32) {
        self.inner.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.inner.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::RiskCell;

    #[test]
    fn starts_at_zero() {
        assert_eq!(RiskCell::new().get(), 0.0);
    }

    #[test]
    fn last_write_wins_across_handles() {
        let cell = RiskCell::new();
        let writer = cell.clone();

        writer.set(0.1);
        writer.set(0.9);
        assert_eq!(cell.get(), 0.9);

        // pass-through, no clamping
        writer.set(1.5);
        assert_eq!(cell.get(), 1.5);
    }
}
