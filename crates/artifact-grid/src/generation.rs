//! View generations for discarding stale results.
//!
//! Every view clear starts a new generation. Async work captures a
//! [`GenerationToken`] before it suspends and checks it when the result
//! arrives; results from an older generation are dropped.

/// Tracks the active view generation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ViewGeneration {
    active: u64,
}

impl ViewGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances to a new generation, invalidating all outstanding tokens.
    pub fn advance(&mut self) -> u64 {
        self.active += 1;
        self.active
    }

    pub fn current(&self) -> u64 {
        self.active
    }

    pub fn token(&self) -> GenerationToken {
        GenerationToken {
            version: self.active,
        }
    }
}

/// Snapshot of the generation a piece of work started in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationToken {
    version: u64,
}

impl GenerationToken {
    /// Returns `Some(())` while the generation is still active, so callers can
    /// bail out with `?`.
    #[inline]
    pub fn is_current(&self, generation: &ViewGeneration) -> Option<()> {
        if self.version == generation.active {
            Some(())
        } else {
            None
        }
    }
}
