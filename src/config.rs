use serde::{Deserialize, Serialize};

/// Default bound on extrapolation attempts and length-inference anchors.
pub const DEFAULT_MAX_ATTEMPTS: usize = 100;
/// Default tolerance when checking that a stride division is integral.
pub const DEFAULT_LENGTH_EPSILON: f64 = 1e-6;

/// Tunable safety bounds for a [`Reader`](crate::reader::Reader).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Extrapolation attempts that may fail to advance the anchor before a
    /// lookup gives up. Also caps the anchors tried by length inference.
    pub max_attempts: usize,
    /// Maximum distance from an integer for the length estimate's record count.
    pub length_epsilon: f64,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            length_epsilon: DEFAULT_LENGTH_EPSILON,
        }
    }
}

impl ReaderOptions {
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_length_epsilon(mut self, length_epsilon: f64) -> Self {
        self.length_epsilon = length_epsilon.abs();
        self
    }
}
