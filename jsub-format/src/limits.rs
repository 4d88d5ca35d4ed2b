//! Size limits for extracted output

use crate::error::{ExtractError, Result};

/// Maximum cumulative sizes of the two extraction outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum compact JSON size of the subset document in bytes (default: 15 MB, hard: 1 GiB)
    pub max_subset_size: u64,
    /// Maximum total bytes of metadata names and values (default: 16,000, hard: 1 MiB)
    pub max_metadata_size: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_subset_size: 15_000_000,
            max_metadata_size: 16_000,
        }
    }
}

impl Limits {
    /// Hard maximum limits that cannot be exceeded
    pub fn hard_maximums() -> Self {
        Self {
            max_subset_size: 1024 * 1024 * 1024,
            max_metadata_size: 1024 * 1024,
        }
    }

    /// Validate limits against hard maximums
    pub fn validate(&self) -> Result<()> {
        let hard = Self::hard_maximums();

        if self.max_subset_size > hard.max_subset_size {
            return Err(ExtractError::InvalidLimits {
                reason: format!(
                    "max_subset_size {} exceeds hard limit {}",
                    self.max_subset_size, hard.max_subset_size
                ),
            });
        }

        if self.max_metadata_size > hard.max_metadata_size {
            return Err(ExtractError::InvalidLimits {
                reason: format!(
                    "max_metadata_size {} exceeds hard limit {}",
                    self.max_metadata_size, hard.max_metadata_size
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_within_hard_max() {
        assert!(Limits::default().validate().is_ok());
    }

    #[test]
    fn rejects_excessive_subset_size() {
        let limits = Limits {
            max_subset_size: 2 * 1024 * 1024 * 1024,
            ..Limits::default()
        };
        assert!(matches!(
            limits.validate(),
            Err(ExtractError::InvalidLimits { .. })
        ));
    }

    #[test]
    fn rejects_excessive_metadata_size() {
        let limits = Limits {
            max_metadata_size: 2 * 1024 * 1024,
            ..Limits::default()
        };
        assert!(limits.validate().is_err());
    }
}
