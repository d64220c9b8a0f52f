//! Pagination configuration

use serde::{Deserialize, Serialize};

/// Page size limits applied while validating connection arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaginationConfig {
    /// Hard cap for `first`/`last`; larger requests are clamped
    pub max_page_size: usize,

    /// Page size when neither `first` nor `last` is given (or they are 0).
    /// `None` falls back to `max_page_size`.
    pub default_page_size: Option<usize>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            max_page_size: 100,
            default_page_size: None,
        }
    }
}

impl PaginationConfig {
    /// Parse and validate a JSON config document
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| crate::ConnectionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.max_page_size == 0 {
            return Err(crate::ConnectionError::Config(
                "'maxPageSize' must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the requested amount into the number of items a page holds
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        match requested {
            None | Some(0) => self
                .default_page_size
                .unwrap_or(self.max_page_size)
                .min(self.max_page_size),
            Some(amount) if amount > self.max_page_size => {
                tracing::debug!(
                    requested = amount,
                    max = self.max_page_size,
                    "clamping page size to the configured maximum"
                );
                self.max_page_size
            }
            Some(amount) => amount,
        }
    }
}
