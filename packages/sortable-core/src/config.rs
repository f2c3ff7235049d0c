#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ids::Position;

pub const DEFAULT_ORDER_COLUMN: &str = "order_column";
pub const DEFAULT_START_ORDER: Position = 1;

/// Ordering options shared by the maintainer and the store adapters.
///
/// | option | default |
/// |---|---|
/// | `order_column_name` | `"order_column"` |
/// | `sort_when_creating` | `true` |
/// | `start_order` | `1` |
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct SortableConfig {
    pub order_column_name: String,
    pub sort_when_creating: bool,
    pub start_order: Position,
}

impl Default for SortableConfig {
    fn default() -> Self {
        Self {
            order_column_name: DEFAULT_ORDER_COLUMN.to_string(),
            sort_when_creating: true,
            start_order: DEFAULT_START_ORDER,
        }
    }
}

impl SortableConfig {
    pub fn with_order_column(mut self, name: impl Into<String>) -> Self {
        self.order_column_name = name.into();
        self
    }

    pub fn with_sort_when_creating(mut self, enabled: bool) -> Self {
        self.sort_when_creating = enabled;
        self
    }

    pub fn with_start_order(mut self, start: Position) -> Self {
        self.start_order = start;
        self
    }

    /// Parse a JSON object; absent keys keep their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| crate::Error::InvalidInput(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_table() {
        let config = SortableConfig::default();
        assert_eq!(config.order_column_name, "order_column");
        assert!(config.sort_when_creating);
        assert_eq!(config.start_order, 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_fills_missing_keys_with_defaults() {
        let config = SortableConfig::from_json_str(r#"{"order_column_name":"rank"}"#).unwrap();
        assert_eq!(config.order_column_name, "rank");
        assert!(config.sort_when_creating);
        assert_eq!(config.start_order, 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_rejects_unknown_keys() {
        let err = SortableConfig::from_json_str(r#"{"order_col":"rank"}"#).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidInput(_)));
    }
}
