//! Table configuration types (Functional Core - pure data).

/// Table schema configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub table_name: String,
    pub partition_key: KeyAttribute,
    pub sort_key: Option<KeyAttribute>,
    pub gsis: Vec<GsiConfig>,
    /// Attribute holding the epoch-seconds expiry, if TTL is enabled.
    pub ttl_attribute: Option<String>,
}

/// A key attribute definition. Every key in the table is a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    pub name: String,
}

impl KeyAttribute {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

/// Global Secondary Index configuration. Projects all attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GsiConfig {
    pub name: String,
    pub partition_key: KeyAttribute,
    pub sort_key: Option<KeyAttribute>,
}

impl TableConfig {
    /// Sets the table name.
    pub fn with_table_name(mut self, name: &str) -> Self {
        self.table_name = name.to_string();
        self
    }
}

/// Returns the canonical table configuration for tutorcall.
///
/// Device items live under `PK`/`SK`; `GSI1` groups everything recorded
/// under one session. Items expire through `expiresAt`.
pub fn tutorcall_table_config() -> TableConfig {
    TableConfig {
        table_name: "tutorcall".to_string(),
        partition_key: KeyAttribute::new("PK"),
        sort_key: Some(KeyAttribute::new("SK")),
        gsis: vec![GsiConfig {
            name: "GSI1".to_string(),
            partition_key: KeyAttribute::new("GSI1PK"),
            sort_key: Some(KeyAttribute::new("GSI1SK")),
        }],
        ttl_attribute: Some("expiresAt".to_string()),
    }
}
