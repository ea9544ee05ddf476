//! Vault configuration.

/// Default remote table for notes.
pub const DEFAULT_NOTES_TABLE: &str = "notes";

/// Default remote table for entities.
pub const DEFAULT_ENTITIES_TABLE: &str = "entities";

/// Default remote table for facts.
pub const DEFAULT_FACTS_TABLE: &str = "facts";

/// Default remote table for patterns.
pub const DEFAULT_PATTERNS_TABLE: &str = "patterns";

/// Default remote table for mirror messages.
pub const DEFAULT_MIRROR_TABLE: &str = "mirror_messages";

/// Default remote table for per-user salts.
pub const DEFAULT_SALTS_TABLE: &str = "vault_salts";

/// Default page size for migration scans.
pub const DEFAULT_MIGRATION_PAGE_SIZE: usize = 100;

/// Vault configuration options.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Remote table holding note rows.
    pub notes_table: String,
    /// Remote table holding entity rows.
    pub entities_table: String,
    /// Remote table holding fact rows.
    pub facts_table: String,
    /// Remote table holding pattern rows.
    pub patterns_table: String,
    /// Remote table holding mirror message rows.
    pub mirror_table: String,
    /// Remote table holding per-user salts.
    pub salts_table: String,
    /// Rows fetched per select during migration scans.
    pub migration_page_size: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            notes_table: DEFAULT_NOTES_TABLE.to_string(),
            entities_table: DEFAULT_ENTITIES_TABLE.to_string(),
            facts_table: DEFAULT_FACTS_TABLE.to_string(),
            patterns_table: DEFAULT_PATTERNS_TABLE.to_string(),
            mirror_table: DEFAULT_MIRROR_TABLE.to_string(),
            salts_table: DEFAULT_SALTS_TABLE.to_string(),
            migration_page_size: DEFAULT_MIGRATION_PAGE_SIZE,
        }
    }
}

impl VaultConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix every table name, for deployments sharing one store across
    /// environments (e.g. `staging_notes`).
    pub fn table_prefix(mut self, prefix: &str) -> Self {
        self.notes_table = format!("{}{}", prefix, self.notes_table);
        self.entities_table = format!("{}{}", prefix, self.entities_table);
        self.facts_table = format!("{}{}", prefix, self.facts_table);
        self.patterns_table = format!("{}{}", prefix, self.patterns_table);
        self.mirror_table = format!("{}{}", prefix, self.mirror_table);
        self.salts_table = format!("{}{}", prefix, self.salts_table);
        self
    }

    /// Set the migration scan page size.
    pub fn migration_page_size(mut self, n: usize) -> Self {
        self.migration_page_size = n;
        self
    }
}
