use std::env;

pub const ENV_TABLE_NAME: &str = "SINGLE_TABLE_NAME";
pub const ENV_PD_ENDPOINTS: &str = "SINGLE_TABLE_PD_ENDPOINTS";
pub const ENV_PAGE_SIZE: &str = "SINGLE_TABLE_PAGE_SIZE";

/// Connection and layout settings for one physical table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    /// Namespace prefixed to every stored key.
    pub table_name: String,
    pub pd_endpoints: Vec<String>,
    /// Page size used when scanning an index.
    pub page_size: u32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            table_name: "single-table".to_string(),
            pd_endpoints: vec!["127.0.0.1:2379".to_string()],
            page_size: 128,
        }
    }
}

impl TableConfig {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self::default().with_table_name(table_name)
    }

    /// Reads `SINGLE_TABLE_NAME`, `SINGLE_TABLE_PD_ENDPOINTS` (comma
    /// separated) and `SINGLE_TABLE_PAGE_SIZE`, falling back to defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(name) = lookup(ENV_TABLE_NAME).filter(|n| !n.is_empty()) {
            config.table_name = name;
        }
        if let Some(endpoints) = lookup(ENV_PD_ENDPOINTS) {
            let endpoints: Vec<String> = endpoints
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect();
            if !endpoints.is_empty() {
                config.pd_endpoints = endpoints;
            }
        }
        match lookup(ENV_PAGE_SIZE).map(|v| v.parse::<u32>()) {
            Some(Ok(size)) if size > 0 => config.page_size = size,
            Some(_) => log::warn!("ignoring invalid {}", ENV_PAGE_SIZE),
            None => {}
        }
        config
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn with_pd_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.pd_endpoints = endpoints;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}
