//! Site-wide settings served by the blog backend.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Site settings, fetched once at startup and refreshed on demand.
///
/// Only the fields the chat view reads are typed; the rest are kept in
/// `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSettings {
    /// Public site name.
    #[serde(default)]
    pub site_name: Option<String>,
    /// Whether the AI chat feature is switched on.
    #[serde(default = "default_chat_enabled")]
    pub chat_enabled: bool,
    /// Every other setting, as served.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_chat_enabled() -> bool {
    true
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_name: None,
            chat_enabled: true,
            extra: HashMap::new(),
        }
    }
}
