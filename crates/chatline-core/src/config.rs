use serde::Deserialize;

use crate::conversation::ConversationScheme;

/// Default cap on concurrent last-message lookups.
pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub conversation_scheme: ConversationScheme,

    /// In-flight lookup cap during contact aggregation. Zero is treated as one.
    pub lookup_concurrency: usize,
}

impl ClientConfig {
    pub fn lookup_limit(&self) -> usize {
        self.lookup_concurrency.max(1)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            conversation_scheme: ConversationScheme::default(),
            lookup_concurrency: DEFAULT_LOOKUP_CONCURRENCY,
        }
    }
}
