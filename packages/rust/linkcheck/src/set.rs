//! Run-scoped set of links already confirmed reachable.

use std::collections::HashSet;

use tokio::sync::RwLock;

/// Normalized links validated during this run.
#[derive(Debug, Default)]
pub struct LinkSet {
    set: RwLock<HashSet<String>>,
}

impl LinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, link: &str) -> bool {
        self.set.read().await.contains(link)
    }

    /// Returns `true` if the link was not present yet.
    pub async fn insert(&self, link: String) -> bool {
        self.set.write().await.insert(link)
    }

    pub async fn len(&self) -> usize {
        self.set.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.set.read().await.is_empty()
    }
}
