use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Weak};

use dashmap::DashMap;

use crate::ast::Node;
use crate::error::SyntaxErrors;

/// Parsed-expression cache keyed by source text. Entries hold the tree
/// weakly, so a cached tree lives exactly as long as some expression still
/// uses it; dead entries are swept out on insert.
pub struct ExpressionCache {
    entries: DashMap<String, Weak<Node>>,
    enabled: AtomicBool,
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Disabling also drops everything already cached.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        if !enabled {
            self.entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn resolve(&self, source: &str, use_cache: bool) -> Result<Arc<Node>, SyntaxErrors> {
        if !use_cache || !self.is_enabled() {
            return crate::parse(source);
        }

        if let Some(node) = self.entries.get(source).and_then(|entry| entry.upgrade()) {
            return Ok(node);
        }

        let node = crate::parse(source)?;
        self.entries
            .insert(source.to_string(), Arc::downgrade(&node));
        self.sweep();

        Ok(node)
    }

    fn sweep(&self) {
        self.entries.retain(|_, weak| weak.strong_count() > 0);
    }
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide cache expressions use unless given their own.
pub(crate) static DEFAULT_CACHE: LazyLock<Arc<ExpressionCache>> =
    LazyLock::new(|| Arc::new(ExpressionCache::new()));

pub(crate) fn default_cache() -> Arc<ExpressionCache> {
    Arc::clone(&DEFAULT_CACHE)
}
