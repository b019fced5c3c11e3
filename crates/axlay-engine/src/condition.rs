//! Allow/deny evaluation of selector lists with a short-lived result cache.

use std::{
    num::NonZeroUsize,
    time::{Duration, Instant},
};

use axlay_protocol::Selector;
use axlay_tree::{Tree, UiNode};
use futures::future::join_all;
use lru::LruCache;
use parking_lot::Mutex;
use tokio::task::spawn_blocking;
use tracing::{debug, trace, warn};

use crate::{Error, Result, selector};

/// Default maximum number of cached condition results.
const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone, Copy, Debug)]
struct CacheEntry {
    result: bool,
    observed_at: Instant,
}

/// Evaluates allow/deny selector lists against the current tree.
///
/// Each `(selector, list)` result is cached for the TTL; older entries count as absent.
pub struct ConditionEvaluator {
    tree: Tree,
    ttl: Duration,
    cache: Mutex<LruCache<(String, bool), CacheEntry>>,
}

impl ConditionEvaluator {
    /// Evaluator over `tree` caching results for `ttl`.
    pub fn new(tree: Tree, ttl: Duration) -> Self {
        Self::with_capacity(tree, ttl, DEFAULT_CAPACITY)
    }

    /// Evaluator with a specific cache capacity.
    pub fn with_capacity(tree: Tree, ttl: Duration, capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            tree,
            ttl,
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Drop every cached result.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// Number of cached results, fresh or not.
    pub fn cached(&self) -> usize {
        self.cache.lock().len()
    }

    /// True iff (`allow` is empty or any allow selector matches) and no deny selector
    /// matches. Conditions that fail to evaluate count as not matching.
    pub async fn evaluate(
        &self,
        root: &UiNode,
        allow: Option<&[String]>,
        deny: Option<&[String]>,
    ) -> bool {
        let allow = allow.unwrap_or_default();
        let deny = deny.unwrap_or_default();
        if allow.is_empty() && deny.is_empty() {
            return true;
        }

        let checks = allow
            .iter()
            .map(|c| self.check(root, c, true))
            .chain(deny.iter().map(|c| self.check(root, c, false)));
        let results = join_all(checks).await;
        let (allow_hits, deny_hits) = results.split_at(allow.len());

        if !allow.is_empty() && !allow_hits.iter().any(|&m| m) {
            debug!("no allow condition matched");
            return false;
        }
        if deny_hits.iter().any(|&m| m) {
            debug!("deny condition matched");
            return false;
        }
        true
    }

    /// Existence check for one condition, through the cache.
    async fn check(&self, root: &UiNode, condition: &str, is_allow: bool) -> bool {
        let key = (condition.to_string(), is_allow);
        if let Some(hit) = self.fresh(&key) {
            trace!(condition, is_allow, result = hit, "condition cache hit");
            return hit;
        }
        match self.run(root, condition).await {
            Ok(result) => {
                self.cache.lock().put(
                    key,
                    CacheEntry {
                        result,
                        observed_at: Instant::now(),
                    },
                );
                trace!(condition, is_allow, result, "condition evaluated");
                result
            }
            Err(e) => {
                warn!(condition, error = %e, "condition evaluation failed; treating as unmatched");
                false
            }
        }
    }

    fn fresh(&self, key: &(String, bool)) -> Option<bool> {
        let mut cache = self.cache.lock();
        let entry = *cache.get(key)?;
        if entry.observed_at.elapsed() < self.ttl {
            Some(entry.result)
        } else {
            cache.pop(key);
            None
        }
    }

    async fn run(&self, root: &UiNode, condition: &str) -> Result<bool> {
        let sel = Selector::parse(condition)?;
        let tree = self.tree.clone();
        let root = tree.obtain(root);
        spawn_blocking(move || selector::exists(&tree, &root, &sel))
            .await
            .map_err(|e| Error::ConditionEvaluation(e.to_string()))
    }
}
