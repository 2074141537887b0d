//! Declared invalidation dependencies.
//!
//! Maps a collection to the cache key prefixes that must be dropped when the
//! collection is written. Composite caches register the collections they are
//! built from instead of being hard-coded into the invalidation path.

use std::collections::{BTreeMap, BTreeSet};

use crate::query::key::collection_prefix;

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from `(collection, dependent prefixes)` pairs.
    pub fn from_cascades(cascades: &[(&str, &[&str])]) -> Self {
        let mut graph = Self::new();
        for (collection, targets) in cascades {
            for target in *targets {
                graph.register(collection, target);
            }
        }
        graph
    }

    /// Declares that keys starting with `key_prefix` depend on `collection`.
    pub fn register(&mut self, collection: &str, key_prefix: &str) {
        self.dependents
            .entry(collection.to_string())
            .or_default()
            .insert(key_prefix.to_string());
    }

    /// Declares a composite key built from several collections.
    pub fn register_composite(&mut self, key: &str, collections: &[&str]) {
        for collection in collections {
            self.register(collection, key);
        }
    }

    /// Every key prefix to drop when `collection` changes, its own prefix first.
    pub fn prefixes_for(&self, collection: &str) -> Vec<String> {
        let own = collection_prefix(collection);
        let mut prefixes = vec![own.clone()];
        if let Some(dependents) = self.dependents.get(collection) {
            prefixes.extend(dependents.iter().filter(|p| **p != own).cloned());
        }
        prefixes
    }

    pub fn dependents(&self, collection: &str) -> Option<&BTreeSet<String>> {
        self.dependents.get(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{HOMEPAGE_KEY, INVALIDATION_CASCADES};

    #[test]
    fn test_own_prefix_always_first() {
        let graph = DependencyGraph::new();
        assert_eq!(graph.prefixes_for("services"), vec!["services:".to_string()]);
    }

    #[test]
    fn test_from_cascades() {
        let graph = DependencyGraph::from_cascades(INVALIDATION_CASCADES);
        let prefixes = graph.prefixes_for("blog_posts");
        assert_eq!(prefixes[0], "blog_posts:");
        assert!(prefixes.contains(&HOMEPAGE_KEY.to_string()));
    }

    #[test]
    fn test_register_composite() {
        let mut graph = DependencyGraph::new();
        graph.register_composite("footer:data", &["settings", "services"]);

        assert!(graph.prefixes_for("settings").contains(&"footer:data".to_string()));
        assert!(graph.prefixes_for("services").contains(&"footer:data".to_string()));
        assert!(graph.dependents("pages").is_none());
    }

    #[test]
    fn test_duplicate_registration_is_idempotent() {
        let mut graph = DependencyGraph::new();
        graph.register("pages", HOMEPAGE_KEY);
        graph.register("pages", HOMEPAGE_KEY);
        graph.register("pages", "pages:");
        assert_eq!(graph.prefixes_for("pages").len(), 2);
    }
}
