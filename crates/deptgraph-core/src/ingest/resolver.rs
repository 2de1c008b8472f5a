//! Entity resolution.
//!
//! [`IdentityStore`] owns every canonical node and the indexes used to find
//! them. It is only ever mutated through [`EntityResolver::apply`], which
//! takes `&mut IdentityStore`; concurrent first sightings of the same entity
//! therefore cannot race, since only one writer can hold the store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::normalizer::{NormalizedKey, NormalizedMention};
use crate::config::ResolverConfig;
use crate::node::{Attributes, Node, NodeId};
use crate::schema::{NodeKind, NodeType};

#[derive(Debug, Clone)]
struct StoredNode {
    node: Node,
    /// Simplified names known to denote this node.
    names: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct IdentityStore {
    entries: Vec<StoredNode>,
    by_id: HashMap<NodeId, usize>,
    exact: HashMap<NormalizedKey, NodeId>,
    near: HashMap<(NodeType, String), Vec<NodeId>>,
    by_name: HashMap<(NodeKind, String), Vec<NodeId>>,
}

impl IdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.by_id.get(&id).map(|&i| &self.entries[i].node)
    }

    pub fn lookup(&self, key: &NormalizedKey) -> Option<NodeId> {
        self.exact.get(key).copied()
    }

    /// Nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.entries.iter().map(|e| &e.node)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut StoredNode> {
        let index = *self.by_id.get(&id)?;
        self.entries.get_mut(index)
    }

    fn names(&self, id: NodeId) -> &[String] {
        match self.by_id.get(&id) {
            Some(&i) => &self.entries[i].names,
            None => &[],
        }
    }

    fn insert(&mut self, node: Node) {
        self.by_id.insert(node.id, self.entries.len());
        self.entries.push(StoredNode {
            node,
            names: Vec::new(),
        });
    }

    /// Makes `key` resolve to `id` from now on, through every index. The
    /// near-duplicate and name indexes are keyed by the node's kept type,
    /// never by the observed one.
    fn register(&mut self, key: &NormalizedKey, id: NodeId, node_type: NodeType, signature: String) {
        self.exact.entry(key.clone()).or_insert(id);

        let near = self.near.entry((node_type, signature)).or_default();
        if !near.contains(&id) {
            near.push(id);
        }

        let by_name = self
            .by_name
            .entry((node_type.kind(), key.simplified_name.clone()))
            .or_default();
        if !by_name.contains(&id) {
            by_name.push(id);
        }

        if let Some(stored) = self.node_mut(id) {
            if !stored.names.contains(&key.simplified_name) {
                stored.names.push(key.simplified_name.clone());
            }
        }
    }
}

/// What committing one planned resolution would write into the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Staged {
    /// The node the mention lands on, fresh or existing.
    pub id: NodeId,
    /// The type that node keeps.
    pub node_type: NodeType,
    key: NormalizedKey,
    signature: String,
}

/// The store as it reads once `staged`, if any, has been written.
#[derive(Clone, Copy)]
struct View<'a> {
    store: &'a IdentityStore,
    staged: Option<&'a Staged>,
}

impl View<'_> {
    fn lookup(&self, key: &NormalizedKey) -> Option<NodeId> {
        self.store
            .lookup(key)
            .or_else(|| self.staged.filter(|s| &s.key == key).map(|s| s.id))
    }

    fn node_type(&self, id: NodeId) -> Option<NodeType> {
        match self.staged {
            Some(s) if s.id == id => Some(s.node_type),
            _ => self.store.get(id).map(|n| n.node_type),
        }
    }

    fn same_name(&self, kind: NodeKind, name: &str) -> Vec<NodeId> {
        let mut ids = self
            .store
            .by_name
            .get(&(kind, name.to_string()))
            .cloned()
            .unwrap_or_default();
        if let Some(s) = self.staged {
            if s.node_type.kind() == kind && s.key.simplified_name == name && !ids.contains(&s.id) {
                ids.push(s.id);
            }
        }
        ids
    }

    fn near(&self, node_type: NodeType, signature: &str) -> Vec<NodeId> {
        let mut ids = self
            .store
            .near
            .get(&(node_type, signature.to_string()))
            .cloned()
            .unwrap_or_default();
        if let Some(s) = self.staged {
            if s.node_type == node_type && s.signature == signature && !ids.contains(&s.id) {
                ids.push(s.id);
            }
        }
        ids
    }

    fn names(&self, id: NodeId) -> Vec<&str> {
        let mut names: Vec<&str> = self.store.names(id).iter().map(String::as_str).collect();
        if let Some(s) = self.staged {
            if s.id == id && !names.contains(&s.key.simplified_name.as_str()) {
                names.push(&s.key.simplified_name);
            }
        }
        names
    }
}

/// How a mention maps onto the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum Resolution {
    /// Same normalized key already known.
    Exact { node: NodeId },
    /// Exactly one near-duplicate of the same type above the threshold.
    Fuzzy { node: NodeId, score: f64 },
    /// Same name already known under another person type.
    CrossType { node: NodeId, observed: NodeType },
    /// Several near-duplicates qualified; a fresh node is created instead.
    Ambiguous { candidates: Vec<NodeId> },
    New,
}

impl Resolution {
    #[must_use]
    pub fn existing(&self) -> Option<NodeId> {
        match self {
            Self::Exact { node } | Self::Fuzzy { node, .. } | Self::CrossType { node, .. } => {
                Some(*node)
            }
            Self::Ambiguous { .. } | Self::New => None,
        }
    }

    #[must_use]
    pub fn creates_node(&self) -> bool {
        self.existing().is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedNode {
    pub id: NodeId,
    pub node_type: NodeType,
    pub resolution: Resolution,
    /// Attribute keys whose incoming value lost to an existing one.
    pub attribute_conflicts: Vec<String>,
}

impl ResolvedNode {
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.resolution.creates_node()
    }
}

pub struct EntityResolver {
    config: ResolverConfig,
}

impl EntityResolver {
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Decides how `key` would resolve without touching the store.
    pub fn plan(&self, store: &IdentityStore, key: &NormalizedKey) -> Resolution {
        self.plan_in(View { store, staged: None }, key)
    }

    /// Decides how `key` would resolve once `staged` has been committed,
    /// still without touching the store.
    pub fn plan_after(&self, store: &IdentityStore, staged: &Staged, key: &NormalizedKey) -> Resolution {
        self.plan_in(
            View {
                store,
                staged: Some(staged),
            },
            key,
        )
    }

    /// The write that applying `resolution` for `key` would perform.
    #[must_use]
    pub fn stage(&self, store: &IdentityStore, key: &NormalizedKey, resolution: &Resolution) -> Staged {
        Staged {
            id: resolution
                .existing()
                .unwrap_or_else(|| Self::fresh_id(store, key)),
            node_type: Self::resolved_type(store, key, resolution),
            key: key.clone(),
            signature: self.config.signature.signature(&key.simplified_name),
        }
    }

    /// The type the mention ends up with once `resolution` is applied.
    #[must_use]
    pub fn resolved_type(
        store: &IdentityStore,
        key: &NormalizedKey,
        resolution: &Resolution,
    ) -> NodeType {
        resolution
            .existing()
            .and_then(|id| store.get(id))
            .map_or(key.node_type, |n| n.node_type)
    }

    /// Like [`EntityResolver::resolved_type`] for a resolution planned with
    /// [`EntityResolver::plan_after`].
    #[must_use]
    pub fn resolved_type_after(
        store: &IdentityStore,
        staged: &Staged,
        key: &NormalizedKey,
        resolution: &Resolution,
    ) -> NodeType {
        match resolution.existing() {
            Some(id) if id == staged.id => staged.node_type,
            _ => Self::resolved_type(store, key, resolution),
        }
    }

    fn fresh_id(store: &IdentityStore, key: &NormalizedKey) -> NodeId {
        NodeId::derive(store.len(), key.node_type, &key.simplified_name)
    }

    /// The single write path into the store.
    pub fn apply(
        &self,
        store: &mut IdentityStore,
        mention: &NormalizedMention,
        resolution: Resolution,
        attributes: &Attributes,
        document_id: &str,
    ) -> ResolvedNode {
        let key = &mention.key;
        let signature = self.config.signature.signature(&key.simplified_name);

        let id = match resolution.existing() {
            Some(id) => id,
            None => {
                let id = Self::fresh_id(store, key);
                store.insert(Node::new(id, key.node_type, mention.display_name.clone()));
                tracing::debug!(node = %id, key = %key, "Created node");
                id
            }
        };

        let kept = Self::resolved_type(store, key, &resolution);
        store.register(key, id, kept, signature);

        let mut attribute_conflicts = Vec::new();
        let mut node_type = key.node_type;
        if let Some(stored) = store.node_mut(id) {
            let node = &mut stored.node;
            node.add_alias(&mention.raw);
            node.add_mention(document_id);
            if node.observe_type(key.node_type) {
                tracing::warn!(
                    node = %id,
                    kept = %node.node_type,
                    observed = %key.node_type,
                    "Conflicting type observation"
                );
            }
            attribute_conflicts = node.merge_attributes(attributes);
            node_type = node.node_type;
        }

        ResolvedNode {
            id,
            node_type,
            resolution,
            attribute_conflicts,
        }
    }

    pub fn resolve(
        &self,
        store: &mut IdentityStore,
        mention: &NormalizedMention,
        attributes: &Attributes,
        document_id: &str,
    ) -> ResolvedNode {
        let resolution = self.plan(store, &mention.key);
        self.apply(store, mention, resolution, attributes, document_id)
    }

    fn plan_in(&self, view: View<'_>, key: &NormalizedKey) -> Resolution {
        if let Some(node) = view.lookup(key) {
            return Resolution::Exact { node };
        }

        if self.config.cross_type_merge && key.node_type.kind() == NodeKind::Person {
            if let Some(resolution) = Self::cross_type_match(view, key) {
                return resolution;
            }
        }

        self.near_duplicate_match(view, key)
    }

    fn cross_type_match(view: View<'_>, key: &NormalizedKey) -> Option<Resolution> {
        match view
            .same_name(key.node_type.kind(), &key.simplified_name)
            .as_slice()
        {
            [node] => Some(Resolution::CrossType {
                node: *node,
                observed: key.node_type,
            }),
            _ => None,
        }
    }

    fn near_duplicate_match(&self, view: View<'_>, key: &NormalizedKey) -> Resolution {
        let signature = self.config.signature.signature(&key.simplified_name);

        let qualifying: Vec<(NodeId, f64)> = view
            .near(key.node_type, &signature)
            .into_iter()
            .filter(|&id| view.node_type(id) == Some(key.node_type))
            .filter_map(|id| {
                let best = view
                    .names(id)
                    .into_iter()
                    .map(|name| {
                        self.config
                            .similarity_metric
                            .score(&key.simplified_name, name)
                    })
                    .fold(0.0_f64, f64::max);
                (best >= self.config.similarity_threshold).then_some((id, best))
            })
            .collect();

        match qualifying.as_slice() {
            [] => Resolution::New,
            [(node, score)] => Resolution::Fuzzy {
                node: *node,
                score: *score,
            },
            many => Resolution::Ambiguous {
                candidates: many.iter().map(|(id, _)| *id).collect(),
            },
        }
    }
}

impl Default for EntityResolver {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}
