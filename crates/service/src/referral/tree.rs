//! Read-only traversals of the referral forest.
//!
//! The downline is fetched level by level (one `list_children` call per
//! depth) into a [`DownlineArena`]; flat, nested and layered views are all
//! built from that arena in memory.

use std::collections::{HashMap, HashSet};

use tracing::error;
use uuid::Uuid;

use super::domain::{layer_name, DownlineEntry, DownlineNode, Layer, LayerMember, User};
use super::errors::ReferralError;
use super::repository::ReferralRepository;

/// Build a `CorruptGraph` error, logging it apart from ordinary failures.
pub(crate) fn corrupt_graph(user_id: Uuid, depth: u32) -> ReferralError {
    error!(event = "corrupt_graph", user_id = %user_id, depth, "referral graph integrity violation");
    common::metrics::CORRUPT_GRAPH_TOTAL.inc();
    ReferralError::CorruptGraph { user_id, depth }
}

struct ArenaNode {
    user: User,
    level: u32,
    children: Vec<usize>,
}

/// All descendants of one user, indexed by id with explicit child lists.
pub struct DownlineArena {
    nodes: Vec<ArenaNode>,
    index: HashMap<Uuid, usize>,
    top: Vec<usize>,
}

impl DownlineArena {
    fn new() -> Self {
        Self { nodes: Vec::new(), index: HashMap::new(), top: Vec::new() }
    }

    fn push(&mut self, user: User, level: u32) {
        let idx = self.nodes.len();
        let parent = user.parent_id.and_then(|p| self.index.get(&p).copied());
        self.index.insert(user.id, idx);
        self.nodes.push(ArenaNode { user, level, children: Vec::new() });
        match parent {
            Some(p) => self.nodes[p].children.push(idx),
            None => self.top.push(idx),
        }
    }

    /// Total number of descendants
    pub fn len(&self) -> usize { self.nodes.len() }

    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    pub fn direct_count(&self) -> usize { self.top.len() }

    /// Flat view in breadth-first order.
    pub fn entries(&self) -> Vec<DownlineEntry> {
        self.nodes.iter().map(|n| DownlineEntry { user: n.user.clone(), level: n.level }).collect()
    }

    /// Nested view rooted at the direct recruits.
    pub fn tree(&self) -> Vec<DownlineNode> {
        self.top.iter().map(|&i| self.build_node(i)).collect()
    }

    fn build_node(&self, idx: usize) -> DownlineNode {
        let n = &self.nodes[idx];
        DownlineNode {
            user: n.user.clone(),
            level: n.level,
            child_count: n.children.len(),
            children: n.children.iter().map(|&c| self.build_node(c)).collect(),
        }
    }

    /// Depth buckets; empty levels never appear.
    pub fn layers(&self) -> Vec<Layer> {
        let mut layers: Vec<Layer> = Vec::new();
        for n in &self.nodes {
            let member = LayerMember { user: n.user.clone(), child_count: n.children.len() };
            match layers.last_mut() {
                Some(layer) if layer.level == n.level => layer.members.push(member),
                _ => layers.push(Layer { name: layer_name(n.level), level: n.level, members: vec![member] }),
            }
        }
        layers
    }
}

/// Upline/downline queries bounded by a depth cap.
pub struct TreeQueryEngine<'a> {
    repo: &'a dyn ReferralRepository,
    max_depth: u32,
}

impl<'a> TreeQueryEngine<'a> {
    pub fn new(repo: &'a dyn ReferralRepository, max_depth: u32) -> Self { Self { repo, max_depth } }

    async fn require_user(&self, user_id: Uuid) -> Result<User, ReferralError> {
        self.repo.get_user(user_id).await?.ok_or_else(|| ReferralError::not_found("user", user_id))
    }

    /// Ancestors of `user_id`, root first; the user itself is excluded.
    pub async fn upline(&self, user_id: Uuid) -> Result<Vec<User>, ReferralError> {
        let start = self.require_user(user_id).await?;
        let mut chain: Vec<User> = Vec::new();
        let mut seen = HashSet::from([start.id]);
        let mut next = start.parent_id;
        while let Some(parent_id) = next {
            let depth = chain.len() as u32 + 1;
            if depth > self.max_depth || !seen.insert(parent_id) {
                return Err(corrupt_graph(user_id, depth));
            }
            // parent_id is a foreign key; a dangling pointer is corruption too
            let parent = self.repo.get_user(parent_id).await?.ok_or_else(|| corrupt_graph(user_id, depth))?;
            next = parent.parent_id;
            chain.push(parent);
        }
        chain.reverse();
        Ok(chain)
    }

    pub async fn downline(&self, user_id: Uuid) -> Result<DownlineArena, ReferralError> {
        let root = self.require_user(user_id).await?;
        self.downline_of(&root).await
    }

    pub(crate) async fn downline_of(&self, root: &User) -> Result<DownlineArena, ReferralError> {
        let mut arena = DownlineArena::new();
        let mut seen = HashSet::from([root.id]);
        let mut frontier = vec![root.id];
        let mut level = 0u32;
        loop {
            let children = self.repo.list_children(&frontier).await?;
            if children.is_empty() {
                break;
            }
            level += 1;
            if level > self.max_depth {
                return Err(corrupt_graph(root.id, level));
            }
            let mut next = Vec::with_capacity(children.len());
            for child in children {
                if !seen.insert(child.id) {
                    return Err(corrupt_graph(child.id, level));
                }
                next.push(child.id);
                arena.push(child, level);
            }
            frontier = next;
        }
        Ok(arena)
    }
}
