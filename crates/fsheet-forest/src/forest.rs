//! The node graph: an arena of nodes with per-hierarchy links.
//!
//! Each node exists once per unique case-folded ID and carries, for every
//! hierarchy it participates in, an optional parent link and an ordered
//! child list. Edges are [`NodeId`] handles into the arena; removal from
//! the arena is the sole authority on node lifetime.
//!
//! Invariants maintained by the mutating methods:
//! - back-reference integrity: `c` is in `children(n, h)` iff
//!   `parent(c, h) == Some(ParentLink::Node(n))`
//! - a node participates in hierarchy `h` iff it has a parent link or a
//!   non-empty child list there; link records with neither are pruned
//!
//! Cycle-freedom is a precondition of the mutation engine, not something
//! this layer repairs after the fact; [`Forest::is_descendant`] is the
//! check the engine uses.

use fsheet_core::fold_key;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

const NO_CHILDREN: &[NodeId] = &[];

/// Opaque handle to a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[must_use]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node's parent within one hierarchy.
///
/// Absence of any link (the node not participating in the hierarchy at
/// all) is represented by `Option<ParentLink>::None` at the query level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentLink {
    /// Root of the hierarchy (the empty-parent sentinel).
    Top,
    /// Child of another node.
    Node(NodeId),
}

/// Per-hierarchy link record. Kept only while the node participates.
#[derive(Debug, Clone, Default)]
struct HierLink {
    hier: usize,
    parent: Option<ParentLink>,
    children: Vec<NodeId>,
}

/// One node: display spelling, folded key, and hierarchy links.
///
/// Documents typically carry one to four hierarchies, hence the inline
/// capacity.
#[derive(Debug, Clone)]
pub struct Node {
    display_name: String,
    key: String,
    links: SmallVec<[HierLink; 4]>,
}

impl Node {
    /// The human-entered spelling.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The case-folded lookup key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    fn link(&self, hier: usize) -> Option<&HierLink> {
        self.links.iter().find(|l| l.hier == hier)
    }

    fn link_mut(&mut self, hier: usize) -> Option<&mut HierLink> {
        self.links.iter_mut().find(|l| l.hier == hier)
    }

    fn ensure_link(&mut self, hier: usize) -> &mut HierLink {
        if let Some(pos) = self.links.iter().position(|l| l.hier == hier) {
            &mut self.links[pos]
        } else {
            self.links.push(HierLink {
                hier,
                parent: None,
                children: Vec::new(),
            });
            self.links.last_mut().expect("just pushed")
        }
    }

    /// Drop the link record for `hier` if it carries neither a parent nor
    /// children.
    fn prune(&mut self, hier: usize) {
        self.links
            .retain(|l| l.hier != hier || l.parent.is_some() || !l.children.is_empty());
    }

    /// The node's parent in `hier`, or `None` when it does not
    /// participate there.
    #[must_use]
    pub fn parent(&self, hier: usize) -> Option<ParentLink> {
        self.link(hier).and_then(|l| l.parent)
    }

    /// Ordered children in `hier` (empty when not participating).
    #[must_use]
    pub fn children(&self, hier: usize) -> &[NodeId] {
        self.link(hier).map_or(NO_CHILDREN, |l| &l.children)
    }

    /// Whether the node participates in `hier`.
    #[must_use]
    pub fn participates(&self, hier: usize) -> bool {
        self.link(hier)
            .is_some_and(|l| l.parent.is_some() || !l.children.is_empty())
    }

    /// Hierarchies this node participates in.
    pub fn hierarchies(&self) -> impl Iterator<Item = usize> + '_ {
        self.links
            .iter()
            .filter(|l| l.parent.is_some() || !l.children.is_empty())
            .map(|l| l.hier)
    }

    /// Number of hierarchies this node participates in.
    #[must_use]
    pub fn participation_count(&self) -> usize {
        self.hierarchies().count()
    }
}

/// The node graph. Owns all node storage; hands out [`NodeId`] handles.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    slots: Vec<Option<Node>>,
    free: Vec<u32>,
    index: FxHashMap<String, NodeId>,
}

impl Forest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Look up a node by raw name or folded key.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.index.get(&fold_key(name)).copied()
    }

    /// Borrow a node.
    ///
    /// # Panics
    ///
    /// Panics on a stale handle; handles are intra-document and never
    /// outlive the node they point to, so this is a programmer error.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .expect("stale node handle")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .expect("stale node handle")
    }

    /// Iterate over all live nodes.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|n| (NodeId(i as u32), n)))
    }

    /// All live node handles, in arena order.
    #[must_use]
    pub fn ids(&self) -> Vec<NodeId> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Get the node for `name`, creating a detached one if absent.
    pub fn intern(&mut self, name: &str) -> NodeId {
        let key = fold_key(name);
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let node = Node {
            display_name: name.trim().to_owned(),
            key: key.clone(),
            links: SmallVec::new(),
        };
        let id = match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(node);
                NodeId(slot)
            }
            None => {
                self.slots.push(Some(node));
                NodeId((self.slots.len() - 1) as u32)
            }
        };
        self.index.insert(key, id);
        id
    }

    /// Re-key a node under a new spelling. The caller has already checked
    /// that the new key does not collide with a different node.
    pub fn rename(&mut self, id: NodeId, new_name: &str) {
        let new_key = fold_key(new_name);
        let node = self.node_mut(id);
        let old_key = std::mem::replace(&mut node.key, new_key.clone());
        node.display_name = new_name.trim().to_owned();
        self.index.remove(&old_key);
        self.index.insert(new_key, id);
    }

    /// Remove a fully-detached node from the arena.
    ///
    /// The caller must have detached every hierarchy link first; any
    /// remaining edge would dangle.
    pub fn remove(&mut self, id: NodeId) {
        debug_assert_eq!(
            self.node(id).participation_count(),
            0,
            "removing a node that still participates in a hierarchy"
        );
        let key = self.node(id).key.clone();
        self.index.remove(&key);
        self.slots[id.index()] = None;
        self.free.push(id.0);
    }

    /// The node's parent in `hier` (`None` = not participating).
    #[must_use]
    pub fn parent(&self, id: NodeId, hier: usize) -> Option<ParentLink> {
        self.node(id).parent(hier)
    }

    /// Ordered children of `id` in `hier`.
    #[must_use]
    pub fn children(&self, id: NodeId, hier: usize) -> &[NodeId] {
        self.node(id).children(hier)
    }

    /// Attach `child` under `parent` in `hier`, appending to the child
    /// list. The child must not already have a parent link in `hier`.
    pub fn attach(&mut self, child: NodeId, hier: usize, parent: ParentLink) {
        debug_assert!(
            self.node(child).parent(hier).is_none(),
            "attach over an existing parent link"
        );
        debug_assert!(
            parent != ParentLink::Node(child),
            "attach to self"
        );
        self.node_mut(child).ensure_link(hier).parent = Some(parent);
        if let ParentLink::Node(p) = parent {
            self.node_mut(p).ensure_link(hier).children.push(child);
        }
    }

    /// Detach `child` from its parent in `hier`. Its own children in
    /// `hier` are untouched. Returns the old parent link.
    pub fn detach(&mut self, child: NodeId, hier: usize) -> Option<ParentLink> {
        let old = match self.node_mut(child).link_mut(hier) {
            Some(link) => link.parent.take(),
            None => None,
        };
        if let Some(ParentLink::Node(p)) = old {
            let siblings = &mut self.node_mut(p).ensure_link(hier).children;
            siblings.retain(|&c| c != child);
            self.node_mut(p).prune(hier);
        }
        self.node_mut(child).prune(hier);
        old
    }

    /// Replace the child list of `parent` in `hier` with a reordering of
    /// itself (same handles, new order).
    pub fn set_children(&mut self, parent: NodeId, hier: usize, children: Vec<NodeId>) {
        debug_assert_eq!(
            {
                let mut a = self.children(parent, hier).to_vec();
                a.sort_unstable();
                a
            },
            {
                let mut b = children.clone();
                b.sort_unstable();
                b
            },
            "set_children must be a permutation"
        );
        if let Some(link) = self.node_mut(parent).link_mut(hier) {
            link.children = children;
        }
    }

    /// Whether `candidate` is `ancestor` or a descendant of it in `hier`.
    ///
    /// Used as the cycle-prevention precondition: a node may not be moved
    /// under a member of its own subtree.
    #[must_use]
    pub fn is_descendant(&self, candidate: NodeId, ancestor: NodeId, hier: usize) -> bool {
        let mut cur = Some(candidate);
        let mut steps = 0usize;
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = match self.parent(id, hier) {
                Some(ParentLink::Node(p)) => Some(p),
                _ => None,
            };
            // Walks are bounded by node count; a longer walk means the
            // graph is already cyclic, which is a bug upstream.
            steps += 1;
            if steps > self.slots.len() {
                debug_assert!(false, "cycle while walking parent chain");
                return true;
            }
        }
        false
    }

    /// Preorder subtree of `id` in `hier`, including `id` itself.
    #[must_use]
    pub fn subtree(&self, id: NodeId, hier: usize) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            out.push(cur);
            for &c in self.children(cur, hier).iter().rev() {
                stack.push(c);
            }
        }
        out
    }

    /// Roots of `hier`, in arena order. Display order is the ordering
    /// policy's business.
    #[must_use]
    pub fn roots(&self, hier: usize) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, n)| n.parent(hier) == Some(ParentLink::Top))
            .map(|(id, _)| id)
            .collect()
    }

    /// Remove every link record for `hier` across the whole graph (the
    /// hierarchy's column was removed).
    pub fn drop_hierarchy(&mut self, hier: usize) {
        for slot in self.slots.iter_mut().flatten() {
            slot.links.retain(|l| l.hier != hier);
        }
    }

    /// Renumber hierarchy links after a column was inserted at `at`:
    /// every link at `at` or later moves one to the right.
    pub fn shift_hierarchies_up(&mut self, at: usize) {
        for slot in self.slots.iter_mut().flatten() {
            for link in &mut slot.links {
                if link.hier >= at {
                    link.hier += 1;
                }
            }
        }
    }

    /// Renumber hierarchy links after the column at `at` was removed.
    /// The hierarchy at `at` itself must already be dropped.
    pub fn shift_hierarchies_down(&mut self, at: usize) {
        for slot in self.slots.iter_mut().flatten() {
            for link in &mut slot.links {
                debug_assert_ne!(link.hier, at, "shifting over a live hierarchy");
                if link.hier > at {
                    link.hier -= 1;
                }
            }
        }
    }

    /// The reclassification pass run after builds and hierarchy-column
    /// removal: a participating node without a parent link becomes a root
    /// of that hierarchy, and a node participating nowhere is attached as
    /// a root of `first_hier`. Returns the keys that were reclassified to
    /// `first_hier`.
    pub fn associate(&mut self, hiers: &[usize], first_hier: usize) -> Vec<String> {
        let ids = self.ids();
        for &id in &ids {
            for &h in hiers {
                let node = self.node_mut(id);
                if let Some(link) = node.link_mut(h)
                    && link.parent.is_none()
                    && !link.children.is_empty()
                {
                    link.parent = Some(ParentLink::Top);
                }
            }
        }
        let mut moved = Vec::new();
        for &id in &ids {
            if self.node(id).participation_count() == 0 {
                self.node_mut(id).ensure_link(first_hier).parent = Some(ParentLink::Top);
                moved.push(self.node(id).key.clone());
            }
        }
        moved
    }

    /// Verify back-reference integrity over the whole graph. Test hook.
    #[must_use]
    pub fn check_back_refs(&self) -> bool {
        for (id, node) in self.iter() {
            for link in &node.links {
                for &c in &link.children {
                    if self.parent(c, link.hier) != Some(ParentLink::Node(id)) {
                        return false;
                    }
                }
                if let Some(ParentLink::Node(p)) = link.parent
                    && !self.children(p, link.hier).contains(&id)
                {
                    return false;
                }
            }
        }
        true
    }
}
