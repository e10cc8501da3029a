//! Ordering policy: natural auto-sort or explicit manual order.
//!
//! Auto-sort compares keys by alternating text/digit runs ("item2" before
//! "item10") and, within one parent's child list, puts branch nodes
//! (nodes that themselves have children in that hierarchy) before leaf
//! nodes. Manual order keeps explicit key lists - one top-level list per
//! hierarchy plus one child list per parent - maintained verbatim across
//! edits; nothing is ever reordered implicitly.
//!
//! A manual list that no longer matches the actual graph contents is a
//! corruption condition: the policy falls back to auto-sort for that
//! hierarchy and reports a warning.

use crate::forest::{Forest, NodeId, ParentLink};
use fsheet_core::{WarningSink, fold_key};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use tracing::debug;

/// One run of a natural sort key: either a digit run or a text run.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Run {
    Num(String),
    Text(String),
}

impl Ord for Run {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Run::Num(a), Run::Num(b)) => {
                let a = a.trim_start_matches('0');
                let b = b.trim_start_matches('0');
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
            (Run::Text(a), Run::Text(b)) => a.cmp(b),
            // Digit runs sort before text runs, matching ASCII order.
            (Run::Num(_), Run::Text(_)) => Ordering::Less,
            (Run::Text(_), Run::Num(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Run {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Natural sort key: alternating text/digit runs of a case-folded string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NaturalKey(Vec<Run>);

/// Split a string into its natural sort key. Comparison is
/// case-insensitive; digit runs compare numerically.
#[must_use]
pub fn natural_key(s: &str) -> NaturalKey {
    let folded = fold_key(s);
    let mut runs = Vec::new();
    let mut cur = String::new();
    let mut cur_digit = false;
    for ch in folded.chars() {
        let digit = ch.is_ascii_digit();
        if !cur.is_empty() && digit != cur_digit {
            runs.push(if cur_digit {
                Run::Num(std::mem::take(&mut cur))
            } else {
                Run::Text(std::mem::take(&mut cur))
            });
        }
        cur_digit = digit;
        cur.push(ch);
    }
    if !cur.is_empty() {
        runs.push(if cur_digit { Run::Num(cur) } else { Run::Text(cur) });
    }
    NaturalKey(runs)
}

/// Sort a sibling list in place: branch nodes first, natural key order
/// within each group.
pub fn sort_siblings(forest: &Forest, hier: usize, ids: &mut [NodeId]) {
    ids.sort_by_cached_key(|&id| {
        let node = forest.node(id);
        (node.children(hier).is_empty(), natural_key(node.key()))
    });
}

/// Re-sort the child list of one parent in place.
pub fn resort_children(forest: &mut Forest, hier: usize, parent: NodeId) {
    let mut kids = forest.children(parent, hier).to_vec();
    sort_siblings(forest, hier, &mut kids);
    forest.set_children(parent, hier, kids);
}

/// Re-sort every child list of one hierarchy.
pub fn resort_all(forest: &mut Forest, hier: usize) {
    for id in forest.ids() {
        if !forest.children(id, hier).is_empty() {
            resort_children(forest, hier, id);
        }
    }
}

/// Explicit manual order for one hierarchy: a top-level key list plus one
/// child key list per parent. All keys are case-folded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualOrder {
    top: Vec<String>,
    children: FxHashMap<String, Vec<String>>,
}

impl ManualOrder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the current graph order of `hier` as a manual order
    /// (switching a hierarchy from auto-sort to manual).
    #[must_use]
    pub fn from_forest(forest: &Forest, hier: usize) -> Self {
        let mut top: Vec<NodeId> = forest.roots(hier);
        sort_siblings(forest, hier, &mut top);
        let mut order = Self::new();
        order.top = top.iter().map(|&id| forest.node(id).key().to_owned()).collect();
        for (_, node) in forest.iter() {
            if !node.children(hier).is_empty() {
                order.children.insert(
                    node.key().to_owned(),
                    node.children(hier)
                        .iter()
                        .map(|&c| forest.node(c).key().to_owned())
                        .collect(),
                );
            }
        }
        order
    }

    /// The top-level key list.
    #[must_use]
    pub fn top(&self) -> &[String] {
        &self.top
    }

    /// The child key list of `parent_key`, if any children are recorded.
    #[must_use]
    pub fn children_of(&self, parent_key: &str) -> Option<&[String]> {
        self.children.get(parent_key).map(Vec::as_slice)
    }

    fn list_mut(&mut self, parent_key: Option<&str>) -> &mut Vec<String> {
        match parent_key {
            None => &mut self.top,
            Some(p) => self.children.entry(p.to_owned()).or_default(),
        }
    }

    /// Append `key` to the end of a list (new/orphaned entries are never
    /// spliced into the middle implicitly).
    pub fn append(&mut self, parent_key: Option<&str>, key: &str) {
        let list = self.list_mut(parent_key);
        if !list.iter().any(|k| k == key) {
            list.push(key.to_owned());
        }
    }

    /// Remove `key` from the top list and every child list, keeping its
    /// own child list (the node still exists, it just moved).
    pub fn detach_key(&mut self, key: &str) {
        self.top.retain(|k| k != key);
        for list in self.children.values_mut() {
            list.retain(|k| k != key);
        }
        self.children.retain(|_, v| !v.is_empty());
    }

    /// Remove `key` from every list, and drop its own child list.
    pub fn remove_key(&mut self, key: &str) {
        self.detach_key(key);
        self.children.remove(key);
    }

    /// Replace the top-level list (persistence load).
    pub fn set_top(&mut self, keys: Vec<String>) {
        self.top = keys;
    }

    /// Install the child list of one parent (persistence load).
    pub fn set_child_list(&mut self, parent_key: impl Into<String>, keys: Vec<String>) {
        self.children.insert(parent_key.into(), keys);
    }

    /// Iterate over `(parent_key, child_keys)` pairs, unordered.
    pub fn child_lists(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.children
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Rename `old` to `new` in place, preserving every position.
    pub fn rename_key(&mut self, old: &str, new: &str) {
        for slot in self.top.iter_mut().filter(|k| k.as_str() == old) {
            *slot = new.to_owned();
        }
        for list in self.children.values_mut() {
            for slot in list.iter_mut().filter(|k| k.as_str() == old) {
                *slot = new.to_owned();
            }
        }
        if let Some(kids) = self.children.remove(old) {
            self.children.insert(new.to_owned(), kids);
        }
    }

    /// Splice `key` to `new_index` within one list (drag reorder).
    /// Returns `false` when the key is not in that list.
    pub fn move_key(&mut self, parent_key: Option<&str>, key: &str, new_index: usize) -> bool {
        let list = self.list_mut(parent_key);
        let Some(pos) = list.iter().position(|k| k == key) else {
            return false;
        };
        let entry = list.remove(pos);
        let new_index = new_index.min(list.len());
        list.insert(new_index, entry);
        true
    }

    /// Bring the lists back in line with the graph after a rebuild:
    /// vanished keys are dropped, new roots and children are appended to
    /// the end of their list in graph order, and every surviving entry
    /// keeps its position. Engine paths that rebuild from raw cell edits
    /// call this before applying the order.
    pub fn reconcile(&mut self, forest: &Forest, hier: usize) {
        let root_keys: Vec<String> = forest
            .roots(hier)
            .iter()
            .map(|&id| forest.node(id).key().to_owned())
            .collect();
        self.top.retain(|k| root_keys.contains(k));
        for key in &root_keys {
            if !self.top.contains(key) {
                self.top.push(key.clone());
            }
        }
        let mut lists: FxHashMap<String, Vec<String>> = FxHashMap::default();
        for (_, node) in forest.iter() {
            let actual: Vec<String> = node
                .children(hier)
                .iter()
                .map(|&c| forest.node(c).key().to_owned())
                .collect();
            if actual.is_empty() {
                continue;
            }
            let mut list: Vec<String> = self
                .children
                .get(node.key())
                .map(|l| l.iter().filter(|k| actual.contains(k)).cloned().collect())
                .unwrap_or_default();
            for key in actual {
                if !list.contains(&key) {
                    list.push(key);
                }
            }
            lists.insert(node.key().to_owned(), list);
        }
        self.children = lists;
    }

    /// Whether the lists still describe exactly the graph's contents:
    /// same top-level key set, same child key set per parent.
    #[must_use]
    pub fn is_congruent(&self, forest: &Forest, hier: usize) -> bool {
        let mut roots: Vec<String> = forest
            .roots(hier)
            .iter()
            .map(|&id| forest.node(id).key().to_owned())
            .collect();
        let mut listed = self.top.clone();
        roots.sort_unstable();
        listed.sort_unstable();
        if roots != listed {
            return false;
        }
        for (_, node) in forest.iter() {
            let actual = node.children(hier);
            let listed = self.children_of(node.key()).unwrap_or(&[]);
            if actual.len() != listed.len() {
                return false;
            }
            let mut actual: Vec<String> = actual
                .iter()
                .map(|&c| forest.node(c).key().to_owned())
                .collect();
            let mut listed = listed.to_vec();
            actual.sort_unstable();
            listed.sort_unstable();
            if actual != listed {
                return false;
            }
        }
        true
    }

    /// Reorder every child list in the graph to match these lists. The
    /// caller has already checked congruence.
    pub fn apply(&self, forest: &mut Forest, hier: usize) {
        for id in forest.ids() {
            let node_key = forest.node(id).key().to_owned();
            let Some(listed) = self.children_of(&node_key) else {
                continue;
            };
            let current = forest.children(id, hier).to_vec();
            let mut ordered = Vec::with_capacity(current.len());
            for key in listed {
                if let Some(&c) = current
                    .iter()
                    .find(|&&c| forest.node(c).key() == key.as_str())
                {
                    ordered.push(c);
                }
            }
            if ordered.len() == current.len() {
                forest.set_children(id, hier, ordered);
            }
        }
    }
}

/// Per-hierarchy ordering mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderingMode {
    /// Natural sort with the branch-before-leaf tie-break.
    Auto,
    /// Explicit order lists maintained across edits.
    Manual(ManualOrder),
}

impl OrderingMode {
    #[must_use]
    pub fn is_manual(&self) -> bool {
        matches!(self, OrderingMode::Manual(_))
    }
}

/// Bring the graph order of `hier` in line with `mode`. A divergent
/// manual order falls back to auto-sort with a warning; the mode is
/// rewritten in place when that happens.
pub fn normalize(forest: &mut Forest, hier: usize, mode: &mut OrderingMode, sink: &mut WarningSink) {
    match mode {
        OrderingMode::Auto => resort_all(forest, hier),
        OrderingMode::Manual(order) => {
            if order.is_congruent(forest, hier) {
                order.apply(forest, hier);
            } else {
                debug!(target: "fsheet", hier, "manual order diverged from graph");
                sink.push(format!(
                    "manual order for hierarchy column {hier} no longer matches the data; \
                     reverting that hierarchy to automatic sorting"
                ));
                *mode = OrderingMode::Auto;
                resort_all(forest, hier);
            }
        }
    }
}

/// Display order of the roots of `hier` under `mode`.
#[must_use]
pub fn ordered_roots(forest: &Forest, hier: usize, mode: &OrderingMode) -> Vec<NodeId> {
    let mut roots = forest.roots(hier);
    match mode {
        OrderingMode::Auto => sort_siblings(forest, hier, &mut roots),
        OrderingMode::Manual(order) => {
            let pos: FxHashMap<&str, usize> = order
                .top()
                .iter()
                .enumerate()
                .map(|(i, k)| (k.as_str(), i))
                .collect();
            roots.sort_by_key(|&id| pos.get(forest.node(id).key()).copied().unwrap_or(usize::MAX));
        }
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::Forest;

    const H: usize = 1;

    #[test]
    fn natural_order_of_numbered_items() {
        let mut keys = vec!["item2", "item10", "item1"];
        keys.sort_by_cached_key(|k| natural_key(k));
        assert_eq!(keys, vec!["item1", "item2", "item10"]);
    }

    #[test]
    fn natural_order_ignores_case_and_leading_zeros() {
        let mut keys = vec!["B1", "a02", "A1"];
        keys.sort_by_cached_key(|k| natural_key(k));
        assert_eq!(keys, vec!["A1", "a02", "B1"]);
    }

    #[test]
    fn digits_sort_before_text() {
        let mut keys = vec!["alpha", "9beta"];
        keys.sort_by_cached_key(|k| natural_key(k));
        assert_eq!(keys, vec!["9beta", "alpha"]);
    }

    #[test]
    fn branches_sort_before_leaves() {
        let mut f = Forest::new();
        let p = f.intern("P");
        // B is alphabetically after A but has a child, so it leads.
        let a = f.intern("A");
        let b = f.intern("B");
        let bk = f.intern("BKid");
        f.attach(p, H, ParentLink::Top);
        f.attach(a, H, ParentLink::Node(p));
        f.attach(b, H, ParentLink::Node(p));
        f.attach(bk, H, ParentLink::Node(b));
        resort_children(&mut f, H, p);
        assert_eq!(f.children(p, H), &[b, a]);
    }

    fn two_root_forest() -> (Forest, NodeId, NodeId, NodeId) {
        let mut f = Forest::new();
        let r1 = f.intern("r1");
        let r2 = f.intern("r2");
        let kid = f.intern("kid");
        f.attach(r1, H, ParentLink::Top);
        f.attach(r2, H, ParentLink::Top);
        f.attach(kid, H, ParentLink::Node(r1));
        (f, r1, r2, kid)
    }

    #[test]
    fn manual_capture_and_apply_round_trip() {
        let (mut f, r1, r2, _) = two_root_forest();
        let order = ManualOrder::from_forest(&f, H);
        assert!(order.is_congruent(&f, H));
        assert_eq!(order.top(), &["r1".to_owned(), "r2".to_owned()]);
        order.apply(&mut f, H);
        assert!(f.check_back_refs());
        assert_eq!(ordered_roots(&f, H, &OrderingMode::Manual(order)), vec![r1, r2]);
    }

    #[test]
    fn move_key_splices() {
        let (f, _, _, _) = two_root_forest();
        let mut order = ManualOrder::from_forest(&f, H);
        assert!(order.move_key(None, "r2", 0));
        assert_eq!(order.top(), &["r2".to_owned(), "r1".to_owned()]);
        assert!(!order.move_key(None, "ghost", 0));
    }

    #[test]
    fn rename_key_preserves_positions() {
        let (f, _, _, _) = two_root_forest();
        let mut order = ManualOrder::from_forest(&f, H);
        order.move_key(None, "r2", 0);
        order.rename_key("r2", "zz");
        assert_eq!(order.top(), &["zz".to_owned(), "r1".to_owned()]);
        assert_eq!(order.children_of("r1"), Some(&["kid".to_owned()][..]));
    }

    #[test]
    fn remove_key_clears_everywhere() {
        let (f, _, _, _) = two_root_forest();
        let mut order = ManualOrder::from_forest(&f, H);
        order.remove_key("r1");
        assert_eq!(order.top(), &["r2".to_owned()]);
        assert!(order.children_of("r1").is_none());
    }

    #[test]
    fn divergent_manual_order_falls_back_to_auto() {
        let (mut f, _, _, _) = two_root_forest();
        let mut order = ManualOrder::from_forest(&f, H);
        order.remove_key("r2");
        let mut mode = OrderingMode::Manual(order);
        let mut sink = WarningSink::new();
        normalize(&mut f, H, &mut mode, &mut sink);
        assert_eq!(mode, OrderingMode::Auto);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn appended_entries_go_to_the_end() {
        let (f, _, _, _) = two_root_forest();
        let mut order = ManualOrder::from_forest(&f, H);
        order.move_key(None, "r2", 0);
        order.append(None, "r3");
        order.append(None, "r3");
        assert_eq!(
            order.top(),
            &["r2".to_owned(), "r1".to_owned(), "r3".to_owned()]
        );
    }
}
