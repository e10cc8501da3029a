#![forbid(unsafe_code)]

//! Property tests over the node graph and the tree builder.
//!
//! Random edit sequences and random tables must always leave the graph
//! with intact back-references and acyclic parent chains; the builder
//! must always produce one node per surviving row.

use fsheet_core::{DocumentState, RowTable, WarningSink};
use fsheet_forest::order::natural_key;
use fsheet_forest::{Forest, NodeId, ParentLink, build_forest};
use proptest::prelude::*;

const NAMES: [&str; 8] = ["a", "b", "c", "d", "e", "f", "g", "h"];
const HIERS: [usize; 2] = [1, 2];

#[derive(Debug, Clone)]
enum Op {
    AttachTop { child: usize, hier: usize },
    Attach { child: usize, parent: usize, hier: usize },
    Detach { child: usize, hier: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..NAMES.len(), 0..HIERS.len())
            .prop_map(|(child, h)| Op::AttachTop { child, hier: HIERS[h] }),
        (0..NAMES.len(), 0..NAMES.len(), 0..HIERS.len()).prop_map(|(child, parent, h)| {
            Op::Attach {
                child,
                parent,
                hier: HIERS[h],
            }
        }),
        (0..NAMES.len(), 0..HIERS.len())
            .prop_map(|(child, h)| Op::Detach { child, hier: HIERS[h] }),
    ]
}

/// Walk the parent chain of every node; a chain longer than the node
/// count means a cycle.
fn assert_acyclic(forest: &Forest, ids: &[NodeId]) {
    for &id in ids {
        for hier in HIERS {
            let mut cur = id;
            let mut steps = 0;
            while let Some(ParentLink::Node(p)) = forest.parent(cur, hier) {
                cur = p;
                steps += 1;
                assert!(steps <= ids.len(), "cycle in hierarchy {hier}");
            }
        }
    }
}

proptest! {
    #[test]
    fn random_edits_keep_the_graph_consistent(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut forest = Forest::new();
        let ids: Vec<NodeId> = NAMES.iter().map(|n| forest.intern(n)).collect();
        for op in ops {
            match op {
                Op::AttachTop { child, hier } => {
                    let child = ids[child];
                    if forest.parent(child, hier).is_none() {
                        forest.attach(child, hier, ParentLink::Top);
                    }
                }
                Op::Attach { child, parent, hier } => {
                    let (child, parent) = (ids[child], ids[parent]);
                    // The engine's preconditions: no double parent, no
                    // self-link, no cycle.
                    if child != parent
                        && forest.parent(child, hier).is_none()
                        && !forest.is_descendant(parent, child, hier)
                    {
                        forest.attach(child, hier, ParentLink::Node(parent));
                    }
                }
                Op::Detach { child, hier } => {
                    forest.detach(ids[child], hier);
                }
            }
            prop_assert!(forest.check_back_refs());
        }
        assert_acyclic(&forest, &ids);
        // Participation is derived, never stored stale.
        for &id in &ids {
            for hier in HIERS {
                let node = forest.node(id);
                prop_assert_eq!(
                    node.participates(hier),
                    node.parent(hier).is_some() || !node.children(hier).is_empty()
                );
            }
        }
    }

    #[test]
    fn builder_yields_one_node_per_surviving_row(
        rows in prop::collection::vec(
            (0..NAMES.len(), prop::option::of(0..NAMES.len()), prop::option::of(0..NAMES.len())),
            0..20,
        ),
    ) {
        let raw: Vec<Vec<String>> = rows
            .iter()
            .map(|&(id, p1, p2)| {
                vec![
                    NAMES[id].to_owned(),
                    p1.map_or(String::new(), |p| NAMES[p].to_owned()),
                    p2.map_or(String::new(), |p| NAMES[p].to_owned()),
                ]
            })
            .collect();
        let mut table = RowTable::from_rows(raw);
        // from_rows on an empty input yields zero columns; give the
        // classification something to stand on.
        if table.column_count() < 3 {
            table = RowTable::new(3);
        }
        let state = DocumentState::new(
            vec!["ID".into(), "H1".into(), "H2".into()],
            0,
            vec![1, 2],
        );
        let mut sink = WarningSink::new();
        let forest = build_forest(&mut table, &state, &mut sink);

        prop_assert!(forest.check_back_refs());
        prop_assert_eq!(forest.len(), table.row_count());
        let ids = forest.ids();
        assert_acyclic(&forest, &ids);
        // Every surviving row's parent cell points at a real node or is
        // blank.
        for r in 0..table.row_count() {
            for hier in HIERS {
                let cell = table.cell(r, hier);
                if !cell.is_empty() {
                    prop_assert!(forest.lookup(cell).is_some());
                }
            }
        }
    }

    #[test]
    fn numbered_names_sort_numerically(a in 0u32..10_000, b in 0u32..10_000) {
        let ka = natural_key(&format!("item{a}"));
        let kb = natural_key(&format!("item{b}"));
        prop_assert_eq!(ka.cmp(&kb), a.cmp(&b));
    }

    #[test]
    fn natural_key_ignores_case(s in "[a-zA-Z0-9]{0,12}") {
        prop_assert_eq!(natural_key(&s), natural_key(&s.to_uppercase()));
    }
}
