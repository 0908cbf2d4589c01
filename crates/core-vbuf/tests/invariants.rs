//! Structural invariants of built and updated snapshots, checked across a
//! set of representative documents rather than single-shot examples.

use std::sync::Arc;

use core_a11y::TestElement;
use core_vbuf::{apply_update, build_document, IndexKind, VDocument};

/// Every document used by this suite. Shapes vary: flat, nested, degraded
/// reads, empty names, landmark containers.
fn corpus() -> Vec<VDocument> {
    vec![
        build_document(Arc::new(TestElement::new(vec![1], "Document"))),
        build_document(Arc::new(
            TestElement::new(vec![1], "Document")
                .child(
                    TestElement::named(vec![2], "Text", "Intro")
                        .role("heading")
                        .properties("level=1"),
                )
                .child(TestElement::named(vec![3], "Hyperlink", "Click here")),
        )),
        build_document(Arc::new(
            TestElement::new(vec![1], "Document")
                .child(
                    TestElement::new(vec![10], "Group").role("navigation").child(
                        TestElement::named(vec![11], "Hyperlink", "Home")
                            .properties("visited=yes")
                            .focusable(),
                    ),
                )
                .child(
                    TestElement::new(vec![20], "Group").role("main").child(
                        TestElement::named(vec![21], "Text", "Body text goes here").child(
                            TestElement::named(vec![22], "Hyperlink", "inline link").focusable(),
                        ),
                    ),
                )
                .child(TestElement::named(vec![30], "Edit", "Search").focusable())
                .child(
                    TestElement::named(vec![40], "ComboBox", "Country")
                        .properties("expandable=true; expanded=false"),
                ),
        )),
        build_document(Arc::new(
            TestElement::new(vec![1], "Document")
                .child(TestElement::named(vec![2], "Text", "Before"))
                .child(
                    TestElement::named(vec![3], "Text", "Broken")
                        .failing("name")
                        .failing("aria_properties"),
                )
                .child(TestElement::named(vec![4], "Text", "After")),
        )),
    ]
}

fn check_invariants(doc: &VDocument) {
    // Every offset resolves to exactly one node whose range brackets it.
    for offset in 0..doc.flat_text().len() {
        let node = doc
            .find_node_at_offset(offset)
            .unwrap_or_else(|| panic!("offset {offset} resolved to no node"));
        assert!(
            node.range.contains(offset),
            "offset {offset} outside returned node {:?}",
            node.range
        );
    }

    // Walking next_in_order from the root visits every node once, in
    // pre-order (dense ascending ids).
    if !doc.is_empty() {
        let mut visited = Vec::new();
        let mut cursor = Some(0);
        while let Some(id) = cursor {
            visited.push(id);
            cursor = doc.node(id).unwrap().next_in_order;
        }
        assert_eq!(visited, (0..doc.len()).collect::<Vec<_>>());

        // And the reverse direction is its mirror.
        let mut reverse = Vec::new();
        let mut cursor = Some(doc.len() - 1);
        while let Some(id) = cursor {
            reverse.push(id);
            cursor = doc.node(id).unwrap().prev_in_order;
        }
        reverse.reverse();
        assert_eq!(reverse, visited);
    }

    // Index consistency against node flags.
    for node in doc.nodes() {
        assert_eq!(
            doc.index(IndexKind::Headings).contains(&node.id),
            (1..=6).contains(&node.heading_level),
            "headings index mismatch for node {}",
            node.id
        );
        assert_eq!(doc.index(IndexKind::Links).contains(&node.id), node.link);
        assert_eq!(
            doc.index(IndexKind::Landmarks).contains(&node.id),
            !node.landmark.is_empty()
        );
        assert_eq!(
            doc.index(IndexKind::FormFields).contains(&node.id),
            node.is_form_field()
        );
        assert_eq!(
            doc.index(IndexKind::FocusableElements).contains(&node.id),
            node.focusable
        );
    }

    // Parent/child links are mutual and ranges nest.
    for node in doc.nodes() {
        if let Some(parent) = node.parent {
            let parent = doc.node(parent).unwrap();
            assert!(parent.children.contains(&node.id));
            assert!(parent.range.start <= node.range.start);
            assert!(node.range.end <= parent.range.end);
        }
        for &child in &node.children {
            assert_eq!(doc.node(child).unwrap().parent, Some(node.id));
        }
        assert!(node.range.start <= node.range.end);
        assert!(node.range.end <= doc.flat_text().len());
    }

    // Runtime-id lookups agree with the node list.
    for node in doc.nodes() {
        if !node.runtime_id.is_empty() {
            let found = doc
                .find_by_runtime_id(&node.runtime_id)
                .expect("indexed runtime id resolves");
            assert_eq!(found.id, node.id);
        }
    }
}

#[test]
fn built_documents_satisfy_structural_invariants() {
    for doc in corpus() {
        check_invariants(&doc);
    }
}

#[test]
fn invariants_hold_after_replacement_updates() {
    for doc in corpus() {
        // Replace every replaceable node in turn and re-check everything.
        let targets: Vec<Vec<i32>> = doc
            .nodes()
            .iter()
            .skip(1)
            .map(|n| n.runtime_id.clone())
            .filter(|id| !id.is_empty())
            .collect();
        for target in targets {
            let replacement = Arc::new(
                TestElement::named(target.clone(), "Text", "Replacement body")
                    .role("heading")
                    .properties("level=3"),
            );
            let updated = apply_update(&doc, &target, Some(replacement));
            check_invariants(&updated);

            let node = updated
                .find_by_runtime_id(&target)
                .expect("replaced node still resolvable");
            assert_eq!(node.heading_level, 3);
            assert_eq!(node.name, "Replacement body");
        }
    }
}

#[test]
fn invariants_hold_after_deletions() {
    for doc in corpus() {
        let targets: Vec<Vec<i32>> = doc
            .nodes()
            .iter()
            .skip(1)
            .map(|n| n.runtime_id.clone())
            .filter(|id| !id.is_empty())
            .collect();
        for target in targets {
            let updated = apply_update(&doc, &target, None);
            check_invariants(&updated);
            assert!(updated.find_by_runtime_id(&target).is_none());
        }
    }
}

#[test]
fn chained_updates_keep_converging() {
    let doc = build_document(Arc::new(
        TestElement::new(vec![1], "Document")
            .child(TestElement::named(vec![2], "Text", "Alpha"))
            .child(TestElement::named(vec![3], "Text", "Beta"))
            .child(TestElement::named(vec![4], "Text", "Gamma")),
    ));

    let step1 = apply_update(
        &doc,
        &[3],
        Some(Arc::new(
            TestElement::new(vec![3], "Group")
                .child(TestElement::named(vec![31], "Text", "Beta one"))
                .child(TestElement::named(vec![32], "Text", "Beta two")),
        )),
    );
    check_invariants(&step1);
    assert_eq!(step1.flat_text(), "Alpha\nBeta one\nBeta two\nGamma\n");

    let step2 = apply_update(&step1, &[32], None);
    check_invariants(&step2);
    assert_eq!(step2.flat_text(), "Alpha\nBeta one\nGamma\n");

    let step3 = apply_update(
        &step2,
        &[2],
        Some(Arc::new(TestElement::named(vec![2], "Text", "A"))),
    );
    check_invariants(&step3);
    assert_eq!(step3.flat_text(), "A\nBeta one\nGamma\n");
    // Gamma kept its identity through three generations of snapshots.
    assert_eq!(step3.find_by_runtime_id(&[4]).unwrap().name, "Gamma");
}
