use overlay_core::model::overlay::{CollectionKind, CollectionNode};
use overlay_core::{CollectionTree, EngineHandle, MemoryEngine, OverlayError, Scope};

fn node(id: i64, parent_id: Option<i64>, kind: CollectionKind) -> CollectionNode {
    CollectionNode {
        id,
        parent_id,
        kind,
        handle: EngineHandle(id as u64),
    }
}

fn sample_nodes() -> Vec<CollectionNode> {
    vec![
        node(1, None, CollectionKind::Plain),
        node(2, Some(1), CollectionKind::Plain),
        node(3, Some(2), CollectionKind::Plain),
        node(4, Some(3), CollectionKind::Clusterized),
        node(5, Some(1), CollectionKind::Clusterized),
        node(6, None, CollectionKind::Plain),
        node(7, Some(6), CollectionKind::Clusterized),
    ]
}

#[test]
fn descendant_ids_converge_for_every_insertion_order() {
    let base = sample_nodes();
    for shift in 0..base.len() {
        for reversed in [false, true] {
            let mut nodes = base.clone();
            nodes.rotate_left(shift);
            if reversed {
                nodes.reverse();
            }

            let tree = CollectionTree::from_nodes(nodes).unwrap();
            assert_eq!(
                tree.descendant_ids(Some(1)).into_iter().collect::<Vec<_>>(),
                vec![2, 3, 4, 5]
            );
            assert_eq!(
                tree.descendant_ids(Some(6)).into_iter().collect::<Vec<_>>(),
                vec![7]
            );
            assert!(tree.descendant_ids(Some(4)).is_empty());
            for id in 1..=7 {
                assert!(!tree.ancestors(id).unwrap().contains(&id));
            }
        }
    }
}

#[test]
fn resolve_never_exposes_cycles_after_mixed_create_and_remove() {
    let mut engine = MemoryEngine::new();
    let mut tree = CollectionTree::new();
    tree.create_collection(&mut engine, 1, None, CollectionKind::Plain)
        .unwrap();
    tree.create_collection(&mut engine, 2, Some(1), CollectionKind::Plain)
        .unwrap();
    tree.create_collection(&mut engine, 3, Some(2), CollectionKind::Clusterized)
        .unwrap();
    tree.remove(2).unwrap();
    tree.create_collection(&mut engine, 2, Some(1), CollectionKind::Plain)
        .unwrap();
    tree.create_collection(&mut engine, 4, Some(2), CollectionKind::Plain)
        .unwrap();

    assert!(matches!(tree.resolve(Some(3)), Err(OverlayError::CollectionNotFound(3))));
    assert_eq!(tree.ancestors(4).unwrap(), vec![2, 1]);
    assert!(matches!(tree.resolve(Some(4)), Ok(Scope::Plain(_))));
    assert_eq!(tree.len(), 3);
}

#[test]
fn clusterized_parent_is_rejected_for_nested_collection() {
    let mut engine = MemoryEngine::new();
    let mut tree = CollectionTree::new();
    tree.create_collection(&mut engine, 10, None, CollectionKind::Clusterized)
        .unwrap();

    for kind in [CollectionKind::Plain, CollectionKind::Clusterized] {
        let err = tree
            .create_collection(&mut engine, 11, Some(10), kind)
            .unwrap_err();
        assert_eq!(
            err,
            OverlayError::InvalidParent {
                id: 11,
                parent_id: 10
            }
        );
    }
    let err = tree
        .create_collection(&mut engine, 11, Some(404), CollectionKind::Plain)
        .unwrap_err();
    assert_eq!(err.code(), "invalid_parent");
    assert!(!tree.contains(11));
}
