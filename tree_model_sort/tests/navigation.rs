//! 路径、迭代器与子模型坐标之间的转换

mod common;

use common::*;
use tree_model_sort::{
    by_column, RowEvent, RowEventSource, SortColumn, SortOrder, TreeError, TreeModel,
    TreeModelSort, TreePath, TreeStore,
};

/// drums [kick, snare, hat], bass [sub], keys []
fn band() -> TreeModelSort<TreeStore> {
    let mut store = TreeStore::new(columns());
    let drums = store.append(None, row("drums", 30)).unwrap();
    let bass = store.append(None, row("bass", 20)).unwrap();
    store.append(None, row("keys", 10)).unwrap();
    store.append(Some(&drums), row("kick", 3)).unwrap();
    store.append(Some(&drums), row("snare", 2)).unwrap();
    store.append(Some(&drums), row("hat", 1)).unwrap();
    store.append(Some(&bass), row("sub", 4)).unwrap();
    sorted_by_name(store)
}

#[test]
fn paths_and_iters_round_trip() {
    init_logger();
    let sorted = band();
    let cases: [&[usize]; 6] = [&[0], &[1], &[2], &[1, 0], &[1, 2], &[0, 0]];
    for indices in cases {
        let p = path(indices);
        let iter = sorted.get_iter(&p).unwrap();
        assert_eq!(sorted.get_path(&iter).unwrap(), p);
        assert_eq!(sorted.get_iter(&sorted.get_path(&iter).unwrap()).unwrap(), iter);
    }
    assert_eq!(names(&sorted, None), ["bass", "drums", "keys"]);
    assert_eq!(names_at(&sorted, &[1]), ["hat", "kick", "snare"]);
    assert_consistent(&sorted);
}

#[test]
fn sorted_and_child_coordinates_convert_both_ways() {
    init_logger();
    let sorted = band();

    // hat 是 drums 的第三个子行
    assert_eq!(
        sorted.convert_path_to_child_path(&path(&[1, 0])).unwrap(),
        path(&[0, 2])
    );
    assert_eq!(
        sorted.convert_child_path_to_path(&path(&[0, 2])).unwrap(),
        path(&[1, 0])
    );

    let hat_child = sorted.child().get_iter(&path(&[0, 2])).unwrap();
    let hat = sorted.convert_child_iter_to_iter(&hat_child).unwrap();
    assert_eq!(hat, sorted.get_iter(&path(&[1, 0])).unwrap());
    assert_eq!(sorted.convert_iter_to_child_iter(&hat).unwrap(), hat_child);
    assert_eq!(sorted.get_value(&hat, NAME).unwrap().as_str(), Some("hat"));

    assert!(sorted
        .convert_child_path_to_path(&path(&[2, 0]))
        .unwrap_err()
        .is_not_found());
}

#[test]
fn navigation_walks_siblings_parents_and_children() {
    init_logger();
    let sorted = band();
    let drums = sorted.get_iter(&path(&[1])).unwrap();
    let snare = sorted.get_iter(&path(&[1, 2])).unwrap();

    assert_eq!(sorted.iter_parent(&snare).unwrap(), Some(drums));
    assert_eq!(sorted.iter_parent(&drums).unwrap(), None);
    assert_eq!(sorted.iter_next(&snare).unwrap(), None);
    assert_eq!(sorted.iter_n_children(Some(&drums)).unwrap(), 3);
    assert_eq!(sorted.iter_nth_child(Some(&drums), 3).unwrap(), None);
    assert_eq!(
        sorted.iter_nth_child(Some(&drums), 2).unwrap(),
        Some(snare)
    );

    let keys = sorted.get_iter(&path(&[2])).unwrap();
    assert!(!sorted.iter_has_child(&keys).unwrap());
    assert_eq!(sorted.iter_children(Some(&keys)).unwrap(), None);
    assert!(!sorted.is_materialized(Some(&keys)).unwrap());

    assert!(!sorted.flags().iters_persist);
    assert_eq!(sorted.n_columns(), 2);
}

#[test]
fn lazy_builds_keep_handles_alive_but_edits_do_not() {
    init_logger();
    let mut sorted = band();
    let bass = sorted.get_iter(&path(&[0])).unwrap();
    let generation = sorted.generation();
    assert_eq!(bass.generation(), generation);

    assert_eq!(names_at(&sorted, &[1]), ["hat", "kick", "snare"]);
    assert_eq!(sorted.generation(), generation);
    assert!(sorted.iter_is_valid(&bass));

    sorted
        .edit_child(|store| store.append(None, row("aaa", 0)))
        .unwrap();
    assert!(!sorted.iter_is_valid(&bass));
    assert_eq!(
        sorted.get_path(&bass),
        Err(TreeError::StaleIter {
            issued: generation,
            current: sorted.generation(),
        })
    );
    assert!(matches!(
        sorted.get_value(&bass, NAME),
        Err(TreeError::StaleIter { .. })
    ));
    assert!(matches!(
        sorted.ref_node(&bass),
        Err(TreeError::StaleIter { .. })
    ));
}

#[test]
fn lookups_outside_the_tree_are_not_found() {
    init_logger();
    let sorted = band();
    assert_eq!(
        sorted.get_iter(&TreePath::new()),
        Err(TreeError::PathNotFound(TreePath::new()))
    );
    assert!(sorted.get_iter(&path(&[7])).unwrap_err().is_not_found());
    assert!(sorted.get_iter(&path(&[2, 0])).unwrap_err().is_not_found());
    assert!(sorted.get_iter(&path(&[1, 5])).unwrap_err().is_not_found());
    assert!(sorted
        .convert_path_to_child_path(&path(&[0, 1]))
        .unwrap_err()
        .is_not_found());
}

#[test]
fn clear_cache_keeps_content_and_is_idempotent() {
    init_logger();
    let mut sorted = band();
    let before: Vec<_> = (0..3).map(|i| names_at(&sorted, &[i])).collect();
    assert_eq!(sorted.materialized_levels(), 3);

    let generation = sorted.generation();
    assert_eq!(sorted.clear_cache(), 2);
    assert!(sorted.generation() > generation);
    assert_eq!(sorted.materialized_levels(), 1);

    let settled = sorted.generation();
    assert_eq!(sorted.clear_cache(), 0);
    assert_eq!(sorted.generation(), settled);

    let after: Vec<_> = (0..3).map(|i| names_at(&sorted, &[i])).collect();
    assert_eq!(before, after);
    assert_consistent(&sorted);
}

#[test]
fn sorted_views_stack() {
    init_logger();
    let inner = sorted_by_name(flat_store(&["b", "a", "c"]));
    let mut outer = TreeModelSort::new(inner);
    outer
        .register_sort_func(SIZE, by_column::<TreeModelSort<TreeStore>>(SIZE))
        .unwrap();
    outer
        .set_sort_column(SortColumn::Column(SIZE), SortOrder::Descending)
        .unwrap();
    assert_eq!(names(&outer, None), ["c", "a", "b"]);
    assert_eq!(names(outer.child(), None), ["a", "b", "c"]);

    outer
        .edit_child(|inner| inner.edit_child(|store| store.append(None, row("d", 5))))
        .unwrap();
    assert_eq!(
        outer.take_row_events(),
        vec![RowEvent::RowInserted { path: path(&[0]) }]
    );
    assert_eq!(names(&outer, None), ["d", "c", "a", "b"]);
    assert_eq!(names(outer.child(), None), ["a", "b", "c", "d"]);

    let a = outer.child().child().get_iter(&path(&[1])).unwrap();
    outer
        .edit_child(|inner| {
            inner.edit_child(|store| store.set_value(&a, NAME, "zz".into()))
        })
        .unwrap();
    assert_eq!(
        outer.take_row_events(),
        vec![RowEvent::RowChanged { path: path(&[2]) }]
    );
    assert_eq!(names(&outer, None), ["d", "c", "zz", "b"]);
    assert_eq!(names(outer.child(), None), ["b", "c", "d", "zz"]);

    let zz = outer.get_iter(&path(&[2])).unwrap();
    let inner_zz = outer.convert_iter_to_child_iter(&zz).unwrap();
    assert_eq!(outer.child().get_path(&inner_zz).unwrap(), path(&[3]));
}

#[test]
fn stacked_views_rebuild_together_after_batched_edits() {
    init_logger();
    let inner = sorted_by_name(flat_store(&["b", "a"]));
    let mut outer = TreeModelSort::new(inner);
    assert_eq!(names(&outer, None), ["a", "b"]);

    outer
        .edit_child(|inner| {
            inner.edit_child(|store| {
                store.append(None, row("d", 2))?;
                store.append(None, row("c", 3))
            })
        })
        .unwrap();

    let events = outer.take_row_events();
    assert_eq!(events.len(), 6);
    assert_eq!(events[0], RowEvent::RowDeleted { path: path(&[1]) });
    assert_eq!(events[5], RowEvent::RowInserted { path: path(&[3]) });
    assert_eq!(names(&outer, None), ["a", "b", "c", "d"]);
    assert_consistent(outer.child());
}
