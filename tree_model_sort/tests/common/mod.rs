#![allow(dead_code)]

use std::cmp::Ordering;
use tree_model_sort::{
    by_column, SortColumn, SortIter, SortOrder, TreeModel, TreeModelSort, TreePath, TreeStore,
    Value, ValueKind,
};

pub const NAME: usize = 0;
pub const SIZE: usize = 1;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn path(indices: &[usize]) -> TreePath {
    TreePath::from_indices(indices.to_vec())
}

pub fn row(name: &str, size: i64) -> Vec<Value> {
    vec![Value::from(name), Value::Int(size)]
}

pub fn columns() -> Vec<ValueKind> {
    vec![ValueKind::Text, ValueKind::Int]
}

/// 顶层平铺的存储，size 依次为 0, 1, 2...
pub fn flat_store(names: &[&str]) -> TreeStore {
    let mut store = TreeStore::new(columns());
    for (size, name) in names.iter().enumerate() {
        store.append(None, row(name, size as i64)).unwrap();
    }
    store
}

/// 两列都注册了 `by_column` 比较函数的适配器
pub fn sortable(store: TreeStore) -> TreeModelSort<TreeStore> {
    let mut sorted = TreeModelSort::new(store);
    sorted.register_sort_func(NAME, by_column::<TreeStore>(NAME)).unwrap();
    sorted.register_sort_func(SIZE, by_column::<TreeStore>(SIZE)).unwrap();
    sorted
}

pub fn sorted_by_name(store: TreeStore) -> TreeModelSort<TreeStore> {
    let mut sorted = sortable(store);
    sorted
        .set_sort_column(SortColumn::Column(NAME), SortOrder::Ascending)
        .unwrap();
    sorted
}

/// 某个父行下所有行的迭代器，按视图顺序
pub fn level_iters<M: TreeModel>(model: &M, parent: Option<&M::Iter>) -> Vec<M::Iter> {
    let mut iters = Vec::new();
    let mut next = model.iter_children(parent).unwrap();
    while let Some(iter) = next {
        next = model.iter_next(&iter).unwrap();
        iters.push(iter);
    }
    iters
}

/// 某个父行下所有行的名字，按视图顺序
pub fn names<M: TreeModel>(model: &M, parent: Option<&M::Iter>) -> Vec<String> {
    level_iters(model, parent)
        .iter()
        .map(|iter| model.get_value(iter, NAME).unwrap().to_string())
        .collect()
}

pub fn names_at<M: TreeModel>(model: &M, parent: &[usize]) -> Vec<String> {
    if parent.is_empty() {
        return names(model, None);
    }
    let parent = model.get_iter(&path(parent)).unwrap();
    names(model, Some(&parent))
}

/// 遍历所有已物化层级，检查顺序、offset 与数据是否与子模型一致
pub fn assert_consistent(sorted: &TreeModelSort<TreeStore>) {
    if sorted.is_materialized(None).unwrap() {
        check_level(sorted, None);
    }
}

fn check_level(sorted: &TreeModelSort<TreeStore>, parent: Option<&SortIter>) {
    let child = sorted.child();
    let child_parent = parent.map(|iter| sorted.convert_iter_to_child_iter(iter).unwrap());
    let expected = child.iter_n_children(child_parent.as_ref()).unwrap();

    let iters = level_iters(sorted, parent);
    assert_eq!(iters.len(), expected, "level under {:?} has wrong length", parent);

    let mut rows = Vec::new();
    for iter in &iters {
        let sorted_path = sorted.get_path(iter).unwrap();
        let offset = sorted
            .convert_path_to_child_path(&sorted_path)
            .unwrap()
            .last()
            .unwrap();
        let child_iter = sorted.convert_iter_to_child_iter(iter).unwrap();
        assert_eq!(child.get_path(&child_iter).unwrap().last(), Some(offset));

        let values: Vec<Value> = (0..child.n_columns())
            .map(|column| sorted.get_value(iter, column).unwrap())
            .collect();
        for (column, value) in values.iter().enumerate() {
            assert_eq!(value, &child.get_value(&child_iter, column).unwrap());
        }
        rows.push((offset, values));
    }

    let (column, order) = sorted.sort_column();
    for pair in rows.windows(2) {
        let ((a_offset, a), (b_offset, b)) = (&pair[0], &pair[1]);
        let ordering = match column {
            SortColumn::Column(c) => order
                .apply(a[c].natural_cmp(&b[c]))
                .then(a_offset.cmp(b_offset)),
            _ => a_offset.cmp(b_offset),
        };
        assert_eq!(ordering, Ordering::Less, "rows out of order: {:?}", rows);
    }

    let mut offsets: Vec<usize> = rows.iter().map(|(offset, _)| *offset).collect();
    offsets.sort_unstable();
    assert_eq!(offsets, (0..expected).collect::<Vec<_>>());

    for iter in &iters {
        if sorted.is_materialized(Some(iter)).unwrap() {
            check_level(sorted, Some(iter));
        }
    }
}
