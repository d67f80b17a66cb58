//! # tree_model_sort
//!
//! 在任意层级数据源之上提供延迟构建、增量维护的排序视图。
//!
//! ## 功能特性
//!
//! - **延迟构建**：只有被访问过的父行才会物化出排序好的层级
//! - **增量维护**：子模型的插入、删除、修改、重排通知被逐条应用到缓存，
//!   并以排序视图坐标重新发出
//! - **可替换的比较函数**：按列注册比较函数，支持默认函数与恢复原始顺序
//! - **句柄失效检测**：迭代器携带代数，结构变化后使用旧迭代器会得到错误而不是错误的数据
//! - **缓存回收**：未被固定的层级可以随时清扫，之后按需重建
//! - **可叠加**：排序视图自身也是一个 `TreeModel`
//!
//! ## 基本使用
//!
//! ```rust
//! use tree_model_sort::{by_column, SortColumn, SortOrder, TreeModel, TreeModelSort, TreePath, TreeStore, ValueKind};
//!
//! let mut store = TreeStore::new(vec![ValueKind::Text]);
//! for name in ["b", "c", "a"] {
//!     store.append(None, vec![name.into()]).unwrap();
//! }
//!
//! let mut sorted = TreeModelSort::new(store);
//! sorted.register_sort_func(0, by_column::<TreeStore>(0)).unwrap();
//! sorted.set_sort_column(SortColumn::Column(0), SortOrder::Ascending).unwrap();
//!
//! let first = sorted.get_iter(&TreePath::from_indices(vec![0])).unwrap();
//! assert_eq!(sorted.get_value(&first, 0).unwrap().as_str(), Some("a"));
//!
//! // 修改子模型后中继通知
//! sorted
//!     .edit_child(|store| store.append(None, vec!["0".into()]))
//!     .unwrap();
//! let first = sorted.get_iter(&TreePath::from_indices(vec![0])).unwrap();
//! assert_eq!(sorted.get_value(&first, 0).unwrap().as_str(), Some("0"));
//! ```

mod comparator;
mod error;
mod level;
mod model;
mod options;
mod path;
mod sort_model;
mod store;

pub use comparator::{by_column, SortColumn, SortFunc, SortOrder};
pub use error::TreeError;
pub use model::{ModelFlags, RowEvent, RowEventSource, TreeModel, Value, ValueKind};
pub use options::SortModelOptions;
pub use path::TreePath;
pub use sort_model::{ListenerId, SortIter, SortModelEvent, TreeModelSort};
pub use store::{StoreIter, TreeStore};
