//! 错误类型
//!
//! 查找失败（路径不存在、迭代器过期）属于常规结果；配置错误在引入它的调用处被拒绝；
//! 子模型事件与缓存不一致则视为协作方违约。

use crate::model::ValueKind;
use crate::path::TreePath;

/// 树模型及排序适配器的所有错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TreeError {
    #[error("path {0} does not name a row")]
    PathNotFound(TreePath),

    #[error("iterator is stale (issued at generation {issued}, model is at {current})")]
    StaleIter { issued: u64, current: u64 },

    #[error("iterator does not reference a live row")]
    InvalidIter,

    #[error("column {column} is out of range (model has {n_columns} columns)")]
    ColumnOutOfRange { column: usize, n_columns: usize },

    #[error("no sort function registered for column {0}")]
    NoSortFunc(usize),

    #[error("row holds no reference to release")]
    NotReferenced,

    #[error("column {column} expects {expected:?}, got {found:?}")]
    TypeMismatch {
        column: usize,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("new order of length {len} is not a permutation of {expected} rows")]
    InvalidPermutation { len: usize, expected: usize },

    #[error("malformed path string {0:?}")]
    MalformedPath(String),

    #[error("child model event is inconsistent with the cached tree: {0}")]
    ChildInconsistent(String),
}

impl TreeError {
    /// 是否为“未找到”类的常规查找失败
    pub fn is_not_found(&self) -> bool {
        matches!(self, TreeError::PathNotFound(_) | TreeError::InvalidIter)
    }
}
