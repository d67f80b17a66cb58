//! 树模型接口
//!
//! `TreeModel` 既是排序适配器消费的子模型契约，也是适配器自身对外暴露的接口，
//! 因此适配器可以再作为下一层的数据源。

use crate::error::TreeError;
use crate::path::TreePath;
use std::cmp::Ordering;
use std::fmt;

/// 单元格的值
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// 列类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Empty,
    Bool,
    Int,
    Float,
    Text,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Empty => ValueKind::Empty,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Text(_) => ValueKind::Text,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// 自然顺序：空值最前，数字之间按数值比较，其余按类型分组
    pub fn natural_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Empty => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Text(_) => 3,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// 模型能力标志
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModelFlags {
    /// 结构性修改之后，模型自己的迭代器仍然有效
    pub iters_persist: bool,
    /// 模型是平铺列表，没有子行
    pub list_only: bool,
}

/// 五种行变更通知
///
/// `RowsReordered` 的排列约定为 `new_order[新位置] = 旧位置`。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowEvent {
    RowChanged { path: TreePath },
    RowInserted { path: TreePath },
    RowDeleted { path: TreePath },
    RowHasChildToggled { path: TreePath },
    RowsReordered { path: TreePath, new_order: Vec<usize> },
}

impl RowEvent {
    pub fn path(&self) -> &TreePath {
        match self {
            RowEvent::RowChanged { path }
            | RowEvent::RowInserted { path }
            | RowEvent::RowDeleted { path }
            | RowEvent::RowHasChildToggled { path }
            | RowEvent::RowsReordered { path, .. } => path,
        }
    }
}

/// `new_order` 是否是 `0..len` 的一个排列
pub(crate) fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    order.iter().all(|&index| {
        index < len && !std::mem::replace(&mut seen[index], true)
    })
}

/// 会积累变更通知的模型
pub trait RowEventSource {
    /// 按发出顺序取走所有尚未处理的通知
    fn take_row_events(&mut self) -> Vec<RowEvent>;
}

/// 层级数据源
///
/// 导航方法只需要 `&self`；需要延迟构建内部状态的实现（例如排序适配器）
/// 使用内部可变性。
pub trait TreeModel {
    /// 模型自己的不透明行句柄
    type Iter: Clone + fmt::Debug;

    fn flags(&self) -> ModelFlags;

    fn n_columns(&self) -> usize;

    fn column_type(&self, column: usize) -> Option<ValueKind>;

    fn get_iter(&self, path: &TreePath) -> Result<Self::Iter, TreeError>;

    fn get_path(&self, iter: &Self::Iter) -> Result<TreePath, TreeError>;

    fn get_value(&self, iter: &Self::Iter, column: usize) -> Result<Value, TreeError>;

    /// 下一个兄弟行
    fn iter_next(&self, iter: &Self::Iter) -> Result<Option<Self::Iter>, TreeError>;

    /// 第一个子行；`None` 表示根
    fn iter_children(&self, parent: Option<&Self::Iter>) -> Result<Option<Self::Iter>, TreeError> {
        self.iter_nth_child(parent, 0)
    }

    fn iter_has_child(&self, iter: &Self::Iter) -> Result<bool, TreeError>;

    fn iter_n_children(&self, parent: Option<&Self::Iter>) -> Result<usize, TreeError>;

    fn iter_nth_child(
        &self,
        parent: Option<&Self::Iter>,
        n: usize,
    ) -> Result<Option<Self::Iter>, TreeError>;

    fn iter_parent(&self, child: &Self::Iter) -> Result<Option<Self::Iter>, TreeError>;

    /// 声明对某行的兴趣（用于缓存回收），不是锁
    fn ref_node(&self, _iter: &Self::Iter) -> Result<(), TreeError> {
        Ok(())
    }

    fn unref_node(&self, _iter: &Self::Iter) -> Result<(), TreeError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_order_within_kinds() {
        assert_eq!(Value::from("a").natural_cmp(&Value::from("b")), Ordering::Less);
        assert_eq!(Value::Int(3).natural_cmp(&Value::Int(3)), Ordering::Equal);
        assert_eq!(Value::Int(2).natural_cmp(&Value::Float(2.5)), Ordering::Less);
        assert_eq!(Value::Float(-0.5).natural_cmp(&Value::Int(-1)), Ordering::Greater);
    }

    #[test]
    fn natural_order_across_kinds() {
        assert_eq!(Value::Empty.natural_cmp(&Value::Bool(false)), Ordering::Less);
        assert_eq!(Value::Text(String::new()).natural_cmp(&Value::Int(9)), Ordering::Greater);
        assert_eq!(Value::Empty.natural_cmp(&Value::Empty), Ordering::Equal);
    }

    #[test]
    fn event_path_accessor() {
        let event = RowEvent::RowsReordered {
            path: TreePath::from_indices(vec![1]),
            new_order: vec![1, 0],
        };
        assert_eq!(event.path().indices(), &[1]);
        assert_eq!(Value::Int(42).to_string(), "42");
    }

    #[test]
    fn permutation_check() {
        assert!(is_permutation(&[1, 2, 0], 3));
        assert!(!is_permutation(&[1, 1, 0], 3));
        assert!(!is_permutation(&[0, 3, 1], 3));
        assert!(!is_permutation(&[0], 2));
        assert!(is_permutation(&[], 0));
    }
}
