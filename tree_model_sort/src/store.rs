//! 内存树存储
//!
//! 一个简单的层级数据源，供排序适配器测试和演示使用。
//! 每个节点有稳定的 id，节点存在期间它的迭代器一直有效。
//! 每次修改都会把对应的行通知放入待处理队列，通过 `take_row_events` 取走。

use crate::error::TreeError;
use crate::model::{
    is_permutation, ModelFlags, RowEvent, RowEventSource, TreeModel, Value, ValueKind,
};
use crate::path::TreePath;
use std::collections::HashMap;

/// 存储节点的迭代器
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreIter(u64);

#[derive(Clone, Debug)]
struct StoreNode {
    values: Vec<Value>,
    parent: Option<u64>,
    children: Vec<u64>,
}

#[derive(Debug)]
pub struct TreeStore {
    columns: Vec<ValueKind>,
    nodes: HashMap<u64, StoreNode>,
    roots: Vec<u64>,
    next_id: u64,
    flags: ModelFlags,
    pending_events: Vec<RowEvent>,
}

impl TreeStore {
    /// 迭代器持久的存储
    pub fn new(columns: Vec<ValueKind>) -> Self {
        Self::with_flags(
            columns,
            ModelFlags {
                iters_persist: true,
                list_only: false,
            },
        )
    }

    /// 不承诺迭代器持久的存储（适配器每次都要按路径重新解析）
    pub fn volatile(columns: Vec<ValueKind>) -> Self {
        Self::with_flags(columns, ModelFlags::default())
    }

    pub fn with_flags(columns: Vec<ValueKind>, flags: ModelFlags) -> Self {
        Self {
            columns,
            nodes: HashMap::new(),
            roots: Vec::new(),
            next_id: 1,
            flags,
            pending_events: Vec::new(),
        }
    }

    /// 总行数（所有层级）
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 在 `parent` 下第 `position` 个位置插入一行；位置越界时追加到末尾
    pub fn insert(
        &mut self,
        parent: Option<&StoreIter>,
        position: usize,
        values: Vec<Value>,
    ) -> Result<StoreIter, TreeError> {
        self.check_row(&values)?;
        if self.flags.list_only && parent.is_some() {
            return Err(TreeError::InvalidIter);
        }
        let parent_id = match parent {
            Some(iter) => Some(self.node(iter)?.0),
            None => None,
        };

        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(
            id,
            StoreNode {
                values,
                parent: parent_id,
                children: Vec::new(),
            },
        );

        let siblings = self.siblings_mut(parent_id)?;
        let position = position.min(siblings.len());
        siblings.insert(position, id);
        let first_child = siblings.len() == 1;

        let path = self.path_of(id)?;
        self.pending_events.push(RowEvent::RowInserted { path });
        if let (Some(parent_id), true) = (parent_id, first_child) {
            let path = self.path_of(parent_id)?;
            self.pending_events.push(RowEvent::RowHasChildToggled { path });
        }
        Ok(StoreIter(id))
    }

    pub fn append(
        &mut self,
        parent: Option<&StoreIter>,
        values: Vec<Value>,
    ) -> Result<StoreIter, TreeError> {
        self.insert(parent, usize::MAX, values)
    }

    /// 删除一行及其整个子树
    pub fn remove(&mut self, iter: &StoreIter) -> Result<(), TreeError> {
        let (id, node) = self.node(iter)?;
        let parent_id = node.parent;
        let path = self.path_of(id)?;

        let siblings = self.siblings_mut(parent_id)?;
        siblings.retain(|&sibling| sibling != id);
        let now_childless = siblings.is_empty();

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
            }
        }

        self.pending_events.push(RowEvent::RowDeleted { path });
        if let (Some(parent_id), true) = (parent_id, now_childless) {
            let path = self.path_of(parent_id)?;
            self.pending_events.push(RowEvent::RowHasChildToggled { path });
        }
        Ok(())
    }

    pub fn set_value(
        &mut self,
        iter: &StoreIter,
        column: usize,
        value: Value,
    ) -> Result<(), TreeError> {
        self.check_value(column, &value)?;
        let id = self.node(iter)?.0;
        if let Some(node) = self.nodes.get_mut(&id) {
            node.values[column] = value;
        }
        let path = self.path_of(id)?;
        self.pending_events.push(RowEvent::RowChanged { path });
        Ok(())
    }

    /// 重排 `parent` 的子行，`new_order[新位置] = 旧位置`
    pub fn reorder(
        &mut self,
        parent: Option<&StoreIter>,
        new_order: &[usize],
    ) -> Result<(), TreeError> {
        let parent_id = match parent {
            Some(iter) => Some(self.node(iter)?.0),
            None => None,
        };
        let siblings = self.siblings_mut(parent_id)?;
        if !is_permutation(new_order, siblings.len()) {
            return Err(TreeError::InvalidPermutation {
                len: new_order.len(),
                expected: siblings.len(),
            });
        }
        let reordered: Vec<u64> = new_order.iter().map(|&old| siblings[old]).collect();
        *siblings = reordered;

        let path = match parent_id {
            Some(id) => self.path_of(id)?,
            None => TreePath::new(),
        };
        self.pending_events.push(RowEvent::RowsReordered {
            path,
            new_order: new_order.to_vec(),
        });
        Ok(())
    }

    fn check_row(&self, values: &[Value]) -> Result<(), TreeError> {
        if values.len() != self.columns.len() {
            return Err(TreeError::ColumnOutOfRange {
                column: values.len(),
                n_columns: self.columns.len(),
            });
        }
        values
            .iter()
            .enumerate()
            .try_for_each(|(column, value)| self.check_value(column, value))
    }

    fn check_value(&self, column: usize, value: &Value) -> Result<(), TreeError> {
        let expected = *self.columns.get(column).ok_or(TreeError::ColumnOutOfRange {
            column,
            n_columns: self.columns.len(),
        })?;
        let found = value.kind();
        if found != expected && found != ValueKind::Empty {
            return Err(TreeError::TypeMismatch {
                column,
                expected,
                found,
            });
        }
        Ok(())
    }

    fn node(&self, iter: &StoreIter) -> Result<(u64, &StoreNode), TreeError> {
        self.nodes
            .get(&iter.0)
            .map(|node| (iter.0, node))
            .ok_or(TreeError::InvalidIter)
    }

    fn siblings(&self, parent: Option<u64>) -> Result<&Vec<u64>, TreeError> {
        match parent {
            Some(id) => self
                .nodes
                .get(&id)
                .map(|node| &node.children)
                .ok_or(TreeError::InvalidIter),
            None => Ok(&self.roots),
        }
    }

    fn siblings_mut(&mut self, parent: Option<u64>) -> Result<&mut Vec<u64>, TreeError> {
        match parent {
            Some(id) => self
                .nodes
                .get_mut(&id)
                .map(|node| &mut node.children)
                .ok_or(TreeError::InvalidIter),
            None => Ok(&mut self.roots),
        }
    }

    fn path_of(&self, id: u64) -> Result<TreePath, TreeError> {
        let mut path = TreePath::new();
        let mut current = id;
        loop {
            let node = self.nodes.get(&current).ok_or(TreeError::InvalidIter)?;
            let index = self
                .siblings(node.parent)?
                .iter()
                .position(|&sibling| sibling == current)
                .ok_or(TreeError::InvalidIter)?;
            path.prepend_index(index);
            match node.parent {
                Some(parent) => current = parent,
                None => return Ok(path),
            }
        }
    }
}

impl RowEventSource for TreeStore {
    fn take_row_events(&mut self) -> Vec<RowEvent> {
        std::mem::take(&mut self.pending_events)
    }
}

impl TreeModel for TreeStore {
    type Iter = StoreIter;

    fn flags(&self) -> ModelFlags {
        self.flags
    }

    fn n_columns(&self) -> usize {
        self.columns.len()
    }

    fn column_type(&self, column: usize) -> Option<ValueKind> {
        self.columns.get(column).copied()
    }

    fn get_iter(&self, path: &TreePath) -> Result<StoreIter, TreeError> {
        let not_found = || TreeError::PathNotFound(path.clone());
        let mut parent = None;
        let mut found = None;
        for &index in path.indices() {
            let id = *self
                .siblings(parent)?
                .get(index)
                .ok_or_else(not_found)?;
            parent = Some(id);
            found = Some(id);
        }
        found.map(StoreIter).ok_or_else(not_found)
    }

    fn get_path(&self, iter: &StoreIter) -> Result<TreePath, TreeError> {
        self.path_of(self.node(iter)?.0)
    }

    fn get_value(&self, iter: &StoreIter, column: usize) -> Result<Value, TreeError> {
        let (_, node) = self.node(iter)?;
        node.values
            .get(column)
            .cloned()
            .ok_or(TreeError::ColumnOutOfRange {
                column,
                n_columns: self.columns.len(),
            })
    }

    fn iter_next(&self, iter: &StoreIter) -> Result<Option<StoreIter>, TreeError> {
        let (id, node) = self.node(iter)?;
        let siblings = self.siblings(node.parent)?;
        let index = siblings
            .iter()
            .position(|&sibling| sibling == id)
            .ok_or(TreeError::InvalidIter)?;
        Ok(siblings.get(index + 1).copied().map(StoreIter))
    }

    fn iter_has_child(&self, iter: &StoreIter) -> Result<bool, TreeError> {
        Ok(!self.node(iter)?.1.children.is_empty())
    }

    fn iter_n_children(&self, parent: Option<&StoreIter>) -> Result<usize, TreeError> {
        match parent {
            Some(iter) => Ok(self.node(iter)?.1.children.len()),
            None => Ok(self.roots.len()),
        }
    }

    fn iter_nth_child(
        &self,
        parent: Option<&StoreIter>,
        n: usize,
    ) -> Result<Option<StoreIter>, TreeError> {
        let siblings = match parent {
            Some(iter) => &self.node(iter)?.1.children,
            None => &self.roots,
        };
        Ok(siblings.get(n).copied().map(StoreIter))
    }

    fn iter_parent(&self, child: &StoreIter) -> Result<Option<StoreIter>, TreeError> {
        Ok(self.node(child)?.1.parent.map(StoreIter))
    }
}
