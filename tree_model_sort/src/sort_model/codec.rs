//! 路径与迭代器转换
//!
//! 排序视图路径由各层级的数组下标组成；子模型路径由各条目的 offset 组成。

use super::build::Resolved;
use super::{SortIter, TreeModelSort};
use crate::error::TreeError;
use crate::model::TreeModel;
use crate::path::TreePath;

impl<M: TreeModel> TreeModelSort<M> {
    /// 从根向下查找，沿途按需构建层级
    pub(crate) fn path_to_iter(&self, path: &TreePath) -> Result<SortIter, TreeError> {
        let not_found = || TreeError::PathNotFound(path.clone());
        let indices = path.indices();
        if indices.is_empty() {
            return Err(not_found());
        }

        let mut cache = self.cache.borrow_mut();
        let ctx = self.ctx();
        let mut level = ctx.ensure_root(&mut cache)?.ok_or_else(not_found)?;
        for (depth, &index) in indices.iter().enumerate() {
            let len = cache.level(level).map_or(0, |l| l.len());
            if index >= len {
                return Err(not_found());
            }
            if depth + 1 == indices.len() {
                return Ok(self.make_iter(level, index));
            }
            level = ctx
                .ensure_children(&mut cache, level, index)?
                .ok_or_else(not_found)?;
        }
        Err(not_found())
    }

    /// 沿父层级反向引用向上拼出路径
    pub(crate) fn iter_to_path(&self, iter: &SortIter) -> Result<TreePath, TreeError> {
        let cache = self.cache.borrow();
        self.check_iter(&cache, iter)?;
        cache
            .elt_path(iter.level, iter.index)
            .ok_or(TreeError::InvalidIter)
    }

    /// 排序视图迭代器对应的子模型迭代器
    pub fn convert_iter_to_child_iter(&self, iter: &SortIter) -> Result<M::Iter, TreeError> {
        let cache = self.cache.borrow();
        self.check_iter(&cache, iter)?;
        self.ctx().child_iter(&cache, iter.level, iter.index)
    }

    /// 排序视图路径对应的子模型路径
    pub fn convert_path_to_child_path(&self, path: &TreePath) -> Result<TreePath, TreeError> {
        let iter = self.path_to_iter(path)?;
        let cache = self.cache.borrow();
        cache
            .child_path(iter.level, iter.index)
            .ok_or_else(|| TreeError::PathNotFound(path.clone()))
    }

    /// 子模型路径对应的排序视图路径，沿途按需构建层级
    pub fn convert_child_path_to_path(&self, child_path: &TreePath) -> Result<TreePath, TreeError> {
        let mut cache = self.cache.borrow_mut();
        match self.ctx().resolve_child_path(&mut cache, child_path, true)? {
            Resolved::Found { path, .. } => Ok(path),
            Resolved::NotBuilt => Err(TreeError::PathNotFound(child_path.clone())),
        }
    }

    /// 子模型迭代器对应的排序视图迭代器
    pub fn convert_child_iter_to_iter(&self, child_iter: &M::Iter) -> Result<SortIter, TreeError> {
        let child_path = self.child.get_path(child_iter)?;
        let mut cache = self.cache.borrow_mut();
        match self.ctx().resolve_child_path(&mut cache, &child_path, true)? {
            Resolved::Found { level, index, .. } => Ok(self.make_iter(level, index)),
            Resolved::NotBuilt => Err(TreeError::PathNotFound(child_path)),
        }
    }

    /// 迭代器是否仍然指向一行（代数匹配且条目存在）
    pub fn iter_is_valid(&self, iter: &SortIter) -> bool {
        self.check_iter(&self.cache.borrow(), iter).is_ok()
    }
}
