//! 层级构建与排序
//!
//! 这些算法只读取子模型和比较函数注册表，写入传进来的 `SortCache`，
//! 因此可以在 `&self` 导航方法里借助 `RefCell` 延迟构建层级。

use crate::comparator::SortRegistry;
use crate::error::TreeError;
use crate::level::{LevelId, SortCache, SortElt, SortLevel};
use crate::model::TreeModel;
use crate::path::TreePath;
use std::cmp::Ordering;

pub(crate) struct SortContext<'a, M: TreeModel> {
    pub child: &'a M,
    pub sorting: &'a SortRegistry<M>,
    /// 是否在条目里缓存子迭代器
    pub cache_iters: bool,
}

/// 子模型路径在缓存中的解析结果
#[derive(Debug)]
pub(crate) enum Resolved {
    Found {
        level: LevelId,
        index: usize,
        path: TreePath,
    },
    /// 沿途某个层级尚未构建
    NotBuilt,
}

impl<'a, M: TreeModel> SortContext<'a, M> {
    /// 条目对应的子模型迭代器：有缓存就用缓存，否则按 offset 路径重新解析
    pub fn child_iter(
        &self,
        cache: &SortCache<M::Iter>,
        level: LevelId,
        index: usize,
    ) -> Result<M::Iter, TreeError> {
        let elt = cache.elt(level, index).ok_or(TreeError::InvalidIter)?;
        if let Some(iter) = &elt.iter {
            return Ok(iter.clone());
        }
        let path = cache.child_path(level, index).ok_or(TreeError::InvalidIter)?;
        self.child.get_iter(&path)
    }

    /// 为 `parent`（或根）构建层级；没有子行时不创建层级
    pub fn build_level(
        &self,
        cache: &mut SortCache<M::Iter>,
        parent: Option<(LevelId, usize)>,
    ) -> Result<Option<LevelId>, TreeError> {
        let parent_iter = match parent {
            Some((level, index)) => Some(self.child_iter(cache, level, index)?),
            None => None,
        };

        let mut elts = Vec::new();
        let mut next = self.child.iter_children(parent_iter.as_ref())?;
        while let Some(iter) = next {
            next = self.child.iter_next(&iter)?;
            let offset = elts.len();
            elts.push(SortElt::new(offset, self.cache_iters.then_some(iter)));
        }
        if elts.is_empty() {
            return Ok(None);
        }

        let id = cache.attach_level(SortLevel {
            elts,
            ref_count: 0,
            parent,
        });
        self.sort_level(cache, id)?;
        Ok(Some(id))
    }

    pub fn ensure_root(
        &self,
        cache: &mut SortCache<M::Iter>,
    ) -> Result<Option<LevelId>, TreeError> {
        match cache.root() {
            Some(root) => Ok(Some(root)),
            None => self.build_level(cache, None),
        }
    }

    /// 条目的子层级，必要时构建
    pub fn ensure_children(
        &self,
        cache: &mut SortCache<M::Iter>,
        level: LevelId,
        index: usize,
    ) -> Result<Option<LevelId>, TreeError> {
        let elt = cache.elt(level, index).ok_or(TreeError::InvalidIter)?;
        match elt.children {
            Some(children) => Ok(Some(children)),
            None => self.build_level(cache, Some((level, index))),
        }
    }

    /// 比较缓存中的一个条目与候选行
    fn compare_with(
        &self,
        cache: &SortCache<M::Iter>,
        level: LevelId,
        index: usize,
        candidate: (&M::Iter, usize),
    ) -> Result<Ordering, TreeError> {
        let offset = cache.elt(level, index).ok_or(TreeError::InvalidIter)?.offset;
        if self.sorting.is_unsorted() {
            return Ok(offset.cmp(&candidate.1));
        }
        let iter = self.child_iter(cache, level, index)?;
        Ok(self.sorting.compare(self.child, (&iter, offset), candidate))
    }

    /// 按当前比较函数重排一个层级，返回 `new_order`（顺序未变时为 `None`）
    pub fn sort_level(
        &self,
        cache: &mut SortCache<M::Iter>,
        id: LevelId,
    ) -> Result<Option<Vec<usize>>, TreeError> {
        let level = cache.level(id).ok_or(TreeError::InvalidIter)?;
        let len = level.len();
        if len < 2 {
            return Ok(None);
        }
        let offsets: Vec<usize> = level.elts.iter().map(|elt| elt.offset).collect();

        let mut order: Vec<usize> = (0..len).collect();
        if self.sorting.is_unsorted() {
            order.sort_by_key(|&i| offsets[i]);
        } else {
            let iters = (0..len)
                .map(|i| self.child_iter(cache, id, i))
                .collect::<Result<Vec<_>, _>>()?;
            order.sort_by(|&a, &b| {
                self.sorting
                    .compare(self.child, (&iters[a], offsets[a]), (&iters[b], offsets[b]))
            });
        }
        if order.iter().enumerate().all(|(i, &old)| i == old) {
            return Ok(None);
        }

        let level = cache.level_mut(id).ok_or(TreeError::InvalidIter)?;
        let mut old: Vec<Option<SortElt<M::Iter>>> =
            std::mem::take(&mut level.elts).into_iter().map(Some).collect();
        level.elts = order.iter().filter_map(|&i| old[i].take()).collect();
        cache.fix_backrefs(id, 0, len);
        Ok(Some(order))
    }

    /// 递归重排所有已物化层级（父层级先于子层级）
    pub fn sort_all(
        &self,
        cache: &mut SortCache<M::Iter>,
    ) -> Result<Vec<(LevelId, Vec<usize>)>, TreeError> {
        let mut reordered = Vec::new();
        for id in cache.levels_depth_first() {
            if let Some(order) = self.sort_level(cache, id)? {
                reordered.push((id, order));
            }
        }
        Ok(reordered)
    }

    /// 二分查找候选行的插入位置；`skip` 指定的槽位不参与比较，
    /// 返回值是去掉该槽位之后数组中的下标
    pub fn find_insert_position(
        &self,
        cache: &SortCache<M::Iter>,
        level: LevelId,
        candidate: (&M::Iter, usize),
        skip: Option<usize>,
    ) -> Result<usize, TreeError> {
        let len = cache.level(level).ok_or(TreeError::InvalidIter)?.len();
        let skip = skip.filter(|&s| s < len);
        let mut lo = 0;
        let mut hi = len - usize::from(skip.is_some());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let real = match skip {
                Some(s) if mid >= s => mid + 1,
                _ => mid,
            };
            if self.compare_with(cache, level, real, candidate)? == Ordering::Greater {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        Ok(lo)
    }

    /// 条目是否与相邻条目顺序颠倒
    pub fn is_out_of_place(
        &self,
        cache: &SortCache<M::Iter>,
        level: LevelId,
        index: usize,
    ) -> Result<bool, TreeError> {
        let len = cache.level(level).ok_or(TreeError::InvalidIter)?.len();
        let offset = cache.elt(level, index).ok_or(TreeError::InvalidIter)?.offset;
        let iter = self.child_iter(cache, level, index)?;
        if index > 0
            && self.compare_with(cache, level, index - 1, (&iter, offset))? == Ordering::Greater
        {
            return Ok(true);
        }
        if index + 1 < len
            && self.compare_with(cache, level, index + 1, (&iter, offset))? == Ordering::Less
        {
            return Ok(true);
        }
        Ok(false)
    }

    /// 在缓存中查找子模型路径，`build` 为真时沿途构建缺失的层级
    pub fn resolve_child_path(
        &self,
        cache: &mut SortCache<M::Iter>,
        child_path: &TreePath,
        build: bool,
    ) -> Result<Resolved, TreeError> {
        let not_found = || TreeError::PathNotFound(child_path.clone());
        let indices = child_path.indices();
        if indices.is_empty() {
            return Err(not_found());
        }

        let mut level = match cache.root() {
            Some(root) => root,
            None if build => self.ensure_root(cache)?.ok_or_else(not_found)?,
            None => return Ok(Resolved::NotBuilt),
        };
        let mut path = TreePath::new();
        for (depth, &offset) in indices.iter().enumerate() {
            let index = cache
                .level(level)
                .and_then(|l| l.position_of_offset(offset))
                .ok_or_else(not_found)?;
            path.append_index(index);
            if depth + 1 == indices.len() {
                return Ok(Resolved::Found { level, index, path });
            }
            level = match cache.elt(level, index).and_then(|elt| elt.children) {
                Some(children) => children,
                None if build => self
                    .build_level(cache, Some((level, index)))?
                    .ok_or_else(not_found)?,
                None => return Ok(Resolved::NotBuilt),
            };
        }
        Err(not_found())
    }
}

/// 把 `from` 处的条目移到 `to` 之后的排列
pub(crate) fn moved_order(len: usize, from: usize, to: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    let moved = order.remove(from);
    order.insert(to, moved);
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moved_order_maps_new_positions_to_old() {
        assert_eq!(moved_order(4, 0, 3), vec![1, 2, 3, 0]);
        assert_eq!(moved_order(4, 3, 1), vec![0, 3, 1, 2]);
        assert_eq!(moved_order(3, 1, 1), vec![0, 1, 2]);
    }
}
