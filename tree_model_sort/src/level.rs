//! 层级缓存
//!
//! 每个已访问过的父行对应一个 `SortLevel`，存放按当前比较函数排好序的 `SortElt` 数组。
//! 所有层级由 `SortCache` 这个 arena 独占，条目之间用 `LevelId` 互相引用。
//!
//! 回收不再逐次维护计数：被固定（ref_count > 0）的层级记录在 `pinned` 集合里，
//! 清扫时只保留根、被固定的层级以及它们的祖先。

use crate::path::TreePath;
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct LevelId(usize);

/// 一行缓存条目
#[derive(Debug)]
pub(crate) struct SortElt<I> {
    /// 在子模型兄弟行中的位置
    pub offset: usize,
    /// 子模型迭代器（仅在子模型声明迭代器持久时保存）
    pub iter: Option<I>,
    pub children: Option<LevelId>,
    pub ref_count: usize,
}

impl<I> SortElt<I> {
    pub fn new(offset: usize, iter: Option<I>) -> Self {
        Self {
            offset,
            iter,
            children: None,
            ref_count: 0,
        }
    }
}

/// 同一父行下的有序兄弟数组
#[derive(Debug)]
pub(crate) struct SortLevel<I> {
    pub elts: Vec<SortElt<I>>,
    /// 本层所有条目 ref_count 之和
    pub ref_count: usize,
    /// 父层级以及父条目在其中的数组下标；根层级为 `None`
    pub parent: Option<(LevelId, usize)>,
}

impl<I> SortLevel<I> {
    pub fn len(&self) -> usize {
        self.elts.len()
    }

    /// 线性查找给定 offset 的条目下标
    pub fn position_of_offset(&self, offset: usize) -> Option<usize> {
        self.elts.iter().position(|elt| elt.offset == offset)
    }
}

#[derive(Debug)]
pub(crate) struct SortCache<I> {
    levels: Vec<Option<SortLevel<I>>>,
    free_slots: Vec<usize>,
    root: Option<LevelId>,
    pinned: BTreeSet<LevelId>,
}

impl<I> Default for SortCache<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> SortCache<I> {
    pub fn new() -> Self {
        Self {
            levels: Vec::new(),
            free_slots: Vec::new(),
            root: None,
            pinned: BTreeSet::new(),
        }
    }

    pub fn root(&self) -> Option<LevelId> {
        self.root
    }

    pub fn level(&self, id: LevelId) -> Option<&SortLevel<I>> {
        self.levels.get(id.0).and_then(Option::as_ref)
    }

    pub fn level_mut(&mut self, id: LevelId) -> Option<&mut SortLevel<I>> {
        self.levels.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn elt(&self, id: LevelId, index: usize) -> Option<&SortElt<I>> {
        self.level(id).and_then(|level| level.elts.get(index))
    }

    pub fn elt_mut(&mut self, id: LevelId, index: usize) -> Option<&mut SortElt<I>> {
        self.level_mut(id).and_then(|level| level.elts.get_mut(index))
    }

    /// 已物化的层级数
    pub fn len(&self) -> usize {
        self.levels.len() - self.free_slots.len()
    }

    /// 把新层级放入 arena，并挂到父条目（或根）上
    pub fn attach_level(&mut self, level: SortLevel<I>) -> LevelId {
        let parent = level.parent;
        let id = match self.free_slots.pop() {
            Some(slot) => {
                self.levels[slot] = Some(level);
                LevelId(slot)
            }
            None => {
                self.levels.push(Some(level));
                LevelId(self.levels.len() - 1)
            }
        };
        match parent {
            Some((parent_level, parent_index)) => {
                if let Some(elt) = self.elt_mut(parent_level, parent_index) {
                    elt.children = Some(id);
                }
            }
            None => self.root = Some(id),
        }
        log::debug!("built level {:?} under {:?}", id, parent);
        id
    }

    /// 递归释放层级及其所有后代，返回释放的层级数
    pub fn free_level(&mut self, id: LevelId) -> usize {
        let Some(level) = self.levels.get_mut(id.0).and_then(Option::take) else {
            return 0;
        };
        self.free_slots.push(id.0);
        self.pinned.remove(&id);

        let mut freed = 1;
        for elt in &level.elts {
            if let Some(children) = elt.children {
                freed += self.free_level(children);
            }
        }

        match level.parent {
            Some((parent_level, parent_index)) => {
                if let Some(elt) = self.elt_mut(parent_level, parent_index) {
                    if elt.children == Some(id) {
                        elt.children = None;
                    }
                }
            }
            None => {
                if self.root == Some(id) {
                    self.root = None;
                }
            }
        }
        freed
    }

    /// 丢弃全部缓存
    pub fn clear(&mut self) -> usize {
        let count = self.len();
        self.levels.clear();
        self.free_slots.clear();
        self.pinned.clear();
        self.root = None;
        count
    }

    /// 同步 `[from, to)` 范围内条目的子层级反向引用
    pub fn fix_backrefs(&mut self, id: LevelId, from: usize, to: usize) {
        let children: Vec<(usize, LevelId)> = match self.level(id) {
            Some(level) => level.elts[from.min(level.len())..to.min(level.len())]
                .iter()
                .enumerate()
                .filter_map(|(i, elt)| elt.children.map(|c| (from + i, c)))
                .collect(),
            None => return,
        };
        for (index, child) in children {
            if let Some(level) = self.level_mut(child) {
                level.parent = Some((id, index));
            }
        }
    }

    /// 层级在排序视图中的路径（其父行的路径；根层级为空路径）
    pub fn level_path(&self, id: LevelId) -> Option<TreePath> {
        let mut path = TreePath::new();
        let mut current = self.level(id)?;
        while let Some((parent_level, parent_index)) = current.parent {
            path.prepend_index(parent_index);
            current = self.level(parent_level)?;
        }
        Some(path)
    }

    /// 条目在排序视图中的路径
    pub fn elt_path(&self, id: LevelId, index: usize) -> Option<TreePath> {
        let mut path = self.level_path(id)?;
        path.append_index(index);
        Some(path)
    }

    /// 条目在子模型中的路径：把沿途每个数组下标替换为对应条目的 offset
    pub fn child_path(&self, id: LevelId, index: usize) -> Option<TreePath> {
        let mut path = TreePath::new();
        let mut level_id = id;
        let mut elt_index = index;
        loop {
            let level = self.level(level_id)?;
            path.prepend_index(level.elts.get(elt_index)?.offset);
            match level.parent {
                Some((parent_level, parent_index)) => {
                    level_id = parent_level;
                    elt_index = parent_index;
                }
                None => return Some(path),
            }
        }
    }

    /// 固定一行：条目与所在层级的计数加一
    pub fn pin(&mut self, id: LevelId, index: usize) -> bool {
        let Some(level) = self.level_mut(id) else {
            return false;
        };
        let Some(elt) = level.elts.get_mut(index) else {
            return false;
        };
        elt.ref_count += 1;
        level.ref_count += 1;
        self.pinned.insert(id);
        true
    }

    /// 解除固定；该行没有引用时返回 `false`
    pub fn unpin(&mut self, id: LevelId, index: usize) -> bool {
        let Some(level) = self.level_mut(id) else {
            return false;
        };
        let Some(elt) = level.elts.get_mut(index) else {
            return false;
        };
        if elt.ref_count == 0 {
            return false;
        }
        elt.ref_count -= 1;
        level.ref_count -= 1;
        if level.ref_count == 0 {
            self.pinned.remove(&id);
        }
        true
    }

    /// 清空某条目的全部引用（该行即将被删除）
    pub fn drain_pins(&mut self, id: LevelId, index: usize) {
        let Some(level) = self.level_mut(id) else {
            return;
        };
        let Some(elt) = level.elts.get_mut(index) else {
            return;
        };
        let drained = std::mem::take(&mut elt.ref_count);
        level.ref_count -= drained;
        if level.ref_count == 0 {
            self.pinned.remove(&id);
        }
    }

    #[cfg(test)]
    pub fn is_pinned(&self, id: LevelId) -> bool {
        self.pinned.contains(&id)
    }

    /// `id` 自身被固定，或者它是某个被固定层级的祖先
    pub fn is_pinned_or_above_pin(&self, id: LevelId) -> bool {
        self.pinned
            .iter()
            .any(|&pinned| self.ancestors_inclusive(pinned).any(|level| level == id))
    }

    /// 从 `id` 向上直到根的所有层级（含 `id`）
    fn ancestors_inclusive(&self, id: LevelId) -> impl Iterator<Item = LevelId> + '_ {
        std::iter::successors(Some(id), move |&current| {
            self.level(current)
                .and_then(|level| level.parent)
                .map(|(parent_level, _)| parent_level)
        })
    }

    /// 回收清扫：释放所有既未被固定、也没有被固定后代的非根层级
    pub fn sweep(&mut self) -> usize {
        let Some(root) = self.root else {
            return 0;
        };
        let mut keep: BTreeSet<LevelId> = BTreeSet::new();
        keep.insert(root);
        for &pinned in &self.pinned {
            keep.extend(self.ancestors_inclusive(pinned));
        }

        let mut doomed = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(level) = self.level(id) else {
                continue;
            };
            for elt in &level.elts {
                if let Some(children) = elt.children {
                    if keep.contains(&children) {
                        stack.push(children);
                    } else {
                        doomed.push(children);
                    }
                }
            }
        }

        let freed: usize = doomed.into_iter().map(|id| self.free_level(id)).sum();
        if freed > 0 {
            log::debug!("cache sweep freed {} level(s)", freed);
        }
        freed
    }

    /// 从根开始深度优先列出所有已物化层级
    pub fn levels_depth_first(&self) -> Vec<LevelId> {
        let mut out = Vec::new();
        let mut stack: Vec<LevelId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            if let Some(level) = self.level(id) {
                out.push(id);
                stack.extend(level.elts.iter().rev().filter_map(|elt| elt.children));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(offsets: &[usize], parent: Option<(LevelId, usize)>) -> SortLevel<()> {
        SortLevel {
            elts: offsets.iter().map(|&o| SortElt::new(o, None)).collect(),
            ref_count: 0,
            parent,
        }
    }

    /// root: [2, 0, 1]; root[1] -> mid [0, 1]; mid[0] -> leaf [0]
    fn three_levels() -> (SortCache<()>, LevelId, LevelId, LevelId) {
        let mut cache = SortCache::new();
        let root = cache.attach_level(level(&[2, 0, 1], None));
        let mid = cache.attach_level(level(&[0, 1], Some((root, 1))));
        let leaf = cache.attach_level(level(&[0], Some((mid, 0))));
        (cache, root, mid, leaf)
    }

    #[test]
    fn paths_walk_back_references() {
        let (cache, root, mid, leaf) = three_levels();
        assert_eq!(cache.level_path(root), Some(TreePath::new()));
        assert_eq!(cache.elt_path(mid, 1), Some(TreePath::from_indices(vec![1, 1])));
        assert_eq!(cache.elt_path(leaf, 0), Some(TreePath::from_indices(vec![1, 0, 0])));
        // root[1] has offset 0, mid[0] has offset 0
        assert_eq!(cache.child_path(leaf, 0), Some(TreePath::from_indices(vec![0, 0, 0])));
        assert_eq!(cache.child_path(root, 0), Some(TreePath::from_indices(vec![2])));
    }

    #[test]
    fn free_level_detaches_and_recycles_slots() {
        let (mut cache, root, mid, _leaf) = three_levels();
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.free_level(mid), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.elt(root, 1).unwrap().children.is_none());

        let again = cache.attach_level(level(&[0], Some((root, 2))));
        assert_eq!(cache.elt(root, 2).unwrap().children, Some(again));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn sweep_keeps_pinned_levels_and_their_ancestors() {
        let (mut cache, root, mid, leaf) = three_levels();
        assert!(cache.pin(leaf, 0));
        assert!(cache.is_pinned_or_above_pin(mid));
        assert!(cache.is_pinned_or_above_pin(root));
        assert_eq!(cache.sweep(), 0);
        assert_eq!(cache.len(), 3);

        assert!(cache.unpin(leaf, 0));
        assert!(!cache.unpin(leaf, 0));
        assert!(!cache.is_pinned_or_above_pin(mid));
        assert_eq!(cache.sweep(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.sweep(), 0);
        assert_eq!(cache.root(), Some(root));
    }

    #[test]
    fn draining_pins_releases_the_level() {
        let (mut cache, _root, mid, _leaf) = three_levels();
        cache.pin(mid, 1);
        cache.pin(mid, 1);
        cache.pin(mid, 0);
        assert_eq!(cache.level(mid).unwrap().ref_count, 3);
        cache.drain_pins(mid, 1);
        assert_eq!(cache.level(mid).unwrap().ref_count, 1);
        assert!(cache.is_pinned(mid));
        cache.drain_pins(mid, 0);
        assert!(!cache.is_pinned(mid));
    }

    #[test]
    fn fix_backrefs_follows_moved_parents() {
        let (mut cache, root, mid, _leaf) = three_levels();
        let level = cache.level_mut(root).unwrap();
        let moved = level.elts.remove(1);
        level.elts.insert(0, moved);
        cache.fix_backrefs(root, 0, 3);
        assert_eq!(cache.level(mid).unwrap().parent, Some((root, 0)));
        assert_eq!(cache.levels_depth_first().len(), 3);
    }
}
