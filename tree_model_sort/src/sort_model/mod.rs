//! 排序适配器
//!
//! `TreeModelSort` 在任意层级数据源之上呈现一个稳定排序的视图，不复制数据：
//! 只有被访问过的父行才会物化出一个排序好的层级，子模型的变更通知会被增量地
//! 应用到这些层级上，并以排序视图坐标重新发出。
//!
//! 发出的迭代器携带发放时的代数（generation），任何结构性变化都会使代数加一，
//! 旧迭代器随即失效，再使用时返回 `TreeError::StaleIter`。

mod build;
mod codec;
mod relay;
mod sortable;

use crate::comparator::{SortColumn, SortOrder, SortRegistry};
use crate::error::TreeError;
use crate::level::{LevelId, SortCache};
use crate::model::{ModelFlags, RowEvent, RowEventSource, TreeModel, Value, ValueKind};
use crate::options::SortModelOptions;
use crate::path::TreePath;
use build::SortContext;
use std::cell::RefCell;
use std::fmt;

/// 排序视图中的行句柄
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SortIter {
    stamp: u64,
    level: LevelId,
    index: usize,
}

impl SortIter {
    /// 发放时的代数
    pub fn generation(&self) -> u64 {
        self.stamp
    }
}

/// 适配器发给监听者的事件
#[derive(Clone, Debug, PartialEq)]
pub enum SortModelEvent {
    Row(RowEvent),
    SortColumnChanged {
        column: SortColumn,
        order: SortOrder,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct TreeModelSort<M: TreeModel> {
    child: M,
    cache: RefCell<SortCache<M::Iter>>,
    sorting: SortRegistry<M>,
    stamp: u64,
    options: SortModelOptions,

    // Events
    pending_events: Vec<RowEvent>,
    listeners: Vec<(ListenerId, Box<dyn FnMut(&SortModelEvent)>)>,
    next_listener: u64,
}

impl<M: TreeModel + fmt::Debug> fmt::Debug for TreeModelSort<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeModelSort")
            .field("child", &self.child)
            .field("sorting", &self.sorting)
            .field("stamp", &self.stamp)
            .field("levels", &self.cache.borrow().len())
            .field("pending_events", &self.pending_events.len())
            .finish()
    }
}

impl<M: TreeModel> TreeModelSort<M> {
    pub fn new(child: M) -> Self {
        Self::with_options(child, SortModelOptions::default())
    }

    pub fn with_options(child: M, options: SortModelOptions) -> Self {
        let model = Self {
            child,
            cache: RefCell::new(SortCache::new()),
            sorting: SortRegistry::new(),
            stamp: 1,
            options,
            pending_events: Vec::new(),
            listeners: Vec::new(),
            next_listener: 1,
        };
        if model.options.build_root_eagerly {
            let built = model.ctx().ensure_root(&mut model.cache.borrow_mut());
            if let Err(err) = built {
                log::warn!("could not build root level eagerly: {}", err);
            }
        }
        model
    }

    pub fn child(&self) -> &M {
        &self.child
    }

    pub fn into_child(self) -> M {
        self.child
    }

    pub fn options(&self) -> &SortModelOptions {
        &self.options
    }

    /// 当前代数
    pub fn generation(&self) -> u64 {
        self.stamp
    }

    /// 订阅适配器事件
    pub fn connect(&mut self, listener: Box<dyn FnMut(&SortModelEvent)>) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn disconnect(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// 已物化的层级数
    pub fn materialized_levels(&self) -> usize {
        self.cache.borrow().len()
    }

    /// `parent` 的子层级（`None` 表示根层级）是否已经物化
    pub fn is_materialized(&self, parent: Option<&SortIter>) -> Result<bool, TreeError> {
        let cache = self.cache.borrow();
        match parent {
            None => Ok(cache.root().is_some()),
            Some(iter) => {
                self.check_iter(&cache, iter)?;
                Ok(cache
                    .elt(iter.level, iter.index)
                    .is_some_and(|elt| elt.children.is_some()))
            }
        }
    }

    /// 该行当前持有的引用数
    pub fn iter_ref_count(&self, iter: &SortIter) -> Result<usize, TreeError> {
        let cache = self.cache.borrow();
        self.check_iter(&cache, iter)?;
        Ok(cache
            .elt(iter.level, iter.index)
            .map_or(0, |elt| elt.ref_count))
    }

    /// 该行的子树里是否有被固定的行（有的话清扫不会回收它的子层级）
    pub fn has_pinned_descendants(&self, iter: &SortIter) -> Result<bool, TreeError> {
        let cache = self.cache.borrow();
        self.check_iter(&cache, iter)?;
        Ok(cache
            .elt(iter.level, iter.index)
            .and_then(|elt| elt.children)
            .is_some_and(|children| cache.is_pinned_or_above_pin(children)))
    }

    /// 回收所有未被固定、也没有被固定后代的层级；返回释放的层级数
    pub fn clear_cache(&mut self) -> usize {
        let freed = self.cache.get_mut().sweep();
        if freed > 0 {
            self.increment_stamp();
        }
        freed
    }

    fn ctx(&self) -> SortContext<'_, M> {
        SortContext {
            child: &self.child,
            sorting: &self.sorting,
            cache_iters: self.options.cache_child_iters && self.child.flags().iters_persist,
        }
    }

    fn make_iter(&self, level: LevelId, index: usize) -> SortIter {
        SortIter {
            stamp: self.stamp,
            level,
            index,
        }
    }

    fn check_iter(&self, cache: &SortCache<M::Iter>, iter: &SortIter) -> Result<(), TreeError> {
        if iter.stamp != self.stamp {
            return Err(TreeError::StaleIter {
                issued: iter.stamp,
                current: self.stamp,
            });
        }
        cache
            .elt(iter.level, iter.index)
            .map(|_| ())
            .ok_or(TreeError::InvalidIter)
    }

    fn increment_stamp(&mut self) {
        self.stamp = self.stamp.wrapping_add(1);
    }

    /// 丢弃全部缓存；下次访问时从子模型重新构建
    fn invalidate(&mut self) {
        let dropped = self.cache.get_mut().clear();
        self.increment_stamp();
        log::debug!("invalidated {} cached level(s)", dropped);
    }

    /// 丢弃整个缓存，并把根层级的变化通知为逐行删除再逐行插入
    fn reset(&mut self) -> Result<(), TreeError> {
        let old_len = {
            let cache = self.cache.get_mut();
            cache
                .root()
                .and_then(|root| cache.level(root))
                .map_or(0, |level| level.len())
        };
        self.invalidate();
        for index in (0..old_len).rev() {
            self.emit_row(RowEvent::RowDeleted {
                path: TreePath::from_indices(vec![index]),
            });
        }

        let new_len = {
            let ctx = self.ctx();
            let mut cache = self.cache.borrow_mut();
            let root = ctx.ensure_root(&mut cache)?;
            root.and_then(|root| cache.level(root)).map_or(0, |level| level.len())
        };
        for index in 0..new_len {
            self.emit_row(RowEvent::RowInserted {
                path: TreePath::from_indices(vec![index]),
            });
        }
        Ok(())
    }

    fn emit(&mut self, event: SortModelEvent) {
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
        if let SortModelEvent::Row(row_event) = event {
            self.pending_events.push(row_event);
        }
    }

    fn emit_row(&mut self, event: RowEvent) {
        self.emit(SortModelEvent::Row(event));
    }
}

impl<M: TreeModel> RowEventSource for TreeModelSort<M> {
    fn take_row_events(&mut self) -> Vec<RowEvent> {
        std::mem::take(&mut self.pending_events)
    }
}

impl<M: TreeModel> TreeModel for TreeModelSort<M> {
    type Iter = SortIter;

    fn flags(&self) -> ModelFlags {
        ModelFlags {
            iters_persist: false,
            list_only: self.child.flags().list_only,
        }
    }

    fn n_columns(&self) -> usize {
        self.child.n_columns()
    }

    fn column_type(&self, column: usize) -> Option<ValueKind> {
        self.child.column_type(column)
    }

    fn get_iter(&self, path: &TreePath) -> Result<SortIter, TreeError> {
        self.path_to_iter(path)
    }

    fn get_path(&self, iter: &SortIter) -> Result<TreePath, TreeError> {
        self.iter_to_path(iter)
    }

    fn get_value(&self, iter: &SortIter, column: usize) -> Result<Value, TreeError> {
        let child_iter = self.convert_iter_to_child_iter(iter)?;
        self.child.get_value(&child_iter, column)
    }

    fn iter_next(&self, iter: &SortIter) -> Result<Option<SortIter>, TreeError> {
        let cache = self.cache.borrow();
        self.check_iter(&cache, iter)?;
        let len = cache.level(iter.level).map_or(0, |level| level.len());
        Ok((iter.index + 1 < len).then(|| self.make_iter(iter.level, iter.index + 1)))
    }

    fn iter_has_child(&self, iter: &SortIter) -> Result<bool, TreeError> {
        let cache = self.cache.borrow();
        self.check_iter(&cache, iter)?;
        if cache
            .elt(iter.level, iter.index)
            .is_some_and(|elt| elt.children.is_some())
        {
            return Ok(true);
        }
        let child_iter = self.ctx().child_iter(&cache, iter.level, iter.index)?;
        self.child.iter_has_child(&child_iter)
    }

    fn iter_n_children(&self, parent: Option<&SortIter>) -> Result<usize, TreeError> {
        let cache = self.cache.borrow();
        let Some(parent) = parent else {
            return match cache.root().and_then(|root| cache.level(root)) {
                Some(level) => Ok(level.len()),
                None => self.child.iter_n_children(None),
            };
        };
        self.check_iter(&cache, parent)?;
        if let Some(level) = cache
            .elt(parent.level, parent.index)
            .and_then(|elt| elt.children)
            .and_then(|children| cache.level(children))
        {
            return Ok(level.len());
        }
        let child_iter = self.ctx().child_iter(&cache, parent.level, parent.index)?;
        self.child.iter_n_children(Some(&child_iter))
    }

    fn iter_nth_child(
        &self,
        parent: Option<&SortIter>,
        n: usize,
    ) -> Result<Option<SortIter>, TreeError> {
        let mut cache = self.cache.borrow_mut();
        let ctx = self.ctx();
        let level = match parent {
            None => ctx.ensure_root(&mut cache)?,
            Some(parent) => {
                self.check_iter(&cache, parent)?;
                ctx.ensure_children(&mut cache, parent.level, parent.index)?
            }
        };
        Ok(level
            .filter(|&level| cache.level(level).is_some_and(|l| n < l.len()))
            .map(|level| self.make_iter(level, n)))
    }

    fn iter_parent(&self, child: &SortIter) -> Result<Option<SortIter>, TreeError> {
        let cache = self.cache.borrow();
        self.check_iter(&cache, child)?;
        Ok(cache
            .level(child.level)
            .and_then(|level| level.parent)
            .map(|(level, index)| self.make_iter(level, index)))
    }

    fn ref_node(&self, iter: &SortIter) -> Result<(), TreeError> {
        let child_iter = {
            let cache = self.cache.borrow();
            self.check_iter(&cache, iter)?;
            self.ctx().child_iter(&cache, iter.level, iter.index)?
        };
        self.child.ref_node(&child_iter)?;
        self.cache.borrow_mut().pin(iter.level, iter.index);
        Ok(())
    }

    fn unref_node(&self, iter: &SortIter) -> Result<(), TreeError> {
        let child_iter = {
            let mut cache = self.cache.borrow_mut();
            self.check_iter(&cache, iter)?;
            let child_iter = self.ctx().child_iter(&cache, iter.level, iter.index)?;
            if !cache.unpin(iter.level, iter.index) {
                return Err(TreeError::NotReferenced);
            }
            child_iter
        };
        self.child.unref_node(&child_iter)
    }
}
