//! 排序设置接口

use super::{SortModelEvent, TreeModelSort};
use crate::comparator::{SortColumn, SortOrder};
use crate::error::TreeError;
use crate::model::{RowEvent, TreeModel};
use std::cmp::Ordering;

impl<M: TreeModel> TreeModelSort<M> {
    /// 当前排序选择
    pub fn sort_column(&self) -> (SortColumn, SortOrder) {
        self.sorting.selection()
    }

    /// 切换排序选择并重排所有已物化层级
    ///
    /// 与当前选择相同时什么也不做。
    pub fn set_sort_column(
        &mut self,
        column: SortColumn,
        order: SortOrder,
    ) -> Result<(), TreeError> {
        let n_columns = self.child.n_columns();
        if !self.sorting.select(column, order, n_columns)? {
            return Ok(());
        }
        log::debug!("sort column changed to {:?} {:?}", column, order);
        self.emit(SortModelEvent::SortColumnChanged { column, order });
        self.resort_all();
        Ok(())
    }

    /// 注册某列的比较函数；该列正在生效时立即重排
    pub fn register_sort_func<F>(&mut self, column: usize, func: F) -> Result<(), TreeError>
    where
        F: Fn(&M, &M::Iter, &M::Iter) -> Ordering + 'static,
    {
        let n_columns = self.child.n_columns();
        if let Err(err) = self.sorting.register(column, n_columns, Box::new(func)) {
            log::warn!("rejected sort function: {}", err);
            return Err(err);
        }
        if self.sorting.uses_column(column) {
            self.resort_all();
        }
        Ok(())
    }

    /// 注册默认比较函数；默认选择正在生效时立即重排
    pub fn register_default_sort_func<F>(&mut self, func: F)
    where
        F: Fn(&M, &M::Iter, &M::Iter) -> Ordering + 'static,
    {
        self.sorting.register_default(Box::new(func));
        if self.sorting.uses_default() {
            self.resort_all();
        }
    }

    pub fn has_default_sort_func(&self) -> bool {
        self.sorting.has_default()
    }

    /// 恢复子模型原始顺序：丢弃默认比较函数并选中默认选择
    pub fn reset_default_sort_func(&mut self) {
        self.sorting.clear_default();
        let n_columns = self.child.n_columns();
        let (column, order) = (SortColumn::Default, SortOrder::Ascending);
        match self.sorting.select(column, order, n_columns) {
            Ok(_) => self.emit(SortModelEvent::SortColumnChanged { column, order }),
            Err(err) => log::warn!("could not select default sort: {}", err),
        }
        self.resort_all();
    }

    fn resort_all(&mut self) {
        let reordered = {
            let ctx = self.ctx();
            let mut cache = self.cache.borrow_mut();
            ctx.sort_all(&mut cache).map(|levels| {
                levels
                    .into_iter()
                    .filter_map(|(level, new_order)| {
                        cache.level_path(level).map(|path| (path, new_order))
                    })
                    .collect::<Vec<_>>()
            })
        };
        match reordered {
            Ok(levels) => {
                if levels.is_empty() {
                    return;
                }
                self.increment_stamp();
                log::debug!("re-sorted {} level(s)", levels.len());
                for (path, new_order) in levels {
                    self.emit_row(RowEvent::RowsReordered { path, new_order });
                }
            }
            Err(err) => {
                log::error!("re-sort failed, dropping cache: {}", err);
                self.invalidate();
            }
        }
    }
}
