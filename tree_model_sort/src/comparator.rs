//! 比较函数注册表
//!
//! 保存每列的比较函数、默认比较函数以及当前生效的排序选择。
//! 闭包捕获的数据就是比较函数的附带数据，随注册表一起释放。

use crate::error::TreeError;
use crate::model::{TreeModel, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// 比较两行子模型数据
pub type SortFunc<M> =
    Box<dyn Fn(&M, &<M as TreeModel>::Iter, &<M as TreeModel>::Iter) -> Ordering>;

/// 排序选择
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortColumn {
    /// 按子模型原始顺序
    Unsorted,
    /// 使用默认比较函数；没有默认函数时等同于 `Unsorted`
    Default,
    /// 使用某列的比较函数
    Column(usize),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

pub struct SortRegistry<M: TreeModel> {
    column_funcs: HashMap<usize, SortFunc<M>>,
    default_func: Option<SortFunc<M>>,
    column: SortColumn,
    order: SortOrder,
}

impl<M: TreeModel> fmt::Debug for SortRegistry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut columns: Vec<_> = self.column_funcs.keys().copied().collect();
        columns.sort_unstable();
        f.debug_struct("SortRegistry")
            .field("columns", &columns)
            .field("has_default", &self.default_func.is_some())
            .field("column", &self.column)
            .field("order", &self.order)
            .finish()
    }
}

impl<M: TreeModel> Default for SortRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: TreeModel> SortRegistry<M> {
    pub fn new() -> Self {
        Self {
            column_funcs: HashMap::new(),
            default_func: None,
            column: SortColumn::Default,
            order: SortOrder::Ascending,
        }
    }

    /// 注册某列的比较函数；列号必须小于 `n_columns`
    pub fn register(
        &mut self,
        column: usize,
        n_columns: usize,
        func: SortFunc<M>,
    ) -> Result<(), TreeError> {
        if column >= n_columns {
            return Err(TreeError::ColumnOutOfRange { column, n_columns });
        }
        self.column_funcs.insert(column, func);
        Ok(())
    }

    pub fn register_default(&mut self, func: SortFunc<M>) {
        self.default_func = Some(func);
    }

    pub fn clear_default(&mut self) {
        self.default_func = None;
    }

    pub fn has_default(&self) -> bool {
        self.default_func.is_some()
    }

    pub fn selection(&self) -> (SortColumn, SortOrder) {
        (self.column, self.order)
    }

    /// 切换排序选择；返回选择是否真的发生了变化
    pub fn select(
        &mut self,
        column: SortColumn,
        order: SortOrder,
        n_columns: usize,
    ) -> Result<bool, TreeError> {
        if let SortColumn::Column(c) = column {
            if c >= n_columns {
                return Err(TreeError::ColumnOutOfRange {
                    column: c,
                    n_columns,
                });
            }
            if !self.column_funcs.contains_key(&c) {
                return Err(TreeError::NoSortFunc(c));
            }
        }
        if self.column == column && self.order == order {
            return Ok(false);
        }
        self.column = column;
        self.order = order;
        Ok(true)
    }

    /// 当前生效的比较函数；`None` 表示按 offset 排序
    pub fn active_func(&self) -> Option<&SortFunc<M>> {
        match self.column {
            SortColumn::Unsorted => None,
            SortColumn::Default => self.default_func.as_ref(),
            SortColumn::Column(c) => self.column_funcs.get(&c),
        }
    }

    pub fn is_unsorted(&self) -> bool {
        self.active_func().is_none()
    }

    /// 选择是否依赖某列的比较函数
    pub fn uses_column(&self, column: usize) -> bool {
        self.column == SortColumn::Column(column)
    }

    pub fn uses_default(&self) -> bool {
        self.column == SortColumn::Default
    }

    /// 比较两个条目；相等时按 offset 升序决出先后，保证全序
    pub fn compare(
        &self,
        child: &M,
        a: (&M::Iter, usize),
        b: (&M::Iter, usize),
    ) -> Ordering {
        match self.active_func() {
            None => a.1.cmp(&b.1),
            Some(func) => self
                .order
                .apply(func(child, a.0, b.0))
                .then_with(|| a.1.cmp(&b.1)),
        }
    }
}

/// 按某列 `Value` 的自然顺序比较；取值失败的行视为空值
pub fn by_column<M: TreeModel>(column: usize) -> impl Fn(&M, &M::Iter, &M::Iter) -> Ordering {
    move |model, a, b| {
        let left = model.get_value(a, column).unwrap_or(Value::Empty);
        let right = model.get_value(b, column).unwrap_or(Value::Empty);
        left.natural_cmp(&right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValueKind;
    use crate::store::TreeStore;

    fn store() -> TreeStore {
        TreeStore::new(vec![ValueKind::Text, ValueKind::Int])
    }

    #[test]
    fn starts_in_default_without_function() {
        let registry = SortRegistry::<TreeStore>::new();
        assert_eq!(registry.selection(), (SortColumn::Default, SortOrder::Ascending));
        assert!(registry.is_unsorted());
    }

    #[test]
    fn rejects_unregistered_and_out_of_range_columns() {
        let mut registry = SortRegistry::<TreeStore>::new();
        assert_eq!(
            registry.select(SortColumn::Column(1), SortOrder::Ascending, 2),
            Err(TreeError::NoSortFunc(1))
        );
        assert_eq!(
            registry.select(SortColumn::Column(5), SortOrder::Ascending, 2),
            Err(TreeError::ColumnOutOfRange { column: 5, n_columns: 2 })
        );
        assert!(matches!(
            registry.register(2, 2, Box::new(by_column::<TreeStore>(0))),
            Err(TreeError::ColumnOutOfRange { .. })
        ));
        assert_eq!(registry.selection().0, SortColumn::Default);
    }

    #[test]
    fn selecting_same_choice_reports_no_change() {
        let mut registry = SortRegistry::<TreeStore>::new();
        registry.register(0, 2, Box::new(by_column::<TreeStore>(0))).unwrap();
        assert_eq!(registry.select(SortColumn::Column(0), SortOrder::Ascending, 2), Ok(true));
        assert_eq!(registry.select(SortColumn::Column(0), SortOrder::Ascending, 2), Ok(false));
        assert_eq!(registry.select(SortColumn::Column(0), SortOrder::Descending, 2), Ok(true));
        assert!(registry.uses_column(0));
    }

    #[test]
    fn compare_breaks_ties_by_offset_and_honours_direction() {
        let mut model = store();
        let a = model.append(None, vec!["same".into(), 1i64.into()]).unwrap();
        let b = model.append(None, vec!["same".into(), 2i64.into()]).unwrap();

        let mut registry = SortRegistry::<TreeStore>::new();
        registry.register(0, 2, Box::new(by_column::<TreeStore>(0))).unwrap();
        registry.register(1, 2, Box::new(by_column::<TreeStore>(1))).unwrap();

        registry.select(SortColumn::Column(0), SortOrder::Descending, 2).unwrap();
        assert_eq!(registry.compare(&model, (&a, 0), (&b, 1)), Ordering::Less);

        registry.select(SortColumn::Column(1), SortOrder::Descending, 2).unwrap();
        assert_eq!(registry.compare(&model, (&a, 0), (&b, 1)), Ordering::Greater);

        registry.select(SortColumn::Unsorted, SortOrder::Descending, 2).unwrap();
        assert_eq!(registry.compare(&model, (&a, 0), (&b, 1)), Ordering::Less);
    }
}
