//! 子模型事件中继
//!
//! 每个事件都会被完整处理（更新缓存、必要的重排、发出通知）之后才处理下一个。
//! 事件与缓存对不上属于子模型违约：返回 `ChildInconsistent` 并丢弃整个缓存。

use super::build::{moved_order, Resolved};
use super::TreeModelSort;
use crate::error::TreeError;
use crate::level::SortElt;
use crate::model::{is_permutation, RowEvent, RowEventSource, TreeModel};
use crate::path::TreePath;

impl<M: TreeModel> TreeModelSort<M> {
    /// 修改子模型，然后中继修改产生的通知
    ///
    /// 通知在闭包返回后才处理，处理时读取的是子模型的最终状态。
    /// 闭包只做了一次修改时逐条中继；做了多次修改时丢弃整个缓存，
    /// 以根层级的逐行删除再逐行插入通知视图的变化。
    /// 闭包运行前子模型里残留的通知会被丢弃。
    pub fn edit_child<R>(
        &mut self,
        edit: impl FnOnce(&mut M) -> Result<R, TreeError>,
    ) -> Result<R, TreeError>
    where
        M: RowEventSource,
    {
        // 构造之前积累的通知已经反映在子模型当前状态里
        let stale = self.child.take_row_events();
        if !stale.is_empty() {
            log::trace!("discarding {} event(s) queued before the adapter", stale.len());
        }
        let outcome = edit(&mut self.child);
        let events = self.child.take_row_events();
        if is_single_edit(&events) {
            for event in &events {
                self.handle_child_event(event)?;
            }
        } else {
            log::debug!(
                "{} child events from one closure, rebuilding the view",
                events.len()
            );
            self.reset()?;
        }
        outcome
    }

    /// 处理一条子模型通知
    pub fn handle_child_event(&mut self, event: &RowEvent) -> Result<(), TreeError> {
        log::trace!("relaying child event {:?}", event);
        let result = match event {
            RowEvent::RowChanged { path } => self.child_row_changed(path),
            RowEvent::RowInserted { path } => self.child_row_inserted(path),
            RowEvent::RowDeleted { path } => self.child_row_deleted(path),
            RowEvent::RowHasChildToggled { path } => self.child_row_has_child_toggled(path),
            RowEvent::RowsReordered { path, new_order } => {
                self.child_rows_reordered(path, new_order)
            }
        };
        result.map_err(|err| {
            let reason = match err {
                TreeError::ChildInconsistent(reason) => reason,
                other => format!("{:?}: {}", event, other),
            };
            log::error!("child model event inconsistent with cache: {}", reason);
            self.invalidate();
            TreeError::ChildInconsistent(reason)
        })
    }

    fn child_row_changed(&mut self, child_path: &TreePath) -> Result<(), TreeError> {
        let mut events = Vec::new();
        let mut moved = false;
        {
            let ctx = self.ctx();
            let mut cache = self.cache.borrow_mut();
            let Resolved::Found { level, index, path } =
                ctx.resolve_child_path(&mut cache, child_path, true)?
            else {
                return Err(TreeError::ChildInconsistent(format!(
                    "changed row {} has no materialized parent",
                    child_path
                )));
            };
            let len = cache.level(level).map_or(0, |l| l.len());

            if len < 2
                || self.sorting.is_unsorted()
                || !ctx.is_out_of_place(&cache, level, index)?
            {
                events.push(RowEvent::RowChanged { path });
            } else {
                let offset = cache.elt(level, index).ok_or(TreeError::InvalidIter)?.offset;
                let iter = ctx.child_iter(&cache, level, index)?;
                let new_index =
                    ctx.find_insert_position(&cache, level, (&iter, offset), Some(index))?;

                let elts = &mut cache.level_mut(level).ok_or(TreeError::InvalidIter)?.elts;
                let elt = elts.remove(index);
                elts.insert(new_index, elt);
                cache.fix_backrefs(level, index.min(new_index), index.max(new_index) + 1);

                let parent_path = cache.level_path(level).ok_or(TreeError::InvalidIter)?;
                events.push(RowEvent::RowsReordered {
                    path: parent_path.clone(),
                    new_order: moved_order(len, index, new_index),
                });
                events.push(RowEvent::RowChanged {
                    path: parent_path.child(new_index),
                });
                moved = true;
            }
        }
        if moved {
            self.increment_stamp();
        }
        for event in events {
            self.emit_row(event);
        }
        Ok(())
    }

    fn child_row_inserted(&mut self, child_path: &TreePath) -> Result<(), TreeError> {
        let (Some(offset), Some(parent_path)) = (child_path.last(), child_path.parent()) else {
            return Err(TreeError::ChildInconsistent(
                "row inserted at the empty path".to_string(),
            ));
        };

        let inserted = {
            let ctx = self.ctx();
            let mut cache = self.cache.borrow_mut();

            if cache.root().is_none() {
                // 根层级直接从子模型构建，已经包含新行
                ctx.ensure_root(&mut cache)?;
                match ctx.resolve_child_path(&mut cache, child_path, false)? {
                    Resolved::Found { path, .. } => Some(path),
                    Resolved::NotBuilt => None,
                }
            } else {
                let level = if parent_path.is_empty() {
                    cache.root()
                } else {
                    match ctx.resolve_child_path(&mut cache, &parent_path, false)? {
                        Resolved::Found { level, index, .. } => {
                            cache.elt(level, index).and_then(|elt| elt.children)
                        }
                        Resolved::NotBuilt => None,
                    }
                };
                let Some(level) = level else {
                    log::trace!("dropping insert at {}: parent level not built", child_path);
                    return Ok(());
                };

                let siblings = &mut cache.level_mut(level).ok_or(TreeError::InvalidIter)?.elts;
                let len = siblings.len();
                if offset > len {
                    return Err(TreeError::ChildInconsistent(format!(
                        "row inserted at offset {} of a level holding {} rows",
                        offset, len
                    )));
                }
                for elt in siblings.iter_mut().filter(|elt| elt.offset >= offset) {
                    elt.offset += 1;
                }

                let iter = ctx.child.get_iter(child_path)?;
                let index = ctx.find_insert_position(&cache, level, (&iter, offset), None)?;
                let elt = SortElt::new(offset, ctx.cache_iters.then_some(iter));
                cache
                    .level_mut(level)
                    .ok_or(TreeError::InvalidIter)?
                    .elts
                    .insert(index, elt);
                cache.fix_backrefs(level, index, len + 1);
                cache.elt_path(level, index)
            }
        };

        if let Some(path) = inserted {
            self.increment_stamp();
            self.emit_row(RowEvent::RowInserted { path });
        }
        Ok(())
    }

    fn child_row_deleted(&mut self, child_path: &TreePath) -> Result<(), TreeError> {
        let deleted = {
            let ctx = self.ctx();
            let mut cache = self.cache.borrow_mut();
            let Resolved::Found { level, index, path } =
                ctx.resolve_child_path(&mut cache, child_path, false)?
            else {
                log::trace!("dropping delete at {}: row not materialized", child_path);
                return Ok(());
            };

            cache.drain_pins(level, index);
            if let Some(children) = cache.elt(level, index).and_then(|elt| elt.children) {
                cache.free_level(children);
            }

            let len = cache.level(level).map_or(0, |l| l.len());
            if len == 1 {
                cache.free_level(level);
            } else {
                let elts = &mut cache.level_mut(level).ok_or(TreeError::InvalidIter)?.elts;
                let removed = elts.remove(index);
                for elt in elts.iter_mut().filter(|elt| elt.offset > removed.offset) {
                    elt.offset -= 1;
                }
                cache.fix_backrefs(level, index, len - 1);
            }
            path
        };

        self.increment_stamp();
        self.emit_row(RowEvent::RowDeleted { path: deleted });
        Ok(())
    }

    fn child_row_has_child_toggled(&mut self, child_path: &TreePath) -> Result<(), TreeError> {
        let toggled = {
            let ctx = self.ctx();
            let mut cache = self.cache.borrow_mut();
            match ctx.resolve_child_path(&mut cache, child_path, false)? {
                Resolved::Found { path, .. } => Some(path),
                Resolved::NotBuilt => None,
            }
        };
        if let Some(path) = toggled {
            self.emit_row(RowEvent::RowHasChildToggled { path });
        }
        Ok(())
    }

    fn child_rows_reordered(
        &mut self,
        child_path: &TreePath,
        new_order: &[usize],
    ) -> Result<(), TreeError> {
        let reordered = {
            let ctx = self.ctx();
            let mut cache = self.cache.borrow_mut();
            let level = if child_path.is_empty() {
                cache.root()
            } else {
                match ctx.resolve_child_path(&mut cache, child_path, false)? {
                    Resolved::Found { level, index, .. } => {
                        cache.elt(level, index).and_then(|elt| elt.children)
                    }
                    Resolved::NotBuilt => None,
                }
            };
            let Some(level) = level else {
                return Ok(());
            };

            let elts = &mut cache.level_mut(level).ok_or(TreeError::InvalidIter)?.elts;
            if !is_permutation(new_order, elts.len()) {
                return Err(TreeError::InvalidPermutation {
                    len: new_order.len(),
                    expected: elts.len(),
                });
            }
            let mut new_offsets = vec![0; new_order.len()];
            for (new_offset, &old_offset) in new_order.iter().enumerate() {
                new_offsets[old_offset] = new_offset;
            }
            for elt in elts.iter_mut() {
                elt.offset = new_offsets[elt.offset];
            }

            // 有比较函数时只有比较结果相等的行会因为 offset 变化而换位
            match ctx.sort_level(&mut cache, level)? {
                Some(order) => cache.level_path(level).map(|path| (path, order)),
                None => None,
            }
        };

        if let Some((path, new_order)) = reordered {
            self.increment_stamp();
            self.emit_row(RowEvent::RowsReordered { path, new_order });
        }
        Ok(())
    }
}

/// 一次修改产生的通知：至多一条行变化，外加子行有无的切换。
/// 行移动（重排后紧跟该行的变化）也算一次修改。
fn is_single_edit(events: &[RowEvent]) -> bool {
    let primary: Vec<&RowEvent> = events
        .iter()
        .filter(|event| !matches!(event, RowEvent::RowHasChildToggled { .. }))
        .collect();
    matches!(
        primary.as_slice(),
        [] | [_] | [RowEvent::RowsReordered { .. }, RowEvent::RowChanged { .. }]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(indices: &[usize]) -> TreePath {
        TreePath::from_indices(indices.to_vec())
    }

    #[test]
    fn single_edits_are_recognized() {
        assert!(is_single_edit(&[]));
        assert!(is_single_edit(&[
            RowEvent::RowInserted { path: at(&[0, 0]) },
            RowEvent::RowHasChildToggled { path: at(&[0]) },
        ]));
        assert!(is_single_edit(&[
            RowEvent::RowsReordered {
                path: TreePath::new(),
                new_order: vec![1, 0],
            },
            RowEvent::RowChanged { path: at(&[1]) },
        ]));
    }

    #[test]
    fn batched_edits_are_not_single() {
        assert!(!is_single_edit(&[
            RowEvent::RowInserted { path: at(&[0]) },
            RowEvent::RowInserted { path: at(&[1]) },
        ]));
        assert!(!is_single_edit(&[
            RowEvent::RowChanged { path: at(&[0]) },
            RowEvent::RowChanged { path: at(&[1]) },
        ]));
        assert!(!is_single_edit(&[
            RowEvent::RowChanged { path: at(&[1]) },
            RowEvent::RowsReordered {
                path: TreePath::new(),
                new_order: vec![1, 0],
            },
        ]));
    }
}
