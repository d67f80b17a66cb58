//! 排序树视图组件

use egui::*;
use std::collections::BTreeSet;
use tree_model_sort::{SortIter, StoreIter, TreeError, TreeModel, TreeModelSort, TreeStore};

const NAME_COLUMN: usize = 0;
const SIZE_COLUMN: usize = 1;

/// 树视图事件
///
/// 行用子模型迭代器标识：排序变化后视图路径会变，但存储节点不会。
#[derive(Debug, Clone)]
pub enum TreeViewEvent {
    /// 行被选中
    RowSelected { row: StoreIter },
    /// 行被双击
    RowDoubleClicked { row: StoreIter },
    /// 行被展开
    RowExpanded { row: StoreIter },
    /// 行被折叠
    RowCollapsed { row: StoreIter },
}

/// 排序树视图组件
#[derive(Default)]
pub struct SortTreeView {
    /// 已展开的行
    expanded: BTreeSet<StoreIter>,
    /// 当前选中的行
    selected: Option<StoreIter>,
}

impl SortTreeView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<StoreIter> {
        self.selected
    }

    /// 忘记一行（及其展开状态），通常在删除之后调用
    pub fn forget(&mut self, row: &StoreIter) {
        self.expanded.remove(row);
        if self.selected.as_ref() == Some(row) {
            self.selected = None;
        }
    }

    /// 渲染UI并返回事件列表
    pub fn ui(&mut self, ui: &mut Ui, model: &TreeModelSort<TreeStore>) -> Vec<TreeViewEvent> {
        let mut events = Vec::new();

        ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                if let Err(err) = self.render_level(model, None, ui, 0, &mut events) {
                    log::warn!("tree view stopped rendering: {}", err);
                    ui.label(RichText::new(format!("⚠ {}", err)).color(Color32::RED));
                }
            });

        events
    }

    /// 渲染某个父行下的所有行（递归）
    fn render_level(
        &mut self,
        model: &TreeModelSort<TreeStore>,
        parent: Option<&SortIter>,
        ui: &mut Ui,
        indent_level: usize,
        events: &mut Vec<TreeViewEvent>,
    ) -> Result<(), TreeError> {
        let mut next = model.iter_children(parent)?;
        while let Some(iter) = next {
            next = model.iter_next(&iter)?;

            let row = model.convert_iter_to_child_iter(&iter)?;
            let name = model.get_value(&iter, NAME_COLUMN)?;
            let size = model.get_value(&iter, SIZE_COLUMN)?;
            let has_children = model.iter_has_child(&iter)?;
            let is_expanded = has_children && self.expanded.contains(&row);
            let is_selected = self.selected == Some(row);

            ui.horizontal(|ui| {
                // 缩进
                ui.add_space(indent_level as f32 * 20.0);

                // 展开/折叠按钮（仅有子行时）
                if has_children {
                    let expand_icon = if is_expanded { "▼" } else { "▶" };
                    let expand_button = ui
                        .selectable_label(false, expand_icon)
                        .on_hover_cursor(CursorIcon::PointingHand);

                    if expand_button.clicked() {
                        if is_expanded {
                            self.expanded.remove(&row);
                            events.push(TreeViewEvent::RowCollapsed { row });
                        } else {
                            self.expanded.insert(row);
                            events.push(TreeViewEvent::RowExpanded { row });
                        }
                    }
                } else {
                    ui.add_space(16.0);
                }

                let icon = if has_children { "🎚" } else { "🎵" };
                let response = ui
                    .selectable_label(is_selected, format!("{} {}", icon, name))
                    .on_hover_cursor(CursorIcon::PointingHand);
                ui.label(RichText::new(size.to_string()).weak());

                if response.clicked() {
                    self.selected = Some(row);
                    events.push(TreeViewEvent::RowSelected { row });
                }

                if response.double_clicked() {
                    events.push(TreeViewEvent::RowDoubleClicked { row });
                }
            });

            if is_expanded {
                self.render_level(model, Some(&iter), ui, indent_level + 1, events)?;
            }
        }
        Ok(())
    }
}
