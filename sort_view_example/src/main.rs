mod tree_view;

use eframe::egui;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use tree_model_sort::{
    by_column, RowEventSource, SortColumn, SortModelEvent, SortOrder, StoreIter, TreeError,
    TreeModel, TreeModelSort, TreePath, TreeStore, Value, ValueKind,
};
use tree_view::{SortTreeView, TreeViewEvent};

const NAME_COLUMN: usize = 0;
const SIZE_COLUMN: usize = 1;
const EVENT_LOG_LEN: usize = 40;

const RANDOM_NAMES: &[&str] = &[
    "Pad", "Lead", "Arp", "Stab", "Riser", "Impact", "Chord", "Sweep", "Choir", "Perc",
];

fn main() -> eframe::Result<()> {
    env_logger::init();

    let native_options = eframe::NativeOptions::default();
    eframe::run_native(
        "Sort View Example",
        native_options,
        Box::new(|_cc| Ok(Box::new(SortViewApp::new()))),
    )
}

/// 示例数据：轨道分组，第二列是片段数
fn sample_store() -> Result<TreeStore, TreeError> {
    let mut store = TreeStore::new(vec![ValueKind::Text, ValueKind::Int]);
    let groups: &[(&str, &[(&str, i64)])] = &[
        ("Drums", &[("Kick", 32), ("Snare", 16), ("Hi-hat", 64), ("Clap", 8)]),
        ("Bass", &[("Sub", 12), ("Pluck", 20)]),
        ("Keys", &[("Piano", 24), ("Rhodes", 10), ("Organ", 4)]),
        ("Vocals", &[("Lead", 6), ("Harmony", 3), ("Ad-libs", 9)]),
        ("FX", &[("Reverb", 1), ("Delay", 2)]),
    ];
    for (group, tracks) in groups {
        let total: i64 = tracks.iter().map(|(_, clips)| clips).sum();
        let parent = store.append(None, vec![(*group).into(), Value::Int(total)])?;
        for (track, clips) in tracks.iter() {
            store.append(Some(&parent), vec![(*track).into(), Value::Int(*clips)])?;
        }
    }
    let vocals = store.get_iter(&"3:1".parse::<TreePath>()?)?;
    store.append(Some(&vocals), vec!["Low".into(), Value::Int(2)])?;
    store.append(Some(&vocals), vec!["High".into(), Value::Int(1)])?;
    Ok(store)
}

struct SortViewApp {
    model: TreeModelSort<TreeStore>,
    tree_view: SortTreeView,
    /// 展开的行 -> 为保住其子层级而固定的第一个子行
    pins: HashMap<StoreIter, StoreIter>,
    event_log: Rc<RefCell<VecDeque<String>>>,
    status_message: String,
}

impl SortViewApp {
    fn new() -> Self {
        let store = sample_store().unwrap_or_else(|err| {
            log::error!("could not build sample data: {}", err);
            TreeStore::new(vec![ValueKind::Text, ValueKind::Int])
        });
        let mut model = TreeModelSort::new(store);
        for column in [NAME_COLUMN, SIZE_COLUMN] {
            if let Err(err) = model.register_sort_func(column, by_column::<TreeStore>(column)) {
                log::error!("could not register sort function: {}", err);
            }
        }

        let event_log = Rc::new(RefCell::new(VecDeque::new()));
        let sink = Rc::clone(&event_log);
        model.connect(Box::new(move |event: &SortModelEvent| {
            log::debug!("sort model event: {:?}", event);
            let mut lines = sink.borrow_mut();
            lines.push_front(describe(event));
            lines.truncate(EVENT_LOG_LEN);
        }));

        Self {
            model,
            tree_view: SortTreeView::new(),
            pins: HashMap::new(),
            event_log,
            status_message: "Use the Sort and Edit menus to change the view".to_string(),
        }
    }

    fn report(&mut self, action: &str, result: Result<(), TreeError>) {
        match result {
            Ok(()) => {
                self.status_message = action.to_string();
                log::info!("{}", action);
            }
            Err(err) => {
                self.status_message = format!("{} failed: {}", action, err);
                log::warn!("{} failed: {}", action, err);
            }
        }
    }

    fn set_sort(&mut self, column: SortColumn, order: SortOrder) {
        let result = self.model.set_sort_column(column, order);
        self.report(&format!("Sort by {:?} {:?}", column, order), result);
    }

    fn add_row(&mut self, parent: Option<StoreIter>) {
        let name = format!(
            "{} {}",
            RANDOM_NAMES[fastrand::usize(..RANDOM_NAMES.len())],
            fastrand::u32(1..100)
        );
        let size = fastrand::i64(1..64);
        let result = self
            .model
            .edit_child(|store| {
                store.append(parent.as_ref(), vec![name.as_str().into(), Value::Int(size)])
            })
            .map(|_| ());
        self.report(&format!("Added {}", name), result);
    }

    fn rename_selected(&mut self) {
        let Some(row) = self.tree_view.selected() else {
            return;
        };
        let name = RANDOM_NAMES[fastrand::usize(..RANDOM_NAMES.len())];
        let result = self
            .model
            .edit_child(|store| store.set_value(&row, NAME_COLUMN, name.into()));
        self.report(&format!("Renamed to {}", name), result);
    }

    fn add_clips(&mut self) {
        let Some(row) = self.tree_view.selected() else {
            return;
        };
        let clips = match self.model.child().get_value(&row, SIZE_COLUMN) {
            Ok(value) => value.as_int().unwrap_or(0) + fastrand::i64(1..8),
            Err(err) => return self.report("Add clips", Err(err)),
        };
        let result = self
            .model
            .edit_child(|store| store.set_value(&row, SIZE_COLUMN, Value::Int(clips)));
        self.report(&format!("Clips now {}", clips), result);
    }

    fn delete_selected(&mut self) {
        let Some(row) = self.tree_view.selected() else {
            return;
        };
        let result = self.model.edit_child(|store| store.remove(&row));
        self.tree_view.forget(&row);
        // 删除会清掉被删行上的引用
        let store = self.model.child();
        self.pins.retain(|parent, pinned| {
            store.get_path(parent).is_ok() && store.get_path(pinned).is_ok()
        });
        self.report("Deleted row", result);
    }

    fn shuffle_root(&mut self) {
        let n = match self.model.child().iter_n_children(None) {
            Ok(n) => n,
            Err(err) => return self.report("Shuffle", Err(err)),
        };
        let mut new_order: Vec<usize> = (0..n).collect();
        fastrand::shuffle(&mut new_order);
        let result = self.model.edit_child(|store| store.reorder(None, &new_order));
        self.report("Shuffled top-level rows", result);
    }

    fn clear_cache(&mut self) {
        let freed = self.model.clear_cache();
        self.status_message = format!("Cache sweep freed {} level(s)", freed);
        log::info!("cache sweep freed {} level(s)", freed);
    }

    /// 固定展开行的第一个子行，使其子层级在清扫中保留
    fn pin_children(&mut self, row: StoreIter) -> Result<(), TreeError> {
        let iter = self.model.convert_child_iter_to_iter(&row)?;
        if let Some(first) = self.model.iter_children(Some(&iter))? {
            self.model.ref_node(&first)?;
            let pinned = self.model.convert_iter_to_child_iter(&first)?;
            self.pins.insert(row, pinned);
        }
        Ok(())
    }

    fn unpin_children(&mut self, row: StoreIter) -> Result<(), TreeError> {
        if let Some(pinned) = self.pins.remove(&row) {
            let iter = self.model.convert_child_iter_to_iter(&pinned)?;
            self.model.unref_node(&iter)?;
        }
        Ok(())
    }

    fn handle_view_event(&mut self, event: TreeViewEvent) {
        match event {
            TreeViewEvent::RowSelected { row } => {
                let path = self.model.child().get_path(&row).map(|p| p.to_string());
                self.status_message = format!("Selected: {}", path.unwrap_or_default());
            }
            TreeViewEvent::RowDoubleClicked { row } => self.add_row(Some(row)),
            TreeViewEvent::RowExpanded { row } => {
                if let Err(err) = self.pin_children(row) {
                    log::warn!("could not pin children of {:?}: {}", row, err);
                }
            }
            TreeViewEvent::RowCollapsed { row } => {
                if let Err(err) = self.unpin_children(row) {
                    log::warn!("could not unpin children of {:?}: {}", row, err);
                }
            }
        }
    }
}

fn describe(event: &SortModelEvent) -> String {
    match event {
        SortModelEvent::Row(row_event) => format!("{:?}", row_event),
        SortModelEvent::SortColumnChanged { column, order } => {
            format!("sort column changed: {:?} {:?}", column, order)
        }
    }
}

impl eframe::App for SortViewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 事件已经由监听者记录
        self.model.take_row_events();

        // 顶部菜单栏
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("Sort", |ui| {
                    let choices = [
                        ("Unsorted", SortColumn::Unsorted, SortOrder::Ascending),
                        ("Name ↑", SortColumn::Column(NAME_COLUMN), SortOrder::Ascending),
                        ("Name ↓", SortColumn::Column(NAME_COLUMN), SortOrder::Descending),
                        ("Clips ↑", SortColumn::Column(SIZE_COLUMN), SortOrder::Ascending),
                        ("Clips ↓", SortColumn::Column(SIZE_COLUMN), SortOrder::Descending),
                    ];
                    for (label, column, order) in choices {
                        let active = self.model.sort_column() == (column, order);
                        if ui.selectable_label(active, label).clicked() {
                            self.set_sort(column, order);
                            ui.close_menu();
                        }
                    }
                    ui.separator();
                    if ui.button("Toggle direction").clicked() {
                        let (column, order) = self.model.sort_column();
                        self.set_sort(column, order.toggled());
                        ui.close_menu();
                    }
                    if ui.button("Reset to source order").clicked() {
                        self.model.reset_default_sort_func();
                        self.status_message = "Reset to source order".to_string();
                        ui.close_menu();
                    }
                });
                ui.menu_button("Edit", |ui| {
                    if ui.button("Add top-level row").clicked() {
                        self.add_row(None);
                        ui.close_menu();
                    }
                    let has_selection = self.tree_view.selected().is_some();
                    if ui.add_enabled(has_selection, egui::Button::new("Add child")).clicked() {
                        self.add_row(self.tree_view.selected());
                        ui.close_menu();
                    }
                    if ui.add_enabled(has_selection, egui::Button::new("Rename")).clicked() {
                        self.rename_selected();
                        ui.close_menu();
                    }
                    if ui.add_enabled(has_selection, egui::Button::new("Add clips")).clicked() {
                        self.add_clips();
                        ui.close_menu();
                    }
                    if ui.add_enabled(has_selection, egui::Button::new("Delete")).clicked() {
                        self.delete_selected();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Shuffle top-level rows").clicked() {
                        self.shuffle_root();
                        ui.close_menu();
                    }
                });
                ui.menu_button("Cache", |ui| {
                    if ui.button("Clear cache").clicked() {
                        self.clear_cache();
                        ui.close_menu();
                    }
                });
            });
        });

        // 底部状态栏
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(&self.status_message);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(format!("generation {}", self.model.generation()));
                    ui.separator();
                    ui.label(format!("{} level(s) cached", self.model.materialized_levels()));
                });
            });
        });

        // 右侧事件日志
        egui::SidePanel::right("event_log").show(ctx, |ui| {
            ui.heading("Events");
            egui::ScrollArea::vertical().show(ui, |ui| {
                for line in self.event_log.borrow().iter() {
                    ui.monospace(line);
                }
            });
        });

        // 中央面板显示排序树
        egui::CentralPanel::default().show(ctx, |ui| {
            let events = self.tree_view.ui(ui, &self.model);
            for event in events {
                self.handle_view_event(event);
            }
        });
    }
}
