// app.rs
use crate::error::DashError;
use crate::link::{self, Link, LinkManager, NewLink};
use crate::mediator::{DashboardData, MediatorHandle};
use crate::storage::Storage;
use crate::task::{HistoryFilter, Task, TaskManager};
use crate::theme::{Theme, ThemePreference};
use tracing::warn;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Panel {
    Links,
    Tasks,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Normal,
    EditingLinkUrl,
    EditingLinkName,
    EditingLinkIcon,
    EditingTask,
    History,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub text: String,
}

#[derive(Clone, Debug, Default)]
pub struct LinkForm {
    pub url: String,
    pub name: String,
    pub icon_url: String,
}

impl LinkForm {
    fn submit(&self) -> NewLink {
        NewLink::new(self.url.as_str())
            .name(self.name.as_str())
            .icon_url(self.icon_url.as_str())
    }
}

pub struct App<S> {
    pub links: LinkManager<S>,
    pub tasks: TaskManager<S>,
    pub theme: ThemePreference<S>,

    pub panel: Panel,
    pub input_mode: InputMode,
    pub link_form: LinkForm,
    pub input_task: String,
    pub selected_link: usize,
    pub selected_task: usize,
    pub history_filter: HistoryFilter,
    pub selected_history: usize,
    pub toast: Option<Toast>,
}

impl App<MediatorHandle> {
    /// Fetches the initial state with one `getData` round trip.
    pub fn mount(handle: MediatorHandle) -> Result<Self, DashError> {
        let data = handle.get_data()?;
        Ok(App::from_data(handle, data))
    }
}

impl<S: Storage + Clone> App<S> {
    pub fn from_data(store: S, data: DashboardData) -> Self {
        Self {
            links: LinkManager::new(store.clone(), data.hotlinks),
            tasks: TaskManager::new(store.clone(), data.todolist, data.deleted_tasks),
            theme: ThemePreference::new(store, data.theme),
            panel: Panel::Tasks,
            input_mode: InputMode::Normal,
            link_form: LinkForm::default(),
            input_task: String::new(),
            selected_link: 0,
            selected_task: 0,
            history_filter: HistoryFilter::All,
            selected_history: 0,
            toast: None,
        }
    }

    pub fn with_favicon_size(mut self, size: u32) -> Self {
        self.links = self.links.with_favicon_size(size);
        self
    }

    fn notify(&mut self, level: ToastLevel, text: impl Into<String>) {
        self.toast = Some(Toast {
            level,
            text: text.into(),
        });
    }

    /// Validation problems become warnings, everything else an error.
    fn report(&mut self, err: DashError) {
        if err.is_validation() {
            self.notify(ToastLevel::Warning, err.to_string());
        } else {
            warn!(error = %err, "operation failed");
            self.notify(ToastLevel::Error, format!("Could not save: {}", err));
        }
    }

    pub fn switch_panel(&mut self) {
        self.panel = match self.panel {
            Panel::Links => Panel::Tasks,
            Panel::Tasks => Panel::Links,
        };
    }

    fn selection_len(&self) -> usize {
        match (self.input_mode, self.panel) {
            (InputMode::History, _) => self.history_len(),
            (_, Panel::Links) => self.links.links().len(),
            (_, Panel::Tasks) => self.tasks.todo().len(),
        }
    }

    fn selection_mut(&mut self) -> &mut usize {
        match (self.input_mode, self.panel) {
            (InputMode::History, _) => &mut self.selected_history,
            (_, Panel::Links) => &mut self.selected_link,
            (_, Panel::Tasks) => &mut self.selected_task,
        }
    }

    pub fn select_next(&mut self) {
        let len = self.selection_len();
        let selected = self.selection_mut();
        if *selected + 1 < len {
            *selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        let selected = self.selection_mut();
        *selected = selected.saturating_sub(1);
    }

    fn clamp_selection(&mut self) {
        self.selected_link = self.selected_link.min(self.links.links().len().saturating_sub(1));
        self.selected_task = self.selected_task.min(self.tasks.todo().len().saturating_sub(1));
        self.selected_history = self.selected_history.min(self.history_len().saturating_sub(1));
    }

    pub fn selected_link(&self) -> Option<&Link> {
        self.links.links().get(self.selected_link)
    }

    /// Selection indexes the display order, not the stored order.
    pub fn selected_task(&self) -> Option<&Task> {
        self.tasks.sorted().get(self.selected_task).copied()
    }

    fn history_len(&self) -> usize {
        self.tasks
            .deleted()
            .iter()
            .filter(|t| self.history_filter.matches(t))
            .count()
    }

    /// Selection indexes the flattened history groups.
    pub fn selected_history(&self) -> Option<&Task> {
        self.tasks
            .history_local(self.history_filter)
            .into_iter()
            .flat_map(|g| g.tasks)
            .nth(self.selected_history)
    }

    pub fn begin_add(&mut self) {
        self.toast = None;
        match self.panel {
            Panel::Links => {
                self.link_form = LinkForm::default();
                self.input_mode = InputMode::EditingLinkUrl;
            }
            Panel::Tasks => {
                self.input_task.clear();
                self.input_mode = InputMode::EditingTask;
            }
        }
    }

    pub fn submit_link(&mut self) {
        let added = self.links.add(self.link_form.submit()).map(|_| ());
        match added {
            Ok(()) => {
                self.link_form = LinkForm::default();
                self.input_mode = InputMode::Normal;
                self.selected_link = self.links.links().len().saturating_sub(1);
                self.notify(ToastLevel::Success, "HotLink added successfully!");
            }
            Err(e) => {
                // Back to the URL field so the user can fix it.
                if e.is_validation() {
                    self.input_mode = InputMode::EditingLinkUrl;
                }
                self.report(e);
            }
        }
    }

    pub fn submit_task(&mut self) {
        let added = self.tasks.add(&self.input_task).map(|_| ());
        match added {
            Ok(()) => {
                self.input_task.clear();
                self.input_mode = InputMode::Normal;
                self.notify(ToastLevel::Success, "Task added successfully!");
            }
            Err(e) => self.report(e),
        }
    }

    pub fn remove_selected_link(&mut self) {
        let Some(id) = self.selected_link().map(|l| l.id.clone()) else {
            return;
        };
        match self.links.remove(&id) {
            Ok(true) => self.notify(ToastLevel::Success, "HotLink removed successfully!"),
            Ok(false) => {}
            Err(e) => self.report(e),
        }
        self.clamp_selection();
    }

    pub fn open_selected_link(&mut self) {
        let Some(url) = self.selected_link().map(|l| l.url.clone()) else {
            return;
        };
        if let Err(e) = link::open(&url) {
            self.notify(ToastLevel::Error, e.to_string());
        }
    }

    pub fn toggle_selected_task(&mut self) {
        let Some(id) = self.selected_task().map(|t| t.id.clone()) else {
            return;
        };
        if let Err(e) = self.tasks.toggle_complete(&id) {
            self.report(e);
        }
    }

    pub fn activate_selected_task(&mut self) {
        let Some(id) = self.selected_task().map(|t| t.id.clone()) else {
            return;
        };
        if let Err(e) = self.tasks.set_active(&id) {
            self.report(e);
        }
    }

    pub fn delete_selected_task(&mut self) {
        let Some(id) = self.selected_task().map(|t| t.id.clone()) else {
            return;
        };
        match self.tasks.delete(&id) {
            Ok(true) => self.notify(ToastLevel::Success, "Task deleted successfully!"),
            Ok(false) => {}
            Err(e) => self.report(e),
        }
        self.clamp_selection();
    }

    pub fn delete_selected(&mut self) {
        match self.panel {
            Panel::Links => self.remove_selected_link(),
            Panel::Tasks => self.delete_selected_task(),
        }
    }

    pub fn open_history(&mut self) {
        self.input_mode = InputMode::History;
        self.selected_history = 0;
        self.toast = None;
    }

    pub fn cycle_history_filter(&mut self) {
        self.history_filter = self.history_filter.cycle();
        self.selected_history = 0;
    }

    pub fn restore_selected_history(&mut self) {
        let Some(id) = self.selected_history().map(|t| t.id.clone()) else {
            return;
        };
        match self.tasks.restore(&id) {
            Ok(true) => self.notify(ToastLevel::Success, "Task restored"),
            Ok(false) => {}
            Err(e) => self.report(e),
        }
        self.clamp_selection();
    }

    pub fn purge_selected_history(&mut self) {
        let Some(id) = self.selected_history().map(|t| t.id.clone()) else {
            return;
        };
        match self.tasks.purge(&id) {
            Ok(true) => self.notify(ToastLevel::Success, "Task removed from history"),
            Ok(false) => {}
            Err(e) => self.report(e),
        }
        self.clamp_selection();
    }

    pub fn clear_history(&mut self) {
        match self.tasks.clear_history() {
            Ok(n) => self.notify(ToastLevel::Success, format!("Cleared {} task(s) from history", n)),
            Err(e) => self.report(e),
        }
        self.clamp_selection();
    }

    pub fn toggle_theme(&mut self) {
        match self.theme.toggle() {
            Ok(Theme::GoldenPurple) => self.notify(ToastLevel::Success, "Golden Purple theme"),
            Ok(Theme::DaybreakBlue) => self.notify(ToastLevel::Success, "Daybreak Blue theme"),
            Err(e) => self.report(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn app() -> (Arc<MemoryStore>, App<Arc<MemoryStore>>) {
        let store = Arc::new(MemoryStore::new());
        let app = App::from_data(Arc::clone(&store), DashboardData::default());
        (store, app)
    }

    #[test]
    fn empty_task_warns_and_keeps_editing() {
        let (_store, mut app) = app();
        app.begin_add();
        assert_eq!(app.input_mode, InputMode::EditingTask);
        app.input_task = "   ".into();
        app.submit_task();
        assert_eq!(app.input_mode, InputMode::EditingTask);
        assert_eq!(
            app.toast,
            Some(Toast {
                level: ToastLevel::Warning,
                text: "Please enter a task".into()
            })
        );
        assert!(app.tasks.todo().is_empty());
    }

    #[test]
    fn add_toggle_delete_restore_flow() {
        let (_store, mut app) = app();
        for text in ["first", "second"] {
            app.begin_add();
            app.input_task = text.into();
            app.submit_task();
        }
        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(app.selected_task().map(|t| t.text.as_str()), Some("first"));

        app.toggle_selected_task();
        assert_eq!(app.selected_task().map(|t| t.text.as_str()), Some("second"));

        app.select_next();
        assert_eq!(app.selected_task().map(|t| t.text.as_str()), Some("first"));
        app.delete_selected();
        assert_eq!(app.tasks.todo().len(), 1);
        assert_eq!(app.selected_task, 0);

        app.open_history();
        assert_eq!(app.selected_history().map(|t| t.text.as_str()), Some("first"));
        app.cycle_history_filter();
        assert_eq!(app.history_filter, HistoryFilter::Completed);
        app.restore_selected_history();
        assert!(app.tasks.deleted().is_empty());
        let restored = app.tasks.todo().iter().find(|t| t.text == "first").unwrap();
        assert!(restored.completed);
    }

    #[test]
    fn link_form_round_trip() {
        let (_store, mut app) = app();
        app.panel = Panel::Links;
        app.begin_add();
        app.submit_link();
        assert_eq!(app.input_mode, InputMode::EditingLinkUrl);
        assert_eq!(app.toast.as_ref().map(|t| t.level), Some(ToastLevel::Warning));

        app.link_form.url = "example.com".into();
        app.link_form.name = "Example".into();
        app.submit_link();
        assert_eq!(app.input_mode, InputMode::Normal);
        let link = app.selected_link().unwrap();
        assert_eq!(link.url, "https://example.com");
        assert_eq!(link.name, "Example");

        app.delete_selected();
        assert!(app.links.links().is_empty());
        assert_eq!(
            app.toast.as_ref().map(|t| t.text.as_str()),
            Some("HotLink removed successfully!")
        );
    }

    #[test]
    fn storage_failure_surfaces_as_error_toast() {
        let (store, mut app) = app();
        store.fail_writes(true);
        app.toggle_theme();
        assert_eq!(app.theme.get(), Theme::DaybreakBlue);
        assert_eq!(app.toast.as_ref().map(|t| t.level), Some(ToastLevel::Error));

        app.begin_add();
        app.input_task = "x".into();
        app.submit_task();
        assert_eq!(app.input_mode, InputMode::EditingTask);
        assert!(app.tasks.todo().is_empty());
    }

    #[test]
    fn selection_stays_in_bounds() {
        let (_store, mut app) = app();
        app.select_next();
        app.select_prev();
        assert_eq!(app.selected_task, 0);
        assert!(app.selected_task().is_none());
        app.delete_selected();
        app.toggle_selected_task();
        assert!(app.toast.is_none());
    }
}
