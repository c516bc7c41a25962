use crate::{
    bridge::DotnetBridge,
    config::{self, Config},
    entries::{Category, EntrySet, PathEntry},
    pathops,
    project::ProjectIo,
    writer,
};
use anyhow::Result;
use std::{
    collections::BTreeSet,
    path::PathBuf,
    time::{Duration, Instant, SystemTime},
};

const CONFIG_RELOAD_DELAY_MS: u64 = 100;

pub const INITIAL_STATUS: &str =
    "Set source exe + project to extract / set destination exe before writing";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPurpose {
    ProjectPath,
    SourceExe,
    DestExe,
    OutputName,
    SearchText,
    ReplaceText,
    EditPath { category: Category, row: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing {
        prompt: String,
        buffer: String,
        purpose: InputPurpose,
    },
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

pub struct App {
    pub config: Config,
    config_path: PathBuf,
    config_mtime: Option<SystemTime>,
    config_reload_at: Option<Instant>,
    updating_from_file: bool,
    pub source_root: String,
    pub dest_root: String,
    pub project_path: Option<PathBuf>,
    pub entries: EntrySet,
    pub tab: Category,
    pub selected: [usize; 3],
    pub marked: [BTreeSet<usize>; 3],
    pub search_text: String,
    pub replace_with: String,
    pub status: String,
    pub logs: Vec<LogEntry>,
    pub input_mode: InputMode,
    pub should_quit: bool,
    bridge: Box<dyn ProjectIo>,
}

// Roots are derived lexically: an .exe path contributes its parent
// directory, a directory-looking path contributes itself.
pub fn root_from_exe(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('"');
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.to_ascii_lowercase().ends_with(".exe") {
        return pathops::level_up(trimmed).unwrap_or_default();
    }
    let trimmed_end = trimmed.trim_end_matches(['/', '\\']);
    let last = trimmed_end
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed_end);
    if last.contains('.') {
        String::new()
    } else {
        trimmed_end.to_string()
    }
}

impl App {
    pub fn initialize() -> Result<Self> {
        Self::with_bridge(Box::new(DotnetBridge::new()), config::config_path()?)
    }

    pub fn with_bridge(bridge: Box<dyn ProjectIo>, config_path: PathBuf) -> Result<Self> {
        let mut startup_logs = Vec::new();
        let config = match Config::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                startup_logs.push(LogEntry {
                    level: LogLevel::Warn,
                    message: format!("config unreadable, using defaults: {err}"),
                });
                Config::default()
            }
        };
        let config_mtime = config::modified_at(&config_path);

        let mut app = Self {
            source_root: root_from_exe(&config.exe_old),
            dest_root: root_from_exe(&config.exe_new),
            config,
            config_path,
            config_mtime,
            config_reload_at: None,
            updating_from_file: false,
            project_path: None,
            entries: EntrySet::default(),
            tab: Category::Models,
            selected: [0; 3],
            marked: [BTreeSet::new(), BTreeSet::new(), BTreeSet::new()],
            search_text: String::new(),
            replace_with: String::new(),
            status: INITIAL_STATUS.to_string(),
            logs: startup_logs,
            input_mode: InputMode::Normal,
            should_quit: false,
            bridge,
        };
        app.clamp_selection();
        Ok(app)
    }

    pub fn log_info(&mut self, message: String) {
        self.logs.push(LogEntry {
            level: LogLevel::Info,
            message,
        });
    }

    pub fn log_warn(&mut self, message: String) {
        self.logs.push(LogEntry {
            level: LogLevel::Warn,
            message,
        });
    }

    pub fn log_error(&mut self, message: String) {
        self.logs.push(LogEntry {
            level: LogLevel::Error,
            message,
        });
    }

    fn tab_index(&self) -> usize {
        match self.tab {
            Category::Models => 0,
            Category::Accessories => 1,
            Category::Media => 2,
        }
    }

    pub fn switch_tab(&mut self, forward: bool) {
        let order = Category::all();
        let index = self.tab_index();
        let next = if forward {
            (index + 1) % order.len()
        } else {
            (index + order.len() - 1) % order.len()
        };
        self.tab = order[next];
        self.clamp_selection();
    }

    pub fn row_count(&self) -> usize {
        self.entries.rows(self.tab).len()
    }

    pub fn selected_row(&self) -> usize {
        self.selected[self.tab_index()]
    }

    pub fn move_selection(&mut self, delta: isize) {
        let count = self.row_count();
        if count == 0 {
            return;
        }
        let index = self.tab_index();
        let current = self.selected[index] as isize;
        let next = (current + delta).clamp(0, count as isize - 1);
        self.selected[index] = next as usize;
    }

    pub fn clamp_selection(&mut self) {
        for (index, category) in Category::all().into_iter().enumerate() {
            let count = self.entries.rows(category).len();
            if count == 0 {
                self.selected[index] = 0;
                self.marked[index].clear();
            } else {
                self.selected[index] = self.selected[index].min(count - 1);
                self.marked[index].retain(|&row| row < count);
            }
        }
    }

    pub fn toggle_mark(&mut self) {
        if self.row_count() == 0 {
            return;
        }
        let index = self.tab_index();
        let row = self.selected[index];
        if !self.marked[index].remove(&row) {
            self.marked[index].insert(row);
        }
    }

    pub fn marked_rows(&self) -> &BTreeSet<usize> {
        &self.marked[self.tab_index()]
    }

    // Marked rows if any, otherwise the cursor row.
    fn target_rows(&self) -> Vec<usize> {
        if self.row_count() == 0 {
            return Vec::new();
        }
        let index = self.tab_index();
        if self.marked[index].is_empty() {
            vec![self.selected[index]]
        } else {
            self.marked[index].iter().copied().collect()
        }
    }

    pub fn set_project_path(&mut self, raw: &str) {
        let trimmed = raw.trim().trim_matches('"');
        let path = PathBuf::from(trimmed);
        let is_pmm = trimmed.to_ascii_lowercase().ends_with(".pmm");
        if !trimmed.is_empty() && is_pmm && path.exists() {
            self.status = format!("Project selected: {}", path.display());
            self.project_path = Some(path);
        } else {
            self.project_path = None;
            self.status = "Select an existing .pmm project file".to_string();
        }
    }

    pub fn load_project_and_extract(&mut self, raw: &str) {
        self.set_project_path(raw);
        if self.project_path.is_some() {
            self.extract();
        }
    }

    // An unset source root is fine: relative stored paths are then shown
    // verbatim, since empty-root resolution is the identity.
    pub fn extract(&mut self) {
        let Some(path) = self.project_path.clone() else {
            self.status = "No project file selected".to_string();
            return;
        };

        match self.bridge.extract(&path) {
            Ok(records) => {
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let summary = records.summary(&file_name);
                // replace displayed data only on success
                self.entries = EntrySet::from_records(&records, &self.source_root);
                self.selected = [0; 3];
                for marks in &mut self.marked {
                    marks.clear();
                }
                self.status = summary.clone();
                self.log_info(summary);
            }
            Err(err) => {
                self.status = "Path extraction failed".to_string();
                self.log_error(err.to_string());
            }
        }
    }

    pub fn write_output(&mut self) {
        let Some(path) = self.project_path.clone() else {
            self.status = "No project file selected".to_string();
            return;
        };
        if self.entries.is_empty() {
            self.status = "Nothing extracted yet".to_string();
            return;
        }
        if self.dest_root.is_empty() {
            self.log_warn("destination exe not set; stored paths stay absolute".to_string());
        }

        let mut rebased_warnings = Vec::new();
        let records = self
            .entries
            .to_records(&self.dest_root, |warning| rebased_warnings.push(warning));
        for warning in rebased_warnings {
            self.log_warn(warning);
        }

        match writer::write_output(self.bridge.as_ref(), &path, &self.config.output_name, &records)
        {
            Ok(output) => {
                let message = format!("Project written: {}", output.display());
                self.status = message.clone();
                self.log_info(message);
            }
            Err(err) => {
                self.status = "Path rewrite failed".to_string();
                self.log_error(format!("write failed: {err:#}"));
            }
        }
    }

    pub fn level_up_rows(&mut self) {
        let rows = self.target_rows();
        if rows.is_empty() {
            self.status = "No rows selected".to_string();
            return;
        }
        let modified = self.entries.apply_rows(self.tab, &rows, PathEntry::level_up);
        self.status = if modified > 0 {
            "Moved selection up one level".to_string()
        } else {
            "Nothing to move up".to_string()
        };
    }

    pub fn level_down_rows(&mut self) {
        let rows = self.target_rows();
        if rows.is_empty() {
            self.status = "No rows selected".to_string();
            return;
        }
        let modified = self
            .entries
            .apply_rows(self.tab, &rows, PathEntry::level_down);
        self.status = if modified > 0 {
            "Moved selection down one level".to_string()
        } else {
            "Nothing to move down".to_string()
        };
    }

    pub fn clear_rows(&mut self) {
        let rows = self.target_rows();
        if rows.is_empty() {
            self.status = "No rows selected".to_string();
            return;
        }
        self.entries.apply_rows(self.tab, &rows, PathEntry::clear);
        self.status = "Cleared selected rows".to_string();
    }

    pub fn reset_rows(&mut self) {
        let rows = self.target_rows();
        if rows.is_empty() {
            self.status = "No rows selected".to_string();
            return;
        }
        self.entries.apply_rows(self.tab, &rows, PathEntry::reset);
        self.status = "Reset selected rows".to_string();
    }

    pub fn replace_in_rows(&mut self, all_occurrences: bool) {
        if self.search_text.is_empty() {
            self.status = "Nothing to search for".to_string();
            return;
        }
        let rows = self.target_rows();
        if rows.is_empty() {
            self.status = "No rows selected".to_string();
            return;
        }

        let search = self.search_text.clone();
        let replace = self.replace_with.clone();
        let modified = if all_occurrences {
            self.entries
                .apply_rows(self.tab, &rows, |entry| entry.replace_all(&search, &replace))
        } else {
            let mut done = 0;
            for &row in &rows {
                if self
                    .entries
                    .apply_rows(self.tab, &[row], |entry| entry.replace_first(&search, &replace))
                    > 0
                {
                    done = 1;
                    break;
                }
            }
            done
        };
        self.status = format!("Replaced in {modified} row(s)");
    }

    pub fn begin_edit(&mut self, purpose: InputPurpose) {
        let (prompt, buffer) = match &purpose {
            InputPurpose::ProjectPath => (
                "Project (.pmm) path".to_string(),
                self.project_path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default(),
            ),
            InputPurpose::SourceExe => ("Source MMD exe".to_string(), self.config.exe_old.clone()),
            InputPurpose::DestExe => (
                "Destination MMD exe".to_string(),
                self.config.exe_new.clone(),
            ),
            InputPurpose::OutputName => (
                "Output file suffix".to_string(),
                self.config.output_name.clone(),
            ),
            InputPurpose::SearchText => ("Search for".to_string(), self.search_text.clone()),
            InputPurpose::ReplaceText => ("Replace with".to_string(), self.replace_with.clone()),
            InputPurpose::EditPath { category, row } => {
                let Some(entry) = self.entries.rows(*category).get(*row) else {
                    return;
                };
                ("Edit path".to_string(), entry.current.clone())
            }
        };
        self.input_mode = InputMode::Editing {
            prompt,
            buffer,
            purpose,
        };
    }

    pub fn begin_edit_selected_path(&mut self) {
        if self.row_count() == 0 {
            self.status = "No rows selected".to_string();
            return;
        }
        self.begin_edit(InputPurpose::EditPath {
            category: self.tab,
            row: self.selected_row(),
        });
    }

    pub fn handle_submit(&mut self, purpose: InputPurpose, value: String) {
        match purpose {
            InputPurpose::ProjectPath => self.set_project_path(&value),
            InputPurpose::SourceExe => {
                self.config.exe_old = value.trim().trim_matches('"').to_string();
                self.source_root = root_from_exe(&self.config.exe_old);
                self.save_config();
                self.status = if self.source_root.is_empty() {
                    "Source root unset".to_string()
                } else {
                    format!("Source root: {}", self.source_root)
                };
            }
            InputPurpose::DestExe => {
                self.config.exe_new = value.trim().trim_matches('"').to_string();
                self.dest_root = root_from_exe(&self.config.exe_new);
                self.save_config();
                self.status = if self.dest_root.is_empty() {
                    "Destination root unset".to_string()
                } else {
                    format!("Destination root: {}", self.dest_root)
                };
            }
            InputPurpose::OutputName => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    self.status = "Output suffix unchanged".to_string();
                    return;
                }
                let old = self.config.output_name.clone();
                self.config.output_name = trimmed.to_string();
                self.save_config();
                let message = format!("Output suffix changed from '{old}' to '{trimmed}'");
                self.status = message.clone();
                self.log_info(message);
            }
            InputPurpose::SearchText => {
                self.search_text = value;
                self.status = "Search text set".to_string();
            }
            InputPurpose::ReplaceText => {
                self.replace_with = value;
                self.status = "Replacement text set".to_string();
            }
            InputPurpose::EditPath { category, row } => {
                if let Some(entry) = self.entries.rows_mut(category).get_mut(row) {
                    entry.current = value;
                    self.status = "Path updated".to_string();
                }
            }
        }
    }

    pub fn save_config(&mut self) {
        if self.updating_from_file {
            return;
        }
        if let Err(err) = self.config.save(&self.config_path) {
            self.log_warn(format!("config save failed: {err:#}"));
            return;
        }
        // own write must not arm the reload debounce
        self.config_mtime = config::modified_at(&self.config_path);
    }

    pub fn tick(&mut self) {
        let mtime = config::modified_at(&self.config_path);
        if mtime != self.config_mtime {
            self.config_mtime = mtime;
            if !self.updating_from_file {
                self.config_reload_at =
                    Some(Instant::now() + Duration::from_millis(CONFIG_RELOAD_DELAY_MS));
            }
        }

        if let Some(deadline) = self.config_reload_at {
            if Instant::now() >= deadline {
                self.config_reload_at = None;
                self.reload_config_from_file();
            }
        }
    }

    fn reload_config_from_file(&mut self) {
        if self.updating_from_file {
            return;
        }
        self.updating_from_file = true;

        match Config::load(&self.config_path) {
            Ok(config) => {
                let mut changed = false;
                if config.exe_old != self.config.exe_old {
                    self.source_root = root_from_exe(&config.exe_old);
                    changed = true;
                }
                if config.exe_new != self.config.exe_new {
                    self.dest_root = root_from_exe(&config.exe_new);
                    changed = true;
                }
                if config.output_name != self.config.output_name {
                    changed = true;
                }
                self.config = config;
                if changed {
                    self.log_info("configuration reloaded from file".to_string());
                }
            }
            Err(err) => {
                self.log_warn(format!("config reload failed: {err:#}"));
            }
        }

        self.updating_from_file = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{MediaRecords, ModelRecord, ProjectError, ProjectRecords};
    use std::{cell::RefCell, path::Path, rc::Rc};

    struct FakeIo {
        records: ProjectRecords,
        applied: Rc<RefCell<Vec<ProjectRecords>>>,
        fail_extract: bool,
    }

    impl ProjectIo for FakeIo {
        fn extract(&self, _: &Path) -> Result<ProjectRecords, ProjectError> {
            if self.fail_extract {
                return Err(ProjectError::Parse("broken header".to_string()));
            }
            Ok(self.records.clone())
        }

        fn apply(&self, _: &Path, records: &ProjectRecords) -> Result<(), ProjectError> {
            self.applied.borrow_mut().push(records.clone());
            Ok(())
        }
    }

    fn sample_records() -> ProjectRecords {
        ProjectRecords {
            models: vec![ModelRecord {
                name: Some("Miku".to_string()),
                path: Some("UserFile/model.pmx".to_string()),
            }],
            accessories: Vec::new(),
            media: Some(MediaRecords::default()),
        }
    }

    fn app_with(
        records: ProjectRecords,
        fail_extract: bool,
    ) -> (App, Rc<RefCell<Vec<ProjectRecords>>>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let applied = Rc::new(RefCell::new(Vec::new()));
        let io = FakeIo {
            records,
            applied: Rc::clone(&applied),
            fail_extract,
        };
        let mut app =
            App::with_bridge(Box::new(io), dir.path().join("config.txt")).unwrap();
        app.source_root = "/old/MMD".to_string();
        app.dest_root = "/new/MMD".to_string();
        (app, applied, dir)
    }

    #[test]
    fn constructor_reads_the_given_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.txt");
        std::fs::write(&config_path, "exe_old = /old/MMD/MikuMikuDance.exe\n").unwrap();

        let io = FakeIo {
            records: ProjectRecords::default(),
            applied: Rc::new(RefCell::new(Vec::new())),
            fail_extract: false,
        };
        let app = App::with_bridge(Box::new(io), config_path).unwrap();
        assert_eq!(app.config.exe_old, "/old/MMD/MikuMikuDance.exe");
        assert_eq!(app.source_root, "/old/MMD");
        assert_eq!(app.dest_root, "");
    }

    #[test]
    fn extract_without_source_root_shows_stored_paths() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("dance.pmm");
        std::fs::write(&project, b"pmm").unwrap();

        let (mut app, _, _config_dir) = app_with(sample_records(), false);
        app.source_root = String::new();
        app.load_project_and_extract(project.to_str().unwrap());

        assert_eq!(app.entries.models.len(), 1);
        assert_eq!(app.entries.models[0].current, "UserFile/model.pmx");
    }

    #[test]
    fn root_from_exe_cases() {
        assert_eq!(root_from_exe("/old/MMD/MikuMikuDance.exe"), "/old/MMD");
        assert_eq!(root_from_exe("C:\\MMD\\MikuMikuDance.EXE"), "C:\\MMD");
        assert_eq!(root_from_exe("/old/MMD"), "/old/MMD");
        assert_eq!(root_from_exe("/old/MMD/"), "/old/MMD");
        assert_eq!(root_from_exe("\"/old/MMD\""), "/old/MMD");
        assert_eq!(root_from_exe("/old/MMD/readme.txt"), "");
        assert_eq!(root_from_exe("   "), "");
    }

    #[test]
    fn extract_replaces_entries_only_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("dance.pmm");
        std::fs::write(&project, b"pmm").unwrap();

        let (mut app, _, _config_dir) = app_with(sample_records(), false);
        app.set_project_path(project.to_str().unwrap());
        app.extract();
        assert_eq!(app.entries.models.len(), 1);
        assert_eq!(app.entries.models[0].current, "/old/MMD/UserFile/model.pmx");
        assert_eq!(app.entries.media.len(), 3);

        // a failing re-extraction keeps the displayed data
        let applied = Rc::new(RefCell::new(Vec::new()));
        app.bridge = Box::new(FakeIo {
            records: ProjectRecords::default(),
            applied,
            fail_extract: true,
        });
        app.extract();
        assert_eq!(app.entries.models.len(), 1);
        assert_eq!(app.status, "Path extraction failed");
    }

    #[test]
    fn write_output_derives_stored_paths() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("dance.pmm");
        std::fs::write(&project, b"pmm").unwrap();

        let (mut app, applied, _config_dir) = app_with(sample_records(), false);
        app.set_project_path(project.to_str().unwrap());
        app.extract();
        app.entries.models[0].current = "/new/MMD/Data/model.pmx".to_string();
        app.write_output();

        let applied = applied.borrow();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].models[0].path.as_deref(), Some("Data/model.pmx"));
        assert!(dir.path().join("dance_out.pmm").exists());
    }

    #[test]
    fn cleared_row_writes_empty_reference() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("dance.pmm");
        std::fs::write(&project, b"pmm").unwrap();

        let (mut app, applied, _config_dir) = app_with(sample_records(), false);
        app.set_project_path(project.to_str().unwrap());
        app.extract();
        app.clear_rows();
        app.write_output();

        let applied = applied.borrow();
        assert_eq!(applied[0].models[0].path.as_deref(), Some(""));
    }

    #[test]
    fn row_operations_respect_marks() {
        let records = ProjectRecords {
            models: vec![
                ModelRecord {
                    name: None,
                    path: Some("a/one.pmx".to_string()),
                },
                ModelRecord {
                    name: None,
                    path: Some("b/two.pmx".to_string()),
                },
            ],
            accessories: Vec::new(),
            media: None,
        };
        let (mut app, _, _config_dir) = app_with(records, false);
        app.entries = EntrySet::from_records(
            &app.bridge.extract(Path::new("unused")).unwrap(),
            &app.source_root,
        );
        app.toggle_mark();
        app.move_selection(1);
        app.toggle_mark();
        app.level_up_rows();
        assert_eq!(app.entries.models[0].current, "/old/MMD/a");
        assert_eq!(app.entries.models[1].current, "/old/MMD/b");
    }

    #[test]
    fn zero_rows_is_noop() {
        let (mut app, _, _config_dir) = app_with(ProjectRecords::default(), false);
        app.level_up_rows();
        assert_eq!(app.status, "No rows selected");
    }

    #[test]
    fn replace_first_touches_one_row() {
        let records = ProjectRecords {
            models: vec![
                ModelRecord {
                    name: None,
                    path: Some("x/model.pmx".to_string()),
                },
                ModelRecord {
                    name: None,
                    path: Some("y/model.pmx".to_string()),
                },
            ],
            accessories: Vec::new(),
            media: None,
        };
        let (mut app, _, _config_dir) = app_with(records.clone(), false);
        app.entries = EntrySet::from_records(&records, &app.source_root);
        app.toggle_mark();
        app.move_selection(1);
        app.toggle_mark();
        app.search_text = "model".to_string();
        app.replace_with = "dancer".to_string();

        app.replace_in_rows(false);
        assert_eq!(app.entries.models[0].current, "/old/MMD/x/dancer.pmx");
        assert_eq!(app.entries.models[1].current, "/old/MMD/y/model.pmx");

        app.replace_in_rows(true);
        assert_eq!(app.entries.models[1].current, "/old/MMD/y/dancer.pmx");
    }
}
