use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use crate::config::Config;
use crate::domain::{GoalDraft, Planner, TaskDraft, Theme};
use crate::error::StorageError;
use crate::storage::{self, BlobStore};
use crate::timer::{TimeCommit, Timer};
use crate::view::{ALL_CATEGORIES, ViewModel, ViewState, build_view};

/// Single owner of the planner. Every mutation goes through here and, when
/// it changed something, is written back to the store as a full snapshot.
pub struct Workspace<S: BlobStore> {
	planner: Planner,
	pub view: ViewState,
	timer: Timer,
	store: S,
	storage_key: String,
}

impl<S: BlobStore> Workspace<S> {
	pub fn open(store: S, config: &Config, today: NaiveDate) -> Result<Self, StorageError> {
		let planner = storage::load_planner(&store, &config.storage_key)?;
		let mut view = ViewState::new(today);
		view.view_mode = config.view_mode;
		view.sort_option = config.sort_option;
		view.auto_sort = config.auto_sort;

		Ok(Self {
			planner,
			view,
			timer: Timer::new(),
			store,
			storage_key: config.storage_key.clone(),
		})
	}

	pub fn planner(&self) -> &Planner {
		&self.planner
	}

	pub fn timer(&self) -> &Timer {
		&self.timer
	}

	#[cfg(test)]
	pub fn store(&self) -> &S {
		&self.store
	}

	pub fn build_view(&self, today: NaiveDate) -> ViewModel<'_> {
		build_view(&self.planner, &self.view, today)
	}

	pub fn cycle_category_filter(&mut self) {
		self.view.cycle_category(&self.planner);
	}

	pub fn save(&mut self) -> Result<(), StorageError> {
		storage::save_planner(&mut self.store, &self.storage_key, &self.planner)
	}

	fn commit(&mut self, changed: bool) -> Result<bool, StorageError> {
		if changed {
			self.save()?;
			debug!(key = %self.storage_key, "planner saved");
		}
		Ok(changed)
	}

	pub fn create_task(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> Result<Option<String>, StorageError> {
		let id = self.planner.create_task(draft, now);
		self.commit(id.is_some())?;
		Ok(id)
	}

	pub fn update_task(&mut self, id: &str, draft: TaskDraft) -> Result<bool, StorageError> {
		let changed = self.planner.update_task(id, draft);
		self.commit(changed)
	}

	pub fn delete_task(&mut self, id: &str) -> Result<bool, StorageError> {
		let changed = self.planner.delete_task(id);
		if changed && self.timer.selected_task() == Some(id) {
			// Nothing left to credit the running time to.
			self.timer.cancel();
			self.timer.select_task(None);
		}
		self.commit(changed)
	}

	pub fn toggle_completion(&mut self, id: &str) -> Result<bool, StorageError> {
		let changed = self.planner.toggle_completion(id);
		self.commit(changed)
	}

	pub fn add_category(&mut self, name: &str) -> Result<Option<String>, StorageError> {
		let id = self.planner.add_category(name);
		self.commit(id.is_some())?;
		Ok(id)
	}

	pub fn remove_category(&mut self, id: &str) -> Result<bool, StorageError> {
		let changed = self.planner.remove_category(id);
		if changed && self.view.category_filter == id {
			self.view.category_filter = ALL_CATEGORIES.to_string();
		}
		self.commit(changed)
	}

	pub fn add_goal(&mut self, draft: GoalDraft) -> Result<Option<String>, StorageError> {
		let id = self.planner.add_goal(draft);
		self.commit(id.is_some())?;
		Ok(id)
	}

	pub fn delete_goal(&mut self, id: &str) -> Result<bool, StorageError> {
		let changed = self.planner.delete_goal(id);
		self.commit(changed)
	}

	pub fn log_time(&mut self, task_id: &str, elapsed_seconds: u64) -> Result<bool, StorageError> {
		let changed = self.planner.log_time(task_id, elapsed_seconds);
		self.commit(changed)
	}

	pub fn reset_logged_time(&mut self, task_id: &str) -> Result<bool, StorageError> {
		let changed = self.planner.reset_logged_time(task_id);
		self.commit(changed)
	}

	pub fn set_theme(&mut self, theme: Theme) -> Result<bool, StorageError> {
		let changed = self.planner.set_theme(theme);
		self.commit(changed)
	}

	pub fn toggle_theme(&mut self) -> Result<Theme, StorageError> {
		let theme = self.planner.theme.toggled();
		self.set_theme(theme)?;
		Ok(theme)
	}

	pub fn import_json(&mut self, raw: &str) -> Result<Vec<&'static str>, StorageError> {
		let replaced = storage::import_json(&mut self.planner, raw)?;
		let orphaned = self
			.timer
			.selected_task()
			.is_some_and(|task_id| self.planner.task(task_id).is_none());
		if orphaned {
			self.timer.cancel();
			self.timer.select_task(None);
		}
		let filter = &self.view.category_filter;
		if filter != ALL_CATEGORIES && self.planner.category(filter).is_none() {
			self.view.category_filter = ALL_CATEGORIES.to_string();
		}
		self.commit(true)?;
		Ok(replaced)
	}

	pub fn export_json(&self) -> Result<String, StorageError> {
		storage::export_json(&self.planner)
	}

	pub fn select_timer_task(&mut self, task_id: Option<String>) -> bool {
		self.timer.select_task(task_id)
	}

	pub fn start_timer(&mut self, now: Instant) -> bool {
		let started = self.timer.start(now);
		if started {
			debug!(task_id = ?self.timer.selected_task(), "timer started");
		}
		started
	}

	pub fn poll_timer(&mut self, now: Instant) -> u64 {
		self.timer.poll(now)
	}

	pub fn reset_timer(&mut self) {
		self.timer.reset();
	}

	/// Stops the timer and credits the elapsed seconds to its task.
	pub fn stop_timer(&mut self) -> Result<Option<TimeCommit>, StorageError> {
		let Some(commit) = self.timer.stop() else {
			return Ok(None);
		};
		self.log_time(&commit.task_id, commit.seconds)?;
		info!(task_id = %commit.task_id, seconds = commit.seconds, "timer stopped");
		Ok(Some(commit))
	}
}

#[cfg(test)]
mod tests {
	use std::time::{Duration, Instant};

	use chrono::{NaiveDate, TimeZone, Utc};

	use super::Workspace;
	use crate::config::Config;
	use crate::domain::{SENTINEL_CATEGORY_ID, TaskDraft, Theme};
	use crate::storage::{BlobStore, DEFAULT_STORAGE_KEY, MemoryStore, decode_planner};
	use crate::view::ViewMode;

	fn today() -> NaiveDate {
		NaiveDate::from_ymd_opt(2026, 2, 11).unwrap()
	}

	fn workspace() -> Workspace<MemoryStore> {
		Workspace::open(MemoryStore::default(), &Config::default(), today()).expect("open")
	}

	fn stored(workspace: &Workspace<MemoryStore>) -> Option<String> {
		workspace.store().get(DEFAULT_STORAGE_KEY).unwrap()
	}

	fn add_task(workspace: &mut Workspace<MemoryStore>, title: &str) -> String {
		let now = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
		workspace
			.create_task(TaskDraft::new(title, Some(today())), now)
			.unwrap()
			.expect("task created")
	}

	#[test]
	fn open_applies_config_defaults_to_view_state() {
		let config = Config {
			view_mode: ViewMode::Week,
			auto_sort: false,
			..Config::default()
		};
		let workspace = Workspace::open(MemoryStore::default(), &config, today()).unwrap();
		assert_eq!(workspace.view.view_mode, ViewMode::Week);
		assert!(!workspace.view.auto_sort);
	}

	#[test]
	fn committed_mutations_are_persisted() {
		let mut workspace = workspace();
		assert_eq!(stored(&workspace), None);

		let id = add_task(&mut workspace, "Lab report");
		let snapshot = decode_planner(&stored(&workspace).unwrap()).unwrap();
		assert_eq!(snapshot.tasks.len(), 1);

		workspace.toggle_completion(&id).unwrap();
		workspace.set_theme(Theme::Dark).unwrap();
		let snapshot = decode_planner(&stored(&workspace).unwrap()).unwrap();
		assert!(snapshot.tasks[0].completed);
		assert_eq!(snapshot.theme, Theme::Dark);
	}

	#[test]
	fn rejected_mutations_do_not_write() {
		let mut workspace = workspace();
		assert!(!workspace.remove_category(SENTINEL_CATEGORY_ID).unwrap());
		assert!(!workspace.delete_task("missing").unwrap());
		assert_eq!(workspace.add_category("").unwrap(), None);
		assert_eq!(stored(&workspace), None);
	}

	#[test]
	fn stopping_timer_credits_ticks_to_task() {
		let mut workspace = workspace();
		let id = add_task(&mut workspace, "Vocabulary");

		let start = Instant::now();
		assert!(workspace.select_timer_task(Some(id.clone())));
		assert!(workspace.start_timer(start));
		assert_eq!(workspace.poll_timer(start + Duration::from_secs(5)), 5);
		let commit = workspace.stop_timer().unwrap().expect("commit");

		assert_eq!(commit.seconds, 5);
		assert_eq!(workspace.planner().task(&id).unwrap().logged_seconds, 5);
		assert_eq!(workspace.timer().elapsed_seconds(), 0);
		let snapshot = decode_planner(&stored(&workspace).unwrap()).unwrap();
		assert_eq!(snapshot.tasks[0].logged_seconds, 5);
	}

	#[test]
	fn polling_drives_ticks() {
		let mut workspace = workspace();
		let id = add_task(&mut workspace, "Past papers");
		let start = Instant::now();
		workspace.select_timer_task(Some(id.clone()));
		workspace.start_timer(start);

		assert_eq!(workspace.poll_timer(start + Duration::from_secs(3)), 3);
		workspace.stop_timer().unwrap();
		assert_eq!(workspace.planner().task(&id).unwrap().logged_seconds, 3);
	}

	#[test]
	fn deleting_timed_task_cancels_timer() {
		let mut workspace = workspace();
		let id = add_task(&mut workspace, "Summary sheet");
		workspace.select_timer_task(Some(id.clone()));
		let start = Instant::now();
		workspace.start_timer(start);
		workspace.poll_timer(start + Duration::from_secs(1));

		assert!(workspace.delete_task(&id).unwrap());
		assert!(!workspace.timer().is_running());
		assert_eq!(workspace.timer().selected_task(), None);
		assert_eq!(workspace.stop_timer().unwrap(), None);
	}

	#[test]
	fn removing_filtered_category_resets_filter() {
		let mut workspace = workspace();
		let category = workspace.add_category("Physics").unwrap().unwrap();
		workspace.view.category_filter = category.clone();
		assert!(workspace.remove_category(&category).unwrap());
		assert_eq!(workspace.view.category_filter, "all");
	}

	#[test]
	fn import_that_drops_timed_task_cancels_timer() {
		let mut workspace = workspace();
		let id = add_task(&mut workspace, "Problem set");
		let start = Instant::now();
		workspace.select_timer_task(Some(id.clone()));
		workspace.start_timer(start);
		workspace.poll_timer(start + Duration::from_secs(4));

		workspace.import_json(r#"{"tasks": []}"#).unwrap();
		assert!(!workspace.timer().is_running());
		assert_eq!(workspace.timer().selected_task(), None);
		assert_eq!(workspace.stop_timer().unwrap(), None);
	}

	#[test]
	fn import_keeps_timer_when_task_survives() {
		let mut workspace = workspace();
		let id = add_task(&mut workspace, "Problem set");
		workspace.select_timer_task(Some(id.clone()));
		workspace.start_timer(Instant::now());

		workspace.import_json(r#"{"theme": "dark"}"#).unwrap();
		assert!(workspace.timer().is_running());
		assert_eq!(workspace.timer().selected_task(), Some(id.as_str()));
	}

	#[test]
	fn import_dropping_filtered_category_resets_filter() {
		let mut workspace = workspace();
		workspace.view.category_filter = "cat-exam".to_string();
		workspace
			.import_json(r#"{"categories": [{"id": "cat-lang", "name": "Languages", "color": "blue"}]}"#)
			.unwrap();
		assert_eq!(workspace.view.category_filter, "all");

		workspace.view.category_filter = "cat-lang".to_string();
		workspace.import_json(r#"{"theme": "dark"}"#).unwrap();
		assert_eq!(workspace.view.category_filter, "cat-lang");
	}

	#[test]
	fn malformed_import_keeps_state_and_store() {
		let mut workspace = workspace();
		add_task(&mut workspace, "Reading");
		let before_store = stored(&workspace);
		let before = workspace.planner().clone();

		assert!(workspace.import_json("not json").is_err());
		assert_eq!(workspace.planner(), &before);
		assert_eq!(stored(&workspace), before_store);
	}
}
