use chrono::{DateTime, NaiveDate, Utc};
use rand::seq::SliceRandom;
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::{Deserialize, Serialize};
use tracing::debug;

const ID_LEN: usize = 8;

pub const SENTINEL_CATEGORY_ID: &str = "cat-all";
pub const SENTINEL_CATEGORY_NAME: &str = "All";
pub const DEFAULT_CATEGORY_COLOR: &str = "gray";

/// Colors handed out to new categories. Names match what the dashboard can render.
pub const CATEGORY_PALETTE: [&str; 10] = [
    "red",
    "green",
    "yellow",
    "blue",
    "magenta",
    "cyan",
    "light_red",
    "light_green",
    "light_blue",
    "light_magenta",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalPeriod {
    Weekly,
    Monthly,
}

impl GoalPeriod {
    pub fn label(self) -> &'static str {
        match self {
            GoalPeriod::Weekly => "weekly",
            GoalPeriod::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: NaiveDate,
    pub category_id: String,
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub planned_minutes: u32,
    #[serde(default)]
    pub logged_seconds: u64,
}

impl Task {
    pub fn logged_minutes(&self) -> u64 {
        (self.logged_seconds as f64 / 60.0).round() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub color: String,
}

impl Category {
    pub fn sentinel() -> Self {
        Self {
            id: SENTINEL_CATEGORY_ID.to_string(),
            name: SENTINEL_CATEGORY_NAME.to_string(),
            color: DEFAULT_CATEGORY_COLOR.to_string(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.id == SENTINEL_CATEGORY_ID
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub title: String,
    pub target_count: u32,
    pub target_minutes: u32,
    pub period: GoalPeriod,
}

/// Form input for creating or editing a task. Fields the edit form never
/// touches (completion, creation time, logged time) are absent on purpose.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub category_id: String,
    pub priority: Priority,
    pub planned_minutes: u32,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, due_date: Option<NaiveDate>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            due_date,
            category_id: SENTINEL_CATEGORY_ID.to_string(),
            priority: Priority::Medium,
            planned_minutes: 30,
        }
    }

    fn validated(&self) -> Option<(String, NaiveDate)> {
        let title = self.title.trim();
        if title.is_empty() {
            return None;
        }
        Some((title.to_string(), self.due_date?))
    }
}

impl From<&Task> for TaskDraft {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            due_date: Some(task.due_date),
            category_id: task.category_id.clone(),
            priority: task.priority,
            planned_minutes: task.planned_minutes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalDraft {
    pub title: String,
    pub target_count: u32,
    pub target_minutes: u32,
    pub period: GoalPeriod,
}

/// The persisted root. Everything the planner owns lives here and is
/// written back as one document after each committed mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Planner {
    pub tasks: Vec<Task>,
    pub categories: Vec<Category>,
    pub goals: Vec<Goal>,
    pub theme: Theme,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

impl Planner {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            categories: default_categories(),
            goals: vec![Goal {
                id: "goal-weekly".to_string(),
                title: "Weekly study target".to_string(),
                target_count: 10,
                target_minutes: 600,
                period: GoalPeriod::Weekly,
            }],
            theme: Theme::Light,
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|category| category.id == id)
    }

    pub fn goal(&self, id: &str) -> Option<&Goal> {
        self.goals.iter().find(|goal| goal.id == id)
    }

    /// Refused (like a missing title) when the draft names a category that
    /// does not exist.
    pub fn create_task(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> Option<String> {
        let (title, due_date) = draft.validated()?;
        self.category(&draft.category_id)?;
        let id = generate_id();
        self.tasks.push(Task {
            id: id.clone(),
            title,
            description: draft.description,
            due_date,
            category_id: draft.category_id,
            priority: draft.priority,
            completed: false,
            created_at: now,
            planned_minutes: draft.planned_minutes,
            logged_seconds: 0,
        });
        debug!(task_id = %id, "created task");
        Some(id)
    }

    pub fn update_task(&mut self, id: &str, draft: TaskDraft) -> bool {
        let Some((title, due_date)) = draft.validated() else {
            return false;
        };
        let known_category = self.category(&draft.category_id).is_some();
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
            return false;
        };
        // A loaded task may keep its orphaned category, but cannot be moved to a new unknown one.
        if !known_category && task.category_id != draft.category_id {
            return false;
        }

        task.title = title;
        task.description = draft.description;
        task.due_date = due_date;
        task.category_id = draft.category_id;
        task.priority = draft.priority;
        task.planned_minutes = draft.planned_minutes;
        debug!(task_id = %id, "updated task");
        true
    }

    pub fn delete_task(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        self.tasks.len() != before
    }

    pub fn toggle_completion(&mut self, id: &str) -> bool {
        match self.tasks.iter_mut().find(|task| task.id == id) {
            Some(task) => {
                task.completed = !task.completed;
                true
            }
            None => false,
        }
    }

    pub fn add_category(&mut self, name: &str) -> Option<String> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let id = format!("cat-{}", generate_id());
        self.categories.push(Category {
            id: id.clone(),
            name: name.to_string(),
            color: random_category_color(),
        });
        debug!(category_id = %id, "added category");
        Some(id)
    }

    pub fn remove_category(&mut self, id: &str) -> bool {
        if id == SENTINEL_CATEGORY_ID || self.category(id).is_none() {
            return false;
        }

        for task in self.tasks.iter_mut().filter(|task| task.category_id == id) {
            task.category_id = SENTINEL_CATEGORY_ID.to_string();
        }
        self.categories.retain(|category| category.id != id);
        debug!(category_id = %id, "removed category");
        true
    }

    pub fn add_goal(&mut self, draft: GoalDraft) -> Option<String> {
        let title = draft.title.trim();
        if title.is_empty() {
            return None;
        }

        let id = format!("goal-{}", generate_id());
        self.goals.push(Goal {
            id: id.clone(),
            title: title.to_string(),
            target_count: draft.target_count,
            target_minutes: draft.target_minutes,
            period: draft.period,
        });
        Some(id)
    }

    pub fn delete_goal(&mut self, id: &str) -> bool {
        let before = self.goals.len();
        self.goals.retain(|goal| goal.id != id);
        self.goals.len() != before
    }

    pub fn log_time(&mut self, task_id: &str, elapsed_seconds: u64) -> bool {
        if task_id.is_empty() || elapsed_seconds == 0 {
            return false;
        }

        match self.tasks.iter_mut().find(|task| task.id == task_id) {
            Some(task) => {
                task.logged_seconds = task.logged_seconds.saturating_add(elapsed_seconds);
                debug!(task_id, elapsed_seconds, "logged study time");
                true
            }
            None => false,
        }
    }

    pub fn reset_logged_time(&mut self, task_id: &str) -> bool {
        match self.tasks.iter_mut().find(|task| task.id == task_id) {
            Some(task) if task.logged_seconds > 0 => {
                task.logged_seconds = 0;
                true
            }
            _ => false,
        }
    }

    pub fn set_theme(&mut self, theme: Theme) -> bool {
        if self.theme == theme {
            return false;
        }
        self.theme = theme;
        true
    }

    /// Puts the sentinel category back at index 0. Returns whether the
    /// category list had to be repaired.
    pub fn ensure_sentinel(&mut self) -> bool {
        match self.categories.iter().position(Category::is_sentinel) {
            Some(0) => false,
            Some(index) => {
                let sentinel = self.categories.remove(index);
                self.categories.insert(0, sentinel);
                true
            }
            None => {
                self.categories.insert(0, Category::sentinel());
                true
            }
        }
    }
}

pub fn default_categories() -> Vec<Category> {
    vec![
        Category::sentinel(),
        Category {
            id: "cat-study".to_string(),
            name: "Study".to_string(),
            color: "blue".to_string(),
        },
        Category {
            id: "cat-exam".to_string(),
            name: "Exam Prep".to_string(),
            color: "red".to_string(),
        },
    ]
}

pub fn generate_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

fn random_category_color() -> String {
    CATEGORY_PALETTE
        .choose(&mut thread_rng())
        .copied()
        .unwrap_or(DEFAULT_CATEGORY_COLOR)
        .to_string()
}

pub fn format_seconds(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{
        GoalDraft, GoalPeriod, Planner, Priority, SENTINEL_CATEGORY_ID, TaskDraft, format_seconds,
    };

    fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn new_planner_starts_with_sentinel_and_weekly_goal() {
        let planner = Planner::new();
        assert_eq!(planner.categories[0].id, SENTINEL_CATEGORY_ID);
        assert_eq!(planner.categories.len(), 3);
        assert_eq!(planner.goals.len(), 1);
        assert_eq!(planner.goals[0].period, GoalPeriod::Weekly);
        assert!(planner.tasks.is_empty());
    }

    #[test]
    fn create_task_requires_title_and_due_date() {
        let mut planner = Planner::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();

        assert!(planner.create_task(TaskDraft::new("   ", Some(day(2026, 1, 2))), now).is_none());
        assert!(planner.create_task(TaskDraft::new("Read", None), now).is_none());
        assert!(planner.tasks.is_empty());

        let id = planner
            .create_task(TaskDraft::new("  Read chapter 3 ", Some(day(2026, 1, 2))), now)
            .expect("task should be created");
        let task = planner.task(&id).expect("task exists");
        assert_eq!(task.title, "Read chapter 3");
        assert_eq!(task.created_at, now);
        assert!(!task.completed);
        assert_eq!(task.logged_seconds, 0);
    }

    #[test]
    fn update_task_keeps_progress_fields() {
        let mut planner = Planner::new();
        let created = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let id = planner
            .create_task(TaskDraft::new("Essay", Some(day(2026, 1, 5))), created)
            .unwrap();
        planner.toggle_completion(&id);
        planner.log_time(&id, 90);

        let mut draft = TaskDraft::new("Essay draft 2", Some(day(2026, 1, 9)));
        draft.priority = Priority::High;
        assert!(planner.update_task(&id, draft));

        let task = planner.task(&id).unwrap();
        assert_eq!(task.title, "Essay draft 2");
        assert_eq!(task.due_date, day(2026, 1, 9));
        assert_eq!(task.priority, Priority::High);
        assert!(task.completed);
        assert_eq!(task.created_at, created);
        assert_eq!(task.logged_seconds, 90);

        assert!(!planner.update_task(&id, TaskDraft::new("", Some(day(2026, 1, 9)))));
        assert_eq!(planner.task(&id).unwrap().title, "Essay draft 2");
    }

    #[test]
    fn tasks_must_reference_existing_categories() {
        let mut planner = Planner::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();

        let mut draft = TaskDraft::new("Geometry", Some(day(2026, 1, 4)));
        draft.category_id = "cat-does-not-exist".to_string();
        assert!(planner.create_task(draft.clone(), now).is_none());
        assert!(planner.tasks.is_empty());

        let id = planner
            .create_task(TaskDraft::new("Geometry", Some(day(2026, 1, 4))), now)
            .unwrap();
        assert!(!planner.update_task(&id, draft));
        assert_eq!(planner.task(&id).unwrap().category_id, SENTINEL_CATEGORY_ID);

        let mut draft = TaskDraft::new("Geometry", Some(day(2026, 1, 4)));
        draft.category_id = "cat-study".to_string();
        assert!(planner.update_task(&id, draft));
        assert_eq!(planner.task(&id).unwrap().category_id, "cat-study");
    }

    #[test]
    fn orphaned_task_can_still_be_edited() {
        let mut planner = Planner::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let id = planner
            .create_task(TaskDraft::new("Lab notes", Some(day(2026, 1, 4))), now)
            .unwrap();
        planner.tasks[0].category_id = "cat-gone".to_string();

        let mut draft = TaskDraft::from(planner.task(&id).unwrap());
        draft.title = "Lab notes v2".to_string();
        assert!(planner.update_task(&id, draft));
        assert_eq!(planner.task(&id).unwrap().title, "Lab notes v2");
        assert_eq!(planner.task(&id).unwrap().category_id, "cat-gone");
    }

    #[test]
    fn delete_and_toggle_ignore_unknown_ids() {
        let mut planner = Planner::new();
        assert!(!planner.delete_task("missing"));
        assert!(!planner.toggle_completion("missing"));
    }

    #[test]
    fn removing_category_moves_tasks_to_sentinel() {
        let mut planner = Planner::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let category = planner.add_category("Math").expect("category added");
        let mut draft = TaskDraft::new("Algebra", Some(day(2026, 1, 3)));
        draft.category_id = category.clone();
        let task_id = planner.create_task(draft, now).unwrap();

        assert!(planner.remove_category(&category));
        assert!(planner.category(&category).is_none());
        assert_eq!(planner.task(&task_id).unwrap().category_id, SENTINEL_CATEGORY_ID);
    }

    #[test]
    fn sentinel_category_survives_removal_attempts() {
        let mut planner = Planner::new();
        assert!(!planner.remove_category(SENTINEL_CATEGORY_ID));
        planner.remove_category("cat-study");
        planner.remove_category("cat-exam");
        assert!(!planner.remove_category(SENTINEL_CATEGORY_ID));
        assert_eq!(planner.categories.len(), 1);
        assert_eq!(planner.categories[0].id, SENTINEL_CATEGORY_ID);
    }

    #[test]
    fn add_category_and_goal_reject_empty_names() {
        let mut planner = Planner::new();
        assert!(planner.add_category("  ").is_none());
        assert!(
            planner
                .add_goal(GoalDraft {
                    title: String::new(),
                    target_count: 5,
                    target_minutes: 60,
                    period: GoalPeriod::Monthly,
                })
                .is_none()
        );
        assert_eq!(planner.categories.len(), 3);
        assert_eq!(planner.goals.len(), 1);

        let goal = planner
            .add_goal(GoalDraft {
                title: "Finals".to_string(),
                target_count: 5,
                target_minutes: 60,
                period: GoalPeriod::Monthly,
            })
            .unwrap();
        assert!(planner.delete_goal(&goal));
        assert!(!planner.delete_goal(&goal));
    }

    #[test]
    fn log_time_only_accumulates() {
        let mut planner = Planner::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let id = planner
            .create_task(TaskDraft::new("Flashcards", Some(day(2026, 1, 1))), now)
            .unwrap();

        assert!(!planner.log_time("", 30));
        assert!(!planner.log_time(&id, 0));
        assert!(planner.log_time(&id, 30));
        assert!(planner.log_time(&id, 45));
        assert_eq!(planner.task(&id).unwrap().logged_seconds, 75);

        assert!(planner.reset_logged_time(&id));
        assert_eq!(planner.task(&id).unwrap().logged_seconds, 0);
    }

    #[test]
    fn ensure_sentinel_repairs_category_order() {
        let mut planner = Planner::new();
        planner.categories.rotate_left(1);
        assert!(planner.ensure_sentinel());
        assert_eq!(planner.categories[0].id, SENTINEL_CATEGORY_ID);

        planner.categories.remove(0);
        assert!(planner.ensure_sentinel());
        assert_eq!(planner.categories[0].id, SENTINEL_CATEGORY_ID);
        assert!(!planner.ensure_sentinel());
    }

    #[test]
    fn formats_seconds_as_clock() {
        assert_eq!(format_seconds(0), "00:00:00");
        assert_eq!(format_seconds(3725), "01:02:05");
    }
}
