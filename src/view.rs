use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calendar::{first_day_of_month, iso_key, month_matrix, start_of_week, week_dates};
use crate::domain::{Goal, Planner, Priority, SENTINEL_CATEGORY_ID, Task};

pub const ALL_CATEGORIES: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
	#[default]
	List,
	Week,
	Month,
}

impl ViewMode {
	pub fn next(self) -> Self {
		match self {
			ViewMode::List => ViewMode::Week,
			ViewMode::Week => ViewMode::Month,
			ViewMode::Month => ViewMode::List,
		}
	}

	pub fn label(self) -> &'static str {
		match self {
			ViewMode::List => "list",
			ViewMode::Week => "week",
			ViewMode::Month => "month",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOption {
	#[default]
	Due,
	Priority,
	Latest,
}

impl SortOption {
	pub fn next(self) -> Self {
		match self {
			SortOption::Due => SortOption::Priority,
			SortOption::Priority => SortOption::Latest,
			SortOption::Latest => SortOption::Due,
		}
	}

	pub fn label(self) -> &'static str {
		match self {
			SortOption::Due => "due",
			SortOption::Priority => "priority",
			SortOption::Latest => "latest",
		}
	}
}

/// Ephemeral presentation state. Nothing here is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
	pub view_mode: ViewMode,
	pub show_today_only: bool,
	pub category_filter: String,
	pub sort_option: SortOption,
	pub auto_sort: bool,
	pub search_term: String,
	pub month: NaiveDate,
}

impl ViewState {
	pub fn new(today: NaiveDate) -> Self {
		Self {
			view_mode: ViewMode::List,
			show_today_only: false,
			category_filter: ALL_CATEGORIES.to_string(),
			sort_option: SortOption::Due,
			auto_sort: true,
			search_term: String::new(),
			month: first_day_of_month(today),
		}
	}

	/// Picks the next category filter in category order, wrapping back to `all`.
	/// The sentinel stands for "no filter", so it maps onto `all`.
	pub fn cycle_category(&mut self, planner: &Planner) {
		let ids = planner
			.categories
			.iter()
			.filter(|category| category.id != SENTINEL_CATEGORY_ID)
			.map(|category| category.id.as_str())
			.collect::<Vec<_>>();
		let next = match ids.iter().position(|id| *id == self.category_filter) {
			Some(index) if index + 1 < ids.len() => ids[index + 1].to_string(),
			Some(_) => ALL_CATEGORIES.to_string(),
			None if self.category_filter == ALL_CATEGORIES => ids
				.first()
				.map(|id| id.to_string())
				.unwrap_or_else(|| ALL_CATEGORIES.to_string()),
			None => ALL_CATEGORIES.to_string(),
		};
		self.category_filter = next;
	}
}

pub fn sort_tasks<'a>(tasks: &'a [Task], sort_option: SortOption, auto_sort: bool) -> Vec<&'a Task> {
	let mut sorted = tasks.iter().collect::<Vec<_>>();
	match sort_option {
		SortOption::Due => sorted.sort_by_key(|task| task.due_date),
		SortOption::Priority => sorted.sort_by_key(|task| task.priority.rank()),
		// Manual ordering only opts out of the recency sort.
		SortOption::Latest if auto_sort => {
			sorted.sort_by(|left, right| right.created_at.cmp(&left.created_at))
		}
		SortOption::Latest => {}
	}
	sorted
}

pub fn filter_tasks<'a>(sorted: Vec<&'a Task>, state: &ViewState, today: NaiveDate) -> Vec<&'a Task> {
	let needle = state.search_term.to_lowercase();
	sorted
		.into_iter()
		.filter(|task| !state.show_today_only || task.due_date == today)
		.filter(|task| state.category_filter == ALL_CATEGORIES || task.category_id == state.category_filter)
		.filter(|task| needle.is_empty() || task.title.to_lowercase().contains(&needle))
		.collect()
}

/// Current Monday-start week keyed by ISO date. Every key is present even
/// when no task falls on it.
pub fn weekly_buckets<'a>(tasks: &[&'a Task], today: NaiveDate) -> BTreeMap<String, Vec<&'a Task>> {
	let mut buckets = week_dates(start_of_week(today))
		.into_iter()
		.map(|(key, _)| (key, Vec::new()))
		.collect::<BTreeMap<_, _>>();

	for task in tasks {
		if let Some(bucket) = buckets.get_mut(&iso_key(task.due_date)) {
			bucket.push(*task);
		}
	}
	buckets
}

#[derive(Debug, Clone)]
pub struct CalendarCell<'a> {
	pub date: Option<NaiveDate>,
	pub tasks: Vec<&'a Task>,
}

pub fn monthly_matrix<'a>(tasks: &[&'a Task], anchor: NaiveDate) -> Vec<CalendarCell<'a>> {
	month_matrix(anchor.year(), anchor.month())
		.into_iter()
		.map(|cell| CalendarCell {
			date: cell.date,
			tasks: match cell.date {
				Some(date) => tasks.iter().copied().filter(|task| task.due_date == date).collect(),
				None => Vec::new(),
			},
		})
		.collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriorityHistogram {
	pub high: usize,
	pub medium: usize,
	pub low: usize,
}

impl PriorityHistogram {
	pub fn count(&self, priority: Priority) -> usize {
		match priority {
			Priority::High => self.high,
			Priority::Medium => self.medium,
			Priority::Low => self.low,
		}
	}

	/// Fraction of all tasks with this priority, 0 for an empty set.
	pub fn share(&self, priority: Priority) -> f64 {
		let total = self.high + self.medium + self.low;
		if total == 0 {
			return 0.0;
		}
		self.count(priority) as f64 / total as f64
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
	pub total_count: usize,
	pub completed_count: usize,
	pub completion_rate: u32,
	pub total_logged_minutes: u64,
	pub total_planned_minutes: u64,
	pub priority_histogram: PriorityHistogram,
}

pub fn metrics(tasks: &[Task]) -> Metrics {
	let total_count = tasks.len();
	let completed_count = tasks.iter().filter(|task| task.completed).count();
	let completion_rate = if total_count == 0 {
		0
	} else {
		(100.0 * completed_count as f64 / total_count as f64).round() as u32
	};
	let logged_seconds = tasks.iter().map(|task| task.logged_seconds).sum::<u64>();
	let total_planned_minutes = tasks.iter().map(|task| u64::from(task.planned_minutes)).sum();

	let mut priority_histogram = PriorityHistogram::default();
	for task in tasks {
		match task.priority {
			Priority::High => priority_histogram.high += 1,
			Priority::Medium => priority_histogram.medium += 1,
			Priority::Low => priority_histogram.low += 1,
		}
	}

	Metrics {
		total_count,
		completed_count,
		completion_rate,
		total_logged_minutes: (logged_seconds as f64 / 60.0).round() as u64,
		total_planned_minutes,
		priority_histogram,
	}
}

/// Count progress is global: every completed task counts, whatever the
/// goal's period.
pub fn goal_progress(goal: &Goal, global_completed_count: usize) -> u32 {
	capped_percent(global_completed_count as u64, u64::from(goal.target_count))
}

pub fn goal_minutes_progress(goal: &Goal, total_logged_minutes: u64) -> u32 {
	capped_percent(total_logged_minutes, u64::from(goal.target_minutes))
}

fn capped_percent(value: u64, target: u64) -> u32 {
	if target == 0 {
		return 0;
	}
	let percent = (100.0 * value as f64 / target as f64).round();
	percent.min(100.0) as u32
}

#[derive(Debug, Clone)]
pub struct GoalRow<'a> {
	pub goal: &'a Goal,
	pub count_percent: u32,
	pub minutes_percent: u32,
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone)]
pub struct ViewModel<'a> {
	pub today: NaiveDate,
	pub tasks: Vec<&'a Task>,
	pub week: BTreeMap<String, Vec<&'a Task>>,
	pub month: Vec<CalendarCell<'a>>,
	pub metrics: Metrics,
	pub goals: Vec<GoalRow<'a>>,
}

pub fn build_view<'a>(planner: &'a Planner, state: &ViewState, today: NaiveDate) -> ViewModel<'a> {
	let sorted = sort_tasks(&planner.tasks, state.sort_option, state.auto_sort);
	let tasks = filter_tasks(sorted, state, today);
	let week = weekly_buckets(&tasks, today);
	let month = monthly_matrix(&tasks, state.month);
	let metrics = metrics(&planner.tasks);
	let goals = planner
		.goals
		.iter()
		.map(|goal| GoalRow {
			goal,
			count_percent: goal_progress(goal, metrics.completed_count),
			minutes_percent: goal_minutes_progress(goal, metrics.total_logged_minutes),
		})
		.collect();

	ViewModel {
		today,
		tasks,
		week,
		month,
		metrics,
		goals,
	}
}
