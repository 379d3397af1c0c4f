mod calendar;
mod config;
mod domain;
mod error;
mod storage;
mod timer;
mod ui;
mod view;
mod workspace;

use std::error::Error;
use std::path::PathBuf;

use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::calendar::{iso_key, parse_iso_date};
use crate::config::{Config, resolve_data_dir};
use crate::domain::{
	GoalDraft, GoalPeriod, Planner, Priority, SENTINEL_CATEGORY_ID, Task, TaskDraft, Theme, format_seconds,
};
use crate::storage::{FileStore, export_to_file};
use crate::ui::run_dashboard;
use crate::view::{ALL_CATEGORIES, SortOption, ViewModel};
use crate::workspace::Workspace;

#[derive(Debug, Parser)]
#[command(name = "study-planner", about = "Terminal study-schedule tracker")]
struct Cli {
	#[arg(long)]
	data_dir: Option<PathBuf>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Dashboard,
	AddTask {
		#[arg(long)]
		title: String,
		#[arg(long, value_parser = parse_date)]
		due: NaiveDate,
		#[arg(long, default_value = SENTINEL_CATEGORY_ID)]
		category: String,
		#[arg(long, value_parser = parse_priority, default_value = "medium")]
		priority: Priority,
		#[arg(long, value_parser = clap::value_parser!(u32).range(1..), default_value_t = 30)]
		minutes: u32,
		#[arg(long, default_value = "")]
		description: String,
	},
	EditTask {
		#[arg(long)]
		id: String,
		#[arg(long)]
		title: Option<String>,
		#[arg(long, value_parser = parse_date)]
		due: Option<NaiveDate>,
		#[arg(long)]
		category: Option<String>,
		#[arg(long, value_parser = parse_priority)]
		priority: Option<Priority>,
		#[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
		minutes: Option<u32>,
		#[arg(long)]
		description: Option<String>,
	},
	DeleteTask {
		#[arg(long)]
		id: String,
	},
	Toggle {
		#[arg(long)]
		id: String,
	},
	Log {
		#[arg(long)]
		task: String,
		#[arg(long)]
		seconds: u64,
	},
	ResetTime {
		#[arg(long)]
		task: String,
	},
	AddCategory {
		#[arg(long)]
		name: String,
	},
	RemoveCategory {
		#[arg(long)]
		id: String,
	},
	AddGoal {
		#[arg(long)]
		title: String,
		#[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
		count: u32,
		#[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
		minutes: u32,
		#[arg(long, value_parser = parse_period, default_value = "weekly")]
		period: GoalPeriod,
	},
	DeleteGoal {
		#[arg(long)]
		id: String,
	},
	List {
		#[arg(long)]
		today: bool,
		#[arg(long, default_value = ALL_CATEGORIES)]
		category: String,
		#[arg(long, default_value = "")]
		search: String,
		#[arg(long, value_parser = parse_sort)]
		sort: Option<SortOption>,
		/// Keep insertion order when sorting by latest.
		#[arg(long)]
		manual: bool,
	},
	Week,
	Month {
		/// Month to show as YYYY-MM, defaults to the current month.
		#[arg(long)]
		month: Option<String>,
	},
	Stats,
	/// Writes the planner as JSON to a file, or to stdout without `--path`.
	Export {
		#[arg(long)]
		path: Option<PathBuf>,
	},
	Import {
		#[arg(long)]
		path: PathBuf,
	},
	Theme {
		#[arg(value_parser = parse_theme)]
		theme: Option<Theme>,
	},
}

fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
		.with_writer(std::io::stderr)
		.init();

	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();

	let data_dir = resolve_data_dir(cli.data_dir);
	let config = Config::load(&data_dir)?;
	let today = Local::now().date_naive();
	let mut workspace = Workspace::open(FileStore::new(&data_dir), &config, today)?;

	match cli.command.unwrap_or(Command::Dashboard) {
		Command::Dashboard => {
			run_dashboard(&mut workspace)?;
		}
		Command::AddTask {
			title,
			due,
			category,
			priority,
			minutes,
			description,
		} => {
			ensure_category(workspace.planner(), &category)?;
			let draft = TaskDraft {
				title,
				description,
				due_date: Some(due),
				category_id: category,
				priority,
				planned_minutes: minutes,
			};
			match workspace.create_task(draft, Utc::now())? {
				Some(id) => println!("created task {id}"),
				None => println!("task not created: title is required"),
			}
		}
		Command::EditTask {
			id,
			title,
			due,
			category,
			priority,
			minutes,
			description,
		} => {
			let task = workspace
				.planner()
				.task(&id)
				.ok_or_else(|| format!("task not found: {id}"))?;
			let mut draft = TaskDraft::from(task);
			if let Some(title) = title {
				draft.title = title;
			}
			if due.is_some() {
				draft.due_date = due;
			}
			if let Some(category) = category {
				ensure_category(workspace.planner(), &category)?;
				draft.category_id = category;
			}
			if let Some(priority) = priority {
				draft.priority = priority;
			}
			if let Some(minutes) = minutes {
				draft.planned_minutes = minutes;
			}
			if let Some(description) = description {
				draft.description = description;
			}
			report(workspace.update_task(&id, draft)?, format!("updated task {id}"), "task unchanged");
		}
		Command::DeleteTask { id } => {
			report(workspace.delete_task(&id)?, format!("deleted task {id}"), "no such task");
		}
		Command::Toggle { id } => {
			report(workspace.toggle_completion(&id)?, format!("toggled task {id}"), "no such task");
		}
		Command::Log { task, seconds } => {
			report(
				workspace.log_time(&task, seconds)?,
				format!("logged {} on {task}", format_seconds(seconds)),
				"nothing logged",
			);
		}
		Command::ResetTime { task } => {
			report(workspace.reset_logged_time(&task)?, format!("reset logged time on {task}"), "nothing to reset");
		}
		Command::AddCategory { name } => match workspace.add_category(&name)? {
			Some(id) => println!("created category {id}"),
			None => println!("category not created: name is required"),
		},
		Command::RemoveCategory { id } => {
			report(
				workspace.remove_category(&id)?,
				format!("removed category {id}"),
				"category cannot be removed",
			);
		}
		Command::AddGoal {
			title,
			count,
			minutes,
			period,
		} => {
			let draft = GoalDraft {
				title,
				target_count: count,
				target_minutes: minutes,
				period,
			};
			match workspace.add_goal(draft)? {
				Some(id) => println!("created goal {id}"),
				None => println!("goal not created: title is required"),
			}
		}
		Command::DeleteGoal { id } => {
			let title = workspace
				.planner()
				.goal(&id)
				.map(|goal| goal.title.clone())
				.unwrap_or_else(|| id.clone());
			report(workspace.delete_goal(&id)?, format!("deleted goal {title}"), "no such goal");
		}
		Command::List {
			today: today_only,
			category,
			search,
			sort,
			manual,
		} => {
			workspace.view.show_today_only = today_only;
			workspace.view.category_filter = category;
			workspace.view.search_term = search;
			if let Some(sort) = sort {
				workspace.view.sort_option = sort;
			}
			if manual {
				workspace.view.auto_sort = false;
			}
			let view = workspace.build_view(today);
			print_tasks(workspace.planner(), &view.tasks);
		}
		Command::Week => {
			let view = workspace.build_view(today);
			print_week(workspace.planner(), &view);
		}
		Command::Month { month } => {
			if let Some(month) = month {
				workspace.view.month = parse_month(&month)?;
			}
			let view = workspace.build_view(today);
			print_month(&view);
		}
		Command::Stats => {
			let view = workspace.build_view(today);
			print_stats(&view);
		}
		Command::Export { path: Some(path) } => {
			export_to_file(&path, workspace.planner())?;
			println!("exported to {}", path.display());
		}
		Command::Export { path: None } => {
			println!("{}", workspace.export_json()?);
		}
		Command::Import { path } => {
			let raw = std::fs::read_to_string(&path)?;
			let replaced = workspace.import_json(&raw)?;
			println!("imported {} from {}", replaced.join(", "), path.display());
		}
		Command::Theme { theme } => {
			let theme = match theme {
				Some(theme) => {
					workspace.set_theme(theme)?;
					theme
				}
				None => workspace.toggle_theme()?,
			};
			println!("theme: {}", theme.label());
		}
	}

	Ok(())
}

fn report(changed: bool, done: String, unchanged: &str) {
	if changed {
		println!("{done}");
	} else {
		println!("{unchanged}");
	}
}

fn ensure_category(planner: &Planner, id: &str) -> Result<(), String> {
	match planner.category(id) {
		Some(_) => Ok(()),
		None => Err(format!("unknown category: {id}")),
	}
}

fn parse_date(input: &str) -> Result<NaiveDate, String> {
	parse_iso_date(input).map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

fn parse_month(input: &str) -> Result<NaiveDate, String> {
	parse_iso_date(&format!("{}-01", input.trim())).map_err(|err| format!("expected YYYY-MM: {err}"))
}

fn parse_priority(input: &str) -> Result<Priority, String> {
	Priority::ALL
		.into_iter()
		.find(|priority| priority.label() == input.to_lowercase())
		.ok_or_else(|| format!("unknown priority '{input}', expected high, medium or low"))
}

fn parse_period(input: &str) -> Result<GoalPeriod, String> {
	match input.to_lowercase().as_str() {
		"weekly" => Ok(GoalPeriod::Weekly),
		"monthly" => Ok(GoalPeriod::Monthly),
		_ => Err(format!("unknown period '{input}', expected weekly or monthly")),
	}
}

fn parse_sort(input: &str) -> Result<SortOption, String> {
	match input.to_lowercase().as_str() {
		"due" => Ok(SortOption::Due),
		"priority" => Ok(SortOption::Priority),
		"latest" => Ok(SortOption::Latest),
		_ => Err(format!("unknown sort '{input}', expected due, priority or latest")),
	}
}

fn parse_theme(input: &str) -> Result<Theme, String> {
	match input.to_lowercase().as_str() {
		"light" => Ok(Theme::Light),
		"dark" => Ok(Theme::Dark),
		_ => Err(format!("unknown theme '{input}', expected light or dark")),
	}
}

fn category_chip(planner: &Planner, task: &Task) -> String {
	planner
		.category(&task.category_id)
		.map(|category| format!(" [{}]", category.name))
		.unwrap_or_default()
}

fn task_line(planner: &Planner, task: &Task) -> String {
	format!(
		"{} {} | {} | {:<6} | {}{} | {}/{}m",
		if task.completed { "[x]" } else { "[ ]" },
		task.id,
		iso_key(task.due_date),
		task.priority.label(),
		task.title,
		category_chip(planner, task),
		task.logged_minutes(),
		task.planned_minutes
	)
}

fn print_tasks(planner: &Planner, tasks: &[&Task]) {
	if tasks.is_empty() {
		println!("no matching tasks");
		return;
	}

	for task in tasks {
		println!("{}", task_line(planner, task));
	}
}

fn print_week(planner: &Planner, view: &ViewModel) {
	for (key, tasks) in &view.week {
		let marker = if *key == iso_key(view.today) { " (today)" } else { "" };
		println!("{key}{marker}");
		if tasks.is_empty() {
			println!("  -");
		}
		for task in tasks {
			println!("  {}", task_line(planner, task));
		}
	}
}

fn print_month(view: &ViewModel) {
	println!("Su Mo Tu We Th Fr Sa");
	let mut line = String::new();
	for (index, cell) in view.month.iter().enumerate() {
		let text = match cell.date {
			Some(date) if cell.tasks.is_empty() => format!("{:>2} ", date.format("%-d")),
			Some(date) => format!("{:>2}*", date.format("%-d")),
			None => "   ".to_string(),
		};
		line.push_str(&text);
		if index % 7 == 6 {
			println!("{}", line.trim_end());
			line.clear();
		}
	}
	if !line.is_empty() {
		println!("{}", line.trim_end());
	}
}

fn print_stats(view: &ViewModel) {
	let metrics = &view.metrics;
	println!(
		"completion: {}% ({}/{})",
		metrics.completion_rate, metrics.completed_count, metrics.total_count
	);
	println!(
		"logged: {}m of {}m planned",
		metrics.total_logged_minutes, metrics.total_planned_minutes
	);
	for priority in Priority::ALL {
		println!(
			"{:<6} {:>3} ({:.0}%)",
			priority.label(),
			metrics.priority_histogram.count(priority),
			metrics.priority_histogram.share(priority) * 100.0
		);
	}

	if view.goals.is_empty() {
		return;
	}
	println!("\ngoals:");
	for row in &view.goals {
		println!(
			"{} | {} ({}) | tasks {}% | minutes {}%",
			row.goal.id,
			row.goal.title,
			row.goal.period.label(),
			row.count_percent,
			row.minutes_percent
		);
	}
}

#[cfg(test)]
mod tests {
	use clap::Parser;

	use super::{Cli, Command, ensure_category};
	use crate::domain::Planner;

	#[test]
	fn zero_minutes_and_targets_are_rejected() {
		let add_task = |minutes: &str| {
			Cli::try_parse_from([
				"study-planner", "add-task", "--title", "Essay", "--due", "2026-03-02", "--minutes", minutes,
			])
		};
		assert!(add_task("0").is_err());
		assert!(Cli::try_parse_from(["study-planner", "edit-task", "--id", "abc", "--minutes", "0"]).is_err());
		assert!(
			Cli::try_parse_from(["study-planner", "add-goal", "--title", "G", "--count", "0", "--minutes", "60"]).is_err()
		);
		assert!(
			Cli::try_parse_from(["study-planner", "add-goal", "--title", "G", "--count", "5", "--minutes", "0"]).is_err()
		);

		let cli = add_task("45").unwrap();
		assert!(matches!(cli.command, Some(Command::AddTask { minutes: 45, .. })));
	}

	#[test]
	fn unknown_category_is_reported() {
		let planner = Planner::new();
		assert!(ensure_category(&planner, "cat-study").is_ok());
		assert_eq!(ensure_category(&planner, "cat-mth").unwrap_err(), "unknown category: cat-mth");
	}
}
