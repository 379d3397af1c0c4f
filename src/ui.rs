use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::time::{Duration as StdDuration, Instant};

use chrono::{Local, NaiveDate, Utc};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, ExecutableCommand};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};

use crate::calendar::{iso_key, parse_iso_date, shift_month};
use crate::domain::{
	GoalDraft, GoalPeriod, Planner, Priority, SENTINEL_CATEGORY_ID, Task, TaskDraft, Theme, format_seconds,
};
use crate::storage::{BlobStore, export_to_file};
use crate::timer::TimerState;
use crate::view::{ALL_CATEGORIES, ViewMode, ViewModel};
use crate::workspace::Workspace;

const BAR_WIDTH: f64 = 16.0;

#[derive(Debug, Clone, Copy)]
struct Palette {
	accent: Color,
	muted: Color,
	highlight_bg: Color,
	done: Color,
}

impl Palette {
	fn for_theme(theme: Theme) -> Self {
		match theme {
			Theme::Dark => Self {
				accent: Color::Yellow,
				muted: Color::DarkGray,
				highlight_bg: Color::Rgb(42, 45, 52),
				done: Color::Green,
			},
			Theme::Light => Self {
				accent: Color::Blue,
				muted: Color::Gray,
				highlight_bg: Color::Rgb(214, 222, 235),
				done: Color::LightGreen,
			},
		}
	}
}

pub fn run_dashboard<S: BlobStore>(workspace: &mut Workspace<S>) -> Result<(), Box<dyn Error>> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, workspace);
	// Leaving the dashboard ends the timing session, whatever path got us here.
	let teardown = workspace.stop_timer();

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result?;
	teardown?;
	Ok(())
}

fn run_event_loop<S: BlobStore>(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	workspace: &mut Workspace<S>,
) -> Result<(), Box<dyn Error>> {
	let mut app = App::default();

	loop {
		workspace.poll_timer(Instant::now());
		let today = Local::now().date_naive();

		let selected_task = {
			let shared: &Workspace<S> = workspace;
			let view = shared.build_view(today);
			app.clamp_selection(view.tasks.len());
			terminal.draw(|frame| draw_dashboard(frame, &app, shared, &view))?;
			view.tasks.get(app.selected).map(|task| task.id.clone())
		};

		if event::poll(StdDuration::from_millis(250))? {
			if let CEvent::Key(key) = event::read()? {
				if key.kind != KeyEventKind::Press {
					continue;
				}

				let should_quit = match &app.mode {
					InputMode::Prompt(_) => handle_prompt_key(&mut app, key.code, workspace),
					InputMode::Select(_) => handle_select_key(&mut app, key.code, workspace),
					InputMode::Normal => {
						handle_normal_key(&mut app, key.code, workspace, selected_task.as_deref(), today)
					}
				};

				if should_quit {
					break;
				}
			}
		}
	}

	Ok(())
}

fn draw_dashboard<S: BlobStore>(frame: &mut Frame, app: &App, workspace: &Workspace<S>, view: &ViewModel) {
	let planner = workspace.planner();
	let palette = Palette::for_theme(planner.theme);

	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Length(3), Constraint::Min(12), Constraint::Length(5)])
		.split(frame.area());

	let body = Layout::default()
		.direction(Direction::Horizontal)
		.constraints([Constraint::Percentage(58), Constraint::Percentage(42)])
		.split(layout[1]);

	let side = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Min(9), Constraint::Length(9), Constraint::Min(5)])
		.split(body[1]);

	render_header(frame, layout[0], workspace, palette);
	match workspace.view.view_mode {
		ViewMode::List => render_list_panel(frame, body[0], app, planner, view, palette),
		ViewMode::Week => render_week_panel(frame, body[0], app, planner, view, palette),
		ViewMode::Month => render_month_panel(frame, body[0], app, workspace, view, palette),
	}
	render_details_panel(frame, side[0], app, workspace, view, palette);
	render_metrics_panel(frame, side[1], view, palette);
	render_goals_panel(frame, side[2], view, palette);
	render_footer(frame, layout[2], app);

	if let InputMode::Select(select) = &app.mode {
		render_select_popup(frame, select, palette);
	}
}

fn render_header<S: BlobStore>(frame: &mut Frame, area: Rect, workspace: &Workspace<S>, palette: Palette) {
	let state = &workspace.view;
	let category = if state.category_filter == ALL_CATEGORIES {
		"all".to_string()
	} else {
		workspace
			.planner()
			.category(&state.category_filter)
			.map(|category| category.name.clone())
			.unwrap_or_else(|| state.category_filter.clone())
	};

	let label = Style::default().fg(palette.muted);
	let value = Style::default().fg(palette.accent).add_modifier(Modifier::BOLD);
	let line = Line::from(vec![
		Span::styled("view ", label),
		Span::styled(state.view_mode.label(), value),
		Span::styled(" | sort ", label),
		Span::styled(state.sort_option.label(), value),
		Span::styled(if state.auto_sort { " (auto)" } else { " (manual)" }, label),
		Span::styled(" | category ", label),
		Span::styled(category, value),
		Span::styled(" | today only ", label),
		Span::styled(if state.show_today_only { "on" } else { "off" }, value),
		Span::styled(" | search ", label),
		Span::styled(
			if state.search_term.is_empty() {
				"-".to_string()
			} else {
				format!("\"{}\"", state.search_term)
			},
			value,
		),
		Span::styled(" | theme ", label),
		Span::styled(workspace.planner().theme.label(), value),
	]);

	let header = Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("Study Planner"));
	frame.render_widget(header, area);
}

fn render_list_panel(
	frame: &mut Frame,
	area: Rect,
	app: &App,
	planner: &Planner,
	view: &ViewModel,
	palette: Palette,
) {
	let items = view
		.tasks
		.iter()
		.map(|task| ListItem::new(task_line(planner, task, view.today, palette)))
		.collect::<Vec<_>>();

	let mut state = ListState::default();
	if !view.tasks.is_empty() {
		state.select(Some(app.selected.min(view.tasks.len() - 1)));
	}

	let title = format!("Tasks ({})", view.tasks.len());
	let list = List::new(if items.is_empty() {
		vec![ListItem::new("(no matching tasks)")]
	} else {
		items
	})
	.block(Block::default().borders(Borders::ALL).title(title))
	.highlight_style(Style::default().bg(palette.highlight_bg).add_modifier(Modifier::BOLD));

	frame.render_stateful_widget(list, area, &mut state);
}

fn render_week_panel(
	frame: &mut Frame,
	area: Rect,
	app: &App,
	planner: &Planner,
	view: &ViewModel,
	palette: Palette,
) {
	let selected_id = view.tasks.get(app.selected).map(|task| task.id.as_str());
	let today_key = iso_key(view.today);
	let mut lines = Vec::new();

	for (key, tasks) in &view.week {
		let day = parse_iso_date(key).ok();
		let heading = match day {
			Some(day) => format!("{} {}", day.format("%a"), day.format("%d %b")),
			None => key.clone(),
		};
		let mut heading_style = Style::default().add_modifier(Modifier::BOLD);
		if *key == today_key {
			heading_style = heading_style.fg(palette.accent);
		}
		lines.push(Line::from(Span::styled(heading, heading_style)));

		if tasks.is_empty() {
			lines.push(Line::from(Span::styled("  -", Style::default().fg(palette.muted))));
		}
		for task in tasks {
			let mut line = task_line(planner, task, view.today, palette);
			line.spans.insert(0, Span::raw("  "));
			if Some(task.id.as_str()) == selected_id {
				line = line.style(Style::default().bg(palette.highlight_bg));
			}
			lines.push(line);
		}
	}

	let title = match view.week.keys().next() {
		Some(first) => format!("Week of {first}"),
		None => "Week".to_string(),
	};
	let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
	frame.render_widget(panel, area);
}

fn render_month_panel<S: BlobStore>(
	frame: &mut Frame,
	area: Rect,
	app: &App,
	workspace: &Workspace<S>,
	view: &ViewModel,
	palette: Palette,
) {
	let selected_due = view.tasks.get(app.selected).map(|task| task.due_date);
	let mut lines = vec![Line::from(Span::styled(
		"Su   Mo   Tu   We   Th   Fr   Sa",
		Style::default().fg(palette.muted),
	))];

	let mut spans = Vec::new();
	for (index, cell) in view.month.iter().enumerate() {
		let span = match cell.date {
			None => Span::raw("     "),
			Some(date) => {
				let count = if cell.tasks.is_empty() {
					String::new()
				} else {
					format!("+{}", cell.tasks.len())
				};
				let mut style = Style::default();
				if date == view.today {
					style = style.fg(palette.accent).add_modifier(Modifier::BOLD);
				}
				if Some(date) == selected_due {
					style = style.bg(palette.highlight_bg);
				}
				Span::styled(format!("{:>2}{:<3}", date.format("%-d"), count), style)
			}
		};
		spans.push(span);
		if index % 7 == 6 {
			lines.push(Line::from(std::mem::take(&mut spans)));
		}
	}
	if !spans.is_empty() {
		lines.push(Line::from(spans));
	}

	if let Some(date) = selected_due {
		lines.push(Line::from(""));
		lines.push(Line::from(Span::styled(
			format!("Due {}", date.format("%A, %d %B")),
			Style::default().add_modifier(Modifier::BOLD),
		)));
		for task in view.tasks.iter().filter(|task| task.due_date == date) {
			lines.push(task_line(workspace.planner(), task, view.today, palette));
		}
	}

	let title = workspace.view.month.format("%B %Y").to_string();
	let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
	frame.render_widget(panel, area);
}

fn render_details_panel<S: BlobStore>(
	frame: &mut Frame,
	area: Rect,
	app: &App,
	workspace: &Workspace<S>,
	view: &ViewModel,
	palette: Palette,
) {
	let planner = workspace.planner();
	let mut lines = Vec::new();

	match view.tasks.get(app.selected) {
		Some(task) => {
			lines.push(Line::from(Span::styled(
				task.title.clone(),
				Style::default().add_modifier(Modifier::BOLD),
			)));
			let category = planner
				.category(&task.category_id)
				.map(|category| category.name.clone())
				.unwrap_or_else(|| "(no category)".to_string());
			lines.push(Line::from(format!(
				"due {} | {} | {}",
				iso_key(task.due_date),
				task.priority.label(),
				category
			)));
			lines.push(Line::from(format!(
				"{} | logged {} of {}m planned",
				if task.completed { "done" } else { "open" },
				format_seconds(task.logged_seconds),
				task.planned_minutes
			)));
			if !task.description.is_empty() {
				lines.push(Line::from(Span::styled(
					task.description.clone(),
					Style::default().fg(palette.muted),
				)));
			}
		}
		None => lines.push(Line::from("(no task selected)")),
	}

	lines.push(Line::from(""));
	let timer = workspace.timer();
	let timer_task = timer
		.selected_task()
		.and_then(|id| planner.task(id))
		.map(|task| task.title.clone())
		.unwrap_or_else(|| "(none)".to_string());
	let (state_label, state_style) = match timer.state() {
		TimerState::Running { .. } => (
			"running",
			Style::default().fg(palette.done).add_modifier(Modifier::BOLD),
		),
		TimerState::Idle => ("idle", Style::default().fg(palette.muted)),
	};
	lines.push(Line::from(vec![
		Span::raw("Timer "),
		Span::styled(state_label, state_style),
		Span::raw(format!(" {} | {}", format_seconds(timer.elapsed_seconds()), timer_task)),
	]));

	let panel = Paragraph::new(lines)
		.wrap(Wrap { trim: true })
		.block(Block::default().borders(Borders::ALL).title("Selected"));
	frame.render_widget(panel, area);
}

fn render_metrics_panel(frame: &mut Frame, area: Rect, view: &ViewModel, palette: Palette) {
	let metrics = &view.metrics;
	let mut lines = vec![
		Line::from(format!(
			"Completion: {}% ({}/{})",
			metrics.completion_rate, metrics.completed_count, metrics.total_count
		)),
		Line::from(format!(
			"Logged: {}m | Planned: {}m",
			metrics.total_logged_minutes, metrics.total_planned_minutes
		)),
		Line::from(""),
	];

	for priority in Priority::ALL {
		let share = metrics.priority_histogram.share(priority);
		let width = (share * BAR_WIDTH).round() as usize;
		lines.push(Line::from(vec![
			Span::raw(format!("{:<6} ", priority.label())),
			Span::styled("=".repeat(width), priority_style(priority)),
			Span::styled(
				format!(" {}", metrics.priority_histogram.count(priority)),
				Style::default().fg(palette.muted),
			),
		]));
	}

	let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Stats"));
	frame.render_widget(panel, area);
}

fn render_goals_panel(frame: &mut Frame, area: Rect, view: &ViewModel, palette: Palette) {
	let mut lines = Vec::new();
	if view.goals.is_empty() {
		lines.push(Line::from("(no goals)"));
	}

	for row in &view.goals {
		lines.push(Line::from(vec![
			Span::styled(row.goal.title.clone(), Style::default().add_modifier(Modifier::BOLD)),
			Span::styled(format!(" ({})", row.goal.period.label()), Style::default().fg(palette.muted)),
		]));
		lines.push(Line::from(format!(
			"  tasks {:>3}% {}  minutes {:>3}% {}",
			row.count_percent,
			progress_bar(row.count_percent),
			row.minutes_percent,
			progress_bar(row.minutes_percent)
		)));
	}

	let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Goals"));
	frame.render_widget(panel, area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
	let footer_lines = match &app.mode {
		InputMode::Normal => vec![
			Line::from("j/k move | v view | s sort | a auto-sort | t today | c category | / search | [ ] month | q quit"),
			Line::from(
				"n new | e edit | x done | d delete | space timer | r reset timer | R reset logged | C/K category | g/G goal | T theme | E/I export/import",
			),
			Line::from(app.status.clone()),
		],
		InputMode::Prompt(prompt) => vec![
			Line::from(prompt.title.clone()),
			Line::from(format!("> {}", prompt.input)),
			Line::from(format!("Enter submit | Esc cancel | {}", app.status)),
		],
		InputMode::Select(select) => vec![
			Line::from(select.title.clone()),
			Line::from(format!(
				"Selected: {}",
				select
					.selected_option()
					.map(|option| option.label.as_str())
					.unwrap_or("(none)")
			)),
			Line::from("j/k or arrows move | Enter choose | Esc cancel"),
		],
	};

	let footer = Paragraph::new(footer_lines).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn render_select_popup(frame: &mut Frame, select: &SelectState, palette: Palette) {
	let area = centered_rect(50, 50, frame.area());
	frame.render_widget(Clear, area);

	let items = if select.options.is_empty() {
		vec![ListItem::new("(no choices)")]
	} else {
		select
			.options
			.iter()
			.map(|option| ListItem::new(option.label.clone()).style(option.style))
			.collect::<Vec<_>>()
	};

	let current = if select.options.is_empty() {
		0
	} else {
		select.selected.saturating_add(1)
	};
	let total = select.options.len();
	let list = List::new(items)
		.block(
			Block::default()
				.borders(Borders::ALL)
				.title(format!("{} ({current}/{total})", select.title)),
		)
		.highlight_symbol(">> ")
		.highlight_style(Style::default().bg(palette.highlight_bg));

	let mut state = ListState::default();
	if !select.options.is_empty() {
		state.select(Some(select.selected.min(select.options.len().saturating_sub(1))));
	}
	frame.render_stateful_widget(list, area, &mut state);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
	let popup_layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([
			Constraint::Percentage((100 - percent_y) / 2),
			Constraint::Percentage(percent_y),
			Constraint::Percentage((100 - percent_y) / 2),
		])
		.split(area);
	Layout::default()
		.direction(Direction::Horizontal)
		.constraints([
			Constraint::Percentage((100 - percent_x) / 2),
			Constraint::Percentage(percent_x),
			Constraint::Percentage((100 - percent_x) / 2),
		])
		.split(popup_layout[1])[1]
}

fn task_line(planner: &Planner, task: &Task, today: NaiveDate, palette: Palette) -> Line<'static> {
	let check = if task.completed {
		Span::styled("[x] ", Style::default().fg(palette.done))
	} else {
		Span::raw("[ ] ")
	};
	let mut title_style = Style::default();
	if task.completed {
		title_style = title_style.fg(palette.muted).add_modifier(Modifier::CROSSED_OUT);
	}
	let due_style = if !task.completed && task.due_date < today {
		Style::default().fg(Color::LightRed)
	} else {
		Style::default().fg(palette.muted)
	};

	let mut spans = vec![
		check,
		Span::styled(format!("{} ", task.due_date.format("%m-%d")), due_style),
		Span::styled(format!("{:<6} ", task.priority.label()), priority_style(task.priority)),
		Span::styled(task.title.clone(), title_style),
	];
	// Orphaned tasks simply render without a chip.
	if let Some(category) = planner.category(&task.category_id) {
		if !category.is_sentinel() {
			spans.push(Span::styled(
				format!(" [{}]", category.name),
				style_from_color_name(&category.color),
			));
		}
	}
	spans.push(Span::styled(
		format!(" {}/{}m", task.logged_minutes(), task.planned_minutes),
		Style::default().fg(palette.muted),
	));
	Line::from(spans)
}

fn progress_bar(percent: u32) -> String {
	let filled = (f64::from(percent.min(100)) / 100.0 * 10.0).round() as usize;
	format!("[{}{}]", "#".repeat(filled), ".".repeat(10 - filled))
}

fn priority_style(priority: Priority) -> Style {
	match priority {
		Priority::High => Style::default().fg(Color::LightRed),
		Priority::Medium => Style::default().fg(Color::Yellow),
		Priority::Low => Style::default().fg(Color::Cyan),
	}
}

fn handle_normal_key<S: BlobStore>(
	app: &mut App,
	code: KeyCode,
	workspace: &mut Workspace<S>,
	selected_task: Option<&str>,
	today: NaiveDate,
) -> bool {
	match code {
		KeyCode::Char('q') | KeyCode::Esc => true,
		KeyCode::Up | KeyCode::Char('k') => {
			app.selected = app.selected.saturating_sub(1);
			false
		}
		KeyCode::Down | KeyCode::Char('j') => {
			app.selected = app.selected.saturating_add(1);
			false
		}
		KeyCode::Char('v') => {
			workspace.view.view_mode = workspace.view.view_mode.next();
			app.status = format!("view: {}", workspace.view.view_mode.label());
			false
		}
		KeyCode::Char('s') => {
			workspace.view.sort_option = workspace.view.sort_option.next();
			app.status = format!("sort: {}", workspace.view.sort_option.label());
			false
		}
		KeyCode::Char('a') => {
			workspace.view.auto_sort = !workspace.view.auto_sort;
			app.status = if workspace.view.auto_sort {
				"auto sort on".to_string()
			} else {
				"auto sort off".to_string()
			};
			false
		}
		KeyCode::Char('t') => {
			workspace.view.show_today_only = !workspace.view.show_today_only;
			app.selected = 0;
			false
		}
		KeyCode::Char('c') => {
			workspace.cycle_category_filter();
			app.selected = 0;
			false
		}
		KeyCode::Char('/') => {
			let current = workspace.view.search_term.clone();
			app.mode = InputMode::Prompt(PromptState::with_input("Search titles", PromptKind::Search, current));
			false
		}
		KeyCode::Char('[') => {
			workspace.view.month = shift_month(workspace.view.month, -1);
			false
		}
		KeyCode::Char(']') => {
			workspace.view.month = shift_month(workspace.view.month, 1);
			false
		}
		KeyCode::Char('n') => {
			app.mode = InputMode::Prompt(PromptState::new(
				"Task title",
				PromptKind::TaskTitle {
					editing: None,
					draft: TaskDraft::new("", Some(today)),
				},
			));
			false
		}
		KeyCode::Char('e') => {
			let Some(task) = selected_task.and_then(|id| workspace.planner().task(id)) else {
				app.status = "Select a task first".to_string();
				return false;
			};
			let draft = TaskDraft::from(task);
			app.mode = InputMode::Prompt(PromptState::with_input(
				"Task title",
				PromptKind::TaskTitle {
					editing: Some(task.id.clone()),
					draft: draft.clone(),
				},
				draft.title,
			));
			false
		}
		KeyCode::Char('x') | KeyCode::Enter => {
			let Some(task_id) = selected_task else {
				app.status = "Select a task first".to_string();
				return false;
			};
			app.status = match workspace.toggle_completion(task_id) {
				Ok(_) => format!("toggled: {}", task_label(workspace.planner(), task_id)),
				Err(err) => format!("error: {err}"),
			};
			false
		}
		KeyCode::Char('d') => {
			let Some(task) = selected_task.and_then(|id| workspace.planner().task(id)) else {
				app.status = "Select a task first".to_string();
				return false;
			};
			app.mode = InputMode::Select(build_delete_task_select(task));
			false
		}
		KeyCode::Char(' ') => {
			app.status = toggle_timer(workspace, selected_task);
			false
		}
		KeyCode::Char('r') => {
			workspace.reset_timer();
			app.status = "Timer reset".to_string();
			false
		}
		KeyCode::Char('R') => {
			let Some(task_id) = selected_task else {
				app.status = "Select a task first".to_string();
				return false;
			};
			app.status = match workspace.reset_logged_time(task_id) {
				Ok(true) => format!("cleared logged time: {}", task_label(workspace.planner(), task_id)),
				Ok(false) => "Nothing logged yet".to_string(),
				Err(err) => format!("error: {err}"),
			};
			false
		}
		KeyCode::Char('C') => {
			app.mode = InputMode::Prompt(PromptState::new("Category name", PromptKind::CategoryName));
			false
		}
		KeyCode::Char('K') => {
			match build_remove_category_select(workspace.planner()) {
				Ok(select) => app.mode = InputMode::Select(select),
				Err(err) => app.status = err,
			}
			false
		}
		KeyCode::Char('g') => {
			app.mode = InputMode::Prompt(PromptState::new("Goal title", PromptKind::GoalTitle));
			false
		}
		KeyCode::Char('G') => {
			match build_delete_goal_select(workspace.planner()) {
				Ok(select) => app.mode = InputMode::Select(select),
				Err(err) => app.status = err,
			}
			false
		}
		KeyCode::Char('T') => {
			app.status = match workspace.toggle_theme() {
				Ok(theme) => format!("theme: {}", theme.label()),
				Err(err) => format!("error: {err}"),
			};
			false
		}
		KeyCode::Char('E') => {
			app.mode = InputMode::Prompt(PromptState::with_input(
				"Export to file",
				PromptKind::ExportPath,
				"study-planner-export.json".to_string(),
			));
			false
		}
		KeyCode::Char('I') => {
			app.mode = InputMode::Prompt(PromptState::new("Import from file", PromptKind::ImportPath));
			false
		}
		_ => false,
	}
}

fn toggle_timer<S: BlobStore>(workspace: &mut Workspace<S>, selected_task: Option<&str>) -> String {
	if workspace.timer().is_running() {
		return match workspace.stop_timer() {
			Ok(Some(commit)) => format!(
				"logged {} on {}",
				format_seconds(commit.seconds),
				task_label(workspace.planner(), &commit.task_id)
			),
			Ok(None) => "Timer stopped".to_string(),
			Err(err) => format!("error: {err}"),
		};
	}

	let Some(task_id) = selected_task else {
		return "Select a task to time".to_string();
	};
	workspace.select_timer_task(Some(task_id.to_string()));
	if workspace.start_timer(Instant::now()) {
		format!("timing: {}", task_label(workspace.planner(), task_id))
	} else {
		"Timer could not start".to_string()
	}
}

fn handle_prompt_key<S: BlobStore>(app: &mut App, code: KeyCode, workspace: &mut Workspace<S>) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Input cancelled".to_string();
		}
		KeyCode::Backspace => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.pop();
			}
		}
		KeyCode::Char(value) => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.push(value);
			}
		}
		KeyCode::Enter => {
			let prompt = match std::mem::replace(&mut app.mode, InputMode::Normal) {
				InputMode::Prompt(prompt) => prompt,
				InputMode::Normal | InputMode::Select(_) => return false,
			};

			match submit_prompt(prompt.clone(), workspace) {
				Ok(PromptOutcome::NextPrompt(next_prompt)) => {
					app.mode = InputMode::Prompt(next_prompt);
					app.status.clear();
				}
				Ok(PromptOutcome::Select(select)) => app.mode = InputMode::Select(select),
				Ok(PromptOutcome::Done(message)) => {
					app.mode = InputMode::Normal;
					app.status = message;
				}
				Err(err) => {
					// Keep what was typed so it can be corrected.
					app.mode = InputMode::Prompt(prompt);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn handle_select_key<S: BlobStore>(app: &mut App, code: KeyCode, workspace: &mut Workspace<S>) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Selection cancelled".to_string();
		}
		KeyCode::Up | KeyCode::Char('k') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(-1);
			}
		}
		KeyCode::Down | KeyCode::Char('j') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(1);
			}
		}
		KeyCode::Enter => {
			let select = match std::mem::replace(&mut app.mode, InputMode::Normal) {
				InputMode::Select(select) => select,
				_ => return false,
			};

			match submit_select(select.clone(), workspace) {
				Ok(SelectOutcome::NextPrompt(prompt)) => app.mode = InputMode::Prompt(prompt),
				Ok(SelectOutcome::NextSelect(next_select)) => app.mode = InputMode::Select(next_select),
				Ok(SelectOutcome::Done(message)) => {
					app.mode = InputMode::Normal;
					app.status = message;
				}
				Err(err) => {
					app.mode = InputMode::Select(select);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn submit_prompt<S: BlobStore>(prompt: PromptState, workspace: &mut Workspace<S>) -> Result<PromptOutcome, String> {
	match prompt.kind {
		PromptKind::Search => {
			workspace.view.search_term = prompt.input.clone();
			Ok(PromptOutcome::Done(if prompt.input.is_empty() {
				"search cleared".to_string()
			} else {
				format!("search: {}", prompt.input)
			}))
		}
		PromptKind::TaskTitle { editing, mut draft } => {
			draft.title = required_text(&prompt.input, "title")?;
			let due = draft.due_date.map(iso_key).unwrap_or_default();
			Ok(PromptOutcome::NextPrompt(PromptState::with_input(
				"Due date (YYYY-MM-DD)",
				PromptKind::TaskDue { editing, draft },
				due,
			)))
		}
		PromptKind::TaskDue { editing, mut draft } => {
			let raw = required_text(&prompt.input, "due date")?;
			let due = parse_iso_date(&raw).map_err(|_| format!("invalid date '{raw}', expected YYYY-MM-DD"))?;
			draft.due_date = Some(due);
			Ok(PromptOutcome::Select(build_task_category_select(workspace.planner(), editing, draft)))
		}
		PromptKind::TaskMinutes { editing, mut draft } => {
			draft.planned_minutes = parse_positive(&prompt.input, "planned minutes")?;
			let title = draft.title.clone();
			match editing {
				Some(task_id) => {
					if workspace.update_task(&task_id, draft).map_err(|err| err.to_string())? {
						Ok(PromptOutcome::Done(format!("updated task: {title}")))
					} else {
						Ok(PromptOutcome::Done(format!("task not updated, it no longer exists: {title}")))
					}
				}
				None => {
					workspace
						.create_task(draft, Utc::now())
						.map_err(|err| err.to_string())?
						.ok_or_else(|| "task needs a title, a due date and an existing category".to_string())?;
					Ok(PromptOutcome::Done(format!("created task: {title}")))
				}
			}
		}
		PromptKind::CategoryName => {
			let name = required_text(&prompt.input, "category name")?;
			workspace.add_category(&name).map_err(|err| err.to_string())?;
			Ok(PromptOutcome::Done(format!("created category: {name}")))
		}
		PromptKind::GoalTitle => {
			let title = required_text(&prompt.input, "goal title")?;
			Ok(PromptOutcome::NextPrompt(PromptState::new(
				"Target completed tasks",
				PromptKind::GoalCount { title },
			)))
		}
		PromptKind::GoalCount { title } => {
			let count = parse_positive(&prompt.input, "target count")?;
			Ok(PromptOutcome::NextPrompt(PromptState::new(
				"Target study minutes",
				PromptKind::GoalMinutes { title, count },
			)))
		}
		PromptKind::GoalMinutes { title, count } => {
			let minutes = parse_positive(&prompt.input, "target minutes")?;
			Ok(PromptOutcome::Select(build_goal_period_select(title, count, minutes)))
		}
		PromptKind::ExportPath => {
			let path = PathBuf::from(required_text(&prompt.input, "export path")?);
			export_to_file(&path, workspace.planner()).map_err(|err| err.to_string())?;
			Ok(PromptOutcome::Done(format!("exported to {}", path.display())))
		}
		PromptKind::ImportPath => {
			let path = PathBuf::from(required_text(&prompt.input, "import path")?);
			let raw = std::fs::read_to_string(&path).map_err(|err| format!("failed to read {}: {err}", path.display()))?;
			let replaced = workspace.import_json(&raw).map_err(|err| err.to_string())?;
			Ok(PromptOutcome::Done(format!("imported {}", replaced.join(", "))))
		}
	}
}

fn submit_select<S: BlobStore>(select: SelectState, workspace: &mut Workspace<S>) -> Result<SelectOutcome, String> {
	let selected_value = select
		.selected_option()
		.map(|option| option.value.clone())
		.ok_or_else(|| "no option selected".to_string())?;

	match select.kind {
		SelectKind::TaskCategory { editing, mut draft } => {
			draft.category_id = selected_value.unwrap_or_else(|| SENTINEL_CATEGORY_ID.to_string());
			Ok(SelectOutcome::NextSelect(build_task_priority_select(editing, draft)))
		}
		SelectKind::TaskPriority { editing, mut draft } => {
			let label = selected_value.ok_or_else(|| "selected priority is missing".to_string())?;
			draft.priority = Priority::ALL
				.into_iter()
				.find(|priority| priority.label() == label)
				.ok_or_else(|| format!("unknown priority: {label}"))?;
			let minutes = draft.planned_minutes.to_string();
			Ok(SelectOutcome::NextPrompt(PromptState::with_input(
				"Planned minutes",
				PromptKind::TaskMinutes { editing, draft },
				minutes,
			)))
		}
		SelectKind::GoalPeriod { title, count, minutes } => {
			let period = match selected_value.as_deref() {
				Some("monthly") => GoalPeriod::Monthly,
				_ => GoalPeriod::Weekly,
			};
			let draft = GoalDraft {
				title: title.clone(),
				target_count: count,
				target_minutes: minutes,
				period,
			};
			workspace.add_goal(draft).map_err(|err| err.to_string())?;
			Ok(SelectOutcome::Done(format!("created goal: {title}")))
		}
		SelectKind::DeleteTaskConfirm { task_id, title } => {
			if selected_value.as_deref() == Some("delete") {
				workspace.delete_task(&task_id).map_err(|err| err.to_string())?;
				Ok(SelectOutcome::Done(format!("deleted task: {title}")))
			} else {
				Ok(SelectOutcome::Done("Delete cancelled".to_string()))
			}
		}
		SelectKind::RemoveCategory => {
			let id = selected_value.ok_or_else(|| "selected category is missing".to_string())?;
			let name = workspace
				.planner()
				.category(&id)
				.map(|category| category.name.clone())
				.unwrap_or_else(|| id.clone());
			if workspace.remove_category(&id).map_err(|err| err.to_string())? {
				Ok(SelectOutcome::Done(format!("removed category: {name}")))
			} else {
				Ok(SelectOutcome::Done(format!("category cannot be removed: {name}")))
			}
		}
		SelectKind::DeleteGoal => {
			let id = selected_value.ok_or_else(|| "selected goal is missing".to_string())?;
			let title = workspace
				.planner()
				.goal(&id)
				.map(|goal| goal.title.clone())
				.unwrap_or_else(|| id.clone());
			workspace.delete_goal(&id).map_err(|err| err.to_string())?;
			Ok(SelectOutcome::Done(format!("deleted goal: {title}")))
		}
	}
}

fn build_task_category_select(planner: &Planner, editing: Option<String>, draft: TaskDraft) -> SelectState {
	let options = planner
		.categories
		.iter()
		.map(|category| {
			SelectOption::new(
				category.name.clone(),
				Some(category.id.clone()),
				style_from_color_name(&category.color),
			)
		})
		.collect::<Vec<_>>();

	let current = draft.category_id.clone();
	let mut select = SelectState::new("Select category", SelectKind::TaskCategory { editing, draft }, options);
	select.selected = select
		.options
		.iter()
		.position(|option| option.value.as_deref() == Some(current.as_str()))
		.unwrap_or(0);
	select
}

fn build_task_priority_select(editing: Option<String>, draft: TaskDraft) -> SelectState {
	let options = Priority::ALL
		.into_iter()
		.map(|priority| SelectOption::new(priority.label(), Some(priority.label().to_string()), priority_style(priority)))
		.collect::<Vec<_>>();

	let current = draft.priority;
	let mut select = SelectState::new("Select priority", SelectKind::TaskPriority { editing, draft }, options);
	select.selected = Priority::ALL.iter().position(|priority| *priority == current).unwrap_or(1);
	select
}

fn build_goal_period_select(title: String, count: u32, minutes: u32) -> SelectState {
	let options = vec![
		SelectOption::new("Weekly", Some("weekly".to_string()), Style::default()),
		SelectOption::new("Monthly", Some("monthly".to_string()), Style::default()),
	];
	SelectState::new("Goal period", SelectKind::GoalPeriod { title, count, minutes }, options)
}

fn build_delete_task_select(task: &Task) -> SelectState {
	let options = vec![
		SelectOption::new(
			"Delete",
			Some("delete".to_string()),
			Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD),
		),
		SelectOption::new("Cancel", Some("cancel".to_string()), Style::default()),
	];

	let mut select = SelectState::new(
		format!("Delete task? {}", task.title),
		SelectKind::DeleteTaskConfirm {
			task_id: task.id.clone(),
			title: task.title.clone(),
		},
		options,
	);
	// Default to cancel to prevent accidental deletions.
	select.selected = 1;
	select
}

fn build_remove_category_select(planner: &Planner) -> Result<SelectState, String> {
	let options = planner
		.categories
		.iter()
		.filter(|category| !category.is_sentinel())
		.map(|category| {
			SelectOption::new(
				category.name.clone(),
				Some(category.id.clone()),
				style_from_color_name(&category.color),
			)
		})
		.collect::<Vec<_>>();

	if options.is_empty() {
		return Err("no removable categories".to_string());
	}
	Ok(SelectState::new("Remove category (tasks move to All)", SelectKind::RemoveCategory, options))
}

fn build_delete_goal_select(planner: &Planner) -> Result<SelectState, String> {
	if planner.goals.is_empty() {
		return Err("no goals to delete".to_string());
	}

	let options = planner
		.goals
		.iter()
		.map(|goal| {
			SelectOption::new(
				format!("{} ({})", goal.title, goal.period.label()),
				Some(goal.id.clone()),
				Style::default(),
			)
		})
		.collect::<Vec<_>>();
	Ok(SelectState::new("Delete goal", SelectKind::DeleteGoal, options))
}

fn required_text(input: &str, field_name: &str) -> Result<String, String> {
	let value = input.trim();
	if value.is_empty() {
		Err(format!("{field_name} is required"))
	} else {
		Ok(value.to_string())
	}
}

fn parse_positive(input: &str, field_name: &str) -> Result<u32, String> {
	match input.trim().parse::<u32>() {
		Ok(value) if value > 0 => Ok(value),
		_ => Err(format!("{field_name} must be a positive whole number")),
	}
}

fn task_label(planner: &Planner, task_id: &str) -> String {
	planner
		.task(task_id)
		.map(|task| task.title.clone())
		.unwrap_or_else(|| "Unknown task".to_string())
}

fn style_from_color_name(color_name: &str) -> Style {
	color_from_name(color_name)
		.map(|color| Style::default().fg(color))
		.unwrap_or_default()
}

fn color_from_name(color_name: &str) -> Option<Color> {
	match color_name {
		"black" => Some(Color::Black),
		"red" => Some(Color::Red),
		"green" => Some(Color::Green),
		"yellow" => Some(Color::Yellow),
		"blue" => Some(Color::Blue),
		"magenta" => Some(Color::Magenta),
		"cyan" => Some(Color::Cyan),
		"gray" => Some(Color::Gray),
		"dark_gray" => Some(Color::DarkGray),
		"light_red" => Some(Color::LightRed),
		"light_green" => Some(Color::LightGreen),
		"light_yellow" => Some(Color::LightYellow),
		"light_blue" => Some(Color::LightBlue),
		"light_magenta" => Some(Color::LightMagenta),
		"light_cyan" => Some(Color::LightCyan),
		"white" => Some(Color::White),
		_ => None,
	}
}

#[derive(Debug, Clone)]
enum PromptOutcome {
	NextPrompt(PromptState),
	Select(SelectState),
	Done(String),
}

#[derive(Debug, Clone)]
enum SelectOutcome {
	NextPrompt(PromptState),
	NextSelect(SelectState),
	Done(String),
}

#[derive(Debug, Clone)]
struct PromptState {
	title: String,
	input: String,
	kind: PromptKind,
}

impl PromptState {
	fn new(title: impl Into<String>, kind: PromptKind) -> Self {
		Self::with_input(title, kind, String::new())
	}

	fn with_input(title: impl Into<String>, kind: PromptKind, input: String) -> Self {
		Self {
			title: title.into(),
			input,
			kind,
		}
	}
}

#[derive(Debug, Clone)]
struct SelectState {
	title: String,
	options: Vec<SelectOption>,
	selected: usize,
	kind: SelectKind,
}

impl SelectState {
	fn new(title: impl Into<String>, kind: SelectKind, options: Vec<SelectOption>) -> Self {
		Self {
			title: title.into(),
			options,
			selected: 0,
			kind,
		}
	}

	fn move_selection(&mut self, delta: i32) {
		if self.options.is_empty() {
			self.selected = 0;
			return;
		}

		if delta > 0 {
			self.selected = (self.selected + delta as usize).min(self.options.len() - 1);
		} else {
			self.selected = self.selected.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	fn selected_option(&self) -> Option<&SelectOption> {
		self.options.get(self.selected)
	}
}

#[derive(Debug, Clone)]
struct SelectOption {
	label: String,
	value: Option<String>,
	style: Style,
}

impl SelectOption {
	fn new(label: impl Into<String>, value: Option<String>, style: Style) -> Self {
		Self {
			label: label.into(),
			value,
			style,
		}
	}
}

/// `editing` carries the id of the task being edited; `None` creates a new one.
#[derive(Debug, Clone)]
enum PromptKind {
	Search,
	TaskTitle {
		editing: Option<String>,
		draft: TaskDraft,
	},
	TaskDue {
		editing: Option<String>,
		draft: TaskDraft,
	},
	TaskMinutes {
		editing: Option<String>,
		draft: TaskDraft,
	},
	CategoryName,
	GoalTitle,
	GoalCount {
		title: String,
	},
	GoalMinutes {
		title: String,
		count: u32,
	},
	ExportPath,
	ImportPath,
}

#[derive(Debug, Clone)]
enum SelectKind {
	TaskCategory {
		editing: Option<String>,
		draft: TaskDraft,
	},
	TaskPriority {
		editing: Option<String>,
		draft: TaskDraft,
	},
	GoalPeriod {
		title: String,
		count: u32,
		minutes: u32,
	},
	DeleteTaskConfirm {
		task_id: String,
		title: String,
	},
	RemoveCategory,
	DeleteGoal,
}

#[derive(Debug, Clone)]
enum InputMode {
	Normal,
	Prompt(PromptState),
	Select(SelectState),
}

#[derive(Debug, Clone)]
struct App {
	selected: usize,
	mode: InputMode,
	status: String,
}

impl Default for App {
	fn default() -> Self {
		Self {
			selected: 0,
			mode: InputMode::Normal,
			status: "Ready".to_string(),
		}
	}
}

impl App {
	fn clamp_selection(&mut self, visible: usize) {
		if visible == 0 {
			self.selected = 0;
		} else {
			self.selected = self.selected.min(visible - 1);
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Instant;

	use chrono::NaiveDate;
	use crossterm::event::KeyCode;

	use super::{App, InputMode, handle_normal_key, handle_prompt_key, handle_select_key, progress_bar};
	use crate::config::Config;
	use crate::domain::{Priority, SENTINEL_CATEGORY_ID};
	use crate::storage::MemoryStore;
	use crate::view::ViewMode;
	use crate::workspace::Workspace;

	fn today() -> NaiveDate {
		NaiveDate::from_ymd_opt(2026, 5, 6).unwrap()
	}

	fn workspace() -> Workspace<MemoryStore> {
		Workspace::open(MemoryStore::default(), &Config::default(), today()).unwrap()
	}

	fn type_text(app: &mut App, workspace: &mut Workspace<MemoryStore>, text: &str) {
		if let InputMode::Prompt(prompt) = &mut app.mode {
			prompt.input.clear();
		}
		for value in text.chars() {
			handle_prompt_key(app, KeyCode::Char(value), workspace);
		}
		handle_prompt_key(app, KeyCode::Enter, workspace);
	}

	#[test]
	fn new_task_flow_creates_task() {
		let mut workspace = workspace();
		let mut app = App::default();

		handle_normal_key(&mut app, KeyCode::Char('n'), &mut workspace, None, today());
		type_text(&mut app, &mut workspace, "Chemistry worksheet");
		type_text(&mut app, &mut workspace, "2026-05-08");
		// Category select, then priority select (move from medium to low).
		handle_select_key(&mut app, KeyCode::Enter, &mut workspace);
		handle_select_key(&mut app, KeyCode::Down, &mut workspace);
		handle_select_key(&mut app, KeyCode::Enter, &mut workspace);
		type_text(&mut app, &mut workspace, "45");

		assert!(matches!(app.mode, InputMode::Normal));
		let task = &workspace.planner().tasks[0];
		assert_eq!(task.title, "Chemistry worksheet");
		assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2026, 5, 8).unwrap());
		assert_eq!(task.category_id, SENTINEL_CATEGORY_ID);
		assert_eq!(task.priority, Priority::Low);
		assert_eq!(task.planned_minutes, 45);
	}

	#[test]
	fn invalid_due_date_keeps_prompt_open() {
		let mut workspace = workspace();
		let mut app = App::default();

		handle_normal_key(&mut app, KeyCode::Char('n'), &mut workspace, None, today());
		type_text(&mut app, &mut workspace, "Essay");
		type_text(&mut app, &mut workspace, "next friday");

		match &app.mode {
			InputMode::Prompt(prompt) => assert_eq!(prompt.input, "next friday"),
			other => panic!("expected prompt, got {other:?}"),
		}
		assert!(app.status.starts_with("error:"));
		assert!(workspace.planner().tasks.is_empty());
	}

	#[test]
	fn editing_a_task_deleted_mid_flow_reports_no_update() {
		let mut workspace = workspace();
		let mut app = App::default();
		let id = workspace
			.create_task(crate::domain::TaskDraft::new("Outline", Some(today())), chrono::Utc::now())
			.unwrap()
			.unwrap();

		handle_normal_key(&mut app, KeyCode::Char('e'), &mut workspace, Some(&id), today());
		type_text(&mut app, &mut workspace, "Outline v2");
		workspace.delete_task(&id).unwrap();
		type_text(&mut app, &mut workspace, "2026-05-09");
		handle_select_key(&mut app, KeyCode::Enter, &mut workspace);
		handle_select_key(&mut app, KeyCode::Enter, &mut workspace);
		type_text(&mut app, &mut workspace, "40");

		assert!(matches!(app.mode, InputMode::Normal));
		assert!(app.status.starts_with("task not updated"), "status was {}", app.status);
		assert!(workspace.planner().tasks.is_empty());
	}

	#[test]
	fn normal_keys_update_view_state() {
		let mut workspace = workspace();
		let mut app = App::default();

		handle_normal_key(&mut app, KeyCode::Char('v'), &mut workspace, None, today());
		assert_eq!(workspace.view.view_mode, ViewMode::Week);
		handle_normal_key(&mut app, KeyCode::Char('t'), &mut workspace, None, today());
		assert!(workspace.view.show_today_only);
		handle_normal_key(&mut app, KeyCode::Char('a'), &mut workspace, None, today());
		assert!(!workspace.view.auto_sort);
		assert!(handle_normal_key(&mut app, KeyCode::Char('q'), &mut workspace, None, today()));
	}

	#[test]
	fn space_starts_and_stops_timer_on_selected_task() {
		let mut workspace = workspace();
		let mut app = App::default();
		let id = workspace
			.create_task(crate::domain::TaskDraft::new("Reading", Some(today())), chrono::Utc::now())
			.unwrap()
			.unwrap();

		handle_normal_key(&mut app, KeyCode::Char(' '), &mut workspace, Some(&id), today());
		assert!(workspace.timer().is_running());
		workspace.poll_timer(Instant::now() + std::time::Duration::from_secs(2));
		handle_normal_key(&mut app, KeyCode::Char(' '), &mut workspace, Some(&id), today());

		assert!(!workspace.timer().is_running());
		assert_eq!(workspace.planner().task(&id).unwrap().logged_seconds, 2);
	}

	#[test]
	fn progress_bar_scales_to_ten_cells() {
		assert_eq!(progress_bar(0), "[..........]");
		assert_eq!(progress_bar(30), "[###.......]");
		assert_eq!(progress_bar(100), "[##########]");
	}
}
