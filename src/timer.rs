use std::time::{Duration, Instant};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TimerState {
	#[default]
	Idle,
	Running {
		task_id: String,
	},
}

/// Elapsed time to be credited to a task when a running timer stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeCommit {
	pub task_id: String,
	pub seconds: u64,
}

#[derive(Debug, Clone, Copy)]
struct TickSchedule {
	next_tick: Instant,
}

/// Manual study timer. Ticks only move the ephemeral counter; the planner
/// sees time when `stop` hands back a commit.
#[derive(Debug, Clone, Default)]
pub struct Timer {
	selected_task: Option<String>,
	state: TimerState,
	elapsed_seconds: u64,
	schedule: Option<TickSchedule>,
}

impl Timer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn state(&self) -> &TimerState {
		&self.state
	}

	pub fn is_running(&self) -> bool {
		matches!(self.state, TimerState::Running { .. })
	}

	pub fn selected_task(&self) -> Option<&str> {
		self.selected_task.as_deref()
	}

	pub fn elapsed_seconds(&self) -> u64 {
		self.elapsed_seconds
	}

	#[cfg(test)]
	pub fn is_scheduled(&self) -> bool {
		self.schedule.is_some()
	}

	/// Changing the selection is refused while running so elapsed time can
	/// only ever be credited to the task it was measured against.
	pub fn select_task(&mut self, task_id: Option<String>) -> bool {
		if self.is_running() {
			return false;
		}
		self.selected_task = task_id.filter(|id| !id.is_empty());
		true
	}

	pub fn start(&mut self, now: Instant) -> bool {
		if self.is_running() {
			return false;
		}
		let Some(task_id) = self.selected_task.clone() else {
			return false;
		};

		self.state = TimerState::Running { task_id };
		self.schedule = Some(TickSchedule {
			next_tick: now + TICK_INTERVAL,
		});
		true
	}

	pub fn tick(&mut self) {
		if self.is_running() {
			self.elapsed_seconds += 1;
		}
	}

	/// Fires every tick that came due by `now` and returns how many fired.
	pub fn poll(&mut self, now: Instant) -> u64 {
		let Some(mut schedule) = self.schedule else {
			return 0;
		};

		let mut fired = 0;
		while schedule.next_tick <= now {
			self.tick();
			schedule.next_tick += TICK_INTERVAL;
			fired += 1;
		}
		self.schedule = Some(schedule);
		fired
	}

	pub fn stop(&mut self) -> Option<TimeCommit> {
		let TimerState::Running { task_id } = std::mem::take(&mut self.state) else {
			return None;
		};
		self.schedule = None;

		let seconds = std::mem::take(&mut self.elapsed_seconds);
		if seconds > 0 && !task_id.is_empty() {
			Some(TimeCommit { task_id, seconds })
		} else {
			None
		}
	}

	pub fn reset(&mut self) {
		self.elapsed_seconds = 0;
	}

	/// Tears the timer down without crediting anything.
	pub fn cancel(&mut self) {
		self.state = TimerState::Idle;
		self.schedule = None;
		self.elapsed_seconds = 0;
	}
}
