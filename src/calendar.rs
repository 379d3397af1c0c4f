use chrono::{Datelike, Duration, NaiveDate};

pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// One slot of a month grid. Leading blanks carry no date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthCell {
	pub date: Option<NaiveDate>,
}

pub fn iso_key(day: NaiveDate) -> String {
	day.format(ISO_DATE_FORMAT).to_string()
}

pub fn parse_iso_date(input: &str) -> Result<NaiveDate, chrono::ParseError> {
	NaiveDate::parse_from_str(input.trim(), ISO_DATE_FORMAT)
}

/// Monday of the week containing `day`. Sunday closes the week that started
/// six days earlier rather than opening a new one.
pub fn start_of_week(day: NaiveDate) -> NaiveDate {
	let days_from_monday = day.weekday().num_days_from_monday() as i64;
	day - Duration::days(days_from_monday)
}

pub fn week_dates(start: NaiveDate) -> Vec<(String, NaiveDate)> {
	(0..7)
		.map(|offset| {
			let day = start + Duration::days(offset);
			(iso_key(day), day)
		})
		.collect()
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
	let first_of_next = if month == 12 {
		NaiveDate::from_ymd_opt(year + 1, 1, 1)
	} else {
		NaiveDate::from_ymd_opt(year, month + 1, 1)
	};
	first_of_next
		.and_then(|first| first.pred_opt())
		.map(|last| last.day())
		.unwrap_or(0)
}

pub fn first_day_of_month(day: NaiveDate) -> NaiveDate {
	day.with_day(1).unwrap_or(day)
}

/// Sunday-first grid: `weekday(1st)` blanks (Sunday = 0), then every day of
/// the month in order. An out-of-range month yields an empty grid.
pub fn month_matrix(year: i32, month: u32) -> Vec<MonthCell> {
	let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
		return Vec::new();
	};

	let leading_blanks = first.weekday().num_days_from_sunday() as usize;
	let mut cells = vec![MonthCell { date: None }; leading_blanks];
	cells.extend(
		first
			.iter_days()
			.take_while(|day| day.month() == month)
			.map(|day| MonthCell { date: Some(day) }),
	);
	cells
}

pub fn shift_month(day: NaiveDate, delta: i32) -> NaiveDate {
	let mut year = day.year();
	let mut month = day.month() as i32 + delta;
	while month > 12 {
		year += 1;
		month -= 12;
	}
	while month < 1 {
		year -= 1;
		month += 12;
	}
	let month = month as u32;
	let target_day = day.day().min(days_in_month(year, month));
	NaiveDate::from_ymd_opt(year, month, target_day).unwrap_or(day)
}
