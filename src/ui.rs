use std::error::Error;
use std::io;
use std::time::{Duration as StdDuration, Instant};

use chrono::{Local, Utc};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use crossterm::terminal::{
	EnterAlternateScreen, LeaveAlternateScreen, SetTitle, disable_raw_mode, enable_raw_mode,
};
use crossterm::{ExecutableCommand, execute};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};
use ratatui::{Frame, Terminal};

use crate::config::Config;
use crate::domain::{
	Cycle, CycleStatus, CyclesState, MAX_MINUTES, MIN_MINUTES, format_countdown,
};
use crate::storage::KeyValueStore;
use crate::store::{CycleStore, DEFAULT_TITLE};
use crate::ticker::{Ticker, TickerState};
use crate::validation::{NewCycleForm, ValidationErrors};

const IDLE_POLL: StdDuration = StdDuration::from_millis(250);
const FOCUSED_PANEL_BORDER_COLOR: Color = Color::Yellow;
const INACTIVE_PANEL_BORDER_COLOR: Color = Color::DarkGray;

pub fn run_dashboard<S: KeyValueStore>(
	store: &mut CycleStore<S>,
	config: &Config,
) -> Result<(), Box<dyn Error>> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, store, config);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), SetTitle(DEFAULT_TITLE), LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop<S: KeyValueStore>(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	store: &mut CycleStore<S>,
	config: &Config,
) -> Result<(), Box<dyn Error>> {
	let mut app = App::new(config, store.state());
	let mut ticker = Ticker::new();
	let mut shown_title = String::new();

	loop {
		ticker.sync(store.active_cycle(), Instant::now());
		ticker.poll(store, Instant::now(), Utc::now());
		if ticker.state() == TickerState::Completed {
			app.status = "Cycle finished".to_string();
			app.refresh_suggestions(store.state());
		}

		if shown_title != store.title() {
			execute!(terminal.backend_mut(), SetTitle(store.title()))?;
			shown_title = store.title().to_string();
		}
		terminal.draw(|frame| draw_dashboard(frame, &app, store))?;

		let timeout = ticker
			.time_until_due(Instant::now())
			.map_or(IDLE_POLL, |due| due.min(IDLE_POLL));
		if event::poll(timeout)? {
			if let CEvent::Key(key) = event::read()? {
				if key.kind != KeyEventKind::Press {
					continue;
				}

				let should_quit = match app.mode {
					InputMode::Editing(field) => {
						handle_edit_key(&mut app, key.code, field);
						false
					}
					InputMode::Normal => handle_normal_key(&mut app, key.code, store, &mut ticker),
				};

				if should_quit {
					break;
				}
			}
		}
	}

	Ok(())
}

fn draw_dashboard<S: KeyValueStore>(frame: &mut Frame, app: &App, store: &CycleStore<S>) {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([
			Constraint::Length(6),
			Constraint::Length(5),
			Constraint::Min(5),
			Constraint::Length(4),
		])
		.split(frame.area());

	render_form_panel(frame, layout[0], app, store.active_cycle().is_some());
	render_countdown_panel(frame, layout[1], store);
	render_history_panel(frame, layout[2], store);
	render_footer(frame, layout[3], app, store.active_cycle().is_some());
}

fn render_form_panel(frame: &mut Frame, area: Rect, app: &App, locked: bool) {
	let field_style = |field: FormField| {
		if locked {
			Style::default().fg(Color::DarkGray)
		} else if app.mode == InputMode::Editing(field) {
			Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
		} else {
			Style::default()
		}
	};
	let cursor = |field: FormField| if app.mode == InputMode::Editing(field) { "_" } else { "" };

	let mut lines = vec![Line::from(vec![
		Span::raw("I will work on  "),
		Span::styled(
			format!(
				"{}{}",
				placeholder(&app.form.task, "give your task a name"),
				cursor(FormField::Task)
			),
			field_style(FormField::Task),
		),
	])];
	if let Some(err) = &app.errors.task {
		lines.push(Line::styled(format!("  {err}"), Style::default().fg(Color::Red)));
	}
	lines.push(Line::from(vec![
		Span::raw("during          "),
		Span::styled(
			format!("{}{}", placeholder(&app.form.minutes, "00"), cursor(FormField::Minutes)),
			field_style(FormField::Minutes),
		),
		Span::raw(" minutes"),
	]));
	if let Some(err) = &app.errors.minutes {
		lines.push(Line::styled(format!("  {err}"), Style::default().fg(Color::Red)));
	}
	if !app.suggestions.is_empty() && app.mode == InputMode::Editing(FormField::Task) {
		lines.push(Line::styled(
			format!("Tab: {}", app.suggestions.join(", ")),
			Style::default().fg(Color::DarkGray),
		));
	}

	let block = Block::default()
		.borders(Borders::ALL)
		.title("New cycle")
		.border_style(border_style(matches!(app.mode, InputMode::Editing(_))));
	frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_countdown_panel<S: KeyValueStore>(frame: &mut Frame, area: Rect, store: &CycleStore<S>) {
	let countdown = format_countdown(store.remaining_seconds());
	let spaced = countdown.chars().map(String::from).collect::<Vec<_>>().join(" ");
	let (title, detail) = match store.active_cycle() {
		Some(cycle) => (
			format!("Countdown | {}", cycle.task),
			format!(
				"{} elapsed of {} min",
				format_countdown(store.amount_seconds_passed()),
				cycle.minutes_amount
			),
		),
		None => ("Countdown".to_string(), "idle".to_string()),
	};

	let lines = vec![
		Line::styled(spaced, Style::default().add_modifier(Modifier::BOLD)),
		Line::styled(detail, Style::default().fg(Color::DarkGray)),
	];
	let panel = Paragraph::new(lines)
		.alignment(Alignment::Center)
		.block(
			Block::default()
				.borders(Borders::ALL)
				.title(title)
				.border_style(border_style(store.active_cycle().is_some())),
		);
	frame.render_widget(panel, area);
}

fn render_history_panel<S: KeyValueStore>(frame: &mut Frame, area: Rect, store: &CycleStore<S>) {
	let summary = store.history_summary();
	let items = store
		.cycles()
		.iter()
		.rev()
		.map(|cycle| ListItem::new(history_line(cycle)))
		.collect::<Vec<_>>();

	let title = format!(
		"History | {} finished | {} interrupted | {} min focused",
		summary.finished, summary.interrupted, summary.focused_minutes
	);
	let list = List::new(if items.is_empty() {
		vec![ListItem::new("(no cycles yet)")]
	} else {
		items
	})
	.block(Block::default().borders(Borders::ALL).title(title));
	frame.render_widget(list, area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App, running: bool) {
	let shortcuts = match app.mode {
		InputMode::Normal if running => "i/space interrupt | q quit",
		InputMode::Normal => "t task | m minutes | +/- adjust minutes | Enter start | q quit",
		InputMode::Editing(FormField::Task) => {
			"type task | Tab suggestion | Enter done | Esc cancel"
		}
		InputMode::Editing(FormField::Minutes) => "type minutes | Enter done | Esc cancel",
	};
	let footer = Paragraph::new(vec![Line::from(shortcuts), Line::from(app.status.clone())])
		.block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn history_line(cycle: &Cycle) -> Line<'static> {
	let status = cycle.status();
	let status_style = match status {
		CycleStatus::Active => Style::default().fg(Color::Yellow),
		CycleStatus::Finished => Style::default().fg(Color::Green),
		CycleStatus::Interrupted => Style::default().fg(Color::Red),
	};
	Line::from(vec![
		Span::raw(format!(
			"{} | {:>2} min | ",
			cycle.start_date.with_timezone(&Local).format("%d %b %H:%M"),
			cycle.minutes_amount
		)),
		Span::styled(format!("{:<11}", status.label()), status_style),
		Span::raw(format!(" | {}", cycle.task)),
	])
}

fn handle_normal_key<S: KeyValueStore>(
	app: &mut App,
	code: KeyCode,
	store: &mut CycleStore<S>,
	ticker: &mut Ticker,
) -> bool {
	let running = store.active_cycle().is_some();
	match code {
		KeyCode::Char('q') => return true,
		KeyCode::Char('i') | KeyCode::Char(' ') if running => {
			store.interrupt_active_cycle(Utc::now());
			ticker.cancel();
			app.status = "Cycle interrupted".to_string();
		}
		_ if running => {
			app.status = "A cycle is running: interrupt it first".to_string();
		}
		KeyCode::Char('t') => app.begin_edit(FormField::Task),
		KeyCode::Char('m') => app.begin_edit(FormField::Minutes),
		KeyCode::Char('+') => {
			app.form.minutes = step_minutes(&app.form.minutes, 1, app.minutes_step);
		}
		KeyCode::Char('-') => {
			app.form.minutes = step_minutes(&app.form.minutes, -1, app.minutes_step);
		}
		KeyCode::Enter => submit_form(app, store, ticker),
		_ => {}
	}

	false
}

fn handle_edit_key(app: &mut App, code: KeyCode, field: FormField) {
	match code {
		KeyCode::Esc => {
			if let Some(previous) = app.edit_backup.take() {
				*app.field_mut(field) = previous;
			}
			app.mode = InputMode::Normal;
			app.status = "Input cancelled".to_string();
		}
		KeyCode::Enter => {
			app.edit_backup = None;
			app.mode = InputMode::Normal;
			app.status = String::new();
		}
		KeyCode::Backspace => {
			app.field_mut(field).pop();
			app.suggestion_index = None;
		}
		KeyCode::Tab if field == FormField::Task => app.next_suggestion(),
		KeyCode::Char(value) => {
			if field == FormField::Minutes && !value.is_ascii_digit() {
				return;
			}
			app.field_mut(field).push(value);
			app.suggestion_index = None;
		}
		_ => {}
	}
}

fn submit_form<S: KeyValueStore>(app: &mut App, store: &mut CycleStore<S>, ticker: &mut Ticker) {
	if !app.form.can_submit() {
		app.status = "Name the task before starting".to_string();
		return;
	}

	let data = match app.form.validate() {
		Ok(data) => data,
		Err(errors) => {
			app.status = format!("error: {errors}");
			app.errors = errors;
			return;
		}
	};

	match store.create_cycle(&data.task, data.minutes_amount, Utc::now()) {
		Ok(_) => {
			ticker.sync(store.active_cycle(), Instant::now());
			app.status = format!("Started {} for {} min", data.task, data.minutes_amount);
			app.reset_form();
			app.refresh_suggestions(store.state());
		}
		Err(err) => app.status = format!("error: {err}"),
	}
}

/// Moves the minutes field by whole steps, clamped to the allowed range.
fn step_minutes(raw: &str, steps: i32, step: u32) -> String {
	let current = raw.trim().parse::<i64>().unwrap_or(0);
	let next = current + i64::from(steps) * i64::from(step);
	next.clamp(i64::from(MIN_MINUTES), i64::from(MAX_MINUTES))
		.to_string()
}

fn merge_suggestions(configured: &[String], recent: Vec<String>) -> Vec<String> {
	let mut merged: Vec<String> = Vec::new();
	for task in configured.iter().cloned().chain(recent) {
		if !task.trim().is_empty() && !merged.contains(&task) {
			merged.push(task);
		}
	}
	merged
}

fn placeholder<'a>(value: &'a str, empty: &'a str) -> &'a str {
	if value.is_empty() { empty } else { value }
}

fn border_style(focused: bool) -> Style {
	if focused {
		Style::default().fg(FOCUSED_PANEL_BORDER_COLOR)
	} else {
		Style::default().fg(INACTIVE_PANEL_BORDER_COLOR)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormField {
	Task,
	Minutes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
	Normal,
	Editing(FormField),
}

struct App {
	mode: InputMode,
	form: NewCycleForm,
	errors: ValidationErrors,
	edit_backup: Option<String>,
	default_minutes: u32,
	minutes_step: u32,
	configured_suggestions: Vec<String>,
	suggestions: Vec<String>,
	suggestion_index: Option<usize>,
	status: String,
}

impl App {
	fn new(config: &Config, state: &CyclesState) -> Self {
		let mut app = Self {
			mode: InputMode::Normal,
			form: NewCycleForm::new("", config.default_minutes.to_string()),
			errors: ValidationErrors::default(),
			edit_backup: None,
			default_minutes: config.default_minutes,
			minutes_step: config.minutes_step(),
			configured_suggestions: config.task_suggestions.clone(),
			suggestions: Vec::new(),
			suggestion_index: None,
			status: "Ready".to_string(),
		};
		app.refresh_suggestions(state);
		app
	}

	fn begin_edit(&mut self, field: FormField) {
		self.edit_backup = Some(self.field_mut(field).clone());
		self.mode = InputMode::Editing(field);
		self.suggestion_index = None;
		match field {
			FormField::Task => self.errors.task = None,
			FormField::Minutes => self.errors.minutes = None,
		}
	}

	fn field_mut(&mut self, field: FormField) -> &mut String {
		match field {
			FormField::Task => &mut self.form.task,
			FormField::Minutes => &mut self.form.minutes,
		}
	}

	fn next_suggestion(&mut self) {
		if self.suggestions.is_empty() {
			return;
		}
		let next = self
			.suggestion_index
			.map_or(0, |index| (index + 1) % self.suggestions.len());
		self.suggestion_index = Some(next);
		self.form.task = self.suggestions[next].clone();
	}

	fn refresh_suggestions(&mut self, state: &CyclesState) {
		self.suggestions = merge_suggestions(&self.configured_suggestions, state.recent_tasks());
		self.suggestion_index = None;
	}

	fn reset_form(&mut self) {
		self.form = NewCycleForm::new("", self.default_minutes.to_string());
		self.errors = ValidationErrors::default();
	}
}
