mod config;
mod domain;
mod storage;
mod store;
mod ticker;
mod ui;
mod validation;

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, LOG_FILE, resolve_config_path, resolve_state_dir};
use crate::domain::format_countdown;
use crate::storage::{DirStore, KeyValueStore};
use crate::store::CycleStore;
use crate::ticker::catch_up;
use crate::ui::run_dashboard;
use crate::validation::NewCycleForm;

#[derive(Debug, Parser)]
#[command(name = "cycle-timer", about = "Terminal focus-cycle timer")]
struct Cli {
	#[arg(long)]
	config: Option<PathBuf>,
	#[arg(long)]
	state_dir: Option<PathBuf>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Dashboard,
	Start {
		#[arg(long)]
		task: String,
		#[arg(long)]
		minutes: Option<String>,
	},
	Interrupt,
	Status,
	History {
		#[arg(long, default_value_t = 20)]
		limit: usize,
	},
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();

	let config = Config::load(&resolve_config_path(cli.config))?;
	let state_dir = resolve_state_dir(cli.state_dir, &config);
	if let Err(err) = init_logging(&state_dir, &config) {
		eprintln!("warning: logging disabled: {err}");
	}

	let mut store = CycleStore::open(DirStore::new(&state_dir));
	catch_up(&mut store, Utc::now());
	info!(state_dir = %store.storage().base_dir().display(), "cycle store ready");

	match cli.command.unwrap_or(Command::Dashboard) {
		Command::Dashboard => {
			run_dashboard(&mut store, &config)?;
		}
		Command::Start { task, minutes } => {
			let minutes = minutes.unwrap_or_else(|| config.default_minutes.to_string());
			let data = NewCycleForm::new(task, minutes).validate()?;
			if let Some(previous) = store.active_cycle() {
				println!("interrupting {}", previous.task);
			}
			let id = store.create_cycle(&data.task, data.minutes_amount, Utc::now())?;
			println!(
				"started {} for {} min (cycle {id})",
				data.task, data.minutes_amount
			);
		}
		Command::Interrupt => match store.active_cycle().map(|cycle| cycle.task.clone()) {
			Some(task) => {
				store.interrupt_active_cycle(Utc::now());
				println!("interrupted {task}");
			}
			None => println!("no active cycle"),
		},
		Command::Status => {
			print_status(&store);
		}
		Command::History { limit } => {
			print_history(&store, limit);
		}
	}

	Ok(())
}

fn init_logging(state_dir: &Path, config: &Config) -> Result<(), Box<dyn Error>> {
	fs::create_dir_all(state_dir)?;
	let file = fs::OpenOptions::new()
		.create(true)
		.append(true)
		.open(state_dir.join(LOG_FILE))?;

	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
		)
		.with_ansi(false)
		.with_writer(Mutex::new(file))
		.try_init()
		.map_err(|err| err.to_string())?;

	Ok(())
}

fn print_status<S: KeyValueStore>(store: &CycleStore<S>) {
	match (store.active_cycle_id(), store.active_cycle()) {
		(Some(id), Some(cycle)) => println!(
			"{} remaining | {} | {} min (cycle {id})",
			format_countdown(store.remaining_seconds()),
			cycle.task,
			cycle.minutes_amount
		),
		_ => println!("no active cycle"),
	}
}

fn print_history<S: KeyValueStore>(store: &CycleStore<S>, limit: usize) {
	if store.cycles().is_empty() {
		println!("no cycles yet");
		return;
	}

	for cycle in store.cycles().iter().rev().take(limit) {
		let ended = cycle
			.ended_at()
			.map(|at| at.with_timezone(&Local).format("%H:%M").to_string())
			.unwrap_or_else(|| "-".to_string());
		println!(
			"{} -> {} | {:>2} min | {:<11} | {}",
			cycle.start_date.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
			ended,
			cycle.minutes_amount,
			cycle.status().label(),
			cycle.task
		);
	}

	let summary = store.history_summary();
	println!(
		"\n{} finished | {} interrupted | {} active | {} min focused",
		summary.finished, summary.interrupted, summary.active, summary.focused_minutes
	);
}
