use log::LevelFilter;
use std::env;

fn do_init(level: Option<LevelFilter>) {
	use chrono::Local;
	use env_logger::{
		fmt::style::{AnsiColor, Style},
		Builder,
	};
	use log::Level;
	use std::io::Write;

	let mut logger = Builder::from_default_env();
	logger.format(|buf, record| {
		let level_color = match record.level() {
			Level::Error => AnsiColor::Red,
			Level::Warn => AnsiColor::Yellow,
			Level::Info => AnsiColor::Green,
			Level::Debug => AnsiColor::Blue,
			Level::Trace => AnsiColor::Cyan,
		};
		let style = Style::new().fg_color(Some(level_color.into()));
		let dim = Style::new().dimmed();

		writeln!(
			buf,
			"{dim}[{}{dim:#} {style}{: <5}{style:#} {dim}{}]{dim:#} {}",
			Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
			record.level(),
			record.target(),
			record.args()
		)
	});

	if let Some(level) = level {
		logger.filter_level(level);
	}

	logger.init()
}

pub fn init_logger() {
	match env::var_os("RUST_LOG") {
		Some(_) => do_init(None),
		None => do_init(Some(LevelFilter::Debug)),
	}
}
