mod daemon;
mod render;
mod shell;

use anyrun_core::{config, AppDescriptor, Config};
use anyrun_supervisor::Supervisor;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() {
	let args: Vec<String> = std::env::args().skip(1).collect();
	let (explicit_config, args) = match split_config_flag(args) {
		Ok(split) => split,
		Err(e) => {
			eprintln!("error: {}", e);
			std::process::exit(2);
		}
	};
	let config_path = config::resolve_config_path(explicit_config.as_deref());

	init_tracing();

	match args.first().map(|s| s.as_str()) {
		None | Some("serve") => runtime().block_on(daemon::run(config_path)),
		Some("help" | "--help" | "-h") => print_usage(),
		Some("version" | "--version" | "-V") => println!("anyrun {}", env!("CARGO_PKG_VERSION")),
		Some("printcfg" | "-printcfg") => cmd_printcfg(&config_path),
		Some("status") => cmd_status(&config_path, &args[1..]),
		Some("start") => cmd_start(&config_path, &args[1..]),
		Some("stop") => cmd_stop(&config_path, &args[1..]),
		Some("shell") => cmd_shell(&config_path),
		Some(other) => {
			eprintln!("unknown command: {}", other);
			eprintln!("run 'anyrun help' for usage");
			std::process::exit(1);
		}
	}
}

fn init_tracing() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

fn runtime() -> tokio::runtime::Runtime {
	match tokio::runtime::Runtime::new() {
		Ok(rt) => rt,
		Err(e) => {
			eprintln!("error: failed to start async runtime: {}", e);
			std::process::exit(1);
		}
	}
}

/// Pulls `--config <path>` / `--config=<path>` out of the argument list.
fn split_config_flag(args: Vec<String>) -> Result<(Option<PathBuf>, Vec<String>), String> {
	let mut config = None;
	let mut rest = Vec::with_capacity(args.len());
	let mut iter = args.into_iter();
	while let Some(arg) = iter.next() {
		if arg == "--config" || arg == "-c" {
			let path = iter.next().ok_or_else(|| format!("{} needs a path", arg))?;
			config = Some(PathBuf::from(path));
		} else if let Some(path) = arg.strip_prefix("--config=") {
			config = Some(PathBuf::from(path));
		} else {
			rest.push(arg);
		}
	}
	Ok((config, rest))
}

fn print_usage() {
	eprintln!("{} {} - run and watch local applications", "anyrun".bold(), env!("CARGO_PKG_VERSION"));
	eprintln!();
	eprintln!("usage: {} [--config <path>] [command]", "anyrun".bold());
	eprintln!();

	eprintln!("{}", "server".cyan().bold());
	eprintln!("  {}                  Web UI + API, starts autostart apps (default)", "serve".bold());
	eprintln!();

	eprintln!("{}", "apps".cyan().bold());
	eprintln!("  {} <name>          Show an app's status as JSON", "status".bold());
	eprintln!("  {} <name>           Start an app", "start".bold());
	eprintln!("  {} <name>            Stop an app", "stop".bold());
	eprintln!("  {}                  Interactive start/stop/status prompt", "shell".bold());
	eprintln!();

	eprintln!("{}", "config".cyan().bold());
	eprintln!("  {}               Print the loaded config", "printcfg".bold());
	eprintln!(
		"  config is read from --config, ${}, ./{} or {}",
		config::CONFIG_ENV,
		config::CONFIG_FILE_NAME,
		config::SYSTEM_CONFIG_PATH
	);
	eprintln!();
}

fn load(config_path: &std::path::Path) -> Config {
	config::load_or_default(config_path)
}

fn require_app(config: &Config, args: &[String], cmd: &str) -> AppDescriptor {
	let Some(name) = args.first() else {
		eprintln!("usage: anyrun {} <name>", cmd);
		std::process::exit(1);
	};
	match config.find_app(name) {
		Some(app) => app.clone(),
		None => {
			eprintln!("unknown app: {}", name);
			let names: Vec<&str> = config.apps.iter().map(|a| a.name.as_str()).collect();
			if !names.is_empty() {
				eprintln!("configured apps: {}", names.join(", "));
			}
			std::process::exit(1);
		}
	}
}

fn cmd_printcfg(config_path: &std::path::Path) {
	let config = load(config_path);
	match serde_json::to_string_pretty(&config) {
		Ok(json) => println!("{}", json),
		Err(e) => {
			eprintln!("error: {}", e);
			std::process::exit(1);
		}
	}
}

fn cmd_status(config_path: &std::path::Path, args: &[String]) {
	let config = load(config_path);
	let app = require_app(&config, args, "status");
	let status = runtime().block_on(async { Supervisor::new().status(&app).await });
	match serde_json::to_string_pretty(&status) {
		Ok(json) => println!("{}", json),
		Err(e) => {
			eprintln!("error: {}", e);
			std::process::exit(1);
		}
	}
}

fn cmd_start(config_path: &std::path::Path, args: &[String]) {
	let config = load(config_path);
	let app = require_app(&config, args, "start");
	match runtime().block_on(async { Supervisor::new().start(&app).await }) {
		Ok(pid) => eprintln!("{} {} (pid {})", "started".green(), app.name, pid),
		Err(e) => {
			eprintln!("error: {}", e);
			std::process::exit(1);
		}
	}
}

fn cmd_stop(config_path: &std::path::Path, args: &[String]) {
	let config = load(config_path);
	let app = require_app(&config, args, "stop");
	match runtime().block_on(async { Supervisor::new().stop(&app).await }) {
		Ok(outcome) => eprintln!("{} {}", outcome.green(), app.name),
		Err(e) => {
			eprintln!("error: {}", e);
			std::process::exit(1);
		}
	}
}

fn cmd_shell(config_path: &std::path::Path) {
	let config = load(config_path);
	runtime().block_on(async {
		let supervisor = Supervisor::new();
		shell::run(&supervisor, &config.apps).await;
	});
}

#[cfg(test)]
mod tests {
	use super::*;

	fn args(list: &[&str]) -> Vec<String> {
		list.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn config_flag_is_stripped_anywhere() {
		let (path, rest) = split_config_flag(args(&["start", "--config", "/tmp/a.toml", "web"])).unwrap();
		assert_eq!(path, Some(PathBuf::from("/tmp/a.toml")));
		assert_eq!(rest, args(&["start", "web"]));

		let (path, rest) = split_config_flag(args(&["--config=/tmp/b.toml", "shell"])).unwrap();
		assert_eq!(path, Some(PathBuf::from("/tmp/b.toml")));
		assert_eq!(rest, args(&["shell"]));
	}

	#[test]
	fn config_flag_without_value_is_an_error() {
		assert!(split_config_flag(args(&["status", "--config"])).is_err());
	}

	#[test]
	fn no_flag_leaves_args_alone() {
		let (path, rest) = split_config_flag(args(&["-printcfg"])).unwrap();
		assert_eq!(path, None);
		assert_eq!(rest, args(&["-printcfg"]));
	}
}
