use crate::render;
use anyrun_core::AppDescriptor;
use anyrun_supervisor::Supervisor;
use owo_colors::OwoColorize;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, PartialEq, Eq)]
pub enum ShellCommand {
	/// `None` targets every app.
	Start(Option<String>),
	Stop(Option<String>),
	Status,
	Help,
	Exit,
	Unknown(String),
}

impl ShellCommand {
	pub fn parse(line: &str) -> Option<Self> {
		let mut words = line.split_whitespace();
		let cmd = words.next()?;
		let target = words.next().map(str::to_string);
		Some(match cmd {
			"start" => ShellCommand::Start(target),
			"stop" => ShellCommand::Stop(target),
			"status" | "st" => ShellCommand::Status,
			"help" | "?" => ShellCommand::Help,
			"exit" | "quit" => ShellCommand::Exit,
			other => ShellCommand::Unknown(other.to_string()),
		})
	}
}

fn targets<'a>(apps: &'a [AppDescriptor], name: Option<&str>) -> Result<Vec<&'a AppDescriptor>, String> {
	match name {
		None => Ok(apps.iter().collect()),
		Some(name) => apps
			.iter()
			.find(|a| a.name == name)
			.map(|a| vec![a])
			.ok_or_else(|| format!("unknown app: {}", name)),
	}
}

/// Runs one command and returns the lines to print.
pub async fn execute(supervisor: &Supervisor, apps: &[AppDescriptor], command: &ShellCommand) -> Vec<String> {
	let mut out = Vec::new();
	match command {
		ShellCommand::Start(name) => match targets(apps, name.as_deref()) {
			Ok(targets) => {
				for app in targets {
					match supervisor.start(app).await {
						Ok(pid) => out.push(format!("{} {} (pid {})", "started".green(), app.name, pid)),
						Err(e) => out.push(format!("{} {}", "failed".red(), e)),
					}
				}
			}
			Err(e) => out.push(e),
		},
		ShellCommand::Stop(name) => match targets(apps, name.as_deref()) {
			Ok(targets) => {
				for app in targets {
					match supervisor.stop(app).await {
						Ok(outcome) => out.push(format!("{} {}", outcome.green(), app.name)),
						Err(e) if e.is_not_running() && name.is_none() => {}
						Err(e) => out.push(format!("{} {}", "failed".red(), e)),
					}
				}
			}
			Err(e) => out.push(e),
		},
		ShellCommand::Status => {
			let statuses = supervisor.statuses(apps).await;
			out.extend(render::status_table(apps, &statuses));
		}
		ShellCommand::Help => out.extend(usage()),
		ShellCommand::Unknown(cmd) => {
			out.push(format!("unknown command: {}", cmd));
			out.extend(usage());
		}
		ShellCommand::Exit => {}
	}
	out
}

fn usage() -> Vec<String> {
	vec![
		format!("  {} [name]   Start one app, or all", "start".bold()),
		format!("  {} [name]    Stop one app, or all", "stop".bold()),
		format!("  {}          Show every app", "status".bold()),
		format!("  {}            Leave the shell", "exit".bold()),
	]
}

fn prompt() {
	print!("{} ", "anyrun>".cyan().bold());
	let _ = std::io::stdout().flush();
}

/// Interactive loop over stdin. Apps started here live as long as this process.
pub async fn run(supervisor: &Supervisor, apps: &[AppDescriptor]) {
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	for line in execute(supervisor, apps, &ShellCommand::Status).await {
		println!("{}", line);
	}

	loop {
		prompt();
		let line = match lines.next_line().await {
			Ok(Some(line)) => line,
			Ok(None) => break,
			Err(e) => {
				tracing::error!("failed to read stdin: {}", e);
				break;
			}
		};
		let Some(command) = ShellCommand::parse(&line) else {
			continue;
		};
		if command == ShellCommand::Exit {
			break;
		}
		for out in execute(supervisor, apps, &command).await {
			println!("{}", out);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sleeper(name: &str) -> AppDescriptor {
		let mut app = AppDescriptor::new(name);
		app.executable = "sleep".into();
		app.args = "30".into();
		app
	}

	#[test]
	fn parses_commands() {
		assert_eq!(ShellCommand::parse(""), None);
		assert_eq!(ShellCommand::parse("   "), None);
		assert_eq!(ShellCommand::parse("start"), Some(ShellCommand::Start(None)));
		assert_eq!(
			ShellCommand::parse(" stop  web "),
			Some(ShellCommand::Stop(Some("web".into())))
		);
		assert_eq!(ShellCommand::parse("status"), Some(ShellCommand::Status));
		assert_eq!(ShellCommand::parse("quit"), Some(ShellCommand::Exit));
		assert_eq!(
			ShellCommand::parse("launch web"),
			Some(ShellCommand::Unknown("launch".into()))
		);
	}

	#[tokio::test]
	async fn unknown_target_is_reported() {
		let sup = Supervisor::new();
		let apps = vec![sleeper("a")];
		let out = execute(&sup, &apps, &ShellCommand::Start(Some("b".into()))).await;
		assert_eq!(out, vec!["unknown app: b".to_string()]);
	}

	#[tokio::test]
	async fn start_and_stop_everything() {
		let sup = Supervisor::new();
		let apps = vec![sleeper("shell-a"), sleeper("shell-b")];

		let out = execute(&sup, &apps, &ShellCommand::Start(None)).await;
		assert_eq!(out.len(), 2);
		assert!(sup.status(&apps[1]).await.is_running());

		let out = execute(&sup, &apps, &ShellCommand::Status).await;
		assert_eq!(out.len(), 3);

		let out = execute(&sup, &apps, &ShellCommand::Stop(Some("shell-a".into()))).await;
		assert_eq!(out.len(), 1);
		assert!(!sup.status(&apps[0]).await.is_running());

		// shell-a is already stopped and is skipped quietly
		let out = execute(&sup, &apps, &ShellCommand::Stop(None)).await;
		assert_eq!(out.len(), 1);
		assert!(!sup.status(&apps[1]).await.is_running());
	}
}
