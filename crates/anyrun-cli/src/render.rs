use anyrun_core::{AppDescriptor, AppStatus};
use owo_colors::OwoColorize;

pub fn status_line(app: &AppDescriptor, status: &AppStatus, name_width: usize) -> String {
	let (circle, pid, label) = if status.is_running() {
		("●".green().to_string(), status.pid.to_string(), "running".green().to_string())
	} else {
		("●".red().to_string(), "-".to_string(), "stopped".red().to_string())
	};
	let kind = if app.app_type.is_empty() { "-" } else { app.app_type.as_str() };
	let port = if status.port == 0 {
		String::new()
	} else {
		format!(" :{}", status.port)
	};
	let since = if status.start_time.is_empty() {
		String::new()
	} else {
		format!(" {}", format!("since {}", status.start_time).dimmed())
	};
	format!(
		"{} {:<width$} {:<8} {:<8} {:<30} {}{}{}",
		circle,
		status.name,
		pid,
		kind,
		app.path,
		label,
		port,
		since,
		width = name_width
	)
}

pub fn status_table(apps: &[AppDescriptor], statuses: &[AppStatus]) -> Vec<String> {
	let name_width = apps.iter().map(|a| a.name.len()).max().unwrap_or(0).max(4);
	let mut lines = vec![format!(
		"  {:<width$} {:<8} {:<8} {:<30} {}",
		"name",
		"pid",
		"type",
		"path",
		"status",
		width = name_width
	)
	.bold()
	.to_string()];
	lines.extend(
		apps.iter()
			.zip(statuses)
			.map(|(app, status)| status_line(app, status, name_width)),
	);
	lines
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn table_has_header_and_one_line_per_app() {
		let mut web = AppDescriptor::new("web");
		web.path = "server.py".into();
		web.app_type = "python".into();
		web.port = 8000;
		let db = AppDescriptor::new("db");

		let statuses = vec![
			AppStatus::running(&web, 4242, "2026-02-14 09:30:00".into()),
			AppStatus::stopped(&db),
		];
		let lines = status_table(&[web, db], &statuses);
		assert_eq!(lines.len(), 3);
		assert!(lines[1].contains("4242"));
		assert!(lines[1].contains(":8000"));
		assert!(lines[1].contains("2026-02-14 09:30:00"));
		assert!(lines[2].contains("stopped"));
	}
}
