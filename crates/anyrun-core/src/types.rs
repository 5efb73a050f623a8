use serde::{Deserialize, Serialize};

/// One supervised application as described in `[[apps]]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDescriptor {
	#[serde(default)]
	pub name: String,
	/// Interpreter or binary; `java`, `npm` and `python` get special argv handling.
	#[serde(default, rename = "execute")]
	pub executable: String,
	#[serde(default, rename = "appPath", alias = "app_path")]
	pub path: String,
	#[serde(default, rename = "appType", alias = "app_type")]
	pub app_type: String,
	#[serde(default)]
	pub daemon: bool,
	#[serde(default)]
	pub args: String,
	#[serde(default)]
	pub autostart: bool,
	#[serde(default, rename = "timeout")]
	pub timeout_secs: u64,
	#[serde(default)]
	pub port: u16,
}

impl AppDescriptor {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
	Running,
	Stopped,
}

impl RunState {
	pub fn as_str(&self) -> &'static str {
		match self {
			RunState::Running => "running",
			RunState::Stopped => "stopped",
		}
	}
}

impl std::fmt::Display for RunState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Point-in-time view of one application, built on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppStatus {
	pub name: String,
	#[serde(rename = "PID")]
	pub pid: u32,
	pub path: String,
	pub status: RunState,
	pub port: u16,
	pub start_time: String,
}

impl AppStatus {
	pub fn stopped(app: &AppDescriptor) -> Self {
		Self {
			name: app.name.clone(),
			pid: 0,
			path: app.path.clone(),
			status: RunState::Stopped,
			port: app.port,
			start_time: String::new(),
		}
	}

	pub fn running(app: &AppDescriptor, pid: u32, start_time: String) -> Self {
		Self {
			name: app.name.clone(),
			pid,
			path: app.path.clone(),
			status: RunState::Running,
			port: app.port,
			start_time,
		}
	}

	pub fn is_running(&self) -> bool {
		self.status == RunState::Running
	}
}
