use std::io;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
	/// Neither `execute` nor `appPath` is set.
	#[error("{name}: no execute or appPath specified")]
	Configuration { name: String },

	#[error("{name}: failed to spawn {program}: {source}")]
	Spawn {
		name: String,
		program: String,
		#[source]
		source: io::Error,
	},

	/// The process died inside the startup grace window.
	#[error("{name}: process exited immediately after start (pid {pid})")]
	ImmediateExit { name: String, pid: u32 },

	#[error("{name}: app not running")]
	NotRunning { name: String },

	#[error("{name}: already running (pid {pid})")]
	AlreadyRunning { name: String, pid: u32 },

	/// Both the graceful signal and the forced kill failed.
	#[error("{name}: failed to kill pid {pid}: {source}")]
	Kill {
		name: String,
		pid: u32,
		#[source]
		source: io::Error,
	},
}

impl SupervisorError {
	pub fn is_not_running(&self) -> bool {
		matches!(self, SupervisorError::NotRunning { .. })
	}

	pub fn app_name(&self) -> &str {
		match self {
			SupervisorError::Configuration { name }
			| SupervisorError::Spawn { name, .. }
			| SupervisorError::ImmediateExit { name, .. }
			| SupervisorError::NotRunning { name }
			| SupervisorError::AlreadyRunning { name, .. }
			| SupervisorError::Kill { name, .. } => name,
		}
	}
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
