//! Start/stop/restart across every configured app, collecting failures
//! instead of stopping at the first one.

use anyrun_core::AppDescriptor;

use crate::error::SupervisorError;
use crate::supervisor::Supervisor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Start,
	Stop,
}

impl std::fmt::Display for Phase {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			Phase::Start => "start",
			Phase::Stop => "stop",
		})
	}
}

#[derive(Debug)]
pub struct BatchFailure {
	pub phase: Phase,
	pub error: SupervisorError,
}

impl BatchFailure {
	pub fn name(&self) -> &str {
		self.error.app_name()
	}
}

impl std::fmt::Display for BatchFailure {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "[{}] {}", self.phase, self.error)
	}
}

pub fn describe(failures: &[BatchFailure]) -> String {
	failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl Supervisor {
	/// Apps that are already running are left alone.
	pub async fn start_all(&self, apps: &[AppDescriptor]) -> Vec<BatchFailure> {
		let mut failures = Vec::new();
		for app in apps {
			match self.start(app).await {
				Ok(_) | Err(SupervisorError::AlreadyRunning { .. }) => {}
				Err(error) => failures.push(BatchFailure {
					phase: Phase::Start,
					error,
				}),
			}
		}
		failures
	}

	pub async fn stop_all(&self, apps: &[AppDescriptor]) -> Vec<BatchFailure> {
		let mut failures = Vec::new();
		for app in apps {
			if let Err(error) = self.stop(app).await {
				failures.push(BatchFailure {
					phase: Phase::Stop,
					error,
				});
			}
		}
		failures
	}

	/// Stops everything, then starts everything. Apps that were not running
	/// are not a stop-phase failure.
	pub async fn restart_all(&self, apps: &[AppDescriptor]) -> Vec<BatchFailure> {
		let mut failures: Vec<BatchFailure> = self
			.stop_all(apps)
			.await
			.into_iter()
			.filter(|f| !f.error.is_not_running())
			.collect();
		failures.extend(self.start_all(apps).await);
		failures
	}
}
