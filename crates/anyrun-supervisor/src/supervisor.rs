use std::sync::Arc;
use std::time::Duration;

use anyrun_core::{AppDescriptor, AppStatus};
use chrono::{DateTime, Local};

use crate::controller::{platform_controller, ChildProcess, ProcessController};
use crate::error::{Result, SupervisorError};
use crate::launch;
use crate::registry::{Entry, ProcessHandle, Registry};

/// How long `start` waits before deciding the process survived startup.
pub const STARTUP_GRACE: Duration = Duration::from_millis(500);
/// How long `stop` waits after the graceful signal before killing.
pub const TERMINATION_TIMEOUT: Duration = Duration::from_secs(5);
/// How long `stop` waits for the exit to be collected after a forced kill.
pub const KILL_REAP_WAIT: Duration = Duration::from_millis(250);
pub const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
	/// The handle was stale; nothing had to be signalled.
	AlreadyExited,
	/// Exited after the graceful signal.
	Exited,
	/// Needed a forced kill.
	Killed,
}

impl std::fmt::Display for StopOutcome {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			StopOutcome::AlreadyExited => "already exited",
			StopOutcome::Exited => "stopped",
			StopOutcome::Killed => "killed",
		})
	}
}

pub struct Supervisor {
	registry: Registry,
	controller: Arc<dyn ProcessController>,
}

impl Supervisor {
	pub fn new() -> Arc<Self> {
		Self::with_controller(platform_controller())
	}

	pub fn with_controller(controller: Arc<dyn ProcessController>) -> Arc<Self> {
		tracing::debug!("process controller: {}", controller.name());
		Arc::new(Self {
			registry: Registry::new(),
			controller,
		})
	}

	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	pub fn controller(&self) -> &dyn ProcessController {
		self.controller.as_ref()
	}

	/// Spawns `app` and returns its pid once it has outlived [`STARTUP_GRACE`].
	pub async fn start(&self, app: &AppDescriptor) -> Result<u32> {
		let mut entry = self.registry.entry(&app.name).await;
		if let Some((pid, _)) = self.probe(&mut entry) {
			return Err(SupervisorError::AlreadyRunning {
				name: app.name.clone(),
				pid,
			});
		}

		let invocation = launch::resolve(app)?;
		let child = invocation
			.command()
			.spawn()
			.map_err(|source| SupervisorError::Spawn {
				name: app.name.clone(),
				program: invocation.program.clone(),
				source,
			})?;

		let process = if app.daemon {
			ChildProcess::detached(&app.name, child)
		} else {
			ChildProcess::attached(child)
		};
		let pid = process.pid();
		entry.put(ProcessHandle::new(process));
		tracing::info!("{}: started `{}` (pid {})", app.name, invocation, pid);

		tokio::time::sleep(STARTUP_GRACE).await;

		if self.probe(&mut entry).is_none() {
			tracing::warn!("{}: pid {} exited within {:?} of starting", app.name, pid, STARTUP_GRACE);
			return Err(SupervisorError::ImmediateExit {
				name: app.name.clone(),
				pid,
			});
		}
		Ok(pid)
	}

	pub async fn stop(&self, app: &AppDescriptor) -> Result<StopOutcome> {
		let mut entry = self.registry.entry(&app.name).await;
		let handle = entry.get_mut().ok_or_else(|| SupervisorError::NotRunning {
			name: app.name.clone(),
		})?;

		let outcome = terminate(self.controller.as_ref(), &app.name, handle).await?;
		entry.remove();
		tracing::info!("{}: {}", app.name, outcome);
		Ok(outcome)
	}

	/// Stop (if running) then start.
	pub async fn restart(&self, app: &AppDescriptor) -> Result<u32> {
		match self.stop(app).await {
			Ok(_) => {}
			Err(e) if e.is_not_running() => {}
			Err(e) => return Err(e),
		}
		self.start(app).await
	}

	/// Never fails; a dead process is pruned and reported as stopped.
	pub async fn status(&self, app: &AppDescriptor) -> AppStatus {
		let mut entry = self.registry.entry(&app.name).await;
		match self.probe(&mut entry) {
			Some((pid, started_at)) => {
				AppStatus::running(app, pid, started_at.format(START_TIME_FORMAT).to_string())
			}
			None => AppStatus::stopped(app),
		}
	}

	pub async fn statuses(&self, apps: &[AppDescriptor]) -> Vec<AppStatus> {
		let mut result = Vec::with_capacity(apps.len());
		for app in apps {
			result.push(self.status(app).await);
		}
		result
	}

	/// Liveness check of the handle in `entry`; a dead one is removed.
	fn probe(&self, entry: &mut Entry) -> Option<(u32, DateTime<Local>)> {
		let handle = entry.get_mut()?;
		if self.controller.is_alive(&mut handle.process) {
			return Some((handle.pid, handle.started_at));
		}
		let pid = handle.pid;
		entry.remove();
		tracing::info!("{}: pid {} is no longer running", entry.name(), pid);
		None
	}
}

async fn terminate(
	controller: &dyn ProcessController,
	name: &str,
	handle: &mut ProcessHandle,
) -> Result<StopOutcome> {
	let pid = handle.pid;
	let process = &mut handle.process;

	if !controller.is_alive(process) {
		return Ok(StopOutcome::AlreadyExited);
	}

	let mut escalated = false;
	if let Err(e) = controller.terminate(process) {
		tracing::debug!("{}: graceful stop unavailable for pid {} ({}), killing", name, pid, e);
		controller.kill(process).map_err(|source| SupervisorError::Kill {
			name: name.to_string(),
			pid,
			source,
		})?;
		escalated = true;
	}

	let exited = tokio::time::timeout(TERMINATION_TIMEOUT, process.wait()).await;
	match exited {
		Ok(waited) => {
			if let Err(e) = waited {
				tracing::debug!("{}: wait on pid {} failed: {}", name, pid, e);
			}
			Ok(if escalated { StopOutcome::Killed } else { StopOutcome::Exited })
		}
		Err(_) => {
			tracing::warn!("{}: pid {} still running after {:?}, killing", name, pid, TERMINATION_TIMEOUT);
			if let Err(e) = controller.kill(process) {
				tracing::warn!("{}: kill of pid {} failed: {}", name, pid, e);
			}
			let _ = tokio::time::timeout(KILL_REAP_WAIT, process.wait()).await;
			Ok(StopOutcome::Killed)
		}
	}
}
