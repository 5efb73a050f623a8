use std::io;
use std::sync::Arc;

use tokio::process::Child;
use tokio::sync::watch;

/// A spawned child plus whoever is responsible for reaping it.
///
/// Attached children are owned here and only reaped when someone waits on
/// them (Stop, or a probe that finds them exited). Detached children are
/// owned by a background task that blocks on exit; this side only observes
/// the outcome and can ask the task to kill.
pub struct ChildProcess {
	pid: u32,
	owner: Owner,
}

enum Owner {
	Attached(Child),
	Detached {
		exited: watch::Receiver<bool>,
		kill: watch::Sender<bool>,
	},
}

impl ChildProcess {
	pub fn attached(child: Child) -> Self {
		Self {
			pid: child.id().unwrap_or(0),
			owner: Owner::Attached(child),
		}
	}

	/// Hands `child` to a reap task. The task never touches the registry.
	pub fn detached(name: &str, child: Child) -> Self {
		let pid = child.id().unwrap_or(0);
		let (exited, kill) = spawn_reaper(name.to_string(), child);
		Self {
			pid,
			owner: Owner::Detached { exited, kill },
		}
	}

	pub fn pid(&self) -> u32 {
		self.pid
	}

	pub fn is_detached(&self) -> bool {
		matches!(self.owner, Owner::Detached { .. })
	}

	/// Non-blocking: true once the exit has been collected.
	pub fn has_exited(&mut self) -> bool {
		match &mut self.owner {
			Owner::Attached(child) => !matches!(child.try_wait(), Ok(None)),
			Owner::Detached { exited, .. } => *exited.borrow(),
		}
	}

	/// Forced kill through the owner. A process that already exited is not an error.
	pub fn start_kill(&mut self) -> io::Result<()> {
		if self.has_exited() {
			return Ok(());
		}
		match &mut self.owner {
			Owner::Attached(child) => child.start_kill(),
			Owner::Detached { kill, .. } => {
				kill.send_replace(true);
				Ok(())
			}
		}
	}

	pub async fn wait(&mut self) -> io::Result<()> {
		match &mut self.owner {
			Owner::Attached(child) => child.wait().await.map(|_| ()),
			Owner::Detached { exited, .. } => exited
				.wait_for(|done| *done)
				.await
				.map(|_| ())
				.map_err(|_| io::Error::other("reap task ended without reporting exit")),
		}
	}
}

impl std::fmt::Debug for ChildProcess {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ChildProcess")
			.field("pid", &self.pid)
			.field("detached", &self.is_detached())
			.finish()
	}
}

fn spawn_reaper(name: String, mut child: Child) -> (watch::Receiver<bool>, watch::Sender<bool>) {
	let (exited_tx, exited_rx) = watch::channel(false);
	let (kill_tx, mut kill_rx) = watch::channel(false);

	tokio::spawn(async move {
		let status = tokio::select! {
			status = child.wait() => status,
			Ok(()) = kill_rx.changed() => {
				if let Err(e) = child.start_kill() {
					tracing::debug!("{}: kill request failed: {}", name, e);
				}
				child.wait().await
			}
		};
		match status {
			Ok(status) => tracing::debug!("{}: reaped daemon process ({})", name, status),
			Err(e) => tracing::warn!("{}: failed to reap daemon process: {}", name, e),
		}
		let _ = exited_tx.send(true);
	});

	(exited_rx, kill_tx)
}

/// Platform capability for stopping and probing a child.
pub trait ProcessController: Send + Sync + std::fmt::Debug {
	fn name(&self) -> &'static str;

	/// Cooperative stop request. Errors mean the request could not be delivered.
	fn terminate(&self, process: &mut ChildProcess) -> io::Result<()>;

	fn kill(&self, process: &mut ChildProcess) -> io::Result<()>;

	fn is_alive(&self, process: &mut ChildProcess) -> bool;
}

/// SIGTERM / SIGKILL / signal-zero.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixSignals;

#[cfg(unix)]
impl PosixSignals {
	fn signal(pid: u32, signal: Option<nix::sys::signal::Signal>) -> nix::Result<()> {
		use nix::unistd::Pid;
		if pid == 0 {
			return Err(nix::errno::Errno::EINVAL);
		}
		nix::sys::signal::kill(Pid::from_raw(pid as i32), signal)
	}

	fn deliver(pid: u32, signal: nix::sys::signal::Signal) -> io::Result<()> {
		match Self::signal(pid, Some(signal)) {
			// already gone
			Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
			Err(errno) => Err(io::Error::from(errno)),
		}
	}
}

#[cfg(unix)]
impl ProcessController for PosixSignals {
	fn name(&self) -> &'static str {
		"posix"
	}

	fn terminate(&self, process: &mut ChildProcess) -> io::Result<()> {
		Self::deliver(process.pid(), nix::sys::signal::Signal::SIGTERM)
	}

	fn kill(&self, process: &mut ChildProcess) -> io::Result<()> {
		Self::deliver(process.pid(), nix::sys::signal::Signal::SIGKILL)
	}

	fn is_alive(&self, process: &mut ChildProcess) -> bool {
		if process.has_exited() {
			return false;
		}
		// EPERM: exists, but not ours to signal
		matches!(Self::signal(process.pid(), None), Ok(()) | Err(nix::errno::Errno::EPERM))
	}
}

/// For platforms without a graceful stop signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct KillOnly;

impl ProcessController for KillOnly {
	fn name(&self) -> &'static str {
		"kill-only"
	}

	fn terminate(&self, _process: &mut ChildProcess) -> io::Result<()> {
		Err(io::Error::new(
			io::ErrorKind::Unsupported,
			"graceful termination is not supported on this platform",
		))
	}

	fn kill(&self, process: &mut ChildProcess) -> io::Result<()> {
		process.start_kill()
	}

	fn is_alive(&self, process: &mut ChildProcess) -> bool {
		!process.has_exited() && process.pid() > 0
	}
}

pub fn platform_controller() -> Arc<dyn ProcessController> {
	#[cfg(unix)]
	{
		Arc::new(PosixSignals)
	}
	#[cfg(not(unix))]
	{
		Arc::new(KillOnly)
	}
}
