use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::controller::ChildProcess;

#[derive(Debug)]
pub struct ProcessHandle {
	pub pid: u32,
	pub started_at: DateTime<Local>,
	pub process: ChildProcess,
}

impl ProcessHandle {
	pub fn new(process: ChildProcess) -> Self {
		Self {
			pid: process.pid(),
			started_at: Local::now(),
			process,
		}
	}
}

type Slot = Arc<Mutex<Option<ProcessHandle>>>;

/// Name → live handle. Each name has its own slot lock, held by an
/// [`Entry`] for the duration of an operation, so work on one name is
/// serialized while different names proceed in parallel.
#[derive(Default)]
pub struct Registry {
	slots: RwLock<HashMap<String, Slot>>,
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn entry(&self, name: &str) -> Entry {
		let slot = {
			let slots = self.slots.read().await;
			slots.get(name).cloned()
		};
		let slot = match slot {
			Some(slot) => slot,
			None => {
				let mut slots = self.slots.write().await;
				Arc::clone(slots.entry(name.to_string()).or_default())
			}
		};
		Entry {
			name: name.to_string(),
			guard: slot.lock_owned().await,
		}
	}

	/// Pid of the handle stored under `name`, without probing it.
	pub async fn pid(&self, name: &str) -> Option<u32> {
		self.entry(name).await.get().map(|handle| handle.pid)
	}
}

/// Exclusive access to one name's slot.
pub struct Entry {
	name: String,
	guard: OwnedMutexGuard<Option<ProcessHandle>>,
}

impl Entry {
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn get(&self) -> Option<&ProcessHandle> {
		self.guard.as_ref()
	}

	pub fn get_mut(&mut self) -> Option<&mut ProcessHandle> {
		self.guard.as_mut()
	}

	pub fn put(&mut self, handle: ProcessHandle) -> Option<ProcessHandle> {
		self.guard.replace(handle)
	}

	pub fn remove(&mut self) -> Option<ProcessHandle> {
		self.guard.take()
	}
}
