use std::process::Stdio;

use anyrun_core::AppDescriptor;
use tokio::process::Command;

use crate::error::{Result, SupervisorError};

/// Program plus argument vector derived from a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
	pub program: String,
	pub args: Vec<String>,
}

impl Invocation {
	fn new(program: &str, args: Vec<String>) -> Self {
		Self {
			program: program.to_string(),
			args,
		}
	}

	/// Children inherit the working directory and get no stdio.
	pub fn command(&self) -> Command {
		let mut cmd = Command::new(&self.program);
		cmd.args(&self.args)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null());
		cmd
	}
}

impl std::fmt::Display for Invocation {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.program)?;
		for arg in &self.args {
			write!(f, " {}", arg)?;
		}
		Ok(())
	}
}

/// Whitespace split with no quoting: `"a b"` stays two arguments.
pub fn split_args(args: &str) -> impl Iterator<Item = String> + '_ {
	args.split_whitespace().map(str::to_string)
}

fn path_then_args(app: &AppDescriptor) -> Vec<String> {
	let mut parts = Vec::new();
	if !app.path.is_empty() {
		parts.push(app.path.clone());
	}
	parts.extend(split_args(&app.args));
	parts
}

pub fn resolve(app: &AppDescriptor) -> Result<Invocation> {
	match app.executable.as_str() {
		"java" => {
			let mut args = Vec::new();
			if app.path.ends_with(".jar") {
				args.push("-jar".to_string());
			}
			args.extend(path_then_args(app));
			Ok(Invocation::new("java", args))
		}
		"npm" => {
			let mut args = vec!["run".to_string()];
			args.extend(path_then_args(app));
			Ok(Invocation::new("npm", args))
		}
		"python" => Ok(Invocation::new("python", path_then_args(app))),
		"" if !app.path.is_empty() => Ok(Invocation::new(&app.path, split_args(&app.args).collect())),
		"" => Err(SupervisorError::Configuration {
			name: app.name.clone(),
		}),
		executable => Ok(Invocation::new(executable, path_then_args(app))),
	}
}
