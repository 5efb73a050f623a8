pub mod api;
pub mod auth;

use anyrun_core::{config, AppDescriptor, Config};
use anyrun_supervisor::Supervisor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Delay between server start and launching autostart apps.
pub const AUTOSTART_DELAY: Duration = Duration::from_secs(2);

pub async fn run(config_path: PathBuf) {
	let config = config::load_or_default(&config_path);
	let port = config.ui_port;
	tracing::info!("using config {}", config_path.display());

	let supervisor = Supervisor::new();
	let state = api::AppState::new(
		Arc::clone(&supervisor),
		config,
		config_path.clone(),
		auth::generate_token(),
	);

	{
		let supervisor = Arc::clone(&supervisor);
		tokio::spawn(async move {
			tokio::time::sleep(AUTOSTART_DELAY).await;
			match config::load_config(&config_path) {
				Ok(config) => {
					autostart(&supervisor, &config).await;
				}
				Err(e) => tracing::warn!("autostart skipped: {}", e),
			}
		});
	}

	let http_handle = tokio::spawn(async move {
		run_http_server(state, port).await;
	});

	tracing::info!("anyrun started (pid {})", std::process::id());

	tokio::select! {
		_ = http_handle => {},
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("shutting down");
		}
	}
}

/// Starts every app marked `autostart`, returning how many came up.
pub async fn autostart(supervisor: &Supervisor, config: &Config) -> usize {
	let apps: Vec<AppDescriptor> = config.autostart_apps().cloned().collect();
	if apps.is_empty() {
		return 0;
	}
	tracing::info!("autostarting {} apps", apps.len());

	let failures = supervisor.start_all(&apps).await;
	for failure in &failures {
		tracing::error!("autostart failed: {}", failure.error);
	}
	apps.len() - failures.len()
}

async fn run_http_server(state: api::AppState, port: u16) {
	let app = api::router(state);
	let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
	let listener = match tokio::net::TcpListener::bind(addr).await {
		Ok(l) => l,
		Err(e) => {
			tracing::error!("failed to bind HTTP on {}: {}", addr, e);
			return;
		}
	};
	tracing::info!("web UI listening on http://{}", addr);
	if let Err(e) = axum::serve(listener, app).await {
		tracing::error!("HTTP server error: {}", e);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn autostart_starts_only_flagged_apps() {
		let config = config::parse_config(
			r#"
[[apps]]
name = "auto"
execute = "sleep"
args = "30"
autostart = true

[[apps]]
name = "manual"
execute = "sleep"
args = "30"

[[apps]]
name = "auto-broken"
autostart = true
"#,
		)
		.unwrap();

		let sup = Supervisor::new();
		assert_eq!(autostart(&sup, &config).await, 1);
		assert!(sup.status(&config.apps[0]).await.is_running());
		assert!(!sup.status(&config.apps[1]).await.is_running());

		let _ = sup.stop(&config.apps[0]).await;
	}

	#[tokio::test]
	async fn autostart_with_nothing_flagged_is_a_no_op() {
		let sup = Supervisor::new();
		assert_eq!(autostart(&sup, &Config::default()).await, 0);
	}
}
