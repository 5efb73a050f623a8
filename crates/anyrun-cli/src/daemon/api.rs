use super::auth;
use anyrun_core::config::{self, ConfigError};
use anyrun_core::{AppDescriptor, AppStatus, Config, UserConfig};
use anyrun_supervisor::batch::{self, BatchFailure};
use anyrun_supervisor::{Supervisor, SupervisorError};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

#[derive(RustEmbed)]
#[folder = "../../web/"]
struct WebAssets;

#[derive(Clone)]
pub struct AppState {
	pub supervisor: Arc<Supervisor>,
	pub config: Arc<RwLock<Config>>,
	pub config_path: Arc<PathBuf>,
	pub token: Arc<String>,
}

impl AppState {
	pub fn new(supervisor: Arc<Supervisor>, config: Config, config_path: PathBuf, token: String) -> Self {
		Self {
			supervisor,
			config: Arc::new(RwLock::new(config)),
			config_path: Arc::new(config_path),
			token: Arc::new(token),
		}
	}

	/// Re-reads the config file. A file that fails to load keeps the last good copy.
	async fn reload(&self) -> Config {
		match config::load_config(&self.config_path) {
			Ok(fresh) => {
				*self.config.write().await = fresh.clone();
				fresh
			}
			Err(e) => {
				tracing::warn!("{}; keeping previous config", e);
				self.config.read().await.clone()
			}
		}
	}

	async fn persist(&self, config: Config) -> Result<(), ConfigError> {
		config::save_config(&self.config_path, &config)?;
		*self.config.write().await = config;
		Ok(())
	}
}

pub fn router(state: AppState) -> Router {
	let protected = Router::new()
		.route("/api/apps", get(list_apps))
		.route("/api/start", get(start_app).post(start_app))
		.route("/api/stop", get(stop_app).post(stop_app))
		.route("/api/restart", get(restart_app).post(restart_app))
		.route("/api/apps/startall", get(start_all).post(start_all))
		.route("/api/apps/stopall", get(stop_all).post(stop_all))
		.route("/api/apps/restartall", get(restart_all).post(restart_all))
		.route("/api/config", get(get_config))
		.route("/api/config/save", post(save_config))
		.route_layer(middleware::from_fn_with_state(state.clone(), auth::auth_middleware));

	Router::new()
		.route("/api/auth/login", post(login))
		.route("/api/auth/user-config", get(user_config))
		.route("/api/auth/change-password", post(change_password))
		.merge(protected)
		.fallback(static_handler)
		.layer(CorsLayer::permissive())
		.with_state(state)
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Serialize)]
struct ActionResponse {
	message: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
	error: String,
}

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
	(status, Json(ErrorResponse { error: error.into() }))
}

fn supervisor_error(err: SupervisorError) -> ApiError {
	let status = match &err {
		SupervisorError::Configuration { .. } => StatusCode::BAD_REQUEST,
		SupervisorError::NotRunning { .. } | SupervisorError::AlreadyRunning { .. } => {
			StatusCode::CONFLICT
		}
		SupervisorError::Spawn { .. }
		| SupervisorError::ImmediateExit { .. }
		| SupervisorError::Kill { .. } => StatusCode::INTERNAL_SERVER_ERROR,
	};
	api_error(status, err.to_string())
}

fn batch_result(verb: &str, failures: Vec<BatchFailure>) -> Result<Json<ActionResponse>, ApiError> {
	if failures.is_empty() {
		return Ok(Json(ActionResponse {
			message: format!("all apps {}", verb),
		}));
	}
	Err(api_error(
		StatusCode::INTERNAL_SERVER_ERROR,
		format!("some apps failed: {}", batch::describe(&failures)),
	))
}

// ── apps ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct NameQuery {
	#[serde(default)]
	name: String,
}

async fn find_app(state: &AppState, name: &str) -> Result<AppDescriptor, ApiError> {
	state
		.reload()
		.await
		.find_app(name)
		.cloned()
		.ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("app not found: {}", name)))
}

async fn list_apps(State(state): State<AppState>) -> Json<Vec<AppStatus>> {
	let config = state.reload().await;
	Json(state.supervisor.statuses(&config.apps).await)
}

async fn start_app(
	State(state): State<AppState>,
	Query(query): Query<NameQuery>,
) -> Result<Json<ActionResponse>, ApiError> {
	let app = find_app(&state, &query.name).await?;
	let pid = state.supervisor.start(&app).await.map_err(supervisor_error)?;
	Ok(Json(ActionResponse {
		message: format!("{}: started (pid {})", app.name, pid),
	}))
}

async fn stop_app(
	State(state): State<AppState>,
	Query(query): Query<NameQuery>,
) -> Result<Json<ActionResponse>, ApiError> {
	let app = find_app(&state, &query.name).await?;
	let outcome = state.supervisor.stop(&app).await.map_err(supervisor_error)?;
	Ok(Json(ActionResponse {
		message: format!("{}: {}", app.name, outcome),
	}))
}

async fn restart_app(
	State(state): State<AppState>,
	Query(query): Query<NameQuery>,
) -> Result<Json<ActionResponse>, ApiError> {
	let app = find_app(&state, &query.name).await?;
	let pid = state.supervisor.restart(&app).await.map_err(supervisor_error)?;
	Ok(Json(ActionResponse {
		message: format!("{}: restarted (pid {})", app.name, pid),
	}))
}

async fn start_all(State(state): State<AppState>) -> Result<Json<ActionResponse>, ApiError> {
	let config = state.reload().await;
	batch_result("started", state.supervisor.start_all(&config.apps).await)
}

async fn stop_all(State(state): State<AppState>) -> Result<Json<ActionResponse>, ApiError> {
	let config = state.reload().await;
	batch_result("stopped", state.supervisor.stop_all(&config.apps).await)
}

async fn restart_all(State(state): State<AppState>) -> Result<Json<ActionResponse>, ApiError> {
	let config = state.reload().await;
	batch_result("restarted", state.supervisor.restart_all(&config.apps).await)
}

// ── config ──────────────────────────────────────────────────────────────────

/// The editable part of the config; `[user]` never leaves the server.
#[derive(Debug, Serialize, Deserialize)]
struct ConfigDocument {
	#[serde(rename = "uiPort", alias = "ui_port", default = "default_ui_port")]
	ui_port: u16,
	#[serde(default)]
	apps: Vec<AppDescriptor>,
}

fn default_ui_port() -> u16 {
	config::DEFAULT_UI_PORT
}

async fn get_config(State(state): State<AppState>) -> Json<ConfigDocument> {
	let config = state.reload().await;
	Json(ConfigDocument {
		ui_port: config.ui_port,
		apps: config.apps,
	})
}

async fn save_config(
	State(state): State<AppState>,
	Json(doc): Json<ConfigDocument>,
) -> Result<Json<ActionResponse>, ApiError> {
	let mut config = state.reload().await;
	config.ui_port = doc.ui_port;
	config.apps = doc.apps;
	config.normalize();
	let count = config.apps.len();
	state
		.persist(config)
		.await
		.map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
	tracing::info!("saved config with {} apps to {}", count, state.config_path.display());
	Ok(Json(ActionResponse {
		message: "config saved".to_string(),
	}))
}

// ── auth ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginRequest {
	#[serde(default)]
	username: String,
	#[serde(default)]
	password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
	success: bool,
	token: String,
	first_login: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserConfigResponse {
	first_login: bool,
	username: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
	#[serde(default)]
	username: String,
	#[serde(default)]
	old_password: String,
	#[serde(default)]
	new_password: String,
}

#[derive(Debug, Serialize)]
struct SuccessResponse {
	success: bool,
}

async fn login(
	State(state): State<AppState>,
	Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
	let config = state.config.read().await;
	let user = config.user.as_ref();
	if !auth::authenticate(user, &req.username, &req.password) {
		tracing::info!("failed login for {:?}", req.username);
		return Err(api_error(StatusCode::UNAUTHORIZED, "invalid username or password"));
	}
	Ok(Json(LoginResponse {
		success: true,
		token: state.token.to_string(),
		first_login: user.map(|u| u.first_login).unwrap_or(false),
	}))
}

async fn user_config(State(state): State<AppState>) -> Json<UserConfigResponse> {
	let config = state.config.read().await;
	let user = config.user.clone().unwrap_or_default();
	Json(UserConfigResponse {
		first_login: user.first_login,
		username: user.username,
	})
}

async fn change_password(
	State(state): State<AppState>,
	Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
	let mut config = state.reload().await;
	if !auth::authenticate(config.user.as_ref(), &req.username, &req.old_password) {
		return Err(api_error(StatusCode::UNAUTHORIZED, "invalid username or password"));
	}
	if req.new_password.is_empty() {
		return Err(api_error(StatusCode::BAD_REQUEST, "new password must not be empty"));
	}

	config.user = Some(UserConfig {
		username: req.username,
		password_hash: auth::hash_password(&req.new_password),
		first_login: false,
	});
	state
		.persist(config)
		.await
		.map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
	tracing::info!("password changed");
	Ok(Json(SuccessResponse { success: true }))
}

// ── web ui ──────────────────────────────────────────────────────────────────

async fn static_handler(uri: Uri) -> Response {
	let path = uri.path().trim_start_matches('/');

	if let Some(content) = WebAssets::get(path) {
		return serve_asset(path, content);
	}

	if !path.starts_with("assets/") && !path.contains('.') {
		if let Some(content) = WebAssets::get("index.html") {
			return serve_asset("index.html", content);
		}
	}

	(StatusCode::NOT_FOUND, "Not Found").into_response()
}

fn serve_asset(path: &str, content: rust_embed::EmbeddedFile) -> Response {
	let mime = mime_guess::from_path(path).first_or_octet_stream();
	(
		StatusCode::OK,
		[(header::CONTENT_TYPE, mime.essence_str().to_string())],
		content.data,
	)
		.into_response()
}

#[cfg(test)]
mod tests {
	use super::*;

	const CONFIG: &str = r#"
uiPort = 9000

[user]
username = "admin"
passwordHash = ""
firstLogin = true

[[apps]]
name = "sleeper"
execute = "sleep"
args = "30"
port = 8080

[[apps]]
name = "broken"
"#;

	fn state_with(content: &str) -> (tempfile::TempDir, AppState) {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("anyrun.toml");
		std::fs::write(&path, content).unwrap();
		let config = config::load_config(&path).unwrap();
		let state = AppState::new(Supervisor::new(), config, path, auth::generate_token());
		(dir, state)
	}

	fn name(name: &str) -> Query<NameQuery> {
		Query(NameQuery { name: name.to_string() })
	}

	async fn serve(state: AppState) -> std::net::SocketAddr {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, router(state)).await.unwrap();
		});
		addr
	}

	async fn get_status(addr: std::net::SocketAddr, path: &str, token: Option<&str>) -> u16 {
		use tokio::io::{AsyncReadExt, AsyncWriteExt};

		let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
		let auth = token
			.map(|t| format!("Authorization: Bearer {}\r\n", t))
			.unwrap_or_default();
		let request = format!(
			"GET {} HTTP/1.1\r\nHost: localhost\r\n{}Connection: close\r\n\r\n",
			path, auth
		);
		stream.write_all(request.as_bytes()).await.unwrap();
		let mut response = Vec::new();
		stream.read_to_end(&mut response).await.unwrap();
		let response = String::from_utf8_lossy(&response);
		response.split_whitespace().nth(1).unwrap().parse().unwrap()
	}

	#[tokio::test]
	async fn protected_routes_need_the_session_token() {
		let (_dir, state) = state_with(CONFIG);
		let token = state.token.to_string();
		let addr = serve(state).await;

		assert_eq!(get_status(addr, "/api/apps", None).await, 401);
		assert_eq!(get_status(addr, "/api/apps", Some("not-the-token")).await, 401);
		assert_eq!(get_status(addr, "/api/apps", Some(&token)).await, 200);
		assert_eq!(get_status(addr, "/api/config", None).await, 401);
		// login helpers stay reachable without a token
		assert_eq!(get_status(addr, "/api/auth/user-config", None).await, 200);
	}

	#[tokio::test]
	async fn passwordless_user_after_first_login_needs_no_token() {
		let (_dir, state) = state_with(&CONFIG.replace("firstLogin = true", "firstLogin = false"));
		let addr = serve(state).await;
		assert_eq!(get_status(addr, "/api/apps", None).await, 200);
	}

	#[tokio::test]
	async fn unknown_app_is_not_found() {
		let (_dir, state) = state_with(CONFIG);
		let (status, body) = start_app(State(state.clone()), name("ghost")).await.err().unwrap();
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert!(body.error.contains("ghost"));

		let (status, _) = stop_app(State(state), name("ghost")).await.err().unwrap();
		assert_eq!(status, StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn supervisor_errors_map_to_status_codes() {
		let (_dir, state) = state_with(CONFIG);

		let (status, _) = start_app(State(state.clone()), name("broken")).await.err().unwrap();
		assert_eq!(status, StatusCode::BAD_REQUEST);

		let (status, body) = stop_app(State(state.clone()), name("sleeper")).await.err().unwrap();
		assert_eq!(status, StatusCode::CONFLICT);
		assert!(body.error.contains("not running"));
	}

	#[tokio::test]
	async fn start_list_and_stop() {
		let (_dir, state) = state_with(CONFIG);

		let Json(started) = start_app(State(state.clone()), name("sleeper")).await.unwrap();
		assert!(started.message.starts_with("sleeper: started"));

		let (status, _) = start_app(State(state.clone()), name("sleeper")).await.err().unwrap();
		assert_eq!(status, StatusCode::CONFLICT);

		let Json(apps) = list_apps(State(state.clone())).await;
		assert_eq!(apps.len(), 2);
		assert!(apps[0].is_running());
		assert_eq!(apps[0].port, 8080);
		assert!(!apps[1].is_running());

		let Json(stopped) = stop_app(State(state.clone()), name("sleeper")).await.unwrap();
		assert_eq!(stopped.message, "sleeper: stopped");
	}

	#[tokio::test]
	async fn start_all_reports_the_broken_app() {
		let (_dir, state) = state_with(CONFIG);
		let (status, body) = start_all(State(state.clone())).await.err().unwrap();
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert!(body.error.contains("broken"));

		// broken never started, so stopall reports it as not running
		let (status, body) = stop_all(State(state.clone())).await.err().unwrap();
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert!(body.error.contains("broken: app not running"), "{}", body.error);
		assert!(!body.error.contains("sleeper"));

		let Json(apps) = list_apps(State(state)).await;
		assert!(apps.iter().all(|a| !a.is_running()));
	}

	#[tokio::test]
	async fn get_config_hides_user() {
		let (_dir, state) = state_with(CONFIG);
		let Json(doc) = get_config(State(state)).await;
		let json = serde_json::to_value(&doc).unwrap();
		assert_eq!(json["uiPort"], 9000);
		assert_eq!(json["apps"][0]["execute"], "sleep");
		assert!(json.get("user").is_none());
	}

	#[tokio::test]
	async fn save_config_keeps_user_section() {
		let (_dir, state) = state_with(CONFIG);
		let doc: ConfigDocument = serde_json::from_value(serde_json::json!({
			"uiPort": 9100,
			"apps": [{ "name": "new", "execute": "sleep", "args": "5" }, { "name": "" }]
		}))
		.unwrap();
		save_config(State(state.clone()), Json(doc)).await.unwrap();

		let saved = config::load_config(&state.config_path).unwrap();
		assert_eq!(saved.ui_port, 9100);
		assert_eq!(saved.apps.len(), 1);
		assert_eq!(saved.apps[0].name, "new");
		assert_eq!(saved.user.as_ref().map(|u| u.username.as_str()), Some("admin"));
	}

	#[tokio::test]
	async fn first_login_then_change_password() {
		let (_dir, state) = state_with(CONFIG);

		let Json(res) = login(
			State(state.clone()),
			Json(LoginRequest { username: "admin".into(), password: String::new() }),
		)
		.await
		.unwrap();
		assert!(res.success && res.first_login);
		assert_eq!(res.token, *state.token);

		change_password(
			State(state.clone()),
			Json(ChangePasswordRequest {
				username: "admin".into(),
				old_password: String::new(),
				new_password: "s3cret".into(),
			}),
		)
		.await
		.unwrap();

		let Json(user) = user_config(State(state.clone())).await;
		assert!(!user.first_login);

		let (status, _) = login(
			State(state.clone()),
			Json(LoginRequest { username: "admin".into(), password: "wrong".into() }),
		)
		.await
		.err()
		.unwrap();
		assert_eq!(status, StatusCode::UNAUTHORIZED);

		let Json(res) = login(
			State(state.clone()),
			Json(LoginRequest { username: "admin".into(), password: "s3cret".into() }),
		)
		.await
		.unwrap();
		assert!(!res.first_login);

		let saved = config::load_config(&state.config_path).unwrap();
		assert_eq!(saved.user.unwrap().password_hash, auth::hash_password("s3cret"));
	}

	#[tokio::test]
	async fn client_routes_fall_back_to_index() {
		let res = static_handler("/apps/web".parse().unwrap()).await;
		assert_eq!(res.status(), StatusCode::OK);
		assert_eq!(res.headers()[header::CONTENT_TYPE], "text/html");
	}

	#[tokio::test]
	async fn unknown_asset_is_not_found() {
		let res = static_handler("/missing.js".parse().unwrap()).await;
		assert_eq!(res.status(), StatusCode::NOT_FOUND);
	}
}
