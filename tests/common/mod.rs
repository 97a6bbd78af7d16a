#![allow(dead_code)]

use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use mike_carcass_api::auth::{CredentialVault, SystemClock, TokenAuthority};
use mike_carcass_api::config::AppConfig;
use mike_carcass_api::database::{DatabaseManager, RecordStore};
use mike_carcass_api::routes;
use mike_carcass_api::state::AppState;

pub const PASSWORD: &str = "test-password";
const SECRET: &str = "integration-test-secret";

/// The real server binary on a free port, with its own database and vault.
/// The process is killed when the value is dropped.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub pid: u32,
    _dir: TempDir,
    child: Child,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        let server = Self::spawn()?;
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    fn spawn() -> Result<Self> {
        let dir = tempfile::tempdir().context("failed to create temp dir")?;
        let database_url = format!("sqlite://{}", dir.path().join("records.db").display());
        let credential_path = dir.path().join("master_password");

        // Provision the master password through the admin CLI first
        let status = Command::new(env!("CARGO_BIN_EXE_mike"))
            .args(["set-password", PASSWORD])
            .env("CREDENTIAL_PATH", &credential_path)
            .env("DATABASE_URL", &database_url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .context("failed to run `mike set-password`")?;
        anyhow::ensure!(status.success(), "`mike set-password` exited with {}", status);

        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let child = Command::new(env!("CARGO_BIN_EXE_mike-carcass-api"))
            .env("APP_ENV", "development")
            .env("MIKE_API_PORT", port.to_string())
            .env("DATABASE_URL", &database_url)
            .env("CREDENTIAL_PATH", &credential_path)
            .env("TOKEN_SECRET", SECRET)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to spawn server binary")?;

        Ok(Self {
            port,
            base_url,
            pid: child.id(),
            _dir: dir,
            child,
        })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        let url = format!("{}/health", self.base_url);
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// True while `pid` names a live process
#[cfg(target_os = "linux")]
pub fn process_alive(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        // zombies still have an entry until reaped
        Ok(stat) => !stat.split_whitespace().nth(2).is_some_and(|state| state == "Z"),
        Err(_) => false,
    }
}

/// In-process router over a throwaway database, driven with `oneshot`
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with_config(|_| {}).await
    }

    /// Same as `new`, with a smaller request body cap
    pub async fn with_body_limit(bytes: usize) -> Result<Self> {
        Self::with_config(|config| config.api.max_request_size_bytes = bytes).await
    }

    async fn with_config(customize: impl FnOnce(&mut AppConfig)) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let mut config = AppConfig::development();
        config.database.url = format!("sqlite://{}", dir.path().join("records.db").display());
        config.security.credential_path = dir.path().join("master_password");
        config.api.enable_request_logging = false;
        customize(&mut config);

        let pool = DatabaseManager::connect(&config.database).await?;
        let vault = CredentialVault::new(&config.security.credential_path);
        vault.set_credential(PASSWORD).await?;
        let tokens = TokenAuthority::new(vault, SECRET, Arc::new(SystemClock))?;

        let state = AppState::new(RecordStore::new(pool), tokens);
        let router = routes::app(state.clone(), &config);
        Ok(Self {
            router,
            state,
            _dir: dir,
        })
    }

    pub fn credential_path(&self) -> &Path {
        self.state.tokens.vault().path()
    }

    pub async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn login(&self) -> String {
        let (status, body) = self
            .request(Method::POST, "/auth/login", None, Some(serde_json::json!({ "password": PASSWORD })))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["data"]["token"].as_str().unwrap().to_string()
    }
}

/// Candidate record in API field names
pub fn record_json(site_id: &str, year: u32, country_code: &str, carcasses: u32, illegal: u32) -> Value {
    serde_json::json!({
        "un_region": "Africa",
        "subregion_name": "Central Africa",
        "subregion_id": "ca",
        "country_name": format!("Country {}", country_code.to_uppercase()),
        "country_code": country_code,
        "site_id": site_id,
        "site_name": format!("Site {}", site_id.to_uppercase()),
        "year": year,
        "carcass_count": carcasses,
        "illegal_carcass_count": illegal
    })
}
