//! # Purpose
//! Demonstrate the full login-to-dashboard bootstrap against a real HTTP
//! backend, end to end: authentication, token persistence, the dashboard
//! config fetch, and menu resolution from the stored feature set.
//!
//! # What this demo proves
//! - Credentials are stored only after the auth service accepts them, with
//!   the remember-me TTL policy applied.
//! - The dashboard config gates readiness: login alone is not enough.
//! - Menu entries follow the per-school feature set, in master order.
//! - An expired session tears down both stores and routes through the
//!   unauthorized hook exactly once.
//!
//! # High-level flow
//! 1. Start a mock campus backend (axum, ephemeral port) that serves
//!    login, dashboard config, and a students listing.
//! 2. Run the bootstrap: submit credentials, reach `Ready`.
//! 3. Resolve and print the menu for the returned feature set.
//! 4. Flip the backend into "session expired" mode and issue one more
//!    request to show the global teardown.
//!
//! # Notes on determinism
//! - The backend is in-process on an ephemeral port; no external services.
//! - Readiness is polled, not slept on.
use anyhow::{Context, Result};
use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use campus_client::{Api, ApiClient, ClientConfig, LoginFlow, LoginState, LoginSubmission};
use campus_store::{ConfigStore, CredentialStore, MemoryStore};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

fn backend(expired: Arc<AtomicBool>) -> Router {
    Router::new()
        .route(
            "/api/auth/login-user",
            post(|Json(body): Json<Value>| async move {
                if body.get("password").and_then(Value::as_str) == Some("open sesame") {
                    Json(json!({
                        "success": true,
                        "data": {
                            "accessToken": "demo-token",
                            "refreshToken": "demo-refresh",
                            "user": {"name": "Demo Admin", "email": "admin@demo.school", "role": "admin"},
                        },
                    }))
                    .into_response()
                } else {
                    (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({"success": false, "message": "invalid email or password"})),
                    )
                        .into_response()
                }
            }),
        )
        .route(
            "/api/features/get-dashboard-config",
            get(|| async {
                Json(json!({
                    "success": true,
                    "data": {
                        "schoolId": "demo-school",
                        "features": [
                            {"id": "dashboard", "name": "Dashboard", "enabled": true},
                            {"id": "students", "name": "Students", "enabled": true},
                            {"id": "classes", "name": "Classes", "enabled": true},
                            {"id": "fees", "name": "Fees", "enabled": false},
                        ],
                    },
                }))
            }),
        )
        .route(
            "/api/students/get-all-students",
            get({
                let expired = expired.clone();
                move || {
                    let expired = expired.clone();
                    async move {
                        if expired.load(Ordering::SeqCst) {
                            (
                                StatusCode::UNAUTHORIZED,
                                Json(json!({"success": false, "message": "token expired"})),
                            )
                                .into_response()
                        } else {
                            Json(json!({
                                "success": true,
                                "data": [{"id": "st1", "name": "First Student"}],
                            }))
                            .into_response()
                        }
                    }
                }
            }),
        )
}

async fn wait_for_listen(addr: SocketAddr) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(1);
    loop {
        match tokio::net::TcpStream::connect(addr).await {
            Ok(_) => return Ok(()),
            Err(err) => {
                if Instant::now() >= deadline {
                    anyhow::bail!("backend not ready at {addr}: {err}");
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let expired = Arc::new(AtomicBool::new(false));
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("bind backend listener")?;
    let addr = listener.local_addr().context("backend local addr")?;
    let router = backend(expired.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, router.into_make_service()).await;
    });
    wait_for_listen(addr).await?;
    tracing::info!(%addr, "mock campus backend ready");

    let backend_store = Arc::new(MemoryStore::new());
    let credentials = CredentialStore::new(backend_store.clone());
    let configs = ConfigStore::new(backend_store);
    let client_config = ClientConfig::default().with_base_url(format!("http://{addr}/api"));
    let client = ApiClient::new(&client_config, credentials.clone(), configs.clone())?
        .with_unauthorized_hook(Arc::new(|| {
            tracing::warn!("unauthorized hook fired, navigating back to login");
        }));
    let api = Api::new(Arc::new(client));
    let mut flow = LoginFlow::new(api.clone());

    // Step 1: a rejected password stores nothing.
    flow.submit(LoginSubmission {
        email: "admin@demo.school".to_string(),
        password: "wrong".to_string(),
        remember_me: false,
    })
    .await;
    tracing::info!(state = ?flow.state(), "login with bad password");

    // Step 2: the real bootstrap, through to Ready.
    let state = flow
        .submit(LoginSubmission {
            email: "admin@demo.school".to_string(),
            password: "open sesame".to_string(),
            remember_me: true,
        })
        .await;
    anyhow::ensure!(*state == LoginState::Ready, "bootstrap did not reach Ready");
    let user = credentials.user().await.context("stored profile")?;
    tracing::info!(name = %user.name, "logged in");

    // Step 3: resolve the menu from the stored config.
    let config = configs.config().await.context("stored config")?;
    println!("menu for school {}:", config.school_id.as_deref().unwrap_or("?"));
    for entry in campus_menu::compute_menu(Some(&config)) {
        println!("  {} ({})", entry.label, entry.id);
        for child in &entry.children {
            println!("    {} ({})", child.label, child.id);
        }
    }

    let students = api.students().get_all().await?;
    let count = students
        .data
        .as_ref()
        .and_then(|data| data.as_array())
        .map(Vec::len);
    tracing::info!(count, "students fetched");

    // Step 4: expire the session server-side and watch the teardown.
    expired.store(true, Ordering::SeqCst);
    let err = api
        .students()
        .get_all()
        .await
        .expect_err("expired session must be rejected");
    tracing::info!(%err, authenticated = credentials.is_authenticated().await, "after expiry");
    anyhow::ensure!(!credentials.is_authenticated().await, "credentials must be gone");
    anyhow::ensure!(configs.config().await.is_none(), "config must be gone");

    println!("session torn down after expiry, back to login");
    Ok(())
}
