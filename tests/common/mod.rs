use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use sqlx::postgres::PgPoolOptions;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const STAFF_EMAIL: &str = "staff@example.com";
pub const PASSWORD: &str = "password123";
// sha256(PASSWORD)
const PASSWORD_HASH: &str = "ef92b778bafe771e89245b89ecbc08a44a4e166c06659911881f383d4473e94f";

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub base_url: String,
    #[allow(dead_code)]
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Spawn the already-built binary to keep start fast during tests
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_placement-api"));
        cmd.env("PLACEMENT_API_PORT", port.to_string())
            .env("JWT_SECRET", JWT_SECRET)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            match client.get(format!("{}/health", self.base_url)).send().await {
                Ok(resp) if resp.status() == StatusCode::OK => return Ok(()),
                _ => {}
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

/// Apply migrations and seed the admin user the tests log in as.
async fn prepare_database(database_url: &str) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await
        .context("failed to connect test database")?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    for (email, name, role) in [
        (ADMIN_EMAIL, "Test Admin", "admin"),
        (STAFF_EMAIL, "Test Staff", "staff"),
    ] {
        sqlx::query(
            "INSERT INTO users (id, email, name, role, password_hash) \
             VALUES (gen_random_uuid(), $1, $2, $3, $4) \
             ON CONFLICT (email) DO UPDATE SET password_hash = EXCLUDED.password_hash, is_deleted = FALSE",
        )
        .bind(email)
        .bind(name)
        .bind(role)
        .bind(PASSWORD_HASH)
        .execute(&pool)
        .await?;
    }

    pool.close().await;
    Ok(())
}

/// Start (once) and return the shared test server, or None when no database
/// is configured, in which case callers skip.
pub async fn server_or_skip() -> Result<Option<&'static TestServer>> {
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("skipping: DATABASE_URL not set");
            return Ok(None);
        }
    };

    if SERVER.get().is_none() {
        prepare_database(&database_url).await?;
    }

    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(Some(server))
}

/// Log in as a seeded user and return a bearer token.
pub async fn login_token(base_url: &str, email: &str) -> Result<String> {
    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/auth/login", base_url))
        .json(&serde_json::json!({ "email": email, "password": PASSWORD }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());
    let body = res.json::<serde_json::Value>().await?;
    body["token"]
        .as_str()
        .map(|s| s.to_string())
        .context("login response missing token")
}
