//! Bring up the compose-managed MySQL 8 service and wait for it to answer queries.

use super::{TestMySqlConfig, SERVICE_NAME};
use anyhow::{anyhow, bail, Result};
use sqlx::mysql::MySqlPoolOptions;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

/// MySQL 8 initializes its data directory on first start, which is slow.
const STARTUP_DEADLINE: Duration = Duration::from_secs(90);
const POLL_EVERY: Duration = Duration::from_millis(500);

pub fn docker_compose_path() -> PathBuf {
    [env!("CARGO_MANIFEST_DIR"), "docker", "docker-compose.yml"]
        .iter()
        .collect()
}

/// `docker compose` (v2) first, then the standalone `docker-compose` binary.
struct Compose {
    file: PathBuf,
}

impl Compose {
    fn new() -> Self {
        Self {
            file: docker_compose_path(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        let mut last_err = None;
        for (program, prefix) in [("docker", &["compose"][..]), ("docker-compose", &[][..])] {
            match Command::new(program)
                .args(prefix)
                .arg("-f")
                .arg(&self.file)
                .args(args)
                .output()
            {
                Ok(out) if out.status.success() => return Ok(out),
                Ok(out) => {
                    last_err = Some(anyhow!(
                        "{} {} failed: {}",
                        program,
                        args.join(" "),
                        String::from_utf8_lossy(&out.stderr).trim()
                    ))
                }
                Err(e) => last_err = Some(anyhow!("cannot run {}: {}", program, e)),
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("no compose command available")))
    }

    fn service_running(&self) -> bool {
        self.run(&["ps", "-q", SERVICE_NAME])
            .map(|out| !out.stdout.is_empty())
            .unwrap_or(false)
    }
}

fn docker_available() -> bool {
    Command::new("docker")
        .arg("info")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

async fn answers_query(config: &TestMySqlConfig) -> bool {
    let connect = MySqlPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(1))
        .connect(&config.connection_string());
    match timeout(Duration::from_secs(2), connect).await {
        Ok(Ok(pool)) => {
            let ok = sqlx::query("SELECT 1").fetch_one(&pool).await.is_ok();
            pool.close().await;
            ok
        }
        _ => false,
    }
}

/// Poll until the port is open and `SELECT 1` succeeds.
pub async fn wait_for_healthy() -> Result<()> {
    let config = TestMySqlConfig::default();
    let addr = format!("{}:{}", config.host, config.port);
    let started = Instant::now();

    while started.elapsed() <= STARTUP_DEADLINE {
        if TcpStream::connect(&addr).await.is_ok() && answers_query(&config).await {
            debug!(service = SERVICE_NAME, elapsed = ?started.elapsed(), "MySQL ready");
            return Ok(());
        }
        sleep(POLL_EVERY).await;
    }
    bail!(
        "{} did not become ready on {} within {:?}",
        SERVICE_NAME,
        addr,
        STARTUP_DEADLINE
    )
}

/// Start the service unless it is already up, then wait for it.
pub async fn ensure_container_running() -> Result<()> {
    if !docker_available() {
        bail!("Docker is not available; the docker-tests feature needs a running Docker daemon");
    }
    let compose = Compose::new();
    if !compose.service_running() {
        info!(service = SERVICE_NAME, "Starting MySQL container");
        compose.run(&["up", "-d", SERVICE_NAME])?;
    }
    wait_for_healthy().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_file_ships_with_the_crate() {
        let path = docker_compose_path();
        assert!(path.ends_with("docker/docker-compose.yml"));
        assert!(path.exists());
    }
}
