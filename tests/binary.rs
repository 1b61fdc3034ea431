//! End-to-end test (section 4.13): starts the built binary against a
//! temporary config/hosts/static-routes set and polls the HTTP surface.
//! Docker access is not required: the local host entry is left enabled so
//! discovery exercises the client, but a failed/unreachable local socket
//! only marks that host failed (section 4.2) rather than aborting startup,
//! so the static route still reaches `/api/config` either way.

use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use nix::{
    sys::signal::{kill, Signal},
    unistd::Pid,
};
use serde_json::Value;
use tempfile::TempDir;
use tokio::{
    fs,
    io::AsyncWriteExt,
    process::{Child, Command},
    time::{sleep, timeout},
};

async fn write_file<D: AsRef<[u8]>>(path: &Path, data: D) {
    let mut file = fs::File::create(path).await.unwrap();
    file.write_all(data.as_ref()).await.unwrap();
    file.flush().await.unwrap();
}

fn command() -> Command {
    let binary = PathBuf::from(env!("CARGO_BIN_EXE_revp_provider"));
    let mut command = Command::new(binary);
    command.env("RUST_LOG", "warn").kill_on_drop(true);
    command
}

async fn kill_server(mut child: Child) {
    let Some(pid) = child.id() else {
        return;
    };
    let pid = Pid::from_raw(pid as i32);

    for signal in [Signal::SIGTERM, Signal::SIGKILL] {
        let _ = kill(pid, signal);

        if timeout(Duration::from_secs(5), child.wait()).await.is_ok() {
            return;
        }
    }

    tracing::warn!("Timed out waiting for child process to finish");
}

async fn wait_for_config(address: &str) -> Value {
    let client = reqwest::Client::new();
    let url = format!("http://{address}/api/config");

    let deadline = Duration::from_secs(10);
    timeout(deadline, async {
        loop {
            if let Ok(response) = client.get(&url).send().await {
                if response.status().is_success() {
                    return response.json::<Value>().await.unwrap();
                }
            }

            sleep(Duration::from_millis(100)).await;
        }
    })
    .await
    .expect("Timed out waiting for /api/config")
}

#[tokio::test]
async fn serves_static_routes() {
    let temp_dir = TempDir::new().unwrap();

    write_file(
        &temp_dir.path().join("hosts.yaml"),
        r#"
hosts:
  local:
    hostname: localhost
    is_local: true
"#,
    )
    .await;

    write_file(
        &temp_dir.path().join("static-routes.yaml"),
        r#"
static_routes:
  - domain: "static.example.com"
    target: "http://10.0.0.5:8080"
    https: false
"#,
    )
    .await;

    write_file(
        &temp_dir.path().join("config.yaml"),
        r#"
api:
  address: "127.0.0.1:18080"
"#,
    )
    .await;

    let child = command()
        .current_dir(temp_dir.path())
        .arg("config.yaml")
        .spawn()
        .unwrap();

    let document = wait_for_config("127.0.0.1:18080").await;

    let services = &document["http"]["services"];
    assert!(
        services
            .as_object()
            .unwrap()
            .keys()
            .any(|k| k.starts_with("static-")),
        "expected a static-* service in {document}"
    );

    kill_server(child).await;
}
