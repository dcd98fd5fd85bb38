use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use url::Url;

use crate::config::FrontendConfig;

const PORT_PROBE_TIMEOUT: Duration = Duration::from_millis(150);

/// Vite dev server started by this process
pub struct DevServer {
    child: Child,
}

impl DevServer {
    /// Start `npm run dev` in the frontend directory unless something already
    /// listens on the dev server port. Failures are logged, never fatal.
    pub async fn ensure_running(config: &FrontendConfig) -> Option<Self> {
        let (host, port) = match dev_server_address(&config.dev_server_url) {
            Some(addr) => addr,
            None => {
                tracing::warn!("Unable to parse dev server url {}", config.dev_server_url);
                return None;
            }
        };

        if is_port_open(&host, port, PORT_PROBE_TIMEOUT).await {
            tracing::info!("Vite dev server already running on {}", config.dev_server_url);
            return None;
        }

        let frontend_dir = Path::new(&config.project_dir);
        if !frontend_dir.is_dir() {
            tracing::warn!("Frontend directory not found at {}", frontend_dir.display());
            return None;
        }

        let mut command = Command::new("npm");
        command
            .args(["run", "dev", "--", "--host"])
            .current_dir(frontend_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut server = match Self::spawn(command) {
            Ok(server) => server,
            Err(e) => {
                tracing::warn!("Failed to start Vite dev server: {}", e);
                return None;
            }
        };

        if let Some(stdout) = server.child.stdout.take() {
            tokio::spawn(forward_lines(stdout, false));
        }
        if let Some(stderr) = server.child.stderr.take() {
            tokio::spawn(forward_lines(stderr, true));
        }

        tracing::info!("Started Vite dev server in {}", frontend_dir.display());
        Some(server)
    }

    /// Spawn as the leader of a new process group so `stop` reaches every
    /// process npm forks, not just npm itself.
    fn spawn(mut command: Command) -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            command.process_group(0);
        }
        let child = command.kill_on_drop(true).spawn()?;
        Ok(Self { child })
    }

    pub async fn stop(mut self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                    tracing::debug!("Failed to signal Vite dev server process group {}: {}", pid, e);
                }
            }
        }

        // Reaps the group leader; also the only kill on non-unix targets
        if let Err(e) = self.child.kill().await {
            tracing::debug!("Failed to stop Vite dev server process: {}", e);
        }
    }
}

/// Forward output lines to tracing until the stream closes. Lines that are
/// not valid UTF-8 are forwarded lossily so the pipe keeps draining.
async fn forward_lines<R: AsyncRead + Unpin>(stream: R, is_stderr: bool) -> usize {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut forwarded = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("Stopped reading Vite dev server output: {}", e);
                break;
            }
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        if is_stderr {
            tracing::error!("[vite] {}", line);
        } else {
            tracing::info!("[vite] {}", line);
        }
        forwarded += 1;
    }

    forwarded
}

fn dev_server_address(dev_server_url: &str) -> Option<(String, u16)> {
    let url = Url::parse(dev_server_url).ok()?;
    let host = match url.host_str()? {
        "localhost" => "127.0.0.1".to_string(),
        other => other.to_string(),
    };
    Some((host, url.port_or_known_default()?))
}

async fn is_port_open(host: &str, port: u16, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}
