//! Last-resort image generation through a local helper process.
//!
//! The helper is a script run by an interpreter:
//! `<interpreter> <script> --model <id> --prompt <text> --aspect_ratio <r>`.
//! It must print one JSON object: `{"status":"ok","image_url":...}` or
//! `{"status":"error","message":...}`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use nexus_core::{defaults, Error, ImagePayload, ImageRequest, Result};

/// Helper process settings.
#[derive(Debug, Clone)]
pub struct HelperConfig {
    /// Script locations, probed in order; the first that exists is used.
    pub scripts: Vec<PathBuf>,
    /// Interpreters, tried in order until one can be spawned.
    pub interpreters: Vec<String>,
    /// Wall-clock limit for one run.
    pub timeout: Duration,
    /// Maximum captured stdout.
    pub max_output_bytes: usize,
    /// Name of the env var that carries the credential into the child.
    pub credential_env: String,
    /// Credential value; only set on the child process.
    pub credential: Option<String>,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            scripts: defaults::HELPER_SCRIPTS.iter().map(PathBuf::from).collect(),
            interpreters: defaults::HELPER_INTERPRETERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeout: Duration::from_secs(defaults::HELPER_TIMEOUT_SECS),
            max_output_bytes: defaults::HELPER_MAX_OUTPUT_BYTES,
            credential_env: defaults::HELPER_CREDENTIAL_ENV.to_string(),
            credential: None,
        }
    }
}

impl HelperConfig {
    /// Load from `NEXUS_HELPER_SCRIPTS` (comma-separated), `NEXUS_HELPER_TIMEOUT_SECS`
    /// and the credential variable.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(scripts) = std::env::var("NEXUS_HELPER_SCRIPTS") {
            let scripts: Vec<PathBuf> = scripts
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
            if !scripts.is_empty() {
                config.scripts = scripts;
            }
        }
        if let Some(secs) = std::env::var("NEXUS_HELPER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        config.credential = std::env::var(&config.credential_env)
            .ok()
            .filter(|v| !v.is_empty());
        config
    }

    pub fn with_scripts(mut self, scripts: Vec<PathBuf>) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn with_interpreters(mut self, interpreters: Vec<String>) -> Self {
        self.interpreters = interpreters;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct HelperOutput {
    status: String,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Runs the helper script.
#[derive(Debug, Clone, Default)]
pub struct LocalHelper {
    config: HelperConfig,
}

impl LocalHelper {
    pub fn new(config: HelperConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HelperConfig {
        &self.config
    }

    /// Generate an image with `model`.
    ///
    /// Returns `Ok(None)` when no script or no interpreter is available.
    pub async fn generate(&self, model: &str, request: &ImageRequest) -> Result<Option<ImagePayload>> {
        let Some(script) = self.find_script().await else {
            warn!(
                subsystem = "inference",
                component = "helper",
                candidates = self.config.scripts.len(),
                "No image helper script found"
            );
            return Ok(None);
        };

        for interpreter in &self.config.interpreters {
            match self.run(interpreter, &script, model, request).await {
                Err(Error::HelperNotFound(msg)) => {
                    debug!(
                        subsystem = "inference",
                        component = "helper",
                        interpreter = %interpreter,
                        error = %msg,
                        "Interpreter unavailable, trying next"
                    );
                }
                Ok(stdout) => {
                    let url = parse_output(&stdout)?;
                    info!(
                        subsystem = "inference",
                        component = "helper",
                        model = %model,
                        interpreter = %interpreter,
                        "Image helper succeeded"
                    );
                    return Ok(Some(ImagePayload(url)));
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            subsystem = "inference",
            component = "helper",
            "No interpreter available for image helper"
        );
        Ok(None)
    }

    async fn find_script(&self) -> Option<PathBuf> {
        for candidate in &self.config.scripts {
            if tokio::fs::try_exists(candidate).await.unwrap_or(false) {
                return Some(candidate.clone());
            }
        }
        None
    }

    async fn run(
        &self,
        interpreter: &str,
        script: &Path,
        model: &str,
        request: &ImageRequest,
    ) -> Result<String> {
        let mut cmd = Command::new(interpreter);
        cmd.arg(script)
            .arg("--model")
            .arg(model)
            .arg("--prompt")
            .arg(&request.prompt)
            .arg("--aspect_ratio")
            .arg(&request.aspect_ratio)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref credential) = self.config.credential {
            cmd.env(&self.config.credential_env, credential);
        }

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::HelperNotFound(interpreter.to_string())
            } else {
                Error::HelperError(format!("Failed to start {}: {}", interpreter, e))
            }
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = self.config.max_output_bytes;

        let run = async {
            let (out, err) = tokio::join!(read_bounded(stdout, limit), read_bounded(stderr, 64 * 1024));
            let out = out?;
            if out.1 {
                let _ = child.start_kill();
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((out, err?, status))
        };

        // On timeout the child is killed when it is dropped on return.
        let (out, err, status) = tokio::time::timeout(self.config.timeout, run)
            .await
            .map_err(|_| {
                Error::HelperError(format!(
                    "Helper timed out after {}s",
                    self.config.timeout.as_secs_f32()
                ))
            })?
            .map_err(|e| Error::HelperError(format!("Helper I/O failed: {}", e)))?;

        let (stdout, truncated) = out;
        if truncated {
            return Err(Error::HelperError(format!(
                "Helper output exceeded {} bytes",
                limit
            )));
        }

        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        if !status.success() && serde_json::from_str::<HelperOutput>(stdout.trim()).is_err() {
            let (stderr, _) = err;
            return Err(Error::HelperError(format!(
                "Helper exited with {}: {}",
                status,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        Ok(stdout)
    }
}

/// Read at most `limit` bytes; the flag is set when more was available.
async fn read_bounded<R: AsyncRead + Unpin>(
    reader: Option<R>,
    limit: usize,
) -> std::io::Result<(Vec<u8>, bool)> {
    let Some(reader) = reader else {
        return Ok((Vec::new(), false));
    };
    let mut buf = Vec::new();
    reader.take(limit as u64 + 1).read_to_end(&mut buf).await?;
    let truncated = buf.len() > limit;
    buf.truncate(limit);
    Ok((buf, truncated))
}

/// Interpret the helper's single JSON object.
fn parse_output(stdout: &str) -> Result<String> {
    let output: HelperOutput = serde_json::from_str(stdout.trim()).map_err(|e| {
        Error::MalformedResponse(format!("Helper output is not a JSON object: {}", e))
    })?;

    match output.status.as_str() {
        "ok" => output
            .image_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::MalformedResponse("Helper reported ok without image_url".to_string())),
        "error" => Err(Error::HelperError(
            output
                .message
                .unwrap_or_else(|| "unknown helper error".to_string()),
        )),
        other => Err(Error::MalformedResponse(format!(
            "Unknown helper status '{}'",
            other
        ))),
    }
}
