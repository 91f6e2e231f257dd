//! A stage that runs an external program, such as a segmentation tool or
//! a headless macro engine.

use super::Stage;
use crate::context::RunContext;
use crate::core::{StageArtifact, StageFailure, StageOutcome};
use crate::registry::StageId;
use anyhow::Context as _;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

const STDERR_TAIL: usize = 2048;

/// Runs a program and succeeds when it exits with status 0.
///
/// Extra arguments may be supplied per run through the `<stage>.args`
/// option (an array of strings). The child is killed if the stage is
/// timed out or the run is cancelled while it runs.
#[derive(Debug, Clone)]
pub struct ExternalCommandStage {
    id: StageId,
    program: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    current_dir: Option<PathBuf>,
}

impl ExternalCommandStage {
    /// Creates a stage running `program` for the given stage id.
    #[must_use]
    pub fn new(id: StageId, program: impl Into<String>) -> Self {
        Self {
            id,
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            current_dir: None,
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the working directory of the child.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Name of the artifact a successful run produces.
    #[must_use]
    pub fn artifact_name(&self) -> String {
        format!("{}_output", self.id)
    }

    fn command_args(&self, ctx: &RunContext) -> Result<Vec<String>, StageFailure> {
        let mut args = self.args.clone();
        match ctx.config().stage_param(self.id, "args") {
            None | Some(Value::Null) => {}
            Some(Value::Array(extra)) => {
                for value in extra {
                    let arg = value.as_str().ok_or_else(|| {
                        StageFailure::new("invalid_config", format!("{}.args must hold strings", self.id))
                    })?;
                    args.push(arg.to_string());
                }
            }
            Some(other) => {
                return Err(StageFailure::new(
                    "invalid_config",
                    format!("{}.args must be an array, found {other}", self.id),
                ))
            }
        }
        Ok(args)
    }

    async fn execute(&self, args: &[String]) -> anyhow::Result<std::process::Output> {
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .with_context(|| format!("failed to start '{}'", self.program))?;
        child
            .wait_with_output()
            .await
            .with_context(|| format!("failed to wait for '{}'", self.program))
    }
}

#[async_trait]
impl Stage for ExternalCommandStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        let args = match self.command_args(ctx) {
            Ok(args) => args,
            Err(failure) => return StageOutcome::failure(failure),
        };
        debug!(stage = %self.id, program = %self.program, ?args, "Starting external command");

        let output = tokio::select! {
            output = self.execute(&args) => output,
            () = ctx.cancellation().cancelled() => {
                warn!(stage = %self.id, program = %self.program, "External command cancelled");
                return StageOutcome::failure(StageFailure::new(
                    "cancelled",
                    format!("'{}' was cancelled", self.program),
                ));
            }
        };

        let output = match output {
            Ok(output) => output,
            Err(e) => return StageOutcome::failure(StageFailure::from(e).with_detail("program", json!(self.program))),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let code = output.status.code();
            return StageOutcome::failure(
                StageFailure::new(
                    "external_tool",
                    format!("'{}' exited with {}: {}", self.program, output.status, tail(&stderr).trim()),
                )
                .with_detail("program", json!(self.program))
                .with_detail("exit_code", json!(code))
                .with_detail("stderr", json!(tail(&stderr))),
            );
        }

        StageOutcome::ok().with_artifact(StageArtifact::new(
            self.artifact_name(),
            "command_output",
            json!({
                "program": self.program,
                "args": args,
                "stdout": stdout,
                "stderr": stderr,
            }),
        ))
    }
}

/// Last part of a possibly long diagnostic stream, cut on a char boundary.
fn tail(text: &str) -> &str {
    if text.len() <= STDERR_TAIL {
        return text;
    }
    let mut start = text.len() - STDERR_TAIL;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
