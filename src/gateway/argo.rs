//! Argo CLI gateway.
//!
//! Drives the `argo` binary through `tokio::process`, one invocation per
//! gateway call:
//!
//! ```text
//! argo submit -n <ns> --from workflowtemplate/<t> --generate-name <p> -l k=v,.. -p k=v .. -o json
//! argo get <name> -n <ns> -o json
//! argo stop <name> -n <ns>
//! ```
//!
//! Each invocation races the caller's cancellation token and a per-call
//! timeout. The child is killed when either fires.

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::{ExecutionGateway, GatewayError, GatewayResult};
use crate::labels::Labels;
use crate::workflow::{Parameters, RawWorkflow};
use crate::{elog_debug, elog_trace, elog_warn};

/// Default per-call timeout (30 seconds).
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

/// Substrings in argo/kubectl stderr that mean the API server was never
/// reached.
const TRANSPORT_MARKERS: &[&str] = &[
    "connection refused",
    "dial tcp",
    "i/o timeout",
    "no such host",
    "unable to connect",
    "tls handshake",
    "context deadline exceeded",
    "server is currently unable",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Submit,
    Get,
    Stop,
}

#[derive(Debug, Clone)]
pub struct ArgoCliGateway {
    /// Program plus leading arguments, e.g. `["argo"]` or
    /// `["kubectl", "argo"]`.
    command: Vec<String>,
    namespace: String,
    timeout: Duration,
}

impl ArgoCliGateway {
    /// Create a gateway from a command line such as `"argo"`.
    ///
    /// # Errors
    ///
    /// Returns `BinaryNotFound` if the program is not on `PATH`.
    pub fn new(command: &str, namespace: &str) -> GatewayResult<Self> {
        let command: Vec<String> = command.split_whitespace().map(String::from).collect();
        let program = command
            .first()
            .ok_or_else(|| GatewayError::BinaryNotFound(String::new()))?;
        which::which(program).map_err(|_| GatewayError::BinaryNotFound(program.clone()))?;
        Ok(Self::with_command(command, namespace))
    }

    /// Create a gateway with an explicit command, skipping the `PATH`
    /// lookup.
    pub fn with_command(command: Vec<String>, namespace: impl Into<String>) -> Self {
        Self {
            command,
            namespace: namespace.into(),
            timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn submit_args(
        &self,
        template: &str,
        generate_name: &str,
        parameters: &Parameters,
        labels: &Labels,
    ) -> Vec<String> {
        let mut args = vec![
            "submit".to_string(),
            "-n".to_string(),
            self.namespace.clone(),
            "--from".to_string(),
            format!("workflowtemplate/{}", template),
            "--generate-name".to_string(),
            generate_name.to_string(),
        ];

        if !labels.is_empty() {
            let joined = labels
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(",");
            args.push("-l".to_string());
            args.push(joined);
        }

        for (key, value) in parameters {
            args.push("-p".to_string());
            args.push(format!("{}={}", key, value));
        }

        args.push("-o".to_string());
        args.push("json".to_string());
        args
    }

    fn get_args(&self, name: &str) -> Vec<String> {
        vec![
            "get".to_string(),
            name.to_string(),
            "-n".to_string(),
            self.namespace.clone(),
            "-o".to_string(),
            "json".to_string(),
        ]
    }

    fn stop_args(&self, name: &str) -> Vec<String> {
        vec![
            "stop".to_string(),
            name.to_string(),
            "-n".to_string(),
            self.namespace.clone(),
        ]
    }

    async fn run(
        &self,
        ctx: &CancellationToken,
        operation: Operation,
        subject: &str,
        args: Vec<String>,
    ) -> GatewayResult<Vec<u8>> {
        if ctx.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }

        let (program, leading) = self
            .command
            .split_first()
            .ok_or_else(|| GatewayError::BinaryNotFound(String::new()))?;

        elog_debug!("argo exec: {} {}", self.command.join(" "), args.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(leading).args(&args).kill_on_drop(true);

        let output = tokio::select! {
            _ = ctx.cancelled() => {
                elog_debug!("argo {:?} {} cancelled by caller", operation, subject);
                return Err(GatewayError::Cancelled);
            }
            result = tokio::time::timeout(self.timeout, cmd.output()) => match result {
                Ok(Ok(output)) => output,
                Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                    return Err(GatewayError::BinaryNotFound(program.clone()));
                }
                Ok(Err(e)) => return Err(GatewayError::Io(e)),
                Err(_) => return Err(GatewayError::Timeout(self.timeout)),
            },
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!(
                    "argo exited with status {}",
                    output.status.code().unwrap_or(-1)
                )
            } else {
                stderr.trim().to_string()
            };
            elog_warn!("argo {:?} {} failed: {}", operation, subject, message);
            return Err(classify_failure(operation, subject, message));
        }

        Ok(output.stdout)
    }
}

/// Map a failed invocation to a gateway error kind.
///
/// "not found" during submit refers to the template and is a rejection;
/// during get or stop it refers to the workflow itself.
fn classify_failure(operation: Operation, subject: &str, message: String) -> GatewayError {
    let lower = message.to_ascii_lowercase();

    if TRANSPORT_MARKERS.iter().any(|m| lower.contains(m)) {
        return GatewayError::Transport(message);
    }

    if lower.contains("not found") || lower.contains("notfound") {
        return match operation {
            Operation::Submit => GatewayError::Rejected(message),
            Operation::Get | Operation::Stop => GatewayError::NotFound(subject.to_string()),
        };
    }

    GatewayError::Rejected(message)
}

/// Decode argo's JSON output. A workflow without a name or uid cannot be
/// referenced later, so it is an error rather than a success.
fn decode_workflow(stdout: &[u8], operation: Operation) -> GatewayResult<RawWorkflow> {
    let raw: RawWorkflow = serde_json::from_slice(stdout)?;
    if raw.metadata.name.is_empty() || raw.metadata.uid.is_empty() {
        elog_warn!("argo {:?} returned a workflow without name or uid", operation);
        return Err(GatewayError::Incomplete(format!(
            "{:?} response has name '{}' and uid '{}'",
            operation, raw.metadata.name, raw.metadata.uid
        )));
    }
    Ok(raw)
}

#[async_trait]
impl ExecutionGateway for ArgoCliGateway {
    async fn submit_from_template(
        &self,
        ctx: &CancellationToken,
        template: &str,
        generate_name: &str,
        parameters: &Parameters,
        labels: &Labels,
    ) -> GatewayResult<RawWorkflow> {
        let args = self.submit_args(template, generate_name, parameters, labels);
        let stdout = self.run(ctx, Operation::Submit, template, args).await?;
        elog_trace!("argo submit output: {}", String::from_utf8_lossy(&stdout));
        decode_workflow(&stdout, Operation::Submit)
    }

    async fn get_by_name(&self, ctx: &CancellationToken, name: &str) -> GatewayResult<RawWorkflow> {
        let stdout = self.run(ctx, Operation::Get, name, self.get_args(name)).await?;
        elog_trace!("argo get output: {}", String::from_utf8_lossy(&stdout));
        decode_workflow(&stdout, Operation::Get)
    }

    async fn cancel(&self, ctx: &CancellationToken, name: &str) -> GatewayResult<()> {
        self.run(ctx, Operation::Stop, name, self.stop_args(name))
            .await?;
        Ok(())
    }
}
