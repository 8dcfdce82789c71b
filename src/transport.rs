//! Local JSON-lines transport for the CRI services.
//!
//! Lets a reconciliation loop in another process drive a hollow runtime over
//! a Unix socket (or any byte stream).
//!
//! # Protocol Format
//!
//! - **Transport**: Unix domain socket, or any `AsyncRead + AsyncWrite`
//! - **Encoding**: JSON
//! - **Framing**: Newline-delimited (each message ends with `\n`)
//! - **Limit**: [`MAX_MESSAGE_SIZE`] bytes per request line
//!
//! ```text
//! Client                                   Server
//!   |                                         |
//!   |  {"method":"pod_sandbox_status",...}\n  |
//!   |---------------------------------------->|
//!   |                                         |
//!   |  {"status":"ok","data":{...}}\n         |
//!   |<----------------------------------------|
//! ```
//!
//! Requests on one connection are answered in order. Each request runs under
//! the server's timeout; an expired request is answered with `timeout`.

use crate::constants::{MAX_MESSAGE_SIZE, RUNTIME_REQUEST_TIMEOUT};
use crate::cri::{
    Container, ContainerConfig, ContainerFilter, ContainerStatus, ExecSyncResponse,
    FilesystemUsage, Image, ImageFilter, ImageSpec, PodSandbox, PodSandboxConfig,
    PodSandboxFilter, PodSandboxStatus, RuntimeStatus, VersionResponse,
};
use crate::error::{Error, Result};
use crate::runtime::{ImageService, RuntimeService};
use crate::runtimes::HollowRuntime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

// =============================================================================
// Request Types
// =============================================================================

/// Request from the reconciliation loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Request {
    Version,
    Status,
    RunPodSandbox {
        config: PodSandboxConfig,
        #[serde(default)]
        runtime_handler: String,
    },
    StopPodSandbox {
        pod_sandbox_id: String,
    },
    RemovePodSandbox {
        pod_sandbox_id: String,
    },
    PodSandboxStatus {
        pod_sandbox_id: String,
    },
    ListPodSandbox {
        #[serde(default)]
        filter: Option<PodSandboxFilter>,
    },
    CreateContainer {
        pod_sandbox_id: String,
        config: ContainerConfig,
        #[serde(default)]
        sandbox_config: PodSandboxConfig,
    },
    StartContainer {
        container_id: String,
    },
    StopContainer {
        container_id: String,
        /// Grace period in seconds.
        #[serde(default)]
        timeout: i64,
    },
    RemoveContainer {
        container_id: String,
    },
    ContainerStatus {
        container_id: String,
    },
    ListContainers {
        #[serde(default)]
        filter: Option<ContainerFilter>,
    },
    ExecSync {
        container_id: String,
        cmd: Vec<String>,
        /// Timeout in seconds (0 = none).
        #[serde(default)]
        timeout: i64,
    },
    ListImages {
        #[serde(default)]
        filter: Option<ImageFilter>,
    },
    ImageStatus {
        image: ImageSpec,
    },
    PullImage {
        image: ImageSpec,
    },
    RemoveImage {
        image: ImageSpec,
    },
    ImageFsInfo,
}

impl Request {
    /// Wire name of the request method.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::Status => "status",
            Self::RunPodSandbox { .. } => "run_pod_sandbox",
            Self::StopPodSandbox { .. } => "stop_pod_sandbox",
            Self::RemovePodSandbox { .. } => "remove_pod_sandbox",
            Self::PodSandboxStatus { .. } => "pod_sandbox_status",
            Self::ListPodSandbox { .. } => "list_pod_sandbox",
            Self::CreateContainer { .. } => "create_container",
            Self::StartContainer { .. } => "start_container",
            Self::StopContainer { .. } => "stop_container",
            Self::RemoveContainer { .. } => "remove_container",
            Self::ContainerStatus { .. } => "container_status",
            Self::ListContainers { .. } => "list_containers",
            Self::ExecSync { .. } => "exec_sync",
            Self::ListImages { .. } => "list_images",
            Self::ImageStatus { .. } => "image_status",
            Self::PullImage { .. } => "pull_image",
            Self::RemoveImage { .. } => "remove_image",
            Self::ImageFsInfo => "image_fs_info",
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Response to a [`Request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// Success response.
    Ok(OkPayload),
    /// Error response.
    Error(ErrorPayload),
}

impl Response {
    /// Creates a success response with no data.
    #[must_use]
    pub fn ok() -> Self {
        Self::Ok(OkPayload { data: None })
    }

    /// Creates a success response with data.
    #[must_use]
    pub fn ok_with_data(data: ResponseData) -> Self {
        Self::Ok(OkPayload { data: Some(data) })
    }

    /// Creates an error response.
    #[must_use]
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            code,
            message: message.into(),
        })
    }

    /// Returns true if this is a success response.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

impl From<Result<Option<ResponseData>>> for Response {
    fn from(result: Result<Option<ResponseData>>) -> Self {
        match result {
            Ok(data) => Self::Ok(OkPayload { data }),
            Err(e) => Self::error(ErrorCode::from(&e), e.to_string()),
        }
    }
}

/// Success payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkPayload {
    /// Optional response data.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<ResponseData>,
}

/// Response data variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ResponseData {
    Version(VersionResponse),
    RuntimeStatus(RuntimeStatus),
    PodSandboxId { pod_sandbox_id: String },
    PodSandboxStatus(PodSandboxStatus),
    PodSandboxes { items: Vec<PodSandbox> },
    ContainerId { container_id: String },
    ContainerStatus(ContainerStatus),
    Containers { items: Vec<Container> },
    ExecSync(ExecSyncResponse),
    Images { items: Vec<Image> },
    ImageStatus { image: Option<Image> },
    ImageRef { image_ref: String },
    FilesystemUsage { items: Vec<FilesystemUsage> },
}

/// Error payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Required request field missing.
    InvalidArgument,
    /// Unknown sandbox or container.
    NotFound,
    /// Identifier already in use.
    AlreadyExists,
    /// Record in the wrong state.
    FailedPrecondition,
    /// Status failed verification.
    Validation,
    /// Request timeout.
    Timeout,
    /// Internal error.
    Internal,
    /// Malformed or oversized request.
    InvalidRequest,
    /// Operation not implemented.
    Unimplemented,
}

impl From<&Error> for ErrorCode {
    fn from(e: &Error) -> Self {
        match e {
            Error::InvalidArgument(_) => Self::InvalidArgument,
            Error::NotSupported(_) => Self::Unimplemented,
            Error::DuplicateId { .. } => Self::AlreadyExists,
            Error::ParentNotFound { .. } | Error::NotFound { .. } => Self::NotFound,
            Error::InvalidState { .. } => Self::FailedPrecondition,
            Error::Validation { .. } => Self::Validation,
            Error::Timeout { .. } => Self::Timeout,
            Error::Config(_)
            | Error::ConfigRead { .. }
            | Error::Metrics(_)
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::Internal(_) => Self::Internal,
        }
    }
}

// =============================================================================
// Wire Format Helpers
// =============================================================================

impl Request {
    /// Serializes request to JSON line (with newline).
    pub fn to_json_line(&self) -> std::result::Result<String, serde_json::Error> {
        let mut json = serde_json::to_string(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Deserializes request from JSON.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s.trim())
    }
}

impl Response {
    /// Serializes response to JSON line (with newline).
    pub fn to_json_line(&self) -> std::result::Result<String, serde_json::Error> {
        let mut json = serde_json::to_string(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Deserializes response from JSON.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s.trim())
    }
}

// =============================================================================
// Server
// =============================================================================

/// Serves a runtime over the JSON-lines protocol.
pub struct Server<R> {
    runtime: Arc<R>,
    timeout: Duration,
}

impl Server<HollowRuntime> {
    /// Creates a server bounded by the runtime's configured request timeout.
    pub fn for_hollow(runtime: Arc<HollowRuntime>) -> Self {
        let timeout = runtime.config().request_timeout;
        Self { runtime, timeout }
    }
}

impl<R> Server<R>
where
    R: RuntimeService + ImageService + 'static,
{
    /// Creates a server with the default request timeout.
    pub fn new(runtime: Arc<R>) -> Self {
        Self {
            runtime,
            timeout: RUNTIME_REQUEST_TIMEOUT,
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs one request against the runtime, bounded by the server timeout.
    pub async fn dispatch(&self, request: Request) -> Response {
        let method = request.method();
        debug!(method, "dispatching request");

        let result = match tokio::time::timeout(self.timeout, self.handle(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                operation: method.to_string(),
                duration: self.timeout,
            }),
        };

        if let Err(e) = &result {
            debug!(method, error = %e, "request failed");
        }
        result.into()
    }

    async fn handle(&self, request: Request) -> Result<Option<ResponseData>> {
        let rt = self.runtime.as_ref();
        let data = match request {
            Request::Version => ResponseData::Version(rt.version().await?),
            Request::Status => ResponseData::RuntimeStatus(rt.status().await?),
            Request::RunPodSandbox {
                config,
                runtime_handler,
            } => ResponseData::PodSandboxId {
                pod_sandbox_id: rt.run_pod_sandbox(&config, &runtime_handler).await?,
            },
            Request::StopPodSandbox { pod_sandbox_id } => {
                rt.stop_pod_sandbox(&pod_sandbox_id).await?;
                return Ok(None);
            }
            Request::RemovePodSandbox { pod_sandbox_id } => {
                rt.remove_pod_sandbox(&pod_sandbox_id).await?;
                return Ok(None);
            }
            Request::PodSandboxStatus { pod_sandbox_id } => {
                ResponseData::PodSandboxStatus(rt.pod_sandbox_status(&pod_sandbox_id).await?)
            }
            Request::ListPodSandbox { filter } => ResponseData::PodSandboxes {
                items: rt.list_pod_sandbox(filter.as_ref()).await?,
            },
            Request::CreateContainer {
                pod_sandbox_id,
                config,
                sandbox_config,
            } => ResponseData::ContainerId {
                container_id: rt
                    .create_container(&pod_sandbox_id, config, &sandbox_config)
                    .await?,
            },
            Request::StartContainer { container_id } => {
                rt.start_container(&container_id).await?;
                return Ok(None);
            }
            Request::StopContainer {
                container_id,
                timeout,
            } => {
                rt.stop_container(&container_id, timeout).await?;
                return Ok(None);
            }
            Request::RemoveContainer { container_id } => {
                rt.remove_container(&container_id).await?;
                return Ok(None);
            }
            Request::ContainerStatus { container_id } => {
                ResponseData::ContainerStatus(rt.container_status(&container_id).await?)
            }
            Request::ListContainers { filter } => ResponseData::Containers {
                items: rt.list_containers(filter.as_ref()).await?,
            },
            Request::ExecSync {
                container_id,
                cmd,
                timeout,
            } => {
                let timeout = Duration::from_secs(timeout.max(0).unsigned_abs());
                ResponseData::ExecSync(rt.exec_sync(&container_id, &cmd, timeout).await?)
            }
            Request::ListImages { filter } => ResponseData::Images {
                items: rt.list_images(filter.as_ref()).await?,
            },
            Request::ImageStatus { image } => ResponseData::ImageStatus {
                image: rt.image_status(&image).await?,
            },
            Request::PullImage { image } => ResponseData::ImageRef {
                image_ref: rt.pull_image(&image).await?,
            },
            Request::RemoveImage { image } => {
                rt.remove_image(&image).await?;
                return Ok(None);
            }
            Request::ImageFsInfo => ResponseData::FilesystemUsage {
                items: rt.image_fs_info().await?,
            },
        };
        Ok(Some(data))
    }

    /// Answers requests on `stream` until the peer closes it.
    ///
    /// A malformed request gets an `invalid_request` error and the connection
    /// stays open. An oversized or non-UTF-8 line cannot be resynchronised, so
    /// it is answered and the connection is closed.
    pub async fn serve_connection<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);
        let limit = MAX_MESSAGE_SIZE as u64 + 1;

        loop {
            let mut line = String::new();
            let read = (&mut reader).take(limit).read_line(&mut line).await;

            let (response, close) = match read {
                Ok(0) => return Ok(()),
                Ok(n) if n > MAX_MESSAGE_SIZE && !line.ends_with('\n') => (
                    Response::error(
                        ErrorCode::InvalidRequest,
                        format!("request exceeds {} bytes", MAX_MESSAGE_SIZE),
                    ),
                    true,
                ),
                Ok(_) if line.trim().is_empty() => continue,
                Ok(_) => match Request::from_json(&line) {
                    Ok(request) => (self.dispatch(request).await, false),
                    Err(e) => (
                        Response::error(
                            ErrorCode::InvalidRequest,
                            format!("JSON parse error: {e}"),
                        ),
                        false,
                    ),
                },
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => (
                    Response::error(ErrorCode::InvalidRequest, format!("read error: {e}")),
                    true,
                ),
                Err(e) => return Err(e.into()),
            };

            writer.write_all(response.to_json_line()?.as_bytes()).await?;
            writer.flush().await?;

            if close {
                return Ok(());
            }
        }
    }

    /// Accepts connections on `listener` and serves each on its own task.
    #[cfg(unix)]
    pub async fn serve(self: Arc<Self>, listener: tokio::net::UnixListener) -> Result<()> {
        loop {
            let (stream, _) = listener.accept().await?;
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = server.serve_connection(stream).await {
                    warn!(error = %e, "connection closed with error");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecordKind;

    #[test]
    fn test_response_serialization() {
        let json = Response::ok().to_json_line().unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(!json.contains("data"));

        let resp = Response::error(ErrorCode::NotFound, "pod sandbox not found: x");
        let json = resp.to_json_line().unwrap();
        assert!(json.contains("\"status\":\"error\""));
        assert!(json.contains("\"code\":\"not_found\""));
    }

    #[test]
    fn test_request_wire_names() {
        let req = Request::StopContainer {
            container_id: "c1".to_string(),
            timeout: 10,
        };
        let json = req.to_json_line().unwrap();
        assert!(json.contains("\"method\":\"stop_container\""));
        assert!(json.contains("\"containerId\":\"c1\""));
        assert_eq!(req.method(), "stop_container");

        let parsed = Request::from_json(r#"{"method":"image_fs_info"}"#).unwrap();
        assert!(matches!(parsed, Request::ImageFsInfo));

        let parsed = Request::from_json(r#"{"method":"list_pod_sandbox"}"#).unwrap();
        assert!(matches!(parsed, Request::ListPodSandbox { filter: None }));
    }

    #[test]
    fn test_response_data_tagging() {
        let resp = Response::ok_with_data(ResponseData::PodSandboxId {
            pod_sandbox_id: "sb1".to_string(),
        });
        let json = resp.to_json_line().unwrap();
        assert!(json.contains("\"type\":\"pod_sandbox_id\""));
        assert!(json.contains("\"podSandboxId\":\"sb1\""));
    }

    #[test]
    fn test_error_codes() {
        let cases = [
            (Error::InvalidArgument("x".into()), ErrorCode::InvalidArgument),
            (Error::NotSupported("x".into()), ErrorCode::Unimplemented),
            (
                Error::duplicate(RecordKind::Sandbox, "sb1"),
                ErrorCode::AlreadyExists,
            ),
            (
                Error::ParentNotFound {
                    sandbox_id: "sb".into(),
                    container_id: "c".into(),
                },
                ErrorCode::NotFound,
            ),
            (
                Error::not_found(RecordKind::Container, "c1"),
                ErrorCode::NotFound,
            ),
            (
                Error::validation(RecordKind::Sandbox, "Id is not set"),
                ErrorCode::Validation,
            ),
            (Error::Internal("x".into()), ErrorCode::Internal),
        ];
        for (error, code) in cases {
            assert_eq!(ErrorCode::from(&error), code, "{error}");
        }
    }
}
