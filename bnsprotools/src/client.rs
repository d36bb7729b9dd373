//! Pro Tools Scripting client
//!
//! [`ProToolsClient`] drives the session through the PTSL command protocol:
//! connect (and register when the protocol requires it), query the session,
//! bounce the mix to disk, disconnect.
//!
//! ```text
//! Unconnected ──connect()──▶ Connected ──register──▶ Registered ⟲ {get_session_info, bounce_to_disk}
//!      ▲                                                  │
//!      └──────────────────── disconnect() ◀───────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use bnsprotools::{BounceOptions, ProToolsClient};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut pt = ProToolsClient::builder().host("localhost").port(31416).build().open().await?;
//!
//!     let session = pt.get_session_info().await?;
//!     let bounce = pt
//!         .bounce_to_disk(Path::new("/tmp"), session.session_name.as_deref(), &BounceOptions::default())
//!         .await?;
//!     println!("Bounced to {}", bounce.path.display());
//!     Ok(())
//! }
//! ```

use crate::bounce::{BounceOptions, BounceRequest, BounceResult, PathResolution, DEFAULT_BOUNCE_NAME};
use crate::error::{Error, Result};
use crate::models::{parse_session_path, RegisterConnectionBody, RegisterConnectionResponse, SessionInfo};
use crate::protocol::{Command, ExportDestination, ProtocolProfile};
use crate::transport::{GrpcTransport, PtslTransport, Request, RequestHeader, Response};
use serde_json::Value;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default PTSL host
pub const DEFAULT_HOST: &str = "localhost";

/// Default PTSL port
pub const DEFAULT_PORT: u16 = 31416;

/// Default timeout for establishing the gRPC channel
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default caller identity sent with `RegisterConnection`
pub const DEFAULT_APPLICATION_NAME: &str = "BounceNSend";

/// Caller identity sent when registering the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub company_name: String,
    pub application_name: String,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            company_name: DEFAULT_APPLICATION_NAME.to_string(),
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
        }
    }
}

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connected,
    Registered,
}

/// Client for the Pro Tools Scripting API
pub struct ProToolsClient {
    host: String,
    port: u16,
    connect_timeout: Duration,
    profile: ProtocolProfile,
    identity: ClientIdentity,
    /// Transport to use on the next `connect()` instead of opening a gRPC channel
    injected: Option<Box<dyn PtslTransport>>,
    transport: Option<Box<dyn PtslTransport>>,
    session_id: Option<String>,
    state: ConnectionState,
}

impl std::fmt::Debug for ProToolsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProToolsClient")
            .field("address", &self.address())
            .field("profile", &self.profile.name)
            .field("state", &self.state)
            .field("session_id", &self.session_id)
            .finish()
    }
}

impl ProToolsClient {
    /// Creates a client for `host:port` with the default protocol profile
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::builder().host(host).port(port).build()
    }

    /// Create a builder for configuring the client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// `host:port` of the PTSL endpoint
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn profile(&self) -> &ProtocolProfile {
        &self.profile
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Session identifier assigned by Pro Tools at registration
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Opens the channel and, when the profile requires it, registers.
    ///
    /// On registration failure the channel is released before returning, so
    /// no further command can reach Pro Tools.
    pub async fn connect(&mut self) -> Result<()> {
        if self.state != ConnectionState::Unconnected {
            debug!(address = %self.address(), "Already connected to Pro Tools");
            return Ok(());
        }

        let address = self.address();
        info!(%address, profile = %self.profile.name, "Connecting to Pro Tools...");

        let transport: Box<dyn PtslTransport> = match self.injected.take() {
            Some(transport) => transport,
            None => Box::new(
                GrpcTransport::connect(&self.host, self.port, self.connect_timeout).await?,
            ),
        };
        self.transport = Some(transport);
        self.state = ConnectionState::Connected;

        if self.profile.requires_registration {
            if let Err(e) = self.register().await {
                warn!(%address, "Pro Tools registration failed: {}", e);
                self.disconnect();
                return Err(e);
            }
        }

        info!(%address, "Connected to Pro Tools!");
        Ok(())
    }

    /// Consumes the client and returns a guard that disconnects on drop
    pub async fn open(mut self) -> Result<ConnectionGuard> {
        self.connect().await?;
        Ok(ConnectionGuard { client: self })
    }

    /// Releases the channel. No-op when not connected.
    pub fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
            info!(address = %self.address(), "Disconnected from Pro Tools");
        }
        self.session_id = None;
        self.state = ConnectionState::Unconnected;
    }

    async fn register(&mut self) -> Result<()> {
        let body = serde_json::to_value(RegisterConnectionBody {
            company_name: &self.identity.company_name,
            application_name: &self.identity.application_name,
        })?;

        let response = self.send(Command::RegisterConnection, Some(&body)).await?;
        let status = response.status();

        if !self.profile.is_success(status) {
            return Err(Error::Registration {
                status,
                payload: response.response_error_json,
            });
        }

        let parsed: RegisterConnectionResponse = parse_body(&response.response_body_json)?;
        let session_id = parsed
            .session_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Registration {
                status,
                payload: format!(
                    "no session_id in registration response: {}",
                    response.response_body_json
                ),
            })?;

        debug!(%session_id, "Pro Tools connection registered");
        self.session_id = Some(session_id);
        self.state = ConnectionState::Registered;
        Ok(())
    }

    /// Queries the open session's name and related fields
    pub async fn get_session_info(&mut self) -> Result<SessionInfo> {
        let response = self.call(Command::GetSessionName, None).await?;
        parse_body(&response.response_body_json)
    }

    /// Queries the on-disk path of the open session file
    pub async fn get_session_path(&mut self) -> Result<PathBuf> {
        let response = self.call(Command::GetSessionPath, None).await?;
        let body: Value = parse_body(&response.response_body_json)?;

        parse_session_path(&body).ok_or_else(|| Error::RemoteCommand {
            command: Command::GetSessionPath.to_string(),
            status: response.status(),
            payload: format!("no session_path in response: {}", response.response_body_json),
        })
    }

    /// Bounces the session mix to disk and returns where the file landed.
    ///
    /// When `file_name` is `None` the session name is used. The name is
    /// sanitized before being sent. With a session-folder profile the path
    /// is resolved from a second `GetSessionPath` query; if that query
    /// fails the returned path is synthesized from `destination` and
    /// flagged [`PathResolution::Synthesized`].
    pub async fn bounce_to_disk(
        &mut self,
        destination: &Path,
        file_name: Option<&str>,
        options: &BounceOptions,
    ) -> Result<BounceResult> {
        options.validate()?;
        self.ensure_ready()?;

        let name = match file_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => self
                .get_session_info()
                .await?
                .name_or(DEFAULT_BOUNCE_NAME)
                .to_string(),
        };

        let request = BounceRequest::new(
            &name,
            destination,
            self.profile.destination,
            options.clone(),
        );
        let payload = request.to_payload(self.profile.payload_style);

        info!(
            "Bouncing to {}...",
            bounce_location(&request, &self.profile.bounce_subfolder)
        );

        let response = self.send(Command::ExportMix, Some(&payload)).await?;
        let status = response.status();
        if !self.profile.is_success(status) {
            return Err(Error::Bounce {
                status,
                payload: error_payload(&response),
            });
        }

        let result = self.resolve_bounce_path(&request).await;
        info!(path = %result.path.display(), resolution = ?result.resolution, "Bounce complete");
        Ok(result)
    }

    async fn resolve_bounce_path(&mut self, request: &BounceRequest) -> BounceResult {
        let file_name = request.output_file_name();

        match request.destination() {
            ExportDestination::Directory => BounceResult {
                path: request.directory().join(file_name),
                resolution: PathResolution::Composed,
            },
            ExportDestination::SessionFolder => match self.get_session_path().await {
                Ok(session_file) => {
                    let session_dir = session_directory(&session_file);
                    BounceResult {
                        path: session_dir
                            .join(&self.profile.bounce_subfolder)
                            .join(file_name),
                        resolution: PathResolution::SessionFolder,
                    }
                }
                Err(e) => {
                    warn!(
                        "Could not query session path ({}), bounce location is a guess",
                        e
                    );
                    BounceResult {
                        path: request.directory().join(file_name),
                        resolution: PathResolution::Synthesized,
                    }
                }
            },
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state {
            ConnectionState::Unconnected => Err(Error::NotConnected),
            ConnectionState::Connected if self.profile.requires_registration => {
                Err(Error::NotRegistered)
            }
            _ => Ok(()),
        }
    }

    /// Sends a command on a ready connection and checks its status
    async fn call(&mut self, command: Command, body: Option<&Value>) -> Result<Response> {
        self.ensure_ready()?;

        let response = self.send(command, body).await?;
        let status = response.status();
        if !self.profile.is_success(status) {
            warn!(%command, status, "Pro Tools command failed");
            return Err(Error::RemoteCommand {
                command: command.to_string(),
                status,
                payload: error_payload(&response),
            });
        }
        Ok(response)
    }

    async fn send(&mut self, command: Command, body: Option<&Value>) -> Result<Response> {
        let request = self.build_request(command, body);
        let transport = self.transport.as_mut().ok_or(Error::NotConnected)?;

        debug!(%command, id = request.command(), "Sending PTSL request");
        let response = transport.send(request).await?;
        debug!(%command, status = response.status(), "PTSL response received");

        Ok(response)
    }

    fn build_request(&self, command: Command, body: Option<&Value>) -> Request {
        Request {
            header: Some(RequestHeader {
                task_id: String::new(),
                command: command.id(&self.profile.commands),
                version: self.profile.version,
                session_id: self.session_id.clone().unwrap_or_default(),
                version_minor: self.profile.version_minor,
                version_revision: self.profile.version_revision,
            }),
            request_body_json: body.map(Value::to_string).unwrap_or_default(),
        }
    }
}

fn parse_body<T: serde::de::DeserializeOwned + Default>(body: &str) -> Result<T> {
    if body.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(body)?)
}

/// Where the export is expected to land, for logs
fn bounce_location(request: &BounceRequest, subfolder: &str) -> String {
    match request.destination() {
        ExportDestination::Directory => request
            .directory()
            .join(request.output_file_name())
            .display()
            .to_string(),
        ExportDestination::SessionFolder => format!(
            "<session folder>/{}/{}",
            subfolder,
            request.output_file_name()
        ),
    }
}

/// Raw error payload, or a placeholder when Pro Tools sent none
fn error_payload(response: &Response) -> String {
    if response.response_error_json.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        response.response_error_json.clone()
    }
}

/// Directory of the session: the parent of the `.ptx` file, or the path itself
fn session_directory(session_path: &Path) -> PathBuf {
    let is_session_file = session_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ptx") || ext.eq_ignore_ascii_case("ptf"));

    match session_path.parent() {
        Some(parent) if is_session_file => parent.to_path_buf(),
        _ => session_path.to_path_buf(),
    }
}

/// Scoped Pro Tools connection: the channel is released when the guard is
/// dropped, whatever path leaves the scope.
#[derive(Debug)]
pub struct ConnectionGuard {
    client: ProToolsClient,
}

impl Deref for ConnectionGuard {
    type Target = ProToolsClient;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl DerefMut for ConnectionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.client
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.client.disconnect();
    }
}

/// Builder for configuring a ProToolsClient
pub struct ClientBuilder {
    host: String,
    port: u16,
    connect_timeout: Duration,
    profile: ProtocolProfile,
    identity: ClientIdentity,
    transport: Option<Box<dyn PtslTransport>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            profile: ProtocolProfile::default(),
            identity: ClientIdentity::default(),
            transport: None,
        }
    }
}

impl ClientBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the protocol profile (status values, command ids, destination)
    pub fn profile(mut self, profile: ProtocolProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn identity(mut self, identity: ClientIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Use a custom transport instead of opening a gRPC channel on connect
    pub fn transport(mut self, transport: Box<dyn PtslTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client (unconnected)
    pub fn build(self) -> ProToolsClient {
        ProToolsClient {
            host: self.host,
            port: self.port,
            connect_timeout: self.connect_timeout,
            profile: self.profile,
            identity: self.identity,
            injected: self.transport,
            transport: None,
            session_id: None,
            state: ConnectionState::Unconnected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_directory() {
        assert_eq!(
            session_directory(Path::new("/Sessions/Song/Song.ptx")),
            PathBuf::from("/Sessions/Song")
        );
        assert_eq!(
            session_directory(Path::new("/Sessions/Song")),
            PathBuf::from("/Sessions/Song")
        );
    }

    #[test]
    fn test_error_payload_placeholder() {
        let response = Response::default();
        assert_eq!(error_payload(&response), "Unknown error");

        let response = Response {
            response_error_json: r#"{"command_error_type":"PT_NoOpenedSession"}"#.to_string(),
            ..Default::default()
        };
        assert_eq!(
            error_payload(&response),
            r#"{"command_error_type":"PT_NoOpenedSession"}"#
        );
    }

    #[test]
    fn test_build_request_carries_profile_fields() {
        let client = ProToolsClient::builder()
            .profile(ProtocolProfile::legacy())
            .build();
        let request = client.build_request(Command::GetSessionName, None);
        let header = request.header.unwrap();

        assert_eq!(header.command, ProtocolProfile::legacy().commands.get_session_name);
        assert_eq!(header.version, 1);
        assert!(header.session_id.is_empty());
        assert!(request.request_body_json.is_empty());
    }

    #[test]
    fn test_bounce_location_follows_destination() {
        let dir = Path::new("/tmp/bounces");
        let explicit = BounceRequest::new(
            "Song",
            dir,
            ExportDestination::Directory,
            BounceOptions::default(),
        );
        assert_eq!(
            bounce_location(&explicit, "Bounced Files"),
            dir.join("Song.wav").display().to_string()
        );

        let session = BounceRequest::new(
            "Song",
            dir,
            ExportDestination::SessionFolder,
            BounceOptions::default(),
        );
        let location = bounce_location(&session, "Bounced Files");
        assert_eq!(location, "<session folder>/Bounced Files/Song.wav");
        assert!(!location.contains("/tmp/bounces"));
    }

    #[tokio::test]
    async fn test_calls_fail_fast_when_unconnected() {
        let mut client = ProToolsClient::new("localhost", 1);
        assert!(matches!(
            client.get_session_info().await,
            Err(Error::NotConnected)
        ));

        // disconnect() before connect() is a no-op
        client.disconnect();
        assert_eq!(client.state(), ConnectionState::Unconnected);
    }
}
