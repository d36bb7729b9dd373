//! # bnsprotools - Pro Tools Scripting client
//!
//! This crate drives a running Pro Tools instance through its scripting
//! interface (PTSL, gRPC on `localhost:31416`) to bounce the open session
//! mix to disk.
//!
//! ## Features
//!
//! - **Versioned protocol**: success status, registration, command ids and
//!   export destination come from a [`ProtocolProfile`] (legacy or modern
//!   preset, overridable from configuration)
//! - **Scoped connections**: [`ConnectionGuard`] releases the channel on
//!   every exit path
//! - **Bounce**: file name sanitization, export options validation and
//!   resolution of the written file's path ([`BounceResult`])
//! - **Pluggable transport**: [`PtslTransport`] separates the client logic
//!   from the gRPC channel
//!
//! ## Example
//!
//! ```no_run
//! use bnsconfig::get_config;
//! use bnsprotools::ProToolsConfigExt;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = get_config();
//!     let options = config.get_bounce_options()?;
//!     let bounce_dir = config.get_bounce_dir()?;
//!
//!     let mut pt = config.protools_client()?.open().await?;
//!     let session = pt.get_session_info().await?;
//!     let bounce = pt
//!         .bounce_to_disk(&bounce_dir, Some(session.name_or("untitled")), &options)
//!         .await?;
//!
//!     println!("Bounced to {}", bounce.path.display());
//!     Ok(())
//! }
//! ```

pub mod bounce;
pub mod client;
pub mod config_ext;
pub mod error;
pub mod models;
pub mod protocol;
pub mod transport;

pub use bounce::{
    sanitize_file_name, BounceOptions, BounceRequest, BounceResult, FileType, PathResolution,
    DEFAULT_BOUNCE_NAME, ILLEGAL_FILE_NAME_CHARS,
};
pub use client::{ClientBuilder, ClientIdentity, ConnectionGuard, ConnectionState, ProToolsClient};
pub use config_ext::ProToolsConfigExt;
pub use error::{Error, Result};
pub use models::SessionInfo;
pub use protocol::{Command, CommandIds, ExportDestination, PayloadStyle, ProtocolProfile};
pub use transport::{GrpcTransport, PtslTransport, Request, RequestHeader, Response, ResponseHeader};
