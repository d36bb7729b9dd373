//! PTSL protocol profiles
//!
//! Pro Tools versions disagree on several details of the scripting
//! protocol: the numeric value reported for a successful command
//! (`ResponseStatus_Success` on early builds, `TStatus_Completed` on the
//! 2023+ SDK), whether a `RegisterConnection` call must precede every other
//! command, the command identifiers themselves, and where `ExportMix`
//! writes its file. A [`ProtocolProfile`] captures all of these so the
//! client logic never hard-codes them.
//!
//! Two presets are shipped ([`ProtocolProfile::legacy`] and
//! [`ProtocolProfile::modern`]); every field can be overridden from the
//! `protools` section of the configuration.

use serde::{Deserialize, Serialize};

/// Subfolder of the session directory where Pro Tools writes session-folder bounces
pub const DEFAULT_BOUNCE_SUBFOLDER: &str = "Bounced Files";

/// Where the export command writes its output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportDestination {
    /// Explicit directory sent in the request
    Directory,
    /// Fixed subfolder of the open session's own directory
    SessionFolder,
}

/// Encoding of the enumerated fields of the `ExportMix` body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadStyle {
    /// Bare values (`"WAV"`, `24`, `true`)
    Plain,
    /// Prefixed enum names (`"EM_WAV"`, `"Bit24"`, `"TB_True"`)
    Enumerated,
}

/// Numeric command identifiers (`CommandId` enum of the PTSL proto)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandIds {
    pub register_connection: i32,
    pub get_session_name: i32,
    pub get_session_path: i32,
    pub export_mix: i32,
}

impl Default for CommandIds {
    fn default() -> Self {
        Self {
            register_connection: 70,
            get_session_name: 41,
            get_session_path: 42,
            export_mix: 29,
        }
    }
}

/// Commands issued by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    RegisterConnection,
    GetSessionName,
    GetSessionPath,
    ExportMix,
}

impl Command {
    /// Numeric identifier of the command in the given table
    pub fn id(self, ids: &CommandIds) -> i32 {
        match self {
            Command::RegisterConnection => ids.register_connection,
            Command::GetSessionName => ids.get_session_name,
            Command::GetSessionPath => ids.get_session_path,
            Command::ExportMix => ids.export_mix,
        }
    }

    /// PTSL name of the command, used in logs and errors
    pub fn name(self) -> &'static str {
        match self {
            Command::RegisterConnection => "RegisterConnection",
            Command::GetSessionName => "GetSessionName",
            Command::GetSessionPath => "GetSessionPath",
            Command::ExportMix => "ExportMix",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Version-dependent parameters of the PTSL protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolProfile {
    pub name: String,
    pub version: i32,
    pub version_minor: i32,
    pub version_revision: i32,
    /// Status value meaning "command succeeded"
    pub success_status: i32,
    /// Symbolic name of `success_status`, for logs
    pub success_label: String,
    pub requires_registration: bool,
    pub destination: ExportDestination,
    pub payload_style: PayloadStyle,
    pub bounce_subfolder: String,
    pub commands: CommandIds,
}

impl ProtocolProfile {
    /// Early scripting builds: no registration, `ResponseStatus_Success`,
    /// bounce written to an explicit directory.
    pub fn legacy() -> Self {
        Self {
            name: "legacy".to_string(),
            version: 1,
            version_minor: 0,
            version_revision: 0,
            success_status: 1,
            success_label: "ResponseStatus_Success".to_string(),
            requires_registration: false,
            destination: ExportDestination::Directory,
            payload_style: PayloadStyle::Plain,
            bounce_subfolder: DEFAULT_BOUNCE_SUBFOLDER.to_string(),
            commands: CommandIds::default(),
        }
    }

    /// PTSL 2025.06: `RegisterConnection` first, `TStatus_Completed`,
    /// bounce written to the session's `Bounced Files` folder.
    pub fn modern() -> Self {
        Self {
            name: "modern".to_string(),
            version: 2025,
            version_minor: 6,
            version_revision: 0,
            success_status: 3,
            success_label: "TStatus_Completed".to_string(),
            requires_registration: true,
            destination: ExportDestination::SessionFolder,
            payload_style: PayloadStyle::Enumerated,
            bounce_subfolder: DEFAULT_BOUNCE_SUBFOLDER.to_string(),
            commands: CommandIds::default(),
        }
    }

    /// Looks up a preset by name (`legacy` or `modern`, case-insensitive)
    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "legacy" => Some(Self::legacy()),
            "modern" => Some(Self::modern()),
            _ => None,
        }
    }

    /// Whether a response status means success under this profile
    pub fn is_success(&self, status: i32) -> bool {
        status == self.success_status
    }
}

impl Default for ProtocolProfile {
    fn default() -> Self {
        Self::modern()
    }
}
