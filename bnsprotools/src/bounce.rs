//! Bounce (export mix) requests and results

use crate::error::{Error, Result};
use crate::protocol::{ExportDestination, PayloadStyle};
use serde_json::{json, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Characters rejected by at least one of the file systems Pro Tools runs on
pub const ILLEGAL_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '\''];

/// File name used when neither the caller nor the session provides one
pub const DEFAULT_BOUNCE_NAME: &str = "bounce";

const SUPPORTED_BIT_DEPTHS: &[u16] = &[16, 24, 32];
const SUPPORTED_SAMPLE_RATES: &[u32] = &[44_100, 48_000, 88_200, 96_000, 176_400, 192_000];

/// Replaces characters that are illegal in file names with `_`.
///
/// Leading and trailing whitespace is trimmed; an empty result becomes
/// [`DEFAULT_BOUNCE_NAME`].
///
/// ```
/// use bnsprotools::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("My/Session:2"), "My_Session_2");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| {
            if ILLEGAL_FILE_NAME_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    if sanitized.is_empty() {
        DEFAULT_BOUNCE_NAME.to_string()
    } else {
        sanitized
    }
}

/// Container format of the bounced file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileType {
    #[default]
    Wav,
    Aiff,
    Mp3,
}

impl FileType {
    /// Extension of files written in this format
    pub fn extension(self) -> &'static str {
        match self {
            FileType::Wav => "wav",
            FileType::Aiff => "aiff",
            FileType::Mp3 => "mp3",
        }
    }

    fn plain(self) -> &'static str {
        match self {
            FileType::Wav => "WAV",
            FileType::Aiff => "AIFF",
            FileType::Mp3 => "MP3",
        }
    }

    fn enumerated(self) -> &'static str {
        match self {
            FileType::Wav => "EM_WAV",
            FileType::Aiff => "EM_AIFF",
            FileType::Mp3 => "EM_MP3",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plain())
    }
}

impl FromStr for FileType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WAV" | "WAVE" | "BWF" => Ok(FileType::Wav),
            "AIF" | "AIFF" => Ok(FileType::Aiff),
            "MP3" => Ok(FileType::Mp3),
            other => Err(Error::configuration(format!(
                "Unsupported bounce file type: {}",
                other
            ))),
        }
    }
}

/// Export parameters shared by every bounce of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BounceOptions {
    pub file_type: FileType,
    pub bit_depth: u16,
    pub sample_rate: u32,
    /// Interleaved single file, otherwise multiple mono files
    pub interleaved: bool,
    /// Offline (faster than real time) bounce
    pub offline: bool,
}

impl Default for BounceOptions {
    fn default() -> Self {
        Self {
            file_type: FileType::Wav,
            bit_depth: 24,
            sample_rate: 48_000,
            interleaved: true,
            offline: true,
        }
    }
}

impl BounceOptions {
    /// Checks bit depth and sample rate against the values Pro Tools accepts
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_BIT_DEPTHS.contains(&self.bit_depth) {
            return Err(Error::configuration(format!(
                "Unsupported bit depth: {} (expected one of {:?})",
                self.bit_depth, SUPPORTED_BIT_DEPTHS
            )));
        }
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(Error::configuration(format!(
                "Unsupported sample rate: {} (expected one of {:?})",
                self.sample_rate, SUPPORTED_SAMPLE_RATES
            )));
        }
        Ok(())
    }
}

/// Fully specified export command, immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BounceRequest {
    file_name: String,
    directory: PathBuf,
    destination: ExportDestination,
    options: BounceOptions,
}

impl BounceRequest {
    /// Builds a request; `file_name` is sanitized here.
    pub fn new(
        file_name: &str,
        directory: &Path,
        destination: ExportDestination,
        options: BounceOptions,
    ) -> Self {
        Self {
            file_name: sanitize_file_name(file_name),
            directory: directory.to_path_buf(),
            destination,
            options,
        }
    }

    /// Sanitized base name, without extension
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Name of the file Pro Tools will write
    pub fn output_file_name(&self) -> String {
        format!("{}.{}", self.file_name, self.options.file_type.extension())
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn destination(&self) -> ExportDestination {
        self.destination
    }

    pub fn options(&self) -> &BounceOptions {
        &self.options
    }

    /// JSON body of the `ExportMix` command
    pub fn to_payload(&self, style: PayloadStyle) -> Value {
        let options = &self.options;
        match style {
            PayloadStyle::Plain => json!({
                "file_name": self.file_name,
                "file_type": options.file_type.plain(),
                "location_info": self.location_info("Custom", "SessionFolder"),
                "audio_info": {
                    "export_format": options.file_type.plain(),
                    "bit_depth": options.bit_depth,
                    "sample_rate": options.sample_rate,
                    "delivery_format": if options.interleaved { "Interleaved" } else { "MultipleMono" },
                },
                "offline_bounce": options.offline,
                "mix_source_list": [{ "source_type": "EntireMix" }],
            }),
            PayloadStyle::Enumerated => json!({
                "file_name": self.file_name,
                "file_type": options.file_type.enumerated(),
                "location_info": self.location_info("EM_FD_Directory", "EM_FD_SessionFolder"),
                "audio_info": {
                    "export_format": if options.interleaved { "EF_Interleaved" } else { "EF_MultipleMono" },
                    "bit_depth": format!("Bit{}", options.bit_depth),
                    "sample_rate": format!("SR_{}", options.sample_rate),
                    "delivery_format": "EM_DF_SingleFile",
                },
                "offline_bounce": if options.offline { "TB_True" } else { "TB_False" },
                "mix_source_list": [{ "source_type": "EntireMix" }],
            }),
        }
    }

    fn location_info(&self, directory_label: &str, session_label: &str) -> Value {
        match self.destination {
            ExportDestination::Directory => json!({
                "file_destination": directory_label,
                "directory": self.directory.to_string_lossy(),
            }),
            ExportDestination::SessionFolder => json!({
                "file_destination": session_label,
            }),
        }
    }
}

/// How the path of a bounced file was determined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathResolution {
    /// Built from the explicit destination directory of the request
    Composed,
    /// Built from the session directory reported by Pro Tools
    SessionFolder,
    /// Session path query failed; the path is a guess and may not exist
    Synthesized,
}

/// Location of a completed bounce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BounceResult {
    pub path: PathBuf,
    pub resolution: PathResolution,
}

impl BounceResult {
    /// `false` when the path is only a best-effort guess
    pub fn is_authoritative(&self) -> bool {
        self.resolution != PathResolution::Synthesized
    }
}
