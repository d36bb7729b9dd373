//! Pro Tools settings on top of bnsconfig
//!
//! [`ProToolsConfigExt`] adds PTSL connection settings, the protocol
//! profile and the default bounce parameters to `bnsconfig::Config`.
//!
//! # Example
//!
//! ```no_run
//! use bnsconfig::get_config;
//! use bnsprotools::ProToolsConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config();
//! let profile = config.get_protools_profile()?;
//! println!("PTSL profile: {} (success = {})", profile.name, profile.success_label);
//! # Ok(())
//! # }
//! ```

use crate::bounce::{BounceOptions, FileType};
use crate::client::{
    ClientIdentity, ProToolsClient, DEFAULT_APPLICATION_NAME, DEFAULT_CONNECT_TIMEOUT_SECS,
    DEFAULT_HOST, DEFAULT_PORT,
};
use crate::protocol::{ExportDestination, PayloadStyle, ProtocolProfile};
use anyhow::{anyhow, Result};
use bnsconfig::Config;
use serde_yaml::Value;
use std::path::PathBuf;
use std::time::Duration;

/// Default bounce directory
pub const DEFAULT_BOUNCE_DIR: &str = "~/Desktop/ProTools_Bounces";

/// Pro Tools accessors for `bnsconfig::Config`
pub trait ProToolsConfigExt {
    /// PTSL host (default: `localhost`)
    fn get_protools_host(&self) -> Result<String>;

    /// Persists the PTSL host
    fn set_protools_host(&self, host: &str) -> Result<()>;

    /// PTSL port (default: 31416)
    fn get_protools_port(&self) -> Result<u16>;

    /// Persists the PTSL port
    fn set_protools_port(&self, port: u16) -> Result<()>;

    /// Time allowed to open the gRPC channel
    fn get_protools_connect_timeout(&self) -> Result<Duration>;

    /// Identity sent when registering the connection
    fn get_protools_identity(&self) -> Result<ClientIdentity>;

    /// Protocol profile: the `protools.protocol` preset, then per-field
    /// overrides (`protools.success_status`, `protools.commands.export_mix`, ...)
    ///
    /// # Errors
    ///
    /// Fails on an unknown preset or an invalid override
    fn get_protools_profile(&self) -> Result<ProtocolProfile>;

    /// Default bounce parameters (`bounce` section)
    fn get_bounce_options(&self) -> Result<BounceOptions>;

    /// Bounce directory, created when missing
    fn get_bounce_dir(&self) -> Result<PathBuf>;

    /// Builds an unconnected Pro Tools client from the configuration
    fn protools_client(&self) -> Result<ProToolsClient>;
}

fn get_i32(config: &Config, path: &[&str]) -> Result<Option<i32>> {
    match config.get_value(path) {
        Ok(Value::Number(n)) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| anyhow!("{} is out of range", path.join("."))),
        Ok(Value::String(s)) if !s.trim().is_empty() => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} is not an integer: {}", path.join("."), s)),
        _ => Ok(None),
    }
}

fn parse_enum<T: serde::de::DeserializeOwned>(config: &Config, path: &[&str]) -> Result<Option<T>> {
    match config.get_string(path) {
        Some(s) => serde_yaml::from_value(Value::String(s.to_ascii_lowercase()))
            .map(Some)
            .map_err(|e| anyhow!("Invalid value for {}: {}", path.join("."), e)),
        None => Ok(None),
    }
}

impl ProToolsConfigExt for Config {
    fn get_protools_host(&self) -> Result<String> {
        Ok(self
            .get_string(&["protools", "host"])
            .unwrap_or_else(|| DEFAULT_HOST.to_string()))
    }

    fn set_protools_host(&self, host: &str) -> Result<()> {
        self.set_value(&["protools", "host"], Value::String(host.to_string()))
    }

    fn get_protools_port(&self) -> Result<u16> {
        match self.get_usize(&["protools", "port"]) {
            Some(port) => {
                u16::try_from(port).map_err(|_| anyhow!("Invalid Pro Tools port: {}", port))
            }
            None => Ok(DEFAULT_PORT),
        }
    }

    fn set_protools_port(&self, port: u16) -> Result<()> {
        self.set_value(&["protools", "port"], Value::from(port))
    }

    fn get_protools_connect_timeout(&self) -> Result<Duration> {
        let secs = self
            .get_usize(&["protools", "connect_timeout_secs"])
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS as usize);
        Ok(Duration::from_secs(secs as u64))
    }

    fn get_protools_identity(&self) -> Result<ClientIdentity> {
        let default = DEFAULT_APPLICATION_NAME.to_string();
        Ok(ClientIdentity {
            company_name: self
                .get_string(&["protools", "company_name"])
                .unwrap_or_else(|| default.clone()),
            application_name: self
                .get_string(&["protools", "application_name"])
                .unwrap_or(default),
        })
    }

    fn get_protools_profile(&self) -> Result<ProtocolProfile> {
        let name = self
            .get_string(&["protools", "protocol"])
            .unwrap_or_else(|| "modern".to_string());
        let mut profile = ProtocolProfile::by_name(&name)
            .ok_or_else(|| anyhow!("Unknown Pro Tools protocol profile: {}", name))?;

        if let Some(v) = get_i32(self, &["protools", "version"])? {
            profile.version = v;
        }
        if let Some(v) = get_i32(self, &["protools", "version_minor"])? {
            profile.version_minor = v;
        }
        if let Some(v) = get_i32(self, &["protools", "version_revision"])? {
            profile.version_revision = v;
        }
        if let Some(v) = get_i32(self, &["protools", "success_status"])? {
            profile.success_status = v;
            profile.success_label = self
                .get_string(&["protools", "success_label"])
                .unwrap_or_else(|| format!("status {}", v));
        }
        if let Some(v) = self.get_bool(&["protools", "requires_registration"]) {
            profile.requires_registration = v;
        }
        if let Some(v) = parse_enum::<ExportDestination>(self, &["protools", "destination"])? {
            profile.destination = v;
        }
        if let Some(v) = parse_enum::<PayloadStyle>(self, &["protools", "payload_style"])? {
            profile.payload_style = v;
        }
        if let Some(v) = self.get_string(&["protools", "bounce_subfolder"]) {
            profile.bounce_subfolder = v;
        }

        let commands = &mut profile.commands;
        for (key, slot) in [
            ("register_connection", &mut commands.register_connection),
            ("get_session_name", &mut commands.get_session_name),
            ("get_session_path", &mut commands.get_session_path),
            ("export_mix", &mut commands.export_mix),
        ] {
            if let Some(v) = get_i32(self, &["protools", "commands", key])? {
                *slot = v;
            }
        }

        Ok(profile)
    }

    fn get_bounce_options(&self) -> Result<BounceOptions> {
        let defaults = BounceOptions::default();

        let file_type = match self.get_string(&["bounce", "file_type"]) {
            Some(s) => s.parse::<FileType>().map_err(|e| anyhow!("{}", e))?,
            None => defaults.file_type,
        };
        let bit_depth = match self.get_usize(&["bounce", "bit_depth"]) {
            Some(v) => u16::try_from(v).map_err(|_| anyhow!("Invalid bit depth: {}", v))?,
            None => defaults.bit_depth,
        };
        let sample_rate = match self.get_usize(&["bounce", "sample_rate"]) {
            Some(v) => u32::try_from(v).map_err(|_| anyhow!("Invalid sample rate: {}", v))?,
            None => defaults.sample_rate,
        };

        let options = BounceOptions {
            file_type,
            bit_depth,
            sample_rate,
            interleaved: self
                .get_bool(&["bounce", "interleaved"])
                .unwrap_or(defaults.interleaved),
            offline: self
                .get_bool(&["bounce", "offline"])
                .unwrap_or(defaults.offline),
        };
        options.validate().map_err(|e| anyhow!("{}", e))?;
        Ok(options)
    }

    fn get_bounce_dir(&self) -> Result<PathBuf> {
        self.get_managed_dir(&["bounce", "directory"], DEFAULT_BOUNCE_DIR)
    }

    fn protools_client(&self) -> Result<ProToolsClient> {
        Ok(ProToolsClient::builder()
            .host(self.get_protools_host()?)
            .port(self.get_protools_port()?)
            .connect_timeout(self.get_protools_connect_timeout()?)
            .profile(self.get_protools_profile()?)
            .identity(self.get_protools_identity()?)
            .build())
    }
}
