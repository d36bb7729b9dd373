//! Extension pour intégrer la configuration MASV dans bnsconfig
//!
//! Ce module fournit le trait `MasvConfigExt` qui ajoute à
//! `bnsconfig::Config` l'accès aux identifiants MASV, au mode de transfert
//! et aux réglages de l'agent.
//!
//! # Exemple
//!
//! ```no_run
//! use bnsconfig::get_config;
//! use bnsmasv::MasvConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config();
//! if config.get_masv_api_key()?.is_none() {
//!     eprintln!("Set masv.api_key (or MASV_API_KEY)");
//! }
//! println!("Transfer mode: {}", config.get_masv_mode()?);
//! # Ok(())
//! # }
//! ```

use crate::agent::{AgentSettings, AgentTimeouts, DEFAULT_AGENT_COMMAND};
use crate::api::DEFAULT_BASE_URL;
use crate::http::DEFAULT_CHUNK_SIZE;
use crate::transfer::TransferMode;
use anyhow::{anyhow, Result};
use bnsconfig::Config;
use serde_yaml::Value;
use std::time::Duration;

/// Trait d'extension pour gérer la configuration MASV dans bnsconfig
pub trait MasvConfigExt {
    /// Clé API MASV, déchiffrée si stockée chiffrée. `None` si absente.
    fn get_masv_api_key(&self) -> Result<Option<String>>;

    /// Stocke la clé API MASV chiffrée
    fn set_masv_api_key(&self, api_key: &str) -> Result<()>;

    /// Identifiant d'équipe MASV. `None` si absent.
    fn get_masv_team_id(&self) -> Result<Option<String>>;

    /// Définit l'identifiant d'équipe MASV
    fn set_masv_team_id(&self, team_id: &str) -> Result<()>;

    /// URL de base de l'API (défaut: `https://api.massive.app/v1`)
    fn get_masv_base_url(&self) -> Result<String>;

    /// Mécanisme de transfert (`http` ou `agent`)
    fn get_masv_mode(&self) -> Result<TransferMode>;

    /// Taille des chunks de l'upload multipart
    fn get_masv_chunk_size(&self) -> Result<usize>;

    /// Timeout des requêtes HTTP; `None` quand `http_timeout_secs` vaut 0
    fn get_masv_http_timeout(&self) -> Result<Option<Duration>>;

    /// Expéditeur annoncé lors d'un dépôt sur portail
    fn get_masv_sender_email(&self) -> Result<Option<String>>;

    /// Sous-domaine du portail par défaut
    fn get_masv_portal_subdomain(&self) -> Result<Option<String>>;

    /// Mot de passe du portail par défaut, déchiffré si nécessaire
    fn get_masv_portal_password(&self) -> Result<Option<String>>;

    /// Réglages de l'agent, authentifié avec `api_key`
    fn get_masv_agent_settings(&self, api_key: &str) -> Result<AgentSettings>;
}

fn secs(config: &Config, path: &[&str], default: u64) -> Duration {
    Duration::from_secs(config.get_usize(path).map(|v| v as u64).unwrap_or(default))
}

impl MasvConfigExt for Config {
    fn get_masv_api_key(&self) -> Result<Option<String>> {
        self.get_secret(&["masv", "api_key"])
    }

    fn set_masv_api_key(&self, api_key: &str) -> Result<()> {
        self.set_secret(&["masv", "api_key"], api_key)
    }

    fn get_masv_team_id(&self) -> Result<Option<String>> {
        Ok(self.get_string(&["masv", "team_id"]))
    }

    fn set_masv_team_id(&self, team_id: &str) -> Result<()> {
        self.set_value(&["masv", "team_id"], Value::String(team_id.to_string()))
    }

    fn get_masv_base_url(&self) -> Result<String> {
        Ok(self
            .get_string(&["masv", "base_url"])
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()))
    }

    fn get_masv_mode(&self) -> Result<TransferMode> {
        match self.get_string(&["masv", "mode"]) {
            Some(mode) => mode.parse().map_err(|e| anyhow!("{}", e)),
            None => Ok(TransferMode::default()),
        }
    }

    fn get_masv_chunk_size(&self) -> Result<usize> {
        match self.get_usize(&["masv", "chunk_size"]) {
            Some(0) => Err(anyhow!("masv.chunk_size must be greater than zero")),
            Some(size) => Ok(size),
            None => Ok(DEFAULT_CHUNK_SIZE),
        }
    }

    fn get_masv_http_timeout(&self) -> Result<Option<Duration>> {
        Ok(match self.get_usize(&["masv", "http_timeout_secs"]) {
            Some(0) | None => None,
            Some(secs) => Some(Duration::from_secs(secs as u64)),
        })
    }

    fn get_masv_sender_email(&self) -> Result<Option<String>> {
        Ok(self.get_string(&["masv", "sender_email"]))
    }

    fn get_masv_portal_subdomain(&self) -> Result<Option<String>> {
        Ok(self.get_string(&["masv", "portal_subdomain"]))
    }

    fn get_masv_portal_password(&self) -> Result<Option<String>> {
        self.get_secret(&["masv", "portal_password"])
    }

    fn get_masv_agent_settings(&self, api_key: &str) -> Result<AgentSettings> {
        let command = self
            .get_string_list(&["masv", "agent", "command"])
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_AGENT_COMMAND.to_string()]);

        let poll_attempts = self
            .get_usize(&["masv", "agent", "poll_attempts"])
            .unwrap_or(60);

        Ok(AgentSettings {
            command,
            api_key: api_key.to_string(),
            sender_email: self.get_masv_sender_email()?,
            startup_grace: secs(self, &["masv", "agent", "startup_grace_secs"], 3),
            poll_interval: secs(self, &["masv", "agent", "poll_interval_secs"], 2),
            poll_attempts: u32::try_from(poll_attempts)
                .map_err(|_| anyhow!("masv.agent.poll_attempts is too large"))?,
            timeouts: AgentTimeouts::default(),
        })
    }
}
