//! Réglages du workflow, validés avant tout appel distant

use crate::error::{Error, Result};
use bnsconfig::Config;
use bnsmasv::{AgentSettings, MasvConfigExt, TransferMode};
use bnsprotools::{BounceOptions, ProToolsConfigExt};
use std::path::PathBuf;
use std::time::Duration;

/// Tout ce dont une exécution a besoin, hors connexion Pro Tools
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    /// Requis en mode HTTP seulement
    pub team_id: Option<String>,
    pub mode: TransferMode,
    pub base_url: String,
    pub chunk_size: usize,
    pub http_timeout: Option<Duration>,
    pub agent: AgentSettings,
    pub bounce_dir: PathBuf,
    pub bounce_options: BounceOptions,
    /// Portail utilisé quand aucun destinataire n'est donné
    pub portal_subdomain: Option<String>,
    pub portal_password: Option<String>,
}

impl Settings {
    /// Lit la configuration et vérifie la présence des identifiants.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] si la clé API manque, ou si l'identifiant
    /// d'équipe manque en mode HTTP.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.get_masv_api_key()?.ok_or_else(|| {
            Error::configuration("MASV API key not found (set masv.api_key or MASV_API_KEY)")
        })?;

        let settings = Self {
            team_id: config.get_masv_team_id()?,
            mode: config.get_masv_mode()?,
            base_url: config.get_masv_base_url()?,
            chunk_size: config.get_masv_chunk_size()?,
            http_timeout: config.get_masv_http_timeout()?,
            agent: config.get_masv_agent_settings(&api_key)?,
            bounce_dir: config.get_bounce_dir()?,
            bounce_options: config.get_bounce_options()?,
            portal_subdomain: config.get_masv_portal_subdomain()?,
            portal_password: config.get_masv_portal_password()?,
            api_key,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Vérifie les identifiants requis par le mode courant
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::configuration(
                "MASV API key not found (set masv.api_key or MASV_API_KEY)",
            ));
        }
        if self.mode == TransferMode::Http
            && self.team_id.as_deref().is_none_or(|t| t.trim().is_empty())
        {
            return Err(Error::configuration(
                "MASV team id not found (set masv.team_id or MASV_TEAM_ID)",
            ));
        }
        Ok(())
    }

    /// Change le mécanisme de transfert puis revalide
    pub fn with_mode(mut self, mode: TransferMode) -> Result<Self> {
        self.mode = mode;
        self.validate()?;
        Ok(self)
    }
}
