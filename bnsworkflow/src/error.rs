//! Erreurs du workflow bounce → envoi

/// Alias de Result pour le workflow
pub type Result<T> = std::result::Result<T, Error>;

/// Erreur d'une exécution du workflow
///
/// Les erreurs Pro Tools et MASV sont propagées telles quelles : leur
/// message contient déjà le diagnostic renvoyé par le service distant.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Identifiants ou réglages manquants, détectés avant tout appel distant
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Échec côté Pro Tools (connexion, commande, bounce)
    #[error(transparent)]
    ProTools(#[from] bnsprotools::Error),

    /// Échec côté MASV (API, agent, cible)
    #[error(transparent)]
    Transfer(#[from] bnsmasv::Error),

    /// Erreur de lecture de la configuration
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Vrai si l'erreur a été détectée avant tout appel distant
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_)
                | Error::Config(_)
                | Error::ProTools(bnsprotools::Error::Configuration(_))
                | Error::Transfer(bnsmasv::Error::Configuration(_))
                | Error::Transfer(bnsmasv::Error::InvalidTarget(_))
                | Error::Transfer(bnsmasv::Error::UnsupportedTarget(_))
        )
    }
}
