//! Gestion des erreurs pour le client MASV

use thiserror::Error;

/// Type Result personnalisé pour bnsmasv
pub type Result<T> = std::result::Result<T, Error>;

/// Erreurs possibles lors d'un transfert MASV
#[derive(Error, Debug)]
pub enum Error {
    /// Réponse HTTP en erreur (status >= 400), corps conservé tel quel
    #[error("MASV API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// Erreur réseau
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Réponse 2xx dont le contenu est inexploitable
    #[error("Unexpected MASV response: {0}")]
    InvalidResponse(String),

    /// Agent de transfert absent ou muet
    #[error(
        "MASV transfer agent unavailable: {0}. Install the MASV agent CLI and make sure it is on your PATH (or set masv.agent.command)"
    )]
    AgentUnavailable(String),

    /// Sous-commande de l'agent en échec (code de sortie, timeout)
    #[error("MASV agent command '{command}' failed: {message}")]
    Agent { command: String, message: String },

    /// Aucun identifiant d'upload dans la sortie de l'agent
    #[error("Could not extract an upload id from agent output: {0}")]
    Extraction(String),

    /// Ni destinataires ni portail (ou les deux)
    #[error("Invalid transfer target: {0}")]
    InvalidTarget(String),

    /// Cible non prise en charge par ce mécanisme
    #[error("Transfer target not supported: {0}")]
    UnsupportedTarget(String),

    /// L'agent a signalé l'échec de l'upload
    #[error("Upload {id} failed: {message}")]
    UploadFailed { id: String, message: String },

    /// Erreur d'I/O (lecture du fichier, lancement de l'agent)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Erreur de parsing JSON
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Erreur de configuration MASV (clé API, team, mode)
    #[error("MASV configuration error: {0}")]
    Configuration(String),

    /// Erreur de configuration (anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl Error {
    /// Crée une erreur de configuration
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Crée une erreur depuis un code HTTP et le corps de la réponse
    pub fn from_status_code(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// Vérifie si l'erreur est une erreur d'authentification (401/403)
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Api { status: 401 | 403, .. })
    }
}
