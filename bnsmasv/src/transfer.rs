//! Contrat commun aux mécanismes de transfert
//!
//! [`TransferClient`] est implémenté par [`HttpTransferClient`](crate::HttpTransferClient)
//! (upload multipart direct) et [`AgentTransferClient`](crate::AgentTransferClient)
//! (délégation à l'agent local). Les deux acceptent un fichier local et une
//! cible, et ne rendent la main qu'une fois le fichier accepté par MASV.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};

/// Mécanisme de livraison choisi par configuration (`masv.mode`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    /// Appels directs à l'API REST
    #[default]
    Http,
    /// Délégation à l'agent local
    Agent,
}

impl std::str::FromStr for TransferMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" | "api" => Ok(Self::Http),
            "agent" | "cli" => Ok(Self::Agent),
            other => Err(Error::configuration(format!(
                "Unknown MASV transfer mode: {} (expected http or agent)",
                other
            ))),
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
            Self::Agent => "agent",
        })
    }
}

/// Destinataires d'un transfert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferTarget {
    /// Invitation individuelle par email
    Email { recipients: Vec<String> },
    /// Dépôt sur un portail MASV
    Portal {
        subdomain: String,
        password: Option<String>,
    },
}

impl TransferTarget {
    /// Choisit la cible à partir d'options facultatives.
    ///
    /// Exactement une des deux doit être renseignée : des destinataires
    /// (liste non vide) ou un sous-domaine de portail.
    pub fn from_options(
        recipients: Option<&[String]>,
        portal_subdomain: Option<&str>,
        portal_password: Option<&str>,
    ) -> Result<Self> {
        let recipients: Vec<String> = recipients
            .unwrap_or_default()
            .iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        let subdomain = portal_subdomain.map(str::trim).filter(|s| !s.is_empty());

        match (recipients.is_empty(), subdomain) {
            (false, None) => Ok(Self::Email { recipients }),
            (true, Some(subdomain)) => Ok(Self::Portal {
                subdomain: subdomain.to_string(),
                password: portal_password
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
            }),
            (true, None) => Err(Error::InvalidTarget(
                "either recipients or a portal subdomain is required".to_string(),
            )),
            (false, Some(_)) => Err(Error::InvalidTarget(
                "recipients and portal subdomain are mutually exclusive".to_string(),
            )),
        }
    }

    /// Vérifie qu'une cible construite directement est exploitable
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Email { recipients } if recipients.iter().all(|r| r.trim().is_empty()) => Err(
                Error::InvalidTarget("email delivery requires at least one recipient".to_string()),
            ),
            Self::Portal { subdomain, .. } if subdomain.trim().is_empty() => Err(
                Error::InvalidTarget("portal delivery requires a subdomain".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for TransferTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email { recipients } => f.write_str(&recipients.join(", ")),
            Self::Portal { subdomain, .. } => write!(f, "portal {}", subdomain),
        }
    }
}

/// Un fichier à livrer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub path: PathBuf,
    pub target: TransferTarget,
    pub description: String,
    /// Nom du transfert côté MASV (agent uniquement)
    pub name: Option<String>,
}

impl TransferRequest {
    pub fn new(path: impl AsRef<Path>, target: TransferTarget, description: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            target,
            description: description.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Issue d'une étape dont la fin n'est pas toujours observable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Succès constaté
    Confirmed,
    /// Échec constaté
    Failed,
    /// Succès présumé, non vérifié (délai de surveillance dépassé, démarrage non confirmé)
    Assumed,
}

impl Completion {
    /// `true` pour un succès constaté ou présumé
    pub fn is_success(self) -> bool {
        !matches!(self, Completion::Failed)
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Completion::Confirmed => "confirmed",
            Completion::Failed => "failed",
            Completion::Assumed => "assumed (unverified)",
        })
    }
}

/// Résultat d'un transfert accepté
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Identifiant du package (HTTP) ou de l'upload (agent)
    pub id: String,
    pub completion: Completion,
}

/// Mécanisme de livraison d'un fichier via MASV
#[async_trait]
pub trait TransferClient: Send + Sync {
    /// Nom court du mécanisme, pour les logs
    fn mechanism(&self) -> &'static str;

    /// Livre `request.path` à `request.target`.
    ///
    /// Ne retourne qu'une fois le fichier accepté par MASV pour livraison.
    async fn send_file(&self, request: &TransferRequest) -> Result<TransferReceipt>;
}
