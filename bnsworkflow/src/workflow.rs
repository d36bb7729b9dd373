//! Bounce de la session active puis envoi via MASV
//!
//! ```text
//! open (guard) ─▶ session name ─▶ bounce_to_disk ─▶ release ─▶ transfer client ─▶ send_file
//! ```
//!
//! Les étapes s'enchaînent strictement : l'upload ne commence qu'une fois le
//! bounce terminé et la connexion Pro Tools libérée. Aucune compensation en
//! cas d'échec : un package déjà créé reste orphelin côté MASV.

use crate::error::Result;
use crate::settings::Settings;
use bnsmasv::{
    AgentTransferClient, Completion, HttpTransferClient, TransferClient, TransferMode,
    TransferRequest, TransferTarget,
};
use bnsprotools::{BounceResult, PathResolution, ProToolsClient};
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

/// Nom utilisé quand Pro Tools ne donne pas le nom de la session
pub const DEFAULT_SESSION_NAME: &str = "untitled";

/// Description du package pour une session donnée
pub fn package_description(session_name: &str) -> String {
    format!("Pro Tools Bounce: {}", session_name)
}

/// Résultat d'une exécution réussie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowReport {
    pub session_name: String,
    pub file: PathBuf,
    pub resolution: PathResolution,
    pub transfer_id: String,
    pub target: TransferTarget,
    pub mechanism: &'static str,
    pub completion: Completion,
}

impl fmt::Display for WorkflowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  File: {}", self.file.display())?;
        writeln!(f, "  Package ID: {}", self.transfer_id)?;
        match &self.target {
            TransferTarget::Email { recipients } => {
                writeln!(f, "  Recipients: {}", recipients.join(", "))?
            }
            TransferTarget::Portal { subdomain, .. } => writeln!(f, "  Portal: {}", subdomain)?,
        }
        write!(f, "  Delivery: {} ({})", self.completion, self.mechanism)
    }
}

/// Coordinateur du workflow
#[derive(Debug, Clone)]
pub struct BounceAndSend {
    settings: Settings,
}

impl BounceAndSend {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Vérifie que `target` est livrable avec le mode configuré, avant
    /// tout contact avec Pro Tools
    pub fn validate(&self, target: &TransferTarget) -> Result<()> {
        target.validate()?;
        if let (TransferMode::Http, TransferTarget::Portal { subdomain, .. }) =
            (self.settings.mode, target)
        {
            return Err(bnsmasv::Error::UnsupportedTarget(format!(
                "portal delivery ({}) requires the agent transfer mode",
                subdomain
            ))
            .into());
        }
        Ok(())
    }

    /// Exécute le workflow complet pour `target`
    pub async fn run(&self, protools: ProToolsClient, target: TransferTarget) -> Result<WorkflowReport> {
        self.validate(&target)?;

        let (session_name, bounce) = self.bounce(protools).await?;
        let transfer = self.transfer_client().await?;
        self.deliver(transfer.as_ref(), &session_name, bounce, target)
            .await
    }

    /// Bounce la session dans le répertoire configuré.
    ///
    /// La connexion est libérée avant le retour, succès ou échec.
    pub async fn bounce(&self, protools: ProToolsClient) -> Result<(String, BounceResult)> {
        let mut pt = protools.open().await?;

        let session = pt.get_session_info().await?;
        let session_name = session.name_or(DEFAULT_SESSION_NAME).to_string();
        info!("Session: {}", session_name);

        info!("Bouncing to: {}", self.settings.bounce_dir.display());
        let bounce = pt
            .bounce_to_disk(
                &self.settings.bounce_dir,
                Some(&session_name),
                &self.settings.bounce_options,
            )
            .await?;
        drop(pt);

        if !bounce.is_authoritative() {
            warn!(
                path = %bounce.path.display(),
                "Bounce location could not be confirmed by Pro Tools"
            );
        }
        Ok((session_name, bounce))
    }

    /// Construit le client de transfert du mode configuré
    pub async fn transfer_client(&self) -> Result<Box<dyn TransferClient>> {
        let settings = &self.settings;
        Ok(match settings.mode {
            TransferMode::Http => Box::new(
                HttpTransferClient::builder(
                    settings.api_key.clone(),
                    settings.team_id.clone().unwrap_or_default(),
                )
                .base_url(settings.base_url.clone())
                .chunk_size(settings.chunk_size)
                .timeout(settings.http_timeout)
                .build()?,
            ),
            TransferMode::Agent => Box::new(AgentTransferClient::new(settings.agent.clone()).await?),
        })
    }

    /// Livre le fichier bouncé avec `transfer`
    pub async fn deliver(
        &self,
        transfer: &dyn TransferClient,
        session_name: &str,
        bounce: BounceResult,
        target: TransferTarget,
    ) -> Result<WorkflowReport> {
        info!("Sending to: {}", target);
        let request = TransferRequest::new(&bounce.path, target, package_description(session_name))
            .with_name(session_name);

        let receipt = transfer.send_file(&request).await?;
        info!(
            transfer_id = %receipt.id,
            completion = %receipt.completion,
            "Transfer accepted by MASV"
        );

        Ok(WorkflowReport {
            session_name: session_name.to_string(),
            file: bounce.path,
            resolution: bounce.resolution,
            transfer_id: receipt.id,
            target: request.target,
            mechanism: transfer.mechanism(),
            completion: receipt.completion,
        })
    }
}
