//! Mécanisme de transfert délégué à l'agent MASV local
//!
//! L'agent est une CLI installée sur la machine. Chaque étape est un
//! sous-processus bloquant borné par un timeout :
//!
//! | Étape               | Sous-commande                                   | Timeout |
//! |---------------------|-------------------------------------------------|---------|
//! | Présence            | `--help` (bannière `usage` attendue)            | 5 s     |
//! | Serveur             | `server status`, sinon `server start`           | 10 s    |
//! | Upload email        | `upload email --file F --recipients A,B ...`    | 300 s   |
//! | Upload portail      | `upload portal --file F --subdomain S ...`      | 300 s   |
//! | Suivi               | `transfers list` toutes les 2 s, 60 fois        | 10 s    |
//! | Finalisation        | `upload finalize --id ID`                       | 30 s    |
//!
//! La clé API est transmise à l'agent par la variable `MASV_API_KEY`.

pub mod parse;

use crate::error::{Error, Result};
use crate::transfer::{Completion, TransferClient, TransferReceipt, TransferRequest, TransferTarget};
use async_trait::async_trait;
use parse::{find_transfer, is_already_finalized, DefaultIdExtractor, IdExtractor, TransferState};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Variable d'environnement lue par l'agent pour s'authentifier
pub const AGENT_API_KEY_ENV: &str = "MASV_API_KEY";

/// Commande par défaut de l'agent
pub const DEFAULT_AGENT_COMMAND: &str = "masv";

/// Limites de durée de chaque sous-commande
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentTimeouts {
    pub help: Duration,
    pub status: Duration,
    pub upload: Duration,
    pub list: Duration,
    pub finalize: Duration,
}

impl Default for AgentTimeouts {
    fn default() -> Self {
        Self {
            help: Duration::from_secs(5),
            status: Duration::from_secs(10),
            upload: Duration::from_secs(300),
            list: Duration::from_secs(10),
            finalize: Duration::from_secs(30),
        }
    }
}

/// Paramètres de l'agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    /// Programme et arguments préfixes (`[masv]`, `[npx, masv]`, ...)
    pub command: Vec<String>,
    pub api_key: String,
    /// Expéditeur annoncé pour les dépôts sur portail
    pub sender_email: Option<String>,
    /// Attente après `server start` avant de vérifier le serveur
    pub startup_grace: Duration,
    pub poll_interval: Duration,
    pub poll_attempts: u32,
    pub timeouts: AgentTimeouts,
}

impl AgentSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            command: vec![DEFAULT_AGENT_COMMAND.to_string()],
            api_key: api_key.into(),
            sender_email: None,
            startup_grace: Duration::from_secs(3),
            poll_interval: Duration::from_secs(2),
            poll_attempts: 60,
            timeouts: AgentTimeouts::default(),
        }
    }
}

/// Sortie capturée d'une sous-commande
#[derive(Debug, Clone)]
struct AgentOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

impl AgentOutput {
    fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr).trim().to_string()
    }
}

/// Client de transfert qui délègue l'upload à l'agent MASV
pub struct AgentTransferClient {
    settings: AgentSettings,
    extractor: Box<dyn IdExtractor>,
    server: OnceCell<Completion>,
}

impl std::fmt::Debug for AgentTransferClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentTransferClient")
            .field("command", &self.settings.command)
            .field("server", &self.server.get())
            .finish()
    }
}

impl AgentTransferClient {
    /// Vérifie que l'agent répond puis crée le client.
    ///
    /// # Errors
    ///
    /// [`Error::AgentUnavailable`] si l'agent est absent, muet, ou si son
    /// aide ne contient pas de bannière d'usage.
    pub async fn new(settings: AgentSettings) -> Result<Self> {
        if settings.command.is_empty() {
            return Err(Error::configuration("masv.agent.command is empty"));
        }

        let client = Self {
            settings,
            extractor: Box::new(DefaultIdExtractor),
            server: OnceCell::new(),
        };
        client.probe().await?;
        Ok(client)
    }

    /// Remplace la stratégie d'extraction des identifiants
    pub fn with_extractor(mut self, extractor: Box<dyn IdExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    async fn probe(&self) -> Result<()> {
        let output = self
            .run(&["--help"], self.settings.timeouts.help)
            .await
            .map_err(|e| match e {
                Error::AgentUnavailable(_) => e,
                other => Error::AgentUnavailable(other.to_string()),
            })?;

        if !output.combined().to_ascii_lowercase().contains("usage") {
            return Err(Error::AgentUnavailable(format!(
                "'{}' did not print a usage banner",
                self.settings.command.join(" ")
            )));
        }
        debug!(command = %self.settings.command.join(" "), "MASV agent found");
        Ok(())
    }

    /// Exécute une sous-commande et attend sa fin, dans la limite de `timeout`
    async fn run(&self, args: &[&str], timeout: Duration) -> Result<AgentOutput> {
        let (program, prefix) = self
            .settings
            .command
            .split_first()
            .ok_or_else(|| Error::configuration("masv.agent.command is empty"))?;
        let label = args.iter().take(2).copied().collect::<Vec<_>>().join(" ");

        debug!(%program, ?args, "Running MASV agent");
        let child = Command::new(program)
            .args(prefix)
            .args(args)
            .env(AGENT_API_KEY_ENV, &self.settings.api_key)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(timeout, child).await {
            Err(_) => {
                return Err(Error::Agent {
                    command: label,
                    message: format!("timed out after {}s", timeout.as_secs_f32()),
                });
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::AgentUnavailable(format!("'{}' not found", program)));
            }
            Ok(result) => result?,
        };

        Ok(AgentOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Vérifie le serveur de l'agent, le démarre au besoin.
    ///
    /// Exécuté une seule fois par client; jamais fatal.
    pub async fn ensure_server(&self) -> Completion {
        *self
            .server
            .get_or_init(|| async {
                match self.run(&["server", "status"], self.settings.timeouts.status).await {
                    Ok(output) if output.status.success() => {
                        debug!("MASV agent server already running");
                        Completion::Confirmed
                    }
                    _ => self.start_server().await,
                }
            })
            .await
    }

    async fn start_server(&self) -> Completion {
        let Some((program, prefix)) = self.settings.command.split_first() else {
            return Completion::Failed;
        };

        info!("Starting MASV agent server...");
        let spawned = Command::new(program)
            .args(prefix)
            .args(["server", "start"])
            .env(AGENT_API_KEY_ENV, &self.settings.api_key)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        if let Err(e) = spawned {
            warn!("Could not start MASV agent server: {}", e);
            return Completion::Failed;
        }

        tokio::time::sleep(self.settings.startup_grace).await;

        match self.run(&["server", "status"], self.settings.timeouts.status).await {
            Ok(output) if output.status.success() => {
                info!("MASV agent server started");
                Completion::Confirmed
            }
            _ => {
                warn!("MASV agent server start not confirmed, continuing anyway");
                Completion::Assumed
            }
        }
    }

    /// Arguments de la sous-commande d'upload pour `request`
    pub fn upload_args(&self, request: &TransferRequest) -> Result<Vec<String>> {
        request.target.validate()?;
        let file = request.path.to_string_lossy().to_string();

        let mut args = match &request.target {
            TransferTarget::Email { recipients } => vec![
                "upload".to_string(),
                "email".to_string(),
                "--file".to_string(),
                file,
                "--recipients".to_string(),
                recipients.join(","),
            ],
            TransferTarget::Portal {
                subdomain,
                password,
            } => {
                let sender = self
                    .settings
                    .sender_email
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| {
                        Error::configuration("masv.sender_email is required for portal delivery")
                    })?;
                let mut args = vec![
                    "upload".to_string(),
                    "portal".to_string(),
                    "--file".to_string(),
                    file,
                    "--subdomain".to_string(),
                    subdomain.clone(),
                    "--sender".to_string(),
                    sender.to_string(),
                ];
                if let Some(password) = password {
                    args.extend(["--password".to_string(), password.clone()]);
                }
                args
            }
        };

        args.extend(["--description".to_string(), request.description.clone()]);
        if let Some(name) = request.name.as_deref().filter(|n| !n.is_empty()) {
            args.extend(["--name".to_string(), name.to_string()]);
        }
        Ok(args)
    }

    /// Lance l'upload et retourne l'identifiant annoncé par l'agent
    pub async fn start_upload(&self, request: &TransferRequest) -> Result<String> {
        let args = self.upload_args(request)?;
        tokio::fs::metadata(&request.path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("File not found: {} ({})", request.path.display(), e),
            ))
        })?;

        info!("Uploading {} via MASV agent to {}...", request.path.display(), request.target);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run(&arg_refs, self.settings.timeouts.upload).await?;

        if !output.status.success() {
            return Err(Error::Agent {
                command: "upload".to_string(),
                message: output.combined(),
            });
        }

        self.extractor
            .extract(&output.stdout)
            .ok_or_else(|| Error::Extraction(output.combined()))
    }

    /// Surveille l'upload `id` jusqu'à complétion, échec ou épuisement des tentatives
    pub async fn monitor(&self, id: &str) -> Result<Completion> {
        let attempts = self.settings.poll_attempts;

        for attempt in 1..=attempts {
            match self.run(&["transfers", "list"], self.settings.timeouts.list).await {
                Ok(output) if output.status.success() => {
                    match find_transfer(&output.stdout, id).map(|t| (t.classify(), t)) {
                        Some((TransferState::Complete, _)) => {
                            info!(upload_id = %id, "Upload complete");
                            return Ok(Completion::Confirmed);
                        }
                        Some((TransferState::Failed, status)) => {
                            return Err(Error::UploadFailed {
                                id: id.to_string(),
                                message: format!("agent reported state '{}'", status.state),
                            });
                        }
                        Some((TransferState::InProgress(Some(progress)), _)) => {
                            info!("  Progress: {:.1}%", progress);
                        }
                        Some((TransferState::InProgress(None), _)) | None => {
                            debug!(upload_id = %id, attempt, "Transfer not reported yet");
                        }
                    }
                }
                Ok(output) => debug!(attempt, "transfers list failed: {}", output.combined()),
                Err(e) => debug!(attempt, "transfers list failed: {}", e),
            }

            if attempt < attempts {
                tokio::time::sleep(self.settings.poll_interval).await;
            }
        }

        warn!(
            upload_id = %id,
            "No completion reported after {} checks, assuming the upload succeeded",
            attempts
        );
        Ok(Completion::Assumed)
    }

    /// Finalise l'upload; une erreur "not found" signifie qu'il l'est déjà
    pub async fn finalize(&self, id: &str) -> Result<()> {
        let output = self
            .run(&["upload", "finalize", "--id", id], self.settings.timeouts.finalize)
            .await?;

        if output.status.success() {
            info!(upload_id = %id, "Upload finalized");
            return Ok(());
        }

        let message = output.combined();
        if is_already_finalized(&message) {
            info!(upload_id = %id, "Upload already finalized by MASV");
            return Ok(());
        }
        Err(Error::Agent {
            command: "upload finalize".to_string(),
            message,
        })
    }
}

#[async_trait]
impl TransferClient for AgentTransferClient {
    fn mechanism(&self) -> &'static str {
        "agent"
    }

    async fn send_file(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        request.target.validate()?;

        let server = self.ensure_server().await;
        debug!(%server, "MASV agent server");

        let id = self.start_upload(request).await?;
        info!(upload_id = %id, "Upload started");

        let completion = self.monitor(&id).await?;
        self.finalize(&id).await?;

        Ok(TransferReceipt { id, completion })
    }
}
