//! Mécanisme de transfert direct : API REST MASV + upload multipart
//!
//! ```text
//! create_package ──▶ add_file ──▶ blueprint init ──▶ upload URLs
//!       ──▶ PUT chunk 1..n (ETag) ──▶ finalize_file ──▶ finalize_package
//! ```
//!
//! Aucune reprise : le premier appel en erreur interrompt tout le transfert
//! et le package déjà créé reste orphelin côté MASV.

use crate::api::{MasvApi, DEFAULT_BASE_URL};
use crate::error::{Error, Result};
use crate::models::{chunk_count, Package, Part};
use crate::transfer::{Completion, TransferClient, TransferReceipt, TransferRequest, TransferTarget};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// Taille des chunks envoyés au stockage (5 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

const MIB: f64 = 1024.0 * 1024.0;

/// Client de transfert par appels HTTP directs
#[derive(Debug, Clone)]
pub struct HttpTransferClient {
    api: MasvApi,
    chunk_size: usize,
}

impl HttpTransferClient {
    /// Crée un client avec l'URL et la taille de chunk par défaut
    pub fn new(api_key: impl Into<String>, team_id: impl Into<String>) -> Result<Self> {
        Self::builder(api_key, team_id).build()
    }

    /// Crée un builder pour configurer le client
    pub fn builder(api_key: impl Into<String>, team_id: impl Into<String>) -> HttpClientBuilder {
        HttpClientBuilder {
            api_key: api_key.into(),
            team_id: team_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: None,
        }
    }

    /// Accès à la couche API bas-niveau
    pub fn api(&self) -> &MasvApi {
        &self.api
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Crée un package pour `recipients` et retourne son identifiant et son jeton
    pub async fn create_package(&self, recipients: &[String], description: &str) -> Result<Package> {
        info!("Creating MASV package for {}...", recipients.join(", "));
        let package = self.api.create_package(recipients, description).await?;
        info!(package_id = %package.id, "Package created");
        Ok(package)
    }

    /// Envoie le fichier dans le package, chunk par chunk, puis le finalise.
    ///
    /// Les chunks sont lus séquentiellement; la lecture s'arrête à la fin du
    /// fichier même s'il reste des destinations inutilisées.
    pub async fn upload_file(&self, package: &Package, path: &Path) -> Result<Vec<Part>> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("File not found: {} ({})", path.display(), e),
            ))
        })?;
        let size = metadata.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::configuration(format!("Not a file: {}", path.display())))?;

        info!("Uploading {} ({:.2} MB)...", file_name, size as f64 / MIB);

        let file_entry = self.api.add_file(package, &file_name, size).await?;
        let blueprint = &file_entry.create_blueprint;
        self.api
            .post_form(&blueprint.url, &blueprint.form_fields())
            .await?;

        let destinations = self.api.upload_urls(package, &file_entry.id).await?;
        let expected = chunk_count(size, self.chunk_size);
        if destinations.len() < expected {
            return Err(Error::InvalidResponse(format!(
                "{} upload URLs for {} chunks of {}",
                destinations.len(),
                expected,
                file_name
            )));
        }

        let mut file = File::open(path).await?;
        let mut parts = Vec::with_capacity(expected);

        for (index, destination) in destinations.iter().enumerate() {
            let mut chunk = Vec::with_capacity(self.chunk_size);
            (&mut file)
                .take(self.chunk_size as u64)
                .read_to_end(&mut chunk)
                .await?;
            if chunk.is_empty() {
                break;
            }

            let part_number = index as u32 + 1;
            debug!(part_number, bytes = chunk.len(), "Uploading chunk");
            let etag = self
                .api
                .put_chunk(&destination.url, &destination.headers, chunk)
                .await?;
            parts.push(Part { part_number, etag });

            info!(
                "  Progress: {:.1}%",
                parts.len() as f64 / expected.max(1) as f64 * 100.0
            );
        }

        self.api
            .finalize_file(package, &file_entry.id, &parts, size)
            .await?;
        info!("  Upload complete: {}", file_name);
        Ok(parts)
    }

    /// Finalise le package; la livraison aux destinataires se fait ensuite côté MASV
    pub async fn finalize_package(&self, package: &Package) -> Result<()> {
        info!("Finalizing and sending package...");
        self.api.finalize_package(package).await?;
        info!(package_id = %package.id, "Package sent successfully!");
        Ok(())
    }
}

#[async_trait]
impl TransferClient for HttpTransferClient {
    fn mechanism(&self) -> &'static str {
        "http"
    }

    async fn send_file(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        request.target.validate()?;
        let recipients = match &request.target {
            TransferTarget::Email { recipients } => recipients,
            TransferTarget::Portal { subdomain, .. } => {
                return Err(Error::UnsupportedTarget(format!(
                    "portal delivery ({}) requires the agent transfer mode",
                    subdomain
                )));
            }
        };

        let package = self.create_package(recipients, &request.description).await?;
        self.upload_file(&package, &request.path).await?;
        self.finalize_package(&package).await?;

        Ok(TransferReceipt {
            id: package.id,
            completion: Completion::Confirmed,
        })
    }
}

/// Builder d'un HttpTransferClient
pub struct HttpClientBuilder {
    api_key: String,
    team_id: String,
    base_url: String,
    chunk_size: usize,
    timeout: Option<Duration>,
}

impl HttpClientBuilder {
    /// URL de base de l'API (tests)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Taille des chunks de l'upload multipart
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Timeout de chaque requête HTTP; `None` pour aucune limite
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Construit le client
    pub fn build(self) -> Result<HttpTransferClient> {
        if self.chunk_size == 0 {
            return Err(Error::configuration("chunk size must be greater than zero"));
        }
        Ok(HttpTransferClient {
            api: MasvApi::new(self.api_key, self.team_id, self.base_url, self.timeout)?,
            chunk_size: self.chunk_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = HttpTransferClient::new("key", "team").unwrap();
        assert_eq!(client.chunk_size(), DEFAULT_CHUNK_SIZE);
        assert_eq!(client.api().base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_builder_rejects_zero_chunk() {
        assert!(matches!(
            HttpTransferClient::builder("key", "team").chunk_size(0).build(),
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_portal_target_is_unsupported() {
        let client = HttpTransferClient::new("key", "team").unwrap();
        let request = TransferRequest::new(
            "/tmp/mix.wav",
            TransferTarget::Portal {
                subdomain: "studio".to_string(),
                password: None,
            },
            "Pro Tools Bounce: Song",
        );
        assert!(matches!(
            client.send_file(&request).await,
            Err(Error::UnsupportedTarget(_))
        ));
    }
}
