//! Endpoints des packages MASV (création, fichiers, finalisation)

use super::MasvApi;
use crate::error::Result;
use crate::models::{
    AddFileRequest, ChunkBlueprint, CreatePackageRequest, FinalizeFileRequest, Package,
    PackageFile, Part, Recipient, UploadUrls,
};
use serde_json::Value;
use tracing::debug;

impl MasvApi {
    /// `POST /teams/{team}/packages`
    pub async fn create_package(&self, recipients: &[String], description: &str) -> Result<Package> {
        let body = CreatePackageRequest {
            recipients: recipients
                .iter()
                .map(|email| Recipient {
                    email: email.clone(),
                })
                .collect(),
            description,
        };
        let endpoint = format!("/teams/{}/packages", self.team_id);
        self.post(&endpoint, Some(&body), None).await
    }

    /// `POST /packages/{id}/files` : déclare le fichier et obtient son blueprint
    pub async fn add_file(
        &self,
        package: &Package,
        name: &str,
        size: u64,
    ) -> Result<PackageFile> {
        let body = AddFileRequest {
            name,
            path: name,
            size,
        };
        let endpoint = format!("/packages/{}/files", package.id);
        self.post(&endpoint, Some(&body), Some(&package.token)).await
    }

    /// `POST /packages/{id}/files/{file_id}` : destinations des chunks, dans l'ordre
    pub async fn upload_urls(
        &self,
        package: &Package,
        file_id: &str,
    ) -> Result<Vec<ChunkBlueprint>> {
        let endpoint = format!("/packages/{}/files/{}", package.id, file_id);
        let urls: UploadUrls = self
            .post::<Value, _>(&endpoint, None, Some(&package.token))
            .await?;
        debug!(file_id, count = urls.blueprints.len(), "Received chunk upload URLs");
        Ok(urls.blueprints)
    }

    /// `POST /packages/{id}/files/{file_id}/finalize`
    pub async fn finalize_file(
        &self,
        package: &Package,
        file_id: &str,
        parts: &[Part],
        size: u64,
    ) -> Result<()> {
        let body = FinalizeFileRequest { parts, size };
        let endpoint = format!("/packages/{}/files/{}/finalize", package.id, file_id);
        let _: Value = self.post(&endpoint, Some(&body), Some(&package.token)).await?;
        Ok(())
    }

    /// `POST /packages/{id}/finalize` : déclenche l'envoi aux destinataires
    pub async fn finalize_package(&self, package: &Package) -> Result<Value> {
        let endpoint = format!("/packages/{}/finalize", package.id);
        self.post::<Value, _>(&endpoint, None, Some(&package.token))
            .await
    }
}
