//! Couche d'accès à l'API REST MASV
//!
//! Ce module fournit une interface bas-niveau : en-têtes d'authentification,
//! envoi des requêtes et conversion des réponses en erreur. Les endpoints
//! eux-mêmes sont dans [`packages`].

pub mod packages;

use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, ETAG};
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// URL de base de l'API MASV
pub const DEFAULT_BASE_URL: &str = "https://api.massive.app/v1";

const API_KEY_HEADER: &str = "X-API-KEY";
const PACKAGE_TOKEN_HEADER: &str = "X-Package-Token";

/// Client API bas-niveau pour communiquer avec MASV
#[derive(Debug, Clone)]
pub struct MasvApi {
    /// Client HTTP
    client: Client,
    /// URL de base, sans `/` final
    base_url: String,
    /// Clé API du compte
    api_key: String,
    /// Équipe propriétaire des packages
    team_id: String,
}

impl MasvApi {
    /// Crée une nouvelle instance de l'API
    ///
    /// `timeout` borne chaque requête; `None` garde le comportement par
    /// défaut de reqwest (aucune limite).
    pub fn new(
        api_key: impl Into<String>,
        team_id: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = Client::builder().user_agent(concat!("BounceNSend/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            team_id: team_id.into(),
        })
    }

    /// Retourne l'URL de base
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Retourne l'identifiant d'équipe
    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    /// Requête POST JSON authentifiée sur un endpoint de l'API
    pub(crate) async fn post<B, T>(
        &self,
        endpoint: &str,
        body: Option<&B>,
        package_token: Option<&str>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("POST {}", url);

        let mut request = self.authenticated(self.client.post(&url), package_token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = Self::check(request.send().await?).await?;
        let text = response.text().await?;
        // Certains endpoints de finalisation répondent sans corps
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| {
            warn!("Failed to parse response: {}", e);
            Error::Json(e)
        })
    }

    /// Soumet le formulaire d'initialisation au stockage objet (URL absolue)
    pub(crate) async fn post_form(&self, url: &str, fields: &[(String, String)]) -> Result<()> {
        debug!("POST {} ({} form fields)", url, fields.len());
        let response = self.client.post(url).form(fields).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Envoie un chunk vers une URL pré-signée et retourne son ETag sans guillemets
    pub(crate) async fn put_chunk(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        chunk: Vec<u8>,
    ) -> Result<String> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::InvalidResponse(format!("bad header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::InvalidResponse(format!("bad header value: {}", e)))?;
            header_map.insert(name, value);
        }

        let response = self
            .client
            .put(url)
            .headers(header_map)
            .body(chunk)
            .send()
            .await?;
        let response = Self::check(response).await?;

        response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|etag| etag.trim().trim_matches('"').to_string())
            .ok_or_else(|| Error::InvalidResponse(format!("no ETag returned by {}", url)))
    }

    fn authenticated(&self, request: RequestBuilder, package_token: Option<&str>) -> RequestBuilder {
        let request = request
            .header(API_KEY_HEADER, &self.api_key)
            .header(CONTENT_TYPE, "application/json");
        match package_token {
            Some(token) => request.header(PACKAGE_TOKEN_HEADER, token),
            None => request,
        }
    }

    /// Convertit tout status >= 400 en [`Error::Api`]
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        debug!("Response status: {}", status);

        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            warn!("MASV API error ({}): {}", status.as_u16(), body);
            return Err(Error::from_status_code(status.as_u16(), body));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_creation_trims_base_url() {
        let api = MasvApi::new("key", "team", "https://api.example/v1/", None).unwrap();
        assert_eq!(api.base_url(), "https://api.example/v1");
        assert_eq!(api.team_id(), "team");
    }
}
