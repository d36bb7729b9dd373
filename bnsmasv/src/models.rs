//! Structures de données de l'API MASV

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Destinataire d'un package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
}

/// Corps de `POST /teams/{team}/packages`
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreatePackageRequest<'a> {
    pub recipients: Vec<Recipient>,
    pub description: &'a str,
}

/// Package créé : identifiant et jeton limité à ce package
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Package {
    pub id: String,
    pub token: String,
}

/// Corps de `POST /packages/{id}/files`
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AddFileRequest<'a> {
    pub name: &'a str,
    pub path: &'a str,
    pub size: u64,
}

/// Paramètres d'initialisation de l'upload multipart côté stockage
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBlueprint {
    pub url: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl CreateBlueprint {
    /// Champs du formulaire, valeurs non textuelles rendues en JSON
    pub fn form_fields(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()
    }
}

/// Fichier enregistré dans un package
#[derive(Debug, Clone, Deserialize)]
pub struct PackageFile {
    pub id: String,
    pub create_blueprint: CreateBlueprint,
}

/// Destination pré-signée d'un chunk
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkBlueprint {
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Réponse de `POST /packages/{id}/files/{file_id}`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UploadUrls {
    pub blueprints: Vec<ChunkBlueprint>,
}

/// Chunk acquitté : index 1-based et ETag renvoyé par le stockage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub part_number: u32,
    pub etag: String,
}

/// Corps de `POST /packages/{id}/files/{file_id}/finalize`
#[derive(Debug, Clone, Serialize)]
pub(crate) struct FinalizeFileRequest<'a> {
    pub parts: &'a [Part],
    pub size: u64,
}

/// Nombre de chunks nécessaires pour `size` octets
pub fn chunk_count(size: u64, chunk_size: usize) -> usize {
    if chunk_size == 0 {
        return 0;
    }
    size.div_ceil(chunk_size as u64) as usize
}
