//! # bnsmasv - Client de transfert MASV
//!
//! Cette crate livre un fichier local à des destinataires (ou à un portail)
//! via MASV, selon deux mécanismes interchangeables derrière le trait
//! [`TransferClient`] :
//!
//! - [`HttpTransferClient`] : appels REST directs et upload multipart
//!   séquentiel vers le stockage objet (chunks de 5 MiB)
//! - [`AgentTransferClient`] : délégation à l'agent MASV installé
//!   localement, avec suivi de progression par interrogation
//!
//! Le mécanisme est choisi par `masv.mode` ([`TransferMode`]).
//!
//! ## Structure des modules
//!
//! ```text
//! bnsmasv/
//! ├── src/
//! │   ├── lib.rs          # Module principal (ce fichier)
//! │   ├── transfer.rs     # Trait TransferClient, cibles, reçus, Completion
//! │   ├── http.rs         # Mécanisme HTTP direct
//! │   ├── api/
//! │   │   ├── mod.rs      # Client REST bas-niveau
//! │   │   └── packages.rs # Endpoints packages/fichiers
//! │   ├── agent/
//! │   │   ├── mod.rs      # Mécanisme agent
//! │   │   └── parse.rs    # Extraction tolérante des identifiants
//! │   ├── models.rs       # Structures de l'API
//! │   ├── config_ext.rs   # Extension bnsconfig
//! │   └── error.rs        # Gestion des erreurs
//! ```
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use bnsmasv::{HttpTransferClient, TransferClient, TransferRequest, TransferTarget};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = HttpTransferClient::new("api-key", "team-id")?;
//!     let target = TransferTarget::Email {
//!         recipients: vec!["mix@studio.example".to_string()],
//!     };
//!     let request = TransferRequest::new("/tmp/Song.wav", target, "Pro Tools Bounce: Song");
//!
//!     let receipt = client.send_file(&request).await?;
//!     println!("Package {} sent", receipt.id);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod api;
pub mod config_ext;
pub mod error;
pub mod http;
pub mod models;
pub mod transfer;

pub use agent::parse::{DefaultIdExtractor, IdExtractor, JsonIdExtractor, LineScanIdExtractor};
pub use agent::{AgentSettings, AgentTimeouts, AgentTransferClient};
pub use api::MasvApi;
pub use config_ext::MasvConfigExt;
pub use error::{Error, Result};
pub use http::{HttpClientBuilder, HttpTransferClient, DEFAULT_CHUNK_SIZE};
pub use models::{Package, Part};
pub use transfer::{
    Completion, TransferClient, TransferMode, TransferReceipt, TransferRequest, TransferTarget,
};
