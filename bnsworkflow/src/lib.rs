//! # bnsworkflow - Bounce puis envoi
//!
//! Enchaîne le bounce de la session Pro Tools ouverte et la livraison du
//! fichier obtenu via MASV :
//!
//! 1. [`Settings::from_config`] valide les identifiants avant tout appel
//!    distant
//! 2. [`BounceAndSend::run`] ouvre la connexion Pro Tools, bounce, libère
//!    la connexion puis transfère avec le mécanisme configuré
//!
//! ```rust,no_run
//! use bnsconfig::get_config;
//! use bnsmasv::TransferTarget;
//! use bnsprotools::ProToolsConfigExt;
//! use bnsworkflow::{BounceAndSend, Settings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = get_config();
//!     let workflow = BounceAndSend::new(Settings::from_config(&config)?);
//!     let target = TransferTarget::Email {
//!         recipients: vec!["mix@studio.example".to_string()],
//!     };
//!
//!     let report = workflow.run(config.protools_client()?, target).await?;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod settings;
pub mod workflow;

pub use error::{Error, Result};
pub use settings::Settings;
pub use workflow::{package_description, BounceAndSend, WorkflowReport, DEFAULT_SESSION_NAME};
