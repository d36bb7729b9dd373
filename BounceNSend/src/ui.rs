//! Interface opérateur : invite texte ou boîtes de dialogue

use bnsmasv::TransferTarget;
use bnsworkflow::WorkflowReport;
use dialog::DialogBox;
use std::io::{self, BufRead, Write};
use tracing::warn;

const TITLE: &str = "Bounce and Send";
const RULE: &str = "============================================================";

/// Découpe une liste d'adresses séparées par des virgules
pub fn parse_recipients(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Cli,
    Dialog,
}

impl Surface {
    pub fn new(cli: bool) -> Self {
        if cli { Self::Cli } else { Self::Dialog }
    }

    /// Demande les destinataires. Liste vide si l'opérateur annule.
    pub fn ask_recipients(&self) -> Vec<String> {
        match self {
            Self::Cli => prompt_recipients(),
            Self::Dialog => {
                match dialog::Input::new("Enter recipient email addresses\n(comma-separated):")
                    .title(TITLE)
                    .show()
                {
                    Ok(answer) => parse_recipients(answer.as_deref().unwrap_or_default()),
                    Err(e) => {
                        warn!("Dialog unavailable ({}), falling back to text prompt", e);
                        prompt_recipients()
                    }
                }
            }
        }
    }

    pub fn cancelled(&self) {
        match self {
            Self::Cli => println!("No recipients provided. Exiting."),
            Self::Dialog => show("Cancelled", "No recipients provided."),
        }
    }

    pub fn success(&self, report: &WorkflowReport) {
        match self {
            Self::Cli => {
                println!("\n{}", RULE);
                println!("✓ SUCCESS!");
                println!("{}", report);
                println!("{}", RULE);
            }
            Self::Dialog => {
                let file = report
                    .file
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| report.file.display().to_string());
                let target = match &report.target {
                    TransferTarget::Email { recipients } => {
                        format!("Recipients: {}", recipients.join(", "))
                    }
                    TransferTarget::Portal { subdomain, .. } => format!("Portal: {}", subdomain),
                };
                let text = format!(
                    "Bounce sent successfully!\n\nFile: {}\nPackage ID: {}\n{}",
                    file, report.transfer_id, target
                );
                show("Success!", &text);
            }
        }
    }

    pub fn failure(&self, error: &anyhow::Error) {
        match self {
            Self::Cli => println!("\n✗ ERROR: {:#}", error),
            Self::Dialog => show(
                "Error",
                &format!("Failed to bounce and send:\n\n{:#}", error),
            ),
        }
    }
}

fn show(title: &str, text: &str) {
    if let Err(e) = dialog::Message::new(text).title(title).show() {
        warn!("Dialog unavailable ({}), printing instead", e);
        println!("{}: {}", title, text);
    }
}

fn prompt_recipients() -> Vec<String> {
    println!("Pro Tools Bounce and Send to MASV");
    println!("----------------------------------------");
    print!("\nEnter recipient email addresses (comma-separated): ");
    let _ = io::stdout().flush();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(_) => parse_recipients(&line),
        Err(e) => {
            warn!("Could not read recipients: {}", e);
            Vec::new()
        }
    }
}
