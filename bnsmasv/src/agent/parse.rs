//! Lecture tolérante de la sortie de l'agent MASV
//!
//! Le format de sortie de l'agent n'est pas contractuel. L'extraction d'un
//! identifiant passe donc par [`IdExtractor`], avec un ordre de repli fixe :
//!
//! 1. [`JsonIdExtractor`] : la sortie entière (ou une de ses lignes) est un
//!    objet JSON portant un champ `id` (ou `upload_id`, `transfer_id`)
//! 2. [`LineScanIdExtractor`] : première ligne de la forme `... id: <token>`
//!
//! [`DefaultIdExtractor`] enchaîne les deux.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Champs JSON acceptés comme identifiant, par ordre de préférence
const ID_FIELDS: &[&str] = &["id", "upload_id", "transfer_id"];

/// Stratégie d'extraction d'un identifiant d'upload
pub trait IdExtractor: Send + Sync {
    /// Retourne l'identifiant trouvé dans `output`, ou `None`
    fn extract(&self, output: &str) -> Option<String>;
}

/// Extraction depuis une sortie JSON
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonIdExtractor;

/// Extraction par recherche ligne à ligne d'un motif `id:`
#[derive(Debug, Default, Clone, Copy)]
pub struct LineScanIdExtractor;

/// JSON d'abord, puis recherche ligne à ligne
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultIdExtractor;

fn id_from_value(value: &Value) -> Option<String> {
    let object = value.as_object()?;
    ID_FIELDS.iter().find_map(|field| match object.get(*field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

impl IdExtractor for JsonIdExtractor {
    fn extract(&self, output: &str) -> Option<String> {
        if let Ok(value) = serde_json::from_str::<Value>(output.trim()) {
            return id_from_value(&value);
        }
        output
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line.trim()).ok())
            .find_map(|value| id_from_value(&value))
    }
}

fn id_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\bid\b["']?\s*[:=]\s*["']?([A-Za-z0-9][A-Za-z0-9_\-]*)"#)
            .expect("valid id regex")
    })
}

impl IdExtractor for LineScanIdExtractor {
    fn extract(&self, output: &str) -> Option<String> {
        output.lines().find_map(|line| {
            id_line_regex()
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
    }
}

impl IdExtractor for DefaultIdExtractor {
    fn extract(&self, output: &str) -> Option<String> {
        JsonIdExtractor
            .extract(output)
            .or_else(|| LineScanIdExtractor.extract(output))
    }
}

/// Entrée de `transfers list`, telle que l'agent la décrit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferStatus {
    pub id: String,
    pub state: String,
    pub progress: Option<f64>,
}

/// État d'un transfert vu par l'agent
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransferState {
    InProgress(Option<f64>),
    Complete,
    Failed,
}

const FAILED_WORDS: &[&str] = &["error", "errored", "fail", "failed", "failure", "cancelled", "canceled"];
const COMPLETE_WORDS: &[&str] = &["complete", "completed", "done", "finished", "succeeded", "success"];
const PENDING_WORDS: &[&str] = &["uploading", "pending", "queued", "incomplete", "running"];

/// Découpe en mots : lettres, chiffres, `-` et `_` (l'alphabet des identifiants)
fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .filter(|t| !t.is_empty())
}

/// Mots d'un libellé d'état (`upload_failed` donne `upload`, `failed`)
fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_ascii_alphabetic()).filter(|w| !w.is_empty())
}

impl TransferStatus {
    /// Lit une entrée JSON. Identifiant et progression sont acceptés en
    /// nombre comme en chaîne; `state` prime sur `status`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let id = id_from_value(value)?;
        let state = ["state", "status"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();
        let progress = match object.get("progress") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().trim_end_matches('%').trim().parse().ok(),
            _ => None,
        };
        Some(Self { id, state, progress })
    }

    pub fn classify(&self) -> TransferState {
        let state = self.state.to_ascii_lowercase();
        let has = |known: &[&str]| words(&state).any(|w| known.contains(&w));
        if has(FAILED_WORDS) {
            TransferState::Failed
        } else if has(COMPLETE_WORDS) {
            TransferState::Complete
        } else {
            TransferState::InProgress(self.progress)
        }
    }
}

/// Cherche le transfert `id` dans la sortie de `transfers list`.
///
/// Accepte un tableau JSON, un objet `{"transfers": [...]}` ou, à défaut,
/// une ligne de texte où l'identifiant apparaît comme mot entier. `None` si
/// la sortie est illisible ou si le transfert n'y figure pas encore.
pub fn find_transfer(output: &str, id: &str) -> Option<TransferStatus> {
    if let Ok(value) = serde_json::from_str::<Value>(output.trim()) {
        let entries = match &value {
            Value::Array(items) => items.as_slice(),
            Value::Object(map) => match map.get("transfers").or_else(|| map.get("uploads")) {
                Some(Value::Array(items)) => items.as_slice(),
                _ => std::slice::from_ref(&value),
            },
            _ => return None,
        };
        return entries
            .iter()
            .filter_map(TransferStatus::from_value)
            .find(|status| status.id == id);
    }

    let line = output.lines().find(|line| tokens(line).any(|t| t == id))?;
    let lower = line.to_ascii_lowercase();
    let state = words(&lower)
        .find(|t| {
            FAILED_WORDS.contains(t) || COMPLETE_WORDS.contains(t) || PENDING_WORDS.contains(t)
        })
        .unwrap_or_default()
        .to_string();
    Some(TransferStatus {
        id: id.to_string(),
        state,
        progress: percentage(line),
    })
}

fn percentage(line: &str) -> Option<f64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("valid percent regex"));
    re.captures(line)?.get(1)?.as_str().parse().ok()
}

/// Vrai si l'erreur de l'agent signifie que l'upload a déjà été finalisé
pub fn is_already_finalized(output: &str) -> bool {
    let lower = output.to_ascii_lowercase();
    lower.contains("not found") || lower.contains("no rows")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_output() {
        assert_eq!(
            DefaultIdExtractor.extract(r#"{"id": "abc123"}"#),
            Some("abc123".to_string())
        );
        assert_eq!(
            JsonIdExtractor.extract("starting upload\n{\"upload_id\": \"u-9\"}\n"),
            Some("u-9".to_string())
        );
    }

    #[test]
    fn test_line_output() {
        let output = "Uploading mix.wav\nUpload ID: xyz789\nStatus: pending\n";
        assert_eq!(DefaultIdExtractor.extract(output), Some("xyz789".to_string()));
        assert_eq!(JsonIdExtractor.extract(output), None);
        assert_eq!(LineScanIdExtractor.extract("Valid: yes"), None);
        assert_eq!(
            LineScanIdExtractor.extract("id=tr_01-AB"),
            Some("tr_01-AB".to_string())
        );
    }

    #[test]
    fn test_no_id() {
        assert_eq!(DefaultIdExtractor.extract("Upload started\nAll good\n"), None);
        assert_eq!(DefaultIdExtractor.extract(r#"{"status": "ok"}"#), None);
        assert_eq!(DefaultIdExtractor.extract(""), None);
    }

    #[test]
    fn test_find_transfer_json() {
        let output = r#"[{"id": "a", "state": "uploading", "progress": 40.0},
                         {"id": "b", "status": "complete"}]"#;
        let a = find_transfer(output, "a").unwrap();
        assert_eq!(a.classify(), TransferState::InProgress(Some(40.0)));
        assert_eq!(find_transfer(output, "b").unwrap().classify(), TransferState::Complete);
        assert!(find_transfer(output, "c").is_none());

        let wrapped = r#"{"transfers": [{"id": "a", "state": "error"}]}"#;
        assert_eq!(find_transfer(wrapped, "a").unwrap().classify(), TransferState::Failed);
    }

    #[test]
    fn test_find_transfer_text() {
        let output = "ID       STATE      PROGRESS\nabc123   uploading  42.5%\n";
        let status = find_transfer(output, "abc123").unwrap();
        assert_eq!(status.classify(), TransferState::InProgress(Some(42.5)));

        let failed = find_transfer("abc123 FAILED\n", "abc123").unwrap();
        assert_eq!(failed.classify(), TransferState::Failed);
        assert!(find_transfer("garbage", "abc123").is_none());
    }

    #[test]
    fn test_numeric_ids_and_loose_fields() {
        let id = DefaultIdExtractor.extract(r#"{"id": 123}"#).unwrap();
        assert_eq!(id, "123");

        let failed = find_transfer(r#"[{"id": 123, "state": "failed"}]"#, &id).unwrap();
        assert_eq!(failed.classify(), TransferState::Failed);

        let output = r#"[{"id": "x", "state": "uploading", "status": "active", "progress": "12.5%"}]"#;
        let status = find_transfer(output, "x").unwrap();
        assert_eq!(status.state, "uploading");
        assert_eq!(status.classify(), TransferState::InProgress(Some(12.5)));
    }

    #[test]
    fn test_states_match_whole_words() {
        let status = |state: &str| TransferStatus {
            id: "a".to_string(),
            state: state.to_string(),
            progress: None,
        };
        assert_eq!(status("incomplete").classify(), TransferState::InProgress(None));
        assert_eq!(status("Completed").classify(), TransferState::Complete);
        assert_eq!(status("upload_failed").classify(), TransferState::Failed);
        assert_eq!(status("Upload Complete").classify(), TransferState::Complete);

        let text = "123   complete\n12    incomplete  40%\n";
        assert_eq!(find_transfer(text, "12").unwrap().classify(), TransferState::InProgress(Some(40.0)));
        assert_eq!(find_transfer(text, "123").unwrap().classify(), TransferState::Complete);
        assert!(find_transfer(text, "1").is_none());
    }

    #[test]
    fn test_already_finalized() {
        assert!(is_already_finalized("Error: upload not found"));
        assert!(is_already_finalized("sql: no rows in result set"));
        assert!(!is_already_finalized("permission denied"));
    }
}
