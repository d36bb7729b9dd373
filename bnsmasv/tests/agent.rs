//! Tests du mécanisme agent avec un faux agent (script shell)
#![cfg(unix)]

use bnsmasv::{
    AgentSettings, AgentTransferClient, Completion, Error, TransferClient, TransferRequest,
    TransferTarget,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Faux agent : `$DIR` désigne le répertoire de test, chaque appel est
/// journalisé dans `$DIR/calls.log`.
struct FakeAgent {
    dir: TempDir,
    bounce: PathBuf,
}

impl FakeAgent {
    fn new(handlers: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let script = format!(
            "DIR='{dir}'\necho \"$@\" >> \"$DIR/calls.log\"\n\
             if [ \"$MASV_API_KEY\" != \"key-1\" ]; then echo 'missing api key' >&2; exit 9; fi\n\
             case \"$1 $2\" in\n{handlers}\nesac\n",
            dir = dir.path().display(),
            handlers = handlers
        );
        std::fs::write(dir.path().join("fake-masv.sh"), script).unwrap();

        let bounce = dir.path().join("Song.wav");
        std::fs::write(&bounce, b"RIFF....WAVE").unwrap();
        Self { dir, bounce }
    }

    fn settings(&self) -> AgentSettings {
        let mut settings = AgentSettings::new("key-1");
        settings.command = vec![
            "sh".to_string(),
            self.dir.path().join("fake-masv.sh").display().to_string(),
        ];
        settings.sender_email = Some("mix@studio.example".to_string());
        settings.startup_grace = Duration::from_millis(300);
        settings.poll_interval = Duration::from_millis(10);
        settings.poll_attempts = 3;
        settings
    }

    fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn email_request(&self) -> TransferRequest {
        TransferRequest::new(
            &self.bounce,
            TransferTarget::Email {
                recipients: vec!["a@example.com".to_string(), "b@example.com".to_string()],
            },
            "Pro Tools Bounce: Song",
        )
    }
}

const HELP: &str = "\"--help \") echo 'Usage: masv <command> [flags]' ;;";
const SERVER_OK: &str = "\"server status\") exit 0 ;;";
const FINALIZE_NOT_FOUND: &str =
    "\"upload finalize\") echo 'Error: upload not found' >&2; exit 1 ;;";

fn handlers(extra: &[&str]) -> String {
    let mut all = vec![HELP];
    all.extend_from_slice(extra);
    all.join("\n")
}

#[tokio::test]
async fn test_missing_agent_is_unavailable() {
    let mut settings = AgentSettings::new("key-1");
    settings.command = vec!["/nonexistent/bin/masv".to_string()];

    let err = AgentTransferClient::new(settings).await.unwrap_err();
    assert!(matches!(err, Error::AgentUnavailable(_)));
    assert!(err.to_string().contains("Install"));
}

#[tokio::test]
async fn test_agent_without_usage_banner_is_unavailable() {
    let agent = FakeAgent::new("\"--help \") echo 'hello' ;;");
    let err = AgentTransferClient::new(agent.settings()).await.unwrap_err();
    assert!(matches!(err, Error::AgentUnavailable(_)));
}

#[tokio::test]
async fn test_send_without_target_is_rejected() {
    assert!(matches!(
        TransferTarget::from_options(None, None, None),
        Err(Error::InvalidTarget(_))
    ));

    let agent = FakeAgent::new(&handlers(&[SERVER_OK]));
    let client = AgentTransferClient::new(agent.settings()).await.unwrap();
    let request = TransferRequest::new(
        &agent.bounce,
        TransferTarget::Email { recipients: vec![] },
        "x",
    );

    assert!(matches!(
        client.send_file(&request).await,
        Err(Error::InvalidTarget(_))
    ));
    // Aucun upload lancé
    assert!(!agent.calls().iter().any(|c| c.starts_with("upload")));
}

#[tokio::test]
async fn test_email_transfer_with_line_output() {
    let agent = FakeAgent::new(&handlers(&[
        SERVER_OK,
        "\"upload email\") echo 'Uploading Song.wav'; echo 'Upload ID: xyz789' ;;",
        "\"transfers list\") echo '[{\"id\": \"xyz789\", \"state\": \"complete\"}]' ;;",
        FINALIZE_NOT_FOUND,
    ]));
    let client = AgentTransferClient::new(agent.settings()).await.unwrap();

    let receipt = client.send_file(&agent.email_request()).await.unwrap();
    assert_eq!(receipt.id, "xyz789");
    assert_eq!(receipt.completion, Completion::Confirmed);

    let calls = agent.calls();
    let upload = calls.iter().find(|c| c.starts_with("upload email")).unwrap();
    assert!(upload.contains("--recipients a@example.com,b@example.com"));
    assert!(upload.contains("--description Pro Tools Bounce: Song"));
    assert!(calls.iter().any(|c| c == "upload finalize --id xyz789"));
    assert!(!calls.iter().any(|c| c == "server start"));
}

#[tokio::test]
async fn test_json_output_and_progress_polling() {
    let agent = FakeAgent::new(&handlers(&[
        SERVER_OK,
        "\"upload email\") echo '{\"id\": \"abc123\"}' ;;",
        "\"transfers list\") n=$(cat \"$DIR/count\" 2>/dev/null || echo 0); n=$((n+1)); echo $n > \"$DIR/count\"; \
         if [ $n -lt 2 ]; then echo '[{\"id\": \"abc123\", \"state\": \"uploading\", \"progress\": 50}]'; \
         else echo '[{\"id\": \"abc123\", \"state\": \"complete\"}]'; fi ;;",
        "\"upload finalize\") exit 0 ;;",
    ]));
    let client = AgentTransferClient::new(agent.settings()).await.unwrap();

    let receipt = client.send_file(&agent.email_request()).await.unwrap();
    assert_eq!(receipt.id, "abc123");
    assert_eq!(receipt.completion, Completion::Confirmed);
    assert_eq!(
        agent.calls().iter().filter(|c| *c == "transfers list").count(),
        2
    );
}

#[tokio::test]
async fn test_polling_cap_assumes_success() {
    let agent = FakeAgent::new(&handlers(&[
        SERVER_OK,
        "\"upload email\") echo 'id: late-1' ;;",
        "\"transfers list\") echo 'not json at all' ;;",
        FINALIZE_NOT_FOUND,
    ]));
    let client = AgentTransferClient::new(agent.settings()).await.unwrap();

    let receipt = client.send_file(&agent.email_request()).await.unwrap();
    assert_eq!(receipt.completion, Completion::Assumed);
    assert_eq!(
        agent.calls().iter().filter(|c| *c == "transfers list").count(),
        3
    );
}

#[tokio::test]
async fn test_failed_transfer_is_fatal() {
    let agent = FakeAgent::new(&handlers(&[
        SERVER_OK,
        "\"upload email\") echo 'Upload ID: bad-1' ;;",
        "\"transfers list\") echo '[{\"id\": \"bad-1\", \"state\": \"error\"}]' ;;",
    ]));
    let client = AgentTransferClient::new(agent.settings()).await.unwrap();

    let err = client.send_file(&agent.email_request()).await.unwrap_err();
    assert!(matches!(err, Error::UploadFailed { ref id, .. } if id == "bad-1"));
    assert!(!agent.calls().iter().any(|c| c.starts_with("upload finalize")));
}

#[tokio::test]
async fn test_failed_transfer_with_numeric_id_is_fatal() {
    let agent = FakeAgent::new(&handlers(&[
        SERVER_OK,
        "\"upload email\") echo '{\"id\": 123}' ;;",
        "\"transfers list\") echo '[{\"id\": 1234, \"state\": \"complete\"}, \
         {\"id\": 123, \"state\": \"failed\", \"progress\": \"80%\"}]' ;;",
        "\"upload finalize\") exit 0 ;;",
    ]));
    let client = AgentTransferClient::new(agent.settings()).await.unwrap();

    let err = client.send_file(&agent.email_request()).await.unwrap_err();
    assert!(matches!(err, Error::UploadFailed { ref id, .. } if id == "123"));
    assert_eq!(
        agent.calls().iter().filter(|c| *c == "transfers list").count(),
        1
    );
    assert!(!agent.calls().iter().any(|c| c.starts_with("upload finalize")));
}

#[tokio::test]
async fn test_output_without_id_is_extraction_error() {
    let agent = FakeAgent::new(&handlers(&[
        SERVER_OK,
        "\"upload email\") echo 'Upload started, check the app' ;;",
    ]));
    let client = AgentTransferClient::new(agent.settings()).await.unwrap();

    let err = client.send_file(&agent.email_request()).await.unwrap_err();
    assert!(matches!(err, Error::Extraction(_)));
}

#[tokio::test]
async fn test_finalize_failure_other_than_not_found_is_fatal() {
    let agent = FakeAgent::new(&handlers(&[
        "\"upload finalize\") echo 'permission denied' >&2; exit 1 ;;",
    ]));
    let client = AgentTransferClient::new(agent.settings()).await.unwrap();

    let err = client.finalize("xyz789").await.unwrap_err();
    assert!(matches!(err, Error::Agent { .. }));
    assert!(err.to_string().contains("permission denied"));
}

#[tokio::test]
async fn test_server_started_when_not_running() {
    let agent = FakeAgent::new(&handlers(&[
        "\"server start\") touch \"$DIR/started\" ;;",
        "\"server status\") [ -f \"$DIR/started\" ] ;;",
    ]));
    let client = AgentTransferClient::new(agent.settings()).await.unwrap();

    assert_eq!(client.ensure_server().await, Completion::Confirmed);
    assert!(agent.path().join("started").exists());

    // Vérification faite une seule fois par client
    let before = agent.calls().len();
    assert_eq!(client.ensure_server().await, Completion::Confirmed);
    assert_eq!(agent.calls().len(), before);
}

#[tokio::test]
async fn test_unconfirmed_server_start_is_assumed() {
    let agent = FakeAgent::new(&handlers(&["\"server status\") exit 1 ;;"]));
    let client = AgentTransferClient::new(agent.settings()).await.unwrap();

    assert_eq!(client.ensure_server().await, Completion::Assumed);
}

#[tokio::test]
async fn test_portal_arguments() {
    let agent = FakeAgent::new(HELP);
    let client = AgentTransferClient::new(agent.settings()).await.unwrap();

    let target = TransferTarget::from_options(None, Some("studio"), Some("s3cret")).unwrap();
    let request = TransferRequest::new("/tmp/Song.wav", target, "Pro Tools Bounce: Song")
        .with_name("Song");
    let args = client.upload_args(&request).unwrap();

    assert_eq!(
        args,
        vec![
            "upload", "portal", "--file", "/tmp/Song.wav", "--subdomain", "studio", "--sender",
            "mix@studio.example", "--password", "s3cret", "--description",
            "Pro Tools Bounce: Song", "--name", "Song",
        ]
    );

    let mut settings = agent.settings();
    settings.sender_email = None;
    let anonymous = AgentTransferClient::new(settings).await.unwrap();
    assert!(matches!(
        anonymous.upload_args(&request),
        Err(Error::Configuration(_))
    ));
}
