//! Workflow complet : Pro Tools en mémoire, backend MASV simulé (mockito)

use async_trait::async_trait;
use bnsmasv::{AgentSettings, Completion, TransferMode, TransferTarget};
use bnsprotools::{
    BounceOptions, PathResolution, ProToolsClient, ProtocolProfile, PtslTransport, Request,
    Response, ResponseHeader,
};
use bnsworkflow::{BounceAndSend, Error, Settings};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Recorder {
    commands: Vec<i32>,
    closed: usize,
}

/// Transport PTSL qui rejoue des réponses par identifiant de commande
struct ScriptedTransport {
    replies: HashMap<i32, VecDeque<Response>>,
    recorder: Arc<Mutex<Recorder>>,
}

#[async_trait]
impl PtslTransport for ScriptedTransport {
    async fn send(&mut self, request: Request) -> bnsprotools::Result<Response> {
        let command = request.command();
        self.recorder.lock().unwrap().commands.push(command);
        Ok(self
            .replies
            .get_mut(&command)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| panic!("unexpected command {}", command)))
    }

    fn close(&mut self) {
        self.recorder.lock().unwrap().closed += 1;
    }
}

fn reply(status: i32, body: Value, error: &str) -> Response {
    Response {
        header: Some(ResponseHeader {
            status,
            ..Default::default()
        }),
        response_body_json: body.to_string(),
        response_error_json: error.to_string(),
    }
}

/// Pro Tools "legacy" dont la session s'appelle `Song`
fn protools(export_status: i32) -> (ProToolsClient, Arc<Mutex<Recorder>>) {
    let profile = ProtocolProfile::legacy();
    let ids = profile.commands.clone();
    let recorder = Arc::new(Mutex::new(Recorder::default()));

    let mut replies: HashMap<i32, VecDeque<Response>> = HashMap::new();
    replies
        .entry(ids.get_session_name)
        .or_default()
        .push_back(reply(1, json!({"session_name": "Song"}), ""));
    replies.entry(ids.export_mix).or_default().push_back(reply(
        export_status,
        json!({}),
        r#"{"command_error_message":"disk full"}"#,
    ));

    let client = ProToolsClient::builder()
        .profile(profile)
        .transport(Box::new(ScriptedTransport {
            replies,
            recorder: recorder.clone(),
        }))
        .build();
    (client, recorder)
}

fn settings(server: &ServerGuard, bounce_dir: &Path) -> Settings {
    Settings {
        api_key: "key-1".to_string(),
        team_id: Some("team-1".to_string()),
        mode: TransferMode::Http,
        base_url: server.url(),
        chunk_size: 8,
        http_timeout: None,
        agent: AgentSettings::new("key-1"),
        bounce_dir: bounce_dir.to_path_buf(),
        bounce_options: BounceOptions::default(),
        portal_subdomain: None,
        portal_password: None,
    }
}

fn email(address: &str) -> TransferTarget {
    TransferTarget::Email {
        recipients: vec![address.to_string()],
    }
}

#[tokio::test]
async fn test_bounce_then_send_over_http() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    // Fichier que Pro Tools aurait écrit
    std::fs::write(dir.path().join("Song.wav"), b"RIFFdataWAVE").unwrap();
    let storage = server.url();

    let create = server
        .mock("POST", "/teams/team-1/packages")
        .match_body(Matcher::Json(json!({
            "recipients": [{"email": "mix@studio.example"}],
            "description": "Pro Tools Bounce: Song"
        })))
        .with_status(201)
        .with_body(r#"{"id": "pkg-1", "token": "tok-1"}"#)
        .expect(1)
        .create_async()
        .await;
    let _add_file = server
        .mock("POST", "/packages/pkg-1/files")
        .match_body(Matcher::PartialJson(json!({"name": "Song.wav", "size": 12})))
        .with_body(
            json!({
                "id": "file-1",
                "create_blueprint": {"url": format!("{}/storage/init", storage), "fields": {}}
            })
            .to_string(),
        )
        .create_async()
        .await;
    let _init = server
        .mock("POST", "/storage/init")
        .create_async()
        .await;
    let _urls = server
        .mock("POST", "/packages/pkg-1/files/file-1")
        .with_body(
            json!({"blueprints": [
                {"url": format!("{}/storage/part1", storage)},
                {"url": format!("{}/storage/part2", storage)}
            ]})
            .to_string(),
        )
        .create_async()
        .await;
    let _part1 = server
        .mock("PUT", "/storage/part1")
        .match_body("RIFFdata")
        .with_header("ETag", "\"e1\"")
        .create_async()
        .await;
    let _part2 = server
        .mock("PUT", "/storage/part2")
        .match_body("WAVE")
        .with_header("ETag", "\"e2\"")
        .create_async()
        .await;
    let _finalize_file = server
        .mock("POST", "/packages/pkg-1/files/file-1/finalize")
        .with_body("{}")
        .create_async()
        .await;
    let finalize = server
        .mock("POST", "/packages/pkg-1/finalize")
        .match_header("x-package-token", "tok-1")
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    let (pt, recorder) = protools(1);
    let workflow = BounceAndSend::new(settings(&server, dir.path()));
    let report = workflow
        .run(pt, email("mix@studio.example"))
        .await
        .unwrap();

    assert_eq!(report.session_name, "Song");
    assert_eq!(report.file, dir.path().join("Song.wav"));
    assert_eq!(report.resolution, PathResolution::Composed);
    assert_eq!(report.transfer_id, "pkg-1");
    assert_eq!(report.mechanism, "http");
    assert_eq!(report.completion, Completion::Confirmed);

    create.assert_async().await;
    finalize.assert_async().await;
    // Connexion libérée avant l'upload
    assert_eq!(recorder.lock().unwrap().closed, 1);
}

#[tokio::test]
async fn test_bounce_failure_stops_before_transfer() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let create = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let (pt, recorder) = protools(2);
    let workflow = BounceAndSend::new(settings(&server, dir.path()));
    let err = workflow
        .run(pt, email("mix@studio.example"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::ProTools(bnsprotools::Error::Bounce { status: 2, ref payload }) if payload.contains("disk full")
    ));
    assert!(!err.is_configuration_error());
    create.assert_async().await;
    assert_eq!(recorder.lock().unwrap().closed, 1);
}

#[tokio::test]
async fn test_invalid_target_is_rejected_before_connecting() {
    let server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();

    let (pt, recorder) = protools(1);
    let workflow = BounceAndSend::new(settings(&server, dir.path()));
    let err = workflow
        .run(pt, TransferTarget::Email { recipients: vec![] })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transfer(bnsmasv::Error::InvalidTarget(_))));
    assert!(err.is_configuration_error());
    assert!(recorder.lock().unwrap().commands.is_empty());
}

#[tokio::test]
async fn test_portal_over_http_is_rejected_before_bouncing() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let create = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let (pt, recorder) = protools(1);
    let workflow = BounceAndSend::new(settings(&server, dir.path()));
    let portal = TransferTarget::Portal {
        subdomain: "studio".to_string(),
        password: None,
    };
    let err = workflow.run(pt, portal.clone()).await.unwrap_err();

    assert!(matches!(err, Error::Transfer(bnsmasv::Error::UnsupportedTarget(_))));
    assert!(err.is_configuration_error());
    assert!(recorder.lock().unwrap().commands.is_empty());
    create.assert_async().await;

    // Le même portail passe la validation en mode agent
    let mut agent_settings = settings(&server, dir.path());
    agent_settings.mode = TransferMode::Agent;
    assert!(BounceAndSend::new(agent_settings).validate(&portal).is_ok());
}

#[tokio::test]
async fn test_transfer_error_is_propagated_with_status() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Song.wav"), b"RIFF").unwrap();
    let _create = server
        .mock("POST", "/teams/team-1/packages")
        .with_status(403)
        .with_body("team suspended")
        .create_async()
        .await;

    let (pt, _) = protools(1);
    let workflow = BounceAndSend::new(settings(&server, dir.path()));
    let err = workflow
        .run(pt, email("mix@studio.example"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("team suspended"));
    match err {
        Error::Transfer(inner) => assert!(inner.is_auth_error()),
        other => panic!("expected Transfer error, got {:?}", other),
    }
}
