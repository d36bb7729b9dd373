//! Tests du mécanisme HTTP contre un backend MASV simulé (mockito)

use bnsmasv::{
    Completion, Error, HttpTransferClient, Package, TransferClient, TransferRequest,
    TransferTarget,
};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::path::PathBuf;

const MIB: usize = 1024 * 1024;

fn client(server: &ServerGuard, chunk_size: usize) -> HttpTransferClient {
    HttpTransferClient::builder("key-1", "team-1")
        .base_url(server.url())
        .chunk_size(chunk_size)
        .build()
        .unwrap()
}

/// Écrit un fichier fait de chunks remplis de 'a', 'b', 'c', ...
fn write_file(dir: &tempfile::TempDir, name: &str, sizes: &[usize]) -> (PathBuf, Vec<String>) {
    let chunks: Vec<String> = sizes
        .iter()
        .enumerate()
        .map(|(i, size)| ((b'a' + i as u8) as char).to_string().repeat(*size))
        .collect();
    let path = dir.path().join(name);
    std::fs::write(&path, chunks.concat()).unwrap();
    (path, chunks)
}

fn package() -> Package {
    Package {
        id: "pkg-1".to_string(),
        token: "tok-1".to_string(),
    }
}

/// Mocks communs : déclaration du fichier, init du blueprint, URLs des chunks
async fn mock_file_registration(
    server: &mut ServerGuard,
    name: &str,
    size: usize,
    destinations: usize,
) -> Vec<mockito::Mock> {
    let storage = server.url();
    let blueprints: Vec<_> = (1..=destinations)
        .map(|n| json!({"url": format!("{}/storage/part{}", storage, n), "headers": {"x-amz-acl": "private"}}))
        .collect();

    vec![
        server
            .mock("POST", "/packages/pkg-1/files")
            .match_header("x-api-key", "key-1")
            .match_header("x-package-token", "tok-1")
            .match_body(Matcher::Json(json!({"name": name, "path": name, "size": size})))
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": "file-1",
                    "create_blueprint": {
                        "url": format!("{}/storage/init", storage),
                        "fields": {"key": format!("uploads/{}", name)}
                    }
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await,
        server
            .mock("POST", "/storage/init")
            .match_body(Matcher::UrlEncoded("key".into(), format!("uploads/{}", name)))
            .with_status(200)
            .expect(1)
            .create_async()
            .await,
        server
            .mock("POST", "/packages/pkg-1/files/file-1")
            .match_header("x-package-token", "tok-1")
            .with_header("content-type", "application/json")
            .with_body(json!({ "blueprints": blueprints }).to_string())
            .expect(1)
            .create_async()
            .await,
    ]
}

async fn mock_chunk(server: &mut ServerGuard, n: usize, body: &str) -> mockito::Mock {
    server
        .mock("PUT", format!("/storage/part{}", n).as_str())
        .match_header("x-amz-acl", "private")
        .match_body(Matcher::Exact(body.to_string()))
        .with_header("ETag", &format!("\"etag-{}\"", n))
        .expect(1)
        .create_async()
        .await
}

#[tokio::test]
async fn test_send_file_twelve_mib_in_three_chunks() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let (path, chunks) = write_file(&dir, "Song.wav", &[5 * MIB, 5 * MIB, 2 * MIB]);
    let size = 12 * MIB;

    let create = server
        .mock("POST", "/teams/team-1/packages")
        .match_header("x-api-key", "key-1")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({
            "recipients": [{"email": "mix@studio.example"}],
            "description": "Pro Tools Bounce: Song"
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "pkg-1", "token": "tok-1"}"#)
        .expect(1)
        .create_async()
        .await;

    let registration = mock_file_registration(&mut server, "Song.wav", size, 4).await;

    let mut puts = Vec::new();
    for (i, chunk) in chunks.iter().enumerate() {
        puts.push(mock_chunk(&mut server, i + 1, chunk).await);
    }
    let unused = server
        .mock("PUT", "/storage/part4")
        .expect(0)
        .create_async()
        .await;

    let finalize_file = server
        .mock("POST", "/packages/pkg-1/files/file-1/finalize")
        .match_header("x-package-token", "tok-1")
        .match_body(Matcher::Json(json!({
            "parts": [
                {"part_number": 1, "etag": "etag-1"},
                {"part_number": 2, "etag": "etag-2"},
                {"part_number": 3, "etag": "etag-3"}
            ],
            "size": size
        })))
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    let finalize_package = server
        .mock("POST", "/packages/pkg-1/finalize")
        .match_header("x-package-token", "tok-1")
        .with_body(r#"{"status": "sent"}"#)
        .expect(1)
        .create_async()
        .await;

    let request = TransferRequest::new(
        &path,
        TransferTarget::Email {
            recipients: vec!["mix@studio.example".to_string()],
        },
        "Pro Tools Bounce: Song",
    );
    let receipt = client(&server, 5 * MIB).send_file(&request).await.unwrap();

    assert_eq!(receipt.id, "pkg-1");
    assert_eq!(receipt.completion, Completion::Confirmed);

    create.assert_async().await;
    for mock in registration.iter().chain(puts.iter()) {
        mock.assert_async().await;
    }
    unused.assert_async().await;
    finalize_file.assert_async().await;
    finalize_package.assert_async().await;
}

#[tokio::test]
async fn test_chunk_count_matches_ceil_of_size() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    // 10 octets, chunks de 4 : 3 appels (4, 4, 2)
    let (path, chunks) = write_file(&dir, "take.wav", &[4, 4, 2]);

    let _registration = mock_file_registration(&mut server, "take.wav", 10, 3).await;
    let mut _puts = Vec::new();
    for (i, chunk) in chunks.iter().enumerate() {
        _puts.push(mock_chunk(&mut server, i + 1, chunk).await);
    }
    let _finalize = server
        .mock("POST", "/packages/pkg-1/files/file-1/finalize")
        .with_body("{}")
        .create_async()
        .await;

    let parts = client(&server, 4)
        .upload_file(&package(), &path)
        .await
        .unwrap();

    assert_eq!(parts.len(), 3);
    let numbers: Vec<u32> = parts.iter().map(|p| p.part_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(parts[2].etag, "etag-3");
}

#[tokio::test]
async fn test_upload_with_unknown_package_is_rejected() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = write_file(&dir, "Song.wav", &[16]);

    let rejected = server
        .mock("POST", Matcher::Regex(r"^/packages/.+".to_string()))
        .with_status(404)
        .with_body(r#"{"message": "package not found"}"#)
        .expect(1)
        .create_async()
        .await;

    let bogus = Package {
        id: "never-created".to_string(),
        token: "forged".to_string(),
    };
    let err = client(&server, 4)
        .upload_file(&bogus, &path)
        .await
        .unwrap_err();

    match err {
        Error::Api { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("package not found"));
        }
        other => panic!("expected Api error, got {:?}", other),
    }
    rejected.assert_async().await;
}

#[tokio::test]
async fn test_create_package_error_carries_status_and_body() {
    let mut server = Server::new_async().await;
    let _create = server
        .mock("POST", "/teams/team-1/packages")
        .with_status(401)
        .with_body("invalid api key")
        .create_async()
        .await;

    let err = client(&server, 4)
        .create_package(&["mix@studio.example".to_string()], "x")
        .await
        .unwrap_err();

    assert!(err.is_auth_error());
    assert!(matches!(err, Error::Api { status: 401, ref body } if body == "invalid api key"));
}

#[tokio::test]
async fn test_failed_chunk_aborts_without_finalize() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let (path, chunks) = write_file(&dir, "take.wav", &[4, 4]);

    let _registration = mock_file_registration(&mut server, "take.wav", 8, 2).await;
    let _first = mock_chunk(&mut server, 1, &chunks[0]).await;
    let _failing = server
        .mock("PUT", "/storage/part2")
        .with_status(500)
        .with_body("storage unavailable")
        .create_async()
        .await;
    let finalize = server
        .mock("POST", "/packages/pkg-1/files/file-1/finalize")
        .expect(0)
        .create_async()
        .await;

    let err = client(&server, 4)
        .upload_file(&package(), &path)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Api { status: 500, .. }));
    finalize.assert_async().await;
}

#[tokio::test]
async fn test_too_few_destinations_is_an_error() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = write_file(&dir, "take.wav", &[4, 4, 4]);

    let _registration = mock_file_registration(&mut server, "take.wav", 12, 2).await;

    let err = client(&server, 4)
        .upload_file(&package(), &path)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidResponse(_)));
}

#[tokio::test]
async fn test_missing_file_fails_before_any_request() {
    let server = Server::new_async().await;
    let err = client(&server, 4)
        .upload_file(&package(), std::path::Path::new("/nonexistent/bounce.wav"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
