use httpmock::MockServer;
use serde_json::json;
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::args::{Cli, Commands, FriendsCmd, PostsCmd, SessionCmd};
use crate::error::CliError;
use crate::handlers::{self, build_client};

fn cli(server: Option<String>, token_file: Option<&NamedTempFile>, env: Option<&str>) -> Cli {
    Cli {
        server,
        token_file: token_file.map(|file| file.path().to_path_buf()),
        token_env: env.map(str::to_string),
        command: Commands::Health,
    }
}

fn tmp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tmp file");
    std::io::Write::write_all(&mut file, contents.as_bytes()).expect("write tmp");
    file
}

#[test]
fn token_file_wins_over_env() -> Result<(), CliError> {
    let file = tmp_file("hs_file_token\n");
    let client = build_client(&cli(
        Some("https://hearth.example".into()),
        Some(&file),
        Some("hs_env_token"),
    ))?;
    assert_eq!(client.token(), Some("hs_file_token"));
    Ok(())
}

#[test]
fn server_is_required() {
    let err = build_client(&cli(None, None, None)).expect_err("missing server should fail");
    assert!(matches!(err, CliError::MissingServer));
}

#[tokio::test]
async fn sign_in_saves_the_token() -> Result<(), CliError> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/api/v1/session");
        then.status(201)
            .header("content-type", "application/json")
            .body(r#"{"token":"hs_abc_def","expires_at":"2030-01-01T00:00:00Z","user":null}"#);
    });

    let saved = NamedTempFile::new().expect("tmp file");
    let mut client = build_client(&cli(Some(server.base_url()), None, None))?;
    handlers::session(
        &mut client,
        SessionCmd::SignIn {
            email: "ada@example.com".into(),
            save: Some(saved.path().to_path_buf()),
        },
    )
    .await?;

    mock.assert();
    let stored = std::fs::read_to_string(saved.path()).expect("read token");
    assert_eq!(stored.trim(), "hs_abc_def");
    Ok(())
}

#[tokio::test]
async fn create_post_reads_caption_file() -> Result<(), CliError> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/api/v1/posts")
            .header("authorization", "Bearer hs_abc_def")
            .json_body(json!({ "caption": "from a file", "image": null }));
        then.status(201)
            .header("content-type", "application/json")
            .json_body(json!({
                "id": Uuid::nil(),
                "author_id": Uuid::nil(),
                "author": null,
                "caption": "from a file",
                "image": null,
                "liked_by": [],
                "comments": [],
                "moderation": "pending",
                "rejection_message": null,
                "posted_at": "2024-05-01T10:00:00Z",
                "updated_at": "2024-05-01T10:00:00Z"
            }));
    });

    let caption = tmp_file("from a file");
    let client = build_client(&cli(Some(server.base_url()), None, Some("hs_abc_def")))?;
    handlers::posts(
        &client,
        PostsCmd::Create {
            caption: None,
            caption_file: Some(caption.path().to_path_buf()),
            image: None,
        },
    )
    .await?;
    mock.assert();
    Ok(())
}

#[tokio::test]
async fn empty_post_is_refused_locally() {
    let client = build_client(&cli(
        Some("https://hearth.example".into()),
        None,
        Some("hs_abc_def"),
    ))
    .expect("client");
    let err = handlers::posts(
        &client,
        PostsCmd::Create {
            caption: Some("   ".into()),
            caption_file: None,
            image: None,
        },
    )
    .await
    .expect_err("empty post");
    assert!(matches!(err, CliError::InvalidInput(_)));
}

#[tokio::test]
async fn friend_accept_hits_endpoint() -> Result<(), CliError> {
    let server = MockServer::start();
    let requester = Uuid::new_v4();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path(format!("/api/v1/friends/{requester}/accept"));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "target_id": requester,
                "state": "friends",
                "following": false,
                "followed_by": false
            }));
    });

    let client = build_client(&cli(Some(server.base_url()), None, Some("hs_abc_def")))?;
    handlers::friends(&client, FriendsCmd::Accept { requester }).await?;
    mock.assert();
    Ok(())
}

#[tokio::test]
async fn server_errors_surface_as_client_errors() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/api/v1/me");
        then.status(403)
            .header("content-type", "application/json")
            .body(r#"{"error":{"code":"profile_required","message":"Register a profile first","hint":null}}"#);
    });

    let client = build_client(&cli(Some(server.base_url()), None, Some("hs_abc_def")))
        .expect("client");
    let err = handlers::me(&client).await.expect_err("forbidden");
    let CliError::Client(inner) = err else {
        panic!("expected a client error");
    };
    assert_eq!(inner.code().as_deref(), Some("profile_required"));
}
