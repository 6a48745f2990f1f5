use assert_cmd::Command;
use httpmock::MockServer;
use predicates::prelude::*;

fn hearth_cli() -> Command {
    let mut cmd = Command::cargo_bin("hearth-cli").expect("binary");
    cmd.env_remove("HEARTH_SERVER_URL")
        .env_remove("HEARTH_TOKEN")
        .env_remove("HEARTH_TOKEN_FILE");
    cmd
}

#[test]
fn missing_server_is_reported() {
    hearth_cli()
        .arg("feed")
        .assert()
        .failure()
        .stderr(predicate::str::contains("MissingServer"));
}

#[test]
fn feed_prints_pretty_json() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET").path("/api/v1/feed");
        then.status(200)
            .header("content-type", "application/json")
            .body("[]");
    });

    hearth_cli()
        .args(["--server", &server.base_url(), "feed"])
        .assert()
        .success()
        .stdout(predicate::str::diff("[]\n"));
    mock.assert();
}

#[test]
fn protected_command_without_token_fails() {
    hearth_cli()
        .args(["--server", "http://127.0.0.1:9", "me"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("MissingSession"));
}
