//! Integration tests for the command API client against a mock server.

use gatewire::schema::{decode_command, OptionType};
use gatewire::{ApiError, Client, Command, CommandScope, Snowflake};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const APP: Snowflake = Snowflake(100);

fn client(server: &MockServer) -> Client {
    Client::new(server.uri(), "secret", APP).unwrap()
}

#[tokio::test]
async fn test_list_global_commands() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/applications/100/commands"))
        .and(header("authorization", "Bot secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"id":"1","application_id":"100","name":"ping","description":"pong","version":"7"}]"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let commands = client(&server).commands(CommandScope::Global).await.unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].name, "ping");
    assert_eq!(commands[0].version, Snowflake(7));
}

#[tokio::test]
async fn test_create_guild_command_sends_wire_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/applications/100/guilds/200/commands"))
        .and(header("content-type", "application/json"))
        .and(body_string_contains(r#""default_permission":false"#))
        .respond_with(ResponseTemplate::new(201).set_body_string(
            r#"{"id":"9","application_id":"100","guild_id":"200","name":"ban","description":"Ban a member","default_permission":false}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut command = Command::new("ban", "Ban a member");
    command.no_default_permission = true;

    let created = client(&server)
        .create_command(CommandScope::Guild(Snowflake(200)), &command)
        .await
        .unwrap();
    assert_eq!(created.id, Snowflake(9));
    assert_eq!(created.guild_id, Some(Snowflake(200)));
    assert!(created.no_default_permission);
}

#[tokio::test]
async fn test_edit_preserves_unknown_options() {
    let unknown = r#"{"type":77,"name":"future","opaque":[1,2,3]}"#;
    let stored = format!(r#"{{"id":"5","name":"cmd","description":"d","options":[{unknown}]}}"#);
    let command = decode_command(stored.as_bytes()).unwrap();
    assert_eq!(command.options[0].option_type(), OptionType::Unknown(77));

    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/applications/100/commands/5"))
        .and(body_string_contains(unknown))
        .respond_with(ResponseTemplate::new(200).set_body_string(stored.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let edited = client(&server)
        .edit_command(CommandScope::Global, Snowflake(5), &command)
        .await
        .unwrap();
    assert_eq!(edited, command);
}

#[tokio::test]
async fn test_overwrite_and_delete() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/applications/100/commands"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"id":"1","name":"a","description":"d"},{"id":"2","name":"b","description":"d"}]"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/applications/100/commands/2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server);
    let commands = vec![Command::new("a", "d"), Command::new("b", "d")];
    let stored = api.overwrite_commands(CommandScope::Global, &commands).await.unwrap();
    assert_eq!(stored.len(), 2);

    api.delete_command(CommandScope::Global, stored[1].id).await.unwrap();
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/applications/100/commands/404"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Unknown application command"))
        .mount(&server)
        .await;

    let err = client(&server)
        .command(CommandScope::Global, Snowflake(404))
        .await
        .unwrap_err();
    match err {
        ApiError::Status { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "Unknown application command");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_malformed_response_is_schema_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/applications/100/commands"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"not\":\"a list\"}"))
        .mount(&server)
        .await;

    let err = client(&server).commands(CommandScope::Global).await.unwrap_err();
    assert!(matches!(err, ApiError::Schema(_)));
}

#[tokio::test]
async fn test_cancelled_scope_aborts_in_flight_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/applications/100/commands"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[]")
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let scope = CancellationToken::new();
    let api = client(&server).with_cancel(scope.clone());
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        scope.cancel();
    });

    let err = api.commands(CommandScope::Global).await.unwrap_err();
    assert!(matches!(err, ApiError::Cancelled));
    canceller.await.unwrap();
}
