use std::{
    collections::VecDeque,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
    time::Duration,
};

use async_trait::async_trait;
use futures::Stream;
use mcp_core::{
    JsonObject, PromptMessageRole, Resource,
    protocol::{Implementation, JsonRpcMessage, JsonRpcRequest, PROTOCOL_VERSION, RequestId},
};
use mcp_server::{
    BoxError, Dispatcher, Registry, RouterService, Server, ServerError, TransportError,
    registry::{Confirmation, PromptParam, PromptRoute, ResourceRoute, ToolRoute},
    schema::{FieldShape, ObjectShape},
    transport::{ByteTransport, Transport},
};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

fn dispatcher() -> anyhow::Result<Dispatcher> {
    let mut registry = Registry::new();
    registry.register_tool(ToolRoute::new(
        "slow_echo",
        "Echo after a delay",
        ObjectShape::new()
            .field(FieldShape::string("text").required())
            .field(FieldShape::integer("delay_ms")),
        Confirmation::new("Echo: {{ subject }}").subject_from_result("text"),
        |args: JsonObject| async move {
            let delay = args.get("delay_ms").and_then(Value::as_u64).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok::<_, BoxError>(Value::Object(args))
        },
    )?)?;
    registry.register_resource(ResourceRoute::new(
        Resource::new("mem://items", "Items").with_mime_type("application/json"),
        || async { Ok::<_, BoxError>(json!([1, 2, 3])) },
    ))?;
    registry.register_prompt(
        PromptRoute::new("hello", "Say hello")
            .argument(PromptParam::new("name", "friend"))
            .description("Greeting for {{ name }}")
            .message(PromptMessageRole::User, "Hello, {{ name }}!"),
    )?;
    Ok(Dispatcher::new(
        Implementation {
            name: "loop-test".into(),
            version: "1.2.3".into(),
        },
        registry,
    )
    .with_instructions("test server"))
}

/// Feed `input` to a server and collect every line it writes until it stops.
async fn run_session(input: &str) -> anyhow::Result<Vec<Value>> {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let (client_read, mut client_write) = tokio::io::split(client);

    let server = Server::new(RouterService(dispatcher()?));
    let handle = tokio::spawn(server.run(ByteTransport::new(server_read, server_write)));

    client_write.write_all(input.as_bytes()).await?;
    client_write.shutdown().await?;

    let mut lines = BufReader::new(client_read).lines();
    let mut out = Vec::new();
    while let Some(line) = lines.next_line().await? {
        out.push(serde_json::from_str(&line)?);
    }
    handle.await??;
    Ok(out)
}

fn by_id(responses: &[Value], id: Value) -> &Value {
    responses
        .iter()
        .find(|r| r["id"] == id)
        .unwrap_or_else(|| panic!("no response with id {id}"))
}

#[tokio::test]
async fn test_initialize_and_ping() -> anyhow::Result<()> {
    let responses = run_session(concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"t","version":"0"}}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
        "\n",
    ))
    .await?;

    assert_eq!(responses.len(), 2, "notifications get no response");
    let init = by_id(&responses, json!(1));
    assert_eq!(init["result"]["protocolVersion"], PROTOCOL_VERSION);
    assert_eq!(init["result"]["serverInfo"], json!({"name": "loop-test", "version": "1.2.3"}));
    assert_eq!(init["result"]["instructions"], "test server");
    assert!(init["result"]["capabilities"]["tools"].is_object());
    assert_eq!(by_id(&responses, json!(2))["result"], json!({}));
    Ok(())
}

#[tokio::test]
async fn test_capability_endpoints() -> anyhow::Result<()> {
    let responses = run_session(concat!(
        r#"{"jsonrpc":"2.0","id":"t","method":"tools/list"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":"c","method":"tools/call","params":{"name":"slow_echo","arguments":{"text":"hi"}}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":"r","method":"resources/read","params":{"uri":"mem://items/2"}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":"p","method":"prompts/get","params":{"name":"hello"}}"#,
        "\n",
    ))
    .await?;

    let tools = &by_id(&responses, json!("t"))["result"]["tools"];
    assert_eq!(tools[0]["name"], "slow_echo");
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["text"]));

    let call = &by_id(&responses, json!("c"))["result"];
    assert_eq!(call["content"], json!([{"type": "text", "text": "Echo: hi"}]));

    let read = &by_id(&responses, json!("r"))["result"]["contents"][0];
    assert_eq!(read["uri"], "mem://items/2");
    assert_eq!(read["mimeType"], "application/json");
    assert_eq!(serde_json::from_str::<Value>(read["text"].as_str().unwrap())?, json!([1, 2, 3]));

    let prompt = &by_id(&responses, json!("p"))["result"];
    assert_eq!(prompt["description"], "Greeting for friend");
    assert_eq!(prompt["messages"][0]["role"], "user");
    assert_eq!(prompt["messages"][0]["content"]["text"], "Hello, friend!");
    Ok(())
}

#[tokio::test]
async fn test_errors_are_answered_and_loop_continues() -> anyhow::Result<()> {
    let responses = run_session(concat!(
        "this is not json\n",
        r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"delete_everything"}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"slow_echo","arguments":{"delay_ms":"soon"}}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":3,"method":"resources/read","params":{"uri":"mem://other"}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":4,"method":"tools/delete"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"arguments":{}}}"#,
        "\n",
        r#"{"id":6,"method":"ping"}"#,
        "\n",
    ))
    .await?;

    assert_eq!(responses.len(), 7);

    let parse = responses.iter().find(|r| r["error"]["code"] == -32700).unwrap();
    assert_eq!(parse["id"], Value::Null);

    let unknown = &by_id(&responses, json!(1))["error"];
    assert_eq!(unknown["code"], -32602);
    assert_eq!(unknown["data"]["kind"], "unknown_capability");
    assert_eq!(unknown["data"]["name"], "delete_everything");

    let invalid = &by_id(&responses, json!(2))["error"];
    assert_eq!(invalid["data"]["kind"], "invalid_arguments");
    let fields: Vec<&str> = invalid["data"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["field"].as_str())
        .collect();
    assert_eq!(fields, vec!["text", "delay_ms"]);

    let missing_resource = &by_id(&responses, json!(3))["error"];
    assert_eq!(missing_resource["code"], -32002);

    assert_eq!(by_id(&responses, json!(4))["error"]["code"], -32601);
    assert_eq!(by_id(&responses, json!(5))["error"]["data"]["kind"], "invalid_params");

    let invalid_request = responses.iter().find(|r| r["error"]["code"] == -32600).unwrap();
    assert_eq!(invalid_request["id"], Value::Null);
    Ok(())
}

#[tokio::test]
async fn test_slow_request_does_not_block_later_ones() -> anyhow::Result<()> {
    let responses = run_session(concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"slow_echo","arguments":{"text":"slow","delay_ms":200}}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"slow_echo","arguments":{"text":"fast"}}}"#,
        "\n",
    ))
    .await?;

    assert_eq!(responses.len(), 2, "in-flight requests are drained at end of input");
    assert_eq!(responses[0]["id"], 2);
    assert_eq!(responses[1]["id"], 1);
    assert_eq!(responses[1]["result"]["content"][0]["text"], "Echo: slow");
    Ok(())
}

#[tokio::test]
async fn test_malformed_envelopes_are_answered_as_invalid_requests() -> anyhow::Result<()> {
    let responses = run_session(concat!(
        r#"{"jsonrpc":"2.0","id":1}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2.5,"method":"ping"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":3,"result":{},"error":{"code":1,"message":"x"}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":4,"method":"ping"}"#,
        "\n",
    ))
    .await?;

    assert_eq!(responses.len(), 5);
    let rejected: Vec<&Value> = responses
        .iter()
        .filter(|r| r["error"]["code"] == -32600)
        .collect();
    assert_eq!(rejected.len(), 4);
    assert!(rejected.iter().all(|r| r["id"] == Value::Null));
    assert_eq!(by_id(&responses, json!(4))["result"], json!({}));
    Ok(())
}

/// Replays a fixed list of incoming items, then stays silent.
struct ScriptedTransport(VecDeque<Result<JsonRpcMessage, TransportError>>);

impl Stream for ScriptedTransport {
    type Item = Result<JsonRpcMessage, TransportError>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.0.pop_front() {
            Some(item) => Poll::Ready(Some(item)),
            None => Poll::Pending,
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn write_message(&mut self, _message: JsonRpcMessage) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_transport_failure_reports_abandoned_requests() -> anyhow::Result<()> {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::ERROR)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _default = tracing::subscriber::set_default(subscriber);

    let slow = JsonRpcRequest::new(
        RequestId::Number(1),
        "tools/call",
        Some(json!({"name": "slow_echo", "arguments": {"text": "late", "delay_ms": 5000}})),
    );
    let transport = ScriptedTransport(VecDeque::from([
        Ok(JsonRpcMessage::Request(slow)),
        Err(TransportError::Io(std::io::ErrorKind::BrokenPipe.into())),
    ]));

    let err = Server::new(RouterService(dispatcher()?))
        .run(transport)
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::Transport(TransportError::Io(_))));

    let logs = String::from_utf8(captured.0.lock().unwrap().clone())?;
    assert!(logs.contains("transport failed, abandoning in-flight requests"), "{logs}");
    assert!(logs.contains("in_flight=1"), "{logs}");
    Ok(())
}
