//! Engine and client integration tests.
//!
//! These run the client against a scripted HTTP server bound on a local
//! TCP port, and against the in-memory transport for budget scenarios.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use streamql_client::{
    parse_headers_and_values, Client, ClientError, Context, Engine, MemoryTransport,
    ScriptedResponse,
};
use streamql_common::ClientConfig;
use streamql_query::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, PartialEq, Deserialize)]
struct Order {
    id: i64,
    item: String,
    qty: i32,
}

impl Record for Order {
    fn fields() -> Vec<NativeField> {
        vec![
            NativeField::of::<i64>("id").primary(),
            NativeField::of::<String>("item"),
            NativeField::of::<i32>("qty"),
        ]
    }
}

/// Accepts one connection, records the request and answers with `response`.
async fn serve_once(response: String) -> (u16, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.expect("accept");
        let (read_half, mut write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half);

        let mut request = String::new();
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await.expect("read head");
            if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = value.trim().parse().expect("content length");
            }
            request.push_str(&line);
            if line == "\r\n" {
                break;
            }
        }
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).await.expect("read body");
        request.push_str(&String::from_utf8_lossy(&body));

        write_half
            .write_all(response.as_bytes())
            .await
            .expect("write response");
        write_half.shutdown().await.expect("shutdown");
        request
    });
    (port, handle)
}

/// Value of header `name` in a raw request, ignoring case.
fn header<'a>(request: &'a str, name: &str) -> Option<&'a str> {
    request.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

fn json_response(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
}

fn tcp_client(port: u16) -> Client {
    let config = ClientConfig::new()
        .host("127.0.0.1")
        .port(port)
        .credentials("reader", "secret");
    Client::new(config).expect("client")
}

fn memory_engine(transport: &MemoryTransport, max_in_flight: usize) -> Engine {
    let config = ClientConfig::new()
        .max_in_flight(max_in_flight)
        .max_rebalance_retries(3)
        .rebalance_backoff(Duration::from_millis(100));
    Engine::new(config, Arc::new(transport.clone()))
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

/// Describe over TCP fills the registry and sends credentials.
#[tokio::test]
async fn test_describe_over_tcp() {
    init_tracing();
    let body = json!([{
        "@type": "sourceDescription",
        "sourceDescription": {
            "name": "ORDERS",
            "type": "STREAM",
            "topic": "orders",
            "fields": [
                {"name": "ID", "type": "KEY", "schema": {"type": "BIGINT", "memberSchema": null}},
                {"name": "ITEM", "schema": {"type": "STRING", "memberSchema": null}},
                {"name": "QTY", "schema": {"type": "INTEGER", "memberSchema": null}}
            ]
        }
    }])
    .to_string();
    let (port, server) = serve_once(json_response(&body)).await;
    let client = tcp_client(port);

    client
        .lint_remote::<Order>(&Context::background(), "orders")
        .await
        .expect("lint");
    let schema = client.registry().get("ORDERS").expect("registered");
    assert_eq!(schema.kind(), Some(RelationKind::Stream));
    assert_eq!(schema.primary().map(|f| f.name().to_string()), Some("ID".to_string()));

    let request = server.await.expect("server");
    assert!(request.starts_with("POST /ksql HTTP/1.1\r\n"));
    // base64("reader:secret")
    assert_eq!(header(&request, "authorization"), Some("Basic cmVhZGVyOnNlY3JldA=="));
    assert_eq!(header(&request, "accept"), Some("application/vnd.ksql.v1+json"));
    assert_eq!(header(&request, "content-type"), Some("application/vnd.ksql.v1+json"));
    assert!(request.ends_with(r#"{"ksql":"DESCRIBE orders;"}"#));
}

/// A push query over TCP decodes chunked rows until the final message.
#[tokio::test]
async fn test_push_over_tcp() {
    init_tracing();
    let lines = [
        r#"[{"header":{"queryId":"transient_ORDERS_1","schema":"`ID` BIGINT, `ITEM` STRING, `QTY` INTEGER"}},"#,
        r#"{"row":{"columns":[1,"pen",2]}},"#,
        "",
        r#"{"row":{"columns":[2,"ink",5]}},"#,
        r#"{"finalMessage":"Limit Reached"}]"#,
    ];
    let mut response =
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\n\r\n"
            .to_string();
    for line in lines {
        response.push_str(&format!("{:x}\r\n{}\n\r\n", line.len() + 1, line));
    }
    response.push_str("0\r\n\r\n");
    let (port, server) = serve_once(response).await;
    let client = tcp_client(port);

    let query = select([f("id"), f("item"), f("qty")])
        .from("orders")
        .emit_changes()
        .limit(2);
    let mut rows = client
        .push::<Order>(&Context::background(), query)
        .await
        .expect("push");

    let mut orders = Vec::new();
    while let Some(row) = rows.next().await {
        orders.push(row.expect("row"));
    }
    assert_eq!(rows.query_id(), Some("transient_ORDERS_1"));
    assert_eq!(
        orders,
        vec![
            Order { id: 1, item: "pen".to_string(), qty: 2 },
            Order { id: 2, item: "ink".to_string(), qty: 5 },
        ]
    );

    let request = server.await.expect("server");
    assert!(request.starts_with("POST /query HTTP/1.1\r\n"));
    assert!(request.contains("EMIT CHANGES LIMIT 2;"));
    assert_eq!(client.engine().in_flight(), 0);
}

/// An unreachable endpoint surfaces as a dial failure.
#[tokio::test]
async fn test_unreachable_endpoint() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let err = tcp_client(port)
        .list(&Context::background(), List::streams())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::CannotDial(_)));
    assert!(err.is_transport());
}

/// A streaming request at the ceiling is rejected.
#[tokio::test]
async fn test_too_many_requests() {
    init_tracing();
    let transport = MemoryTransport::new();
    transport.fallback(ScriptedResponse::streaming(["{}"]).hold_open());
    let config = ClientConfig::new().max_in_flight(2);
    let client = Client::with_transport(config, Arc::new(transport.clone())).expect("client");
    let ctx = Context::background();
    let query = || select([f("id"), f("item"), f("qty")]).from("orders").emit_changes();

    let _first = client.push::<Order>(&ctx, query()).await.expect("first");
    let _second = client.push::<Order>(&ctx, query()).await.expect("second");
    let err = client.push::<Order>(&ctx, query()).await.unwrap_err();

    assert!(matches!(err, ClientError::TooManyRequests));
    assert_eq!(client.stats().rejected_streams, 1);
    assert_eq!(transport.send_count(), 2);
}

/// A single request at the ceiling waits for a slot instead of failing.
#[tokio::test]
async fn test_single_request_waits_behind_stream() {
    init_tracing();
    let transport = MemoryTransport::new();
    transport.push(ScriptedResponse::streaming(["{}"]).hold_open());
    transport.push(ScriptedResponse::new(200, "[]"));
    let engine = memory_engine(&transport, 1);
    let ctx = Context::background();

    let stream = engine
        .dispatch_streaming(&ctx, "/query", "SELECT * FROM t EMIT CHANGES;")
        .await
        .expect("stream");
    let single = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .dispatch(&Context::background(), "/ksql", "LIST STREAMS;")
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!single.is_finished());
    assert_eq!(engine.in_flight(), 1);

    drop(stream);
    let body = single.await.expect("join").expect("single");
    assert_eq!(body.as_ref(), b"[]");
    assert_eq!(engine.in_flight(), 0);
}

/// Cancelling a waiting single request leaves the counter untouched.
#[tokio::test]
async fn test_cancel_waiting_single_request() {
    let transport = MemoryTransport::new();
    transport.push(ScriptedResponse::streaming(["{}"]).hold_open());
    let engine = memory_engine(&transport, 1);

    let _stream = engine
        .dispatch_streaming(&Context::background(), "/query", "SELECT;")
        .await
        .expect("stream");
    let (ctx, handle) = Context::background().with_cancel();
    let waiting = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.dispatch(&ctx, "/ksql", "LIST TABLES;").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.cancel();

    let err = waiting.await.expect("join").unwrap_err();
    assert!(matches!(err, ClientError::Cancelled));
    assert_eq!(engine.in_flight(), 1);
    assert_eq!(transport.send_count(), 1);
}

/// Cancelling a stream closes it and returns its slot exactly once.
#[tokio::test]
async fn test_cancel_stream() {
    init_tracing();
    let transport = MemoryTransport::new();
    transport.fallback(
        ScriptedResponse::streaming(["{\"row\":{\"columns\":[1]}}"; 3])
            .delay(Duration::from_millis(10))
            .hold_open(),
    );
    let engine = memory_engine(&transport, 3);
    let (ctx, handle) = Context::background().with_cancel();

    let mut cancelled = engine
        .dispatch_streaming(&ctx, "/query", "SELECT;")
        .await
        .expect("stream");
    let _other = engine
        .dispatch_streaming(&Context::background(), "/query", "SELECT;")
        .await
        .expect("stream");
    assert!(cancelled.next().await.expect("chunk").is_ok());
    assert_eq!(engine.in_flight(), 2);

    handle.cancel();
    while cancelled.next().await.is_some() {}
    assert_eq!(engine.in_flight(), 1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(engine.in_flight(), 1);
}

/// An explicit deadline bounds the whole stream.
#[tokio::test]
async fn test_stream_deadline() {
    let transport = MemoryTransport::new();
    transport.push(ScriptedResponse::streaming(["{}"]).hold_open());
    let engine = memory_engine(&transport, 2);
    let ctx = Context::background().with_timeout(Duration::from_millis(100));

    let mut stream = engine
        .dispatch_streaming(&ctx, "/query", "SELECT;")
        .await
        .expect("stream");
    assert!(stream.next().await.expect("chunk").is_ok());
    let err = stream.next().await.expect("deadline error").unwrap_err();
    assert!(matches!(err, ClientError::CannotDial(_)));
    assert!(stream.next().await.is_none());
    assert_eq!(engine.in_flight(), 0);
}

/// A stream that keeps hitting the ceiling fails after the retry bound.
#[tokio::test]
async fn test_rebalance_gives_up() {
    init_tracing();
    let transport = MemoryTransport::new();
    transport.push(ScriptedResponse::streaming(["{}"]).hold_open());
    transport.fallback(ScriptedResponse::streaming([""]).hold_open());
    let engine = memory_engine(&transport, 2);
    let ctx = Context::background();

    let _holder = engine
        .dispatch_streaming(&ctx, "/query", "SELECT;")
        .await
        .expect("holder");
    let mut stream = engine
        .dispatch_streaming(&ctx, "/query", "SELECT;")
        .await
        .expect("stream");

    let err = stream.next().await.expect("error").unwrap_err();
    assert!(matches!(err, ClientError::RebalanceExhausted { attempts: 4 }));
    assert_eq!(engine.stats().rebalances, 4);
    assert_eq!(transport.send_count(), 5);
    assert!(stream.next().await.is_none());
    assert_eq!(engine.in_flight(), 1);
}

/// A rebalanced stream completes once the budget frees up.
#[tokio::test]
async fn test_rebalance_recovers() {
    init_tracing();
    let transport = MemoryTransport::new();
    transport.push(ScriptedResponse::streaming(["{}"]).hold_open());
    transport.push(ScriptedResponse::streaming([""]).hold_open());
    transport.push(ScriptedResponse::streaming(["{\"row\":1}", "", "{\"row\":2}"]));
    let engine = memory_engine(&transport, 2);
    let ctx = Context::background();

    let holder = engine
        .dispatch_streaming(&ctx, "/query", "SELECT;")
        .await
        .expect("holder");
    let mut stream = engine
        .dispatch_streaming(&ctx, "/query", "SELECT;")
        .await
        .expect("stream");

    wait_until(|| engine.stats().rebalances == 1).await;
    drop(holder);

    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk.expect("chunk"));
    }
    assert_eq!(chunks.len(), 2);
    assert_eq!(engine.stats().rebalances, 1);
    assert_eq!(engine.in_flight(), 0);
}

/// Runs a mix of dispatches, each a streaming flag and a start delay in
/// milliseconds, and returns the highest in-flight count observed.
async fn run_mix(mix: Vec<(bool, u64)>, max: usize) -> (usize, Engine) {
    let transport = MemoryTransport::new();
    transport.fallback(
        ScriptedResponse::streaming(["{}", "", "{}"]).delay(Duration::from_millis(2)),
    );
    let config = ClientConfig::new()
        .max_in_flight(max)
        .max_rebalance_retries(50)
        .rebalance_backoff(Duration::from_millis(1));
    let engine = Engine::new(config, Arc::new(transport));

    let done = Arc::new(AtomicBool::new(false));
    let observed = Arc::new(AtomicUsize::new(0));
    let monitor = {
        let engine = engine.clone();
        let done = Arc::clone(&done);
        let observed = Arc::clone(&observed);
        tokio::spawn(async move {
            while !done.load(Ordering::SeqCst) {
                observed.fetch_max(engine.in_flight(), Ordering::SeqCst);
                tokio::task::yield_now().await;
            }
        })
    };

    let mut tasks = Vec::new();
    for (streaming, pause) in mix {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(pause)).await;
            let ctx = Context::background();
            if !streaming {
                return engine.dispatch(&ctx, "/query", "SELECT;").await.map(|_| ());
            }
            match engine.dispatch_streaming(&ctx, "/query", "SELECT;").await {
                Ok(mut stream) => {
                    while let Some(chunk) = stream.next().await {
                        match chunk {
                            Ok(_) | Err(ClientError::RebalanceExhausted { .. }) => {}
                            Err(e) => return Err(e),
                        }
                    }
                    Ok(())
                }
                Err(ClientError::TooManyRequests) => Ok(()),
                Err(e) => Err(e),
            }
        }));
    }
    for task in tasks {
        task.await.expect("join").expect("dispatch");
    }
    done.store(true, Ordering::SeqCst);
    monitor.await.expect("monitor");
    (observed.load(Ordering::SeqCst), engine)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Concurrent single and streaming dispatches never exceed the ceiling
    /// and always hand every slot back.
    #[test]
    fn test_budget_invariant_under_load(
        max in 1usize..5,
        mix in prop::collection::vec((any::<bool>(), 0u64..20), 1..24),
    ) {
        init_tracing();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .expect("runtime");
        let (observed, engine) = runtime.block_on(run_mix(mix, max));

        prop_assert!(observed <= max);
        prop_assert!(engine.stats().peak_in_flight <= max);
        prop_assert_eq!(engine.in_flight(), 0);
    }
}

/// Header and positional values pair up by column order.
#[test]
fn test_parse_headers_and_values() {
    let row = parse_headers_and_values("`id` INTEGER,`name` VARCHAR", &[json!(1), json!("a")])
        .expect("row");
    assert_eq!(serde_json::Value::Object(row), json!({"id": 1, "name": "a"}));
}
