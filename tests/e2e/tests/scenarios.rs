//! End-to-end scenarios over real sockets

use flow_e2e_tests::{free_port, Harness, LineClient};
use std::time::Duration;

fn stream_ingress(port: u16) -> String {
    format!(
        r#"
        [actors.ingress]
        module = "core.receiver.tcp"
        params = {{ bind = "tcp://127.0.0.1:{port}", timeout_ms = 2000 }}
        "#
    )
}

#[tokio::test]
async fn test_http_ingress_to_null_sink() {
    let port = free_port().unwrap();
    let toml = format!(
        r#"
        [actors.ingress]
        module = "core.receiver.http"
        params = {{ bind = "http://127.0.0.1:{port}/v1alpha1", timeout_ms = 2000 }}

        [actors.drop]
        module = "core.sink.null"

        [pipeline.ingress]
        connect = ["drop"]
        "#
    );
    let harness = Harness::start(&toml).await.unwrap();

    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{port}/v1alpha1");

    let response = client.post(&url).body("hello").send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap().trim(), "OK");

    let response = client.post(&url).body("").send().await.unwrap();
    assert_eq!(response.status().as_u16(), 400);

    harness.stop().await.unwrap();
}

#[tokio::test]
async fn test_tcp_ingress_to_dumper() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("dump.log");
    let port = free_port().unwrap();
    let toml = format!(
        r#"
        {ingress}

        [actors.dump]
        module = "core.sink.dumper"
        params = {{ out = "{out}" }}

        [pipeline.ingress]
        connect = ["dump"]
        "#,
        ingress = stream_ingress(port),
        out = out.display(),
    );
    let harness = Harness::start(&toml).await.unwrap();

    let mut client = LineClient::connect(&format!("127.0.0.1:{port}")).await.unwrap();
    assert_eq!(client.send("alpha").await.unwrap(), "OK");
    assert_eq!(client.send("beta").await.unwrap(), "OK");

    harness.stop().await.unwrap();
    let contents = std::fs::read_to_string(&out).unwrap();
    assert_eq!(contents, "alpha\nbeta\n");
}

#[tokio::test]
async fn test_throttler_rejects_burst() {
    let port = free_port().unwrap();
    let toml = format!(
        r#"
        {ingress}

        [actors.limit]
        module = "core.throttler"
        params = {{ rps = 1 }}

        [actors.drop]
        module = "core.sink.null"

        [pipeline.ingress]
        connect = ["limit"]

        [pipeline.limit]
        connect = ["drop"]
        "#,
        ingress = stream_ingress(port),
    );
    let harness = Harness::start(&toml).await.unwrap();

    let mut client = LineClient::connect(&format!("127.0.0.1:{port}")).await.unwrap();
    assert_eq!(client.send("first").await.unwrap(), "OK");
    for i in 0..4 {
        assert_eq!(client.send(&format!("burst {i}")).await.unwrap(), "THROTTLED");
    }

    harness.stop().await.unwrap();
}

#[tokio::test]
async fn test_router_follows_parsed_metadata() {
    let port = free_port().unwrap();
    let toml = format!(
        r#"
        {ingress}

        [actors.parse]
        module = "core.meta_parser"

        [actors.route]
        module = "core.router"

        [actors.a]
        module = "plugin.collector"

        [actors.b]
        module = "plugin.collector"

        [pipeline.ingress]
        connect = ["parse"]

        [pipeline.parse]
        connect = ["route"]

        [pipeline.route]
        connect = ["a", "b"]
        "#,
        ingress = stream_ingress(port),
    );
    let harness = Harness::start(&toml).await.unwrap();

    let mut client = LineClient::connect(&format!("127.0.0.1:{port}")).await.unwrap();
    assert_eq!(client.send("sendto=a to-a").await.unwrap(), "OK");
    assert_eq!(client.send("sendto=b to-b").await.unwrap(), "OK");
    assert_eq!(client.send("sendto=c lost").await.unwrap(), "UNROUTABLE");
    assert_eq!(client.send("no-prefix").await.unwrap(), "UNROUTABLE");

    let a = harness.collector("a").unwrap();
    let b = harness.collector("b").unwrap();
    assert_eq!(a.bodies(), ["to-a"]);
    assert_eq!(a.meta(0, "sendto").as_deref(), Some("a"));
    assert_eq!(b.bodies(), ["to-b"]);

    harness.stop().await.unwrap();
}

#[tokio::test]
async fn test_replicator_reports_partial_send() {
    let port = free_port().unwrap();
    let toml = format!(
        r#"
        {ingress}

        [actors.copy]
        module = "core.replicator"
        params = {{ mode = "all" }}

        [actors.a]
        module = "plugin.collector"

        [actors.b]
        module = "plugin.collector"

        [actors.c]
        module = "plugin.collector"
        params = {{ status = "failed" }}

        [pipeline.ingress]
        connect = ["copy"]

        [pipeline.copy]
        connect = ["a", "b", "c"]
        "#,
        ingress = stream_ingress(port),
    );
    let harness = Harness::start(&toml).await.unwrap();

    let mut client = LineClient::connect(&format!("127.0.0.1:{port}")).await.unwrap();
    for i in 0..10 {
        assert_eq!(client.send(&format!("copy {i}")).await.unwrap(), "PARTSENT");
    }

    for name in ["a", "b", "c"] {
        assert_eq!(harness.collector(name).unwrap().count(), 10, "{name}");
    }

    harness.stop().await.unwrap();
}

#[tokio::test]
async fn test_buffer_retries_flaky_sink() {
    let port = free_port().unwrap();
    let toml = format!(
        r#"
        {ingress}

        [actors.retry]
        module = "core.buffer"
        params = {{ capacity = 8, max_retry = 2 }}

        [actors.flaky]
        module = "plugin.flaky"
        params = {{ fail_first = 2 }}

        [pipeline.ingress]
        connect = ["retry"]

        [pipeline.retry]
        connect = ["flaky"]
        "#,
        ingress = stream_ingress(port),
    );
    let harness = Harness::start(&toml).await.unwrap();

    let mut client = LineClient::connect(&format!("127.0.0.1:{port}")).await.unwrap();
    let frames = 5;
    for i in 0..frames {
        assert_eq!(client.send(&format!("frame {i}")).await.unwrap(), "OK");
    }

    let flaky = harness.flaky("flaky").unwrap();
    assert_eq!(flaky.attempts(), 3 * frames);

    harness.stop().await.unwrap();
}

#[tokio::test]
async fn test_unknown_plugin_fails_startup() {
    let toml = r#"
        [actors.ghost]
        module = "plugin.ghost"
        "#;
    let err = Harness::start(toml).await.err().unwrap();
    assert!(format!("{err:#}").contains("ghost"));
}

#[tokio::test]
async fn test_silent_receiver_still_delivers() {
    let port = free_port().unwrap();
    let toml = format!(
        r#"
        [actors.ingress]
        module = "core.receiver.tcp"
        params = {{ bind = "tcp://127.0.0.1:{port}", silent = true }}

        [actors.sink]
        module = "plugin.collector"

        [pipeline.ingress]
        connect = ["sink"]
        "#
    );
    let harness = Harness::start(&toml).await.unwrap();

    let mut client = LineClient::connect(&format!("127.0.0.1:{port}")).await.unwrap();
    client.push("quiet one").await.unwrap();
    client.push("quiet two").await.unwrap();

    let sink = harness.collector("sink").unwrap();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while sink.count() < 2 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(sink.bodies(), ["quiet one", "quiet two"]);

    harness.stop().await.unwrap();
}

#[tokio::test]
async fn test_unanswered_frames_time_out() {
    let port = free_port().unwrap();
    let toml = format!(
        r#"
        [actors.ingress]
        module = "core.receiver.tcp"
        params = {{ bind = "tcp://127.0.0.1:{port}", timeout_ms = 50 }}

        [actors.hole]
        module = "plugin.silent"

        [pipeline.ingress]
        connect = ["hole"]
        "#
    );
    let harness = Harness::start(&toml).await.unwrap();

    let mut client = LineClient::connect(&format!("127.0.0.1:{port}")).await.unwrap();
    assert_eq!(client.send("anyone").await.unwrap(), "TIMEOUT");
    assert_eq!(harness.silent("hole").unwrap().held(), 1);

    harness.stop().await.unwrap();
}
