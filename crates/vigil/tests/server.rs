//! Integration tests for the broker server and `connect` over TCP.

use std::sync::Arc;
use std::time::{Duration, Instant};

use vigil::prelude::*;

const STATUS: EventType = EventType::new(5, 1);

#[derive(Debug, Default, Clone, PartialEq)]
struct Status {
    service: String,
    healthy: bool,
    latency: f64,
}

impl Event for Status {
    fn event_type(&self) -> EventType {
        STATUS
    }
}

fn registry() -> Arc<Registry> {
    let mut registry = Registry::new();
    registry
        .register(
            STATUS,
            "status",
            || Box::new(Status::default()),
            vec![
                Field::string::<Status>("service", |e| e.service.clone(), |e, v| e.service = v),
                Field::boolean::<Status>("healthy", |e| e.healthy, |e, v| e.healthy = v),
                Field::double::<Status>("latency", |e| e.latency, |e, v| e.latency = v),
            ],
        )
        .unwrap();
    Arc::new(registry)
}

fn status(service: &str) -> Status {
    Status {
        service: service.to_string(),
        healthy: true,
        latency: 0.125,
    }
}

/// Writes every received event straight back.
async fn echo(mut stream: FramedStream<TcpConnection>) -> Result<(), VigilError> {
    loop {
        match stream.read(None).await {
            Ok(Some(event)) => {
                stream.write(&*event).await?;
            }
            Ok(None) => {}
            Err(StreamError::Closed) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}

/// Starts an echo server on an ephemeral port and returns its address.
async fn start(config: StreamConfig) -> String {
    let server = BrokerServer::builder()
        .bind("127.0.0.1:0")
        .stream_config(config)
        .registry(registry())
        .build(echo)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap().to_string();
    tokio::spawn(server.run());
    addr
}

async fn read_status(stream: &mut FramedStream<TcpConnection>) -> Status {
    let deadline = Instant::now() + Duration::from_secs(5);
    let event = stream.read(Some(deadline)).await.unwrap().unwrap();
    event.downcast_ref::<Status>().unwrap().clone()
}

#[tokio::test]
async fn test_echo_round_trip() {
    let addr = start(StreamConfig::default()).await;
    let mut client = connect(&addr, StreamConfig::default(), registry()).await.unwrap();
    assert_eq!(client.extensions(), Some(Extensions::empty()));

    client.write(&status("db")).await.unwrap();
    assert_eq!(read_status(&mut client).await, status("db"));
}

#[tokio::test]
async fn test_compression_is_negotiated_over_tcp() {
    let config = StreamConfig {
        compression: true,
        ..Default::default()
    };
    let addr = start(config.clone()).await;
    let mut client = connect(&addr, config, registry()).await.unwrap();
    assert_eq!(client.extensions(), Some(Extensions::COMPRESSION));
    assert!(client.is_compressed());

    let big = status(&"web-frontend-".repeat(10_000));
    client.write(&big).await.unwrap();
    client.write(&status("cache")).await.unwrap();
    assert_eq!(read_status(&mut client).await, big);
    assert_eq!(read_status(&mut client).await, status("cache"));
    assert!(client.statistics().bytes_sent < 130_000 / 4);
}

#[tokio::test]
async fn test_one_client_disconnecting_does_not_stop_the_server() {
    let addr = start(StreamConfig::default()).await;

    let mut first = connect(&addr, StreamConfig::default(), registry()).await.unwrap();
    first.write(&status("first")).await.unwrap();
    assert_eq!(read_status(&mut first).await, status("first"));
    first.close().await.unwrap();
    drop(first);

    let mut second = connect(&addr, StreamConfig::default(), registry()).await.unwrap();
    second.write(&status("second")).await.unwrap();
    assert_eq!(read_status(&mut second).await, status("second"));
}

#[tokio::test]
async fn test_server_config_from_broker_config() {
    let config = BrokerConfig::from_json_str(
        r#"{ "endpoint": { "address": "127.0.0.1:0" }, "stream": { "ack_limit": 2 } }"#,
    )
    .unwrap();
    let server = vigil::BrokerServerBuilder::from_config(&config)
        .registry(registry())
        .build(echo)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap().to_string();
    tokio::spawn(server.run());

    let mut client = connect(&addr, StreamConfig::default(), registry()).await.unwrap();
    client.write(&status("a")).await.unwrap();
    client.write(&status("b")).await.unwrap();
    read_status(&mut client).await;
    read_status(&mut client).await;

    // The server acknowledged both events; the ack is consumed by a read.
    let deadline = Instant::now() + Duration::from_millis(100);
    assert!(client.read(Some(deadline)).await.unwrap().is_none());
    assert_eq!(client.flush().await.unwrap(), 2);
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let err = connect(&addr, StreamConfig::default(), registry()).await.err().unwrap();
    assert!(matches!(err, VigilError::Transport(_)));
}
