// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end pipeline tests against a local TCP feed.

use sbs_collector::sink::{MemorySink, MemorySinkView};
use sbs_collector::{
    BatchConfig, Pipeline, PipelineConfig, PipelineError, SourceConfig, SourceError,
};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

const EXAMPLE: &str = "MSG,3,1,1,4CA2D6,1,2024/03/10,12:00:00.000,2024/03/10,12:00:00.100,RYR1234,37000,450.5,270.0,53.35,-6.26,-64,7000,0,0,0,0";

const WAIT: Duration = Duration::from_secs(5);

async fn feed() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn config(port: u16, size: usize, interval: Duration) -> PipelineConfig {
    let mut source = SourceConfig::new("127.0.0.1", port);
    source.retry_delay = Duration::from_millis(20);
    source.connect_timeout = Duration::from_secs(1);

    let batch = BatchConfig {
        size,
        interval,
        ..BatchConfig::default()
    };

    let mut config = PipelineConfig::new(source, batch);
    config.write_timeout = Duration::from_secs(1);
    config.drain_margin = Duration::from_millis(500);
    config
}

async fn send_lines(stream: &mut TcpStream, lines: &[&str]) {
    for line in lines {
        stream.write_all(line.as_bytes()).await.unwrap();
        stream.write_all(b"\r\n").await.unwrap();
    }
    stream.flush().await.unwrap();
}

async fn wait_batches(view: &MemorySinkView, count: usize) {
    timeout(WAIT, view.wait_for_batches(count))
        .await
        .expect("batches not delivered in time");
}

#[tokio::test]
async fn test_example_line_end_to_end() {
    let (listener, port) = feed().await;
    let sink = MemorySink::new();
    let view = sink.view();
    let handle = Pipeline::new(config(port, 1, Duration::from_secs(60)), sink).start();

    let (mut stream, _) = listener.accept().await.unwrap();
    send_lines(&mut stream, &[EXAMPLE]).await;
    wait_batches(&view, 1).await;

    let batches = view.batches();
    let record = &batches[0][0];
    assert_eq!(record.hex_ident, "4CA2D6");
    assert_eq!(record.callsign.as_deref(), Some("RYR1234"));
    assert_eq!(record.altitude_ft, Some(37000));
    assert_eq!(record.ground_speed_kts, Some(450.5));
    assert_eq!(record.latitude, Some(53.35));
    assert_eq!(record.longitude, Some(-6.26));
    assert_eq!(record.vertical_rate_fpm, Some(-64));
    assert_eq!(record.squawk.as_deref(), Some("7000"));
    assert_eq!(record.is_on_ground, Some(false));

    let report = handle.shutdown().await;
    assert!(report.drain.is_drained());
    assert!(report.source_result.is_ok());
    assert_eq!(report.stats.records_decoded, 1);
    assert!(view.is_closed());
}

#[tokio::test]
async fn test_non_transmission_and_malformed_lines_are_skipped() {
    let (listener, port) = feed().await;
    let sink = MemorySink::new();
    let view = sink.view();
    let handle = Pipeline::new(config(port, 2, Duration::from_secs(60)), sink).start();

    let (mut stream, _) = listener.accept().await.unwrap();
    send_lines(
        &mut stream,
        &[
            "STA,,5,179,400AE7,10103,2008/11/28,14:58:51.153,2008/11/28,14:58:51.153,RM",
            "MSG,3,1,1",
            EXAMPLE,
            "",
            EXAMPLE,
        ],
    )
    .await;
    wait_batches(&view, 1).await;

    assert_eq!(view.batches()[0].len(), 2);

    let report = handle.shutdown().await;
    assert_eq!(report.stats.lines_malformed, 1);
    assert_eq!(report.stats.records_decoded, 2);
}

#[tokio::test]
async fn test_shutdown_flushes_partial_batch() {
    let (listener, port) = feed().await;
    let sink = MemorySink::new();
    let view = sink.view();
    let handle = Pipeline::new(config(port, 50, Duration::from_secs(60)), sink).start();

    let (mut stream, _) = listener.accept().await.unwrap();
    send_lines(&mut stream, &[EXAMPLE, EXAMPLE, EXAMPLE]).await;

    timeout(WAIT, async {
        while handle.stats().records_decoded < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("records not decoded in time");
    assert_eq!(view.batch_count(), 0);

    let report = handle.shutdown().await;
    assert!(report.drain.is_drained());
    assert_eq!(view.batch_count(), 1);
    assert_eq!(view.batches()[0].len(), 3);
    assert_eq!(report.stats.batches_written, 1);
    assert_eq!(report.stats.flushed_on_drain, 1);
}

#[tokio::test]
async fn test_interval_flush() {
    let (listener, port) = feed().await;
    let sink = MemorySink::new();
    let view = sink.view();
    let handle = Pipeline::new(config(port, 50, Duration::from_millis(100)), sink).start();

    let (mut stream, _) = listener.accept().await.unwrap();
    send_lines(&mut stream, &[EXAMPLE]).await;
    wait_batches(&view, 1).await;

    assert_eq!(view.batches()[0].len(), 1);
    let report = handle.shutdown().await;
    assert!(report.stats.flushed_by_interval >= 1);
}

#[tokio::test]
async fn test_explicit_flush() {
    let (listener, port) = feed().await;
    let sink = MemorySink::new();
    let view = sink.view();
    let handle = Pipeline::new(config(port, 50, Duration::from_secs(60)), sink).start();

    let (mut stream, _) = listener.accept().await.unwrap();
    send_lines(&mut stream, &[EXAMPLE, EXAMPLE]).await;

    timeout(WAIT, async {
        while handle.stats().records_decoded < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("records not decoded in time");

    handle.flush();
    wait_batches(&view, 1).await;
    assert_eq!(view.batches()[0].len(), 2);

    let report = handle.shutdown().await;
    assert_eq!(report.stats.flushed_by_request, 1);
}

#[tokio::test]
async fn test_reconnects_after_remote_close() {
    let (listener, port) = feed().await;
    let sink = MemorySink::new();
    let view = sink.view();
    let handle = Pipeline::new(config(port, 1, Duration::from_secs(60)), sink).start();

    let (mut first, _) = listener.accept().await.unwrap();
    send_lines(&mut first, &[EXAMPLE]).await;
    wait_batches(&view, 1).await;
    drop(first);

    let (mut second, _) = timeout(WAIT, listener.accept())
        .await
        .expect("no reconnect")
        .unwrap();
    send_lines(&mut second, &[EXAMPLE]).await;
    wait_batches(&view, 2).await;

    let report = handle.shutdown().await;
    assert!(report.stats.connect_attempts >= 2);
    assert!(report.faults.warnings >= 1);
    assert!(report.source_result.is_ok());
}

#[tokio::test]
async fn test_retry_budget_exhausted_stops_source() {
    let (listener, port) = feed().await;
    drop(listener);

    let mut config = config(port, 1, Duration::from_millis(200));
    config.source.max_retries = 2;
    let mut handle = Pipeline::new(config, MemorySink::new()).start();

    timeout(WAIT, handle.source_stopped())
        .await
        .expect("source did not give up");

    let report = handle.shutdown().await;
    match report.source_result {
        Err(PipelineError::Source(SourceError::RetriesExhausted { attempts, .. })) => {
            assert_eq!(attempts, 3)
        }
        other => panic!("unexpected source result: {:?}", other),
    }
    assert_eq!(report.stats.connect_attempts, 3);
    assert!(report.faults.errors >= 1);
}

#[tokio::test]
async fn test_sink_failure_does_not_stop_pipeline() {
    let (listener, port) = feed().await;
    let sink = MemorySink::new().failing_first(1);
    let view = sink.view();
    let handle = Pipeline::new(config(port, 1, Duration::from_secs(60)), sink).start();

    let (mut stream, _) = listener.accept().await.unwrap();
    send_lines(&mut stream, &[EXAMPLE]).await;
    timeout(WAIT, view.wait_for_attempts(1))
        .await
        .expect("no write attempt");

    send_lines(&mut stream, &[EXAMPLE]).await;
    wait_batches(&view, 1).await;

    let report = handle.shutdown().await;
    assert_eq!(report.stats.batches_failed, 1);
    assert_eq!(report.stats.batches_written, 1);
    assert_eq!(report.faults.errors, 1);
}

#[tokio::test]
async fn test_shutdown_while_disconnected() {
    let (listener, port) = feed().await;
    drop(listener);

    let mut config = config(port, 1, Duration::from_millis(200));
    config.source.retry_delay = Duration::from_secs(30);
    let handle = Pipeline::new(config, MemorySink::new()).start();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let report = timeout(WAIT, handle.shutdown())
        .await
        .expect("shutdown blocked by retry wait");
    assert!(report.drain.is_drained());
    assert!(report.source_result.is_ok());
}

#[tokio::test]
async fn test_shutdown_waits_for_slow_sink_writes() {
    let (listener, port) = feed().await;
    let sink = MemorySink::new().with_delay(Duration::from_millis(600));
    let view = sink.view();

    let mut config = config(port, 2, Duration::from_millis(200));
    config.drain_margin = Duration::from_millis(100);
    let handle = Pipeline::new(config, sink).start();

    let (mut stream, _) = listener.accept().await.unwrap();
    send_lines(&mut stream, &[EXAMPLE, EXAMPLE]).await;
    timeout(WAIT, view.wait_for_attempts(1))
        .await
        .expect("no write attempt");

    send_lines(&mut stream, &[EXAMPLE]).await;
    timeout(WAIT, async {
        while handle.stats().records_decoded < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("records not decoded in time");

    let report = handle.shutdown().await;
    assert!(report.drain.is_drained(), "{:?}", report.drain.pending);
    let records: usize = view.batches().iter().map(Vec::len).sum();
    assert_eq!(records, 3);
    assert_eq!(report.stats.batches_failed, 0);
}

#[tokio::test]
async fn test_sink_errors_counted_with_tiny_fault_queue() {
    let (listener, port) = feed().await;
    let sink = MemorySink::new().failing_first(3);
    let view = sink.view();

    let mut config = config(port, 1, Duration::from_secs(60));
    config.fault_queue_capacity = 1;
    let handle = Pipeline::new(config, sink).start();

    let (mut stream, _) = listener.accept().await.unwrap();
    send_lines(&mut stream, &[EXAMPLE, EXAMPLE, EXAMPLE, EXAMPLE]).await;
    wait_batches(&view, 1).await;

    let report = handle.shutdown().await;
    assert_eq!(report.stats.batches_failed, 3);
    assert_eq!(report.faults.errors, 3);
}
