//! Integration tests for the HTTP write, batch write, counter and read
//! operations.
//!
//! A wiremock server stands in for the row store, so request shapes and
//! counting can be checked without a real backend.

use rust_loadbench::config::ReadShape;
use rust_loadbench::errors::{CategorizedError, ErrorCategory};
use rust_loadbench::histogram::HistogramConfig;
use rust_loadbench::operations::{HttpBatchWrite, HttpCounterUpdate, HttpRead, HttpWrite};
use rust_loadbench::results::ResultBuilder;
use rust_loadbench::stop::StopSignal;
use rust_loadbench::worker::Operation;
use rust_loadbench::workload::{SequentialWorkload, WorkloadGenerator};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_bytes, body_json, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("Failed to create HTTP client")
}

fn results_with_latency() -> ResultBuilder {
    ResultBuilder::new(Some(
        HistogramConfig::for_timeout(Duration::from_secs(5)).expect("valid bounds"),
    ))
}

#[tokio::test]
async fn test_write_puts_each_row() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/rows/7/[0-2]$"))
        .and(body_bytes(vec![0u8; 4]))
        .respond_with(ResponseTemplate::new(204))
        .expect(3)
        .mount(&server)
        .await;

    let mut operation = HttpWrite::new(create_test_client(), &server.uri(), 4);
    let mut workload = SequentialWorkload::new(7, 1, 3);
    let mut rb = results_with_latency();

    for _ in 0..3 {
        let latency = operation
            .execute(&mut workload, &mut rb)
            .await
            .expect("write should succeed");
        assert!(latency > Duration::ZERO);
    }

    assert_eq!(rb.full().operations, 3);
    assert_eq!(rb.full().rows, 3);
    assert_eq!(rb.full().errors, 0);

    println!("✅ Write issued one PUT per row");
}

#[tokio::test]
async fn test_write_server_error_is_categorized() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut operation = HttpWrite::new(create_test_client(), &server.uri(), 4);
    let mut workload = SequentialWorkload::new(0, 1, 1);
    let mut rb = results_with_latency();

    let err = operation
        .execute(&mut workload, &mut rb)
        .await
        .expect_err("503 should fail");
    let categorized = err
        .downcast_ref::<CategorizedError>()
        .expect("operation errors are categorized");
    assert_eq!(categorized.category, ErrorCategory::ServerError);
    assert_eq!(categorized.status_code, Some(503));

    // Nothing counted on failure: the worker loop counts the error.
    assert_eq!(rb.full().operations, 0);
    assert_eq!(rb.full().rows, 0);
}

#[tokio::test]
async fn test_batch_write_fills_from_current_partition() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rows/0"))
        .and(body_json(json!({"clustering_keys": [0, 1, 2], "value_size": 8})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rows/0"))
        .and(body_json(json!({"clustering_keys": [3, 4], "value_size": 8})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rows/1"))
        .and(body_json(json!({"clustering_keys": [0, 1, 2], "value_size": 8})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut operation =
        HttpBatchWrite::new(create_test_client(), &server.uri(), 3, 8, StopSignal::new());
    let mut workload = SequentialWorkload::new(0, 2, 5);
    let mut rb = results_with_latency();

    for _ in 0..3 {
        operation
            .execute(&mut workload, &mut rb)
            .await
            .expect("batch write should succeed");
    }

    assert_eq!(rb.full().operations, 3);
    assert_eq!(rb.full().rows, 8);

    println!("✅ Batch write stopped filling at the partition boundary");
}

#[tokio::test]
async fn test_batch_write_sends_empty_batch_when_stopping() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rows/0"))
        .and(body_json(json!({"clustering_keys": [], "value_size": 8})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let stop = StopSignal::new();
    stop.stop("test");
    let mut operation = HttpBatchWrite::new(create_test_client(), &server.uri(), 3, 8, stop);
    let mut workload = SequentialWorkload::new(0, 1, 5);
    let mut rb = results_with_latency();

    operation
        .execute(&mut workload, &mut rb)
        .await
        .expect("batch write should succeed");

    assert_eq!(rb.full().operations, 1);
    assert_eq!(rb.full().rows, 0);
}

#[tokio::test]
async fn test_read_counts_returned_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rows/3"))
        .and(query_param("ck", "0"))
        .and(query_param("limit", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"ck": 0, "value": "AAAA"},
            {"ck": 1, "value": "AAAA"},
            {"ck": 2, "value": "AAAA"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let mut operation = HttpRead::new(create_test_client(), &server.uri(), 4, ReadShape::Default);
    let mut workload = SequentialWorkload::new(3, 1, 10);
    let mut rb = results_with_latency();

    operation
        .execute(&mut workload, &mut rb)
        .await
        .expect("read should succeed");

    assert_eq!(rb.full().operations, 1);
    assert_eq!(rb.full().rows, 3);

    println!("✅ Read counted the rows in the response");
}

#[tokio::test]
async fn test_read_rejects_non_array_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rows": 3})))
        .mount(&server)
        .await;

    let mut operation = HttpRead::new(create_test_client(), &server.uri(), 4, ReadShape::Default);
    let mut workload = SequentialWorkload::new(0, 1, 10);
    let mut rb = results_with_latency();

    let err = operation
        .execute(&mut workload, &mut rb)
        .await
        .expect_err("object body should fail");
    let categorized = err
        .downcast_ref::<CategorizedError>()
        .expect("operation errors are categorized");
    assert_eq!(categorized.category, ErrorCategory::ResponseError);
    assert_eq!(rb.full().operations, 0);
}

#[tokio::test]
async fn test_read_not_found_is_client_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut operation = HttpRead::new(create_test_client(), &server.uri(), 1, ReadShape::Default);
    let mut workload = SequentialWorkload::new(0, 1, 1);
    let mut rb = results_with_latency();

    let err = operation
        .execute(&mut workload, &mut rb)
        .await
        .expect_err("404 should fail");
    let categorized = err
        .downcast_ref::<CategorizedError>()
        .expect("operation errors are categorized");
    assert_eq!(categorized.category, ErrorCategory::ClientError);
    assert_eq!(categorized.status_code, Some(404));
}

#[tokio::test]
async fn test_counter_update_posts_each_row() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/counters/2/[0-3]$"))
        .respond_with(ResponseTemplate::new(204))
        .expect(4)
        .mount(&server)
        .await;

    let mut operation = HttpCounterUpdate::new(create_test_client(), &server.uri());
    let mut workload = SequentialWorkload::new(2, 1, 4);
    let mut rb = results_with_latency();

    for _ in 0..4 {
        operation
            .execute(&mut workload, &mut rb)
            .await
            .expect("counter update should succeed");
    }

    assert_eq!(rb.full().operations, 4);
    assert_eq!(rb.full().rows, 4);

    println!("✅ Counter update issued one POST per row");
}

#[tokio::test]
async fn test_counter_read_uses_counter_table() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/counters/5"))
        .and(query_param("ck", "0"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"ck": 0, "c1": 3, "c2": 3, "c3": 3, "c4": 3, "c5": 3},
            {"ck": 1, "c1": 1, "c2": 1, "c3": 1, "c4": 1, "c5": 1}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let mut operation =
        HttpRead::counters(create_test_client(), &server.uri(), 2, ReadShape::Default);
    let mut workload = SequentialWorkload::new(5, 1, 10);
    let mut rb = results_with_latency();

    operation
        .execute(&mut workload, &mut rb)
        .await
        .expect("counter read should succeed");

    assert_eq!(rb.full().operations, 1);
    assert_eq!(rb.full().rows, 2);
}

#[tokio::test]
async fn test_in_restriction_read_pads_after_partition_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rows/0"))
        .and(query_param("ck_in", "0,1,2,0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"ck": 0}, {"ck": 1}, {"ck": 2}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let mut operation =
        HttpRead::new(create_test_client(), &server.uri(), 4, ReadShape::InRestriction);
    let mut workload = SequentialWorkload::new(0, 1, 3);
    let mut rb = results_with_latency();

    operation
        .execute(&mut workload, &mut rb)
        .await
        .expect("read should succeed");

    assert_eq!(rb.full().rows, 3);

    println!("✅ IN list padded with key 0 once the partition ran out");
}

#[tokio::test]
async fn test_upper_bound_read_sends_range() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rows/0"))
        .and(query_param("ck", "0"))
        .and(query_param("ck_end", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let mut operation =
        HttpRead::new(create_test_client(), &server.uri(), 5, ReadShape::UpperBound);
    let mut workload = SequentialWorkload::new(0, 1, 10);
    let mut rb = results_with_latency();

    operation
        .execute(&mut workload, &mut rb)
        .await
        .expect("read should succeed");

    assert_eq!(rb.full().operations, 1);
    assert_eq!(rb.full().rows, 0);
}

#[tokio::test]
async fn test_no_lower_bound_read_sends_only_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rows/0"))
        .and(query_param("limit", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"ck": 0}])))
        .expect(1)
        .mount(&server)
        .await;

    let mut operation =
        HttpRead::new(create_test_client(), &server.uri(), 3, ReadShape::NoLowerBound);
    let mut workload = SequentialWorkload::new(0, 1, 10);
    let mut rb = results_with_latency();

    operation
        .execute(&mut workload, &mut rb)
        .await
        .expect("read should succeed");

    assert_eq!(rb.full().rows, 1);
    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests[0].url.query(), Some("limit=3"));
    // No clustering key was consumed.
    assert!(!workload.is_partition_done());
}
