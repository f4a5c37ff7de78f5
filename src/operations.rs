//! HTTP units of work against a row store.
//!
//! Rows are addressed as `{base}/rows/{partition}/{clustering}` and counters
//! as `{base}/counters/{partition}/{clustering}`. Each operation measures only
//! the request itself and counts what it did through the [`ResultBuilder`]
//! after a successful response.

use async_trait::async_trait;
use serde_json::json;
use tokio::time::{Duration, Instant};

use crate::config::ReadShape;
use crate::errors::{CategorizedError, ErrorCategory, OperationError};
use crate::results::ResultBuilder;
use crate::stop::StopSignal;
use crate::worker::Operation;
use crate::workload::WorkloadGenerator;

const ROWS_TABLE: &str = "rows";
const COUNTERS_TABLE: &str = "counters";

fn table_url(base_url: &str, table: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), table)
}

fn rows_url(base_url: &str) -> String {
    table_url(base_url, ROWS_TABLE)
}

/// Writes one row per request with `PUT`.
pub struct HttpWrite {
    client: reqwest::Client,
    rows_url: String,
    value: Vec<u8>,
}

impl HttpWrite {
    pub fn new(client: reqwest::Client, base_url: &str, row_size: usize) -> Self {
        Self {
            client,
            rows_url: rows_url(base_url),
            value: vec![0; row_size],
        }
    }
}

#[async_trait]
impl Operation for HttpWrite {
    async fn execute(
        &mut self,
        workload: &mut dyn WorkloadGenerator,
        results: &mut ResultBuilder,
    ) -> Result<Duration, OperationError> {
        let pk = workload.next_partition_key();
        let ck = workload.next_clustering_key();
        let request = self
            .client
            .put(format!("{}/{}/{}", self.rows_url, pk, ck))
            .body(self.value.clone());

        let request_start = Instant::now();
        let response = request.send().await.map_err(CategorizedError::from)?;
        let latency = request_start.elapsed();
        response.error_for_status().map_err(CategorizedError::from)?;

        results.inc_ops();
        results.inc_rows();
        Ok(latency)
    }
}

/// Increments the counters of one row per request with `POST`.
pub struct HttpCounterUpdate {
    client: reqwest::Client,
    counters_url: String,
}

impl HttpCounterUpdate {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            counters_url: table_url(base_url, COUNTERS_TABLE),
        }
    }
}

#[async_trait]
impl Operation for HttpCounterUpdate {
    async fn execute(
        &mut self,
        workload: &mut dyn WorkloadGenerator,
        results: &mut ResultBuilder,
    ) -> Result<Duration, OperationError> {
        let pk = workload.next_partition_key();
        let ck = workload.next_clustering_key();
        let request = self
            .client
            .post(format!("{}/{}/{}", self.counters_url, pk, ck));

        let request_start = Instant::now();
        let response = request.send().await.map_err(CategorizedError::from)?;
        let latency = request_start.elapsed();
        response.error_for_status().map_err(CategorizedError::from)?;

        results.inc_ops();
        results.inc_rows();
        Ok(latency)
    }
}

/// Writes up to `rows_per_request` rows of one partition per request with `POST`.
pub struct HttpBatchWrite {
    client: reqwest::Client,
    rows_url: String,
    rows_per_request: usize,
    row_size: usize,
    stop: StopSignal,
}

impl HttpBatchWrite {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        rows_per_request: usize,
        row_size: usize,
        stop: StopSignal,
    ) -> Self {
        Self {
            client,
            rows_url: rows_url(base_url),
            rows_per_request,
            row_size,
            stop,
        }
    }
}

#[async_trait]
impl Operation for HttpBatchWrite {
    async fn execute(
        &mut self,
        workload: &mut dyn WorkloadGenerator,
        results: &mut ResultBuilder,
    ) -> Result<Duration, OperationError> {
        let pk = workload.next_partition_key();
        let mut clustering_keys = Vec::with_capacity(self.rows_per_request);
        while !workload.is_partition_done()
            && !self.stop.is_stopped()
            && clustering_keys.len() < self.rows_per_request
        {
            clustering_keys.push(workload.next_clustering_key());
        }
        let batch_size = clustering_keys.len() as u64;

        let request = self
            .client
            .post(format!("{}/{}", self.rows_url, pk))
            .json(&json!({
                "clustering_keys": clustering_keys,
                "value_size": self.row_size,
            }));

        let request_start = Instant::now();
        let response = request.send().await.map_err(CategorizedError::from)?;
        let latency = request_start.elapsed();
        response.error_for_status().map_err(CategorizedError::from)?;

        results.inc_ops();
        results.add_rows(batch_size);
        Ok(latency)
    }
}

/// Reads rows of one partition with `GET`, from the row table or the counter
/// table.
///
/// The [`ReadShape`] picks the query parameters:
///
/// | Shape            | Query                            |
/// |------------------|----------------------------------|
/// | `default`        | `ck={ck}&limit={rows}`           |
/// | `in-restriction` | `ck_in={ck1},{ck2},...`          |
/// | `upper-bound`    | `ck={ck}&ck_end={ck + rows}`     |
/// | `no-lower-bound` | `limit={rows}`                   |
///
/// An `in-restriction` list always holds `rows_per_request` keys; once the
/// partition runs out it is padded with key 0. The response must be a JSON
/// array; its length is the row count.
pub struct HttpRead {
    client: reqwest::Client,
    table_url: String,
    rows_per_request: usize,
    shape: ReadShape,
}

impl HttpRead {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        rows_per_request: usize,
        shape: ReadShape,
    ) -> Self {
        Self {
            client,
            table_url: rows_url(base_url),
            rows_per_request,
            shape,
        }
    }

    pub fn counters(
        client: reqwest::Client,
        base_url: &str,
        rows_per_request: usize,
        shape: ReadShape,
    ) -> Self {
        Self {
            client,
            table_url: table_url(base_url, COUNTERS_TABLE),
            rows_per_request,
            shape,
        }
    }

    fn query(&self, workload: &mut dyn WorkloadGenerator) -> Vec<(&'static str, String)> {
        let limit = self.rows_per_request.to_string();
        match self.shape {
            ReadShape::Default => {
                let ck = workload.next_clustering_key();
                vec![("ck", ck.to_string()), ("limit", limit)]
            }
            ReadShape::InRestriction => {
                let keys: Vec<String> = (0..self.rows_per_request)
                    .map(|_| {
                        if workload.is_partition_done() {
                            0
                        } else {
                            workload.next_clustering_key()
                        }
                    })
                    .map(|ck| ck.to_string())
                    .collect();
                vec![("ck_in", keys.join(","))]
            }
            ReadShape::UpperBound => {
                let ck = workload.next_clustering_key();
                let end = ck.saturating_add(self.rows_per_request as i64);
                vec![("ck", ck.to_string()), ("ck_end", end.to_string())]
            }
            ReadShape::NoLowerBound => vec![("limit", limit)],
        }
    }
}

#[async_trait]
impl Operation for HttpRead {
    async fn execute(
        &mut self,
        workload: &mut dyn WorkloadGenerator,
        results: &mut ResultBuilder,
    ) -> Result<Duration, OperationError> {
        let pk = workload.next_partition_key();
        let query = self.query(workload);
        let request = self
            .client
            .get(format!("{}/{}", self.table_url, pk))
            .query(&query);

        let request_start = Instant::now();
        let response = request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(CategorizedError::from)?;
        let body = response.bytes().await.map_err(CategorizedError::from)?;
        let latency = request_start.elapsed();

        let rows: Vec<serde_json::Value> = serde_json::from_slice(&body).map_err(|e| {
            CategorizedError::new(
                ErrorCategory::ResponseError,
                format!("expected a JSON array of rows: {}", e),
            )
        })?;

        results.add_rows(rows.len() as u64);
        results.inc_ops();
        Ok(latency)
    }
}
