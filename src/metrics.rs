use async_trait::async_trait;
use prometheus::{Encoder, Gauge, Opts, Registry, TextEncoder};
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::info;

use crate::histogram::LatencySummary;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),

    #[error("Failed to push metrics: {0}")]
    Push(#[from] reqwest::Error),
}

/// Destination for live latency gauges. Publishing is best-effort.
#[async_trait]
pub trait MetricsSink: Send {
    async fn publish(&mut self, latency: &LatencySummary) -> Result<(), MetricsError>;
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NoopMetricsSink;

#[async_trait]
impl MetricsSink for NoopMetricsSink {
    async fn publish(&mut self, _latency: &LatencySummary) -> Result<(), MetricsError> {
        Ok(())
    }
}

/// Pushes max/p99/p90/p50 latency gauges (nanoseconds) to a Prometheus Pushgateway.
pub struct PushGatewaySink {
    client: reqwest::Client,
    push_url: String,
    registry: Registry,
    lat_max: Gauge,
    lat_99: Gauge,
    lat_90: Gauge,
    lat_50: Gauge,
}

impl PushGatewaySink {
    /// `gateway_url` is the Pushgateway base URL; `job` names the run.
    pub fn new(
        client: reqwest::Client,
        gateway_url: &str,
        job: &str,
    ) -> Result<Self, MetricsError> {
        let lat_max = Gauge::with_opts(Opts::new("lat_max", "Highest latency"))?;
        let lat_99 = Gauge::with_opts(Opts::new("lat_99", "99th percentile latency"))?;
        let lat_90 = Gauge::with_opts(Opts::new("lat_90", "90th percentile latency"))?;
        let lat_50 = Gauge::with_opts(Opts::new("lat_50", "50th percentile latency"))?;

        let registry = Registry::new();
        registry.register(Box::new(lat_max.clone()))?;
        registry.register(Box::new(lat_99.clone()))?;
        registry.register(Box::new(lat_90.clone()))?;
        registry.register(Box::new(lat_50.clone()))?;

        let push_url = format!(
            "{}/metrics/job/{}",
            gateway_url.trim_end_matches('/'),
            job
        );
        info!(push_url = %push_url, "Latency gauges will be pushed");

        Ok(Self {
            client,
            push_url,
            registry,
            lat_max,
            lat_99,
            lat_90,
            lat_50,
        })
    }

    pub fn push_url(&self) -> &str {
        &self.push_url
    }

    /// Current gauges in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<Vec<u8>, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    fn set(&self, latency: &LatencySummary) {
        self.lat_max.set(latency.max as f64);
        self.lat_99.set(latency.p99 as f64);
        self.lat_90.set(latency.p90 as f64);
        self.lat_50.set(latency.p50 as f64);
    }
}

#[async_trait]
impl MetricsSink for PushGatewaySink {
    async fn publish(&mut self, latency: &LatencySummary) -> Result<(), MetricsError> {
        self.set(latency);
        let body = self.encode()?;

        self.client
            .put(&self.push_url)
            .header(CONTENT_TYPE, TextEncoder::new().format_type())
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
