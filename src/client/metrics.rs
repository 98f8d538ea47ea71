use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMetric {
    pub method: String,
    pub endpoint: String,
    pub start_time: u64, // milliseconds since epoch
    pub latency_ms: u64,
    /// `None` when no response arrived (network failure)
    pub status: Option<u16>,
    pub success: bool,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AggregatedStats {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub unauthorized_responses: usize,
    pub failure_rate: f64,

    // Latency statistics (milliseconds)
    pub latency_min_ms: u64,
    pub latency_max_ms: u64,
    pub latency_avg_ms: f64,
    pub latency_p50_ms: u64,
    pub latency_p95_ms: u64,
    pub latency_p99_ms: u64,

    // Requests per endpoint
    pub endpoint_distribution: HashMap<String, usize>,

    // Failure reasons breakdown
    pub failure_reasons: HashMap<String, usize>,
}

#[derive(Debug)]
pub struct ClientMetrics {
    client_name: String,
    start_time: Instant,
    requests: Vec<RequestMetric>,
}

impl ClientMetrics {
    pub fn new(client_name: String) -> Self {
        Self {
            client_name,
            start_time: Instant::now(),
            requests: Vec::new(),
        }
    }

    pub fn record_request(
        &mut self,
        method: &str,
        endpoint: &str,
        latency: Duration,
        status: Option<u16>,
        failure_reason: Option<String>,
    ) {
        let start_time = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let latency_ms = latency.as_millis() as u64;

        self.requests.push(RequestMetric {
            method: method.to_string(),
            endpoint: endpoint.to_string(),
            start_time: start_time.saturating_sub(latency_ms),
            latency_ms,
            status,
            success: failure_reason.is_none(),
            failure_reason,
        });
    }

    pub fn requests(&self) -> &[RequestMetric] {
        &self.requests
    }

    pub fn aggregate(&self) -> AggregatedStats {
        let mut stats = AggregatedStats::default();

        if self.requests.is_empty() {
            return stats;
        }

        stats.total_requests = self.requests.len();
        stats.successful_requests = self.requests.iter().filter(|r| r.success).count();
        stats.failed_requests = stats.total_requests - stats.successful_requests;
        stats.unauthorized_responses = self
            .requests
            .iter()
            .filter(|r| r.status == Some(401))
            .count();
        stats.failure_rate = (stats.failed_requests as f64 / stats.total_requests as f64) * 100.0;

        // Latency statistics over successful requests
        let mut successful_latencies: Vec<u64> = self
            .requests
            .iter()
            .filter(|r| r.success)
            .map(|r| r.latency_ms)
            .collect();

        if !successful_latencies.is_empty() {
            successful_latencies.sort_unstable();

            stats.latency_min_ms = successful_latencies[0];
            stats.latency_max_ms = successful_latencies[successful_latencies.len() - 1];
            stats.latency_avg_ms = successful_latencies.iter().sum::<u64>() as f64
                / successful_latencies.len() as f64;

            stats.latency_p50_ms = percentile(&successful_latencies, 50.0);
            stats.latency_p95_ms = percentile(&successful_latencies, 95.0);
            stats.latency_p99_ms = percentile(&successful_latencies, 99.0);
        }

        for request in &self.requests {
            let key = format!("{} {}", request.method, request.endpoint);
            *stats.endpoint_distribution.entry(key).or_insert(0) += 1;
        }

        for request in self.requests.iter().filter(|r| !r.success) {
            if let Some(reason) = &request.failure_reason {
                *stats.failure_reasons.entry(reason.clone()).or_insert(0) += 1;
            }
        }

        stats
    }

    pub fn export_to_json<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let stats = self.aggregate();

        let output = serde_json::json!({
            "client_name": self.client_name,
            "session_duration_secs": self.start_time.elapsed().as_secs(),
            "aggregated_stats": stats,
            "requests": self.requests,
        });

        let json_string = serde_json::to_string_pretty(&output)?;
        let mut file = File::create(path)?;
        file.write_all(json_string.as_bytes())?;

        Ok(())
    }
}

fn percentile(sorted_data: &[u64], percentile: f64) -> u64 {
    if sorted_data.is_empty() {
        return 0;
    }

    let index = (percentile / 100.0 * (sorted_data.len() - 1) as f64).round() as usize;
    sorted_data[index.min(sorted_data.len() - 1)]
}
