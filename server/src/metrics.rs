// Metrics collection and tracking

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Mark process start for uptime reporting
pub fn mark_start() {
    let _ = START_TIME.get_or_init(Instant::now);
}

/// Per-endpoint metrics
#[derive(Debug, Clone)]
pub struct EndpointMetrics {
    pub request_count: Arc<AtomicU64>,
    pub error_count: Arc<AtomicU64>,
    pub total_latency_ms: Arc<AtomicU64>,
    pub min_latency_ms: Arc<AtomicU64>,
    pub max_latency_ms: Arc<AtomicU64>,
    // Last 1000 samples, for percentiles
    pub latency_samples: Arc<std::sync::Mutex<Vec<u64>>>,
}

impl EndpointMetrics {
    pub fn new() -> Self {
        Self {
            request_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            total_latency_ms: Arc::new(AtomicU64::new(0)),
            min_latency_ms: Arc::new(AtomicU64::new(u64::MAX)),
            max_latency_ms: Arc::new(AtomicU64::new(0)),
            latency_samples: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn record_request(&self, latency_ms: u64) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.min_latency_ms.fetch_min(latency_ms, Ordering::Relaxed);
        self.max_latency_ms.fetch_max(latency_ms, Ordering::Relaxed);

        if let Ok(mut samples) = self.latency_samples.lock() {
            samples.push(latency_ms);
            if samples.len() > 1000 {
                samples.remove(0);
            }
        }
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_latency_ms(&self) -> f64 {
        let count = self.request_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        total as f64 / count as f64
    }

    fn percentile(&self, p: u8) -> u64 {
        if let Ok(samples) = self.latency_samples.lock() {
            if samples.is_empty() {
                return 0;
            }
            let mut sorted = samples.clone();
            sorted.sort_unstable();
            let index = (sorted.len() * p as usize / 100).min(sorted.len() - 1);
            sorted[index]
        } else {
            0
        }
    }

    pub fn stats(&self) -> EndpointStats {
        let min = self.min_latency_ms.load(Ordering::Relaxed);
        EndpointStats {
            request_count: self.request_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            avg_latency_ms: self.avg_latency_ms(),
            min_latency_ms: if min == u64::MAX { 0 } else { min },
            max_latency_ms: self.max_latency_ms.load(Ordering::Relaxed),
            p50_latency_ms: self.percentile(50),
            p95_latency_ms: self.percentile(95),
            p99_latency_ms: self.percentile(99),
        }
    }
}

impl Default for EndpointMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Synthesis pipeline counters
#[derive(Debug, Clone)]
pub struct TtsMetrics {
    pub synthesized: Arc<AtomicU64>,
    pub cache_hits: Arc<AtomicU64>,
    pub failures: Arc<AtomicU64>,
    pub total_synthesis_time_ms: Arc<AtomicU64>,
}

impl TtsMetrics {
    pub fn new() -> Self {
        Self {
            synthesized: Arc::new(AtomicU64::new(0)),
            cache_hits: Arc::new(AtomicU64::new(0)),
            failures: Arc::new(AtomicU64::new(0)),
            total_synthesis_time_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_synthesis(&self, time_ms: u64, cache_hit: bool) {
        if cache_hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.synthesized.fetch_add(1, Ordering::Relaxed);
            self.total_synthesis_time_ms.fetch_add(time_ms, Ordering::Relaxed);
        }
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_synthesis_time_ms(&self) -> f64 {
        let count = self.synthesized.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.total_synthesis_time_ms.load(Ordering::Relaxed) as f64 / count as f64
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let total = hits + self.synthesized.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        (hits as f64 / total as f64) * 100.0
    }
}

impl Default for TtsMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct AppMetrics {
    pub tts: EndpointMetrics,
    pub tts_specific: TtsMetrics,
    // CPU usage is a delta between refreshes, so one System lives for the process
    system: Arc<std::sync::Mutex<sysinfo::System>>,
}

impl AppMetrics {
    pub fn new() -> Self {
        let mut system = sysinfo::System::new();
        system.refresh_cpu();
        system.refresh_memory();
        Self {
            tts: EndpointMetrics::new(),
            tts_specific: TtsMetrics::new(),
            system: Arc::new(std::sync::Mutex::new(system)),
        }
    }

    pub fn snapshot(&self) -> DetailedMetricsResponse {
        DetailedMetricsResponse {
            timestamp: Utc::now(),
            system: self.system_metrics(self.tts.request_count.load(Ordering::Relaxed)),
            endpoints: EndpointMetricsResponse { tts: self.tts.stats() },
            tts: TtsMetricsResponse {
                synthesized: self.tts_specific.synthesized.load(Ordering::Relaxed),
                cache_hits: self.tts_specific.cache_hits.load(Ordering::Relaxed),
                failures: self.tts_specific.failures.load(Ordering::Relaxed),
                avg_synthesis_time_ms: self.tts_specific.avg_synthesis_time_ms(),
                cache_hit_rate: self.tts_specific.cache_hit_rate(),
            },
        }
    }

    fn system_metrics(&self, request_count: u64) -> SystemMetrics {
        let (cpu_usage_percent, memory_used, memory_total) = match self.system.lock() {
            Ok(mut system) => {
                system.refresh_cpu();
                system.refresh_memory();
                (
                    system.global_cpu_info().cpu_usage(),
                    system.used_memory(),
                    system.total_memory(),
                )
            }
            Err(_) => (0.0, 0, 0),
        };

        let memory_usage_percent = if memory_total > 0 {
            (memory_used as f64 / memory_total as f64 * 100.0) as f32
        } else {
            0.0
        };

        let uptime_seconds = START_TIME
            .get()
            .map(|start| start.elapsed().as_secs())
            .unwrap_or(0);

        SystemMetrics {
            cpu_usage_percent,
            memory_used_mb: memory_used / 1024 / 1024,
            memory_total_mb: memory_total / 1024 / 1024,
            memory_usage_percent,
            request_count,
            uptime_seconds,
            system_load: sysinfo::System::load_average().one.into(),
        }
    }
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct DetailedMetricsResponse {
    pub timestamp: DateTime<Utc>,
    pub system: SystemMetrics,
    pub endpoints: EndpointMetricsResponse,
    pub tts: TtsMetricsResponse,
}

#[derive(Serialize)]
pub struct SystemMetrics {
    pub cpu_usage_percent: f32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub memory_usage_percent: f32,
    pub request_count: u64,
    pub uptime_seconds: u64,
    pub system_load: Option<f64>,
}

#[derive(Serialize)]
pub struct EndpointMetricsResponse {
    pub tts: EndpointStats,
}

#[derive(Serialize)]
pub struct EndpointStats {
    pub request_count: u64,
    pub error_count: u64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
    pub p99_latency_ms: u64,
}

#[derive(Serialize)]
pub struct TtsMetricsResponse {
    pub synthesized: u64,
    pub cache_hits: u64,
    pub failures: u64,
    pub avg_synthesis_time_ms: f64,
    pub cache_hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_stats() {
        let m = EndpointMetrics::new();
        assert_eq!(m.stats().min_latency_ms, 0);
        for ms in [10, 30, 20] {
            m.record_request(ms);
        }
        m.record_error();
        let stats = m.stats();
        assert_eq!(stats.request_count, 3);
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.min_latency_ms, 10);
        assert_eq!(stats.max_latency_ms, 30);
        assert_eq!(stats.avg_latency_ms, 20.0);
    }

    #[test]
    fn test_cache_hit_rate() {
        let m = TtsMetrics::new();
        assert_eq!(m.cache_hit_rate(), 0.0);
        m.record_synthesis(100, false);
        m.record_synthesis(1, true);
        m.record_synthesis(1, true);
        m.record_synthesis(300, false);
        assert_eq!(m.cache_hit_rate(), 50.0);
        assert_eq!(m.avg_synthesis_time_ms(), 200.0);
    }

    #[test]
    fn test_snapshots_share_one_system_sampler() {
        let m = AppMetrics::new();
        let clone = m.clone();
        assert!(Arc::ptr_eq(&m.system, &clone.system));

        m.snapshot();
        let snap = clone.snapshot();
        assert!(snap.system.cpu_usage_percent >= 0.0);
        assert!(snap.system.memory_usage_percent <= 100.0);
    }
}
