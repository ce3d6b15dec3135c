// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use serde::Serialize;
use std::time::Instant;

/// Capture metrics collected while streaming
#[derive(Debug, Clone, Serialize)]
pub struct FrameMetrics {
    /// Total number of frames retired with data
    pub frames_captured: u64,
    /// Buffers handed back without data
    pub frames_aborted: u64,
    /// Total bytes written by the DMA
    pub bytes_captured: u64,
    /// Total duration in milliseconds
    pub duration_ms: u64,
    /// Average throughput in frames per second
    pub throughput_fps: f64,
    /// Average bandwidth in megabits per second
    pub bandwidth_mbps: f64,
    /// Minimum completion-to-dequeue latency in microseconds
    pub latency_min_us: u64,
    /// Maximum latency in microseconds
    pub latency_max_us: u64,
    /// Average latency in microseconds
    pub latency_avg_us: u64,
    /// 50th percentile (median) latency in microseconds
    pub latency_p50_us: u64,
    /// 95th percentile latency in microseconds
    pub latency_p95_us: u64,
    /// 99th percentile latency in microseconds
    pub latency_p99_us: u64,
    /// Missing sequence numbers
    pub sequence_gaps: u64,
}

/// Metrics collector for completed buffers
pub struct MetricsCollector {
    start_time: Instant,
    latencies_us: Vec<u64>,
    bytes: u64,
    aborted: u64,
    prev_sequence: Option<u32>,
    sequence_gaps: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            latencies_us: Vec::new(),
            bytes: 0,
            aborted: 0,
            prev_sequence: None,
            sequence_gaps: 0,
        }
    }

    /// Record a frame's latency in nanoseconds
    pub fn record_latency_ns(&mut self, latency_ns: i64) {
        let latency_us = (latency_ns.max(0) / 1000) as u64;
        self.latencies_us.push(latency_us);
    }

    /// Record a frame's latency in microseconds
    pub fn record_latency_us(&mut self, latency_us: u64) {
        self.latencies_us.push(latency_us);
    }

    pub fn record_bytes(&mut self, bytes: u64) {
        self.bytes += bytes;
    }

    pub fn record_aborted(&mut self) {
        self.aborted += 1;
    }

    /// Track a retired buffer's sequence number.
    /// Returns the number of sequence numbers skipped since the previous one.
    pub fn track_sequence(&mut self, sequence: u32) -> u64 {
        let gaps = match self.prev_sequence {
            Some(prev) => {
                let expected = prev.wrapping_add(1);
                if sequence == expected {
                    0
                } else if sequence > expected {
                    u64::from(sequence - expected)
                } else {
                    // numbering restarts at queue setup
                    log::warn!("Sequence number decreased: {} -> {}", prev, sequence);
                    0
                }
            }
            None => 0,
        };

        self.sequence_gaps += gaps;
        self.prev_sequence = Some(sequence);
        gaps
    }

    /// Finalize and calculate all metrics
    pub fn finalize(&mut self) -> FrameMetrics {
        let duration = self.start_time.elapsed();
        let duration_ms = duration.as_millis() as u64;
        let duration_secs = duration.as_secs_f64();

        let frames_captured = self.latencies_us.len() as u64;

        let throughput_fps = if duration_secs > 0.0 {
            frames_captured as f64 / duration_secs
        } else {
            0.0
        };

        let bandwidth_mbps = if duration_secs > 0.0 {
            (self.bytes as f64 * 8.0) / (duration_secs * 1_000_000.0)
        } else {
            0.0
        };

        self.latencies_us.sort_unstable();
        let (min_us, max_us, avg_us) = match (self.latencies_us.first(), self.latencies_us.last()) {
            (Some(&min), Some(&max)) => {
                let sum: u64 = self.latencies_us.iter().sum();
                (min, max, sum / self.latencies_us.len() as u64)
            }
            _ => (0, 0, 0),
        };

        FrameMetrics {
            frames_captured,
            frames_aborted: self.aborted,
            bytes_captured: self.bytes,
            duration_ms,
            throughput_fps,
            bandwidth_mbps,
            latency_min_us: min_us,
            latency_max_us: max_us,
            latency_avg_us: avg_us,
            latency_p50_us: self.percentile(50.0),
            latency_p95_us: self.percentile(95.0),
            latency_p99_us: self.percentile(99.0),
            sequence_gaps: self.sequence_gaps,
        }
    }

    /// Percentile of the sorted latency data
    fn percentile(&self, p: f64) -> u64 {
        if self.latencies_us.is_empty() {
            return 0;
        }

        let len = self.latencies_us.len();
        let idx = ((p / 100.0) * (len - 1) as f64).round() as usize;
        self.latencies_us[idx.min(len - 1)]
    }

    /// Print metrics in human-readable format
    pub fn print_text(&mut self) {
        let metrics = self.finalize();
        println!("\n=== Capture Metrics ===");
        println!("Frames captured:   {}", metrics.frames_captured);
        println!("Frames aborted:    {}", metrics.frames_aborted);
        println!(
            "Bytes captured:    {} ({:.2} MB)",
            metrics.bytes_captured,
            metrics.bytes_captured as f64 / 1_048_576.0
        );
        println!(
            "Duration:          {:.2} s",
            metrics.duration_ms as f64 / 1000.0
        );
        println!("Throughput:        {:.2} fps", metrics.throughput_fps);
        println!("Bandwidth:         {:.2} Mbps", metrics.bandwidth_mbps);

        if metrics.frames_captured > 0 {
            println!("\nLatency Statistics (us):");
            println!("  Min:    {}", metrics.latency_min_us);
            println!("  Max:    {}", metrics.latency_max_us);
            println!("  Avg:    {}", metrics.latency_avg_us);
            println!("  P50:    {}", metrics.latency_p50_us);
            println!("  P95:    {}", metrics.latency_p95_us);
            println!("  P99:    {}", metrics.latency_p99_us);
        }

        if metrics.sequence_gaps > 0 {
            println!("\nSequence gaps:     {}", metrics.sequence_gaps);
        }
    }

    /// Print metrics in JSON format
    pub fn print_json(&mut self) -> Result<(), serde_json::Error> {
        let metrics = self.finalize();
        let json = serde_json::to_string_pretty(&metrics)?;
        println!("{}", json);
        Ok(())
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
