// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Resource Monitor
//!
//! Periodic CPU/memory/disk sampling over a pluggable [`ResourceProbe`]
//! (the OS-level probe is an external collaborator; the `sysinfo`-backed
//! implementation lives in the infrastructure layer). While active, the
//! monitor samples at ~1 Hz into a bounded history ring and exposes:
//!
//! - the current snapshot, running average, and peak;
//! - a trend comparing the first five samples against the last five
//!   (±10% classified as increasing/decreasing, else stable);
//! - threshold alerts (CPU 90, memory 85, disk 95) in WARNING and
//!   CRITICAL tiers;
//! - short textual recommendations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;

/// Default sampling cadence.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Bounded history size (about five minutes at 1 Hz).
const HISTORY_CAPACITY: usize = 300;

/// One point-in-time reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub disk_percent: f32,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
}

impl ResourceSample {
    pub fn now(cpu_percent: f32, memory_percent: f32, disk_percent: f32) -> Self {
        Self {
            timestamp: Utc::now(),
            cpu_percent,
            memory_percent,
            disk_percent,
            memory_used_bytes: 0,
            memory_total_bytes: 0,
        }
    }

    pub fn with_memory_bytes(mut self, used: u64, total: u64) -> Self {
        self.memory_used_bytes = used;
        self.memory_total_bytes = total;
        self
    }
}

/// Port over the OS-level probe.
pub trait ResourceProbe: Send + Sync {
    fn sample(&self) -> ResourceSample;
}

/// Aggregated usage over the history window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSummary {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub disk_percent: f32,
}

/// Direction of a metric over the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

/// Per-metric trends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceTrends {
    pub cpu: Trend,
    pub memory: Trend,
}

/// Alert tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

/// One threshold crossing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceAlert {
    pub kind: String,
    pub metric: String,
    pub current_value: f32,
    pub threshold: f32,
    pub severity: AlertSeverity,
}

/// Alert thresholds in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    pub cpu: f32,
    pub memory: f32,
    pub disk: f32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            cpu: 90.0,
            memory: 85.0,
            disk: 95.0,
        }
    }
}

/// Periodic sampler with history-backed analytics.
pub struct ResourceMonitor {
    probe: Arc<dyn ResourceProbe>,
    history: Arc<Mutex<VecDeque<ResourceSample>>>,
    active: Arc<AtomicBool>,
    sampler: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ResourceMonitor {
    pub fn new(probe: Arc<dyn ResourceProbe>) -> Self {
        Self {
            probe,
            history: Arc::new(Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY))),
            active: Arc::new(AtomicBool::new(false)),
            sampler: Mutex::new(None),
        }
    }

    /// Starts the ~1 Hz background sampler. Idempotent.
    pub fn start(&self) {
        if self.active.swap(true, Ordering::SeqCst) {
            return;
        }
        let probe = self.probe.clone();
        let history = self.history.clone();
        let active = self.active.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
            while active.load(Ordering::SeqCst) {
                ticker.tick().await;
                let sample = probe.sample();
                let mut history = history.lock();
                if history.len() == HISTORY_CAPACITY {
                    history.pop_front();
                }
                history.push_back(sample);
            }
        });
        *self.sampler.lock() = Some(handle);
    }

    /// Stops the sampler; history is retained.
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(handle) = self.sampler.lock().take() {
            handle.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.history.lock().clear();
    }

    pub fn samples_collected(&self) -> usize {
        self.history.lock().len()
    }

    /// Probes immediately, records the sample, and returns it. Used by the
    /// dispatcher's admission check.
    pub fn sample_now(&self) -> ResourceSample {
        let sample = self.probe.sample();
        let mut history = self.history.lock();
        if history.len() == HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(sample.clone());
        sample
    }

    /// Most recent sample, probing when the history is empty.
    pub fn current(&self) -> ResourceSample {
        if let Some(sample) = self.history.lock().back().cloned() {
            return sample;
        }
        self.sample_now()
    }

    /// Running average over the history window.
    pub fn average(&self) -> Option<UsageSummary> {
        let history = self.history.lock();
        if history.is_empty() {
            return None;
        }
        let n = history.len() as f32;
        Some(UsageSummary {
            cpu_percent: history.iter().map(|s| s.cpu_percent).sum::<f32>() / n,
            memory_percent: history.iter().map(|s| s.memory_percent).sum::<f32>() / n,
            disk_percent: history.iter().map(|s| s.disk_percent).sum::<f32>() / n,
        })
    }

    /// Peak usage over the history window.
    pub fn peak(&self) -> Option<UsageSummary> {
        let history = self.history.lock();
        if history.is_empty() {
            return None;
        }
        Some(UsageSummary {
            cpu_percent: history.iter().map(|s| s.cpu_percent).fold(0.0, f32::max),
            memory_percent: history.iter().map(|s| s.memory_percent).fold(0.0, f32::max),
            disk_percent: history.iter().map(|s| s.disk_percent).fold(0.0, f32::max),
        })
    }

    fn trend_of(values: &[f32]) -> Trend {
        if values.len() < 2 {
            return Trend::InsufficientData;
        }
        let window = values.len().min(5);
        let earlier: f32 = values[..window].iter().sum::<f32>() / window as f32;
        let recent: f32 = values[values.len() - window..].iter().sum::<f32>() / window as f32;
        if recent > earlier * 1.1 {
            Trend::Increasing
        } else if recent < earlier * 0.9 {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }

    /// First-five vs last-five comparison per metric.
    pub fn trend(&self) -> ResourceTrends {
        let history = self.history.lock();
        let cpu: Vec<f32> = history.iter().map(|s| s.cpu_percent).collect();
        let memory: Vec<f32> = history.iter().map(|s| s.memory_percent).collect();
        ResourceTrends {
            cpu: Self::trend_of(&cpu),
            memory: Self::trend_of(&memory),
        }
    }

    /// Threshold alerts against the current snapshot.
    pub fn alerts(&self, thresholds: &AlertThresholds) -> Vec<ResourceAlert> {
        let current = self.current();
        let mut alerts = Vec::new();

        if current.cpu_percent > thresholds.cpu {
            alerts.push(ResourceAlert {
                kind: "HIGH_CPU".to_string(),
                metric: "cpu_percent".to_string(),
                current_value: current.cpu_percent,
                threshold: thresholds.cpu,
                severity: if current.cpu_percent < thresholds.cpu + 10.0 {
                    AlertSeverity::Warning
                } else {
                    AlertSeverity::Critical
                },
            });
        }
        if current.memory_percent > thresholds.memory {
            alerts.push(ResourceAlert {
                kind: "HIGH_MEMORY".to_string(),
                metric: "memory_percent".to_string(),
                current_value: current.memory_percent,
                threshold: thresholds.memory,
                severity: if current.memory_percent < thresholds.memory + 10.0 {
                    AlertSeverity::Warning
                } else {
                    AlertSeverity::Critical
                },
            });
        }
        if current.disk_percent > thresholds.disk {
            alerts.push(ResourceAlert {
                kind: "HIGH_DISK".to_string(),
                metric: "disk_percent".to_string(),
                current_value: current.disk_percent,
                threshold: thresholds.disk,
                severity: if current.disk_percent < thresholds.disk + 5.0 {
                    AlertSeverity::Warning
                } else {
                    AlertSeverity::Critical
                },
            });
        }

        alerts
    }

    /// Short textual hints derived from the current snapshot.
    pub fn recommendations(&self) -> Vec<String> {
        let current = self.current();
        let mut recommendations = Vec::new();

        if current.memory_percent > 85.0 {
            recommendations
                .push("High memory usage detected - consider reducing parallel processing".to_string());
        }
        if current.cpu_percent > 90.0 {
            recommendations.push("High CPU usage detected - consider reducing worker count".to_string());
        }
        if current.disk_percent > 90.0 {
            recommendations.push("High disk usage detected - clean up temporary files".to_string());
        }
        if recommendations.is_empty() {
            recommendations.push("System resources are within normal ranges".to_string());
        }
        recommendations
    }

    /// Full monitoring summary for diagnostics.
    pub fn summary(&self) -> serde_json::Value {
        json!({
            "current": self.current(),
            "average": self.average(),
            "peak": self.peak(),
            "trends": self.trend(),
            "alerts": self.alerts(&AlertThresholds::default()),
            "recommendations": self.recommendations(),
            "samples_collected": self.samples_collected(),
            "status": if self.is_active() { "monitoring_active" } else { "monitoring_inactive" },
        })
    }
}
