use crate::utils::round1;
use ampcord_protocol::management::instance::{
    MetricsAverages, MetricsHistorySnapshot, RawMetric,
};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// Samples kept per tracked metric and instance.
pub const HISTORY_CAP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedMetric {
    Cpu,
    Memory,
    Tps,
}

impl TrackedMetric {
    pub const ALL: [TrackedMetric; 3] =
        [TrackedMetric::Cpu, TrackedMetric::Memory, TrackedMetric::Tps];

    /// Names the panel uses for this metric, in lookup order.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            TrackedMetric::Cpu => &["CPU Usage", "CPU", "Cpu Usage", "Processor"],
            TrackedMetric::Memory => &["Memory Usage", "Memory", "RAM Usage", "RAM"],
            TrackedMetric::Tps => &["TPS", "Tick Rate", "Ticks Per Second"],
        }
    }

    pub fn find<'a>(
        &self,
        metrics: &'a HashMap<String, RawMetric>,
    ) -> Option<(&'static str, &'a RawMetric)> {
        self.aliases()
            .iter()
            .find_map(|alias| metrics.get(*alias).map(|m| (*alias, m)))
    }
}

#[derive(Default)]
struct InstanceHistory {
    cpu: VecDeque<f64>,
    memory: VecDeque<f64>,
    tps: VecDeque<f64>,
}

impl InstanceHistory {
    fn series_mut(&mut self, metric: TrackedMetric) -> &mut VecDeque<f64> {
        match metric {
            TrackedMetric::Cpu => &mut self.cpu,
            TrackedMetric::Memory => &mut self.memory,
            TrackedMetric::Tps => &mut self.tps,
        }
    }

    fn push(&mut self, metric: TrackedMetric, value: f64) {
        let series = self.series_mut(metric);
        series.push_back(value);
        while series.len() > HISTORY_CAP {
            series.pop_front();
        }
    }

    fn snapshot(&self) -> MetricsHistorySnapshot {
        MetricsHistorySnapshot {
            cpu: self.cpu.iter().copied().collect(),
            memory: self.memory.iter().copied().collect(),
            tps: self.tps.iter().copied().collect(),
        }
    }
}

/// Rolling CPU/Memory/TPS samples for every instance, kept in memory only.
pub struct MetricsHistory {
    series: scc::HashMap<Uuid, InstanceHistory, ahash::RandomState>,
}

impl MetricsHistory {
    pub fn new() -> Self {
        Self {
            series: scc::HashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    /// Appends one sample per tracked metric present in `metrics`.
    pub async fn record(
        &self,
        id: Uuid,
        metrics: &HashMap<String, RawMetric>,
    ) -> MetricsHistorySnapshot {
        let mut entry = self.series.entry_async(id).await.or_default();
        let history = entry.get_mut();
        for metric in TrackedMetric::ALL {
            if let Some(value) = metric.find(metrics).and_then(|(_, raw)| raw.sample_value()) {
                history.push(metric, value);
            }
        }
        history.snapshot()
    }

    pub async fn forget(&self, id: Uuid) {
        self.series.remove_async(&id).await;
    }
}

impl Default for MetricsHistory {
    fn default() -> Self {
        Self::new()
    }
}

pub fn averages(snapshot: &MetricsHistorySnapshot) -> MetricsAverages {
    let avg = |series: &[f64]| {
        (!series.is_empty()).then(|| round1(series.iter().sum::<f64>() / series.len() as f64))
    };
    MetricsAverages {
        cpu: avg(&snapshot.cpu),
        memory: avg(&snapshot.memory),
        tps: avg(&snapshot.tps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn metric(raw: f64, percent: f64) -> RawMetric {
        RawMetric {
            raw_value: raw,
            percent,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_history_is_bounded_fifo() {
        let history = MetricsHistory::new();
        let id = Uuid::new_v4();
        let mut snapshot = MetricsHistorySnapshot::default();
        for i in 0..55 {
            let metrics = HashMap::from([("CPU Usage".to_string(), metric(i as f64, 0.0))]);
            snapshot = history.record(id, &metrics).await;
            assert!(snapshot.cpu.len() <= HISTORY_CAP);
        }
        let expected: Vec<f64> = (35..55).map(|i| i as f64).collect();
        assert_eq!(snapshot.cpu, expected);
        assert!(snapshot.memory.is_empty());
        assert!(snapshot.tps.is_empty());
    }

    #[tokio::test]
    async fn test_nan_raw_value_records_percent() {
        let history = MetricsHistory::new();
        let id = Uuid::new_v4();
        let metrics = HashMap::from([("CPU Usage".to_string(), metric(f64::NAN, 42.0))]);
        let snapshot = history.record(id, &metrics).await;
        assert_eq!(snapshot.cpu, vec![42.0]);
    }

    #[tokio::test]
    async fn test_first_alias_wins() {
        let history = MetricsHistory::new();
        let id = Uuid::new_v4();
        let metrics = HashMap::from([
            ("RAM".to_string(), metric(1.0, 0.0)),
            ("Memory Usage".to_string(), metric(2048.0, 0.0)),
            ("Tick Rate".to_string(), metric(19.5, 0.0)),
        ]);
        let snapshot = history.record(id, &metrics).await;
        assert_eq!(snapshot.memory, vec![2048.0]);
        assert_eq!(snapshot.tps, vec![19.5]);
    }

    #[tokio::test]
    async fn test_forget_drops_series() {
        let history = MetricsHistory::new();
        let id = Uuid::new_v4();
        let metrics = HashMap::from([("TPS".to_string(), metric(20.0, 0.0))]);
        history.record(id, &metrics).await;
        assert_eq!(history.series.len(), 1);
        history.forget(id).await;
        assert_eq!(history.series.len(), 0);
    }

    #[test]
    fn test_averages_round_to_one_decimal() {
        let snapshot = MetricsHistorySnapshot {
            cpu: vec![10.0, 10.5, 11.0, 12.0],
            memory: vec![],
            tps: vec![19.96, 20.0],
        };
        let averages = averages(&snapshot);
        assert_eq!(averages.cpu, Some(10.9));
        assert_eq!(averages.memory, None);
        assert_eq!(averages.tps, Some(20.0));
    }
}
