//! Broadband collector
//!
//! Runs once per scrape: fetch line information, map every line onto the
//! four per-line series and report whether the fetch worked. Nothing is
//! kept between scrapes apart from the shared [`ScrapeStatus`] cell.

use aaisp_chaos::{BroadbandInfo, Chaos, ChaosError};
use async_trait::async_trait;
use prometheus::proto::{Counter, Gauge, LabelPair, Metric, MetricFamily, MetricType};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

pub const LINE_LABEL: &str = "line_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// Name, help text and type of one exported series.
#[derive(Debug, PartialEq, Eq)]
pub struct MetricDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
}

pub static QUOTA_REMAINING: MetricDesc = MetricDesc {
    name: "aaisp_broadband_quota_remaining",
    help: "Quota remaining in bytes",
    kind: MetricKind::Gauge,
};

pub static QUOTA_TOTAL: MetricDesc = MetricDesc {
    name: "aaisp_broadband_quota_total",
    help: "Quota total in bytes",
    kind: MetricKind::Counter,
};

pub static TX_RATE: MetricDesc = MetricDesc {
    name: "aaisp_broadband_tx_rate",
    help: "Line transmit rate in bits per second",
    kind: MetricKind::Gauge,
};

pub static RX_RATE: MetricDesc = MetricDesc {
    name: "aaisp_broadband_rx_rate",
    help: "Line receive rate in bits per second",
    kind: MetricKind::Gauge,
};

pub static SCRAPE_SUCCESS: MetricDesc = MetricDesc {
    name: "aaisp_scrape_success",
    help: "Displays whether or not the AAISP API scrape was a success",
    kind: MetricKind::Gauge,
};

/// One value produced by a scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub desc: &'static MetricDesc,
    pub line_id: Option<String>,
    pub value: f64,
}

impl Sample {
    fn line(desc: &'static MetricDesc, line: &BroadbandInfo, value: i64) -> Self {
        Self {
            desc,
            line_id: Some(line.id.to_string()),
            value: value as f64,
        }
    }

    fn scrape_success(up: bool) -> Self {
        Self {
            desc: &SCRAPE_SUCCESS,
            line_id: None,
            value: if up { 1.0 } else { 0.0 },
        }
    }
}

/// Last scrape outcome, shared by every request handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeState {
    Unknown,
    Down,
    Up,
}

#[derive(Debug, Default)]
pub struct ScrapeStatus(AtomicU8);

impl ScrapeStatus {
    const UNKNOWN: u8 = 0;
    const DOWN: u8 = 1;
    const UP: u8 = 2;

    pub fn new() -> Self {
        Self(AtomicU8::new(Self::UNKNOWN))
    }

    pub fn set_up(&self) {
        self.0.store(Self::UP, Ordering::Release);
    }

    pub fn set_down(&self) {
        self.0.store(Self::DOWN, Ordering::Release);
    }

    pub fn get(&self) -> ScrapeState {
        match self.0.load(Ordering::Acquire) {
            Self::UP => ScrapeState::Up,
            Self::DOWN => ScrapeState::Down,
            _ => ScrapeState::Unknown,
        }
    }

    pub fn is_up(&self) -> bool {
        self.get() == ScrapeState::Up
    }
}

/// Where the collector gets its lines from.
#[async_trait]
pub trait LineSource: Send + Sync {
    async fn broadband_info(&self) -> Result<Vec<BroadbandInfo>, ChaosError>;
}

#[async_trait]
impl LineSource for Chaos {
    async fn broadband_info(&self) -> Result<Vec<BroadbandInfo>, ChaosError> {
        Chaos::broadband_info(self).await
    }
}

pub struct BroadbandCollector {
    source: Arc<dyn LineSource>,
    status: Arc<ScrapeStatus>,
}

impl BroadbandCollector {
    pub fn new(source: Arc<dyn LineSource>, status: Arc<ScrapeStatus>) -> Self {
        Self { source, status }
    }

    pub fn status(&self) -> &Arc<ScrapeStatus> {
        &self.status
    }

    /// Fetch the lines once and turn them into samples.
    ///
    /// The success sample always reflects this call, even when another
    /// scrape running at the same time overwrites the shared status.
    pub async fn collect(&self) -> Vec<Sample> {
        let lines = match self.source.broadband_info().await {
            Ok(lines) => lines,
            Err(e) => {
                tracing::debug!(error = %e, "error getting broadband info");
                self.status.set_down();
                return vec![Sample::scrape_success(false)];
            }
        };
        self.status.set_up();

        let mut samples = Vec::with_capacity(1 + lines.len() * 4);
        samples.push(Sample::scrape_success(true));
        for line in &lines {
            samples.extend(line_samples(line));
        }
        samples
    }
}

/// The four per-line series, in exposition order.
pub fn line_samples(line: &BroadbandInfo) -> [Sample; 4] {
    [
        Sample::line(&QUOTA_REMAINING, line, line.quota_remaining),
        Sample::line(&QUOTA_TOTAL, line, line.quota_monthly),
        Sample::line(&TX_RATE, line, line.tx_rate),
        Sample::line(&RX_RATE, line, line.rx_rate),
    ]
}

/// Group samples into metric families for the text encoder.
///
/// Families come out in order of first appearance and keep every sample,
/// duplicates included.
pub fn into_families(samples: &[Sample]) -> Vec<MetricFamily> {
    let mut families: Vec<MetricFamily> = Vec::new();

    for sample in samples {
        let index = match families.iter().position(|f| f.get_name() == sample.desc.name) {
            Some(index) => index,
            None => {
                let mut family = MetricFamily::default();
                family.set_name(sample.desc.name.to_string());
                family.set_help(sample.desc.help.to_string());
                family.set_field_type(match sample.desc.kind {
                    MetricKind::Gauge => MetricType::GAUGE,
                    MetricKind::Counter => MetricType::COUNTER,
                });
                families.push(family);
                families.len() - 1
            }
        };
        families[index].mut_metric().push(to_metric(sample));
    }

    families
}

fn to_metric(sample: &Sample) -> Metric {
    let mut metric = Metric::default();

    if let Some(line_id) = &sample.line_id {
        let mut label = LabelPair::default();
        label.set_name(LINE_LABEL.to_string());
        label.set_value(line_id.clone());
        metric.mut_label().push(label);
    }

    match sample.desc.kind {
        MetricKind::Gauge => {
            let mut gauge = Gauge::default();
            gauge.set_value(sample.value);
            metric.set_gauge(gauge);
        }
        MetricKind::Counter => {
            let mut counter = Counter::default();
            counter.set_value(sample.value);
            metric.set_counter(counter);
        }
    }

    metric
}

#[cfg(test)]
mod tests {
    use super::*;
    use aaisp_chaos::parse_upstream_timestamp;
    use prometheus::{Encoder, TextEncoder};
    use std::time::Duration;

    fn line(id: u64, tx: i64, rx: i64, monthly: i64, remaining: i64) -> BroadbandInfo {
        BroadbandInfo {
            id,
            login: format!("line{}@a.1", id),
            postcode: "AB1 2CD".to_string(),
            tx_rate: tx,
            rx_rate: rx,
            tx_rate_adjusted: tx,
            quota_monthly: monthly,
            quota_remaining: remaining,
            quota_timestamp: parse_upstream_timestamp("2023-06-15 12:00:00").unwrap(),
        }
    }

    struct FakeSource {
        lines: Vec<BroadbandInfo>,
        fail: Option<&'static str>,
        delay: Duration,
    }

    impl FakeSource {
        fn ok(lines: Vec<BroadbandInfo>) -> Arc<Self> {
            Arc::new(Self { lines, fail: None, delay: Duration::ZERO })
        }

        fn failing(message: &'static str) -> Arc<Self> {
            Arc::new(Self { lines: Vec::new(), fail: Some(message), delay: Duration::ZERO })
        }
    }

    #[async_trait]
    impl LineSource for FakeSource {
        async fn broadband_info(&self) -> Result<Vec<BroadbandInfo>, ChaosError> {
            tokio::time::sleep(self.delay).await;
            match self.fail {
                Some(message) => Err(ChaosError::Upstream(message.to_string())),
                None => Ok(self.lines.clone()),
            }
        }
    }

    fn collector(source: Arc<dyn LineSource>) -> BroadbandCollector {
        BroadbandCollector::new(source, Arc::new(ScrapeStatus::new()))
    }

    #[tokio::test]
    async fn test_collect_success() {
        let c = collector(FakeSource::ok(vec![
            line(1, 1000, 8000, 100, 40),
            line(2, 2000, 16000, 200, 150),
            line(3, 3000, 24000, 300, 0),
        ]));
        let samples = c.collect().await;

        assert_eq!(samples.len(), 1 + 4 * 3);
        assert_eq!(samples[0].desc, &SCRAPE_SUCCESS);
        assert_eq!(samples[0].value, 1.0);
        assert_eq!(samples.iter().filter(|s| s.line_id.is_some()).count(), 12);
        assert_eq!(c.status().get(), ScrapeState::Up);

        let first: Vec<_> = samples[1..5].iter().map(|s| (s.desc.name, s.value)).collect();
        assert_eq!(
            first,
            vec![
                ("aaisp_broadband_quota_remaining", 40.0),
                ("aaisp_broadband_quota_total", 100.0),
                ("aaisp_broadband_tx_rate", 1000.0),
                ("aaisp_broadband_rx_rate", 8000.0),
            ]
        );
        let ids: Vec<_> = samples[1..].iter().map(|s| s.line_id.as_deref().unwrap()).collect();
        assert_eq!(ids, ["1", "1", "1", "1", "2", "2", "2", "2", "3", "3", "3", "3"]);
    }

    #[tokio::test]
    async fn test_collect_no_lines() {
        let c = collector(FakeSource::ok(Vec::new()));
        let samples = c.collect().await;
        assert_eq!(samples, vec![Sample::scrape_success(true)]);
    }

    #[tokio::test]
    async fn test_collect_failure() {
        let c = collector(FakeSource::failing("Invalid control login"));
        let samples = c.collect().await;

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].desc.name, "aaisp_scrape_success");
        assert_eq!(samples[0].value, 0.0);
        assert_eq!(c.status().get(), ScrapeState::Down);
    }

    #[tokio::test]
    async fn test_state_follows_each_scrape() {
        let status = Arc::new(ScrapeStatus::new());
        assert_eq!(status.get(), ScrapeState::Unknown);

        let up = BroadbandCollector::new(FakeSource::ok(vec![line(1, 1, 1, 1, 1)]), status.clone());
        let down = BroadbandCollector::new(FakeSource::failing("nope"), status.clone());

        up.collect().await;
        assert!(status.is_up());
        down.collect().await;
        assert_eq!(status.get(), ScrapeState::Down);
        up.collect().await;
        assert!(status.is_up());
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_kept() {
        let c = collector(FakeSource::ok(vec![line(7, 1, 1, 1, 1), line(7, 2, 2, 2, 2)]));
        let samples = c.collect().await;
        assert_eq!(samples.len(), 9);

        let families = into_families(&samples);
        let tx = families.iter().find(|f| f.get_name() == "aaisp_broadband_tx_rate").unwrap();
        assert_eq!(tx.get_metric().len(), 2);
        assert_eq!(tx.get_metric()[0].get_gauge().get_value(), 1.0);
        assert_eq!(tx.get_metric()[1].get_gauge().get_value(), 2.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_scrapes_report_own_outcome() {
        let status = Arc::new(ScrapeStatus::new());
        let good = BroadbandCollector::new(
            FakeSource::ok(vec![line(1, 1, 1, 1, 1), line(2, 2, 2, 2, 2)]),
            status.clone(),
        );
        let bad = BroadbandCollector::new(
            Arc::new(FakeSource {
                lines: Vec::new(),
                fail: Some("timeout"),
                delay: Duration::from_millis(50),
            }),
            status.clone(),
        );

        let (good_samples, bad_samples) = tokio::join!(good.collect(), bad.collect());

        assert_eq!(good_samples.len(), 9);
        assert_eq!(good_samples[0].value, 1.0);
        assert_eq!(bad_samples, vec![Sample::scrape_success(false)]);
        // The failing scrape finished last, so it wrote last.
        assert_eq!(status.get(), ScrapeState::Down);
    }

    #[test]
    fn test_families_encode() {
        let mut samples = vec![Sample::scrape_success(true)];
        samples.extend(line_samples(&line(42, 1000, 8000, 100, 40)));
        let families = into_families(&samples);

        let names: Vec<_> = families.iter().map(|f| f.get_name()).collect();
        assert_eq!(
            names,
            [
                "aaisp_scrape_success",
                "aaisp_broadband_quota_remaining",
                "aaisp_broadband_quota_total",
                "aaisp_broadband_tx_rate",
                "aaisp_broadband_rx_rate",
            ]
        );
        assert_eq!(families[2].get_field_type(), MetricType::COUNTER);

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("# TYPE aaisp_broadband_quota_total counter"));
        assert!(text.contains("aaisp_broadband_quota_total{line_id=\"42\"} 100"));
        assert!(text.contains("aaisp_broadband_rx_rate{line_id=\"42\"} 8000"));
        assert!(text.contains("aaisp_scrape_success 1"));
    }
}
