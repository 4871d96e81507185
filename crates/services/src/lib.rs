use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use hitline_domain::{parse_chart, Chart, SessionReport};

/// Supplies immutable charts at session start.
#[async_trait]
pub trait ChartSource {
    async fn load(&self, id: &str) -> Result<Chart>;
}

/// Receives final session results. What happens to them is up to the sink.
#[async_trait]
pub trait ScoreSink {
    async fn submit(&self, report: &SessionReport) -> Result<()>;
}

/// Reads `<root>/<id>.json` chart files.
#[derive(Clone, Debug)]
pub struct DirectoryChartSource {
    pub root: PathBuf,
}

impl DirectoryChartSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }
}

#[async_trait]
impl ChartSource for DirectoryChartSource {
    async fn load(&self, id: &str) -> Result<Chart> {
        let path = self.path_for(id);
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading chart {}", path.display()))?;
        let (chart, report) =
            parse_chart(&text, id).with_context(|| format!("parsing chart {}", path.display()))?;
        if report.dropped > 0 || report.converted_to_tap > 0 {
            warn!(
                chart = %chart.id,
                dropped = report.dropped,
                converted_to_tap = report.converted_to_tap,
                "chart notes normalized"
            );
        }
        info!(chart = %chart.id, notes = chart.notes.len(), "chart loaded");
        Ok(chart)
    }
}

/// Logs reports instead of sending them anywhere.
#[derive(Clone, Debug, Default)]
pub struct LogScoreSink;

#[async_trait]
impl ScoreSink for LogScoreSink {
    async fn submit(&self, report: &SessionReport) -> Result<()> {
        let json = serde_json::to_string(report).context("serializing session report")?;
        info!(
            chart = %report.chart_id,
            accuracy = report.accuracy,
            max_combo = report.score.max_combo,
            aborted = report.aborted,
            report = %json,
            "session report submitted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hitline_domain::{JudgmentWeights, Score};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hitline-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn loads_and_normalizes_chart_files() {
        let dir = temp_dir("charts");
        let json = r#"{"chart":{"notes":[
            {"lane":0,"time":1000},
            {"lane":7,"time":1200},
            {"lane":1,"time":500,"type":"hold","duration":20}
        ],"bpm":140,"chartTitle":"Demo"}}"#;
        tokio::fs::write(dir.join("demo.json"), json).await.unwrap();

        let source = DirectoryChartSource::new(&dir);
        let chart = source.load("demo").await.unwrap();
        assert_eq!(chart.id, "demo");
        assert_eq!(chart.title, "Demo");
        assert_eq!(chart.notes.len(), 2);
        assert_eq!(chart.notes[0].time_ms, 500.0);
        assert!(!chart.notes[0].is_hold());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn missing_chart_reports_path() {
        let source = DirectoryChartSource::new(temp_dir("missing"));
        let err = source.load("nope").await.unwrap_err();
        assert!(format!("{err:#}").contains("nope.json"));
    }

    #[tokio::test]
    async fn log_sink_accepts_reports() {
        let report = SessionReport::new("c", Score::new(), &JudgmentWeights::default(), 0, false);
        LogScoreSink.submit(&report).await.unwrap();
    }
}
