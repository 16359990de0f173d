//! Wall-clock timing of pipeline stages.

use serde::Serialize;
use std::fmt::Write;
use std::time::{Duration, Instant};

/// Elapsed time of one named stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTiming {
    /// Stage name
    pub name: String,

    /// Elapsed time in milliseconds
    pub elapsed_ms: f64,
}

/// Named stage durations in recording order, plus the total run time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    /// Recorded stages
    pub stages: Vec<StageTiming>,

    /// Total run time in milliseconds
    pub total_ms: f64,
}

impl PerformanceMetrics {
    /// Returns the elapsed milliseconds of the first stage named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.stages
            .iter()
            .find(|stage| stage.name == name)
            .map(|stage| stage.elapsed_ms)
    }

    /// Renders a table of stage name and elapsed seconds.
    #[must_use]
    pub fn to_table(&self) -> String {
        let width = self
            .stages
            .iter()
            .map(|stage| stage.name.chars().count())
            .chain(["Stage".len(), "total".len()])
            .max()
            .unwrap_or(5);
        let rule = "═".repeat(width + 2);
        let time_rule = "═".repeat(14);

        let mut out = String::new();
        let _ = writeln!(out, "╔{rule}╦{time_rule}╗");
        let _ = writeln!(out, "║ {:<width$} ║ {:>12} ║", "Stage", "Seconds");
        let _ = writeln!(out, "╠{rule}╬{time_rule}╣");
        for stage in &self.stages {
            let _ = writeln!(
                out,
                "║ {:<width$} ║ {:>12.3} ║",
                stage.name,
                stage.elapsed_ms / 1000.0
            );
        }
        let _ = writeln!(out, "╠{rule}╬{time_rule}╣");
        let _ = writeln!(out, "║ {:<width$} ║ {:>12.3} ║", "total", self.total_ms / 1000.0);
        let _ = write!(out, "╚{rule}╩{time_rule}╝");
        out
    }
}

/// Records stage durations for one pipeline run.
///
/// Measurement only: nothing here affects control flow.
#[derive(Debug)]
pub struct PerformanceRecorder {
    started: Instant,
    stages: Vec<StageTiming>,
}

impl Default for PerformanceRecorder {
    fn default() -> Self {
        Self::start()
    }
}

impl PerformanceRecorder {
    /// Starts the total-time clock.
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            stages: Vec::new(),
        }
    }

    /// Records a stage that took `elapsed`.
    pub fn record(&mut self, name: impl Into<String>, elapsed: Duration) {
        self.stages.push(StageTiming {
            name: name.into(),
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        });
    }

    /// Records a stage that started at `since` and ends now.
    pub fn record_since(&mut self, name: impl Into<String>, since: Instant) {
        self.record(name, since.elapsed());
    }

    /// Stops the total-time clock and returns the metrics.
    #[must_use]
    pub fn finish(self) -> PerformanceMetrics {
        PerformanceMetrics {
            stages: self.stages,
            total_ms: self.started.elapsed().as_secs_f64() * 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let mut recorder = PerformanceRecorder::start();
        recorder.record("collect", Duration::from_millis(20));
        recorder.record("compile[0]", Duration::from_millis(1500));
        recorder.record("compile", Duration::from_millis(1600));
        let metrics = recorder.finish();

        let names: Vec<_> = metrics.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["collect", "compile[0]", "compile"]);
        assert_eq!(metrics.get("compile[0]"), Some(1500.0));
        assert_eq!(metrics.get("missing"), None);
        assert!(metrics.total_ms >= 0.0);
    }

    #[test]
    fn test_table_lists_stages_in_seconds() {
        let metrics = PerformanceMetrics {
            stages: vec![
                StageTiming {
                    name: "analyze".to_string(),
                    elapsed_ms: 2500.0,
                },
                StageTiming {
                    name: "standardize".to_string(),
                    elapsed_ms: 125.0,
                },
            ],
            total_ms: 3000.0,
        };

        let table = metrics.to_table();
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 8);
        assert!(lines[3].contains("analyze") && lines[3].contains("2.500"));
        assert!(lines[4].contains("standardize") && lines[4].contains("0.125"));
        assert!(lines[6].contains("total") && lines[6].contains("3.000"));

        let widths: Vec<usize> = lines.iter().map(|l| l.chars().count()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_metrics_serialize() {
        let mut recorder = PerformanceRecorder::start();
        recorder.record("write", Duration::from_millis(5));
        let json = serde_json::to_value(recorder.finish()).unwrap();

        assert_eq!(json["stages"][0]["name"], "write");
        assert_eq!(json["stages"][0]["elapsed_ms"], 5.0);
    }
}
