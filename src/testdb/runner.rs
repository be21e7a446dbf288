//! Scenario runner
//!
//! Replays a `TestScenario` through the real `DeviceDetector`, backed by a
//! `ScriptedRunner`, and checks the emitted events tick by tick.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::core::detector::{DeviceDetector, TickReport};
use crate::device::transport::TransportSettings;
use crate::testdb::fixtures::{script_adb_device, script_fastboot_device, set_listings};
use crate::testdb::scenarios::TestScenario;
use crate::testdb::ScriptedRunner;

/// Tools a scenario can mark as missing
const TOOLS: [&str; 2] = ["adb", "fastboot"];

/// Result of running a single scenario
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub name: String,
    pub passed: bool,
    /// One report per tick, in order
    pub ticks: Vec<TickReport>,
    /// Mismatches between expected and emitted events
    pub failures: Vec<String>,
    pub duration: Duration,
}

/// Summary of a batch of scenarios
#[derive(Debug, Clone, Default)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<ScenarioResult>,
}

impl TestSummary {
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }

    pub fn failed_scenarios(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.name.as_str())
            .collect()
    }
}

/// Runs scenarios against the detector
pub struct ScenarioRunner {
    settings: TransportSettings,
    parallel_probes: bool,
}

impl ScenarioRunner {
    pub fn new() -> Self {
        let mut settings = TransportSettings::default();
        // Scripted commands answer instantly; keep hangs short
        settings.timeouts.listing_ms = 200;
        settings.timeouts.probe_ms = 200;
        settings.timeouts.shell_ms = 200;
        Self {
            settings,
            parallel_probes: false,
        }
    }

    pub fn with_parallel_probes(mut self, parallel: bool) -> Self {
        self.parallel_probes = parallel;
        self
    }

    /// Run one scenario
    pub fn run(&self, scenario: &TestScenario) -> ScenarioResult {
        let started = Instant::now();
        let runner = Arc::new(ScriptedRunner::new());
        for device in &scenario.adb_devices {
            script_adb_device(&runner, device);
        }
        for device in &scenario.fastboot_devices {
            script_fastboot_device(&runner, device);
        }

        let mut detector = DeviceDetector::new(Arc::clone(&runner), self.settings.clone())
            .with_parallel_probes(self.parallel_probes);

        let mut ticks = Vec::new();
        let mut failures = Vec::new();
        for (index, step) in scenario.ticks.iter().enumerate() {
            let adb: Vec<(&str, &str)> = step
                .adb
                .iter()
                .map(|(s, st)| (s.as_str(), st.as_str()))
                .collect();
            let fastboot: Vec<(&str, &str)> = step
                .fastboot
                .iter()
                .map(|(s, m)| (s.as_str(), m.as_str()))
                .collect();
            set_listings(&runner, &adb, &fastboot);
            for tool in TOOLS {
                runner.set_unavailable(tool, step.missing_tools.contains(&tool));
            }

            let report = detector.tick();
            debug!("{} tick {}: {}", scenario.name, index + 1, report.summary());

            if report.events.len() != step.expected.len() {
                failures.push(format!(
                    "tick {}: expected {} event(s), got {}",
                    index + 1,
                    step.expected.len(),
                    report.events.len()
                ));
            }
            for (position, (expected, actual)) in
                step.expected.iter().zip(report.events.iter()).enumerate()
            {
                if !expected.matches(actual) {
                    failures.push(format!(
                        "tick {} event {}: expected {:?}, got {}",
                        index + 1,
                        position + 1,
                        expected,
                        actual
                    ));
                }
            }
            ticks.push(report);
        }

        ScenarioResult {
            name: scenario.name.clone(),
            passed: failures.is_empty(),
            ticks,
            failures,
            duration: started.elapsed(),
        }
    }

    /// Run a batch of scenarios
    pub fn run_all(&self, scenarios: &[TestScenario]) -> TestSummary {
        let mut summary = TestSummary::default();
        for scenario in scenarios {
            let result = self.run(scenario);
            info!(
                "scenario {}: {}",
                result.name,
                if result.passed { "passed" } else { "FAILED" }
            );
            summary.total += 1;
            if result.passed {
                summary.passed += 1;
            } else {
                summary.failed += 1;
            }
            summary.results.push(result);
        }
        summary
    }
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdb::scenarios::ScenarioLibrary;

    #[test]
    fn test_every_scenario_passes() {
        let summary = ScenarioRunner::new().run_all(&ScenarioLibrary::all());
        for result in &summary.results {
            assert!(result.passed, "{}: {:?}", result.name, result.failures);
        }
        assert_eq!(summary.pass_rate(), 100.0);
    }

    #[test]
    fn test_every_scenario_passes_in_parallel() {
        let summary = ScenarioRunner::new()
            .with_parallel_probes(true)
            .run_all(&ScenarioLibrary::all());
        assert!(summary.failed_scenarios().is_empty(), "{:?}", summary.failed_scenarios());
    }

    #[test]
    fn test_wrong_expectation_is_reported() {
        let mut scenario = ScenarioLibrary::single_adb();
        scenario.ticks[1].expected = scenario.ticks[0].expected.clone();
        let result = ScenarioRunner::new().run(&scenario);
        assert!(!result.passed);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.ticks.len(), 2);
    }
}
