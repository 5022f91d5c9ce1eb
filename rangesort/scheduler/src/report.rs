// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! What happened during a sort run, phase by phase.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use rangesort_core::config::SortConfig;
use rangesort_core::error::RangeSortError;
use rangesort_core::phase::Phase;
use rangesort_core::verifier::VerifyReport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: usize,
    pub message: String,
}

impl TaskFailure {
    pub fn new(task: usize, error: &RangeSortError) -> Self {
        Self {
            task,
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub tasks: usize,
    pub failures: Vec<TaskFailure>,
    pub elapsed: Duration,
}

impl PhaseReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn partial_failure(&self) -> Option<RangeSortError> {
        (!self.failures.is_empty()).then(|| {
            RangeSortError::PartialFailure(self.phase, self.failures.len(), self.tasks)
        })
    }
}

impl Display for PhaseReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Phase {} finished in {} ms: {} of {} tasks succeeded",
            self.phase,
            self.elapsed.as_millis(),
            self.tasks - self.failures.len(),
            self.tasks
        )
    }
}

/// The outcome of [crate::orchestrator::SortOrchestrator::run].
#[derive(Debug, Clone)]
pub struct SortReport {
    pub config: SortConfig,
    /// Reports of the phases that ran, in execution order.
    pub phases: Vec<PhaseReport>,
    pub verify: Option<VerifyReport>,
    pub elapsed: Duration,
}

impl SortReport {
    pub fn new(config: SortConfig) -> Self {
        Self {
            config,
            phases: vec![],
            verify: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    /// One [RangeSortError::PartialFailure] per phase that had failed tasks.
    pub fn partial_failures(&self) -> Vec<RangeSortError> {
        self.phases
            .iter()
            .filter_map(PhaseReport::partial_failure)
            .collect()
    }

    /// Every task succeeded and, if the output was checked, the check passed.
    pub fn is_success(&self) -> bool {
        self.phases.iter().all(PhaseReport::is_success)
            && self.verify.is_none_or(|v| v.ok)
    }

    fn elapsed_of(&self, phases: &[Phase]) -> Duration {
        self.phases
            .iter()
            .filter(|p| phases.contains(&p.phase))
            .map(|p| p.elapsed)
            .sum()
    }
}

impl Display for SortReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let c = &self.config;
        writeln!(f, "Setup:")?;
        writeln!(f, "  workers:            {}", c.worker_count)?;
        writeln!(f, "  concurrent tasks:   {}", c.pool_size())?;
        writeln!(f, "  rows per partition: {}", c.rows_per_partition)?;
        writeln!(f, "  columns per row:    {}", c.columns_per_row)?;
        writeln!(f, "  sort column:        {}", c.sort_column)?;
        writeln!(f, "  transport:          {}", c.transport)?;
        writeln!(f, "  base path:          {}", c.base_path)?;

        let ms = |d: Duration| d.as_millis();
        writeln!(f, "Time report (ms):")?;
        writeln!(f, "  total:    {}", ms(self.elapsed))?;
        writeln!(f, "  generate: {}", ms(self.elapsed_of(&[Phase::Generate])))?;
        writeln!(
            f,
            "  sort:     {}",
            ms(self.elapsed_of(&[
                Phase::CreateShuffleTargets,
                Phase::Map,
                Phase::CreateResultTargets,
                Phase::Reduce,
            ]))
        )?;
        writeln!(f, "  map:      {}", ms(self.elapsed_of(&[Phase::Map])))?;
        write!(f, "  reduce:   {}", ms(self.elapsed_of(&[Phase::Reduce])))?;

        for failure in self.partial_failures() {
            write!(f, "\n{failure}")?;
        }
        if let Some(verify) = &self.verify {
            write!(f, "\n{verify}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(phase: Phase, tasks: usize, failed: &[usize], ms: u64) -> PhaseReport {
        PhaseReport {
            phase,
            tasks,
            failures: failed
                .iter()
                .map(|t| TaskFailure {
                    task: *t,
                    message: "boom".to_owned(),
                })
                .collect(),
            elapsed: Duration::from_millis(ms),
        }
    }

    #[test]
    fn test_partial_failures() {
        let mut report = SortReport::new(SortConfig::new(4, "/data"));
        report.phases = vec![
            phase(Phase::Map, 4, &[2], 10),
            phase(Phase::Reduce, 4, &[], 20),
            phase(Phase::Cleanup, 5, &[0, 1], 1),
        ];

        let failures: Vec<String> = report
            .partial_failures()
            .iter()
            .map(|e| e.to_string())
            .collect();
        assert_eq!(
            failures,
            vec![
                "Partial failure: 1 of 4 map tasks failed",
                "Partial failure: 2 of 5 cleanup tasks failed",
            ]
        );
        assert!(!report.is_success());
    }

    #[test]
    fn test_time_report() {
        let mut report = SortReport::new(SortConfig::new(2, "/data"));
        report.phases = vec![
            phase(Phase::Generate, 2, &[], 7),
            phase(Phase::CreateShuffleTargets, 1, &[], 1),
            phase(Phase::Map, 2, &[], 10),
            phase(Phase::CreateResultTargets, 1, &[], 1),
            phase(Phase::Reduce, 2, &[], 20),
        ];
        report.elapsed = Duration::from_millis(45);
        report.verify = Some(VerifyReport {
            ok: true,
            total_rows: 4,
            expected_rows: 4,
            violation: None,
        });

        let text = report.to_string();
        assert!(text.contains("  total:    45\n"), "{text}");
        assert!(text.contains("  generate: 7\n"), "{text}");
        assert!(text.contains("  sort:     32\n"), "{text}");
        assert!(text.contains("  map:      10\n"), "{text}");
        assert!(text.ends_with("Check OK: 4 rows sorted"), "{text}");
        assert!(report.is_success());
    }
}
