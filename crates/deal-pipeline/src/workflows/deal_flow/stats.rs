use std::collections::HashMap;

use serde::Serialize;

use super::catalog::StageCatalog;
use super::domain::{DealFlow, StageId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageCount {
    pub stage: StageId,
    pub stage_name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageDwell {
    pub stage: StageId,
    pub average_minutes: f64,
    pub samples: usize,
}

/// Dashboard aggregate over every flow in the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStats {
    pub total_flows: usize,
    pub active_flows: usize,
    pub hot_stage: StageId,
    pub hot_leads: usize,
    pub stage_counts: Vec<StageCount>,
    pub average_dwell_minutes: Vec<StageDwell>,
}

#[derive(Default)]
struct DwellAccumulator {
    total_minutes: f64,
    samples: usize,
}

impl PipelineStats {
    pub fn from_flows(catalog: &StageCatalog, flows: &[DealFlow]) -> Self {
        let mut counts: HashMap<&StageId, usize> = HashMap::new();
        let mut dwell: HashMap<&StageId, DwellAccumulator> = HashMap::new();

        for flow in flows {
            *counts.entry(&flow.current_stage).or_default() += 1;

            for entry in &flow.stage_history {
                if let Some(minutes) = entry.dwell_minutes() {
                    let accumulator = dwell.entry(&entry.stage).or_default();
                    accumulator.total_minutes += minutes;
                    accumulator.samples += 1;
                }
            }
        }

        let active_flows = flows
            .iter()
            .filter(|flow| !catalog.is_terminal(&flow.current_stage))
            .count();

        let stage_counts = catalog
            .stages()
            .iter()
            .map(|stage| StageCount {
                stage: stage.id.clone(),
                stage_name: stage.name.clone(),
                count: counts.get(&stage.id).copied().unwrap_or(0),
            })
            .collect();

        let average_dwell_minutes = catalog
            .stages()
            .iter()
            .filter_map(|stage| {
                let accumulator = dwell.get(&stage.id)?;
                (accumulator.samples > 0).then(|| StageDwell {
                    stage: stage.id.clone(),
                    average_minutes: accumulator.total_minutes / accumulator.samples as f64,
                    samples: accumulator.samples,
                })
            })
            .collect();

        Self {
            total_flows: flows.len(),
            active_flows,
            hot_stage: catalog.hot_stage().clone(),
            hot_leads: counts.get(catalog.hot_stage()).copied().unwrap_or(0),
            stage_counts,
            average_dwell_minutes,
        }
    }

    pub fn count_for(&self, stage: &str) -> usize {
        self.stage_counts
            .iter()
            .find(|entry| entry.stage.as_str() == stage)
            .map(|entry| entry.count)
            .unwrap_or(0)
    }

    pub fn dwell_for(&self, stage: &str) -> Option<f64> {
        self.average_dwell_minutes
            .iter()
            .find(|entry| entry.stage.as_str() == stage)
            .map(|entry| entry.average_minutes)
    }
}
