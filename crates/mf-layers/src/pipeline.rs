//! The build loop: a builder queue with bounded per-layer retry.

use std::collections::{BTreeMap, VecDeque};

use rustc_hash::FxHashMap;
use tracing::{info, warn};

use mf_core::{BuildLog, LogEntry};

use crate::builders::{
    BaselinePathBuilder, CrosswalkBuilder, IntersectionBuilder, LaneBoundaryBuilder, LaneBuilder,
    LaneConnectorBuilder, LaneGroupBuilder, LayerBuilder, ReferenceLineBuilder, StopLineBuilder,
    TrafficLightBuilder,
};
use crate::context::{BuildContext, LayerKind, LayerRow, MapSource};
use crate::error::{BuildError, BuildResult};

/// Fatal after this many transient failures of one layer kind.
const MAX_ATTEMPTS: u32 = 3;

/// A finished build job: the non-empty layers plus the job log.
#[derive(Debug, serde::Serialize)]
pub struct LayerSet {
    pub layers: BTreeMap<LayerKind, Vec<LayerRow>>,
    pub logs: Vec<LogEntry>,
}

/// Builder registry and run loop.
pub struct Pipeline {
    builders: VecDeque<Box<dyn LayerBuilder>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// The standard registry. The lane builders are queued ahead of the
    /// boundary builder on purpose: their first Apollo attempt fails on the
    /// missing `lane_boundary_info` and requeues, which keeps the retry
    /// machinery exercised on every real build.
    pub fn new() -> Self {
        Self::with_builders(vec![
            Box::new(LaneBuilder),
            Box::new(LaneConnectorBuilder),
            Box::new(LaneBoundaryBuilder),
            Box::new(TrafficLightBuilder),
            Box::new(StopLineBuilder),
            Box::new(CrosswalkBuilder),
            Box::new(IntersectionBuilder),
            Box::new(BaselinePathBuilder),
            Box::new(LaneGroupBuilder),
            Box::new(ReferenceLineBuilder),
        ])
    }

    pub fn with_builders(builders: Vec<Box<dyn LayerBuilder>>) -> Self {
        Self {
            builders: builders.into(),
        }
    }

    /// Run every registered builder against `source`, accumulating progress
    /// into `log` (pollable mid-job through its other handles).
    pub fn run(mut self, source: &MapSource, log: BuildLog) -> BuildResult<LayerSet> {
        let mut ctx = BuildContext::new(source, log);

        // Memo parse warnings belong to the job result, stamped with their
        // parse-time timestamps.
        if let MapSource::Memo(map) = source {
            for entry in &map.logs {
                ctx.log.push_entry(entry.clone());
            }
        }

        let mut failures: FxHashMap<LayerKind, u32> = FxHashMap::default();
        while let Some(builder) = self.builders.pop_front() {
            let kind = builder.kind();
            match builder.build(source, &mut ctx) {
                Ok(rows) => {
                    info!(layer = %kind, rows = rows.len(), "layer built");
                    ctx.log.info(format!("layer {kind} built ({} rows)", rows.len()));
                    // Zero rows is a valid outcome, not a layer.
                    if !rows.is_empty() {
                        ctx.layers.insert(kind, rows);
                    }
                }
                Err(BuildError::MissingContext { key }) => {
                    let attempts = failures.entry(kind).or_insert(0);
                    *attempts += 1;
                    if *attempts >= MAX_ATTEMPTS {
                        ctx.log.error(format!("layer {kind} not built"));
                        return Err(BuildError::RetriesExhausted {
                            layer: kind,
                            attempts: *attempts,
                            reason: format!("context entry {key} never became available"),
                        });
                    }
                    warn!(layer = %kind, %key, "layer requeued");
                    ctx.log.warning(format!("layer {kind} requeued"));
                    self.builders.push_back(builder);
                }
                Err(fatal) => return Err(fatal),
            }
        }

        Ok(LayerSet {
            layers: ctx.layers,
            logs: ctx.log.snapshot(),
        })
    }
}

/// Build every layer for one parsed source with a fresh job log.
pub fn build_all_layers(source: &MapSource) -> BuildResult<LayerSet> {
    Pipeline::new().run(source, BuildLog::new())
}
