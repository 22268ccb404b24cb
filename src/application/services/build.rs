//! Tree build service
//!
//! Splits a corpus into partitions, builds each partition on its own random
//! substream, repairs and validates the result and assembles the output record.

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, error, info, instrument, warn};

use crate::application::output::{
    fingerprint, nodes_of, tree_from_output, ConfigUsed, PartitionOutput, TreeOutput,
    ValidationSummary, FORMAT_VERSION,
};
use crate::application::{ApplicationError, ApplicationResult};
use crate::config::Settings;
use crate::domain::rng::{clock_seed, partition_rng};
use crate::domain::{
    fix_unreachable, themes_for_partition, validate_partition, BuildConfig, BuilderKind,
    DomainError, ItemRecord, PartitionInput, SimilarityMatrix, ValidationResult,
};

/// One partition after build, repair and validation.
#[derive(Debug, Clone)]
pub struct PartitionReport {
    pub partition: String,
    pub output: PartitionOutput,
    pub validation: ValidationResult,
    pub repairs: usize,
}

/// Service for building and re-validating skill trees.
pub struct TreeBuildService {
    settings: Arc<Settings>,
}

impl TreeBuildService {
    /// Create a new build service.
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Group items by partition tag.
    ///
    /// Items without identifier or partition are dropped; partitions come out
    /// sorted by name, items keep corpus order.
    pub fn partition_items(items: &[ItemRecord]) -> BTreeMap<String, Vec<ItemRecord>> {
        let mut partitions: BTreeMap<String, Vec<ItemRecord>> = BTreeMap::new();
        let mut dropped = 0usize;
        for item in items {
            if item.item_id().is_none() || item.partition.is_empty() {
                dropped += 1;
                continue;
            }
            partitions
                .entry(item.partition.clone())
                .or_default()
                .push(item.clone());
        }
        if dropped > 0 {
            debug!("dropped {} items without identifier or partition", dropped);
        }
        partitions
    }

    /// Merged theme list per partition.
    pub fn themes(&self, items: &[ItemRecord], top_n: usize) -> BTreeMap<String, Vec<String>> {
        Self::partition_items(items)
            .par_iter()
            .map(|(name, members)| {
                let themes = themes_for_partition(members, self.settings.hints_for(name), top_n);
                (name.clone(), themes)
            })
            .collect()
    }

    /// Build every partition of `items`.
    ///
    /// Partitions that cannot be built (no items, no root) are skipped with a
    /// warning. A seed of 0 is replaced by a clock-derived one; the seed used
    /// is recorded in the output.
    #[instrument(level = "debug", skip(self, items, config), fields(items = items.len()))]
    pub fn build(
        &self,
        items: &[ItemRecord],
        kind: BuilderKind,
        config: &BuildConfig,
    ) -> ApplicationResult<TreeOutput> {
        let seed = if config.seed == 0 { clock_seed() } else { config.seed };
        let partitions = Self::partition_items(items);
        info!(partitions = partitions.len(), %kind, seed, "building trees");

        let reports: Vec<Option<PartitionReport>> = partitions
            .par_iter()
            .map(|(name, members)| self.build_partition(name, members, kind, config, seed))
            .collect::<Result<_, DomainError>>()?;

        let reports: Vec<PartitionReport> = reports.into_iter().flatten().collect();
        let validation = summarize(&reports);
        if !validation.all_valid {
            warn!(
                reachable = validation.reachable_nodes,
                total = validation.total_nodes,
                "tree has unreachable nodes"
            );
        }

        let partitions: BTreeMap<String, PartitionOutput> = reports
            .into_iter()
            .map(|r| (r.partition, r.output))
            .collect();
        let validation = ValidationSummary {
            fingerprint: fingerprint(&partitions),
            ..validation
        };
        info!(
            partitions = partitions.len(),
            nodes = validation.total_nodes,
            valid = validation.all_valid,
            "build finished"
        );

        Ok(TreeOutput {
            version: FORMAT_VERSION.to_string(),
            generator: format!("skilltree {} ({})", kind, kind.layout_style()),
            generated_at: chrono::Utc::now().to_rfc3339(),
            seed,
            config: Some(ConfigUsed::new(kind, config)),
            partitions,
            validation,
        })
    }

    fn build_partition(
        &self,
        name: &str,
        items: &[ItemRecord],
        kind: BuilderKind,
        config: &BuildConfig,
        seed: u64,
    ) -> Result<Option<PartitionReport>, DomainError> {
        let mut rng = partition_rng(seed, name);
        let sims = SimilarityMatrix::build(items);
        let themes = themes_for_partition(
            items,
            self.settings.hints_for(name),
            config.top_themes_per_partition,
        );
        let color = self.settings.partition_color(name);
        debug!(partition = name, themes = ?themes, "themes resolved");

        let input = PartitionInput {
            partition: name,
            items,
            themes: &themes,
            sims: &sims,
            color: &color,
        };
        let mut build = match kind.builder().build(&input, config, &mut rng) {
            Ok(build) => build,
            Err(e @ (DomainError::EmptyPartition(_) | DomainError::NoRootCandidate(_))) => {
                warn!(partition = name, "skipping partition: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let max_children = config.effective_max_children();
        let repairs = if config.auto_fix_unreachable {
            fix_unreachable(&mut build.tree, max_children)
        } else {
            0
        };
        let validation = validate_partition(&build.tree, max_children);
        check_acyclic(name, &validation)?;
        debug!(
            partition = name,
            nodes = validation.total_nodes,
            reachable = validation.reachable_nodes,
            repairs,
            "partition built"
        );

        Ok(Some(PartitionReport {
            partition: name.to_string(),
            output: PartitionOutput::from_build(&build, config, &color),
            validation,
            repairs,
        }))
    }

    /// Re-validate a serialized tree, optionally repairing it in place.
    #[instrument(level = "debug", skip(self, output))]
    pub fn revalidate(
        &self,
        output: &mut TreeOutput,
        fix: bool,
        max_children: usize,
    ) -> ApplicationResult<Vec<PartitionReport>> {
        let mut reports = Vec::with_capacity(output.partitions.len());
        for (name, partition) in output.partitions.iter_mut() {
            let mut tree = tree_from_output(name, partition)?;
            let repairs = if fix {
                fix_unreachable(&mut tree, max_children)
            } else {
                0
            };
            if repairs > 0 {
                partition.nodes = nodes_of(&tree);
            }
            let validation = validate_partition(&tree, max_children);
            reports.push(PartitionReport {
                partition: name.clone(),
                output: partition.clone(),
                validation,
                repairs,
            });
        }
        output.validation = ValidationSummary {
            fingerprint: fingerprint(&output.partitions),
            ..summarize(&reports)
        };
        Ok(reports)
    }

    /// Parse a tree record from JSON.
    pub fn parse_tree(content: &str) -> ApplicationResult<TreeOutput> {
        serde_json::from_str(content).map_err(|e| ApplicationError::serialization("parse tree", e))
    }

    /// Render a tree record as pretty JSON.
    pub fn render_tree(output: &TreeOutput) -> ApplicationResult<String> {
        serde_json::to_string_pretty(output)
            .map_err(|e| ApplicationError::serialization("serialize tree", e))
    }
}

/// Builders only add forward edges; a cycle is a builder defect.
fn check_acyclic(partition: &str, validation: &ValidationResult) -> Result<(), DomainError> {
    if let Some(cycle) = validation.cycles.first() {
        error!(partition, cycles = validation.cycle_count, "cycle in built tree");
        debug_assert!(false, "cycle in partition {}: {:?}", partition, cycle);
        return Err(DomainError::CycleDetected {
            partition: partition.to_string(),
            path: cycle.join(" -> "),
        });
    }
    Ok(())
}

fn summarize(reports: &[PartitionReport]) -> ValidationSummary {
    let mut summary = ValidationSummary {
        all_valid: true,
        ..Default::default()
    };
    for report in reports {
        let v = &report.validation;
        summary.total_nodes += v.total_nodes;
        summary.reachable_nodes += v.reachable_nodes;
        summary.repairs += report.repairs;
        summary.all_valid &= v.all_valid;
        if v.unreachable_count() > 0 {
            summary
                .unreachable
                .insert(report.partition.clone(), v.unreachable_count());
        }
    }
    summary
}
