//! Plan command: print the pool requests an evaluation would execute.

use std::io::Write;

use anyhow::{Context, Result};
use tracing::{info, info_span};

use wres_pooling::{OptimizedPoolRequests, PoolFactory, optimize};

use crate::cli::PlanArgs;
use crate::config;
use crate::convert;

/// Formats one tab-separated line per planned pool: pool id, feature group,
/// time window, and the batch that retrieves it, or `-` when unbatched.
pub fn plan_lines(batches: &[OptimizedPoolRequests]) -> Vec<String> {
    batches
        .iter()
        .flat_map(|batch| {
            let batched = batch
                .optimized()
                .first()
                .filter(|_| batch.is_optimized())
                .map(|r| r.feature_group().name().to_string());
            batch.original().iter().map(move |request| {
                format!(
                    "{}\t{}\t{}\t{}",
                    request.pool_id().map_or_else(|| "-".to_string(), |id| id.to_string()),
                    request.feature_group().name(),
                    request.time_window(),
                    batched.as_deref().unwrap_or("-"),
                )
            })
        })
        .collect()
}

/// Print the planned pools.
pub fn run(args: PlanArgs) -> Result<()> {
    let _cmd = info_span!("plan").entered();
    let config = config::load(&args.config)?;
    let declaration = convert::build_declaration(&config)?;
    let factory = PoolFactory::new(declaration).context("failed to create pool factory")?;

    let requests = factory.pool_requests();
    let batches = optimize(&requests, factory.declaration().pool_parameters())
        .context("failed to plan feature batches")?;
    info!(
        n_requests = requests.len(),
        n_batches = batches.iter().filter(|b| b.is_optimized()).count(),
        "pools planned"
    );

    let mut out = std::io::stdout().lock();
    for line in plan_lines(&batches) {
        writeln!(out, "{line}").context("failed to write plan")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use wres_pooling::{EvaluationDeclaration, PoolParameters};
    use wres_datamodel::{Feature, FeatureGroup, FeatureTuple};
    use wres_retrieval::DataType;

    use super::*;

    fn factory(n_features: usize) -> PoolFactory {
        let groups = (0..n_features)
            .map(|i| {
                let name = format!("F{i:02}");
                FeatureGroup::singleton(FeatureTuple::new(Feature::new(&name), Feature::new(&name), None))
            })
            .collect();
        let declaration = EvaluationDeclaration::new(DataType::Observations, DataType::SingleValuedForecasts)
            .with_feature_groups(groups)
            .with_pool_parameters(
                PoolParameters::new()
                    .with_feature_batch_size(3)
                    .with_feature_batch_threshold(2),
            );
        PoolFactory::new(declaration).unwrap()
    }

    #[test]
    fn unbatched_plan() {
        let factory = factory(2);
        let requests = factory.pool_requests();
        let batches = optimize(&requests, factory.declaration().pool_parameters()).unwrap();
        let lines = plan_lines(&batches);
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.ends_with("\t-")));
    }

    #[test]
    fn batched_plan_names_the_batch() {
        let factory = factory(5);
        let requests = factory.pool_requests();
        let batches = optimize(&requests, factory.declaration().pool_parameters()).unwrap();
        let lines = plan_lines(&batches);
        assert_eq!(lines.len(), 5);
        assert!(lines.iter().all(|l| !l.ends_with("\t-")));
        assert!(lines[0].contains("\tF00-F00\t"));
    }
}
