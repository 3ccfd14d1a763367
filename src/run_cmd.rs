//! Run command: build every pool, compute statistics and write them as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{info, info_span};

use wres_datamodel::{Ensemble, PairedPool, PoolMetadata};
use wres_pooling::{
    EvaluationState, PoolError, PoolFactory, PoolProcessor, PoolReporter, PoolRequest, PoolSupply, PublishFn,
    StatisticsFn, UncertaintyFn,
};
use wres_retrieval::{DataType, InMemoryRetrieverFactory};

use crate::bootstrap::BootstrapConfig;
use crate::cli::RunArgs;
use crate::config;
use crate::convert;
use crate::data::{read_optional_series, read_series};
use crate::statistics::{PointValue, PoolStatistics, points, pool_statistics};

/// Run the full pooling and verification pipeline.
pub fn run(args: RunArgs) -> Result<()> {
    let _cmd = info_span!("run").entered();
    // 1. Load project TOML
    let config = config::load(&args.config)?;
    let declaration = convert::build_declaration(&config)?;

    let bootstrap = BootstrapConfig::new(config.bootstrap.samples)
        .with_mean_block_length(config.bootstrap.mean_block_length)
        .with_quantiles(config.bootstrap.quantiles.clone())
        .with_seed(args.seed.or(config.seed).unwrap_or(0));
    bootstrap.validate().context("invalid [bootstrap] settings")?;

    let left = config
        .io
        .left
        .as_ref()
        .ok_or_else(|| anyhow!("no left data: set [io].left in config"))?;
    let right = config
        .io
        .right
        .as_ref()
        .ok_or_else(|| anyhow!("no right data: set [io].right in config"))?;
    let baseline = config.io.baseline.as_deref();

    // 2. Plan pools
    let factory = PoolFactory::new(declaration).context("failed to create pool factory")?;
    let requests = factory.pool_requests();
    let time_scale = factory.declaration().time_scale().copied();

    // 3. Read data, build and process pools
    let statistics = if factory.declaration().right_type() == DataType::EnsembleForecasts {
        let retrievers = InMemoryRetrieverFactory::<f64, Ensemble, Ensemble>::new(
            read_series(left)?,
            read_series(right)?,
            read_optional_series(baseline)?,
        )
        .with_desired_time_scale(time_scale);
        let suppliers = factory
            .ensemble_pools(&requests, Arc::new(retrievers))
            .context("failed to create ensemble pools")?;
        process(suppliers, &bootstrap)?
    } else {
        let retrievers = InMemoryRetrieverFactory::<f64, f64, f64>::new(
            read_series(left)?,
            read_series(right)?,
            read_optional_series(baseline)?,
        )
        .with_desired_time_scale(time_scale);
        let suppliers = factory
            .single_valued_pools(&requests, Arc::new(retrievers))
            .context("failed to create single-valued pools")?;
        process(suppliers, &bootstrap)?
    };

    // 4. Write statistics JSON
    let output: PathBuf = args
        .output
        .or(config.io.output)
        .unwrap_or_else(|| args.config.with_extension("statistics.json"));
    let json = serde_json::to_string_pretty(&statistics).context("failed to serialize statistics")?;
    std::fs::write(&output, json)
        .with_context(|| format!("failed to write statistics: {}", output.display()))?;
    info!(path = %output.display(), n_pools = statistics.len(), "statistics written");

    Ok(())
}

/// Processes every pool in parallel and returns the published statistics,
/// ordered by pool id.
fn process<R>(
    suppliers: Vec<(PoolRequest, PoolSupply<f64, R>)>,
    bootstrap: &BootstrapConfig,
) -> Result<Vec<PoolStatistics>>
where
    R: PointValue + Send + Sync + 'static,
{
    let state = Arc::new(EvaluationState::new());
    let published: Arc<Mutex<Vec<PoolStatistics>>> = Arc::new(Mutex::new(Vec::new()));

    let statistics: StatisticsFn<f64, R, PoolStatistics> =
        Arc::new(|pool: &PairedPool<f64, R>| -> Result<Option<PoolStatistics>, PoolError> {
            Ok(pool_statistics(pool))
        });
    let sink = Arc::clone(&published);
    let publisher: PublishFn<PoolStatistics> =
        Arc::new(move |_: &PoolMetadata, s: PoolStatistics| -> Result<bool, PoolError> {
            sink.lock().push(s);
            Ok(true)
        });
    let uncertainty: Option<UncertaintyFn<f64, R, PoolStatistics>> = if bootstrap.samples() > 0 {
        let bootstrap = bootstrap.clone();
        Some(Arc::new(
            move |pool: &PairedPool<f64, R>, mut s: PoolStatistics| -> Result<PoolStatistics, PoolError> {
                s.uncertainty = bootstrap.score_quantiles(&points(pool.main_series()), s.pool_id.unwrap_or(0));
                Ok(s)
            },
        ))
    } else {
        None
    };

    let processors: Vec<PoolProcessor<f64, R, PoolStatistics>> = suppliers
        .into_iter()
        .map(|(request, supplier)| {
            let processor = PoolProcessor::new(
                request,
                supplier,
                Arc::clone(&state),
                Arc::clone(&statistics),
                Arc::clone(&publisher),
            );
            match &uncertainty {
                Some(u) => processor.with_uncertainty(Arc::clone(u)),
                None => processor,
            }
        })
        .collect();

    info!(n_pools = processors.len(), "processing pools");
    let reporter = PoolReporter::new();
    processors
        .par_iter()
        .for_each(|p| reporter.record(p.request(), &p.process()));

    reporter.report().context("evaluation failed")?;
    if state.is_failed() {
        bail!("evaluation failed: {} of {} pools failed", reporter.failures(), reporter.total());
    }

    let mut published = std::mem::take(&mut *published.lock());
    published.sort_by(|a, b| {
        a.pool_id
            .cmp(&b.pool_id)
            .then_with(|| a.feature_group.cmp(&b.feature_group))
    });
    Ok(published)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use approx::assert_relative_eq;

    use super::*;

    // ---------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------

    /// Hourly observations at `feature`, valued by hour, for 12 hours.
    fn observed(feature: &str) -> String {
        let events: Vec<String> = (1..=12)
            .map(|h| format!(r#"{{ "time": "2024-01-01T{h:02}:00:00Z", "value": {h}.0 }}"#))
            .collect();
        format!(
            r#"{{ "feature": "{feature}", "variable": "QINE", "unit": "CMS", "events": [{}] }}"#,
            events.join(",")
        )
    }

    /// One forecast issued at midnight, one higher than observed, leads 1-6h.
    fn forecast(feature: &str) -> String {
        let events: Vec<String> = (1..=6)
            .map(|h| format!(r#"{{ "time": "2024-01-01T{h:02}:00:00Z", "value": {}.0 }}"#, h + 1))
            .collect();
        format!(
            r#"{{ "feature": "{feature}", "variable": "QINE", "unit": "CMS",
                 "reference_times": {{ "T0": "2024-01-01T00:00:00Z" }}, "events": [{}] }}"#,
            events.join(",")
        )
    }

    fn write_project(dir: &Path, features: &[&str], extra: &str) -> PathBuf {
        let observed: Vec<String> = features.iter().map(|f| observed(f)).collect();
        let forecasts: Vec<String> = features.iter().map(|f| forecast(f)).collect();
        std::fs::write(dir.join("observed.json"), format!("[{}]", observed.join(","))).unwrap();
        std::fs::write(dir.join("forecasts.json"), format!("[{}]", forecasts.join(","))).unwrap();

        let feature_tables: String = features
            .iter()
            .map(|f| format!("[[features]]\nleft = \"{f}\"\n"))
            .collect();
        let config = format!(
            r#"
[io]
left = "{}"
right = "{}"

[evaluation]
left_type = "observations"
right_type = "single_valued_forecasts"

{feature_tables}
{extra}
"#,
            dir.join("observed.json").display(),
            dir.join("forecasts.json").display(),
        );
        let path = dir.join("wres.toml");
        std::fs::write(&path, config).unwrap();
        path
    }

    fn read_output(path: &Path) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    // ---------------------------------------------------------------
    // Tests
    // ---------------------------------------------------------------

    #[test]
    fn writes_statistics_per_pool() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_project(dir.path(), &["DRRC2"], "");
        let output = dir.path().join("out.json");
        run(RunArgs {
            config,
            output: Some(output.clone()),
            seed: None,
        })
        .unwrap();

        let json = read_output(&output);
        let pools = json.as_array().unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0]["feature_group"], "DRRC2-DRRC2");
        assert_eq!(pools[0]["main"]["sample_size"], 6);
        assert_relative_eq!(pools[0]["main"]["mean_error"].as_f64().unwrap(), 1.0);
        assert!(pools[0].get("uncertainty").is_none());
    }

    #[test]
    fn lead_pools_and_bootstrap() {
        let dir = tempfile::tempdir().unwrap();
        let extra = r#"
[lead_pools]
period = "3h"
maximum = "6h"

[bootstrap]
samples = 20
quantiles = [0.1, 0.5, 0.9]
"#;
        let config = write_project(dir.path(), &["A", "B"], extra);
        run(RunArgs {
            config: config.clone(),
            output: None,
            seed: Some(11),
        })
        .unwrap();

        let json = read_output(&config.with_extension("statistics.json"));
        let pools = json.as_array().unwrap();
        assert_eq!(pools.len(), 4);
        assert!(pools.iter().all(|p| p["main"]["sample_size"] == 3));
        assert!(pools.iter().all(|p| p["uncertainty"].as_array().map(Vec::len) == Some(3)));
    }

    #[test]
    fn no_statistics_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        // no lead durations in the data fall within this window
        let extra = r#"
[[time_windows]]
earliest_lead_duration = "12h"
latest_lead_duration = "18h"
"#;
        let config = write_project(dir.path(), &["A"], extra);
        let result = run(RunArgs {
            config,
            output: Some(dir.path().join("out.json")),
            seed: None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn missing_right_path_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wres.toml");
        std::fs::write(
            &path,
            "[evaluation]\nleft_type = \"observations\"\nright_type = \"single_valued_forecasts\"\n\n[io]\nleft = \"x.json\"\n",
        )
        .unwrap();
        let err = run(RunArgs {
            config: path,
            output: None,
            seed: None,
        })
        .unwrap_err();
        assert!(format!("{err:#}").contains("[io].right"));
    }
}
