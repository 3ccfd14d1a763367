//! Cross-pairing of main and baseline pairs, per feature or across features.

use std::collections::BTreeMap;

use tracing::debug;
use wres_datamodel::{FeatureTuple, Pair, TimeSeries};
use wres_pairing::{CrossPairScope, CrossPairer};

use crate::error::PoolError;

/// Paired series keyed by feature tuple.
pub type PairsByFeature<L, R> = BTreeMap<FeatureTuple, Vec<TimeSeries<Pair<L, R>>>>;

/// Trims main and baseline pairs to common times.
///
/// Within features, each feature's main pairs are cross-paired against that
/// feature's baseline pairs, and features without baseline pairs are
/// dropped. Across features, every list (baseline lists only when a
/// baseline is present) is reduced to one reference set by repeated
/// pairwise cross-pairing, and each list is then cross-paired against it.
///
/// # Errors
///
/// Propagates cross-pairing failures.
pub fn cross_pair<L, R>(
    main: PairsByFeature<L, R>,
    baseline: Option<PairsByFeature<L, R>>,
    pairer: &dyn CrossPairer<Pair<L, R>>,
    scope: CrossPairScope,
) -> Result<(PairsByFeature<L, R>, Option<PairsByFeature<L, R>>), PoolError>
where
    L: Clone,
    R: Clone,
{
    match scope {
        CrossPairScope::WithinFeatures => within_features(main, baseline, pairer),
        CrossPairScope::AcrossFeatures => across_features(main, baseline, pairer),
    }
}

fn within_features<L, R>(
    main: PairsByFeature<L, R>,
    baseline: Option<PairsByFeature<L, R>>,
    pairer: &dyn CrossPairer<Pair<L, R>>,
) -> Result<(PairsByFeature<L, R>, Option<PairsByFeature<L, R>>), PoolError> {
    let Some(mut baseline) = baseline else {
        return Ok((main, None));
    };

    let mut main_out = BTreeMap::new();
    let mut baseline_out = BTreeMap::new();
    for (tuple, pairs) in main {
        let Some(baseline_pairs) = baseline.remove(&tuple) else {
            debug!(
                feature = %tuple,
                "no baseline pairs to cross-pair with, removing the feature's main pairs"
            );
            continue;
        };
        let (m, b) = pairer.cross_pair(&pairs, &baseline_pairs)?.into_parts();
        main_out.insert(tuple.clone(), m);
        baseline_out.insert(tuple, b);
    }
    Ok((main_out, Some(baseline_out)))
}

fn across_features<L, R>(
    main: PairsByFeature<L, R>,
    baseline: Option<PairsByFeature<L, R>>,
    pairer: &dyn CrossPairer<Pair<L, R>>,
) -> Result<(PairsByFeature<L, R>, Option<PairsByFeature<L, R>>), PoolError>
where
    L: Clone,
    R: Clone,
{
    let mut reference: Option<Vec<TimeSeries<Pair<L, R>>>> = None;
    for list in main.values().chain(baseline.iter().flat_map(BTreeMap::values)) {
        reference = Some(match reference {
            None => list.clone(),
            Some(r) => pairer.cross_pair(&r, list)?.into_parts().0,
        });
    }
    let Some(reference) = reference else {
        return Ok((main, baseline));
    };
    debug!(n_series = reference.len(), "reduced all pairs to a common reference");

    let against_reference = |pairs: PairsByFeature<L, R>| -> Result<PairsByFeature<L, R>, PoolError> {
        pairs
            .into_iter()
            .map(|(tuple, p)| Ok((tuple, pairer.cross_pair(&p, &reference)?.into_parts().0)))
            .collect()
    };
    let main = against_reference(main)?;
    let baseline = baseline.map(against_reference).transpose()?;
    Ok((main, baseline))
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use wres_datamodel::{Event, Feature, TimeSeriesMetadata};
    use wres_pairing::{CrossPairMethod, TimeSeriesCrossPairer};

    use super::*;

    fn t(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + TimeDelta::hours(hour)
    }

    fn tuple(name: &str) -> FeatureTuple {
        FeatureTuple::new(Feature::new(name), Feature::new(name), Some(Feature::new("B")))
    }

    fn pairs(name: &str, hours: &[i64]) -> Vec<TimeSeries<Pair<f64, f64>>> {
        let meta = TimeSeriesMetadata::new(Feature::new(name), "Q", "CMS");
        let events = hours.iter().map(|h| Event::new(t(*h), Pair::new(1.0, 2.0))).collect();
        vec![TimeSeries::new(meta, events).unwrap()]
    }

    fn hours(map: &PairsByFeature<f64, f64>, name: &str) -> Vec<i64> {
        map[&tuple(name)]
            .iter()
            .flat_map(|s| s.valid_times())
            .map(|v| (v - t(0)).num_hours())
            .collect()
    }

    fn pairer() -> TimeSeriesCrossPairer {
        TimeSeriesCrossPairer::new(CrossPairMethod::Exact)
    }

    #[test]
    fn within_features_trims_each_feature_to_its_baseline() {
        let main = BTreeMap::from([(tuple("F1"), pairs("F1", &[1, 2, 3])), (tuple("F2"), pairs("F2", &[2, 3, 4]))]);
        let baseline = BTreeMap::from([(tuple("F1"), pairs("B", &[1, 2])), (tuple("F2"), pairs("B", &[3, 4]))]);
        let (m, b) = cross_pair(main, Some(baseline), &pairer(), CrossPairScope::WithinFeatures).unwrap();
        assert_eq!(hours(&m, "F1"), vec![1, 2]);
        assert_eq!(hours(&m, "F2"), vec![3, 4]);
        assert_eq!(hours(b.as_ref().unwrap(), "F2"), vec![3, 4]);
    }

    #[test]
    fn across_features_trims_to_common_reference() {
        let main = BTreeMap::from([(tuple("F1"), pairs("F1", &[1, 2, 3])), (tuple("F2"), pairs("F2", &[2, 3, 4]))]);
        let baseline = BTreeMap::from([(tuple("F1"), pairs("B", &[2, 3])), (tuple("F2"), pairs("B", &[2, 3]))]);
        let (m, b) = cross_pair(main, Some(baseline), &pairer(), CrossPairScope::AcrossFeatures).unwrap();
        assert_eq!(hours(&m, "F1"), vec![2, 3]);
        assert_eq!(hours(&m, "F2"), vec![2, 3]);
        assert_eq!(hours(b.as_ref().unwrap(), "F1"), vec![2, 3]);
    }

    #[test]
    fn within_features_drops_features_without_baseline() {
        let main = BTreeMap::from([(tuple("F1"), pairs("F1", &[1])), (tuple("F2"), pairs("F2", &[1]))]);
        let baseline = BTreeMap::from([(tuple("F1"), pairs("B", &[1]))]);
        let (m, _) = cross_pair(main, Some(baseline), &pairer(), CrossPairScope::WithinFeatures).unwrap();
        assert!(m.contains_key(&tuple("F1")));
        assert!(!m.contains_key(&tuple("F2")));
    }

    #[test]
    fn without_baseline_across_features_uses_main_only() {
        let main = BTreeMap::from([(tuple("F1"), pairs("F1", &[1, 2, 3])), (tuple("F2"), pairs("F2", &[2, 3, 4]))]);
        let (m, b) = cross_pair(main, None, &pairer(), CrossPairScope::AcrossFeatures).unwrap();
        assert!(b.is_none());
        assert_eq!(hours(&m, "F1"), vec![2, 3]);
    }

    #[test]
    fn empty_input_unchanged() {
        let (m, b) = cross_pair::<f64, f64>(BTreeMap::new(), None, &pairer(), CrossPairScope::AcrossFeatures).unwrap();
        assert!(m.is_empty());
        assert!(b.is_none());
    }
}
