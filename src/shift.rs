use tracing::{debug, info};

use crate::error::Result;
use crate::timeline::TeamTimeline;

pub const SHIFTED_SUFFIX: &str = "_shifted";

pub fn shifted_column(feature: &str) -> String {
    format!("{feature}{SHIFTED_SUFFIX}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapPolicy {
    Undefined,
    /// Undefined entries and exact zeros (a recorded zero is treated as not recorded).
    UndefinedOrZero,
}

impl GapPolicy {
    pub fn from_zero_as_missing(zero_as_missing: bool) -> Self {
        if zero_as_missing {
            GapPolicy::UndefinedOrZero
        } else {
            GapPolicy::Undefined
        }
    }

    pub fn is_gap(self, value: Option<f64>) -> bool {
        match (self, value) {
            (_, None) => true,
            (_, Some(v)) if v.is_nan() => true,
            (GapPolicy::UndefinedOrZero, Some(v)) => v == 0.0,
            (GapPolicy::Undefined, Some(_)) => false,
        }
    }
}

pub fn shift_series(series: &[Option<f64>]) -> Vec<Option<f64>> {
    if series.is_empty() {
        return Vec::new();
    }
    std::iter::once(None)
        .chain(series[..series.len() - 1].iter().copied())
        .collect()
}

/// Replaces gaps with the mean of the non-gap values among the trailing `window` positions.
///
/// A gap whose window holds no valid value stays undefined.
pub fn backfill_with_rolling_mean(series: &[Option<f64>], window: usize, policy: GapPolicy) -> Vec<Option<f64>> {
    let window = window.max(1);
    let masked: Vec<Option<f64>> = series
        .iter()
        .map(|v| if policy.is_gap(*v) { None } else { *v })
        .collect();

    series
        .iter()
        .enumerate()
        .map(|(idx, v)| {
            if !policy.is_gap(*v) {
                return *v;
            }
            let start = (idx + 1).saturating_sub(window);
            let (sum, n) = masked[start..=idx]
                .iter()
                .filter_map(|x| *x)
                .fold((0.0, 0usize), |(sum, n), x| (sum + x, n + 1));
            (n > 0).then(|| sum / n as f64)
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureShifter {
    pub backfill_window: usize,
    pub policy: GapPolicy,
}

impl Default for FeatureShifter {
    fn default() -> Self {
        Self {
            backfill_window: 5,
            policy: GapPolicy::UndefinedOrZero,
        }
    }
}

impl FeatureShifter {
    pub fn new(backfill_window: usize, policy: GapPolicy) -> Self {
        Self {
            backfill_window,
            policy,
        }
    }

    pub fn shift_by_one(&self, timeline: &TeamTimeline, features: &[String]) -> Result<TeamTimeline> {
        let mut out = timeline.clone();
        for feature in features {
            let shifted = timeline.map_groups(feature, shift_series)?;
            out.set_column(&shifted_column(feature), shifted)?;
        }
        Ok(out)
    }

    pub fn backfill(&self, timeline: &TeamTimeline, features: &[String]) -> Result<TeamTimeline> {
        let mut out = timeline.clone();
        for feature in features {
            let col = shifted_column(feature);
            let filled = timeline.map_groups(&col, |grp| {
                backfill_with_rolling_mean(grp, self.backfill_window, self.policy)
            })?;
            out.set_column(&col, filled)?;
        }
        Ok(out)
    }

    pub fn drop_unresolved(&self, timeline: &TeamTimeline, features: &[String]) -> Result<TeamTimeline> {
        let mut keep = vec![true; timeline.len()];
        for feature in features {
            let values = timeline.column(&shifted_column(feature))?;
            for (flag, v) in keep.iter_mut().zip(values) {
                if self.policy.is_gap(v) {
                    *flag = false;
                }
            }
        }

        let mut out = timeline.clone();
        out.retain_rows(&keep);
        let dropped = timeline.len() - out.len();
        if dropped > 0 {
            info!(dropped, remaining = out.len(), "dropped timeline rows without usable history");
        }
        Ok(out)
    }

    pub fn shift_features(&self, timeline: &TeamTimeline, features: &[String]) -> Result<TeamTimeline> {
        debug!(?features, policy = ?self.policy, "shifting team features");
        let shifted = self.shift_by_one(timeline, features)?;
        let filled = self.backfill(&shifted, features)?;
        self.drop_unresolved(&filled, features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backfill_removes_nan_and_zero() {
        let series = [
            Some(1.0),
            Some(0.0),
            Some(3.0),
            None,
            Some(5.0),
            Some(0.0),
            Some(7.0),
        ];
        let filled = backfill_with_rolling_mean(&series, 2, GapPolicy::UndefinedOrZero);
        assert_eq!(filled.len(), series.len());
        assert!(filled.iter().all(|v| v.is_some_and(|v| v != 0.0)));
        assert_eq!(
            filled,
            vec![Some(1.0), Some(1.0), Some(3.0), Some(3.0), Some(5.0), Some(5.0), Some(7.0)]
        );
    }

    #[test]
    fn zero_is_kept_when_policy_allows_it() {
        let filled = backfill_with_rolling_mean(&[Some(2.0), Some(0.0), None], 5, GapPolicy::Undefined);
        assert_eq!(filled, vec![Some(2.0), Some(0.0), Some(1.0)]);
    }

    #[test]
    fn leading_gap_without_history_stays_undefined() {
        let filled = backfill_with_rolling_mean(&[None, Some(4.0)], 5, GapPolicy::UndefinedOrZero);
        assert_eq!(filled, vec![None, Some(4.0)]);
    }

    #[test]
    fn shift_moves_values_down_one_position() {
        assert_eq!(
            shift_series(&[Some(1.0), Some(2.0), None]),
            vec![None, Some(1.0), Some(2.0)]
        );
        assert!(shift_series(&[]).is_empty());
    }
}
