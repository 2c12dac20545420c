use tracing::debug;

use crate::error::Result;
use crate::timeline::{TEAM_GOAL, TEAM_SHOTON, TeamTimeline};

pub const GOAL_CONVERSION_RATE: &str = "goal_conversion_rate";

pub fn rolling_avg_column(feature: &str) -> String {
    format!("rolling_avg_{feature}")
}

pub fn rolling_std_column(feature: &str) -> String {
    format!("rolling_std_{feature}")
}

fn window_values(series: &[Option<f64>], end: usize, window: usize) -> impl Iterator<Item = f64> + '_ {
    let start = (end + 1).saturating_sub(window.max(1));
    series[start..=end].iter().filter_map(|v| *v)
}

pub fn rolling_average(series: &[Option<f64>], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    (0..series.len())
        .map(|end| {
            let (sum, n) = window_values(series, end, window)
                .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
            (n > 0 && n >= min_periods).then(|| sum / n as f64)
        })
        .collect()
}

/// Sample standard deviation over the trailing window; a single defined value yields 0.
pub fn rolling_std(series: &[Option<f64>], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    (0..series.len())
        .map(|end| {
            let values: Vec<f64> = window_values(series, end, window).collect();
            let n = values.len();
            if n == 0 || n < min_periods {
                return None;
            }
            if n == 1 {
                return Some(0.0);
            }
            let mean = values.iter().sum::<f64>() / n as f64;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            Some(var.sqrt())
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct RollingStatsComputer {
    pub window: usize,
    pub min_periods: usize,
}

impl Default for RollingStatsComputer {
    fn default() -> Self {
        Self {
            window: 5,
            min_periods: 1,
        }
    }
}

impl RollingStatsComputer {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            ..Self::default()
        }
    }

    pub fn add_conversion_rate(&self, timeline: &TeamTimeline) -> Result<TeamTimeline> {
        let goals = timeline.column(TEAM_GOAL)?;
        let shots = timeline.column(TEAM_SHOTON)?;
        let rate = goals
            .iter()
            .zip(&shots)
            .map(|(g, s)| match (g, s) {
                (Some(g), Some(s)) if *s > 0.0 => Some(g / s),
                _ => None,
            })
            .collect();

        let mut out = timeline.clone();
        out.set_column(GOAL_CONVERSION_RATE, rate)?;
        Ok(out)
    }

    pub fn apply(&self, timeline: &TeamTimeline, features: &[String]) -> Result<TeamTimeline> {
        let mut out = if features.iter().any(|f| f == GOAL_CONVERSION_RATE)
            && !timeline.has_column(GOAL_CONVERSION_RATE)
        {
            self.add_conversion_rate(timeline)?
        } else {
            timeline.clone()
        };

        for feature in features {
            let avg = out.map_groups(feature, |grp| {
                rolling_average(grp, self.window, self.min_periods)
            })?;
            // undefined deviations count as no spread
            let std = out
                .map_groups(feature, |grp| rolling_std(grp, self.window, self.min_periods))?
                .into_iter()
                .map(|v| Some(v.unwrap_or(0.0)))
                .collect();
            out.set_column(&rolling_avg_column(feature), avg)?;
            out.set_column(&rolling_std_column(feature), std)?;
        }
        debug!(features = features.len(), window = self.window, "rolling statistics added");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn single_element_laws() {
        assert_eq!(rolling_average(&[Some(4.0)], 3, 1), vec![Some(4.0)]);
        assert_eq!(rolling_std(&[Some(4.0)], 3, 1), vec![Some(0.0)]);
    }

    #[test]
    fn trailing_window_skips_undefined() {
        let series = [Some(1.0), None, Some(3.0), Some(5.0)];
        let avg = rolling_average(&series, 2, 1);
        assert_eq!(avg, vec![Some(1.0), Some(1.0), Some(3.0), Some(4.0)]);

        let std = rolling_std(&series, 3, 1);
        assert_eq!(std[1], Some(0.0));
        assert_relative_eq!(std[3].unwrap(), 2.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn min_periods_leaves_gaps() {
        let avg = rolling_average(&[Some(1.0), Some(2.0), None], 3, 2);
        assert_eq!(avg, vec![None, Some(1.5), Some(1.5)]);
        assert_eq!(rolling_std(&[None, None], 2, 1), vec![None, None]);
    }
}
