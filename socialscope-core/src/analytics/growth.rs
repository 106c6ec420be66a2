//! Growth projection and capacity planning
//!
//! Monthly activity (users, posts and comments created) is accumulated into a
//! running total, a least-squares polynomial is fitted against the days
//! elapsed since the first month, and the fit is extrapolated three years
//! ahead. The ratio of projected to current activity scales the current
//! server count, plus a redundancy margin.

use crate::chart::{ChartSet, LineSeries, Panel, PanelBody, SeriesStyle};
use crate::error::{Error, Result};
use crate::types::MonthlyCount;
use chrono::{Duration, NaiveDate};
use serde::Serialize;

/// Degree of the fitted trend polynomial.
pub const POLYNOMIAL_DEGREE: usize = 2;

/// How far past the last observed month the trend is extrapolated.
pub const PROJECTION_HORIZON_DAYS: i64 = 3 * 365;

/// Head-room multiplier applied on top of the projected server count.
pub const REDUNDANCY_FACTOR: f64 = 1.20;

/// Number of samples in the rendered trend curve.
pub const TREND_SAMPLES: usize = 100;

const ANALYSIS: &str = "growth";

/// One month of activity with its running total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActivityPoint {
    pub month: NaiveDate,
    pub count: i64,
    pub cumulative: i64,
    /// Days elapsed since the first month
    pub days_since_start: i64,
}

/// Sort months, merge duplicates and compute the running total.
pub fn cumulative_activity(monthly: &[MonthlyCount]) -> Vec<ActivityPoint> {
    let mut sorted = monthly.to_vec();
    sorted.sort_by_key(|m| m.month);

    let mut merged: Vec<MonthlyCount> = Vec::with_capacity(sorted.len());
    for row in sorted {
        match merged.last_mut() {
            Some(last) if last.month == row.month => last.count += row.count,
            _ => merged.push(row),
        }
    }

    let Some(first) = merged.first().map(|m| m.month) else {
        return Vec::new();
    };

    let mut running = 0;
    merged
        .into_iter()
        .map(|m| {
            running += m.count;
            ActivityPoint {
                month: m.month,
                count: m.count,
                cumulative: running,
                days_since_start: (m.month - first).num_days(),
            }
        })
        .collect()
}

/// Polynomial with coefficients in ascending order of power.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polynomial {
    pub coefficients: Vec<f64>,
}

impl Polynomial {
    /// Least-squares fit of `ys` against `xs`, always with `degree + 1`
    /// coefficients.
    ///
    /// Each power column is scaled to unit norm before solving and the
    /// coefficients are rescaled afterwards. With fewer points than
    /// coefficients the system is underdetermined and the minimum-norm
    /// solution is returned.
    pub fn fit(xs: &[f64], ys: &[f64], degree: usize) -> Result<Self> {
        if xs.len() != ys.len() {
            return Err(Error::insufficient(
                ANALYSIS,
                format!("{} x values but {} y values", xs.len(), ys.len()),
            ));
        }
        if xs.is_empty() {
            return Err(Error::insufficient(ANALYSIS, "trend fit needs at least 1 point"));
        }

        let size = degree + 1;
        let mut columns: Vec<Vec<f64>> = (0..size)
            .map(|k| xs.iter().map(|x| x.powi(k as i32)).collect())
            .collect();
        let scales: Vec<f64> = columns
            .iter_mut()
            .map(|column| {
                let norm = column.iter().map(|v| v * v).sum::<f64>().sqrt();
                let norm = if norm > 0.0 { norm } else { 1.0 };
                column.iter_mut().for_each(|v| *v /= norm);
                norm
            })
            .collect();

        let scaled = if xs.len() >= size {
            least_squares(&columns, ys)?
        } else {
            minimum_norm(&columns, ys)?
        };
        let coefficients = scaled.iter().zip(&scales).map(|(c, s)| c / s).collect();

        Ok(Self { coefficients })
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    /// Evaluate with Horner's method.
    pub fn eval(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * x + c)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Normal equations `AᵀA c = Aᵀy` over the given design columns.
fn least_squares(columns: &[Vec<f64>], ys: &[f64]) -> Result<Vec<f64>> {
    let mut matrix: Vec<Vec<f64>> = columns
        .iter()
        .map(|a| columns.iter().map(|b| dot(a, b)).collect())
        .collect();
    let mut rhs: Vec<f64> = columns.iter().map(|column| dot(column, ys)).collect();
    solve(&mut matrix, &mut rhs)
}

/// Minimum-norm solution `c = Aᵀ (AAᵀ)⁻¹ y` of an underdetermined system.
fn minimum_norm(columns: &[Vec<f64>], ys: &[f64]) -> Result<Vec<f64>> {
    let rows: Vec<Vec<f64>> = (0..ys.len())
        .map(|i| columns.iter().map(|column| column[i]).collect())
        .collect();
    let mut gram: Vec<Vec<f64>> = rows
        .iter()
        .map(|a| rows.iter().map(|b| dot(a, b)).collect())
        .collect();
    let mut rhs = ys.to_vec();
    let weights = solve(&mut gram, &mut rhs)?;
    Ok(columns.iter().map(|column| dot(column, &weights)).collect())
}

/// Gaussian elimination with partial pivoting.
fn solve(matrix: &mut [Vec<f64>], rhs: &mut [f64]) -> Result<Vec<f64>> {
    let n = rhs.len();

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&a, &b| matrix[a][col].abs().total_cmp(&matrix[b][col].abs()))
            .unwrap_or(col);

        if matrix[pivot][col].abs() < 1e-12 {
            return Err(Error::insufficient(
                ANALYSIS,
                "trend fit is singular (activity months are not distinct)",
            ));
        }

        matrix.swap(col, pivot);
        rhs.swap(col, pivot);

        for row in col + 1..n {
            let factor = matrix[row][col] / matrix[col][col];
            for k in col..n {
                matrix[row][k] -= factor * matrix[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| matrix[row][k] * solution[k]).sum();
        solution[row] = (rhs[row] - tail) / matrix[row][row];
    }

    Ok(solution)
}

/// Server recommendation derived from the growth factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CapacityPlan {
    pub current_servers: u32,
    /// `current_servers * growth_factor`
    pub servers_base: f64,
    /// `servers_base * REDUNDANCY_FACTOR`
    pub servers_with_redundancy: f64,
    /// `servers_with_redundancy` rounded up
    pub servers_required: i64,
    /// `servers_required - current_servers` (negative when shrinking)
    pub additional_servers: i64,
}

impl CapacityPlan {
    pub fn new(current_servers: u32, growth_factor: f64) -> Self {
        let servers_base = current_servers as f64 * growth_factor;
        let servers_with_redundancy = servers_base * REDUNDANCY_FACTOR;
        let servers_required = servers_with_redundancy.ceil() as i64;
        Self {
            current_servers,
            servers_base,
            servers_with_redundancy,
            servers_required,
            additional_servers: servers_required - current_servers as i64,
        }
    }
}

/// Result of the growth analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthProjection {
    pub points: Vec<ActivityPoint>,
    pub trend: Polynomial,
    /// Last observed month
    pub current_date: NaiveDate,
    /// Cumulative activity at the last observed month
    pub current_activity: i64,
    pub activity_per_server: f64,
    pub projected_date: NaiveDate,
    pub projected_activity: f64,
    pub growth_factor: f64,
    pub capacity: CapacityPlan,
}

impl GrowthProjection {
    fn first_month(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.month)
    }

    fn projected_x(&self) -> f64 {
        self.points
            .last()
            .map(|p| (p.days_since_start + PROJECTION_HORIZON_DAYS) as f64)
            .unwrap_or(PROJECTION_HORIZON_DAYS as f64)
    }

    /// Fitted trend sampled evenly from the first month to the projected date.
    pub fn trend_curve(&self, samples: usize) -> Vec<(f64, f64)> {
        let end = self.projected_x();
        match samples {
            0 => Vec::new(),
            1 => vec![(0.0, self.trend.eval(0.0))],
            _ => (0..samples)
                .map(|i| {
                    let x = end * i as f64 / (samples - 1) as f64;
                    (x, self.trend.eval(x))
                })
                .collect(),
        }
    }

    /// Historical activity, trend curve and the current and projected points.
    pub fn chart(&self) -> ChartSet {
        let historical = self
            .points
            .iter()
            .map(|p| (p.days_since_start as f64, p.cumulative as f64))
            .collect();
        let current_x = self
            .points
            .last()
            .map(|p| p.days_since_start as f64)
            .unwrap_or(0.0);

        let start = self
            .first_month()
            .map(|d| d.format("%Y-%m").to_string())
            .unwrap_or_default();

        ChartSet {
            file_stem: "growth_projection".to_string(),
            title: "User Activity Growth and Server Capacity Projection".to_string(),
            panels: vec![Panel {
                title: format!(
                    "Projected activity on {}: {:.0} ({:.2}x)",
                    self.projected_date, self.projected_activity, self.growth_factor
                ),
                x_label: format!("Days since {}", start),
                y_label: "Cumulative activity".to_string(),
                body: PanelBody::Lines {
                    series: vec![
                        LineSeries {
                            name: "Historical activity".to_string(),
                            points: historical,
                            style: SeriesStyle::LineWithMarkers,
                        },
                        LineSeries {
                            name: format!("Trend (degree {})", self.trend.degree()),
                            points: self.trend_curve(TREND_SAMPLES),
                            style: SeriesStyle::Line,
                        },
                        LineSeries {
                            name: "Current".to_string(),
                            points: vec![(current_x, self.current_activity as f64)],
                            style: SeriesStyle::Points,
                        },
                        LineSeries {
                            name: "Projected".to_string(),
                            points: vec![(self.projected_x(), self.projected_activity)],
                            style: SeriesStyle::Points,
                        },
                    ],
                },
            }],
        }
    }
}

/// Fit the activity trend and derive the capacity recommendation.
pub fn project_growth(monthly: &[MonthlyCount], current_servers: u32) -> Result<GrowthProjection> {
    if current_servers == 0 {
        return Err(Error::Config(
            "current server count must be at least 1".to_string(),
        ));
    }

    let points = cumulative_activity(monthly);
    let Some(last) = points.last().copied() else {
        return Err(Error::insufficient(ANALYSIS, "no timestamped activity"));
    };
    if points.len() < 2 {
        return Err(Error::insufficient(
            ANALYSIS,
            format!("need at least 2 distinct months, found {}", points.len()),
        ));
    }
    if last.cumulative <= 0 {
        return Err(Error::insufficient(ANALYSIS, "no activity recorded"));
    }

    let xs: Vec<f64> = points.iter().map(|p| p.days_since_start as f64).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.cumulative as f64).collect();
    let trend = Polynomial::fit(&xs, &ys, POLYNOMIAL_DEGREE)?;

    let current_activity = last.cumulative;
    let projected_x = (last.days_since_start + PROJECTION_HORIZON_DAYS) as f64;
    let projected_activity = trend.eval(projected_x);
    let growth_factor = projected_activity / current_activity as f64;
    let capacity = CapacityPlan::new(current_servers, growth_factor);

    tracing::debug!(
        months = points.len(),
        degree = trend.degree(),
        current_activity,
        projected_activity,
        growth_factor,
        "Fitted growth trend"
    );

    Ok(GrowthProjection {
        current_date: last.month,
        current_activity,
        activity_per_server: current_activity as f64 / current_servers as f64,
        projected_date: last.month + Duration::days(PROJECTION_HORIZON_DAYS),
        projected_activity,
        growth_factor,
        capacity,
        points,
        trend,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn counts(rows: &[(i32, u32, i64)]) -> Vec<MonthlyCount> {
        rows.iter()
            .map(|&(y, m, count)| MonthlyCount {
                month: month(y, m),
                count,
            })
            .collect()
    }

    #[test]
    fn test_cumulative_is_sorted_and_non_decreasing() {
        let monthly = counts(&[(2024, 3, 3), (2024, 1, 9), (2024, 2, 2)]);
        let points = cumulative_activity(&monthly);

        let cumulative: Vec<i64> = points.iter().map(|p| p.cumulative).collect();
        assert_eq!(cumulative, vec![9, 11, 14]);
        assert!(points.windows(2).all(|w| w[0].cumulative <= w[1].cumulative));

        let days: Vec<i64> = points.iter().map(|p| p.days_since_start).collect();
        assert_eq!(days, vec![0, 31, 60]);
    }

    #[test]
    fn test_cumulative_merges_duplicate_months() {
        let monthly = counts(&[(2024, 1, 4), (2024, 1, 6), (2024, 2, 1)]);
        let points = cumulative_activity(&monthly);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].count, 10);
        assert_eq!(points[1].cumulative, 11);
    }

    #[test]
    fn test_fit_recovers_quadratic() {
        let xs: Vec<f64> = (0..6).map(|x| x as f64 * 30.0).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 + 3.0 * x + 0.5 * x * x).collect();

        let poly = Polynomial::fit(&xs, &ys, 2).unwrap();
        assert_eq!(poly.degree(), 2);
        assert!((poly.coefficients[0] - 2.0).abs() < 1e-6);
        assert!((poly.coefficients[1] - 3.0).abs() < 1e-6);
        assert!((poly.coefficients[2] - 0.5).abs() < 1e-9);
        assert!((poly.eval(1000.0) - (2.0 + 3000.0 + 500_000.0)).abs() < 1e-3);
    }

    #[test]
    fn test_fit_least_squares_line() {
        // Best fit through noisy symmetric points is y = x
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [0.5, 0.5, 2.5, 2.5];
        let poly = Polynomial::fit(&xs, &ys, 1).unwrap();
        assert!((poly.coefficients[1] - 0.8).abs() < 1e-9);
        assert!((poly.coefficients[0] - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_fit_singular_system() {
        let err = Polynomial::fit(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0], 2).unwrap_err();
        assert!(err.is_insufficient_data());
    }

    #[test]
    fn test_projection_capacity_relations() {
        // cumulative is roughly 100 + 0.01 * x^2 over five monthly samples
        let xs = [0i64, 31, 60, 91, 121];
        let dates = [
            month(2024, 1),
            month(2024, 2),
            month(2024, 3),
            month(2024, 4),
            month(2024, 5),
        ];
        let cumulative: Vec<f64> = xs.iter().map(|&x| 100.0 + 0.01 * (x * x) as f64).collect();
        // Convert the cumulative curve back into monthly deltas
        let mut monthly = Vec::new();
        let mut previous = 0.0;
        for (date, total) in dates.iter().zip(&cumulative) {
            monthly.push(MonthlyCount {
                month: *date,
                count: (total - previous).round() as i64,
            });
            previous = total.round();
        }

        let projection = project_growth(&monthly, 16).unwrap();
        assert_eq!(projection.trend.degree(), 2);
        assert_eq!(projection.current_date, month(2024, 5));
        assert_eq!(
            projection.projected_date,
            month(2024, 5) + Duration::days(PROJECTION_HORIZON_DAYS)
        );
        assert!(projection.growth_factor > 1.0);

        let plan = projection.capacity;
        assert!((plan.servers_with_redundancy - plan.servers_base * REDUNDANCY_FACTOR).abs() < 1e-9);
        assert_eq!(plan.servers_required, plan.servers_with_redundancy.ceil() as i64);
        assert_eq!(plan.additional_servers, plan.servers_required - 16);
        assert!((projection.activity_per_server - projection.current_activity as f64 / 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_two_months_fit_minimum_norm_quadratic() {
        let monthly = counts(&[(2024, 1, 10), (2024, 2, 10)]);
        let projection = project_growth(&monthly, 4).unwrap();

        // Cumulative 10 at day 0 and 20 at day 31
        let trend = &projection.trend;
        assert_eq!(trend.degree(), 2);
        assert!((trend.coefficients[0] - 10.0).abs() < 1e-9);
        assert!((trend.coefficients[1] - 5.0 / 31.0).abs() < 1e-12);
        assert!((trend.coefficients[2] - 5.0 / 961.0).abs() < 1e-12);
        assert!((trend.eval(31.0) - 20.0).abs() < 1e-9);

        let x = 31.0 + PROJECTION_HORIZON_DAYS as f64;
        let expected = 5.0 / 961.0 * x * x + 5.0 / 31.0 * x + 10.0;
        assert!((projection.projected_activity - expected).abs() < 1e-6);
        assert!((projection.growth_factor - expected / 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_underdetermined_keeps_degree() {
        let poly = Polynomial::fit(&[2.0], &[8.0], 2).unwrap();
        assert_eq!(poly.degree(), 2);
        assert!((poly.eval(2.0) - 8.0).abs() < 1e-9);

        assert!(Polynomial::fit(&[], &[], 2).unwrap_err().is_insufficient_data());
    }

    #[test]
    fn test_single_month_is_insufficient() {
        let err = project_growth(&counts(&[(2024, 1, 50)]), 16).unwrap_err();
        assert!(err.is_insufficient_data());
        assert!(err.to_string().contains("found 1"));

        assert!(project_growth(&[], 16).unwrap_err().is_insufficient_data());
    }

    #[test]
    fn test_capacity_plan_rounding() {
        let plan = CapacityPlan::new(16, 1.5);
        assert!((plan.servers_base - 24.0).abs() < 1e-9);
        assert!((plan.servers_with_redundancy - 28.8).abs() < 1e-9);
        assert_eq!(plan.servers_required, 29);
        assert_eq!(plan.additional_servers, 13);
    }

    #[test]
    fn test_trend_curve_spans_projection() {
        let monthly = counts(&[(2024, 1, 10), (2024, 2, 10), (2024, 3, 15)]);
        let projection = project_growth(&monthly, 16).unwrap();

        let curve = projection.trend_curve(TREND_SAMPLES);
        assert_eq!(curve.len(), TREND_SAMPLES);
        assert_eq!(curve[0].0, 0.0);
        assert_eq!(curve[TREND_SAMPLES - 1].0, (60 + PROJECTION_HORIZON_DAYS) as f64);

        let chart = projection.chart();
        assert_eq!(chart.file_stem, "growth_projection");
        assert_eq!(chart.panels.len(), 1);
    }
}
