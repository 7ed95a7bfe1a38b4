//! Multi-observer triangulation consensus.
//!
//! Each observer sits at its own origin and reports a unit direction and a
//! distance to a shared target. Observers know each other's offsets (the
//! `origin` field, expressed in a frame shared by the set), but none of them
//! knows the target's world position. This module decides whether a set of
//! such readings is mutually consistent and, if so, how far to trust it.
//!
//! # Algorithm
//!
//! 1. Fewer than two measurements, or any non-finite/degenerate measurement,
//!    is rejected outright.
//! 2. Two observers: triangle inequality between the inter-observer distance
//!    and the two reported distances, plus the pair check of step 3 so the
//!    directions must agree too. Confidence is capped low.
//! 3. Three or more: for every ordered pair `(i, j)`, the angle at `i`
//!    between its target direction and the direction toward `j` plus the law
//!    of cosines predicts the distance `j` should report. The RMS of the
//!    prediction residuals is the geometric error.
//! 4. The set is valid iff the error is within
//!    `absolute_tolerance + relative_tolerance * mean_distance`.
//! 5. Confidence is `1 - n^-1.5` for valid sets, 0 otherwise; it rises with
//!    observer count, never with smaller error.
//! 6. Four or more consistent observers: the target position is solved by
//!    multilateration (least squares over the distance spheres).
//!
//! The validator keeps no state between calls and no observer reputation.

use serde::{Deserialize, Serialize};

use crate::config::{ConsensusConfig, SafetyConfiguration};
use crate::scale::is_valid_scale_factor;
use crate::vector::Vec3;

/// Direction vectors shorter than this cannot be normalised.
const DIRECTION_EPSILON: f64 = 1e-9;

/// One observer's reading of a shared target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObserverMeasurement {
    pub observer_id: u32,
    /// Observer position in the frame shared by the measurement set.
    pub origin: Vec3,
    /// Direction toward the target; normalised before use.
    pub direction: Vec3,
    pub distance: f64,
    pub scale_factor: f64,
    pub timestamp: f64,
}

impl ObserverMeasurement {
    /// Where this observer alone places the target.
    pub fn anchored_point(&self) -> Vec3 {
        self.origin + self.direction.normalize() * self.distance
    }
}

/// Why a set was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusRejection {
    InsufficientObservers,
    InvalidMeasurement { observer_id: u32 },
    Inconsistent,
}

/// Outcome of one validation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub valid: bool,
    /// In [0, 1]; 0 whenever `valid` is false.
    pub confidence: f64,
    /// RMS residual in measurement units; infinite when nothing could be measured.
    pub geometric_error: f64,
    pub observer_count: usize,
    pub recovered_position: Option<Vec3>,
    pub rejection: Option<ConsensusRejection>,
}

impl ConsensusResult {
    fn rejected(observer_count: usize, geometric_error: f64, reason: ConsensusRejection) -> Self {
        Self {
            valid: false,
            confidence: 0.0,
            geometric_error,
            observer_count,
            recovered_position: None,
            rejection: Some(reason),
        }
    }
}

/// Confidence for `count` mutually consistent observers.
pub fn observer_confidence(count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    1.0 - 1.0 / (count as f64).powf(1.5)
}

/// Stateless consensus checker.
#[derive(Debug, Clone)]
pub struct TriangulationConsensusValidator {
    config: SafetyConfiguration,
}

impl TriangulationConsensusValidator {
    pub fn new(config: &SafetyConfiguration) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn tolerances(&self) -> &ConsensusConfig {
        &self.config.consensus
    }

    /// Allowed RMS error for a set whose mean reported distance is `mean_distance`.
    pub fn tolerance_for(&self, mean_distance: f64) -> f64 {
        self.tolerances().absolute_tolerance + self.tolerances().relative_tolerance * mean_distance
    }

    fn is_usable(&self, m: &ObserverMeasurement) -> bool {
        m.origin.is_finite()
            && m.direction.is_finite()
            && m.direction.length() > DIRECTION_EPSILON
            && m.distance.is_finite()
            && m.distance >= 0.0
            && is_valid_scale_factor(m.scale_factor, &self.config)
    }

    /// Check a measurement set for mutual geometric consistency.
    pub fn validate_position(&self, measurements: &[ObserverMeasurement]) -> ConsensusResult {
        let count = measurements.len();
        if count < 2 {
            return ConsensusResult::rejected(
                count,
                f64::INFINITY,
                ConsensusRejection::InsufficientObservers,
            );
        }
        if let Some(bad) = measurements.iter().find(|m| !self.is_usable(m)) {
            return ConsensusResult::rejected(
                count,
                f64::INFINITY,
                ConsensusRejection::InvalidMeasurement {
                    observer_id: bad.observer_id,
                },
            );
        }

        let mean_distance = measurements.iter().map(|m| m.distance).sum::<f64>() / count as f64;
        let tolerance = self.tolerance_for(mean_distance);

        let geometric_error = if count == 2 {
            triangle_violation(&measurements[0], &measurements[1]).max(law_of_cosines_rms(measurements))
        } else {
            law_of_cosines_rms(measurements)
        };

        if !(geometric_error <= tolerance) {
            return ConsensusResult::rejected(count, geometric_error, ConsensusRejection::Inconsistent);
        }

        let mut confidence = observer_confidence(count);
        if count == 2 {
            confidence = confidence.min(self.tolerances().two_observer_confidence_cap);
        }

        let estimate = anchored_centroid(measurements);
        let recovered = if count >= 4 {
            multilaterate(measurements, estimate, self.tolerances().max_solver_iterations)
        } else {
            estimate
        };

        ConsensusResult {
            valid: true,
            confidence,
            geometric_error,
            observer_count: count,
            recovered_position: recovered.is_finite().then_some(recovered),
            rejection: None,
        }
    }
}

/// How far two reported distances break the triangle inequality with the baseline.
fn triangle_violation(a: &ObserverMeasurement, b: &ObserverMeasurement) -> f64 {
    let baseline = a.origin.distance(&b.origin);
    let too_short = (a.distance - b.distance).abs() - baseline;
    let too_long = baseline - (a.distance + b.distance);
    too_short.max(0.0) + too_long.max(0.0)
}

/// RMS of law-of-cosines residuals over every ordered observer pair.
fn law_of_cosines_rms(measurements: &[ObserverMeasurement]) -> f64 {
    let mut sum_squares = 0.0;
    let mut pairs = 0usize;

    for (i, from) in measurements.iter().enumerate() {
        let direction = from.direction.normalize();
        for (j, to) in measurements.iter().enumerate() {
            if i == j {
                continue;
            }
            let baseline = to.origin - from.origin;
            let separation = baseline.length();
            let predicted = if separation < DIRECTION_EPSILON {
                from.distance
            } else {
                // cos of the angle at `from` between target and the other observer.
                let cos_angle = direction.dot(&(baseline * (1.0 / separation))).clamp(-1.0, 1.0);
                (from.distance * from.distance + separation * separation
                    - 2.0 * from.distance * separation * cos_angle)
                    .max(0.0)
                    .sqrt()
            };
            let residual = predicted - to.distance;
            sum_squares += residual * residual;
            pairs += 1;
        }
    }

    (sum_squares / pairs as f64).sqrt()
}

/// Mean of each observer's own target estimate.
fn anchored_centroid(measurements: &[ObserverMeasurement]) -> Vec3 {
    let sum = measurements
        .iter()
        .fold(Vec3::ZERO, |acc, m| acc + m.anchored_point());
    sum * (1.0 / measurements.len() as f64)
}

/// Point minimising the squared distance to every observer's range sphere.
///
/// Damped Gauss-Newton from `initial`; the damping keeps the normal matrix
/// invertible when every observer lies in one plane.
fn multilaterate(measurements: &[ObserverMeasurement], initial: Vec3, iterations: u32) -> Vec3 {
    let mut p = initial;
    for _ in 0..iterations {
        let mut jtj = [[0.0f64; 3]; 3];
        let mut jtr = [0.0f64; 3];
        for m in measurements {
            let offset = p - m.origin;
            let range = offset.length();
            if range < DIRECTION_EPSILON {
                continue;
            }
            let row = [offset.x / range, offset.y / range, offset.z / range];
            let residual = range - m.distance;
            for a in 0..3 {
                jtr[a] += row[a] * residual;
                for b in 0..3 {
                    jtj[a][b] += row[a] * row[b];
                }
            }
        }

        let damping = 1e-9 * (jtj[0][0] + jtj[1][1] + jtj[2][2]).max(1.0);
        for (a, row) in jtj.iter_mut().enumerate() {
            row[a] += damping;
        }

        let Some(step) = solve3(&jtj, &[-jtr[0], -jtr[1], -jtr[2]]) else {
            break;
        };
        let step = Vec3::new(step[0], step[1], step[2]);
        if !step.is_finite() {
            break;
        }
        p = p + step;
        if step.length() <= 1e-9 * (1.0 + p.length()) {
            break;
        }
    }
    if p.is_finite() {
        p
    } else {
        initial
    }
}

/// Solve a 3x3 linear system by Cramer's rule.
fn solve3(m: &[[f64; 3]; 3], rhs: &[f64; 3]) -> Option<[f64; 3]> {
    let det = determinant(m);
    if !det.is_finite() || det.abs() < 1e-300 {
        return None;
    }
    let mut out = [0.0; 3];
    for (col, slot) in out.iter_mut().enumerate() {
        let mut replaced = *m;
        for row in 0..3 {
            replaced[row][col] = rhs[row];
        }
        *slot = determinant(&replaced) / det;
    }
    Some(out)
}

fn determinant(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Build an exact measurement of `target` from an observer at `origin`.
pub fn measure_from(observer_id: u32, origin: Vec3, target: Vec3, timestamp: f64) -> ObserverMeasurement {
    let offset = target - origin;
    ObserverMeasurement {
        observer_id,
        origin,
        direction: offset.normalize(),
        distance: offset.length(),
        scale_factor: 1.0,
        timestamp,
    }
}
