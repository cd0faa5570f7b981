//! Collective regression: veracity as the equilibrium of a trust system.
//!
//! Unknown nodes should agree with the `alpha`-discounted average of their
//! neighbors, and the neighbors of evidence nodes should reproduce the known
//! evidence values. With evidence values pinned, the residuals over the
//! partitioned system are
//!
//! ```text
//! r_u(x) = alpha·(A1·x + b) − x          (unknown rows)
//! r_e(x) = alpha·(A2·x + c) − evidence   (evidence rows)
//! Q(x)   = ‖r_u‖² + ‖r_e‖²
//! ∇Q(x)  = (alpha·A1 − I)ᵀ·r_u + alpha·A2ᵀ·r_e
//! ```
//!
//! (the gradient drops the constant factor 2). `Q` is minimized by projected
//! gradient descent on the box [0,1] with a halving line search. The evidence
//! term is unweighted while propagated influence is discounted by `alpha`.
//!
//! [`MaskedSystem`] is the full-length formulation with a mask vector; it
//! shares the solver and reaches the same fixed points as
//! [`PartitionedSystem`], at the cost of carrying evidence rows through every
//! product.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::engine::adjacency::normalize;
use crate::engine::errors::CredenceError;
use crate::engine::evidence::{partition, EvidenceSet, Partition};
use crate::engine::graph::{NodeId, TrustGraph};
use crate::engine::matrix::{squared_distance, DenseMatrix};
use crate::engine::prediction::VeracityPrediction;

/// Default gradient step before any backtracking.
pub const DEFAULT_LEARNING_RATE: f64 = 0.1;

/// Default bound on the squared distance between successive iterates.
pub const DEFAULT_CONVERGENCE_THRESHOLD: f64 = 1e-4;

/// Configuration for collective-regression propagation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropagationConfig {
    /// Trust/decay factor in (0, 1] applied to propagated influence.
    pub alpha: f64,
    /// Initial gradient step. Halved on every overshoot and kept halved.
    pub learning_rate: f64,
    /// Absolute bound on `‖x − x'‖²` that ends the iteration.
    pub convergence_threshold: f64,
    /// Maximum accepted steps before reporting non-convergence.
    pub max_iterations: usize,
    /// Maximum learning-rate halvings within one step before the step is rejected.
    pub max_backtracks: usize,
    /// Optional wall-clock budget for the whole run.
    pub time_budget: Option<Duration>,
    /// Seed for the random initial vector; `None` draws from OS entropy.
    pub rng_seed: Option<u64>,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            learning_rate: DEFAULT_LEARNING_RATE,
            convergence_threshold: DEFAULT_CONVERGENCE_THRESHOLD,
            max_iterations: 10_000,
            max_backtracks: 64,
            time_budget: None,
            rng_seed: None,
        }
    }
}

impl PropagationConfig {
    pub fn with_alpha(alpha: f64) -> Self {
        Self {
            alpha,
            ..Self::default()
        }
    }

    pub fn validate(self) -> Result<Self, CredenceError> {
        if !self.alpha.is_finite() || self.alpha <= 0.0 || self.alpha > 1.0 {
            return Err(CredenceError::ValidationError(
                "propagate: alpha must be in (0, 1]".into(),
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(CredenceError::ValidationError(
                "propagate: learning_rate must be finite and > 0".into(),
            ));
        }
        if !self.convergence_threshold.is_finite() || self.convergence_threshold <= 0.0 {
            return Err(CredenceError::ValidationError(
                "propagate: convergence_threshold must be finite and > 0".into(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(CredenceError::ValidationError(
                "propagate: max_iterations must be > 0".into(),
            ));
        }
        if self.max_backtracks == 0 {
            return Err(CredenceError::ValidationError(
                "propagate: max_backtracks must be > 0".into(),
            ));
        }
        Ok(self)
    }
}

/// Runtime diagnostics emitted by the propagation solver.
#[derive(Debug, Clone, PartialEq)]
pub struct PropagationDiagnostics {
    /// Iteration limit configured for this run.
    pub max_iterations: usize,
    /// Number of accepted steps.
    pub iterations_run: usize,
    /// Whether the step bound was reached before any budget ran out.
    pub converged: bool,
    /// Squared distance covered by the last accepted step.
    pub final_step: f64,
    /// Objective at the returned vector.
    pub final_objective: f64,
    /// Learning rate after all halvings.
    pub final_learning_rate: f64,
    /// Total learning-rate halvings across the run.
    pub backtracks: usize,
    /// Objective at the initial vector and after every accepted step.
    pub objective_trace: Vec<f64>,
}

/// Result of a propagation run: the best-effort vector plus diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct PropagationOutcome {
    /// Veracity per solved coordinate, each within [0, 1].
    pub veracity: Vec<f64>,
    pub diagnostics: PropagationDiagnostics,
}

impl PropagationOutcome {
    pub fn converged(&self) -> bool {
        self.diagnostics.converged
    }

    /// Returns the vector, or [`CredenceError::NonConvergence`] if the budget ran out.
    pub fn into_converged(self) -> Result<Vec<f64>, CredenceError> {
        if self.diagnostics.converged {
            Ok(self.veracity)
        } else {
            Err(CredenceError::NonConvergence {
                iterations: self.diagnostics.iterations_run,
                last_step: self.diagnostics.final_step,
            })
        }
    }
}

/// A least-squares trust system solvable by [`descend`].
pub trait TrustSystem {
    /// Number of coordinates in the solved vector.
    fn dimension(&self) -> usize;

    /// `Q(x)`.
    fn objective(&self, x: &[f64]) -> Result<f64, CredenceError>;

    /// `∇Q(x)` up to a constant positive factor.
    fn gradient(&self, x: &[f64]) -> Result<Vec<f64>, CredenceError>;
}

/// The system restricted to unknown nodes.
#[derive(Debug, Clone, Copy)]
pub struct PartitionedSystem<'a> {
    partition: &'a Partition,
    alpha: f64,
}

impl<'a> PartitionedSystem<'a> {
    pub fn new(partition: &'a Partition, alpha: f64) -> Result<Self, CredenceError> {
        let n = partition.unknown_len();
        let k = partition.evidence_len();
        let consistent = partition.a1.rows() == n
            && partition.a1.cols() == n
            && partition.a2.rows() == k
            && partition.a2.cols() == n
            && partition.b.len() == n
            && partition.c.len() == k
            && partition.evidence_values.len() == k;
        if !consistent {
            return Err(CredenceError::DimensionMismatch(format!(
                "propagate: inconsistent partition (A1 {}x{}, A2 {}x{}, b {}, c {}, {} unknown, {} evidence)",
                partition.a1.rows(),
                partition.a1.cols(),
                partition.a2.rows(),
                partition.a2.cols(),
                partition.b.len(),
                partition.c.len(),
                n,
                k
            )));
        }
        Ok(Self { partition, alpha })
    }

    fn residuals(&self, x: &[f64]) -> Result<(Vec<f64>, Vec<f64>), CredenceError> {
        let p = self.partition;
        let alpha = self.alpha;
        let unknown: Vec<f64> = p
            .a1
            .mul_vec(x)?
            .iter()
            .zip(&p.b)
            .zip(x)
            .map(|((ax, b), xi)| alpha * (ax + b) - xi)
            .collect();
        let evidence: Vec<f64> = p
            .a2
            .mul_vec(x)?
            .iter()
            .zip(&p.c)
            .zip(&p.evidence_values)
            .map(|((ax, c), v)| alpha * (ax + c) - v)
            .collect();
        Ok((unknown, evidence))
    }
}

impl TrustSystem for PartitionedSystem<'_> {
    fn dimension(&self) -> usize {
        self.partition.unknown_len()
    }

    fn objective(&self, x: &[f64]) -> Result<f64, CredenceError> {
        let (r_u, r_e) = self.residuals(x)?;
        Ok(sum_of_squares(&r_u) + sum_of_squares(&r_e))
    }

    fn gradient(&self, x: &[f64]) -> Result<Vec<f64>, CredenceError> {
        let (r_u, r_e) = self.residuals(x)?;
        let mut grad = self.partition.a1.transpose_mul_vec(&r_u)?;
        for (g, r) in grad.iter_mut().zip(&r_u) {
            *g = self.alpha * *g - r;
        }
        let from_evidence = self.partition.a2.transpose_mul_vec(&r_e)?;
        for (g, e) in grad.iter_mut().zip(&from_evidence) {
            *g += self.alpha * e;
        }
        Ok(grad)
    }
}

/// Full-length system with a mask vector; evidence coordinates stay pinned.
#[derive(Debug, Clone)]
pub struct MaskedSystem<'a> {
    adjacency: &'a DenseMatrix,
    mask: Vec<f64>,
    evidence_vector: Vec<f64>,
    alpha: f64,
}

impl<'a> MaskedSystem<'a> {
    pub fn new(
        adjacency: &'a DenseMatrix,
        evidence: &EvidenceSet,
        alpha: f64,
    ) -> Result<Self, CredenceError> {
        if !adjacency.is_square() {
            return Err(CredenceError::DimensionMismatch(format!(
                "propagate: adjacency must be square, got {}x{}",
                adjacency.rows(),
                adjacency.cols()
            )));
        }
        let n = adjacency.rows();
        if let Some((id, _)) = evidence.entries().iter().find(|(id, _)| id.index() >= n) {
            return Err(CredenceError::ValidationError(format!(
                "propagate: evidence index {} outside {} nodes",
                id.0, n
            )));
        }
        let mut evidence_vector = vec![0.0; n];
        for &(id, value) in evidence.entries() {
            evidence_vector[id.index()] = value;
        }
        Ok(Self {
            adjacency,
            mask: evidence.mask_vector(n),
            evidence_vector,
            alpha,
        })
    }

    fn residual(&self, z: &[f64]) -> Result<Vec<f64>, CredenceError> {
        Ok(self
            .adjacency
            .mul_vec(z)?
            .iter()
            .zip(&self.mask)
            .zip(z)
            .zip(&self.evidence_vector)
            .map(|(((az, m), zi), ev)| self.alpha * az - m * zi - ev)
            .collect())
    }
}

impl TrustSystem for MaskedSystem<'_> {
    fn dimension(&self) -> usize {
        self.adjacency.rows()
    }

    fn objective(&self, z: &[f64]) -> Result<f64, CredenceError> {
        Ok(sum_of_squares(&self.residual(z)?))
    }

    fn gradient(&self, z: &[f64]) -> Result<Vec<f64>, CredenceError> {
        let r = self.residual(z)?;
        let mut grad = self.adjacency.transpose_mul_vec(&r)?;
        for ((g, m), ri) in grad.iter_mut().zip(&self.mask).zip(&r) {
            // Evidence coordinates get no gradient, which keeps them pinned.
            *g = m * (self.alpha * *g - ri);
        }
        Ok(grad)
    }
}

/// Propagates trust over a partition, starting from `seed` or a random vector.
pub fn propagate(
    partition: &Partition,
    config: &PropagationConfig,
    seed: Option<&[f64]>,
) -> Result<PropagationOutcome, CredenceError> {
    let config = config.validate()?;
    let system = PartitionedSystem::new(partition, config.alpha)?;
    let x0 = initial_vector(system.dimension(), &config, seed)?;
    descend(&system, &config, x0)
}

/// Propagates trust with the masked full-length formulation.
///
/// The returned vector covers all nodes; evidence entries equal their values.
pub fn propagate_masked(
    adjacency: &DenseMatrix,
    evidence: &EvidenceSet,
    config: &PropagationConfig,
    seed: Option<&[f64]>,
) -> Result<PropagationOutcome, CredenceError> {
    let config = config.validate()?;
    let system = MaskedSystem::new(adjacency, evidence, config.alpha)?;
    let mut z0 = initial_vector(system.dimension(), &config, seed)?;
    for &(id, value) in evidence.entries() {
        z0[id.index()] = value;
    }
    descend(&system, &config, z0)
}

/// `Q(x)` for the partitioned system.
pub fn objective(partition: &Partition, alpha: f64, x: &[f64]) -> Result<f64, CredenceError> {
    let system = PartitionedSystem::new(partition, alpha)?;
    check_len(&system, x)?;
    system.objective(x)
}

/// `∇Q(x)` for the partitioned system.
pub fn gradient(partition: &Partition, alpha: f64, x: &[f64]) -> Result<Vec<f64>, CredenceError> {
    let system = PartitionedSystem::new(partition, alpha)?;
    check_len(&system, x)?;
    system.gradient(x)
}

/// Projected gradient descent with halving backtracking.
///
/// Accepted iterates never increase the objective: a step whose objective
/// exceeds the current one is retried from the same point with half the
/// learning rate. After `max_backtracks` halvings the step is dropped and the
/// run ends at the current point without converging.
pub fn descend<S: TrustSystem>(
    system: &S,
    config: &PropagationConfig,
    x0: Vec<f64>,
) -> Result<PropagationOutcome, CredenceError> {
    check_len(system, &x0)?;
    let started = Instant::now();
    let mut x = x0;
    let mut q = finite_objective(system, &x)?;
    let mut learning_rate = config.learning_rate;
    let mut diagnostics = PropagationDiagnostics {
        max_iterations: config.max_iterations,
        iterations_run: 0,
        converged: false,
        final_step: f64::INFINITY,
        final_objective: q,
        final_learning_rate: learning_rate,
        backtracks: 0,
        objective_trace: vec![q],
    };

    for iteration in 0..config.max_iterations {
        let grad = system.gradient(&x)?;
        let mut candidate = projected_step(&x, &grad, learning_rate);
        let mut candidate_q = finite_objective(system, &candidate)?;

        let mut halvings = 0;
        let mut rejected = false;
        while candidate_q > q {
            if halvings == config.max_backtracks {
                rejected = true;
                break;
            }
            learning_rate *= 0.5;
            halvings += 1;
            candidate = projected_step(&x, &grad, learning_rate);
            candidate_q = finite_objective(system, &candidate)?;

            #[cfg(feature = "tracing")]
            tracing::trace!(
                iteration,
                learning_rate,
                objective = candidate_q,
                "propagate: overshoot, halving learning rate"
            );
        }
        diagnostics.backtracks += halvings;
        if rejected {
            #[cfg(feature = "tracing")]
            tracing::debug!(iteration, halvings, "propagate: step rejected, stopping");
            break;
        }

        let step = squared_distance(&x, &candidate);
        x = candidate;
        q = candidate_q;
        diagnostics.iterations_run = iteration + 1;
        diagnostics.final_step = step;
        diagnostics.objective_trace.push(q);

        #[cfg(feature = "tracing")]
        tracing::debug!(iteration, objective = q, step, "propagate: accepted step");

        if step < config.convergence_threshold {
            diagnostics.converged = true;
            break;
        }
        if let Some(budget) = config.time_budget {
            if started.elapsed() >= budget {
                break;
            }
        }
    }

    diagnostics.final_objective = q;
    diagnostics.final_learning_rate = learning_rate;

    #[cfg(feature = "tracing")]
    if !diagnostics.converged {
        tracing::warn!(
            iterations = diagnostics.iterations_run,
            last_step = diagnostics.final_step,
            "propagate: budget exhausted before convergence"
        );
    }

    Ok(PropagationOutcome {
        veracity: x,
        diagnostics,
    })
}

/// Collective-regression veracity for every non-evidence node of `graph`.
///
/// Fails with [`CredenceError::NonConvergence`] when the solver runs out of
/// budget; use
/// [`predict_veracity_collective_regression_with_diagnostics`] to get the
/// best-effort values instead.
pub fn predict_veracity_collective_regression(
    graph: &TrustGraph,
    evidence: &EvidenceSet,
    config: &PropagationConfig,
) -> Result<VeracityPrediction, CredenceError> {
    let (prediction, diagnostics) =
        predict_veracity_collective_regression_with_diagnostics(graph, evidence, config, None)?;
    if !diagnostics.converged {
        return Err(CredenceError::NonConvergence {
            iterations: diagnostics.iterations_run,
            last_step: diagnostics.final_step,
        });
    }
    Ok(prediction)
}

/// Collective-regression veracity with solver diagnostics.
///
/// `init`, when given, is a full-length vector over all nodes of `graph`;
/// only its unknown-node entries seed the solver.
pub fn predict_veracity_collective_regression_with_diagnostics(
    graph: &TrustGraph,
    evidence: &EvidenceSet,
    config: &PropagationConfig,
    init: Option<&[f64]>,
) -> Result<(VeracityPrediction, PropagationDiagnostics), CredenceError> {
    let a = normalize(graph)?;
    let parts = partition(&a, evidence)?;
    let seed = match init {
        Some(full) => {
            if full.len() != graph.len() {
                return Err(CredenceError::ValidationError(format!(
                    "propagate: initial vector has {} entries, graph has {} nodes",
                    full.len(),
                    graph.len()
                )));
            }
            Some(parts.unknown.iter().map(|&i| full[i]).collect::<Vec<_>>())
        }
        None => None,
    };
    let outcome = propagate(&parts, config, seed.as_deref())?;

    #[cfg(feature = "tracing")]
    tracing::info!(
        nodes = graph.len(),
        evidence = evidence.len(),
        iterations = outcome.diagnostics.iterations_run,
        converged = outcome.diagnostics.converged,
        "collective regression finished"
    );

    let prediction = VeracityPrediction::from_indexed(
        graph,
        parts
            .unknown
            .iter()
            .zip(&outcome.veracity)
            .map(|(&i, &v)| (NodeId(i as u32), v)),
    )?;
    Ok((prediction, outcome.diagnostics))
}

fn initial_vector(
    len: usize,
    config: &PropagationConfig,
    seed: Option<&[f64]>,
) -> Result<Vec<f64>, CredenceError> {
    match seed {
        Some(values) => {
            if values.len() != len {
                return Err(CredenceError::ValidationError(format!(
                    "propagate: seed has {} entries, expected {}",
                    values.len(),
                    len
                )));
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(CredenceError::Numerical(
                    "propagate: seed contains NaN or infinite values".into(),
                ));
            }
            Ok(values.iter().map(|v| v.clamp(0.0, 1.0)).collect())
        }
        None => {
            let mut rng = match config.rng_seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_entropy(),
            };
            Ok((0..len).map(|_| rng.gen::<f64>()).collect())
        }
    }
}

#[inline]
fn projected_step(x: &[f64], grad: &[f64], learning_rate: f64) -> Vec<f64> {
    x.iter()
        .zip(grad)
        .map(|(xi, g)| (xi - learning_rate * g).clamp(0.0, 1.0))
        .collect()
}

fn finite_objective<S: TrustSystem>(system: &S, x: &[f64]) -> Result<f64, CredenceError> {
    let q = system.objective(x)?;
    if q.is_finite() {
        Ok(q)
    } else {
        Err(CredenceError::Numerical(format!(
            "propagate: objective is {}",
            q
        )))
    }
}

fn check_len<S: TrustSystem>(system: &S, x: &[f64]) -> Result<(), CredenceError> {
    if x.len() == system.dimension() {
        Ok(())
    } else {
        Err(CredenceError::DimensionMismatch(format!(
            "propagate: vector has {} entries, system has {} coordinates",
            x.len(),
            system.dimension()
        )))
    }
}

#[inline]
fn sum_of_squares(v: &[f64]) -> f64 {
    v.iter().map(|r| r * r).sum()
}
