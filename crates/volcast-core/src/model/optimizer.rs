//! Derivative-free minimisation with the Nelder-Mead simplex method.
//!
//! Constraints are expressed by the objective itself: returning `+inf` for an
//! infeasible point makes the simplex contract back into the feasible region.

/// Stopping rules for [`nelder_mead`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMeadOptions {
    pub max_iterations: usize,
    /// Largest allowed coordinate spread between the best and any other vertex.
    pub x_tolerance: f64,
    /// Largest allowed objective spread between the best and any other vertex.
    pub f_tolerance: f64,
    /// Relative step used to build the initial simplex around the start point.
    pub initial_step: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iterations: 5_000,
            x_tolerance: 1e-7,
            f_tolerance: 1e-7,
            initial_step: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimisationResult {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;
const ZERO_STEP: f64 = 0.00025;

/// Minimise `objective` starting from `start`.
pub fn nelder_mead<F>(objective: F, start: &[f64], options: &NelderMeadOptions) -> OptimisationResult
where
    F: Fn(&[f64]) -> f64,
{
    let dim = start.len();
    let evaluate = |x: &[f64]| {
        let value = objective(x);
        if value.is_nan() {
            f64::INFINITY
        } else {
            value
        }
    };

    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(dim + 1);
    simplex.push((start.to_vec(), evaluate(start)));
    for axis in 0..dim {
        let mut vertex = start.to_vec();
        vertex[axis] = if vertex[axis] == 0.0 {
            ZERO_STEP
        } else {
            vertex[axis] * (1.0 + options.initial_step)
        };
        let value = evaluate(&vertex);
        simplex.push((vertex, value));
    }

    let mut iterations = 0;
    let mut converged = false;
    while iterations < options.max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        if has_converged(&simplex, options) {
            converged = true;
            break;
        }
        iterations += 1;

        let worst = dim;
        let centroid = centroid(&simplex[..worst]);
        let along = |coefficient: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(&simplex[worst].0)
                .map(|(c, w)| c + coefficient * (c - w))
                .collect()
        };

        let reflected = along(REFLECTION);
        let reflected_value = evaluate(&reflected);

        if reflected_value < simplex[0].1 {
            let expanded = along(EXPANSION);
            let expanded_value = evaluate(&expanded);
            simplex[worst] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
            continue;
        }

        if reflected_value < simplex[worst - 1].1 {
            simplex[worst] = (reflected, reflected_value);
            continue;
        }

        let (contracted, contracted_value) = if reflected_value < simplex[worst].1 {
            let outside = along(CONTRACTION);
            let value = evaluate(&outside);
            (outside, value)
        } else {
            let inside = along(-CONTRACTION);
            let value = evaluate(&inside);
            (inside, value)
        };

        if contracted_value < simplex[worst].1.min(reflected_value) {
            simplex[worst] = (contracted, contracted_value);
            continue;
        }

        let best = simplex[0].0.clone();
        for vertex in simplex.iter_mut().skip(1) {
            let shrunk: Vec<f64> = best
                .iter()
                .zip(&vertex.0)
                .map(|(b, v)| b + SHRINK * (v - b))
                .collect();
            let value = evaluate(&shrunk);
            *vertex = (shrunk, value);
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (x, value) = simplex.swap_remove(0);
    OptimisationResult {
        x,
        value,
        iterations,
        converged,
    }
}

fn centroid(vertices: &[(Vec<f64>, f64)]) -> Vec<f64> {
    let dim = vertices[0].0.len();
    let count = vertices.len() as f64;
    (0..dim)
        .map(|axis| vertices.iter().map(|(x, _)| x[axis]).sum::<f64>() / count)
        .collect()
}

fn has_converged(sorted: &[(Vec<f64>, f64)], options: &NelderMeadOptions) -> bool {
    let (best, best_value) = &sorted[0];
    if !best_value.is_finite() {
        return false;
    }
    sorted[1..].iter().all(|(x, value)| {
        (value - best_value).abs() <= options.f_tolerance
            && x
                .iter()
                .zip(best)
                .all(|(a, b)| (a - b).abs() <= options.x_tolerance)
    })
}
