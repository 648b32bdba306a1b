use assert_float_eq::*;

use super::*;

fn rosenbrock_residuals(values: &[f64], residuals: &mut [f64]) {
    residuals[0] = 10.0 * (values[1] - values[0].powi(2));
    residuals[1] = 1.0 - values[0];
}

fn rosenbrock_jacobian(values: &[f64], jacobian: &mut Matrix) {
    jacobian[(0, 0)] = -20.0 * values[0];
    jacobian[(0, 1)] = 10.0;
    jacobian[(1, 0)] = -1.0;
    jacobian[(1, 1)] = 0.0;
}

fn unconstrained(_: &[f64]) -> bool {
    true
}

#[test]
fn rosenbrock() {
    let config = LevenbergMarquardtConfig {
        ftol: 1e-14,
        ..LevenbergMarquardtConfig::default()
    };
    let outcome = levenberg_marquardt(
        &config,
        &[-1.2, 1.0],
        2,
        unconstrained,
        rosenbrock_residuals,
        rosenbrock_jacobian,
    )
    .unwrap();
    assert_float_absolute_eq!(1.0, outcome.optimal_values[0], 1e-6);
    assert_float_absolute_eq!(1.0, outcome.optimal_values[1], 1e-6);
    assert!(outcome.optimal_residual < 1e-12);
    assert!(outcome.evaluations <= config.max_evaluations);
}

#[test]
fn exponential_decay() {
    let xs: Vec<_> = (0..20).map(|x| x as f64 * 0.5).collect();
    let ys: Vec<_> = xs.iter().map(|x| 3.0 * f64::exp(-0.7 * x)).collect();
    let outcome = levenberg_marquardt(
        &LevenbergMarquardtConfig::default(),
        &[1.0, 0.1],
        xs.len(),
        unconstrained,
        |values, residuals| {
            for (i, x) in xs.iter().enumerate() {
                residuals[i] = values[0] * f64::exp(-values[1] * x) - ys[i];
            }
        },
        |values, jacobian| {
            for (i, x) in xs.iter().enumerate() {
                let decay = f64::exp(-values[1] * x);
                jacobian[(i, 0)] = decay;
                jacobian[(i, 1)] = -values[0] * x * decay;
            }
        },
    )
    .unwrap();
    assert_float_relative_eq!(3.0, outcome.optimal_values[0], 1e-6);
    assert_float_relative_eq!(0.7, outcome.optimal_values[1], 1e-6);
}

#[test]
fn linear_residual() {
    let outcome = levenberg_marquardt(
        &LevenbergMarquardtConfig::default(),
        &[10.0],
        1,
        unconstrained,
        |values, residuals| residuals[0] = values[0] - 3.0,
        |_, jacobian| jacobian[(0, 0)] = 1.0,
    )
    .unwrap();
    assert_float_absolute_eq!(3.0, outcome.optimal_values[0], 1e-9);
}

#[test]
fn flat_start_terminates_on_gradient() {
    let outcome = levenberg_marquardt(
        &LevenbergMarquardtConfig::default(),
        &[5.0],
        2,
        unconstrained,
        |_, residuals| residuals.fill(1.0),
        |_, jacobian| {
            jacobian[(0, 0)] = 0.0;
            jacobian[(1, 0)] = 0.0;
        },
    )
    .unwrap();
    assert_eq!(Termination::Gradient, outcome.termination);
    assert_eq!(vec![5.0], outcome.optimal_values);
    assert_eq!(1, outcome.evaluations);
}

#[test]
fn constrained_optimum_stays_feasible() {
    // unconstrained minimum at -2 lies outside the feasible region
    let result = levenberg_marquardt(
        &LevenbergMarquardtConfig::default(),
        &[1.0],
        1,
        |values| values[0] > 0.0,
        |values, residuals| residuals[0] = values[0] + 2.0,
        |_, jacobian| jacobian[(0, 0)] = 1.0,
    );
    match result {
        Ok(outcome) => assert!(outcome.optimal_values[0] > 0.0),
        Err(err) => assert!(matches!(err, OptError::DidNotConverge { .. })),
    }
}

#[test]
fn evaluation_budget() {
    let config = LevenbergMarquardtConfig {
        max_evaluations: 2,
        ..LevenbergMarquardtConfig::default()
    };
    let err = levenberg_marquardt(
        &config,
        &[-1.2, 1.0],
        2,
        unconstrained,
        rosenbrock_residuals,
        rosenbrock_jacobian,
    )
    .unwrap_err();
    assert_eq!(OptError::DidNotConverge { evaluations: 2 }, err);
}

#[test]
fn infeasible_start() {
    let err = levenberg_marquardt(
        &LevenbergMarquardtConfig::default(),
        &[-1.0],
        1,
        |values| values[0] > 0.0,
        |values, residuals| residuals[0] = values[0],
        |_, jacobian| jacobian[(0, 0)] = 1.0,
    )
    .unwrap_err();
    assert_eq!(OptError::InfeasibleStart, err);
}

#[test]
fn non_finite_start() {
    let err = levenberg_marquardt(
        &LevenbergMarquardtConfig::default(),
        &[0.0],
        1,
        unconstrained,
        |values, residuals| residuals[0] = 1.0 / values[0],
        |_, jacobian| jacobian[(0, 0)] = 1.0,
    )
    .unwrap_err();
    assert_eq!(OptError::NonFiniteResidual, err);
}

#[test]
fn config_validate() {
    assert!(LevenbergMarquardtConfig::default().validate().is_ok());
    let invalid = [
        LevenbergMarquardtConfig {
            max_evaluations: 1,
            ..LevenbergMarquardtConfig::default()
        },
        LevenbergMarquardtConfig {
            ftol: -1.0,
            ..LevenbergMarquardtConfig::default()
        },
        LevenbergMarquardtConfig {
            gtol: f64::NAN,
            ..LevenbergMarquardtConfig::default()
        },
        LevenbergMarquardtConfig {
            init_damping: 0.0,
            ..LevenbergMarquardtConfig::default()
        },
    ];
    for config in invalid {
        assert!(config.validate().is_err(), "{config:?}");
    }
}
