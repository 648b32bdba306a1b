use assert_float_eq::*;
use strum::IntoEnumIterator;

use crate::testing::assert_slice_f64_relative;

use super::*;

fn logistic_closed_form(x: f64, l: f64, x0: f64, k: f64) -> f64 {
    let exponent = f64::exp(-k * (x - x0));
    l * k * exponent / (1.0 + exponent).powi(2)
}

#[test]
fn gaussian_shape() {
    assert_float_relative_eq!(1000.0, gaussian(40.0, 1000.0, 40.0, 10.0), 1e-15);
    assert_float_relative_eq!(1000.0 * f64::exp(-0.5), gaussian(50.0, 1000.0, 40.0, 10.0), 1e-15);
    assert_eq!(gaussian(30.0, 1000.0, 40.0, 10.0), gaussian(50.0, 1000.0, 40.0, 10.0));
}

#[test]
fn logistic_matches_closed_form() {
    for x in [0.0, 10.0, 49.0, 50.0, 51.0, 75.0, 100.0] {
        assert_float_relative_eq!(
            logistic_closed_form(x, 20_000.0, 50.0, 0.2),
            logistic_derivative(x, 20_000.0, 50.0, 0.2),
            1e-12
        );
    }
}

#[test]
fn logistic_stays_finite_far_from_peak() {
    // the closed form overflows to NaN here
    assert!(logistic_closed_form(-5_000.0, 1.0, 50.0, 0.2).is_nan());
    assert_eq!(0.0, logistic_derivative(-5_000.0, 1.0, 50.0, 0.2));
    assert_eq!(0.0, logistic_derivative(5_000.0, 1.0, 50.0, 0.2));
}

#[test]
fn peak_value_is_value_at_peak_day() {
    let cases = [
        (ModelKind::Gaussian, [1000.0, 40.0, 10.0]),
        (ModelKind::Logistic, [20_000.0, 50.0, 0.2]),
    ];
    for (kind, params) in cases {
        let peak_day = kind.peak_day(&params);
        assert_float_relative_eq!(kind.peak_value(&params), kind.evaluate(peak_day, &params), 1e-12);
        assert!(kind.evaluate(peak_day - 1.0, &params) < kind.peak_value(&params));
        assert!(kind.evaluate(peak_day + 1.0, &params) < kind.peak_value(&params));
    }
    assert_eq!(1000.0, ModelKind::Logistic.peak_value(&[20_000.0, 50.0, 0.2]));
}

#[test]
fn gradient_matches_finite_differences() {
    let cases = [
        (ModelKind::Gaussian, [1000.0, 40.0, 10.0]),
        (ModelKind::Logistic, [20_000.0, 50.0, 0.2]),
    ];
    for kind in ModelKind::iter() {
        let params = cases.iter().find(|(k, _)| *k == kind).unwrap().1;
        for x in [5.0, 33.0, 47.5, 61.0] {
            let analytic = kind.gradient(x, &params);
            let numeric: Vec<_> = (0..NUM_PARAMS)
                .map(|param| {
                    let h = params[param] * 1e-6;
                    let mut up = params;
                    up[param] += h;
                    let mut down = params;
                    down[param] -= h;
                    (kind.evaluate(x, &up) - kind.evaluate(x, &down)) / (2.0 * h)
                })
                .collect();
            assert_slice_f64_relative(&numeric, &analytic, 1e-5);
        }
    }
}

#[test]
fn default_ranges() {
    assert_eq!(0.0..=70.0, ModelKind::Gaussian.default_range(&[1000.0, 40.0, 10.0]));
    assert_eq!(0.0..=100.0, ModelKind::Logistic.default_range(&[20_000.0, 50.0, 0.2]));
}

#[test]
fn parameter_names() {
    assert_eq!("Std-dev [days]", ModelKind::Gaussian.parameter_names()[2]);
    assert_eq!("Growth rate []", ModelKind::Logistic.parameter_names()[2]);
    assert_eq!("Logistic", ModelKind::Logistic.to_string());
}

#[test]
fn offset_timestamps() {
    let anchor = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    assert_eq!(
        NaiveDate::from_ymd_opt(2020, 1, 2).unwrap().and_hms_opt(12, 0, 0),
        offset_timestamp(anchor, 1.5)
    );
    // fractions of a second are truncated
    assert_eq!(
        anchor.and_hms_opt(0, 0, 1),
        offset_timestamp(anchor, 1.9 / SECONDS_PER_DAY)
    );
    assert_eq!(None, offset_timestamp(anchor, f64::INFINITY));
    assert_eq!(None, offset_timestamp(anchor, 1e300));
}

#[test]
fn fitted_model_accessors() {
    let stats = FitStats {
        evaluations: 10,
        iterations: 8,
        ssr: 1.0,
        termination: Termination::Step,
    };
    let covariance = [[4.0, 0.0, 0.0], [0.0, 9.0, 0.0], [0.0, 0.0, 16.0]];
    let model = FittedModel::new(ModelKind::Gaussian, [1000.0, 40.5, 10.0], covariance, stats);
    assert_eq!([2.0, 3.0, 4.0], model.std_errors());
    assert_eq!(40.5, model.peak_day());
    assert_eq!(1000.0, model.peak_value());
    let anchor = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    assert_eq!(
        NaiveDate::from_ymd_opt(2020, 2, 10).unwrap().and_hms_opt(12, 0, 0),
        model.peak_date(anchor)
    );
}
