//! Filter Property Tests
//!
//! End-to-end checks of the estimator against the behaviour expected of a
//! Kalman filter:
//! 1. Linear models reproduce the linear Kalman filter
//! 2. P stays symmetric and never shrinks without measurements
//! 3. The constant-velocity scenario converges
//! 4. Degenerate inputs are rejected without corrupting the state

use approx::assert_relative_eq;
use nalgebra::{dvector, DMatrix, DVector};
use proptest::prelude::*;

use ekf_core::estimation::{
    CovarianceUpdate, EkfOptions, EkfState, ExtendedKalmanFilter, FilterDimensions, FilterError,
    LinearKalmanFilter, SystemModel,
};
use ekf_core::math::symmetry_error;
use ekf_core::models::{
    planar_model, ConstantVelocity, MeasurementModel, PositionSensor, RangeBearingSensor,
};
use ekf_core::simulation::{SimConfig, Simulator};

fn position_ekf(p0: DMatrix<f64>, q: DMatrix<f64>, r: DMatrix<f64>) -> ExtendedKalmanFilter {
    ExtendedKalmanFilter::new(
        DVector::zeros(4),
        p0,
        q,
        r,
        planar_model(ConstantVelocity::new(1.0), PositionSensor),
    )
    .unwrap()
}

/// Deterministic, slightly wiggly measurements along the line y = x
fn wiggly_measurements(n: usize) -> Vec<DVector<f64>> {
    (1..=n)
        .map(|k| {
            let t = k as f64;
            dvector![t + 0.3 * (1.7 * t).sin(), t + 0.3 * (2.3 * t).cos()]
        })
        .collect()
}

mod linear_case {
    use super::*;

    #[test]
    fn test_linear_models_match_linear_kalman_filter() {
        let cv = ConstantVelocity::new(1.0);
        let a = cv.transition_matrix();
        let c = DMatrix::identity(2, 4);
        let q = cv.process_noise(0.05);
        let r = DMatrix::from_row_slice(2, 2, &[0.4, 0.1, 0.1, 0.3]);
        let x0 = dvector![0.5, -0.5, 0.0, 0.2];
        let p0 = DMatrix::from_diagonal(&dvector![4.0, 4.0, 2.0, 2.0]);

        let mut kf = LinearKalmanFilter::new(
            EkfState::with_initial(x0.clone(), p0.clone()).unwrap(),
            a,
            c,
            q.clone(),
            r.clone(),
        )
        .unwrap();
        let mut ekf = ExtendedKalmanFilter::new(x0, p0, q, r, kf.system_model()).unwrap();

        for z in wiggly_measurements(30) {
            kf.predict().unwrap();
            ekf.predict().unwrap();
            assert_relative_eq!(ekf.state_estimate(), kf.state_estimate(), epsilon = 1e-9);
            assert_relative_eq!(ekf.covariance(), kf.covariance(), epsilon = 1e-9);

            kf.update(&z).unwrap();
            ekf.update(&z).unwrap();
            assert_relative_eq!(ekf.state_estimate(), kf.state_estimate(), epsilon = 1e-9);
            assert_relative_eq!(ekf.covariance(), kf.covariance(), epsilon = 1e-9);
        }
    }
}

mod covariance {
    use super::*;

    #[test]
    fn test_symmetry_over_nonlinear_run() {
        let cv = ConstantVelocity::new(0.5);
        let sensor = RangeBearingSensor::new([-15.0, 3.0]);
        let mut ekf = ExtendedKalmanFilter::new(
            dvector![0.0, 0.0, 0.5, 0.5],
            DMatrix::identity(4, 4) * 5.0,
            cv.process_noise(0.01),
            DMatrix::from_diagonal(&dvector![0.04, 1e-4]),
            planar_model(cv, sensor),
        )
        .unwrap();

        for k in 1..=200 {
            ekf.predict().unwrap();
            assert!(symmetry_error(ekf.covariance()) < 1e-8);

            let t = k as f64 * 0.5;
            let z = sensor.measure(&dvector![t, t, 1.0, 1.0]);
            ekf.update(&z).unwrap();
            assert!(symmetry_error(ekf.covariance()) < 1e-8);
        }
    }

    #[test]
    fn test_predict_only_never_shrinks_diagonal() {
        let cv = ConstantVelocity::new(1.0);
        let mut ekf = position_ekf(
            DMatrix::from_diagonal(&dvector![1.0, 2.0, 0.5, 0.1]),
            cv.process_noise(0.01),
            DMatrix::identity(2, 2),
        );

        let mut previous = ekf.covariance().diagonal();
        for _ in 0..25 {
            let current = ekf.predict().unwrap().p.diagonal();
            for i in 0..4 {
                assert!(current[i] >= previous[i]);
            }
            previous = current;
        }
    }

    #[test]
    fn test_repeated_predict_accumulates_noise() {
        let q = DMatrix::identity(4, 4) * 0.1;
        let mut once = position_ekf(DMatrix::identity(4, 4), q.clone(), DMatrix::identity(2, 2));
        let mut twice = position_ekf(DMatrix::identity(4, 4), q, DMatrix::identity(2, 2));

        once.predict().unwrap();
        twice.predict().unwrap();
        twice.predict().unwrap();

        assert_ne!(once.covariance(), twice.covariance());
        for i in 0..4 {
            assert!(twice.covariance()[(i, i)] > once.covariance()[(i, i)]);
        }
    }

    #[test]
    fn test_joseph_form_stays_symmetric() {
        let cv = ConstantVelocity::new(1.0);
        let options = EkfOptions {
            covariance_update: CovarianceUpdate::Joseph,
            ..EkfOptions::default()
        };
        let mut ekf = position_ekf(
            DMatrix::identity(4, 4) * 100.0,
            cv.process_noise(1e-3),
            DMatrix::identity(2, 2) * 1e-4,
        )
        .with_options(options)
        .unwrap();

        for z in wiggly_measurements(100) {
            ekf.predict().unwrap();
            ekf.update(&z).unwrap();
            assert!(symmetry_error(ekf.covariance()) < 1e-10);
            // Positive semi-definite: no meaningfully negative eigenvalue
            let eig = ekf.covariance().clone().symmetric_eigen().eigenvalues;
            assert!(eig.min() > -1e-10);
        }
    }

    #[test]
    fn test_symmetry_for_arbitrary_measurements() {
        proptest!(|(zs in prop::collection::vec((-100.0..100.0f64, -100.0..100.0f64), 1..40))| {
            let cv = ConstantVelocity::new(1.0);
            let mut ekf = position_ekf(
                DMatrix::identity(4, 4) * 10.0,
                cv.process_noise(0.1),
                DMatrix::identity(2, 2) * 0.5,
            );
            for (zx, zy) in zs {
                ekf.predict().unwrap();
                ekf.update(&dvector![zx, zy]).unwrap();
                prop_assert!(symmetry_error(ekf.covariance()) < 1e-8);
            }
        });
    }
}

mod convergence {
    use super::*;

    #[test]
    fn test_constant_velocity_scenario_converges() {
        // Starts at rest at the origin; the object moves with velocity [1, 1]
        let config = SimConfig::default();
        let initial_diag = config.filter.initial_covariance_diag;
        assert_eq!(config.steps, 50);
        assert_eq!(config.filter.initial_state, [0.0; 4]);

        let history = Simulator::new(config).unwrap().run().unwrap();
        assert_eq!(history.len(), 50);
        assert_eq!(history.skipped_updates(), 0);

        let last = history.final_estimate().unwrap();
        assert_relative_eq!(last.x[2], 1.0, epsilon = 0.1);
        assert_relative_eq!(last.x[3], 1.0, epsilon = 0.1);

        for (i, &p0) in initial_diag.iter().enumerate() {
            assert!(last.p[(i, i)] < p0);
        }
    }

    #[test]
    fn test_independent_filters_on_threads() {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                std::thread::spawn(move || {
                    let mut config = SimConfig::default();
                    config.seed = 100 + i as u64;
                    config.truth.velocity = [i as f64, -(i as f64)];
                    let history = Simulator::new(config).unwrap().run().unwrap();
                    (i, history.final_estimate().unwrap().x.clone())
                })
            })
            .collect();

        for handle in handles {
            let (i, x) = handle.join().unwrap();
            assert_relative_eq!(x[2], i as f64, epsilon = 0.1);
            assert_relative_eq!(x[3], -(i as f64), epsilon = 0.1);
        }
    }
}

mod rejection {
    use super::*;

    #[test]
    fn test_singular_innovation_covariance_leaves_state_unchanged() {
        // No uncertainty in the observed position and a noiseless sensor
        let p0 = DMatrix::from_diagonal(&dvector![0.0, 0.0, 1.0, 1.0]);
        let mut ekf = position_ekf(p0, DMatrix::zeros(4, 4), DMatrix::zeros(2, 2));
        let before = ekf.state().clone();

        let err = ekf.update(&dvector![1.0, 2.0]).unwrap_err();

        assert!(matches!(err, FilterError::SingularInnovationCovariance { .. }));
        assert_eq!(ekf.state(), &before);
        assert!(ekf.last_innovation().is_none());
    }

    #[test]
    fn test_three_element_state_is_rejected() {
        let err = ExtendedKalmanFilter::new(
            DVector::zeros(3),
            DMatrix::identity(4, 4),
            DMatrix::identity(4, 4),
            DMatrix::identity(2, 2),
            planar_model(ConstantVelocity::new(1.0), PositionSensor),
        )
        .unwrap_err();

        assert_eq!(
            err,
            FilterError::DimensionMismatch {
                what: "initial state",
                expected: (4, 1),
                actual: (3, 1),
            }
        );
    }

    #[test]
    fn test_wrong_measurement_noise_shape_is_rejected() {
        let err = ExtendedKalmanFilter::new(
            DVector::zeros(4),
            DMatrix::identity(4, 4),
            DMatrix::identity(4, 4),
            DMatrix::identity(3, 3),
            planar_model(ConstantVelocity::new(1.0), PositionSensor),
        )
        .unwrap_err();

        assert!(matches!(err, FilterError::DimensionMismatch { what: "measurement noise", .. }));
    }

    #[test]
    fn test_planar_model_on_undersized_filter_is_rejected() {
        for model in [
            planar_model(ConstantVelocity::new(1.0), PositionSensor),
            planar_model(ConstantVelocity::new(1.0), RangeBearingSensor::new([3.0, 4.0])),
        ] {
            let mut ekf = ExtendedKalmanFilter::with_dimensions(
                FilterDimensions::new(1, 2),
                DVector::zeros(1),
                DMatrix::identity(1, 1),
                DMatrix::identity(1, 1),
                DMatrix::identity(2, 2),
                model,
            )
            .unwrap();
            let before = ekf.state().clone();

            let err = ekf.update(&dvector![1.0, 1.0]).unwrap_err();
            assert_eq!(
                err,
                FilterError::DimensionMismatch {
                    what: "measurement Jacobian",
                    expected: (2, 1),
                    actual: (2, 4),
                }
            );

            let err = ekf.predict().unwrap_err();
            assert!(matches!(err, FilterError::DimensionMismatch { what: "transition Jacobian", .. }));
            assert_eq!(ekf.state(), &before);
        }
    }

    #[test]
    fn test_nan_measurement_leaves_state_unchanged() {
        let mut ekf = position_ekf(
            DMatrix::identity(4, 4),
            DMatrix::identity(4, 4) * 0.01,
            DMatrix::identity(2, 2) * 0.1,
        );
        let before = ekf.state().clone();

        let err = ekf.update(&dvector![f64::NAN, 1.0]).unwrap_err();

        assert_eq!(err, FilterError::NonFiniteResult { stage: "innovation" });
        assert_eq!(ekf.state(), &before);
        assert!(ekf.last_innovation().is_none());
    }

    #[test]
    fn test_overflowing_measurement_function_is_rejected() {
        let cv = ConstantVelocity::new(1.0);
        let model = SystemModel::new(
            move |x: &DVector<f64>| cv.transition(x),
            move |x: &DVector<f64>| cv.jacobian(x),
            |x: &DVector<f64>| x.rows(0, 2).map(|v| v * f64::MAX * 10.0),
            |_x: &DVector<f64>| DMatrix::identity(2, 4),
        );
        let mut ekf = ExtendedKalmanFilter::new(
            dvector![1.0, 1.0, 0.0, 0.0],
            DMatrix::identity(4, 4),
            DMatrix::identity(4, 4) * 0.01,
            DMatrix::identity(2, 2) * 0.1,
            model,
        )
        .unwrap();
        let before = ekf.state().clone();

        let err = ekf.update(&dvector![1.0, 1.0]).unwrap_err();

        assert_eq!(err, FilterError::NonFiniteResult { stage: "innovation" });
        assert_eq!(ekf.state(), &before);
        assert!(ekf.last_innovation().is_none());
    }

    #[test]
    fn test_non_finite_covariance_product_is_rejected() {
        // Finite inputs whose product H P Hᵀ overflows
        let model = SystemModel::new(
            |x: &DVector<f64>| x.clone(),
            |_x: &DVector<f64>| DMatrix::identity(4, 4),
            |x: &DVector<f64>| x.rows(0, 2).into_owned(),
            |_x: &DVector<f64>| DMatrix::identity(2, 4) * 1e10,
        );
        let mut ekf = ExtendedKalmanFilter::new(
            DVector::zeros(4),
            DMatrix::identity(4, 4) * 1e300,
            DMatrix::zeros(4, 4),
            DMatrix::identity(2, 2),
            model,
        )
        .unwrap();
        let before = ekf.state().clone();

        let err = ekf.update(&dvector![1.0, 1.0]).unwrap_err();

        assert_eq!(err, FilterError::NonFiniteResult { stage: "innovation covariance" });
        assert_eq!(ekf.state(), &before);
        assert!(ekf.last_innovation().is_none());
    }

    #[test]
    fn test_update_after_failed_update_still_works() {
        let mut ekf = position_ekf(
            DMatrix::identity(4, 4),
            DMatrix::identity(4, 4) * 0.01,
            DMatrix::identity(2, 2) * 0.1,
        );

        assert!(ekf.update(&dvector![1.0, 2.0, 3.0]).is_err());
        let state = ekf.update(&dvector![1.0, 2.0]).unwrap();
        assert!(state.x[0] > 0.0 && state.x[1] > 0.0);
    }
}
