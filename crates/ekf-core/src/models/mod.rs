//! Planar models
//!
//! Ready-made motion and measurement models for a point moving in the plane
//! with state `[x, y, vx, vy]`:
//! - Constant-velocity motion
//! - Position sensor (linear)
//! - Range/bearing sensor (nonlinear)

pub mod motion;
pub mod measurement;

pub use motion::*;
pub use measurement::*;

use crate::estimation::SystemModel;

/// Bundle a motion model and a sensor into an EKF [`SystemModel`]
pub fn planar_model<S>(motion: ConstantVelocity, sensor: S) -> SystemModel
where
    S: MeasurementModel + Clone + Send + Sync + 'static,
{
    let (f_sensor, j_sensor, r_sensor) = (sensor.clone(), sensor.clone(), sensor);
    SystemModel::new(
        move |x| motion.transition(x),
        move |x| motion.jacobian(x),
        move |x| f_sensor.measure(x),
        move |x| j_sensor.jacobian(x),
    )
    .with_residual(move |y, z| r_sensor.residual(y, z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vector;
    use approx::assert_relative_eq;
    use nalgebra::dvector;

    #[test]
    fn test_planar_model_forwards_callbacks() {
        let model = planar_model(ConstantVelocity::new(0.5), PositionSensor);
        let x = dvector![1.0, 2.0, 2.0, -2.0];

        assert_relative_eq!(model.transition(&x), dvector![2.0, 1.0, 2.0, -2.0]);
        assert_relative_eq!(model.measure(&x), dvector![1.0, 2.0]);
        assert_eq!(model.transition_jacobian(&x).shape(), (4, 4));
        assert_eq!(model.measurement_jacobian(&x).shape(), (2, 4));
    }

    #[test]
    fn test_planar_model_uses_sensor_residual() {
        let model = planar_model(ConstantVelocity::new(1.0), RangeBearingSensor::default());
        let y: Vector = dvector![1.0, 3.1];
        let z: Vector = dvector![1.0, -3.1];

        let v = model.residual(&y, &z);
        assert_relative_eq!(v[1], 6.2 - 2.0 * std::f64::consts::PI, epsilon = 1e-12);
    }
}
