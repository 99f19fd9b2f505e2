//! Input and numerical checks used by the registration loop.

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use dmoco_core::Volume;

use crate::error::{RegistrationError, Result};

/// Validate that two volumes have the same grid shape.
pub fn validate_volume_shapes<B: Backend>(fixed: &Volume<B>, moving: &Volume<B>) -> Result<()> {
    let fixed_shape = fixed.shape();
    let moving_shape = moving.shape();

    if fixed_shape != moving_shape {
        return Err(RegistrationError::ShapeMismatch {
            expected: fixed_shape.to_vec(),
            actual: moving_shape.to_vec(),
        });
    }

    Ok(())
}

/// Scalar value of a loss tensor, rejecting NaN and infinity.
pub fn finite_loss<B: Backend>(loss: &Tensor<B, 1>, iteration: usize) -> Result<f64> {
    let value = loss.clone().into_scalar().elem::<f64>();
    if !value.is_finite() {
        return Err(RegistrationError::numerical_instability(format!(
            "loss became {} at iteration {}",
            value, iteration
        )));
    }
    Ok(value)
}

pub fn validate_learning_rate(lr: f64) -> Result<()> {
    if lr <= 0.0 || !lr.is_finite() {
        return Err(RegistrationError::invalid_configuration(format!(
            "Learning rate must be positive, got {}",
            lr
        )));
    }

    if lr > 10.0 {
        return Err(RegistrationError::invalid_configuration(format!(
            "Learning rate too large: {}",
            lr
        )));
    }

    Ok(())
}

pub fn validate_iterations(iterations: usize) -> Result<()> {
    if iterations == 0 {
        return Err(RegistrationError::invalid_configuration(
            "Iterations must be positive",
        ));
    }

    if iterations > 1_000_000 {
        return Err(RegistrationError::invalid_configuration(format!(
            "Iterations too large: {}",
            iterations
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use dmoco_core::VoxelGeometry;

    type B = NdArray<f32>;

    #[test]
    fn test_validate_learning_rate() {
        assert!(validate_learning_rate(0.01).is_ok());
        assert!(validate_learning_rate(0.0).is_err());
        assert!(validate_learning_rate(-1.0).is_err());
        assert!(validate_learning_rate(f64::NAN).is_err());
        assert!(validate_learning_rate(100.0).is_err());
    }

    #[test]
    fn test_validate_iterations() {
        assert!(validate_iterations(100).is_ok());
        assert!(validate_iterations(0).is_err());
    }

    #[test]
    fn test_finite_loss() {
        let device = Default::default();
        let ok = Tensor::<B, 1>::from_floats([0.5], &device);
        assert_eq!(finite_loss(&ok, 0).unwrap(), 0.5);
        let nan = Tensor::<B, 1>::from_floats([f32::NAN], &device);
        assert!(matches!(
            finite_loss(&nan, 3),
            Err(RegistrationError::NumericalInstability(_))
        ));
    }

    #[test]
    fn test_validate_volume_shapes() {
        let device = Default::default();
        let a = Volume::new(Tensor::<B, 3>::zeros([2, 4, 4], &device), VoxelGeometry::identity());
        let b = Volume::new(Tensor::<B, 3>::zeros([2, 4, 5], &device), VoxelGeometry::identity());
        assert!(validate_volume_shapes(&a, &a).is_ok());
        assert!(matches!(
            validate_volume_shapes(&a, &b),
            Err(RegistrationError::ShapeMismatch { .. })
        ));
    }
}
