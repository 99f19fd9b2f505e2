//! Gradient-descent registration loop.

use std::marker::PhantomData;

use burn::module::AutodiffModule;
use burn::optim::GradientsParams;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;
use dmoco_core::transform::{AffineTransform, RigidTransform, Transform, TranslationTransform};
use dmoco_core::Volume;

use crate::error::Result;
use crate::metric::Metric;
use crate::optimizer::Optimizer;
use crate::regularization::Regularizer;
use crate::validation::{finite_loss, validate_iterations, validate_learning_rate, validate_volume_shapes};

/// A transform whose parameters the loop optimises.
pub trait Trainable<B: Backend>: Transform<B> {
    /// Dense displacement to regularise, if the transform has one.
    fn displacement(&self) -> Option<Tensor<B, 4>> {
        None
    }
}

impl<B: Backend> Trainable<B> for TranslationTransform<B> {}
impl<B: Backend> Trainable<B> for RigidTransform<B> {}
impl<B: Backend> Trainable<B> for AffineTransform<B> {}

/// Result of one registration run.
#[derive(Debug)]
pub struct RegistrationOutcome<T> {
    pub transform: T,
    pub iterations: usize,
    pub final_loss: f64,
}

pub struct Registration<B, O, M, T>
where
    B: AutodiffBackend,
    O: Optimizer<T, B>,
    M: Metric<B>,
    T: Trainable<B> + AutodiffModule<B>,
{
    optimizer: O,
    metric: M,
    regularizer: Option<Box<dyn Regularizer<B>>>,
    tolerance: f64,
    _phantom: PhantomData<(B, T)>,
}

impl<B, O, M, T> Registration<B, O, M, T>
where
    B: AutodiffBackend,
    O: Optimizer<T, B>,
    M: Metric<B>,
    T: Trainable<B> + AutodiffModule<B>,
{
    pub fn new(optimizer: O, metric: M) -> Self {
        Self {
            optimizer,
            metric,
            regularizer: None,
            tolerance: 0.0,
            _phantom: PhantomData,
        }
    }

    /// Penalty added to the metric for transforms exposing a displacement.
    pub fn with_regularizer(mut self, regularizer: impl Regularizer<B> + 'static) -> Self {
        self.regularizer = Some(Box::new(regularizer));
        self
    }

    /// Stop once the relative loss change between two iterations is at most
    /// `tolerance`.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn execute(
        &mut self,
        fixed: &Volume<B>,
        moving: &Volume<B>,
        mut transform: T,
        iterations: usize,
        learning_rate: f64,
    ) -> Result<RegistrationOutcome<T>> {
        validate_iterations(iterations)?;
        validate_learning_rate(learning_rate)?;
        validate_volume_shapes(fixed, moving)?;
        self.optimizer.set_learning_rate(learning_rate);

        let mut previous: Option<f64> = None;
        let mut final_loss = f64::NAN;
        let mut completed = 0;

        for i in 0..iterations {
            let mut loss = self.metric.forward(fixed, moving, &transform)?;
            if let (Some(regularizer), Some(displacement)) =
                (self.regularizer.as_ref(), transform.displacement())
            {
                loss = loss + regularizer.compute_loss(displacement);
            }

            let value = finite_loss(&loss, i)?;
            if i % 50 == 0 {
                tracing::debug!("Iteration {}: Loss {:.6}", i, value);
            }

            let grads = loss.backward();
            let grads_params = GradientsParams::from_grads(grads, &transform);
            transform = self.optimizer.step(transform, grads_params);

            completed = i + 1;
            final_loss = value;
            if let Some(prev) = previous {
                if (prev - value).abs() <= self.tolerance * prev.abs().max(f64::EPSILON) {
                    break;
                }
            }
            previous = Some(value);
        }

        tracing::debug!(
            "{} finished after {} iterations, loss {:.6}",
            self.metric.name(),
            completed,
            final_loss
        );

        Ok(RegistrationOutcome {
            transform,
            iterations: completed,
            final_loss,
        })
    }
}
