//! ProjectionTrainer: learns the projection W and bias C.
//!
//! Two losses are minimized, one gradient step each per mini-batch:
//!
//! - decorrelation: `||WᵀW - I||²`, pushing the rows of W toward
//!   orthogonality so that output bits carry non-redundant information;
//! - reconstruction: `||clamp(Wᵀ·bin(W·x) + C) - x||²`, where `bin` is the
//!   hard threshold used at inference time. Its gradient is taken through
//!   `bin` with the straight-through estimator (the threshold is treated as
//!   the identity in the backward pass).

use ndarray::{Array, Array1, Array2, ArrayView2, Axis, Dimension, ShapeBuilder, Zip};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::bits::BitPacker;
use crate::errors::{NlbError, Result};

/// Learned parameters: projection `w` (n_bits × n_dims) and bias `c` (n_dims).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionModel {
    /// One row per output bit.
    pub w: Array2<f32>,
    /// Reconstruction bias. Only used during training.
    pub c: Array1<f32>,
}

impl ProjectionModel {
    /// Code length produced by this projection.
    pub fn n_bits(&self) -> usize {
        self.w.nrows()
    }

    /// Dimension of the real vectors this projection accepts.
    pub fn n_dims(&self) -> usize {
        self.w.ncols()
    }

    fn validate(&self) -> Result<()> {
        BitPacker::new(self.n_bits())?;
        if self.n_dims() == 0 {
            return Err(NlbError::Config("projection has zero input dimensions".into()));
        }
        if self.c.len() != self.n_dims() {
            return Err(NlbError::Config(format!(
                "bias has {} entries, projection expects {}",
                self.c.len(),
                self.n_dims()
            )));
        }
        Ok(())
    }
}

/// Current learning rates of the two losses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningRates {
    /// Reconstruction loss.
    pub rec: f32,
    /// Decorrelation loss.
    pub reg: f32,
}

impl LearningRates {
    /// Multiply both rates by `factor`.
    pub fn decay(&mut self, factor: f32) {
        self.rec *= factor;
        self.reg *= factor;
    }
}

/// Update `w` with one gradient step of the decorrelation loss:
/// `W ← W - 2·lr_reg·W·(WᵀW - I)`.
pub fn apply_decorrelation_gradient(w: &mut Array2<f32>, lr_reg: f32) {
    if lr_reg == 0.0 {
        return;
    }
    let mut t = w.t().dot(&*w);
    t.diag_mut().mapv_inplace(|v| v - 1.0);
    let grad = w.dot(&t);
    w.scaled_add(-2.0 * lr_reg, &grad);
}

/// Update `w` and `c` with one gradient step of the reconstruction loss on
/// `batch` (batch_size × n_dims).
pub fn apply_reconstruction_gradient(
    w: &mut Array2<f32>,
    c: &mut Array1<f32>,
    batch: ArrayView2<'_, f32>,
    lr_rec: f32,
) {
    let (latent, mut delta) = forward(w, c, batch);

    // dL/dx_hat, written over x_hat (n_dims × batch_size).
    Zip::from(&mut delta).and(batch.t()).for_each(|d, &x| {
        let v = *d;
        *d = (v - x) * (1.0 - v * v);
    });

    // Straight-through: the binary latent code stands in for its own gradient.
    let d_w = latent.dot(&delta.t());
    let d_c = delta.sum_axis(Axis(1));

    w.scaled_add(-lr_rec, &d_w);
    c.scaled_add(-lr_rec, &d_c);
}

/// Forward pass of the reconstruction loss.
///
/// Returns the binary latent code (n_bits × batch_size, values 0/1) and the
/// clamped reconstruction (n_dims × batch_size).
fn forward(
    w: &Array2<f32>,
    c: &Array1<f32>,
    batch: ArrayView2<'_, f32>,
) -> (Array2<f32>, Array2<f32>) {
    let latent = w
        .dot(&batch.t())
        .mapv_into(|v| if v > 0.0 { 1.0 } else { 0.0 });

    let mut x_hat = w.t().dot(&latent);
    x_hat += &c.view().insert_axis(Axis(1));
    x_hat.mapv_inplace(|v| v.clamp(-1.0, 1.0));

    (latent, x_hat)
}

/// Uniform values in [-0.5, 0.5], scaled so the whole array has unit L2 norm.
fn random_normalized<Sh, D>(shape: Sh, rng: &mut ChaCha8Rng) -> Array<f32, D>
where
    Sh: ShapeBuilder<Dim = D>,
    D: Dimension,
{
    let mut a = Array::random_using(shape, Uniform::new_inclusive(-0.5f32, 0.5f32), rng);
    let norm = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        a.mapv_inplace(|v| v / norm);
    }
    a
}

/// Owns (W, C) and the learning rates for the duration of training.
#[derive(Debug, Clone)]
pub struct ProjectionTrainer {
    model: ProjectionModel,
    rates: LearningRates,
    epochs_done: usize,
}

impl ProjectionTrainer {
    /// Randomly initialize W and C from `seed`.
    pub fn new(n_bits: usize, n_dims: usize, rates: LearningRates, seed: u64) -> Result<Self> {
        BitPacker::new(n_bits)?;
        if n_dims == 0 {
            return Err(NlbError::Config("embedding has zero dimensions".into()));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let w = random_normalized((n_bits, n_dims), &mut rng);
        let c = random_normalized(n_dims, &mut rng);

        Ok(Self {
            model: ProjectionModel { w, c },
            rates,
            epochs_done: 0,
        })
    }

    /// Start from explicit parameters, e.g. a previously saved model.
    pub fn from_parts(model: ProjectionModel, rates: LearningRates) -> Result<Self> {
        model.validate()?;
        Ok(Self {
            model,
            rates,
            epochs_done: 0,
        })
    }

    /// Current parameters.
    pub fn model(&self) -> &ProjectionModel {
        &self.model
    }

    /// Current learning rates.
    pub fn rates(&self) -> LearningRates {
        self.rates
    }

    /// Number of completed epochs.
    pub fn epochs_done(&self) -> usize {
        self.epochs_done
    }

    /// One decorrelation step followed by one reconstruction step.
    pub fn step(&mut self, batch: ArrayView2<'_, f32>) {
        apply_decorrelation_gradient(&mut self.model.w, self.rates.reg);
        apply_reconstruction_gradient(&mut self.model.w, &mut self.model.c, batch, self.rates.rec);
    }

    /// Run one epoch over `embedding` in contiguous batches of `batch_size`
    /// rows (the last batch may be shorter), then decay the learning rates.
    ///
    /// Returns the number of batches processed.
    pub fn train_epoch(
        &mut self,
        embedding: ArrayView2<'_, f32>,
        batch_size: usize,
        decay: f32,
    ) -> Result<usize> {
        if batch_size == 0 {
            return Err(NlbError::Config("batch_size must be at least 1".into()));
        }
        if embedding.ncols() != self.model.n_dims() {
            return Err(NlbError::Config(format!(
                "embedding has {} dimensions, projection expects {}",
                embedding.ncols(),
                self.model.n_dims()
            )));
        }

        let mut batches = 0;
        for batch in embedding.axis_chunks_iter(Axis(0), batch_size) {
            self.step(batch);
            batches += 1;
            tracing::debug!(batch = batches, rows = batch.nrows(), "batch done");
        }

        self.rates.decay(decay);
        self.epochs_done += 1;
        Ok(batches)
    }

    /// Mean squared error between `batch` and its reconstruction through the
    /// current binary codes.
    pub fn reconstruction_error(&self, batch: ArrayView2<'_, f32>) -> f32 {
        let (_, x_hat) = forward(&self.model.w, &self.model.c, batch);
        if x_hat.is_empty() {
            return 0.0;
        }
        let sq = Zip::from(&x_hat)
            .and(batch.t())
            .fold(0.0f32, |acc, &v, &x| acc + (v - x) * (v - x));
        sq / x_hat.len() as f32
    }

    /// Finish training and hand over the parameters.
    pub fn into_model(self) -> ProjectionModel {
        self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn rates(rec: f32, reg: f32) -> LearningRates {
        LearningRates { rec, reg }
    }

    fn orthogonality_gap(w: &Array2<f32>) -> f32 {
        let mut t = w.t().dot(w);
        t.diag_mut().mapv_inplace(|v| v - 1.0);
        t.iter().map(|v| v * v).sum()
    }

    #[test]
    fn test_zero_lr_reg_keeps_w() {
        let trainer = ProjectionTrainer::new(64, 8, rates(0.001, 0.0), 3).unwrap();
        let mut w = trainer.model().w.clone();
        let before = w.clone();
        apply_decorrelation_gradient(&mut w, 0.0);
        assert_eq!(w, before);
    }

    #[test]
    fn test_decorrelation_reduces_gap() {
        let mut w = array![[1.0f32, 0.5], [0.0, 1.0]];
        let before = orthogonality_gap(&w);
        apply_decorrelation_gradient(&mut w, 0.01);
        assert!(orthogonality_gap(&w) < before);
    }

    #[test]
    fn test_reconstruction_straight_through_active_bit() {
        let mut w = array![[1.0f32, 0.0]];
        let mut c = array![0.0f32, 0.0];
        let batch = array![[0.5f32, -0.5]];

        // latent = 1, x_hat = [1, 0], dL/dx_hat = [0, 0.5]
        apply_reconstruction_gradient(&mut w, &mut c, batch.view(), 0.1);

        assert_abs_diff_eq!(w[[0, 0]], 1.0, epsilon = 1e-7);
        assert_abs_diff_eq!(w[[0, 1]], -0.05, epsilon = 1e-7);
        assert_abs_diff_eq!(c[0], 0.0, epsilon = 1e-7);
        assert_abs_diff_eq!(c[1], -0.05, epsilon = 1e-7);
    }

    #[test]
    fn test_reconstruction_inactive_bit_only_moves_bias() {
        let mut w = array![[-1.0f32, 0.0]];
        let mut c = array![0.0f32, 0.0];
        let batch = array![[0.5f32, -0.5]];

        apply_reconstruction_gradient(&mut w, &mut c, batch.view(), 0.1);

        assert_eq!(w, array![[-1.0f32, 0.0]]);
        assert_abs_diff_eq!(c[0], 0.05, epsilon = 1e-7);
        assert_abs_diff_eq!(c[1], -0.05, epsilon = 1e-7);
    }

    #[test]
    fn test_init_is_normalized_and_seeded() {
        let a = ProjectionTrainer::new(128, 10, rates(0.001, 0.001), 11).unwrap();
        let b = ProjectionTrainer::new(128, 10, rates(0.001, 0.001), 11).unwrap();
        let other = ProjectionTrainer::new(128, 10, rates(0.001, 0.001), 12).unwrap();

        assert_eq!(a.model(), b.model());
        assert_ne!(a.model().w, other.model().w);

        let w_norm = a.model().w.iter().map(|v| v * v).sum::<f32>().sqrt();
        let c_norm = a.model().c.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert_abs_diff_eq!(w_norm, 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(c_norm, 1.0, epsilon = 1e-4);
        assert_eq!(a.model().w.dim(), (128, 10));
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(ProjectionTrainer::new(100, 10, rates(0.1, 0.1), 0).is_err());
        assert!(ProjectionTrainer::new(64, 0, rates(0.1, 0.1), 0).is_err());

        let model = ProjectionModel {
            w: Array2::zeros((64, 4)),
            c: Array1::zeros(3),
        };
        assert!(ProjectionTrainer::from_parts(model, rates(0.1, 0.1)).is_err());
    }

    #[test]
    fn test_epoch_decays_rates_once() {
        let mut trainer = ProjectionTrainer::new(64, 4, rates(0.01, 0.02), 5).unwrap();
        let embedding = Array2::from_shape_fn((10, 4), |(i, j)| ((i + j) % 3) as f32 - 1.0);

        let batches = trainer.train_epoch(embedding.view(), 4, 0.95).unwrap();
        assert_eq!(batches, 3); // 4 + 4 + 2

        let r = trainer.rates();
        assert_abs_diff_eq!(r.rec, 0.01 * 0.95, epsilon = 1e-9);
        assert_abs_diff_eq!(r.reg, 0.02 * 0.95, epsilon = 1e-9);
        assert_eq!(trainer.epochs_done(), 1);
    }

    #[test]
    fn test_epoch_rejects_dimension_mismatch() {
        let mut trainer = ProjectionTrainer::new(64, 4, rates(0.01, 0.01), 5).unwrap();
        let embedding = Array2::<f32>::zeros((3, 5));
        assert!(trainer.train_epoch(embedding.view(), 2, 0.95).is_err());
        assert!(trainer.train_epoch(Array2::<f32>::zeros((3, 4)).view(), 0, 0.95).is_err());
    }
}
