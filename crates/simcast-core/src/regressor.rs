//! The model contract consumed by the forecaster

use crate::models::FeatureRow;

/// A trained model mapping feature rows to predicted daily volume.
///
/// Implementations are immutable once built and are shared across the
/// per-entity forecasting tasks, hence `Send + Sync`.
pub trait Regressor: Send + Sync {
    /// Predict one value per row, in row order
    fn predict(&self, rows: &[FeatureRow]) -> Vec<f64>;

    fn predict_one(&self, row: &FeatureRow) -> f64 {
        self.predict(std::slice::from_ref(row))
            .first()
            .copied()
            .unwrap_or(0.0)
    }
}
