//! ICA-based artifact removal.
//!
//! FastICA (via `linfa-ica`) decomposes the referenced, band-passed signal
//! into independent components.  Components whose time courses are strongly
//! super-Gaussian (excess kurtosis above the configured threshold) are treated
//! as artifacts (eye blinks produce sparse, high-amplitude deflections that
//! dominate this measure) and their contribution is subtracted from the
//! recording.  Channel layout and sampling rate are untouched.
use anyhow::{anyhow, Result};
use linfa::prelude::*;
use linfa_ica::fast_ica::FastIca;
use ndarray::{Array2, Axis};

use crate::config::IcaConfig;

/// What the decomposition found and removed, for per-subject diagnostics.
#[derive(Debug, Clone)]
pub struct IcaReport {
    /// Number of components actually estimated.
    pub n_components: usize,
    /// Indices of components removed from the signal.
    pub excluded: Vec<usize>,
    /// Excess kurtosis of each component time course.
    pub kurtosis: Vec<f64>,
    /// Fraction of total signal variance carried by each component.
    pub variance_explained: Vec<f64>,
}

/// Decompose `data` ([C, T], volts) and subtract artifact components in place.
///
/// Returns the [`IcaReport`] describing the exclusion decisions.  When no
/// component crosses the kurtosis threshold the data is left untouched.
pub fn remove_artifacts(data: &mut Array2<f64>, cfg: &IcaConfig) -> Result<IcaReport> {
    let (n_ch, n_t) = data.dim();
    let n_components = cfg.n_components.min(n_ch);
    if n_components == 0 || n_t < 2 {
        return Err(anyhow!("not enough data for ICA: {n_ch} ch × {n_t} samples"));
    }

    // linfa wants samples × features.
    let x: Array2<f64> = data.t().to_owned();

    // Center columns; FastICA assumes zero-mean inputs and we need the means
    // back when reassembling the cleaned signal.
    let col_means = x
        .mean_axis(Axis(0))
        .ok_or_else(|| anyhow!("empty recording"))?;
    let mut x_centered = x;
    for (mut col, &m) in x_centered.columns_mut().into_iter().zip(col_means.iter()) {
        col.mapv_inplace(|v| v - m);
    }

    let total_variance: f64 = x_centered
        .columns()
        .into_iter()
        .map(|col| col.iter().map(|&v| v * v).sum::<f64>() / n_t as f64)
        .sum();

    log::debug!(
        "fitting FastICA: {n_components} components, max_iter={}, tol={}",
        cfg.max_iter,
        cfg.tol
    );
    let dataset = DatasetBase::from(x_centered.clone());
    let ica = FastIca::params()
        .ncomponents(n_components)
        .max_iter(cfg.max_iter)
        .tol(cfg.tol);
    let model = ica
        .fit(&dataset)
        .map_err(|e| anyhow!("FastICA failed: {e:?}"))?;

    // Sources: [T, K].
    let sources = model.predict(&x_centered);

    // Mixing matrix A [C, K] from X ≈ S·Aᵀ via least squares.
    let sts = sources.t().dot(&sources);
    let sts_inv = invert_matrix(&sts)?;
    let mixing = x_centered.t().dot(&sources).dot(&sts_inv);

    // Score components.
    let mut kurt = Vec::with_capacity(n_components);
    let mut var_explained = Vec::with_capacity(n_components);
    for k in 0..n_components {
        let ts: Vec<f64> = sources.column(k).to_vec();
        kurt.push(excess_kurtosis(&ts));

        // Variance this component contributes across all channels.
        let src_var = ts.iter().map(|&v| v * v).sum::<f64>() / n_t as f64;
        let load: f64 = mixing.column(k).iter().map(|&a| a * a).sum();
        let frac = if total_variance > 0.0 {
            src_var * load / total_variance
        } else {
            0.0
        };
        var_explained.push(frac);
    }

    let excluded: Vec<usize> = (0..n_components)
        .filter(|&k| kurt[k] > cfg.kurtosis_threshold)
        .collect();

    for &k in &excluded {
        log::info!(
            "excluding ICA component {k}: kurtosis={:.2}, explains {:.0}% of signal variance",
            kurt[k],
            100.0 * var_explained[k]
        );
    }
    if excluded.is_empty() {
        log::info!("no ICA component crossed the kurtosis threshold; signal unchanged");
    }

    // Subtract only the excluded components' contribution so the residual
    // subspace (anything FastICA did not model) survives.
    if !excluded.is_empty() {
        let mut artifact = Array2::<f64>::zeros((n_t, n_ch));
        for &k in &excluded {
            let s_k = sources.column(k);
            let a_k = mixing.column(k);
            for (t, &s) in s_k.iter().enumerate() {
                for (c, &a) in a_k.iter().enumerate() {
                    artifact[[t, c]] += s * a;
                }
            }
        }
        let cleaned = &x_centered - &artifact;
        for c in 0..n_ch {
            for t in 0..n_t {
                data[[c, t]] = cleaned[[t, c]] + col_means[c];
            }
        }
    }

    Ok(IcaReport {
        n_components,
        excluded,
        kurtosis: kurt,
        variance_explained: var_explained,
    })
}

/// Excess kurtosis `E[(X-μ)⁴] / σ⁴ − 3`; ≈ 0 for Gaussian sources.
pub fn excess_kurtosis(data: &[f64]) -> f64 {
    if data.len() < 4 {
        return 0.0;
    }
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let m2: f64 = data.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n;
    let m4: f64 = data.iter().map(|&x| (x - mean).powi(4)).sum::<f64>() / n;
    if m2 < 1e-30 {
        return 0.0;
    }
    m4 / m2.powi(2) - 3.0
}

/// Invert a square matrix using Gauss-Jordan elimination.
fn invert_matrix(matrix: &Array2<f64>) -> Result<Array2<f64>> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(anyhow!("matrix must be square"));
    }

    // Augmented matrix [A | I].
    let mut aug = Array2::<f64>::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = matrix[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for i in 0..n {
        // Partial pivoting.
        let mut max_row = i;
        for k in (i + 1)..n {
            if aug[[k, i]].abs() > aug[[max_row, i]].abs() {
                max_row = k;
            }
        }
        for j in 0..(2 * n) {
            let tmp = aug[[i, j]];
            aug[[i, j]] = aug[[max_row, j]];
            aug[[max_row, j]] = tmp;
        }

        let pivot = aug[[i, i]];
        if pivot.abs() < 1e-12 {
            return Err(anyhow!("matrix is singular or nearly singular"));
        }
        for j in 0..(2 * n) {
            aug[[i, j]] /= pivot;
        }

        for k in 0..n {
            if k != i {
                let factor = aug[[k, i]];
                for j in 0..(2 * n) {
                    aug[[k, j]] -= factor * aug[[i, j]];
                }
            }
        }
    }

    let mut inv = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            inv[[i, j]] = aug[[i, n + j]];
        }
    }
    Ok(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn kurtosis_of_gaussianish_signal_is_small() {
        // A sine sweep is sub-Gaussian (negative excess kurtosis), nowhere
        // near the blink threshold.
        let x: Vec<f64> = (0..4096).map(|i| (i as f64 * 0.013).sin()).collect();
        let k = excess_kurtosis(&x);
        assert!(k < 1.0, "kurtosis={k}");
    }

    #[test]
    fn kurtosis_of_spiky_signal_is_large() {
        // Sparse spikes on a flat-noise background: strongly super-Gaussian.
        let mut x = vec![0.0_f64; 4096];
        for (i, v) in x.iter_mut().enumerate() {
            *v = ((i * 2654435761) % 1000) as f64 / 1e6;
        }
        for i in (0..4096).step_by(512) {
            x[i] = 50.0;
        }
        let k = excess_kurtosis(&x);
        assert!(k > 5.0, "kurtosis={k}");
    }

    #[test]
    fn invert_matrix_identity() {
        let m = array![[2.0, 0.0], [0.0, 4.0]];
        let inv = invert_matrix(&m).unwrap();
        approx::assert_abs_diff_eq!(inv[[0, 0]], 0.5, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(inv[[1, 1]], 0.25, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(inv[[0, 1]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn singular_matrix_is_error() {
        let m = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(invert_matrix(&m).is_err());
    }

    #[test]
    fn clean_signal_passes_through() {
        // Two smooth oscillations: no component should cross the blink
        // threshold, so the data must come back bit-identical.
        let mut data = Array2::from_shape_fn((4, 2048), |(c, t)| {
            let t = t as f64 / 250.0;
            ((2.0 * std::f64::consts::PI * (6.0 + c as f64) * t).sin()) * 20e-6
        });
        let orig = data.clone();
        let cfg = IcaConfig { n_components: 4, ..IcaConfig::default() };
        let report = remove_artifacts(&mut data, &cfg).unwrap();
        assert!(report.excluded.is_empty(), "excluded {:?}", report.excluded);
        assert_eq!(data, orig);
    }
}
