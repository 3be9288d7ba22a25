//! Welch power spectral density, for the per-subject diagnostic plots.
//!
//! Hann-windowed segments with 50 % overlap, periodograms averaged per
//! channel, power reported in dB.
use anyhow::{bail, Result};
use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

/// Power spectrum of a multi-channel recording.
pub struct Psd {
    /// Frequency axis (Hz), DC through Nyquist.
    pub freqs: Vec<f64>,
    /// [C, F] power in dB.
    pub power: Array2<f64>,
}

/// Welch PSD of `data` ([C, T]) with `n_fft`-sample segments.
///
/// Signals shorter than one segment are zero-padded into a single segment.
pub fn welch_psd(data: &Array2<f64>, sfreq: f64, n_fft: usize) -> Result<Psd> {
    let (n_ch, n_t) = data.dim();
    if n_t == 0 {
        bail!("cannot compute PSD of empty input");
    }
    if n_fft < 2 {
        bail!("segment length {n_fft} is too short for a PSD");
    }

    let window = hann(n_fft);
    let win_norm: f64 = window.iter().map(|w| w * w).sum();

    let n_freqs = n_fft / 2 + 1;
    let step = (n_fft / 2).max(1);

    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_fft);

    let mut power = Array2::<f64>::zeros((n_ch, n_freqs));

    for ch in 0..n_ch {
        let row: Vec<f64> = data.row(ch).to_vec();
        let mut acc = vec![0.0_f64; n_freqs];
        let mut n_segments = 0usize;

        let mut start = 0usize;
        loop {
            let mut buf: Vec<Complex<f64>> = (0..n_fft)
                .map(|i| {
                    let v = row.get(start + i).copied().unwrap_or(0.0);
                    Complex { re: v * window[i], im: 0.0 }
                })
                .collect();
            fft.process(&mut buf);

            for (k, a) in acc.iter_mut().enumerate() {
                *a += buf[k].norm_sqr() / (win_norm * sfreq);
            }
            n_segments += 1;

            start += step;
            if start + n_fft > n_t {
                break;
            }
        }

        for (k, a) in acc.iter().enumerate() {
            let mean = a / n_segments as f64;
            // One-sided spectrum: double everything except DC and Nyquist.
            let one_sided = if k == 0 || (n_fft % 2 == 0 && k == n_freqs - 1) {
                mean
            } else {
                2.0 * mean
            };
            power[[ch, k]] = 10.0 * (one_sided + f64::MIN_POSITIVE).log10();
        }
    }

    let freqs: Vec<f64> = (0..n_freqs).map(|k| k as f64 * sfreq / n_fft as f64).collect();
    Ok(Psd { freqs, power })
}

/// Hann window of length `n`.
fn hann(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (n - 1) as f64).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_peak_at_its_frequency() {
        let sfreq = 250.0;
        let data = Array2::from_shape_fn((1, 4096), |(_, t)| {
            (2.0 * PI * 10.0 * t as f64 / sfreq).sin()
        });
        let psd = welch_psd(&data, sfreq, 1024).unwrap();

        let peak_idx = psd
            .power
            .row(0)
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        let peak_freq = psd.freqs[peak_idx];
        assert!((peak_freq - 10.0).abs() < 1.0, "peak at {peak_freq} Hz");
    }

    #[test]
    fn freq_axis_spans_dc_to_nyquist() {
        let data = Array2::zeros((2, 2048));
        let psd = welch_psd(&data, 250.0, 512).unwrap();
        assert_eq!(psd.freqs.len(), 257);
        approx::assert_abs_diff_eq!(psd.freqs[0], 0.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(psd.freqs[256], 125.0, epsilon = 1e-9);
        assert_eq!(psd.power.dim(), (2, 257));
    }

    #[test]
    fn short_signal_single_segment() {
        let data = Array2::from_elem((1, 100), 1.0);
        let psd = welch_psd(&data, 250.0, 512).unwrap();
        assert_eq!(psd.freqs.len(), 257);
        // All power values are finite even with zero padding.
        assert!(psd.power.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn empty_input_is_error() {
        let data = Array2::<f64>::zeros((1, 0));
        assert!(welch_psd(&data, 250.0, 512).is_err());
    }

    #[test]
    fn degenerate_segment_length_is_error() {
        let data = Array2::from_elem((1, 100), 1.0);
        assert!(welch_psd(&data, 250.0, 0).is_err());
        assert!(welch_psd(&data, 250.0, 1).is_err());
    }
}
