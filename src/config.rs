//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every tunable parameter for preprocessing, epoching
//! and rejection.  One instance is passed explicitly into every stage so that
//! all subjects are processed with identical settings; there are no
//! module-level defaults.

use std::path::PathBuf;

/// Epoch window relative to an event marker, in seconds.
///
/// `tmin` is negative for pre-stimulus samples.  The window is inclusive on
/// both ends, so at 250 Hz a `(-0.2, 0.6)` window yields 201 samples.
#[derive(Debug, Clone, Copy)]
pub struct EpochWindow {
    /// Start of the window relative to the marker (s, typically negative).
    pub tmin: f64,
    /// End of the window relative to the marker (s).
    pub tmax: f64,
}

impl EpochWindow {
    /// Sample offset of `tmin` relative to the marker (negative for pre-stimulus).
    pub fn first_offset(&self, sfreq: f64) -> i64 {
        (self.tmin * sfreq).round() as i64
    }

    /// Sample offset of `tmax` relative to the marker.
    pub fn last_offset(&self, sfreq: f64) -> i64 {
        (self.tmax * sfreq).round() as i64
    }

    /// Number of samples in the window (both ends inclusive).
    pub fn n_samples(&self, sfreq: f64) -> usize {
        (self.last_offset(sfreq) - self.first_offset(sfreq) + 1) as usize
    }
}

/// FastICA settings for artifact removal.
#[derive(Debug, Clone)]
pub struct IcaConfig {
    /// Number of independent components to estimate.
    ///
    /// Default: `20` (clamped to the channel count at runtime).
    pub n_components: usize,

    /// Maximum FastICA iterations.
    ///
    /// Default: `200`.
    pub max_iter: usize,

    /// FastICA convergence tolerance.
    ///
    /// Default: `1e-4`.
    pub tol: f64,

    /// Excess-kurtosis threshold above which a component is treated as an
    /// artifact (blinks are strongly super-Gaussian; a Gaussian source has
    /// excess kurtosis ≈ 0).
    ///
    /// Default: `5.0`.
    pub kurtosis_threshold: f64,
}

impl Default for IcaConfig {
    fn default() -> Self {
        Self {
            n_components: 20,
            max_iter: 200,
            tol: 1e-4,
            kurtosis_threshold: 5.0,
        }
    }
}

/// Configuration for the full per-subject pipeline and the aggregator.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use erp::PipelineConfig;
///
/// let cfg = PipelineConfig {
///     target_sfreq: 500.0,   // keep a higher rate
///     reject_ptp:   150e-6,  // looser rejection
///     ..PipelineConfig::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory containing `sub-{id}_raw.safetensors` files.
    pub data_dir: PathBuf,

    /// Directory receiving evoked files and the `plots/` subdirectory.
    pub out_dir: PathBuf,

    /// Target sampling rate in Hz.  Subjects recorded at a different rate are
    /// resampled before filtering; subjects already at this rate are passed
    /// through untouched.
    ///
    /// Default: `250.0` Hz.
    pub target_sfreq: f64,

    /// Lower edge of the pre-ICA band-pass filter (Hz).
    ///
    /// Default: `0.1` Hz.
    pub prefilter_l_freq: f64,

    /// Upper edge of the pre-ICA band-pass filter (Hz).
    ///
    /// Default: `100.0` Hz.
    pub prefilter_h_freq: f64,

    /// Mains-hum notch frequency (Hz).  Set to `None` to skip the notch.
    ///
    /// Default: `Some(50.0)`.
    pub notch_freq: Option<f64>,

    /// Post-ICA low-pass cutoff (Hz).
    ///
    /// Default: `30.0` Hz.
    pub post_lowpass: f64,

    /// FastICA settings.
    pub ica: IcaConfig,

    /// Epoch window for feedback-locked events.
    ///
    /// Default: `(-0.2, 0.6)` s.
    pub feedback_window: EpochWindow,

    /// Epoch window for cue-locked events.
    ///
    /// Default: `(-0.2, 0.6)` s.
    pub cue_window: EpochWindow,

    /// Peak-to-peak rejection threshold in **volts**.  An epoch is dropped if
    /// the peak-to-peak amplitude on any channel exceeds this value.  The raw
    /// data is stored in volts, so no unit conversion happens anywhere between
    /// this field and the comparison.
    ///
    /// Default: `120e-6` (120 µV).
    pub reject_ptp: f64,

    /// Marker codes counted as win cues.
    ///
    /// Default: `[6, 16, 26, 36]` (the four win stimulus variants).
    pub cue_win_codes: Vec<i32>,

    /// Marker codes counted as loss cues.
    ///
    /// Default: `[7, 17, 27, 37]`.
    pub cue_loss_codes: Vec<i32>,
}

impl Default for PipelineConfig {
    /// Returns the study configuration:
    /// 250 Hz · 0.1–100 Hz band-pass · 50 Hz notch · 30 Hz post-ICA low-pass ·
    /// (−0.2, 0.6) s epochs · 120 µV rejection.
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            out_dir: PathBuf::from("derivatives"),
            target_sfreq: 250.0,
            prefilter_l_freq: 0.1,
            prefilter_h_freq: 100.0,
            notch_freq: Some(50.0),
            post_lowpass: 30.0,
            ica: IcaConfig::default(),
            feedback_window: EpochWindow { tmin: -0.2, tmax: 0.6 },
            cue_window: EpochWindow { tmin: -0.2, tmax: 0.6 },
            reject_ptp: 120e-6,
            cue_win_codes: vec![6, 16, 26, 36],
            cue_loss_codes: vec![7, 17, 27, 37],
        }
    }
}

impl PipelineConfig {
    /// Path of a subject's raw recording file.
    pub fn raw_path(&self, subject: &str) -> PathBuf {
        self.data_dir.join(format!("sub-{subject}_raw.safetensors"))
    }

    /// Path of a subject's evoked file for one condition.
    pub fn evoked_path(&self, subject: &str, condition: &str) -> PathBuf {
        self.out_dir
            .join(format!("sub-{subject}_{condition}-ave.safetensors"))
    }

    /// Directory receiving diagnostic HTML plots.
    pub fn plots_dir(&self) -> PathBuf {
        self.out_dir.join("plots")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_sample_count() {
        let cfg = PipelineConfig::default();
        // (-0.2, 0.6) at 250 Hz: -50 ..= 150 → 201 samples.
        assert_eq!(cfg.feedback_window.n_samples(cfg.target_sfreq), 201);
        assert_eq!(cfg.feedback_window.first_offset(cfg.target_sfreq), -50);
        assert_eq!(cfg.feedback_window.last_offset(cfg.target_sfreq), 150);
    }

    #[test]
    fn evoked_path_is_subject_and_condition_keyed() {
        let cfg = PipelineConfig::default();
        let p = cfg.evoked_path("04", "cue-win");
        assert!(p.to_string_lossy().ends_with("sub-04_cue-win-ave.safetensors"));
    }
}
