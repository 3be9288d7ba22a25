//! Event-aligned epoch extraction with amplitude-based rejection.
//!
//! Windows are cut around each condition marker, baseline-corrected over the
//! pre-stimulus interval (`baseline=(None, 0)`), and dropped when the
//! peak-to-peak amplitude on any channel exceeds the configured threshold.
//! Threshold and data are both in volts; the comparison happens on one scale.
use anyhow::{bail, Result};
use ndarray::{s, Array2, Array3};

use crate::config::{EpochWindow, PipelineConfig};
use crate::io::Recording;

/// The three fixed experimental conditions.
///
/// Condition labels are never merged across subjects before averaging; they
/// name evoked files and select marker-code sets from the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    /// Outcome feedback, win and loss collapsed.
    Feedback,
    /// Win-cue stimuli.
    CueWin,
    /// Loss-cue stimuli.
    CueLoss,
}

impl Condition {
    pub const ALL: [Condition; 3] = [Condition::Feedback, Condition::CueWin, Condition::CueLoss];

    /// Stable label used in file names and plot titles.
    pub fn label(&self) -> &'static str {
        match self {
            Condition::Feedback => "feedback",
            Condition::CueWin => "cue-win",
            Condition::CueLoss => "cue-loss",
        }
    }

    /// Parse a label produced by [`Condition::label`].
    pub fn from_label(s: &str) -> Option<Condition> {
        match s {
            "feedback" => Some(Condition::Feedback),
            "cue-win" => Some(Condition::CueWin),
            "cue-loss" => Some(Condition::CueLoss),
            _ => None,
        }
    }

    /// Marker codes belonging to this condition.
    ///
    /// Feedback is the union of the win and loss outcome families.
    pub fn codes(&self, cfg: &PipelineConfig) -> Vec<i32> {
        match self {
            Condition::CueWin => cfg.cue_win_codes.clone(),
            Condition::CueLoss => cfg.cue_loss_codes.clone(),
            Condition::Feedback => {
                let mut v = cfg.cue_win_codes.clone();
                v.extend_from_slice(&cfg.cue_loss_codes);
                v
            }
        }
    }

    /// Epoch window configured for this condition's event category.
    pub fn window(&self, cfg: &PipelineConfig) -> EpochWindow {
        match self {
            Condition::Feedback => cfg.feedback_window,
            Condition::CueWin | Condition::CueLoss => cfg.cue_window,
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Retained epochs for one condition of one subject.
pub struct EpochSet {
    pub condition: Condition,
    /// [E, C, S]; every epoch has exactly `window.n_samples(sfreq)` samples.
    pub data: Array3<f64>,
    /// Window start relative to the marker (s).
    pub tmin: f64,
    pub sfreq: f64,
    /// Epochs dropped by the peak-to-peak criterion.
    pub n_rejected: usize,
    /// Events skipped because their window fell outside the recording.
    pub n_skipped: usize,
}

impl EpochSet {
    pub fn n_epochs(&self) -> usize {
        self.data.shape()[0]
    }
}

/// Peak-to-peak amplitude (max − min) of one channel's samples.
pub fn peak_to_peak(x: &[f64]) -> f64 {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &v in x {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if lo.is_finite() { hi - lo } else { 0.0 }
}

/// Cut, baseline-correct and reject epochs for one condition.
///
/// Zero retained epochs is NOT an error here; the evoked stage decides what
/// to surface. Zero located events with a non-empty event list is logged.
pub fn extract_epochs(
    rec: &Recording,
    condition: Condition,
    cfg: &PipelineConfig,
) -> Result<EpochSet> {
    let window = condition.window(cfg);
    if window.tmin >= window.tmax {
        bail!("epoch window is empty: ({}, {})", window.tmin, window.tmax);
    }

    let first_off = window.first_offset(rec.sfreq);
    let last_off = window.last_offset(rec.sfreq);
    let n_samp = window.n_samples(rec.sfreq);
    let (n_ch, n_t) = rec.data.dim();

    // Pre-stimulus baseline: samples at offsets ≤ 0.  A window that ends
    // before the marker is entirely baseline.
    let n_base = if first_off <= 0 {
        ((-first_off + 1) as usize).min(n_samp)
    } else {
        0
    };

    let codes = condition.codes(cfg);
    let mut kept: Vec<Array2<f64>> = Vec::new();
    let mut n_rejected = 0usize;
    let mut n_skipped = 0usize;

    for ev in rec.events.iter().filter(|e| codes.contains(&e.code)) {
        let start = ev.sample + first_off;
        let end = ev.sample + last_off;
        if start < 0 || end >= n_t as i64 {
            n_skipped += 1;
            log::debug!(
                "skipping {condition} event at sample {}: window outside recording",
                ev.sample
            );
            continue;
        }

        let mut epoch: Array2<f64> = rec
            .data
            .slice(s![.., start as usize..=end as usize])
            .to_owned();
        debug_assert_eq!(epoch.ncols(), n_samp);

        // Baseline: subtract per-channel pre-stimulus mean.
        if n_base > 0 {
            for c in 0..n_ch {
                let m = epoch.slice(s![c, ..n_base]).mean().unwrap_or(0.0);
                epoch.row_mut(c).mapv_inplace(|v| v - m);
            }
        }

        // Peak-to-peak rejection, per channel, in volts.
        let bad = (0..n_ch).any(|c| {
            let row: Vec<f64> = epoch.row(c).to_vec();
            peak_to_peak(&row) > cfg.reject_ptp
        });
        if bad {
            n_rejected += 1;
            continue;
        }

        kept.push(epoch);
    }

    let mut data = Array3::<f64>::zeros((kept.len(), n_ch, n_samp));
    for (e, epoch) in kept.iter().enumerate() {
        data.slice_mut(s![e, .., ..]).assign(epoch);
    }

    log::debug!(
        "{condition}: {} epochs retained, {n_rejected} rejected, {n_skipped} skipped",
        kept.len()
    );

    Ok(EpochSet {
        condition,
        data,
        tmin: window.tmin,
        sfreq: rec.sfreq,
        n_rejected,
        n_skipped,
    })
}
