//! Per-subject evoked responses (averaged epochs) and their on-disk form.
//!
//! An evoked file is the unit the aggregator consumes:
//!
//! ```text
//! data      [C, S]  F64  channel-wise mean waveform (volts)
//! sfreq     [1]     F64
//! tmin      [1]     F64  window start relative to the marker (s)
//! n_epochs  [1]     I32  epochs that went into the average
//! ch_names  [bytes] U8   newline-separated channel names
//! condition [bytes] U8
//! subject   [bytes] U8
//! ```
use anyhow::{bail, Context, Result};
use ndarray::{Array2, Axis};
use std::path::Path;

use crate::epoch::{Condition, EpochSet};
use crate::io::{read_named_f64, read_named_i32, read_named_str, StWriter};

/// The channel-wise mean waveform across retained epochs of one condition.
#[derive(Debug, Clone)]
pub struct Evoked {
    pub condition: Condition,
    pub subject: String,
    /// [C, S] in volts.
    pub data: Array2<f64>,
    /// Window start relative to the marker (s).
    pub tmin: f64,
    pub sfreq: f64,
    pub ch_names: Vec<String>,
    /// Number of epochs averaged.
    pub n_epochs: usize,
}

impl Evoked {
    /// Average the retained epochs of `set`.
    ///
    /// Zero retained epochs means the average is undefined; that is surfaced
    /// as an error rather than an empty waveform (the caller decides whether
    /// it is subject-fatal).
    pub fn from_epochs(set: &EpochSet, subject: &str, ch_names: &[String]) -> Result<Self> {
        let n = set.n_epochs();
        if n == 0 {
            bail!(
                "no retained epochs for condition '{}' ({} rejected, {} skipped)",
                set.condition,
                set.n_rejected,
                set.n_skipped
            );
        }
        let data = set
            .data
            .mean_axis(Axis(0))
            .context("averaging over an empty epoch axis")?;
        Ok(Evoked {
            condition: set.condition,
            subject: subject.to_string(),
            data,
            tmin: set.tmin,
            sfreq: set.sfreq,
            ch_names: ch_names.to_vec(),
            n_epochs: n,
        })
    }

    /// Time axis in seconds, one entry per sample.
    pub fn times(&self) -> Vec<f64> {
        (0..self.data.ncols())
            .map(|i| self.tmin + i as f64 / self.sfreq)
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut w = StWriter::new();
        w.add_f64_arr2("data", &self.data);
        w.add_f64("sfreq", &[self.sfreq], &[1]);
        w.add_f64("tmin", &[self.tmin], &[1]);
        w.add_i32("n_epochs", &[self.n_epochs as i32], &[1]);
        w.add_bytes("ch_names", self.ch_names.join("\n").as_bytes());
        w.add_bytes("condition", self.condition.label().as_bytes());
        w.add_bytes("subject", self.subject.as_bytes());
        w.write(path)
            .with_context(|| format!("writing evoked file {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading evoked file {}", path.display()))?;

        let (shape, vals) = read_named_f64(&bytes, "data")?;
        if shape.len() != 2 {
            bail!("'data' tensor is not 2-D in {}", path.display());
        }
        let data = Array2::from_shape_vec((shape[0], shape[1]), vals)?;

        let sfreq = *read_named_f64(&bytes, "sfreq")?.1.first().context("empty 'sfreq'")?;
        let tmin = *read_named_f64(&bytes, "tmin")?.1.first().context("empty 'tmin'")?;
        let n_epochs = *read_named_i32(&bytes, "n_epochs")?
            .1
            .first()
            .context("empty 'n_epochs'")? as usize;

        let ch_names: Vec<String> = read_named_str(&bytes, "ch_names")?
            .split('\n')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        let cond_label = read_named_str(&bytes, "condition")?;
        let condition = Condition::from_label(&cond_label)
            .with_context(|| format!("unknown condition label '{cond_label}'"))?;
        let subject = read_named_str(&bytes, "subject")?;

        Ok(Evoked { condition, subject, data, tmin, sfreq, ch_names, n_epochs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::epoch::extract_epochs;
    use crate::io::{Event, Recording};
    use ndarray::{s, Array2, Array3};

    #[test]
    fn average_is_arithmetic_mean() {
        // Two epochs with known values: average must match exactly.
        let mut data = Array3::<f64>::zeros((2, 2, 4));
        data.slice_mut(s![0, .., ..])
            .assign(&ndarray::array![[1.0, 2.0, 3.0, 4.0], [0.0, 0.0, 0.0, 0.0]]);
        data.slice_mut(s![1, .., ..])
            .assign(&ndarray::array![[3.0, 2.0, 1.0, 0.0], [2.0, 2.0, 2.0, 2.0]]);
        let set = EpochSet {
            condition: Condition::CueWin,
            data,
            tmin: -0.2,
            sfreq: 250.0,
            n_rejected: 0,
            n_skipped: 0,
        };
        let ev = Evoked::from_epochs(&set, "01", &["Fz".into(), "Cz".into()]).unwrap();
        assert_eq!(ev.data, ndarray::array![[2.0, 2.0, 2.0, 2.0], [1.0, 1.0, 1.0, 1.0]]);
        assert_eq!(ev.n_epochs, 2);
    }

    #[test]
    fn zero_epochs_is_error() {
        let set = EpochSet {
            condition: Condition::Feedback,
            data: Array3::zeros((0, 4, 201)),
            tmin: -0.2,
            sfreq: 250.0,
            n_rejected: 3,
            n_skipped: 0,
        };
        let err = Evoked::from_epochs(&set, "01", &[]);
        assert!(err.is_err());
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub-07_cue-loss-ave.safetensors");

        let ev = Evoked {
            condition: Condition::CueLoss,
            subject: "07".into(),
            data: Array2::from_shape_fn((3, 201), |(c, t)| (c as f64 + t as f64 * 0.01) * 1e-6),
            tmin: -0.2,
            sfreq: 250.0,
            ch_names: vec!["Fz".into(), "Cz".into(), "Pz".into()],
            n_epochs: 42,
        };
        ev.save(&path).unwrap();

        let back = Evoked::load(&path).unwrap();
        assert_eq!(back.condition, Condition::CueLoss);
        assert_eq!(back.subject, "07");
        assert_eq!(back.data, ev.data);
        assert_eq!(back.tmin, -0.2);
        assert_eq!(back.sfreq, 250.0);
        assert_eq!(back.ch_names, ev.ch_names);
        assert_eq!(back.n_epochs, 42);
    }

    #[test]
    fn times_axis_spans_window() {
        let ev = Evoked {
            condition: Condition::Feedback,
            subject: "01".into(),
            data: Array2::zeros((1, 201)),
            tmin: -0.2,
            sfreq: 250.0,
            ch_names: vec!["Fz".into()],
            n_epochs: 1,
        };
        let t = ev.times();
        approx::assert_abs_diff_eq!(t[0], -0.2, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(t[200], 0.6, epsilon = 1e-12);
    }

    #[test]
    fn pipeline_average_matches_hand_computation() {
        // One subject, one condition, two clean epochs with a known bump.
        let mut rec = Recording {
            data: Array2::zeros((1, 2000)),
            sfreq: 250.0,
            ch_names: vec!["FCz".into()],
            chan_pos: Array2::zeros((1, 2)),
            events: vec![Event { sample: 500, code: 6 }, Event { sample: 1200, code: 6 }],
        };
        // Epoch 1: 40 µV at offset +100; epoch 2: 20 µV there.
        rec.data[[0, 600]] = 40e-6;
        rec.data[[0, 1300]] = 20e-6;
        let cfg = PipelineConfig::default();
        let set = extract_epochs(&rec, Condition::CueWin, &cfg).unwrap();
        let ev = Evoked::from_epochs(&set, "01", &rec.ch_names).unwrap();
        // Offset +100 samples from marker = index 150 (window starts at −50).
        approx::assert_abs_diff_eq!(ev.data[[0, 150]], 30e-6, epsilon = 1e-12);
    }
}
