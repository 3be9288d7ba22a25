//! Diagnostic plots, written as standalone HTML.
//!
//! One file per figure: evoked butterfly plots, Welch PSDs, a sensor-layout
//! topography of the evoked peak, and the grand-average comparison.
use anyhow::{Context, Result};
use ndarray::{Array, Array2, Ix1};
use plotly::common::{Marker, Mode};
use plotly::{Layout, Plot, Scatter};
use std::path::Path;

use crate::aggregate::GrandAverage;
use crate::evoked::Evoked;
use crate::spectrum::Psd;

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating plot directory {}", dir.display()))?;
    }
    Ok(())
}

/// Butterfly plot: every channel of one evoked response over time, in µV.
pub fn plot_evoked(evoked: &Evoked, file_name: &Path) -> Result<()> {
    ensure_parent(file_name)?;
    let t: Array<f64, Ix1> = Array::from_vec(evoked.times());

    let mut plot = Plot::new();
    for (ch_idx, channel_name) in evoked.ch_names.iter().enumerate() {
        let ys = evoked.data.row(ch_idx).mapv(|v| v * 1e6);
        let trace = Scatter::from_array(t.clone(), ys)
            .mode(Mode::Lines)
            .name(channel_name);
        plot.add_trace(trace);
    }

    let title_text = format!(
        "<b>Evoked</b> sub-{} / {} ({} epochs)",
        evoked.subject, evoked.condition, evoked.n_epochs
    );
    let layout = Layout::new().title(title_text);
    plot.set_layout(layout);

    plot.write_html(file_name);
    Ok(())
}

/// Per-channel Welch PSD in dB.
pub fn plot_psd(psd: &Psd, ch_names: &[String], title: &str, file_name: &Path) -> Result<()> {
    ensure_parent(file_name)?;
    let f: Array<f64, Ix1> = Array::from_vec(psd.freqs.clone());

    let mut plot = Plot::new();
    for (ch_idx, channel_name) in ch_names.iter().enumerate() {
        let ys = psd.power.row(ch_idx).to_owned();
        let trace = Scatter::from_array(f.clone(), ys)
            .mode(Mode::Lines)
            .name(channel_name);
        plot.add_trace(trace);
    }

    let layout = Layout::new().title(format!("<b>PSD</b> {title}"));
    plot.set_layout(layout);

    plot.write_html(file_name);
    Ok(())
}

/// Sensor-layout topography of the evoked peak.
///
/// One marker per channel at its 2-D position; marker size scales with the
/// channel's absolute amplitude at the global peak latency.
pub fn plot_topography(evoked: &Evoked, chan_pos: &Array2<f64>, file_name: &Path) -> Result<()> {
    ensure_parent(file_name)?;

    // Latency of the largest absolute deflection across all channels.
    let mut peak_t = 0usize;
    let mut peak_val = 0.0_f64;
    for ((_, t), &v) in evoked.data.indexed_iter() {
        if v.abs() > peak_val {
            peak_val = v.abs();
            peak_t = t;
        }
    }

    let amp_at_peak: Vec<f64> = (0..evoked.data.nrows())
        .map(|c| evoked.data[[c, peak_t]].abs())
        .collect();
    let max_amp = amp_at_peak.iter().cloned().fold(f64::MIN_POSITIVE, f64::max);

    let mut plot = Plot::new();
    for (ch_idx, channel_name) in evoked.ch_names.iter().enumerate() {
        let size = 6 + (24.0 * amp_at_peak[ch_idx] / max_amp).round() as usize;
        let trace = Scatter::new(vec![chan_pos[[ch_idx, 0]]], vec![chan_pos[[ch_idx, 1]]])
            .mode(Mode::Markers)
            .marker(Marker::new().size(size))
            .name(channel_name);
        plot.add_trace(trace);
    }

    let latency = evoked.tmin + peak_t as f64 / evoked.sfreq;
    let title_text = format!(
        "<b>Topography</b> sub-{} / {} at {:.0} ms",
        evoked.subject,
        evoked.condition,
        latency * 1000.0
    );
    plot.set_layout(Layout::new().title(title_text));

    plot.write_html(file_name);
    Ok(())
}

/// Grand-average comparison: one trace per subject plus the group mean, for a
/// single channel.
pub fn plot_grand_average(ga: &GrandAverage, channel: usize, file_name: &Path) -> Result<()> {
    ensure_parent(file_name)?;
    let t: Array<f64, Ix1> = Array::from_vec(ga.evoked.times());

    let mut plot = Plot::new();
    for subject in &ga.inputs {
        let ys = subject.data.row(channel).mapv(|v| v * 1e6);
        let trace = Scatter::from_array(t.clone(), ys)
            .mode(Mode::Lines)
            .name(&format!("sub-{}", subject.subject));
        plot.add_trace(trace);
    }
    let ys = ga.evoked.data.row(channel).mapv(|v| v * 1e6);
    let trace = Scatter::from_array(t.clone(), ys)
        .mode(Mode::LinesMarkers)
        .name("grand average");
    plot.add_trace(trace);

    let channel_name = ga
        .evoked
        .ch_names
        .get(channel)
        .map(String::as_str)
        .unwrap_or("?");
    let title_text = format!(
        "<b>Grand average</b> {} (channel {channel_name}, {} subjects)",
        ga.evoked.condition,
        ga.inputs.len()
    );
    plot.set_layout(Layout::new().title(title_text));

    plot.write_html(file_name);
    Ok(())
}
