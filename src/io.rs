//! Safetensors I/O for raw recordings.
//!
//! A raw recording file holds the continuous signal plus channel metadata
//! and the event list exported from the acquisition system:
//!
//! ```text
//! data      [C, T]  F64  continuous signal in volts
//! chan_pos  [C, 2]  F64  flattened 2-D sensor positions
//! sfreq     [1]     F64  sampling rate (Hz)
//! events    [N, 2]  I32  (sample index, marker code) rows
//! ch_names  [bytes] U8   newline-separated channel names
//! ```
use anyhow::{bail, Context, Result};
use ndarray::Array2;
use std::collections::HashMap;
use std::path::Path;

// ── Low-level safetensors parser (no dependency on the `safetensors` crate's
//    tensor types — we just need raw bytes → ndarray). ─────────────────────────

fn parse_header(bytes: &[u8]) -> Result<(HashMap<String, serde_json::Value>, usize)> {
    if bytes.len() < 8 {
        bail!("safetensors file too small");
    }
    let n = u64::from_le_bytes(bytes[..8].try_into().unwrap()) as usize;
    if bytes.len() < 8 + n {
        bail!(
            "safetensors header claims {n} bytes but only {} remain",
            bytes.len() - 8
        );
    }
    let header: HashMap<String, serde_json::Value> =
        serde_json::from_slice(&bytes[8..8 + n])
            .context("failed to parse safetensors header")?;
    Ok((header, 8 + n))
}

fn tensor_bytes<'a>(
    bytes: &'a [u8],
    data_start: usize,
    entry: &serde_json::Value,
) -> Result<&'a [u8]> {
    let offsets = entry["data_offsets"]
        .as_array()
        .context("tensor entry missing data_offsets")?;
    let s = offsets[0].as_u64().context("bad offset")? as usize;
    let e = offsets[1].as_u64().context("bad offset")? as usize;
    if s > e || data_start + e > bytes.len() {
        bail!("tensor data runs past end of file");
    }
    Ok(&bytes[data_start + s..data_start + e])
}

fn read_f64_tensor(
    bytes: &[u8],
    data_start: usize,
    entry: &serde_json::Value,
) -> Result<Vec<f64>> {
    let raw = tensor_bytes(bytes, data_start, entry)?;
    Ok(raw
        .chunks_exact(8)
        .map(|b| f64::from_le_bytes(b.try_into().unwrap()))
        .collect())
}

fn read_i32_tensor(
    bytes: &[u8],
    data_start: usize,
    entry: &serde_json::Value,
) -> Result<Vec<i32>> {
    let raw = tensor_bytes(bytes, data_start, entry)?;
    Ok(raw
        .chunks_exact(4)
        .map(|b| i32::from_le_bytes(b.try_into().unwrap()))
        .collect())
}

fn shape_of(entry: &serde_json::Value) -> Result<Vec<usize>> {
    entry["shape"]
        .as_array()
        .context("tensor entry missing shape")?
        .iter()
        .map(|v| v.as_u64().map(|n| n as usize).context("bad shape entry"))
        .collect()
}

// ── Public structs ────────────────────────────────────────────────────────────

/// One event marker from the recording's annotation track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Sample index of the marker in the continuous signal.
    pub sample: i64,
    /// Numeric stimulus code (6 = low-cue win, 7 = low-cue loss, …).
    pub code: i32,
}

/// A continuous multi-channel recording with its metadata and event list.
pub struct Recording {
    /// [C, T] in volts.
    pub data: Array2<f64>,
    /// Sampling rate (Hz).
    pub sfreq: f64,
    /// Channel names, one per row of `data`.
    pub ch_names: Vec<String>,
    /// [C, 2] flattened sensor positions (arbitrary planar layout units).
    pub chan_pos: Array2<f64>,
    /// Event markers, ordered by sample index as exported.
    pub events: Vec<Event>,
}

impl Recording {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading raw recording {}", path.display()))?;
        let (header, data_start) = parse_header(&bytes)?;

        let data_entry = header.get("data").context("missing 'data' key")?;
        let data_shape = shape_of(data_entry)?;
        if data_shape.len() != 2 {
            bail!("'data' tensor is not 2-D in {}", path.display());
        }
        let data_vec = read_f64_tensor(&bytes, data_start, data_entry)?;
        let data = Array2::from_shape_vec((data_shape[0], data_shape[1]), data_vec)?;

        let pos_entry = header.get("chan_pos").context("missing 'chan_pos' key")?;
        let pos_shape = shape_of(pos_entry)?;
        if pos_shape.len() != 2 {
            bail!("'chan_pos' tensor is not 2-D in {}", path.display());
        }
        let pos_vec = read_f64_tensor(&bytes, data_start, pos_entry)?;
        let chan_pos = Array2::from_shape_vec((pos_shape[0], pos_shape[1]), pos_vec)?;

        let sfreq_entry = header.get("sfreq").context("missing 'sfreq' key")?;
        let sfreq = *read_f64_tensor(&bytes, data_start, sfreq_entry)?
            .first()
            .context("'sfreq' tensor is empty")?;

        let events = if let Some(e) = header.get("events") {
            let vals = read_i32_tensor(&bytes, data_start, e)?;
            vals.chunks_exact(2)
                .map(|row| Event { sample: row[0] as i64, code: row[1] })
                .collect()
        } else {
            vec![]
        };

        // Channel names are optional.
        let ch_names = if let Some(e) = header.get("ch_names") {
            let raw = tensor_bytes(&bytes, data_start, e)?;
            std::str::from_utf8(raw)?
                .split('\n')
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        } else {
            (0..data.nrows()).map(|i| format!("Ch{}", i + 1)).collect()
        };

        if chan_pos.nrows() != data.nrows() {
            bail!(
                "chan_pos has {} rows but data has {} channels",
                chan_pos.nrows(),
                data.nrows()
            );
        }

        Ok(Recording { data, sfreq, ch_names, chan_pos, events })
    }

    /// Write the recording back out in the same layout `load` expects.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut w = StWriter::new();
        w.add_f64_arr2("data", &self.data);
        w.add_f64_arr2("chan_pos", &self.chan_pos);
        w.add_f64("sfreq", &[self.sfreq], &[1]);
        let mut ev: Vec<i32> = Vec::with_capacity(self.events.len() * 2);
        for e in &self.events {
            let sample = i32::try_from(e.sample).with_context(|| {
                format!("event sample {} does not fit the I32 event tensor", e.sample)
            })?;
            ev.push(sample);
            ev.push(e.code);
        }
        w.add_i32("events", &ev, &[self.events.len(), 2]);
        w.add_bytes("ch_names", self.ch_names.join("\n").as_bytes());
        w.write(path)
    }
}

// ── Generic safetensors builder ───────────────────────────────────────────────

/// Simple safetensors file writer that handles F64, I32 and raw-byte tensors.
///
/// Usage:
/// ```rust,no_run
/// use erp::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("signal", &[1.0f64, 2.0, 3.0], &[1, 3]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl Default for StWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl StWriter {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", shape.to_vec()));
    }

    /// Store an opaque byte string (UTF-8 name lists etc.) as a U8 tensor.
    pub fn add_bytes(&mut self, name: &str, data: &[u8]) {
        self.entries
            .push((name.to_string(), data.to_vec(), "U8", vec![data.len()]));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes.into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        let mut f = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

/// Read a single named F64 tensor from a safetensors file as `(shape, values)`.
///
/// Used by the evoked-file loader so it does not have to re-implement the
/// header walk.
pub fn read_named_f64(bytes: &[u8], name: &str) -> Result<(Vec<usize>, Vec<f64>)> {
    let (header, data_start) = parse_header(bytes)?;
    let entry = header
        .get(name)
        .with_context(|| format!("missing '{name}' key"))?;
    let shape = shape_of(entry)?;
    let vals = read_f64_tensor(bytes, data_start, entry)?;
    Ok((shape, vals))
}

/// Read a single named I32 tensor from a safetensors file.
pub fn read_named_i32(bytes: &[u8], name: &str) -> Result<(Vec<usize>, Vec<i32>)> {
    let (header, data_start) = parse_header(bytes)?;
    let entry = header
        .get(name)
        .with_context(|| format!("missing '{name}' key"))?;
    let shape = shape_of(entry)?;
    let vals = read_i32_tensor(bytes, data_start, entry)?;
    Ok((shape, vals))
}

/// Read a named U8 tensor as a UTF-8 string.
pub fn read_named_str(bytes: &[u8], name: &str) -> Result<String> {
    let (header, data_start) = parse_header(bytes)?;
    let entry = header
        .get(name)
        .with_context(|| format!("missing '{name}' key"))?;
    let raw = tensor_bytes(bytes, data_start, entry)?;
    Ok(std::str::from_utf8(raw)?.to_string())
}
