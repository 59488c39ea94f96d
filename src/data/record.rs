use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use super::model::{Header, SpectralCurve, HEADER_LEN, SAMPLE_COUNT, WAVELENGTH_START};

// ---------------------------------------------------------------------------
// Vendor format constants
// ---------------------------------------------------------------------------

/// Magic tag opening the header of a reflectance-mode record.
pub const MAGIC: &[u8; 3] = b"ASD";

/// Header byte holding the data-type flag, and its reflectance value.
const DATA_TYPE_OFFSET: usize = 179;
const DATA_TYPE_REFLECTANCE: u8 = 16;

/// Auxiliary flag byte cleared when converting to reflectance mode.
const AUX_FLAG_OFFSET: usize = 199;

/// Payload sizes: 2151 LE f32 (reflectance) / 2151 LE f64 (one channel).
const FLOAT_BLOCK_LEN: usize = SAMPLE_COUNT * 4;
const DOUBLE_BLOCK_LEN: usize = SAMPLE_COUNT * 8;

/// Gap between the numerator channel and the denominator search region.
const CALIBRATION_GAP: usize = 18;

/// Number of candidate byte offsets tried when locating the denominator
/// channel.  Undocumented instrument constant; do not tune.
const SCAN_OFFSETS: usize = 29;

/// A channel is considered well-formed when the magnitudes of its extreme
/// values lie strictly inside (0, 1e10).
const CHANNEL_BOUND: f64 = 1e10;

// ---------------------------------------------------------------------------
// Errors and soft warnings
// ---------------------------------------------------------------------------

/// Structural decode failure: the record cannot be interpreted at all.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("record truncated: {got} bytes, need at least {need}")]
    Truncated { need: usize, got: usize },
    #[error("reflectance payload is {got} bytes, expected {expected}")]
    PayloadLength { expected: usize, got: usize },
}

/// Non-fatal data-quality condition attached to an otherwise successful
/// decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeWarning {
    /// The denominator scan tried all candidate offsets without satisfying
    /// the magnitude bound and fell back to the last candidate.  The curve
    /// may be built from a misaligned calibration block.
    ScanExhausted,
}

/// One fully decoded instrument record.
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    /// Header blob, rewritten to reflectance mode when the source was a
    /// raw dual-channel record.
    pub header: Header,
    pub curve: SpectralCurve,
    pub warning: Option<DecodeWarning>,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode the raw bytes of one instrument record.
///
/// Records come in two flavours:
/// * reflectance records open with the [`MAGIC`] tag and carry the curve
///   directly as 2151 LE f32 samples;
/// * raw dual-channel records carry a numerator and a denominator channel
///   as LE f64 arrays, the denominator sitting at a byte-misaligned offset
///   that has to be searched for.  The curve is the per-band ratio and the
///   header is rewritten to reflectance mode.
///
/// Pure function; all I/O lives in [`read_record`].
pub fn decode(bytes: &[u8]) -> Result<DecodedRecord, FormatError> {
    if bytes.len() < HEADER_LEN {
        return Err(FormatError::Truncated {
            need: HEADER_LEN,
            got: bytes.len(),
        });
    }
    let (head, payload) = bytes.split_at(HEADER_LEN);

    if &head[..3] == MAGIC {
        if payload.len() != FLOAT_BLOCK_LEN {
            return Err(FormatError::PayloadLength {
                expected: FLOAT_BLOCK_LEN,
                got: payload.len(),
            });
        }
        let mut floats = vec![0f32; SAMPLE_COUNT];
        LittleEndian::read_f32_into(payload, &mut floats);
        let curve =
            SpectralCurve::from_samples(floats.iter().map(|&v| v as f64).collect());
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(head);
        Ok(DecodedRecord {
            header: Header(header),
            curve,
            warning: None,
        })
    } else {
        let (curve, warning) = decode_dual_channel(payload)?;
        Ok(DecodedRecord {
            header: reflectance_header(head),
            curve,
            warning,
        })
    }
}

/// Rewrite a raw dual-channel header to reflectance mode: force the magic
/// tag, set the data-type flag, clear the auxiliary flag.  Every other
/// byte is preserved.
fn reflectance_header(head: &[u8]) -> Header {
    let mut out = [0u8; HEADER_LEN];
    out.copy_from_slice(head);
    out[..3].copy_from_slice(MAGIC);
    out[DATA_TYPE_OFFSET] = DATA_TYPE_REFLECTANCE;
    out[AUX_FLAG_OFFSET] = 0;
    Header(out)
}

/// Decode the payload of a raw dual-channel record into a reflectance
/// curve: numerator / denominator, band by band, in double precision.
fn decode_dual_channel(
    payload: &[u8],
) -> Result<(SpectralCurve, Option<DecodeWarning>), FormatError> {
    let numerator = read_channel(payload, 0)?;

    // The denominator block sits a gap past the numerator, shifted by an
    // unknown byte offset.  Re-read it at each candidate offset until the
    // magnitude bound holds; keep the last candidate when none does.
    let base = DOUBLE_BLOCK_LEN + CALIBRATION_GAP;
    let mut denominator = Vec::new();
    let mut warning = Some(DecodeWarning::ScanExhausted);
    for offset in 1..=SCAN_OFFSETS {
        denominator = read_channel(payload, base + offset)?;
        if channel_in_bounds(&denominator) {
            warning = None;
            break;
        }
    }

    // Plain IEEE division: a zero denominator band yields ±inf, as in the
    // legacy datasets.
    let samples = numerator
        .iter()
        .zip(&denominator)
        .map(|(n, d)| n / d)
        .collect();
    Ok((SpectralCurve::from_samples(samples), warning))
}

fn read_channel(payload: &[u8], at: usize) -> Result<Vec<f64>, FormatError> {
    let block = payload
        .get(at..at + DOUBLE_BLOCK_LEN)
        .ok_or(FormatError::Truncated {
            need: HEADER_LEN + at + DOUBLE_BLOCK_LEN,
            got: HEADER_LEN + payload.len(),
        })?;
    let mut out = vec![0f64; SAMPLE_COUNT];
    LittleEndian::read_f64_into(block, &mut out);
    Ok(out)
}

fn channel_in_bounds(values: &[f64]) -> bool {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    0.0 < max.abs() && max.abs() < CHANNEL_BOUND && 0.0 < min.abs() && min.abs() < CHANNEL_BOUND
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Serialize a record in reflectance format: 484-byte header followed by
/// 2151 LE f32 samples.  The curve is narrowed to single precision, the
/// on-disk format of the legacy datasets.
pub fn encode(header: &Header, curve: &SpectralCurve) -> Vec<u8> {
    let mut out = vec![0u8; HEADER_LEN + FLOAT_BLOCK_LEN];
    out[..HEADER_LEN].copy_from_slice(&header.0);
    let floats: Vec<f32> = curve.samples().iter().map(|&v| v as f32).collect();
    LittleEndian::write_f32_into(&floats, &mut out[HEADER_LEN..]);
    out
}

// ---------------------------------------------------------------------------
// File boundary
// ---------------------------------------------------------------------------

/// Read and decode one record file.
pub fn read_record(path: &Path) -> Result<DecodedRecord> {
    let bytes =
        fs::read(path).with_context(|| format!("reading record {}", path.display()))?;
    let record =
        decode(&bytes).with_context(|| format!("decoding {}", path.display()))?;
    Ok(record)
}

/// Write a record in reflectance format, appending the conventional `.ref`
/// suffix when the path does not already carry it.  Returns the path
/// actually written.
pub fn write_record(path: &Path, header: &Header, curve: &SpectralCurve) -> Result<PathBuf> {
    let path = ensure_suffix(path, "ref");
    fs::write(&path, encode(header, curve))
        .with_context(|| format!("writing record {}", path.display()))?;
    Ok(path)
}

/// Export a curve as CSV: a label header row, then one `(wavelength_nm,
/// value)` row per band.  Appends `.csv` when absent.
pub fn write_csv(path: &Path, label: &str, curve: &SpectralCurve) -> Result<PathBuf> {
    let path = ensure_suffix(path, "csv");
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("creating CSV {}", path.display()))?;
    writer.write_record(["wavelength_nm", label])?;
    for (i, v) in curve.samples().iter().enumerate() {
        writer.write_record([(WAVELENGTH_START + i).to_string(), v.to_string()])?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing CSV {}", path.display()))?;
    Ok(path)
}

fn ensure_suffix(path: &Path, ext: &str) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(e) if e.eq_ignore_ascii_case(ext) => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".");
            name.push(ext);
            PathBuf::from(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterned_header() -> [u8; HEADER_LEN] {
        // Deliberately does not start with the magic tag (0, 1, 2).
        let mut head = [0u8; HEADER_LEN];
        for (i, b) in head.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        head
    }

    fn reflectance_record(samples: &[f64]) -> Vec<u8> {
        let mut head = patterned_header();
        head[..3].copy_from_slice(MAGIC);
        encode(
            &Header(head),
            &SpectralCurve::from_samples(samples.to_vec()),
        )
    }

    /// Build a raw dual-channel record whose denominator block sits at the
    /// given candidate offset past the calibration gap; the slack bytes
    /// before the block are zero.
    fn dual_channel_record(numerator: f64, denom_word: [u8; 8], offset: usize) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&patterned_header());
        for _ in 0..SAMPLE_COUNT {
            bytes.extend_from_slice(&numerator.to_le_bytes());
        }
        bytes.extend_from_slice(&[0u8; CALIBRATION_GAP]);
        bytes.extend(std::iter::repeat(0u8).take(offset));
        for _ in 0..SAMPLE_COUNT {
            bytes.extend_from_slice(&denom_word);
        }
        bytes
    }

    #[test]
    fn reflectance_round_trip() {
        let samples: Vec<f64> = (0..SAMPLE_COUNT).map(|i| i as f64 * 1e-4).collect();
        let record = decode(&reflectance_record(&samples)).unwrap();
        assert!(record.warning.is_none());
        for (i, &v) in record.curve.samples().iter().enumerate() {
            // Values survive the f32 narrowing exactly once.
            assert_eq!(v, (samples[i] as f32) as f64, "band {i}");
        }
    }

    #[test]
    fn reflectance_header_is_untouched() {
        let samples = vec![0.5; SAMPLE_COUNT];
        let bytes = reflectance_record(&samples);
        let record = decode(&bytes).unwrap();
        assert_eq!(&record.header.0[..], &bytes[..HEADER_LEN]);
    }

    #[test]
    fn truncated_record_rejected() {
        match decode(&[0u8; 100]) {
            Err(FormatError::Truncated { need, got }) => {
                assert_eq!(need, HEADER_LEN);
                assert_eq!(got, 100);
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[test]
    fn wrong_payload_length_rejected() {
        let mut bytes = reflectance_record(&vec![0.5; SAMPLE_COUNT]);
        bytes.pop();
        match decode(&bytes) {
            Err(FormatError::PayloadLength { expected, got }) => {
                assert_eq!(expected, FLOAT_BLOCK_LEN);
                assert_eq!(got, FLOAT_BLOCK_LEN - 1);
            }
            other => panic!("expected PayloadLength, got {other:?}"),
        }
    }

    #[test]
    fn dual_channel_header_rewrite() {
        let bytes = dual_channel_record(81.0, 40.5f64.to_le_bytes(), 1);
        let record = decode(&bytes).unwrap();
        assert!(record.warning.is_none());

        let expected = patterned_header();
        assert_eq!(&record.header.0[..3], MAGIC);
        assert_eq!(record.header.0[DATA_TYPE_OFFSET], DATA_TYPE_REFLECTANCE);
        assert_eq!(record.header.0[AUX_FLAG_OFFSET], 0);
        for i in 0..HEADER_LEN {
            if i < 3 || i == DATA_TYPE_OFFSET || i == AUX_FLAG_OFFSET {
                continue;
            }
            assert_eq!(record.header.0[i], expected[i], "header byte {i}");
        }
        for &v in record.curve.samples() {
            assert_eq!(v, 2.0);
        }
    }

    #[test]
    fn denominator_found_at_offset_seven_only() {
        // Denominator word chosen so that every 1..=6 byte misalignment
        // decodes to magnitudes far above the channel bound: any rotation
        // of the byte pattern puts a 0x44 byte in the exponent position.
        let word = [0x00, 0x44, 0x44, 0x44, 0x44, 0x44, 0x44, 0x40];
        let denom = f64::from_le_bytes(word);
        assert!(denom > 0.0 && denom < 1e10);

        let bytes = dual_channel_record(denom * 2.0, word, 7);
        let record = decode(&bytes).unwrap();
        assert!(record.warning.is_none());
        for &v in record.curve.samples() {
            assert_eq!(v, 2.0);
        }
    }

    #[test]
    fn scan_exhaustion_falls_back_to_last_candidate() {
        // All-zero denominator region: no candidate satisfies the bound,
        // the decoder keeps the 29th candidate and divides by zero.
        let bytes = dual_channel_record(81.0, [0u8; 8], SCAN_OFFSETS);
        let record = decode(&bytes).unwrap();
        assert_eq!(record.warning, Some(DecodeWarning::ScanExhausted));
        for &v in record.curve.samples() {
            assert!(v.is_infinite() && v > 0.0);
        }
    }

    #[test]
    fn dual_channel_truncation_rejected() {
        let mut bytes = dual_channel_record(81.0, 40.5f64.to_le_bytes(), 1);
        bytes.truncate(HEADER_LEN + DOUBLE_BLOCK_LEN);
        assert!(matches!(
            decode(&bytes),
            Err(FormatError::Truncated { .. })
        ));
    }

    #[test]
    fn suffix_appended_once() {
        assert_eq!(
            ensure_suffix(Path::new("/tmp/a/sample001"), "ref"),
            PathBuf::from("/tmp/a/sample001.ref")
        );
        assert_eq!(
            ensure_suffix(Path::new("/tmp/a/sample001.ref"), "ref"),
            PathBuf::from("/tmp/a/sample001.ref")
        );
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let samples = vec![0.25; SAMPLE_COUNT];
        let curve = SpectralCurve::from_samples(samples);
        let mut head = patterned_header();
        head[..3].copy_from_slice(MAGIC);

        let written = write_record(&dir.path().join("sample001"), &Header(head), &curve).unwrap();
        assert_eq!(written.extension().unwrap(), "ref");

        let record = read_record(&written).unwrap();
        assert_eq!(record.curve, curve);
    }

    #[test]
    fn csv_export_shape() {
        let dir = tempfile::tempdir().unwrap();
        let curve = SpectralCurve::from_samples(vec![0.5; SAMPLE_COUNT]);
        let path = write_csv(&dir.path().join("sample001"), "sample001", &curve).unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("wavelength_nm,sample001"));
        assert_eq!(lines.next(), Some("350,0.5"));
        assert_eq!(text.lines().count(), SAMPLE_COUNT + 1);
        assert_eq!(text.lines().last(), Some("2500,0.5"));
    }
}
