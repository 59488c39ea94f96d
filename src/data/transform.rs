use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use super::model::{SpectralCurve, SAMPLE_COUNT};
use super::record::{read_record, write_record};

// ---------------------------------------------------------------------------
// Water-absorption band removal
// ---------------------------------------------------------------------------

/// Water-absorption exclusion zones, as band index ranges:
/// 1350–1460 nm, 1800–1970 nm and 2339–2500 nm.
pub const WATER_BANDS: [(usize, usize); 3] = [(1000, 1110), (1450, 1620), (1989, SAMPLE_COUNT)];

/// Blank out the water-absorption bands of a curve with the NaN sentinel.
pub fn strip_water_bands(curve: &mut SpectralCurve) {
    let samples = curve.samples_mut();
    for &(start, end) in &WATER_BANDS {
        for v in &mut samples[start..end] {
            *v = f64::NAN;
        }
    }
}

/// Batch variant: decode every record in `input_dir`, blank its water
/// bands and write it in reflectance format into `output_dir`.  Returns
/// the number of records written.
pub fn strip_water_dir(input_dir: &Path, output_dir: &Path) -> Result<usize> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let mut entries: Vec<_> = fs::read_dir(input_dir)
        .with_context(|| format!("listing {}", input_dir.display()))?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .collect();
    entries.sort_by_key(|e| e.file_name());

    let mut written = 0;
    for entry in entries {
        let mut record = read_record(&entry.path())?;
        strip_water_bands(&mut record.curve);
        write_record(
            &output_dir.join(entry.file_name()),
            &record.header,
            &record.curve,
        )?;
        written += 1;
    }
    Ok(written)
}
