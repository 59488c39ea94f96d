use std::fmt;

// ---------------------------------------------------------------------------
// Fixed format geometry
// ---------------------------------------------------------------------------

/// Size of the instrument header blob, in bytes.
pub const HEADER_LEN: usize = 484;

/// Number of spectral bands: 350–2500 nm at a 1 nm step.
pub const SAMPLE_COUNT: usize = 2151;

/// Wavelength of band 0, in nanometres.
pub const WAVELENGTH_START: usize = 350;

// ---------------------------------------------------------------------------
// Header – opaque instrument header blob
// ---------------------------------------------------------------------------

/// The 484-byte instrument header.  Treated as opaque apart from the three
/// bytes the decoder rewrites when converting a raw dual-channel record to
/// reflectance mode (see [`crate::data::record`]).
#[derive(Clone, PartialEq, Eq)]
pub struct Header(pub [u8; HEADER_LEN]);

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Header({:02x?}…)", &self.0[..8])
    }
}

// ---------------------------------------------------------------------------
// SpectralCurve – one reflectance spectrum
// ---------------------------------------------------------------------------

/// A single reflectance spectrum: exactly [`SAMPLE_COUNT`] samples, where
/// index `i` corresponds to wavelength `350 + i` nm.  NaN marks a band that
/// has been blanked out (e.g. a water-absorption band).
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralCurve {
    samples: Vec<f64>,
}

impl SpectralCurve {
    /// Wrap a sample vector.  The length invariant is enforced here so the
    /// rest of the crate can index freely.
    pub fn from_samples(samples: Vec<f64>) -> Self {
        assert_eq!(
            samples.len(),
            SAMPLE_COUNT,
            "a spectral curve must have exactly {SAMPLE_COUNT} samples"
        );
        SpectralCurve { samples }
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f64] {
        &mut self.samples
    }

    /// Wavelength (nm) of sample index `i`.
    pub fn wavelength(i: usize) -> usize {
        WAVELENGTH_START + i
    }
}

/// Band-wise arithmetic mean of a set of curves.  Used to build the
/// representative spectrum of a converged replicate group.
///
/// Panics when `curves` is empty; callers always pass the retained subset
/// of a group, which is never empty.
pub fn mean_curve(curves: &[&SpectralCurve]) -> SpectralCurve {
    assert!(!curves.is_empty(), "cannot average zero curves");
    let n = curves.len() as f64;
    let samples = (0..SAMPLE_COUNT)
        .map(|i| curves.iter().map(|c| c.samples[i]).sum::<f64>() / n)
        .collect();
    SpectralCurve::from_samples(samples)
}
