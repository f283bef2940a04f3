use crate::io::irradiance::IrradianceTable;
use crate::types::{ReflError, ReflResult, SpectralResponse};

/// Standard deviation of a Gaussian with the given FWHM
pub fn gaussian_sigma(fwhm: f64) -> f64 {
    fwhm / (2.0 * (2.0 * std::f64::consts::LN_2).sqrt())
}

impl SpectralResponse {
    /// Wavelength interval outside which the response is treated as zero
    pub fn support(&self) -> (f64, f64) {
        match self {
            SpectralResponse::Gaussian { center_nm, fwhm_nm } => {
                let half_width = 3.0 * gaussian_sigma(*fwhm_nm);
                (center_nm - half_width, center_nm + half_width)
            }
            SpectralResponse::Sampled { wavelengths_nm, .. } => {
                let first = wavelengths_nm.first().copied().unwrap_or(f64::NAN);
                let last = wavelengths_nm.last().copied().unwrap_or(f64::NAN);
                (first, last)
            }
        }
    }

    /// Relative response at a wavelength, zero outside the support
    pub fn weight_at(&self, wavelength_nm: f64) -> f64 {
        match self {
            SpectralResponse::Gaussian { center_nm, fwhm_nm } => {
                let (lo, hi) = self.support();
                if wavelength_nm < lo || wavelength_nm > hi {
                    return 0.0;
                }
                let z = (wavelength_nm - center_nm) / gaussian_sigma(*fwhm_nm);
                (-0.5 * z * z).exp()
            }
            SpectralResponse::Sampled { wavelengths_nm, weights } => {
                interpolate_linear(wavelengths_nm, weights, wavelength_nm).unwrap_or(0.0)
            }
        }
    }

    /// Response-weighted mean wavelength
    pub fn centroid(&self) -> f64 {
        match self {
            SpectralResponse::Gaussian { center_nm, .. } => *center_nm,
            SpectralResponse::Sampled { wavelengths_nm, weights } => {
                if wavelengths_nm.len() != weights.len() {
                    return f64::NAN;
                }
                let total: f64 = weights.iter().sum();
                if total > 0.0 {
                    wavelengths_nm.iter().zip(weights).map(|(w, s)| w * s).sum::<f64>() / total
                } else {
                    f64::NAN
                }
            }
        }
    }

    /// Reject responses that cannot be integrated
    pub fn validate(&self) -> ReflResult<()> {
        match self {
            SpectralResponse::Gaussian { center_nm, fwhm_nm } => {
                if !center_nm.is_finite() || !fwhm_nm.is_finite() || *fwhm_nm <= 0.0 {
                    return Err(ReflError::InvalidFormat(format!(
                        "Gaussian response needs a finite centre and positive FWHM, got {} / {}",
                        center_nm, fwhm_nm
                    )));
                }
            }
            SpectralResponse::Sampled { wavelengths_nm, weights } => {
                if wavelengths_nm.len() != weights.len() || wavelengths_nm.len() < 2 {
                    return Err(ReflError::InvalidFormat(format!(
                        "Sampled response needs at least two (wavelength, weight) pairs, got {} and {}",
                        wavelengths_nm.len(),
                        weights.len()
                    )));
                }
                if !is_strictly_increasing(wavelengths_nm) {
                    return Err(ReflError::InvalidFormat(
                        "Sampled response wavelengths must be strictly increasing".to_string(),
                    ));
                }
                if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                    return Err(ReflError::InvalidFormat(
                        "Sampled response weights must be finite and non-negative".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl IrradianceTable {
    /// Check the table can be used as a spectrum: non-empty, finite,
    /// wavelengths strictly increasing
    pub fn validate_spectral(&self) -> ReflResult<()> {
        if self.is_empty() {
            return Err(ReflError::InvalidFormat("Irradiance table is empty".to_string()));
        }
        if let Some(row) = self
            .wavelengths()
            .iter()
            .zip(self.irradiances())
            .position(|(w, e)| !w.is_finite() || !e.is_finite())
        {
            return Err(ReflError::InvalidFormat(format!(
                "Non-finite value in irradiance table at row {}",
                row
            )));
        }
        if !is_strictly_increasing(self.wavelengths()) {
            return Err(ReflError::InvalidFormat(
                "Irradiance table wavelengths are not strictly increasing".to_string(),
            ));
        }
        Ok(())
    }

    /// (first, last) wavelength
    pub fn wavelength_range(&self) -> Option<(f64, f64)> {
        match (self.wavelengths().first(), self.wavelengths().last()) {
            (Some(&first), Some(&last)) => Some((first, last)),
            _ => None,
        }
    }

    /// Irradiance at a wavelength by linear interpolation between table rows
    pub fn irradiance_at(&self, wavelength_nm: f64) -> ReflResult<f64> {
        let (first, last) = self
            .wavelength_range()
            .ok_or_else(|| ReflError::Processing("Irradiance table is empty".to_string()))?;

        interpolate_linear(self.wavelengths(), self.irradiances(), wavelength_nm).ok_or_else(|| {
            ReflError::Processing(format!(
                "Wavelength {} nm outside table range [{}, {}] nm",
                wavelength_nm, first, last
            ))
        })
    }

    /// Band solar irradiance E0: ∫E(λ)S(λ)dλ / ∫S(λ)dλ on the table grid
    pub fn band_irradiance(&self, response: &SpectralResponse) -> ReflResult<f64> {
        response.validate()?;

        let (lo, hi) = response.support();
        let wavelengths = self.wavelengths();
        let irradiances = self.irradiances();
        let start = wavelengths.partition_point(|&w| w < lo);
        let end = wavelengths.partition_point(|&w| w <= hi);

        if end.saturating_sub(start) < 2 {
            // Response narrower than the table spacing
            let centroid = response.centroid();
            log::debug!(
                "Response support [{:.2}, {:.2}] nm spans fewer than two table rows, sampling at {:.2} nm",
                lo, hi, centroid
            );
            return self.irradiance_at(centroid);
        }

        let mut weighted = 0.0;
        let mut total = 0.0;
        for i in start..end - 1 {
            let dx = wavelengths[i + 1] - wavelengths[i];
            let s0 = response.weight_at(wavelengths[i]);
            let s1 = response.weight_at(wavelengths[i + 1]);
            weighted += 0.5 * (irradiances[i] * s0 + irradiances[i + 1] * s1) * dx;
            total += 0.5 * (s0 + s1) * dx;
        }

        if total <= 0.0 {
            return Err(ReflError::Processing(format!(
                "Spectral response has no weight inside table range [{:.2}, {:.2}] nm",
                lo, hi
            )));
        }
        Ok(weighted / total)
    }
}

fn is_strictly_increasing(values: &[f64]) -> bool {
    values.windows(2).all(|pair| pair[0] < pair[1])
}

/// Linear interpolation on a sorted grid, None outside it or for ragged columns
fn interpolate_linear(xs: &[f64], ys: &[f64], x: f64) -> Option<f64> {
    if xs.len() != ys.len() {
        return None;
    }
    let (&first, &last) = (xs.first()?, xs.last()?);
    if !(x >= first && x <= last) {
        return None;
    }

    // First index with xs[idx] >= x
    let idx = xs.partition_point(|&v| v < x);
    if xs[idx] == x {
        return Some(ys[idx]);
    }

    let (x0, x1) = (xs[idx - 1], xs[idx]);
    let weight = (x - x0) / (x1 - x0);
    Some(ys[idx - 1] * (1.0 - weight) + ys[idx] * weight)
}
