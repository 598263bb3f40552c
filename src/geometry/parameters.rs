use std::fmt;

use nalgebra::{Scalar, Vector2};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use super::ConfigError;
use crate::{Origin, KEV2M};

/// A scalar broadcast to both axes or a (row,column) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Broadcast<T> {
    Scalar(T),
    Pair([T; 2]),
}
impl<T: Scalar + Copy> Broadcast<T> {
    /// Returns the (row,column) vector
    pub fn expect2(self) -> Vector2<T> {
        match self {
            Broadcast::Scalar(value) => Vector2::new(value, value),
            Broadcast::Pair([row, col]) => Vector2::new(row, col),
        }
    }
}
impl From<f64> for Broadcast<f64> {
    fn from(value: f64) -> Self {
        Broadcast::Scalar(value)
    }
}
impl From<[f64; 2]> for Broadcast<f64> {
    fn from(value: [f64; 2]) -> Self {
        Broadcast::Pair(value)
    }
}
impl From<usize> for Broadcast<usize> {
    fn from(value: usize) -> Self {
        Broadcast::Scalar(value)
    }
}
impl From<[usize; 2]> for Broadcast<usize> {
    fn from(value: [usize; 2]) -> Self {
        Broadcast::Pair(value)
    }
}

/// Diffraction regime
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PropagationType {
    /// single Fourier transform with quadratic phase factors
    #[default]
    Farfield,
    /// angular spectrum transfer function
    Nearfield,
}

/// Geometry configuration
///
/// The default is a 7.2keV beam, a 2.19m propagation distance and a 220x220 frame
/// of 172μm detector pixels, with the sample pixel size left free.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// photon energy [keV]
    pub energy: Option<f64>,
    /// wavelength [m]
    pub wavelength: Option<f64>,
    /// sample to detector distance [m]
    pub distance: Option<f64>,
    /// detector plane pixel size [m]
    pub psize_det: Option<Broadcast<f64>>,
    /// sample plane pixel size [m]
    pub psize_sam: Option<Broadcast<f64>>,
    /// frame size [px]
    pub shape: Option<Broadcast<usize>>,
    pub propagation: PropagationType,
    pub origin_sam: Origin,
    pub origin_det: Origin,
}
impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            energy: Some(7.2),
            wavelength: None,
            distance: Some(2.19),
            psize_det: Some(Broadcast::Scalar(172e-6)),
            psize_sam: None,
            shape: Some(Broadcast::Scalar(220)),
            propagation: PropagationType::Farfield,
            origin_sam: Origin::Center,
            origin_det: Origin::Center,
        }
    }
}
impl GeometryConfig {
    pub fn energy(self, value: f64) -> Self {
        Self {
            energy: Some(value),
            ..self
        }
    }
    pub fn without_energy(self) -> Self {
        Self {
            energy: None,
            ..self
        }
    }
    pub fn wavelength(self, value: f64) -> Self {
        Self {
            wavelength: Some(value),
            ..self
        }
    }
    pub fn distance(self, value: f64) -> Self {
        Self {
            distance: Some(value),
            ..self
        }
    }
    pub fn psize_det(self, value: impl Into<Broadcast<f64>>) -> Self {
        Self {
            psize_det: Some(value.into()),
            ..self
        }
    }
    pub fn without_psize_det(self) -> Self {
        Self {
            psize_det: None,
            ..self
        }
    }
    pub fn psize_sam(self, value: impl Into<Broadcast<f64>>) -> Self {
        Self {
            psize_sam: Some(value.into()),
            ..self
        }
    }
    pub fn shape(self, value: impl Into<Broadcast<usize>>) -> Self {
        Self {
            shape: Some(value.into()),
            ..self
        }
    }
    pub fn propagation(self, propagation: PropagationType) -> Self {
        Self {
            propagation,
            ..self
        }
    }
    pub fn origin_sam(self, origin_sam: Origin) -> Self {
        Self { origin_sam, ..self }
    }
    pub fn origin_det(self, origin_det: Origin) -> Self {
        Self { origin_det, ..self }
    }
}

pub(crate) fn positive(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0f64 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue(name, value))
    }
}
pub(crate) fn nonzero_distance(value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value != 0f64 {
        Ok(value)
    } else {
        Err(ConfigError::Distance(Some(value)))
    }
}
pub(crate) fn origin(name: &'static str, value: Origin) -> Result<Origin, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::Origin(name, value))
    }
}
pub(crate) fn pixel_size(
    name: &'static str,
    value: Broadcast<f64>,
) -> Result<Vector2<f64>, ConfigError> {
    let psize = value.expect2();
    for &p in psize.iter() {
        positive(name, p)?;
    }
    Ok(psize)
}
pub(crate) fn frame_shape(value: Broadcast<usize>) -> Result<Vector2<usize>, ConfigError> {
    let shape = value.expect2();
    if shape.iter().any(|&n| n == 0) {
        Err(ConfigError::Shape(Some(value)))
    } else {
        Ok(shape)
    }
}

/// Pixel sizes and frame misfit consistent with a diffraction regime
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub psize_sam: Vector2<f64>,
    pub psize_det: Vector2<f64>,
    pub misfit: Vector2<f64>,
}

/// Validated geometry parameters
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryParameters {
    pub(crate) energy: f64,
    pub(crate) wavelength: f64,
    pub(crate) distance: f64,
    pub(crate) shape: Vector2<usize>,
    pub(crate) psize_sam: Vector2<f64>,
    pub(crate) psize_det: Vector2<f64>,
    pub(crate) psize_sam_fixed: bool,
    pub(crate) psize_det_fixed: bool,
    pub(crate) propagation: PropagationType,
    pub(crate) origin_sam: Origin,
    pub(crate) origin_det: Origin,
    pub(crate) misfit: Vector2<f64>,
}
impl TryFrom<GeometryConfig> for GeometryParameters {
    type Error = ConfigError;

    /// Validates the configuration
    ///
    /// Unset pixel sizes get a placeholder of 1 until [GeometryParameters::reconciled] resolves them.
    fn try_from(config: GeometryConfig) -> Result<Self, Self::Error> {
        let distance = nonzero_distance(config.distance.ok_or(ConfigError::Distance(None))?)?;
        let shape = frame_shape(config.shape.ok_or(ConfigError::Shape(None))?)?;
        let (energy, wavelength) = match (config.energy, config.wavelength) {
            (Some(energy), wavelength) => {
                if wavelength.is_some() {
                    log::debug!("energy and wavelength are both set, energy takes precedence");
                }
                let energy = positive("energy", energy)?;
                (energy, KEV2M / energy)
            }
            (None, Some(wavelength)) => {
                let wavelength = positive("wavelength", wavelength)?;
                (KEV2M / wavelength, wavelength)
            }
            (None, None) => return Err(ConfigError::Spectrum),
        };
        if config.psize_sam.is_none() && config.psize_det.is_none() {
            return Err(ConfigError::PixelSize);
        }
        let psize_sam = config
            .psize_sam
            .map(|value| pixel_size("psize_sam", value))
            .transpose()?;
        let psize_det = config
            .psize_det
            .map(|value| pixel_size("psize_det", value))
            .transpose()?;
        let origin_sam = origin("origin_sam", config.origin_sam)?;
        let origin_det = origin("origin_det", config.origin_det)?;
        Ok(Self {
            energy,
            wavelength,
            distance,
            shape,
            psize_sam_fixed: psize_sam.is_some(),
            psize_det_fixed: psize_det.is_some(),
            psize_sam: psize_sam.unwrap_or_else(|| Vector2::repeat(1f64)),
            psize_det: psize_det.unwrap_or_else(|| Vector2::repeat(1f64)),
            propagation: config.propagation,
            origin_sam,
            origin_det,
            misfit: Vector2::zeros(),
        })
    }
}
impl GeometryParameters {
    /// Photon energy [keV]
    pub fn energy(&self) -> f64 {
        self.energy
    }
    /// Wavelength [m]
    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }
    /// Propagation distance [m]
    pub fn distance(&self) -> f64 {
        self.distance
    }
    /// Wavelength times distance [m^2]
    pub fn lz(&self) -> f64 {
        self.wavelength * self.distance
    }
    /// Frame size [px]
    pub fn shape(&self) -> Vector2<usize> {
        self.shape
    }
    pub(crate) fn frame(&self) -> [usize; 2] {
        [self.shape[0], self.shape[1]]
    }
    pub fn psize_sam(&self) -> Vector2<f64> {
        self.psize_sam
    }
    pub fn psize_det(&self) -> Vector2<f64> {
        self.psize_det
    }
    pub fn psize_sam_fixed(&self) -> bool {
        self.psize_sam_fixed
    }
    pub fn psize_det_fixed(&self) -> bool {
        self.psize_det_fixed
    }
    pub fn propagation(&self) -> PropagationType {
        self.propagation
    }
    pub fn origin_sam(&self) -> Origin {
        self.origin_sam
    }
    pub fn origin_det(&self) -> Origin {
        self.origin_det
    }
    /// Difference between the frame size matching both pixel sizes and the nominal frame size [px]
    pub fn misfit(&self) -> Vector2<f64> {
        self.misfit
    }
    /// Far-field pixel sizes and misfit
    ///
    /// The free pixel size is given by `λz/(psize N)` from the fixed one.
    /// If both are fixed, the misfit is `λz/(psize_sam psize_det) - N`.
    /// If neither is, the detector pixel size is used as the fixed one.
    pub fn farfield_resolution(&self) -> Resolution {
        let lz = self.lz();
        let n = self.shape.map(|n| n as f64);
        match (self.psize_sam_fixed, self.psize_det_fixed) {
            (true, true) => Resolution {
                psize_sam: self.psize_sam,
                psize_det: self.psize_det,
                misfit: self.psize_sam.component_mul(&self.psize_det).map(|p| lz / p) - n,
            },
            (true, false) => Resolution {
                psize_sam: self.psize_sam,
                psize_det: self.psize_sam.component_mul(&n).map(|p| lz / p),
                misfit: Vector2::zeros(),
            },
            (false, _) => Resolution {
                psize_sam: self.psize_det.component_mul(&n).map(|p| lz / p),
                psize_det: self.psize_det,
                misfit: Vector2::zeros(),
            },
        }
    }
    /// Near-field pixel sizes
    ///
    /// Both planes share the pixel size of the fixed one; if both are fixed they
    /// are left as they are and the misfit stays at zero.
    pub fn nearfield_resolution(&self) -> Resolution {
        match (self.psize_sam_fixed, self.psize_det_fixed) {
            (true, true) => Resolution {
                psize_sam: self.psize_sam,
                psize_det: self.psize_det,
                misfit: Vector2::zeros(),
            },
            (true, false) => Resolution {
                psize_sam: self.psize_sam,
                psize_det: self.psize_sam,
                misfit: Vector2::zeros(),
            },
            (false, _) => Resolution {
                psize_sam: self.psize_det,
                psize_det: self.psize_det,
                misfit: Vector2::zeros(),
            },
        }
    }
    /// Returns the parameters with the free pixel size or the misfit resolved
    pub fn reconciled(mut self) -> Self {
        if !self.psize_sam_fixed && !self.psize_det_fixed {
            log::info!("no pixel size is marked as fixed, fixing the detector pixel size");
            self.psize_det_fixed = true;
        }
        let Resolution {
            psize_sam,
            psize_det,
            misfit,
        } = match self.propagation {
            PropagationType::Farfield => self.farfield_resolution(),
            PropagationType::Nearfield => {
                if self.psize_sam_fixed && self.psize_det_fixed && self.psize_sam != self.psize_det
                {
                    log::info!(
                        "near-field pixel sizes differ, sample: {}, detector: {}",
                        pair(&self.psize_sam),
                        pair(&self.psize_det)
                    );
                }
                self.nearfield_resolution()
            }
        };
        self.psize_sam = psize_sam;
        self.psize_det = psize_det;
        self.misfit = misfit;
        self
    }
}

fn pair<T: fmt::LowerExp>(v: &Vector2<T>) -> String {
    format!("[{:e}, {:e}]", v[0], v[1])
}

impl fmt::Display for GeometryParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>25} : {}", "distance [m]", self.distance)?;
        writeln!(f, "{:>25} : {}", "energy [keV]", self.energy)?;
        writeln!(f, "{:>25} : {:e}", "wavelength [m]", self.wavelength)?;
        writeln!(f, "{:>25} : {}", "misfit [px]", pair(&self.misfit))?;
        writeln!(
            f,
            "{:>25} : [{}, {}]",
            "frame [px]", self.shape[0], self.shape[1]
        )?;
        writeln!(f, "{:>25} : {}", "origin_det", self.origin_det)?;
        writeln!(f, "{:>25} : {}", "origin_sam", self.origin_sam)?;
        writeln!(f, "{:>25} : {}", "propagation", self.propagation)?;
        writeln!(f, "{:>25} : {}", "psize_det [m]", pair(&self.psize_det))?;
        writeln!(f, "{:>25} : {}", "psize_det_fixed", self.psize_det_fixed)?;
        writeln!(f, "{:>25} : {}", "psize_sam [m]", pair(&self.psize_sam))?;
        writeln!(f, "{:>25} : {}", "psize_sam_fixed", self.psize_sam_fixed)
    }
}
