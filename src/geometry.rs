/*!
# Diffraction geometry

[Geometry] keeps the energy, the propagation distance, the frame shape and the pixel sizes of
the sample and detector planes consistent with each other, and owns the [Propagator] built from them.

At least one of the two pixel sizes is fixed, the other one is derived from the Fourier relation
between the two planes. If both are fixed, the frame size consistent with both is generally not the
nominal frame size and the difference, the misfit, is absorbed by cropping or padding the frame in the
far-field propagator.

```no_run
use diffraction_geometry::{Geometry, GeometryConfig, Propagate};
use ndarray::Array2;
use rustfft::num_complex::Complex;

let mut geometry = Geometry::<f64>::new(GeometryConfig::default().shape(128))?;
geometry.set_energy(10.)?;
let exit_wave = Array2::from_elem((128, 128), Complex::new(1., 0.));
let diffraction = geometry.propagator()?.forward(exit_wave.view())?;
# Ok::<(), diffraction_geometry::Error>(())
```
*/

use std::fmt;

use nalgebra::Vector2;
use rustfft::{num_traits::Float, FftNum};

use crate::{Backend, Origin, Propagate, Propagator, KEV2M};

mod parameters;
pub use parameters::{
    Broadcast, GeometryConfig, GeometryParameters, PropagationType, Resolution,
};
use parameters::{frame_shape, nonzero_distance, origin, pixel_size, positive};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("propagation distance must be set and non-zero, found {0:?}")]
    Distance(Option<f64>),
    #[error("frame shape must be set with non-zero entries, found {0:?}")]
    Shape(Option<Broadcast<usize>>),
    #[error("wavelength and energy must not both be unset")]
    Spectrum,
    #[error("sample and detector pixel sizes must not both be unset")]
    PixelSize,
    #[error("{0} must be finite and positive, found {1}")]
    InvalidValue(&'static str, f64),
    #[error("{0} offset must be finite, found {1}")]
    Origin(&'static str, Origin),
}

type Result<T> = std::result::Result<T, crate::Error>;

/// Geometry manager
///
/// Every setter validates its input, updates the parameters, reconciles the pixel sizes and
/// recomputes the propagator. If any of these steps fails, the geometry is left unchanged.
/// `T` is the floating point precision of the propagator arrays.
#[derive(Debug, Clone)]
pub struct Geometry<T: FftNum + Float = f64> {
    params: GeometryParameters,
    propagator: Propagator<T>,
    backend: Backend<T>,
    stale: bool,
    /// parameters the propagator was last built from
    built: GeometryParameters,
}
impl<T: FftNum + Float> Geometry<T> {
    /// Creates a new geometry from the configuration, with the default transform backend
    pub fn new(config: GeometryConfig) -> Result<Self> {
        Self::with_backend(config, Backend::default())
    }
    /// Creates a new geometry from the configuration
    pub fn with_backend(config: GeometryConfig, backend: Backend<T>) -> Result<Self> {
        let params = GeometryParameters::try_from(config)?.reconciled();
        let propagator = Propagator::with_backend(&params, backend.clone())?;
        Ok(Self {
            params: params.clone(),
            propagator,
            backend,
            stale: false,
            built: params,
        })
    }
    /// Resolves the free pixel size or the misfit
    ///
    /// The propagator is recomputed if `push_to_propagator` is true,
    /// otherwise it is recomputed the next time it is requested.
    pub fn reconcile(&mut self, push_to_propagator: bool) -> Result<()> {
        self.params = self.params.clone().reconciled();
        if push_to_propagator {
            self.refresh()
        } else {
            self.stale = true;
            Ok(())
        }
    }
    fn refresh(&mut self) -> Result<()> {
        if self.propagator.propagation() == self.params.propagation {
            self.propagator.update(&self.params)?;
        } else {
            log::debug!(
                "switching from {} to {} propagation",
                self.propagator.propagation(),
                self.params.propagation
            );
            self.propagator = Propagator::with_backend(&self.params, self.backend.clone())?;
        }
        self.stale = false;
        self.built = self.params.clone();
        Ok(())
    }
    /// Applies a change to the parameters and reconciles, restoring the parameters on failure
    fn mutate(&mut self, change: impl FnOnce(&mut GeometryParameters)) -> Result<()> {
        let previous = self.params.clone();
        change(&mut self.params);
        let result = self.reconcile(true);
        if result.is_err() {
            self.params = previous;
        }
        result
    }
    /// Returns the propagator, recomputing it first if it is out of date
    ///
    /// If the recomputation fails, the parameters revert to the ones of the current propagator.
    pub fn propagator(&mut self) -> Result<&Propagator<T>> {
        if self.stale {
            if let Err(e) = self.refresh() {
                self.params = self.built.clone();
                self.stale = false;
                return Err(e);
            }
        }
        Ok(&self.propagator)
    }
    /// Returns true if the propagator has not been recomputed since the last change
    pub fn is_stale(&self) -> bool {
        self.stale
    }
    /// Replaces the transform backend and rebuilds the propagator
    pub fn set_backend(&mut self, backend: Backend<T>) -> Result<()> {
        self.propagator = Propagator::with_backend(&self.params, backend.clone())?;
        self.backend = backend;
        self.stale = false;
        self.built = self.params.clone();
        Ok(())
    }
    pub fn parameters(&self) -> &GeometryParameters {
        &self.params
    }
    /// Photon energy [keV]
    pub fn energy(&self) -> f64 {
        self.params.energy
    }
    /// Sets the photon energy [keV] and the wavelength
    pub fn set_energy(&mut self, energy: f64) -> Result<()> {
        let energy = positive("energy", energy)?;
        self.mutate(|p| {
            p.energy = energy;
            p.wavelength = KEV2M / energy;
        })
    }
    /// Wavelength [m]
    pub fn wavelength(&self) -> f64 {
        self.params.wavelength
    }
    /// Sets the wavelength [m] and the photon energy
    pub fn set_wavelength(&mut self, wavelength: f64) -> Result<()> {
        let wavelength = positive("wavelength", wavelength)?;
        self.mutate(|p| {
            p.wavelength = wavelength;
            p.energy = KEV2M / wavelength;
        })
    }
    /// Propagation distance [m]
    pub fn distance(&self) -> f64 {
        self.params.distance
    }
    pub fn set_distance(&mut self, distance: f64) -> Result<()> {
        let distance = nonzero_distance(distance)?;
        self.mutate(|p| p.distance = distance)
    }
    /// Wavelength times distance [m^2]
    pub fn lz(&self) -> f64 {
        self.params.lz()
    }
    /// Sample plane pixel size [m]
    pub fn psize_sam(&self) -> Vector2<f64> {
        self.params.psize_sam
    }
    /// Sets the sample plane pixel size [m]
    ///
    /// Unless the sample pixel size is fixed, the value is overwritten by the reconciliation.
    pub fn set_psize_sam(&mut self, psize: impl Into<Broadcast<f64>>) -> Result<()> {
        let psize = pixel_size("psize_sam", psize.into())?;
        self.mutate(|p| p.psize_sam = psize)
    }
    /// Detector plane pixel size [m]
    pub fn psize_det(&self) -> Vector2<f64> {
        self.params.psize_det
    }
    /// Sets the detector plane pixel size [m]
    ///
    /// Unless the detector pixel size is fixed, the value is overwritten by the reconciliation.
    pub fn set_psize_det(&mut self, psize: impl Into<Broadcast<f64>>) -> Result<()> {
        let psize = pixel_size("psize_det", psize.into())?;
        self.mutate(|p| p.psize_det = psize)
    }
    /// Marks the sample pixel size as fixed or free
    pub fn fix_psize_sam(&mut self, fixed: bool) -> Result<()> {
        self.mutate(|p| p.psize_sam_fixed = fixed)
    }
    /// Marks the detector pixel size as fixed or free
    pub fn fix_psize_det(&mut self, fixed: bool) -> Result<()> {
        self.mutate(|p| p.psize_det_fixed = fixed)
    }
    /// Frame size [px]
    pub fn shape(&self) -> Vector2<usize> {
        self.params.shape
    }
    pub fn set_shape(&mut self, shape: impl Into<Broadcast<usize>>) -> Result<()> {
        let shape = frame_shape(shape.into())?;
        self.mutate(|p| p.shape = shape)
    }
    /// Frame misfit [px]
    pub fn misfit(&self) -> Vector2<f64> {
        self.params.misfit
    }
    pub fn propagation(&self) -> PropagationType {
        self.params.propagation
    }
    /// Sets the propagation type, replacing the propagator if the type changes
    pub fn set_propagation(&mut self, propagation: PropagationType) -> Result<()> {
        self.mutate(|p| p.propagation = propagation)
    }
    pub fn origin_sam(&self) -> Origin {
        self.params.origin_sam
    }
    pub fn set_origin_sam(&mut self, value: Origin) -> Result<()> {
        let origin = origin("origin_sam", value)?;
        self.mutate(|p| p.origin_sam = origin)
    }
    pub fn origin_det(&self) -> Origin {
        self.params.origin_det
    }
    pub fn set_origin_det(&mut self, value: Origin) -> Result<()> {
        let origin = origin("origin_det", value)?;
        self.mutate(|p| p.origin_det = origin)
    }
}
impl<T: FftNum + Float> fmt::Display for Geometry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.params, f)
    }
}
