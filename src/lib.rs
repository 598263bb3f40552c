/*!
# Diffraction geometry

Geometry of a coherent diffraction imaging experiment and wavefront propagation
between the sample plane and the detector plane.

- [Geometry]: geometry manager reconciling the energy, the distance, the frame shape and the pixel sizes
- [Farfield]: Fresnel/Fraunhofer propagator
- [Nearfield]: angular spectrum propagator
- [grids]: sample, detector and frequency plane coordinates
*/

pub mod error;
pub mod geometry;
pub mod grids;
pub mod propagator;

pub use error::Error;
pub use geometry::{
    Broadcast, ConfigError, Geometry, GeometryConfig, GeometryParameters, PropagationType,
    Resolution,
};
pub use grids::{grids, Origin, OriginError};
pub use propagator::{
    crop_pad, Backend, Farfield, Nearfield, Propagate, Propagator, PropagatorError, RustFft,
    Scaling, Transform2,
};

/// Photon energy [keV] to wavelength [m] conversion constant: `λ = KEV2M / energy`
pub const KEV2M: f64 = 1.240597288e-9;
