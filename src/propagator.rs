/*!
# Wavefront propagators

Propagation of complex wavefronts between the sample and the detector planes.

- [Farfield]: single transform Fresnel/Fraunhofer propagation with quadratic phase factors
- [Nearfield]: two transforms angular spectrum propagation

Both are entirely derived from [GeometryParameters] and are rebuilt from scratch
with [Propagate::update] whenever the geometry changes.
*/

use ndarray::{Array2, ArrayView2};
use rustfft::{
    num_complex::Complex,
    num_traits::{Float, NumCast},
    FftNum,
};

use crate::{GeometryParameters, PropagationType};

pub mod farfield;
mod fft;
pub mod nearfield;
pub use farfield::Farfield;
pub use fft::{crop_pad, Backend, RustFft, Scaling, Transform2};
pub use nearfield::Nearfield;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PropagatorError {
    #[error(
        "wavefront shape {found:?} matches neither the frame shape {frame:?} nor the working shape {working:?}"
    )]
    Shape {
        found: [usize; 2],
        frame: [usize; 2],
        working: [usize; 2],
    },
    #[error("frame misfit {misfit:?} leaves no working array for the frame shape {frame:?}")]
    WorkingShape { misfit: [f64; 2], frame: [usize; 2] },
}
pub type Result<T> = std::result::Result<T, PropagatorError>;

/// Casts a `f64` into the propagator precision, NaN if not representable
pub(crate) fn cast<T: Float>(value: f64) -> T {
    <T as NumCast>::from(value).unwrap_or_else(T::nan)
}
/// `exp(i phase)`
pub(crate) fn phasor<T: Float>(phase: f64) -> Complex<T> {
    Complex::new(cast(phase.cos()), cast(phase.sin()))
}
/// Elementwise product with a factor and a scale
pub(crate) fn multiply<T: FftNum + Float>(
    wavefront: &mut Array2<Complex<T>>,
    factor: &Array2<Complex<T>>,
    scale: T,
) {
    ndarray::Zip::from(wavefront)
        .and(factor)
        .for_each(|w, &f| *w = *w * f * scale);
}

/// Wavefront propagation interface
pub trait Propagate<T> {
    /// Recomputes all the cached grids and factors from the geometry parameters
    fn update(&mut self, params: &GeometryParameters) -> Result<()>;
    /// Propagates a wavefront from the sample plane to the detector plane
    fn forward(&self, wavefront: ArrayView2<Complex<T>>) -> Result<Array2<Complex<T>>>;
    /// Propagates a wavefront from the detector plane to the sample plane
    fn backward(&self, wavefront: ArrayView2<Complex<T>>) -> Result<Array2<Complex<T>>>;
    /// Working array shape
    fn shape(&self) -> [usize; 2];
}

/// Propagator for either diffraction regime
#[derive(Debug, Clone)]
pub enum Propagator<T: FftNum + Float> {
    Farfield(Farfield<T>),
    Nearfield(Nearfield<T>),
}
impl<T: FftNum + Float> Propagator<T> {
    /// Builds the propagator matching the parameters propagation type with the default backend
    pub fn new(params: &GeometryParameters) -> Result<Self> {
        Self::with_backend(params, Backend::default())
    }
    /// Builds the propagator matching the parameters propagation type
    pub fn with_backend(params: &GeometryParameters, backend: Backend<T>) -> Result<Self> {
        log::debug!("building {} propagator", params.propagation());
        Ok(match params.propagation() {
            PropagationType::Farfield => Self::Farfield(Farfield::with_backend(params, backend)?),
            PropagationType::Nearfield => {
                Self::Nearfield(Nearfield::with_backend(params, backend)?)
            }
        })
    }
    pub fn propagation(&self) -> PropagationType {
        match self {
            Self::Farfield(_) => PropagationType::Farfield,
            Self::Nearfield(_) => PropagationType::Nearfield,
        }
    }
    /// Frame cropping (<0) or padding (>0) into the working shape
    pub fn crop_pad(&self) -> [isize; 2] {
        match self {
            Self::Farfield(p) => p.crop_pad(),
            Self::Nearfield(_) => [0; 2],
        }
    }
    pub fn backend(&self) -> &Backend<T> {
        match self {
            Self::Farfield(p) => p.backend(),
            Self::Nearfield(p) => p.backend(),
        }
    }
    pub fn as_farfield(&self) -> Option<&Farfield<T>> {
        match self {
            Self::Farfield(p) => Some(p),
            Self::Nearfield(_) => None,
        }
    }
    pub fn as_nearfield(&self) -> Option<&Nearfield<T>> {
        match self {
            Self::Farfield(_) => None,
            Self::Nearfield(p) => Some(p),
        }
    }
}
impl<T: FftNum + Float> Propagate<T> for Propagator<T> {
    fn update(&mut self, params: &GeometryParameters) -> Result<()> {
        match self {
            Self::Farfield(p) => p.update(params),
            Self::Nearfield(p) => p.update(params),
        }
    }
    fn forward(&self, wavefront: ArrayView2<Complex<T>>) -> Result<Array2<Complex<T>>> {
        match self {
            Self::Farfield(p) => p.forward(wavefront),
            Self::Nearfield(p) => p.forward(wavefront),
        }
    }
    fn backward(&self, wavefront: ArrayView2<Complex<T>>) -> Result<Array2<Complex<T>>> {
        match self {
            Self::Farfield(p) => p.backward(wavefront),
            Self::Nearfield(p) => p.backward(wavefront),
        }
    }
    fn shape(&self) -> [usize; 2] {
        match self {
            Self::Farfield(p) => p.shape(),
            Self::Nearfield(p) => p.shape(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeometryConfig;
    use strum::IntoEnumIterator;

    #[test]
    fn dispatch() {
        for propagation in PropagationType::iter() {
            let params = GeometryParameters::try_from(
                GeometryConfig::default().shape(32).propagation(propagation),
            )
            .unwrap()
            .reconciled();
            let propagator = Propagator::<f64>::new(&params).unwrap();
            assert_eq!(propagator.propagation(), propagation);
            assert_eq!(propagator.shape(), [32, 32]);
            assert_eq!(propagator.crop_pad(), [0, 0]);
            assert_eq!(
                propagator.as_farfield().is_some(),
                propagation == PropagationType::Farfield
            );
            let w = Array2::from_elem((32, 32), Complex::new(1f64, 0.));
            assert_eq!(propagator.forward(w.view()).unwrap().dim(), (32, 32));
            assert_eq!(
                propagator.backward(Array2::zeros((16, 32)).view()),
                Err(PropagatorError::Shape {
                    found: [16, 32],
                    frame: [32, 32],
                    working: [32, 32]
                })
            );
        }
    }

    #[test]
    fn cast_precision() {
        assert_eq!(cast::<f32>(0.5), 0.5f32);
        let z = phasor::<f64>(std::f64::consts::FRAC_PI_2);
        assert!(z.re.abs() < 1e-15 && (z.im - 1.).abs() < 1e-15);
    }
}
