//! Angular spectrum near-field propagator

use std::f64::consts::PI;

use nalgebra::Vector2;
use ndarray::{Array2, ArrayView2};
use rustfft::{num_complex::Complex, num_traits::Float, FftNum};

use super::{cast, multiply, phasor, Backend, Propagate, PropagatorError, Result, Scaling};
use crate::{grids, GeometryParameters, Origin};

/// Transfer function `exp(2iπ(z/λ)(√(1-a²)-1))`
///
/// Evanescent components (`a²>1`) have an imaginary square root and are
/// exponentially damped by `exp(-2π(|z|/λ)√(a²-1))` whatever the propagation direction.
fn transfer<T: Float>(a2: f64, distance: f64, wavelength: f64) -> Complex<T> {
    let k = 2. * PI * distance / wavelength;
    let arg = 1. - a2;
    if arg >= 0. {
        // √(1-a²)-1 = -a²/(1+√(1-a²)) without cancellation at small a²
        phasor(-k * a2 / (1. + arg.sqrt()))
    } else {
        let decay = (-2. * PI * distance.abs() / wavelength * (-arg).sqrt()).exp();
        Complex::new(cast(decay * k.cos()), cast(-decay * k.sin()))
    }
}

/// Near-field propagator
///
/// Angular spectrum propagation with a transfer function kernel applied in the
/// frequency domain between two planes of the same frame shape.
/// The frequency pixel size `λz/(N psize_det)` lets the detector pixel size
/// differ from the sample pixel size.
#[derive(Debug, Clone)]
pub struct Nearfield<T: FftNum + Float> {
    shape: [usize; 2],
    grids_sam: [Array2<f64>; 2],
    grids_freq: [Array2<f64>; 2],
    psize_freq: Vector2<f64>,
    kernel: Array2<Complex<T>>,
    ikernel: Array2<Complex<T>>,
    scaling: Scaling<T>,
    backend: Backend<T>,
}
impl<T: FftNum + Float> Nearfield<T> {
    pub fn new(params: &GeometryParameters) -> Result<Self> {
        Self::with_backend(params, Backend::default())
    }
    pub fn with_backend(params: &GeometryParameters, backend: Backend<T>) -> Result<Self> {
        let resolution = params.nearfield_resolution();
        let shape = params.frame();
        let (distance, wavelength) = (params.distance(), params.wavelength());

        let grids_sam = grids(shape, resolution.psize_sam, params.origin_sam());
        let n = params.shape().map(|n| n as f64);
        let psize_freq = resolution
            .psize_det
            .component_mul(&n)
            .map(|p| params.lz() / p);
        let grids_freq = grids(shape, psize_freq, Origin::Zero);
        let [v, w] = &grids_freq;
        let z2 = distance * distance;
        let kernel = Array2::from_shape_fn((shape[0], shape[1]), |ij| {
            let a2 = (v[ij] * v[ij] + w[ij] * w[ij]) / z2;
            transfer(a2, distance, wavelength)
        });
        let ikernel = kernel.mapv(|c: Complex<T>| c.conj());

        let scaling = backend
            .scaling
            .unwrap_or_else(|| Scaling::unitary(shape));
        log::debug!("near-field propagator: frame {:?}", shape);
        Ok(Self {
            shape,
            grids_sam,
            grids_freq,
            psize_freq,
            kernel,
            ikernel,
            scaling,
            backend,
        })
    }
    /// Sample plane coordinates [m]
    pub fn grids_sam(&self) -> &[Array2<f64>; 2] {
        &self.grids_sam
    }
    /// Detector plane coordinates [m], identical to the sample plane coordinates
    pub fn grids_det(&self) -> &[Array2<f64>; 2] {
        &self.grids_sam
    }
    /// Frequency domain coordinates scaled by the propagation distance [m]
    pub fn grids_freq(&self) -> &[Array2<f64>; 2] {
        &self.grids_freq
    }
    pub fn psize_freq(&self) -> Vector2<f64> {
        self.psize_freq
    }
    pub fn kernel(&self) -> &Array2<Complex<T>> {
        &self.kernel
    }
    /// Complex conjugate of the kernel
    pub fn ikernel(&self) -> &Array2<Complex<T>> {
        &self.ikernel
    }
    pub fn scaling(&self) -> Scaling<T> {
        self.scaling
    }
    pub fn backend(&self) -> &Backend<T> {
        &self.backend
    }
    fn propagate(
        &self,
        wavefront: ArrayView2<Complex<T>>,
        kernel: &Array2<Complex<T>>,
    ) -> Result<Array2<Complex<T>>> {
        let (n_row, n_col) = wavefront.dim();
        if [n_row, n_col] != self.shape {
            return Err(PropagatorError::Shape {
                found: [n_row, n_col],
                frame: self.shape,
                working: self.shape,
            });
        }
        let mut w = wavefront.to_owned();
        self.backend.transform.forward(&mut w);
        multiply(&mut w, kernel, self.scaling.forward * self.scaling.inverse);
        self.backend.transform.inverse(&mut w);
        Ok(w)
    }
}
impl<T: FftNum + Float> Propagate<T> for Nearfield<T> {
    fn update(&mut self, params: &GeometryParameters) -> Result<()> {
        let backend = self.backend.clone();
        *self = Self::with_backend(params, backend)?;
        Ok(())
    }
    fn forward(&self, wavefront: ArrayView2<Complex<T>>) -> Result<Array2<Complex<T>>> {
        self.propagate(wavefront, &self.kernel)
    }
    fn backward(&self, wavefront: ArrayView2<Complex<T>>) -> Result<Array2<Complex<T>>> {
        self.propagate(wavefront, &self.ikernel)
    }
    fn shape(&self) -> [usize; 2] {
        self.shape
    }
}
