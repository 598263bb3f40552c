//! Single transform far-field propagator

use std::f64::consts::PI;

use ndarray::{Array2, ArrayView2};
use rustfft::{num_complex::Complex, num_traits::Float, FftNum};

use super::{crop_pad, multiply, phasor, Backend, Propagate, PropagatorError, Result, Scaling};
use crate::{grids, GeometryParameters};

/// Far-field propagator
///
/// Fresnel propagation with a single Fourier transform between planes with
/// independent pixel sizes and coordinate origins.
/// The quadratic phase factors and the origin shift factors are precomputed:
///
/// ```text
/// pre_forward  = exp(iπ(X²+Y²)/λz) exp(-2iπ((X-X₀)V₀+(Y-Y₀)W₀)/λz)
/// post_forward = exp(iπ(V²+W²)/λz) exp(-2iπ(X₀V+Y₀W)/λz)
/// ```
///
/// where (X,Y) and (V,W) are the sample and detector coordinate grids and the ₀ subscript
/// denotes the grid values at index (0,0). The backward factors are the complex conjugates of the
/// forward factors in reverse order.
///
/// If both pixel sizes are fixed, the frame is padded (or cropped) by the misfit rounded to the nearest
/// even number of pixels before propagation and cropped (or padded) back to the frame shape after.
/// Coordinates wrap periodically around the origin, like the DFT does.
#[derive(Debug, Clone)]
pub struct Farfield<T: FftNum + Float> {
    frame: [usize; 2],
    crop_pad: [isize; 2],
    shape: [usize; 2],
    grids_sam: [Array2<f64>; 2],
    grids_det: [Array2<f64>; 2],
    pre_forward: Array2<Complex<T>>,
    post_forward: Array2<Complex<T>>,
    pre_backward: Array2<Complex<T>>,
    post_backward: Array2<Complex<T>>,
    scaling: Scaling<T>,
    backend: Backend<T>,
}
impl<T: FftNum + Float> Farfield<T> {
    pub fn new(params: &GeometryParameters) -> Result<Self> {
        Self::with_backend(params, Backend::default())
    }
    pub fn with_backend(params: &GeometryParameters, backend: Backend<T>) -> Result<Self> {
        let lz = params.lz();
        let resolution = params.farfield_resolution();
        let frame = params.frame();
        // ties to even: an odd misfit is absorbed by the nearest multiple of 4
        let crop_pad = [
            (resolution.misfit[0] / 2.).round_ties_even() as isize * 2,
            (resolution.misfit[1] / 2.).round_ties_even() as isize * 2,
        ];
        let working = [
            frame[0] as isize + crop_pad[0],
            frame[1] as isize + crop_pad[1],
        ];
        if working.iter().any(|&n| n <= 0) {
            return Err(PropagatorError::WorkingShape {
                misfit: [resolution.misfit[0], resolution.misfit[1]],
                frame,
            });
        }
        let shape = [working[0] as usize, working[1] as usize];

        let grids_sam = grids(shape, resolution.psize_sam, params.origin_sam());
        let grids_det = grids(shape, resolution.psize_det, params.origin_det());
        let [x, y] = &grids_sam;
        let [v, w] = &grids_det;
        let (x0, y0, v0, w0) = (x[[0, 0]], y[[0, 0]], v[[0, 0]], w[[0, 0]]);

        let pre_forward = Array2::from_shape_fn((shape[0], shape[1]), |ij| {
            let (x, y) = (x[ij], y[ij]);
            phasor(PI * (x * x + y * y) / lz - 2. * PI * ((x - x0) * v0 + (y - y0) * w0) / lz)
        });
        let post_forward = Array2::from_shape_fn((shape[0], shape[1]), |ij| {
            let (v, w) = (v[ij], w[ij]);
            phasor(PI * (v * v + w * w) / lz - 2. * PI * (x0 * v + y0 * w) / lz)
        });
        let pre_backward = post_forward.mapv(|c: Complex<T>| c.conj());
        let post_backward = pre_forward.mapv(|c: Complex<T>| c.conj());

        let scaling = backend
            .scaling
            .unwrap_or_else(|| Scaling::unitary(shape));
        log::debug!(
            "far-field propagator: frame {:?}, working shape {:?}",
            frame,
            shape
        );
        Ok(Self {
            frame,
            crop_pad,
            shape,
            grids_sam,
            grids_det,
            pre_forward,
            post_forward,
            pre_backward,
            post_backward,
            scaling,
            backend,
        })
    }
    /// Frame size [px]
    pub fn frame(&self) -> [usize; 2] {
        self.frame
    }
    /// Frame cropping (<0) or padding (>0) into the working shape
    pub fn crop_pad(&self) -> [isize; 2] {
        self.crop_pad
    }
    /// Sample plane coordinates [m]
    pub fn grids_sam(&self) -> &[Array2<f64>; 2] {
        &self.grids_sam
    }
    /// Detector plane coordinates [m]
    pub fn grids_det(&self) -> &[Array2<f64>; 2] {
        &self.grids_det
    }
    pub fn pre_forward(&self) -> &Array2<Complex<T>> {
        &self.pre_forward
    }
    pub fn post_forward(&self) -> &Array2<Complex<T>> {
        &self.post_forward
    }
    pub fn pre_backward(&self) -> &Array2<Complex<T>> {
        &self.pre_backward
    }
    pub fn post_backward(&self) -> &Array2<Complex<T>> {
        &self.post_backward
    }
    pub fn scaling(&self) -> Scaling<T> {
        self.scaling
    }
    pub fn backend(&self) -> &Backend<T> {
        &self.backend
    }
    /// Brings the wavefront to the working shape, returns whether it has been cropped or padded
    fn to_working_shape(
        &self,
        wavefront: ArrayView2<Complex<T>>,
    ) -> Result<(Array2<Complex<T>>, bool)> {
        let (n_row, n_col) = wavefront.dim();
        let found = [n_row, n_col];
        if found == self.shape {
            Ok((wavefront.to_owned(), false))
        } else if found == self.frame {
            Ok((crop_pad(wavefront, self.crop_pad), true))
        } else {
            Err(PropagatorError::Shape {
                found,
                frame: self.frame,
                working: self.shape,
            })
        }
    }
    fn propagate(
        &self,
        wavefront: ArrayView2<Complex<T>>,
        pre: &Array2<Complex<T>>,
        post: &Array2<Complex<T>>,
        scale: T,
        transform: impl Fn(&mut Array2<Complex<T>>),
    ) -> Result<Array2<Complex<T>>> {
        let (mut w, resized) = self.to_working_shape(wavefront)?;
        multiply(&mut w, pre, T::one());
        transform(&mut w);
        multiply(&mut w, post, scale);
        Ok(if resized {
            crop_pad(w.view(), [-self.crop_pad[0], -self.crop_pad[1]])
        } else {
            w
        })
    }
}
impl<T: FftNum + Float> Propagate<T> for Farfield<T> {
    fn update(&mut self, params: &GeometryParameters) -> Result<()> {
        let backend = self.backend.clone();
        *self = Self::with_backend(params, backend)?;
        Ok(())
    }
    fn forward(&self, wavefront: ArrayView2<Complex<T>>) -> Result<Array2<Complex<T>>> {
        self.propagate(
            wavefront,
            &self.pre_forward,
            &self.post_forward,
            self.scaling.forward,
            |w| self.backend.transform.forward(w),
        )
    }
    fn backward(&self, wavefront: ArrayView2<Complex<T>>) -> Result<Array2<Complex<T>>> {
        self.propagate(
            wavefront,
            &self.pre_backward,
            &self.post_backward,
            self.scaling.inverse,
            |w| self.backend.transform.inverse(w),
        )
    }
    fn shape(&self) -> [usize; 2] {
        self.shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GeometryConfig, Origin, RustFft, Transform2};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn params(config: GeometryConfig) -> GeometryParameters {
        GeometryParameters::try_from(config).unwrap().reconciled()
    }
    fn random_wavefront(shape: (usize, usize), seed: u64) -> Array2<Complex<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array2::from_shape_fn(shape, |_| {
            Complex::new(rng.gen_range(-1f64..1.), rng.gen_range(-1f64..1.))
        })
    }
    fn energy(w: &Array2<Complex<f64>>) -> f64 {
        w.iter().map(|x| x.norm_sqr()).sum()
    }
    fn relative_error(a: &Array2<Complex<f64>>, b: &Array2<Complex<f64>>) -> f64 {
        let diff: f64 = a.iter().zip(b).map(|(a, b)| (a - b).norm_sqr()).sum();
        (diff / energy(b)).sqrt()
    }

    #[test]
    fn round_trip() {
        let propagator =
            Farfield::<f64>::new(&params(GeometryConfig::default().shape(64))).unwrap();
        assert_eq!(propagator.crop_pad(), [0, 0]);
        assert_eq!(propagator.shape(), [64, 64]);
        let w = random_wavefront((64, 64), 0);
        let fw = propagator.forward(w.view()).unwrap();
        let bw = propagator.backward(fw.view()).unwrap();
        assert!(relative_error(&bw, &w) < 1e-6);
    }

    #[test]
    fn round_trip_shifted_origins() {
        let propagator = Farfield::<f64>::new(&params(
            GeometryConfig::default()
                .shape([48, 64])
                .origin_sam(Origin::Zero)
                .origin_det(Origin::Offset([10.5, 3.])),
        ))
        .unwrap();
        let w = random_wavefront((48, 64), 1);
        let bw = propagator
            .backward(propagator.forward(w.view()).unwrap().view())
            .unwrap();
        assert!(relative_error(&bw, &w) < 1e-6);
    }

    #[test]
    fn parseval() {
        let propagator =
            Farfield::<f64>::new(&params(GeometryConfig::default().shape([64, 32]))).unwrap();
        let w = random_wavefront((64, 32), 2);
        let fw = propagator.forward(w.view()).unwrap();
        assert!((energy(&fw) / energy(&w) - 1.).abs() < 1e-9);
    }

    #[test]
    fn single_precision() {
        let propagator =
            Farfield::<f32>::new(&params(GeometryConfig::default().shape(64))).unwrap();
        let w = random_wavefront((64, 64), 3).mapv(|x| Complex::new(x.re as f32, x.im as f32));
        let bw = propagator
            .backward(propagator.forward(w.view()).unwrap().view())
            .unwrap();
        let diff: f32 = bw.iter().zip(&w).map(|(a, b)| (a - b).norm_sqr()).sum();
        let norm: f32 = w.iter().map(|x| x.norm_sqr()).sum();
        assert!((diff / norm).sqrt() < 1e-4);
    }

    #[test]
    fn conjugate_factors() {
        for config in [
            GeometryConfig::default().shape(32),
            GeometryConfig::default()
                .shape([24, 40])
                .psize_sam(2e-8)
                .origin_det(Origin::Zero),
        ] {
            let propagator = Farfield::<f64>::new(&params(config)).unwrap();
            assert_eq!(
                propagator.post_backward(),
                &propagator.pre_forward().mapv(|c| c.conj())
            );
            assert_eq!(
                propagator.pre_backward(),
                &propagator.post_forward().mapv(|c| c.conj())
            );
        }
    }

    #[test]
    fn deterministic() {
        let config = GeometryConfig::default().shape([30, 20]).psize_sam(5e-8);
        let a = Farfield::<f64>::new(&params(config.clone())).unwrap();
        let b = Farfield::<f64>::new(&params(config)).unwrap();
        assert_eq!(a.pre_forward(), b.pre_forward());
        assert_eq!(a.post_forward(), b.post_forward());
        assert_eq!(a.grids_sam(), b.grids_sam());
        assert_eq!(a.grids_det(), b.grids_det());
    }

    #[test]
    fn misfit_padding() {
        // λz/(psize_sam psize_det) = 1e-10/(1e-5 x 8e-9) = 1250 px
        let params = params(
            GeometryConfig::default()
                .without_energy()
                .wavelength(1e-10)
                .distance(1.)
                .shape([1240, 1256])
                .psize_sam(1e-5)
                .psize_det(8e-9),
        );
        let propagator = Farfield::<f64>::new(&params).unwrap();
        assert_eq!(propagator.crop_pad(), [10, -6]);
        assert_eq!(propagator.shape(), [1250, 1250]);
        assert!(propagator.crop_pad().iter().all(|c| c % 2 == 0));
        let w = Array2::from_elem((1240, 1256), Complex::new(1f64, 0.));
        let fw = propagator.forward(w.view()).unwrap();
        assert_eq!(fw.dim(), (1240, 1256));
        let fw = propagator
            .forward(Array2::zeros((1250, 1250)).view())
            .unwrap();
        assert_eq!(fw.dim(), (1250, 1250));
    }

    #[test]
    fn odd_misfit() {
        // λz/(psize_sam psize_det) = (n/1024)/(1/1024) = n px, exactly representable
        let tie = |n: f64| {
            params(
                GeometryConfig::default()
                    .without_energy()
                    .wavelength(n / 1024.)
                    .distance(1.)
                    .shape(4)
                    .psize_sam(1. / 32.)
                    .psize_det(1. / 32.),
            )
        };
        for (n, misfit, crop_pad) in [(5., 1., 0), (7., 3., 4), (3., -1., 0), (9., 5., 4)] {
            let params = tie(n);
            assert_eq!(params.misfit(), nalgebra::Vector2::repeat(misfit));
            let propagator = Farfield::<f64>::new(&params).unwrap();
            assert_eq!(propagator.crop_pad(), [crop_pad; 2]);
            let side = (4 + crop_pad) as usize;
            assert_eq!(propagator.shape(), [side, side]);
        }
    }

    #[test]
    fn empty_working_shape() {
        let params = params(
            GeometryConfig::default()
                .without_energy()
                .wavelength(1e-10)
                .distance(1.)
                .shape(100)
                .psize_sam(1e-4)
                .psize_det(1e-4),
        );
        // misfit of -99.99 px
        assert!(matches!(
            Farfield::<f64>::new(&params),
            Err(PropagatorError::WorkingShape { .. })
        ));
    }

    #[test]
    fn free_sample_pixel_size() {
        let params = params(GeometryConfig::default().shape(50));
        let propagator = Farfield::<f64>::new(&params).unwrap();
        let psize_sam = params.lz() / (172e-6 * 50.);
        let [x, y] = propagator.grids_sam();
        assert!((x[[26, 0]] - psize_sam).abs() < 1e-18);
        assert!((y[[0, 24]] + psize_sam).abs() < 1e-18);
        let [v, _] = propagator.grids_det();
        assert!((v[[0, 0]] + 25. * 172e-6).abs() < 1e-15);
    }

    #[derive(Debug, Default)]
    struct Counting {
        fft: RustFft<f64>,
        calls: AtomicUsize,
    }
    impl Transform2<f64> for Counting {
        fn forward(&self, data: &mut Array2<Complex<f64>>) {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.fft.forward(data);
        }
        fn inverse(&self, data: &mut Array2<Complex<f64>>) {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.fft.inverse(data);
        }
    }

    #[test]
    fn substitute_transform() {
        let counting = Arc::new(Counting::default());
        let backend = Backend::new(
            counting.clone(),
            Some(Scaling {
                forward: 1.,
                inverse: 1.,
            }),
        );
        let params = params(GeometryConfig::default().shape(16));
        let reference = Farfield::<f64>::new(&params).unwrap();
        let propagator = Farfield::with_backend(&params, backend).unwrap();
        assert_eq!(propagator.pre_forward(), reference.pre_forward());
        let w = random_wavefront((16, 16), 4);
        let fw = propagator.forward(w.view()).unwrap();
        let fw_ref = reference.forward(w.view()).unwrap();
        // unscaled forward is √256 times larger
        assert!(relative_error(&fw.mapv(|x| x / 16.), &fw_ref) < 1e-12);
        let bw = propagator.backward(fw.view()).unwrap();
        assert!(relative_error(&bw, &w) < 1e-9);
        assert_eq!(counting.calls.load(Ordering::Relaxed), 2);
    }
}
