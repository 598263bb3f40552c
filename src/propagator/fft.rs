/*!
# 2D discrete Fourier transforms

The propagators only rely on the [Transform2] interface and on a pair of [Scaling] constants,
so the default [RustFft] backend can be replaced by any other 2D DFT implementation.
*/

use std::{
    fmt,
    ops::Range,
    sync::{Arc, Mutex, PoisonError},
};

use ndarray::{s, Array2, ArrayView2};
use rayon::prelude::*;
use rustfft::{
    num_complex::Complex,
    num_traits::{Float, Zero},
    Fft, FftDirection, FftNum, FftPlanner,
};

use super::cast;

/// In-place 2D discrete Fourier transform pair
pub trait Transform2<T>: fmt::Debug + Send + Sync {
    /// Forward transform
    fn forward(&self, data: &mut Array2<Complex<T>>);
    /// Inverse transform
    fn inverse(&self, data: &mut Array2<Complex<T>>);
}

/// 2D DFT with [rustfft]
///
/// The forward transform is unnormalized and the inverse transform is normalized by
/// the number of elements, so that `inverse(forward(x)) = x`.
/// FFT plans are cached for each axis length.
pub struct RustFft<T: FftNum> {
    planner: Mutex<FftPlanner<T>>,
}
impl<T: FftNum> Default for RustFft<T> {
    fn default() -> Self {
        Self {
            planner: Mutex::new(FftPlanner::new()),
        }
    }
}
impl<T: FftNum> fmt::Debug for RustFft<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RustFft").finish_non_exhaustive()
    }
}
impl<T: FftNum> RustFft<T> {
    pub fn new() -> Self {
        Default::default()
    }
    fn plans(&self, shape: (usize, usize), direction: FftDirection) -> [Arc<dyn Fft<T>>; 2] {
        let mut planner = self.planner.lock().unwrap_or_else(PoisonError::into_inner);
        [
            planner.plan_fft(shape.0, direction),
            planner.plan_fft(shape.1, direction),
        ]
    }
    fn transform(&self, data: &mut Array2<Complex<T>>, direction: FftDirection) {
        let shape = data.dim();
        if shape.0 == 0 || shape.1 == 0 {
            return;
        }
        let [col_fft, row_fft] = self.plans(shape, direction);
        process_rows(data, &row_fft);
        let mut transposed = data.t().as_standard_layout().into_owned();
        process_rows(&mut transposed, &col_fft);
        data.assign(&transposed.t());
    }
}
/// Transforms every row of the array in parallel
fn process_rows<T: FftNum>(data: &mut Array2<Complex<T>>, fft: &Arc<dyn Fft<T>>) {
    if !data.is_standard_layout() {
        let contiguous = data.as_standard_layout().into_owned();
        *data = contiguous;
    }
    let width = data.ncols();
    if let Some(buffer) = data.as_slice_mut() {
        buffer
            .par_chunks_mut(width)
            .for_each(|row| fft.process(row));
    }
}
impl<T: FftNum + Float> Transform2<T> for RustFft<T> {
    fn forward(&self, data: &mut Array2<Complex<T>>) {
        self.transform(data, FftDirection::Forward);
    }
    fn inverse(&self, data: &mut Array2<Complex<T>>) {
        self.transform(data, FftDirection::Inverse);
        let norm = cast::<T>(data.len() as f64).recip();
        data.mapv_inplace(|x| x * norm);
    }
}

/// Scaling constants applied after the forward and the inverse transforms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling<T> {
    pub forward: T,
    pub inverse: T,
}
impl<T: Float> Scaling<T> {
    /// `1/√area` and `√area` for arrays of the given shape
    ///
    /// With the [RustFft] normalization, it makes the far-field propagation unitary.
    pub fn unitary(shape: [usize; 2]) -> Self {
        let sqrt_area = cast::<T>((shape[0] * shape[1]) as f64).sqrt();
        Self {
            forward: sqrt_area.recip(),
            inverse: sqrt_area,
        }
    }
}

/// Transform backend: 2D DFT pair and optional scaling constants
///
/// If `scaling` is `None`, the propagators use [Scaling::unitary] of their working shape.
#[derive(Debug, Clone)]
pub struct Backend<T> {
    pub transform: Arc<dyn Transform2<T>>,
    pub scaling: Option<Scaling<T>>,
}
impl<T: FftNum + Float> Default for Backend<T> {
    fn default() -> Self {
        Self {
            transform: Arc::new(RustFft::<T>::new()),
            scaling: None,
        }
    }
}
impl<T> Backend<T> {
    pub fn new(transform: Arc<dyn Transform2<T>>, scaling: Option<Scaling<T>>) -> Self {
        Self { transform, scaling }
    }
}

/// Source and destination ranges along one axis of length `n` padded (`amount>0`) or cropped (`amount<0`)
fn axis_ranges(n: usize, amount: isize) -> (Range<usize>, Range<usize>) {
    let half = (amount / 2).unsigned_abs();
    if amount >= 0 {
        (0..n, half..half + n)
    } else {
        let m = n.saturating_sub(amount.unsigned_abs());
        let start = half.min(n);
        (start..start + m, 0..m)
    }
}

/// Symmetric zero-padding or cropping
///
/// Each axis is padded with `amount/2` zeros on both sides if `amount` is positive
/// or cropped by `|amount|/2` elements on both sides if it is negative.
pub fn crop_pad<A: Clone + Zero>(array: ArrayView2<A>, amount: [isize; 2]) -> Array2<A> {
    let (n_row, n_col) = array.dim();
    let shape = (
        n_row.saturating_add_signed(amount[0]),
        n_col.saturating_add_signed(amount[1]),
    );
    let mut out = Array2::zeros(shape);
    let (src_row, dst_row) = axis_ranges(n_row, amount[0]);
    let (src_col, dst_col) = axis_ranges(n_col, amount[1]);
    if src_row.is_empty() || src_col.is_empty() {
        return out;
    }
    out.slice_mut(s![dst_row, dst_col])
        .assign(&array.slice(s![src_row, src_col]));
    out
}
