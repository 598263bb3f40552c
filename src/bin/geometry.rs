//! Diffraction geometry
//!
//! Prints the reconciled geometry and optionally checks the propagator with a Gaussian wavefront

use diffraction_geometry::{
    Broadcast, Geometry, GeometryConfig, Origin, Propagate, PropagationType,
};
use ndarray::Array2;
use rustfft::num_complex::Complex;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "geometry")]
struct Opt {
    /// Photon energy [keV], takes precedence over the wavelength
    #[structopt(short, long)]
    energy: Option<f64>,
    /// Wavelength [m]
    #[structopt(short, long)]
    wavelength: Option<f64>,
    /// Sample to detector distance [m]
    #[structopt(short, long, default_value = "2.19")]
    distance: f64,
    /// Frame size [px]: either one value or rows and columns
    #[structopt(long, default_value = "220", min_values = 1, max_values = 2)]
    shape: Vec<usize>,
    /// Detector pixel size [m]: either one value or rows and columns
    #[structopt(long, min_values = 1, max_values = 2)]
    psize_det: Vec<f64>,
    /// Sample pixel size [m]: either one value or rows and columns
    #[structopt(long, min_values = 1, max_values = 2)]
    psize_sam: Vec<f64>,
    /// Propagation type: farfield or nearfield
    #[structopt(short, long, default_value = "farfield")]
    propagation: PropagationType,
    /// Sample plane origin: center, zero or row,col
    #[structopt(long, default_value = "center")]
    origin_sam: Origin,
    /// Detector plane origin: center, zero or row,col
    #[structopt(long, default_value = "center")]
    origin_det: Origin,
    /// Propagates a Gaussian wavefront forward and backward
    #[structopt(long)]
    check: bool,
}

fn broadcast<T: Copy>(values: &[T]) -> Option<Broadcast<T>> {
    match values {
        [value] => Some(Broadcast::Scalar(*value)),
        [row, col] => Some(Broadcast::Pair([*row, *col])),
        _ => None,
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let mut config = GeometryConfig::default()
        .distance(opt.distance)
        .propagation(opt.propagation)
        .origin_sam(opt.origin_sam)
        .origin_det(opt.origin_det);
    config = match (opt.energy, opt.wavelength) {
        (Some(energy), _) => config.energy(energy),
        (None, Some(wavelength)) => config.without_energy().wavelength(wavelength),
        (None, None) => config,
    };
    if let Some(shape) = broadcast(&opt.shape) {
        config = config.shape(shape);
    }
    if let Some(psize) = broadcast(&opt.psize_det) {
        config = config.psize_det(psize);
    }
    if let Some(psize) = broadcast(&opt.psize_sam) {
        config = config.psize_sam(psize);
        if opt.psize_det.is_empty() {
            config = config.without_psize_det();
        }
    }

    let mut geometry = Geometry::<f64>::new(config)?;
    println!("{}", geometry);
    let propagator = geometry.propagator()?;
    println!("{:>25} : {:?}", "working shape [px]", propagator.shape());
    println!("{:>25} : {:?}", "crop/pad [px]", propagator.crop_pad());

    if opt.check {
        let shape = geometry.shape();
        let (n_row, n_col) = (shape[0], shape[1]);
        let sigma2 = (n_row.min(n_col) as f64 / 8.).powi(2);
        let wavefront = Array2::from_shape_fn((n_row, n_col), |(i, j)| {
            let r2 = (i as f64 - n_row as f64 / 2.).powi(2) + (j as f64 - n_col as f64 / 2.).powi(2);
            Complex::new((-0.5 * r2 / sigma2).exp(), 0.)
        });
        let propagator = geometry.propagator()?;
        let diffraction = propagator.forward(wavefront.view())?;
        let exit_wave = propagator.backward(diffraction.view())?;
        let energy: f64 = wavefront.iter().map(|x| x.norm_sqr()).sum();
        let error: f64 = exit_wave
            .iter()
            .zip(&wavefront)
            .map(|(a, b)| (a - b).norm_sqr())
            .sum();
        println!(
            "{:>25} : {:e}",
            "round-trip error",
            (error / energy).sqrt()
        );
        println!(
            "{:>25} : {}",
            "energy ratio",
            diffraction.iter().map(|x| x.norm_sqr()).sum::<f64>() / energy
        );
    }
    Ok(())
}
