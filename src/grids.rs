//! Coordinate grids of the sample, detector and frequency planes

use std::{fmt, str::FromStr};

use nalgebra::Vector2;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum OriginError {
    #[error("failed to parse origin {0:?}, expected `center`, `zero` or `row,col`")]
    Parse(String),
}

/// Array position of the zero coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// zero at index `n/2`, the center of a shifted DFT
    #[default]
    Center,
    /// zero at index 0, the natural DFT indexing
    Zero,
    /// zero at the given (row,column) pixel position
    Offset([f64; 2]),
}
impl Origin {
    /// Returns the (row,column) pixel position of the zero coordinate in an array of the given shape
    pub fn pixel(&self, shape: [usize; 2]) -> [f64; 2] {
        match self {
            Origin::Center => [(shape[0] / 2) as f64, (shape[1] / 2) as f64],
            Origin::Zero => [0f64; 2],
            Origin::Offset(offset) => *offset,
        }
    }
    /// Returns false if an offset coordinate is NaN or infinite
    pub fn is_finite(&self) -> bool {
        match self {
            Origin::Offset([row, col]) => row.is_finite() && col.is_finite(),
            _ => true,
        }
    }
}
impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Center => write!(f, "center"),
            Origin::Zero => write!(f, "zero"),
            Origin::Offset([row, col]) => write!(f, "{},{}", row, col),
        }
    }
}
impl FromStr for Origin {
    type Err = OriginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "center" | "fftshift" => Ok(Origin::Center),
            "zero" | "fft" => Ok(Origin::Zero),
            offset => {
                let values = offset
                    .split(',')
                    .map(|x| x.trim().parse::<f64>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| OriginError::Parse(s.to_string()))?;
                if values.iter().any(|x| !x.is_finite()) {
                    return Err(OriginError::Parse(s.to_string()));
                }
                match values.as_slice() {
                    [value] => Ok(Origin::Offset([*value; 2])),
                    [row, col] => Ok(Origin::Offset([*row, *col])),
                    _ => Err(OriginError::Parse(s.to_string())),
                }
            }
        }
    }
}

/// Wraps a pixel distance to the origin into `[-n/2,n-n/2)`
fn wrap(distance: f64, n: usize) -> f64 {
    let half = (n / 2) as f64;
    (distance + half).rem_euclid(n as f64) - half
}

/// Coordinate grids
///
/// Returns the coordinates along the rows (axis 0) and along the columns (axis 1)
/// of every element of an array of the given `shape`, in units of `psize`.
/// Coordinates are periodic around the `origin` like the DFT sampling:
/// [Origin::Center] gives `-n/2,...,n-n/2-1` and [Origin::Zero] gives `0,1,...,-2,-1`.
pub fn grids(shape: [usize; 2], psize: Vector2<f64>, origin: Origin) -> [Array2<f64>; 2] {
    let [n_row, n_col] = shape;
    let [row0, col0] = origin.pixel(shape);
    let rows = Array2::from_shape_fn((n_row, n_col), |(i, _)| {
        wrap(i as f64 - row0, n_row) * psize[0]
    });
    let cols = Array2::from_shape_fn((n_row, n_col), |(_, j)| {
        wrap(j as f64 - col0, n_col) * psize[1]
    });
    [rows, cols]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(grid: &Array2<f64>) -> Vec<f64> {
        grid.column(0).to_vec()
    }
    fn col(grid: &Array2<f64>) -> Vec<f64> {
        grid.row(0).to_vec()
    }

    #[test]
    fn centered() {
        let [x, y] = grids([4, 5], Vector2::new(1., 1.), Origin::Center);
        assert_eq!(x.dim(), (4, 5));
        assert_eq!(row(&x), vec![-2., -1., 0., 1.]);
        assert_eq!(col(&y), vec![-2., -1., 0., 1., 2.]);
        assert_eq!(x[[2, 0]], 0.);
        assert_eq!(y[[0, 2]], 0.);
    }

    #[test]
    fn dft_like() {
        let [x, y] = grids([4, 5], Vector2::new(1., 1.), Origin::Zero);
        assert_eq!(row(&x), vec![0., 1., -2., -1.]);
        assert_eq!(col(&y), vec![0., 1., 2., -2., -1.]);
    }

    #[test]
    fn offset_and_pixel_size() {
        let [x, y] = grids([4, 4], Vector2::new(0.5, 2.), Origin::Offset([1., 3.]));
        // periodic wrapping beyond half the array
        assert_eq!(row(&x), vec![-0.5, 0., 0.5, -1.]);
        assert_eq!(col(&y), vec![2., -4., -2., 0.]);
        // constant along the other axis
        assert!(x.row(1).iter().all(|&v| v == 0.));
        assert!(y.column(3).iter().all(|&v| v == 0.));
    }

    #[test]
    fn parse_origin() {
        assert_eq!("center".parse::<Origin>(), Ok(Origin::Center));
        assert_eq!("fft".parse::<Origin>(), Ok(Origin::Zero));
        assert_eq!("3".parse::<Origin>(), Ok(Origin::Offset([3., 3.])));
        assert_eq!("1.5, 2".parse::<Origin>(), Ok(Origin::Offset([1.5, 2.])));
        assert!("1,2,3".parse::<Origin>().is_err());
        assert!("left".parse::<Origin>().is_err());
        assert_eq!(
            "nan".parse::<Origin>(),
            Err(OriginError::Parse("nan".to_string()))
        );
        assert!("1,inf".parse::<Origin>().is_err());
        assert!(!Origin::Offset([f64::NEG_INFINITY, 0.]).is_finite());
        assert!(Origin::Center.is_finite());
        let origin = Origin::Offset([1.5, 2.]);
        assert_eq!(origin.to_string().parse::<Origin>(), Ok(origin));
    }
}
