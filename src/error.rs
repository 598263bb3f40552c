use crate::{geometry::ConfigError, propagator::PropagatorError};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the geometry configuration")]
    Config(#[from] ConfigError),
    #[error("Error in the `propagator` module")]
    Propagator(#[from] PropagatorError),
}
