use thiserror::Error;

#[derive(Error, Debug)]
pub enum LeeaError {
    #[error("Incompatible shapes: expected {expected:?}, found {found:?}")]
    ShapeMismatch { expected: Vec<usize>, found: Vec<usize> },
    #[error("Population is empty")]
    EmptyPopulation,
    #[error("Batch size {batch} exceeds sample count {samples}")]
    BatchTooLarge { batch: usize, samples: usize },
    #[error("Negative fitness {0} is not allowed under roulette selection")]
    NegativeFitness(f64),
    #[error("Selection pool is empty")]
    EmptySelectionPool,
    #[error("Mutator has {got} stddevs but the entity has {want} parameter tensors")]
    StddevCountMismatch { got: usize, want: usize },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Sample source error: {0}")]
    SampleSource(String),
    #[error("Fetch error: {0}")]
    Fetch(String),
    #[error("Signal handler error: {0}")]
    Signal(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type LeeaResult<T> = Result<T, LeeaError>;
