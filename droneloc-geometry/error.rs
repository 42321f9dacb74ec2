#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("need at least {required} point correspondences, got {found}")]
    InsufficientCorrespondences { found: usize, required: usize },

    #[error("{src} source points but {dst} destination points")]
    LengthMismatch { src: usize, dst: usize },

    #[error("degenerate point configuration")]
    Degenerate,

    #[error("no consensus homography after {iterations} RANSAC iterations")]
    NoConsensus { iterations: usize },

    #[error("estimated homography has non-finite entries")]
    NonFinite,

    #[error("point ({x}, {y}) maps to infinity")]
    PointAtInfinity { x: f64, y: f64 },

    #[error("invalid estimator parameters: {0}")]
    InvalidParams(String),
}

pub type GeometryResult<T> = Result<T, GeometryError>;
