use droneloc_core::DescriptorKind;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchError {
    #[error("cannot match {source_kind} descriptors against {target_kind} descriptors")]
    KindMismatch {
        source_kind: DescriptorKind,
        target_kind: DescriptorKind,
    },

    #[error("descriptor row {index} has {actual} values, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("descriptor rows have no values")]
    ZeroWidth,

    #[error("invalid matcher parameters: {0}")]
    InvalidParams(String),
}

pub type MatchResult<T> = Result<T, MatchError>;
