//! Error and Result types.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MvtBuildError {
    // Configuration
    #[error("extent cannot be 0")]
    ZeroExtent,
    #[error("no geometry column found")]
    GeometryColumnNotFound,
    #[error("could not find column `{0}` of integer type")]
    IdColumnNotFound(String),
    #[error("feature id type of column `{0}` does not match its declaration")]
    IdColumnType(String),
    // Encoding
    #[error("unsupported geometry type `{0}`")]
    UnsupportedGeometry(&'static str),
    // Aggregation protocol
    #[error("row pushed into a finalized aggregation")]
    AggregateFinished,
    #[error("unable to combine aggregations without a built tile")]
    CombineMissingTile,
    // External
    #[error("tile decode error `{0}`")]
    TileDecode(#[from] prost::DecodeError),
    #[error("invalid JSON document `{0}`")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MvtBuildError>;
