mod model;
mod repository;

pub use model::{AnalysisDB, AnalysisRequestDB};
pub use repository::AnalysisRepository;
