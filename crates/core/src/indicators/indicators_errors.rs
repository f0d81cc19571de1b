use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndicatorError {
    #[error("Insufficient data for {indicator}: needed {needed} points, have {have}")]
    InsufficientData {
        indicator: String,
        needed: usize,
        have: usize,
    },
}

impl IndicatorError {
    pub fn insufficient(indicator: impl Into<String>, needed: usize, have: usize) -> Self {
        Self::InsufficientData {
            indicator: indicator.into(),
            needed,
            have,
        }
    }
}
