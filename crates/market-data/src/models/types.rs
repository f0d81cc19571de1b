use std::borrow::Cow;

/// Provider identifier, e.g. "ALPHA_VANTAGE". Mostly static constants.
pub type ProviderId = Cow<'static, str>;
