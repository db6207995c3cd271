//! External price history port.

use crate::domain::error::MelaoError;
use crate::domain::price::RawPrice;

/// Full daily history for one asset code, ordered by date. Records may be
/// malformed; the store filters them.
pub trait PriceSource {
    fn fetch(&self, code: &str) -> Result<Vec<RawPrice>, MelaoError>;
}

impl<F> PriceSource for F
where
    F: Fn(&str) -> Result<Vec<RawPrice>, MelaoError>,
{
    fn fetch(&self, code: &str) -> Result<Vec<RawPrice>, MelaoError> {
        self(code)
    }
}
