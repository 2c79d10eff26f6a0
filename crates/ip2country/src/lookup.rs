use std::collections::HashMap;
use std::hash::BuildHasher;

/// A keyed geolocation lookup.
///
/// Given the raw text of the address field, returns the country code for it,
/// or `None` when the address is unknown. Callers treat an empty code the
/// same as `None`.
///
/// Implementations are shared read-only between workers, so they must be
/// `Send + Sync`.
pub trait CountryLookup: Send + Sync {
    fn country(&self, key: &str) -> Option<&str>;
}

/// Exact-match lookup, mostly useful for fixtures and small static tables.
impl<S> CountryLookup for HashMap<String, String, S>
where
    S: BuildHasher + Send + Sync,
{
    fn country(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}
