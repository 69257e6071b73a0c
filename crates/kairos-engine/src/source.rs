//! In-memory data source

use kairos_domain::{DataSource, KeyId, Proposition};
use std::collections::BTreeMap;
use std::convert::Infallible;

/// Data source backed by a map of key → primitive propositions
///
/// # Examples
///
/// ```
/// use kairos_domain::{CalendarZone, DataSource, Granularity, Interval, KeyId, Proposition, SourceId, UniqueId};
/// use kairos_engine::InMemoryDataSource;
///
/// let admission = Proposition::event(
///     "ADMISSION".into(),
///     UniqueId::new(SourceId::new("adt"), "a1"),
///     Interval::at(0, Granularity::MINUTE, CalendarZone::Utc).unwrap(),
/// );
/// let source = InMemoryDataSource::new().with_proposition("patient-1", admission);
///
/// assert_eq!(source.keys().unwrap(), vec![KeyId::new("patient-1")]);
/// assert_eq!(source.propositions_for(&KeyId::new("patient-2")).unwrap().len(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataSource {
    data: BTreeMap<KeyId, Vec<Proposition>>,
}

impl InMemoryDataSource {
    /// Create an empty data source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a proposition for a key
    pub fn with_proposition(mut self, key: impl Into<KeyId>, proposition: Proposition) -> Self {
        self.insert(key, proposition);
        self
    }

    /// Add a proposition for a key
    pub fn insert(&mut self, key: impl Into<KeyId>, proposition: Proposition) {
        self.data.entry(key.into()).or_default().push(proposition);
    }

    /// Add several propositions for a key
    pub fn extend(&mut self, key: impl Into<KeyId>, propositions: impl IntoIterator<Item = Proposition>) {
        self.data.entry(key.into()).or_default().extend(propositions);
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether there are no keys
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl DataSource for InMemoryDataSource {
    type Error = Infallible;

    fn keys(&self) -> Result<Vec<KeyId>, Self::Error> {
        Ok(self.data.keys().cloned().collect())
    }

    fn propositions_for(&self, key: &KeyId) -> Result<Vec<Proposition>, Self::Error> {
        Ok(self.data.get(key).cloned().unwrap_or_default())
    }
}
