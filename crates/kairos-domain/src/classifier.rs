//! Built-in classifiers for low-level abstractions

use crate::definition::{ClassificationId, Classifier};
use crate::value::{Value, ValueComparator, ValueConstraint};
use crate::ClassifierError;
use serde::{Deserialize, Serialize};

/// One end of a threshold band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdLimit {
    /// The limit
    pub value: f64,
    /// Whether the limit itself is inside the band
    pub inclusive: bool,
}

impl ThresholdLimit {
    /// A limit that belongs to the band
    pub fn inclusive(value: f64) -> Self {
        Self { value, inclusive: true }
    }

    /// A limit just outside the band
    pub fn exclusive(value: f64) -> Self {
        Self { value, inclusive: false }
    }
}

/// A named numeric band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBand {
    /// Classification for values in the band
    pub classification: ClassificationId,
    /// Lower end, `None` for unbounded
    pub lower: Option<ThresholdLimit>,
    /// Upper end, `None` for unbounded
    pub upper: Option<ThresholdLimit>,
}

impl ThresholdBand {
    /// Whether a value falls in the band
    ///
    /// Censored values only count when they lie inside for every possible
    /// underlying number.
    fn contains(&self, value: &Value) -> bool {
        let above_lower = self.lower.is_none_or(|limit| {
            let comparator = if limit.inclusive {
                ValueComparator::GreaterThanOrEqual
            } else {
                ValueComparator::GreaterThan
            };
            ValueConstraint::new(comparator, Value::Number(limit.value)).matches(value)
        });
        let below_upper = self.upper.is_none_or(|limit| {
            let comparator = if limit.inclusive {
                ValueComparator::LessThanOrEqual
            } else {
                ValueComparator::LessThan
            };
            ValueConstraint::new(comparator, Value::Number(limit.value)).matches(value)
        });
        above_lower && below_upper
    }
}

/// Classifies a window when every value falls in the same band
///
/// Bands are tried in declaration order; the first containing band wins.
///
/// # Examples
///
/// ```
/// use kairos_domain::{Classifier, ThresholdClassifier, ThresholdLimit, Value};
///
/// let glucose = ThresholdClassifier::new("glucose")
///     .with_band("LOW", None, Some(ThresholdLimit::exclusive(70.0)))
///     .with_band("NORMAL", Some(ThresholdLimit::inclusive(70.0)), Some(ThresholdLimit::exclusive(180.0)))
///     .with_band("HIGH", Some(ThresholdLimit::inclusive(180.0)), None);
///
/// let high = [Value::Number(200.0), Value::Number(185.0)];
/// let window: Vec<&Value> = high.iter().collect();
/// assert_eq!(glucose.classify(&window).unwrap().unwrap().as_str(), "HIGH");
///
/// let mixed = [Value::Number(200.0), Value::Number(100.0)];
/// let window: Vec<&Value> = mixed.iter().collect();
/// assert_eq!(glucose.classify(&window).unwrap(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdClassifier {
    name: String,
    bands: Vec<ThresholdBand>,
}

impl ThresholdClassifier {
    /// Create a classifier without bands
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), bands: Vec::new() }
    }

    /// Append a band
    pub fn with_band(
        mut self,
        classification: impl Into<ClassificationId>,
        lower: Option<ThresholdLimit>,
        upper: Option<ThresholdLimit>,
    ) -> Self {
        self.bands.push(ThresholdBand { classification: classification.into(), lower, upper });
        self
    }

    /// Configured bands
    pub fn bands(&self) -> &[ThresholdBand] {
        &self.bands
    }

    fn band_of(&self, value: &Value) -> Result<Option<usize>, ClassifierError> {
        if !matches!(value, Value::Number(_) | Value::Inequality { .. }) {
            return Err(ClassifierError::UnsupportedValue {
                classifier: self.name.clone(),
                value: value.to_string(),
            });
        }
        Ok(self.bands.iter().position(|band| band.contains(value)))
    }
}

impl Classifier for ThresholdClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, window: &[&Value]) -> Result<Option<ClassificationId>, ClassifierError> {
        let mut shared = None;
        for value in window {
            let Some(band) = self.band_of(value)? else {
                return Ok(None);
            };
            match shared {
                None => shared = Some(band),
                Some(previous) if previous != band => return Ok(None),
                Some(_) => {}
            }
        }
        Ok(shared.map(|band| self.bands[band].classification.clone()))
    }
}

/// Direction of change over a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    /// Every step rises by more than the tolerance
    Increasing,
    /// Every step falls by more than the tolerance
    Decreasing,
    /// Every step stays within the tolerance
    Steady,
}

/// Classifies monotone windows of plain numbers
///
/// Windows of fewer than two values never classify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendClassifier {
    name: String,
    tolerance: f64,
    increasing: ClassificationId,
    decreasing: ClassificationId,
    steady: ClassificationId,
}

impl TrendClassifier {
    /// Create a trend classifier labelling windows `INCREASING`, `DECREASING` or `STEADY`
    pub fn new(name: impl Into<String>, tolerance: f64) -> Self {
        Self {
            name: name.into(),
            tolerance: tolerance.abs(),
            increasing: ClassificationId::new("INCREASING"),
            decreasing: ClassificationId::new("DECREASING"),
            steady: ClassificationId::new("STEADY"),
        }
    }

    /// Override the labels
    pub fn with_labels(
        mut self,
        increasing: impl Into<ClassificationId>,
        decreasing: impl Into<ClassificationId>,
        steady: impl Into<ClassificationId>,
    ) -> Self {
        self.increasing = increasing.into();
        self.decreasing = decreasing.into();
        self.steady = steady.into();
        self
    }

    /// The trend of a window of numbers, if it is monotone
    pub fn trend(&self, numbers: &[f64]) -> Option<Trend> {
        if numbers.len() < 2 {
            return None;
        }
        let step = |delta: f64| {
            if delta > self.tolerance {
                Trend::Increasing
            } else if delta < -self.tolerance {
                Trend::Decreasing
            } else {
                Trend::Steady
            }
        };
        let mut steps = numbers.windows(2).map(|pair| step(pair[1] - pair[0]));
        let first = steps.next()?;
        steps.all(|s| s == first).then_some(first)
    }
}

impl Classifier for TrendClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, window: &[&Value]) -> Result<Option<ClassificationId>, ClassifierError> {
        let numbers = window
            .iter()
            .map(|value| {
                value.as_number().ok_or_else(|| ClassifierError::UnsupportedValue {
                    classifier: self.name.clone(),
                    value: value.to_string(),
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        Ok(self.trend(&numbers).map(|trend| match trend {
            Trend::Increasing => self.increasing.clone(),
            Trend::Decreasing => self.decreasing.clone(),
            Trend::Steady => self.steady.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::InequalityComparator;

    fn classify(classifier: &dyn Classifier, values: &[Value]) -> Result<Option<ClassificationId>, ClassifierError> {
        let window: Vec<&Value> = values.iter().collect();
        classifier.classify(&window)
    }

    fn glucose() -> ThresholdClassifier {
        ThresholdClassifier::new("glucose")
            .with_band("LOW", None, Some(ThresholdLimit::exclusive(70.0)))
            .with_band("NORMAL", Some(ThresholdLimit::inclusive(70.0)), Some(ThresholdLimit::exclusive(180.0)))
            .with_band("HIGH", Some(ThresholdLimit::inclusive(180.0)), None)
    }

    #[test]
    fn test_threshold_band_limits() {
        let c = glucose();
        assert_eq!(classify(&c, &[Value::Number(180.0)]).unwrap(), Some("HIGH".into()));
        assert_eq!(classify(&c, &[Value::Number(179.9)]).unwrap(), Some("NORMAL".into()));
        assert_eq!(classify(&c, &[Value::Number(69.0)]).unwrap(), Some("LOW".into()));
    }

    #[test]
    fn test_threshold_censored_values() {
        let c = glucose();
        let below_fifty = Value::Inequality { comparator: InequalityComparator::LessThan, number: 50.0 };
        assert_eq!(classify(&c, &[below_fifty]).unwrap(), Some("LOW".into()));

        // Could be either LOW or NORMAL
        let below_hundred = Value::Inequality { comparator: InequalityComparator::LessThan, number: 100.0 };
        assert_eq!(classify(&c, &[below_hundred]).unwrap(), None);
    }

    #[test]
    fn test_threshold_rejects_non_numeric() {
        let err = classify(&glucose(), &[Value::from("high")]).unwrap_err();
        assert!(matches!(err, ClassifierError::UnsupportedValue { .. }));
    }

    #[test]
    fn test_threshold_outside_all_bands() {
        let c = ThresholdClassifier::new("narrow").with_band("MID", Some(ThresholdLimit::inclusive(10.0)), Some(ThresholdLimit::inclusive(20.0)));
        assert_eq!(classify(&c, &[Value::Number(25.0)]).unwrap(), None);
        assert_eq!(classify(&c, &[]).unwrap(), None);
    }

    #[test]
    fn test_trend_directions() {
        let c = TrendClassifier::new("trend", 0.5);
        let rising = [Value::Number(1.0), Value::Number(2.0), Value::Number(4.0)];
        let falling = [Value::Number(4.0), Value::Number(2.0)];
        let flat = [Value::Number(4.0), Value::Number(4.2), Value::Number(4.1)];
        let zigzag = [Value::Number(1.0), Value::Number(3.0), Value::Number(1.0)];
        assert_eq!(classify(&c, &rising).unwrap(), Some("INCREASING".into()));
        assert_eq!(classify(&c, &falling).unwrap(), Some("DECREASING".into()));
        assert_eq!(classify(&c, &flat).unwrap(), Some("STEADY".into()));
        assert_eq!(classify(&c, &zigzag).unwrap(), None);
        assert_eq!(classify(&c, &[Value::Number(1.0)]).unwrap(), None);
    }

    #[test]
    fn test_trend_custom_labels() {
        let c = TrendClassifier::new("trend", 0.0).with_labels("UP", "DOWN", "FLAT");
        let rising = [Value::Number(1.0), Value::Number(2.0)];
        assert_eq!(classify(&c, &rising).unwrap(), Some("UP".into()));
    }

    #[test]
    fn test_trend_rejects_censored_values() {
        let c = TrendClassifier::new("trend", 0.0);
        let censored = Value::Inequality { comparator: InequalityComparator::GreaterThan, number: 5.0 };
        assert!(classify(&c, &[Value::Number(1.0), censored]).is_err());
    }
}
