use std::collections::BTreeMap;

use crate::error::StrategyError;

/// Named indicator columns aligned with the bar history they were derived
/// from. This is the "enriched history" a strategy's `calculate_indicators`
/// produces: the original bars stay untouched, derived series live here.
///
/// Indicator warm-up is represented as `f64::NAN`; the accessors skip NaN so
/// callers never branch on it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFrame {
    len: usize,
    columns: BTreeMap<String, Vec<f64>>,
}

impl IndicatorFrame {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            columns: BTreeMap::new(),
        }
    }

    /// Number of rows (bars) this frame is aligned with.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Adds a column; its length must match the frame.
    pub fn insert(&mut self, name: &str, values: Vec<f64>) -> Result<(), StrategyError> {
        if values.len() != self.len {
            return Err(StrategyError::Indicator(format!(
                "column '{}' has {} rows, frame has {}",
                name,
                values.len(),
                self.len
            )));
        }
        self.columns.insert(name.to_string(), values);
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    /// The value of `name` at row `idx`, if present and not warm-up NaN.
    pub fn value_at(&self, name: &str, idx: usize) -> Option<f64> {
        self.columns
            .get(name)
            .and_then(|v| v.get(idx))
            .copied()
            .filter(|v| v.is_finite())
    }

    /// The most recent finite value of `name`.
    pub fn latest(&self, name: &str) -> Option<f64> {
        if self.len == 0 {
            return None;
        }
        self.value_at(name, self.len - 1)
    }

    /// The second most recent finite value of `name`.
    pub fn previous(&self, name: &str) -> Option<f64> {
        if self.len < 2 {
            return None;
        }
        self.value_at(name, self.len - 2)
    }

    /// Snapshot of the latest row, for diagnostics and status displays.
    pub fn latest_row(&self) -> BTreeMap<String, f64> {
        self.columns
            .keys()
            .filter_map(|name| self.latest(name).map(|v| (name.clone(), v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_column_length_is_rejected() {
        let mut frame = IndicatorFrame::new(3);
        assert!(frame.insert("x", vec![1.0, 2.0]).is_err());
        assert!(frame.insert("x", vec![1.0, 2.0, 3.0]).is_ok());
    }

    #[test]
    fn accessors_skip_warmup_nan() {
        let mut frame = IndicatorFrame::new(3);
        frame.insert("ma", vec![f64::NAN, f64::NAN, 10.5]).unwrap();
        assert_eq!(frame.latest("ma"), Some(10.5));
        assert_eq!(frame.previous("ma"), None);
        assert_eq!(frame.value_at("ma", 0), None);
    }
}
