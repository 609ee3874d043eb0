use std::collections::BTreeMap;

use qt_tensor::Tensor;

/// Non-trainable key holding the number of training steps applied.
pub const TRAIN_STEP_KEY: &str = "train_step";
/// Non-trainable key holding the last lhs calibration scale.
pub const LHS_SCALE_KEY: &str = "lhs_scale";
/// Non-trainable key holding the last rhs calibration scale.
pub const RHS_SCALE_KEY: &str = "rhs_scale";

/// A single non-trainable bookkeeping value.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    /// An integer counter (e.g. the train step).
    Step(u64),
    /// A scalar statistic (e.g. a calibration scale).
    Scalar(f32),
}

impl StateValue {
    pub fn as_step(&self) -> Option<u64> {
        match self {
            StateValue::Step(s) => Some(*s),
            StateValue::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            StateValue::Scalar(v) => Some(*v),
            StateValue::Step(_) => None,
        }
    }
}

/// Layer state: trainable parameters plus non-trainable bookkeeping.
///
/// The state is an immutable value. Layer calls never mutate it in place;
/// they return a new state, which keeps evaluation a pure function and
/// lets callers decide whether to adopt the update.
#[derive(Debug, Clone, Default)]
pub struct LayerState {
    trainable: BTreeMap<String, Tensor>,
    non_trainable: BTreeMap<String, StateValue>,
}

impl LayerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The trainable parameter map.
    pub fn trainable(&self) -> &BTreeMap<String, Tensor> {
        &self.trainable
    }

    /// The non-trainable bookkeeping map.
    pub fn non_trainable(&self) -> &BTreeMap<String, StateValue> {
        &self.non_trainable
    }

    /// Returns a state with the given trainable parameter added.
    pub fn with_trainable(mut self, name: &str, tensor: Tensor) -> Self {
        self.trainable.insert(name.to_string(), tensor);
        self
    }

    /// Returns a state with the given non-trainable entry added or replaced.
    pub fn with_non_trainable(mut self, name: &str, value: StateValue) -> Self {
        self.non_trainable.insert(name.to_string(), value);
        self
    }

    /// The train-step counter, if this layer tracks one.
    pub fn train_step(&self) -> Option<u64> {
        self.non_trainable
            .get(TRAIN_STEP_KEY)
            .and_then(StateValue::as_step)
    }

    /// A non-trainable scalar statistic by key.
    pub fn scalar(&self, key: &str) -> Option<f32> {
        self.non_trainable.get(key).and_then(StateValue::as_scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qt_tensor::Shape;

    #[test]
    fn test_empty_state() {
        let s = LayerState::new();
        assert!(s.trainable().is_empty());
        assert!(s.non_trainable().is_empty());
        assert_eq!(s.train_step(), None);
    }

    #[test]
    fn test_train_step_round_trip() {
        let s = LayerState::new().with_non_trainable(TRAIN_STEP_KEY, StateValue::Step(3));
        assert_eq!(s.train_step(), Some(3));
        // The original value is untouched; updates build new states.
        let s2 = s
            .clone()
            .with_non_trainable(TRAIN_STEP_KEY, StateValue::Step(4));
        assert_eq!(s.train_step(), Some(3));
        assert_eq!(s2.train_step(), Some(4));
    }

    #[test]
    fn test_scalar_entries() {
        let s = LayerState::new().with_non_trainable(LHS_SCALE_KEY, StateValue::Scalar(0.25));
        assert_eq!(s.scalar(LHS_SCALE_KEY), Some(0.25));
        assert_eq!(s.scalar(RHS_SCALE_KEY), None);
        // A scalar never reads as a counter.
        assert_eq!(s.non_trainable()[LHS_SCALE_KEY].as_step(), None);
    }

    #[test]
    fn test_trainable_entries() {
        let s = LayerState::new().with_trainable("kernel", Tensor::ones(Shape::new(vec![2])));
        assert_eq!(s.trainable()["kernel"].shape().dims(), &[2]);
    }
}
