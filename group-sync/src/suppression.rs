//! Recognition of engine-caused changes
//!
//! Every write the engine performs comes back from the host as an ordinary
//! change event. Before writing, the engine marks the control point as
//! pending; the first change event on that control point consumes the mark.
//! Without this, a group volume write would re-trigger the member volume
//! handler, which would write the group volume again, and so on.

use std::collections::HashMap;

use control_store::ControlValue;
use parking_lot::Mutex;

use crate::model::ControlPointId;

/// How a change on a pending control point is classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuppressionPolicy {
    /// The change is an echo only if it carries the value the engine wrote.
    /// A different value is treated as an external change. The pending
    /// entry is consumed either way.
    #[default]
    ValueMatch,
    /// Any change on a pending control point is an echo, whatever its value.
    Presence,
}

/// One-shot registry of control points the engine has just written
#[derive(Debug, Default)]
pub struct SuppressionRegistry {
    policy: SuppressionPolicy,
    pending: Mutex<HashMap<ControlPointId, ControlValue>>,
}

impl SuppressionRegistry {
    pub fn new(policy: SuppressionPolicy) -> Self {
        Self {
            policy,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> SuppressionPolicy {
        self.policy
    }

    /// Record that the next change of `control` is caused by the engine
    ///
    /// A previous mark for the same control point is replaced.
    pub fn mark_pending(&self, control: &ControlPointId, value: ControlValue) {
        tracing::trace!("Marking {} pending with {}", control, value);
        self.pending.lock().insert(control.clone(), value);
    }

    /// Consume the mark for `control` and report whether `observed` is its echo
    ///
    /// Returns `false` without side effects when no mark exists.
    pub fn was_self_caused(&self, control: &ControlPointId, observed: &ControlValue) -> bool {
        let Some(written) = self.pending.lock().remove(control) else {
            return false;
        };

        let echo = match self.policy {
            SuppressionPolicy::Presence => true,
            SuppressionPolicy::ValueMatch => values_match(&written, observed),
        };

        if echo {
            tracing::debug!("Change on {} was caused by the engine", control);
        } else {
            tracing::debug!(
                "Change on {} carries {} instead of written {}, treating as external",
                control,
                observed,
                written
            );
        }
        echo
    }

    /// Drop the mark for `control`, e.g. after the write failed
    pub fn discard(&self, control: &ControlPointId) -> bool {
        self.pending.lock().remove(control).is_some()
    }

    pub fn is_pending(&self, control: &ControlPointId) -> bool {
        self.pending.lock().contains_key(control)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Compare a written value with what the host reports back
///
/// Hosts may echo numbers as text or switches as `ON`/`OFF`, so values are
/// compared through their numeric and switch views before falling back to
/// plain equality.
fn values_match(written: &ControlValue, observed: &ControlValue) -> bool {
    if let (Some(a), Some(b)) = (written.as_number(), observed.as_number()) {
        return (a - b).abs() < f64::EPSILON;
    }
    if let (Some(a), Some(b)) = (written.as_switch(), observed.as_switch()) {
        return a == b;
    }
    written == observed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control() -> ControlPointId {
        ControlPointId::new("RINCON_A_volume")
    }

    #[test]
    fn test_unmarked_is_not_self_caused() {
        let registry = SuppressionRegistry::new(SuppressionPolicy::ValueMatch);
        assert!(!registry.was_self_caused(&control(), &ControlValue::Number(5.0)));
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn test_mark_is_single_use() {
        let registry = SuppressionRegistry::new(SuppressionPolicy::ValueMatch);
        registry.mark_pending(&control(), ControlValue::Number(55.0));

        assert!(registry.was_self_caused(&control(), &ControlValue::Number(55.0)));
        assert!(!registry.was_self_caused(&control(), &ControlValue::Number(55.0)));
    }

    #[test]
    fn test_value_match_rejects_other_value_but_consumes() {
        let registry = SuppressionRegistry::new(SuppressionPolicy::ValueMatch);
        registry.mark_pending(&control(), ControlValue::Number(55.0));

        assert!(!registry.was_self_caused(&control(), &ControlValue::Number(70.0)));
        assert!(!registry.is_pending(&control()));
    }

    #[test]
    fn test_presence_ignores_value() {
        let registry = SuppressionRegistry::new(SuppressionPolicy::Presence);
        registry.mark_pending(&control(), ControlValue::Number(55.0));

        assert!(registry.was_self_caused(&control(), &ControlValue::Number(70.0)));
    }

    #[test]
    fn test_value_match_tolerates_host_formatting() {
        assert!(values_match(&ControlValue::Number(55.0), &ControlValue::from("55")));
        assert!(values_match(&ControlValue::Switch(true), &ControlValue::from("ON")));
        assert!(!values_match(&ControlValue::Switch(true), &ControlValue::from("OFF")));
        assert!(values_match(&ControlValue::from("RINCON_B"), &ControlValue::from("RINCON_B")));
    }

    #[test]
    fn test_remark_replaces_value() {
        let registry = SuppressionRegistry::new(SuppressionPolicy::ValueMatch);
        registry.mark_pending(&control(), ControlValue::Number(10.0));
        registry.mark_pending(&control(), ControlValue::Number(20.0));

        assert_eq!(registry.pending_count(), 1);
        assert!(registry.was_self_caused(&control(), &ControlValue::Number(20.0)));
    }

    #[test]
    fn test_discard() {
        let registry = SuppressionRegistry::new(SuppressionPolicy::ValueMatch);
        registry.mark_pending(&control(), ControlValue::Switch(true));
        assert!(registry.discard(&control()));
        assert!(!registry.discard(&control()));
    }
}
