//! Shelf layout: which payload keys are monitored and which slot each maps to.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Global default layout instance (built once, cloned on demand)
static DEFAULT_LAYOUT: Lazy<Vec<SlotBinding>> = Lazy::new(|| {
    vec![
        SlotBinding {
            key: "system1".into(),
            slot_id: 1,
            name: "Precision Screwdriver Set".into(),
        },
        SlotBinding {
            key: "system2".into(),
            slot_id: 2,
            name: "Digital Torque Wrench".into(),
        },
    ]
});

/// Binding of a payload key to a provisioned slot
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotBinding {
    /// Key used by the shelf controller in its report (e.g. `system1`)
    pub key: String,
    pub slot_id: i64,
    /// Display label stored when the slot is first provisioned
    pub name: String,
}

/// Build the default two-slot layout
pub fn build_default_layout() -> Vec<SlotBinding> {
    DEFAULT_LAYOUT.clone()
}

/// Validate a layout, returning one message per problem found
pub fn validate_layout(bindings: &[SlotBinding]) -> Vec<String> {
    let mut errors = Vec::new();

    if bindings.is_empty() {
        errors.push("Layout has no monitored slots".to_string());
    }

    let mut keys = HashSet::new();
    let mut ids = HashSet::new();
    for binding in bindings {
        if binding.key.trim().is_empty() {
            errors.push(format!("Slot {} has an empty key", binding.slot_id));
        }
        if binding.name.trim().is_empty() {
            errors.push(format!("Slot {} has an empty name", binding.slot_id));
        }
        if !keys.insert(binding.key.as_str()) {
            errors.push(format!("Duplicate slot key '{}'", binding.key));
        }
        if !ids.insert(binding.slot_id) {
            errors.push(format!("Duplicate slot id {}", binding.slot_id));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_is_valid() {
        let layout = build_default_layout();
        assert_eq!(layout.len(), 2);
        assert!(validate_layout(&layout).is_empty());
    }

    #[test]
    fn test_duplicates_are_reported() {
        let mut layout = build_default_layout();
        layout.push(SlotBinding {
            key: "system1".into(),
            slot_id: 2,
            name: "Spare".into(),
        });

        let errors = validate_layout(&layout);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("system1")));
        assert!(errors.iter().any(|e| e.contains("id 2")));
    }

    #[test]
    fn test_empty_layout_rejected() {
        assert!(!validate_layout(&[]).is_empty());
    }
}
