//! Per-connection device context.
//!
//! Once the model of the connected receiver is known (from discovery or
//! configuration), the dictionary's model sets are matched against it a
//! single time. The resulting [`DeviceContext`] decides which tagged values
//! and ranges may be sent to that receiver.

use std::collections::BTreeSet;

use crate::dictionary::Dictionary;

/// Model-set membership of the connected receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceContext {
    model: String,
    model_sets: BTreeSet<String>,
}

impl DeviceContext {
    /// Resolves the model sets `model` belongs to.
    ///
    /// # Example
    ///
    /// ```
    /// use eiscp::{DeviceContext, Dictionary};
    ///
    /// let dictionary = Dictionary::from_json_str(r#"{
    ///     "modelsets": { "set1": ["NR509"] },
    ///     "zones": []
    /// }"#).unwrap();
    ///
    /// let context = DeviceContext::resolve(&dictionary, "TX-NR509");
    /// assert!(context.supports(Some("set1")));
    /// assert!(!context.supports(Some("set2")));
    /// assert!(context.supports(None));
    /// ```
    pub fn resolve(dictionary: &Dictionary, model: &str) -> Self {
        Self {
            model: model.to_string(),
            model_sets: dictionary.model_sets_for(model),
        }
    }

    /// Returns the model string this context was resolved for.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the active model-set names.
    pub fn model_sets(&self) -> &BTreeSet<String> {
        &self.model_sets
    }

    /// Returns whether an entry tagged with `tag` applies to this device.
    /// Untagged entries apply to every device.
    pub fn supports(&self, tag: Option<&str>) -> bool {
        tag.map_or(true, |t| self.model_sets.contains(t))
    }
}

/// Applies the permissive rule: without a context every entry is allowed.
pub(crate) fn is_allowed(context: Option<&DeviceContext>, tag: Option<&str>) -> bool {
    context.map_or(true, |c| c.supports(tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture_dictionary;

    #[test]
    fn test_resolve_model_sets() {
        let dictionary = fixture_dictionary();
        let context = DeviceContext::resolve(&dictionary, "TX-NR1009");
        assert_eq!(context.model(), "TX-NR1009");
        assert!(context.model_sets().contains("set_hi"));
        assert!(context.model_sets().contains("set_net"));
        assert!(!context.model_sets().contains("set_rx"));
    }

    #[test]
    fn test_unknown_model_has_no_sets() {
        let dictionary = fixture_dictionary();
        let context = DeviceContext::resolve(&dictionary, "XYZ");
        assert!(context.model_sets().is_empty());
        assert!(!context.supports(Some("set_rx")));
        assert!(context.supports(None));
    }

    #[test]
    fn test_permissive_without_context() {
        assert!(is_allowed(None, Some("anything")));
        assert!(is_allowed(None, None));
    }
}
