//! Per-identity, per-attribute hysteresis over raw boolean observations.
//!
//! A positive observation must persist for a confidence-dependent window
//! before it is confirmed, and once confirmed it is sticky: later positive
//! observations report [`Debounced::Present`] straight away. A negative
//! observation releases a confirmed attribute only after the full release
//! window. An attribute that was never confirmed is reported absent
//! immediately.
//!
//! ```text
//!            true, held >= confirm(conf)
//!  Absent ─────────────────────────────► Present (sticky)
//!    ▲  ▲                                   │
//!    │  └─── false held >= debounce ────────┤ false
//!    │                                      ▼
//!    └──────────────────────────────── Pending (release grace)
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::clock::Clock;
use crate::config::AttributeConfig;
use crate::error::{ConfigError, ObservationError};
use crate::tracker::TrackId;

/// Confidence assumed for an attribute reported without one.
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Debounced attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Debounced {
    Present,
    Absent,
    Pending,
}

impl Debounced {
    /// True only for a confirmed absence.
    pub fn is_absent(self) -> bool {
        self == Debounced::Absent
    }
}

impl fmt::Display for Debounced {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Debounced::Present => "true",
            Debounced::Absent => "false",
            Debounced::Pending => "pending",
        })
    }
}

/// Hysteresis state for one (identity, attribute). At most one of
/// `present_since` / `missing_since` is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeState {
    pub confirmed: bool,
    pub present_since: Option<f64>,
    pub missing_since: Option<f64>,
    pub last_confidence: f32,
}

/// Seconds a positive observation must persist before it is confirmed.
pub fn confirm_threshold(confidence: f32) -> f64 {
    if confidence > 0.7 {
        1.0
    } else if confidence > 0.5 {
        2.0
    } else {
        3.0
    }
}

impl AttributeState {
    fn observe(&mut self, present: bool, confidence: f32, now: f64, debounce: f64) -> Debounced {
        if present {
            let since = *self.present_since.get_or_insert(now);
            self.missing_since = None;
            self.last_confidence = confidence;

            if self.confirmed || now - since >= confirm_threshold(confidence) {
                self.confirmed = true;
                Debounced::Present
            } else {
                Debounced::Pending
            }
        } else {
            let since = *self.missing_since.get_or_insert(now);
            self.present_since = None;

            let was_confirmed = self.confirmed;
            let release = if was_confirmed { debounce } else { debounce * 0.5 };
            if now - since >= release {
                self.confirmed = false;
                Debounced::Absent
            } else if was_confirmed {
                Debounced::Pending
            } else {
                Debounced::Absent
            }
        }
    }
}

#[derive(Debug, Default)]
struct IdentityAttributes {
    last_update: f64,
    attributes: HashMap<String, AttributeState>,
}

/// Debouncer owned by one camera worker.
pub struct AttributeDebouncer {
    debounce_seconds: f64,
    stale_after_seconds: f64,
    clock: Arc<dyn Clock>,
    identities: HashMap<TrackId, IdentityAttributes>,
}

impl AttributeDebouncer {
    /// Build a debouncer from validated attribute settings.
    pub fn new(config: &AttributeConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            debounce_seconds: config.debounce_seconds,
            stale_after_seconds: config.stale_after_seconds,
            clock,
            identities: HashMap::new(),
        })
    }

    /// Feed one observation of `flags` for `identity`. Attributes missing
    /// from `confidences` use [`DEFAULT_CONFIDENCE`].
    ///
    /// The whole update is rejected, leaving state untouched, if any
    /// attribute name is empty or any supplied confidence is not finite.
    pub fn update(
        &mut self,
        identity: TrackId,
        flags: &BTreeMap<String, bool>,
        confidences: &HashMap<String, f32>,
    ) -> Result<BTreeMap<String, Debounced>, ObservationError> {
        for name in flags.keys() {
            if name.is_empty() {
                return Err(ObservationError::EmptyAttributeName(identity));
            }
        }
        for (name, conf) in confidences {
            if !conf.is_finite() {
                return Err(ObservationError::InvalidConfidence {
                    identity,
                    attribute: name.clone(),
                });
            }
        }

        let now = self.clock.now();
        let debounce = self.debounce_seconds;
        let entry = self.identities.entry(identity).or_default();
        entry.last_update = now;

        let mut out = BTreeMap::new();
        for (name, &present) in flags {
            let confidence = confidences
                .get(name)
                .copied()
                .unwrap_or(DEFAULT_CONFIDENCE);
            let state = entry.attributes.entry(name.clone()).or_default();
            let value = state.observe(present, confidence, now, debounce);
            trace!(identity, attribute = %name, observed = present, debounced = %value);
            out.insert(name.clone(), value);
        }
        Ok(out)
    }

    /// Current hysteresis state of one attribute of one identity.
    pub fn state(&self, identity: TrackId, attribute: &str) -> Option<&AttributeState> {
        self.identities
            .get(&identity)
            .and_then(|i| i.attributes.get(attribute))
    }

    /// Drop all state kept for `identity`.
    pub fn forget(&mut self, identity: TrackId) {
        self.identities.remove(&identity);
    }

    /// Drop identities that have not been updated within the stale window.
    /// Returns how many were dropped.
    pub fn prune_stale(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.identities.len();
        let stale_after = self.stale_after_seconds;
        self.identities
            .retain(|_, ident| now - ident.last_update <= stale_after);
        before - self.identities.len()
    }

    /// Number of identities with attribute state.
    pub fn tracked_identities(&self) -> usize {
        self.identities.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn debouncer(clock: &ManualClock) -> AttributeDebouncer {
        let config = AttributeConfig {
            debounce_seconds: 8.0,
            stale_after_seconds: 30.0,
        };
        AttributeDebouncer::new(&config, Arc::new(clock.clone())).unwrap()
    }

    fn flags(name: &str, value: bool) -> BTreeMap<String, bool> {
        BTreeMap::from([(name.to_string(), value)])
    }

    fn conf(name: &str, value: f32) -> HashMap<String, f32> {
        HashMap::from([(name.to_string(), value)])
    }

    #[test]
    fn test_confirm_thresholds() {
        assert_eq!(confirm_threshold(0.9), 1.0);
        assert_eq!(confirm_threshold(0.7), 2.0);
        assert_eq!(confirm_threshold(0.6), 2.0);
        assert_eq!(confirm_threshold(0.5), 3.0);
        assert_eq!(confirm_threshold(0.1), 3.0);
    }

    #[test]
    fn test_high_confidence_confirms_after_one_second() {
        let clock = ManualClock::new(0.0);
        let mut d = debouncer(&clock);
        let c = conf("helmet", 0.9);

        assert_eq!(d.update(1, &flags("helmet", true), &c).unwrap()["helmet"], Debounced::Pending);
        clock.advance(0.5);
        assert_eq!(d.update(1, &flags("helmet", true), &c).unwrap()["helmet"], Debounced::Pending);
        clock.advance(0.5);
        assert_eq!(d.update(1, &flags("helmet", true), &c).unwrap()["helmet"], Debounced::Present);
        assert!(d.state(1, "helmet").unwrap().confirmed);
    }

    #[test]
    fn test_default_confidence_needs_three_seconds() {
        let clock = ManualClock::new(0.0);
        let mut d = debouncer(&clock);
        let none = HashMap::new();

        d.update(1, &flags("vest", true), &none).unwrap();
        clock.advance(2.9);
        assert_eq!(d.update(1, &flags("vest", true), &none).unwrap()["vest"], Debounced::Pending);
        clock.advance(0.1);
        assert_eq!(d.update(1, &flags("vest", true), &none).unwrap()["vest"], Debounced::Present);
    }

    #[test]
    fn test_never_confirmed_absent_immediately() {
        let clock = ManualClock::new(0.0);
        let mut d = debouncer(&clock);
        let out = d.update(1, &flags("gloves", false), &HashMap::new()).unwrap();
        assert_eq!(out["gloves"], Debounced::Absent);
    }

    #[test]
    fn test_confirmed_release_needs_full_debounce() {
        let clock = ManualClock::new(0.0);
        let mut d = debouncer(&clock);
        let c = conf("helmet", 0.9);
        d.update(1, &flags("helmet", true), &c).unwrap();
        clock.advance(1.0);
        d.update(1, &flags("helmet", true), &c).unwrap();

        clock.advance(1.0);
        assert_eq!(d.update(1, &flags("helmet", false), &c).unwrap()["helmet"], Debounced::Pending);
        clock.advance(7.9);
        assert_eq!(d.update(1, &flags("helmet", false), &c).unwrap()["helmet"], Debounced::Pending);
        clock.advance(0.1);
        assert_eq!(d.update(1, &flags("helmet", false), &c).unwrap()["helmet"], Debounced::Absent);
        assert!(!d.state(1, "helmet").unwrap().confirmed);
    }

    #[test]
    fn test_sticky_after_flicker() {
        let clock = ManualClock::new(0.0);
        let mut d = debouncer(&clock);
        let c = conf("helmet", 0.9);
        d.update(1, &flags("helmet", true), &c).unwrap();
        clock.advance(1.0);
        d.update(1, &flags("helmet", true), &c).unwrap();

        clock.advance(1.0);
        d.update(1, &flags("helmet", false), &c).unwrap();
        clock.advance(1.0);
        // present_since restarts, but the confirmation holds.
        assert_eq!(d.update(1, &flags("helmet", true), &c).unwrap()["helmet"], Debounced::Present);
        let state = d.state(1, "helmet").unwrap();
        assert_eq!(state.present_since, Some(3.0));
        assert_eq!(state.missing_since, None);
    }

    #[test]
    fn test_rejects_malformed_update() {
        let clock = ManualClock::new(0.0);
        let mut d = debouncer(&clock);
        assert!(d.update(1, &flags("", true), &HashMap::new()).is_err());
        assert!(
            d.update(1, &flags("helmet", true), &conf("helmet", f32::NAN))
                .is_err()
        );
        assert_eq!(d.tracked_identities(), 0);
    }

    #[test]
    fn test_prune_stale() {
        let clock = ManualClock::new(0.0);
        let mut d = debouncer(&clock);
        d.update(1, &flags("helmet", true), &HashMap::new()).unwrap();
        clock.advance(20.0);
        d.update(2, &flags("helmet", true), &HashMap::new()).unwrap();
        clock.advance(15.0);
        assert_eq!(d.prune_stale(), 1);
        assert!(d.state(1, "helmet").is_none());
        assert!(d.state(2, "helmet").is_some());
    }
}
