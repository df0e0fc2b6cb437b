//! Decaying tags.
//!
//! A decaying tag contributes a per-peer value to the peer's weight. Every
//! `interval` the tag's [`DecayFn`] rewrites each value, possibly removing it;
//! [`DecayingTag::bump`] feeds new activity through the tag's [`BumpFn`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use libp2p::PeerId;
use web_time::Instant;

use crate::basic::Inner;
use crate::error::ConnManagerError;

/// The value a decaying tag holds for one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecayingValue {
    pub tag: String,
    pub peer_id: PeerId,
    /// When the value was first created.
    pub added: Instant,
    /// When the value was last bumped.
    pub last_visit: Instant,
    pub value: i64,
}

/// Given the current value and the tick instant, returns the decayed value and
/// whether the value should be removed.
pub type DecayFn = Arc<dyn Fn(&DecayingValue, Instant) -> (i64, bool) + Send + Sync>;

/// Given the current value and a delta, returns the new value.
pub type BumpFn = Arc<dyn Fn(&DecayingValue, i64) -> i64 + Send + Sync>;

/// Registration of a decaying tag inside the manager.
pub(crate) struct TagState {
    pub(crate) interval: Duration,
    pub(crate) next_tick: Instant,
    pub(crate) decay: DecayFn,
    pub(crate) bump: BumpFn,
}

/// Handle to a registered decaying tag.
pub struct DecayingTag {
    name: String,
    interval: Duration,
    inner: Arc<Inner>,
    closed: AtomicBool,
}

impl fmt::Debug for DecayingTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecayingTag")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl DecayingTag {
    pub(crate) fn new(name: String, interval: Duration, inner: Arc<Inner>) -> Self {
        Self {
            name,
            interval,
            inner,
            closed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective interval, after rounding up to the decayer resolution.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn ensure_open(&self) -> Result<(), ConnManagerError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ConnManagerError::TagClosed {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Apply the bump function to the peer's value, creating it at zero first if needed.
    pub fn bump(&self, peer_id: &PeerId, delta: i64) -> Result<(), ConnManagerError> {
        self.ensure_open()?;
        self.inner.bump_decaying(&self.name, peer_id, delta)
    }

    /// Remove the peer's value for this tag.
    pub fn remove(&self, peer_id: &PeerId) -> Result<(), ConnManagerError> {
        self.ensure_open()?;
        self.inner.remove_decaying(&self.name, peer_id)
    }

    /// Unregister the tag and drop every value it holds.
    pub fn close(&self) -> Result<(), ConnManagerError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(ConnManagerError::TagClosed {
                name: self.name.clone(),
            });
        }
        self.inner.close_decaying_tag(&self.name);
        Ok(())
    }
}

/// Values never decay.
pub fn decay_none() -> DecayFn {
    Arc::new(|value, _| (value.value, false))
}

/// Subtract `minuend` each tick, removing the value once it reaches zero.
pub fn decay_fixed(minuend: i64) -> DecayFn {
    Arc::new(move |value, _| {
        let after = value.value.saturating_sub(minuend);
        (after, after <= 0)
    })
}

/// Multiply by `coef` each tick (rounded down), removing the value once it reaches zero.
pub fn decay_linear(coef: f64) -> DecayFn {
    Arc::new(move |value, _| {
        let after = (value.value as f64 * coef).floor() as i64;
        (after, after <= 0)
    })
}

/// Keep the value until it has not been bumped for `after`.
pub fn decay_expire_when_inactive(after: Duration) -> DecayFn {
    Arc::new(move |value, now| {
        let inactive = now.saturating_duration_since(value.last_visit) >= after;
        (value.value, inactive)
    })
}

/// Add the delta.
pub fn bump_sum_unbounded() -> BumpFn {
    Arc::new(|value, delta| value.value.saturating_add(delta))
}

/// Add the delta, clamping the result to `[min, max]`.
pub fn bump_sum_bounded(min: i64, max: i64) -> BumpFn {
    Arc::new(move |value, delta| value.value.saturating_add(delta).clamp(min, max))
}

/// Replace the value with the delta.
pub fn bump_overwrite() -> BumpFn {
    Arc::new(|_, delta| delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(v: i64, last_visit: Instant) -> DecayingValue {
        DecayingValue {
            tag: "t".to_string(),
            peer_id: PeerId::random(),
            added: last_visit,
            last_visit,
            value: v,
        }
    }

    #[test]
    fn test_decay_none() {
        let now = Instant::now();
        assert_eq!(decay_none()(&value(7, now), now), (7, false));
    }

    #[test]
    fn test_decay_fixed() {
        let now = Instant::now();
        let decay = decay_fixed(3);
        assert_eq!(decay(&value(10, now), now), (7, false));
        assert_eq!(decay(&value(3, now), now), (0, true));
        assert_eq!(decay(&value(1, now), now), (-2, true));
    }

    #[test]
    fn test_decay_linear() {
        let now = Instant::now();
        let decay = decay_linear(0.5);
        assert_eq!(decay(&value(9, now), now), (4, false));
        assert_eq!(decay(&value(1, now), now), (0, true));
    }

    #[test]
    fn test_decay_expire_when_inactive() {
        let start = Instant::now();
        let decay = decay_expire_when_inactive(Duration::from_secs(10));
        assert_eq!(
            decay(&value(5, start), start + Duration::from_secs(9)),
            (5, false)
        );
        assert_eq!(
            decay(&value(5, start), start + Duration::from_secs(10)),
            (5, true)
        );
    }

    #[test]
    fn test_bump_functions() {
        let now = Instant::now();
        assert_eq!(bump_sum_unbounded()(&value(5, now), 10), 15);
        assert_eq!(bump_sum_bounded(0, 12)(&value(5, now), 10), 12);
        assert_eq!(bump_sum_bounded(0, 12)(&value(5, now), -10), 0);
        assert_eq!(bump_overwrite()(&value(5, now), 42), 42);
    }
}
