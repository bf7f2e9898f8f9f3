use std::time::Duration;

/// How long a freshly produced value may live in the store.
///
/// The policy is consumed exactly once, by the owner of a generation, after
/// its initializer succeeded and before the value is written to the store.
/// Hits and failed generations never evaluate it.
pub(crate) trait TtlPolicy<V> {
    fn ttl_for(self, value: &V) -> Duration;
}

/// Same duration for every value, known before the initializer runs.
pub(crate) struct Fixed(pub(crate) Duration);

impl<V> TtlPolicy<V> for Fixed {
    fn ttl_for(self, _value: &V) -> Duration {
        self.0
    }
}

/// Duration derived from the produced value, e.g. a token that embeds its
/// own remaining lifetime.
pub(crate) struct FromValue<F>(pub(crate) F);

impl<V, F> TtlPolicy<V> for FromValue<F>
where
    F: FnOnce(&V) -> Duration,
{
    fn ttl_for(self, value: &V) -> Duration {
        (self.0)(value)
    }
}
