use std::fmt;
use std::str::FromStr;

/// Granularity of the coordination domain used to claim in-flight slots.
///
/// The mode is fixed when a [`CacheOnce`](crate::CacheOnce) is built. Both
/// modes guarantee that an initializer runs at most once per key and
/// generation; they only differ in how much unrelated work may overlap.
///
/// # Variants
///
/// * `PerKey` - **Independent coordination per key** (default)
///   - Slots live in a sharded map, claims for different keys do not contend
///   - Initializers for different keys run concurrently
///
/// * `Global` - **One coordination domain for all keys**
///   - Slots live behind a single mutex
///   - Only one initializer runs at a time across the whole cache, even for
///     unrelated keys
///
/// # Examples
///
/// ```
/// use cache_once_core::LockMode;
///
/// assert_eq!(LockMode::default(), LockMode::PerKey);
///
/// let mode: LockMode = "global".parse().unwrap();
/// assert_eq!(mode, LockMode::Global);
/// assert_eq!(mode.to_string(), "global");
///
/// assert!("sometimes".parse::<LockMode>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LockMode {
    #[default]
    PerKey,
    Global,
}

/// Error returned when a string does not name a [`LockMode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseLockModeError {
    #[error("unknown lock mode '{0}', expected 'per-key' or 'global'")]
    Unknown(String),
}

/// Parses a lock mode, ignoring case.
///
/// # Supported Values
///
/// - `"per-key"`, `"per_key"`, `"perkey"`, `"key"` → `LockMode::PerKey`
/// - `"global"` → `LockMode::Global`
impl FromStr for LockMode {
    type Err = ParseLockModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "per-key" | "per_key" | "perkey" | "key" => Ok(LockMode::PerKey),
            "global" => Ok(LockMode::Global),
            _ => Err(ParseLockModeError::Unknown(s.to_string())),
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::PerKey => f.write_str("per-key"),
            LockMode::Global => f.write_str("global"),
        }
    }
}
