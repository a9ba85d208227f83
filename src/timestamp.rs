/// Milliseconds since the Unix epoch. Callers pass the current time in, the
/// tables never read a clock themselves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub ms_since_1970: u64,
}

impl Timestamp {
    pub const fn from_ms(ms_since_1970: u64) -> Self {
        Self { ms_since_1970 }
    }

    #[cfg(test)]
    pub(crate) fn zero() -> Self {
        Self::from_ms(0)
    }

    pub fn adding(&self, ms: u64) -> Self {
        Self {
            ms_since_1970: self.ms_since_1970.saturating_add(ms),
        }
    }

    /// Milliseconds from `earlier` to `self`, or `None` if `earlier` is later.
    pub fn difference(&self, earlier: &Self) -> Option<u64> {
        self.ms_since_1970.checked_sub(earlier.ms_since_1970)
    }

    pub fn max(&self, other: Self) -> Self {
        Timestamp {
            ms_since_1970: self.ms_since_1970.max(other.ms_since_1970),
        }
    }
}
