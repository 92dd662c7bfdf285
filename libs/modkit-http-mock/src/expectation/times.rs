use std::fmt;

/// Invocation-count matcher: how many recorded requests an expectation must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Times {
    /// Any number of matches, including none
    Any,
    Exactly(usize),
    AtLeast(usize),
    AtMost(usize),
}

impl Times {
    #[must_use]
    pub fn once() -> Self {
        Self::Exactly(1)
    }

    #[must_use]
    pub fn never() -> Self {
        Self::Exactly(0)
    }

    #[must_use]
    pub fn exactly(count: usize) -> Self {
        Self::Exactly(count)
    }

    #[must_use]
    pub fn at_least(count: usize) -> Self {
        Self::AtLeast(count)
    }

    #[must_use]
    pub fn at_least_once() -> Self {
        Self::AtLeast(1)
    }

    #[must_use]
    pub fn at_most(count: usize) -> Self {
        Self::AtMost(count)
    }

    #[must_use]
    pub fn any() -> Self {
        Self::Any
    }

    /// Whether `count` matching requests satisfies this matcher
    #[must_use]
    pub fn matches(self, count: usize) -> bool {
        match self {
            Self::Any => true,
            Self::Exactly(n) => count == n,
            Self::AtLeast(n) => count >= n,
            Self::AtMost(n) => count <= n,
        }
    }
}

impl fmt::Display for Times {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = |n: usize| if n == 1 { "time" } else { "times" };
        match *self {
            Self::Any => f.write_str("any number of times"),
            Self::Exactly(0) => f.write_str("never"),
            Self::Exactly(n) => write!(f, "exactly {n} {}", plural(n)),
            Self::AtLeast(n) => write!(f, "at least {n} {}", plural(n)),
            Self::AtMost(n) => write!(f, "at most {n} {}", plural(n)),
        }
    }
}
