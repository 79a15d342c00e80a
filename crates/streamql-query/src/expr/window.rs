//! Window specifications for aggregations and join bounds.

use std::fmt;

use super::Expression;
use crate::error::{BuildError, BuildResult};

/// Time units accepted by window clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    /// Milliseconds.
    Milliseconds,
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
}

impl TimeUnit {
    /// Returns the unit keyword.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            TimeUnit::Milliseconds => "MILLISECONDS",
            TimeUnit::Seconds => "SECONDS",
            TimeUnit::Minutes => "MINUTES",
            TimeUnit::Hours => "HOURS",
            TimeUnit::Days => "DAYS",
        }
    }

    /// Parses a unit name, singular or plural, in any case.
    pub fn parse(text: &str) -> BuildResult<Self> {
        let upper = text.trim().to_ascii_uppercase();
        match upper.trim_end_matches('S') {
            "MILLISECOND" => Ok(TimeUnit::Milliseconds),
            "SECOND" => Ok(TimeUnit::Seconds),
            "MINUTE" => Ok(TimeUnit::Minutes),
            "HOUR" => Ok(TimeUnit::Hours),
            "DAY" => Ok(TimeUnit::Days),
            _ => Err(BuildError::UnknownTimeUnit(text.to_string())),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// An amount of time, such as `5 MINUTES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowDuration {
    value: i64,
    unit: TimeUnit,
}

impl WindowDuration {
    /// Creates a duration. Positivity is checked on serialization.
    pub const fn new(value: i64, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    /// Parses `"<value> <unit>"`.
    pub fn parse(text: &str) -> BuildResult<Self> {
        let mut parts = text.split_whitespace();
        let (Some(value), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(BuildError::UnknownTimeUnit(text.to_string()));
        };
        let value = value
            .parse::<i64>()
            .map_err(|_| BuildError::UnknownTimeUnit(text.to_string()))?;
        Ok(Self::new(value, TimeUnit::parse(unit)?))
    }

    /// Returns the amount.
    pub const fn value(&self) -> i64 {
        self.value
    }

    /// Returns the unit.
    pub const fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub(crate) fn checked_sql(&self, window: &'static str, part: &'static str) -> BuildResult<String> {
        if self.value <= 0 {
            return Err(BuildError::InvalidWindowDuration {
                window,
                part,
                value: self.value,
            });
        }
        Ok(format!("{} {}", self.value, self.unit))
    }
}

/// Window type and its required durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    /// Fixed-size, non-overlapping windows.
    Tumbling {
        /// Window size.
        size: WindowDuration,
    },
    /// Fixed-size windows advancing by a smaller step.
    Hopping {
        /// Window size.
        size: WindowDuration,
        /// Advance interval.
        advance: WindowDuration,
    },
    /// Activity windows closed by an inactivity gap.
    Session {
        /// Inactivity gap.
        gap: WindowDuration,
    },
}

impl WindowKind {
    /// Returns the window keyword.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            WindowKind::Tumbling { .. } => "TUMBLING",
            WindowKind::Hopping { .. } => "HOPPING",
            WindowKind::Session { .. } => "SESSION",
        }
    }
}

/// `WINDOW <KIND> (..)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowExpr {
    kind: WindowKind,
    retention: Option<WindowDuration>,
    grace: Option<WindowDuration>,
}

impl WindowExpr {
    /// `WINDOW TUMBLING (SIZE ..)`
    pub const fn tumbling(size: WindowDuration) -> Self {
        Self::from_kind(WindowKind::Tumbling { size })
    }

    /// `WINDOW HOPPING (SIZE .., ADVANCE BY ..)`
    pub const fn hopping(size: WindowDuration, advance: WindowDuration) -> Self {
        Self::from_kind(WindowKind::Hopping { size, advance })
    }

    /// `WINDOW SESSION (..)`
    pub const fn session(gap: WindowDuration) -> Self {
        Self::from_kind(WindowKind::Session { gap })
    }

    const fn from_kind(kind: WindowKind) -> Self {
        Self {
            kind,
            retention: None,
            grace: None,
        }
    }

    /// Sets how long window state is retained.
    #[must_use]
    pub const fn retention(mut self, retention: WindowDuration) -> Self {
        self.retention = Some(retention);
        self
    }

    /// Sets how long late events are accepted.
    #[must_use]
    pub const fn grace_period(mut self, grace: WindowDuration) -> Self {
        self.grace = Some(grace);
        self
    }

    /// Returns the window type.
    pub const fn kind(&self) -> &WindowKind {
        &self.kind
    }
}

impl Expression for WindowExpr {
    fn to_sql(&self) -> BuildResult<String> {
        let name = self.kind.as_sql();
        let mut parts = match &self.kind {
            WindowKind::Tumbling { size } => vec![format!("SIZE {}", size.checked_sql(name, "size")?)],
            WindowKind::Hopping { size, advance } => vec![
                format!("SIZE {}", size.checked_sql(name, "size")?),
                format!("ADVANCE BY {}", advance.checked_sql(name, "advance")?),
            ],
            WindowKind::Session { gap } => vec![gap.checked_sql(name, "gap")?],
        };
        if let Some(retention) = &self.retention {
            parts.push(format!("RETENTION {}", retention.checked_sql(name, "retention")?));
        }
        if let Some(grace) = &self.grace {
            parts.push(format!("GRACE PERIOD {}", grace.checked_sql(name, "grace period")?));
        }
        Ok(format!("WINDOW {} ({})", name, parts.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(n: i64) -> WindowDuration {
        WindowDuration::new(n, TimeUnit::Minutes)
    }

    #[test]
    fn test_tumbling() {
        assert_eq!(
            WindowExpr::tumbling(minutes(5)).to_sql().unwrap(),
            "WINDOW TUMBLING (SIZE 5 MINUTES)"
        );
    }

    #[test]
    fn test_hopping() {
        let window = WindowExpr::hopping(minutes(10), minutes(5));
        assert_eq!(
            window.to_sql().unwrap(),
            "WINDOW HOPPING (SIZE 10 MINUTES, ADVANCE BY 5 MINUTES)"
        );
        assert!(WindowExpr::hopping(minutes(10), minutes(0)).to_sql().is_err());
        assert!(WindowExpr::hopping(minutes(-1), minutes(5)).to_sql().is_err());
    }

    #[test]
    fn test_session_with_options() {
        let window = WindowExpr::session(WindowDuration::new(30, TimeUnit::Seconds))
            .retention(WindowDuration::new(7, TimeUnit::Days))
            .grace_period(WindowDuration::new(10, TimeUnit::Minutes));
        assert_eq!(
            window.to_sql().unwrap(),
            "WINDOW SESSION (30 SECONDS, RETENTION 7 DAYS, GRACE PERIOD 10 MINUTES)"
        );
    }

    #[test]
    fn test_non_positive_duration() {
        assert_eq!(
            WindowExpr::tumbling(minutes(0)).to_sql(),
            Err(BuildError::InvalidWindowDuration {
                window: "TUMBLING",
                part: "size",
                value: 0
            })
        );
    }

    #[test]
    fn test_time_unit_parse() {
        assert_eq!(TimeUnit::parse("minute").unwrap(), TimeUnit::Minutes);
        assert_eq!(TimeUnit::parse("HOURS").unwrap(), TimeUnit::Hours);
        assert_eq!(TimeUnit::parse("Milliseconds").unwrap(), TimeUnit::Milliseconds);
        assert!(TimeUnit::parse("weeks").is_err());
        assert!(TimeUnit::parse("").is_err());
    }

    #[test]
    fn test_duration_parse() {
        assert_eq!(WindowDuration::parse("5 minutes").unwrap(), minutes(5));
        assert!(WindowDuration::parse("5").is_err());
        assert!(WindowDuration::parse("five minutes").is_err());
        assert!(WindowDuration::parse("5 fortnights").is_err());
    }
}
