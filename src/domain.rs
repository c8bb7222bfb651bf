/// Suffix carried by address-derived (PTR) names.
pub const REVERSE_SUFFIX: &str = "in-addr.arpa";

/// Names this short or shorter never reach the daily output.
pub const MIN_NAME_LEN: usize = 3;

pub fn is_reverse_name(name: &str) -> bool {
    name.contains(REVERSE_SUFFIX)
}

pub fn is_countable_name(name: &str) -> bool {
    name.chars().count() > MIN_NAME_LEN
}

/// Parses a count column. Surrounding whitespace is ignored.
pub fn parse_count(field: &str) -> Option<u64> {
    field.trim().parse::<u64>().ok()
}

/// A total read back from a rollup file. Hand-edited files may carry
/// decimal totals, which must survive re-aggregation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Total {
    Whole(u64),
    Decimal(f64),
}

impl Total {
    /// Digits with at most one decimal point. Signs and exponents are not
    /// numeric here.
    pub fn parse(field: &str) -> Option<Self> {
        let field = field.trim();
        let digits = field.chars().filter(char::is_ascii_digit).count();
        let points = field.chars().filter(|c| *c == '.').count();
        if digits == 0 || points > 1 || digits + points != field.len() {
            return None;
        }
        if points == 0 {
            if let Ok(whole) = field.parse::<u64>() {
                return Some(Self::Whole(whole));
            }
        }
        field.parse::<f64>().ok().map(Self::Decimal)
    }

    pub fn plus(self, other: Self) -> Self {
        match (self, other) {
            (Self::Whole(a), Self::Whole(b)) => Self::Whole(a.saturating_add(b)),
            (a, b) => Self::Decimal(a.as_f64() + b.as_f64()),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Whole(n) => n as f64,
            Self::Decimal(x) => x,
        }
    }
}

impl std::fmt::Display for Total {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Whole(n) => write!(f, "{}", n),
            Self::Decimal(x) => write!(f, "{}", x),
        }
    }
}
