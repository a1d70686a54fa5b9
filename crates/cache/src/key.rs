use std::fmt;

/// One component of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Str(String),
    Int(i64),
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Str(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Str(value)
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        KeyPart::Int(value)
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Str(s) => f.write_str(s),
            KeyPart::Int(n) => write!(f, "{}", n),
        }
    }
}

/// Ordered tuple identifying one logical query.
///
/// Two subscriptions with equal keys share one cache entry and at most one
/// in-flight fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    pub fn new(name: impl Into<KeyPart>) -> Self {
        Self(vec![name.into()])
    }

    /// Append a parameter to the key, e.g. `call-details` + `5`.
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Leading string component, if any.
    pub fn name(&self) -> Option<&str> {
        match self.0.first() {
            Some(KeyPart::Str(s)) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for QueryKey {
    fn from(value: &str) -> Self {
        QueryKey::new(value)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_parts() {
        let key = QueryKey::new("call-details").with(5);
        assert_eq!(key.to_string(), "call-details:5");
        assert_eq!(key.name(), Some("call-details"));
    }

    #[test]
    fn test_parameterized_keys_differ() {
        let a = QueryKey::new("call-details").with(5);
        let b = QueryKey::new("call-details").with(6);
        assert_ne!(a, b);
        assert_eq!(a, QueryKey::new("call-details").with(5));
        assert_ne!(QueryKey::from("calls"), QueryKey::new("calls").with(0));
    }
}
