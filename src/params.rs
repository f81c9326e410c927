//! Positional path parameters captured by pattern routes.

/// Ordered `(name, value)` pairs captured from the request path, in regex
/// group order.
///
/// Named captures are keyed `:name`; unnamed groups are keyed `*0`, `*1`, …
/// in the order they appear.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Value of the first parameter called `key`, or `""` if absent.
    ///
    /// ```
    /// # use rondo::Params;
    /// let mut p = Params::new();
    /// p.push(":name", "foobar");
    /// assert_eq!(p.get(":name"), "foobar");
    /// assert_eq!(p.get(":missing"), "");
    /// ```
    pub fn get(&self, key: &str) -> &str {
        self.find(key).unwrap_or("")
    }

    pub fn find(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Value at position `i`, regardless of name.
    pub fn value(&self, i: usize) -> Option<&str> {
        self.0.get(i).map(|(_, v)| v.as_str())
    }

    /// Replaces the first parameter called `key`, or appends it.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.into(),
            None => self.push(key, value),
        }
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_match_wins() {
        let mut p = Params::new();
        p.push(":id", "1");
        p.push(":id", "2");
        assert_eq!(p.get(":id"), "1");
        assert_eq!(p.value(1), Some("2"));
    }

    #[test]
    fn set_overwrites_or_appends() {
        let mut p = Params::new();
        p.set(":a", "x");
        p.set(":a", "y");
        p.set(":b", "z");
        assert_eq!(p.len(), 2);
        assert_eq!(p.get(":a"), "y");
        assert_eq!(p.iter().map(|(k, _)| k).collect::<Vec<_>>(), [":a", ":b"]);
    }
}
