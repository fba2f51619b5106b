use std::borrow::Cow;

/// Parse error for raw query strings.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamsError(pub String);

impl std::fmt::Display for ParamsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "query string error: {}", self.0)
    }
}

impl std::error::Error for ParamsError {}

/// Raw query parameters as the web layer hands them over: each key maps to
/// one or more string values, in the order keys first appeared.
///
/// A repeated key reads as its values joined with `,`, so `?a=1&a=2` is
/// seen by the normalizer as `a = "1,2"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, Vec<String>)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an `application/x-www-form-urlencoded` query string (without
    /// the leading `?`).
    pub fn parse(query: &str) -> Result<Self, ParamsError> {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str(query).map_err(|e| ParamsError(e.to_string()))?;
        Ok(pairs.into_iter().collect())
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    pub fn get(&self, key: &str) -> Option<Cow<'_, str>> {
        self.values(key).map(join_values)
    }

    pub fn values(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Cow<'_, str>)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), join_values(v)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn join_values(values: &[String]) -> Cow<'_, str> {
    match values {
        [single] => Cow::Borrowed(single.as_str()),
        many => Cow::Owned(many.join(",")),
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (k, v) in iter {
            params.append(k, v);
        }
        params
    }
}
