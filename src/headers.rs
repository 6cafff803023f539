//! Header translation between the outer and inner models.
//!
//! The outer layer hands headers over as a list of entries where each value
//! is either one string, a sequence of strings, or missing altogether. The
//! inner request wants an [`http::HeaderMap`]. The rules are:
//!
//! | Outer entry | Effect on the inner map |
//! |---|---|
//! | `Absent` | skipped |
//! | `Multi(values)` | every value appended under the key, in order |
//! | `Single(value)` | key set, replacing anything already there |

use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::Error;

/// One outer header value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HeaderEntry {
    Single(String),
    Multi(Vec<String>),
    Absent,
}

impl HeaderEntry {
    /// The first value, if any.
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(v) => Some(v),
            Self::Multi(vs) => vs.first().map(String::as_str),
            Self::Absent => None,
        }
    }
}

impl From<&str> for HeaderEntry {
    fn from(v: &str) -> Self {
        Self::Single(v.to_owned())
    }
}

impl From<String> for HeaderEntry {
    fn from(v: String) -> Self {
        Self::Single(v)
    }
}

impl From<Vec<String>> for HeaderEntry {
    fn from(vs: Vec<String>) -> Self {
        Self::Multi(vs)
    }
}

impl<T: Into<HeaderEntry>> From<Option<T>> for HeaderEntry {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Absent, Into::into)
    }
}

/// Ordered outer header entries, as the middleware layer exposes them.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OuterHeaders {
    entries: Vec<(String, HeaderEntry)>,
}

impl OuterHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry. Returns `self` for chaining.
    pub fn with(mut self, name: impl Into<String>, entry: impl Into<HeaderEntry>) -> Self {
        self.push(name, entry);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, entry: impl Into<HeaderEntry>) {
        self.entries.push((name.into(), entry.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Case-insensitive lookup of the first entry named `name`.
    pub fn get(&self, name: &str) -> Option<&HeaderEntry> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Groups a hyper header map into entries: one value per name becomes
    /// `Single`, several become `Multi`.
    ///
    /// Values that are not valid UTF-8 are decoded lossily.
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let entries = map
            .keys()
            .map(|name| {
                let mut values: Vec<String> = map
                    .get_all(name)
                    .iter()
                    .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                    .collect();
                let entry = if values.len() == 1 {
                    HeaderEntry::Single(values.remove(0))
                } else {
                    HeaderEntry::Multi(values)
                };
                (name.as_str().to_owned(), entry)
            })
            .collect();
        Self { entries }
    }

    /// Builds the inner request's header map.
    pub fn to_header_map(&self) -> Result<HeaderMap, Error> {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, entry) in &self.entries {
            match entry {
                HeaderEntry::Absent => {}
                HeaderEntry::Multi(values) => {
                    let key = header_name(name)?;
                    for value in values {
                        map.append(key.clone(), header_value(name, value)?);
                    }
                }
                HeaderEntry::Single(value) => {
                    map.insert(header_name(name)?, header_value(name, value)?);
                }
            }
        }
        Ok(map)
    }
}

impl<K: Into<String>, V: Into<HeaderEntry>> FromIterator<(K, V)> for OuterHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

fn header_name(name: &str) -> Result<HeaderName, Error> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| Error::InvalidHeader { name: name.to_owned() })
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value).map_err(|_| Error::InvalidHeader { name: name.to_owned() })
}
