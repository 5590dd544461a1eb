//! HTTP method value type.

use std::borrow::Cow;
use std::fmt;

/// An HTTP verb.
///
/// Well-known verbs are interned as associated constants so comparisons and
/// clones of the common case never allocate. A custom verb is normalized to
/// uppercase and compared by value.
#[derive(Clone, Debug, Eq)]
pub struct HttpMethod(Cow<'static, str>);

macro_rules! well_known {
    ($($name:ident => $verb:literal),* $(,)?) => {
        impl HttpMethod {
            $(
                /// Interned singleton for the
                #[doc = stringify!($verb)]
                /// verb.
                pub const $name: HttpMethod = HttpMethod(Cow::Borrowed($verb));
            )*
        }
    };
}

well_known! {
    GET => "GET",
    POST => "POST",
    PUT => "PUT",
    PATCH => "PATCH",
    DELETE => "DELETE",
    HEAD => "HEAD",
    OPTIONS => "OPTIONS",
}

impl HttpMethod {
    /// Builds a method from an arbitrary verb, normalizing it to uppercase.
    ///
    /// Well-known verbs still resolve to their interned singleton so that
    /// `HttpMethod::custom("get") == HttpMethod::GET`.
    pub fn custom(verb: impl AsRef<str>) -> Self {
        let upper = verb.as_ref().to_ascii_uppercase();
        match upper.as_str() {
            "GET" => Self::GET,
            "POST" => Self::POST,
            "PUT" => Self::PUT,
            "PATCH" => Self::PATCH,
            "DELETE" => Self::DELETE,
            "HEAD" => Self::HEAD,
            "OPTIONS" => Self::OPTIONS,
            _ => HttpMethod(Cow::Owned(upper)),
        }
    }

    /// The uppercase verb string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for HttpMethod {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl std::hash::Hash for HttpMethod {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HttpMethod {
    fn from(value: &str) -> Self {
        Self::custom(value)
    }
}

impl From<String> for HttpMethod {
    fn from(value: String) -> Self {
        Self::custom(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_normalizes_to_interned_singleton() {
        assert_eq!(HttpMethod::custom("get"), HttpMethod::GET);
        assert_eq!(HttpMethod::custom("Get"), HttpMethod::GET);
    }

    #[test]
    fn unknown_verb_normalizes_to_uppercase() {
        let m = HttpMethod::custom("purge");
        assert_eq!(m.as_str(), "PURGE");
    }

    #[test]
    fn equality_is_by_value() {
        assert_eq!(HttpMethod::custom("PURGE"), HttpMethod::custom("purge"));
        assert_ne!(HttpMethod::GET, HttpMethod::POST);
    }
}
