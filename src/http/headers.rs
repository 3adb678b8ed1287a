//! Header rewrite rules.
//!
//! # Rule Syntax
//! ```text
//! "+Field" = ["v1", "v2"]   append every value
//! "-Field" = []             remove all values
//! "Field"  = ["a", "b"]     set to the last value ("b")
//! ```
//!
//! Rules apply in the order they were declared. Values may contain
//! placeholders resolved through a [`Replacer`] at apply time.

use std::fmt;
use std::sync::Arc;

use axum::http::{
    header::{HeaderName, InvalidHeaderName},
    HeaderMap, HeaderValue,
};
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};

use crate::http::replacer::Replacer;

/// One parsed header rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderRule {
    Append(HeaderName, Vec<String>),
    Remove(HeaderName),
    Set(HeaderName, Vec<String>),
}

impl HeaderRule {
    /// Parse a rule from its configuration key and values.
    pub fn parse(key: &str, values: Vec<String>) -> Result<Self, InvalidHeaderName> {
        if let Some(name) = key.strip_prefix('+') {
            Ok(HeaderRule::Append(HeaderName::try_from(name)?, values))
        } else if let Some(name) = key.strip_prefix('-') {
            Ok(HeaderRule::Remove(HeaderName::try_from(name)?))
        } else {
            Ok(HeaderRule::Set(HeaderName::try_from(key)?, values))
        }
    }

    fn name(&self) -> &HeaderName {
        match self {
            HeaderRule::Append(name, _) | HeaderRule::Remove(name) | HeaderRule::Set(name, _) => {
                name
            }
        }
    }
}

/// Ordered set of header rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderRules {
    rules: Vec<HeaderRule>,
}

impl HeaderRules {
    /// Build rules from `(key, values)` pairs, keeping their order.
    pub fn from_pairs<I, K>(pairs: I) -> Result<Self, InvalidHeaderName>
    where
        I: IntoIterator<Item = (K, Vec<String>)>,
        K: AsRef<str>,
    {
        let rules = pairs
            .into_iter()
            .map(|(key, values)| HeaderRule::parse(key.as_ref(), values))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if any rule writes a value under `name`.
    pub fn writes(&self, name: &HeaderName) -> bool {
        self.rules
            .iter()
            .any(|r| !matches!(r, HeaderRule::Remove(_)) && r.name() == name)
    }

    /// Mutate `headers` according to the rules.
    pub fn apply(&self, headers: &mut HeaderMap, replacer: &Replacer) {
        for rule in &self.rules {
            match rule {
                HeaderRule::Append(name, values) => {
                    for value in values {
                        if let Some(v) = resolve(name, value, replacer) {
                            headers.append(name.clone(), v);
                        }
                    }
                }
                HeaderRule::Remove(name) => {
                    headers.remove(name);
                }
                HeaderRule::Set(name, values) => {
                    if let Some(v) = values.last().and_then(|value| resolve(name, value, replacer)) {
                        headers.insert(name.clone(), v);
                    }
                }
            }
        }
    }
}

fn resolve(name: &HeaderName, value: &str, replacer: &Replacer) -> Option<HeaderValue> {
    let resolved = replacer.replace(value);
    match HeaderValue::try_from(resolved) {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(header = %name, "Skipping header rule with invalid value");
            None
        }
    }
}

/// Response header update bound to one host's downstream rules.
#[derive(Debug, Clone)]
pub struct ResponseRewrite {
    rules: Arc<HeaderRules>,
    replacer: Replacer,
}

impl ResponseRewrite {
    pub fn new(rules: Arc<HeaderRules>, replacer: Replacer) -> Self {
        Self { rules, replacer }
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        self.rules.apply(headers, &self.replacer);
    }
}

impl<'de> Deserialize<'de> for HeaderRules {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RulesVisitor;

        impl<'de> Visitor<'de> for RulesVisitor {
            type Value = HeaderRules;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of header rules mapping fields to value lists")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut rules = Vec::new();
                while let Some((key, values)) = map.next_entry::<String, Vec<String>>()? {
                    let rule = HeaderRule::parse(&key, values).map_err(|_| {
                        serde::de::Error::custom(format!("invalid header field in rule '{key}'"))
                    })?;
                    rules.push(rule);
                }
                Ok(HeaderRules { rules })
            }
        }

        deserializer.deserialize_map(RulesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{request::Parts, Request};

    fn replacer() -> Replacer {
        let (parts, _): (Parts, ()) = Request::builder()
            .uri("/shop/cart")
            .body(())
            .unwrap()
            .into_parts();
        Replacer::new(&parts, Some("192.0.2.10:4000"))
    }

    fn rules(pairs: &[(&str, &[&str])]) -> HeaderRules {
        HeaderRules::from_pairs(
            pairs
                .iter()
                .map(|(k, v)| (*k, v.iter().map(|s| s.to_string()).collect())),
        )
        .unwrap()
    }

    #[test]
    fn test_remove_drops_every_value() {
        let mut headers = HeaderMap::new();
        headers.append("x-foo", HeaderValue::from_static("1"));
        headers.append("x-foo", HeaderValue::from_static("2"));
        headers.insert("x-keep", HeaderValue::from_static("yes"));

        rules(&[("-X-Foo", &[])]).apply(&mut headers, &replacer());

        assert!(headers.get("x-foo").is_none());
        assert_eq!(headers.get("x-keep").unwrap(), "yes");
    }

    #[test]
    fn test_set_uses_last_value() {
        let mut headers = HeaderMap::new();
        headers.insert("x-bar", HeaderValue::from_static("old"));

        rules(&[("X-Bar", &["a", "b"])]).apply(&mut headers, &replacer());

        let values: Vec<_> = headers.get_all("x-bar").iter().collect();
        assert_eq!(values, vec!["b"]);
    }

    #[test]
    fn test_append_resolves_placeholders() {
        let mut headers = HeaderMap::new();
        headers.insert("x-client", HeaderValue::from_static("first"));

        rules(&[("+X-Client", &["{remote}", "{path}", "{unknown}"])])
            .apply(&mut headers, &replacer());

        let values: Vec<_> = headers
            .get_all("x-client")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(values, vec!["first", "192.0.2.10", "/shop/cart", "{unknown}"]);
    }

    #[test]
    fn test_rules_apply_in_declared_order() {
        let mut headers = HeaderMap::new();
        rules(&[("+X-Trace", &["a"]), ("-X-Trace", &[]), ("+X-Trace", &["b"])])
            .apply(&mut headers, &replacer());
        assert_eq!(headers.get_all("x-trace").iter().count(), 1);
        assert_eq!(headers.get("x-trace").unwrap(), "b");
    }

    #[test]
    fn test_set_without_values_is_noop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-bar", HeaderValue::from_static("kept"));
        rules(&[("X-Bar", &[])]).apply(&mut headers, &replacer());
        assert_eq!(headers.get("x-bar").unwrap(), "kept");
    }

    #[test]
    fn test_writes_host() {
        let r = rules(&[("Host", &["internal.example"])]);
        assert!(r.writes(&axum::http::header::HOST));
        assert!(!rules(&[("-Host", &[])]).writes(&axum::http::header::HOST));
    }

    #[test]
    fn test_deserialize_preserves_order() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            headers: HeaderRules,
        }

        let parsed: Wrapper = toml::from_str(
            r#"
            [headers]
            "-Server" = []
            "+X-Via" = ["proxy"]
            "X-Upstream" = ["{upstream}"]
            "#,
        )
        .unwrap();

        assert_eq!(
            parsed.headers,
            rules(&[("-Server", &[]), ("+X-Via", &["proxy"]), ("X-Upstream", &["{upstream}"])])
        );
    }

    #[test]
    fn test_invalid_field_rejected() {
        assert!(HeaderRule::parse("+bad header", vec![]).is_err());
    }
}
