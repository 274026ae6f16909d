use crate::rule::RuleKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, fmt, str::FromStr};

pub type Extras = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchType {
    #[default]
    Mbl,
    Booking,
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchType::Mbl => write!(f, "MBL"),
            SearchType::Booking => write!(f, "BOOKING"),
        }
    }
}

impl FromStr for SearchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MBL" => Ok(SearchType::Mbl),
            "BOOKING" => Ok(SearchType::Booking),
            other => Err(format!("unknown search type `{}`", other)),
        }
    }
}

/// Routing context attached to a request and copied verbatim onto its response.
///
/// Values are never mutated in place: every `with*` call consumes the meta and
/// hands back the extended copy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Meta {
    pub task_id: String,
    pub search_no: String,
    pub search_type: SearchType,
    pub cookie_jar_id: u64,
    pub proxy: Option<String>,
    extra: Extras,
}

impl Meta {
    pub fn new(
        task_id: impl Into<String>,
        search_no: impl Into<String>,
        search_type: SearchType,
    ) -> Self {
        Meta {
            task_id: task_id.into(),
            search_no: search_no.into(),
            search_type,
            ..Default::default()
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn with_extras(mut self, extras: Extras) -> Self {
        self.extra.extend(extras);
        self
    }

    pub fn with_identity(mut self, cookie_jar_id: u64, proxy: Option<String>) -> Self {
        self.cookie_jar_id = cookie_jar_id;
        self.proxy = proxy;
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// Reads a value the issuing rule is required to have put there.
    ///
    /// A missing key is a bug in the rule chain, not a data condition.
    pub fn require(&self, key: &str) -> &Value {
        match self.extra.get(key) {
            Some(value) => value,
            None => panic!(
                "meta key `{}` missing for task `{}` (search no `{}`)",
                key, self.task_id, self.search_no
            ),
        }
    }

    pub fn extras(&self) -> &Extras {
        &self.extra
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    PostForm,
    PostBody,
}

/// Transport-agnostic description of the next network call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOption<K> {
    pub rule: K,
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub form_data: Vec<(String, String)>,
    pub body: String,
    pub meta: Meta,
}

impl<K: RuleKey> RequestOption<K> {
    pub fn get(rule: K, url: impl Into<String>, meta: Meta) -> Self {
        RequestOption {
            rule,
            method: Method::Get,
            url: url.into(),
            headers: vec![],
            form_data: vec![],
            body: String::new(),
            meta,
        }
    }

    pub fn post_form(
        rule: K,
        url: impl Into<String>,
        form_data: Vec<(String, String)>,
        meta: Meta,
    ) -> Self {
        RequestOption {
            method: Method::PostForm,
            form_data,
            ..Self::get(rule, url, meta)
        }
    }

    pub fn post_body(rule: K, url: impl Into<String>, body: impl Into<String>, meta: Meta) -> Self {
        RequestOption {
            method: Method::PostBody,
            body: body.into(),
            ..Self::get(rule, url, meta)
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// New option with `headers` appended and `meta` replaced by the given one.
    pub fn copy_and_extend_by(&self, headers: &[(&str, &str)], meta: Option<Meta>) -> Self {
        let mut option = self.clone();
        option.headers.extend(
            headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        );
        if let Some(meta) = meta {
            option.meta = meta;
        }
        option
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response<K> {
    pub rule: K,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub meta: Meta,
}

impl<K: RuleKey> Response<K> {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `name=value` pairs announced through `Set-Cookie` headers.
    pub fn set_cookies(&self) -> BTreeMap<String, String> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case("set-cookie"))
            .filter_map(|(_, v)| v.split(';').next())
            .filter_map(|kv| kv.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect()
    }
}

pub fn cookie_header(cookies: &BTreeMap<String, String>) -> String {
    cookies
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("; ")
}
