//! URL query string parsing for the HTTP front end
//!
//! Pairs are decoded with `form_urlencoded`. When a key repeats, the last
//! occurrence wins.

use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Missing query parameter '{0}'")]
    Missing(&'static str),

    #[error("Query parameter '{name}' must be an integer, got '{value}'")]
    NotInteger { name: &'static str, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    /// Parse the raw query component of a URI (without the leading `?`)
    pub fn parse(raw: Option<&str>) -> Self {
        let params = form_urlencoded::parse(raw.unwrap_or_default().as_bytes())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        Self { params }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.iter().rev().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn required(&self, name: &'static str) -> Result<&str, QueryError> {
        self.get(name).ok_or(QueryError::Missing(name))
    }

    pub fn required_int<T: FromStr>(&self, name: &'static str) -> Result<T, QueryError> {
        parse_int(name, self.required(name)?)
    }

    /// Integer parameter, or `default` when absent
    pub fn int_or<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, QueryError> {
        match self.get(name) {
            Some(value) => parse_int(name, value),
            None => Ok(default),
        }
    }
}

fn parse_int<T: FromStr>(name: &'static str, value: &str) -> Result<T, QueryError> {
    value
        .trim()
        .parse()
        .map_err(|_| QueryError::NotInteger { name, value: value.to_string() })
}
