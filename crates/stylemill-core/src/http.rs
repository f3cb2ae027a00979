//! Framework-neutral request and response types.

use crate::errors::MiddlewareError;

pub const CSS_CONTENT_TYPE: &str = "text/css";

/// The parts of an incoming request the middleware looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Raw request target, possibly carrying a query string
    pub path: String,
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }
}

/// A compiled style sheet served straight from memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StyleResponse {
    pub fn css(body: String, max_age: u64) -> Self {
        Self {
            status: 200,
            headers: vec![
                ("Content-Type".to_string(), CSS_CONTENT_TYPE.to_string()),
                ("Cache-Control".to_string(), format!("max-age={}", max_age)),
            ],
            body,
        }
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// What the host framework should do with a request
#[derive(Debug)]
pub enum Outcome {
    /// Answer the request with compiled text
    Respond(StyleResponse),
    /// Hand the request to the next handler, optionally reporting an error
    Next(Option<MiddlewareError>),
}

impl Outcome {
    pub fn is_next(&self) -> bool {
        matches!(self, Outcome::Next(_))
    }

    pub fn response(&self) -> Option<&StyleResponse> {
        match self {
            Outcome::Respond(response) => Some(response),
            Outcome::Next(_) => None,
        }
    }

    pub fn error(&self) -> Option<&MiddlewareError> {
        match self {
            Outcome::Next(error) => error.as_ref(),
            Outcome::Respond(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_response_headers() {
        let response = StyleResponse::css("a{}".to_string(), 3600);
        assert_eq!(response.status, 200);
        assert_eq!(response.header("content-type"), Some("text/css"));
        assert_eq!(response.header("Cache-Control"), Some("max-age=3600"));
        assert_eq!(response.header("ETag"), None);
    }

    #[test]
    fn test_outcome_accessors() {
        let next = Outcome::Next(None);
        assert!(next.is_next());
        assert!(next.response().is_none());
        assert!(next.error().is_none());

        let respond = Outcome::Respond(StyleResponse::css(String::new(), 0));
        assert!(!respond.is_next());
        assert_eq!(respond.response().map(|r| r.status), Some(200));
    }
}
