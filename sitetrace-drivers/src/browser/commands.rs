//! Chromedriver vendor endpoints that `fantoccini` has no typed wrapper for.
//!
//! Both commands are issued through [`fantoccini::Client::issue_cmd`].
use fantoccini::wd::WebDriverCompatibleCommand;
use http::Method;
use serde_json::{json, Value};
use url::{ParseError, Url};

use super::LogKind;

fn session_endpoint(
    base_url: &Url,
    session_id: Option<&str>,
    tail: &str,
) -> Result<Url, ParseError> {
    // Vendor commands are only ever issued on an established session.
    let session = session_id.ok_or(ParseError::EmptyHost)?;
    base_url.join(&format!("session/{session}/{tail}"))
}

/// `POST /session/{id}/goog/cdp/execute`: run a raw DevTools protocol method.
#[derive(Debug, Clone)]
pub struct CdpExecute {
    pub method: String,
    pub params: Value,
}

impl CdpExecute {
    /// Register a script evaluated in every new document before page scripts.
    pub fn add_script_on_new_document(source: &str) -> Self {
        Self {
            method: "Page.addScriptToEvaluateOnNewDocument".to_string(),
            params: json!({ "source": source }),
        }
    }
}

impl WebDriverCompatibleCommand for CdpExecute {
    fn endpoint(&self, base_url: &Url, session_id: Option<&str>) -> Result<Url, ParseError> {
        session_endpoint(base_url, session_id, "goog/cdp/execute")
    }

    fn method_and_body(&self, _request_url: &Url) -> (Method, Option<String>) {
        let body = json!({ "cmd": self.method, "params": self.params });
        (Method::POST, Some(body.to_string()))
    }
}

/// `POST /session/{id}/se/log`: drain one of the browser's log buffers.
#[derive(Debug, Clone, Copy)]
pub struct GetLog {
    pub kind: LogKind,
}

impl WebDriverCompatibleCommand for GetLog {
    fn endpoint(&self, base_url: &Url, session_id: Option<&str>) -> Result<Url, ParseError> {
        session_endpoint(base_url, session_id, "se/log")
    }

    fn method_and_body(&self, _request_url: &Url) -> (Method, Option<String>) {
        let body = json!({ "type": self.kind.as_str() });
        (Method::POST, Some(body.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_session_scoped() {
        let base = Url::parse("http://localhost:9515/").unwrap();
        let cdp = CdpExecute::add_script_on_new_document("1");
        assert_eq!(
            cdp.endpoint(&base, Some("abc")).unwrap().as_str(),
            "http://localhost:9515/session/abc/goog/cdp/execute"
        );
        let log = GetLog {
            kind: LogKind::Performance,
        };
        assert_eq!(
            log.endpoint(&base, Some("abc")).unwrap().as_str(),
            "http://localhost:9515/session/abc/se/log"
        );
        assert!(log.endpoint(&base, None).is_err());
    }

    #[test]
    fn bodies_name_the_requested_buffer() {
        let base = Url::parse("http://localhost:9515/").unwrap();
        let (method, body) = GetLog {
            kind: LogKind::Browser,
        }
        .method_and_body(&base);
        assert_eq!(method, Method::POST);
        let body: Value = serde_json::from_str(&body.unwrap()).unwrap();
        assert_eq!(body["type"], "browser");

        let (_, body) = CdpExecute::add_script_on_new_document("x()").method_and_body(&base);
        let body: Value = serde_json::from_str(&body.unwrap()).unwrap();
        assert_eq!(body["cmd"], "Page.addScriptToEvaluateOnNewDocument");
        assert_eq!(body["params"]["source"], "x()");
    }
}
