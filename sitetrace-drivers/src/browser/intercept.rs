//! Observer decorator for network-issuing page entry points.
//!
//! The rendered script wraps each configured entry point before page scripts
//! run, records `{fn, args}` into a session-private buffer on `window`, echoes
//! the same record to the console behind [`JS_CALL_MARKER`], then forwards the
//! call to the wrapped function unchanged.
use anyhow::{anyhow, Result};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

/// First console argument of every mirrored call record.
pub const JS_CALL_MARKER: &str = "JS_CALL";

/// Reads the buffer named by `arguments[0]` and removes it from the page.
pub const HARVEST_SCRIPT: &str = r#"
    const key = arguments[0];
    const calls = window[key];
    try { delete window[key]; } catch (e) {}
    return Array.isArray(calls) ? calls : null;
"#;

/// `name` or `owner.method`, each a JavaScript identifier.
static ENTRY_POINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)?$")
        .expect("entry point pattern is valid")
});

/// A wrapped function, addressed from the page's global object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EntryPoint {
    /// `window[name]`, e.g. `fetch`.
    Global { name: String },
    /// `window[owner].prototype[method]`, e.g. `XMLHttpRequest.open`.
    Prototype { owner: String, method: String },
    /// `window[owner][method]`, e.g. `navigator.sendBeacon`.
    Member { owner: String, method: String },
}

impl EntryPoint {
    /// Parse `name` or `Owner.method`. Capitalised owners are treated as
    /// constructors and patched on their prototype.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if !ENTRY_POINT.is_match(raw) {
            return Err(anyhow!("invalid interception entry point: {raw:?}"));
        }
        Ok(match raw.split_once('.') {
            None => EntryPoint::Global {
                name: raw.to_string(),
            },
            Some((owner, method)) if owner.starts_with(|c: char| c.is_ascii_uppercase()) => {
                EntryPoint::Prototype {
                    owner: owner.to_string(),
                    method: method.to_string(),
                }
            }
            Some((owner, method)) => EntryPoint::Member {
                owner: owner.to_string(),
                method: method.to_string(),
            },
        })
    }

    fn js_target(&self) -> String {
        match self {
            EntryPoint::Global { name } => format!("[window, {name:?}]"),
            EntryPoint::Prototype { owner, method } => {
                format!("[window[{owner:?}] && window[{owner:?}].prototype, {method:?}]")
            }
            EntryPoint::Member { owner, method } => format!("[window[{owner:?}], {method:?}]"),
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryPoint::Global { name } => f.write_str(name),
            EntryPoint::Prototype { owner, method } | EntryPoint::Member { owner, method } => {
                write!(f, "{owner}.{method}")
            }
        }
    }
}

/// The interception script for one session.
#[derive(Debug, Clone)]
pub struct InterceptionScript {
    entry_points: Vec<EntryPoint>,
    buffer_key: String,
}

impl InterceptionScript {
    /// `session_token` keeps the in-page buffer name private to one session.
    pub fn new<I, S>(entry_points: I, session_token: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry_points = entry_points
            .into_iter()
            .map(|raw| EntryPoint::parse(raw.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let token: String = session_token
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        Ok(Self {
            entry_points,
            buffer_key: format!("__sitetrace_calls_{token}"),
        })
    }

    pub fn buffer_key(&self) -> &str {
        &self.buffer_key
    }

    pub fn render(&self) -> String {
        let targets = self
            .entry_points
            .iter()
            .map(|ep| format!("[{}, {:?}]", ep.js_target(), ep.to_string()))
            .collect::<Vec<_>>()
            .join(",\n        ");

        format!(
            r#"
(() => {{
    const KEY = {key:?};
    if (window[KEY]) return;
    Object.defineProperty(window, KEY, {{ value: [], writable: true, configurable: true, enumerable: false }});
    const snapshot = (value) => {{
        if (value === null || value === undefined) return null;
        const kind = typeof value;
        if (kind === 'string' || kind === 'number' || kind === 'boolean') return value;
        if (typeof URL !== 'undefined' && value instanceof URL) return value.toString();
        if (typeof Request !== 'undefined' && value instanceof Request) return {{ url: value.url, method: value.method }};
        try {{ return JSON.parse(JSON.stringify(value)); }} catch (e) {{ return String(value); }}
    }};
    const wrap = (owner, method, label) => {{
        const original = owner && owner[method];
        if (typeof original !== 'function') return;
        owner[method] = function(...args) {{
            try {{
                const record = {{ fn: label, args: args.map(snapshot) }};
                window[KEY].push(record);
                console.log({marker:?}, JSON.stringify(record));
            }} catch (e) {{}}
            return original.apply(this, args);
        }};
    }};
    const targets = [
        {targets}
    ];
    for (const [[owner, method], label] of targets) wrap(owner, method, label);
}})();
"#,
            key = self.buffer_key,
            marker = JS_CALL_MARKER,
            targets = targets,
        )
    }
}
