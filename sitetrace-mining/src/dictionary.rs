//! Literal-token dictionaries compiled into whole-token, case-insensitive
//! matchers.
use std::collections::HashMap;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::error::DictionaryCompileError;

/// Large dictionaries produce big alternations; the default limit is too
/// tight for a few thousand domains.
const MATCHER_SIZE_LIMIT: usize = 64 * 1024 * 1024;

/// An ordered, duplicate-free set of literal tokens plus its matcher.
///
/// An empty dictionary has no matcher and never matches anything.
///
/// ```
/// use sitetrace_mining::PatternDictionary;
///
/// let dict = PatternDictionary::from_lines(["# AI vendors", "api.openai.com", ""]).unwrap();
/// let hits: Vec<_> = dict
///     .matches("GET https://API.OpenAI.com/v1/chat/completions")
///     .collect();
/// assert_eq!(hits, ["api.openai.com"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PatternDictionary {
    tokens: Vec<String>,
    matcher: Option<Regex>,
    canonical: HashMap<String, usize>,
}

impl PatternDictionary {
    /// Build from raw lines: entries are trimmed, blank and `#` lines are
    /// dropped, and case-insensitive duplicates keep their first spelling.
    pub fn from_lines<I, S>(lines: I) -> Result<Self, DictionaryCompileError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tokens = Vec::new();
        let mut canonical = HashMap::new();

        for (n, raw) in lines.into_iter().enumerate() {
            let entry = raw.as_ref().trim();
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }
            if entry.chars().any(char::is_control) {
                return Err(DictionaryCompileError::ControlCharacter {
                    line: n + 1,
                    entry: entry.to_string(),
                });
            }
            let key = entry.to_lowercase();
            if !canonical.contains_key(&key) {
                canonical.insert(key, tokens.len());
                tokens.push(entry.to_string());
            }
        }

        let matcher = compile(&tokens)?;
        Ok(Self {
            tokens,
            matcher,
            canonical,
        })
    }

    /// Load a dictionary file. A missing file yields an empty dictionary with
    /// a warning; any other read failure is an error.
    pub fn load(path: &Path) -> Result<Self, DictionaryCompileError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(target: "mining.dictionary", path = %path.display(), "dictionary not found; treating as empty");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(DictionaryCompileError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let dict = Self::from_lines(contents.lines())?;
        debug!(target: "mining.dictionary", path = %path.display(), tokens = dict.len(), "dictionary compiled");
        Ok(dict)
    }

    /// Tokens in first-seen order.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matcher.is_none()
    }

    /// Every non-overlapping token occurrence in `text`, reported in its
    /// dictionary spelling.
    pub fn matches<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.matcher
            .iter()
            .flat_map(move |re| re.find_iter(text))
            .map(move |m| self.canonical_spelling(m.as_str()))
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.matcher.as_ref().is_some_and(|re| re.is_match(text))
    }

    fn canonical_spelling<'a>(&'a self, found: &'a str) -> &'a str {
        self.canonical
            .get(&found.to_lowercase())
            .map(|&i| self.tokens[i].as_str())
            .unwrap_or(found)
    }
}

fn compile(tokens: &[String]) -> Result<Option<Regex>, DictionaryCompileError> {
    if tokens.is_empty() {
        return Ok(None);
    }

    // Longest first so overlapping literals resolve to the most specific one.
    let mut ordered: Vec<&str> = tokens.iter().map(String::as_str).collect();
    ordered.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let alternation = ordered
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");

    let re = RegexBuilder::new(&format!(r"\b(?:{alternation})\b"))
        .case_insensitive(true)
        .size_limit(MATCHER_SIZE_LIMIT)
        .build()?;
    Ok(Some(re))
}
