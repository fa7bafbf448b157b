use std::fmt;
use std::path::Path;

use tracing::warn;
use url::Url;

use crate::error::TargetListError;

/// One URL to crawl plus its stable 1-based position in the input list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    index: usize,
    url: String,
}

impl Target {
    /// Normalize `raw` and validate it as an absolute URL.
    pub fn new(index: usize, raw: &str) -> Result<Self, TargetListError> {
        let url = normalize_url(raw);
        Url::parse(&url).map_err(|source| TargetListError::InvalidUrl {
            raw: raw.to_string(),
            source,
        })?;
        Ok(Self { index, url })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Bundle directory name: `{index:04}_{scheme}_{host and path}`.
    ///
    /// ```
    /// use sitetrace_crawl::Target;
    ///
    /// let t = Target::new(3, "example.com/tools/list").unwrap();
    /// assert_eq!(t.dir_name(), "0003_https_example.com_tools_list");
    /// ```
    pub fn dir_name(&self) -> String {
        let flattened = self.url.replacen("://", "_", 1).replace('/', "_");
        let safe: String = flattened
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{:04}_{}", self.index, safe)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:04}] {}", self.index, self.url)
    }
}

/// Prefix bare hosts with `https://`.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Shape of a target list file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFormat {
    /// One URL per line; blank and `#` lines ignored.
    Lines,
    /// Comma-separated rows; the URL sits in the given column.
    Csv { url_column: usize },
}

impl ListFormat {
    /// `.csv` files are tabular, everything else is line-oriented.
    pub fn for_path(path: &Path, url_column: usize) -> Self {
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if is_csv {
            ListFormat::Csv { url_column }
        } else {
            ListFormat::Lines
        }
    }
}

/// An input entry that could not become a [`Target`]. Its index stays
/// reserved so later targets keep their list position.
#[derive(Debug)]
pub struct SkippedEntry {
    pub index: usize,
    pub error: TargetListError,
}

#[derive(Debug, Default)]
pub struct TargetList {
    pub targets: Vec<Target>,
    pub skipped: Vec<SkippedEntry>,
}

pub fn load_targets(path: &Path, url_column: usize) -> Result<TargetList, TargetListError> {
    let contents = std::fs::read_to_string(path).map_err(|source| TargetListError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_targets(&contents, ListFormat::for_path(path, url_column)))
}

/// Parse a target list. Every data entry consumes an index, valid or not,
/// so indices track list positions.
pub fn parse_targets(contents: &str, format: ListFormat) -> TargetList {
    let mut list = TargetList::default();
    for (position, entry) in entries(contents, format).into_iter().enumerate() {
        let index = position + 1;
        match entry.and_then(|raw| Target::new(index, &raw)) {
            Ok(target) => list.targets.push(target),
            Err(error) => {
                warn!(target: "crawl.targets", index, error = %error, "skipping target");
                list.skipped.push(SkippedEntry { index, error });
            }
        }
    }
    list
}

fn entries(contents: &str, format: ListFormat) -> Vec<Result<String, TargetListError>> {
    match format {
        ListFormat::Lines => contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|l| Ok(l.to_string()))
            .collect(),
        ListFormat::Csv { url_column } => csv_cells(contents, url_column),
    }
}

/// One URL cell per data row. The first row is a header when its cell does
/// not look like a URL.
fn csv_cells(contents: &str, url_column: usize) -> Vec<Result<String, TargetListError>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(contents.as_bytes());

    let mut cells = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let cell = record.map_err(TargetListError::from).and_then(|record| {
            record
                .get(url_column)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .ok_or(TargetListError::MissingUrl { column: url_column })
        });
        if row == 0 && cell.as_ref().is_ok_and(|c| !looks_like_url(c)) {
            continue;
        }
        cells.push(cell);
    }
    cells
}

fn looks_like_url(cell: &str) -> bool {
    cell.contains("://") || (cell.contains('.') && !cell.contains(' '))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_hosts_get_https() {
        assert_eq!(normalize_url(" example.com "), "https://example.com");
        assert_eq!(normalize_url("http://a.io/x"), "http://a.io/x");
        assert_eq!(normalize_url("HTTPS://A.io"), "HTTPS://A.io");
    }

    #[test]
    fn dir_name_is_filesystem_safe() {
        let t = Target::new(12, "https://example.com/a/b?q=1&r=2").unwrap();
        assert_eq!(t.dir_name(), "0012_https_example.com_a_b_q_1_r_2");
        let t = Target::new(1, "example.com").unwrap();
        assert_eq!(t.dir_name(), "0001_https_example.com");
    }

    #[test]
    fn line_lists_skip_comments_and_blanks() {
        let targets = parse_targets(
            "# tools\nexample.com\n\n  https://b.io/path  \n",
            ListFormat::Lines,
        )
        .targets;
        let urls: Vec<_> = targets.iter().map(|t| t.url()).collect();
        assert_eq!(urls, ["https://example.com", "https://b.io/path"]);
        assert_eq!(targets[1].index(), 2);
    }

    #[test]
    fn csv_lists_use_column_and_skip_header() {
        let csv = "Tool Name,Domain\nAlpha,alpha.ai\nBeta,\"https://beta.io\"\n";
        let targets = parse_targets(csv, ListFormat::Csv { url_column: 1 }).targets;
        let urls: Vec<_> = targets.iter().map(|t| t.url()).collect();
        assert_eq!(urls, ["https://alpha.ai", "https://beta.io"]);
        assert_eq!(targets[0].index(), 1);
    }

    #[test]
    fn invalid_entries_keep_their_index() {
        let list = parse_targets("good.io\nhttps://\nnext.io\n", ListFormat::Lines);
        let indices: Vec<_> = list.targets.iter().map(|t| t.index()).collect();
        assert_eq!(indices, [1, 3]);
        assert_eq!(list.skipped[0].index, 2);
    }

    #[test]
    fn quoted_csv_cells_may_contain_commas() {
        let csv = "name,domain\n\"Acme, Inc\",acme.ai\nBeta,beta.io\n";
        let targets = parse_targets(csv, ListFormat::Csv { url_column: 1 }).targets;
        let urls: Vec<_> = targets.iter().map(|t| t.url()).collect();
        assert_eq!(urls, ["https://acme.ai", "https://beta.io"]);
    }

    #[test]
    fn short_csv_rows_keep_their_index() {
        let csv = "name,domain\nAlpha,alpha.ai\nBroken\nGamma,\nDelta,delta.io\n";
        let list = parse_targets(csv, ListFormat::Csv { url_column: 1 });
        let indices: Vec<_> = list.targets.iter().map(|t| t.index()).collect();
        assert_eq!(indices, [1, 4]);
        assert_eq!(list.targets[1].dir_name(), "0004_https_delta.io");
        let skipped: Vec<_> = list.skipped.iter().map(|s| s.index).collect();
        assert_eq!(skipped, [2, 3]);
        assert!(matches!(
            list.skipped[0].error,
            TargetListError::MissingUrl { column: 1 }
        ));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            ListFormat::for_path(Path::new("urls.CSV"), 2),
            ListFormat::Csv { url_column: 2 }
        );
        assert_eq!(
            ListFormat::for_path(Path::new("urls.txt"), 2),
            ListFormat::Lines
        );
    }
}
