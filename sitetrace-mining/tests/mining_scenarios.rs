use std::fs;
use std::path::Path;

use sitetrace_mining::{
    LogMiner, MiningError, MiningRequest, PatternDictionary, mine_to_report,
};

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn request(dir: &Path, domains: &str, functions: &str) -> MiningRequest {
    write(&dir.join("domains.txt"), domains);
    write(&dir.join("functions.txt"), functions);
    MiningRequest {
        domains: dir.join("domains.txt"),
        functions: dir.join("functions.txt"),
        root: dir.join("logs"),
        output: dir.join("out/usage.json"),
        extension: "log".into(),
        concurrency: 4,
    }
}

#[tokio::test]
async fn domain_in_request_line_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let req = request(tmp.path(), "# vendors\napi.openai.com\n", "");
    write(
        &req.root.join("0001_https_a.io/requests.log"),
        "GET https://api.openai.com/v1/chat/completions\n",
    );

    let outcome = mine_to_report(&req).await.unwrap();

    let site = outcome.report.get("0001_https_a.io").unwrap();
    assert!(site.domains.contains("api.openai.com"));
    assert!(site.functions.is_empty());
    let json = fs::read_to_string(&req.output).unwrap();
    assert!(json.contains("\"functions\": []"));
}

#[tokio::test]
async fn site_without_matches_is_absent() {
    let tmp = tempfile::tempdir().unwrap();
    let req = request(tmp.path(), "", "completions.create\n");
    write(&req.root.join("0001_https_a.io/console.log"), "page loaded\n");
    write(
        &req.root.join("0002_https_b.io/console.log"),
        "client.completions.create({model})\n",
    );

    let outcome = mine_to_report(&req).await.unwrap();

    assert!(outcome.report.get("0001_https_a.io").is_none());
    assert!(outcome.report.get("0002_https_b.io").is_some());
    assert_eq!(outcome.stats.sites_scanned, 2);
    assert_eq!(outcome.stats.sites_reported, 1);
}

#[tokio::test]
async fn empty_dictionaries_write_empty_report() {
    let tmp = tempfile::tempdir().unwrap();
    let req = request(tmp.path(), "# only comments\n\n", "   \n");
    write(&req.root.join("0001_https_a.io/x.log"), "api.openai.com\n");

    let outcome = mine_to_report(&req).await.unwrap();

    assert!(outcome.report.is_empty());
    assert_eq!(fs::read_to_string(&req.output).unwrap(), "{}\n");
}

#[tokio::test]
async fn unreadable_file_does_not_hide_other_matches() {
    let tmp = tempfile::tempdir().unwrap();
    let req = request(tmp.path(), "api.anthropic.com\n", "");
    let site = req.root.join("0003_https_c.io");
    // A directory with a log name opens but cannot be read as a file.
    fs::create_dir_all(site.join("broken.log")).unwrap();
    write(&site.join("good.log"), "POST https://api.anthropic.com/v1/messages\n");

    let outcome = mine_to_report(&req).await.unwrap();

    assert_eq!(outcome.stats.files_skipped, 1);
    assert_eq!(outcome.stats.files_scanned, 1);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].site, "0003_https_c.io");
    assert!(outcome.skipped[0].error.to_string().contains("broken.log"));
    let usage = outcome.report.get("0003_https_c.io").unwrap();
    assert!(usage.domains.contains("api.anthropic.com"));
}

#[tokio::test]
async fn sub_token_occurrences_do_not_match() {
    let tmp = tempfile::tempdir().unwrap();
    let req = request(tmp.path(), "openai.com\n", "fetch\n");
    write(
        &req.root.join("0001_https_a.io/x.log"),
        "https://myopenai.com/ prefetched refetch\n",
    );

    let outcome = mine_to_report(&req).await.unwrap();

    assert!(outcome.report.is_empty());
}

#[tokio::test]
async fn reruns_produce_identical_bytes() {
    let tmp = tempfile::tempdir().unwrap();
    let req = request(
        tmp.path(),
        "api.openai.com\napi.cohere.ai\napi.mistral.ai\n",
        "fetch\nXMLHttpRequest.open\n",
    );
    for (site, line) in [
        ("0002_https_b.io", "api.mistral.ai api.OPENAI.com fetch(x)"),
        ("0001_https_a.io", "xmlhttprequest.open api.cohere.ai"),
        ("0003_https_c.io", "api.openai.com api.openai.com"),
    ] {
        write(&req.root.join(site).join("a.log"), line);
        write(&req.root.join(site).join("b.log"), "fetch\n");
    }

    mine_to_report(&req).await.unwrap();
    let first = fs::read(&req.output).unwrap();
    mine_to_report(&req).await.unwrap();
    let second = fs::read(&req.output).unwrap();

    assert_eq!(first, second);
    let text = String::from_utf8(first).unwrap();
    // canonical spelling, sorted
    assert!(text.contains("\"api.mistral.ai\",\n      \"api.openai.com\""));
    assert!(text.contains("\"XMLHttpRequest.open\""));
}

#[tokio::test]
async fn staging_directories_are_ignored() {
    let tmp = tempfile::tempdir().unwrap();
    let dict = PatternDictionary::from_lines(["api.openai.com"]).unwrap();
    write(
        &tmp.path().join(".0001_a.partial-1234/x.log"),
        "api.openai.com\n",
    );

    let outcome = LogMiner::new(dict, PatternDictionary::default())
        .mine(tmp.path())
        .await
        .unwrap();

    assert_eq!(outcome.stats.sites_scanned, 0);
}

#[tokio::test]
async fn missing_root_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let req = request(tmp.path(), "api.openai.com\n", "");

    let err = mine_to_report(&req).await.unwrap_err();

    assert!(matches!(err, MiningError::ArtifactRoot { .. }));
    assert!(!req.output.exists());
}

#[tokio::test]
async fn bad_dictionary_aborts_before_scanning() {
    let tmp = tempfile::tempdir().unwrap();
    let req = request(tmp.path(), "api.openai.com\nbad\u{0}entry\n", "");
    write(&req.root.join("0001_https_a.io/x.log"), "api.openai.com\n");

    let err = mine_to_report(&req).await.unwrap_err();

    assert!(matches!(err, MiningError::Dictionary(_)));
    assert!(!req.output.exists());
}
