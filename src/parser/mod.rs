pub mod error;
pub mod markdown;
pub mod types;
pub mod yaml;

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub use error::ParseError;
pub use types::{Action, CaseFile, TestCase};

/// A test case as read from a document, before required fields are checked
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftCase {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "name")]
    pub title: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default, alias = "type")]
    pub test_type: Option<String>,
    #[serde(default)]
    pub preconditions: Vec<String>,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default, alias = "expected")]
    pub expected_results: Vec<String>,
    #[serde(default, alias = "url")]
    pub entry_url: Option<String>,
}

/// Outcome of parsing every case document under a directory
#[derive(Debug, Default)]
pub struct DirectoryParse {
    pub files: Vec<CaseFile>,
    pub failures: Vec<ParseFailure>,
}

/// A document that could not be parsed; siblings are unaffected
#[derive(Debug)]
pub struct ParseFailure {
    pub path: PathBuf,
    pub error: ParseError,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DocumentKind {
    Markdown,
    Yaml,
}

fn document_kind(path: &Path) -> Option<DocumentKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "md" | "markdown" => Some(DocumentKind::Markdown),
        "yaml" | "yml" => Some(DocumentKind::Yaml),
        _ => None,
    }
}

/// Whether `path` has an extension the parser understands
pub fn is_case_document(path: &Path) -> bool {
    document_kind(path).is_some()
}

/// Parse one case document from disk
pub fn parse_file(path: &Path) -> Result<CaseFile, ParseError> {
    let content = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_file_content(&content, path)
}

/// Parse document text; `virtual_name` decides the format and names the `CaseFile`
///
/// Names without a recognized extension are treated as markdown so inline strings
/// can be parsed without inventing a file name.
pub fn parse_file_content(content: &str, virtual_name: &Path) -> Result<CaseFile, ParseError> {
    let name = virtual_name.display().to_string();
    let kind = document_kind(virtual_name).unwrap_or(DocumentKind::Markdown);

    let (module, entry_url, drafts) = match kind {
        DocumentKind::Markdown => {
            let doc = markdown::parse_markdown(content);
            (doc.module, doc.entry_url, doc.cases)
        }
        DocumentKind::Yaml => {
            let doc = yaml::parse_yaml_content(content).map_err(|source| ParseError::Yaml {
                name: name.clone(),
                source,
            })?;
            (doc.module, doc.entry_url, doc.test_cases)
        }
    };

    let module = non_empty(module).unwrap_or_else(|| {
        virtual_name
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("default")
            .to_string()
    });
    let entry_url = non_empty(entry_url);

    if drafts.is_empty() {
        return Err(ParseError::NoTestCases { name });
    }

    let mut seen = HashSet::new();
    let mut test_cases = Vec::with_capacity(drafts.len());
    for (index, draft) in drafts.into_iter().enumerate() {
        let case = finish_case(draft, index + 1, &name, &module, entry_url.as_deref())?;
        if !seen.insert(case.id.clone()) {
            return Err(ParseError::DuplicateId { name, id: case.id });
        }
        test_cases.push(case);
    }

    Ok(CaseFile {
        file_path: virtual_name.to_path_buf(),
        module,
        entry_url,
        test_cases,
    })
}

/// Parse every case document under `dir`, in lexical path order
///
/// A malformed document is reported in `failures` and never stops the others.
pub fn parse_directory(dir: &Path) -> Result<DirectoryParse, ParseError> {
    let mut result = DirectoryParse::default();
    let walker = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let at_root = e.depth() == 0;
                let path = e.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
                let source = e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "directory loop detected")
                });
                let error = ParseError::Io {
                    path: path.clone(),
                    source,
                };
                // Only an unreadable root is fatal
                if at_root {
                    return Err(error);
                }
                log::warn!("Skipping {}: {}", path.display(), error);
                result.failures.push(ParseFailure { path, error });
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !is_case_document(path) {
            continue;
        }

        match parse_file(path) {
            Ok(file) => result.files.push(file),
            Err(error) => {
                log::warn!("Skipping {}: {}", path.display(), error);
                result.failures.push(ParseFailure {
                    path: path.to_path_buf(),
                    error,
                });
            }
        }
    }

    Ok(result)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn finish_case(
    draft: DraftCase,
    index: usize,
    name: &str,
    module: &str,
    entry_url: Option<&str>,
) -> Result<TestCase, ParseError> {
    let missing = |field| ParseError::MissingField {
        name: name.to_string(),
        index,
        field,
    };
    let id = non_empty(draft.id).ok_or_else(|| missing("id"))?;
    let title = non_empty(draft.title).ok_or_else(|| missing("title"))?;

    let steps: Vec<String> = draft
        .steps
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if steps.is_empty() {
        return Err(ParseError::NoSteps {
            name: name.to_string(),
            id,
        });
    }

    Ok(TestCase {
        id,
        title,
        module: non_empty(draft.module).unwrap_or_else(|| module.to_string()),
        priority: non_empty(draft.priority).unwrap_or_else(|| types::DEFAULT_PRIORITY.to_string()),
        test_type: non_empty(draft.test_type)
            .unwrap_or_else(|| types::DEFAULT_TEST_TYPE.to_string()),
        preconditions: draft.preconditions,
        steps,
        expected_results: draft.expected_results,
        entry_url: non_empty(draft.entry_url).or_else(|| entry_url.map(str::to_string)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_DOC: &str = r#"
# 登录模块
入口URL: https://app.test/login

## TC-001: 管理员登录
### 测试步骤
1. 打开登录页面
2. 在账号输入框输入admin
3. 验证页面显示"欢迎"

## TC-002: 空账号
- 优先级: P0
- 入口URL: https://app.test/login?empty=1
### 测试步骤
1. 点击登录按钮
"#;

    #[test]
    fn test_parse_content_applies_defaults() {
        let file = parse_file_content(LOGIN_DOC, Path::new("login.md")).unwrap();
        assert_eq!(file.module, "登录模块");
        assert_eq!(file.entry_url.as_deref(), Some("https://app.test/login"));
        assert_eq!(file.test_cases.len(), 2);

        let first = &file.test_cases[0];
        assert_eq!(first.priority, "P2");
        assert_eq!(first.test_type, "functional");
        assert_eq!(first.module, "登录模块");
        assert_eq!(first.entry_url.as_deref(), Some("https://app.test/login"));

        let second = &file.test_cases[1];
        assert_eq!(second.id, "TC-002");
        assert_eq!(second.priority, "P0");
        assert_eq!(
            second.entry_url.as_deref(),
            Some("https://app.test/login?empty=1")
        );
    }

    #[test]
    fn test_parse_content_is_idempotent() {
        let a = parse_file_content(LOGIN_DOC, Path::new("login.md")).unwrap();
        let b = parse_file_content(LOGIN_DOC, Path::new("login.md")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_id_is_an_error() {
        let doc = "# M\n## 没有编号的用例\n### 测试步骤\n1. 打开首页\n";
        let err = parse_file_content(doc, Path::new("bad.md")).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { field: "id", .. }));
    }

    #[test]
    fn test_missing_title_is_an_error() {
        let doc = "## TC-1\n### Steps\n1. open\n";
        let err = parse_file_content(doc, Path::new("bad.md")).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { field: "title", .. }));
    }

    #[test]
    fn test_case_without_steps_is_an_error() {
        let doc = "## TC-1: empty\n### 预期结果\n1. nothing\n";
        let err = parse_file_content(doc, Path::new("bad.md")).unwrap_err();
        assert!(matches!(err, ParseError::NoSteps { ref id, .. } if id == "TC-1"));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let doc = "## TC-1: a\n### Steps\n1. x\n## TC-1: b\n### Steps\n1. y\n";
        let err = parse_file_content(doc, Path::new("dup.md")).unwrap_err();
        assert!(matches!(err, ParseError::DuplicateId { .. }));
    }

    #[test]
    fn test_empty_document_has_no_cases() {
        let err = parse_file_content("# Just a title\n", Path::new("empty.md")).unwrap_err();
        assert!(matches!(err, ParseError::NoTestCases { .. }));
    }

    #[test]
    fn test_module_falls_back_to_file_stem() {
        let doc = "## TC-1: a\n### Steps\n1. x\n";
        let file = parse_file_content(doc, Path::new("cases/search.md")).unwrap();
        assert_eq!(file.module, "search");
        assert!(file.entry_url.is_none());
    }

    #[test]
    fn test_yaml_document_by_extension() {
        let yaml = "module: Search\ntestCases:\n  - id: S-1\n    title: find\n    steps: [open home]\n";
        let file = parse_file_content(yaml, Path::new("search.yaml")).unwrap();
        assert_eq!(file.module, "Search");
        assert_eq!(file.test_cases[0].steps, vec!["open home"]);
    }

    #[test]
    fn test_yaml_bare_case_list() {
        let yaml = "- id: A\n  title: t\n  steps: [open]\n";
        let file = parse_file_content(yaml, Path::new("a.yaml")).unwrap();
        assert_eq!(file.module, "a");
        assert_eq!(file.test_cases[0].id, "A");
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_entry_does_not_stop_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a_login.md"), LOGIN_DOC).unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("b_dangling.md"))
            .unwrap();
        std::fs::write(
            dir.path().join("c_search.yml"),
            "- id: S-1\n  title: find\n  steps: [open home]\n",
        )
        .unwrap();

        let parsed = parse_directory(dir.path()).unwrap();
        assert_eq!(parsed.files.len(), 2);
        assert_eq!(parsed.failures.len(), 1);
        assert!(parsed.failures[0].path.ends_with("b_dangling.md"));
        assert!(matches!(parsed.failures[0].error, ParseError::Io { .. }));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(parse_directory(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_directory_reports_failures_alongside_valid_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a_login.md"), LOGIN_DOC).unwrap();
        std::fs::write(
            dir.path().join("b_broken.md"),
            "# M\n## 缺少编号\n### 测试步骤\n1. 打开首页\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("c_search.yml"),
            "testCases:\n  - id: S-1\n    title: find\n    steps: [open home]\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let parsed = parse_directory(dir.path()).unwrap();
        assert_eq!(parsed.files.len(), 2);
        assert_eq!(parsed.failures.len(), 1);
        assert!(parsed.files[0].file_path.ends_with("a_login.md"));
        assert!(parsed.files[1].file_path.ends_with("c_search.yml"));
        assert!(parsed.failures[0].path.ends_with("b_broken.md"));
    }

    #[test]
    fn test_parse_file_reports_missing_file() {
        let err = parse_file(Path::new("/definitely/not/here.md")).unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }
}
