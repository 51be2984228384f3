//! Markdown case documents
//!
//! A document starts with a header (an H1 module name and optional entry URL line)
//! followed by one `##` block per test case. Labels are accepted in Chinese or English.

use super::DraftCase;
use regex::Regex;
use std::sync::OnceLock;

/// Header fields of a markdown document plus the raw case drafts
#[derive(Debug, Default)]
pub struct MarkdownDocument {
    pub module: Option<String>,
    pub entry_url: Option<String>,
    pub cases: Vec<DraftCase>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    None,
    Preconditions,
    Steps,
    Expected,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Id,
    Title,
    Priority,
    TestType,
    Module,
    EntryUrl,
    Section(Section),
}

fn list_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:[-*+]\s+|\d+[.)）]\s+|\d+、\s*)").unwrap())
}

fn case_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\[?(?P<id>[A-Za-z0-9][A-Za-z0-9_.\-]*\d[A-Za-z0-9_.\-]*|\d+)\]?(?:\s*[:：、\-–]\s*|\s+|$)(?P<title>.*)$",
        )
        .unwrap()
    })
}

/// Parse markdown text into header fields and case drafts
pub fn parse_markdown(content: &str) -> MarkdownDocument {
    let mut doc = MarkdownDocument::default();
    let mut current: Option<DraftCase> = None;
    let mut section = Section::None;
    let mut in_code_block = false;

    for raw_line in content.lines() {
        let line = raw_line.trim();

        if line.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block || line.is_empty() || is_rule(line) {
            continue;
        }

        if let Some((level, text)) = heading(line) {
            match level {
                1 if current.is_none() => {
                    let text = strip_bold(text);
                    let module = match split_field(&text) {
                        Some((Field::Module, value)) => value,
                        _ => text,
                    };
                    if !module.is_empty() {
                        doc.module = Some(module);
                    }
                }
                1 | 2 => {
                    if let Some(done) = current.take() {
                        doc.cases.push(done);
                    }
                    current = Some(draft_from_heading(&strip_bold(text)));
                    section = Section::None;
                }
                _ => {
                    section = match split_field(&strip_bold(text)) {
                        Some((Field::Section(s), _)) => s,
                        _ => classify_section(&strip_bold(text)).unwrap_or(Section::None),
                    };
                }
            }
            continue;
        }

        let is_item = list_marker_re().is_match(line);
        let text = strip_bold(&list_marker_re().replace(line, ""));
        if text.is_empty() {
            continue;
        }

        let Some(case) = current.as_mut() else {
            match split_field(&text) {
                Some((Field::Module, value)) if !value.is_empty() => doc.module = Some(value),
                Some((Field::EntryUrl, value)) if !value.is_empty() => doc.entry_url = Some(value),
                _ => {}
            }
            continue;
        };

        // Bare section labels such as "**测试步骤：**" switch sections like a heading would
        if let Some((Field::Section(s), value)) = split_field(&text) {
            section = s;
            if !value.is_empty() {
                push_item(case, section, value);
            }
            continue;
        }
        if !is_item {
            if let Some(s) = classify_section(&text) {
                section = s;
                continue;
            }
        }

        if section == Section::None {
            if let Some((field, value)) = split_field(&text) {
                apply_field(case, field, value);
            }
            continue;
        }

        push_item(case, section, text);
    }

    if let Some(done) = current.take() {
        doc.cases.push(done);
    }
    doc
}

fn is_rule(line: &str) -> bool {
    line.len() >= 3 && line.chars().all(|c| c == '-' || c == '*' || c == '=')
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 {
        return None;
    }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some((level, rest.trim()))
}

fn strip_bold(text: &str) -> String {
    text.replace("**", "").replace("__", "").trim().to_string()
}

fn draft_from_heading(text: &str) -> DraftCase {
    let mut draft = DraftCase::default();
    if let Some(caps) = case_heading_re().captures(text) {
        draft.id = Some(caps["id"].to_string());
        let title = caps["title"].trim();
        if !title.is_empty() {
            draft.title = Some(title.to_string());
        }
    } else if !text.is_empty() {
        draft.title = Some(text.to_string());
    }
    draft
}

fn push_item(case: &mut DraftCase, section: Section, text: String) {
    match section {
        Section::Preconditions => case.preconditions.push(text),
        Section::Steps => case.steps.push(text),
        Section::Expected => case.expected_results.push(text),
        Section::None => {}
    }
}

fn apply_field(case: &mut DraftCase, field: Field, value: String) {
    if value.is_empty() {
        return;
    }
    match field {
        Field::Id => case.id = Some(value),
        Field::Title => case.title = Some(value),
        Field::Priority => case.priority = Some(value),
        Field::TestType => case.test_type = Some(value),
        Field::Module => case.module = Some(value),
        Field::EntryUrl => case.entry_url = Some(value),
        Field::Section(_) => {}
    }
}

/// Split "label: value" when the label is a recognized field name
fn split_field(text: &str) -> Option<(Field, String)> {
    let idx = text.find([':', '：'])?;
    let label = &text[..idx];
    let sep_len = text[idx..].chars().next().map_or(1, char::len_utf8);
    let value = text[idx + sep_len..].trim().to_string();
    let field = classify_field(label)?;
    Some((field, value))
}

fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-' && *c != '*')
        .collect::<String>()
        .to_lowercase()
}

fn classify_field(label: &str) -> Option<Field> {
    let field = match normalize_label(label).as_str() {
        "id" | "caseid" | "testid" | "testcaseid" | "用例id" | "用例编号" | "编号" => Field::Id,
        "title" | "name" | "标题" | "用例标题" | "用例名称" | "名称" => Field::Title,
        "priority" | "优先级" => Field::Priority,
        "type" | "testtype" | "类型" | "测试类型" | "用例类型" => Field::TestType,
        "module" | "模块" | "所属模块" | "功能模块" => Field::Module,
        "entryurl" | "url" | "入口url" | "入口地址" | "入口" | "访问地址" | "测试地址" => {
            Field::EntryUrl
        }
        other => Field::Section(classify_section(other)?),
    };
    Some(field)
}

fn classify_section(label: &str) -> Option<Section> {
    match normalize_label(label).trim_end_matches([':', '：']) {
        "preconditions" | "precondition" | "前置条件" | "预置条件" | "前提条件" => {
            Some(Section::Preconditions)
        }
        "steps" | "teststeps" | "测试步骤" | "操作步骤" | "步骤" | "执行步骤" => {
            Some(Section::Steps)
        }
        "expectedresults" | "expectedresult" | "expected" | "预期结果" | "期望结果" => {
            Some(Section::Expected)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_and_case() {
        let md = r#"
# 登录模块
入口URL: https://app.test/login

## TC-001: 登录成功
- 优先级: P1
- 类型: 冒烟测试

### 前置条件
- 已注册账号 admin

### 测试步骤
1. 打开登录页面
2. 在账号输入框输入admin
3. 验证页面显示"欢迎"

### 预期结果
1. 登录成功并显示欢迎
"#;
        let doc = parse_markdown(md);
        assert_eq!(doc.module.as_deref(), Some("登录模块"));
        assert_eq!(doc.entry_url.as_deref(), Some("https://app.test/login"));
        assert_eq!(doc.cases.len(), 1);

        let case = &doc.cases[0];
        assert_eq!(case.id.as_deref(), Some("TC-001"));
        assert_eq!(case.title.as_deref(), Some("登录成功"));
        assert_eq!(case.priority.as_deref(), Some("P1"));
        assert_eq!(case.test_type.as_deref(), Some("冒烟测试"));
        assert_eq!(case.preconditions, vec!["已注册账号 admin"]);
        assert_eq!(case.steps.len(), 3);
        assert_eq!(case.steps[1], "在账号输入框输入admin");
        assert_eq!(case.expected_results, vec!["登录成功并显示欢迎"]);
    }

    #[test]
    fn test_english_labels_and_bold_sections() {
        let md = r#"
# Module: Checkout
Entry URL: https://shop.test

## Place order
- **ID**: CHK_02
- **Priority**: High

**Steps:**
1. Click "Buy now"
2. Wait 2 seconds

**Expected Results:**
- Order confirmation is shown
"#;
        let doc = parse_markdown(md);
        assert_eq!(doc.module.as_deref(), Some("Checkout"));
        let case = &doc.cases[0];
        assert_eq!(case.id.as_deref(), Some("CHK_02"));
        assert_eq!(case.title.as_deref(), Some("Place order"));
        assert_eq!(case.priority.as_deref(), Some("High"));
        assert_eq!(case.steps, vec!["Click \"Buy now\"", "Wait 2 seconds"]);
        assert_eq!(case.expected_results.len(), 1);
    }

    #[test]
    fn test_heading_variants() {
        assert_eq!(draft_from_heading("[TC-7] Logout").id.as_deref(), Some("TC-7"));
        assert_eq!(draft_from_heading("LOGIN_01 登录").title.as_deref(), Some("登录"));
        let untitled = draft_from_heading("TC-9");
        assert_eq!(untitled.id.as_deref(), Some("TC-9"));
        assert!(untitled.title.is_none());
        let no_id = draft_from_heading("测试用例：登录");
        assert!(no_id.id.is_none());
        assert_eq!(no_id.title.as_deref(), Some("测试用例：登录"));
    }

    #[test]
    fn test_numbered_step_keeps_decimal_values() {
        let md = "## TC-1: wait\n### Steps\n1. 等待1.5秒\n2、点击提交\n";
        let doc = parse_markdown(md);
        assert_eq!(doc.cases[0].steps, vec!["等待1.5秒", "点击提交"]);
    }

    #[test]
    fn test_code_blocks_are_ignored() {
        let md = "## TC-1: t\n### 测试步骤\n1. 打开首页\n```\n## TC-2: not a case\n```\n";
        let doc = parse_markdown(md);
        assert_eq!(doc.cases.len(), 1);
        assert_eq!(doc.cases[0].steps, vec!["打开首页"]);
    }
}
