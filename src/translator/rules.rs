//! Deterministic keyword-based step translation
//!
//! Recognizes the common verbs test authors use in Chinese and English step
//! descriptions. Output goes through the same validation as reasoning-service output.

use super::validate::decode_actions;
use super::{apply_entry_url, ActionTranslator, TranslateError};
use crate::parser::types::{Action, TestCase};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

#[derive(Debug, Clone, Default)]
pub struct RuleTranslator;

impl RuleTranslator {
    pub fn new() -> Self {
        Self
    }

    /// Translate every step of a case, without the entry URL post-processing
    pub fn translate_steps(&self, test_case: &TestCase) -> Vec<Action> {
        test_case
            .steps
            .iter()
            .flat_map(|step| {
                let raws = translate_step(step, test_case.entry_url.as_deref());
                decode_actions(&raws, step)
            })
            .collect()
    }
}

#[async_trait]
impl ActionTranslator for RuleTranslator {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn translate(&self, test_case: &TestCase) -> Result<Vec<Action>, TranslateError> {
        let actions = self.translate_steps(test_case);
        Ok(apply_entry_url(actions, test_case.entry_url.as_deref()))
    }
}

macro_rules! regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).unwrap())
        }
    };
}

regex!(clause_split_re, r"\s*(?:，?然后|，?并且|，并|；|;|,\s*then\s+|\s+and\s+then\s+)\s*");
regex!(url_re, r#"https?://[^\s"'“”‘’，。）)]+"#);
regex!(quoted_re, r#""([^"]+)"|“([^”]+)”|'([^']+)'|‘([^’]+)’|「([^」]+)」|『([^』]+)』"#);
regex!(screenshot_re, r"(?i)截图|截屏|屏幕快照|screenshot|screen\s*shot");
regex!(wait_re, r"(?i)^(?:等待|等候|wait(?:\s+for)?|sleep)\s*");
regex!(duration_re, r"(?i)(\d+(?:\.\d+)?)\s*(毫秒|ms|milliseconds?|秒钟?|s\b|secs?\b|seconds?|分钟|min(?:ute)?s?)");
regex!(navigate_re, r"(?i)^(?:打开|访问|进入|导航到|跳转到?|前往|open|visit|navigate\s+to|go\s+to|browse\s+to|load)\s*");
regex!(page_word_re, r"(?i)https?://|页面|页|网站|网址|首页|系统|链接|\bpage\b|\bsite\b|\bhomepage\b|\burl\b|\bapp\b");
regex!(verify_start_re, r"(?i)^(?:验证|检查|确认|断言|校验|判断|verify|check|assert|ensure|expect|confirm)(?:\s*that)?\s*");
regex!(verify_contains_re, r"(?i)(?:应该?|能够?|可以)?(?:显示|出现|看到|包含|提示)|should\s+(?:see|show|display|contain)|is\s+(?:shown|displayed|visible)");
regex!(expected_after_re, r"(?i)(?:显示|出现|看到|包含|提示|shows?|displays?|contains?|sees?|see|text)\s*[:：]?\s*(.+)$");
regex!(click_re, r"(?i)^(?:点击|单击|双击|按下|点选|轻触|click(?:\s+on)?|press|tap(?:\s+on)?|hit)\s*");
regex!(fill_word_re, r"(?i)输入|填写|填入|键入|\benter\b|\btype\b|\bfill\b|\binput\b");
regex!(fill_in_field_re, r"^在(?P<field>.+?)(?:输入框|文本框|编辑框|框|字段|栏)?(?:中|里|内)?(?:输入|填写|填入|键入)(?P<value>.*)$");
regex!(fill_verb_first_re, r"^(?:输入|填写|填入|键入)(?P<field>[^:：\s为]+?)(?:\s*[:：为]\s*|\s+)(?P<value>.+)$");
regex!(fill_field_first_re, r"^(?P<field>.+?)(?:输入框|文本框|框|字段|栏)?(?:中|里|内)?(?:输入|填写|填入)(?P<value>.+)$");
regex!(fill_en_into_re, r"(?i)^(?:enter|type|input|fill(?:\s+in)?)\s+(?P<value>.+?)\s+(?:in|into|to|for)\s+(?:the\s+)?(?P<field>.+?)(?:\s+(?:field|input|box|textbox|text\s+box))?$");
regex!(fill_en_with_re, r"(?i)^(?:fill(?:\s+in)?|set)\s+(?:the\s+)?(?P<field>.+?)(?:\s+(?:field|input|box))?\s+(?:with|to)\s+(?P<value>.+)$");
regex!(select_word_re, r"(?i)选择|选中|\bselect\b|\bchoose\b|\bpick\b");
regex!(select_in_field_re, r"^在(?P<field>.+?)(?:下拉框|下拉菜单|下拉列表|列表)?(?:中|里)?选择(?P<value>.+)$");
regex!(select_of_re, r"^(?:选择|选中)(?P<field>.+?)(?:下拉框|下拉菜单|下拉列表|列表)?(?:中|里)的(?P<value>.+)$");
regex!(select_en_re, r"(?i)^(?:select|choose|pick)\s+(?P<value>.+?)\s+(?:from|in)\s+(?:the\s+)?(?P<field>.+?)(?:\s+(?:dropdown|list|menu|select))?$");

/// Translate one natural-language step into raw action objects
pub fn translate_step(step: &str, entry_url: Option<&str>) -> Vec<Value> {
    let clauses: Vec<&str> = clause_split_re()
        .split(step)
        .map(|c| c.trim().trim_end_matches(['。', '.', '!', '！']))
        .filter(|c| !c.is_empty())
        .collect();
    let single = clauses.len() == 1;

    clauses
        .into_iter()
        .map(|clause| {
            let description = if single { step.trim() } else { clause };
            translate_clause(clause, description, entry_url)
        })
        .collect()
}

fn translate_clause(clause: &str, description: &str, entry_url: Option<&str>) -> Value {
    if screenshot_re().is_match(clause) {
        return json!({"type": "screenshot", "description": description});
    }
    if let Some(m) = wait_re().find(clause) {
        return wait_action(&clause[m.end()..], description);
    }
    if navigate_re().is_match(clause) && page_word_re().is_match(clause) {
        let url = url_re()
            .find(clause)
            .map(|m| m.as_str().to_string())
            .or_else(|| entry_url.map(str::to_string));
        return json!({"type": "navigate", "url": url, "description": description});
    }
    if let Some(m) = verify_start_re().find(clause) {
        return verify_action(&clause[m.end()..], description);
    }
    if let Some(m) = click_re().find(clause) {
        return json!({
            "type": "click",
            "selector": click_target(&clause[m.end()..]),
            "description": description,
        });
    }
    if fill_word_re().is_match(clause) {
        return fill_action(clause, description);
    }
    if select_word_re().is_match(clause) {
        return select_action(clause, description);
    }
    if verify_contains_re().is_match(clause) {
        return verify_action(clause, description);
    }
    if url_re().is_match(clause) {
        let url = url_re().find(clause).map(|m| m.as_str());
        return json!({"type": "navigate", "url": url, "description": description});
    }
    json!({"type": "unknown", "description": description})
}

fn first_quoted(text: &str) -> Option<String> {
    let caps = quoted_re().captures(text)?;
    caps.iter()
        .skip(1)
        .flatten()
        .next()
        .map(|m| m.as_str().trim().to_string())
}

/// Strip quotes, articles and trailing punctuation from an extracted phrase
fn clean(text: &str) -> String {
    let text = text.trim().trim_end_matches(['。', '.', '，', ',', '!', '！']);
    if let Some(q) = first_quoted(text) {
        return q;
    }
    let text = text
        .trim_start_matches("the ")
        .trim_start_matches("The ")
        .trim_start_matches('的');
    text.trim_matches(|c: char| c.is_whitespace() || "\"'“”‘’「」『』".contains(c))
        .to_string()
}

fn strip_suffixes<'a>(text: &'a str, suffixes: &[&str]) -> &'a str {
    let mut out = text.trim();
    for suffix in suffixes {
        if let Some(stripped) = out.strip_suffix(suffix) {
            let stripped = stripped.trim_end();
            if !stripped.is_empty() {
                out = stripped;
            }
        }
    }
    out
}

fn click_target(rest: &str) -> String {
    if let Some(q) = first_quoted(rest) {
        return q;
    }
    let target = clean(rest);
    strip_suffixes(
        &target,
        &["按钮", "链接", "图标", "选项", "菜单", "标签", "button", "link", "icon", "tab", "menu item"],
    )
    .to_string()
}

fn wait_action(rest: &str, description: &str) -> Value {
    if let Some(caps) = duration_re().captures(rest) {
        let amount: f64 = caps[1].parse().unwrap_or(0.0);
        let unit = caps[2].to_lowercase();
        let factor = if unit == "毫秒" || unit == "ms" || unit.starts_with("milli") {
            1.0
        } else if unit == "分钟" || unit.starts_with("min") {
            60_000.0
        } else {
            1000.0
        };
        return json!({
            "type": "wait",
            "timeout": (amount * factor).round() as u64,
            "description": description,
        });
    }

    let target = first_quoted(rest).unwrap_or_else(|| {
        strip_suffixes(
            &clean(rest),
            &["出现", "显示", "加载完成", "加载", "to appear", "to load", "is visible", "to be visible"],
        )
        .to_string()
    });
    // "wait for the page to load" names no element
    let generic = target.is_empty() || page_word_re().is_match(&target);
    if generic {
        json!({"type": "wait", "description": description})
    } else {
        json!({"type": "wait", "selector": target, "description": description})
    }
}

fn verify_action(rest: &str, description: &str) -> Value {
    let expected = first_quoted(rest).or_else(|| {
        expected_after_re()
            .captures(rest)
            .map(|caps| clean(&caps[1]))
            .or_else(|| Some(clean(rest)))
    });
    let expected = expected.map(|e| {
        strip_suffixes(&e, &["字样", "文字", "信息", "文本", "提示", "text", "message"])
            .trim_end_matches('了')
            .to_string()
    });
    json!({"type": "verify", "expected": expected, "description": description})
}

fn fill_action(clause: &str, description: &str) -> Value {
    let patterns = [
        fill_in_field_re(),
        fill_verb_first_re(),
        fill_en_into_re(),
        fill_en_with_re(),
        fill_field_first_re(),
    ];
    for re in patterns {
        if let Some(caps) = re.captures(clause) {
            let field = clean(&caps["field"]);
            let value = clean(&caps["value"]);
            if field.is_empty() {
                continue;
            }
            return json!({
                "type": "fill",
                "selector": field,
                "text": value,
                "description": description,
            });
        }
    }
    // Only the value is known; validation turns this into a fallback
    json!({"type": "fill", "text": first_quoted(clause), "description": description})
}

fn select_action(clause: &str, description: &str) -> Value {
    for re in [select_in_field_re(), select_of_re(), select_en_re()] {
        if let Some(caps) = re.captures(clause) {
            return json!({
                "type": "select",
                "selector": clean(&caps["field"]),
                "text": clean(&caps["value"]),
                "description": description,
            });
        }
    }
    json!({"type": "select", "text": first_quoted(clause), "description": description})
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(step: &str) -> Value {
        let mut raws = translate_step(step, None);
        assert_eq!(raws.len(), 1, "expected one action for {step}");
        raws.remove(0)
    }

    #[test]
    fn test_chinese_steps() {
        let fill = one("在账号输入框输入admin");
        assert_eq!(fill["type"], "fill");
        assert_eq!(fill["selector"], "账号");
        assert_eq!(fill["text"], "admin");

        let fill = one("输入密码：123456");
        assert_eq!(fill["selector"], "密码");
        assert_eq!(fill["text"], "123456");

        let click = one("点击登录按钮");
        assert_eq!(click["type"], "click");
        assert_eq!(click["selector"], "登录");

        let click = one("点击“确认”");
        assert_eq!(click["selector"], "确认");

        let verify = one("验证页面显示\"欢迎\"");
        assert_eq!(verify["type"], "verify");
        assert_eq!(verify["expected"], "欢迎");

        let verify = one("页面应显示欢迎字样");
        assert_eq!(verify["expected"], "欢迎");

        let wait = one("等待3秒");
        assert_eq!(wait["type"], "wait");
        assert_eq!(wait["timeout"], 3000);

        let select = one("在城市下拉框中选择北京");
        assert_eq!(select["type"], "select");
        assert_eq!(select["selector"], "城市");
        assert_eq!(select["text"], "北京");

        assert_eq!(one("截图")["type"], "screenshot");
    }

    #[test]
    fn test_english_steps() {
        let nav = one("Open https://shop.test/cart");
        assert_eq!(nav["type"], "navigate");
        assert_eq!(nav["url"], "https://shop.test/cart");

        let fill = one("Enter \"alice\" into the Username field");
        assert_eq!(fill["selector"], "Username");
        assert_eq!(fill["text"], "alice");

        let fill = one("Fill in the Email with bob@shop.test");
        assert_eq!(fill["selector"], "Email");
        assert_eq!(fill["text"], "bob@shop.test");

        let click = one("Click the Login button");
        assert_eq!(click["selector"], "Login");

        let wait = one("Wait for \"Dashboard\" to appear");
        assert_eq!(wait["selector"], "Dashboard");

        let wait = one("Wait 500 ms");
        assert_eq!(wait["timeout"], 500);

        let select = one("Select \"Express\" from the Shipping dropdown");
        assert_eq!(select["selector"], "Shipping");
        assert_eq!(select["text"], "Express");

        let verify = one("Verify the page shows \"Order placed\"");
        assert_eq!(verify["expected"], "Order placed");
    }

    #[test]
    fn test_navigation_uses_entry_url_when_step_has_none() {
        let raws = translate_step("打开登录页面", Some("https://app.test/login"));
        assert_eq!(raws[0]["type"], "navigate");
        assert_eq!(raws[0]["url"], "https://app.test/login");

        let raws = translate_step("打开登录页面", None);
        assert!(raws[0]["url"].is_null());
    }

    #[test]
    fn test_compound_step_yields_several_actions() {
        let raws = translate_step("输入用户名 admin，然后点击登录", None);
        assert_eq!(raws.len(), 2);
        assert_eq!(raws[0]["type"], "fill");
        assert_eq!(raws[1]["type"], "click");
        assert_eq!(raws[1]["description"], "点击登录");
    }

    #[test]
    fn test_unrecognized_step_is_unknown() {
        assert_eq!(one("思考人生")["type"], "unknown");
    }

    #[tokio::test]
    async fn test_translate_login_case() {
        let case = TestCase {
            id: "TC-001".into(),
            title: "登录".into(),
            module: "登录".into(),
            priority: "P1".into(),
            test_type: "functional".into(),
            preconditions: vec![],
            steps: vec![
                "打开 http://localhost:3000/login 页面".into(),
                "在账号输入框输入admin".into(),
                "验证页面显示\"欢迎\"".into(),
            ],
            expected_results: vec![],
            entry_url: Some("https://app.test/login".into()),
        };
        let actions = RuleTranslator::new().translate(&case).await.unwrap();
        assert_eq!(
            actions,
            vec![
                Action::Navigate {
                    url: "https://app.test/login".into(),
                    description: "打开 http://localhost:3000/login 页面".into(),
                },
                Action::Fill {
                    selector: "账号".into(),
                    text: "admin".into(),
                    description: "在账号输入框输入admin".into(),
                },
                Action::Verify {
                    selector: None,
                    text: None,
                    expected: "欢迎".into(),
                    description: "验证页面显示\"欢迎\"".into(),
                },
            ]
        );
    }
}
