//! Keyword registry driving slot extraction
//!
//! Every table the extractor, the synonym expander and the spatial parser
//! consult lives here. A lexicon is plain data: build the default, load one
//! from YAML, or construct it in code, then hand it to the constructors.
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uifunnel_core_types::TargetType;

use crate::errors::{Result, SlotError};
use crate::models::ActionKind;
use crate::relation::Direction;
use crate::text;

/// Rewrites an ambiguous action when a context word is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRule {
    pub from: ActionKind,
    pub to: ActionKind,
    pub words: Vec<String>,
}

/// Vocabulary used to recognise one element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeVocabulary {
    pub target_type: TargetType,
    /// Common names, matched as the whole description or its suffix.
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Attribute inferred when any of `words` occurs in the instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeHint {
    pub words: Vec<String>,
    pub attribute: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionWords {
    pub direction: Direction,
    pub words: Vec<String>,
}

/// Words implying a tighter search radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceWords {
    pub words: Vec<String>,
    pub max_distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotLexicon {
    pub actions: BTreeMap<ActionKind, Vec<String>>,
    /// Characters that turn a preceding action word into a noun (`输入框`).
    pub noun_suffixes: Vec<String>,
    pub context_rules: Vec<ContextRule>,
    pub filler_words: Vec<String>,
    pub leading_particles: Vec<String>,
    pub trailing_particles: Vec<String>,
    pub types: Vec<TypeVocabulary>,
    pub stop_words: Vec<String>,
    /// Particles that split CJK runs into separate keywords.
    pub separators: Vec<String>,
    pub attribute_hints: Vec<AttributeHint>,
    pub synonyms: BTreeMap<String, Vec<String>>,
    /// Chinese term to English equivalents; the reverse direction is derived.
    pub translations: BTreeMap<String, Vec<String>>,
    pub directions: Vec<DirectionWords>,
    pub distance_words: Vec<DistanceWords>,
    pub visual_keywords: Vec<String>,
}

static BUILTIN: Lazy<Arc<SlotLexicon>> = Lazy::new(|| Arc::new(SlotLexicon::default()));

fn words(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn table(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(key, values)| (key.to_string(), words(values)))
        .collect()
}

fn vocabulary(
    target_type: TargetType,
    names: &[&str],
    keywords: &[&str],
    patterns: &[&str],
) -> TypeVocabulary {
    TypeVocabulary {
        target_type,
        names: words(names),
        keywords: words(keywords),
        patterns: words(patterns),
    }
}

fn hint(list: &[&str], attribute: &str, value: &str) -> AttributeHint {
    AttributeHint {
        words: words(list),
        attribute: attribute.to_string(),
        value: value.to_string(),
    }
}

impl Default for SlotLexicon {
    /// Built-in Chinese/English tables.
    fn default() -> Self {
        let mut actions = BTreeMap::new();
        actions.insert(
            ActionKind::Click,
            words(&["点击", "单击", "双击", "点一下", "按下", "click", "tap", "press"]),
        );
        actions.insert(
            ActionKind::Input,
            words(&["输入", "填写", "填入", "键入", "录入", "type", "enter", "fill in", "fill", "input"]),
        );
        actions.insert(
            ActionKind::Select,
            words(&["选择", "选中", "勾选", "选取", "select", "choose", "check", "pick"]),
        );
        actions.insert(
            ActionKind::Navigate,
            words(&["打开", "访问", "跳转到", "导航到", "前往", "navigate to", "navigate", "open", "go to", "visit"]),
        );
        actions.insert(ActionKind::Wait, words(&["等待", "稍等", "wait for", "wait"]));
        actions.insert(
            ActionKind::Hover,
            words(&["悬停", "鼠标移到", "鼠标移动到", "hover over", "hover"]),
        );
        actions.insert(ActionKind::Drag, words(&["拖动", "拖拽", "拖到", "drag"]));
        actions.insert(ActionKind::Scroll, words(&["滚动", "滑动", "scroll"]));

        Self {
            actions,
            noun_suffixes: words(&["框", "栏", "区", "域", "项", "列表"]),
            context_rules: vec![
                ContextRule {
                    from: ActionKind::Select,
                    to: ActionKind::Click,
                    words: words(&["按钮", "链接", "图标", "button", "link", "icon"]),
                },
                ContextRule {
                    from: ActionKind::Input,
                    to: ActionKind::Select,
                    words: words(&["下拉框", "下拉列表", "下拉菜单", "dropdown", "drop-down"]),
                },
            ],
            filler_words: words(&["请", "帮我", "麻烦", "一下", "please", "the", "a", "an"]),
            leading_particles: words(&["在", "从", "把", "将", "向", "往", "on", "in", "into", "at"]),
            trailing_particles: words(&["中", "里", "内", "上", "处", "里面", "当中"]),
            types: vec![
                vocabulary(
                    TargetType::Button,
                    &["按钮", "按键", "button", "btn"],
                    &["提交", "确定", "确认", "取消", "登录", "注册", "保存"],
                    &[r"(?i)\b(submit|login|log in|sign in|sign up|ok|cancel|save)\b"],
                ),
                vocabulary(
                    TargetType::Input,
                    &["输入框", "文本框", "搜索框", "输入栏", "搜索栏", "input", "textbox", "text box", "text field", "field"],
                    &["用户名", "密码", "账号", "邮箱", "手机号", "验证码"],
                    &[r"(?i)\b(username|password|email|e-mail|phone)\b", r"框$"],
                ),
                vocabulary(
                    TargetType::Textarea,
                    &["文本域", "多行文本框", "textarea", "text area"],
                    &["备注", "评论", "留言"],
                    &[r"(?i)\b(comment|message|remarks?)\b"],
                ),
                vocabulary(
                    TargetType::Select,
                    &["下拉框", "下拉列表", "下拉菜单", "选择框", "dropdown", "select", "combobox"],
                    &["下拉"],
                    &[r"(?i)drop-?\s?down"],
                ),
                vocabulary(
                    TargetType::Checkbox,
                    &["复选框", "勾选框", "checkbox"],
                    &["复选"],
                    &[r"(?i)check\s*box"],
                ),
                vocabulary(
                    TargetType::Radio,
                    &["单选框", "单选按钮", "radio", "radio button"],
                    &["单选"],
                    &[r"(?i)\bradio\b"],
                ),
                vocabulary(
                    TargetType::Link,
                    &["链接", "超链接", "link", "hyperlink"],
                    &["跳转"],
                    &[r"(?i)\bhref\b"],
                ),
                vocabulary(TargetType::Label, &["标签", "label"], &[], &[]),
                vocabulary(TargetType::Span, &["文字", "文本", "span"], &[], &[]),
                vocabulary(
                    TargetType::Div,
                    &["区域", "面板", "容器", "div", "panel", "container"],
                    &["卡片"],
                    &[],
                ),
            ],
            stop_words: words(&[
                "的", "了", "在", "和", "与", "中", "里", "上", "个", "这个", "那个", "请", "一下",
                "the", "a", "an", "of", "to", "on", "in", "at", "for", "with", "and", "please",
            ]),
            separators: words(&["的", "之", "和", "与"]),
            attribute_hints: vec![
                hint(&["提交", "submit"], "type", "submit"),
                hint(&["密码", "password"], "type", "password"),
                hint(&["邮箱", "email", "e-mail"], "type", "email"),
                hint(&["搜索", "search"], "type", "search"),
                hint(&["手机", "电话", "phone"], "type", "tel"),
                hint(&["复选", "checkbox"], "type", "checkbox"),
                hint(&["单选", "radio"], "type", "radio"),
                hint(&["上传", "upload"], "type", "file"),
            ],
            synonyms: table(&[
                ("提交", &["确定", "确认", "保存"]),
                ("登录", &["登陆", "登入", "签到"]),
                ("注册", &["创建账号", "新用户"]),
                ("搜索", &["查询", "查找", "检索"]),
                ("取消", &["关闭", "返回"]),
                ("清除", &["清空", "删除", "重置"]),
                ("用户名", &["账号", "账户", "用户"]),
                ("密码", &["口令"]),
                ("邮箱", &["电子邮件", "邮件"]),
                ("下一步", &["继续"]),
                ("确定", &["确认", "好的"]),
                ("submit", &["confirm", "save", "ok"]),
                ("login", &["sign in", "log in", "signin"]),
                ("register", &["sign up", "signup"]),
                ("search", &["find", "query", "lookup"]),
                ("cancel", &["close", "dismiss"]),
                ("clear", &["reset", "delete", "remove"]),
                ("username", &["user", "account", "login name"]),
                ("password", &["pwd", "passcode"]),
                ("email", &["mail", "e-mail"]),
                ("next", &["continue"]),
            ]),
            translations: table(&[
                ("提交", &["submit"]),
                ("登录", &["login", "sign in"]),
                ("注册", &["register", "sign up"]),
                ("搜索", &["search"]),
                ("取消", &["cancel"]),
                ("清除", &["clear"]),
                ("用户名", &["username", "user name"]),
                ("密码", &["password"]),
                ("按钮", &["button"]),
                ("邮箱", &["email"]),
                ("确定", &["ok", "confirm"]),
                ("下一步", &["next"]),
                ("删除", &["delete"]),
                ("保存", &["save"]),
                ("关闭", &["close"]),
                ("链接", &["link"]),
                ("首页", &["home"]),
                ("设置", &["settings"]),
                ("手机号", &["phone"]),
                ("验证码", &["captcha", "verification code"]),
                ("返回", &["back"]),
                ("添加", &["add"]),
                ("编辑", &["edit"]),
                ("上传", &["upload"]),
                ("下载", &["download"]),
            ]),
            directions: vec![
                DirectionWords {
                    direction: Direction::Right,
                    words: words(&["右边", "右侧", "右面", "右方", "to the right of", "right of"]),
                },
                DirectionWords {
                    direction: Direction::Left,
                    words: words(&["左边", "左侧", "左面", "左方", "to the left of", "left of"]),
                },
                DirectionWords {
                    direction: Direction::Above,
                    words: words(&["上方", "上面", "上边", "上侧", "on top of", "above", "over"]),
                },
                DirectionWords {
                    direction: Direction::Below,
                    words: words(&["下方", "下面", "下边", "下侧", "underneath", "beneath", "below", "under"]),
                },
                DirectionWords {
                    direction: Direction::Inside,
                    words: words(&["里面", "内部", "之内", "inside", "within"]),
                },
                DirectionWords {
                    direction: Direction::Near,
                    words: words(&["附近", "旁边", "周围", "边上", "next to", "close to", "beside", "near"]),
                },
                DirectionWords {
                    direction: Direction::Far,
                    words: words(&["远处", "远离", "far from", "away from"]),
                },
            ],
            distance_words: vec![
                DistanceWords {
                    words: words(&["紧挨着", "紧邻", "紧贴", "adjacent to", "immediately"]),
                    max_distance: 80.0,
                },
                DistanceWords {
                    words: words(&["附近", "nearby", "close to"]),
                    max_distance: 200.0,
                },
            ],
            visual_keywords: words(&[
                "红色", "蓝色", "绿色", "黄色", "黑色", "白色", "灰色", "橙色", "紫色", "粉色",
                "图标", "画布", "圆形", "方形", "三角", "星形", "图片", "图案", "标志",
                "red", "blue", "green", "yellow", "black", "white", "gray", "grey", "orange",
                "purple", "pink", "icon", "canvas", "circle", "square", "triangle", "star",
                "logo", "image",
            ]),
        }
    }
}

impl SlotLexicon {
    /// Shared handle to the built-in tables.
    pub fn builtin() -> Arc<SlotLexicon> {
        Arc::clone(&BUILTIN)
    }

    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let lexicon: SlotLexicon = serde_yaml::from_str(source)
            .map_err(|err| SlotError::InvalidLexicon(err.to_string()))?;
        lexicon.validate()?;
        Ok(lexicon)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&source)
    }

    /// Check that the action table is populated and every pattern compiles.
    pub fn validate(&self) -> Result<()> {
        if self.actions.values().all(|keywords| keywords.is_empty()) {
            return Err(SlotError::InvalidLexicon("action table is empty".into()));
        }
        for vocabulary in &self.types {
            for pattern in &vocabulary.patterns {
                compile(pattern)?;
            }
        }
        Ok(())
    }

    pub fn action_keywords(&self, action: ActionKind) -> &[String] {
        self.actions
            .get(&action)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_stop_word(&self, token: &str) -> bool {
        self.stop_words
            .iter()
            .any(|word| word.eq_ignore_ascii_case(token))
    }

    /// Every type common name, longest first.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .types
            .iter()
            .flat_map(|vocabulary| vocabulary.names.iter().map(String::as_str))
            .collect();
        names.sort_by(|a, b| text::char_len(b).cmp(&text::char_len(a)));
        names.dedup();
        names
    }

    pub fn is_type_name(&self, token: &str) -> bool {
        self.types.iter().any(|vocabulary| {
            vocabulary
                .names
                .iter()
                .any(|name| name.eq_ignore_ascii_case(token))
        })
    }

    /// Whether the instruction describes the target by its looks.
    pub fn is_visual(&self, instruction: &str) -> bool {
        self.visual_keywords
            .iter()
            .any(|keyword| text::contains(instruction, keyword))
    }

    pub fn attribute_hints_for(&self, instruction: &str) -> BTreeMap<String, String> {
        let mut hints = BTreeMap::new();
        for hint in &self.attribute_hints {
            if hint.words.iter().any(|word| text::contains(instruction, word)) {
                hints
                    .entry(hint.attribute.clone())
                    .or_insert_with(|| hint.value.clone());
            }
        }
        hints
    }
}

pub(crate) fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|err| SlotError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lexicon_is_valid() {
        let lexicon = SlotLexicon::default();
        lexicon.validate().unwrap();
        assert!(lexicon.action_keywords(ActionKind::Click).contains(&"点击".to_string()));
        assert!(lexicon.action_keywords(ActionKind::Unknown).is_empty());
    }

    #[test]
    fn type_names_are_longest_first() {
        let lexicon = SlotLexicon::default();
        let names = lexicon.type_names();
        let pos_long = names.iter().position(|n| *n == "单选按钮").unwrap();
        let pos_short = names.iter().position(|n| *n == "按钮").unwrap();
        assert!(pos_long < pos_short);
    }

    #[test]
    fn attribute_hints_first_rule_wins() {
        let lexicon = SlotLexicon::default();
        let hints = lexicon.attribute_hints_for("点击提交按钮");
        assert_eq!(hints.get("type").map(String::as_str), Some("submit"));
        assert!(lexicon.attribute_hints_for("click the logo").is_empty());
    }

    #[test]
    fn visual_keywords_need_word_boundaries() {
        let lexicon = SlotLexicon::default();
        assert!(lexicon.is_visual("点击红色的图标"));
        assert!(lexicon.is_visual("click the red star"));
        assert!(!lexicon.is_visual("click the entered value"));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
actions:
  click: ["klick"]
visual_keywords: ["rot"]
"#;
        let lexicon = SlotLexicon::from_yaml_str(yaml).unwrap();
        assert_eq!(lexicon.action_keywords(ActionKind::Click), ["klick".to_string()]);
        assert!(lexicon.action_keywords(ActionKind::Input).is_empty());
        assert!(!lexicon.types.is_empty());
        assert!(lexicon.is_visual("der rot knopf"));
    }

    #[test]
    fn rejects_bad_patterns() {
        let yaml = r#"
types:
  - target_type: button
    patterns: ["(unclosed"]
"#;
        assert!(matches!(
            SlotLexicon::from_yaml_str(yaml),
            Err(SlotError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexicon.yaml");
        std::fs::write(&path, "actions:\n  wait: [\"pause\"]\n").unwrap();
        let lexicon = SlotLexicon::from_path(&path).unwrap();
        assert_eq!(lexicon.action_keywords(ActionKind::Wait), ["pause".to_string()]);
    }
}
