//! Instruction to slot extraction
use std::ops::Range;
use std::sync::Arc;

use regex::Regex;
use tracing::debug;
use uifunnel_core_types::TargetType;

use crate::errors::Result;
use crate::keywords::KeywordTokenizer;
use crate::lexicon::{compile, SlotLexicon};
use crate::models::{ActionKind, ActionSlot, SlotOptions};
use crate::relation::{SpatialParser, SpatialRelation};
use crate::synonyms::SynonymExpander;
use crate::text;

const INTENT_WEIGHT: f64 = 0.6;
const TYPE_WEIGHT: f64 = 0.4;
const CANONICAL_PAIR_BONUS: f64 = 0.1;
const MISSING_TYPE_PENALTY: f64 = 0.1;

const NAME_STRENGTH: f64 = 1.0;
const KEYWORD_STRENGTH: f64 = 0.8;
const PATTERN_STRENGTH: f64 = 0.6;

#[derive(Debug, Clone)]
struct IntentMatch {
    action: ActionKind,
    strength: f64,
    span: Option<Range<usize>>,
}

impl IntentMatch {
    fn none() -> Self {
        Self {
            action: ActionKind::Unknown,
            strength: 0.0,
            span: None,
        }
    }

    fn opens_instruction(&self) -> bool {
        self.strength >= 1.0
    }
}

#[derive(Debug, Clone, Copy)]
struct TypeHit {
    target_type: TargetType,
    name_len: usize,
    position: usize,
}

/// Literal value plus the byte range to blank out of the description.
#[derive(Debug, Clone)]
struct ValueMatch {
    value: String,
    span: Range<usize>,
}

/// L1: deterministic instruction understanding over one lexicon.
#[derive(Debug, Clone)]
pub struct SlotExtractor {
    lexicon: Arc<SlotLexicon>,
    options: SlotOptions,
    type_patterns: Vec<(TargetType, Vec<Regex>)>,
    value_patterns: Vec<Regex>,
    tokenizer: KeywordTokenizer,
    expander: SynonymExpander,
    spatial: SpatialParser,
}

impl SlotExtractor {
    pub fn new(lexicon: Arc<SlotLexicon>, options: SlotOptions) -> Result<Self> {
        lexicon.validate()?;

        let mut type_patterns = Vec::with_capacity(lexicon.types.len());
        for vocabulary in &lexicon.types {
            let compiled = vocabulary
                .patterns
                .iter()
                .map(|pattern| compile(pattern))
                .collect::<Result<Vec<_>>>()?;
            type_patterns.push((vocabulary.target_type, compiled));
        }

        // Ordered: quoted literals win over trailing tokens.
        let value_patterns = [
            r#""([^"]+)"|“([^”]+)”|「([^」]+)」|‘([^’]+)’|'([^']+)'"#,
            r"(?i)^\s*(?:type|enter|input|fill in)\s+(\S+)\s+(?:into|in|to)\b",
            r"(?i)\s+with\s+(\S+)\s*$",
            r"(?:输入|填写|填入|键入|录入)\s*[:：]?\s*([A-Za-z0-9_@.+\-!#$%&*]+)\s*$",
            r"(?:为|成)\s*[:：]?\s*(\S+)\s*$",
        ]
        .iter()
        .map(|pattern| compile(pattern))
        .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            tokenizer: KeywordTokenizer::new(&lexicon, options.max_full_keyword_chars),
            expander: SynonymExpander::new(&lexicon, options.max_synonyms),
            spatial: SpatialParser::new(&lexicon)?,
            type_patterns,
            value_patterns,
            options,
            lexicon,
        })
    }

    /// Extractor over the built-in lexicon and default options.
    pub fn with_defaults() -> Result<Self> {
        Self::new(SlotLexicon::builtin(), SlotOptions::default())
    }

    pub fn lexicon(&self) -> &SlotLexicon {
        &self.lexicon
    }

    pub fn options(&self) -> &SlotOptions {
        &self.options
    }

    pub fn expander(&self) -> &SynonymExpander {
        &self.expander
    }

    /// Turn an instruction into a slot. Never fails; blank input yields the zero slot.
    pub fn extract(&self, instruction: &str) -> ActionSlot {
        let trimmed = text::trim_edges(instruction);
        if trimmed.is_empty() {
            return ActionSlot::empty();
        }

        let intent = self.recognize_intent(trimmed);
        let value = if intent.action == ActionKind::Input {
            self.extract_value(trimmed)
        } else {
            None
        };
        let description = self.strip_description(trimmed, &intent, value.as_ref());
        let target = match self.spatial.parse(&description) {
            Some(relation) => relation.target,
            None => description,
        };
        self.build_slot(intent, &target, value.map(|v| v.value))
    }

    /// Slot for a bare element description, as used for spatial anchors.
    ///
    /// No action is recognised, so confidence reflects the type match alone.
    pub fn describe(&self, description: &str) -> ActionSlot {
        let description = text::trim_edges(description);
        if description.is_empty() {
            return ActionSlot::empty();
        }
        self.build_slot(IntentMatch::none(), description, None)
    }

    /// Spatial relation encoded by the instruction, with its action word removed.
    pub fn spatial_relation(&self, instruction: &str) -> Option<SpatialRelation> {
        let trimmed = text::trim_edges(instruction);
        if trimmed.is_empty() {
            return None;
        }
        let intent = self.recognize_intent(trimmed);
        let value = if intent.action == ActionKind::Input {
            self.extract_value(trimmed)
        } else {
            None
        };
        let description = self.strip_description(trimmed, &intent, value.as_ref());
        self.spatial.parse(&description)
    }

    pub fn is_visual(&self, instruction: &str) -> bool {
        self.lexicon.is_visual(instruction)
    }

    fn build_slot(&self, intent: IntentMatch, target: &str, value: Option<String>) -> ActionSlot {
        let target = text::trim_edges(target);
        let (target_type, type_strength) = self.recognize_type(target);

        let mut keywords = self.tokenizer.tokenize(target);
        if self.options.enable_synonyms {
            keywords = self.expander.expand_all(&keywords);
        }

        let mut confidence = INTENT_WEIGHT * intent.strength + TYPE_WEIGHT * type_strength;
        match target_type {
            Some(ty) if intent.action.is_canonical_pair(ty) => confidence += CANONICAL_PAIR_BONUS,
            Some(_) => {}
            None => confidence -= MISSING_TYPE_PENALTY,
        }

        let mut slot = ActionSlot::clamped(intent.action, confidence).with_keywords(keywords);
        slot.attributes = self.lexicon.attribute_hints_for(target);
        if !target.is_empty() {
            slot.target = Some(target.to_string());
        }
        slot.target_type = target_type;
        slot.value = value;

        debug!(
            action = %slot.action,
            target = ?slot.target,
            target_type = ?slot.target_type,
            confidence = slot.confidence(),
            keywords = slot.keywords.len(),
            "extracted slot"
        );
        slot
    }

    fn recognize_intent(&self, instruction: &str) -> IntentMatch {
        // (position, keyword length, priority rank, action)
        let mut best: Option<(usize, usize, usize, ActionKind)> = None;
        for (rank, action) in ActionKind::priority_order().into_iter().enumerate() {
            for keyword in self.lexicon.action_keywords(action) {
                let hit = text::find_all(instruction, keyword)
                    .into_iter()
                    .find(|&pos| !self.is_noun_use(instruction, pos + keyword.len()));
                let Some(pos) = hit else { continue };
                let candidate = (pos, keyword.len(), rank, action);
                let better = match best {
                    None => true,
                    Some((best_pos, best_len, best_rank, _)) => {
                        (pos, std::cmp::Reverse(keyword.len()), rank)
                            < (best_pos, std::cmp::Reverse(best_len), best_rank)
                    }
                };
                if better {
                    best = Some(candidate);
                }
            }
        }

        let Some((pos, len, _, mut action)) = best else {
            return IntentMatch::none();
        };

        for rule in &self.lexicon.context_rules {
            if rule.from == action && rule.words.iter().any(|w| text::contains(instruction, w)) {
                debug!(from = %rule.from, to = %rule.to, "context rule applied");
                action = rule.to;
                break;
            }
        }

        let strength = if self.only_fillers(&instruction[..pos]) {
            1.0
        } else {
            0.8
        };
        IntentMatch {
            action,
            strength,
            span: Some(pos..pos + len),
        }
    }

    /// `输入` directly followed by `框` names an element, not an action.
    fn is_noun_use(&self, instruction: &str, end: usize) -> bool {
        let rest = &instruction[end..];
        self.lexicon
            .noun_suffixes
            .iter()
            .any(|suffix| !suffix.is_empty() && rest.starts_with(suffix.as_str()))
    }

    fn only_fillers(&self, prefix: &str) -> bool {
        let mut rest = prefix.to_string();
        for filler in &self.lexicon.filler_words {
            rest = text::remove_all(&rest, filler);
        }
        text::trim_edges(&rest).is_empty()
    }

    fn extract_value(&self, instruction: &str) -> Option<ValueMatch> {
        for pattern in &self.value_patterns {
            let Some(caps) = pattern.captures(instruction) else {
                continue;
            };
            let value = caps
                .iter()
                .skip(1)
                .flatten()
                .next()
                .map(|m| m.as_str().trim().to_string());
            let (Some(value), Some(whole)) = (value, caps.get(0)) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            return Some(ValueMatch {
                value,
                span: whole.range(),
            });
        }
        None
    }

    fn strip_description(
        &self,
        instruction: &str,
        intent: &IntentMatch,
        value: Option<&ValueMatch>,
    ) -> String {
        let mut spans: Vec<Range<usize>> = intent.span.iter().cloned().collect();
        if let Some(value) = value {
            spans.push(value.span.clone());
        }
        spans.sort_by_key(|span| span.start);

        let mut out = String::with_capacity(instruction.len());
        let mut cursor = 0;
        for span in spans {
            if span.start > cursor {
                out.push_str(&instruction[cursor..span.start]);
            }
            out.push(' ');
            cursor = cursor.max(span.end);
        }
        out.push_str(&instruction[cursor..]);

        for filler in &self.lexicon.filler_words {
            out = text::remove_all(&out, filler);
        }
        let mut description = text::normalize_spaces(&out);

        // CJK particles only frame the target when the verb comes after them.
        let verb_later = !intent.opens_instruction();
        loop {
            let before = description.clone();
            for particle in &self.lexicon.leading_particles {
                description = strip_leading(&description, particle, verb_later);
            }
            if verb_later {
                for particle in &self.lexicon.trailing_particles {
                    description = strip_trailing(&description, particle);
                }
            }
            description = text::trim_edges(&description).to_string();
            if description == before {
                break;
            }
        }
        description
    }

    fn recognize_type(&self, description: &str) -> (Option<TargetType>, f64) {
        if description.is_empty() {
            return (None, 0.0);
        }

        let mut name_hits = Vec::new();
        let mut keyword_hits = Vec::new();
        for vocabulary in &self.lexicon.types {
            for name in &vocabulary.names {
                let positions = text::find_all(description, name);
                if let Some(&pos) = positions.last() {
                    let hit = TypeHit {
                        target_type: vocabulary.target_type,
                        name_len: text::char_len(name),
                        position: pos,
                    };
                    if pos + name.len() == description.len() {
                        name_hits.push(hit);
                    }
                    keyword_hits.push(hit);
                }
            }
            for keyword in &vocabulary.keywords {
                if let Some(&pos) = text::find_all(description, keyword).last() {
                    keyword_hits.push(TypeHit {
                        target_type: vocabulary.target_type,
                        name_len: text::char_len(keyword),
                        position: pos,
                    });
                }
            }
        }
        if let Some(ty) = pick_type(&name_hits) {
            return (Some(ty), NAME_STRENGTH);
        }
        if let Some(ty) = pick_type(&keyword_hits) {
            return (Some(ty), KEYWORD_STRENGTH);
        }

        let pattern_hits: Vec<TypeHit> = self
            .type_patterns
            .iter()
            .filter_map(|(target_type, patterns)| {
                patterns
                    .iter()
                    .filter_map(|pattern| pattern.find_iter(description).last())
                    .map(|m| TypeHit {
                        target_type: *target_type,
                        name_len: m.as_str().chars().count(),
                        position: m.start(),
                    })
                    .max_by_key(|hit| hit.position)
            })
            .collect();
        match pick_type(&pattern_hits) {
            Some(ty) => (Some(ty), PATTERN_STRENGTH),
            None => (None, 0.0),
        }
    }
}

/// Controls beat structural types, then longer names, then later positions.
fn pick_type(hits: &[TypeHit]) -> Option<TargetType> {
    hits.iter()
        .max_by_key(|hit| (hit.target_type.is_control(), hit.name_len, hit.position))
        .map(|hit| hit.target_type)
}

fn strip_leading(description: &str, particle: &str, allow_cjk: bool) -> String {
    if particle.is_empty() {
        return description.to_string();
    }
    if particle.is_ascii() {
        let lowered = description.to_ascii_lowercase();
        let particle = particle.to_ascii_lowercase();
        let bounded = lowered
            .strip_prefix(particle.as_str())
            .map(|rest| rest.starts_with(char::is_whitespace))
            .unwrap_or(false);
        if bounded {
            return description[particle.len()..].trim_start().to_string();
        }
        return description.to_string();
    }
    match description.strip_prefix(particle) {
        Some(rest) if allow_cjk && !rest.trim().is_empty() => rest.to_string(),
        _ => description.to_string(),
    }
}

fn strip_trailing(description: &str, particle: &str) -> String {
    if particle.is_empty() || particle.is_ascii() {
        return description.to_string();
    }
    match description.strip_suffix(particle) {
        Some(rest) if !rest.trim().is_empty() => rest.to_string(),
        _ => description.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> SlotExtractor {
        SlotExtractor::with_defaults().unwrap()
    }

    #[test]
    fn submit_button_instruction() {
        let slot = extractor().extract("点击提交按钮");
        assert_eq!(slot.action, ActionKind::Click);
        assert_eq!(slot.target.as_deref(), Some("提交按钮"));
        assert_eq!(slot.target_type, Some(TargetType::Button));
        assert_eq!(slot.attributes.get("type").map(String::as_str), Some("submit"));
        assert_eq!(slot.keywords[0], "提交按钮");
        assert!(slot.keywords.contains(&"提交".to_string()));
        assert!(slot.keywords.contains(&"submit".to_string()));
        // 0.6 * 1.0 + 0.4 * 1.0 + 0.1, clamped
        assert_eq!(slot.confidence(), 1.0);
    }

    #[test]
    fn blank_instruction_yields_zero_slot() {
        for blank in ["", "   ", "\n\t"] {
            let slot = extractor().extract(blank);
            assert_eq!(slot, ActionSlot::empty());
            assert_eq!(slot.confidence(), 0.0);
            assert!(slot.keywords.is_empty());
        }
    }

    #[test]
    fn noun_use_of_action_word_is_skipped() {
        let slot = extractor().extract("在用户名输入框中输入admin");
        assert_eq!(slot.action, ActionKind::Input);
        assert_eq!(slot.value.as_deref(), Some("admin"));
        assert_eq!(slot.target.as_deref(), Some("用户名输入框"));
        assert_eq!(slot.target_type, Some(TargetType::Input));
        assert!(slot.keywords.contains(&"用户名".to_string()));
        // 0.6 * 0.8 + 0.4 * 1.0 + 0.1
        assert!((slot.confidence() - 0.98).abs() < 1e-9);
    }

    #[test]
    fn quoted_values_are_extracted() {
        let slot = extractor().extract("在搜索框输入\"rust 教程\"");
        assert_eq!(slot.action, ActionKind::Input);
        assert_eq!(slot.value.as_deref(), Some("rust 教程"));
        assert_eq!(slot.target.as_deref(), Some("搜索框"));
        assert_eq!(slot.attributes.get("type").map(String::as_str), Some("search"));
    }

    #[test]
    fn english_input_with_into() {
        let slot = extractor().extract("type admin into the username field");
        assert_eq!(slot.action, ActionKind::Input);
        assert_eq!(slot.value.as_deref(), Some("admin"));
        assert_eq!(slot.target.as_deref(), Some("username field"));
        assert_eq!(slot.target_type, Some(TargetType::Input));
    }

    #[test]
    fn spatial_instruction_targets_the_relation_target() {
        let slot = extractor().extract("点击用户名输入框右边的清除按钮");
        assert_eq!(slot.action, ActionKind::Click);
        assert_eq!(slot.target.as_deref(), Some("清除按钮"));
        assert_eq!(slot.target_type, Some(TargetType::Button));
        assert_eq!(slot.keywords[0], "清除按钮");
    }

    #[test]
    fn spatial_relation_strips_the_verb() {
        let relation = extractor()
            .spatial_relation("点击用户名输入框右边的清除按钮")
            .unwrap();
        assert_eq!(relation.anchor, "用户名输入框");
        assert_eq!(relation.target, "清除按钮");
        assert!(extractor().spatial_relation("点击提交按钮").is_none());
    }

    #[test]
    fn context_word_turns_select_into_click() {
        let slot = extractor().extract("选择确定按钮");
        assert_eq!(slot.action, ActionKind::Click);

        let checkbox = extractor().extract("勾选同意条款复选框");
        assert_eq!(checkbox.action, ActionKind::Select);
        assert_eq!(checkbox.target_type, Some(TargetType::Checkbox));
    }

    #[test]
    fn earliest_action_wins() {
        let slot = extractor().extract("click the login button and wait");
        assert_eq!(slot.action, ActionKind::Click);
    }

    #[test]
    fn missing_type_is_penalised() {
        let slot = extractor().extract("点击首页");
        assert_eq!(slot.target_type, None);
        // 0.6 * 1.0 - 0.1
        assert!((slot.confidence() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn prefers_longer_type_names() {
        let slot = extractor().extract("点击男性单选按钮");
        assert_eq!(slot.target_type, Some(TargetType::Radio));
        assert_eq!(slot.action, ActionKind::Click);
    }

    #[test]
    fn confidence_always_in_range() {
        let extractor = extractor();
        for instruction in [
            "点击",
            "按钮",
            "wait",
            "请帮我点击一下登录按钮",
            "select the red icon on the canvas",
            "把鼠标移到菜单上",
            "!!!",
        ] {
            let confidence = extractor.extract(instruction).confidence();
            assert!((0.0..=1.0).contains(&confidence), "{instruction}: {confidence}");
        }
    }

    #[test]
    fn synonyms_can_be_disabled() {
        let options = SlotOptions {
            enable_synonyms: false,
            ..SlotOptions::default()
        };
        let extractor = SlotExtractor::new(Arc::new(SlotLexicon::default()), options).unwrap();
        let slot = extractor.extract("点击提交按钮");
        assert_eq!(slot.keywords, vec!["提交按钮", "提交"]);
    }

    #[test]
    fn describe_builds_anchor_slots() {
        let slot = extractor().describe("用户名输入框");
        assert_eq!(slot.action, ActionKind::Unknown);
        assert_eq!(slot.target_type, Some(TargetType::Input));
        assert_eq!(slot.keywords[0], "用户名输入框");
        // type strength only
        assert!((slot.confidence() - 0.4).abs() < 1e-9);
    }
}
