//! Attribute, text and type scoring

use async_trait::async_trait;
use perceiver_structural::is_interactive;
use slot_extractor::ActionSlot;
use tracing::debug;
use uifunnel_core_types::{ElementRecord, TargetType};

use super::LayerResolver;
use crate::{errors::LocatorError, types::*};

/// Scored attributes and their static weights.
///
/// `text` is the element's visible text; `aria-label` falls back to the
/// accessible name and `role` to the role attribute.
pub const ATTRIBUTE_WEIGHTS: &[(&str, f64)] = &[
    ("placeholder", 1.0),
    ("aria-label", 0.95),
    ("text", 0.95),
    ("id", 0.9),
    ("name", 0.9),
    ("title", 0.8),
    ("value", 0.8),
    ("alt", 0.8),
    ("role", 0.6),
    ("type", 0.5),
    ("class", 0.4),
];

const TYPE_BONUS: f64 = 0.2;
const SCORE_FLOOR: f64 = 0.3;
const CONTAINS_BASE: f64 = 0.7;
const CONTAINS_COVERAGE: f64 = 0.3;
const WORD_PARTIAL: f64 = 0.5;

const BUTTON_INPUT_TYPES: &[&str] = &["submit", "button", "reset", "image"];
const NON_TEXT_INPUT_TYPES: &[&str] = &[
    "submit", "button", "reset", "image", "checkbox", "radio", "hidden", "file", "range", "color",
];

/// Pure scorer over one element set
#[derive(Debug, Clone)]
pub struct AttributeMatcher {
    top_n: usize,
}

impl Default for AttributeMatcher {
    fn default() -> Self {
        Self::new(10)
    }
}

impl AttributeMatcher {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    /// Score every qualifying element against the slot.
    ///
    /// Results are sorted by descending score, ties in document order,
    /// and never include scores at or below the 0.3 floor.
    pub fn match_elements(&self, elements: &[ElementRecord], slot: &ActionSlot) -> Vec<MatchResult> {
        let mut matches: Vec<MatchResult> = elements
            .iter()
            .filter(|element| is_interactive(element))
            .filter(|element| {
                slot.target_type
                    .map_or(true, |target| type_allows(target, element))
            })
            .filter_map(|element| self.score_element(element, slot))
            .filter(|candidate| candidate.score > SCORE_FLOOR)
            .collect();
        rank(&mut matches);
        matches.truncate(self.top_n);
        matches
    }

    /// Score one element without the interactivity and type filters.
    pub fn score_element(&self, element: &ElementRecord, slot: &ActionSlot) -> Option<MatchResult> {
        let mut weighted: Vec<(&str, f64)> = ATTRIBUTE_WEIGHTS
            .iter()
            .filter_map(|(name, weight)| {
                let value = attribute_text(element, name)?;
                let best = slot
                    .keywords
                    .iter()
                    .map(|keyword| text_score(keyword, value))
                    .fold(0.0, f64::max);
                (best > 0.0).then_some((*name, weight * best))
            })
            .collect();
        weighted.sort_by(|a, b| b.1.total_cmp(&a.1));

        // Zero-padded: a single matching attribute counts half.
        let base = weighted.iter().take(2).map(|(_, score)| score).sum::<f64>() / 2.0;
        let type_match = slot
            .target_type
            .filter(|target| *target != TargetType::Unknown)
            .map_or(false, |target| element.target_type() == target);
        let score = base + if type_match { TYPE_BONUS } else { 0.0 };
        if weighted.is_empty() && !type_match {
            return None;
        }

        let mut result = MatchResult::new(element.clone(), score, FunnelLayer::Attribute);
        for (name, sub_score) in &weighted {
            result = result
                .with_attribute(*name, *sub_score)
                .with_reason(format!("attribute_match:{name}={sub_score:.2}"));
        }
        if type_match {
            result = result.with_reason(format!("type_match:{}", element.target_type()));
        }
        Some(result)
    }
}

/// Text similarity of one keyword against one attribute value.
///
/// Exact (case-insensitive) 1.0, substring `0.7 + 0.3 * coverage`, shared
/// word 0.5, otherwise normalized Levenshtein similarity.
pub(crate) fn text_score(keyword: &str, text: &str) -> f64 {
    let keyword = keyword.trim().to_lowercase();
    let text = text.trim().to_lowercase();
    if keyword.is_empty() || text.is_empty() {
        return 0.0;
    }
    if keyword == text {
        return 1.0;
    }
    if text.contains(&keyword) {
        let coverage = keyword.chars().count() as f64 / text.chars().count() as f64;
        return CONTAINS_BASE + CONTAINS_COVERAGE * coverage;
    }
    if shares_word(&keyword, &text) {
        return WORD_PARTIAL;
    }
    strsim::normalized_levenshtein(&keyword, &text)
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= 2)
}

/// A whole word in common, or the attribute text occurring as a whole
/// inside the keyword.
fn shares_word(keyword: &str, text: &str) -> bool {
    if text.chars().count() >= 2 && keyword.contains(text) {
        return true;
    }
    words(keyword).any(|word| words(text).any(|other| other == word))
}

fn attribute_text<'a>(element: &'a ElementRecord, name: &str) -> Option<&'a str> {
    let value = match name {
        "text" => Some(element.text.as_str()),
        "aria-label" => element
            .attr("aria-label")
            .or(element.accessible_name.as_deref()),
        "role" => element.role.as_deref().or_else(|| element.attr("role")),
        other => element.attr(other),
    }?;
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

fn has_role(element: &ElementRecord, roles: &[&str]) -> bool {
    element
        .role
        .as_deref()
        .or_else(|| element.attr("role"))
        .map_or(false, |role| roles.contains(&role.trim().to_ascii_lowercase().as_str()))
}

fn input_type_in(element: &ElementRecord, types: &[&str]) -> bool {
    element
        .input_type()
        .map_or(false, |ty| types.contains(&ty.as_str()))
}

/// Tags (and `<input type>` values) a target type admits.
pub(crate) fn type_allows(target: TargetType, element: &ElementRecord) -> bool {
    let tag = element.tag.as_str();
    match target {
        TargetType::Button => {
            tag == "button"
                || (tag == "input" && input_type_in(element, BUTTON_INPUT_TYPES))
                || has_role(element, &["button"])
        }
        TargetType::Input => {
            (tag == "input" && !input_type_in(element, NON_TEXT_INPUT_TYPES))
                || tag == "textarea"
                || has_role(element, &["textbox", "searchbox"])
        }
        TargetType::Textarea => tag == "textarea",
        TargetType::Select => tag == "select" || has_role(element, &["combobox", "listbox"]),
        TargetType::Checkbox => {
            (tag == "input" && input_type_in(element, &["checkbox"]))
                || has_role(element, &["checkbox", "switch"])
        }
        TargetType::Radio => {
            (tag == "input" && input_type_in(element, &["radio"])) || has_role(element, &["radio"])
        }
        TargetType::Link => tag == "a" || has_role(element, &["link"]),
        TargetType::Div | TargetType::Span | TargetType::Label => tag == target.name(),
        TargetType::Unknown => true,
    }
}

/// L2 layer over the observation's elements
pub struct AttributeResolver {
    matcher: AttributeMatcher,
    threshold: f64,
}

impl AttributeResolver {
    pub fn new(config: &FunnelConfig) -> Self {
        Self {
            matcher: AttributeMatcher::new(config.attribute_top_n),
            threshold: config.attribute_threshold,
        }
    }

    pub fn matcher(&self) -> &AttributeMatcher {
        &self.matcher
    }
}

#[async_trait]
impl LayerResolver for AttributeResolver {
    fn layer(&self) -> FunnelLayer {
        FunnelLayer::Attribute
    }

    fn applies(&self, _ctx: &FunnelContext) -> bool {
        true
    }

    async fn resolve(&self, ctx: &FunnelContext) -> Result<Vec<MatchResult>, LocatorError> {
        let matches = self.matcher.match_elements(&ctx.elements, &ctx.slot);
        debug!(
            elements = ctx.elements.len(),
            candidates = matches.len(),
            best = matches.first().map(|m| m.score),
            "attribute layer scored"
        );
        Ok(matches)
    }

    fn accept_threshold(&self) -> f64 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slot_extractor::ActionKind;
    use uifunnel_core_types::BoundingBox;

    fn boxed(element: ElementRecord) -> ElementRecord {
        element.with_bbox(BoundingBox::new(10.0, 10.0, 80.0, 24.0))
    }

    fn slot(keywords: &[&str], target_type: Option<TargetType>) -> ActionSlot {
        let slot = ActionSlot::clamped(ActionKind::Click, 0.9).with_keywords(keywords.iter().copied());
        match target_type {
            Some(ty) => slot.with_target_type(ty),
            None => slot,
        }
    }

    #[test]
    fn test_text_score_tiers() {
        assert_eq!(text_score("Submit", "submit"), 1.0);
        assert!((text_score("submit", "submit-btn") - 0.88).abs() < 1e-9);
        assert_eq!(text_score("submit form", "form"), 0.5);
        assert_eq!(text_score("清除按钮", "清除"), 0.5);
        assert_eq!(text_score("", "anything"), 0.0);
        let fuzzy = text_score("sumbit", "submit");
        assert!(fuzzy > 0.0 && fuzzy < 0.7);
    }

    #[test]
    fn test_submit_button_scores_high() {
        let button = boxed(
            ElementRecord::new(1, "button")
                .with_attr("id", "submit-btn")
                .with_text("提交"),
        );
        let matches = AttributeMatcher::default().match_elements(
            &[button],
            &slot(&["提交按钮", "提交", "submit"], Some(TargetType::Button)),
        );
        assert_eq!(matches.len(), 1);
        assert!(matches[0].score >= 0.8, "score {}", matches[0].score);
        assert!(matches[0].matched_attributes.contains_key("text"));
        assert!(matches[0]
            .reasons
            .iter()
            .any(|reason| reason == "type_match:button"));
    }

    #[test]
    fn test_floor_and_ordering() {
        let elements = vec![
            boxed(ElementRecord::new(1, "button").with_text("Cancel")),
            boxed(ElementRecord::new(2, "button").with_text("Save draft")),
            boxed(ElementRecord::new(3, "button").with_text("Save")),
            boxed(ElementRecord::new(4, "a").with_attr("href", "/save").with_text("Save")),
        ];
        let matches = AttributeMatcher::default().match_elements(&elements, &slot(&["save"], None));
        assert!(matches.iter().all(|m| m.score > 0.3));
        assert!(matches.windows(2).all(|pair| pair[0].score >= pair[1].score));
        let ids: Vec<i64> = matches.iter().map(|m| m.element.id).collect();
        // equal scores keep document order
        assert_eq!(&ids[..2], &[3, 4]);
        assert!(!ids.contains(&1));
    }

    #[test]
    fn test_type_filter_checks_input_type() {
        let elements = vec![
            boxed(ElementRecord::new(1, "input").with_attr("type", "text").with_attr("name", "agree")),
            boxed(ElementRecord::new(2, "input").with_attr("type", "checkbox").with_attr("name", "agree")),
        ];
        let matches = AttributeMatcher::default()
            .match_elements(&elements, &slot(&["agree"], Some(TargetType::Checkbox)));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].element.id, 2);
    }

    #[test]
    fn test_non_interactive_elements_are_skipped() {
        let elements = vec![
            boxed(ElementRecord::new(1, "div").with_text("提交")),
            boxed(ElementRecord::new(2, "button").with_text("提交")).hidden(),
        ];
        assert!(AttributeMatcher::default()
            .match_elements(&elements, &slot(&["提交"], None))
            .is_empty());
    }

    #[test]
    fn test_exact_match_never_lowers_score() {
        let base = boxed(ElementRecord::new(1, "input").with_attr("name", "user_name"));
        let with_exact = base.clone().with_attr("placeholder", "username");
        let wanted = slot(&["username"], Some(TargetType::Input));
        let matcher = AttributeMatcher::default();
        let before = matcher.score_element(&base, &wanted).map_or(0.0, |m| m.score);
        let after = matcher.score_element(&with_exact, &wanted).map_or(0.0, |m| m.score);
        assert!(after >= before);
        assert!((0.0..=1.0).contains(&after));
    }

    #[test]
    fn test_top_n_truncates() {
        let elements: Vec<ElementRecord> = (0..15)
            .map(|id| boxed(ElementRecord::new(id, "button").with_text("Next")))
            .collect();
        let matches = AttributeMatcher::new(3).match_elements(&elements, &slot(&["next"], None));
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].element.id, 0);
    }

    #[test]
    fn test_empty_snapshot_yields_nothing() {
        assert!(AttributeMatcher::default()
            .match_elements(&[], &slot(&["anything"], None))
            .is_empty());
    }
}
