use std::collections::BTreeSet;

use serde_json::{json, Map as JsonMap, Value};
use uifunnel_core_types::ElementRecord;

use crate::model::JudgeReport;

const ACTIONABLE_TAGS: &[&str] = &["button", "a", "area", "input", "summary", "select", "textarea"];
const ACTIONABLE_ROLES: &[&str] = &[
    "button", "link", "menuitem", "tab", "checkbox", "radio", "switch", "option", "combobox",
    "textbox", "searchbox",
];
const ACTIONABLE_INPUT_TYPES: &[&str] = &["submit", "button", "reset", "checkbox", "radio", "image"];
const FORM_CONTROL_TAGS: &[&str] = &["input", "textarea", "select"];

pub fn visible(element: &ElementRecord) -> JudgeReport {
    let mut facts = JsonMap::new();
    let mut issues = Vec::new();

    let area = element.bbox.area().round();
    facts.insert(
        "geometry".into(),
        json!({
            "x": element.bbox.x,
            "y": element.bbox.y,
            "width": element.bbox.width,
            "height": element.bbox.height,
            "area": area,
        }),
    );
    if area <= 1.0 {
        issues.push("zero_area".to_string());
    }
    if !element.visible {
        issues.push("reported_hidden".to_string());
    }
    if attr_flag_true(element, "hidden") {
        issues.push("hidden_attribute".to_string());
    }
    if attr_flag_true(element, "aria-hidden") {
        issues.push("aria_hidden".to_string());
    }

    let style = element.attr("style").map(inspect_inline_style).unwrap_or_default();
    if style.hides {
        issues.push("style_hidden".to_string());
    }
    if style.zero_opacity {
        issues.push("opacity_zero".to_string());
    }
    if !style.flags.is_empty() {
        facts.insert("style_flags".into(), json!(style.flags));
    }

    let ok = issues.is_empty();
    if !ok {
        facts.insert("issues".into(), json!(issues.clone()));
    }
    JudgeReport {
        ok,
        reason: format_reason(if ok { "visible" } else { "not_visible" }, &issues),
        facts: Value::Object(facts),
    }
}

pub fn clickable(element: &ElementRecord) -> JudgeReport {
    let visibility = visible(element);

    let mut facts = JsonMap::new();
    facts.insert("visibility".into(), visibility.facts.clone());

    let mut issues = Vec::new();
    if !visibility.ok {
        issues.push("not_visible".to_string());
    }

    let roles = roles(element);
    let actionable_node = ACTIONABLE_TAGS.contains(&element.tag.as_str());
    let has_href = element.has_attr("href");
    let has_onclick = element.has_attr("onclick") || element.has_attr("onClick");
    let focusable = element
        .attr("tabindex")
        .and_then(|value| value.trim().parse::<i32>().ok())
        .map_or(false, |index| index >= 0);
    let actionable_role = roles
        .iter()
        .any(|role| ACTIONABLE_ROLES.contains(&role.as_str()));
    let actionable_input = element
        .input_type()
        .map_or(false, |ty| ACTIONABLE_INPUT_TYPES.contains(&ty.as_str()));

    let pointer_blocked = element
        .attr("style")
        .map_or(false, |style| inspect_inline_style(style).pointer_blocked);
    if pointer_blocked {
        issues.push("pointer_events_none".to_string());
    }
    let disabled = is_disabled(element);
    if disabled {
        issues.push("disabled".to_string());
    }

    let actionable =
        actionable_node || actionable_role || has_href || has_onclick || focusable || actionable_input;
    if !actionable {
        issues.push("no_click_signal".to_string());
    }

    let ok = visibility.ok && actionable && !disabled && !pointer_blocked;

    facts.insert(
        "node".into(),
        json!({
            "tag": element.tag,
            "roles": roles,
            "signals": {
                "actionable_node": actionable_node,
                "actionable_role": actionable_role,
                "has_href": has_href,
                "has_onclick": has_onclick,
                "focusable": focusable,
                "pointer_blocked": pointer_blocked,
            }
        }),
    );
    if !issues.is_empty() {
        facts.insert("issues".into(), json!(issues.clone()));
    }

    JudgeReport {
        ok,
        reason: format_reason(if ok { "clickable" } else { "not_clickable" }, &issues),
        facts: Value::Object(facts),
    }
}

pub fn enabled(element: &ElementRecord) -> JudgeReport {
    let mut issues = Vec::new();
    let disabled = is_disabled(element);
    if disabled {
        issues.push("disabled".to_string());
    }
    if attr_flag_true(element, "readonly") {
        issues.push("readonly".to_string());
    }

    let facts = json!({
        "tag": element.tag,
        "attributes": {
            "disabled": element.attr("disabled"),
            "aria-disabled": element.attr("aria-disabled"),
            "readonly": element.attr("readonly"),
        },
    });
    let ok = !disabled;
    JudgeReport {
        ok,
        reason: format_reason(if ok { "enabled" } else { "disabled" }, &issues),
        facts,
    }
}

/// `<input>`, `<textarea>` and `<select>` elements.
pub fn is_form_control(element: &ElementRecord) -> bool {
    FORM_CONTROL_TAGS.contains(&element.tag.as_str())
}

/// Candidates worth scoring: clickable elements plus visible form controls.
pub fn is_interactive(element: &ElementRecord) -> bool {
    clickable(element).ok || (is_form_control(element) && visible(element).ok)
}

fn roles(element: &ElementRecord) -> Vec<String> {
    let mut accumulator = BTreeSet::new();
    if let Some(role) = element.role.as_deref() {
        accumulator.insert(role.trim().to_lowercase());
    }
    if let Some(role_value) = element.attr("role") {
        for role in role_value.split_whitespace() {
            accumulator.insert(role.to_lowercase());
        }
    }
    accumulator.retain(|role| !role.is_empty());
    accumulator.into_iter().collect()
}

fn attr_flag_true(element: &ElementRecord, key: &str) -> bool {
    element.attr(key).map_or(false, |value| {
        let normalized = value.trim().to_ascii_lowercase();
        normalized.is_empty()
            || normalized == key
            || matches!(normalized.as_str(), "true" | "1" | "yes" | "on")
    })
}

fn is_disabled(element: &ElementRecord) -> bool {
    attr_flag_true(element, "disabled") || attr_flag_true(element, "aria-disabled")
}

fn format_reason(base: &str, issues: &[String]) -> String {
    if issues.is_empty() {
        base.to_string()
    } else {
        format!("{}({})", base, issues.join(","))
    }
}

#[derive(Default)]
struct StyleHints {
    flags: Vec<String>,
    hides: bool,
    zero_opacity: bool,
    pointer_blocked: bool,
}

fn inspect_inline_style(style: &str) -> StyleHints {
    let lower = style.to_ascii_lowercase().replace(' ', "");
    let mut hints = StyleHints::default();

    for entry in lower.split(';').map(str::trim).filter(|entry| !entry.is_empty()) {
        if entry.contains("display:none") {
            hints.hides = true;
            hints.flags.push("display:none".into());
        }
        if entry.contains("visibility:hidden") {
            hints.hides = true;
            hints.flags.push("visibility:hidden".into());
        }
        if entry.contains("pointer-events:none") {
            hints.pointer_blocked = true;
            hints.flags.push("pointer-events:none".into());
        }
        if let Some(rest) = entry.strip_prefix("opacity:") {
            if rest.parse::<f32>().map_or(false, |value| value <= 0.0) {
                hints.zero_opacity = true;
                hints.flags.push("opacity:0".into());
            }
        }
    }
    hints
}

#[cfg(test)]
mod tests {
    use super::*;
    use uifunnel_core_types::BoundingBox;

    fn boxed(element: ElementRecord) -> ElementRecord {
        element.with_bbox(BoundingBox::new(10.0, 10.0, 80.0, 24.0))
    }

    #[test]
    fn button_is_clickable() {
        let report = clickable(&boxed(ElementRecord::new(1, "button").with_text("OK")));
        assert!(report.ok, "{}", report.reason);
        assert_eq!(report.reason, "clickable");
    }

    #[test]
    fn plain_div_needs_a_click_signal() {
        let div = boxed(ElementRecord::new(1, "div").with_text("hello"));
        let report = clickable(&div);
        assert!(!report.ok);
        assert_eq!(report.reason, "not_clickable(no_click_signal)");

        assert!(clickable(&div.clone().with_attr("onclick", "go()")).ok);
        assert!(clickable(&div.clone().with_attr("tabindex", "0")).ok);
        assert!(!clickable(&div.clone().with_attr("tabindex", "-1")).ok);
        assert!(clickable(&div.with_role("button")).ok);
    }

    #[test]
    fn disabled_and_hidden_controls_are_not_clickable() {
        let disabled = boxed(ElementRecord::new(1, "button").with_attr("disabled", ""));
        assert!(!clickable(&disabled).ok);
        assert!(!enabled(&disabled).ok);

        let hidden = boxed(ElementRecord::new(2, "button").with_attr("style", "display: none"));
        assert!(!visible(&hidden).ok);
        assert!(!clickable(&hidden).ok);

        let zero = ElementRecord::new(3, "button");
        assert_eq!(visible(&zero).reason, "not_visible(zero_area)");

        let blocked = boxed(ElementRecord::new(4, "a").with_attr("style", "pointer-events:none"));
        assert!(!clickable(&blocked).ok);
    }

    #[test]
    fn form_controls_are_interactive() {
        let input = boxed(ElementRecord::new(1, "input").with_attr("type", "text"));
        assert!(is_form_control(&input));
        assert!(is_interactive(&input));

        let label = boxed(ElementRecord::new(2, "label").with_text("Name"));
        assert!(!is_form_control(&label));
        assert!(!is_interactive(&label));

        let hidden_input = boxed(ElementRecord::new(3, "input")).hidden();
        assert!(!is_interactive(&hidden_input));
    }

    #[test]
    fn disabled_flag_values() {
        let off = boxed(ElementRecord::new(1, "button").with_attr("aria-disabled", "false"));
        assert!(enabled(&off).ok);
        let on = boxed(ElementRecord::new(2, "button").with_attr("disabled", "disabled"));
        assert!(!enabled(&on).ok);
    }
}
