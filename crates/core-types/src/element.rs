//! Element records observed on a rendered page.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// Sentinel id carried by coordinate-only records synthesized from a vision reply.
pub const VISUAL_ELEMENT_ID: i64 = -1;

/// A point in CSS pixels relative to the top-level document.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box in CSS pixels.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Area shared with `other`; zero when the boxes do not intersect.
    pub fn intersection_area(&self, other: &BoundingBox) -> f64 {
        let width = self.right().min(other.right()) - self.x.max(other.x);
        let height = self.bottom().min(other.bottom()) - self.y.max(other.y);
        if width <= 0.0 || height <= 0.0 {
            0.0
        } else {
            width * height
        }
    }

    /// True when `other` lies entirely within this box.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// Element category shared by the slot extractor and the scorers.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetType {
    Button,
    Input,
    Textarea,
    Select,
    Checkbox,
    Radio,
    Link,
    Div,
    Span,
    Label,
    Unknown,
}

impl TargetType {
    pub fn name(&self) -> &'static str {
        match self {
            TargetType::Button => "button",
            TargetType::Input => "input",
            TargetType::Textarea => "textarea",
            TargetType::Select => "select",
            TargetType::Checkbox => "checkbox",
            TargetType::Radio => "radio",
            TargetType::Link => "link",
            TargetType::Div => "div",
            TargetType::Span => "span",
            TargetType::Label => "label",
            TargetType::Unknown => "unknown",
        }
    }

    /// Interactive controls, as opposed to structural containers.
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            TargetType::Button
                | TargetType::Input
                | TargetType::Textarea
                | TargetType::Select
                | TargetType::Checkbox
                | TargetType::Radio
                | TargetType::Link
        )
    }

    pub fn all() -> [TargetType; 11] {
        [
            TargetType::Button,
            TargetType::Input,
            TargetType::Textarea,
            TargetType::Select,
            TargetType::Checkbox,
            TargetType::Radio,
            TargetType::Link,
            TargetType::Div,
            TargetType::Span,
            TargetType::Label,
            TargetType::Unknown,
        ]
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TargetType {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        TargetType::all()
            .into_iter()
            .find(|ty| ty.name() == lowered)
            .ok_or_else(|| CoreError::UnknownTargetType(value.to_string()))
    }
}

#[cfg(feature = "serde-full")]
fn default_visible() -> bool {
    true
}

/// One rendered element as reported by the DOM snapshot collaborator.
///
/// Records are immutable once observed; a new observation yields a new set.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ElementRecord {
    pub id: i64,
    pub tag: String,
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub attributes: BTreeMap<String, String>,
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub bbox: BoundingBox,
    #[cfg_attr(feature = "serde-full", serde(default = "default_visible"))]
    pub visible: bool,
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub scrollable: bool,
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub role: Option<String>,
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub accessible_name: Option<String>,
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub text: String,
}

impl ElementRecord {
    pub fn new(id: i64, tag: impl Into<String>) -> Self {
        Self {
            id,
            tag: tag.into().to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            bbox: BoundingBox::default(),
            visible: true,
            scrollable: false,
            role: None,
            accessible_name: None,
            text: String::new(),
        }
    }

    /// Coordinate-only record for a target located from a screenshot.
    pub fn visual(bbox: BoundingBox) -> Self {
        Self::new(VISUAL_ELEMENT_ID, "visual").with_bbox(bbox)
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = bbox;
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_accessible_name(mut self, name: impl Into<String>) -> Self {
        self.accessible_name = Some(name.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn scrollable(mut self) -> Self {
        self.scrollable = true;
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Lower-cased `type` attribute, if any.
    pub fn input_type(&self) -> Option<String> {
        self.attr("type").map(|ty| ty.trim().to_ascii_lowercase())
    }

    pub fn is_visual(&self) -> bool {
        self.id == VISUAL_ELEMENT_ID
    }

    /// Classify the element into the category vocabulary used by slots.
    pub fn target_type(&self) -> TargetType {
        match self.tag.as_str() {
            "button" => TargetType::Button,
            "input" => match self.input_type().as_deref() {
                Some("checkbox") => TargetType::Checkbox,
                Some("radio") => TargetType::Radio,
                Some("submit") | Some("button") | Some("reset") | Some("image") => {
                    TargetType::Button
                }
                _ => TargetType::Input,
            },
            "textarea" => TargetType::Textarea,
            "select" => TargetType::Select,
            "a" => TargetType::Link,
            "label" => TargetType::Label,
            _ => self.role_type().unwrap_or(match self.tag.as_str() {
                "span" => TargetType::Span,
                "div" => TargetType::Div,
                _ => TargetType::Unknown,
            }),
        }
    }

    fn role_type(&self) -> Option<TargetType> {
        let role = self.role.as_deref().or_else(|| self.attr("role"))?;
        match role.to_ascii_lowercase().as_str() {
            "button" => Some(TargetType::Button),
            "link" => Some(TargetType::Link),
            "checkbox" | "switch" => Some(TargetType::Checkbox),
            "radio" => Some(TargetType::Radio),
            "textbox" | "searchbox" => Some(TargetType::Input),
            "combobox" | "listbox" => Some(TargetType::Select),
            _ => None,
        }
    }
}
