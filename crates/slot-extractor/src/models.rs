//! Slot data model
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uifunnel_core_types::TargetType;

use crate::errors::{Result, SlotError};

/// Slots below this confidence are treated as a recognition failure.
pub const MIN_USABLE_CONFIDENCE: f64 = 0.3;

/// Action intent recognised from an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Click,
    Input,
    Select,
    Navigate,
    Wait,
    Hover,
    Drag,
    Scroll,
    Unknown,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Input => "input",
            ActionKind::Select => "select",
            ActionKind::Navigate => "navigate",
            ActionKind::Wait => "wait",
            ActionKind::Hover => "hover",
            ActionKind::Drag => "drag",
            ActionKind::Scroll => "scroll",
            ActionKind::Unknown => "unknown",
        }
    }

    /// Fixed tie-break order used when two actions match at the same position.
    pub fn priority_order() -> [ActionKind; 8] {
        [
            ActionKind::Navigate,
            ActionKind::Input,
            ActionKind::Select,
            ActionKind::Click,
            ActionKind::Hover,
            ActionKind::Drag,
            ActionKind::Scroll,
            ActionKind::Wait,
        ]
    }

    /// Whether `target_type` is the natural element for this action.
    pub fn is_canonical_pair(&self, target_type: TargetType) -> bool {
        match self {
            ActionKind::Click => matches!(target_type, TargetType::Button | TargetType::Link),
            ActionKind::Input => matches!(target_type, TargetType::Input | TargetType::Textarea),
            ActionKind::Select => matches!(
                target_type,
                TargetType::Select | TargetType::Checkbox | TargetType::Radio
            ),
            _ => false,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActionKind {
    type Err = SlotError;

    fn from_str(value: &str) -> Result<Self> {
        let lowered = value.trim().to_ascii_lowercase();
        ActionKind::priority_order()
            .into_iter()
            .chain(std::iter::once(ActionKind::Unknown))
            .find(|kind| kind.name() == lowered)
            .ok_or_else(|| SlotError::InvalidLexicon(format!("unknown action '{}'", value)))
    }
}

/// Structured intent extracted from one instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawActionSlot")]
pub struct ActionSlot {
    pub action: ActionKind,
    pub target: Option<String>,
    pub target_type: Option<TargetType>,
    /// Ordered and de-duplicated; the first entry is always an original keyword.
    pub keywords: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    pub value: Option<String>,
    confidence: f64,
}

/// Wire form of [`ActionSlot`]; confidence is checked on conversion.
#[derive(Deserialize)]
struct RawActionSlot {
    action: ActionKind,
    target: Option<String>,
    target_type: Option<TargetType>,
    keywords: Vec<String>,
    attributes: BTreeMap<String, String>,
    value: Option<String>,
    confidence: f64,
}

impl TryFrom<RawActionSlot> for ActionSlot {
    type Error = SlotError;

    fn try_from(raw: RawActionSlot) -> Result<Self> {
        let mut slot = ActionSlot::new(raw.action, raw.confidence)?;
        slot.target = raw.target;
        slot.target_type = raw.target_type;
        slot.keywords = raw.keywords;
        slot.attributes = raw.attributes;
        slot.value = raw.value;
        Ok(slot)
    }
}

impl ActionSlot {
    pub fn new(action: ActionKind, confidence: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&confidence) || confidence.is_nan() {
            return Err(SlotError::InvalidConfidence(confidence));
        }
        Ok(Self {
            action,
            target: None,
            target_type: None,
            keywords: Vec::new(),
            attributes: BTreeMap::new(),
            value: None,
            confidence,
        })
    }

    /// Slot with `confidence` clamped into [0, 1]; NaN becomes 0.
    pub fn clamped(action: ActionKind, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            action,
            confidence,
            ..Self::empty()
        }
    }

    /// The zero slot returned for blank instructions.
    pub fn empty() -> Self {
        Self {
            action: ActionKind::Unknown,
            target: None,
            target_type: None,
            keywords: Vec::new(),
            attributes: BTreeMap::new(),
            value: None,
            confidence: 0.0,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_target_type(mut self, target_type: TargetType) -> Self {
        self.target_type = Some(target_type);
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for keyword in keywords {
            let keyword = keyword.into();
            if !keyword.is_empty() && !self.keywords.contains(&keyword) {
                self.keywords.push(keyword);
            }
        }
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Usable slots carry keywords and reach `min_confidence`.
    pub fn is_usable(&self, min_confidence: f64) -> bool {
        !self.keywords.is_empty() && self.confidence >= min_confidence
    }
}

impl Default for ActionSlot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Extractor options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotOptions {
    pub enable_synonyms: bool,
    /// Upper bound on expansions added per keyword.
    pub max_synonyms: usize,
    /// Descriptions up to this many characters are kept whole as a keyword.
    pub max_full_keyword_chars: usize,
}

impl Default for SlotOptions {
    fn default() -> Self {
        Self {
            enable_synonyms: true,
            max_synonyms: 5,
            max_full_keyword_chars: 20,
        }
    }
}
