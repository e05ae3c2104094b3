//! Spatial relation parsing
//!
//! Recognises "X 的右边的 Y", "在 X 右边的 Y" and "Y to the right of X"
//! shapes. The parsed relation drives both the slot's target description and
//! the spatial resolver's anchor lookup.
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::lexicon::{compile, SlotLexicon};
use crate::text;

/// Direction of the target relative to its anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Above,
    Below,
    Inside,
    Near,
    Far,
}

impl Direction {
    pub fn name(&self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Above => "above",
            Direction::Below => "below",
            Direction::Inside => "inside",
            Direction::Near => "near",
            Direction::Far => "far",
        }
    }

    /// Screen angle in degrees (y grows downward). `None` for the
    /// direction-agnostic relations.
    pub fn canonical_angle(&self) -> Option<f64> {
        match self {
            Direction::Right => Some(0.0),
            Direction::Below => Some(90.0),
            Direction::Left => Some(180.0),
            Direction::Above => Some(270.0),
            Direction::Inside | Direction::Near | Direction::Far => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed "target relative to anchor" description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialRelation {
    pub anchor: String,
    pub direction: Direction,
    pub target: String,
    /// Search radius override in CSS pixels.
    pub max_distance: Option<f64>,
}

impl SpatialRelation {
    /// One-shot parse; prefer a reused [`SpatialParser`] in hot paths.
    pub fn parse(text: &str, lexicon: &SlotLexicon) -> Option<Self> {
        SpatialParser::new(lexicon).ok()?.parse(text)
    }
}

#[derive(Debug, Clone)]
struct DistanceHint {
    word: String,
    max_distance: f64,
    is_direction: bool,
}

/// Compiled spatial patterns for one lexicon
#[derive(Debug, Clone)]
pub struct SpatialParser {
    cjk: Option<Regex>,
    latin: Option<Regex>,
    literal_distance: Regex,
    directions: Vec<(String, Direction)>,
    distance_hints: Vec<DistanceHint>,
}

impl SpatialParser {
    pub fn new(lexicon: &SlotLexicon) -> Result<Self> {
        let mut directions: Vec<(String, Direction)> = lexicon
            .directions
            .iter()
            .flat_map(|entry| {
                entry
                    .words
                    .iter()
                    .map(move |word| (word.to_ascii_lowercase(), entry.direction))
            })
            .collect();
        directions.sort_by(|a, b| text::char_len(&b.0).cmp(&text::char_len(&a.0)));

        let alternation = |cjk: bool| -> Option<String> {
            let alts: Vec<String> = directions
                .iter()
                .filter(|(word, _)| text::has_cjk(word) == cjk)
                .map(|(word, _)| regex::escape(word))
                .collect();
            (!alts.is_empty()).then(|| alts.join("|"))
        };

        let cjk = alternation(true)
            .map(|alts| {
                compile(&format!(
                    r"^(?:在)?(?P<anchor>.+?)(?:的)?(?P<dir>{})(?:的)?(?P<target>.+)$",
                    alts
                ))
            })
            .transpose()?;
        let latin = alternation(false)
            .map(|alts| {
                compile(&format!(
                    r"(?i)^(?P<target>.+?)\s+(?:that is\s+|which is\s+)?(?P<dir>{})\s+(?:the\s+)?(?P<anchor>.+)$",
                    alts
                ))
            })
            .transpose()?;

        let distance_hints = lexicon
            .distance_words
            .iter()
            .flat_map(|entry| {
                entry.words.iter().map(|word| DistanceHint {
                    word: word.clone(),
                    max_distance: entry.max_distance,
                    is_direction: directions
                        .iter()
                        .any(|(dir_word, _)| dir_word.eq_ignore_ascii_case(word)),
                })
            })
            .collect();

        Ok(Self {
            cjk,
            latin,
            literal_distance: compile(r"(?i)(\d+(?:\.\d+)?)\s*(?:px|像素)(?:以内|之内|内)?(?:的)?")?,
            directions,
            distance_hints,
        })
    }

    pub fn parse(&self, text: &str) -> Option<SpatialRelation> {
        let mut working = text::trim_edges(text).to_string();
        let mut max_distance = None;

        let literal = self.literal_distance.captures(&working).and_then(|caps| {
            let value = caps.get(1)?.as_str().parse::<f64>().ok()?;
            Some((value, caps.get(0)?.range()))
        });
        if let Some((value, range)) = literal {
            max_distance = Some(value);
            working.replace_range(range, " ");
        }
        for hint in &self.distance_hints {
            if text::contains(&working, &hint.word) {
                max_distance.get_or_insert(hint.max_distance);
                if !hint.is_direction {
                    working = text::remove_all(&working, &hint.word);
                }
            }
        }
        let working = text::normalize_spaces(&working);

        let regex = if text::has_cjk(&working) {
            self.cjk.as_ref().or(self.latin.as_ref())
        } else {
            self.latin.as_ref()
        }?;
        let caps = regex.captures(&working)?;
        let anchor = text::trim_edges(caps.name("anchor")?.as_str()).to_string();
        let target = text::trim_edges(caps.name("target")?.as_str()).to_string();
        if anchor.is_empty() || target.is_empty() {
            return None;
        }
        let dir_word = caps.name("dir")?.as_str().to_ascii_lowercase();
        let direction = self
            .directions
            .iter()
            .find(|(word, _)| *word == dir_word)
            .map(|(_, direction)| *direction)?;

        Some(SpatialRelation {
            anchor,
            direction,
            target,
            max_distance,
        })
    }
}
