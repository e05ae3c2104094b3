//! L1 Slot Extractor - instruction understanding
//!
//! Turns a natural-language UI instruction into an [`ActionSlot`]:
//! - Intent recognition from an action keyword table
//! - Target type recognition (common names, keywords, patterns)
//! - Keyword tokenization with synonym and translation expansion
//! - Attribute hints and literal input values
//! - Spatial relation parsing shared with the spatial resolver
//!
//! All tables live in an explicit [`SlotLexicon`] registry passed to the
//! extractor, so differently configured pipelines can coexist in one process.

pub mod errors;
pub mod extractor;
pub mod keywords;
pub mod lexicon;
pub mod models;
pub mod relation;
pub mod synonyms;
mod text;

pub use errors::{Result, SlotError};
pub use extractor::SlotExtractor;
pub use keywords::KeywordTokenizer;
pub use lexicon::{
    AttributeHint, ContextRule, DirectionWords, DistanceWords, SlotLexicon, TypeVocabulary,
};
pub use models::{ActionKind, ActionSlot, SlotOptions, MIN_USABLE_CONFIDENCE};
pub use relation::{Direction, SpatialParser, SpatialRelation};
pub use synonyms::SynonymExpander;
