//! Synonym and translation expansion
use std::collections::BTreeMap;

use crate::lexicon::SlotLexicon;

/// Expands keywords through the lexicon's synonym and translation tables.
#[derive(Debug, Clone)]
pub struct SynonymExpander {
    synonyms: BTreeMap<String, Vec<String>>,
    translations: BTreeMap<String, Vec<String>>,
    max_synonyms: usize,
}

impl SynonymExpander {
    pub fn new(lexicon: &SlotLexicon, max_synonyms: usize) -> Self {
        let synonyms = lowered_keys(&lexicon.synonyms);

        // Both directions: zh -> en from the table, en -> zh derived.
        let mut translations = lowered_keys(&lexicon.translations);
        for (source, targets) in &lexicon.translations {
            for target in targets {
                translations
                    .entry(target.to_lowercase())
                    .or_default()
                    .push(source.clone());
            }
        }

        Self {
            synonyms,
            translations,
            max_synonyms,
        }
    }

    pub fn max_synonyms(&self) -> usize {
        self.max_synonyms
    }

    /// `keyword` followed by at most `max_synonyms` distinct expansions.
    pub fn expand(&self, keyword: &str) -> Vec<String> {
        let mut out = vec![keyword.to_string()];
        let key = keyword.to_lowercase();

        let direct = self.synonyms.get(&key).into_iter().flatten();
        let translated: Vec<&String> = self.translations.get(&key).into_iter().flatten().collect();
        // Synonyms of a translation come last so direct hits win the budget.
        let indirect = translated
            .iter()
            .flat_map(|term| self.synonyms.get(&term.to_lowercase()).into_iter().flatten());

        for candidate in direct.chain(translated.iter().copied()).chain(indirect) {
            if out.len() > self.max_synonyms {
                break;
            }
            if !out.iter().any(|seen| seen.to_lowercase() == candidate.to_lowercase()) {
                out.push(candidate.clone());
            }
        }
        out
    }

    /// Originals first in their given order, then every expansion, de-duplicated.
    pub fn expand_all(&self, keywords: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for keyword in keywords {
            push_unique(&mut out, keyword);
        }
        for keyword in keywords {
            for expansion in self.expand(keyword).iter().skip(1) {
                push_unique(&mut out, expansion);
            }
        }
        out
    }
}

fn push_unique(out: &mut Vec<String>, candidate: &str) {
    let lowered = candidate.to_lowercase();
    if !out.iter().any(|seen| seen.to_lowercase() == lowered) {
        out.push(candidate.to_string());
    }
}

fn lowered_keys(table: &BTreeMap<String, Vec<String>>) -> BTreeMap<String, Vec<String>> {
    table
        .iter()
        .map(|(key, values)| (key.to_lowercase(), values.clone()))
        .collect()
}
