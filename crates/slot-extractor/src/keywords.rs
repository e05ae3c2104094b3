//! Keyword tokenization for target descriptions
use unicode_segmentation::UnicodeSegmentation;

use crate::lexicon::SlotLexicon;
use crate::text;

/// Splits a target description into match keywords.
///
/// Latin text goes through Unicode word segmentation; CJK runs are split
/// around the lexicon's type names and separator particles, since UAX #29
/// would otherwise cut them into single ideographs.
#[derive(Debug, Clone)]
pub struct KeywordTokenizer {
    type_names: Vec<String>,
    separators: Vec<String>,
    stop_words: Vec<String>,
    max_full_chars: usize,
}

impl KeywordTokenizer {
    pub fn new(lexicon: &SlotLexicon, max_full_chars: usize) -> Self {
        let type_names = lexicon
            .type_names()
            .into_iter()
            .filter(|name| text::has_cjk(name))
            .map(str::to_string)
            .collect();
        Self {
            type_names,
            separators: lexicon.separators.clone(),
            stop_words: lexicon.stop_words.clone(),
            max_full_chars,
        }
    }

    pub fn tokenize(&self, description: &str) -> Vec<String> {
        let description = text::trim_edges(description);
        if description.is_empty() {
            return Vec::new();
        }

        let mut tokens: Vec<String> = Vec::new();
        if text::char_len(description) <= self.max_full_chars {
            tokens.push(description.to_string());
        }
        for chunk in script_runs(description) {
            if text::has_cjk(chunk) {
                tokens.extend(self.split_cjk(chunk));
            } else {
                tokens.extend(chunk.unicode_words().map(str::to_string));
            }
        }

        let mut out: Vec<String> = Vec::new();
        for token in tokens {
            let token = text::trim_edges(&token).to_string();
            if token.is_empty() || self.is_stop_word(&token) {
                continue;
            }
            if !out.iter().any(|seen| seen.eq_ignore_ascii_case(&token)) {
                out.push(token);
            }
        }

        // Bare type nouns only help when nothing more specific is left.
        let full = description.to_string();
        let has_specific = out
            .iter()
            .any(|token| *token != full && !self.is_type_name(token));
        if has_specific {
            out.retain(|token| !self.is_type_name(token));
        }
        out
    }

    fn is_stop_word(&self, token: &str) -> bool {
        self.stop_words
            .iter()
            .any(|word| word.eq_ignore_ascii_case(token))
    }

    fn is_type_name(&self, token: &str) -> bool {
        self.type_names.iter().any(|name| name == token)
            || matches!(
                token.to_ascii_lowercase().as_str(),
                "button" | "btn" | "input" | "field" | "link" | "checkbox" | "dropdown" | "textbox"
            )
    }

    fn split_cjk(&self, run: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut buffer = String::new();
        let mut rest = run;
        'scan: while let Some(c) = rest.chars().next() {
            for separator in &self.separators {
                if !separator.is_empty() && rest.starts_with(separator.as_str()) {
                    flush(&mut buffer, &mut out);
                    rest = &rest[separator.len()..];
                    continue 'scan;
                }
            }
            for name in &self.type_names {
                if rest.starts_with(name.as_str()) {
                    flush(&mut buffer, &mut out);
                    out.push(name.clone());
                    rest = &rest[name.len()..];
                    continue 'scan;
                }
            }
            buffer.push(c);
            rest = &rest[c.len_utf8()..];
        }
        flush(&mut buffer, &mut out);
        out
    }
}

fn flush(buffer: &mut String, out: &mut Vec<String>) {
    if !buffer.is_empty() {
        out.push(std::mem::take(buffer));
    }
}

/// Split text into maximal CJK / non-CJK runs, dropping whitespace between them.
fn script_runs(text: &str) -> Vec<&str> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut current: Option<bool> = None;
    for (idx, c) in text.char_indices() {
        let cjk = text::is_cjk(c);
        match current {
            Some(kind) if kind != cjk => {
                runs.push(text[start..idx].trim());
                start = idx;
                current = Some(cjk);
            }
            None => current = Some(cjk),
            _ => {}
        }
    }
    runs.push(text[start..].trim());
    runs.retain(|run| !run.is_empty());
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> KeywordTokenizer {
        KeywordTokenizer::new(&SlotLexicon::default(), 20)
    }

    #[test]
    fn splits_cjk_around_type_names() {
        assert_eq!(tokenizer().tokenize("清除按钮"), vec!["清除按钮", "清除"]);
        assert_eq!(
            tokenizer().tokenize("用户名输入框"),
            vec!["用户名输入框", "用户名"]
        );
    }

    #[test]
    fn keeps_bare_type_name() {
        assert_eq!(tokenizer().tokenize("按钮"), vec!["按钮"]);
    }

    #[test]
    fn splits_on_particles_and_drops_stop_words() {
        let tokens = tokenizer().tokenize("登录页面的提交按钮");
        assert_eq!(tokens, vec!["登录页面的提交按钮", "登录页面", "提交"]);
    }

    #[test]
    fn latin_words_are_segmented() {
        let tokens = tokenizer().tokenize("username field");
        assert_eq!(tokens, vec!["username field", "username"]);
    }

    #[test]
    fn long_descriptions_are_not_kept_whole() {
        let long = "the big shiny submit button at the very bottom of the page";
        let tokens = tokenizer().tokenize(long);
        assert!(!tokens.contains(&long.to_string()));
        assert!(tokens.contains(&"submit".to_string()));
        assert!(!tokens.contains(&"the".to_string()));
    }

    #[test]
    fn mixed_script_runs() {
        let tokens = tokenizer().tokenize("admin账号");
        assert_eq!(tokens, vec!["admin账号", "admin", "账号"]);
    }

    #[test]
    fn empty_description_has_no_keywords() {
        assert!(tokenizer().tokenize("  ").is_empty());
    }
}
