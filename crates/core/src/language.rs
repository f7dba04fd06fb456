//! Lightweight heuristic language detection.
//!
//! The reasoning engine is told which language to reply in via a directive
//! appended to the submitted turn. Detection is intentionally cheap: script
//! ranges decide CJK, stopword hits decide among the Latin-script languages,
//! and ties fall back to English.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    English,
    Spanish,
    French,
    German,
    Portuguese,
    Chinese,
    Japanese,
    Korean,
}

impl Language {
    pub fn name(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Spanish => "Spanish",
            Self::French => "French",
            Self::German => "German",
            Self::Portuguese => "Portuguese",
            Self::Chinese => "Chinese",
            Self::Japanese => "Japanese",
            Self::Korean => "Korean",
        }
    }

    /// Instruction appended to the user text on submission.
    pub fn reply_directive(&self) -> String {
        format!("Reply in {}.", self.name())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Spanish => "es",
            Self::French => "fr",
            Self::German => "de",
            Self::Portuguese => "pt",
            Self::Chinese => "zh",
            Self::Japanese => "ja",
            Self::Korean => "ko",
        }
    }
}

const SPANISH_STOPWORDS: &[&str] =
    &["el", "la", "los", "las", "que", "para", "una", "con", "por", "como", "gracias", "hola"];
const FRENCH_STOPWORDS: &[&str] =
    &["le", "la", "les", "des", "une", "est", "avec", "pour", "vous", "bonjour", "merci", "je"];
const GERMAN_STOPWORDS: &[&str] =
    &["der", "die", "das", "und", "ich", "nicht", "ein", "mit", "für", "danke", "bitte", "sie"];
const PORTUGUESE_STOPWORDS: &[&str] =
    &["o", "os", "uma", "com", "não", "para", "você", "obrigado", "olá", "por", "em", "que"];

pub fn detect(text: &str) -> Language {
    if let Some(language) = detect_script(text) {
        return language;
    }

    let tokens: Vec<String> = text
        .to_lowercase()
        .split(|c: char| !c.is_alphabetic())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect();

    let candidates = [
        (Language::Spanish, SPANISH_STOPWORDS),
        (Language::French, FRENCH_STOPWORDS),
        (Language::German, GERMAN_STOPWORDS),
        (Language::Portuguese, PORTUGUESE_STOPWORDS),
    ];

    let mut best = Language::English;
    let mut best_hits = 0usize;
    for (language, stopwords) in candidates {
        let hits =
            tokens.iter().filter(|token| stopwords.contains(&token.as_str())).count();
        if hits > best_hits {
            best = language;
            best_hits = hits;
        }
    }

    // A single stopword hit is too weak a signal for short messages.
    if best_hits >= 2 { best } else { Language::English }
}

fn detect_script(text: &str) -> Option<Language> {
    let mut han = 0usize;
    let mut kana = 0usize;
    let mut hangul = 0usize;
    for c in text.chars() {
        match c as u32 {
            0x4E00..=0x9FFF => han += 1,
            0x3040..=0x30FF => kana += 1,
            0xAC00..=0xD7AF | 0x1100..=0x11FF => hangul += 1,
            _ => {}
        }
    }

    if hangul > 0 && hangul >= han && hangul >= kana {
        return Some(Language::Korean);
    }
    // Kana is unambiguous: Han alone reads as Chinese, Han plus kana as
    // Japanese.
    if kana > 0 {
        return Some(Language::Japanese);
    }
    if han > 0 {
        return Some(Language::Chinese);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_is_the_default() {
        assert_eq!(detect("What are your opening hours tomorrow?"), Language::English);
    }

    #[test]
    fn spanish_stopwords_win() {
        assert_eq!(detect("Hola, necesito una cita para el martes por la tarde"), Language::Spanish);
    }

    #[test]
    fn french_stopwords_win() {
        assert_eq!(detect("Bonjour, je voudrais un rendez-vous avec le docteur"), Language::French);
    }

    #[test]
    fn german_stopwords_win() {
        assert_eq!(detect("Ich möchte bitte einen Termin für die nächste Woche"), Language::German);
    }

    #[test]
    fn han_without_kana_reads_as_chinese() {
        assert_eq!(detect("你好，我想预约明天下午的时间"), Language::Chinese);
    }

    #[test]
    fn kana_reads_as_japanese() {
        assert_eq!(detect("こんにちは、明日の予約をお願いします"), Language::Japanese);
    }

    #[test]
    fn hangul_reads_as_korean() {
        assert_eq!(detect("안녕하세요 내일 예약하고 싶어요"), Language::Korean);
    }

    #[test]
    fn single_stopword_hit_is_not_enough() {
        // "la" alone appears in English text (e.g. names) too often to trust.
        assert_eq!(detect("Meet me at La Guardia"), Language::English);
    }

    #[test]
    fn directive_names_the_language() {
        assert_eq!(Language::Spanish.reply_directive(), "Reply in Spanish.");
    }
}
