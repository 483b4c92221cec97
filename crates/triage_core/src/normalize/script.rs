use crate::domain::Language;
use crate::error::{codes, AppError};

/// Letter counts per script family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptCensus {
    pub latin: usize,
    pub devanagari: usize,
    pub other: usize,
}

impl ScriptCensus {
    pub fn of(text: &str) -> Self {
        let mut census = Self::default();
        for c in text.chars() {
            if is_devanagari(c) {
                if c.is_alphabetic() {
                    census.devanagari += 1;
                }
            } else if is_latin(c) {
                census.latin += 1;
            } else if c.is_alphabetic() {
                census.other += 1;
            }
        }
        census
    }

    pub fn supported(&self) -> usize {
        self.latin + self.devanagari
    }

    pub fn total(&self) -> usize {
        self.supported() + self.other
    }
}

pub(crate) fn is_devanagari(c: char) -> bool {
    ('\u{0900}'..='\u{097F}').contains(&c)
}

fn is_latin(c: char) -> bool {
    c.is_ascii_alphabetic() || (('\u{00C0}'..='\u{024F}').contains(&c) && c.is_alphabetic())
}

/// Word characters: alphanumerics plus the whole Devanagari block except the dandas and the
/// abbreviation sign, so viramas and nuktas stay inside their words.
pub(crate) fn is_word_char(c: char) -> bool {
    if is_devanagari(c) {
        return !matches!(c, '\u{0964}' | '\u{0965}' | '\u{0970}');
    }
    c.is_alphanumeric()
}

/// Detect English or Hindi from script usage.
pub fn detect_language(text: &str) -> Result<Language, AppError> {
    let census = ScriptCensus::of(text);
    if census.supported() == 0 {
        return Err(AppError::new(
            codes::UNSUPPORTED_INPUT,
            "Query contains no text in a supported script",
        )
        .with_details(format!("other_letters={}", census.other)));
    }
    if census.other > census.supported() {
        return Err(AppError::new(
            codes::UNSUPPORTED_INPUT,
            "Query is written in an unsupported script",
        )
        .with_details(format!(
            "latin={}; devanagari={}; other={}",
            census.latin, census.devanagari, census.other
        )));
    }
    if super::is_hindi_share(census.devanagari, census.total()) {
        Ok(Language::Hindi)
    } else {
        Ok(Language::English)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn census_counts_scripts() {
        let c = ScriptCensus::of("fever बुखार 123");
        assert_eq!(c.latin, 5);
        assert!(c.devanagari >= 4);
        assert_eq!(c.other, 0);
    }

    #[test]
    fn mixed_text_leans_on_devanagari_share() {
        assert_eq!(detect_language("mujhe बुखार है").expect("detect"), Language::Hindi);
        assert_eq!(
            detect_language("I have had fever and headache, doctor said बुखार").expect("detect"),
            Language::English
        );
    }
}
