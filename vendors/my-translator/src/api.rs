use serde::{Deserialize, Serialize};
use tolk_translator::{DictionaryEntry, Meaning, Translation};

#[derive(Debug, Serialize)]
pub(crate) struct WordDetailRequest<'a> {
    pub text: &'a str,
}

/// Body of `POST /vocabulary/words/detail/`
#[derive(Debug, Deserialize)]
pub(crate) struct WordDetail {
    pub language: String,
    #[serde(default)]
    pub pronunciations: Vec<Pronunciation>,
    #[serde(default)]
    pub concepts: Vec<Concept>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Pronunciation {
    pub sound: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Concept {
    pub concept: String,
    #[serde(default)]
    pub definitions: Vec<Definition>,
    #[serde(default)]
    pub translations: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Definition {
    pub text: String,
    #[serde(default)]
    pub example: Option<String>,
}

impl WordDetail {
    /// Map the word detail onto the canonical result. Sound paths are relative to `base_url`.
    pub fn into_translation(self, base_url: &str) -> Translation {
        let translation = self
            .concepts
            .iter()
            .map(|concept| concept.translations.join(","))
            .collect::<Vec<_>>()
            .join(",");

        let transcription = self
            .concepts
            .first()
            .and_then(|concept| concept.translations.first())
            .cloned();

        let pronunciations = (!self.pronunciations.is_empty()).then(|| {
            self.pronunciations
                .iter()
                .map(|p| format!("{base_url}{}", p.sound))
                .collect()
        });

        let dictionary = (!self.concepts.is_empty()).then(|| {
            self.concepts
                .into_iter()
                .map(|concept| DictionaryEntry {
                    transcription: concept.translations.join(","),
                    word_type: concept.concept,
                    meanings: concept
                        .definitions
                        .into_iter()
                        .map(|definition| Meaning {
                            word: definition.text.clone(),
                            translation: vec![definition.text],
                            examples: definition
                                .example
                                .filter(|example| !example.is_empty())
                                .map(|example| vec![vec![example]]),
                        })
                        .collect(),
                })
                .collect()
        });

        Translation {
            translation,
            lang_detected: self.language,
            transcription,
            pronunciations,
            dictionary,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn detail(value: Value) -> WordDetail {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_concepts_become_dictionary() {
        let translation = detail(json!({
            "id": 12,
            "language": "en",
            "text": "run",
            "pronunciations": [{ "sound": "/media/run.mp3" }],
            "concepts": [
                {
                    "concept": "verb",
                    "definitions": [
                        { "text": "move fast", "example": "I run every day" },
                        { "text": "operate", "example": "" }
                    ],
                    "translations": ["bežat", "idti"]
                },
                {
                    "concept": "noun",
                    "definitions": [{ "text": "a jog", "example": null }],
                    "translations": ["beg"]
                }
            ]
        }))
        .into_translation("http://vocab.test");

        assert_eq!(translation.lang_detected, "en");
        assert_eq!(translation.translation, "bežat,idti,beg");
        assert_eq!(translation.transcription.as_deref(), Some("bežat"));
        assert_eq!(
            translation.pronunciations,
            Some(vec!["http://vocab.test/media/run.mp3".to_string()])
        );

        let dictionary = translation.dictionary.unwrap();
        assert_eq!(dictionary.len(), 2);
        assert_eq!(dictionary[0].word_type, "verb");
        assert_eq!(dictionary[0].transcription, "bežat,idti");
        assert_eq!(dictionary[0].meanings[0].word, "move fast");
        assert_eq!(dictionary[0].meanings[0].translation, vec!["move fast"]);
        assert_eq!(
            dictionary[0].meanings[0].examples,
            Some(vec![vec!["I run every day".to_string()]])
        );
        assert_eq!(dictionary[0].meanings[1].examples, None);
        assert_eq!(dictionary[1].meanings[0].examples, None);
    }

    #[test]
    fn test_word_without_concepts() {
        let translation = detail(json!({ "id": "x", "language": "ru", "text": "?" }))
            .into_translation("http://vocab.test");

        assert_eq!(translation.translation, "");
        assert_eq!(translation.lang_detected, "ru");
        assert!(translation.transcription.is_none());
        assert!(translation.pronunciations.is_none());
        assert!(translation.dictionary.is_none());
    }
}
