use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type LanguageCode = String;

/// Source language value asking the vendor to detect the language
pub const AUTO_DETECT: &str = "auto";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateParams {
    pub text: String,
    pub from: LanguageCode,
    pub to: LanguageCode,
}

impl TranslateParams {
    pub fn new(text: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn is_auto_detect(&self) -> bool {
        self.from == AUTO_DETECT
    }
}

/// Vendor-independent translation result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub translation: String,
    pub lang_detected: LanguageCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dictionary: Option<Vec<DictionaryEntry>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryEntry {
    pub word_type: String,
    pub transcription: String,
    pub meanings: Vec<Meaning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meaning {
    pub word: String,
    pub translation: Vec<String>,
    pub examples: Option<Vec<Vec<String>>>,
}

#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    /// Registry key
    pub name: String,
    /// Display label
    pub title: String,
    pub api_url: String,
    pub public_url: String,
}

/// Supported languages, code -> label, for both directions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorLanguages {
    pub from: BTreeMap<LanguageCode, String>,
    pub to: BTreeMap<LanguageCode, String>,
}

impl VendorLanguages {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn supports(&self, from: &str, to: &str) -> bool {
        self.from.contains_key(from) && self.to.contains_key(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_omits_missing_optionals() {
        let translation = Translation {
            translation: "Hallo".to_string(),
            lang_detected: "en".to_string(),
            ..Default::default()
        };

        let json = serde_json::to_value(&translation).unwrap();
        assert_eq!(json, serde_json::json!({ "translation": "Hallo", "langDetected": "en" }));
    }

    #[test]
    fn test_meaning_keeps_null_examples() {
        let meaning = Meaning {
            word: "hi".to_string(),
            translation: vec!["hi".to_string()],
            examples: None,
        };

        let json = serde_json::to_value(&meaning).unwrap();
        assert!(json["examples"].is_null());
        assert!(json.as_object().unwrap().contains_key("examples"));
    }

    #[test]
    fn test_language_support() {
        let languages = VendorLanguages::from_json(
            r#"{"from":{"auto":"Auto-detect","en":"English"},"to":{"de":"German"}}"#,
        )
        .unwrap();

        assert!(languages.supports("auto", "de"));
        assert!(!languages.supports("en", "fr"));
    }
}
