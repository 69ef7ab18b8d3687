//! Settings model
//!
//! Key names follow the persisted plugin data format, so state files written by
//! earlier versions load without migration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Token strings that delimit notes and directive lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntaxConfig {
    #[serde(rename = "Begin Note")]
    pub begin_note: String,
    #[serde(rename = "End Note")]
    pub end_note: String,
    #[serde(rename = "Begin Inline Note")]
    pub begin_inline_note: String,
    #[serde(rename = "End Inline Note")]
    pub end_inline_note: String,
    #[serde(rename = "Target Deck Line")]
    pub target_deck_line: String,
    #[serde(rename = "File Tags Line")]
    pub file_tags_line: String,
    #[serde(rename = "Delete Regex Note Line")]
    pub delete_note_line: String,
    #[serde(rename = "Frozen Fields Line")]
    pub frozen_fields_line: String,
    #[serde(flatten)]
    unknown: BTreeMap<String, Value>,
}

impl Default for SyntaxConfig {
    fn default() -> Self {
        Self {
            begin_note: "START".to_string(),
            end_note: "END".to_string(),
            begin_inline_note: "STARTI".to_string(),
            end_inline_note: "ENDI".to_string(),
            target_deck_line: "TARGET DECK".to_string(),
            file_tags_line: "FILE TAGS".to_string(),
            delete_note_line: "DELETE".to_string(),
            frozen_fields_line: "FROZEN".to_string(),
            unknown: BTreeMap::new(),
        }
    }
}

impl SyntaxConfig {
    /// Display names and current values, in settings order.
    pub fn entries(&self) -> [(&'static str, &str); 8] {
        [
            ("Begin Note", &self.begin_note),
            ("End Note", &self.end_note),
            ("Begin Inline Note", &self.begin_inline_note),
            ("End Inline Note", &self.end_inline_note),
            ("Target Deck Line", &self.target_deck_line),
            ("File Tags Line", &self.file_tags_line),
            ("Delete Regex Note Line", &self.delete_note_line),
            ("Frozen Fields Line", &self.frozen_fields_line),
        ]
    }

    /// Set a token by its display name.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::InvalidInput(format!("Syntax token '{key}' cannot be empty")));
        }
        let slot = match key {
            "Begin Note" => &mut self.begin_note,
            "End Note" => &mut self.end_note,
            "Begin Inline Note" => &mut self.begin_inline_note,
            "End Inline Note" => &mut self.end_inline_note,
            "Target Deck Line" => &mut self.target_deck_line,
            "File Tags Line" => &mut self.file_tags_line,
            "Delete Regex Note Line" => &mut self.delete_note_line,
            "Frozen Fields Line" => &mut self.frozen_fields_line,
            _ => return Err(Error::InvalidInput(format!("Unknown syntax key '{key}'"))),
        };
        *slot = value.to_string();
        Ok(())
    }
}

/// Default behaviour applied to every parsed note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Append a link back to the source file to the first field
    #[serde(rename = "Add File Link")]
    pub add_file_link: bool,
    /// Tag added to every note; empty disables it
    #[serde(rename = "Tag")]
    pub tag: String,
    /// Deck used until a target deck directive says otherwise
    #[serde(rename = "Deck")]
    pub deck: String,
    /// Convert `{answer}` markers in cloze categories
    #[serde(rename = "CurlyCloze")]
    pub curly_cloze: bool,
    /// Scan per-category custom regexps
    #[serde(rename = "Regex")]
    pub regex: bool,
    /// Write ids as `<!--ID: N-->` instead of a bare `ID: N` line
    #[serde(rename = "ID Comments")]
    pub id_comments: bool,
    #[serde(rename = "Allow Duplicates")]
    pub allow_duplicates: bool,
    #[serde(rename = "Duplicate Scope")]
    pub duplicate_scope: String,
    #[serde(flatten)]
    unknown: BTreeMap<String, Value>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            add_file_link: false,
            tag: "Obsidian_to_Anki".to_string(),
            deck: "Default".to_string(),
            curly_cloze: false,
            regex: false,
            id_comments: true,
            allow_duplicates: false,
            duplicate_scope: "deck".to_string(),
            unknown: BTreeMap::new(),
        }
    }
}

impl Defaults {
    /// Set a default by its display name, parsing booleans from the value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "Add File Link" => self.add_file_link = parse_flag(key, value)?,
            "CurlyCloze" => self.curly_cloze = parse_flag(key, value)?,
            "Regex" => self.regex = parse_flag(key, value)?,
            "ID Comments" => self.id_comments = parse_flag(key, value)?,
            "Allow Duplicates" => self.allow_duplicates = parse_flag(key, value)?,
            "Tag" => self.tag = value.to_string(),
            "Deck" => {
                if value.is_empty() {
                    return Err(Error::InvalidInput("Deck cannot be empty".to_string()));
                }
                self.deck = value.to_string();
            }
            "Duplicate Scope" => {
                if !matches!(value, "deck" | "collection") {
                    return Err(Error::InvalidInput(format!(
                        "Duplicate Scope must be 'deck' or 'collection', got '{value}'"
                    )));
                }
                self.duplicate_scope = value.to_string();
            }
            _ => return Err(Error::InvalidInput(format!("Unknown default '{key}'"))),
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" => Ok(true),
        "false" | "off" | "no" => Ok(false),
        _ => Err(Error::InvalidInput(format!(
            "{key} expects true or false, got '{value}'"
        ))),
    }
}

/// Categories added and removed by a regeneration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryChanges {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl CategoryChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Typed plugin settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Category to custom note pattern; empty pattern means none
    #[serde(rename = "CUSTOM_REGEXPS", default)]
    pub custom_regexps: BTreeMap<String, String>,
    /// Category to its field names, in store order
    #[serde(rename = "FIELDS", default)]
    pub fields: BTreeMap<String, Vec<String>>,
    #[serde(rename = "Syntax", default)]
    pub syntax: SyntaxConfig,
    #[serde(rename = "Defaults", default)]
    pub defaults: Defaults,
    #[serde(flatten)]
    unknown: BTreeMap<String, Value>,
}

impl Settings {
    /// Field names of `category`, if the store knows it.
    pub fn fields_for(&self, category: &str) -> Option<&[String]> {
        self.fields.get(category).map(Vec::as_slice)
    }

    /// Keys present in persisted data that this version does not understand.
    pub fn unknown_keys(&self) -> Vec<String> {
        self.unknown
            .keys()
            .cloned()
            .chain(self.syntax.unknown.keys().map(|key| format!("Syntax.{key}")))
            .chain(
                self.defaults
                    .unknown
                    .keys()
                    .map(|key| format!("Defaults.{key}")),
            )
            .collect()
    }

    pub fn drop_unknown_keys(&mut self) {
        self.unknown.clear();
        self.syntax.unknown.clear();
        self.defaults.unknown.clear();
    }

    /// Replace the category table with the store's current one.
    ///
    /// Patterns of surviving categories are kept, vanished categories are pruned
    /// and new ones get an empty pattern.
    pub fn regenerate(&mut self, categories: BTreeMap<String, Vec<String>>) -> CategoryChanges {
        let mut changes = CategoryChanges::default();

        self.custom_regexps.retain(|category, _| {
            let keep = categories.contains_key(category);
            if !keep {
                changes.removed.push(category.clone());
            }
            keep
        });
        for category in categories.keys() {
            if !self.custom_regexps.contains_key(category) {
                self.custom_regexps.insert(category.clone(), String::new());
                changes.added.push(category.clone());
            }
        }

        self.fields = categories;
        changes
    }

    /// Set the custom pattern of a known category.
    pub fn set_custom_regexp(&mut self, category: &str, pattern: &str) -> Result<()> {
        let Some(slot) = self.custom_regexps.get_mut(category) else {
            return Err(Error::Config(format!(
                "Unknown category '{category}'; regenerate the category table first"
            )));
        };
        regex::Regex::new(pattern)?;
        *slot = pattern.to_string();
        Ok(())
    }

    /// Check syntax tokens and the category table together.
    pub fn validate(&self) -> Result<()> {
        self.validate_syntax()?;
        self.validate_categories()
    }

    /// Check that the custom regexps agree with the category table.
    ///
    /// A mismatch is repaired by regenerating from the store.
    pub fn validate_categories(&self) -> Result<()> {
        if let Some(category) = self
            .custom_regexps
            .keys()
            .find(|category| !self.fields.contains_key(*category))
        {
            return Err(Error::Config(format!(
                "Custom regexp for '{category}' has no matching category"
            )));
        }
        Ok(())
    }

    /// Check that the syntax tokens can be told apart.
    pub fn validate_syntax(&self) -> Result<()> {
        for (key, value) in self.syntax.entries() {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("Syntax token '{key}' is empty")));
            }
        }
        if self.syntax.begin_note == self.syntax.end_note {
            return Err(Error::Config(
                "Begin Note and End Note tokens must differ".to_string(),
            ));
        }
        Ok(())
    }
}
