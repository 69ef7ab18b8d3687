//! Splitting note bodies into fields.

use std::collections::BTreeMap;

use regex::Regex;

use super::syntax::{id_from_line, ID_INLINE, TAG_PREFIX};
use crate::models::NoteId;

/// Fields, id and tags read from one note body.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SplitBody {
    pub values: BTreeMap<String, String>,
    pub id: Option<NoteId>,
    pub tags: Vec<String>,
}

/// Split the lines of a block note (category line excluded) into fields.
///
/// A line starting with `Field:` switches the current field; lines before any
/// prefix belong to the first field. Id and tag lines are pulled out.
pub fn split_block<'a>(lines: impl IntoIterator<Item = &'a str>, fields: &[String]) -> SplitBody {
    let mut body = SplitBody::default();
    let mut parts: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let Some(first) = fields.first() else {
        return body;
    };
    let mut current = first.as_str();

    for line in lines {
        if let Some(id) = id_from_line(line) {
            body.id = Some(id);
            continue;
        }
        if let Some(tags) = line.strip_prefix(TAG_PREFIX) {
            body.tags
                .extend(tags.split_whitespace().map(str::to_string));
            continue;
        }
        let prefixed = fields
            .iter()
            .filter_map(|field| {
                line.strip_prefix(field.as_str())
                    .and_then(|rest| rest.strip_prefix(':'))
                    .map(|rest| (field.as_str(), rest))
            })
            .max_by_key(|(field, _)| field.len());
        match prefixed {
            Some((field, rest)) => {
                current = field;
                parts.entry(current).or_default().push(rest.trim_start());
            }
            None => parts.entry(current).or_default().push(line),
        }
    }

    body.values = fields
        .iter()
        .map(|field| {
            let joined = parts
                .get(field.as_str())
                .map(|lines| lines.join("\n"))
                .unwrap_or_default();
            (field.clone(), joined.trim().to_string())
        })
        .collect();
    body
}

/// Split the content of an inline note into fields.
///
/// Field prefixes must start the content or follow whitespace.
pub fn split_inline(content: &str, fields: &[String]) -> Result<SplitBody, regex::Error> {
    let mut body = SplitBody::default();
    let Some(first) = fields.first() else {
        return Ok(body);
    };

    let content = match ID_INLINE.captures(content) {
        Some(caps) => {
            body.id = caps[1].parse().ok();
            ID_INLINE.replace(content, "").into_owned()
        }
        None => content.to_string(),
    };

    let alternation = fields
        .iter()
        .map(|field| regex::escape(field))
        .collect::<Vec<_>>()
        .join("|");
    let prefix = Regex::new(&format!(r"(?:^|\s)({alternation}):\s*"))?;

    let mut parts: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    let mut current = first.clone();
    let mut cursor = 0;
    for caps in prefix.captures_iter(&content) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        parts
            .entry(current)
            .or_default()
            .push(&content[cursor..whole.start()]);
        current = name.as_str().to_string();
        cursor = whole.end();
    }
    parts.entry(current).or_default().push(&content[cursor..]);

    body.values = fields
        .iter()
        .map(|field| {
            let joined = parts
                .get(field)
                .map(|pieces| pieces.join(" "))
                .unwrap_or_default();
            (field.clone(), joined.trim().to_string())
        })
        .collect();
    Ok(body)
}
