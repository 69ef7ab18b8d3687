//! Batched positional string insertion.

use crate::error::{Error, Result};

/// Insert every `(position, text)` pair into `text` in one pass.
///
/// Positions refer to the original text. Insertions are stable-sorted by
/// position, so two insertions at the same position land in the order they
/// were supplied, and no insertion shifts where an earlier one lands.
///
/// # Examples
///
/// ```
/// use flashsync_core::mutate::insert_all;
///
/// let inserts = vec![(5, ", world".to_string()), (0, ">> ".to_string())];
/// assert_eq!(insert_all("hello", &inserts).unwrap(), ">> hello, world");
/// ```
pub fn insert_all(text: &str, insertions: &[(usize, String)]) -> Result<String> {
    let mut sorted: Vec<&(usize, String)> = insertions.iter().collect();
    sorted.sort_by_key(|(position, _)| *position);

    let extra: usize = sorted.iter().map(|(_, insert)| insert.len()).sum();
    let mut output = String::with_capacity(text.len() + extra);
    let mut cursor = 0;

    for (position, insert) in sorted {
        let position = *position;
        if position > text.len() || !text.is_char_boundary(position) {
            return Err(Error::InvalidInput(format!(
                "insertion position {position} is not a character boundary of a {}-byte text",
                text.len()
            )));
        }
        output.push_str(&text[cursor..position]);
        output.push_str(insert);
        cursor = position;
    }
    output.push_str(&text[cursor..]);

    Ok(output)
}
