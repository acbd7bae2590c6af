use std::sync::LazyLock;

use regex::Regex;

use crate::model::ClientIdentity;

/// `ID` + at least three digits, whitespace, then the client name.
#[allow(clippy::expect_used)]
static CAPTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(ID[0-9]{3,})\s+(.+)$").expect("caption pattern compiles")
});

/// Extract the client identity from a caption such as `"ID001 John Smith"`.
///
/// Returns `None` for anything that does not have that shape: a missing or
/// empty caption, a missing `ID` prefix, fewer than three digits, no
/// separator, or an empty name. Malformed input is a normal outcome, never
/// an error.
pub fn parse_caption(caption: Option<&str>) -> Option<ClientIdentity> {
    let caption = caption?.trim();
    let captures = CAPTION_PATTERN.captures(caption)?;
    let client_id = captures.get(1)?.as_str().to_uppercase();
    let name = captures.get(2)?.as_str().trim();
    if name.is_empty() {
        return None;
    }
    Some(ClientIdentity {
        client_id,
        name: name.to_string(),
    })
}
