// Minimal JSON field scanning. The backend replies with flat, predictable
// JSON, so instead of deserializing whole response bodies we pull out the
// handful of fields each screen needs with a small string scanner. This is
// a deliberately narrow subset of JSON: flat keys, string values with
// escaped quotes, and bare tokens (numbers, booleans, null). It is not a
// general decoder and must never be pointed at untrusted nesting depth.

/// Window taken around each record hit when scanning an array of records.
/// Large enough to cover one serialized transaction with room to spare.
const RECORD_WINDOW: usize = 500;

/// Extract the value of `key` from a JSON-ish `body` as text.
///
/// Finds the first literal `"key":` in the body, skips spaces, then reads
/// either a string literal (a backslash shields the next character from
/// terminating the literal; the character is copied through verbatim, so
/// `\n` and `\uXXXX` are NOT decoded) or a bare token up to the next
/// `,`, `}`, newline or `]`.
///
/// A missing key yields an empty string, as does a key whose value is the
/// empty string; callers treat empty as "absent" and live with that
/// ambiguity. This function never fails: a malformed body degrades to a
/// truncated or empty result.
///
/// The scan covers the whole input, so on a body holding many records the
/// caller must pre-slice to one record first (see [`records`]) or risk
/// picking up a same-named field from a neighbouring record.
pub fn extract_field(body: &str, key: &str) -> String {
    let pattern = format!("\"{key}\":");
    let Some(hit) = body.find(&pattern) else {
        return String::new();
    };
    let rest = body[hit + pattern.len()..].trim_start_matches(' ');

    if let Some(literal) = rest.strip_prefix('"') {
        let mut value = String::new();
        let mut chars = literal.chars();
        while let Some(c) = chars.next() {
            match c {
                '"' => return value,
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        value.push(escaped);
                    }
                }
                _ => value.push(c),
            }
        }
        // Unterminated literal: best effort, return what we collected.
        value
    } else {
        let end = rest.find([',', '}', '\n', ']']).unwrap_or(rest.len());
        rest[..end].trim_matches(|c| c == ' ' || c == '\r').to_string()
    }
}

/// Scan `body` for successive records anchored on `anchor_key`, yielding at
/// most `max_records` slices in document order.
///
/// Each slice starts at an occurrence of the quoted anchor key and extends
/// [`RECORD_WINDOW`] bytes (clamped to the body and to a char boundary), so
/// [`extract_field`] on a slice sees that record's fields first. The search
/// cursor moves one byte past each hit rather than past the window, so
/// adjacent records are never skipped. Single forward pass; if the anchor
/// never occurs the iterator is empty and the caller should render an
/// explicit "nothing here" state.
pub fn records<'a>(
    body: &'a str,
    anchor_key: &str,
    max_records: usize,
) -> impl Iterator<Item = &'a str> + 'a {
    let pattern = format!("\"{anchor_key}\":");
    let mut cursor = 0usize;
    let mut yielded = 0usize;
    std::iter::from_fn(move || {
        if yielded == max_records || cursor >= body.len() {
            return None;
        }
        let hit = body[cursor..].find(&pattern)? + cursor;
        let mut end = (hit + RECORD_WINDOW).min(body.len());
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        cursor = hit + 1;
        yielded += 1;
        Some(&body[hit..end])
    })
}
