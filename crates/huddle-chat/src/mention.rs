use std::collections::HashSet;

fn is_handle_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// Lowercased `@username` handles in a message. An `@` glued to a preceding
/// word (an email address) is not a mention, and a trailing period is
/// treated as punctuation.
pub fn mentioned_usernames(content: &str) -> HashSet<String> {
    let mut found = HashSet::new();
    let mut prev: Option<char> = None;

    for (i, c) in content.char_indices() {
        let starts_mention = c == '@' && !prev.is_some_and(|p| p.is_alphanumeric() || p == '_');
        prev = Some(c);
        if !starts_mention {
            continue;
        }

        let rest = &content[i + 1..];
        let end = rest.find(|ch: char| !is_handle_char(ch)).unwrap_or(rest.len());
        let handle = rest[..end].trim_end_matches('.');
        if !handle.is_empty() {
            found.insert(handle.to_ascii_lowercase());
        }
    }

    found
}
