use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::store::{format_token, PlaceholderKind, PlaceholderStore};

static IMG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[img([1-9][0-9]*)\]\]").expect("valid regex"));
static CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[code([1-9][0-9]*)\]\]").expect("valid regex"));
static ANY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[(img|code)([1-9][0-9]*)\]\]").expect("valid regex"));

fn kind_regex(kind: PlaceholderKind) -> &'static Regex {
    match kind {
        PlaceholderKind::Img => &IMG_RE,
        PlaceholderKind::Code => &CODE_RE,
    }
}

/// One entry of the rendered preview list: a live token in order of
/// appearance together with its payload. The UI layer diffs and applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewItem {
    pub token: String,
    pub kind: PlaceholderKind,
    pub content: String,
}

// ---------------------------------------------------------------------------
// Composer: text buffer + placeholder store, kept consistent on every edit
// ---------------------------------------------------------------------------

/// Owns the composed message text, the cursor, and the placeholder store for
/// one exchange. The buffer is the single source of truth for which tokens
/// exist; `synchronize` derives and prunes the store from it, never the
/// reverse.
#[derive(Debug, Default)]
pub struct Composer {
    buffer: String,
    cursor: usize,
    store: PlaceholderStore,
}

impl Composer {
    pub fn new() -> Self {
        Composer {
            buffer: String::new(),
            cursor: 0,
            store: PlaceholderStore::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn store(&self) -> &PlaceholderStore {
        &self.store
    }

    pub fn set_cursor(&mut self, position: usize) {
        self.cursor = clamp_to_boundary(&self.buffer, position);
    }

    /// Replace the whole buffer (the generic text-change path) and
    /// resynchronize. The cursor keeps its numeric position, clamped.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
        self.synchronize();
    }

    /// Store `content` under a fresh token and splice the token at the
    /// current cursor. Mirrors the paste-image and add-code flows.
    pub fn attach(&mut self, kind: PlaceholderKind, content: impl Into<String>) -> String {
        let token = self.store.put(kind, content);
        self.insert_at(&token, self.cursor);
        token
    }

    /// Splice `token` into the buffer at a byte offset (clamped to a char
    /// boundary), move the cursor past it, and resynchronize.
    pub fn insert_at(&mut self, token: &str, position: usize) {
        let at = clamp_to_boundary(&self.buffer, position);
        self.buffer.insert_str(at, token);
        self.cursor = at + token.len();
        self.synchronize();
    }

    /// Remove every textual occurrence of `token` plus its store entry, then
    /// resynchronize so survivors are renumbered.
    pub fn delete_token(&mut self, token: &str) {
        self.buffer = self.buffer.replace(token, "");
        self.store.remove(token);
        self.synchronize();
    }

    /// Overwrite the content behind an existing code token in place. No
    /// renumbering, no buffer change. Image payloads are immutable.
    pub fn edit_code(&mut self, token: &str, content: impl Into<String>) {
        if CODE_RE.is_match(token) {
            self.store.replace(token, content);
        }
    }

    /// Restore the invariant "live tokens in text == keys in the store,
    /// contiguously numbered from 1 per kind, in order of appearance".
    ///
    /// Orphan tokens (present in text, absent from the store) are removed
    /// from the buffer silently; store entries no longer referenced by any
    /// surviving token are discarded. Idempotent. Returns whether the buffer
    /// changed.
    pub fn synchronize(&mut self) -> bool {
        let mut renames: Vec<(String, String)> = Vec::new();

        let (buffer, img_next) =
            renumber_pass(&self.buffer, PlaceholderKind::Img, &self.store, &mut renames);
        let (buffer, code_next) =
            renumber_pass(&buffer, PlaceholderKind::Code, &self.store, &mut renames);

        let changed = buffer != self.buffer;
        self.buffer = buffer;

        // Rebuild the map under the renumbered tokens; anything the buffer no
        // longer references is dropped here.
        let mut old_entries = self.store.take_entries();
        let mut new_entries = HashMap::with_capacity(renames.len());
        for (old, new) in renames {
            if let Some(content) = old_entries.remove(&old) {
                new_entries.insert(new, content);
            }
        }
        if !old_entries.is_empty() {
            tracing::debug!(count = old_entries.len(), "pruning unreferenced placeholder entries");
        }
        self.store.swap_entries(new_entries);
        self.store.set_next_number(PlaceholderKind::Img, img_next);
        self.store.set_next_number(PlaceholderKind::Code, code_next);

        // Numeric, not semantic, cursor preservation across rewrites.
        self.cursor = clamp_to_boundary(&self.buffer, self.cursor);
        changed
    }

    /// Pure view of the live tokens in order of first appearance with their
    /// payloads, for the UI layer to render as previews.
    pub fn previews(&self) -> Vec<PreviewItem> {
        let mut seen: Vec<PreviewItem> = Vec::new();
        for m in ANY_RE.find_iter(&self.buffer) {
            let token = m.as_str();
            if seen.iter().any(|p| p.token == token) {
                continue;
            }
            if let Some(content) = self.store.get(token) {
                let kind = if token.starts_with("[[img") {
                    PlaceholderKind::Img
                } else {
                    PlaceholderKind::Code
                };
                seen.push(PreviewItem {
                    token: token.to_string(),
                    kind,
                    content: content.to_string(),
                });
            }
        }
        seen
    }

    /// Back to the empty state: empty buffer, cursor 0, store cleared and
    /// counters at 1. Runs unconditionally at the end of every exchange.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.store.reset();
    }
}

/// One left-to-right renumbering pass for a single kind. Live tokens are
/// assigned 1, 2, ... in order of first appearance; repeated occurrences of
/// the same token share the assignment. Orphans are dropped from the output.
fn renumber_pass(
    buffer: &str,
    kind: PlaceholderKind,
    store: &PlaceholderStore,
    renames: &mut Vec<(String, String)>,
) -> (String, u32) {
    let re = kind_regex(kind);
    let mut out = String::with_capacity(buffer.len());
    let mut assigned: HashMap<&str, String> = HashMap::new();
    let mut next = 1u32;
    let mut last = 0usize;

    for m in re.find_iter(buffer) {
        out.push_str(&buffer[last..m.start()]);
        last = m.end();

        let old = m.as_str();
        if store.contains(old) {
            if let Some(new) = assigned.get(old) {
                out.push_str(new);
            } else {
                let new = format_token(kind, next);
                next += 1;
                out.push_str(&new);
                assigned.insert(old, new);
            }
        } else {
            tracing::debug!(token = old, "dropping orphan placeholder");
        }
    }
    out.push_str(&buffer[last..]);

    renames.extend(assigned.into_iter().map(|(old, new)| (old.to_string(), new)));
    (out, next)
}

fn clamp_to_boundary(s: &str, position: usize) -> usize {
    if position >= s.len() {
        return s.len();
    }
    let mut at = position;
    while !s.is_char_boundary(at) {
        at -= 1;
    }
    at
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    /// Buffers built from plain fragments and placeholder-shaped tokens, with
    /// a random subset of the tokens backed by store entries.
    fn fragment() -> impl Strategy<Value = String> {
        prop_oneof![
            "[ a-z]{0,6}".prop_map(|s| s),
            (prop_oneof![Just("img"), Just("code")], 1u32..20)
                .prop_map(|(kind, n)| format!("[[{}{}]]", kind, n)),
        ]
    }

    proptest! {
        #[test]
        fn synchronize_twice_is_identity(
            fragments in proptest::collection::vec(fragment(), 0..12),
            backed in proptest::collection::vec(proptest::bool::ANY, 0..12),
        ) {
            let buffer: String = fragments.concat();
            let mut c = Composer::new();
            let mut entries = std::collections::HashMap::new();
            for (fragment, live) in fragments.iter().zip(backed.iter()) {
                if *live && fragment.starts_with("[[") {
                    entries.insert(fragment.clone(), "content".to_string());
                }
            }
            c.store.swap_entries(entries);
            c.buffer = buffer;

            c.synchronize();
            let after_first = c.text().to_string();
            let len_first = c.store().len();
            let changed = c.synchronize();

            prop_assert!(!changed);
            prop_assert_eq!(c.text(), after_first.as_str());
            prop_assert_eq!(c.store().len(), len_first);
        }
    }
}
