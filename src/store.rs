use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::collections::HashMap;

/// The two kinds of inline content a message can embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    Img,
    Code,
}

impl PlaceholderKind {
    pub const ALL: [PlaceholderKind; 2] = [PlaceholderKind::Img, PlaceholderKind::Code];
}

impl std::fmt::Display for PlaceholderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaceholderKind::Img => write!(f, "img"),
            PlaceholderKind::Code => write!(f, "code"),
        }
    }
}

/// Format a placeholder token, e.g. `[[img3]]` or `[[code1]]`.
pub fn format_token(kind: PlaceholderKind, n: u32) -> String {
    format!("[[{}{}]]", kind, n)
}

/// Encode raw image bytes as a base64 data URL, the payload format the
/// content map stores for `img` placeholders.
pub fn image_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

// ---------------------------------------------------------------------------
// PlaceholderStore: token → content map plus per-kind counters
// ---------------------------------------------------------------------------

/// Owns the token → content map and the monotonic per-kind counters for one
/// exchange. Ephemeral: the session controller resets it after every exchange.
#[derive(Debug, Default)]
pub struct PlaceholderStore {
    entries: HashMap<String, String>,
    img_next: u32,
    code_next: u32,
}

impl PlaceholderStore {
    pub fn new() -> Self {
        PlaceholderStore {
            entries: HashMap::new(),
            img_next: 1,
            code_next: 1,
        }
    }

    /// Allocate the next token for `kind`, store `content` under it, and
    /// return the token. Total: never fails.
    pub fn put(&mut self, kind: PlaceholderKind, content: impl Into<String>) -> String {
        let n = self.next_number(kind);
        self.set_next_number(kind, n + 1);
        let token = format_token(kind, n);
        self.entries.insert(token.clone(), content.into());
        token
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries.get(token).map(String::as_str)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    /// Remove an entry. Removing an absent token is a no-op.
    pub fn remove(&mut self, token: &str) {
        self.entries.remove(token);
    }

    /// Overwrite the content stored under an existing token.
    pub fn replace(&mut self, token: &str, content: impl Into<String>) {
        if let Some(entry) = self.entries.get_mut(token) {
            *entry = content.into();
        }
    }

    /// Clear the map and reset both counters to 1.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.img_next = 1;
        self.code_next = 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The number the next `put` for `kind` would allocate.
    pub fn next_number(&self, kind: PlaceholderKind) -> u32 {
        match kind {
            PlaceholderKind::Img => self.img_next,
            PlaceholderKind::Code => self.code_next,
        }
    }

    /// Set the next number for `kind`. The synchronizer uses this to keep
    /// counters one past the highest live token after renumbering.
    pub fn set_next_number(&mut self, kind: PlaceholderKind, n: u32) {
        match kind {
            PlaceholderKind::Img => self.img_next = n,
            PlaceholderKind::Code => self.code_next = n,
        }
    }

    /// Replace the whole map. Used by the synchronizer when rebuilding
    /// entries under renumbered tokens.
    pub(crate) fn swap_entries(&mut self, entries: HashMap<String, String>) {
        self.entries = entries;
    }

    pub(crate) fn take_entries(&mut self) -> HashMap<String, String> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_put_get_round_trip_code() {
        let mut store = PlaceholderStore::new();
        let token = store.put(PlaceholderKind::Code, "print(1)");
        assert_eq!(token, "[[code1]]");
        assert_eq!(store.get(&token), Some("print(1)"));
    }

    #[test]
    fn test_put_get_round_trip_img() {
        let mut store = PlaceholderStore::new();
        let url = image_data_url("image/png", b"\x89PNG");
        let token = store.put(PlaceholderKind::Img, url.clone());
        assert_eq!(token, "[[img1]]");
        assert_eq!(store.get(&token), Some(url.as_str()));
    }

    #[test]
    fn test_counters_independent_per_kind() {
        let mut store = PlaceholderStore::new();
        assert_eq!(store.put(PlaceholderKind::Img, "a"), "[[img1]]");
        assert_eq!(store.put(PlaceholderKind::Code, "b"), "[[code1]]");
        assert_eq!(store.put(PlaceholderKind::Img, "c"), "[[img2]]");
        assert_eq!(store.put(PlaceholderKind::Code, "d"), "[[code2]]");
    }

    #[test]
    fn test_counters_monotonic_across_remove() {
        let mut store = PlaceholderStore::new();
        let t1 = store.put(PlaceholderKind::Img, "a");
        store.remove(&t1);
        // Removal alone does not rewind the counter; only reset/renumber does.
        assert_eq!(store.put(PlaceholderKind::Img, "b"), "[[img2]]");
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut store = PlaceholderStore::new();
        store.remove("[[img7]]");
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_absent_returns_none() {
        let store = PlaceholderStore::new();
        assert_eq!(store.get("[[code1]]"), None);
    }

    #[test]
    fn test_reset_clears_map_and_counters() {
        let mut store = PlaceholderStore::new();
        store.put(PlaceholderKind::Img, "a");
        store.put(PlaceholderKind::Code, "b");
        store.reset();
        assert!(store.is_empty());
        assert_eq!(store.next_number(PlaceholderKind::Img), 1);
        assert_eq!(store.next_number(PlaceholderKind::Code), 1);
        assert_eq!(store.put(PlaceholderKind::Img, "c"), "[[img1]]");
    }

    #[test]
    fn test_replace_overwrites_in_place() {
        let mut store = PlaceholderStore::new();
        let token = store.put(PlaceholderKind::Code, "old");
        store.replace(&token, "new");
        assert_eq!(store.get(&token), Some("new"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_replace_absent_is_noop() {
        let mut store = PlaceholderStore::new();
        store.replace("[[code9]]", "content");
        assert!(store.is_empty());
    }

    #[rstest]
    #[case(PlaceholderKind::Img, 1, "[[img1]]")]
    #[case(PlaceholderKind::Img, 12, "[[img12]]")]
    #[case(PlaceholderKind::Code, 1, "[[code1]]")]
    #[case(PlaceholderKind::Code, 305, "[[code305]]")]
    fn test_format_token(#[case] kind: PlaceholderKind, #[case] n: u32, #[case] expected: &str) {
        assert_eq!(format_token(kind, n), expected);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(PlaceholderKind::Img.to_string(), "img");
        assert_eq!(PlaceholderKind::Code.to_string(), "code");
    }

    #[test]
    fn test_image_data_url_prefix() {
        let url = image_data_url("image/png", &[0, 1, 2]);
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_image_data_url_empty_bytes() {
        assert_eq!(image_data_url("image/gif", &[]), "data:image/gif;base64,");
    }
}
