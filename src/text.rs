//! Text normalization shared by offer-title matching and the
//! duplicate-reply guard: lowercase, collapse whitespace runs, trim.

pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
