use regex::Regex;

/// Infer "man" / "woman" from category, tags, handle, collections and
/// vendor text. Word-boundary matching, female terms first — a plain
/// substring test would classify every "women…" tag as male.
pub fn infer_gender(parts: &[&str]) -> Option<&'static str> {
    let combined = parts.join(" ").to_lowercase();
    let female = Regex::new(r"\b(women|woman|womens|female|ladies)\b").unwrap();
    let male = Regex::new(r"\b(men|man|mens|male)\b").unwrap();

    if female.is_match(&combined) {
        return Some("woman");
    }
    if male.is_match(&combined) {
        return Some("man");
    }
    None
}
