//! Text prompt construction.

use crate::types::Style;

/// Fixed description appended to every style.
const PROMPT_BODY: &str = "instrumental track, coherent melody and harmony, high musicality";

/// Builds the model prompt for a style and an optional free-text hint.
///
/// Blank or whitespace-only hints are left out; others are trimmed and
/// appended as a `Details:` clause.
pub fn build_prompt(style: &Style, hint: Option<&str>) -> String {
    let mut prompt = format!("{} {}", style.label().to_lowercase(), PROMPT_BODY);

    if let Some(hint) = hint.map(str::trim).filter(|h| !h.is_empty()) {
        prompt.push_str(". Details: ");
        prompt.push_str(hint);
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_is_lowercased() {
        assert_eq!(
            build_prompt(&Style::Jazz, None),
            "jazz instrumental track, coherent melody and harmony, high musicality"
        );
    }

    #[test]
    fn blank_hints_are_omitted() {
        for hint in ["", "   ", "\t\n"] {
            let prompt = build_prompt(&Style::Pop, Some(hint));
            assert!(!prompt.contains("Details:"), "{:?} produced {}", hint, prompt);
        }
    }

    #[test]
    fn hint_is_trimmed_and_appended() {
        let prompt = build_prompt(&Style::Classical, Some("  dreamy "));
        assert!(prompt.starts_with("classical instrumental track"));
        assert!(prompt.ends_with(". Details: dreamy"));
    }

    #[test]
    fn unknown_styles_pass_through() {
        let prompt = build_prompt(&Style::from_label("Lo-Fi Hip Hop"), None);
        assert!(prompt.starts_with("lo-fi hip hop instrumental track"));
    }
}
