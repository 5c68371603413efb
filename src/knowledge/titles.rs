//! Page-title candidates derived from a display name

/// Produces the page titles to try, best guess first
pub trait TitleCandidates: Send + Sync {
    fn candidates(&self, name: &str) -> Vec<String>;
}

/// Spaces become underscores; nothing else is touched
#[derive(Debug, Default, Clone, Copy)]
pub struct UnderscoreTitles;

impl TitleCandidates for UnderscoreTitles {
    fn candidates(&self, name: &str) -> Vec<String> {
        let title = underscore(name);
        if title.is_empty() {
            Vec::new()
        } else {
            vec![title]
        }
    }
}

/// The underscore form followed by a title-cased variant
/// (`john smith` → `John_Smith`)
#[derive(Debug, Default, Clone, Copy)]
pub struct NameVariantTitles;

impl TitleCandidates for NameVariantTitles {
    fn candidates(&self, name: &str) -> Vec<String> {
        let mut out = UnderscoreTitles.candidates(name);
        let title_cased = underscore(
            &name
                .split_whitespace()
                .map(capitalize)
                .collect::<Vec<_>>()
                .join(" "),
        );
        if !title_cased.is_empty() && !out.contains(&title_cased) {
            out.push(title_cased);
        }
        out
    }
}

fn underscore(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
