//! SEO filename synthesis.
//!
//! Generates deterministic, marketplace-safe filenames from result
//! metadata. The archive builder and the single-file download path both
//! go through [`make_filename`], so the two can never diverge in naming.

/// Maximum length of a generated filename, extension included.
///
/// Chosen below the common 255-byte filesystem limit with headroom for
/// archive entry prefixes.
pub const MAX_FILENAME_LEN: usize = 160;

/// Build a deterministic SEO filename from result metadata.
///
/// Convention: `{title-slug}-{keyword-slugs}-{marketplace}.{ext}`
///
/// - slugs are lowercase, `[a-z0-9]` runs joined by single hyphens
/// - up to three keywords are appended, skipping ones already present
///   in the title slug
/// - the marketplace tag is always the last segment before the extension
/// - output is truncated so the whole name fits [`MAX_FILENAME_LEN`],
///   never cutting into the marketplace tag or the extension
///
/// # Examples
///
/// ```
/// use tagmill::naming::make_filename;
///
/// assert_eq!(
///     make_filename("Sunset over Lisbon", &["travel".into(), "sky".into()], "shutterstock", "jpg"),
///     "sunset-over-lisbon-travel-sky-shutterstock.jpg"
/// );
/// ```
pub fn make_filename(
    title: &str,
    keywords: &[String],
    marketplace: &str,
    original_extension: &str,
) -> String {
    let ext = original_extension.trim_start_matches('.').to_lowercase();
    let market = slugify(marketplace);

    let mut stem = slugify(title);

    // Append up to three keywords that add new information.
    let mut appended = 0;
    for keyword in keywords {
        if appended == 3 {
            break;
        }
        let slug = slugify(keyword);
        if slug.is_empty() || stem.contains(&slug) {
            continue;
        }
        if !stem.is_empty() {
            stem.push('-');
        }
        stem.push_str(&slug);
        appended += 1;
    }

    if stem.is_empty() {
        stem.push_str("untitled");
    }

    // Reserve room for "-{market}.{ext}" before truncating the stem.
    let mut reserved = ext.len() + 1; // ".ext"
    if !market.is_empty() {
        reserved += market.len() + 1; // "-market"
    }
    let max_stem = MAX_FILENAME_LEN.saturating_sub(reserved);
    if stem.len() > max_stem {
        stem.truncate(max_stem);
        // Never end the stem on a dangling hyphen after truncation.
        while stem.ends_with('-') {
            stem.pop();
        }
    }

    let mut name = stem;
    if !market.is_empty() {
        name.push('-');
        name.push_str(&market);
    }
    name.push('.');
    name.push_str(&ext);
    name
}

/// Reduce arbitrary text to a hyphen-joined lowercase slug.
///
/// Anything outside `[a-zA-Z0-9]` acts as a separator; consecutive
/// separators collapse into one hyphen.
fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_sep = false;

    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_title() {
        assert_eq!(
            make_filename("Sunset over Lisbon", &[], "adobe", "jpg"),
            "sunset-over-lisbon-adobe.jpg"
        );
    }

    #[test]
    fn keywords_appended() {
        assert_eq!(
            make_filename(
                "Harbor",
                &["boats".into(), "morning".into()],
                "shutterstock",
                "png"
            ),
            "harbor-boats-morning-shutterstock.png"
        );
    }

    #[test]
    fn keyword_already_in_title_skipped() {
        assert_eq!(
            make_filename("Harbor boats", &["boats".into(), "fog".into()], "adobe", "jpg"),
            "harbor-boats-fog-adobe.jpg"
        );
    }

    #[test]
    fn at_most_three_keywords() {
        let keywords: Vec<String> = ["one", "two", "three", "four"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            make_filename("x", &keywords, "m", "jpg"),
            "x-one-two-three-m.jpg"
        );
    }

    #[test]
    fn unsafe_characters_stripped() {
        assert_eq!(
            make_filename("Café / Straße: 100%!", &[], "adobe", "jpg"),
            "caf-stra-e-100-adobe.jpg"
        );
    }

    #[test]
    fn empty_title_falls_back() {
        assert_eq!(make_filename("", &[], "adobe", "jpg"), "untitled-adobe.jpg");
        assert_eq!(make_filename("???", &[], "", "mp4"), "untitled.mp4");
    }

    #[test]
    fn extension_dot_normalized() {
        assert_eq!(make_filename("a", &[], "m", ".JPG"), "a-m.jpg");
    }

    #[test]
    fn deterministic() {
        let keywords = vec!["sea".to_string(), "rocks".to_string()];
        let a = make_filename("Cliffs at dawn", &keywords, "shutterstock", "jpg");
        let b = make_filename("Cliffs at dawn", &keywords, "shutterstock", "jpg");
        assert_eq!(a, b);
    }

    #[test]
    fn length_bounded() {
        let long_title = "word ".repeat(100);
        let name = make_filename(&long_title, &[], "shutterstock", "jpeg");
        assert!(name.len() <= MAX_FILENAME_LEN);
        assert!(name.ends_with("-shutterstock.jpeg"));
        assert!(!name.contains("--"));
    }

    #[test]
    fn restricted_character_set() {
        let name = make_filename("Weird !@#$ Title", &["k&y".into()], "pond5", "mov");
        assert!(
            name.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        );
    }

    #[test]
    fn always_ends_with_extension() {
        for ext in ["jpg", "png", "mp4", "svg"] {
            let name = make_filename("title", &[], "adobe", ext);
            assert!(name.ends_with(&format!(".{ext}")));
        }
    }
}
