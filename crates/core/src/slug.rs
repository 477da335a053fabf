//! URL slug generation.

/// Maximum slug length in bytes.
pub const MAX_SLUG_LENGTH: usize = 96;

/// Turn a display name into a URL slug.
///
/// Lower-cases ASCII letters, keeps ASCII digits, and joins every run of
/// alphanumerics with a single `-`. Everything else is a separator.
///
/// ```
/// use threadline_core::slug::slugify;
///
/// assert_eq!(slugify("  Summer Linen -- Shirts!"), "summer-linen-shirts");
/// assert_eq!(slugify("Café"), "caf");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len().min(MAX_SLUG_LENGTH));
    let mut pending_dash = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                if slug.len() + 1 >= MAX_SLUG_LENGTH {
                    break;
                }
                slug.push('-');
            }
            pending_dash = false;
            if slug.len() >= MAX_SLUG_LENGTH {
                break;
            }
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Whether `slug` is already in canonical form.
#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slug.len() <= MAX_SLUG_LENGTH && slugify(slug) == slug
}
