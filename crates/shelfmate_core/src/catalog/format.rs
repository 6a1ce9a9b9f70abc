use crate::catalog::ranking::Popularity;
use crate::catalog::volume::{ImageLinks, Volume, VolumeInfo};
use crate::database::types::NewBook;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";
pub const UNKNOWN_YEAR: &str = "Unknown";
pub const NO_DESCRIPTION: &str = "No description available.";
pub const PLACEHOLDER_COVER: &str = "https://via.placeholder.com/150x225?text=No+Cover";

static REPEATED_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("Regex must be valid"));

/// A catalog volume shaped for display in search results. Every field has a displayable value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// The catalog's identifier, not an internal book ID.
    pub id: String,
    pub title: String,
    pub author: String,
    pub year: String,
    pub cover: String,
    pub synopsis: String,
    /// Average rating with one decimal, for display.
    pub rating: String,
    pub ratings_count: u64,
    pub average_rating: f64,
    pub categories: Vec<String>,
    pub page_count: Option<i64>,
    pub language: Option<String>,
    pub preview_link: Option<String>,
    pub info_link: Option<String>,
}

impl SearchResult {
    #[must_use]
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub fn from_volume(volume: &Volume) -> Self {
        let info = &volume.volume_info;
        let average_rating = info.average_rating.unwrap_or(0.0);

        Self {
            id: volume.id.clone(),
            title: extract_title(info).unwrap_or_else(|| UNKNOWN_TITLE.to_owned()),
            author: extract_author(info).unwrap_or_else(|| UNKNOWN_AUTHOR.to_owned()),
            year: extract_year(info).unwrap_or_else(|| UNKNOWN_YEAR.to_owned()),
            cover: extract_cover(info).unwrap_or_else(|| PLACEHOLDER_COVER.to_owned()),
            synopsis: extract_description(info).unwrap_or_else(|| NO_DESCRIPTION.to_owned()),
            rating: format!("{average_rating:.1}"),
            ratings_count: info.ratings_count.unwrap_or(0),
            average_rating,
            categories: info.categories.clone().unwrap_or_default(),
            page_count: info.page_count,
            language: info.language.clone(),
            preview_link: info.preview_link.clone(),
            info_link: info.info_link.clone(),
        }
    }

    /// Whether the result shows a real cover rather than the placeholder.
    #[must_use]
    #[inline]
    pub fn has_cover(&self) -> bool {
        !self.cover.is_empty() && !self.cover.contains("placeholder")
    }
}

impl Popularity for SearchResult {
    #[inline]
    fn average_rating(&self) -> f64 {
        self.average_rating
    }

    #[inline]
    fn ratings_count(&self) -> u64 {
        self.ratings_count
    }
}

impl NewBook {
    /// Maps a catalog volume onto the database schema, tagged with the volume's ID. Fields the
    /// catalog does not provide stay empty instead of receiving display defaults.
    #[must_use]
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub fn from_volume(volume: &Volume) -> Self {
        let info = &volume.volume_info;

        Self {
            google_books_id: Some(volume.id.clone()),
            title: extract_title(info).unwrap_or_else(|| UNKNOWN_TITLE.to_owned()),
            author: extract_author(info),
            year: extract_year(info),
            cover_url: extract_cover(info),
            synopsis: extract_description(info),
            isbn: extract_isbn(info),
            page_count: info.page_count.filter(|&count| count > 0),
            language: info.language.clone(),
            categories: info.categories.clone().unwrap_or_default(),
        }
    }
}

fn extract_title(info: &VolumeInfo) -> Option<String> {
    info.title.as_deref().and_then(normalize)
}

/// All authors, joined by a comma.
fn extract_author(info: &VolumeInfo) -> Option<String> {
    let authors = info
        .authors
        .as_ref()?
        .iter()
        .filter_map(|author| normalize(author))
        .collect::<Vec<String>>();
    (!authors.is_empty()).then(|| authors.join(", "))
}

/// The 4-digit year at the start of the published date.
fn extract_year(info: &VolumeInfo) -> Option<String> {
    let date = info.published_date.as_deref()?.trim();
    let year = date.get(..4)?;
    year.chars()
        .all(|character| character.is_ascii_digit())
        .then(|| year.to_owned())
}

fn extract_description(info: &VolumeInfo) -> Option<String> {
    info.description.as_deref().and_then(normalize)
}

/// The largest cover image available, always served over HTTPS.
fn extract_cover(info: &VolumeInfo) -> Option<String> {
    let links = info.image_links.as_ref()?;
    best_image(links).map(force_https)
}

fn best_image(links: &ImageLinks) -> Option<&str> {
    [
        &links.extra_large,
        &links.large,
        &links.medium,
        &links.small,
        &links.thumbnail,
        &links.small_thumbnail,
    ]
    .into_iter()
    .flatten()
    .map(String::as_str)
    .find(|url| !url.trim().is_empty())
}

fn force_https(url: &str) -> String {
    url.strip_prefix("http://")
        .map_or_else(|| url.to_owned(), |rest| format!("https://{rest}"))
}

/// ISBN-13 if the catalog knows one, otherwise ISBN-10.
fn extract_isbn(info: &VolumeInfo) -> Option<String> {
    let identifiers = info.industry_identifiers.as_ref()?;
    let find = |kind: &str| {
        identifiers
            .iter()
            .find(|identifier| identifier.kind == kind && !identifier.identifier.is_empty())
            .map(|identifier| identifier.identifier.clone())
    };
    find("ISBN_13").or_else(|| find("ISBN_10"))
}

/// Trims and collapses runs of whitespace, mapping empty strings to `None`.
fn normalize(value: &str) -> Option<String> {
    let normalized = REPEATED_WHITESPACE
        .replace_all(value.trim(), " ")
        .into_owned();
    (!normalized.is_empty()).then_some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::volume::IndustryIdentifier;
    use pretty_assertions::assert_eq;

    fn identifier(kind: &str, value: &str) -> IndustryIdentifier {
        IndustryIdentifier {
            kind: kind.to_owned(),
            identifier: value.to_owned(),
        }
    }

    fn full_volume() -> Volume {
        Volume {
            id: "zG3-somecode".to_owned(),
            volume_info: VolumeInfo {
                title: Some("  The  Left Hand of Darkness ".to_owned()),
                authors: Some(vec!["Ursula K. Le Guin".to_owned(), "Someone Else".to_owned()]),
                published_date: Some("1969-03-01".to_owned()),
                description: Some("Winter.".to_owned()),
                image_links: Some(ImageLinks {
                    small_thumbnail: Some("http://books.google.com/small".to_owned()),
                    thumbnail: Some("http://books.google.com/thumb".to_owned()),
                    ..ImageLinks::default()
                }),
                average_rating: Some(4.3),
                ratings_count: Some(1200),
                categories: Some(vec!["Fiction".to_owned()]),
                page_count: Some(304),
                language: Some("en".to_owned()),
                industry_identifiers: Some(vec![
                    identifier("ISBN_10", "0441478123"),
                    identifier("ISBN_13", "9780000000002"),
                ]),
                ..VolumeInfo::default()
            },
        }
    }

    #[test]
    fn isbn_13_is_preferred_over_isbn_10() {
        let book = NewBook::from_volume(&full_volume());
        assert_eq!(book.isbn.as_deref(), Some("9780000000002"));
    }

    #[test]
    fn isbn_10_is_used_when_no_isbn_13_exists() {
        let mut volume = full_volume();
        volume.volume_info.industry_identifiers = Some(vec![
            identifier("OTHER", "UOM:39015"),
            identifier("ISBN_10", "0441478123"),
        ]);
        assert_eq!(
            NewBook::from_volume(&volume).isbn.as_deref(),
            Some("0441478123")
        );
    }

    #[test]
    fn database_mapping() {
        let book = NewBook::from_volume(&full_volume());
        let expected = NewBook {
            google_books_id: Some("zG3-somecode".to_owned()),
            title: "The Left Hand of Darkness".to_owned(),
            author: Some("Ursula K. Le Guin, Someone Else".to_owned()),
            year: Some("1969".to_owned()),
            cover_url: Some("https://books.google.com/thumb".to_owned()),
            synopsis: Some("Winter.".to_owned()),
            isbn: Some("9780000000002".to_owned()),
            page_count: Some(304),
            language: Some("en".to_owned()),
            categories: vec!["Fiction".to_owned()],
        };
        assert_eq!(book, expected);
    }

    #[test]
    fn database_mapping_of_sparse_volume() {
        let volume = Volume {
            id: "abc".to_owned(),
            volume_info: VolumeInfo {
                published_date: Some("c. 1850".to_owned()),
                ..VolumeInfo::default()
            },
        };
        let book = NewBook::from_volume(&volume);
        assert_eq!(book.title, UNKNOWN_TITLE);
        assert_eq!(book.author, None);
        assert_eq!(book.year, None);
        assert_eq!(book.cover_url, None);
        assert!(book.categories.is_empty());
    }

    #[test]
    fn largest_cover_wins() {
        let mut volume = full_volume();
        volume.volume_info.image_links = Some(ImageLinks {
            thumbnail: Some("http://books.google.com/thumb".to_owned()),
            medium: Some("http://books.google.com/medium".to_owned()),
            ..ImageLinks::default()
        });
        assert_eq!(
            NewBook::from_volume(&volume).cover_url.as_deref(),
            Some("https://books.google.com/medium")
        );
    }

    #[test]
    fn search_result_defaults() {
        let result = SearchResult::from_volume(&Volume {
            id: "abc".to_owned(),
            volume_info: VolumeInfo::default(),
        });
        assert_eq!(result.title, UNKNOWN_TITLE);
        assert_eq!(result.author, UNKNOWN_AUTHOR);
        assert_eq!(result.year, UNKNOWN_YEAR);
        assert_eq!(result.synopsis, NO_DESCRIPTION);
        assert_eq!(result.rating, "0.0");
        assert_eq!(result.ratings_count, 0);
        assert!(!result.has_cover());
    }

    #[test]
    fn search_result_formatting() {
        let result = SearchResult::from_volume(&full_volume());
        assert_eq!(result.id, "zG3-somecode");
        assert_eq!(result.author, "Ursula K. Le Guin, Someone Else");
        assert_eq!(result.rating, "4.3");
        assert_eq!(result.cover, "https://books.google.com/thumb");
        assert!(result.has_cover());
    }
}
