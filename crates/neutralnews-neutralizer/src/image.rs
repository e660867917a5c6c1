use crate::prompt::SourceRating;
use crate::sources::CandidateSource;

const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".bmp", ".tiff", ".tif", ".svg", ".ico", ".heic",
    ".heif", ".raw", ".cr2", ".nef", ".orf", ".sr2",
];
const VIDEO_EXTENSIONS: &[&str] = &[
    ".mp4", ".m4v", ".mov", ".wmv", ".avi", ".flv", ".webm", ".mkv", ".3gp", ".mpeg", ".mpg",
    ".mpe", ".mpv", ".m2v", ".mts", ".m2ts", ".ts",
];

/// Whitelists image extensions and vetoes anything that looks like a video:
/// a video extension, or "video"/"player" anywhere in the URL.
pub fn is_valid_image_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    if lower.contains("video") || lower.contains("player") {
        return false;
    }
    let path = lower.split(['?', '#']).next().unwrap_or(&lower);
    let is_image = IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext));
    let is_video = VIDEO_EXTENSIONS.iter().any(|ext| path.ends_with(ext));
    is_image && !is_video
}

/// Picks the image URL of the kept source with the highest `source_ratings`
/// rating that carries a valid image URL. Unrated sources default to rating
/// 0; ties keep the first (highest-priority, by input order) source, to
/// match a stable sort-then-take-first selection.
pub fn select_most_neutral_image(
    sources: &[CandidateSource],
    ratings: &[SourceRating],
) -> Option<(String, String)> {
    let rating_for = |medium: &str| -> i32 {
        ratings
            .iter()
            .find(|r| r.source_medium == medium)
            .map(|r| r.rating)
            .unwrap_or(0)
    };

    let mut best: Option<(i32, String, String)> = None;
    for source in sources {
        let Some(url) = &source.image_url else { continue };
        if !is_valid_image_url(url) {
            continue;
        }
        let medium = source.outlet.profile().display_name.to_string();
        let rating = rating_for(&medium);
        let beats_current = match &best {
            Some((best_rating, _, _)) => rating > *best_rating,
            None => true,
        };
        if beats_current {
            best = Some((rating, url.clone(), medium));
        }
    }
    best.map(|(_, url, medium)| (url, medium))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use neutralnews_common::Outlet;
    use uuid::Uuid;

    fn source(outlet: Outlet, image_url: Option<&str>) -> CandidateSource {
        CandidateSource {
            article_id: Uuid::new_v4(),
            outlet,
            title: "title".to_string(),
            scraped_description: "description".to_string(),
            effective_date: Utc::now(),
            image_url: image_url.map(str::to_string),
        }
    }

    fn rating(outlet: Outlet, value: i32) -> SourceRating {
        SourceRating {
            source_medium: outlet.profile().display_name.to_string(),
            rating: value,
        }
    }

    #[test]
    fn rejects_video_extensions_and_video_markers() {
        assert!(!is_valid_image_url("https://cdn.example.com/clip.mp4"));
        assert!(!is_valid_image_url("https://cdn.example.com/video/photo.jpg"));
        assert!(!is_valid_image_url("https://cdn.example.com/player/thumb.png"));
        assert!(is_valid_image_url("https://cdn.example.com/photo.jpg"));
        assert!(is_valid_image_url("https://cdn.example.com/photo.jpg?w=800"));
    }

    #[test]
    fn picks_the_highest_rated_source_with_a_valid_image() {
        let sources = vec![
            source(Outlet::ElPais, Some("https://a.example.com/pic.jpg")),
            source(Outlet::ElMundo, Some("https://b.example.com/pic.png")),
        ];
        let ratings = vec![rating(Outlet::ElPais, 40), rating(Outlet::ElMundo, 90)];

        let (url, medium) = select_most_neutral_image(&sources, &ratings).unwrap();
        assert_eq!(url, "https://b.example.com/pic.png");
        assert_eq!(medium, Outlet::ElMundo.profile().display_name);
    }

    #[test]
    fn skips_sources_with_no_image_or_an_invalid_one() {
        let sources = vec![
            source(Outlet::ElPais, None),
            source(Outlet::ElMundo, Some("https://b.example.com/clip.mp4")),
            source(Outlet::Abc, Some("https://c.example.com/pic.jpg")),
        ];
        let ratings = vec![
            rating(Outlet::ElPais, 99),
            rating(Outlet::ElMundo, 99),
            rating(Outlet::Abc, 1),
        ];

        let (url, medium) = select_most_neutral_image(&sources, &ratings).unwrap();
        assert_eq!(url, "https://c.example.com/pic.jpg");
        assert_eq!(medium, Outlet::Abc.profile().display_name);
    }

    #[test]
    fn returns_none_when_no_source_has_a_valid_image() {
        let sources = vec![source(Outlet::ElPais, None)];
        assert!(select_most_neutral_image(&sources, &[]).is_none());
    }
}
