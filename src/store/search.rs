use crate::model::Bookmark;

/// Case-insensitive substring filter over title and URL.
///
/// A read-only projection: the input is never modified and the result keeps
/// its order. An empty query returns every record.
pub fn filter<'a>(bookmarks: &'a [Bookmark], query: &str) -> Vec<&'a Bookmark> {
    if query.is_empty() {
        return bookmarks.iter().collect();
    }
    let needle = query.to_lowercase();
    bookmarks
        .iter()
        .filter(|b| matches(b, &needle))
        .collect()
}

/// `needle` must already be lowercased.
fn matches(bookmark: &Bookmark, needle: &str) -> bool {
    bookmark.title.to_lowercase().contains(needle) || bookmark.url.to_lowercase().contains(needle)
}

/// Header line above the list: the total, or the match count for a query.
pub fn result_summary(query: &str, shown: usize, total: usize) -> String {
    if query.is_empty() {
        format!("Your Bookmarks ({})", total)
    } else {
        let plural = if shown == 1 { "" } else { "s" };
        format!("{} result{} for \"{}\"", shown, plural, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookmarkId, OwnerId};
    use chrono::Utc;

    fn bookmark(id: &str, title: &str, url: &str) -> Bookmark {
        let now = Utc::now();
        Bookmark {
            id: BookmarkId::new(id),
            owner_id: OwnerId::new("u"),
            title: title.to_string(),
            url: url.to_string(),
            favicon_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample() -> Vec<Bookmark> {
        vec![
            bookmark("1", "Rust Book", "https://doc.rust-lang.org/book"),
            bookmark("2", "Tokio tutorial", "https://tokio.rs/tokio/tutorial"),
            bookmark("3", "News", "https://news.ycombinator.com"),
        ]
    }

    #[test]
    fn test_empty_query_returns_all_in_order() {
        let all = sample();
        let result = filter(&all, "");
        let ids: Vec<_> = result.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_matches_title_case_insensitively() {
        let all = sample();
        let result = filter(&all, "rUST");
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id.as_str(), "1");
    }

    #[test]
    fn test_matches_url() {
        let all = sample();
        let result = filter(&all, "ycombinator");
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].title, "News");
    }

    #[test]
    fn test_no_match() {
        let all = sample();
        assert!(filter(&all, "python").is_empty());
    }

    #[test]
    fn test_summary() {
        assert_eq!(result_summary("", 3, 3), "Your Bookmarks (3)");
        assert_eq!(result_summary("rust", 1, 3), "1 result for \"rust\"");
        assert_eq!(result_summary("zzz", 0, 3), "0 results for \"zzz\"");
    }
}
