//! Utility functions and helpers.

pub mod http;

use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://www.cinecitta.de/programm/meisengeige/").unwrap();
        assert_eq!(
            resolve_url(&base, "/fileadmin/poster.jpg"),
            "https://www.cinecitta.de/fileadmin/poster.jpg"
        );
        assert_eq!(
            resolve_url(&base, "https://other.example/x.jpg"),
            "https://other.example/x.jpg"
        );
    }
}
