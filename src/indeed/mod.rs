//! The Indeed employer-portal flow: log in, find the export, download it.
//!
//! The portal offers no stable automation hooks, so element discovery works
//! off candidate lists: several selectors per field, tried in order until one
//! matches. The lists cover the known login form variants plus generous
//! generic fallbacks.

pub mod download;
pub mod flow;
pub mod login;

use crate::browser::Selector;

/// Key-value store key holding the persisted session cookies.
pub const COOKIES_KEY: &str = "indeed_cookies_v1";
/// Key-value store key naming the most recent output file.
pub const OUTPUT_FILENAME_KEY: &str = "indeed_output_filename";
/// Key-value store key for the failure screenshot.
pub const ERROR_SNAPSHOT_KEY: &str = "ERROR_SNAPSHOT";

/// Login form username/email fields, most specific first.
pub const USERNAME_SELECTORS: &[Selector] = &[
    Selector::Css(r#"input[type="email"]"#),
    Selector::Css(r#"input[name="email"]"#),
    Selector::Css(r#"input[name="username"]"#),
    Selector::Css(r#"input[id*="email"]"#),
    Selector::Css(r#"input[name="__email"]"#),
    Selector::Css(r#"input[id*="login"]"#),
    Selector::Css("#signin-email"),
];

/// Login form password fields.
pub const PASSWORD_SELECTORS: &[Selector] = &[
    Selector::Css(r#"input[type="password"]"#),
    Selector::Css(r#"input[name="password"]"#),
    Selector::Css(r#"input[id*="password"]"#),
    Selector::Css(r#"input[name="__password"]"#),
    Selector::Css("#signin-password"),
];

/// Login submit buttons.
pub const LOGIN_BUTTON_SELECTORS: &[Selector] = &[
    Selector::Css(r#"button[type="submit"]"#),
    Selector::Text("Sign in"),
    Selector::Text("Sign In"),
    Selector::Text("Log in"),
    Selector::Text("Login"),
    Selector::Css(r#"input[type="submit"]"#),
    Selector::Css(".signin-button"),
    Selector::Css("#signin-submit"),
];

/// Button labels the portal uses for CSV exports, tried in order.
pub const DOWNLOAD_BUTTON_TEXTS: &[&str] = &[
    "Download CSV",
    "Export CSV",
    "Export",
    "Download",
    "Export candidates",
];

/// Generic export controls tried after the text labels.
pub const EXPORT_SELECTORS: &[Selector] = &[
    Selector::Css("a[download]"),
    Selector::Css(r#"a[href$=".csv"]"#),
    Selector::Css(r#"button[data-test*="export"]"#),
    Selector::Text("Export"),
    Selector::Text("Download"),
    Selector::Text("Download CSV"),
    Selector::Css(".export-button"),
    Selector::Css(".download-button"),
    Selector::Css(r#"[data-testid="export"]"#),
    Selector::Css(r#"[data-testid="download"]"#),
];

/// Whether an href looks like it points at a CSV.
pub fn is_csv_href(href: &str) -> bool {
    href.contains(".csv")
}

/// Make an href absolute against the page URL.
///
/// Relative hrefs join onto the full page URL, not the origin.
pub fn absolutize(base: &str, href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            href.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_href_detection() {
        assert!(is_csv_href("/exports/candidates.csv"));
        assert!(is_csv_href("https://x.test/report.csv?token=1"));
        assert!(!is_csv_href("/exports/candidates.xlsx"));
        assert!(!is_csv_href(""));
    }

    #[test]
    fn absolute_hrefs_pass_through() {
        assert_eq!(
            absolutize("https://employers.indeed.com/candidates", "https://cdn.test/r.csv"),
            "https://cdn.test/r.csv"
        );
    }

    #[test]
    fn relative_hrefs_join_onto_page_url() {
        assert_eq!(
            absolutize("https://employers.indeed.com/candidates/", "/exports/r.csv"),
            "https://employers.indeed.com/candidates/exports/r.csv"
        );
        assert_eq!(
            absolutize("https://employers.indeed.com/candidates", "r.csv"),
            "https://employers.indeed.com/candidates/r.csv"
        );
    }

    #[test]
    fn selector_tables_keep_their_priority_order() {
        // Candidates are tried front to back; the specific entries must stay
        // ahead of the generic fallbacks. Lengths catch silent drops.
        assert_eq!(USERNAME_SELECTORS[0], Selector::Css(r#"input[type="email"]"#));
        assert_eq!(USERNAME_SELECTORS.len(), 7);

        assert_eq!(PASSWORD_SELECTORS[0], Selector::Css(r#"input[type="password"]"#));
        assert_eq!(PASSWORD_SELECTORS.len(), 5);

        assert_eq!(LOGIN_BUTTON_SELECTORS[0], Selector::Css(r#"button[type="submit"]"#));
        assert_eq!(LOGIN_BUTTON_SELECTORS.len(), 8);

        assert_eq!(DOWNLOAD_BUTTON_TEXTS[0], "Download CSV");
        assert_eq!(DOWNLOAD_BUTTON_TEXTS.len(), 5);

        assert_eq!(EXPORT_SELECTORS[0], Selector::Css("a[download]"));
        assert_eq!(EXPORT_SELECTORS.len(), 10);
    }
}
