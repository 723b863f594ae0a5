//! Helpers for printing remote article data to a terminal.
//!
//! - **Text**: control-sequence stripping and width-aware truncation
//! - **Links**: validation of article URLs before handing them to a browser
//!
//! ```
//! use reachnews::util::{sanitize_for_terminal, truncate_to_width, validate_article_url};
//!
//! assert_eq!(sanitize_for_terminal("Hi\x1b[31m there"), "Hi there");
//! assert_eq!(truncate_to_width("Markets rally on rate cut", 10), "Markets...");
//! assert!(validate_article_url("https://news.example.com/a/1").is_ok());
//! ```

mod text;
mod url_validator;

pub use text::{pad_to_width, sanitize_for_terminal, truncate_to_width};
pub use url_validator::{validate_article_url, UrlValidationError};
