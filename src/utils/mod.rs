//! Shared utility functions.
//!
//! - `attachment`: deciding whether a URL, MIME type or header looks like a file
//! - `filename`: sanitizing and deriving file names
//! - `poll`: bounded polling with a fixed ceiling
//! - `url_finder`: pulling attachment links out of markup and free text

mod attachment;
mod filename;
mod poll;
mod url_finder;

pub use attachment::{is_absolute_http, AttachmentRules, DEFAULT_ATTACHMENT_EXTENSIONS};
pub use filename::{filename_from_url, sanitize_filename, short_title, task_dir_name, unique_path};
pub use poll::Poller;
pub use url_finder::{absolutize, extract_href_values, UrlFinder};
