//! Shared key generation for storage adapters.
//!
//! Object path format: `{site_id}/{category_sub_path}/{unix_millis}-{random}{.ext}`.

use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::Rng;

use switchyard_core::FileCategory;

const PATH_SUFFIX_LEN: usize = 10;
const RECORD_ID_SUFFIX_LEN: usize = 9;
const MAX_EXTENSION_LEN: usize = 10;

fn random_suffix(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect()
}

/// Lowercased extension of the client-supplied name, if it is a plausible one
pub fn sanitized_extension(original_name: &str) -> Option<String> {
    let (stem, ext) = original_name.rsplit_once('.')?;
    if stem.is_empty()
        || ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Generate a unique object path for a new upload.
pub fn generate_object_path(site_id: &str, category: FileCategory, original_name: &str) -> String {
    let file_name = match sanitized_extension(original_name) {
        Some(ext) => format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            random_suffix(PATH_SUFFIX_LEN),
            ext
        ),
        None => format!(
            "{}-{}",
            Utc::now().timestamp_millis(),
            random_suffix(PATH_SUFFIX_LEN)
        ),
    };
    format!("{}/{}/{}", site_id, category.sub_path(), file_name)
}

/// Generate the opaque id of a canonical record
pub fn generate_record_id() -> String {
    format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        random_suffix(RECORD_ID_SUFFIX_LEN)
    )
}

/// Final path segment, used as the display name of a stored file
pub fn file_name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Percent-encode each segment of a slash-separated path
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
