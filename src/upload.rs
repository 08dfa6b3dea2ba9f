//! Image upload validation and errors.
//!
//! The browser side (file reading and decoding) lives in `web`; this module
//! holds the checks that do not need a DOM.

#[cfg(test)]
#[path = "upload_test.rs"]
mod upload_test;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Please select an image file")]
    NotAnImage { mime: String },
    #[error("could not read file: {0}")]
    Read(String),
    #[error("could not decode image: {0}")]
    Decode(String),
}

/// Accept any `image/*` MIME type.
///
/// # Errors
///
/// Returns [`UploadError::NotAnImage`] for anything else, including an empty type.
pub fn check_mime(mime: &str) -> Result<(), UploadError> {
    match mime.split_once('/') {
        Some((kind, subtype)) if kind.eq_ignore_ascii_case("image") && !subtype.is_empty() => Ok(()),
        _ => Err(UploadError::NotAnImage { mime: mime.to_owned() }),
    }
}
