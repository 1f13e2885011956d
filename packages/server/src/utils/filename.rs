use common::storage::MAX_ASSET_FILE_NAME_BYTES;

/// Reasons an asset file name is refused.
#[derive(Debug, PartialEq, Eq)]
pub enum FileNameError {
    /// Empty or whitespace-only.
    Empty,
    /// Outside the allowed character count.
    Length { chars: usize },
    /// Too long once UTF-8 encoded to fit in a storage key.
    TooManyBytes { bytes: usize },
    /// Contains `/` or `\`.
    PathSeparator,
    /// Starts with a dot, which also covers `.` and `..`.
    Hidden,
    /// Contains NUL, CR, LF or another control character.
    ControlCharacter,
}

impl FileNameError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "File name cannot be empty",
            Self::Length { .. } => "File name must be 2-255 characters",
            Self::TooManyBytes { .. } => "File name must be at most 900 bytes",
            Self::PathSeparator => "Invalid file name: path separators are not allowed",
            Self::Hidden => "Invalid file name: names starting with '.' are not allowed",
            Self::ControlCharacter => "Invalid file name: control characters are not allowed",
        }
    }
}

pub const MIN_FILE_NAME_CHARS: usize = 2;
pub const MAX_FILE_NAME_CHARS: usize = 255;

/// Validate a client-supplied file name and return it trimmed.
///
/// The name ends up in a storage key and in `Content-Disposition`, so it must
/// be a single path segment without control characters.
pub fn validate_file_name(file_name: &str) -> Result<&str, FileNameError> {
    let trimmed = file_name.trim();

    if trimmed.is_empty() {
        return Err(FileNameError::Empty);
    }

    if trimmed.chars().any(char::is_control) {
        return Err(FileNameError::ControlCharacter);
    }

    if trimmed.contains(['/', '\\']) {
        return Err(FileNameError::PathSeparator);
    }

    if trimmed.starts_with('.') {
        return Err(FileNameError::Hidden);
    }

    let chars = trimmed.chars().count();
    if !(MIN_FILE_NAME_CHARS..=MAX_FILE_NAME_CHARS).contains(&chars) {
        return Err(FileNameError::Length { chars });
    }

    if trimmed.len() > MAX_ASSET_FILE_NAME_BYTES {
        return Err(FileNameError::TooManyBytes {
            bytes: trimmed.len(),
        });
    }

    Ok(trimmed)
}
