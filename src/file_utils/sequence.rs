//! Image-sequence frame naming grammar (spec §6).

/// Build the filename for `frame` given a prefix, zero-padding width and
/// suffix: `prefix + zfill(frame, padding) + suffix`.
pub fn make_frame_name(name_prefix: &str, frame: i64, padding: usize, name_suffix: &str) -> String {
    format!("{name_prefix}{frame:0padding$}{name_suffix}")
}

/// Split a file stem into `(prefix, trailing_digits)`, where `digits` is
/// the longest trailing run of `[0-9]`.
pub fn split_filename_number(stem: &str) -> (String, String) {
    let bytes = stem.as_bytes();
    let mut i = bytes.len();
    while i > 0 && bytes[i - 1].is_ascii_digit() {
        i -= 1;
    }
    (stem[..i].to_string(), stem[i..].to_string())
}

/// Zero-padding width for a numeric string: `len(digits)` iff the string is
/// non-empty and starts with `'0'`, else `0`.
pub fn number_padding(digits: &str) -> usize {
    if digits.starts_with('0') { digits.len() } else { 0 }
}
