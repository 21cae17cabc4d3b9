//! URL protocol splitting (spec §6): `url = scheme "://" rest`, or the
//! whole string is a filesystem path when no `"://"` is present.

/// Split `url` into `(protocol, rest)`. `protocol` is empty when no
/// `"://"` separator is found, and `rest` is then the whole input (treated
/// as a filesystem path).
pub fn split_protocol(url: &str) -> (String, String) {
    match url.find("://") {
        Some(pos) => (url[..pos + "://".len()].to_string(), url[pos + "://".len()..].to_string()),
        None => (String::new(), url.to_string()),
    }
}

/// `true` when `url` names a remote/protocol reference rather than a bare
/// filesystem path.
pub fn has_protocol(url: &str) -> bool {
    url.contains("://")
}
