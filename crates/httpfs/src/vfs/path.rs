//! Slash-separated virtual path helpers.
//!
//! Virtual filesystems always use `/`, whatever the host platform does, so
//! these work on `&str` rather than `std::path::Path`.

/// Lexically normalize a virtual path.
///
/// The result is always absolute, has no trailing slash (except for the root
/// itself), and has `.`, `..` and duplicate slashes resolved. `..` at the
/// root stays at the root.
pub fn clean(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Join a directory path and a child name, then clean the result.
pub fn join(dir: &str, name: &str) -> String {
    clean(&format!("{dir}/{name}"))
}

/// Last element of the path (`""` for the root).
pub fn base(path: &str) -> String {
    let cleaned = clean(path);
    cleaned
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Parent directory of a cleaned path, or `None` for the root.
pub fn parent(path: &str) -> Option<String> {
    let cleaned = clean(path);
    if cleaned == "/" {
        return None;
    }
    match cleaned.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(idx) => Some(cleaned[..idx].to_string()),
        None => None,
    }
}

/// Non-empty components of a path, in order.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|part| !part.is_empty())
}
