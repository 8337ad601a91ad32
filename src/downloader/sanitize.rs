// Filesystem-safe folder names for playlist directories

const INVALID: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Turn an arbitrary title into a name safe for a directory.
///
/// Strips characters invalid in file names, collapses whitespace runs to a
/// single space, trims the edges, caps the result at 100 characters and
/// falls back to "Unknown" when nothing survives. Total: never fails.
pub fn sanitize_folder_name(name: &str) -> String {
    let stripped: String = name.chars().filter(|c| !INVALID.contains(c)).collect();

    let mut collapsed = String::with_capacity(stripped.len());
    let mut last_was_space = false;
    for c in stripped.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                collapsed.push(' ');
            }
            last_was_space = true;
        } else {
            collapsed.push(c);
            last_was_space = false;
        }
    }

    let mut result: String = collapsed.trim().chars().take(100).collect();
    result.truncate(result.trim_end().len());

    if result.is_empty() {
        "Unknown".to_string()
    } else {
        result
    }
}
