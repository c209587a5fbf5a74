const FORBIDDEN: [char; 9] = ['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Maps an album title to a name usable as a folder or file name.
pub fn clean_filename(text: &str) -> String {
    text.chars()
        .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}
