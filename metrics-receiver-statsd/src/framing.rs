/// Splits a datagram payload into StatsD lines.
///
/// The payload is split on `\n`, each segment is trimmed of surrounding whitespace, and empty segments are dropped.
/// The last segment does not need a trailing newline. Order is preserved, and bytes that are not valid UTF-8 are
/// replaced rather than discarding the whole datagram.
pub fn split_lines(payload: &[u8]) -> Vec<String> {
    payload
        .split(|b| *b == b'\n')
        .map(String::from_utf8_lossy)
        .filter_map(|segment| {
            let line = segment.trim();
            (!line.is_empty()).then(|| line.to_string())
        })
        .collect()
}
