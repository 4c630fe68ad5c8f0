// Version labels from composite plugin package identifiers (`author/pluginId:version@checksum`)

/// Human-readable version label for a package identifier.
///
/// Drops everything from the first `@`, then takes the segment after the first `:`.
/// Identifiers without a version segment come back as the remainder unchanged;
/// nothing here can fail.
pub fn version_label(identifier: &str) -> &str {
    let head = identifier
        .split_once('@')
        .map_or(identifier, |(head, _checksum)| head);
    match head.split(':').nth(1) {
        Some(version) if !version.is_empty() => version,
        _ => head,
    }
}
