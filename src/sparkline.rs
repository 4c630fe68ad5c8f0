// Sparkline quantizer: maps a bounded numeric series onto a fixed glyph palette

/// Eight levels, lowest first.
pub const DEFAULT_PALETTE: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Render `values` with [`DEFAULT_PALETTE`].
pub fn sparkline(values: &[u64]) -> String {
    quantize(values, &DEFAULT_PALETTE)
}

/// One glyph per value. The scale maximum is never below 1 so all-zero series
/// stay on the lowest level. The top glyph is reserved for values equal to the
/// maximum; anything that would round up into it sits one level lower.
pub fn quantize(values: &[u64], palette: &[char]) -> String {
    if values.is_empty() || palette.is_empty() {
        return String::new();
    }
    let top = palette.len() - 1;
    let max = values.iter().copied().max().unwrap_or(0).max(1);
    values
        .iter()
        .map(|&v| {
            let level = ((v as f64 / max as f64) * top as f64).round() as usize;
            let ceiling = if v >= max { top } else { top.saturating_sub(1) };
            palette[level.min(ceiling)]
        })
        .collect()
}
