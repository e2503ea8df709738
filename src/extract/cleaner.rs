// ── Text normalisation ────────────────────────────────────────────────────────

/// Collapse runs of whitespace (including non-breaking spaces) into one space.
/// "  Apple\n   Inc.\u{a0}" → "Apple Inc."
pub fn clean_cell(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn normalise_symbol(s: &str) -> String {
    s.trim().to_uppercase()
}

/// Header text reduced to lowercase letters and single spaces.
/// "% Portfolio\n Weight" → "portfolio weight"
pub fn normalise_header(s: &str) -> String {
    let letters: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    clean_cell(&letters)
}

// ── Numbers ───────────────────────────────────────────────────────────────────

/// Parse a whole count, ignoring thousands separators.
/// "1,024" → 1024 | " 60 " → 60 | "All" → None
pub fn parse_count(s: &str) -> Option<u32> {
    let s = clean_cell(s).replace(',', "");
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Every integer in a piece of prose, in order.
/// "Showing 1 - 60 of 1,024 holdings" → [1, 60, 1024]
pub fn parse_integers(s: &str) -> Vec<u32> {
    let mut out = Vec::new();
    let mut digits = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        // A comma only counts as a separator when a digit follows it
        if c == ',' && !digits.is_empty() && chars.peek().is_some_and(|n| n.is_ascii_digit()) {
            continue;
        }
        if let Ok(n) = digits.parse() {
            out.push(n);
        }
        digits.clear();
    }
    if let Ok(n) = digits.parse() {
        out.push(n);
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
