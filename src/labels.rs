// src/labels.rs
//
// Pure string mappings for series titles and column headers. Callers pass
// these into the loaders or apply them with `transform::relabel`.

const CPI_TITLE_PREFIX: &str = "consumer price index for all urban consumers: ";
const CPI_TITLE_SUFFIX: &str = " in u.s. city average";

/// Turn a provider CPI title into a short label:
/// `"Consumer Price Index for All Urban Consumers: Food at Home in U.S. City Average"`
/// → `"Food at home"`.
pub fn parse_cpi_series_title(title: &str) -> String {
    let short = title
        .to_lowercase()
        .replace(CPI_TITLE_PREFIX, "")
        .replace(CPI_TITLE_SUFFIX, "");
    capitalize(&short)
}

/// `cpi_series` → `Cpi Series`. Letters that follow another letter are
/// lowercased, every other letter is uppercased.
pub fn title_case_column(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_alpha = false;
    for ch in name.replace('_', " ").chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
