use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Canonicalize a free-text person name into a comparable token form.
///
/// Hyphens and apostrophes become spaces, accents are stripped via NFKD
/// decomposition, everything that is not a lowercase letter or space is
/// dropped, and runs of whitespace collapse to a single space. The result is
/// stable under repeated application.
pub fn normalize_name(name: &str) -> String {
    let mut ascii = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '-' | '\u{2010}' | '\u{2011}' | '\'' | '\u{2019}' | '`' => ascii.push(' '),
            _ => ascii.push(ch),
        }
    }

    let stripped: String = ascii
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(|c| c.to_lowercase())
        .filter(|c| c.is_ascii_lowercase() || *c == ' ' || c.is_whitespace())
        .collect();

    let mut out = String::with_capacity(stripped.len());
    for token in stripped.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(token);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::normalize_name;

    #[test]
    fn strips_accents_case_and_punctuation() {
        assert_eq!(normalize_name("Kylian Mbappé"), "kylian mbappe");
        assert_eq!(normalize_name("  N'Golo   KANTÉ "), "n golo kante");
        assert_eq!(normalize_name("Jean-Paul O'Neil"), "jean paul o neil");
    }

    #[test]
    fn hyphen_and_apostrophe_forms_agree() {
        assert_eq!(
            normalize_name("Jean-Paul O'Neil"),
            normalize_name("jean paul o neil")
        );
        assert_eq!(
            normalize_name("N\u{2019}Golo Kant\u{00e9}"),
            normalize_name("N'Golo Kante")
        );
    }

    #[test]
    fn is_idempotent() {
        for raw in ["Saša Kalajdžić", "El-Hadji O'Brien-Díaz", "", "  ", "123"] {
            let once = normalize_name(raw);
            assert_eq!(normalize_name(&once), once);
        }
    }

    #[test]
    fn empty_and_garbage_normalize_to_empty() {
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name("  \t "), "");
        assert_eq!(normalize_name("1234 !!"), "");
    }
}
