/// Share of CJK ideographs above which a fragment counts as Chinese.
const SOURCE_RATIO_THRESHOLD: f64 = 0.3;

fn is_cjk_ideograph(ch: char) -> bool {
    matches!(ch as u32, 0x4E00..=0x9FFF)
}

/// Classifies a text fragment as source-language (Chinese) or not.
///
/// Spaces and newlines are not significant; an empty or whitespace-only
/// fragment is never source language.
pub fn is_source_language(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    let matching = text.chars().filter(|ch| is_cjk_ideograph(*ch)).count();
    let significant = text.chars().filter(|ch| *ch != ' ' && *ch != '\n').count();
    if significant == 0 {
        return false;
    }
    matching as f64 / significant as f64 > SOURCE_RATIO_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::is_source_language;

    #[test]
    fn empty_and_whitespace_are_not_source() {
        assert!(!is_source_language(""));
        assert!(!is_source_language("   "));
        assert!(!is_source_language(" \n \n"));
    }

    #[test]
    fn pure_chinese_is_source() {
        assert!(is_source_language("你好世界"));
    }

    #[test]
    fn english_is_not_source() {
        assert!(!is_source_language("hello world"));
    }

    #[test]
    fn ratio_boundary_is_exclusive() {
        // 10 significant chars, 4 in range: 0.4 > 0.3
        assert!(is_source_language("你好世界abcdef"));
        // 10 significant chars, 3 in range: 0.3 is not > 0.3
        assert!(!is_source_language("你好世abcdefg"));
    }

    #[test]
    fn spaces_and_newlines_do_not_dilute() {
        // 4 of 10 significant once the whitespace is stripped.
        assert!(is_source_language("你 好 世 界\nabcdef"));
    }

    #[test]
    fn mostly_latin_catalogue_codes_are_skipped() {
        assert!(!is_source_language("SKU-20931 型"));
    }
}
