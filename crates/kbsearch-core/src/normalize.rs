//! Query text normalization shared by validation, keyword extraction and
//! cache keys.

use unicode_normalization::UnicodeNormalization;

/// NFKC-fold, collapse whitespace runs to one ASCII space and trim.
///
/// NFKC turns full-width ASCII (`ＣＳＶ`) and half-width katakana into their
/// canonical forms, so dictionary lookups see one spelling.
pub fn normalize_query(raw: &str) -> String {
    let folded: String = raw.nfkc().collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split normalized text into raw tokens on whitespace and punctuation.
pub fn raw_tokens(normalized: &str) -> Vec<String> {
    normalized
        .split(|c: char| c.is_whitespace() || is_separator(c))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_separator(c: char) -> bool {
    c.is_ascii_punctuation() || matches!(c, '、' | '。' | '「' | '」' | '『' | '』' | '・' | '（' | '）' | '【' | '】')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_full_width_and_collapses_spaces() {
        assert_eq!(normalize_query("  ＣＳＶ　の   出力？ "), "CSV の 出力?");
    }

    #[test]
    fn normalization_keeps_case() {
        assert_eq!(normalize_query("SSO  Login"), "SSO Login");
        assert_ne!(normalize_query("SSO Login"), normalize_query("sso login"));
    }

    #[test]
    fn raw_tokens_split_on_punctuation() {
        let tokens = raw_tokens(&normalize_query("教室コピー、できる？ csv-export"));
        assert_eq!(tokens, vec!["教室コピー", "できる", "csv", "export"]);
    }
}
