//! OCRテキストの正規化
//!
//! - 全角→半角変換
//! - 各種ダッシュ記号を `-` に統一
//! - 行内の空白の連続を1つのスペースに圧縮（改行は読み順の区切りとして保持）
//!
//! 数字と紛らわしい文字（`O` vs `0` など）の修正はテキスト全体には適用しない。
//! 抽出器が候補として切り出した部分文字列にだけ [`correct_digit_confusions`] を使う。

/// OCRで数字と取り違えやすい文字の対応表
pub const DIGIT_CONFUSIONS: &[(char, char)] = &[
    ('O', '0'),
    ('o', '0'),
    ('Q', '0'),
    ('q', '0'),
    ('I', '1'),
    ('i', '1'),
    ('l', '1'),
    ('L', '1'),
    ('Z', '2'),
    ('z', '2'),
    ('S', '5'),
    ('s', '5'),
    ('B', '8'),
    ('b', '8'),
];

/// 生のOCRテキストを正規化する
pub fn normalize(raw: &str) -> String {
    let mapped: String = raw.chars().map(map_char).collect();

    mapped
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// 全角英数字・記号を半角に、ダッシュ類を `-` に
fn map_char(c: char) -> char {
    match c {
        '０'..='９' => shift(c, '０', '0'),
        'Ａ'..='Ｚ' => shift(c, 'Ａ', 'A'),
        'ａ'..='ｚ' => shift(c, 'ａ', 'a'),
        '\u{2010}'..='\u{2015}' | '\u{2212}' | '\u{FE58}' | '\u{FE63}' | '－' => '-',
        '：' => ':',
        '　' => ' ',
        _ => c,
    }
}

fn shift(c: char, from: char, to: char) -> char {
    char::from_u32(c as u32 - from as u32 + to as u32).unwrap_or(c)
}

/// 候補文字列内の紛らわしい文字を数字に置き換える
///
/// 戻り値は（修正後の文字列, 置換した文字数）
pub fn correct_digit_confusions(candidate: &str) -> (String, usize) {
    let mut fixes = 0;
    let corrected = candidate
        .chars()
        .map(|c| match confusion_digit(c) {
            Some(d) => {
                fixes += 1;
                d
            }
            None => c,
        })
        .collect();
    (corrected, fixes)
}

fn confusion_digit(c: char) -> Option<char> {
    DIGIT_CONFUSIONS
        .iter()
        .find(|(from, _)| *from == c)
        .map(|(_, to)| *to)
}

/// 正規表現の文字クラス用に、数字と紛らわしい文字を並べた文字列
pub fn confusable_class() -> String {
    let mut class = String::from("0-9");
    for (from, _) in DIGIT_CONFUSIONS {
        class.push(*from);
    }
    class
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace_within_lines() {
        assert_eq!(normalize("Site:   GDN-248\t\t x"), "Site: GDN-248 x");
    }

    #[test]
    fn test_keeps_line_breaks_and_drops_empty_lines() {
        let raw = "Site: GDN-248\r\n\r\n   \nArtifact No  76656\n";
        assert_eq!(normalize(raw), "Site: GDN-248\nArtifact No 76656");
    }

    #[test]
    fn test_unicode_dashes_become_hyphen() {
        assert_eq!(normalize("GDN\u{2014}248"), "GDN-248");
        assert_eq!(normalize("GDN\u{2013}248"), "GDN-248");
        assert_eq!(normalize("GDN\u{2212}248"), "GDN-248");
    }

    #[test]
    fn test_fullwidth_to_ascii() {
        assert_eq!(normalize("ＧＤＮ－２４８"), "GDN-248");
    }

    #[test]
    fn test_normalize_does_not_touch_confusable_letters() {
        // 単語中の O や l は候補になるまで修正しない
        assert_eq!(normalize("Nunalleq BOX 0"), "Nunalleq BOX 0");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \n\t\n"), "");
    }

    #[test]
    fn test_correct_digit_confusions() {
        assert_eq!(correct_digit_confusions("7665O"), ("76650".to_string(), 1));
        assert_eq!(correct_digit_confusions("l2S4B"), ("12548".to_string(), 3));
        assert_eq!(correct_digit_confusions("76656"), ("76656".to_string(), 0));
    }

    #[test]
    fn test_confusable_class_contains_digits_and_table() {
        let class = confusable_class();
        assert!(class.starts_with("0-9"));
        assert!(class.contains('O'));
        assert!(class.contains('l'));
    }
}
