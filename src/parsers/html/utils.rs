/// ASCII 空白字符
pub const WHITESPACES: &[char] = &[' ', '\t', '\n', '\x0c', '\r'];

/// 判定为中文文本的汉字占比阈值
pub const CHINESE_CHAR_THRESHOLD: f32 = 0.5;

pub fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// 非空白字符中汉字占比超过阈值即视为中文
pub fn is_mostly_chinese(text: &str) -> bool {
    let mut total = 0usize;
    let mut chinese = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if is_cjk(c) {
            chinese += 1;
        }
    }
    total > 0 && chinese as f32 / total as f32 > CHINESE_CHAR_THRESHOLD
}

/// 折叠连续空白并去掉首尾空白
pub fn normalize_whitespace(text: &str) -> String {
    text.split(WHITESPACES)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
