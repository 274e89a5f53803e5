//! 文本排版：按显示宽度估算换行与省略

use unicode_width::UnicodeWidthChar;

/// 单个半角字符的平均宽度（em）
const EM_PER_COLUMN: f64 = 0.55;

fn char_cols(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0).max(1)
}

fn str_cols(s: &str) -> usize {
    s.chars().map(char_cols).sum()
}

/// 给定字号下一行能容纳的显示列数
pub fn columns_for(width: f64, font_size: f64) -> usize {
    if width <= 0.0 || font_size <= 0.0 {
        return 0;
    }
    (width / (font_size * EM_PER_COLUMN)).floor() as usize
}

/// 按字符断行（用于单词本身超出行宽的情况）
fn break_long_word(word: &str, max_cols: usize, out: &mut Vec<String>) -> String {
    let mut current = String::new();
    let mut w = 0usize;
    for ch in word.chars() {
        let cw = char_cols(ch);
        if w + cw > max_cols && !current.is_empty() {
            out.push(std::mem::take(&mut current));
            w = 0;
        }
        current.push(ch);
        w += cw;
    }
    current
}

/// 按词换行
pub fn wrap_words(text: &str, max_cols: usize) -> Vec<String> {
    if max_cols == 0 {
        return vec![text.to_string()];
    }
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            str_cols(word)
        } else {
            str_cols(&current) + 1 + str_cols(word)
        };
        if candidate <= max_cols {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if str_cols(word) > max_cols {
            current = break_long_word(word, max_cols, &mut lines);
        } else {
            current.push_str(word);
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// 末行追加省略号，必要时裁掉尾部字符
fn with_ellipsis(line: &str, max_cols: usize) -> String {
    let target = max_cols.saturating_sub(1);
    let mut acc = String::new();
    let mut w = 0usize;
    for ch in line.chars() {
        let cw = char_cols(ch);
        if w + cw > target {
            break;
        }
        acc.push(ch);
        w += cw;
    }
    let trimmed = acc.trim_end().len();
    acc.truncate(trimmed);
    acc.push('…');
    acc
}

/// 在文本框内排版：换行后超过可容纳行数时截断并在末行加省略号
pub fn fit_lines(text: &str, width: f64, height: f64, font_size: f64, line_height: f64) -> Vec<String> {
    let max_cols = columns_for(width, font_size);
    let line_px = font_size * line_height;
    let max_lines = if line_px > 0.0 {
        ((height / line_px).floor() as usize).max(1)
    } else {
        1
    };

    let mut lines = wrap_words(text, max_cols);
    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            *last = with_ellipsis(last, max_cols);
        }
    }
    lines
}
