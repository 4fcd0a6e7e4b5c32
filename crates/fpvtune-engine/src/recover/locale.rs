use super::narrative::Note;
use fpvtune_core::Locale;

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{3000}'..='\u{303F}'
        | '\u{FF00}'..='\u{FFEF}')
}

fn is_latin(c: char) -> bool {
    c.is_ascii_alphabetic() || matches!(c, '\u{00C0}'..='\u{024F}')
}

/// Guess which script a sentence is written in. Text with neither CJK nor Latin
/// letters (numbers, symbols, empty) has no script and yields `None`.
pub fn detect_script(text: &str) -> Option<Locale> {
    let (cjk, latin) = text.chars().fold((0usize, 0usize), |(cjk, latin), c| {
        if is_cjk(c) {
            (cjk + 1, latin)
        } else if is_latin(c) {
            (cjk, latin + 1)
        } else {
            (cjk, latin)
        }
    });

    if cjk == 0 && latin == 0 {
        None
    } else if cjk > 0 && cjk * 3 >= latin {
        Some(Locale::Zh)
    } else {
        Some(Locale::En)
    }
}

/// Keep notes in the requested language. Returns the kept notes and how many were dropped.
pub fn filter_notes(notes: Vec<Note>, locale: Locale) -> (Vec<Note>, usize) {
    let before = notes.len();
    let kept: Vec<Note> = notes
        .into_iter()
        .filter(|note| detect_script(&note.text).is_none_or(|script| script == locale))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}
