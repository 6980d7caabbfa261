//! Spanish-flavoured string collation for sorting.
//!
//! [`compare`] approximates a Spanish locale collator at base strength with numeric
//! ordering:
//!
//! - case is folded (`Ajolote` == `ajolote`)
//! - accents are folded (`Águila` sorts with `aguila`, `ü` with `u`); combining marks are
//!   ignored so decomposed input behaves like precomposed input
//! - `ñ` is its own letter, ordered after `n` and before `o`
//! - runs of ASCII digits compare by numeric value (`foto2` < `foto10`), leading zeros
//!   ignored
//! - whitespace and punctuation sort before digits, digits before letters
//!
//! Strings that are equal after folding compare `Equal`, so a stable sort keeps their
//! original relative order.

use std::cmp::Ordering;

/// Compare two strings under the collation described in the module docs.
pub fn compare(a: &str, b: &str) -> Ordering {
    let a = fold(a);
    let b = fold(b);
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let (end_a, end_b) = (digit_run_end(&a, i), digit_run_end(&b, j));
            match compare_numeric(&a[i..end_a], &b[j..end_b]) {
                Ordering::Equal => {
                    i = end_a;
                    j = end_b;
                    continue;
                }
                other => return other,
            }
        }

        match weight(a[i]).cmp(&weight(b[j])) {
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
            other => return other,
        }
    }

    (a.len() - i).cmp(&(b.len() - j))
}

/// Lower-cased, accent-folded characters of `s`.
pub fn fold(s: &str) -> Vec<char> {
    let mut out = Vec::with_capacity(s.len());
    for c in s.chars().flat_map(char::to_lowercase) {
        if c == '\u{0303}' && out.last() == Some(&'n') {
            // Decomposed ñ (n + COMBINING TILDE) keeps its own letter.
            out.pop();
            out.push('ñ');
            continue;
        }
        if is_combining_mark(c) {
            continue;
        }
        match c {
            'ß' => out.extend(['s', 's']),
            'æ' => out.extend(['a', 'e']),
            'œ' => out.extend(['o', 'e']),
            _ => out.push(strip_accent(c)),
        }
    }
    out
}

fn digit_run_end(chars: &[char], start: usize) -> usize {
    chars[start..]
        .iter()
        .position(|c| !c.is_ascii_digit())
        .map_or(chars.len(), |p| start + p)
}

fn compare_numeric(a: &[char], b: &[char]) -> Ordering {
    let trim = |s: &[char]| -> usize { s.iter().take_while(|c| **c == '0').count() };
    let a = &a[trim(a)..];
    let b = &b[trim(b)..];
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Sort weight of a folded character: (class, position).
fn weight(c: char) -> (u8, u32) {
    let class = if !c.is_alphanumeric() {
        0
    } else if c.is_ascii_digit() {
        1
    } else {
        2
    };

    // Slot ñ between n and o by doubling the code point space.
    let position = if c == 'ñ' {
        ('n' as u32) * 2 + 1
    } else {
        (c as u32) * 2
    };

    (class, position)
}

fn is_combining_mark(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036F}')
}

fn strip_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
        'ď' | 'đ' | 'ð' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
        'ĥ' | 'ħ' => 'h',
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => 'i',
        'ĵ' => 'j',
        'ķ' => 'k',
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => 'l',
        'ń' | 'ņ' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => 'o',
        'ŕ' | 'ŗ' | 'ř' => 'r',
        'ś' | 'ŝ' | 'ş' | 'š' => 's',
        'ţ' | 'ť' | 'ŧ' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'ŵ' => 'w',
        'ý' | 'ÿ' | 'ŷ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        other => other,
    }
}
