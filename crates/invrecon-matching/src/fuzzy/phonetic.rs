//! Phonetic comparison via American Soundex.

/// Soundex code length.
const CODE_LEN: usize = 4;

/// Compute the Soundex code of a string.
///
/// Returns an empty string when the input has no ASCII letters.
pub fn soundex(s: &str) -> String {
    let letters: Vec<char> = s
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let Some(&first) = letters.first() else {
        return String::new();
    };

    let mut code = String::with_capacity(CODE_LEN);
    code.push(first);

    let mut prev_digit = digit_for(first);
    for &c in &letters[1..] {
        let digit = digit_for(c);
        match digit {
            // H and W are transparent: they do not break a run of the same digit.
            None if matches!(c, 'H' | 'W') => {}
            None => prev_digit = None,
            Some(d) => {
                if prev_digit != Some(d) {
                    code.push(d);
                    if code.len() == CODE_LEN {
                        break;
                    }
                }
                prev_digit = Some(d);
            }
        }
    }

    while code.len() < CODE_LEN {
        code.push('0');
    }
    code
}

fn digit_for(c: char) -> Option<char> {
    match c {
        'B' | 'F' | 'P' | 'V' => Some('1'),
        'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some('2'),
        'D' | 'T' => Some('3'),
        'L' => Some('4'),
        'M' | 'N' => Some('5'),
        'R' => Some('6'),
        _ => None,
    }
}

/// Phonetic match: 1.0 when both Soundex codes are equal and non-empty,
/// else 0.0.
pub fn phonetic_match(a: &str, b: &str) -> f64 {
    let code_a = soundex(a.trim());
    let code_b = soundex(b.trim());
    if !code_a.is_empty() && code_a == code_b {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soundex_reference_codes() {
        assert_eq!(soundex("Robert"), "R163");
        assert_eq!(soundex("Rupert"), "R163");
        assert_eq!(soundex("Ashcraft"), "A261");
        assert_eq!(soundex("Tymczak"), "T522");
        assert_eq!(soundex("Pfister"), "P236");
    }

    #[test]
    fn test_soundex_pads_short_codes() {
        assert_eq!(soundex("Lee"), "L000");
    }

    #[test]
    fn test_phonetic_match_binary() {
        assert_eq!(phonetic_match("Robert", "Rupert"), 1.0);
        assert_eq!(phonetic_match("Robert", "Ashcraft"), 0.0);
        assert_eq!(phonetic_match("", ""), 0.0);
    }
}
