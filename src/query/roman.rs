//! Roman numeral handling for sequel-style topics ("Rocky IV" / "Rocky 4").

/// Value of a canonical Roman numeral made of I, V and X (1..=39).
pub fn roman_value(token: &str) -> Option<u32> {
    if token.is_empty() || !token.chars().all(|c| matches!(c, 'I' | 'V' | 'X')) {
        return None;
    }

    let digit = |c: char| match c {
        'I' => 1,
        'V' => 5,
        _ => 10,
    };

    let chars: Vec<i64> = token.chars().map(digit).collect();
    let mut total = 0i64;
    for (i, value) in chars.iter().enumerate() {
        match chars.get(i + 1) {
            Some(next) if next > value => total -= value,
            _ => total += value,
        }
    }

    // Reject non-canonical spellings like "IIII" or "VX"
    let total = u32::try_from(total).ok()?;
    (to_roman(total)? == token).then_some(total)
}

fn to_roman(mut value: u32) -> Option<String> {
    if value == 0 || value > 39 {
        return None;
    }
    let mut out = String::new();
    for (unit, symbol) in [(10, "X"), (9, "IX"), (5, "V"), (4, "IV"), (1, "I")] {
        while value >= unit {
            out.push_str(symbol);
            value -= unit;
        }
    }
    Some(out)
}

/// The topic with every Roman numeral replaced by its decimal value, if it has any.
///
/// Single-letter tokens are usually letters, not numerals: a lone `I` or `V`
/// only counts at the end of a multi-word topic ("Rocky V"), and a lone `X`
/// never does ("Mega Man X", "Xbox Series X").
pub fn decimal_variant(topic: &str) -> Option<String> {
    let words: Vec<&str> = topic.split_whitespace().collect();
    let mut changed = false;

    let converted: Vec<String> = words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let core = word.trim_end_matches(|c: char| c.is_ascii_punctuation());
            let suffix = &word[core.len()..];
            let is_last = i + 1 == words.len();
            let eligible = match core {
                "X" => false,
                "I" | "V" => is_last && words.len() > 1,
                _ => true,
            };
            match roman_value(core).filter(|_| eligible) {
                Some(value) => {
                    changed = true;
                    format!("{}{}", value, suffix)
                }
                None => word.to_string(),
            }
        })
        .collect();

    changed.then(|| converted.join(" "))
}
