//! Card name normalization for lookups.
//!
//! Deck lists and older tools spell names loosely: "Aether Vial" vs
//! "Æther Vial", "Fire/Ice" vs "Fire // Ice", curly apostrophes, stray
//! whitespace. `name_key` maps all of these to one comparable key.

/// Separator between the faces of a split or double-faced card
pub const FACE_SEPARATOR: &str = " // ";

/// Normalized lookup key for a card name.
///
/// Lowercase, diacritics folded, apostrophes unified, whitespace collapsed
/// and split-card separators rewritten to `" // "`.
pub fn name_key(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for c in name.trim().chars() {
        fold_char(c, &mut folded);
    }

    folded
        .split('/')
        .map(|part| part.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(FACE_SEPARATOR)
}

/// Key of the front face: everything before the first face separator
pub fn front_face_key(name: &str) -> String {
    let key = name_key(name);
    match key.split_once(FACE_SEPARATOR) {
        Some((front, _)) => front.to_string(),
        None => key,
    }
}

fn fold_char(c: char, out: &mut String) {
    match c {
        'Æ' | 'æ' => out.push_str("ae"),
        'Œ' | 'œ' => out.push_str("oe"),
        'ß' => out.push_str("ss"),
        '\u{2018}' | '\u{2019}' | '`' | '\u{00B4}' => out.push('\''),
        '\u{201C}' | '\u{201D}' => out.push('"'),
        '\u{2013}' | '\u{2014}' => out.push('-'),
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => out.push('a'),
        'È' | 'É' | 'Ê' | 'Ë' | 'è' | 'é' | 'ê' | 'ë' => out.push('e'),
        'Ì' | 'Í' | 'Î' | 'Ï' | 'ì' | 'í' | 'î' | 'ï' => out.push('i'),
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'ò' | 'ó' | 'ô' | 'õ' | 'ö' => out.push('o'),
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'ù' | 'ú' | 'û' | 'ü' => out.push('u'),
        'Ñ' | 'ñ' => out.push('n'),
        'Ç' | 'ç' => out.push('c'),
        'Ý' | 'ý' | 'ÿ' => out.push('y'),
        _ => out.extend(c.to_lowercase()),
    }
}
