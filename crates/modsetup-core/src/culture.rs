//! Culture identifier detection for localized resource names

/// ISO 639-1 language codes
const LANGUAGES: &[&str] = &[
    "aa", "ab", "ae", "af", "ak", "am", "an", "ar", "as", "av", "ay", "az", "ba", "be", "bg",
    "bh", "bi", "bm", "bn", "bo", "br", "bs", "ca", "ce", "ch", "co", "cr", "cs", "cu", "cv",
    "cy", "da", "de", "dv", "dz", "ee", "el", "en", "eo", "es", "et", "eu", "fa", "ff", "fi",
    "fj", "fo", "fr", "fy", "ga", "gd", "gl", "gn", "gu", "gv", "ha", "he", "hi", "ho", "hr",
    "ht", "hu", "hy", "hz", "ia", "id", "ie", "ig", "ii", "ik", "io", "is", "it", "iu", "ja",
    "jv", "ka", "kg", "ki", "kj", "kk", "kl", "km", "kn", "ko", "kr", "ks", "ku", "kv", "kw",
    "ky", "la", "lb", "lg", "li", "ln", "lo", "lt", "lu", "lv", "mg", "mh", "mi", "mk", "ml",
    "mn", "mr", "ms", "mt", "my", "na", "nb", "nd", "ne", "ng", "nl", "nn", "no", "nr", "nv",
    "ny", "oc", "oj", "om", "or", "os", "pa", "pi", "pl", "ps", "pt", "qu", "rm", "rn", "ro",
    "ru", "rw", "sa", "sc", "sd", "se", "sg", "si", "sk", "sl", "sm", "sn", "so", "sq", "sr",
    "ss", "st", "su", "sv", "sw", "ta", "te", "tg", "th", "ti", "tk", "tl", "tn", "to", "tr",
    "ts", "tt", "tw", "ty", "ug", "uk", "ur", "uz", "ve", "vi", "vo", "wa", "wo", "xh", "yi",
    "yo", "za", "zh", "zu",
];

/// Three-letter codes for languages without a two-letter code
const LANGUAGES_ISO639_2: &[&str] = &[
    "ast", "chr", "dsb", "fil", "gsw", "haw", "hsb", "kok", "moh", "nso", "prs", "quc", "sah",
    "sma", "smj", "smn", "sms", "syr", "tzm", "yue",
];

fn is_language(subtag: &str) -> bool {
    let lower = subtag.to_ascii_lowercase();
    match lower.len() {
        2 => LANGUAGES.binary_search(&lower.as_str()).is_ok(),
        3 => LANGUAGES_ISO639_2.contains(&lower.as_str()),
        _ => false,
    }
}

fn is_script(subtag: &str) -> bool {
    subtag.len() == 4 && subtag.bytes().all(|b| b.is_ascii_alphabetic())
}

fn is_region(subtag: &str) -> bool {
    (subtag.len() == 2 && subtag.bytes().all(|b| b.is_ascii_alphabetic()))
        || (subtag.len() == 3 && subtag.bytes().all(|b| b.is_ascii_digit()))
}

/// Whether `name` is a culture identifier such as `en`, `en-US`, `zh-Hans`
/// or `sr-Latn-RS`
pub fn is_culture_name(name: &str) -> bool {
    let mut subtags = name.split(['-', '_']);

    match subtags.next() {
        Some(language) if is_language(language) => {}
        _ => return false,
    }

    let rest: Vec<&str> = subtags.collect();
    match rest.as_slice() {
        [] => true,
        [one] => is_script(one) || is_region(one),
        [script, region] => is_script(script) && is_region(region),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_table_is_sorted() {
        let mut sorted = LANGUAGES.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, LANGUAGES);
    }

    #[test]
    fn test_valid_cultures() {
        for name in ["en", "en-US", "de-DE", "pt-BR", "zh-Hans", "sr-Latn-RS", "es-419", "FR-fr", "fil-PH"] {
            assert!(is_culture_name(name), "{} should be a culture", name);
        }
    }

    #[test]
    fn test_invalid_cultures() {
        for name in ["Strings", "Main", "json", "png", "xx-YY", "en-USA1", "", "en-", "en-Latn-US-x"] {
            assert!(!is_culture_name(name), "{} should not be a culture", name);
        }
    }
}
