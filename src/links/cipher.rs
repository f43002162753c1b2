use regex::Regex;
use std::sync::LazyLock;

const OBFUSCATION_PREFIX: &str = "--";

static CLOCK_ENDPOINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/clock(?:\.json)?").expect("clock endpoint regex"));

/// Returns the encoded payload of an obfuscated source URL, or `None` for plain URLs.
pub fn strip_obfuscation_prefix(raw: &str) -> Option<&str> {
    raw.strip_prefix(OBFUSCATION_PREFIX)
}

/// Decodes a provider path token by token. Tokens missing from the table,
/// including a dangling odd character, are copied through unchanged.
pub fn decode_provider_path(encoded: &str) -> String {
    let chars: Vec<char> = encoded.chars().collect();
    let mut decoded = String::with_capacity(chars.len() / 2);
    let mut unmapped = Vec::new();

    for token in chars.chunks(2) {
        let pair: String = token.iter().collect();
        match decode_pair(&pair.to_ascii_lowercase()) {
            Some(ch) => decoded.push(ch),
            None => {
                decoded.push_str(&pair);
                unmapped.push(pair);
            }
        }
    }

    if !unmapped.is_empty() {
        log::warn!(
            "provider path contains {} unmapped token(s), passed through as-is: {}",
            unmapped.len(),
            unmapped.join(" ")
        );
    }

    expand_clock_endpoint(&decoded)
}

/// `/clock` → `/clock.json`. Already expanded endpoints are left alone.
pub fn expand_clock_endpoint(path: &str) -> String {
    CLOCK_ENDPOINT
        .replace_all(path, "/clock.json")
        .into_owned()
}

fn decode_pair(pair: &str) -> Option<char> {
    match pair {
        "79" => Some('A'),
        "7a" => Some('B'),
        "7b" => Some('C'),
        "7c" => Some('D'),
        "7d" => Some('E'),
        "7e" => Some('F'),
        "7f" => Some('G'),
        "70" => Some('H'),
        "71" => Some('I'),
        "72" => Some('J'),
        "73" => Some('K'),
        "74" => Some('L'),
        "75" => Some('M'),
        "76" => Some('N'),
        "77" => Some('O'),
        "68" => Some('P'),
        "69" => Some('Q'),
        "6a" => Some('R'),
        "6b" => Some('S'),
        "6c" => Some('T'),
        "6d" => Some('U'),
        "6e" => Some('V'),
        "6f" => Some('W'),
        "60" => Some('X'),
        "61" => Some('Y'),
        "62" => Some('Z'),
        "59" => Some('a'),
        "5a" => Some('b'),
        "5b" => Some('c'),
        "5c" => Some('d'),
        "5d" => Some('e'),
        "5e" => Some('f'),
        "5f" => Some('g'),
        "50" => Some('h'),
        "51" => Some('i'),
        "52" => Some('j'),
        "53" => Some('k'),
        "54" => Some('l'),
        "55" => Some('m'),
        "56" => Some('n'),
        "57" => Some('o'),
        "48" => Some('p'),
        "49" => Some('q'),
        "4a" => Some('r'),
        "4b" => Some('s'),
        "4c" => Some('t'),
        "4d" => Some('u'),
        "4e" => Some('v'),
        "4f" => Some('w'),
        "40" => Some('x'),
        "41" => Some('y'),
        "42" => Some('z'),
        "08" => Some('0'),
        "09" => Some('1'),
        "0a" => Some('2'),
        "0b" => Some('3'),
        "0c" => Some('4'),
        "0d" => Some('5'),
        "0e" => Some('6'),
        "0f" => Some('7'),
        "00" => Some('8'),
        "01" => Some('9'),
        "15" => Some('-'),
        "16" => Some('.'),
        "67" => Some('_'),
        "46" => Some('~'),
        "02" => Some(':'),
        "17" => Some('/'),
        "07" => Some('?'),
        "1b" => Some('#'),
        "63" => Some('['),
        "65" => Some(']'),
        "78" => Some('@'),
        "19" => Some('!'),
        "1c" => Some('$'),
        "1e" => Some('&'),
        "10" => Some('('),
        "11" => Some(')'),
        "12" => Some('*'),
        "13" => Some('+'),
        "14" => Some(','),
        "03" => Some(';'),
        "05" => Some('='),
        "1d" => Some('%'),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) fn encode_provider_path(path: &str) -> String {
    path.bytes().map(|b| format!("{:02x}", b ^ 0x38)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decodes_clock_path_and_appends_json() {
        let encoded = encode_provider_path("/apivtwo/clock?id=Ab3-x");
        assert_eq!(
            decode_provider_path(&encoded),
            "/apivtwo/clock.json?id=Ab3-x"
        );
    }

    #[test]
    fn uppercase_hex_is_accepted() {
        assert_eq!(decode_provider_path("7A5A"), "Bb");
    }

    #[test]
    fn unmapped_tokens_pass_through() {
        assert_eq!(decode_provider_path("59zz5a"), "azzb");
    }

    #[test]
    fn odd_length_and_non_ascii_do_not_panic() {
        assert_eq!(decode_provider_path("595"), "a5");
        assert_eq!(decode_provider_path("59é"), "aé");
        assert_eq!(decode_provider_path(""), "");
    }

    #[test]
    fn prefix_marks_obfuscated_sources() {
        assert_eq!(strip_obfuscation_prefix("--175948"), Some("175948"));
        assert_eq!(strip_obfuscation_prefix("https://example.com"), None);
    }

    #[test]
    fn every_table_entry_matches_the_xor_scheme() {
        for byte in 0u8..=0x7f {
            let token = format!("{:02x}", byte);
            if let Some(ch) = decode_pair(&token) {
                assert_eq!(ch as u8, byte ^ 0x38, "token {token}");
            }
        }
    }

    proptest! {
        #[test]
        fn unmapped_tokens_are_fixed_points(token in "[0-9a-z]{2}") {
            prop_assume!(decode_pair(&token).is_none());
            let once = decode_provider_path(&token);
            prop_assert_eq!(&once, &token);
            prop_assert_eq!(decode_provider_path(&once), once);
        }

        #[test]
        fn mapped_tokens_decode_deterministically(byte in 0u8..=0x7f) {
            let token = format!("{:02x}", byte);
            prop_assume!(decode_pair(&token).is_some());
            prop_assert_eq!(decode_provider_path(&token), decode_provider_path(&token));
        }

        #[test]
        fn clock_expansion_is_idempotent(path in "(/clock|/clock\\.json|[a-z/?=.]{0,6}){0,4}") {
            let once = expand_clock_endpoint(&path);
            prop_assert_eq!(expand_clock_endpoint(&once), once);
        }
    }
}
