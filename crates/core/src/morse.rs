//! Morse data: character <-> representation tables, phonetics, procedural
//! signals, and validation helpers.
//!
//! Lookup tables are `phf` perfect-hash maps, built at compile time, so
//! `char_to_representation` and `representation_to_char` are both O(1)
//! rather than the O(log n) the design merely requires.

use crate::error::{CwError, Result};

/// Longest representation in [`CHAR_TABLE`], in symbols.
pub const MAX_REPRESENTATION_LENGTH: usize = 7;

/// Character <-> dot/dash representation. Values are upper-case; lookups on
/// [`char_to_representation`] are case-insensitive on input.
pub static CHAR_TABLE: phf::Map<char, &'static str> = phf::phf_map! {
    'A' => ".-",      'B' => "-...",    'C' => "-.-.",    'D' => "-..",
    'E' => ".",       'F' => "..-.",    'G' => "--.",     'H' => "....",
    'I' => "..",      'J' => ".---",    'K' => "-.-",     'L' => ".-..",
    'M' => "--",      'N' => "-.",      'O' => "---",     'P' => ".--.",
    'Q' => "--.-",    'R' => ".-.",     'S' => "...",     'T' => "-",
    'U' => "..-",     'V' => "...-",    'W' => ".--",     'X' => "-..-",
    'Y' => "-.--",    'Z' => "--..",
    '0' => "-----",   '1' => ".----",   '2' => "..---",   '3' => "...--",
    '4' => "....-",   '5' => ".....",   '6' => "-....",   '7' => "--...",
    '8' => "---..",   '9' => "----.",
    '.' => ".-.-.-",  ',' => "--..--",  '?' => "..--..",  '/' => "-..-.",
    '=' => "-...-",   '\'' => ".----.", '!' => "-.-.--",  '(' => "-.--.",
    ')' => "-.--.-",  '&' => ".-...",   ':' => "---...",  ';' => "-.-.-.",
    '+' => ".-.-.",   '-' => "-....-",  '_' => "..--.-",  '"' => ".-..-.",
    '$' => "...-..-", '@' => ".--.-.",
};

/// Representation -> character, the reverse of [`CHAR_TABLE`].
pub static REPRESENTATION_TABLE: phf::Map<&'static str, char> = phf::phf_map! {
    ".-" => 'A',      "-..." => 'B',    "-.-." => 'C',    "-.." => 'D',
    "." => 'E',       "..-." => 'F',    "--." => 'G',     "...." => 'H',
    ".." => 'I',      ".---" => 'J',    "-.-" => 'K',     ".-.." => 'L',
    "--" => 'M',      "-." => 'N',      "---" => 'O',     ".--." => 'P',
    "--.-" => 'Q',    ".-." => 'R',     "..." => 'S',     "-" => 'T',
    "..-" => 'U',     "...-" => 'V',    ".--" => 'W',     "-..-" => 'X',
    "-.--" => 'Y',    "--.." => 'Z',
    "-----" => '0',   ".----" => '1',   "..---" => '2',   "...--" => '3',
    "....-" => '4',   "....." => '5',   "-...." => '6',   "--..." => '7',
    "---.." => '8',   "----." => '9',
    ".-.-.-" => '.',  "--..--" => ',',  "..--.." => '?',  "-..-." => '/',
    "-...-" => '=',   ".----." => '\'', "-.-.--" => '!',  "-.--." => '(',
    "-.--.-" => ')',  ".-..." => '&',   "---..." => ':',  "-.-.-." => ';',
    ".-.-." => '+',   "-....-" => '-',  "..--.-" => '_',  ".-..-." => '"',
    "...-..-" => '$', ".--.-." => '@',
};

/// Procedural signal (prosign): an expanded multi-letter representation,
/// and whether it is conventionally sent as the expansion rather than as a
/// single run-together representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProceduralSignal {
    pub representation: &'static str,
    pub usually_expanded: bool,
}

/// Procedural signals, keyed by the ASCII character conventionally used to
/// name them in client code (e.g. `'*'` for the run-together BT break).
pub static PROCEDURAL_TABLE: phf::Map<char, ProceduralSignal> = phf::phf_map! {
    '*' => ProceduralSignal { representation: "-...-", usually_expanded: false },   // BT
    '=' => ProceduralSignal { representation: "-...-", usually_expanded: false },   // BT (alias)
    '+' => ProceduralSignal { representation: ".-.-.", usually_expanded: true },    // AR
    '@' => ProceduralSignal { representation: ".-...", usually_expanded: true },    // AS
    '~' => ProceduralSignal { representation: "...-.", usually_expanded: true },    // SN / VE
    '%' => ProceduralSignal { representation: "........", usually_expanded: false },// error (8 dots)
    '^' => ProceduralSignal { representation: "-.-.-", usually_expanded: true },    // KA
    '<' => ProceduralSignal { representation: "...-.-", usually_expanded: true },   // SK
};

/// ICAO phonetic alphabet, one entry per `[A-Z]`.
pub static PHONETIC_TABLE: phf::Map<char, &'static str> = phf::phf_map! {
    'A' => "Alfa",     'B' => "Bravo",    'C' => "Charlie", 'D' => "Delta",
    'E' => "Echo",     'F' => "Foxtrot",  'G' => "Golf",    'H' => "Hotel",
    'I' => "India",    'J' => "Juliett",  'K' => "Kilo",    'L' => "Lima",
    'M' => "Mike",     'N' => "November", 'O' => "Oscar",   'P' => "Papa",
    'Q' => "Quebec",   'R' => "Romeo",    'S' => "Sierra",  'T' => "Tango",
    'U' => "Uniform",  'V' => "Victor",   'W' => "Whiskey", 'X' => "Xray",
    'Y' => "Yankee",   'Z' => "Zulu",
};

/// Look up the representation for a character. Input is case-insensitive;
/// the space character is not present here (it is handled by callers as a
/// word separator, see [`string_is_valid`]).
pub fn char_to_representation(c: char) -> Result<&'static str> {
    let upper = c.to_ascii_uppercase();
    CHAR_TABLE
        .get(&upper)
        .copied()
        .ok_or_else(|| CwError::Invalid(format!("no Morse representation for character '{c}'")))
}

/// Look up the character for a representation string of `.`/`-`.
pub fn representation_to_char(s: &str) -> Result<char> {
    REPRESENTATION_TABLE
        .get(s)
        .copied()
        .ok_or_else(|| CwError::Invalid(format!("no character for representation \"{s}\"")))
}

/// True if `c` (case-insensitively) has a table entry.
pub fn char_is_valid(c: char) -> bool {
    CHAR_TABLE.contains_key(&c.to_ascii_uppercase())
}

/// True if every character in `s` is valid; the space character is accepted
/// as the word separator.
pub fn string_is_valid(s: &str) -> bool {
    s.chars().all(|c| c == ' ' || char_is_valid(c))
}

/// True if `s` is non-empty, contains only `.`/`-`, is no longer than
/// [`MAX_REPRESENTATION_LENGTH`], and resolves to a character.
pub fn representation_is_valid(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_REPRESENTATION_LENGTH
        && s.chars().all(|c| c == '.' || c == '-')
        && REPRESENTATION_TABLE.contains_key(s)
}

/// Look up the ICAO phonetic for an upper- or lower-case letter.
pub fn phonetic_for(c: char) -> Result<&'static str> {
    PHONETIC_TABLE
        .get(&c.to_ascii_uppercase())
        .copied()
        .ok_or_else(|| CwError::Invalid(format!("no phonetic for character '{c}'")))
}

/// Look up a procedural signal by its conventional name character.
pub fn procedural_signal_for(c: char) -> Result<ProceduralSignal> {
    PROCEDURAL_TABLE
        .get(&c)
        .copied()
        .ok_or_else(|| CwError::Invalid(format!("no procedural signal named '{c}'")))
}

/// Validate every table at process start (or in tests, since `phf` tables
/// are already checked for duplicate keys at compile time): every
/// representation round-trips to the same upper-cased character, and no
/// representation exceeds [`MAX_REPRESENTATION_LENGTH`].
pub fn validate_tables() -> Result<()> {
    for (&c, &repr) in CHAR_TABLE.entries() {
        if repr.is_empty() || repr.len() > MAX_REPRESENTATION_LENGTH {
            return Err(CwError::Invalid(format!(
                "representation for '{c}' has bad length: \"{repr}\""
            )));
        }
        if !repr.chars().all(|s| s == '.' || s == '-') {
            return Err(CwError::Invalid(format!(
                "representation for '{c}' contains non-dot-dash symbols: \"{repr}\""
            )));
        }
        let back = representation_to_char(repr)?;
        if back != c {
            return Err(CwError::Invalid(format!(
                "round-trip mismatch: '{c}' -> \"{repr}\" -> '{back}'"
            )));
        }
    }
    for (&repr, &c) in REPRESENTATION_TABLE.entries() {
        let forward = char_to_representation(c)?;
        if forward != repr {
            return Err(CwError::Invalid(format!(
                "reverse round-trip mismatch: \"{repr}\" -> '{c}' -> \"{forward}\""
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_validate() {
        validate_tables().unwrap();
    }

    #[test]
    fn round_trip_every_character() {
        for (&c, _) in CHAR_TABLE.entries() {
            let repr = char_to_representation(c).unwrap();
            assert_eq!(representation_to_char(repr).unwrap(), c);
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(char_to_representation('a').unwrap(), ".-");
        assert_eq!(char_to_representation('A').unwrap(), ".-");
    }

    #[test]
    fn unknown_character_is_invalid() {
        assert!(char_to_representation('\u{1}').is_err());
        assert!(!char_is_valid('\u{1}'));
    }

    #[test]
    fn string_validity() {
        assert!(string_is_valid("SOS DE W1AW"));
        assert!(!string_is_valid("SOS\t"));
    }

    #[test]
    fn representation_validity() {
        assert!(representation_is_valid("..."));
        assert!(!representation_is_valid(""));
        assert!(!representation_is_valid("......."));
        assert!(!representation_is_valid("..x"));
    }

    #[test]
    fn phonetics_cover_alphabet() {
        for c in 'A'..='Z' {
            assert!(phonetic_for(c).is_ok());
        }
    }

    #[test]
    fn procedural_signals_resolve() {
        let bt = procedural_signal_for('*').unwrap();
        assert_eq!(bt.representation, "-...-");
    }

    #[quickcheck_macros::quickcheck]
    fn valid_characters_round_trip_through_their_representation(c: char) -> quickcheck::TestResult {
        let upper = c.to_ascii_uppercase();
        if !char_is_valid(upper) {
            return quickcheck::TestResult::discard();
        }
        let representation = char_to_representation(upper).unwrap();
        quickcheck::TestResult::from_bool(representation_to_char(representation).unwrap() == upper)
    }
}
