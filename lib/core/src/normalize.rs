//! IPA symbol normalization
//!
//! Canonicalizes raw grapheme text before feature lookup. The pipeline runs,
//! in order:
//!
//! 1. Lowercasing
//! 2. Unicode canonical decomposition (NFD)
//! 3. Length mark and tie bar canonicalization
//! 4. ASCII stress marks to IPA (`'` and `"` → `ˈ`, `,` → `ˌ`)
//! 5. Tone stripping (combining tone marks, tone letters, tone digits)
//! 6. Whitespace trimming
//! 7. Alias substitution (`g` → `ɡ`, `ʧ` → `t͡ʃ`, ...)
//! 8. Diacritic ordering within each base character's run of combining marks
//!
//! Every step is idempotent on its own output and alias entries are
//! restricted so that no step can re-trigger another, so
//! `normalize(normalize(x)) == normalize(x)` holds for any input.
//! Diacritics missing from the ordering table are kept, after the known ones.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use unicode_normalization::char::{canonical_combining_class, is_combining_mark};
use unicode_normalization::UnicodeNormalization;

/// Combining marks in canonical output order, closest to the base first
const DIACRITIC_ORDER: &[char] = &[
    '\u{0329}', // syllabic
    '\u{032F}', // non-syllabic
    '\u{0325}', // voiceless
    '\u{032C}', // voiced
    '\u{0324}', // breathy voiced
    '\u{0330}', // creaky voiced
    '\u{032A}', // dental
    '\u{033A}', // apical
    '\u{033B}', // laminal
    '\u{033C}', // linguolabial
    '\u{0339}', // more rounded
    '\u{031C}', // less rounded
    '\u{031F}', // advanced
    '\u{0320}', // retracted
    '\u{031D}', // raised
    '\u{031E}', // lowered
    '\u{0318}', // advanced tongue root
    '\u{0319}', // retracted tongue root
    '\u{0334}', // velarized or pharyngealized
    '\u{0335}',
    '\u{0336}',
    '\u{0301}', // high tone
    '\u{0300}', // low tone
    '\u{0304}', // mid tone
    '\u{030C}', // rising tone
    '\u{0302}', // falling tone
    '\u{030A}', // ring above
    '\u{0308}', // centralized
    '\u{033D}', // mid-centralized
    '\u{0303}', // nasalized
    '\u{031A}', // no audible release
    '\u{0361}', // tie bar
];

const TONE_MARKS: &[char] = &[
    '\u{0300}', '\u{0301}', '\u{0302}', '\u{0304}', '\u{030B}', '\u{030C}', '\u{030F}',
];

const TONE_LETTERS: &[char] = &[
    '˥', '˦', '˧', '˨', '˩', '¹', '²', '³', '⁴', '⁵', '₁', '₂', '₃', '₄', '₅',
];

const CLICKS: &[char] = &['ǀ', 'ǁ', 'ǂ', 'ǃ', 'ʘ'];

// IPA letters outside the IPA and phonetic extension blocks
const EXTRA_LETTERS: &[char] = &[
    'æ', 'ç', 'ð', 'ø', 'ħ', 'ŋ', 'œ', 'β', 'θ', 'χ', 'ǀ', 'ǁ', 'ǂ', 'ǃ',
];

const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("g", "ɡ"),
    ("ʧ", "t\u{0361}ʃ"),
    ("ʤ", "d\u{0361}ʒ"),
    ("ʦ", "t\u{0361}s"),
    ("ʣ", "d\u{0361}z"),
];

/// Switches for the individual pipeline steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    #[serde(default = "enabled")]
    pub lowercase: bool,
    pub decompose: bool,
    pub order_diacritics: bool,
    pub canonicalize_length: bool,
    #[serde(default = "enabled")]
    pub stress_marks: bool,
    pub strip_tones: bool,
    pub apply_aliases: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            lowercase: true,
            decompose: true,
            order_diacritics: true,
            canonicalize_length: true,
            stress_marks: true,
            strip_tones: true,
            apply_aliases: true,
        }
    }
}

fn enabled() -> bool {
    true
}

/// Symbol normalizer: pipeline options plus an alias table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalizer {
    options: NormalizeOptions,
    // Longest source first, so multi-character aliases win over their prefixes
    aliases: Vec<(String, String)>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizeOptions::default())
    }
}

impl Normalizer {
    /// Create a normalizer with the built-in alias table
    pub fn new(options: NormalizeOptions) -> Self {
        let mut normalizer = Self::without_aliases(options);
        for (alias, target) in BUILTIN_ALIASES {
            normalizer.aliases.push((alias.to_string(), target.to_string()));
        }
        normalizer.sort_aliases();
        normalizer
    }

    /// Create a normalizer with an empty alias table
    pub fn without_aliases(options: NormalizeOptions) -> Self {
        Self {
            options,
            aliases: Vec::new(),
        }
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    pub fn aliases(&self) -> &[(String, String)] {
        &self.aliases
    }

    /// Add or replace an alias.
    ///
    /// Both sides are canonicalized with the non-alias steps first. The source
    /// may not contain combining marks, and no character may appear both in a
    /// source and in a target of the table.
    pub fn add_alias(&mut self, alias: &str, target: &str) -> Result<()> {
        let alias = self.prepare(alias);
        let target = self.prepare(target);
        let invalid = |reason: &str| ConfigError::InvalidAlias {
            alias: alias.clone(),
            target: target.clone(),
            reason: reason.to_string(),
        };

        if alias.is_empty() || target.is_empty() {
            return Err(invalid("alias and target must be non-empty").into());
        }
        if alias == target {
            return Err(invalid("alias maps onto itself").into());
        }
        if alias.chars().any(is_combining_mark) {
            return Err(invalid("alias source may not contain combining marks").into());
        }

        let others = self.aliases.iter().filter(|(a, _)| *a != alias);
        let mut sources: Vec<&str> = vec![alias.as_str()];
        let mut targets: Vec<&str> = vec![target.as_str()];
        for (a, t) in others {
            sources.push(a);
            targets.push(t);
        }
        let overlap = targets
            .iter()
            .flat_map(|t| t.chars())
            .any(|c| sources.iter().any(|s| s.contains(c)));
        if overlap {
            return Err(invalid("targets may not contain characters of any alias source").into());
        }

        self.aliases.retain(|(a, _)| *a != alias);
        tracing::debug!("Registered alias '{}' -> '{}'", alias, target);
        self.aliases.push((alias, target));
        self.sort_aliases();
        Ok(())
    }

    /// Run the full pipeline
    pub fn normalize(&self, text: &str) -> String {
        let text = self.prepare(text);
        let text = if self.options.apply_aliases {
            self.substitute_aliases(&text)
        } else {
            text
        };
        if self.options.order_diacritics {
            order_diacritics(&text)
        } else {
            text
        }
    }

    // Steps 1-6
    fn prepare(&self, text: &str) -> String {
        let lowered;
        let text = if self.options.lowercase {
            lowered = text.to_lowercase();
            lowered.as_str()
        } else {
            text
        };
        let mut text: String = if self.options.decompose {
            text.nfd().collect()
        } else {
            text.to_string()
        };
        if self.options.canonicalize_length {
            text = canonicalize_length(&text);
        }
        if self.options.stress_marks {
            text = ascii_stress_marks(&text);
        }
        if self.options.strip_tones {
            text = strip_tones(&text);
        }
        text.trim().to_string()
    }

    fn substitute_aliases(&self, text: &str) -> String {
        if self.aliases.is_empty() {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        'scan: while let Some(c) = rest.chars().next() {
            for (alias, target) in &self.aliases {
                if let Some(tail) = rest.strip_prefix(alias.as_str()) {
                    out.push_str(target);
                    rest = tail;
                    continue 'scan;
                }
            }
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
        out
    }

    fn sort_aliases(&mut self) {
        self.aliases.sort_by(|(a, _), (b, _)| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| a.cmp(b))
        });
    }
}

/// Normalize with the built-in alias table
pub fn normalize(text: &str, options: &NormalizeOptions) -> String {
    Normalizer::new(*options).normalize(text)
}

/// `::` → `ːː`, `:` → `ː`, tie bar variants → U+0361
pub fn canonicalize_length(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ':' => 'ː',
            '\u{035C}' | '\u{203F}' => '\u{0361}',
            other => other,
        })
        .collect()
}

/// `'` and `"` → `ˈ`, `,` → `ˌ`
pub fn ascii_stress_marks(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\'' | '"' => '\u{02C8}',
            ',' => '\u{02CC}',
            other => other,
        })
        .collect()
}

pub fn strip_tones(text: &str) -> String {
    text.chars()
        .filter(|c| !TONE_MARKS.contains(c) && !TONE_LETTERS.contains(c))
        .collect()
}

/// Stable-sort each run of combining marks by table position, then by
/// canonical combining class
pub fn order_diacritics(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut marks: Vec<char> = Vec::new();
    for c in text.chars() {
        if is_combining_mark(c) {
            marks.push(c);
        } else {
            flush_marks(&mut out, &mut marks);
            out.push(c);
        }
    }
    flush_marks(&mut out, &mut marks);
    out
}

fn flush_marks(out: &mut String, marks: &mut Vec<char>) {
    if marks.len() > 1 {
        marks.sort_by_key(|&m| (diacritic_rank(m), canonical_combining_class(m)));
    }
    out.extend(marks.drain(..));
}

fn diacritic_rank(mark: char) -> usize {
    DIACRITIC_ORDER
        .iter()
        .position(|&m| m == mark)
        .unwrap_or(DIACRITIC_ORDER.len())
}

pub fn is_tone_char(c: char) -> bool {
    TONE_MARKS.contains(&c) || TONE_LETTERS.contains(&c)
}

pub fn has_tone(symbol: &str) -> bool {
    symbol.nfd().any(is_tone_char)
}

pub fn has_diacritic(symbol: &str) -> bool {
    symbol.nfd().any(is_combining_mark)
}

pub fn is_click(symbol: &str) -> bool {
    symbol.chars().any(|c| CLICKS.contains(&c))
}

/// True when every character is an IPA letter, modifier, combining mark,
/// or one of the transcription delimiters (space, brackets, slash, period)
pub fn is_valid_ipa(text: &str) -> bool {
    text.nfd().all(|c| {
        matches!(c,
            'a'..='z'
            | '\u{0250}'..='\u{02AF}'
            | '\u{1D00}'..='\u{1DBF}'
            | '\u{02B0}'..='\u{02FF}'
            | '\u{A700}'..='\u{A71F}'
            | ' ' | '[' | ']' | '/' | '.')
            || EXTRA_LETTERS.contains(&c)
            || is_combining_mark(c)
    })
}
