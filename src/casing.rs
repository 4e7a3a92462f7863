use std::fmt;

/// Key convention a payload is normalized into.
///
/// Backend payloads use `PascalCase` keys and frontend payloads use
/// `camelCase`. For every field name the two differ only in the case of the
/// first character, so that is the only character ever touched.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash, clap::ValueEnum)]
pub enum KeyCase {
    /// `TotalChildren` -> `totalChildren`
    #[default]
    Camel,
    /// `totalChildren` -> `TotalChildren`
    Pascal,
}

impl fmt::Display for KeyCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCase::Camel => f.write_str("camel"),
            KeyCase::Pascal => f.write_str("pascal"),
        }
    }
}

// Re-case the first character of a key, copy the rest verbatim
pub fn recase_key(key: &str, case: KeyCase) -> String {
    let mut chars = key.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut recased = String::with_capacity(key.len());
    match case {
        KeyCase::Camel => recased.extend(first.to_lowercase()),
        KeyCase::Pascal => recased.extend(first.to_uppercase()),
    }
    recased.push_str(chars.as_str());
    recased
}
