use serde::{Deserialize, Serialize};

/// A stable person identifier derived from the display name.
///
/// The id is the lowercased name with every run of characters outside
/// `[a-z0-9]` collapsed into a single `-`, trimmed of leading and trailing
/// dashes.
///
/// # Examples
///
/// ```
/// use pagecard::PersonId;
///
/// assert_eq!(PersonId::from_name("Ada  Lovelace").as_str(), "ada-lovelace");
/// assert_eq!(PersonId::from_name("J.R.R. Tolkien").as_str(), "j-r-r-tolkien");
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PersonId(String);

impl PersonId {
    pub fn from_name(name: &str) -> Self {
        let mut slug = String::with_capacity(name.len());
        let mut pending_dash = false;

        for c in name.to_lowercase().chars() {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(c);
            } else {
                pending_dash = true;
            }
        }

        Self(slug)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PersonId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PersonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = PersonId::from_name("Grace Hopper");
        let b = PersonId::from_name("Grace Hopper");
        assert_eq!(a, b);
    }

    #[test]
    fn case_is_folded() {
        assert_eq!(
            PersonId::from_name("GRACE HOPPER"),
            PersonId::from_name("grace hopper")
        );
    }

    #[test]
    fn punctuation_runs_collapse() {
        let id = PersonId::from_name("Jean-Luc -- Picard");
        assert_eq!(id.as_str(), "jean-luc-picard");
    }

    #[test]
    fn edges_are_trimmed() {
        let id = PersonId::from_name("  (Prince) ");
        assert_eq!(id.as_str(), "prince");
    }

    #[test]
    fn non_ascii_letters_become_separators() {
        let id = PersonId::from_name("Andrés Pastrana");
        assert_eq!(id.as_str(), "andr-s-pastrana");
    }

    #[test]
    fn digits_are_kept() {
        let id = PersonId::from_name("Agent 007");
        assert_eq!(id.as_str(), "agent-007");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = PersonId::from_name("Ada Lovelace");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"ada-lovelace\"");
    }
}
