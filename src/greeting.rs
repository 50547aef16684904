//! Card styles, generation prompts and the fallback greeting table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    store::{Person, PersonStore},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum CardStyle {
    #[default]
    Traditional,
    Modern,
    Funny,
    Elegant,
    Tropical,
}

/// Prompt ingredients and colors for one style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleTheme {
    pub theme: &'static str,
    pub colors: &'static str,
    pub elements: &'static str,
    /// Top and bottom of the card background gradient.
    pub gradient: [&'static str; 2],
    pub accent: &'static str,
}

impl CardStyle {
    pub const ALL: [CardStyle; 5] = [
        CardStyle::Traditional,
        CardStyle::Modern,
        CardStyle::Funny,
        CardStyle::Elegant,
        CardStyle::Tropical,
    ];

    /// Parse a style name; anything unknown is `Traditional`.
    pub fn from_name(name: &str) -> Self {
        CardStyle::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(name.trim()))
            .unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CardStyle::Traditional => "traditional",
            CardStyle::Modern => "modern",
            CardStyle::Funny => "funny",
            CardStyle::Elegant => "elegant",
            CardStyle::Tropical => "tropical",
        }
    }

    pub fn theme(self) -> StyleTheme {
        match self {
            CardStyle::Traditional => StyleTheme {
                theme: "traditional Christmas with snow, holly, and warm fireplace",
                colors: "red, green, gold, and white",
                elements: "Christmas tree, presents, stockings, and mistletoe",
                gradient: ["#1a472a", "#2d5a3a"],
                accent: "#c41e3a",
            },
            CardStyle::Modern => StyleTheme {
                theme: "modern minimalist Christmas with clean lines",
                colors: "silver, white, and ice blue",
                elements: "geometric ornaments, simple pine branches, and elegant candles",
                gradient: ["#1a1a2e", "#16213e"],
                accent: "#e8e8e8",
            },
            CardStyle::Funny => StyleTheme {
                theme: "humorous Christmas scene with comedic elements",
                colors: "bright festive colors",
                elements: "silly elves, dancing reindeer, and comical Santa situations",
                gradient: ["#ff6b6b", "#feca57"],
                accent: "#ffffff",
            },
            CardStyle::Elegant => StyleTheme {
                theme: "sophisticated Victorian Christmas",
                colors: "burgundy, gold, and cream",
                elements: "ornate decorations, vintage ornaments, and classical elegance",
                gradient: ["#2c1810", "#4a2c2a"],
                accent: "#d4af37",
            },
            CardStyle::Tropical => StyleTheme {
                theme: "tropical Christmas beach celebration",
                colors: "turquoise, coral, and sandy gold",
                elements: "palm trees with lights, beach Santa, and tropical flowers",
                gradient: ["#00b4d8", "#48cae4"],
                accent: "#ff9f1c",
            },
        }
    }
}

impl From<String> for CardStyle {
    fn from(name: String) -> Self {
        CardStyle::from_name(&name)
    }
}

impl std::fmt::Display for CardStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Join names as `A`, `A and B`, `A, B and C`.
pub fn join_names<S: AsRef<str>>(names: &[S]) -> String {
    match names {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [init @ .., last] => {
            let head = init
                .iter()
                .map(AsRef::as_ref)
                .collect::<Vec<_>>()
                .join(", ");
            format!("{head} and {}", last.as_ref())
        }
    }
}

/// Prompt for an image generator describing the whole card.
pub fn card_prompt<S: AsRef<str>>(names: &[S], style: CardStyle) -> String {
    let theme = style.theme();
    format!(
        "Create a beautiful Christmas card featuring {}.\n\
         Style: {}\n\
         Color palette: {}\n\
         Include: {}\n\
         The card should have a warm, festive atmosphere with space for a personalized greeting.\n\
         Make it cheerful and celebratory for the holiday season.",
        join_names(names),
        theme.theme,
        theme.colors,
        theme.elements
    )
}

/// Prompt for a text model writing the greeting line.
pub fn greeting_prompt<S: AsRef<str>>(names: &[S], style: CardStyle) -> String {
    format!(
        "Write a short, festive Christmas greeting for a card featuring {}.\n\
         Style: {style}. Make it fun and personalized to who they are.",
        join_names(names)
    )
}

/// Deterministic greeting used when no text model is available.
pub fn fallback_greeting<S: AsRef<str>>(
    names: &[S],
    style: CardStyle,
) -> String {
    let who = join_names(names);
    match style {
        CardStyle::Traditional => format!(
            "Wishing {who} a magical Christmas filled with joy and wonder! May your holidays be merry and bright! \u{1F384}"
        ),
        CardStyle::Modern => format!(
            "Season's greetings from {who}! Here's to a stylish and sophisticated holiday season! \u{2744}\u{FE0F}"
        ),
        CardStyle::Funny => format!(
            "{who} says: \"Who needs a chimney when you've got style!\" Have a hilarious holiday! \u{1F923}"
        ),
        CardStyle::Elegant => format!(
            "With warmest wishes, {who} extends the most refined holiday greetings to you and yours. \u{2728}"
        ),
        CardStyle::Tropical => format!(
            "Aloha from {who}! Wishing you a warm and sunny Christmas wherever you are! \u{1F334}"
        ),
    }
}

/// A card being composed, before it is saved to the gallery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDraft {
    pub id: Uuid,
    pub person_ids: Vec<String>,
    pub person_names: Vec<String>,
    pub style: CardStyle,
    pub prompt: String,
    pub greeting_prompt: String,
    pub greeting: String,
    pub theme: StyleTheme,
    pub created_at: DateTime<Utc>,
}

impl CardDraft {
    pub fn new(persons: &[&Person], style: CardStyle) -> Self {
        let person_names: Vec<String> =
            persons.iter().map(|p| p.name.clone()).collect();
        Self {
            id: Uuid::new_v4(),
            person_ids: persons.iter().map(|p| p.id.clone()).collect(),
            prompt: card_prompt(&person_names, style),
            greeting_prompt: greeting_prompt(&person_names, style),
            greeting: fallback_greeting(&person_names, style),
            theme: style.theme(),
            person_names,
            style,
            created_at: Utc::now(),
        }
    }
}

/// Look up the persons for a card, keeping request order and dropping
/// repeated ids. Unlike page matching, an unknown id is an error.
pub fn resolve_persons<'a, S: AsRef<str>>(
    store: &'a PersonStore,
    person_ids: &[S],
) -> Result<Vec<&'a Person>> {
    if person_ids.is_empty() {
        return Err(Error::InvalidRequest("personIds required".to_string()));
    }

    let mut persons: Vec<&Person> = Vec::with_capacity(person_ids.len());
    for id in person_ids {
        let id = id.as_ref();
        let person = store.get_person(id).ok_or_else(|| Error::NotFound {
            kind: "person",
            name: id.to_string(),
        })?;
        if !persons.iter().any(|p| p.id == person.id) {
            persons.push(person);
        }
    }
    Ok(persons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;

    #[test]
    fn unknown_style_falls_back_to_traditional() {
        assert_eq!(CardStyle::from_name("tropical"), CardStyle::Tropical);
        assert_eq!(CardStyle::from_name(" Elegant "), CardStyle::Elegant);
        assert_eq!(CardStyle::from_name("gothic"), CardStyle::Traditional);
        assert_eq!(CardStyle::from_name(""), CardStyle::Traditional);
    }

    #[test]
    fn style_serde_is_lenient_lowercase() {
        let style: CardStyle = serde_json::from_str("\"funny\"").unwrap();
        assert_eq!(style, CardStyle::Funny);
        let style: CardStyle = serde_json::from_str("\"unknown\"").unwrap();
        assert_eq!(style, CardStyle::Traditional);
        assert_eq!(
            serde_json::to_string(&CardStyle::Modern).unwrap(),
            "\"modern\""
        );
    }

    #[test]
    fn join_names_reads_naturally() {
        let none: [&str; 0] = [];
        assert_eq!(join_names(&none), "");
        assert_eq!(join_names(&["Ada"]), "Ada");
        assert_eq!(join_names(&["Ada", "Alan"]), "Ada and Alan");
        assert_eq!(
            join_names(&["Ada", "Alan", "Grace"]),
            "Ada, Alan and Grace"
        );
    }

    #[test]
    fn prompt_mentions_names_and_style() {
        let prompt = card_prompt(&["Ada", "Alan"], CardStyle::Elegant);
        assert!(prompt.starts_with(
            "Create a beautiful Christmas card featuring Ada and Alan."
        ));
        assert!(prompt.contains("Style: sophisticated Victorian Christmas"));
        assert!(prompt.contains("Color palette: burgundy, gold, and cream"));
    }

    #[test]
    fn greeting_prompt_names_style() {
        let prompt = greeting_prompt(&["Ada"], CardStyle::Funny);
        assert!(prompt.contains("featuring Ada"));
        assert!(prompt.contains("Style: funny."));
    }

    #[test]
    fn fallback_greetings_are_deterministic() {
        for style in CardStyle::ALL {
            let a = fallback_greeting(&["Ada"], style);
            let b = fallback_greeting(&["Ada"], style);
            assert_eq!(a, b);
            assert!(a.contains("Ada"));
        }
        assert!(
            fallback_greeting(&["Ada"], CardStyle::Tropical)
                .starts_with("Aloha from Ada!")
        );
    }

    #[test]
    fn draft_collects_people_and_text() {
        let ada = Person {
            id: "ada".to_string(),
            name: "Ada".to_string(),
            category: Category::Science,
            image: None,
            appearances: vec![],
        };
        let alan = Person {
            id: "alan".to_string(),
            name: "Alan".to_string(),
            category: Category::Science,
            image: None,
            appearances: vec![],
        };

        let draft = CardDraft::new(&[&ada, &alan], CardStyle::Modern);
        assert_eq!(draft.person_ids, vec!["ada", "alan"]);
        assert_eq!(draft.person_names, vec!["Ada", "Alan"]);
        assert_eq!(draft.style, CardStyle::Modern);
        assert_eq!(draft.theme.accent, "#e8e8e8");
        assert!(
            draft
                .greeting
                .starts_with("Season's greetings from Ada and Alan!")
        );
        assert_eq!(draft.id.get_version_num(), 4);

        let other = CardDraft::new(&[&ada], CardStyle::Modern);
        assert_ne!(draft.id, other.id);
    }

    #[test]
    fn resolve_persons_dedupes_and_rejects_unknown() {
        let person = |id: &str| Person {
            id: id.to_string(),
            name: id.to_uppercase(),
            category: Category::Other,
            image: None,
            appearances: vec![],
        };
        let store = PersonStore::from_persons(vec![person("a"), person("b")]);

        let found = resolve_persons(&store, &["b", "a", "b"]).unwrap();
        let ids: Vec<_> = found.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        assert!(matches!(
            resolve_persons(&store, &["a", "ghost"]),
            Err(Error::NotFound { kind: "person", .. })
        ));
        let none: [&str; 0] = [];
        assert!(matches!(
            resolve_persons(&store, &none),
            Err(Error::InvalidRequest(_))
        ));
    }
}
