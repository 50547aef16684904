//! File-backed card gallery.
//!
//! Each card is a pair of files in the gallery directory: `<id>.png` with
//! the rendered image and `<id>.json` with its metadata. Ids are UUIDs, so a
//! valid id can never escape the directory.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    greeting::CardStyle,
};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Metadata of a saved card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: Uuid,
    #[serde(default)]
    pub person_ids: Vec<String>,
    #[serde(default)]
    pub person_names: Vec<String>,
    #[serde(default)]
    pub style: CardStyle,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub greeting: Option<String>,
    /// URL path the image is served from.
    pub image_path: String,
    pub created_at: DateTime<Utc>,
}

/// A card submitted for saving.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCard {
    pub id: Option<String>,
    #[serde(default)]
    pub person_ids: Vec<String>,
    #[serde(default)]
    pub person_names: Vec<String>,
    #[serde(default)]
    pub style: CardStyle,
    pub prompt: Option<String>,
    pub greeting: Option<String>,
    /// PNG as a `data:image/png;base64,...` URL or bare base64.
    pub image_data: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Gallery {
    dir: PathBuf,
}

impl Gallery {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| Error::DataDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, card: NewCard) -> Result<Card> {
        let id = card
            .id
            .as_deref()
            .ok_or_else(|| {
                Error::InvalidRequest(
                    "card id and image data are required".to_string(),
                )
            })
            .and_then(parse_card_id)?;
        let image_data = card.image_data.as_deref().ok_or_else(|| {
            Error::InvalidRequest(
                "card id and image data are required".to_string(),
            )
        })?;
        let image = decode_image_data(image_data)?;

        let stored = Card {
            id,
            person_ids: card.person_ids,
            person_names: card.person_names,
            style: card.style,
            prompt: card.prompt,
            greeting: card.greeting,
            image_path: format!("/gallery/{id}.png"),
            created_at: Utc::now(),
        };

        let metadata = serde_json::to_string_pretty(&stored)?;
        self.write_card_files(id, &image, &metadata)?;

        tracing::info!(%id, bytes = image.len(), "saved card");
        Ok(stored)
    }

    /// All readable cards, newest first.
    pub fn list(&self) -> Result<Vec<Card>> {
        let mut cards = Vec::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_card(&path) {
                Ok(card) => cards.push(card),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "skipping unreadable card metadata"
                    );
                }
            }
        }

        cards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(cards)
    }

    pub fn get(&self, id: &str) -> Result<Card> {
        let id = parse_card_id(id)?;
        match read_card(&self.metadata_path(id)) {
            Err(Error::Io(e)) if e.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound {
                    kind: "card",
                    name: id.to_string(),
                })
            }
            other => other,
        }
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let id = parse_card_id(id)?;
        let removed_image = remove_if_exists(&self.image_path(id))?;
        let removed_meta = remove_if_exists(&self.metadata_path(id))?;

        if !removed_image && !removed_meta {
            return Err(Error::NotFound {
                kind: "card",
                name: id.to_string(),
            });
        }

        tracing::info!(%id, "deleted card");
        Ok(())
    }

    /// Resolve a served file name (`<id>.png`) to its path on disk.
    pub fn image_file(&self, file_name: &str) -> Result<PathBuf> {
        let not_found = || Error::NotFound {
            kind: "image",
            name: file_name.to_string(),
        };
        let id = file_name
            .strip_suffix(".png")
            .and_then(|stem| Uuid::parse_str(stem).ok())
            .ok_or_else(not_found)?;

        let path = self.image_path(id);
        if path.is_file() { Ok(path) } else { Err(not_found()) }
    }

    /// Stage both files as `.tmp` and rename them into place. Files written
    /// by a failed save are removed.
    fn write_card_files(
        &self,
        id: Uuid,
        image: &[u8],
        metadata: &str,
    ) -> Result<()> {
        let image_path = self.image_path(id);
        let metadata_path = self.metadata_path(id);
        let image_tmp = image_path.with_extension("png.tmp");
        let metadata_tmp = metadata_path.with_extension("json.tmp");

        let staged = std::fs::write(&image_tmp, image)
            .and_then(|()| std::fs::write(&metadata_tmp, metadata))
            .and_then(|()| std::fs::rename(&image_tmp, &image_path));
        if let Err(e) = staged {
            discard(id, &[image_tmp.as_path(), metadata_tmp.as_path()]);
            return Err(e.into());
        }
        if let Err(e) = std::fs::rename(&metadata_tmp, &metadata_path) {
            discard(id, &[metadata_tmp.as_path(), image_path.as_path()]);
            return Err(e.into());
        }
        Ok(())
    }

    fn image_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.png"))
    }

    fn metadata_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

fn parse_card_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id.trim())
        .map_err(|_| Error::InvalidRequest(format!("invalid card id '{id}'")))
}

fn read_card(path: &Path) -> Result<Card> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn discard(id: Uuid, paths: &[&Path]) {
    tracing::warn!(%id, "discarding partly saved card");
    for path in paths {
        if let Err(e) = remove_if_exists(path) {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to clean up card file"
            );
        }
    }
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Decode a PNG from a base64 data URL (or bare base64).
pub fn decode_image_data(data: &str) -> Result<Vec<u8>> {
    let payload = match data.trim().strip_prefix("data:") {
        Some(rest) => {
            let (media, payload) = rest.split_once(',').ok_or_else(|| {
                Error::Image("data URL has no payload".to_string())
            })?;
            if !media.starts_with("image/") || !media.ends_with(";base64") {
                return Err(Error::Image(format!(
                    "expected a base64 image data URL, got '{media}'"
                )));
            }
            payload
        }
        None => data.trim(),
    };

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| Error::Image(format!("invalid base64: {e}")))?;
    if !bytes.starts_with(PNG_SIGNATURE) {
        return Err(Error::Image("image is not a PNG".to_string()));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes() -> Vec<u8> {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(b"rest of the image");
        bytes
    }

    fn data_url() -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(png_bytes()))
    }

    fn new_card(id: Uuid) -> NewCard {
        NewCard {
            id: Some(id.to_string()),
            person_ids: vec!["ada".to_string()],
            person_names: vec!["Ada".to_string()],
            style: CardStyle::Elegant,
            prompt: Some("prompt".to_string()),
            greeting: Some("Season's greetings".to_string()),
            image_data: Some(data_url()),
        }
    }

    fn gallery() -> (tempfile::TempDir, Gallery) {
        let tmp = tempfile::tempdir().unwrap();
        let gallery = Gallery::open(tmp.path().join("gallery")).unwrap();
        (tmp, gallery)
    }

    #[test]
    fn save_writes_image_and_metadata() {
        let (_tmp, gallery) = gallery();
        let id = Uuid::new_v4();

        let card = gallery.save(new_card(id)).unwrap();
        assert_eq!(card.id, id);
        assert_eq!(card.image_path, format!("/gallery/{id}.png"));
        assert_eq!(card.style, CardStyle::Elegant);

        let image = std::fs::read(gallery.dir().join(format!("{id}.png")))
            .unwrap();
        assert_eq!(image, png_bytes());

        let loaded = gallery.get(&id.to_string()).unwrap();
        assert_eq!(loaded, card);
    }

    #[test]
    fn failed_metadata_write_leaves_no_image() {
        let (_tmp, gallery) = gallery();
        let id = Uuid::new_v4();
        std::fs::create_dir(gallery.dir().join(format!("{id}.json.tmp")))
            .unwrap();

        assert!(matches!(gallery.save(new_card(id)), Err(Error::Io(_))));
        assert!(!gallery.dir().join(format!("{id}.png")).exists());
        assert!(!gallery.dir().join(format!("{id}.png.tmp")).exists());
        assert!(gallery.list().unwrap().is_empty());
    }

    #[test]
    fn open_reports_why_the_directory_failed() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("gallery");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = Gallery::open(blocker.join("cards")).unwrap_err();
        match err {
            Error::DataDir { path, source } => {
                assert_eq!(path, blocker.join("cards"));
                assert!(!source.to_string().is_empty());
            }
            other => panic!("expected DataDir error, got {other:?}"),
        }
    }

    #[test]
    fn save_requires_id_and_image() {
        let (_tmp, gallery) = gallery();

        let mut missing_image = new_card(Uuid::new_v4());
        missing_image.image_data = None;
        assert!(matches!(
            gallery.save(missing_image),
            Err(Error::InvalidRequest(_))
        ));

        let mut missing_id = new_card(Uuid::new_v4());
        missing_id.id = None;
        assert!(matches!(
            gallery.save(missing_id),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn save_rejects_path_like_ids() {
        let (_tmp, gallery) = gallery();
        let mut card = new_card(Uuid::new_v4());
        card.id = Some("../escape".to_string());

        assert!(matches!(gallery.save(card), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn list_is_newest_first_and_skips_garbage() {
        let (_tmp, gallery) = gallery();
        let first = gallery.save(new_card(Uuid::new_v4())).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = gallery.save(new_card(Uuid::new_v4())).unwrap();
        std::fs::write(gallery.dir().join("broken.json"), "{").unwrap();
        std::fs::write(gallery.dir().join("notes.txt"), "ignored").unwrap();

        let cards = gallery.list().unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].id, second.id);
        assert_eq!(cards[1].id, first.id);
    }

    #[test]
    fn delete_removes_both_files() {
        let (_tmp, gallery) = gallery();
        let id = Uuid::new_v4();
        gallery.save(new_card(id)).unwrap();

        gallery.delete(&id.to_string()).unwrap();
        assert!(gallery.list().unwrap().is_empty());
        assert!(!gallery.dir().join(format!("{id}.png")).exists());

        assert!(matches!(
            gallery.delete(&id.to_string()),
            Err(Error::NotFound { kind: "card", .. })
        ));
    }

    #[test]
    fn get_missing_card_is_not_found() {
        let (_tmp, gallery) = gallery();
        let err = gallery.get(&Uuid::new_v4().to_string()).unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "card", .. }));
    }

    #[test]
    fn image_file_only_resolves_saved_pngs() {
        let (_tmp, gallery) = gallery();
        let id = Uuid::new_v4();
        gallery.save(new_card(id)).unwrap();

        let path = gallery.image_file(&format!("{id}.png")).unwrap();
        assert!(path.is_file());

        assert!(gallery.image_file(&format!("{id}.json")).is_err());
        assert!(gallery.image_file("../config.redb").is_err());
        assert!(
            gallery
                .image_file(&format!("{}.png", Uuid::new_v4()))
                .is_err()
        );
    }

    #[test]
    fn decode_accepts_bare_base64() {
        let bare = STANDARD.encode(png_bytes());
        assert_eq!(decode_image_data(&bare).unwrap(), png_bytes());
    }

    #[test]
    fn decode_rejects_non_png_and_bad_urls() {
        let jpeg =
            format!("data:image/png;base64,{}", STANDARD.encode(b"JFIF"));
        assert!(matches!(decode_image_data(&jpeg), Err(Error::Image(_))));

        assert!(matches!(
            decode_image_data("data:text/plain;base64,AAAA"),
            Err(Error::Image(_))
        ));
        assert!(matches!(
            decode_image_data("data:image/png;base64"),
            Err(Error::Image(_))
        ));
        assert!(matches!(
            decode_image_data("not base64 at all!"),
            Err(Error::Image(_))
        ));
    }
}
