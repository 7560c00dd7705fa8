//! Note building
//!
//! Turns a vault `Document` into a validated `Note` ready for Anki, and turns
//! a `Note` back into document text.
//!
//! ## Field mapping
//!
//! A note type with fields `[Front, Back]` is filled positionally:
//!
//! - `Front`: the document title (`[[title]]` when linkify is on), prefixed by
//!   the optional `header` frontmatter value
//! - `Back`: the rest of the body, with media embeds rewritten for Anki
//!
//! Any other field count is rejected.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::anki::AnkiNote;
use crate::models::{NoteDigest, NoteTypeDigest, Settings};
use crate::state::DigestStore;
use crate::vault::{Document, Embed, FRONTMATTER_MARKER};

/// Deck used for documents at the vault root
pub const DEFAULT_DECK: &str = "Obsidian";

/// Tag added to every note managed by ankisync
pub const SYNC_TAG: &str = "obsidian-sync";

/// Anki's deck hierarchy separator
pub const DECK_SEPARATOR: &str = "::";

const PICTURE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "svg"];
const SOUND_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "m4a", "ogg", "3gp", "flac", "mp4", "ogv", "mov", "mkv", "webm",
];

/// Frontmatter keys every managed document must declare
const REQUIRED_KEYS: [&str; 3] = ["mid", "nid", "tags"];

static WIKILINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!?\[\[(.+?)\]\]").expect("valid regex"));

/// Why a document can't become a note
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NoteError {
    #[error("Invalid frontmatter in {document}: missing {missing}")]
    MissingFrontmatter { document: String, missing: String },

    #[error("Invalid frontmatter in {document}: '{key}' {details}")]
    InvalidFrontmatter {
        document: String,
        key: &'static str,
        details: String,
    },

    #[error("Invalid note type in {document}: unknown note type id {mid}")]
    UnknownNoteType { document: String, mid: i64 },

    #[error(
        "Invalid fields in {document}: note type '{note_type}' has {expected} fields, document provides {found}"
    )]
    FieldCountMismatch {
        document: String,
        note_type: String,
        expected: usize,
        found: usize,
    },

    #[error("Cannot render frontmatter for {document}: {source}")]
    Serialize {
        document: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// One media embed rewritten for Anki
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaNameMap {
    /// Markup as written in the document
    pub original: String,
    /// Replacement used in the note field
    pub rewritten: String,
}

/// A note as it should exist in Anki
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub basename: String,
    pub deck: String,
    /// Note type id (`mid`)
    pub mid: i64,
    pub type_name: String,
    /// Anki note id (`nid`), 0 until created
    pub nid: i64,
    /// User tags followed by `SYNC_TAG`
    pub tags: Vec<String>,
    /// Field name → content, in note type order
    pub fields: Vec<(String, String)>,
    pub hash: String,
    /// Frontmatter keys other than mid/nid/tags, in document order
    pub extras: Mapping,
    /// Body lines of the source document
    pub body: Vec<String>,
}

impl Note {
    pub fn digest(&self) -> NoteDigest {
        NoteDigest {
            deck: self.deck.clone(),
            hash: self.hash.clone(),
        }
    }

    pub fn title(&self) -> &str {
        &self.basename
    }

    /// Tags as written in the document (without `SYNC_TAG`)
    pub fn user_tags(&self) -> Vec<String> {
        self.tags
            .iter()
            .filter(|t| t.as_str() != SYNC_TAG)
            .cloned()
            .collect()
    }

    /// Field values with wikilinks rewritten to `obsidian://` links
    pub fn format_fields(&self, vault_name: &str) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|(name, value)| (name.clone(), convert_wikilinks(value, vault_name)))
            .collect()
    }

    pub fn to_anki_note(&self, vault_name: &str) -> AnkiNote {
        AnkiNote {
            deck_name: self.deck.clone(),
            model_name: self.type_name.clone(),
            fields: self.format_fields(vault_name),
            tags: self.tags.clone(),
        }
    }
}

/// Builds notes from documents
#[derive(Debug, Clone, Default)]
pub struct NoteBuilder {
    linkify: bool,
}

impl NoteBuilder {
    pub fn new(settings: &Settings) -> Self {
        Self {
            linkify: settings.linkify,
        }
    }

    pub fn with_linkify(linkify: bool) -> Self {
        Self { linkify }
    }

    /// Anki deck for a vault folder: `a/b` → `a::b`, root → `DEFAULT_DECK`
    pub fn deck_name(folder: &str) -> String {
        if folder.is_empty() {
            DEFAULT_DECK.to_string()
        } else {
            folder.replace('/', DECK_SEPARATOR)
        }
    }

    /// Content hash over (deck, basename, raw content)
    ///
    /// Each part is length-prefixed so boundaries can't shift between parts.
    pub fn hash(deck: &str, basename: &str, content: &str) -> String {
        let mut hasher = Sha256::new();
        for part in [deck, basename, content] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Cheap fingerprint of a document, no parsing beyond its path
    pub fn digest(&self, document: &Document) -> NoteDigest {
        let deck = Self::deck_name(&document.folder);
        let hash = Self::hash(&deck, &document.basename, &document.content);
        NoteDigest { deck, hash }
    }

    /// Build a note and check it against its note type
    pub fn build_and_validate(
        &self,
        document: &Document,
        note_types: &DigestStore<NoteTypeDigest>,
    ) -> Result<(Note, Vec<MediaNameMap>), NoteError> {
        let name = document.basename.clone();
        let empty = Mapping::new();
        let frontmatter = document.frontmatter.as_ref().unwrap_or(&empty);

        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| !frontmatter.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(NoteError::MissingFrontmatter {
                document: name,
                missing: missing.join(", "),
            });
        }

        let mid = int_key(frontmatter, "mid", &name)?;
        let nid = int_key(frontmatter, "nid", &name)?;
        let mut tags = tags_key(frontmatter, &name)?;

        let note_type = note_types
            .get(mid)
            .ok_or_else(|| NoteError::UnknownNoteType {
                document: name.clone(),
                mid,
            })?;

        let header = frontmatter.get("header").and_then(Value::as_str);
        let body = document.body_lines();
        let (fields, media) =
            self.parse_fields(&name, note_type, &body, &document.embeds, header)?;

        if !tags.iter().any(|t| t == SYNC_TAG) {
            tags.push(SYNC_TAG.to_string());
        }

        let extras: Mapping = frontmatter
            .iter()
            .filter(|(k, _)| {
                k.as_str()
                    .map_or(true, |k| !REQUIRED_KEYS.contains(&k))
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let digest = self.digest(document);
        let note = Note {
            basename: name,
            deck: digest.deck,
            mid,
            type_name: note_type.name.clone(),
            nid,
            tags,
            fields,
            hash: digest.hash,
            extras,
            body: body.into_iter().map(str::to_string).collect(),
        };
        Ok((note, media))
    }

    /// Lead field text: title, optionally linkified and headed
    fn lead_field(&self, title: &str, header: Option<&str>) -> String {
        let title = if self.linkify {
            format!("[[{}]]", title)
        } else {
            title.to_string()
        };
        match header {
            Some(header) => format!("{}\n\n{}", header, title),
            None => title,
        }
    }

    /// Map the document onto the note type's fields
    ///
    /// Media matching is positional: only the next expected embed is looked
    /// for, and the pointer only moves on a match.
    fn parse_fields(
        &self,
        title: &str,
        note_type: &NoteTypeDigest,
        body: &[&str],
        embeds: &[Embed],
        header: Option<&str>,
    ) -> Result<(Vec<(String, String)>, Vec<MediaNameMap>), NoteError> {
        let mut contents = vec![self.lead_field(title, header)];
        let mut media: Vec<MediaNameMap> = Vec::new();
        let mut buffer: Vec<String> = Vec::with_capacity(body.len());
        let mut next = 0;

        for line in body {
            let expected = embeds
                .get(next)
                .filter(|embed| line.contains(&embed.original) && is_media(&embed.link));

            match expected {
                Some(embed) => {
                    let rewritten = anki_media_markup(&embed.link);
                    buffer.push(line.replacen(&embed.original, &rewritten, 1));
                    if !media.iter().any(|m| m.original == embed.original) {
                        media.push(MediaNameMap {
                            original: embed.original.clone(),
                            rewritten,
                        });
                    }
                    next += 1;
                }
                None => buffer.push(line.to_string()),
            }
        }
        contents.push(buffer.join("\n"));

        if contents.len() != note_type.field_names.len() {
            return Err(NoteError::FieldCountMismatch {
                document: title.to_string(),
                note_type: note_type.name.clone(),
                expected: note_type.field_names.len(),
                found: contents.len(),
            });
        }

        let fields = note_type
            .field_names
            .iter()
            .cloned()
            .zip(contents)
            .collect();
        Ok((fields, media))
    }

    /// Render a note back to document text: frontmatter, then the body
    pub fn serialize(&self, note: &Note) -> Result<String, NoteError> {
        let mut frontmatter = Mapping::new();
        frontmatter.insert("mid".into(), note.mid.into());
        frontmatter.insert("nid".into(), note.nid.into());
        frontmatter.insert(
            "tags".into(),
            Value::Sequence(note.user_tags().into_iter().map(Value::from).collect()),
        );
        for (key, value) in &note.extras {
            frontmatter.insert(key.clone(), value.clone());
        }

        let yaml = serde_yaml::to_string(&frontmatter).map_err(|source| NoteError::Serialize {
            document: note.title().to_string(),
            source,
        })?;
        let mut lines = vec![
            FRONTMATTER_MARKER.to_string(),
            yaml.trim_end().to_string(),
            FRONTMATTER_MARKER.to_string(),
        ];
        lines.extend(note.body.iter().cloned());
        Ok(lines.join("\n"))
    }

    /// Synthetic note used to write a note type's template document
    ///
    /// Templates are frontmatter only; the user writes one paragraph per
    /// field below it.
    pub fn template_note(&self, mid: i64, note_type: &NoteTypeDigest, folder: &str) -> Note {
        let mut extras = Mapping::new();
        extras.insert("date".into(), "{{date}} {{time}}".into());
        let deck = Self::deck_name(folder);
        let hash = Self::hash(&deck, &note_type.name, "");

        Note {
            basename: note_type.name.clone(),
            deck,
            mid,
            type_name: note_type.name.clone(),
            nid: 0,
            tags: Vec::new(),
            fields: Vec::new(),
            hash,
            extras,
            body: Vec::new(),
        }
    }
}

fn int_key(frontmatter: &Mapping, key: &'static str, document: &str) -> Result<i64, NoteError> {
    frontmatter
        .get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| NoteError::InvalidFrontmatter {
            document: document.to_string(),
            key,
            details: "must be an integer".to_string(),
        })
}

fn tags_key(frontmatter: &Mapping, document: &str) -> Result<Vec<String>, NoteError> {
    let invalid = || NoteError::InvalidFrontmatter {
        document: document.to_string(),
        key: "tags",
        details: "must be a list of strings".to_string(),
    };

    match frontmatter.get("tags") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(tag)) => Ok(vec![tag.clone()]),
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                _ => Err(invalid()),
            })
            .collect(),
        Some(_) => Err(invalid()),
    }
}

fn extension(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Whether a link points at a picture Anki can show
pub fn is_picture(name: &str) -> bool {
    PICTURE_EXTENSIONS.contains(&extension(name).as_str())
}

/// Whether a link points at media Anki can show or play
pub fn is_media(name: &str) -> bool {
    let ext = extension(name);
    PICTURE_EXTENSIONS.contains(&ext.as_str()) || SOUND_EXTENSIONS.contains(&ext.as_str())
}

/// File name component of a link
pub fn media_file_name(link: &str) -> &str {
    link.rsplit('/').next().unwrap_or(link)
}

/// `<img src="name">` for pictures, `[sound:name]` for audio and video
fn anki_media_markup(link: &str) -> String {
    let name = media_file_name(link);
    if is_picture(name) {
        format!("<img src=\"{}\">", name)
    } else {
        format!("[sound:{}]", name)
    }
}

/// Rewrite `[[target|alias]]` / `![[target]]` into `obsidian://` links
pub fn convert_wikilinks(markup: &str, vault_name: &str) -> String {
    WIKILINK_RE
        .replace_all(markup, |caps: &Captures| {
            let inner = &caps[1];
            let (target, title) = match inner.split_once('|') {
                Some((target, alias)) => (target, alias),
                None => (inner, inner),
            };
            format!(
                "[{}](obsidian://open?vault={}&file={})",
                title,
                urlencoding::encode(vault_name),
                urlencoding::encode(target)
            )
        })
        .into_owned()
}
