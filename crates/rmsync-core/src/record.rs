//! Device metadata records (`<id>.metadata`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::SyncError;
use crate::node::{ItemId, NodeKind, Timestamps};

/// Record `type` of a directory.
pub const COLLECTION_TYPE: &str = "CollectionType";
/// Record `type` of a document.
pub const DOCUMENT_TYPE: &str = "DocumentType";

/// Per-item attributes stored by the device.
///
/// Unknown fields are kept in `extra` so a record can be rewritten without
/// dropping anything the device put there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Name shown on the device.
    #[serde(rename = "visibleName")]
    pub visible_name: String,

    /// Parent identifier (`""` = root, `"trash"` = trash).
    pub parent: String,

    /// Raw record type, see [`ItemRecord::kind`].
    #[serde(rename = "type")]
    pub item_type: String,

    /// Last modification, milliseconds since the epoch.
    #[serde(
        rename = "lastModified",
        default,
        serialize_with = "serialize_millis",
        deserialize_with = "deserialize_millis"
    )]
    pub last_modified: i64,

    /// Last time the item was opened, milliseconds since the epoch.
    #[serde(
        rename = "lastOpened",
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_opt_millis",
        deserialize_with = "deserialize_opt_millis"
    )]
    pub last_opened: Option<i64>,

    /// Deletion flag.
    #[serde(default)]
    pub deleted: bool,

    /// Every other field, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemRecord {
    /// Minimal record for an item created on the mirror.
    pub fn new(
        visible_name: impl Into<String>,
        parent: &ItemId,
        kind: NodeKind,
        timestamps: Timestamps,
    ) -> Self {
        let mut extra = Map::new();
        extra.insert("modified".into(), Value::Bool(false));
        extra.insert("metadatamodified".into(), Value::Bool(false));
        extra.insert("pinned".into(), Value::Bool(false));
        extra.insert("version".into(), Value::from(0));

        let (item_type, last_opened) = match kind {
            NodeKind::Directory => (COLLECTION_TYPE, None),
            NodeKind::Document => (DOCUMENT_TYPE, Some(timestamps.accessed * 1000)),
        };

        Self {
            visible_name: visible_name.into(),
            parent: parent.as_str().to_string(),
            item_type: item_type.to_string(),
            last_modified: timestamps.modified * 1000,
            last_opened,
            deleted: false,
            extra,
        }
    }

    /// Parse a record from its JSON text.
    pub fn from_json(id: &ItemId, text: &str) -> Result<Self, SyncError> {
        serde_json::from_str(text).map_err(|e| SyncError::CorruptMetadata {
            id: id.clone(),
            message: e.to_string(),
        })
    }

    /// Serialize the record as a single JSON line.
    pub fn to_json(&self) -> Result<String, SyncError> {
        serde_json::to_string(self)
            .map(|mut json| {
                json.push('\n');
                json
            })
            .map_err(|e| SyncError::Other {
                message: format!("Failed to serialize metadata: {e}"),
            })
    }

    /// Directory or document, or a consistency error for anything else.
    pub fn kind(&self, id: &ItemId) -> Result<NodeKind, SyncError> {
        match self.item_type.as_str() {
            COLLECTION_TYPE => Ok(NodeKind::Directory),
            DOCUMENT_TYPE => Ok(NodeKind::Document),
            other => Err(SyncError::NotExclusiveKind {
                id: id.clone(),
                item_type: other.to_string(),
            }),
        }
    }

    /// Parent identifier.
    pub fn parent_id(&self) -> ItemId {
        ItemId::new(self.parent.as_str())
    }

    /// Whether this record is itself marked as trashed.
    pub fn is_trashed(&self) -> bool {
        self.deleted || self.parent == ItemId::TRASH
    }

    /// Timestamps in seconds.
    pub fn timestamps(&self) -> Timestamps {
        Timestamps::new(
            self.last_modified / 1000,
            self.last_opened.unwrap_or(0) / 1000,
            None,
        )
    }

    /// Set the modification time from seconds.
    pub fn touch(&mut self, modified_secs: i64) {
        self.last_modified = modified_secs * 1000;
    }
}

/// Millisecond timestamps appear both as strings and as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Millis {
    Text(String),
    Number(i64),
}

impl Millis {
    fn into_i64<E: serde::de::Error>(self) -> Result<i64, E> {
        match self {
            Millis::Number(n) => Ok(n),
            Millis::Text(s) if s.trim().is_empty() => Ok(0),
            Millis::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid timestamp \"{s}\""))),
        }
    }
}

fn deserialize_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Millis::deserialize(deserializer)?.into_i64()
}

fn deserialize_opt_millis<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    Option::<Millis>::deserialize(deserializer)?
        .map(Millis::into_i64)
        .transpose()
}

fn serialize_millis<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

fn serialize_opt_millis<S: Serializer>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => serializer.serialize_str(&value.to_string()),
        None => serializer.serialize_none(),
    }
}
