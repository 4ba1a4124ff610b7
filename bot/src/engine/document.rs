use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use super::error::DecodeError;
use crate::platform::UserId;
use crate::platform::ids::parse_snowflake;

/// Filename of the published roster attachment.
pub const ROSTER_FILENAME: &str = "pending_list.json";

/// Filename of the participant list an organizer uploads.
pub const PARTICIPANT_LIST_FILENAME: &str = "participant.json";

/// Roster key: "not yet submitted".
pub const PENDING_KEY: &str = "未提出";

/// Participant list key: "participant list".
pub const PARTICIPANTS_KEY: &str = "参加者リスト";

/// Member field holding the platform user ID.
pub const MEMBER_ID_KEY: &str = "ID";

/// Informational name fields, checked in order.
const DISPLAY_NAME_KEYS: [&str; 3] = ["name", "名前", "displayName"];

/// Which document an attachment holds, decided by its filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Roster,
    ParticipantList,
}

impl DocumentKind {
    pub fn from_filename(filename: &str) -> Option<Self> {
        match filename {
            ROSTER_FILENAME => Some(Self::Roster),
            PARTICIPANT_LIST_FILENAME => Some(Self::ParticipantList),
            _ => None,
        }
    }

    pub fn filename(self) -> &'static str {
        match self {
            Self::Roster => ROSTER_FILENAME,
            Self::ParticipantList => PARTICIPANT_LIST_FILENAME,
        }
    }
}

/// One tracked member. `fields` keeps every key of the source object in its
/// original order; `ID` inside it is always the normalized integer form.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub id: UserId,
    fields: Map<String, Value>,
}

impl Member {
    pub fn new(id: UserId) -> Self {
        let mut fields = Map::new();
        fields.insert(MEMBER_ID_KEY.to_string(), Value::from(id.get()));
        Self { id, fields }
    }

    pub fn with_name(id: UserId, name: &str) -> Self {
        let mut member = Self::new(id);
        member
            .fields
            .insert("name".to_string(), Value::String(name.to_string()));
        member
    }

    pub fn display_name(&self) -> Option<&str> {
        DISPLAY_NAME_KEYS
            .iter()
            .find_map(|k| self.fields.get(*k).and_then(Value::as_str))
    }

    fn from_value(index: usize, value: Value) -> Result<Self, DecodeError> {
        let Value::Object(mut fields) = value else {
            return Err(DecodeError::InvalidMember {
                index,
                reason: "not an object".into(),
            });
        };

        let id = match fields.get(MEMBER_ID_KEY) {
            None => {
                return Err(DecodeError::InvalidMember {
                    index,
                    reason: format!("missing `{MEMBER_ID_KEY}`"),
                });
            }
            Some(Value::Number(n)) => n.as_u64().ok_or_else(|| DecodeError::InvalidMember {
                index,
                reason: format!("`{MEMBER_ID_KEY}` {n} is not an unsigned 64-bit integer"),
            })?,
            Some(Value::String(s)) => {
                parse_snowflake(s).map_err(|reason| DecodeError::InvalidMember { index, reason })?
            }
            Some(other) => {
                return Err(DecodeError::InvalidMember {
                    index,
                    reason: format!("`{MEMBER_ID_KEY}` has unsupported type: {other}"),
                });
            }
        };

        // Replacing an existing key keeps its position.
        fields.insert(MEMBER_ID_KEY.to_string(), Value::from(id));

        Ok(Self {
            id: UserId(id),
            fields,
        })
    }

    fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// The persisted list of members who have not submitted yet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RosterDocument {
    pub pending: Vec<Member>,
    /// Top-level keys other than the pending list, carried through unchanged.
    extra: Map<String, Value>,
    /// Position of the pending key among the top-level keys.
    pending_at: usize,
}

impl RosterDocument {
    pub fn new(pending: Vec<Member>) -> Self {
        Self {
            pending,
            extra: Map::new(),
            pending_at: 0,
        }
    }

    /// Same document with a different pending list.
    pub fn with_pending(&self, pending: Vec<Member>) -> Self {
        Self {
            pending,
            extra: self.extra.clone(),
            pending_at: self.pending_at,
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut object = decode_object(bytes)?;
        let pending_at = object
            .keys()
            .position(|k| k == PENDING_KEY)
            .unwrap_or_default();
        let pending = take_members(&mut object, PENDING_KEY)?;
        Ok(Self {
            pending,
            extra: object,
            pending_at,
        })
    }

    /// UTF-8 JSON, four-space indent, non-ASCII kept literal, order preserved.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        let pending = Value::Array(self.pending.iter().map(Member::to_value).collect());
        let mut pending = Some(pending);
        let mut object = Map::new();
        for (i, (k, v)) in self.extra.iter().enumerate() {
            if i == self.pending_at
                && let Some(pending) = pending.take()
            {
                object.insert(PENDING_KEY.to_string(), pending);
            }
            object.insert(k.clone(), v.clone());
        }
        if let Some(pending) = pending {
            object.insert(PENDING_KEY.to_string(), pending);
        }

        let mut out = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
        Value::Object(object).serialize(&mut ser)?;
        Ok(out)
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.pending.iter().any(|m| m.id == id)
    }
}

/// The one-time input listing everyone to track.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantListDocument {
    pub participants: Vec<Member>,
}

impl ParticipantListDocument {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut object = decode_object(bytes)?;
        let participants = take_members(&mut object, PARTICIPANTS_KEY)?;
        Ok(Self { participants })
    }
}

fn decode_object(bytes: &[u8]) -> Result<Map<String, Value>, DecodeError> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(object) => Ok(object),
        _ => Err(DecodeError::NotAnObject),
    }
}

fn take_members(
    object: &mut Map<String, Value>,
    key: &'static str,
) -> Result<Vec<Member>, DecodeError> {
    let Some(value) = object.shift_remove(key) else {
        return Err(DecodeError::MissingField(key));
    };
    let Value::Array(items) = value else {
        return Err(DecodeError::NotAnArray(key));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, v)| Member::from_value(i, v))
        .collect()
}
