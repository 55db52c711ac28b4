//! Wire envelopes and the generated entity types.
//!
//! Every entity set has three generated types: the read shape (`Sag`), the
//! create body (`SagCreate`) and the `PATCH` body (`SagUpdate`). Danish
//! letters are transliterated in Rust names (`Aktør` becomes `Aktoer`,
//! `aktørid` becomes `aktoerid`); the wire names are unchanged.

use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Read shape of an entity set, tying it to its create and update bodies.
pub trait Entity: DeserializeOwned + Serialize {
    type Create: Serialize;
    type Update: Serialize;

    /// Entity set name as used in request paths, e.g. `Aktør`.
    const ENTITY_SET: &'static str;
}

/// Collection response envelope.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Collection<T> {
    /// Total number of matches, present when `$count=true` was requested.
    #[serde(
        rename = "@odata.count",
        alias = "odata.count",
        alias = "@count",
        default,
        deserialize_with = "deserialize_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub count: Option<u64>,
    /// Link to the next server-side page, if any.
    #[serde(
        rename = "@odata.nextLink",
        alias = "odata.nextLink",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub next_link: Option<String>,
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            count: None,
            next_link: None,
            value: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CountRepr {
    Number(u64),
    Text(String),
}

// The service sends the count as a number or, in its older dialect, as a
// string.
fn deserialize_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<CountRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(CountRepr::Number(count)) => Ok(Some(count)),
        Some(CountRepr::Text(text)) => text
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid count '{text}'"))),
    }
}

/// OData error envelope returned with non-success statuses.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ODataError {
    #[serde(alias = "odata.error")]
    pub error: ODataErrorDetail,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ODataErrorDetail {
    #[serde(default)]
    pub code: String,
    pub message: ODataErrorMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub innererror: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ODataErrorMessage {
    #[serde(default)]
    pub lang: String,
    pub value: String,
}

// Generated file contract (`$OUT_DIR/oda_models.rs`): for every entity set
// a read struct, a `<Type>Create` struct, a `<Type>Update` struct and an
// `Entity` impl on the read struct.
include!(concat!(env!("OUT_DIR"), "/oda_models.rs"));

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{Aktoer, Collection, Entity, ODataError, Sag, SagAktoer, SagUpdate};

    #[test]
    fn collection_accepts_numeric_and_string_counts() {
        let numeric: Collection<Sag> =
            serde_json::from_value(json!({ "@odata.count": 2, "value": [] })).expect("decodes");
        assert_eq!(numeric.count, Some(2));

        let legacy: Collection<Sag> = serde_json::from_value(json!({
            "odata.count": "17",
            "odata.nextLink": "https://oda.ft.dk/api/Sag?$skip=100",
            "value": [{ "id": 1 }]
        }))
        .expect("decodes");
        assert_eq!(legacy.count, Some(17));
        assert_eq!(legacy.value[0].id, Some(1));
        assert!(legacy.next_link.is_some());

        let bare: Collection<Sag> = serde_json::from_value(json!({})).expect("decodes");
        assert_eq!(bare, Collection::default());
    }

    #[test]
    fn entity_uses_wire_names_for_transliterated_members() {
        let link: SagAktoer = serde_json::from_value(json!({
            "id": 9,
            "aktørid": 15,
            "sagid": 3,
            "opdateringsdato": "2020-01-01T00:00:00Z",
            "Aktør": { "id": 15, "navn": "Mette", "typeid": 5 }
        }))
        .expect("decodes");

        assert_eq!(link.aktoerid, Some(15));
        assert_eq!(
            link.opdateringsdato,
            Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap())
        );
        let actor: &Aktoer = link.aktoer.as_deref().expect("expanded");
        assert_eq!(actor.navn.as_deref(), Some("Mette"));
        assert_eq!(<SagAktoer as Entity>::ENTITY_SET, "SagAktør");
    }

    #[test]
    fn update_body_serializes_only_populated_fields() {
        let body = SagUpdate {
            titel: Some("Forslag til lov".to_owned()),
            ..SagUpdate::default()
        };
        assert_eq!(
            serde_json::to_value(&body).expect("encodes"),
            json!({ "titel": "Forslag til lov" })
        );
    }

    #[test]
    fn decodes_error_envelope_in_both_dialects() {
        let current: ODataError = serde_json::from_value(json!({
            "error": { "code": "404", "message": { "lang": "da-DK", "value": "Ikke fundet" } }
        }))
        .expect("decodes");
        assert_eq!(current.error.message.value, "Ikke fundet");

        let legacy: ODataError = serde_json::from_value(json!({
            "odata.error": { "code": "", "message": { "lang": "en-US", "value": "Bad filter" } }
        }))
        .expect("decodes");
        assert_eq!(legacy.error.message.lang, "en-US");
    }
}
