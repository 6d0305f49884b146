//! Form inputs and stored record shapes

use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `POST /signin`
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

/// `POST /signup`
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SignUpForm {
    #[serde(rename = "fName")]
    pub f_name: String,
    pub email: String,
    pub password: String,
}

/// A document in the users collection
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub name: String,
    pub email: String,
    /// argon2 PHC string
    pub password: String,
}

/// `POST /event-register`, stored as submitted
///
/// Values stay untyped: form bodies give strings, JSON bodies may give any
/// scalar. Absent fields are left out of the stored document.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
#[serde(default)]
pub struct EventRegistration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phno: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Value>,
}

/// Render a stored document as JSON, with `_id` as its hex string
pub fn document_to_json(document: Document) -> Value {
    let fields = document
        .into_iter()
        .map(|(key, value)| {
            let json = match value {
                Bson::ObjectId(oid) => Value::String(oid.to_hex()),
                other => other.into_relaxed_extjson(),
            };
            (key, json)
        })
        .collect();
    Value::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId, to_document};

    #[test]
    fn test_sign_up_form_field_names() {
        let form: SignUpForm =
            serde_urlencoded::from_str("fName=Ann&email=a%40x.com&password=p1").unwrap();
        assert_eq!(form.f_name, "Ann");
        assert_eq!(form.email, "a@x.com");
        assert_eq!(form.password, "p1");
    }

    #[test]
    fn test_missing_form_fields_default_to_empty() {
        let form: SignInForm = serde_urlencoded::from_str("email=a%40x.com").unwrap();
        assert_eq!(form.email, "a@x.com");
        assert!(form.password.is_empty());
    }

    #[test]
    fn test_event_registration_stored_verbatim() {
        let form: EventRegistration = serde_json::from_value(serde_json::json!({
            "name": "Bo",
            "age": 30,
            "gender": "M",
            "extra": "ignored"
        }))
        .unwrap();

        let stored = to_document(&form).unwrap();
        assert_eq!(stored.get_str("name").unwrap(), "Bo");
        assert!(matches!(stored.get("age"), Some(Bson::Int32(30) | Bson::Int64(30))));
        assert!(!stored.contains_key("email"));
        assert!(!stored.contains_key("extra"));
    }

    #[test]
    fn test_document_to_json_renders_object_id_as_hex() {
        let oid = ObjectId::new();
        let json = document_to_json(doc! { "_id": oid, "name": "Bo", "age": "30" });
        assert_eq!(json["_id"], oid.to_hex());
        assert_eq!(json["name"], "Bo");
        assert_eq!(json["age"], "30");
    }
}
