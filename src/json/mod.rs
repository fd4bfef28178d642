//! JSON request and response bodies
//!
//! Serializes values into `application/json; charset=utf-8` request bodies
//! for POST, PUT and PATCH, and deserializes response bodies. Every request
//! built here still goes through the client's interceptor chain.
//!
//! # Example
//!
//! ```rust,no_run
//! use courier::client::NamedClient;
//! use courier::json::{JsonOptions, KeyCase};
//! use serde::{Deserialize, Serialize};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Invoice {
//!     invoice_id: u64,
//! }
//!
//! # async fn demo(billing: NamedClient) -> courier::Result<()> {
//! let cancel = CancellationToken::new();
//! let options = JsonOptions::default().with_key_case(KeyCase::CamelCase);
//! let response = billing
//!     .post_json("invoices", &Invoice { invoice_id: 7 }, Some(&options), &cancel)
//!     .await?;
//! let created: Invoice = courier::json::read_json_body(response, Some(&options), &cancel).await?;
//! # let _ = created;
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use heck::{ToKebabCase, ToLowerCamelCase, ToPascalCase, ToSnakeCase};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::client::NamedClient;
use crate::error::{CourierError, Result};
use crate::types::{HttpResponse, JSON_CONTENT_TYPE, JsonMethod};

mod casing;

/// Casing applied to struct field names on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCase {
    /// Keys are written exactly as `serde` produces them.
    #[default]
    AsIs,
    CamelCase,
    SnakeCase,
    PascalCase,
    KebabCase,
}

impl KeyCase {
    fn apply(self, key: &str) -> String {
        match self {
            Self::AsIs => key.to_string(),
            Self::CamelCase => key.to_lower_camel_case(),
            Self::SnakeCase => key.to_snake_case(),
            Self::PascalCase => key.to_pascal_case(),
            Self::KebabCase => key.to_kebab_case(),
        }
    }
}

/// Serializer options for the JSON helpers.
///
/// `key_case` renames struct field names, including fields already renamed
/// with serde attributes. Map keys are left as they are. On read, wire keys
/// are matched back to the target's fields under the same casing, so a body
/// written with some options reads back with the same options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonOptions {
    pub pretty: bool,
    pub key_case: KeyCase,
}

impl JsonOptions {
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn with_key_case(mut self, key_case: KeyCase) -> Self {
        self.key_case = key_case;
        self
    }
}

/// Encode `value` as a UTF-8 JSON body.
pub fn json_body<T: Serialize + ?Sized>(value: &T, options: Option<&JsonOptions>) -> Result<Bytes> {
    let options = options.cloned().unwrap_or_default();
    let encoded = match options.key_case {
        KeyCase::AsIs if options.pretty => serde_json::to_vec_pretty(value),
        KeyCase::AsIs => serde_json::to_vec(value),
        case => casing::to_value(value, case).and_then(|tree| {
            if options.pretty {
                serde_json::to_vec_pretty(&tree)
            } else {
                serde_json::to_vec(&tree)
            }
        }),
    };
    encoded
        .map(Bytes::from)
        .map_err(|e| CourierError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(body: &[u8], options: Option<&JsonOptions>) -> Result<T> {
    let decoded = match options.map(|o| o.key_case).unwrap_or_default() {
        KeyCase::AsIs => serde_json::from_slice(body),
        case => serde_json::from_slice::<Value>(body).and_then(|tree| casing::from_value(tree, case)),
    };
    decoded.map_err(|e| CourierError::Deserialization(e.to_string()))
}

/// Send `value` as a JSON body with `method` to `target`.
pub async fn send_json<T>(
    client: &NamedClient,
    method: JsonMethod,
    target: &str,
    value: &T,
    options: Option<&JsonOptions>,
    cancel: &CancellationToken,
) -> Result<HttpResponse>
where
    T: Serialize + ?Sized + Sync,
{
    if cancel.is_cancelled() {
        return Err(CourierError::Cancelled);
    }
    let body = json_body(value, options)?;
    let mut request = client.request(method.as_method(), target)?;
    request.set_body(body, JSON_CONTENT_TYPE)?;
    tracing::trace!(target: "courier::http", client = %client.name(), method = ?method, url = %request.url(), "sending JSON body");
    client.send(request, cancel).await
}

pub async fn post_json<T>(
    client: &NamedClient,
    target: &str,
    value: &T,
    options: Option<&JsonOptions>,
    cancel: &CancellationToken,
) -> Result<HttpResponse>
where
    T: Serialize + ?Sized + Sync,
{
    send_json(client, JsonMethod::Post, target, value, options, cancel).await
}

pub async fn put_json<T>(
    client: &NamedClient,
    target: &str,
    value: &T,
    options: Option<&JsonOptions>,
    cancel: &CancellationToken,
) -> Result<HttpResponse>
where
    T: Serialize + ?Sized + Sync,
{
    send_json(client, JsonMethod::Put, target, value, options, cancel).await
}

pub async fn patch_json<T>(
    client: &NamedClient,
    target: &str,
    value: &T,
    options: Option<&JsonOptions>,
    cancel: &CancellationToken,
) -> Result<HttpResponse>
where
    T: Serialize + ?Sized + Sync,
{
    send_json(client, JsonMethod::Patch, target, value, options, cancel).await
}

/// Read the whole response body and deserialize it.
///
/// Fails with [`CourierError::Deserialization`] if the body is not JSON or
/// does not fit `T`, and with [`CourierError::Cancelled`] if `cancel` fires
/// while the body is still arriving.
pub async fn read_json_body<T: DeserializeOwned>(
    response: HttpResponse,
    options: Option<&JsonOptions>,
    cancel: &CancellationToken,
) -> Result<T> {
    let body = response.bytes(cancel).await?;
    decode(&body, options)
}

impl HttpResponse {
    /// [`read_json_body`] with default options.
    pub async fn json<T: DeserializeOwned>(self, cancel: &CancellationToken) -> Result<T> {
        read_json_body(self, None, cancel).await
    }
}

impl NamedClient {
    /// See [`send_json`].
    pub async fn send_json<T>(
        &self,
        method: JsonMethod,
        target: &str,
        value: &T,
        options: Option<&JsonOptions>,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse>
    where
        T: Serialize + ?Sized + Sync,
    {
        send_json(self, method, target, value, options, cancel).await
    }

    pub async fn post_json<T>(
        &self,
        target: &str,
        value: &T,
        options: Option<&JsonOptions>,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse>
    where
        T: Serialize + ?Sized + Sync,
    {
        send_json(self, JsonMethod::Post, target, value, options, cancel).await
    }

    pub async fn put_json<T>(
        &self,
        target: &str,
        value: &T,
        options: Option<&JsonOptions>,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse>
    where
        T: Serialize + ?Sized + Sync,
    {
        send_json(self, JsonMethod::Put, target, value, options, cancel).await
    }

    pub async fn patch_json<T>(
        &self,
        target: &str,
        value: &T,
        options: Option<&JsonOptions>,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse>
    where
        T: Serialize + ?Sized + Sync,
    {
        send_json(self, JsonMethod::Patch, target, value, options, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Account {
        user_id: u32,
        display_name: String,
    }

    #[test]
    fn json_body_is_compact_utf8() {
        let body = json_body(&json!({"x": 1}), None).unwrap();
        assert_eq!(body.as_ref(), br#"{"x":1}"#);
    }

    #[test]
    fn null_encodes_to_four_bytes() {
        let body = json_body(&Option::<u32>::None, None).unwrap();
        assert_eq!(body.as_ref(), b"null");
    }

    #[test]
    fn camel_case_renames_fields_but_not_map_keys() {
        #[derive(Serialize)]
        struct Region {
            account_list: Vec<Account>,
            tags: BTreeMap<&'static str, &'static str>,
        }
        let region = Region {
            account_list: vec![Account {
                user_id: 1,
                display_name: "Ada".into(),
            }],
            tags: BTreeMap::from([("home_region", "eu")]),
        };
        let options = JsonOptions::default().with_key_case(KeyCase::CamelCase);
        let body = json_body(&region, Some(&options)).unwrap();
        let decoded: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            decoded,
            json!({
                "accountList": [{ "userId": 1, "displayName": "Ada" }],
                "tags": { "home_region": "eu" }
            })
        );
    }

    #[tokio::test]
    async fn cased_round_trip_keeps_map_keys_and_digit_fields() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Shipment {
            http2_enabled: bool,
            stock: BTreeMap<String, u32>,
        }
        let shipment = Shipment {
            http2_enabled: true,
            stock: BTreeMap::from([("SKU-A1".to_string(), 3)]),
        };
        let options = JsonOptions::default().with_key_case(KeyCase::CamelCase);
        let body = json_body(&shipment, Some(&options)).unwrap();
        assert_eq!(body.as_ref(), br#"{"http2Enabled":true,"stock":{"SKU-A1":3}}"#);

        let response = HttpResponse::from_bytes(StatusCode::OK, body);
        let decoded: Shipment = read_json_body(response, Some(&options), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(decoded, shipment);
    }

    #[test]
    fn kebab_and_pascal_cases() {
        let account = Account {
            user_id: 1,
            display_name: "Ada".into(),
        };
        let kebab = JsonOptions::default().with_key_case(KeyCase::KebabCase);
        let body = json_body(&account, Some(&kebab)).unwrap();
        assert_eq!(body.as_ref(), br#"{"display-name":"Ada","user-id":1}"#);

        let pascal = JsonOptions::default().with_key_case(KeyCase::PascalCase);
        let body = json_body(&account, Some(&pascal)).unwrap();
        assert_eq!(body.as_ref(), br#"{"DisplayName":"Ada","UserId":1}"#);
    }

    #[test]
    fn pretty_output_is_indented() {
        let options = JsonOptions::default().with_pretty(true);
        let body = json_body(&json!({"x": 1}), Some(&options)).unwrap();
        assert_eq!(body.as_ref(), b"{\n  \"x\": 1\n}");
    }

    #[tokio::test]
    async fn camel_case_round_trips_through_response() {
        let options = JsonOptions::default().with_key_case(KeyCase::CamelCase);
        let account = Account {
            user_id: 42,
            display_name: "Ada".into(),
        };
        let body = json_body(&account, Some(&options)).unwrap();
        let response = HttpResponse::from_bytes(StatusCode::OK, body);
        let decoded: Account = read_json_body(response, Some(&options), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(decoded, account);
    }

    #[tokio::test]
    async fn non_json_body_is_a_deserialization_error() {
        let response = HttpResponse::from_bytes(StatusCode::OK, "not json");
        let err = response
            .json::<Value>(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::Deserialization(_)));
    }

    #[tokio::test]
    async fn shape_mismatch_is_a_deserialization_error() {
        let response = HttpResponse::from_bytes(StatusCode::OK, r#"{"user_id":"nope"}"#);
        let err = response
            .json::<Account>(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::Deserialization(_)));
    }
}
