//! Typed GraphQL documents and response shapes.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crm_core::Money;

use super::ProtocolError;

pub const UPDATE_LOW_STOCK_MUTATION: &str = r#"
mutation {
    updateLowStockProducts {
        updatedProducts {
            id
            name
            stock
        }
        successMessage
        errors
    }
}
"#;

pub const HELLO_QUERY: &str = "query { hello }";

pub const REPORT_QUERY: &str = r#"
query {
    customers {
        id
    }
    orders {
        id
        totalAmount
        orderDate
    }
}
"#;

pub const ORDERS_QUERY: &str = r#"
query {
    orders {
        id
        customer {
            name
            email
        }
        totalAmount
        orderDate
    }
}
"#;

#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a> {
    pub query: &'a str,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphQlErrorEntry>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorEntry {
    #[serde(default)]
    message: String,
}

/// GraphQL `ID`: servers emit it as a string, some as a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawId")]
pub struct RemoteId(pub String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
}

impl From<RawId> for RemoteId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => RemoteId(s),
            RawId::Int(n) => RemoteId(n.to_string()),
        }
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A `Decimal` amount, serialized either as a string or a JSON number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RemoteAmount {
    Text(String),
    Number(f64),
}

impl RemoteAmount {
    /// `None` when the amount is not a valid non-negative decimal.
    pub fn to_money(&self) -> Option<Money> {
        match self {
            RemoteAmount::Text(s) => Money::parse_decimal(s).ok(),
            RemoteAmount::Number(n) => Money::from_f64(*n).ok(),
        }
    }
}

impl fmt::Display for RemoteAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_money() {
            Some(money) => write!(f, "{money}"),
            None => match self {
                RemoteAmount::Text(s) => f.write_str(s),
                RemoteAmount::Number(n) => write!(f, "{n}"),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteProduct {
    pub id: RemoteId,
    pub name: String,
    pub stock: i64,
}

/// Successful result of the low-stock mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowStockUpdate {
    pub products: Vec<RemoteProduct>,
    pub success_message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MutationData {
    update_low_stock_products: Option<LowStockPayload>,
}

/// `successMessage` is null when the mutation reports `errors`, so both
/// required fields are checked only after the error list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LowStockPayload {
    updated_products: Option<Vec<RemoteProduct>>,
    success_message: Option<String>,
    errors: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct HelloData {
    hello: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteCustomerRef {
    pub id: RemoteId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteOrderSummary {
    pub id: RemoteId,
    pub total_amount: Option<RemoteAmount>,
    pub order_date: Option<String>,
}

/// Raw material for the weekly report.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportData {
    pub customers: Vec<RemoteCustomerRef>,
    pub orders: Vec<RemoteOrderSummary>,
}

impl ReportData {
    /// Sum of order amounts; amounts that do not parse are skipped. A total
    /// that does not fit in `Money` is a malformed response.
    pub fn revenue(&self) -> Result<Money, ProtocolError> {
        self.orders
            .iter()
            .filter_map(|o| o.total_amount.as_ref().and_then(RemoteAmount::to_money))
            .try_fold(Money::ZERO, Money::checked_add)
            .ok_or_else(|| ProtocolError::Malformed("order revenue overflows".into()))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteCustomer {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteOrder {
    pub id: RemoteId,
    pub customer: RemoteCustomer,
    pub total_amount: RemoteAmount,
    pub order_date: String,
}

impl RemoteOrder {
    /// RFC 3339, or a naive ISO timestamp taken as UTC.
    pub fn parsed_date(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.order_date)
    }
}

#[derive(Debug, Deserialize)]
struct OrdersData {
    orders: Vec<RemoteOrder>,
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Decode a GraphQL envelope, failing on top-level `errors` or missing `data`.
fn decode_data<T: DeserializeOwned>(body: &str) -> Result<T, ProtocolError> {
    let envelope: Envelope<T> =
        serde_json::from_str(body).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    if let Some(errors) = envelope.errors.filter(|e| !e.is_empty()) {
        return Err(ProtocolError::GraphQl(
            errors.into_iter().map(|e| e.message).collect(),
        ));
    }
    envelope
        .data
        .ok_or_else(|| ProtocolError::Malformed("response has no data".into()))
}

pub fn decode_low_stock_update(body: &str) -> Result<LowStockUpdate, ProtocolError> {
    let data: MutationData = decode_data(body)?;
    let payload = data.update_low_stock_products.ok_or_else(|| {
        ProtocolError::Malformed("missing updateLowStockProducts payload".into())
    })?;

    if let Some(errors) = payload.errors.filter(|e| !e.is_empty()) {
        return Err(ProtocolError::Rejected(errors));
    }
    let missing = |field: &str| ProtocolError::Malformed(format!("missing {field} in payload"));
    Ok(LowStockUpdate {
        products: payload
            .updated_products
            .ok_or_else(|| missing("updatedProducts"))?,
        success_message: payload
            .success_message
            .ok_or_else(|| missing("successMessage"))?,
    })
}

pub fn decode_hello(body: &str) -> Result<String, ProtocolError> {
    let data: HelloData = decode_data(body)?;
    data.hello
        .ok_or_else(|| ProtocolError::Malformed("missing hello field".into()))
}

pub fn decode_report(body: &str) -> Result<ReportData, ProtocolError> {
    decode_data(body)
}

pub fn decode_orders(body: &str) -> Result<Vec<RemoteOrder>, ProtocolError> {
    decode_data::<OrdersData>(body).map(|d| d.orders)
}
