//! Contract submissions: body extraction and field validation.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use chrono::NaiveDate;
use dto::FieldErrors;
use models::{ContractStatus, NewContract};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::{error::ApiError, repository::ContractRepository};

/// Multipart field names carrying attachment files.
const ATTACHMENT_FIELDS: [&str; 2] = ["attachments", "attachment"];

const CONTRACT_NO_MAX_LEN: usize = 100;

const REQUIRED: &str = "This field is required.";
const NULL: &str = "This field may not be null.";
const BLANK: &str = "This field may not be blank.";
const NOT_A_STRING: &str = "Not a valid string.";
const DATE_FORMAT: &str =
    "Date has wrong format. Use one of these formats instead: DD-MM-YYYY, YYYY-MM-DD.";
const TILL_BEFORE_FROM: &str = "Valid till date must be after valid from date";

const DATE_INPUT_FORMATS: [&str; 2] = ["%d-%m-%Y", "%Y-%m-%d"];

/// A single submitted value, keeping enough of its JSON type for error messages.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
    Null,
    List,
    Object,
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => FieldValue::Text(text),
            Value::Number(number) => FieldValue::Number(number),
            Value::Bool(flag) => FieldValue::Bool(flag),
            Value::Null => FieldValue::Null,
            Value::Array(_) => FieldValue::List,
            Value::Object(_) => FieldValue::Object,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Bytes,
}

/// The body of a create request, either `multipart/form-data` or JSON.
#[derive(Debug, Clone, Default)]
pub struct ContractPayload {
    pub fields: HashMap<String, FieldValue>,
    pub files: Vec<UploadedFile>,
}

impl ContractPayload {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut payload = ContractPayload::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read field: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if let Some(file_name) = field.file_name().map(str::to_string) {
                if ATTACHMENT_FIELDS.contains(&name.as_str()) {
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {e}")))?;
                    payload.files.push(UploadedFile { file_name, data });
                }
                continue;
            }

            let text = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Invalid value for {name}: {e}")))?;
            // repeated keys: the last value wins
            payload.fields.insert(name, FieldValue::Text(text));
        }

        Ok(payload)
    }

    fn from_form(body: HashMap<String, String>) -> Self {
        ContractPayload {
            fields: body
                .into_iter()
                .map(|(name, value)| (name, FieldValue::Text(value)))
                .collect(),
            files: Vec::new(),
        }
    }

    fn from_json(body: Map<String, Value>) -> Self {
        ContractPayload {
            fields: body
                .into_iter()
                .map(|(name, value)| (name, FieldValue::from(value)))
                .collect(),
            files: Vec::new(),
        }
    }
}

#[async_trait]
impl<S> FromRequest<S> for ContractPayload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
            Self::from_multipart(multipart).await
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(body) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
            Ok(Self::from_form(body))
        } else {
            let Json(body) = Json::<Map<String, Value>>::from_request(req, state)
                .await
                .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
            Ok(Self::from_json(body))
        }
    }
}

fn type_name(value: &FieldValue) -> &'static str {
    match value {
        FieldValue::Text(_) => "str",
        FieldValue::Number(number) if number.is_f64() => "float",
        FieldValue::Number(_) => "int",
        FieldValue::Bool(_) => "bool",
        FieldValue::Null => "NoneType",
        FieldValue::List => "list",
        FieldValue::Object => "dict",
    }
}

fn parse_pk(value: &FieldValue) -> Result<i64, String> {
    let incorrect = || {
        format!(
            "Incorrect type. Expected pk value, received {}.",
            type_name(value)
        )
    };

    match value {
        FieldValue::Null => Err(NULL.to_string()),
        FieldValue::Text(text) if text.is_empty() => Err(NULL.to_string()),
        FieldValue::Text(text) => text.trim().parse::<i64>().map_err(|_| incorrect()),
        FieldValue::Number(number) => number.as_i64().ok_or_else(incorrect),
        _ => Err(incorrect()),
    }
}

fn parse_contract_no(value: &FieldValue) -> Result<String, String> {
    let text = match value {
        FieldValue::Null => return Err(NULL.to_string()),
        FieldValue::Text(text) => text.trim().to_string(),
        FieldValue::Number(number) => number.to_string(),
        _ => return Err(NOT_A_STRING.to_string()),
    };

    if text.is_empty() {
        return Err(BLANK.to_string());
    }
    if text.chars().count() > CONTRACT_NO_MAX_LEN {
        return Err(format!(
            "Ensure this field has no more than {CONTRACT_NO_MAX_LEN} characters."
        ));
    }
    Ok(text)
}

pub fn parse_date(value: &FieldValue) -> Result<NaiveDate, String> {
    match value {
        FieldValue::Null => Err(NULL.to_string()),
        FieldValue::Text(text) => DATE_INPUT_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
            .ok_or_else(|| DATE_FORMAT.to_string()),
        _ => Err(DATE_FORMAT.to_string()),
    }
}

/// Collects per-field failures while each field is checked independently.
struct Checker<'a> {
    fields: &'a HashMap<String, FieldValue>,
    errors: FieldErrors,
}

impl<'a> Checker<'a> {
    fn field<T>(
        &mut self,
        name: &str,
        parse: impl FnOnce(&FieldValue) -> Result<T, String>,
    ) -> Option<T> {
        let Some(value) = self.fields.get(name) else {
            self.fail(name, REQUIRED);
            return None;
        };
        match parse(value) {
            Ok(parsed) => Some(parsed),
            Err(message) => {
                self.fail(name, message);
                None
            }
        }
    }

    fn fail(&mut self, name: &str, message: impl Into<String>) {
        self.errors
            .entry(name.to_string())
            .or_default()
            .push(message.into());
    }

    /// Keep `id` only when the lookup found a row in the tenant.
    fn exists(&mut self, name: &str, id: i64, found: Option<String>) -> Option<i64> {
        if found.is_none() {
            self.fail(name, format!("Invalid pk \"{id}\" - object does not exist."));
            return None;
        }
        Some(id)
    }
}

/// Validate a submission for `company_id`. Related rows must belong to that
/// company; `today` decides the initial contract status.
pub async fn validate_contract(
    payload: &ContractPayload,
    company_id: i64,
    contracts: &dyn ContractRepository,
    today: NaiveDate,
) -> Result<NewContract, ApiError> {
    let mut checker = Checker {
        fields: &payload.fields,
        errors: FieldErrors::new(),
    };

    let client_id = checker.field("client", parse_pk);
    let location_id = checker.field("location", parse_pk);
    let rate_card_id = checker.field("rate_card", parse_pk);
    let contract_no = checker.field("contract_no", parse_contract_no);
    let valid_from = checker.field("valid_from", parse_date);
    let valid_till = checker.field("valid_till", parse_date);

    let client_id = match client_id {
        Some(id) => {
            let found = contracts.client_name(company_id, id).await?;
            checker.exists("client", id, found)
        }
        None => None,
    };
    let location_id = match location_id {
        Some(id) => {
            let found = contracts.location_name(company_id, id).await?;
            checker.exists("location", id, found)
        }
        None => None,
    };
    let rate_card_id = match rate_card_id {
        Some(id) => {
            let found = contracts.rate_card_name(company_id, id).await?;
            checker.exists("rate_card", id, found)
        }
        None => None,
    };

    if let (Some(from), Some(till)) = (valid_from, valid_till) {
        if from > till {
            checker.fail("valid_till", TILL_BEFORE_FROM);
        }
    }

    match (client_id, location_id, rate_card_id, contract_no, valid_from, valid_till) {
        (
            Some(client_id),
            Some(location_id),
            Some(rate_card_id),
            Some(contract_no),
            Some(valid_from),
            Some(valid_till),
        ) if checker.errors.is_empty() => Ok(NewContract {
            company_id,
            client_id,
            location_id,
            rate_card_id,
            contract_no,
            valid_from,
            valid_till,
            status: ContractStatus::for_validity(valid_till, today),
        }),
        _ => Err(ApiError::Validation(checker.errors)),
    }
}
