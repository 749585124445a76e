use axum::{
    extract::{Query, State},
    http::{header::HOST, HeaderMap},
    Json,
};
use chrono::{Duration, NaiveDate, Utc};
use dto::{
    AttachmentResponse, ContractResponse, Envelope, FieldErrors, ListContractsQuery,
};
use models::{Contract, ContractStatus};
use serde_json::json;

use crate::{
    auth::Principal,
    config::Config,
    error::ApiError,
    form::{self, ContractPayload, UploadedFile},
    repository::ValidTillWindow,
    state::AppState,
    storage::AttachmentStorage,
};

/// Lightweight liveness endpoint for readiness checks.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// Validity buckets offered by the list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryFilter {
    Active,
    Expired,
    ExpiringSoon,
}

impl ExpiryFilter {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(ExpiryFilter::Active),
            "expired" => Some(ExpiryFilter::Expired),
            "expiring_soon" => Some(ExpiryFilter::ExpiringSoon),
            _ => None,
        }
    }

    pub fn window(self, today: NaiveDate, expiring_soon_days: i64) -> ValidTillWindow {
        match self {
            ExpiryFilter::Active => ValidTillWindow {
                not_before: Some(today),
                not_after: None,
            },
            ExpiryFilter::Expired => ValidTillWindow {
                not_before: None,
                not_after: today.pred_opt(),
            },
            ExpiryFilter::ExpiringSoon => ValidTillWindow {
                not_before: Some(today),
                not_after: Some(
                    Duration::try_days(expiring_soon_days.max(0))
                        .and_then(|span| today.checked_add_signed(span))
                        .unwrap_or(NaiveDate::MAX),
                ),
            },
        }
    }
}

/// List the caller's contracts, optionally narrowed by `?status=`.
pub async fn list_contracts(
    State(state): State<AppState>,
    principal: Principal,
    headers: HeaderMap,
    Query(query): Query<ListContractsQuery>,
) -> Result<Json<Envelope<Vec<ContractResponse>>>, ApiError> {
    let company_id = principal.resolve_company(state.users()).await?;
    let today = Utc::now().date_naive();

    let window = match query.status.as_deref() {
        None | Some("") => ValidTillWindow::default(),
        Some(raw) => {
            let filter = ExpiryFilter::parse(raw).ok_or_else(|| {
                let mut errors = FieldErrors::new();
                errors.insert(
                    "status".to_string(),
                    vec![format!("\"{raw}\" is not a valid choice.")],
                );
                ApiError::Validation(errors)
            })?;
            filter.window(today, state.config().expiring_soon_days)
        }
    };

    let contracts = state.contracts().list_contracts(company_id, window).await?;
    tracing::debug!(company_id, count = contracts.len(), "contracts listed");

    let origin = request_origin(state.config(), &headers);
    let data: Vec<ContractResponse> = contracts
        .into_iter()
        .map(|contract| contract_response(contract, today, &origin, &state.config().media_url))
        .collect();

    Ok(Json(Envelope::success("Contracts retrieved successfully.", data)))
}

/// Validate the submission, store its files and persist the contract.
pub async fn create_contract(
    State(state): State<AppState>,
    principal: Principal,
    headers: HeaderMap,
    payload: ContractPayload,
) -> Result<Json<Envelope<ContractResponse>>, ApiError> {
    let company_id = principal.resolve_company(state.users()).await?;
    let today = Utc::now().date_naive();

    let new_contract =
        form::validate_contract(&payload, company_id, state.contracts(), today).await?;

    let stored = store_attachments(state.storage(), &payload.files).await?;

    let contract = match state.contracts().create_contract(&new_contract, &stored).await {
        Ok(contract) => contract,
        Err(error) => {
            discard_attachments(state.storage(), &stored).await;
            return Err(error.into());
        }
    };

    tracing::info!(
        contract_id = contract.id,
        company_id,
        user_id = principal.user.id,
        attachments = contract.attachments.len(),
        "contract created"
    );

    let origin = request_origin(state.config(), &headers);
    Ok(Json(Envelope::success(
        "Contract added successfully.",
        contract_response(contract, today, &origin, &state.config().media_url),
    )))
}

async fn store_attachments(
    storage: &dyn AttachmentStorage,
    files: &[UploadedFile],
) -> Result<Vec<String>, ApiError> {
    let mut stored = Vec::with_capacity(files.len());
    for file in files {
        match storage.save(&file.file_name, &file.data).await {
            Ok(path) => stored.push(path),
            Err(error) => {
                discard_attachments(storage, &stored).await;
                return Err(error.into());
            }
        }
    }
    Ok(stored)
}

async fn discard_attachments(storage: &dyn AttachmentStorage, paths: &[String]) {
    for path in paths {
        if let Err(error) = storage.delete(path).await {
            tracing::warn!(?error, %path, "failed to remove orphaned attachment");
        }
    }
}

/// Scheme and authority used to build absolute attachment URLs.
fn request_origin(config: &Config, headers: &HeaderMap) -> String {
    if let Some(base) = &config.public_base_url {
        return base.clone();
    }
    headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(|host| format!("http://{host}"))
        .unwrap_or_default()
}

/// `contract_status` reflects `today`, not the value stored at creation.
fn contract_response(
    contract: Contract,
    today: NaiveDate,
    origin: &str,
    media_url: &str,
) -> ContractResponse {
    ContractResponse {
        id: contract.id,
        company: contract.company_id,
        client: contract.client_id,
        location: contract.location_id,
        rate_card: contract.rate_card_id,
        client_name: contract.client_name,
        location_name: contract.location_name,
        rate_cardname: contract.rate_card_name,
        contract_no: contract.contract_no,
        valid_from: contract.valid_from,
        valid_till: contract.valid_till,
        contract_status: ContractStatus::for_validity(contract.valid_till, today).to_string(),
        attachments: contract
            .attachments
            .into_iter()
            .map(|attachment| AttachmentResponse {
                id: attachment.id,
                image: format!("{origin}{media_url}{}", attachment.file_path),
            })
            .collect(),
    }
}
