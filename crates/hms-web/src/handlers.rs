//! HTTP处理器

use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use hms_admission::AdmitRequest;
use hms_core::Store;
use hms_relay::RelayEvent;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::extract::{ApiJson, ApiPath};
use crate::response::{ApiResponse, ApiResult};
use crate::server::AppState;

/// 健康检查处理器
pub async fn health<S: Store>(State(state): State<AppState<S>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "relay": state.relay.stats().await,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeVisitRequest {
    pub visit_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOrderInvoiceRequest {
    pub service_order_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionInvoiceRequest {
    pub prescription_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub to_bed_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct MaintenanceRequest {
    pub maintenance: bool,
}

// ---- 收费 ----

pub async fn finalize_visit<S: Store>(
    State(state): State<AppState<S>>,
    ApiJson(request): ApiJson<FinalizeVisitRequest>,
) -> ApiResult<impl IntoResponse> {
    let result = state.billing.finalize_visit(request.visit_id).await?;
    Ok(ApiResponse::ok(result, "Visit finalized"))
}

pub async fn invoice_service_order<S: Store>(
    State(state): State<AppState<S>>,
    ApiJson(request): ApiJson<ServiceOrderInvoiceRequest>,
) -> ApiResult<impl IntoResponse> {
    let invoice = state
        .billing
        .invoice_service_order(request.service_order_id)
        .await?;
    Ok(ApiResponse::created(invoice, "Invoice created"))
}

pub async fn invoice_prescription<S: Store>(
    State(state): State<AppState<S>>,
    ApiJson(request): ApiJson<PrescriptionInvoiceRequest>,
) -> ApiResult<impl IntoResponse> {
    let invoice = state
        .billing
        .invoice_prescription(request.prescription_id)
        .await?;
    Ok(ApiResponse::created(invoice, "Invoice created"))
}

pub async fn list_active_visits<S: Store>(
    State(state): State<AppState<S>>,
) -> ApiResult<impl IntoResponse> {
    let visits = state.billing.list_active_visits().await?;
    Ok(ApiResponse::ok(visits, "Active visits"))
}

pub async fn get_invoice<S: Store>(
    State(state): State<AppState<S>>,
    ApiPath(invoice_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let invoice = state.billing.get_invoice(invoice_id).await?;
    Ok(ApiResponse::ok(invoice, "Invoice"))
}

pub async fn list_patient_invoices<S: Store>(
    State(state): State<AppState<S>>,
    ApiPath(patient_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let invoices = state.billing.list_patient_invoices(patient_id).await?;
    Ok(ApiResponse::ok(invoices, "Patient invoices"))
}

// ---- 住院 ----

pub async fn admit_patient<S: Store>(
    State(state): State<AppState<S>>,
    ApiJson(request): ApiJson<AdmitRequest>,
) -> ApiResult<impl IntoResponse> {
    let detail = state.admissions.admit_patient(request).await?;
    Ok(ApiResponse::created(detail, "Patient admitted"))
}

pub async fn get_admission<S: Store>(
    State(state): State<AppState<S>>,
    ApiPath(admission_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let detail = state.admissions.get_admission(admission_id).await?;
    Ok(ApiResponse::ok(detail, "Admission"))
}

pub async fn transfer_bed<S: Store>(
    State(state): State<AppState<S>>,
    ApiPath(admission_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<TransferRequest>,
) -> ApiResult<impl IntoResponse> {
    let detail = state
        .admissions
        .transfer_bed(admission_id, request.to_bed_id)
        .await?;
    Ok(ApiResponse::ok(detail, "Patient transferred"))
}

pub async fn discharge_patient<S: Store>(
    State(state): State<AppState<S>>,
    ApiPath(admission_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let detail = state.admissions.discharge_patient(admission_id).await?;
    Ok(ApiResponse::ok(detail, "Patient discharged"))
}

pub async fn set_bed_maintenance<S: Store>(
    State(state): State<AppState<S>>,
    ApiPath(bed_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<MaintenanceRequest>,
) -> ApiResult<impl IntoResponse> {
    let bed = state
        .admissions
        .set_bed_maintenance(bed_id, request.maintenance)
        .await?;
    Ok(ApiResponse::ok(bed, "Bed updated"))
}

pub async fn get_hospital_layout<S: Store>(
    State(state): State<AppState<S>>,
) -> ApiResult<impl IntoResponse> {
    let layout = state.admissions.get_hospital_layout().await?;
    Ok(ApiResponse::ok(layout, "Hospital layout"))
}

// ---- 事件 ----

pub async fn publish_emergency<S: Store>(
    State(state): State<AppState<S>>,
    ApiJson(payload): ApiJson<Value>,
) -> impl IntoResponse {
    info!("Emergency raised via HTTP");
    let report = state
        .relay
        .publish(None, RelayEvent::EmergencyInitiated(payload))
        .await;
    ApiResponse::ok(report, "Emergency published")
}

pub async fn publish_ot_assigned<S: Store>(
    State(state): State<AppState<S>>,
    ApiJson(payload): ApiJson<Value>,
) -> impl IntoResponse {
    info!("OT assignment raised via HTTP");
    let report = state
        .relay
        .publish(None, RelayEvent::OtAssigned(payload))
        .await;
    ApiResponse::ok(report, "OT assignment published")
}
