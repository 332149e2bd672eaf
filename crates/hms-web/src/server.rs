//! Web服务器

use axum::{
    routing::{get, post, put},
    Router,
};
use hms_admission::AdmissionRegistry;
use hms_billing::BillingService;
use hms_core::{HmsError, Result, Store};
use hms_relay::EventRelay;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::handlers::*;
use crate::ws::websocket_handler;

/// 路由共享状态
pub struct AppState<S: Store> {
    pub billing: Arc<BillingService<S>>,
    pub admissions: Arc<AdmissionRegistry<S>>,
    pub relay: Arc<EventRelay>,
}

impl<S: Store> AppState<S> {
    pub fn new(
        billing: BillingService<S>,
        admissions: AdmissionRegistry<S>,
        relay: EventRelay,
    ) -> Self {
        Self {
            billing: Arc::new(billing),
            admissions: Arc::new(admissions),
            relay: Arc::new(relay),
        }
    }
}

impl<S: Store> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            billing: self.billing.clone(),
            admissions: self.admissions.clone(),
            relay: self.relay.clone(),
        }
    }
}

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new<S: Store>(addr: SocketAddr, state: AppState<S>) -> Self {
        let app = create_app(state);
        Self { addr, app }
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| HmsError::Internal(format!("Failed to bind {}: {}", self.addr, e)))?;
        axum::serve(listener, self.app)
            .await
            .map_err(|e| HmsError::Internal(format!("Failed to start web server: {}", e)))?;

        Ok(())
    }
}

pub fn create_app<S: Store>(state: AppState<S>) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health::<S>))
        .nest("/billing", billing_routes())
        .merge(admission_routes())
        .nest("/events", event_routes())
        // 实时事件
        .route("/ws", get(websocket_handler::<S>))
        .with_state(state)
        // 全局中间件
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

/// 收费路由
fn billing_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/finalize", post(finalize_visit::<S>))
        .route("/invoices/service-order", post(invoice_service_order::<S>))
        .route("/invoices/prescription", post(invoice_prescription::<S>))
        .route("/invoices/:id", get(get_invoice::<S>))
        .route("/visits/active", get(list_active_visits::<S>))
        .route("/patients/:patient_id/invoices", get(list_patient_invoices::<S>))
}

/// 住院与床位路由
fn admission_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/admissions", post(admit_patient::<S>))
        .route("/admissions/:id", get(get_admission::<S>))
        .route("/admissions/:id/transfer", post(transfer_bed::<S>))
        .route("/admissions/:id/discharge", post(discharge_patient::<S>))
        .route("/beds/:id/maintenance", put(set_bed_maintenance::<S>))
        .route("/layout", get(get_hospital_layout::<S>))
}

/// 事件入口路由
fn event_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/emergency", post(publish_emergency::<S>))
        .route("/ot-assigned", post(publish_ot_assigned::<S>))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use hms_billing::PricingPolicy;
    use hms_database::{MemoryState, MemoryStore};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn app_with(state: MemoryState) -> (Router, MemoryStore, Arc<EventRelay>) {
        let store = MemoryStore::new(state);
        let app_state = AppState::new(
            BillingService::new(store.clone(), PricingPolicy::default()),
            AdmissionRegistry::new(store.clone()),
            EventRelay::default(),
        );
        let relay = app_state.relay.clone();
        (create_app(app_state), store, relay)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _) = app_with(MemoryState::default());
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["relay"]["connectedClients"], 0);
    }

    #[tokio::test]
    async fn test_service_order_invoice_and_conflict() {
        let mut state = MemoryState::default();
        let patient = state.add_patient("UHID-1", "Asha Rao");
        let service = state.add_service("MRI Brain", Decimal::new(500, 0));
        let order = state.add_service_order(patient, None, service, false);
        let (app, _, _) = app_with(state);

        let (status, body) = send(
            &app,
            "POST",
            "/billing/invoices/service-order",
            Some(json!({ "serviceOrderId": order })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["statusCode"], 201);
        assert_eq!(body["data"]["status"], "Paid");
        let net: Decimal = body["data"]["netAmount"].as_str().unwrap().parse().unwrap();
        assert_eq!(net, Decimal::new(500, 0));

        let invoice_id = body["data"]["id"].as_str().unwrap().to_string();
        let (status, body) = send(&app, "GET", &format!("/billing/invoices/{}", invoice_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);

        let (status, body) = send(
            &app,
            "POST",
            "/billing/invoices/service-order",
            Some(json!({ "serviceOrderId": order })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["statusCode"], 409);
        assert!(body["message"].is_string());

        let (status, body) = send(
            &app,
            "GET",
            &format!("/billing/patients/{}/invoices", patient),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_finalize_visit_route() {
        let mut state = MemoryState::default();
        let patient = state.add_patient("UHID-2", "Ravi Menon");
        let visit = state.add_visit(patient, chrono::Utc::now());
        state.add_draft_invoice(patient, visit, Decimal::new(1200, 0));
        let (app, _, _) = app_with(state);

        let (status, body) = send(&app, "GET", "/billing/visits/active", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, body) =
            send(&app, "POST", "/billing/finalize", Some(json!({ "visitId": visit }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["visit"]["status"], "Completed");
        assert_eq!(body["data"]["invoice"]["status"], "Finalized");

        let (status, _) = send(
            &app,
            "POST",
            "/billing/finalize",
            Some(json!({ "visitId": Uuid::new_v4() })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admission_lifecycle_routes() {
        let mut state = MemoryState::default();
        let patient = state.add_patient("UHID-3", "Meera Iyer");
        let department = state.add_department("Medicine");
        let ward = state.add_ward(department, "General Ward");
        let bed_a = state.add_bed(ward, "G-01");
        let bed_b = state.add_bed(ward, "G-02");
        let (app, _, _) = app_with(state);

        let (status, body) = send(
            &app,
            "POST",
            "/admissions",
            Some(json!({ "patientId": patient, "bedId": bed_a })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let admission = body["data"]["admission"]["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            "POST",
            "/admissions",
            Some(json!({ "patientId": patient, "bedId": bed_a })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "POST",
            &format!("/admissions/{}/transfer", admission),
            Some(json!({ "toBedId": bed_b })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["transfers"].as_array().unwrap().len(), 2);

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/beds/{}/maintenance", bed_a),
            Some(json!({ "maintenance": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "Maintenance");

        let (status, body) = send(&app, "GET", "/layout", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["occupancy"]["occupied"], 1);
        assert_eq!(body["data"]["occupancy"]["maintenance"], 1);

        let (status, body) = send(
            &app,
            "POST",
            &format!("/admissions/{}/discharge", admission),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["admission"]["status"], "Discharged");

        let (status, body) = send(&app, "GET", &format!("/admissions/{}", admission), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["transfers"][1]["endDate"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_requests_use_error_envelope() {
        let (app, _, _) = app_with(MemoryState::default());

        let (status, body) = send(&app, "GET", "/billing/invoices/xyz", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["statusCode"], 400);
        assert!(body["message"].as_str().unwrap().contains("路径参数无效"));

        let (status, body) = send(
            &app,
            "POST",
            "/billing/finalize",
            Some(json!({ "visitId": "not-a-uuid" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["statusCode"], 400);
        assert!(body["message"].as_str().unwrap().contains("请求体无效"));

        // 缺少 content-type
        let request = Request::builder()
            .method("POST")
            .uri("/admissions")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["statusCode"], 400);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_event_routes_publish_to_relay() {
        let (app, _, relay) = app_with(MemoryState::default());
        let mut manager = relay.connect().await;
        relay.join_room(manager.id, "role:OTManager").await.unwrap();
        let mut ward = relay.connect().await;

        let (status, body) = send(
            &app,
            "POST",
            "/events/emergency",
            Some(json!({ "patientId": "P-7", "severity": "critical" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["delivered"], 2);

        assert_eq!(manager.receiver.try_recv().unwrap().event, "EMERGENCY_INITIATED");
        assert_eq!(ward.receiver.try_recv().unwrap().event, "EMERGENCY_ALERT");

        let (status, body) =
            send(&app, "POST", "/events/ot-assigned", Some(json!({ "theatre": "OT-1" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["delivered"], 3);
    }
}
