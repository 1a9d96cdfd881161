use axum::{Router, middleware::from_fn_with_state, routing::get};
use deployment::Deployment;
use services::services::uploads::PUBLIC_PREFIX;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{DeploymentImpl, routes};

pub mod auth;

pub fn router(deployment: DeploymentImpl) -> Router {
    let protected_routes = Router::new()
        .merge(routes::auth::router())
        .merge(routes::users::router(&deployment))
        .merge(routes::pets::router(&deployment))
        .merge(routes::catalog::router())
        .merge(routes::appointments::router(&deployment))
        .merge(routes::staff::router(&deployment))
        .merge(routes::payments::router(&deployment))
        .merge(routes::conversations::router(&deployment))
        .merge(routes::notifications::router(&deployment))
        .merge(routes::automation::router(&deployment))
        .merge(routes::sla::router())
        .layer(from_fn_with_state(
            deployment.clone(),
            auth::require_api_auth,
        ));

    let api_routes = Router::new()
        .merge(routes::auth::public_router())
        .merge(protected_routes);

    let uploads = ServeDir::new(deployment.uploads().root());

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .nest_service(PUBLIC_PREFIX, uploads)
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header},
    };
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use db::{
        DBService,
        events::SLA_APPOINTMENT_PENDING,
        models::grooming_service::{CreateGroomingService, GroomingService},
        types::UserRole,
    };
    use deployment::Deployment;
    use serde_json::{Value, json};
    use services::services::{
        auth::RegisterRequest,
        automation::{AutomationCommand, AutomationService},
        config::Config,
    };
    use tokio::sync::mpsc::UnboundedReceiver;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::{DeploymentImpl, test_support::TestEnvGuard};

    struct TestApp {
        deployment: DeploymentImpl,
        app: Router,
        commands: UnboundedReceiver<AutomationCommand>,
        _env: TestEnvGuard,
    }

    async fn setup() -> TestApp {
        let env = TestEnvGuard::fresh();
        let db = DBService::new().await.unwrap();
        let (automation, commands) = AutomationService::detached();
        let deployment = DeploymentImpl::from_parts(
            Config::default(),
            db,
            env.root().join("uploads"),
            automation,
        )
        .unwrap();

        TestApp {
            app: super::router(deployment.clone()),
            deployment,
            commands,
            _env: env,
        }
    }

    impl TestApp {
        async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            self.send_with_headers(method, uri, token, body, &[]).await
        }

        async fn send_with_headers(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
            extra_headers: &[(&str, &str)],
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            for (name, value) in extra_headers {
                builder = builder.header(*name, *value);
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, json)
        }

        async fn register_customer(&self, email: &str) -> (String, Uuid) {
            let (status, json) = self
                .send(
                    Method::POST,
                    "/api/auth/register",
                    None,
                    Some(json!({
                        "email": email,
                        "password": "correct-horse",
                        "full_name": "Pat Owner"
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{json}");
            let token = json["data"]["token"].as_str().unwrap().to_string();
            let id = json["data"]["user"]["id"].as_str().unwrap().parse().unwrap();
            (token, id)
        }

        async fn account_with_role(&self, email: &str, role: UserRole) -> (String, Uuid) {
            let user = self
                .deployment
                .auth()
                .create_account(
                    &self.deployment.db().pool,
                    &RegisterRequest {
                        email: email.to_string(),
                        password: "correct-horse".to_string(),
                        full_name: format!("{role} user"),
                        phone: None,
                    },
                    role,
                )
                .await
                .unwrap();
            let (status, json) = self
                .send(
                    Method::POST,
                    "/api/auth/login",
                    None,
                    Some(json!({ "email": email, "password": "correct-horse" })),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{json}");
            (json["data"]["token"].as_str().unwrap().to_string(), user.id)
        }

        async fn create_pet(&self, token: &str) -> Uuid {
            let (status, json) = self
                .send(
                    Method::POST,
                    "/api/pets",
                    Some(token),
                    Some(json!({ "name": "Biscuit", "species": "dog" })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{json}");
            json["data"]["id"].as_str().unwrap().parse().unwrap()
        }

        async fn create_service(&self, duration_minutes: i32) -> Uuid {
            GroomingService::create(
                &self.deployment.db().pool,
                &CreateGroomingService {
                    name: "Full groom".to_string(),
                    description: None,
                    price_cents: 6500,
                    duration_minutes,
                    is_active: None,
                },
            )
            .await
            .unwrap()
            .id
        }

        fn drain_commands(&mut self) -> Vec<AutomationCommand> {
            let mut drained = Vec::new();
            while let Ok(command) = self.commands.try_recv() {
                drained.push(command);
            }
            drained
        }
    }

    #[tokio::test]
    async fn health_is_public() {
        let test = setup().await;
        let (status, json) = test.send(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
    }

    #[tokio::test]
    async fn api_requires_a_valid_bearer_token() {
        let test = setup().await;

        let (status, json) = test.send(Method::GET, "/api/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["success"], false);

        let (status, _) = test
            .send(Method::GET, "/api/auth/me", Some("not-a-jwt"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_login_and_me_round_trip() {
        let test = setup().await;
        let (token, user_id) = test.register_customer("pat@example.com").await;

        let (status, json) = test
            .send(Method::GET, "/api/auth/me", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["id"], user_id.to_string());
        assert_eq!(json["data"]["role"], "customer");
        assert!(json["data"].get("password_hash").is_none());

        let (status, _) = test
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "email": "PAT@example.com",
                    "password": "another-pass",
                    "full_name": "Pat Again"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = test
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "pat@example.com", "password": "wrong-pass" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn appointments_are_created_and_scoped_to_their_customer() {
        let test = setup().await;
        let (owner_token, owner_id) = test.register_customer("owner@example.com").await;
        let (other_token, _) = test.register_customer("other@example.com").await;
        let pet_id = test.create_pet(&owner_token).await;
        let service_id = test.create_service(60).await;

        let (status, json) = test
            .send(
                Method::POST,
                "/api/appointments",
                Some(&owner_token),
                Some(json!({
                    "pet_id": pet_id,
                    "service_ids": [service_id],
                    "scheduled_at": Utc::now() + Duration::days(3),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        assert_eq!(json["data"]["status"], "pending");
        assert_eq!(json["data"]["customer_id"], owner_id.to_string());
        assert_eq!(json["data"]["total_price_cents"], 6500);
        let appointment_id = json["data"]["id"].as_str().unwrap().to_string();
        let uri = format!("/api/appointments/{appointment_id}");

        let (status, json) = test.send(Method::GET, &uri, Some(&owner_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["id"], appointment_id.as_str());

        let (status, _) = test.send(Method::GET, &uri, Some(&other_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = test
            .send(
                Method::PUT,
                &uri,
                Some(&other_token),
                Some(json!({ "notes": "hijack" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, json) = test
            .send(Method::GET, "/api/appointments", Some(&other_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"].as_array().unwrap().len(), 0);

        let (status, _) = test
            .send(
                Method::GET,
                &format!("/api/appointments/{}", Uuid::new_v4()),
                Some(&owner_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn leaving_pending_closes_pending_incidents_once() {
        let mut test = setup().await;
        let (customer_token, _) = test.register_customer("cust@example.com").await;
        let (staff_token, _) = test
            .account_with_role("staff@example.com", UserRole::Staff)
            .await;
        let pet_id = test.create_pet(&customer_token).await;
        let service_id = test.create_service(45).await;

        let (status, json) = test
            .send(
                Method::POST,
                "/api/appointments",
                Some(&customer_token),
                Some(json!({
                    "pet_id": pet_id,
                    "service_ids": [service_id],
                    "scheduled_at": Utc::now() + Duration::days(1),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let appointment_id: Uuid = json["data"]["id"].as_str().unwrap().parse().unwrap();
        let status_uri = format!("/api/appointments/{appointment_id}/status");
        test.drain_commands();

        let (status, json) = test
            .send(
                Method::PUT,
                &status_uri,
                Some(&staff_token),
                Some(json!({ "status": "confirmed" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "confirmed");

        let (status, _) = test
            .send(
                Method::PUT,
                &status_uri,
                Some(&staff_token),
                Some(json!({ "status": "in_progress" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let commands = test.drain_commands();
        let pending_closes = commands
            .iter()
            .filter(|command| {
                matches!(
                    command,
                    AutomationCommand::CloseIncidents { target_key, entity_id }
                        if target_key == SLA_APPOINTMENT_PENDING && *entity_id == appointment_id
                )
            })
            .count();
        assert_eq!(pending_closes, 1);
        let status_triggers = commands
            .iter()
            .filter(|command| matches!(command, AutomationCommand::Trigger(event) if event.trigger_type == "appointment_status_changed"))
            .count();
        assert_eq!(status_triggers, 2);
    }

    #[tokio::test]
    async fn customers_may_only_cancel() {
        let test = setup().await;
        let (token, _) = test.register_customer("cancel@example.com").await;
        let pet_id = test.create_pet(&token).await;
        let service_id = test.create_service(30).await;
        let (_, json) = test
            .send(
                Method::POST,
                "/api/appointments",
                Some(&token),
                Some(json!({
                    "pet_id": pet_id,
                    "service_ids": [service_id],
                    "scheduled_at": Utc::now() + Duration::days(2),
                })),
            )
            .await;
        let status_uri = format!(
            "/api/appointments/{}/status",
            json["data"]["id"].as_str().unwrap()
        );

        let (status, _) = test
            .send(
                Method::PUT,
                &status_uri,
                Some(&token),
                Some(json!({ "status": "confirmed" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, json) = test
            .send(
                Method::PUT,
                &status_uri,
                Some(&token),
                Some(json!({ "status": "cancelled" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "cancelled");
    }

    #[tokio::test]
    async fn idempotency_key_replays_the_first_booking() {
        let mut test = setup().await;
        let (token, _) = test.register_customer("retry@example.com").await;
        let pet_id = test.create_pet(&token).await;
        let service_id = test.create_service(30).await;
        let body = json!({
            "pet_id": pet_id,
            "service_ids": [service_id],
            "scheduled_at": "2031-05-06T10:00:00Z",
        });
        test.drain_commands();

        let (first_status, first) = test
            .send_with_headers(
                Method::POST,
                "/api/appointments",
                Some(&token),
                Some(body.clone()),
                &[("Idempotency-Key", "booking-1")],
            )
            .await;
        let (second_status, second) = test
            .send_with_headers(
                Method::POST,
                "/api/appointments",
                Some(&token),
                Some(body),
                &[("Idempotency-Key", "booking-1")],
            )
            .await;

        assert_eq!(first_status, StatusCode::CREATED);
        assert_eq!(second_status, StatusCode::CREATED);
        assert_eq!(first["data"]["id"], second["data"]["id"]);
        let created_triggers = test
            .drain_commands()
            .into_iter()
            .filter(|command| matches!(command, AutomationCommand::Trigger(event) if event.trigger_type == "appointment_created"))
            .count();
        assert_eq!(created_triggers, 1);

        let (status, _) = test
            .send_with_headers(
                Method::POST,
                "/api/appointments",
                Some(&token),
                Some(json!({
                    "pet_id": pet_id,
                    "service_ids": [service_id],
                    "scheduled_at": "2031-05-07T10:00:00Z",
                })),
                &[("Idempotency-Key", "booking-1")],
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn overlapping_staff_bookings_conflict_and_mark_slots() {
        let test = setup().await;
        let (customer_token, _) = test.register_customer("slots@example.com").await;
        let (staff_token, staff_id) = test
            .account_with_role("groomer@example.com", UserRole::Staff)
            .await;
        let pet_id = test.create_pet(&customer_token).await;
        let service_id = test.create_service(60).await;

        // 2030-01-07 is a Monday.
        let (status, json) = test
            .send(
                Method::PUT,
                &format!("/api/staff/{staff_id}/availability"),
                Some(&staff_token),
                Some(json!([{ "day_of_week": 0, "start_minute": 540, "end_minute": 1020 }])),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{json}");

        let scheduled_at = Utc.with_ymd_and_hms(2030, 1, 7, 10, 0, 0).unwrap();
        let booking = json!({
            "pet_id": pet_id,
            "service_ids": [service_id],
            "staff_id": staff_id,
            "scheduled_at": scheduled_at,
        });
        let (status, _) = test
            .send(
                Method::POST,
                "/api/appointments",
                Some(&customer_token),
                Some(booking.clone()),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, json) = test
            .send(
                Method::POST,
                "/api/appointments",
                Some(&customer_token),
                Some(json!({
                    "pet_id": pet_id,
                    "service_ids": [service_id],
                    "staff_id": staff_id,
                    "scheduled_at": scheduled_at + Duration::minutes(30),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT, "{json}");

        let date = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        let (status, json) = test
            .send(
                Method::GET,
                &format!("/api/staff/{staff_id}/slots?date={date}"),
                Some(&customer_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let slots = json["data"].as_array().unwrap();
        assert_eq!(slots.len(), 16);
        let unavailable = slots
            .iter()
            .filter(|slot| slot["available"] == false)
            .count();
        assert_eq!(unavailable, 2);

        let tuesday = date.succ_opt().unwrap();
        let (_, json) = test
            .send(
                Method::GET,
                &format!("/api/staff/{staff_id}/slots?date={tuesday}"),
                Some(&customer_token),
                None,
            )
            .await;
        assert!(json["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sla_dashboard_is_staff_only() {
        let test = setup().await;
        let (customer_token, _) = test.register_customer("peek@example.com").await;
        let (admin_token, _) = test
            .account_with_role("admin@example.com", UserRole::Admin)
            .await;

        let (status, _) = test
            .send(Method::GET, "/api/sla/metrics", Some(&customer_token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, json) = test
            .send(Method::GET, "/api/sla/metrics", Some(&admin_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["pending_over_threshold"], 0);

        let (status, json) = test
            .send(Method::GET, "/api/sla/targets", Some(&admin_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"].as_array().unwrap().len(), 3);

        let (status, json) = test
            .send(
                Method::PUT,
                "/api/sla/targets/appointment.pending",
                Some(&admin_token),
                Some(json!({ "threshold_minutes": 120 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["threshold_minutes"], 120);
    }

    #[tokio::test]
    async fn staff_reply_closes_unanswered_chat_incidents() {
        let mut test = setup().await;
        let (customer_token, _) = test.register_customer("chat@example.com").await;
        let (staff_token, _) = test
            .account_with_role("desk@example.com", UserRole::Staff)
            .await;

        let (status, json) = test
            .send(
                Method::POST,
                "/api/conversations",
                Some(&customer_token),
                Some(json!({ "subject": "Nail trim", "body": "Do you trim cat nails?" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        assert_eq!(json["data"]["conversation"]["awaiting_reply"], true);
        let conversation_id: Uuid = json["data"]["conversation"]["id"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();
        test.drain_commands();

        let (status, _) = test
            .send(
                Method::POST,
                &format!("/api/conversations/{conversation_id}/messages"),
                Some(&staff_token),
                Some(json!({ "body": "Yes we do!" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let commands = test.drain_commands();
        assert!(commands.iter().any(|command| matches!(
            command,
            AutomationCommand::CloseIncidents { target_key, entity_id }
                if target_key == "chat.unanswered" && *entity_id == conversation_id
        )));
        assert!(commands.iter().any(|command| matches!(
            command,
            AutomationCommand::Trigger(event)
                if event.trigger_type == "chat_message" && event.payload["sender_role"] == "staff"
        )));
    }

    #[tokio::test]
    async fn payments_emit_a_trigger_and_replay_by_idempotency_key() {
        let mut test = setup().await;
        let (token, customer_id) = test.register_customer("payer@example.com").await;
        let pet_id = test.create_pet(&token).await;
        let service_id = test.create_service(45).await;
        let (status, json) = test
            .send(
                Method::POST,
                "/api/appointments",
                Some(&token),
                Some(json!({
                    "pet_id": pet_id,
                    "service_ids": [service_id],
                    "scheduled_at": "2031-06-02T09:00:00Z",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        let appointment_id = json["data"]["id"].as_str().unwrap().to_string();
        test.drain_commands();

        let body = json!({ "appointment_id": appointment_id, "method": "card" });
        let (first_status, first) = test
            .send_with_headers(
                Method::POST,
                "/api/payments",
                Some(&token),
                Some(body.clone()),
                &[("Idempotency-Key", "pay-1")],
            )
            .await;
        assert_eq!(first_status, StatusCode::CREATED, "{first}");
        assert_eq!(first["data"]["amount_cents"], 6500);
        assert_eq!(first["data"]["customer_id"], customer_id.to_string());

        let (second_status, second) = test
            .send_with_headers(
                Method::POST,
                "/api/payments",
                Some(&token),
                Some(body),
                &[("Idempotency-Key", "pay-1")],
            )
            .await;
        assert_eq!(second_status, StatusCode::CREATED);
        assert_eq!(first["data"]["id"], second["data"]["id"]);

        let payment_triggers: Vec<_> = test
            .drain_commands()
            .into_iter()
            .filter_map(|command| match command {
                AutomationCommand::Trigger(event) if event.trigger_type == "payment_created" => {
                    Some(event)
                }
                _ => None,
            })
            .collect();
        assert_eq!(payment_triggers.len(), 1);
        assert_eq!(payment_triggers[0].payload["payment_id"], first["data"]["id"]);
        assert_eq!(payment_triggers[0].payload["amount_cents"], 6500);

        let (status, _) = test
            .send_with_headers(
                Method::POST,
                "/api/payments",
                Some(&token),
                Some(json!({ "appointment_id": appointment_id, "amount_cents": 100 })),
                &[("Idempotency-Key", "pay-1")],
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, json) = test.send(Method::GET, "/api/payments", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn staff_manage_workflows_and_read_their_runs() {
        let test = setup().await;
        let (staff_token, _) = test
            .account_with_role("ops@example.com", UserRole::Staff)
            .await;
        let (customer_token, _) = test.register_customer("nosy@example.com").await;

        let (status, _) = test
            .send(
                Method::GET,
                "/api/automation/workflows",
                Some(&customer_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, json) = test
            .send(
                Method::POST,
                "/api/automation/workflows",
                Some(&staff_token),
                Some(json!({
                    "name": "Thank-you note",
                    "trigger_type": "payment_created",
                    "conditions": ["method == card"],
                    "actions": [],
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        assert_eq!(json["data"]["is_active"], true);
        let workflow_id = json["data"]["id"].as_str().unwrap().to_string();
        let workflow_uri = format!("/api/automation/workflows/{workflow_id}");

        let (status, json) = test
            .send(
                Method::POST,
                "/api/automation/workflows",
                Some(&staff_token),
                Some(json!({ "name": "  ", "trigger_type": "payment_created" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");

        let (status, json) = test
            .send(
                Method::PUT,
                &workflow_uri,
                Some(&staff_token),
                Some(json!({ "name": "Receipt", "minutes_delay": 15 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["data"]["name"], "Receipt");
        assert_eq!(json["data"]["minutes_delay"], 15);
        assert_eq!(json["data"]["conditions"], json!(["method == card"]));

        let (status, json) = test
            .send(Method::GET, "/api/automation/workflows", Some(&staff_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"].as_array().unwrap().len(), 1);

        let (status, json) = test
            .send(
                Method::GET,
                &format!("{workflow_uri}/runs"),
                Some(&staff_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"], json!([]));

        let (status, _) = test
            .send(Method::DELETE, &workflow_uri, Some(&staff_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = test
            .send(Method::GET, &workflow_uri, Some(&staff_token), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn manual_trigger_is_admin_only_and_records_runs() {
        let test = setup().await;
        let (staff_token, _) = test
            .account_with_role("floor@example.com", UserRole::Staff)
            .await;
        let (admin_token, _) = test
            .account_with_role("boss@example.com", UserRole::Admin)
            .await;

        let (status, json) = test
            .send(
                Method::POST,
                "/api/automation/workflows",
                Some(&staff_token),
                Some(json!({
                    "name": "Big spender",
                    "trigger_type": "payment_created",
                    "conditions": ["method == card"],
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        let workflow_id = json["data"]["id"].as_str().unwrap().to_string();

        let event = json!({
            "trigger_type": "payment_created",
            "payload": { "method": "card", "amount_cents": 12000 },
        });
        let (status, _) = test
            .send(
                Method::POST,
                "/api/automation/trigger",
                Some(&staff_token),
                Some(event.clone()),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, json) = test
            .send(
                Method::POST,
                "/api/automation/trigger",
                Some(&admin_token),
                Some(event),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{json}");
        let runs = json["data"].as_array().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0]["workflow_id"], workflow_id);
        assert_eq!(runs[0]["status"], "completed");

        let (status, json) = test
            .send(
                Method::POST,
                "/api/automation/trigger",
                Some(&admin_token),
                Some(json!({
                    "trigger_type": "payment_created",
                    "payload": { "method": "cash", "amount_cents": 500 },
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"][0]["status"], "skipped");

        for payload in [json!([1]), json!("cash")] {
            let (status, json) = test
                .send(
                    Method::POST,
                    "/api/automation/trigger",
                    Some(&admin_token),
                    Some(json!({ "trigger_type": "payment_created", "payload": payload })),
                )
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");
        }

        let (status, _) = test
            .send(
                Method::POST,
                "/api/automation/trigger",
                Some(&admin_token),
                Some(json!({ "trigger_type": "   " })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = test
            .send(
                Method::GET,
                &format!("/api/automation/workflows/{workflow_id}/runs"),
                Some(&staff_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn catalog_rejects_services_longer_than_a_day() {
        let test = setup().await;
        let (admin_token, _) = test
            .account_with_role("owner@example.com", UserRole::Admin)
            .await;
        let service = |minutes: i32| {
            json!({
                "name": "Spa weekend",
                "price_cents": 50000,
                "duration_minutes": minutes,
            })
        };

        let (status, json) = test
            .send(
                Method::POST,
                "/api/services",
                Some(&admin_token),
                Some(service(1500)),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");

        let (status, json) = test
            .send(
                Method::POST,
                "/api/services",
                Some(&admin_token),
                Some(service(1440)),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        let service_id = json["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = test
            .send(
                Method::PUT,
                &format!("/api/services/{service_id}"),
                Some(&admin_token),
                Some(json!({ "duration_minutes": 100_000 })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
