//! Route Approver
//!
//! Reconciles a device's enabled subnet routes with what it advertises.

use std::collections::BTreeSet;

use launchlab_kit::StageOutcome;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client::TailnetClient;
use crate::device::null_as_default;

/// Advertised and enabled routes of one device
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSet {
    #[serde(default, deserialize_with = "null_as_default")]
    pub advertised_routes: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub enabled_routes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SetRoutesRequest<'a> {
    routes: &'a [String],
}

/// What the approver will do for a given route set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePlan {
    /// Enabled already equals advertised; no write
    AlreadySatisfied,
    /// Replace the enabled set with `routes`
    Enable { routes: Vec<String>, fallback: bool },
}

/// Decide what to write.
///
/// An empty advertised list is replaced by `fallback_subnet` (pre-approval
/// for a device that is still starting up) and always produces a write.
/// Otherwise the advertised routes are compared to the enabled ones as sets.
pub fn plan_routes(current: &RouteSet, fallback_subnet: &str) -> RoutePlan {
    if current.advertised_routes.is_empty() {
        return RoutePlan::Enable {
            routes: vec![fallback_subnet.to_string()],
            fallback: true,
        };
    }

    let advertised: BTreeSet<&str> = current.advertised_routes.iter().map(String::as_str).collect();
    let enabled: BTreeSet<&str> = current.enabled_routes.iter().map(String::as_str).collect();

    if advertised == enabled {
        RoutePlan::AlreadySatisfied
    } else {
        RoutePlan::Enable {
            routes: current.advertised_routes.clone(),
            fallback: false,
        }
    }
}

/// Approve the advertised subnet routes of `device_id`.
///
/// The write is a full replace. Success means the write call succeeded; the
/// enabled list in the response is only logged.
pub async fn approve_subnet_routes(
    client: &TailnetClient,
    device_id: &str,
    fallback_subnet: &str,
) -> StageOutcome {
    info!("Getting advertised routes for device...");
    let path = format!("/device/{}/routes", device_id);

    let current: RouteSet = match client.get_json(&path).await {
        Ok(current) => current,
        Err(e) => {
            warn!("✗ Failed to get device routes");
            return StageOutcome::failed(e);
        }
    };

    info!("  Advertised routes: {:?}", current.advertised_routes);
    info!("  Enabled routes: {:?}", current.enabled_routes);

    let routes = match plan_routes(&current, fallback_subnet) {
        RoutePlan::AlreadySatisfied => {
            info!("✓ Routes already approved");
            return StageOutcome::AlreadySatisfied;
        }
        RoutePlan::Enable { routes, fallback } => {
            if fallback {
                warn!("⚠ No advertised routes found. Device may still be starting up.");
                info!("  Expected route: {}", fallback_subnet);
            }
            routes
        }
    };

    info!("Approving subnet routes: {:?}", routes);
    match client.post(&path, &SetRoutesRequest { routes: &routes }).await {
        Ok(response) => {
            let enabled: Vec<&str> = response
                .get("enabledRoutes")
                .and_then(|v| v.as_array())
                .map(|routes| routes.iter().filter_map(|r| r.as_str()).collect())
                .unwrap_or_default();
            info!("✓ Subnet routes approved: {:?}", enabled);
            StageOutcome::Applied
        }
        Err(e) => {
            warn!("✗ Failed to approve subnet routes");
            StageOutcome::failed(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SUBNET: &str = "172.20.0.0/16";

    fn routes(advertised: &[&str], enabled: &[&str]) -> RouteSet {
        RouteSet {
            advertised_routes: advertised.iter().map(|r| r.to_string()).collect(),
            enabled_routes: enabled.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_equal_sets_ignore_order() {
        let current = routes(&["10.0.0.0/8", SUBNET], &[SUBNET, "10.0.0.0/8"]);
        assert_eq!(plan_routes(&current, SUBNET), RoutePlan::AlreadySatisfied);
    }

    #[test]
    fn test_enables_exactly_advertised() {
        let current = routes(&[SUBNET, "10.0.0.0/8"], &["192.168.0.0/24"]);
        assert_eq!(
            plan_routes(&current, "unused"),
            RoutePlan::Enable {
                routes: vec![SUBNET.to_string(), "10.0.0.0/8".to_string()],
                fallback: false,
            }
        );
    }

    #[test]
    fn test_empty_advertised_always_writes_fallback() {
        // Even when the fallback is already enabled
        let current = routes(&[], &[SUBNET]);
        assert_eq!(
            plan_routes(&current, SUBNET),
            RoutePlan::Enable {
                routes: vec![SUBNET.to_string()],
                fallback: true,
            }
        );
    }

    #[test]
    fn test_route_set_tolerates_missing_fields() {
        let parsed: RouteSet = serde_json::from_value(json!({"advertisedRoutes": [SUBNET]})).unwrap();
        assert_eq!(parsed, routes(&[SUBNET], &[]));
    }

    #[test]
    fn test_route_set_null_lists_are_empty() {
        let parsed: RouteSet =
            serde_json::from_value(json!({"advertisedRoutes": null, "enabledRoutes": null})).unwrap();
        assert_eq!(parsed, RouteSet::default());
    }

    async fn setup(current: serde_json::Value) -> (MockServer, TailnetClient) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/device/42/routes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current))
            .mount(&server)
            .await;
        let client = TailnetClient::new("t", "example.com").unwrap().with_base_url(server.uri());
        (server, client)
    }

    #[tokio::test]
    async fn test_no_write_when_already_enabled() {
        let (server, client) = setup(json!({
            "advertisedRoutes": [SUBNET],
            "enabledRoutes": [SUBNET]
        }))
        .await;

        Mock::given(method("POST"))
            .and(path("/device/42/routes"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = approve_subnet_routes(&client, "42", SUBNET).await;
        assert_eq!(outcome, StageOutcome::AlreadySatisfied);
    }

    #[tokio::test]
    async fn test_fallback_written_once() {
        let (server, client) = setup(json!({"advertisedRoutes": [], "enabledRoutes": []})).await;

        Mock::given(method("POST"))
            .and(path("/device/42/routes"))
            .and(body_json(json!({"routes": [SUBNET]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "advertisedRoutes": [],
                "enabledRoutes": [SUBNET]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = approve_subnet_routes(&client, "42", SUBNET).await;
        assert_eq!(outcome, StageOutcome::Applied);
    }

    #[tokio::test]
    async fn test_null_advertised_routes_write_fallback() {
        let (server, client) = setup(json!({"advertisedRoutes": null, "enabledRoutes": null})).await;

        Mock::given(method("POST"))
            .and(path("/device/42/routes"))
            .and(body_json(json!({"routes": [SUBNET]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"enabledRoutes": [SUBNET]})))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(approve_subnet_routes(&client, "42", SUBNET).await, StageOutcome::Applied);
    }

    #[tokio::test]
    async fn test_success_ignores_response_contents() {
        let (server, client) = setup(json!({"advertisedRoutes": [SUBNET], "enabledRoutes": []})).await;

        Mock::given(method("POST"))
            .and(path("/device/42/routes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"enabledRoutes": []})))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(approve_subnet_routes(&client, "42", SUBNET).await, StageOutcome::Applied);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_stage_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/device/42/routes"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/device/42/routes"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = TailnetClient::new("t", "example.com").unwrap().with_base_url(server.uri());
        let outcome = approve_subnet_routes(&client, "42", SUBNET).await;
        assert!(matches!(outcome, StageOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_write_rejection_is_stage_failure() {
        let (server, client) = setup(json!({"advertisedRoutes": [SUBNET], "enabledRoutes": []})).await;

        Mock::given(method("POST"))
            .and(path("/device/42/routes"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let outcome = approve_subnet_routes(&client, "42", SUBNET).await;
        assert!(matches!(outcome, StageOutcome::Failed(_)));
    }
}
