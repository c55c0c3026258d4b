//! Auto-Approver Policy Updater
//!
//! Read-modify-write of the tailnet policy document. Only the missing
//! `autoApprovers.routes` entry is added; every other field goes back
//! exactly as it came, in the same order.

use launchlab_kit::StageOutcome;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::client::TailnetClient;

/// Principal granted auto-approval for the subnet
pub const DEFAULT_APPROVER: &str = "autogroup:admin";

/// Result of merging an approver into a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeResult {
    /// The CIDR already had an entry; the document is untouched
    AlreadyPresent,
    /// The entry was inserted
    Inserted,
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy document is not a JSON object")]
    NotAnObject,
}

/// Insert `cidr -> principals` under `autoApprovers.routes` unless the CIDR
/// is already a key there (whatever principals it lists).
///
/// Missing or non-object `autoApprovers` / `routes` containers are replaced
/// with empty objects in place.
pub fn merge_auto_approver(
    policy: &mut Value,
    cidr: &str,
    principals: &[&str],
) -> Result<MergeResult, PolicyError> {
    let document = policy.as_object_mut().ok_or(PolicyError::NotAnObject)?;

    let present = document
        .get("autoApprovers")
        .and_then(|approvers| approvers.get("routes"))
        .and_then(Value::as_object)
        .is_some_and(|routes| routes.contains_key(cidr));
    if present {
        return Ok(MergeResult::AlreadyPresent);
    }

    // take() leaves the key in place, so re-inserting keeps document order
    let mut approvers = match document.get_mut("autoApprovers").map(Value::take) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    let mut routes = match approvers.get_mut("routes").map(Value::take) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    routes.insert(
        cidr.to_string(),
        Value::Array(principals.iter().map(|p| Value::String(p.to_string())).collect()),
    );
    approvers.insert("routes".to_string(), Value::Object(routes));
    document.insert("autoApprovers".to_string(), Value::Object(approvers));

    Ok(MergeResult::Inserted)
}

/// Make sure future advertisements of `cidr` are approved automatically.
///
/// Never fatal; the caller treats the outcome as informational.
pub async fn configure_auto_approvers(client: &TailnetClient, cidr: &str) -> StageOutcome {
    info!("Configuring auto-approvers for subnet routes...");
    let path = client.tailnet_path("acl");

    let mut policy = match client.get(&path).await {
        Ok(policy) => policy,
        Err(e) => {
            warn!("⚠ Could not get current policy. Auto-approvers not configured.");
            info!("  You can manually add autoApprovers in the Tailscale admin console.");
            return StageOutcome::failed(e);
        }
    };

    match merge_auto_approver(&mut policy, cidr, &[DEFAULT_APPROVER]) {
        Ok(MergeResult::AlreadyPresent) => {
            info!("✓ Auto-approver already configured for {}", cidr);
            return StageOutcome::AlreadySatisfied;
        }
        Ok(MergeResult::Inserted) => {
            info!("  Adding auto-approver for {} ({})", cidr, DEFAULT_APPROVER);
        }
        Err(e) => {
            warn!("⚠ Failed to configure auto-approvers: {}", e);
            return StageOutcome::failed(e);
        }
    }

    match client.post(&path, &policy).await {
        Ok(_) => {
            info!("✓ Auto-approvers configured for {}", cidr);
            StageOutcome::Applied
        }
        Err(e) => {
            warn!("⚠ Failed to configure auto-approvers");
            info!("  You can manually add autoApprovers in the Tailscale admin console:");
            info!(
                r#"  "autoApprovers": {{"routes": {{"{}": ["{}"]}}}}"#,
                cidr, DEFAULT_APPROVER
            );
            StageOutcome::failed(e)
        }
    }
}
