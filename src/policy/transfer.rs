use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::entities::store_location;

/// Why a transfer was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDenial {
    TransfersDisabled,
    SameBranch,
    TargetNotAuthorized,
}

/// Outcome of evaluating a stock transfer request against the source
/// branch's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "decision", content = "reason")]
pub enum TransferDecision {
    Allowed,
    RequiresApproval,
    Denied(TransferDenial),
}

impl TransferDecision {
    pub fn is_permitted(&self) -> bool {
        !matches!(self, TransferDecision::Denied(_))
    }
}

/// Evaluates whether `source` may transfer stock to `target_id`.
///
/// An empty `can_transfer_to_branches` set means "no restriction": the
/// seeded default is permissive, and restriction is opted into by listing
/// targets. Target existence/activeness is the caller's concern (validated
/// via `SchemaRegistry::validate_transfer_targets`).
pub fn evaluate(source: &store_location::Model, target_id: Uuid) -> TransferDecision {
    if !source.allow_stock_transfer {
        return TransferDecision::Denied(TransferDenial::TransfersDisabled);
    }
    if source.id == target_id {
        return TransferDecision::Denied(TransferDenial::SameBranch);
    }

    let targets = source.transfer_targets();
    if !targets.is_empty() && !targets.contains(&target_id) {
        debug!(
            branch = %source.code,
            %target_id,
            "transfer target outside authorized set"
        );
        return TransferDecision::Denied(TransferDenial::TargetNotAuthorized);
    }

    if source.require_approval_for_transfers {
        TransferDecision::RequiresApproval
    } else {
        TransferDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::test_support::branch_fixture;

    #[test]
    fn unrestricted_branch_allows_any_target() {
        let branch = branch_fixture();
        assert_eq!(
            evaluate(&branch, Uuid::new_v4()),
            TransferDecision::Allowed
        );
    }

    #[test]
    fn disabled_transfers_deny_everything() {
        let mut branch = branch_fixture();
        branch.allow_stock_transfer = false;
        branch.can_transfer_to_branches = serde_json::json!([Uuid::new_v4().to_string()]);

        assert_eq!(
            evaluate(&branch, Uuid::new_v4()),
            TransferDecision::Denied(TransferDenial::TransfersDisabled)
        );
    }

    #[test]
    fn self_transfer_is_denied() {
        let branch = branch_fixture();
        assert_eq!(
            evaluate(&branch, branch.id),
            TransferDecision::Denied(TransferDenial::SameBranch)
        );
    }

    #[test]
    fn target_set_restricts_when_non_empty() {
        let authorized = Uuid::new_v4();
        let mut branch = branch_fixture();
        branch.can_transfer_to_branches = serde_json::json!([authorized.to_string()]);

        assert_eq!(evaluate(&branch, authorized), TransferDecision::Allowed);
        assert_eq!(
            evaluate(&branch, Uuid::new_v4()),
            TransferDecision::Denied(TransferDenial::TargetNotAuthorized)
        );
    }

    #[test]
    fn approval_gate_applies_after_authorization() {
        let authorized = Uuid::new_v4();
        let mut branch = branch_fixture();
        branch.require_approval_for_transfers = true;
        branch.can_transfer_to_branches = serde_json::json!([authorized.to_string()]);

        assert_eq!(
            evaluate(&branch, authorized),
            TransferDecision::RequiresApproval
        );
        assert_eq!(
            evaluate(&branch, Uuid::new_v4()),
            TransferDecision::Denied(TransferDenial::TargetNotAuthorized)
        );
    }
}
