//! Per-item access control.
//!
//! [`evaluate`] turns one (caller, account) pair into an [`AccountAcl`]
//! capability record. It is a pure function over its inputs; callers
//! recompute it per request and never cache the result.
//!
//! Evaluation order:
//!
//! 1. Application admins get full item-level access, bypassing every
//!    check below except the profile intersection.
//! 2. History views force mutation capabilities off; only viewing and
//!    restoring remain eligible.
//! 3. Ownership: the owner user has full item access; owning-group
//!    members view, and edit when the group edit toggle is set. Accounts
//!    admins evaluate at ownership strength.
//! 4. Explicit grants give view, and edit when the grant says so (or the
//!    account-level secondary edit toggle does). Preset fallback feeds
//!    into the grant sets before evaluation (see [`preset`]).
//! 5. No relation at all is a hard denial: every capability false.
//! 6. Private accounts narrow all of the above to the owner user (or, for
//!    group-private, the owning group); only rule 1 overrides this.
//! 7. Every final capability is the item-level result intersected with
//!    the caller's profile flag for that capability. Admins included.

pub mod preset;

use uuid::Uuid;

use crate::storage::types::{Account, ProfilePermissions, User};

use preset::EffectiveGrants;

/// Vault-wide toggles the evaluation consults. Passed per request rather
/// than read from process state, so tests and embedders control it.
#[derive(Debug, Clone, Copy, Default)]
pub struct AclPolicy {
    /// Whether public account links may be offered at all.
    pub public_links_enabled: bool,
}

/// The caller's identity, as far as access control cares.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub user_id: Uuid,
    pub user_group_id: Uuid,
    pub is_admin_app: bool,
    pub is_admin_acc: bool,
    pub profile: ProfilePermissions,

    /// The request targets a history snapshot rather than the live row.
    pub is_history_view: bool,
}

impl CallerContext {
    pub fn for_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            user_group_id: user.user_group_id,
            is_admin_app: user.is_admin_app,
            is_admin_acc: user.is_admin_acc,
            profile: user.profile,
            is_history_view: false,
        }
    }

    /// Same caller, evaluated against a history snapshot.
    pub fn history_view(mut self) -> Self {
        self.is_history_view = true;
        self
    }
}

/// The account-side facts evaluation needs, with grants already merged.
#[derive(Debug, Clone)]
pub struct AclRequest {
    pub account_id: Uuid,
    pub owner_id: Uuid,
    pub owner_group_id: Uuid,
    pub grants: EffectiveGrants,
    pub is_private: bool,
    pub is_private_group: bool,
    pub other_user_edit: bool,
    pub other_user_group_edit: bool,
}

impl AclRequest {
    pub fn from_account(account: &Account, grants: EffectiveGrants) -> Self {
        Self {
            account_id: account.id,
            owner_id: account.user_id,
            owner_group_id: account.user_group_id,
            grants,
            is_private: account.is_private,
            is_private_group: account.is_private_group,
            other_user_edit: account.other_user_edit,
            other_user_group_edit: account.other_user_group_edit,
        }
    }
}

/// The capability record for one (caller, account) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountAcl {
    pub can_view: bool,
    pub can_view_pass: bool,
    pub can_edit: bool,
    pub can_edit_pass: bool,
    pub can_delete: bool,
    pub can_restore: bool,
    pub can_copy: bool,
    pub can_show_link: bool,
    pub can_request_change: bool,
}

impl AccountAcl {
    /// True when no capability is granted.
    pub fn is_denied(&self) -> bool {
        *self == Self::default()
    }
}

/// Compute the capability record for one request. Pure; no side effects.
pub fn evaluate(request: &AclRequest, caller: &CallerContext, policy: &AclPolicy) -> AccountAcl {
    let profile = &caller.profile;
    let is_owner = caller.user_id == request.owner_id;
    let in_owner_group = caller.user_group_id == request.owner_group_id;

    let (item_view, item_edit) = if caller.is_admin_app {
        (true, true)
    } else {
        item_access(request, caller, is_owner, in_owner_group)
    };

    // Rule 5: no relation, nothing to intersect.
    if !item_view {
        tracing::debug!(
            account_id = %request.account_id,
            user_id = %caller.user_id,
            "access denied"
        );
        return AccountAcl::default();
    }

    let history = caller.is_history_view;

    let can_view = if history {
        profile.acc_view_history
    } else {
        profile.acc_view
    };
    let can_edit = !history && item_edit && profile.acc_edit;

    AccountAcl {
        can_view,
        can_view_pass: profile.acc_view_pass,
        can_edit,
        can_edit_pass: !history && item_edit && profile.acc_edit_pass,
        can_delete: !history && item_edit && profile.acc_delete,
        can_restore: history && (caller.is_admin_app || is_owner) && profile.acc_edit,
        can_copy: !history && can_view && profile.acc_add && profile.acc_view_pass,
        can_show_link: !history && can_view && policy.public_links_enabled,
        can_request_change: !history && can_view && !can_edit,
    }
}

/// Rules 3, 4 and 6: ownership, grants, private narrowing.
fn item_access(
    request: &AclRequest,
    caller: &CallerContext,
    is_owner: bool,
    in_owner_group: bool,
) -> (bool, bool) {
    // Rule 6 gates everything below it.
    let private_block = (request.is_private && !is_owner)
        || (request.is_private_group && !in_owner_group);
    if private_block {
        return (false, false);
    }

    let owner_strength = is_owner || caller.is_admin_acc;

    let granted_user = request.grants.view_users.contains(&caller.user_id);
    let granted_user_edit = request.grants.edit_users.contains(&caller.user_id)
        || (granted_user && request.other_user_edit);

    let granted_group = request.grants.view_groups.contains(&caller.user_group_id);
    let granted_group_edit = request.grants.edit_groups.contains(&caller.user_group_id)
        || (granted_group && request.other_user_group_edit);

    let view = owner_strength || in_owner_group || granted_user || granted_group;
    let edit = owner_strength
        || (in_owner_group && request.other_user_group_edit)
        || granted_user_edit
        || granted_group_edit;

    (view, edit)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        request: AclRequest,
        owner: Uuid,
        owner_group: Uuid,
    }

    fn fixture() -> Fixture {
        let owner = Uuid::new_v4();
        let owner_group = Uuid::new_v4();
        Fixture {
            request: AclRequest {
                account_id: Uuid::new_v4(),
                owner_id: owner,
                owner_group_id: owner_group,
                grants: EffectiveGrants::default(),
                is_private: false,
                is_private_group: false,
                other_user_edit: false,
                other_user_group_edit: false,
            },
            owner,
            owner_group,
        }
    }

    fn caller(user_id: Uuid, group_id: Uuid) -> CallerContext {
        CallerContext {
            user_id,
            user_group_id: group_id,
            is_admin_app: false,
            is_admin_acc: false,
            profile: ProfilePermissions::all(),
            is_history_view: false,
        }
    }

    fn stranger() -> CallerContext {
        caller(Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn test_owner_has_full_access() {
        let fx = fixture();
        let acl = evaluate(
            &fx.request,
            &caller(fx.owner, fx.owner_group),
            &AclPolicy::default(),
        );
        assert!(acl.can_view && acl.can_view_pass);
        assert!(acl.can_edit && acl.can_edit_pass && acl.can_delete);
        assert!(acl.can_copy);
        assert!(!acl.can_restore);
        assert!(!acl.can_request_change);
    }

    #[test]
    fn test_stranger_hard_denied() {
        let fx = fixture();
        let acl = evaluate(&fx.request, &stranger(), &AclPolicy::default());
        assert!(acl.is_denied());
    }

    #[test]
    fn test_group_member_views_but_edit_needs_toggle() {
        let mut fx = fixture();
        let member = caller(Uuid::new_v4(), fx.owner_group);

        let acl = evaluate(&fx.request, &member, &AclPolicy::default());
        assert!(acl.can_view);
        assert!(!acl.can_edit);
        assert!(acl.can_request_change);

        fx.request.other_user_group_edit = true;
        let acl = evaluate(&fx.request, &member, &AclPolicy::default());
        assert!(acl.can_edit);
        assert!(!acl.can_request_change);
    }

    #[test]
    fn test_granted_user_view_and_edit_follow_grant() {
        let mut fx = fixture();
        let viewer = stranger();
        fx.request.grants.view_users.insert(viewer.user_id);

        let acl = evaluate(&fx.request, &viewer, &AclPolicy::default());
        assert!(acl.can_view);
        assert!(!acl.can_edit);

        fx.request.grants.edit_users.insert(viewer.user_id);
        let acl = evaluate(&fx.request, &viewer, &AclPolicy::default());
        assert!(acl.can_edit);
    }

    #[test]
    fn test_other_user_edit_toggle_lifts_view_grant_to_edit() {
        let mut fx = fixture();
        let viewer = stranger();
        fx.request.grants.view_users.insert(viewer.user_id);
        fx.request.other_user_edit = true;

        let acl = evaluate(&fx.request, &viewer, &AclPolicy::default());
        assert!(acl.can_edit);
    }

    #[test]
    fn test_granted_group_follows_grant() {
        let mut fx = fixture();
        let member = stranger();
        fx.request.grants.view_groups.insert(member.user_group_id);

        let acl = evaluate(&fx.request, &member, &AclPolicy::default());
        assert!(acl.can_view);
        assert!(!acl.can_edit);

        fx.request.grants.edit_groups.insert(member.user_group_id);
        let acl = evaluate(&fx.request, &member, &AclPolicy::default());
        assert!(acl.can_edit);
    }

    #[test]
    fn test_private_shadows_explicit_grant() {
        let mut fx = fixture();
        let viewer = stranger();
        fx.request.grants.view_users.insert(viewer.user_id);
        fx.request.grants.edit_users.insert(viewer.user_id);
        fx.request.is_private = true;

        let acl = evaluate(&fx.request, &viewer, &AclPolicy::default());
        assert!(acl.is_denied());
    }

    #[test]
    fn test_private_still_admits_owner() {
        let mut fx = fixture();
        fx.request.is_private = true;
        let acl = evaluate(
            &fx.request,
            &caller(fx.owner, fx.owner_group),
            &AclPolicy::default(),
        );
        assert!(acl.can_view && acl.can_edit);
    }

    #[test]
    fn test_private_group_narrows_to_owning_group() {
        let mut fx = fixture();
        fx.request.is_private_group = true;

        let member = caller(Uuid::new_v4(), fx.owner_group);
        assert!(evaluate(&fx.request, &member, &AclPolicy::default()).can_view);

        let outsider = stranger();
        fx.request.grants.view_users.insert(outsider.user_id);
        assert!(evaluate(&fx.request, &outsider, &AclPolicy::default()).is_denied());
    }

    #[test]
    fn test_admin_acc_has_ownership_strength() {
        let fx = fixture();
        let mut admin = stranger();
        admin.is_admin_acc = true;

        let acl = evaluate(&fx.request, &admin, &AclPolicy::default());
        assert!(acl.can_view && acl.can_edit && acl.can_delete);
    }

    #[test]
    fn test_admin_acc_blocked_by_private() {
        let mut fx = fixture();
        fx.request.is_private = true;
        let mut admin = stranger();
        admin.is_admin_acc = true;

        let acl = evaluate(&fx.request, &admin, &AclPolicy::default());
        assert!(acl.is_denied());
    }

    #[test]
    fn test_admin_app_bypasses_private() {
        let mut fx = fixture();
        fx.request.is_private = true;
        let mut admin = stranger();
        admin.is_admin_app = true;

        let acl = evaluate(&fx.request, &admin, &AclPolicy::default());
        assert!(acl.can_view && acl.can_edit && acl.can_delete);
    }

    #[test]
    fn test_admin_app_still_intersects_profile() {
        let fx = fixture();
        let mut admin = stranger();
        admin.is_admin_app = true;
        admin.profile.acc_view_pass = false;

        let acl = evaluate(&fx.request, &admin, &AclPolicy::default());
        assert!(acl.can_view);
        assert!(!acl.can_view_pass);
        assert!(!acl.can_copy);
    }

    #[test]
    fn test_profile_flags_gate_each_capability() {
        let fx = fixture();
        let mut owner = caller(fx.owner, fx.owner_group);
        owner.profile = ProfilePermissions {
            acc_view: true,
            acc_edit: true,
            ..Default::default()
        };

        let acl = evaluate(&fx.request, &owner, &AclPolicy::default());
        assert!(acl.can_view && acl.can_edit);
        assert!(!acl.can_view_pass && !acl.can_edit_pass);
        assert!(!acl.can_delete && !acl.can_copy);
    }

    #[test]
    fn test_history_view_forces_mutation_off() {
        let fx = fixture();
        let owner = caller(fx.owner, fx.owner_group).history_view();

        let acl = evaluate(&fx.request, &owner, &AclPolicy::default());
        assert!(acl.can_view);
        assert!(acl.can_view_pass);
        assert!(!acl.can_edit && !acl.can_edit_pass && !acl.can_delete);
        assert!(!acl.can_copy && !acl.can_request_change);
        assert!(acl.can_restore);
    }

    #[test]
    fn test_history_view_gated_by_history_profile_flag() {
        let fx = fixture();
        let mut owner = caller(fx.owner, fx.owner_group).history_view();
        owner.profile.acc_view_history = false;

        let acl = evaluate(&fx.request, &owner, &AclPolicy::default());
        assert!(!acl.can_view);
    }

    #[test]
    fn test_restore_needs_owner_or_admin_app_plus_edit_flag() {
        let mut fx = fixture();
        fx.request.other_user_group_edit = true;

        let member = caller(Uuid::new_v4(), fx.owner_group).history_view();
        let acl = evaluate(&fx.request, &member, &AclPolicy::default());
        assert!(!acl.can_restore);

        let mut admin = stranger().history_view();
        admin.is_admin_app = true;
        assert!(evaluate(&fx.request, &admin, &AclPolicy::default()).can_restore);

        let mut owner = caller(fx.owner, fx.owner_group).history_view();
        owner.profile.acc_edit = false;
        assert!(!evaluate(&fx.request, &owner, &AclPolicy::default()).can_restore);
    }

    #[test]
    fn test_show_link_requires_policy() {
        let fx = fixture();
        let owner = caller(fx.owner, fx.owner_group);

        assert!(!evaluate(&fx.request, &owner, &AclPolicy::default()).can_show_link);

        let policy = AclPolicy {
            public_links_enabled: true,
        };
        assert!(evaluate(&fx.request, &owner, &policy).can_show_link);
    }
}
