//! Default permission presets.
//!
//! Presets fill the gap when an account carries no explicit grant rows.
//! A preset is matched against the account's owner context (owner user,
//! owning group, or the owner's profile template) and its bundle stands
//! in for the missing grant rows. Presets flagged `fixed` contribute even
//! when explicit grants exist. Lower priority values win.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::types::AccountGrants;

/// Who a preset applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PresetTarget {
    /// A single user
    User(Uuid),
    /// Every member of a group
    Group(Uuid),
    /// Every user on a profile template
    Profile(Uuid),
}

/// The grant lists a preset contributes when it applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionBundle {
    #[serde(default)]
    pub view_users: Vec<Uuid>,

    #[serde(default)]
    pub edit_users: Vec<Uuid>,

    #[serde(default)]
    pub view_groups: Vec<Uuid>,

    #[serde(default)]
    pub edit_groups: Vec<Uuid>,
}

/// A stored permission preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultPermissionPreset {
    /// Unique identifier
    pub id: Uuid,

    /// Selection order; lower wins
    pub priority: i32,

    /// Applies even when the account has explicit grant rows
    pub fixed: bool,

    /// Who this preset is for
    pub target: PresetTarget,

    /// What it contributes
    pub bundle: PermissionBundle,
}

impl DefaultPermissionPreset {
    /// Does this preset apply to an account with the given owner context?
    pub fn matches(
        &self,
        owner_id: Uuid,
        owner_group_id: Uuid,
        owner_profile_id: Option<Uuid>,
    ) -> bool {
        match self.target {
            PresetTarget::User(id) => id == owner_id,
            PresetTarget::Group(id) => id == owner_group_id,
            PresetTarget::Profile(id) => owner_profile_id == Some(id),
        }
    }
}

/// The grant sets access control evaluates against, after explicit grants
/// and preset fallback are merged. Edit membership implies view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveGrants {
    pub view_users: HashSet<Uuid>,
    pub edit_users: HashSet<Uuid>,
    pub view_groups: HashSet<Uuid>,
    pub edit_groups: HashSet<Uuid>,
}

impl EffectiveGrants {
    /// Lift explicit grant rows into grant sets.
    pub fn from_explicit(grants: &AccountGrants) -> Self {
        let mut eff = Self::default();
        for grant in &grants.users {
            eff.view_users.insert(grant.user_id);
            if grant.is_edit {
                eff.edit_users.insert(grant.user_id);
            }
        }
        for grant in &grants.groups {
            eff.view_groups.insert(grant.user_group_id);
            if grant.is_edit {
                eff.edit_groups.insert(grant.user_group_id);
            }
        }
        eff
    }

    fn absorb(&mut self, bundle: &PermissionBundle) {
        self.view_users.extend(&bundle.view_users);
        self.view_groups.extend(&bundle.view_groups);
        for id in &bundle.edit_users {
            self.view_users.insert(*id);
            self.edit_users.insert(*id);
        }
        for id in &bundle.edit_groups {
            self.view_groups.insert(*id);
            self.edit_groups.insert(*id);
        }
    }
}

/// Merge an account's explicit grants with its preset fallback.
///
/// The owner context identifies the account: its owner user, owning group
/// and the owner's profile template. With no explicit rows, the
/// highest-priority matching preset applies. With explicit rows, only a
/// `fixed` preset still contributes.
pub fn merge_grants(
    explicit: &AccountGrants,
    presets: &[DefaultPermissionPreset],
    owner_id: Uuid,
    owner_group_id: Uuid,
    owner_profile_id: Option<Uuid>,
) -> EffectiveGrants {
    let mut effective = EffectiveGrants::from_explicit(explicit);

    let mut matching: Vec<&DefaultPermissionPreset> = presets
        .iter()
        .filter(|p| p.matches(owner_id, owner_group_id, owner_profile_id))
        .collect();
    matching.sort_by_key(|p| p.priority);

    let chosen = if explicit.is_empty() {
        matching.first()
    } else {
        matching.iter().find(|p| p.fixed)
    };

    if let Some(preset) = chosen {
        effective.absorb(&preset.bundle);
    }

    effective
}
