//! Permission sets and the resolver.
//!
//! A principal holds a [`PermissionSet`]. A requirement is satisfied when
//! any single grant in the set satisfies it, so a set holding both flat
//! and scoped grants gets the union of both (the most permissive reading).

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::permission::Permission;

/// An insertion-ordered, duplicate-free set of grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet {
    grants: Vec<Permission>,
}

impl PermissionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every string, failing on the first malformed one.
    pub fn parse<I, S>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for item in items {
            set.insert(Permission::parse(item.as_ref())?);
        }
        Ok(set)
    }

    /// Add a grant. Returns `false` if it was already present.
    pub fn insert(&mut self, permission: Permission) -> bool {
        if self.grants.contains(&permission) {
            return false;
        }
        self.grants.push(permission);
        true
    }

    /// Whether any grant satisfies `required`.
    pub fn allows(&self, required: &Permission) -> bool {
        self.grants.iter().any(|g| g.grants(required))
    }

    /// Parse `required` and check it.
    pub fn allows_str(&self, required: &str) -> Result<bool> {
        Ok(self.allows(&Permission::parse(required)?))
    }

    /// Merge another set into this one, keeping order.
    pub fn extend(&mut self, other: &PermissionSet) {
        for p in other.iter() {
            self.insert(p.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.grants.iter()
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// The string form of every grant, in order.
    pub fn to_strings(&self) -> Vec<String> {
        self.grants.iter().map(Permission::to_string).collect()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        let mut set = Self::new();
        for p in iter {
            set.insert(p);
        }
        set
    }
}

/// Whether `granted` satisfies `required`.
pub fn matches(granted: &PermissionSet, required: &Permission) -> bool {
    granted.allows(required)
}
