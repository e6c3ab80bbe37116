//! Proptest generators for property-based testing.

use proptest::prelude::*;

use keyward_core::{KeyId, RawKey, Role, KEY_PAYLOAD_LEN, KEY_SEPARATOR};
use keyward_perms::{Permission, PermissionSet};

/// Generate a role.
pub fn role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Admin), Just(Role::Analyst), Just(Role::Client)]
}

/// Generate a random KeyId.
pub fn key_id() -> impl Strategy<Value = KeyId> {
    any::<[u8; 16]>().prop_map(KeyId::from_bytes)
}

/// Generate a well-formed raw key: `{prefix}_{40 base62}`.
pub fn raw_key() -> impl Strategy<Value = RawKey> {
    let payload = format!("[0-9A-Za-z]{{{KEY_PAYLOAD_LEN}}}");
    (role(), proptest::string::string_regex(&payload).unwrap()).prop_map(|(role, payload)| {
        RawKey::new(format!("{}{}{}", role.prefix(), KEY_SEPARATOR, payload))
    })
}

/// Generate an arbitrary presented value, well-formed or not.
pub fn presented_value() -> impl Strategy<Value = String> {
    prop_oneof![
        raw_key().prop_map(|k| k.expose().to_string()),
        "[ -~]{0,64}",
    ]
}

/// Generate a permission segment: an identifier or the wildcard.
pub fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-z][a-z0-9_-]{0,11}",
        1 => Just("*".to_string()),
    ]
}

/// Generate a well-formed permission, flat or scoped.
pub fn permission() -> impl Strategy<Value = Permission> {
    prop_oneof![
        "[a-z][a-z0-9_-]{0,11}".prop_map(Permission::flat),
        (segment(), segment()).prop_map(|(r, a)| Permission::scoped(r, a)),
    ]
}

/// Generate a concrete requirement (no wildcards).
pub fn requirement() -> impl Strategy<Value = Permission> {
    ("[a-z][a-z0-9_-]{0,11}", "[a-z][a-z0-9_-]{0,11}")
        .prop_map(|(r, a)| Permission::scoped(r, a))
}

/// Generate a permission set of up to `max` grants.
pub fn permission_set(max: usize) -> impl Strategy<Value = PermissionSet> {
    prop::collection::vec(permission(), 0..=max).prop_map(|grants| grants.into_iter().collect())
}

/// Generate a permission string that must be rejected at parse time.
pub fn malformed_permission() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just(":".to_string()),
        "[a-z]{1,8}:".prop_map(String::from),
        ":[a-z]{1,8}".prop_map(String::from),
        "[a-z]{1,4}:[a-z]{1,4}:[a-z]{1,4}".prop_map(String::from),
        "[a-z]{1,4} [a-z]{1,4}".prop_map(String::from),
    ]
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=i64::MAX / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn raw_keys_are_well_formed(key in raw_key()) {
            let raw = key.expose();
            prop_assert_eq!(raw.len(), 44);
            prop_assert!(key.role_hint().is_some());
        }

        #[test]
        fn malformed_permissions_are_rejected(s in malformed_permission()) {
            prop_assert!(Permission::parse(&s).is_err());
        }

        #[test]
        fn generated_permissions_roundtrip(p in permission()) {
            prop_assert_eq!(Permission::parse(&p.to_string()).unwrap(), p);
        }
    }
}
