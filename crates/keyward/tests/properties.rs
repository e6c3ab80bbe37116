//! Properties over generated keys, grants and presented values.

use std::sync::Arc;

use proptest::prelude::*;

use keyward::core::RawKey;
use keyward::perms::{Permission, PermissionSet};
use keyward::store::{KeyStatus, KeyStore, MemoryStore};
use keyward::{LegacyConfig, LegacyRegistry, RateLimiter, Rejection, Role, Validator};
use keyward_testkit::generators::{
    key_id, permission_set, presented_value, raw_key, requirement, role, timestamp,
};
use keyward_testkit::RecordBuilder;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_extra_grants_never_revoke_access(
        granted in permission_set(6),
        extra in permission_set(4),
        required in requirement(),
    ) {
        let mut merged = granted.clone();
        merged.extend(&extra);
        if granted.allows(&required) {
            prop_assert!(merged.allows(&required));
        }
    }

    #[test]
    fn prop_superuser_allows_everything(granted in permission_set(6), required in requirement()) {
        let mut granted = granted;
        granted.insert(Permission::scoped("*", "*"));
        prop_assert!(granted.allows(&required));
    }

    #[test]
    fn prop_unrelated_resources_are_denied(
        granted in permission_set(6),
        required in requirement(),
    ) {
        let (resource, _) = required.canonical();
        let related = granted.iter().any(|g| {
            let (r, _) = g.canonical();
            r == "*" || r == resource
        });
        if !related {
            prop_assert!(!granted.allows(&required));
        }
    }

    #[test]
    fn prop_stored_form_keeps_decisions(granted in permission_set(6), required in requirement()) {
        let reloaded = PermissionSet::parse(granted.to_strings()).unwrap();
        prop_assert_eq!(reloaded.allows(&required), granted.allows(&required));
    }

    #[test]
    fn prop_rate_limits_are_per_key(a in key_id(), b in key_id(), now in timestamp()) {
        prop_assume!(a != b);
        let limiter = RateLimiter::new();
        prop_assert!(limiter.check(a, 1, now).is_ok());
        prop_assert!(limiter.check(a, 1, now).is_err());
        prop_assert!(limiter.check(b, 1, now).is_ok());
    }

    #[test]
    fn prop_expiry_boundary(
        key in raw_key(),
        created in timestamp(),
        ttl in 1i64..1_000_000_000,
    ) {
        let role = key.role_hint().unwrap_or(Role::Client);
        let record = RecordBuilder::new(&key, role)
            .created_at(created)
            .expires_at(created + ttl)
            .build();
        prop_assert_eq!(record.status(created + ttl), KeyStatus::Active);
        prop_assert_eq!(record.status(created + ttl + 1), KeyStatus::Expired);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_only_known_keys_authorize(presented in presented_value(), issued_role in role()) {
        runtime().block_on(async {
            let store = Arc::new(MemoryStore::new());
            let issued = RawKey::generate(issued_role, keyward::core::KEY_PAYLOAD_LEN);
            store
                .insert(&RecordBuilder::new(&issued, issued_role).build())
                .await
                .unwrap();

            let legacy = LegacyConfig::default().with_key(Role::Admin, "xyz");
            let validator = Validator::new(store, Arc::new(LegacyRegistry::from_config(&legacy)));

            let result = validator.validate(&RawKey::new(presented.as_str())).await;
            let known = presented == issued.expose() || presented == "xyz";
            match result {
                Ok(_) => prop_assert!(known),
                Err(Rejection::Missing) => prop_assert!(presented.trim().is_empty()),
                Err(Rejection::NotFound) => prop_assert!(!known),
                Err(other) => prop_assert!(false, "unexpected rejection {:?}", other),
            }
            Ok(())
        })?;
    }
}
