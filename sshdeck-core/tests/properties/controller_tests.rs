//! Property tests for state navigation

use proptest::prelude::*;
use sshdeck_core::app::{AppEvent, Effect, Key, StateKind};
use sshdeck_core::models::ConnectionRecord;
use sshdeck_core::storage::{ConnectionStore, LocalStore};

use super::fakes::{Harness, HarnessBuilder};

fn key_strategy() -> impl Strategy<Value = Key> {
    prop_oneof![
        Just(Key::Up),
        Just(Key::Down),
        Just(Key::Enter),
        Just(Key::Esc),
        Just(Key::Tab),
        Just(Key::BackTab),
        Just(Key::Backspace),
        Just(Key::Char(' ')),
        Just(Key::Char('a')),
        Just(Key::Char('e')),
        Just(Key::Char('d')),
        Just(Key::Char('y')),
        Just(Key::Char('n')),
        Just(Key::Char('s')),
        Just(Key::Char('w')),
        "[a-z0-9]{1,8}".prop_map(Key::Paste),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Sends `key`, ending any embedded session it starts
async fn press(h: &mut Harness, key: Key) {
    h.press(key).await;
    let started = h
        .take_effects()
        .iter()
        .any(|e| matches!(e, Effect::EnterSession(_)));
    if started {
        h.send(AppEvent::SessionEnded {
            exit_code: Some(0),
            error: None,
        })
        .await;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: every state except the live session leads back to the root
    #[test]
    fn parents_reach_the_root(
        kind in prop::sample::select(StateKind::ALL.to_vec()),
        list_parent in prop::sample::select(vec![
            StateKind::StorageSelect,
            StateKind::OrganizationSelect,
            StateKind::CollectionSelect,
        ]),
    ) {
        prop_assume!(kind != StateKind::LiveSession);
        let mut current = kind;
        let mut steps = 0;
        while let Some(parent) = current.parent(list_parent) {
            current = parent;
            steps += 1;
            prop_assert!(steps <= 4);
        }
        prop_assert_eq!(current, StateKind::StorageSelect);
    }

    /// Property: arbitrary input never leaves the controller stuck
    ///
    /// After any key sequence nothing is pending and Escape returns to
    /// storage selection without a backend.
    #[test]
    fn escape_always_returns_to_storage_select(keys in prop::collection::vec(key_strategy(), 0..40)) {
        let dir = tempfile::tempdir().unwrap();
        let builder = HarnessBuilder::new(dir.path());
        let store = LocalStore::new(builder.connections_path());
        let mut h = builder.build();

        let (kind, has_backend, loading) = runtime().block_on(async {
            for name in ["alpha", "bravo"] {
                let record = ConnectionRecord::new(name, format!("{name}.internal"), "ops");
                store.add(&record, None).await.unwrap();
            }
            for key in keys {
                press(&mut h, key).await;
            }
            for _ in 0..6 {
                press(&mut h, Key::Esc).await;
            }
            (
                h.controller.state().kind(),
                h.controller.backend().is_some(),
                h.controller.loading(),
            )
        });

        prop_assert_eq!(kind, StateKind::StorageSelect);
        prop_assert!(!has_backend);
        prop_assert!(loading.is_none());
    }
}
