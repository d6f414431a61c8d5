//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rota_engine::backend::NewMember;
use rota_engine::{InMemoryBackend, MutationCoordinator, NoticeKind, Notifier, RosterBackend, RosterStore};
use rota_events::{Member, MemberAttributes, Shift};

/// Notifier that keeps every message it is asked to show.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    seen: Arc<Mutex<Vec<(String, NoticeKind)>>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, k)| *k == NoticeKind::Error)
            .map(|(m, _)| m.clone())
            .collect()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.messages().iter().filter(|m| m.contains(needle)).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, kind: NoticeKind) {
        self.seen.lock().unwrap().push((message.to_string(), kind));
    }
}

/// One client: its own store and coordinator over a shared backend.
pub struct Client {
    pub store: Arc<RosterStore>,
    pub notifier: RecordingNotifier,
    pub coordinator: Arc<MutationCoordinator>,
}

impl Client {
    pub fn new(backend: &Arc<InMemoryBackend>) -> Self {
        let store = Arc::new(RosterStore::new());
        let notifier = RecordingNotifier::default();
        let coordinator = Arc::new(MutationCoordinator::new(
            Arc::clone(&store),
            backend.clone(),
            Arc::new(notifier.clone()),
        ));
        Self {
            store,
            notifier,
            coordinator,
        }
    }

    pub async fn active(&self, shift: Shift) -> Vec<Member> {
        self.store.active(shift).await.as_ref().clone()
    }

    pub async fn queue(&self, shift: Shift) -> Vec<(String, u32)> {
        queue_of(&self.active(shift).await)
    }
}

pub fn queue_of(members: &[Member]) -> Vec<(String, u32)> {
    members.iter().map(|m| (m.name.clone(), m.position)).collect()
}

pub fn new_member(name: &str, shift: Shift, position: u32) -> NewMember {
    NewMember {
        name: name.to_string(),
        shift,
        position,
        is_available: true,
        last_hold_date: None,
        attributes: MemberAttributes::default(),
    }
}

/// Insert `names` into `shift` at positions `0..`, returning the stored rows.
pub async fn seed(backend: &InMemoryBackend, shift: Shift, names: &[&str]) -> Vec<Member> {
    let mut rows = Vec::new();
    for (position, name) in names.iter().enumerate() {
        rows.push(
            backend
                .insert_member(new_member(name, shift, position as u32))
                .await
                .unwrap(),
        );
    }
    rows
}

/// Backend with Shift A = Alice, Bob, Carol and a loaded client.
pub async fn alice_bob_carol() -> (Arc<InMemoryBackend>, Client, Vec<Member>) {
    let backend = Arc::new(InMemoryBackend::new());
    let members = seed(&backend, Shift::A, &["Alice", "Bob", "Carol"]).await;
    let client = Client::new(&backend);
    client.coordinator.load(Shift::A).await.unwrap();
    (backend, client, members)
}

/// Poll `check` until it holds, letting background tasks run in between.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}
