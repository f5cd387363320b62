//! Storage key naming.
//!
//! Every key the inventory touches is built here. Box keys embed the owner,
//! and owners only ever come from a verified session, so one user's keys can
//! never be derived from another user's request.
//!
//! ```text
//! user:{email}                 account hash
//! username:{username}          -> email
//! email:{email}                -> username
//! box:{owner}:{box_id}         box hash
//! box:{owner}:{box_id}:items   list of item ids
//! item:{box_id}:{item_id}      item hash
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use rand::RngCore;

const ITEMS_SUFFIX: &str = ":items";

pub fn account_key(email: &str) -> String {
    format!("user:{email}")
}

pub fn username_index_key(username: &str) -> String {
    format!("username:{username}")
}

pub fn email_index_key(email: &str) -> String {
    format!("email:{email}")
}

pub fn box_key(owner: &str, box_id: &str) -> String {
    format!("box:{owner}:{box_id}")
}

pub fn box_items_list_key(owner: &str, box_id: &str) -> String {
    format!("box:{owner}:{box_id}{ITEMS_SUFFIX}")
}

pub fn item_key(box_id: &str, item_id: &str) -> String {
    format!("item:{box_id}:{item_id}")
}

/// Literal prefix shared by every box key (and box item list) of `owner`.
pub fn owner_prefix(owner: &str) -> String {
    format!("box:{owner}:")
}

/// Recovers the box id from a key found under [`owner_prefix`].
///
/// Returns `None` for item lists and anything else that is not a plain box key.
pub fn box_id_from_key<'a>(owner: &str, key: &'a str) -> Option<&'a str> {
    let rest = key.strip_prefix("box:")?.strip_prefix(owner)?.strip_prefix(':')?;
    if rest.is_empty() || rest.contains(':') {
        return None;
    }
    Some(rest)
}

/// True for identifiers that can be embedded in a key without changing its shape.
pub fn is_key_safe(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Source of box and item identifiers.
///
/// Ids are `{millis}-{suffix}`: a clock that never repeats or runs backwards
/// inside the process, plus 32 random bits so that separate processes
/// writing in the same millisecond do not collide either.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last_millis: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn box_id_new(&self, _owner: &str) -> String {
        self.next_id()
    }

    pub fn item_id_new(&self, _box_id: &str) -> String {
        self.next_id()
    }

    fn next_id(&self) -> String {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let mut prev = self.last_millis.load(Ordering::Relaxed);
        let millis = loop {
            let candidate = now.max(prev + 1);
            match self.last_millis.compare_exchange_weak(
                prev,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break candidate,
                Err(actual) => prev = actual,
            }
        };
        let suffix = rand::thread_rng().next_u32();
        format!("{millis}-{suffix:08x}")
    }
}
