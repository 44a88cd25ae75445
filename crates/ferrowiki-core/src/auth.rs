use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

/// Fixed bcrypt cost for stored credentials.
pub const BCRYPT_COST: u32 = 12;

/// Default capacity of the verified-credential fingerprint cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 128;

/// Seam around the slow adaptive hash comparison, so tests can count
/// invocations and substitute a cheap check.
pub trait PasswordChecker: Send + Sync {
    fn matches(&self, password: &str, hashed: &str) -> bool;
}

/// Production checker: bcrypt digest comparison.
pub struct BcryptChecker;

impl PasswordChecker for BcryptChecker {
    fn matches(&self, password: &str, hashed: &str) -> bool {
        bcrypt::verify(password, hashed).unwrap_or(false)
    }
}

/// Bounded FIFO set of fingerprints of credentials that already verified.
/// When full, the oldest fingerprint is evicted.
struct FingerprintCache {
    order: VecDeque<String>,
    seen: HashSet<String>,
    capacity: usize,
}

impl FingerprintCache {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    fn contains(&self, fingerprint: &str) -> bool {
        self.seen.contains(fingerprint)
    }

    fn insert(&mut self, fingerprint: String) {
        if self.capacity == 0 || self.seen.contains(&fingerprint) {
            return;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(fingerprint.clone());
        self.order.push_back(fingerprint);
    }
}

/// Credential verification against the user table.
///
/// Usernames are case-folded to lowercase before lookup. A successful
/// verification caches a SHA-256 fingerprint of the credentials so that
/// repeated identical requests skip the expensive bcrypt comparison. The
/// cache is bounded and mutex-guarded; concurrent requests contend on the
/// lock, never on unsynchronized state.
pub struct AuthGate {
    users: HashMap<String, String>,
    checker: Box<dyn PasswordChecker>,
    cache: Mutex<FingerprintCache>,
}

impl AuthGate {
    /// Gate over a `lowercase username -> bcrypt digest` table.
    pub fn new(users: HashMap<String, String>) -> Self {
        Self::with_checker(users, Box::new(BcryptChecker), DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_checker(
        users: HashMap<String, String>,
        checker: Box<dyn PasswordChecker>,
        cache_capacity: usize,
    ) -> Self {
        Self {
            users,
            checker,
            cache: Mutex::new(FingerprintCache::new(cache_capacity)),
        }
    }

    /// `true` iff the credentials match a stored user. Never errors: any
    /// failure (unknown user, bad digest, mismatch) is just `false`.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let user = username.to_lowercase();
        let fingerprint = fingerprint(&user, password);

        if self.lock_cache().contains(&fingerprint) {
            return true;
        }

        let Some(hashed) = self.users.get(&user) else {
            return false;
        };

        if self.checker.matches(password, hashed) {
            self.lock_cache().insert(fingerprint);
            true
        } else {
            false
        }
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, FingerprintCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// SHA-256 over lowercase-username + password, hex encoded.
fn fingerprint(user: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}
