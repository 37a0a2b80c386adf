//! Single-use enforcement for authorization codes.
//!
//! Codes are self-contained, so nothing on the issuing side stops a code from
//! being presented twice. The token endpoint records every code it redeems
//! here and refuses repeats. Entries only need to live as long as a code can
//! pass the age check, after which they are pruned.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug)]
pub struct RedeemedCodes {
    max_age_ms: u64,
    seen: Mutex<HashMap<[u8; 32], u64>>,
}

impl RedeemedCodes {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age_ms: max_age.as_millis() as u64,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Record `code` as redeemed. Returns `false` if it was already redeemed.
    pub fn try_redeem(&self, code: &str, created_at_ms: u64, now_ms: u64) -> bool {
        let digest: [u8; 32] = Sha256::digest(code.as_bytes()).into();
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());

        let max_age = self.max_age_ms;
        seen.retain(|_, created| now_ms.saturating_sub(*created) <= max_age);

        if seen.contains_key(&digest) {
            return false;
        }
        seen.insert(digest, created_at_ms);
        true
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
