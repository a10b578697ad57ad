use crate::sync::SharedSet;

/// Key of one revocation fetch: `(issuer filesystem-safe name, kid)`.
pub type FetchKey = (String, String);

/// De-duplication guard for in-flight revocation fetches. A fetch may
/// start only after its key is inserted; a key already present means a
/// caller gets an immediate no-op success instead of a second request.
#[derive(Debug, Default)]
pub struct FetchCoordinator {
    in_flight: SharedSet<FetchKey>,
}

impl FetchCoordinator {
    pub fn new() -> Self {
        Self {
            in_flight: SharedSet::new(),
        }
    }

    pub fn is_fetching(&self, key: &FetchKey) -> bool {
        self.in_flight.contains(key)
    }

    /// Claims the key. `false` means another fetch already holds it.
    pub fn begin(&self, key: FetchKey) -> bool {
        self.in_flight.insert(key)
    }

    /// Releases the key once the fetch settles, success or not, so a
    /// retry is possible on the very next evaluation.
    pub fn finish(&self, key: &FetchKey) {
        self.in_flight.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(kid: &str) -> FetchKey {
        ("issuer.example".to_string(), kid.to_string())
    }

    #[test]
    fn second_begin_is_rejected_until_finish() {
        let coordinator = FetchCoordinator::new();

        assert!(coordinator.begin(key("key-1")));
        assert!(coordinator.is_fetching(&key("key-1")));
        assert!(!coordinator.begin(key("key-1")));

        // A different key is independent.
        assert!(coordinator.begin(key("key-2")));

        coordinator.finish(&key("key-1"));
        assert!(!coordinator.is_fetching(&key("key-1")));
        assert!(coordinator.begin(key("key-1")));
    }
}
