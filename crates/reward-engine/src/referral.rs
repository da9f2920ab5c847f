use std::sync::Arc;

use rand::Rng;
use reward_types::{User, UserId};
use tracing::{info, warn};

use crate::error::EngineError;
use crate::store::UserStore;

const REFER_CODE_LEN: usize = 15;
const REFER_CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Random refer code handed out at registration.
pub fn generate_refer_code() -> String {
    let mut rng = rand::rng();
    (0..REFER_CODE_LEN)
        .map(|_| REFER_CODE_ALPHABET[rng.random_range(0..REFER_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Resolves and links referrers. Independent of any settlement transaction.
#[derive(Clone)]
pub struct ReferralResolver {
    users: Arc<dyn UserStore>,
}

impl ReferralResolver {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// The referrer recorded on `user`, if any. Does not check that the
    /// referrer still exists.
    pub fn resolve_referrer(&self, user: &User) -> Option<UserId> {
        user.refer_from
    }

    /// Links `user_id` to the owner of `refer_code`.
    ///
    /// Attribution is immutable: a user who already has a referrer gets
    /// `Conflict`, and nobody may refer themselves.
    pub fn link_referrer(&self, user_id: UserId, refer_code: &str) -> Result<UserId, EngineError> {
        let refer_code = refer_code.trim();
        if refer_code.is_empty() {
            return Err(EngineError::Validation("refer code is required".into()));
        }

        let user = self.users.get_user(user_id)?;
        if user.refer_from.is_some() {
            warn!(user_id = %user_id, "Referrer already linked");
            return Err(EngineError::Conflict("referrer already linked".into()));
        }

        let referrer = self
            .users
            .find_by_refer_code(refer_code)?
            .ok_or(EngineError::NotFound("refer code"))?;

        if referrer.id == user_id {
            return Err(EngineError::Validation("users cannot refer themselves".into()));
        }

        // Conditional write: a concurrent link between the read above and here loses.
        if !self.users.link_referrer(user_id, referrer.id)? {
            return Err(EngineError::Conflict("referrer already linked".into()));
        }

        info!(user_id = %user_id, referrer_id = %referrer.id, "Referrer linked");
        Ok(referrer.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, ReferralResolver) {
        let store = Arc::new(MemoryStore::default());
        let resolver = ReferralResolver::new(store.clone());
        (store, resolver)
    }

    #[test]
    fn refer_codes_are_letters() {
        let code = generate_refer_code();
        assert_eq!(code.len(), REFER_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_alphabetic()));
        assert_ne!(code, generate_refer_code());
    }

    #[test]
    fn resolve_reads_refer_from() {
        let (store, resolver) = setup();
        let b = store.seed_user("b", None);
        let a = store.seed_user("a", Some(b));

        assert_eq!(resolver.resolve_referrer(&store.get_user(a).unwrap()), Some(b));
        assert_eq!(resolver.resolve_referrer(&store.get_user(b).unwrap()), None);
    }

    #[test]
    fn resolve_does_not_check_existence() {
        let (store, resolver) = setup();
        let a = store.seed_user("a", Some(UserId(404)));
        assert_eq!(
            resolver.resolve_referrer(&store.get_user(a).unwrap()),
            Some(UserId(404))
        );
    }

    #[test]
    fn link_sets_referrer() {
        let (store, resolver) = setup();
        let b = store.seed_user("b", None);
        let a = store.seed_user("a", None);

        assert_eq!(resolver.link_referrer(a, "code-b").unwrap(), b);
        assert_eq!(store.get_user(a).unwrap().refer_from, Some(b));
    }

    #[test]
    fn link_unknown_code() {
        let (store, resolver) = setup();
        let a = store.seed_user("a", None);
        let err = resolver.link_referrer(a, "nope").unwrap_err();
        assert!(matches!(err, EngineError::NotFound("refer code")));
    }

    #[test]
    fn link_unknown_user() {
        let (store, resolver) = setup();
        store.seed_user("b", None);
        let err = resolver.link_referrer(UserId(99), "code-b").unwrap_err();
        assert!(matches!(err, EngineError::NotFound("user")));
    }

    #[test]
    fn relink_is_rejected() {
        let (store, resolver) = setup();
        let b = store.seed_user("b", None);
        store.seed_user("c", None);
        let a = store.seed_user("a", None);

        resolver.link_referrer(a, "code-b").unwrap();
        let err = resolver.link_referrer(a, "code-c").unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
        assert_eq!(store.get_user(a).unwrap().refer_from, Some(b));
    }

    #[test]
    fn self_referral_is_rejected() {
        let (store, resolver) = setup();
        let a = store.seed_user("a", None);
        let err = resolver.link_referrer(a, "code-a").unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(store.get_user(a).unwrap().refer_from, None);
    }

    #[test]
    fn empty_code_is_rejected() {
        let (store, resolver) = setup();
        let a = store.seed_user("a", None);
        assert!(matches!(
            resolver.link_referrer(a, "  "),
            Err(EngineError::Validation(_))
        ));
    }
}
