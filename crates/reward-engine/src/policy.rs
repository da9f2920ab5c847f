/// Tasks cheaper than this pay a flat bonus of 1.
const BONUS_THRESHOLD: i64 = 10;

/// Referral bonus owed to the referrer of a user who completed a task of
/// `price`: 1 below the threshold, otherwise `price / 10 + 1`.
pub fn compute_referral_bonus(price: i64) -> i64 {
    if price < BONUS_THRESHOLD {
        return 1;
    }

    price / BONUS_THRESHOLD + 1
}
