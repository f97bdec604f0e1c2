// 8 decimals numbers
pub const COIN_DECIMALS: u8 = 8;
// 100 000 000 atomic units to represent 1 coin
pub const COIN_VALUE: u64 = 10u64.pow(COIN_DECIMALS as u32);
// 21M full coins, upper bound for simulated genesis allocations
pub const MAXIMUM_SUPPLY: u64 = 21_000_000 * COIN_VALUE;

// ===== PRICE FEED =====

// Feed answers carry 8 decimals, like the coin itself
pub const FEED_DECIMALS: u8 = 8;
pub const FEED_VALUE: u64 = 10u64.pow(FEED_DECIMALS as u32);
// Default feed answer: 2000 notional units per whole coin
pub const INITIAL_FEED_ANSWER: u64 = 2_000 * FEED_VALUE;
// Funding below this notional value is rejected by the vault
// The atomic minimum is derived per vault from its feed answer:
// minimum = MINIMUM_NOTIONAL * COIN_VALUE / answer
pub const MINIMUM_NOTIONAL: u64 = 50 * FEED_VALUE;

// ===== GAS SCHEDULE =====

// Flat cost of a funding transaction
pub const GAS_FUND: u64 = 88_000;
// Withdrawal pays a base cost plus a per-funder cost for clearing records
pub const GAS_WITHDRAW_BASE: u64 = 35_000;
pub const GAS_WITHDRAW_PER_FUNDER: u64 = 5_000;
// Reverted transactions still consume gas up to the rejection point
pub const GAS_REVERT: u64 = 23_000;
// Atomic units charged per unit of gas unless a chain overrides it
pub const DEFAULT_GAS_PRICE: u64 = 20;

// ===== SIMULATION DEFAULTS =====

// Genesis balance handed to actors created without an explicit amount
pub const DEFAULT_ACTOR_BALANCE: u64 = 100 * COIN_VALUE;
// Simulated delay between submission and confirmation
pub const DEFAULT_CONFIRMATION_DELAY_MS: u64 = 50;
// How long a driver waits for confirmation before giving up
pub const DEFAULT_CONFIRMATION_BOUND_MS: u64 = 5_000;

// ===== REVERT REASONS =====

// Reason strings attached to rejected transactions. Drivers match on these
// to classify failures, so they are part of the vault's observable contract.
pub const REASON_VALUE_TOO_LOW: &str = "value below funding minimum";
pub const REASON_NOT_OWNER: &str = "caller is not the vault owner";
pub const REASON_NOTHING_TO_WITHDRAW: &str = "vault balance is zero";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimum_derivation_with_default_answer() {
        // 50 notional at 2000 notional/coin is 0.025 coin
        let minimum = (MINIMUM_NOTIONAL as u128 * COIN_VALUE as u128
            / INITIAL_FEED_ANSWER as u128) as u64;
        assert_eq!(minimum, 2_500_000);
        assert!(minimum < COIN_VALUE, "funding 1 coin must clear the minimum");
    }

    #[test]
    fn default_balances_cover_fund_fees() {
        let fund_fee = GAS_FUND * DEFAULT_GAS_PRICE;
        assert!(DEFAULT_ACTOR_BALANCE > COIN_VALUE + fund_fee);
    }
}
