/// Monetary policy
///
/// Amounts are whole picocoins (`u64`). New coins only enter through reward
/// transactions; the schedule deciding how many is injected into the chain
/// store at construction.
///
/// Default reward for solving a block
pub const DEFAULT_BLOCK_REWARD: u64 = 100;

/// How much a solver may claim for a block at a given height
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardSchedule {
    /// Same reward forever
    Fixed(u64),
    /// Reward halves every `interval` blocks, reaching zero eventually
    Halving { initial: u64, interval: u64 },
}

impl Default for RewardSchedule {
    fn default() -> Self {
        RewardSchedule::Fixed(DEFAULT_BLOCK_REWARD)
    }
}

impl RewardSchedule {
    /// Reward for the block at `height` (genesis is height 0)
    pub fn reward_at(&self, height: u64) -> u64 {
        match *self {
            RewardSchedule::Fixed(amount) => amount,
            RewardSchedule::Halving { initial, interval } => {
                let halvings = height / interval.max(1);
                if halvings >= u64::BITS as u64 {
                    0
                } else {
                    initial >> halvings
                }
            }
        }
    }
}

/// Format an amount for display
pub fn format_amount(amount: u64) -> String {
    format!("{amount} picocoins")
}
