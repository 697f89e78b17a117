pub const DEFAULT_STARTING_CURRENCY: f32 = 500.0;

/// Build currency. Earned by siphons, spent on towers.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceLedger {
    currency: f32,
}

impl Default for ResourceLedger {
    fn default() -> Self {
        Self::new(DEFAULT_STARTING_CURRENCY)
    }
}

impl ResourceLedger {
    pub fn new(starting: f32) -> Self {
        Self {
            currency: starting.max(0.0),
        }
    }

    pub fn currency(&self) -> f32 {
        self.currency
    }

    pub fn can_afford(&self, amount: f32) -> bool {
        self.currency >= amount
    }

    /// Adds currency. Non-positive amounts are ignored. Returns true if the
    /// balance changed.
    pub fn add(&mut self, amount: f32) -> bool {
        if amount.is_nan() || amount <= 0.0 {
            return false;
        }
        self.currency += amount;
        true
    }

    /// Deducts `amount` if the balance covers it.
    pub fn spend(&mut self, amount: f32) -> bool {
        if amount.is_nan() || amount <= 0.0 || self.currency < amount {
            return false;
        }
        self.currency -= amount;
        true
    }
}
