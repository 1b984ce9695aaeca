/// Bounded retry counter scoped to one logical operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    used: u32,
    max: u32,
}

impl RetryBudget {
    pub fn new(max: u32) -> Self {
        Self { used: 0, max }
    }

    /// A single retry
    pub fn once() -> Self {
        Self::new(1)
    }

    /// Take one retry from the budget, false when none is left
    pub fn try_consume(&mut self) -> bool {
        if self.used >= self.max {
            return false;
        }
        self.used += 1;
        true
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_once_allows_a_single_retry() {
        let mut budget = RetryBudget::once();
        assert!(!budget.is_exhausted());
        assert!(budget.try_consume());
        assert!(!budget.try_consume());
        assert_eq!(budget.used(), 1);
        assert!(budget.is_exhausted());
    }

    #[test]
    fn test_zero_budget() {
        let mut budget = RetryBudget::new(0);
        assert!(!budget.try_consume());
        assert_eq!(budget.used(), 0);
    }
}
