//! Rule engine port: turns schedule conditions into a query filter.

use tally_domain::condition::Condition;
use tally_domain::error::TallyError;
use tally_domain::filter::TransactionFilter;

/// Translates conditions into the filter the query layer understands.
pub trait RuleEngine {
    /// # Errors
    ///
    /// Returns [`TallyError::Validation`] for conditions the engine cannot express.
    fn conditions_to_filter(&self, conditions: &[Condition])
    -> Result<TransactionFilter, TallyError>;
}

/// [`RuleEngine`] backed by the domain [`TransactionFilter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRuleEngine;

impl RuleEngine for DefaultRuleEngine {
    fn conditions_to_filter(
        &self,
        conditions: &[Condition],
    ) -> Result<TransactionFilter, TallyError> {
        Ok(TransactionFilter::from_conditions(conditions))
    }
}

impl<T: RuleEngine> RuleEngine for std::sync::Arc<T> {
    fn conditions_to_filter(
        &self,
        conditions: &[Condition],
    ) -> Result<TransactionFilter, TallyError> {
        (**self).conditions_to_filter(conditions)
    }
}
