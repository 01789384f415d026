/// Structural validation for transactions, separated from type definitions
use crate::error::TransactionError;
use crate::transaction::types::Transaction;

impl Transaction {
    /// Check identity and shape. Does not consult any UTXO state and does not
    /// verify signatures.
    pub fn validate(&self) -> Result<(), TransactionError> {
        let computed = self.calculate_id();
        if self.id != computed {
            return Err(TransactionError::IdentityMismatch {
                stored: self.id.clone(),
                computed,
            });
        }

        if self.is_coinbase() {
            if self.outputs.len() != 1 {
                return Err(TransactionError::WrongCoinbaseOutputCount(self.outputs.len()));
            }
            return Ok(());
        }

        if self.inputs.is_empty() {
            return Err(TransactionError::MissingInputs);
        }

        if self.outputs.is_empty() {
            return Err(TransactionError::MissingOutputs);
        }

        if let Some(index) = self.outputs.iter().position(|out| out.value == 0) {
            return Err(TransactionError::NonPositiveOutputValue { index });
        }

        Ok(())
    }
}
