//! Transaction module split into types and validation for better modularity

pub mod types;
pub mod validation;

pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransactionError;

    fn spend(outputs: Vec<TxOutput>) -> Transaction {
        Transaction::new_at(
            vec![TxInput::new(String::new(), 0, "alice".to_string())],
            outputs,
            1_700_000_000,
        )
    }

    #[test]
    fn test_coinbase_shape() {
        let tx = Transaction::new_coinbase("miner1", 5_000_000_000);
        assert!(tx.is_coinbase());
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.total_output_value(), 5_000_000_000);
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn test_id_is_deterministic() {
        let a = spend(vec![TxOutput::new(10, "bob")]);
        let b = spend(vec![TxOutput::new(10, "bob")]);
        assert_eq!(a.id, b.id);
        assert_eq!(a.id, a.calculate_id());
        assert_eq!(a.id.len(), 64);
    }

    #[test]
    fn test_id_depends_on_content() {
        let a = spend(vec![TxOutput::new(10, "bob")]);
        let b = spend(vec![TxOutput::new(11, "bob")]);
        let c = Transaction::new_at(a.inputs.clone(), a.outputs.clone(), a.timestamp + 1);
        assert_ne!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_signing_keeps_id_valid() {
        let mut tx = spend(vec![TxOutput::new(10, "bob")]);
        let id = tx.id.clone();
        tx.attach_signature("3045deadbeef");
        tx.inputs[0].signature = "input-sig".to_string();
        assert_eq!(tx.calculate_id(), id);
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn test_tampered_output_fails_identity() {
        let mut tx = spend(vec![TxOutput::new(10, "bob")]);
        tx.outputs[0].value = 1_000;
        assert!(matches!(
            tx.validate(),
            Err(TransactionError::IdentityMismatch { .. })
        ));
    }

    #[test]
    fn test_spend_requires_outputs() {
        let tx = spend(vec![]);
        assert_eq!(tx.validate(), Err(TransactionError::MissingOutputs));
    }

    #[test]
    fn test_zero_value_output_rejected() {
        let tx = spend(vec![TxOutput::new(5, "bob"), TxOutput::new(0, "carol")]);
        assert_eq!(
            tx.validate(),
            Err(TransactionError::NonPositiveOutputValue { index: 1 })
        );
    }

    #[test]
    fn test_coinbase_with_two_outputs_rejected() {
        let tx = Transaction::new_at(
            vec![],
            vec![TxOutput::new(1, "a"), TxOutput::new(2, "b")],
            0,
        );
        assert_eq!(
            tx.validate(),
            Err(TransactionError::WrongCoinbaseOutputCount(2))
        );
    }

    #[test]
    fn test_coinbase_without_outputs_rejected() {
        let tx = Transaction::new_at(vec![], vec![], 0);
        assert_eq!(
            tx.validate(),
            Err(TransactionError::WrongCoinbaseOutputCount(0))
        );
    }

    #[test]
    fn test_encode_decode_preserves_every_field() {
        let mut tx = spend(vec![TxOutput::new(7, "bob"), TxOutput::new(3, "alice")]);
        tx.attach_signature("sig");
        let bytes = tx.encode().unwrap();
        let decoded = Transaction::decode(&bytes).unwrap();
        assert_eq!(decoded, tx);
        assert!(Transaction::decode(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn test_total_output_value_saturates() {
        let tx = spend(vec![TxOutput::new(u64::MAX, "a"), TxOutput::new(1, "b")]);
        assert_eq!(tx.total_output_value(), u64::MAX);
    }

    #[test]
    fn test_format_balance() {
        assert_eq!(format_balance(5_000_000_000), "50.00000000");
        assert_eq!(format_balance(1), "0.00000001");
        assert_eq!(format_balance(123_456_789), "1.23456789");
    }
}
