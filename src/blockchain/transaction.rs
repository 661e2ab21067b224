use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use super::crypto::Address;

/// Errors that can occur while building a transaction
#[derive(Debug, Error, PartialEq)]
pub enum TransactionError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid recipient address: {0}")]
    InvalidRecipientAddress(String),
}

/// Shipment record carried alongside a transfer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CargoDetails {
    /// Name of the passenger or owner of the shipment
    pub name: String,

    /// Origin airport or depot
    pub origin: String,

    /// Destination airport or depot
    pub destination: String,

    /// Flight or route number
    pub flight: String,

    /// Carrier handling the shipment
    pub carrier: String,
}

/// Represents a transaction in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Unique identifier for the transaction
    pub id: String,

    /// Sender's address, `None` for a mining reward
    pub sender: Option<Address>,

    /// Recipient's address
    pub recipient: Address,

    /// Amount being transferred
    pub amount: f64,

    /// Optional shipment payload
    #[serde(default)]
    pub details: Option<CargoDetails>,
}

impl Transaction {
    /// Creates a new transfer
    ///
    /// The sender's balance is not checked; balances on this ledger are
    /// informational only.
    ///
    /// # Arguments
    ///
    /// * `sender` - The address of the sender, or `None` for minted value
    /// * `recipient` - The address of the recipient
    /// * `amount` - The amount to transfer, finite and non-negative
    pub fn new(
        sender: Option<Address>,
        recipient: Address,
        amount: f64,
    ) -> Result<Self, TransactionError> {
        let transaction = Transaction {
            id: Uuid::new_v4().to_string(),
            sender,
            recipient,
            amount,
            details: None,
        };

        transaction.validate()?;
        Ok(transaction)
    }

    /// Checks the amount and recipient of a transaction built elsewhere,
    /// e.g. one decoded from an exported ledger
    pub fn validate(&self) -> Result<(), TransactionError> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(TransactionError::InvalidAmount(format!(
                "Amount must be a non-negative number: {}",
                self.amount
            )));
        }

        if self.recipient.is_empty() {
            return Err(TransactionError::InvalidRecipientAddress(
                "Recipient address must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Creates a mining reward paid out of thin air
    pub fn reward(recipient: Address, amount: f64) -> Self {
        Transaction {
            id: Uuid::new_v4().to_string(),
            sender: None,
            recipient,
            amount,
            details: None,
        }
    }

    /// Attaches a shipment record to the transaction
    pub fn with_details(mut self, details: CargoDetails) -> Self {
        self.details = Some(details);
        self
    }

    /// Checks if the transaction is a mining reward
    pub fn is_reward(&self) -> bool {
        self.sender.is_none()
    }

    /// Signed effect of this transaction on the balance of `address`
    pub fn balance_delta(&self, address: &Address) -> f64 {
        let mut delta = 0.0;

        if self.sender.as_ref() == Some(address) {
            delta -= self.amount;
        }

        if &self.recipient == address {
            delta += self.amount;
        }

        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transaction() {
        let transaction =
            Transaction::new(Some(Address::new("alice")), Address::new("bob"), 10.5).unwrap();

        assert_eq!(transaction.sender, Some(Address::new("alice")));
        assert_eq!(transaction.recipient, Address::new("bob"));
        assert_eq!(transaction.amount, 10.5);
        assert!(!transaction.id.is_empty());
        assert!(transaction.details.is_none());
        assert!(!transaction.is_reward());
    }

    #[test]
    fn test_rejects_negative_and_non_finite_amounts() {
        let negative = Transaction::new(None, Address::new("bob"), -1.0);
        assert!(matches!(negative, Err(TransactionError::InvalidAmount(_))));

        let nan = Transaction::new(None, Address::new("bob"), f64::NAN);
        assert!(matches!(nan, Err(TransactionError::InvalidAmount(_))));

        let zero = Transaction::new(None, Address::new("bob"), 0.0);
        assert!(zero.is_ok());
    }

    #[test]
    fn test_rejects_empty_recipient() {
        let result = Transaction::new(Some(Address::new("alice")), Address::new(""), 1.0);
        assert!(matches!(
            result,
            Err(TransactionError::InvalidRecipientAddress(_))
        ));
    }

    #[test]
    fn test_validate_decoded_transaction() {
        let mut transaction = Transaction::reward(Address::new("miner"), 100.0);
        assert_eq!(transaction.validate(), Ok(()));

        transaction.amount = -5.0;
        assert!(matches!(
            transaction.validate(),
            Err(TransactionError::InvalidAmount(_))
        ));

        transaction.amount = f64::INFINITY;
        assert!(matches!(
            transaction.validate(),
            Err(TransactionError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_reward_transaction() {
        let transaction = Transaction::reward(Address::new("miner"), 100.0);

        assert!(transaction.sender.is_none());
        assert_eq!(transaction.recipient, Address::new("miner"));
        assert_eq!(transaction.amount, 100.0);
        assert!(transaction.is_reward());
    }

    #[test]
    fn test_with_details() {
        let details = CargoDetails {
            name: "Francisco".to_string(),
            origin: "TPA".to_string(),
            destination: "MCO".to_string(),
            flight: "11521".to_string(),
            carrier: "JBLUE".to_string(),
        };

        let transaction = Transaction::new(None, Address::new("MCO"), 0.0)
            .unwrap()
            .with_details(details.clone());

        assert_eq!(transaction.details, Some(details));
    }

    #[test]
    fn test_balance_delta() {
        let alice = Address::new("alice");
        let bob = Address::new("bob");
        let transaction = Transaction::new(Some(alice.clone()), bob.clone(), 25.0).unwrap();

        assert_eq!(transaction.balance_delta(&alice), -25.0);
        assert_eq!(transaction.balance_delta(&bob), 25.0);
        assert_eq!(transaction.balance_delta(&Address::new("carol")), 0.0);

        let self_transfer = Transaction::new(Some(alice.clone()), alice.clone(), 5.0).unwrap();
        assert_eq!(self_transfer.balance_delta(&alice), 0.0);
    }
}
