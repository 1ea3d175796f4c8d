use crate::TxnId;

/// Capability token threaded through index operations on behalf of a lock manager.
///
/// Nothing in this crate inspects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    txn_id: TxnId,
}

impl Transaction {
    pub fn new(txn_id: TxnId) -> Self {
        Self { txn_id }
    }
    pub fn get_txn_id(&self) -> TxnId {
        self.txn_id
    }
}
