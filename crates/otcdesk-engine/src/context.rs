//! Per-call inputs supplied by the hosting ledger.

use otcdesk_types::{AccountId, Amount, BlockHeight};

/// Who is calling, what value they attached, and the current block.
///
/// The caller identity is trusted as-is; authenticating it is the host's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub caller: AccountId,
    /// Value attached to this call, in base units.
    pub attached: Amount,
    pub block_height: BlockHeight,
}

impl CallContext {
    /// A call with nothing attached.
    #[must_use]
    pub fn new(caller: impl Into<AccountId>, block_height: BlockHeight) -> Self {
        Self {
            caller: caller.into(),
            attached: 0,
            block_height,
        }
    }

    #[must_use]
    pub fn with_attached(mut self, attached: Amount) -> Self {
        self.attached = attached;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let ctx = CallContext::new("alice", BlockHeight(4)).with_attached(100);
        assert_eq!(ctx.caller, AccountId::from("alice"));
        assert_eq!(ctx.attached, 100);
        assert_eq!(ctx.block_height, BlockHeight(4));
    }
}
