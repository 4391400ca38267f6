//! Per-height collections of voted payees.

use crate::constants::SIGNATURES_REQUIRED;
use lmnode_chain::TxOut;
use lmnode_messages::ObjectHash;
use lmnode_types::{Amount, Outpoint, Script};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// One payee and the votes supporting it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payee {
    pub script: Script,
    pub votes: Vec<ObjectHash>,
}

impl Payee {
    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }
}

/// Every payee voted for at one height, in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPayees {
    pub height: u32,
    payees: Vec<Payee>,
    voters: BTreeSet<Outpoint>,
}

impl BlockPayees {
    pub fn new(height: u32) -> Self {
        Self {
            height,
            payees: Vec::new(),
            voters: BTreeSet::new(),
        }
    }

    pub fn payees(&self) -> &[Payee] {
        &self.payees
    }

    /// Count a vote. Returns `false` if `voter` already voted at this height.
    pub fn add_payee(&mut self, voter: Outpoint, script: &Script, hash: ObjectHash) -> bool {
        if !self.voters.insert(voter) {
            return false;
        }
        match self.payees.iter_mut().find(|p| &p.script == script) {
            Some(payee) => payee.votes.push(hash),
            None => self.payees.push(Payee {
                script: script.clone(),
                votes: vec![hash],
            }),
        }
        true
    }

    /// The payee with the most votes; ties go to the one seen first.
    pub fn best_payee(&self) -> Option<&Script> {
        let mut best: Option<&Payee> = None;
        for payee in &self.payees {
            if best.map_or(true, |b| payee.vote_count() > b.vote_count()) {
                best = Some(payee);
            }
        }
        best.map(|p| &p.script)
    }

    pub fn has_payee_with_votes(&self, script: &Script, min_votes: usize) -> bool {
        self.payees
            .iter()
            .any(|p| p.vote_count() >= min_votes && &p.script == script)
    }

    pub fn max_votes(&self) -> usize {
        self.payees.iter().map(Payee::vote_count).max().unwrap_or(0)
    }

    pub fn total_votes(&self) -> usize {
        self.voters.len()
    }

    pub fn has_quorum(&self) -> bool {
        self.max_votes() >= SIGNATURES_REQUIRED
    }

    /// Whether a coinbase paying `outputs` satisfies the votes.
    ///
    /// Below quorum any coinbase is accepted. Otherwise one payee with a
    /// quorum must be paid exactly `payment`.
    pub fn is_transaction_valid(&self, outputs: &[TxOut], payment: Amount) -> bool {
        if !self.has_quorum() {
            return true;
        }
        let mut possible = Vec::new();
        for payee in self.payees.iter().filter(|p| p.vote_count() >= SIGNATURES_REQUIRED) {
            if outputs
                .iter()
                .any(|out| out.script == payee.script && out.value == payment)
            {
                return true;
            }
            possible.push(payee.script.to_string());
        }
        warn!(
            height = self.height,
            payees = %possible.join(","),
            %payment,
            "missing required masternode payment"
        );
        false
    }
}

/// `payee:votes, payee:votes, …`
impl fmt::Display for BlockPayees {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.payees.is_empty() {
            return write!(f, "Unknown");
        }
        for (i, payee) in self.payees.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", payee.script, payee.vote_count())?;
        }
        Ok(())
    }
}
