//! Context-free event checks: everything that can be decided without
//! knowing the event's parents.

use std::sync::Arc;

use weft_crypto::SignatureVerifier;
use weft_types::{Event, Roster};

use crate::error::RejectReason;

/// Checks roster membership, structure, hash and signature of an event.
pub struct EventValidator {
    roster: Arc<Roster>,
    verifier: Arc<dyn SignatureVerifier>,
}

impl EventValidator {
    pub fn new(roster: Arc<Roster>, verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self { roster, verifier }
    }

    pub fn roster(&self) -> &Arc<Roster> {
        &self.roster
    }

    /// Run every parent-independent check. The signature is verified last
    /// since it is by far the most expensive.
    pub fn validate(&self, event: &Event) -> Result<(), RejectReason> {
        let creator = event.creator();
        if !self.roster.contains(creator) {
            return Err(RejectReason::UnknownCreator);
        }
        self.validate_structure(event)?;

        if event.content().compute_hash() != event.hash() {
            return Err(RejectReason::HashMismatch);
        }

        let public_key = self
            .roster
            .public_key(creator)
            .ok_or(RejectReason::UnknownCreator)?;
        if !self
            .verifier
            .verify(public_key, event.hash().as_bytes(), event.signature())
        {
            return Err(RejectReason::InvalidSignature);
        }
        Ok(())
    }

    fn validate_structure(&self, event: &Event) -> Result<(), RejectReason> {
        let creator = event.creator();
        match event.self_parent() {
            Some(self_parent) => {
                if self_parent.creator != creator {
                    return Err(RejectReason::SelfParentCreatorMismatch);
                }
                if self_parent.sequence.checked_add(1) != Some(event.sequence()) {
                    return Err(RejectReason::SequenceMismatch);
                }
            }
            None => {
                if event.sequence() != 0 {
                    return Err(RejectReason::SequenceMismatch);
                }
            }
        }

        if let Some(other_parent) = event.other_parent() {
            if other_parent.creator == creator {
                return Err(RejectReason::OtherParentSameCreator);
            }
            if !self.roster.contains(other_parent.creator) {
                return Err(RejectReason::UnknownCreator);
            }
        }
        Ok(())
    }
}
