/// Validation rules: pure predicates over requests and the entities they reference
use crate::config::TokenNamePolicy;
use crate::error::{RequiredAmount, Rejection};
use crate::model::{Account, ArtToken, ArtWork, Holder, Merchant, Participant};
use crate::transaction::types::{
    ListArtWorkTx, SendTokensTx, MAX_DESCRIPTION_LENGTH, MAX_TOKEN_NAME_LENGTH,
    MAX_TRANSACTION_SIZE,
};

pub fn check_size(size: usize) -> Result<(), Rejection> {
    if size > MAX_TRANSACTION_SIZE {
        return Err(Rejection::TransactionTooLarge {
            size,
            max: MAX_TRANSACTION_SIZE,
        });
    }
    Ok(())
}

/// The submitter must be the holder it acts for.
pub fn check_submitter(submitter: &Holder, acting_as: &Holder) -> Result<(), Rejection> {
    if submitter != acting_as {
        return Err(Rejection::AuthorizationMismatch {
            submitter: submitter.to_string(),
            acting_as: acting_as.to_string(),
        });
    }
    Ok(())
}

impl ListArtWorkTx {
    /// Stateless checks: supply bounds and listing fields.
    pub fn validate(&self, max_supply: u64) -> Result<(), Rejection> {
        if self.token_initial_balance == 0 {
            return Err(Rejection::InvalidSupply(
                "tokenInitialBalance must be a positive integer".to_string(),
            ));
        }
        if self.token_initial_balance > max_supply {
            return Err(Rejection::InvalidSupply(format!(
                "tokenInitialBalance {} exceeds the maximum of {}",
                self.token_initial_balance, max_supply
            )));
        }

        let token_name = self.token_name.trim();
        if token_name.is_empty() {
            return Err(Rejection::InvalidListing(
                "tokenName cannot be empty".to_string(),
            ));
        }
        if token_name.len() > MAX_TOKEN_NAME_LENGTH {
            return Err(Rejection::InvalidListing(format!(
                "tokenName exceeds maximum length of {} characters",
                MAX_TOKEN_NAME_LENGTH
            )));
        }
        if self.art_work_description.trim().is_empty() {
            return Err(Rejection::InvalidListing(
                "artWorkDescription cannot be empty".to_string(),
            ));
        }
        if self.art_work_description.len() > MAX_DESCRIPTION_LENGTH {
            return Err(Rejection::InvalidListing(format!(
                "artWorkDescription exceeds maximum length of {} characters",
                MAX_DESCRIPTION_LENGTH
            )));
        }
        Ok(())
    }

    /// `owner` must be a registered merchant.
    pub fn check_owner(&self, owner: Option<Merchant>) -> Result<Merchant, Rejection> {
        owner.ok_or_else(|| {
            Rejection::InvalidOwner(format!("merchant '{}' is not registered", self.owner))
        })
    }

    /// Only the owning merchant may list.
    pub fn check_lister(&self, submitter: &Holder) -> Result<(), Rejection> {
        match submitter {
            Holder::Merchant(id) if *id == self.owner => Ok(()),
            _ => Err(Rejection::InvalidOwner(format!(
                "{} cannot list on behalf of merchant '{}'",
                submitter, self.owner
            ))),
        }
    }

    /// Apply the configured token-name policy to the art works already in
    /// scope (the owner's works, or every work for a global policy).
    pub fn check_token_name(
        &self,
        policy: TokenNamePolicy,
        listed: &[ArtWork],
    ) -> Result<(), Rejection> {
        let name = self.token_name.trim();
        let collides = match policy {
            TokenNamePolicy::Tag => false,
            TokenNamePolicy::UniquePerMerchant => listed
                .iter()
                .any(|w| w.owner == self.owner && w.token_name == name),
            TokenNamePolicy::UniqueGlobal => listed.iter().any(|w| w.token_name == name),
        };
        if collides {
            return Err(Rejection::DuplicateListing(name.to_string()));
        }
        Ok(())
    }
}

impl SendTokensTx {
    /// Stateless checks.
    pub fn validate(&self) -> Result<(), Rejection> {
        if self.amount == 0 {
            return Err(Rejection::InvalidAmount(
                "amount must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    pub fn check_art_work(&self, found: Option<ArtWork>) -> Result<ArtWork, Rejection> {
        found.ok_or_else(|| Rejection::ArtWorkNotFound(self.art_work.to_string()))
    }

    /// `held` are the tokens of the art work currently owned by `from`,
    /// lowest id first. Returns exactly `amount` of them.
    pub fn select_tokens(&self, mut held: Vec<ArtToken>) -> Result<Vec<ArtToken>, Rejection> {
        let owned = held.len() as u64;
        if owned < self.amount {
            return Err(Rejection::InsufficientTokenHolding {
                art_work: self.art_work.to_string(),
                holder: self.from.to_string(),
                owned,
                requested: self.amount,
            });
        }
        held.truncate(self.amount as usize);
        Ok(held)
    }

    /// Returns the seller balance after receiving `total`.
    pub fn check_seller_credit(&self, seller: &Account, total: u64) -> Result<u64, Rejection> {
        seller
            .balance()
            .checked_add(total)
            .ok_or_else(|| Rejection::BalanceOverflow {
                holder: self.from.to_string(),
                balance: seller.balance(),
                credit: total,
            })
    }

    pub fn check_buyer(&self, found: Option<Participant>) -> Result<Participant, Rejection> {
        found.ok_or_else(|| Rejection::ParticipantNotFound(self.to.to_string()))
    }

    /// Returns the total price when the buyer can afford it.
    pub fn check_affordable(&self, buyer: &Participant) -> Result<u64, Rejection> {
        match self.total_price() {
            Some(total) if total <= buyer.balance => Ok(total),
            Some(total) => Err(Rejection::InsufficientBalance {
                participant: buyer.id.to_string(),
                balance: buyer.balance,
                required: RequiredAmount::Exact(total),
            }),
            None => Err(Rejection::InsufficientBalance {
                participant: buyer.id.to_string(),
                balance: buyer.balance,
                required: RequiredAmount::Overflow,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArtWorkId, MerchantId};

    fn work(owner: &str, token_name: &str) -> ArtWork {
        ArtWork::new(
            ArtWorkId::generate(),
            MerchantId::new(owner),
            "Mona Lisa",
            token_name,
            10,
        )
    }

    #[test]
    fn test_supply_must_be_positive() {
        let tx = ListArtWorkTx::new("merchant1", "ART", 0, "Mona Lisa");
        assert!(matches!(tx.validate(100), Err(Rejection::InvalidSupply(_))));
        let tx = ListArtWorkTx::new("merchant1", "ART", 101, "Mona Lisa");
        assert!(matches!(tx.validate(100), Err(Rejection::InvalidSupply(_))));
        let tx = ListArtWorkTx::new("merchant1", "ART", 100, "Mona Lisa");
        assert!(tx.validate(100).is_ok());
    }

    #[test]
    fn test_listing_fields_required() {
        let tx = ListArtWorkTx::new("merchant1", " ", 5, "Mona Lisa");
        assert!(matches!(tx.validate(100), Err(Rejection::InvalidListing(_))));
        let tx = ListArtWorkTx::new("merchant1", "ART", 5, "");
        assert!(matches!(tx.validate(100), Err(Rejection::InvalidListing(_))));
        let tx = ListArtWorkTx::new("merchant1", "A".repeat(65), 5, "Mona Lisa");
        assert!(matches!(tx.validate(100), Err(Rejection::InvalidListing(_))));
    }

    #[test]
    fn test_token_name_policies() {
        let listed = vec![work("merchant1", "ART"), work("merchant2", "PIC")];
        let tx = ListArtWorkTx::new("merchant1", "PIC", 5, "Other");

        assert!(tx.check_token_name(TokenNamePolicy::Tag, &listed).is_ok());
        assert!(tx
            .check_token_name(TokenNamePolicy::UniquePerMerchant, &listed)
            .is_ok());
        assert!(matches!(
            tx.check_token_name(TokenNamePolicy::UniqueGlobal, &listed),
            Err(Rejection::DuplicateListing(_))
        ));

        let tx = ListArtWorkTx::new("merchant1", "ART", 5, "Other");
        assert!(matches!(
            tx.check_token_name(TokenNamePolicy::UniquePerMerchant, &listed),
            Err(Rejection::DuplicateListing(_))
        ));
    }

    #[test]
    fn test_select_tokens_takes_lowest_ids() {
        let w = work("merchant1", "ART");
        let tokens = w.mint_tokens(0);
        let tx = SendTokensTx::new(w.id.clone(), MerchantId::new("merchant1"), "person1", 3, 2);
        let selected = tx.select_tokens(tokens.clone()).unwrap();
        assert_eq!(selected.len(), 3);
        assert_eq!(selected, tokens[..3].to_vec());
    }

    #[test]
    fn test_select_tokens_insufficient_holding() {
        let w = work("merchant1", "ART");
        let tokens = w.mint_tokens(0);
        let tx = SendTokensTx::new(w.id.clone(), MerchantId::new("merchant1"), "person1", 11, 2);
        match tx.select_tokens(tokens) {
            Err(Rejection::InsufficientTokenHolding { owned, requested, .. }) => {
                assert_eq!(owned, 10);
                assert_eq!(requested, 11);
            }
            other => panic!("expected InsufficientTokenHolding, got {:?}", other),
        }
    }

    #[test]
    fn test_affordability() {
        let buyer = Participant::new("person1", "Alice", 20).unwrap();
        let w = ArtWorkId::new("w1");
        let tx = SendTokensTx::new(w.clone(), MerchantId::new("merchant1"), "person1", 10, 2);
        assert_eq!(tx.check_affordable(&buyer), Ok(20));

        let tx = SendTokensTx::new(w.clone(), MerchantId::new("merchant1"), "person1", 10, 3);
        assert!(matches!(
            tx.check_affordable(&buyer),
            Err(Rejection::InsufficientBalance { required: RequiredAmount::Exact(30), .. })
        ));

        let tx = SendTokensTx::new(w, MerchantId::new("merchant1"), "person1", u64::MAX, 2);
        assert!(matches!(
            tx.check_affordable(&buyer),
            Err(Rejection::InsufficientBalance { required: RequiredAmount::Overflow, .. })
        ));
    }

    #[test]
    fn test_seller_credit_overflow() {
        let merchant = Merchant::new("merchant1", "Merchant", u64::MAX - 5).unwrap();
        let seller = Account::Merchant(merchant);
        let tx =
            SendTokensTx::new(ArtWorkId::new("w1"), MerchantId::new("merchant1"), "person1", 1, 10);
        assert!(matches!(
            tx.check_seller_credit(&seller, 10),
            Err(Rejection::BalanceOverflow { credit: 10, .. })
        ));
        assert_eq!(tx.check_seller_credit(&seller, 5), Ok(u64::MAX));
    }

    #[test]
    fn test_only_owner_may_list() {
        let tx = ListArtWorkTx::new("merchant1", "ART", 5, "Mona Lisa");
        assert!(tx.check_lister(&Holder::merchant("merchant1")).is_ok());
        assert!(matches!(
            tx.check_lister(&Holder::merchant("merchant2")),
            Err(Rejection::InvalidOwner(_))
        ));
        assert!(matches!(
            tx.check_lister(&Holder::participant("merchant1")),
            Err(Rejection::InvalidOwner(_))
        ));
    }

    #[test]
    fn test_zero_amount_rejected() {
        let tx = SendTokensTx::new(ArtWorkId::new("w1"), MerchantId::new("m"), "p", 0, 2);
        assert!(matches!(tx.validate(), Err(Rejection::InvalidAmount(_))));
    }

    #[test]
    fn test_submitter_check() {
        let m = Holder::merchant("merchant1");
        assert!(check_submitter(&m, &m).is_ok());
        assert!(matches!(
            check_submitter(&Holder::participant("merchant1"), &m),
            Err(Rejection::AuthorizationMismatch { .. })
        ));
        assert!(check_size(MAX_TRANSACTION_SIZE + 1).is_err());
    }
}
