use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::traits::{FeeRepository, LedgerAccountDirectory, LoanProductDirectory};
use crate::applicability::{form_layout, FormLayout};
use crate::config::FeeEngineConfig;
use crate::error::FeeError;
use crate::fee_definition::{
    ApplicationRule, CalculationMethod, CollectionRule, FeeDefinition, FeeDefinitionInput,
    FeeStatus,
};
use crate::resolution::{calculate_fee_charge, FeeCharge, LoanContext};
use crate::types::ComputationOutput;
use crate::FeeResult;

/// What `retire_fee_definition` did with the definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetireOutcome {
    Deleted,
    Archived,
}

pub struct FeeDefinitionService {
    repository: Arc<dyn FeeRepository>,
    loan_products: Arc<dyn LoanProductDirectory>,
    ledger_accounts: Arc<dyn LedgerAccountDirectory>,
    config: FeeEngineConfig,
}

impl FeeDefinitionService {
    pub fn new(
        repository: Arc<dyn FeeRepository>,
        loan_products: Arc<dyn LoanProductDirectory>,
        ledger_accounts: Arc<dyn LedgerAccountDirectory>,
        config: FeeEngineConfig,
    ) -> Self {
        FeeDefinitionService {
            repository,
            loan_products,
            ledger_accounts,
            config,
        }
    }

    pub fn config(&self) -> &FeeEngineConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn get_fee_definition(&self, id: Uuid) -> FeeResult<FeeDefinition> {
        self.repository.get(id)?.ok_or(FeeError::NotFound(id))
    }

    pub fn list_fee_definitions(&self) -> FeeResult<Vec<FeeDefinition>> {
        self.repository.list()
    }

    /// Definitions that can still be attached to new loan products.
    pub fn list_active_fee_definitions(&self) -> FeeResult<Vec<FeeDefinition>> {
        Ok(self
            .repository
            .list()?
            .into_iter()
            .filter(|d| !d.is_archived())
            .collect())
    }

    /// Field visibility for a form opened on behalf of a loan product. The
    /// band fee column is labelled in the product's currency.
    pub fn form_layout_for_product(
        &self,
        product_id: Uuid,
        method: CalculationMethod,
        rule: ApplicationRule,
        collection: Option<CollectionRule>,
    ) -> FeeResult<FormLayout> {
        let currency = self
            .loan_products
            .product_currency(product_id)?
            .unwrap_or_else(|| self.config.default_currency.clone());
        Ok(form_layout(method, rule, collection, &currency))
    }

    /// Compute the charge a stored definition produces for a loan.
    pub fn charge_for_loan(
        &self,
        id: Uuid,
        loan: &LoanContext,
    ) -> FeeResult<ComputationOutput<FeeCharge>> {
        let definition = self.get_fee_definition(id)?;
        calculate_fee_charge(&definition, loan, &self.config)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    pub fn create_fee_definition(&self, input: &FeeDefinitionInput) -> FeeResult<FeeDefinition> {
        let definition = FeeDefinition::from_input(input, &self.config)?;
        self.check_accounts(&definition)?;

        let stored = self.repository.insert(definition)?;
        info!(fee_id = %stored.id, name = %stored.name, "fee definition created");
        Ok(stored)
    }

    /// Replace a definition's fields with a re-validated draft.
    ///
    /// When the draft carries a `version` it must match the stored one.
    pub fn update_fee_definition(
        &self,
        id: Uuid,
        input: &FeeDefinitionInput,
    ) -> FeeResult<FeeDefinition> {
        let current = self.get_fee_definition(id)?;
        let expected_version = input.version.unwrap_or(current.version);

        let next = current.with_update(input, &self.config)?;
        self.check_accounts(&next)?;

        let stored = self
            .repository
            .update(next, expected_version)
            .inspect_err(|e| {
                if let FeeError::VersionConflict { expected, actual, .. } = e {
                    warn!(fee_id = %id, expected, actual, "stale fee definition update rejected");
                }
            })?;
        info!(fee_id = %stored.id, version = stored.version, "fee definition updated");
        Ok(stored)
    }

    /// Mark a definition archived. Archiving an archived definition is a
    /// no-op.
    pub fn archive_fee_definition(&self, id: Uuid) -> FeeResult<FeeDefinition> {
        self.set_status(id, FeeStatus::Archived)
    }

    pub fn unarchive_fee_definition(&self, id: Uuid) -> FeeResult<FeeDefinition> {
        self.set_status(id, FeeStatus::Active)
    }

    /// Remove a definition outright. Only active definitions that no loan
    /// product references can be deleted.
    pub fn delete_fee_definition(&self, id: Uuid) -> FeeResult<()> {
        let current = self.get_fee_definition(id)?;
        if current.is_archived() {
            warn!(fee_id = %id, "delete rejected: fee definition is archived");
            return Err(FeeError::ArchivedNotDeletable(id));
        }
        if self.loan_products.references_fee(id)? {
            warn!(fee_id = %id, "delete rejected: fee definition is referenced by a loan product");
            return Err(FeeError::ReferencedByLoanProduct(id));
        }

        self.repository.remove(id)?;
        info!(fee_id = %id, "fee definition deleted");
        Ok(())
    }

    /// Delete when nothing references the definition, archive otherwise.
    pub fn retire_fee_definition(&self, id: Uuid) -> FeeResult<RetireOutcome> {
        let current = self.get_fee_definition(id)?;
        if current.is_archived() || self.loan_products.references_fee(id)? {
            self.set_status(id, FeeStatus::Archived)?;
            return Ok(RetireOutcome::Archived);
        }
        self.delete_fee_definition(id)?;
        Ok(RetireOutcome::Deleted)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn set_status(&self, id: Uuid, status: FeeStatus) -> FeeResult<FeeDefinition> {
        let mut current = self.get_fee_definition(id)?;
        if current.status == status {
            debug!(fee_id = %id, ?status, "fee definition status unchanged");
            return Ok(current);
        }

        let expected_version = current.version;
        current.status = status;
        let stored = self.repository.update(current, expected_version)?;
        info!(fee_id = %id, ?status, "fee definition status changed");
        Ok(stored)
    }

    fn check_accounts(&self, definition: &FeeDefinition) -> FeeResult<()> {
        for (field, account) in [
            ("receivableAccount", &definition.receivable_account),
            ("incomeAccount", &definition.income_account),
        ] {
            if !self.ledger_accounts.contains(account) {
                return Err(FeeError::UnknownLedgerAccount {
                    field: field.into(),
                    account: account.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::ValueBand;
    use crate::fee_definition::LedgerAccountRef;
    use crate::service::{InMemoryFeeRepository, InMemoryLedgerAccounts, InMemoryLoanProducts};
    use crate::types::Currency;
    use rust_decimal_macros::dec;

    struct Fixture {
        service: FeeDefinitionService,
        products: Arc<InMemoryLoanProducts>,
    }

    fn fixture() -> Fixture {
        let products = Arc::new(InMemoryLoanProducts::new());
        let service = FeeDefinitionService::new(
            Arc::new(InMemoryFeeRepository::new()),
            products.clone(),
            Arc::new(InMemoryLedgerAccounts::new(["1200-FEES-RECV", "4100-FEE-INCOME"])),
            FeeEngineConfig::default(),
        );
        Fixture { service, products }
    }

    fn processing_fee() -> FeeDefinitionInput {
        FeeDefinitionInput {
            name: "Processing Fee".into(),
            calculation_method: Some(CalculationMethod::FixedAmount),
            application_rule: Some(ApplicationRule::FixedValue),
            collection_rule: Some(CollectionRule::Upfront),
            receivable_account: Some(LedgerAccountRef::new("1200-FEES-RECV")),
            income_account: Some(LedgerAccountRef::new("4100-FEE-INCOME")),
            amount: Some(dec!(50)),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_assigns_identity_and_version() {
        let f = fixture();
        let created = f.service.create_fee_definition(&processing_fee()).unwrap();

        assert_eq!(created.version, 1);
        assert!(created.created_at.is_some());
        assert_eq!(created.status, FeeStatus::Active);
        assert_eq!(f.service.get_fee_definition(created.id).unwrap(), created);
    }

    #[test]
    fn test_create_rejects_invalid_draft() {
        let f = fixture();
        let mut input = processing_fee();
        input.amount = None;

        match f.service.create_fee_definition(&input).unwrap_err() {
            FeeError::MissingRequiredField { field } => assert_eq!(field, "amount"),
            other => panic!("Expected MissingRequiredField, got {other:?}"),
        }
        assert!(f.service.list_fee_definitions().unwrap().is_empty());
    }

    #[test]
    fn test_create_rejects_unknown_account() {
        let f = fixture();
        let mut input = processing_fee();
        input.income_account = Some(LedgerAccountRef::new("9999-NOPE"));

        match f.service.create_fee_definition(&input).unwrap_err() {
            FeeError::UnknownLedgerAccount { field, account } => {
                assert_eq!(field, "incomeAccount");
                assert_eq!(account, "9999-NOPE");
            }
            other => panic!("Expected UnknownLedgerAccount, got {other:?}"),
        }
    }

    #[test]
    fn test_update_bumps_version_and_keeps_identity() {
        let f = fixture();
        let created = f.service.create_fee_definition(&processing_fee()).unwrap();

        let mut draft = created.to_input();
        draft.amount = Some(dec!(75));
        let updated = f.service.update_fee_definition(created.id, &draft).unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.amount, Some(dec!(75)));
        assert_eq!(updated.version, 2);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[test]
    fn test_update_with_stale_version_conflicts() {
        let f = fixture();
        let created = f.service.create_fee_definition(&processing_fee()).unwrap();
        let stale = created.to_input();

        let mut first = created.to_input();
        first.amount = Some(dec!(60));
        f.service.update_fee_definition(created.id, &first).unwrap();

        match f.service.update_fee_definition(created.id, &stale).unwrap_err() {
            FeeError::VersionConflict { expected, actual, .. } => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("Expected VersionConflict, got {other:?}"),
        }
    }

    #[test]
    fn test_update_unknown_id_not_found() {
        let f = fixture();
        let id = Uuid::new_v4();
        assert_eq!(
            f.service.update_fee_definition(id, &processing_fee()).unwrap_err(),
            FeeError::NotFound(id)
        );
    }

    #[test]
    fn test_update_to_graduated_with_bands() {
        let f = fixture();
        let created = f.service.create_fee_definition(&processing_fee()).unwrap();

        let mut draft = created.to_input();
        draft.set_application_rule(ApplicationRule::GraduatedByValue);
        draft.value_bands = draft
            .value_bands
            .add_band(ValueBand::new(dec!(0), dec!(10000), dec!(25)), f.service.config().overlap_policy)
            .unwrap();
        let updated = f.service.update_fee_definition(created.id, &draft).unwrap();

        assert_eq!(updated.amount, None);
        assert_eq!(updated.value_bands.len(), 1);
    }

    #[test]
    fn test_archive_is_idempotent_and_keeps_identity() {
        let f = fixture();
        let created = f.service.create_fee_definition(&processing_fee()).unwrap();

        let archived = f.service.archive_fee_definition(created.id).unwrap();
        assert!(archived.is_archived());
        assert_eq!(archived.version, 2);

        let again = f.service.archive_fee_definition(created.id).unwrap();
        assert_eq!(again.version, 2);

        let restored = f.service.unarchive_fee_definition(created.id).unwrap();
        assert_eq!(restored.id, created.id);
        assert!(!restored.is_archived());
    }

    #[test]
    fn test_list_active_excludes_archived() {
        let f = fixture();
        let kept = f.service.create_fee_definition(&processing_fee()).unwrap();
        let mut other = processing_fee();
        other.name = "Legacy Fee".into();
        let retired = f.service.create_fee_definition(&other).unwrap();
        f.service.archive_fee_definition(retired.id).unwrap();

        let active = f.service.list_active_fee_definitions().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, kept.id);
        assert_eq!(f.service.list_fee_definitions().unwrap().len(), 2);
    }

    #[test]
    fn test_delete_referenced_definition_rejected() {
        let f = fixture();
        let created = f.service.create_fee_definition(&processing_fee()).unwrap();
        let product = Uuid::new_v4();
        f.products.add_product(product, Currency::USD).unwrap();
        f.products.attach_fee(product, created.id).unwrap();

        assert_eq!(
            f.service.delete_fee_definition(created.id).unwrap_err(),
            FeeError::ReferencedByLoanProduct(created.id)
        );
        assert!(f.service.get_fee_definition(created.id).is_ok());
    }

    struct UnavailableProducts;

    impl LoanProductDirectory for UnavailableProducts {
        fn references_fee(&self, _fee_id: Uuid) -> FeeResult<bool> {
            Err(FeeError::Repository("loan product store unavailable".into()))
        }

        fn product_currency(&self, _product_id: Uuid) -> FeeResult<Option<Currency>> {
            Err(FeeError::Repository("loan product store unavailable".into()))
        }
    }

    #[test]
    fn test_delete_fails_closed_when_products_unavailable() {
        let service = FeeDefinitionService::new(
            Arc::new(InMemoryFeeRepository::new()),
            Arc::new(UnavailableProducts),
            Arc::new(InMemoryLedgerAccounts::default()),
            FeeEngineConfig::default(),
        );
        let created = service.create_fee_definition(&processing_fee()).unwrap();

        assert!(matches!(
            service.delete_fee_definition(created.id),
            Err(FeeError::Repository(_))
        ));
        assert!(matches!(
            service.retire_fee_definition(created.id),
            Err(FeeError::Repository(_))
        ));
        assert!(service.get_fee_definition(created.id).is_ok());
    }

    #[test]
    fn test_delete_archived_definition_rejected() {
        let f = fixture();
        let created = f.service.create_fee_definition(&processing_fee()).unwrap();
        f.service.archive_fee_definition(created.id).unwrap();

        assert_eq!(
            f.service.delete_fee_definition(created.id).unwrap_err(),
            FeeError::ArchivedNotDeletable(created.id)
        );
    }

    #[test]
    fn test_delete_unreferenced_definition() {
        let f = fixture();
        let created = f.service.create_fee_definition(&processing_fee()).unwrap();
        f.service.delete_fee_definition(created.id).unwrap();

        assert_eq!(
            f.service.get_fee_definition(created.id).unwrap_err(),
            FeeError::NotFound(created.id)
        );
    }

    #[test]
    fn test_retire_archives_when_referenced() {
        let f = fixture();
        let created = f.service.create_fee_definition(&processing_fee()).unwrap();
        let product = Uuid::new_v4();
        f.products.add_product(product, Currency::USD).unwrap();
        f.products.attach_fee(product, created.id).unwrap();

        assert_eq!(
            f.service.retire_fee_definition(created.id).unwrap(),
            RetireOutcome::Archived
        );
        assert!(f.service.get_fee_definition(created.id).unwrap().is_archived());

        let mut other = processing_fee();
        other.name = "Unused Fee".into();
        let unused = f.service.create_fee_definition(&other).unwrap();
        assert_eq!(
            f.service.retire_fee_definition(unused.id).unwrap(),
            RetireOutcome::Deleted
        );
    }

    #[test]
    fn test_form_layout_uses_product_currency() {
        let f = fixture();
        let product = Uuid::new_v4();
        f.products.add_product(product, Currency::EUR).unwrap();

        let layout = f.service.form_layout_for_product(
            product,
            CalculationMethod::FixedAmount,
            ApplicationRule::GraduatedByValue,
            Some(CollectionRule::Upfront),
        )
        .unwrap();
        assert_eq!(layout.fee_column_label, "AMOUNT (EUR)");

        let fallback = f.service.form_layout_for_product(
            Uuid::new_v4(),
            CalculationMethod::FixedAmount,
            ApplicationRule::GraduatedByValue,
            None,
        )
        .unwrap();
        assert_eq!(fallback.fee_column_label, "AMOUNT (USD)");
    }

    #[test]
    fn test_charge_for_stored_definition() {
        let f = fixture();
        let created = f.service.create_fee_definition(&processing_fee()).unwrap();
        let loan = LoanContext {
            principal: dec!(10000),
            ..Default::default()
        };

        let out = f.service.charge_for_loan(created.id, &loan).unwrap();
        assert_eq!(out.result.charge_amount, dec!(50));
    }
}
