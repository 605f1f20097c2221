use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use uuid::Uuid;

use super::traits::{FeeRepository, LedgerAccountDirectory, LoanProductDirectory};
use crate::error::FeeError;
use crate::fee_definition::{FeeDefinition, LedgerAccountRef};
use crate::types::Currency;
use crate::FeeResult;

/// Reference repository keeping definitions in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryFeeRepository {
    definitions: RwLock<Vec<FeeDefinition>>,
}

impl InMemoryFeeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> FeeError {
    FeeError::Repository("fee definition store lock poisoned".into())
}

fn products_poisoned<T>(_: T) -> FeeError {
    FeeError::Repository("loan product store lock poisoned".into())
}

impl FeeRepository for InMemoryFeeRepository {
    fn get(&self, id: Uuid) -> FeeResult<Option<FeeDefinition>> {
        let definitions = self.definitions.read().map_err(poisoned)?;
        Ok(definitions.iter().find(|d| d.id == id).cloned())
    }

    fn list(&self) -> FeeResult<Vec<FeeDefinition>> {
        Ok(self.definitions.read().map_err(poisoned)?.clone())
    }

    fn insert(&self, mut definition: FeeDefinition) -> FeeResult<FeeDefinition> {
        let mut definitions = self.definitions.write().map_err(poisoned)?;
        if definitions.iter().any(|d| d.id == definition.id) {
            return Err(FeeError::Repository(format!(
                "fee definition {} already exists",
                definition.id
            )));
        }

        let now = Utc::now();
        definition.created_at = Some(now);
        definition.updated_at = Some(now);
        definition.version = 1;
        definitions.push(definition.clone());
        Ok(definition)
    }

    fn update(&self, mut definition: FeeDefinition, expected_version: u64) -> FeeResult<FeeDefinition> {
        let mut definitions = self.definitions.write().map_err(poisoned)?;
        let stored = definitions
            .iter_mut()
            .find(|d| d.id == definition.id)
            .ok_or(FeeError::NotFound(definition.id))?;

        if stored.version != expected_version {
            return Err(FeeError::VersionConflict {
                id: definition.id,
                expected: expected_version,
                actual: stored.version,
            });
        }

        definition.created_at = stored.created_at;
        definition.updated_at = Some(Utc::now());
        definition.version = stored.version + 1;
        *stored = definition.clone();
        Ok(definition)
    }

    fn remove(&self, id: Uuid) -> FeeResult<()> {
        let mut definitions = self.definitions.write().map_err(poisoned)?;
        let before = definitions.len();
        definitions.retain(|d| d.id != id);
        if definitions.len() == before {
            return Err(FeeError::NotFound(id));
        }
        Ok(())
    }
}

/// Loan products as a map of product id to (currency, referenced fee ids).
#[derive(Debug, Default)]
pub struct InMemoryLoanProducts {
    products: RwLock<HashMap<Uuid, (Currency, HashSet<Uuid>)>>,
}

impl InMemoryLoanProducts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, product_id: Uuid, currency: Currency) -> FeeResult<()> {
        self.products
            .write()
            .map_err(products_poisoned)?
            .entry(product_id)
            .or_insert_with(|| (currency, HashSet::new()));
        Ok(())
    }

    pub fn attach_fee(&self, product_id: Uuid, fee_id: Uuid) -> FeeResult<()> {
        let mut products = self.products.write().map_err(products_poisoned)?;
        let (_, fees) = products
            .get_mut(&product_id)
            .ok_or_else(|| unknown_product(product_id))?;
        fees.insert(fee_id);
        Ok(())
    }

    pub fn detach_fee(&self, product_id: Uuid, fee_id: Uuid) -> FeeResult<()> {
        let mut products = self.products.write().map_err(products_poisoned)?;
        let (_, fees) = products
            .get_mut(&product_id)
            .ok_or_else(|| unknown_product(product_id))?;
        fees.remove(&fee_id);
        Ok(())
    }
}

fn unknown_product(product_id: Uuid) -> FeeError {
    FeeError::Repository(format!("loan product {product_id} does not exist"))
}

impl LoanProductDirectory for InMemoryLoanProducts {
    fn references_fee(&self, fee_id: Uuid) -> FeeResult<bool> {
        let products = self.products.read().map_err(products_poisoned)?;
        Ok(products.values().any(|(_, fees)| fees.contains(&fee_id)))
    }

    fn product_currency(&self, product_id: Uuid) -> FeeResult<Option<Currency>> {
        let products = self.products.read().map_err(products_poisoned)?;
        Ok(products.get(&product_id).map(|(c, _)| c.clone()))
    }
}

/// Account directory backed by a fixed set of codes. An empty directory
/// accepts every account.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLedgerAccounts {
    accounts: HashSet<LedgerAccountRef>,
}

impl InMemoryLedgerAccounts {
    pub fn new<I, S>(accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        InMemoryLedgerAccounts {
            accounts: accounts.into_iter().map(LedgerAccountRef::new).collect(),
        }
    }
}

impl LedgerAccountDirectory for InMemoryLedgerAccounts {
    fn contains(&self, account: &LedgerAccountRef) -> bool {
        self.accounts.is_empty() || self.accounts.contains(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn poison(products: &Arc<InMemoryLoanProducts>) {
        let held = Arc::clone(products);
        let result = std::thread::spawn(move || {
            let _guard = held.products.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(result.is_err());
    }

    #[test]
    fn test_attach_and_detach_fee() {
        let products = InMemoryLoanProducts::new();
        let product = Uuid::new_v4();
        let fee = Uuid::new_v4();
        products.add_product(product, Currency::GBP).unwrap();

        products.attach_fee(product, fee).unwrap();
        assert!(products.references_fee(fee).unwrap());
        assert_eq!(products.product_currency(product).unwrap(), Some(Currency::GBP));

        products.detach_fee(product, fee).unwrap();
        assert!(!products.references_fee(fee).unwrap());
    }

    #[test]
    fn test_attach_to_unknown_product_fails() {
        let products = InMemoryLoanProducts::new();
        assert!(matches!(
            products.attach_fee(Uuid::new_v4(), Uuid::new_v4()),
            Err(FeeError::Repository(_))
        ));
    }

    #[test]
    fn test_poisoned_product_lock_is_an_error() {
        let products = Arc::new(InMemoryLoanProducts::new());
        let product = Uuid::new_v4();
        let fee = Uuid::new_v4();
        products.add_product(product, Currency::USD).unwrap();
        products.attach_fee(product, fee).unwrap();
        poison(&products);

        assert!(matches!(products.references_fee(fee), Err(FeeError::Repository(_))));
        assert!(matches!(products.product_currency(product), Err(FeeError::Repository(_))));
        assert!(matches!(
            products.add_product(Uuid::new_v4(), Currency::USD),
            Err(FeeError::Repository(_))
        ));
        assert!(matches!(
            products.detach_fee(product, fee),
            Err(FeeError::Repository(_))
        ));
    }

    #[test]
    fn test_empty_ledger_directory_accepts_any_account() {
        assert!(InMemoryLedgerAccounts::default().contains(&LedgerAccountRef::new("9999")));
        let accounts = InMemoryLedgerAccounts::new(["1200", "4100"]);
        assert!(accounts.contains(&LedgerAccountRef::new("1200")));
        assert!(!accounts.contains(&LedgerAccountRef::new("9999")));
    }
}
