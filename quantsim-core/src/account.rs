//! Venue accounts: cash and margin variants.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::AccountType;
use crate::events::AccountState;
use crate::identifiers::AccountId;
use crate::types::{AccountBalance, Currency, Money};

/// A single venue account holding per-currency balances.
///
/// Balances are kept in insertion order so every query over them is
/// deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    account_type: AccountType,
    base_currency: Currency,
    leverage: Decimal,
    balances: Vec<AccountBalance>,
    commissions: Vec<(Currency, Decimal)>,
    events: Vec<AccountState>,
}

impl Account {
    pub fn cash(id: AccountId, base_currency: Currency, starting_balances: Vec<Money>) -> Self {
        Self::with_type(id, AccountType::Cash, base_currency, starting_balances, Decimal::ONE)
    }

    pub fn margin(
        id: AccountId,
        base_currency: Currency,
        starting_balances: Vec<Money>,
        leverage: Decimal,
    ) -> Self {
        Self::with_type(id, AccountType::Margin, base_currency, starting_balances, leverage)
    }

    fn with_type(
        id: AccountId,
        account_type: AccountType,
        base_currency: Currency,
        starting_balances: Vec<Money>,
        leverage: Decimal,
    ) -> Self {
        let mut account = Self {
            id,
            account_type,
            base_currency,
            leverage,
            balances: Vec::new(),
            commissions: Vec::new(),
            events: Vec::new(),
        };
        for money in starting_balances {
            let currency = money.currency().clone();
            account.update_balance(&currency, money.amount(), Decimal::ZERO);
        }
        account
    }

    pub fn id(&self) -> &AccountId {
        &self.id
    }

    pub fn account_type(&self) -> AccountType {
        self.account_type
    }

    pub fn base_currency(&self) -> &Currency {
        &self.base_currency
    }

    pub fn leverage(&self) -> Decimal {
        self.leverage
    }

    pub fn balance(&self, currency: &Currency) -> Option<&AccountBalance> {
        self.balances.iter().find(|b| b.currency() == currency)
    }

    pub fn balances(&self) -> &[AccountBalance] {
        &self.balances
    }

    pub fn balance_total(&self, currency: Option<&Currency>) -> Option<Money> {
        let currency = currency.unwrap_or(&self.base_currency);
        self.balance(currency).map(|b| b.total().clone())
    }

    pub fn balance_free(&self, currency: Option<&Currency>) -> Option<Money> {
        let currency = currency.unwrap_or(&self.base_currency);
        self.balance(currency).map(|b| b.free().clone())
    }

    pub fn balance_locked(&self, currency: Option<&Currency>) -> Option<Money> {
        let currency = currency.unwrap_or(&self.base_currency);
        self.balance(currency).map(|b| b.locked().clone())
    }

    /// Replace the balance for `currency`; `free` is recomputed.
    pub fn update_balance(&mut self, currency: &Currency, total: Decimal, locked: Decimal) {
        let balance = AccountBalance::new(
            Money::new(total, currency.clone()),
            Money::new(locked, currency.clone()),
        );
        match self.balances.iter_mut().find(|b| b.currency() == currency) {
            Some(existing) => *existing = balance,
            None => self.balances.push(balance),
        }
    }

    /// Accrue commission paid in `currency`.
    pub fn update_commissions(&mut self, currency: &Currency, amount: Decimal) {
        for (c, total) in self.commissions.iter_mut() {
            if c == currency {
                *total += amount;
                return;
            }
        }
        self.commissions.push((currency.clone(), amount));
    }

    pub fn commissions(&self) -> &[(Currency, Decimal)] {
        &self.commissions
    }

    /// Apply a reported balance snapshot.
    pub fn apply(&mut self, event: AccountState) {
        for balance in &event.balances {
            let currency = balance.currency().clone();
            match self.balances.iter_mut().find(|b| b.currency() == &currency) {
                Some(existing) => *existing = balance.clone(),
                None => self.balances.push(balance.clone()),
            }
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &[AccountState] {
        &self.events
    }
}
