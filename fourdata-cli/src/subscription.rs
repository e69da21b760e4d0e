//! Subscription entitlements.
//!
//! The purchase SDK is reached through [`PurchaseProvider`]. [`LocalPurchases`]
//! keeps entitlements in the secure store so the paywall can be exercised
//! without a store account.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use fourdata_db::store::{SecureStore, StoreError};

use crate::identity::IdentityProvider;

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("No subscription offerings found")]
    NoOffering,

    #[error("Selected package not found: {0}")]
    PackageNotFound(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Purchase failed: {0}")]
    Purchase(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub active_entitlements: BTreeSet<String>,
}

impl CustomerInfo {
    pub fn is_active(&self, entitlement: &str) -> bool {
        self.active_entitlements.contains(entitlement)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub identifier: String,
    pub entitlement: String,
    pub price: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offering {
    pub identifier: String,
    pub packages: Vec<Package>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseResult {
    Completed(CustomerInfo),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Activated,
    /// Purchase went through but the entitlement is not active yet.
    Pending,
    Cancelled,
}

pub trait PurchaseProvider {
    fn log_in(&mut self, user_id: &str) -> Result<(), SubscriptionError>;

    fn customer_info(&self) -> Result<CustomerInfo, SubscriptionError>;

    fn current_offering(&self) -> Result<Option<Offering>, SubscriptionError>;

    fn purchase(&mut self, package: &Package) -> Result<PurchaseResult, SubscriptionError>;

    fn restore(&mut self) -> Result<CustomerInfo, SubscriptionError>;
}

/// False when nobody is signed in or the provider cannot be reached.
pub fn check_subscription(
    identity: &impl IdentityProvider,
    provider: &mut impl PurchaseProvider,
    entitlement: &str,
) -> bool {
    let Some(user_id) = identity.current_user_id() else {
        return false;
    };
    let result = match provider.log_in(&user_id) {
        Ok(()) => provider.customer_info(),
        Err(e) => Err(e),
    };
    match result {
        Ok(info) => info.is_active(entitlement),
        Err(e) => {
            tracing::error!(error = %e, "subscription check failed");
            false
        }
    }
}

pub fn subscribe(
    provider: &mut impl PurchaseProvider,
    package_id: &str,
    entitlement: &str,
) -> Result<SubscribeOutcome, SubscriptionError> {
    let offering = provider
        .current_offering()?
        .ok_or(SubscriptionError::NoOffering)?;
    let package = offering
        .packages
        .iter()
        .find(|p| p.identifier == package_id)
        .ok_or_else(|| SubscriptionError::PackageNotFound(package_id.to_string()))?;

    match provider.purchase(package)? {
        PurchaseResult::Cancelled => {
            tracing::info!(package = %package_id, "purchase cancelled");
            Ok(SubscribeOutcome::Cancelled)
        }
        PurchaseResult::Completed(info) if info.is_active(entitlement) => Ok(SubscribeOutcome::Activated),
        PurchaseResult::Completed(_) => Ok(SubscribeOutcome::Pending),
    }
}

fn entitlements_key(user_id: &str) -> String {
    format!("fourdata.entitlements.{}", user_id)
}

/// Entitlements granted locally and kept per user in the secure store.
/// Every package grants `entitlement`.
pub struct LocalPurchases<S> {
    store: S,
    entitlement: String,
    user_id: Option<String>,
}

impl<S: SecureStore> LocalPurchases<S> {
    pub fn new(store: S, entitlement: &str) -> Self {
        Self {
            store,
            entitlement: entitlement.to_string(),
            user_id: None,
        }
    }

    fn user(&self) -> Result<&str, SubscriptionError> {
        self.user_id.as_deref().ok_or(SubscriptionError::NotSignedIn)
    }

    fn load(&self, user_id: &str) -> Result<CustomerInfo, SubscriptionError> {
        match self.store.get(&entitlements_key(user_id))? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| SubscriptionError::Purchase(e.to_string())),
            None => Ok(CustomerInfo::default()),
        }
    }
}

impl<S: SecureStore> PurchaseProvider for LocalPurchases<S> {
    fn log_in(&mut self, user_id: &str) -> Result<(), SubscriptionError> {
        self.user_id = Some(user_id.to_string());
        Ok(())
    }

    fn customer_info(&self) -> Result<CustomerInfo, SubscriptionError> {
        self.load(self.user()?)
    }

    fn current_offering(&self) -> Result<Option<Offering>, SubscriptionError> {
        let package = |identifier: &str, price: &str| Package {
            identifier: identifier.to_string(),
            entitlement: self.entitlement.clone(),
            price: price.to_string(),
        };
        Ok(Some(Offering {
            identifier: "default".to_string(),
            packages: vec![package("monthly", "$4.99"), package("annual", "$39.99")],
        }))
    }

    fn purchase(&mut self, package: &Package) -> Result<PurchaseResult, SubscriptionError> {
        let user_id = self.user()?.to_string();
        let mut info = self.load(&user_id)?;
        info.active_entitlements.insert(package.entitlement.clone());
        let json = serde_json::to_string(&info).map_err(|e| SubscriptionError::Purchase(e.to_string()))?;
        self.store.set(&entitlements_key(&user_id), &json)?;
        tracing::info!(user = %user_id, package = %package.identifier, "purchase recorded");
        Ok(PurchaseResult::Completed(info))
    }

    fn restore(&mut self) -> Result<CustomerInfo, SubscriptionError> {
        self.customer_info()
    }
}
