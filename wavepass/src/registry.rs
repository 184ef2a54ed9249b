//! Vendor and customer accounts.
//!
//! Accounts pair a runtime actor with contact details and a password digest.
//! Ids are handed out sequentially per role starting at 1. Passwords are
//! stored as salted SHA-256 digests and compared in constant time.

use rand::RngCore;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};
use thiserror::Error;
use tracing::info;
use wavepass_core::{ActorId, CustomerId, Role, VendorId};
use wavepass_runtime::{Customer, PurchasePlan, ReleasePlan, Vendor};

#[allow(clippy::expect_used)]
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,6}$")
        .expect("hardcoded email pattern should always compile")
});

#[allow(clippy::expect_used)]
static MOBILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(0\d{9}|\+\d{10,15})$").expect("hardcoded mobile pattern should always compile")
});

/// Shortest accepted password, in characters
pub const MIN_PASSWORD_LEN: usize = 6;

/// Registration failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Name is blank
    #[error("name must not be empty")]
    EmptyName,

    /// Email does not look like an address
    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    /// Mobile number is neither local (0 + 9 digits) nor international (+ 10-15 digits)
    #[error("invalid mobile number: {0}")]
    InvalidMobile(String),

    /// Password shorter than [`MIN_PASSWORD_LEN`]
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,

    /// Another account of the same role uses this email
    #[error("a {role} with email {email} is already registered")]
    DuplicateEmail {
        /// Role the email is taken in
        role: Role,
        /// Offending email
        email: String,
    },

    /// The system-wide ticket ceiling is used up
    #[error("maximum ticket limit reached, no more vendors can release tickets")]
    CeilingReached,

    /// Requested release total exceeds what the ceiling still allows
    #[error("can only release up to {remaining} tickets, requested {requested}")]
    ExceedsAllowance {
        /// Tickets asked for
        requested: u64,
        /// Tickets still allowed
        remaining: u64,
    },
}

/// Contact details and password supplied at registration.
#[derive(Debug, Clone)]
pub struct SignUp {
    /// Display name
    pub name: String,
    /// Login email
    pub email: String,
    /// Mobile number
    pub mobile: String,
    /// Plain-text password; only its digest is kept
    pub password: String,
}

impl SignUp {
    fn validate(&self) -> Result<(), RegistryError> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if !is_valid_email(&self.email) {
            return Err(RegistryError::InvalidEmail(self.email.clone()));
        }
        if !is_valid_mobile(&self.mobile) {
            return Err(RegistryError::InvalidMobile(self.mobile.clone()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RegistryError::WeakPassword);
        }
        Ok(())
    }
}

/// Whether `email` is an acceptable login address
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Whether `mobile` is a local or international number
#[must_use]
pub fn is_valid_mobile(mobile: &str) -> bool {
    MOBILE.is_match(mobile)
}

struct PasswordDigest {
    salt: [u8; 16],
    hash: [u8; 32],
}

impl PasswordDigest {
    fn new(password: &str) -> Self {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let hash = Self::hash(&salt, password);
        Self { salt, hash }
    }

    fn hash(salt: &[u8], password: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        hasher.finalize().into()
    }

    fn verify(&self, password: &str) -> bool {
        constant_time_eq::constant_time_eq(&self.hash, &Self::hash(&self.salt, password))
    }
}

struct Contact {
    email: String,
    mobile: String,
    password: PasswordDigest,
}

impl Contact {
    fn new(sign_up: &SignUp) -> Self {
        Self {
            email: sign_up.email.clone(),
            mobile: sign_up.mobile.clone(),
            password: PasswordDigest::new(&sign_up.password),
        }
    }

    fn matches(&self, email: &str, password: &str) -> bool {
        self.email.eq_ignore_ascii_case(email) && self.password.verify(password)
    }
}

struct Account<A> {
    actor: Arc<A>,
    contact: Contact,
}

/// A logged-in actor.
#[derive(Debug, Clone)]
pub enum Principal {
    /// A vendor session
    Vendor(Arc<Vendor>),
    /// A customer session
    Customer(Arc<Customer>),
}

impl Principal {
    /// Actor identity
    #[must_use]
    pub fn actor(&self) -> ActorId {
        match self {
            Self::Vendor(vendor) => vendor.id().into(),
            Self::Customer(customer) => customer.id().into(),
        }
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Vendor(vendor) => vendor.name(),
            Self::Customer(customer) => customer.name(),
        }
    }
}

/// Public account details, without credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    /// Display name
    pub name: String,
    /// Login email
    pub email: String,
    /// Mobile number
    pub mobile: String,
}

/// All registered accounts.
#[derive(Default)]
pub struct Registry {
    vendors: RwLock<Vec<Account<Vendor>>>,
    customers: RwLock<Vec<Account<Customer>>>,
}

impl Registry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a vendor.
    ///
    /// `remaining` is how many tickets the system-wide ceiling still allows;
    /// the plan's total may not exceed it.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] if the ceiling is used up, the plan asks
    /// for more than `remaining`, a field fails validation, or the email is
    /// already taken by another vendor.
    pub fn register_vendor(
        &self,
        sign_up: &SignUp,
        plan: ReleasePlan,
        remaining: u64,
    ) -> Result<Arc<Vendor>, RegistryError> {
        if remaining == 0 {
            return Err(RegistryError::CeilingReached);
        }
        let requested = u64::from(plan.total_tickets());
        if requested > remaining {
            return Err(RegistryError::ExceedsAllowance {
                requested,
                remaining,
            });
        }
        sign_up.validate()?;

        let mut vendors = self.vendors.write().unwrap_or_else(PoisonError::into_inner);
        if vendors
            .iter()
            .any(|account| account.contact.email.eq_ignore_ascii_case(&sign_up.email))
        {
            return Err(RegistryError::DuplicateEmail {
                role: Role::Vendor,
                email: sign_up.email.clone(),
            });
        }

        let id = VendorId::new(next_id(vendors.len()));
        let vendor = Arc::new(Vendor::new(id, sign_up.name.trim(), plan));
        vendors.push(Account {
            actor: Arc::clone(&vendor),
            contact: Contact::new(sign_up),
        });
        info!(vendor = %id, name = vendor.name(), "Vendor registered");
        Ok(vendor)
    }

    /// Register a customer.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] if a field fails validation or the email
    /// is already taken by another customer.
    pub fn register_customer(
        &self,
        sign_up: &SignUp,
        plan: PurchasePlan,
    ) -> Result<Arc<Customer>, RegistryError> {
        sign_up.validate()?;

        let mut customers = self.customers.write().unwrap_or_else(PoisonError::into_inner);
        if customers
            .iter()
            .any(|account| account.contact.email.eq_ignore_ascii_case(&sign_up.email))
        {
            return Err(RegistryError::DuplicateEmail {
                role: Role::Customer,
                email: sign_up.email.clone(),
            });
        }

        let id = CustomerId::new(next_id(customers.len()));
        let customer = Arc::new(Customer::new(id, sign_up.name.trim(), plan));
        customers.push(Account {
            actor: Arc::clone(&customer),
            contact: Contact::new(sign_up),
        });
        info!(customer = %id, name = customer.name(), "Customer registered");
        Ok(customer)
    }

    /// Find the account with this email and password.
    ///
    /// Email comparison ignores ASCII case. Vendors are checked first.
    #[must_use]
    pub fn authenticate(&self, email: &str, password: &str) -> Option<Principal> {
        let vendor = self
            .vendors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|account| account.contact.matches(email, password))
            .map(|account| Arc::clone(&account.actor));
        if let Some(vendor) = vendor {
            return Some(Principal::Vendor(vendor));
        }

        self.customers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|account| account.contact.matches(email, password))
            .map(|account| Principal::Customer(Arc::clone(&account.actor)))
    }

    /// Every registered vendor, in id order
    #[must_use]
    pub fn vendors(&self) -> Vec<Arc<Vendor>> {
        self.vendors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|account| Arc::clone(&account.actor))
            .collect()
    }

    /// Every registered customer, in id order
    #[must_use]
    pub fn customers(&self) -> Vec<Arc<Customer>> {
        self.customers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|account| Arc::clone(&account.actor))
            .collect()
    }

    /// Contact details of a vendor
    #[must_use]
    pub fn vendor_summary(&self, id: VendorId) -> Option<AccountSummary> {
        self.vendors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|account| account.actor.id() == id)
            .map(|account| summary(account.actor.name(), &account.contact))
    }

    /// Contact details of a customer
    #[must_use]
    pub fn customer_summary(&self, id: CustomerId) -> Option<AccountSummary> {
        self.customers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|account| account.actor.id() == id)
            .map(|account| summary(account.actor.name(), &account.contact))
    }

    /// Number of vendors
    #[must_use]
    pub fn vendor_count(&self) -> usize {
        self.vendors.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of customers
    #[must_use]
    pub fn customer_count(&self) -> usize {
        self.customers.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("vendors", &self.vendor_count())
            .field("customers", &self.customer_count())
            .finish()
    }
}

fn summary(name: &str, contact: &Contact) -> AccountSummary {
    AccountSummary {
        name: name.to_string(),
        email: contact.email.clone(),
        mobile: contact.mobile.clone(),
    }
}

fn next_id(count: usize) -> u32 {
    u32::try_from(count).map_or(u32::MAX, |n| n.saturating_add(1))
}
