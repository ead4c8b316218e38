//! The connected wallet's `UserProfile`.

use std::sync::Arc;

use spl_practice_sdk::{instruction, user_profile_address, UserProfile};

use crate::error::ClientError;
use crate::program::ProgramClient;
use crate::task::{CancelToken, ServiceStatus};

pub struct ProfileService {
    program: Arc<ProgramClient>,
    cancel: CancelToken,
    profile: Option<UserProfile>,
    status: ServiceStatus,
}

impl ProfileService {
    pub fn new(program: Arc<ProgramClient>, cancel: CancelToken) -> Self {
        Self {
            program,
            cancel,
            profile: None,
            status: ServiceStatus::default(),
        }
    }

    /// Last fetched profile. `None` until fetched, or when the wallet has
    /// not created one.
    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.status.is_loading()
    }

    pub fn error(&self) -> Option<&str> {
        self.status.error()
    }

    pub(crate) fn clear_error(&mut self) {
        self.status.clear_error();
    }

    pub fn address(&self) -> Result<[u8; 32], ClientError> {
        let (pda, _) = user_profile_address(&self.program.owner(), &self.program.program_id())?;
        Ok(pda)
    }

    /// Read the profile account. A missing account is not an error.
    pub fn fetch(&mut self) -> Result<Option<&UserProfile>, ClientError> {
        self.status.begin();
        let result = self.load();
        let profile = self.status.settle("failed to fetch user profile", result)?;
        self.profile = profile;
        Ok(self.profile.as_ref())
    }

    /// Create the profile. Once the transaction confirms this returns its
    /// signature even when the follow-up read fails; that failure is
    /// recorded as a fetch error.
    pub fn create(&mut self, name: &str, age: u8) -> Result<String, ClientError> {
        self.status.begin();
        let result = instruction::create_user_profile(
            &self.program.program_id(),
            &self.program.owner(),
            name,
            age,
        )
        .map_err(ClientError::from)
        .and_then(|ix| self.submit(ix));
        self.finish("failed to create user profile", result)
    }

    pub fn update(&mut self, name: &str, age: u8) -> Result<String, ClientError> {
        self.status.begin();
        let result = instruction::update_user_profile(
            &self.program.program_id(),
            &self.program.owner(),
            name,
            age,
        )
        .map_err(ClientError::from)
        .and_then(|ix| self.submit(ix));
        self.finish("failed to update user profile", result)
    }

    /// Add `amount` to the stored balance.
    ///
    /// When a profile is cached and the sum would overflow, nothing is
    /// submitted.
    pub fn add_balance(&mut self, amount: u64) -> Result<String, ClientError> {
        self.status.begin();
        let result = self.check_add(amount).and_then(|()| {
            let ix = instruction::add_balance(
                &self.program.program_id(),
                &self.program.owner(),
                amount,
            )?;
            self.submit(ix)
        });
        self.finish("failed to add balance", result)
    }

    fn check_add(&self, amount: u64) -> Result<(), ClientError> {
        match &self.profile {
            Some(p) if p.balance.checked_add(amount).is_none() => Err(ClientError::Overflow {
                balance: p.balance,
                amount,
            }),
            _ => Ok(()),
        }
    }

    fn load(&self) -> Result<Option<UserProfile>, ClientError> {
        let profile = self.program.fetch_account::<UserProfile>(&self.address()?)?;
        self.cancel.check()?;
        Ok(profile)
    }

    fn submit(&self, ix: spl_practice_sdk::Instruction) -> Result<String, ClientError> {
        self.cancel.check()?;
        let signature = self.program.submit(&[ix])?;
        self.cancel.check()?;
        Ok(signature)
    }

    /// Settle a write, then re-read the profile through `fetch`. A failed
    /// re-read keeps the cached profile and leaves its own error.
    fn finish(
        &mut self,
        context: &str,
        result: Result<String, ClientError>,
    ) -> Result<String, ClientError> {
        let signature = self.status.settle(context, result)?;
        match self.fetch() {
            Ok(_) => {}
            Err(ClientError::Cancelled) => return Err(ClientError::Cancelled),
            Err(e) => {
                tracing::debug!(%signature, error = %e, "profile refresh after write failed")
            }
        }
        Ok(signature)
    }
}
