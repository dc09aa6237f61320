//! Viewer - the signed-in account looking at a channel

use serde::{Deserialize, Serialize};

use crate::value_objects::AccountId;

/// Identity supplied by the identity provider; read-only to the messaging core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    pub account_id: AccountId,
    pub first_name: String,
    #[serde(default)]
    pub picture_url: Option<String>,
}

impl Viewer {
    pub fn new(account_id: AccountId, first_name: impl Into<String>) -> Self {
        Self {
            account_id,
            first_name: first_name.into(),
            picture_url: None,
        }
    }

    pub fn with_picture(mut self, picture_url: impl Into<String>) -> Self {
        self.picture_url = Some(picture_url.into());
        self
    }
}
