use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VocalsGender {
    Male,
    Female,
}

/// User-controlled generation parameters. The UI validates and replaces the
/// whole structure; the coordinator receives an immutable snapshot per
/// request, so concurrent edits never corrupt in-flight work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub genres: BTreeSet<String>,
    /// Ignored by the generator when `instrumental` is set.
    pub vocals_gender: Option<VocalsGender>,
    pub instrumental: bool,
    pub silly_mode: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            genres: BTreeSet::new(),
            vocals_gender: None,
            instrumental: true,
            silly_mode: false,
        }
    }
}
