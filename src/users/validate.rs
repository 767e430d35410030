use lazy_static::lazy_static;
use regex::Regex;

use crate::users::error::ValidationErrors;
use crate::users::repo_types::{NewUser, UserChanges};

/// Checked at the validation layer only; the table does not enforce it.
pub const MIN_PASSWORD_LEN: usize = 4;

const MAX_EMAIL_LEN: usize = 254;
const MAX_LOCAL_LEN: usize = 64;
const MAX_LABEL_LEN: usize = 63;

/// Dot-atom local part, hostname labels, alphabetic TLD of two or more letters.
pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(
            r"^[A-Za-z0-9!#$%\&'*+/=?^_`{|}\~\-]+(?:\.[A-Za-z0-9!#$%\&'*+/=?^_`{|}\~\-]+)*@(?:[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?\.)+[A-Za-z]{2,}$"
        )
        .unwrap();
    }
    if email.len() > MAX_EMAIL_LEN || !EMAIL_RE.is_match(email) {
        return false;
    }
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    local.len() <= MAX_LOCAL_LEN && domain.split('.').all(|label| label.len() <= MAX_LABEL_LEN)
}

/// Emails are compared case-insensitively, so they are stored trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_email(email: &str, errs: &mut ValidationErrors) {
    if !is_valid_email(email) {
        errs.push("email", "must be a valid email address");
    }
}

fn check_password(password: &str, errs: &mut ValidationErrors) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errs.push("password", "must be at least 4 characters");
    }
}

pub fn validate_new(user: &NewUser) -> Result<(), ValidationErrors> {
    let mut errs = ValidationErrors::default();
    check_email(&user.email, &mut errs);
    check_password(&user.password, &mut errs);
    errs.into_result()
}

pub fn validate_changes(changes: &UserChanges) -> Result<(), ValidationErrors> {
    let mut errs = ValidationErrors::default();
    if let Some(email) = &changes.email {
        check_email(email, &mut errs);
    }
    if let Some(password) = &changes.password {
        check_password(password, &mut errs);
    }
    errs.into_result()
}
