//! One-shot management commands run from the `margins` binary.

use anyhow::{Result, bail};
use rand::{Rng, distr::Alphanumeric};
use tracing::info;

use margins_db::Database;

const GENERATED_CODE_LEN: usize = 10;

pub fn generate_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_CODE_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}

/// Adds the given codes plus `generate` random ones. Blank and already
/// existing codes are skipped. Returns how many were added.
pub fn create_invites(db: &Database, mut codes: Vec<String>, generate: Option<usize>) -> Result<usize> {
    let generated: Vec<String> = (0..generate.unwrap_or(0)).map(|_| generate_code()).collect();
    codes.extend(generated.iter().cloned());

    if codes.iter().all(|c| c.trim().is_empty()) {
        bail!("No invite codes given; pass codes or --generate N");
    }

    let added = db.create_invites(codes.iter().map(String::as_str))?;
    for code in &generated {
        println!("{code}");
    }
    println!("Added {added} invite code(s)");
    info!(added, "Invite codes created");
    Ok(added)
}

pub fn make_admin(db: &Database, email: &str) -> Result<()> {
    let email = email.trim().to_lowercase();
    if !db.make_admin(&email)? {
        bail!("No such user");
    }
    println!("{email} is now an admin");
    info!("Promoted {} to admin", email);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_uppercase_alphanumeric() {
        let code = generate_code();
        assert_eq!(code.len(), GENERATED_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn create_invites_skips_blanks_and_duplicates() {
        let db = Database::open_in_memory().unwrap();
        let added = create_invites(&db, vec!["A1".into(), " ".into(), "A1".into(), "B2".into()], None).unwrap();
        assert_eq!(added, 2);

        let added = create_invites(&db, vec!["B2".into()], Some(3)).unwrap();
        assert_eq!(added, 3);
        assert_eq!(db.list_invites().unwrap().len(), 5);
    }

    #[test]
    fn create_invites_needs_something_to_add() {
        let db = Database::open_in_memory().unwrap();
        assert!(create_invites(&db, vec![], None).is_err());
        assert!(create_invites(&db, vec!["  ".into()], Some(0)).is_err());
    }

    #[test]
    fn make_admin_requires_existing_user() {
        let db = Database::open_in_memory().unwrap();
        let err = make_admin(&db, "ghost@example.com").unwrap_err();
        assert_eq!(err.to_string(), "No such user");
    }
}
