/// Credential numbering and public validation
///
/// Credential numbers look like `ASC-2026-7KQ2M9XD`: issue year plus eight
/// random characters from an alphabet without look-alike glyphs. The QR code
/// printed on the card carries the validation code, the first 16 hex digits of
/// HMAC-SHA256(secret, number).
///
/// The code is a second lookup key, not a proof of possession: public
/// validation accepts either the number or the code and reports the same
/// judgement for both.

use chrono::{DateTime, Datelike, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::Serialize;
use sha2::Sha256;

use crate::membership::status::{Standing, SubscriptionStanding};
use crate::models::credential::{Credential, CredentialStatus};
use crate::models::member::Member;

type HmacSha256 = Hmac<Sha256>;

pub const NUMBER_PREFIX: &str = "ASC";

const NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const NUMBER_RANDOM_LEN: usize = 8;
const VALIDATION_CODE_LEN: usize = 16;

/// New credential number for a card issued at `issued_at`
pub fn generate_number(issued_at: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..NUMBER_RANDOM_LEN)
        .map(|_| NUMBER_ALPHABET[rng.gen_range(0..NUMBER_ALPHABET.len())] as char)
        .collect();

    format!("{}-{}-{}", NUMBER_PREFIX, issued_at.year(), suffix)
}

/// Validation code for a credential number
pub fn validation_code(
    secret: &str,
    credential_number: &str,
) -> Result<String, hmac::digest::InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(credential_number.as_bytes());

    let mut code = hex::encode(mac.finalize().into_bytes());
    code.truncate(VALIDATION_CODE_LEN);
    Ok(code)
}

/// Member data disclosed by the public validation endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedMember {
    pub name: String,
    pub occupation: Option<String>,
    pub status: Standing,
    pub valid_until: DateTime<Utc>,
}

/// Body of `GET /api/validate/:credentialId`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialValidation {
    pub is_valid: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<ValidatedMember>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CredentialValidation {
    pub fn not_found() -> Self {
        Self {
            is_valid: false,
            member: None,
            message: Some("Credencial não encontrada".to_string()),
        }
    }

    /// Judges a credential found in the store
    ///
    /// Valid means: active, not expired, and the holder currently paid up.
    pub fn judge(
        credential: &Credential,
        member: &Member,
        standing: &SubscriptionStanding,
        now: DateTime<Utc>,
    ) -> Self {
        let (is_valid, message) = if credential.status == CredentialStatus::Inactive {
            (false, "Credencial substituída ou desativada")
        } else if credential.status == CredentialStatus::Expired || credential.expiry_date <= now {
            (false, "Credencial expirada")
        } else if standing.status == Standing::Cancelado {
            (false, "Associação cancelada")
        } else if !standing.status.is_paid_up() {
            (false, "Associado com pagamento pendente")
        } else {
            (true, "Credencial válida")
        };

        Self {
            is_valid,
            member: Some(ValidatedMember {
                name: member.name.clone(),
                occupation: member.occupation.clone(),
                status: standing.status,
                valid_until: credential.expiry_date,
            }),
            message: Some(message.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::member::{MemberRole, SubscriptionStatus};
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    #[test]
    fn test_generate_number_format() {
        let issued = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let number = generate_number(issued);

        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ASC");
        assert_eq!(parts[1], "2026");
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].bytes().all(|b| NUMBER_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_generate_number_is_random() {
        let now = Utc::now();
        assert_ne!(generate_number(now), generate_number(now));
    }

    #[test]
    fn test_validation_code_is_keyed() {
        let code = validation_code("secret-a", "ASC-2026-AAAAAAAA").unwrap();

        assert_eq!(code.len(), 16);
        assert!(code.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(code, validation_code("secret-a", "ASC-2026-AAAAAAAA").unwrap());
        assert_ne!(code, validation_code("secret-b", "ASC-2026-AAAAAAAA").unwrap());
        assert_ne!(code, validation_code("secret-a", "ASC-2026-AAAAAAAB").unwrap());
    }

    #[test]
    fn test_not_found_shape() {
        let json = serde_json::to_value(CredentialValidation::not_found()).unwrap();

        assert_eq!(json["isValid"], false);
        assert!(json.get("member").is_none());
        assert_eq!(json["message"], "Credencial não encontrada");
    }

    fn fixtures(now: DateTime<Utc>) -> (Credential, Member) {
        let member = Member {
            id: Uuid::new_v4(),
            name: "Carla Dias".to_string(),
            email: "carla@example.com".to_string(),
            password_hash: String::new(),
            phone: None,
            cpf: "222.333.444-55".to_string(),
            occupation: Some("Terapeuta".to_string()),
            graduated: true,
            role: MemberRole::Member,
            subscription_status: SubscriptionStatus::Active,
            photo_url: None,
            cancelled_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        let credential = Credential {
            id: Uuid::new_v4(),
            member_id: member.id,
            credential_number: "ASC-2026-AAAAAAAA".to_string(),
            validation_code: "0123456789abcdef".to_string(),
            issue_date: now,
            expiry_date: now + Duration::days(30),
            status: CredentialStatus::Active,
            created_at: now,
            updated_at: now,
        };
        (credential, member)
    }

    #[test]
    fn test_judge_valid() {
        let now = Utc::now();
        let (credential, member) = fixtures(now);
        let standing = SubscriptionStanding {
            status: Standing::Adimplente,
            expiry_date: Some(credential.expiry_date),
        };

        let result = CredentialValidation::judge(&credential, &member, &standing, now);

        assert!(result.is_valid);
        let disclosed = result.member.unwrap();
        assert_eq!(disclosed.name, "Carla Dias");
        assert_eq!(disclosed.valid_until, credential.expiry_date);
    }

    #[test]
    fn test_judge_invalid_cases() {
        let now = Utc::now();
        let (credential, member) = fixtures(now);
        let paid_up = SubscriptionStanding {
            status: Standing::Adimplente,
            expiry_date: None,
        };

        let mut expired = credential.clone();
        expired.expiry_date = now - Duration::days(1);
        assert!(!CredentialValidation::judge(&expired, &member, &paid_up, now).is_valid);

        let mut inactive = credential.clone();
        inactive.status = CredentialStatus::Inactive;
        assert!(!CredentialValidation::judge(&inactive, &member, &paid_up, now).is_valid);

        let lapsed = SubscriptionStanding {
            status: Standing::Inadimplente,
            expiry_date: None,
        };
        let result = CredentialValidation::judge(&credential, &member, &lapsed, now);
        assert!(!result.is_valid);
        assert_eq!(result.member.unwrap().status, Standing::Inadimplente);
    }
}
