use std::fmt;

use uuid::Uuid;

use crate::member::ContactSet;

/// BLAKE3 digest identifying a candidate's content within its team.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);
impl Fingerprint {
	pub fn to_hex(&self) -> String {
		blake3::Hash::from_bytes(self.0).to_hex().to_string()
	}

	pub fn from_hex(hex: &str) -> Option<Self> {
		blake3::Hash::from_hex(hex).ok().map(|hash| Self(*hash.as_bytes()))
	}
}
impl fmt::Display for Fingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_hex())
	}
}
impl fmt::Debug for Fingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Fingerprint({})", self.to_hex())
	}
}

/// Hashes already-normalized fields. Sets iterate in sorted order, so the digest does not
/// depend on the order in which emails or phones were supplied.
pub fn fingerprint(
	team_id: &str,
	display_name: &str,
	emails: &ContactSet,
	phones: &ContactSet,
) -> Fingerprint {
	let mut hasher = blake3::Hasher::new();

	write_field(&mut hasher, b'T', team_id);
	write_field(&mut hasher, b'N', display_name);

	for email in emails {
		write_field(&mut hasher, b'E', email);
	}
	for phone in phones {
		write_field(&mut hasher, b'P', phone);
	}

	Fingerprint(*hasher.finalize().as_bytes())
}

pub fn candidate_id_for(team_id: &str, fingerprint: &Fingerprint) -> Uuid {
	let name = format!("candidate:{team_id}:{fingerprint}");

	Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

/// Identifier of the agent a no-match merge creates for this candidate.
pub fn agent_id_for(team_id: &str, fingerprint: &Fingerprint) -> Uuid {
	let name = format!("agent:{team_id}:{fingerprint}");

	Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

// Length-prefixed so that adjacent fields cannot run into each other.
fn write_field(hasher: &mut blake3::Hasher, tag: u8, value: &str) {
	hasher.update(&[tag]);
	hasher.update(&(value.len() as u64).to_le_bytes());
	hasher.update(value.as_bytes());
}
