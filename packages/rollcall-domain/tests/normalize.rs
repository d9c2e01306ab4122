use serde_json::json;

use rollcall_domain::{
	NormalizationError, RawDocument,
	normalize::{self, normalize_document},
};

#[test]
fn explodes_members_in_order() {
	let doc = RawDocument::new(
		"doc-1",
		json!({
			"team_id": "T1",
			"members": [
				{ "name": " Jane  Doe ", "emails": "Jane@X.com; jane@x.com", "phone": "(555) 123-4567" },
				{ "full_name": "John Smith", "email": ["john@x.com", null], "phones": [5550001111_u64] },
			],
		}),
	);
	let members = normalize_document(&doc)
		.expect("Document should normalize.")
		.collect::<Result<Vec<_>, _>>()
		.expect("Members should normalize.");

	assert_eq!(members.len(), 2);
	assert_eq!(members[0].display_name, "Jane Doe");
	assert_eq!(members[0].emails.len(), 1);
	assert!(members[0].phones.contains("5551234567"));
	assert_eq!(members[1].display_name, "John Smith");
	assert!(members[1].emails.contains("john@x.com"));
	assert!(members[1].phones.contains("5550001111"));
	assert!(members.iter().all(|member| member.team_id == "T1"));
	assert!(members.iter().all(|member| member.source_document_id == "doc-1"));
}

#[test]
fn sparse_member_is_kept() {
	let doc = RawDocument::new("doc-1", json!({ "team_id": "T1", "members": [{}] }));
	let members = normalize_document(&doc)
		.expect("Document should normalize.")
		.collect::<Result<Vec<_>, _>>()
		.expect("Members should normalize.");

	assert_eq!(members.len(), 1);
	assert!(members[0].is_empty());
}

#[test]
fn malformed_member_does_not_hide_siblings() {
	let doc = RawDocument::new(
		"doc-9",
		json!({
			"company_id": 12,
			"members": [
				{ "name": "Jane" },
				{ "name": "Bad", "emails": { "work": "bad@x.com" } },
				"not an object",
				{ "name": "John", "phones": ["555", true] },
				{ "name": "Last" },
			],
		}),
	);
	let results = normalize_document(&doc).expect("Document should normalize.").collect::<Vec<_>>();

	assert_eq!(results.len(), 5);

	let names = results
		.iter()
		.filter_map(|result| result.as_ref().ok())
		.map(|member| member.display_name.as_str())
		.collect::<Vec<_>>();

	assert_eq!(names, vec!["Jane", "Last"]);

	let paths = results
		.iter()
		.filter_map(|result| result.as_ref().err())
		.map(|err| err.path().to_string())
		.collect::<Vec<_>>();

	assert_eq!(paths, vec!["$.members[1].emails", "$.members[2]", "$.members[3].phones[1]"]);
	assert!(results.iter().flatten().all(|member| member.team_id == "12"));
}

#[test]
fn document_without_team_is_rejected() {
	let doc = RawDocument::new("doc-2", json!({ "team_id": "  ", "members": [{ "name": "Jane" }] }));

	match normalize_document(&doc) {
		Err(err) => assert_eq!(err, NormalizationError::MissingTeam { document_id: "doc-2".to_string() }),
		Ok(_) => panic!("Expected a missing team error."),
	}
}

#[test]
fn document_without_member_list_is_rejected() {
	let doc = RawDocument::new("doc-3", json!({ "team_id": "T1", "members": "Jane" }));

	match normalize_document(&doc) {
		Err(err) => {
			assert_eq!(err.document_id(), "doc-3");
			assert_eq!(err.path(), "$.members");
		},
		Ok(_) => panic!("Expected a missing members error."),
	}
}

#[test]
fn same_member_yields_same_fingerprint() {
	let first = RawDocument::new(
		"doc-1",
		json!({ "team_id": "T1", "members": [{ "name": "Jane Doe", "emails": ["b@x.com", "a@x.com"] }] }),
	);
	let second = RawDocument::new(
		"doc-2",
		json!({ "team_id": "T1", "members": [{ "name": "  Jane Doe", "emails": "A@x.com, b@X.com" }] }),
	);
	let fingerprint = |doc: &RawDocument| {
		normalize_document(doc)
			.expect("Document should normalize.")
			.next()
			.expect("One member expected.")
			.expect("Member should normalize.")
			.fingerprint
	};

	assert_eq!(fingerprint(&first), fingerprint(&second));
}

#[test]
fn phone_field_can_carry_several_numbers() {
	let phones = normalize::normalize_phones(["555-123-4567; 555-765-4321"]);

	assert_eq!(phones.len(), 2);
}
